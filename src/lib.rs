//! Pie JSON PDA - token-level JSON constraints for the Pie inference engine.
//!
//! This crate builds a hand-wired pushdown automaton over JSON syntax and
//! precomputes, for every automaton state, which vocabulary tokens may be
//! emitted next and where each one lands. The sampler consumes the result
//! through [`structured::matcher::JsonMatcher`].

pub mod structured;

pub use structured::compiled::{CompileConfig, CompileError, CompiledJsonGrammar};
pub use structured::graph::{GraphError, PdaGraph};
pub use structured::mask::{MaskError, NodeMask};
pub use structured::matcher::JsonMatcher;
pub use structured::state::JsonState;
pub use structured::tokenizer::{SpecialToken, TokenizerInfo, VocabType, Vocabulary};
