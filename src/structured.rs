//! JSON-constrained LLM token generation.
//!
//! This keeps language model output syntactically valid JSON by restricting,
//! at every step, which vocabulary tokens the sampler may pick. The grammar is
//! a hand-wired pushdown automaton over single runes; the expensive part,
//! classifying every token against every automaton state, happens once per
//! vocabulary before generation starts.
//!
//! # Usage
//!
//! The typical flow is:
//!
//! 1. **Wrap the vocabulary** in a [`tokenizer::Vocabulary`] (e.g. [`tokenizer::TokenizerInfo`])
//! 2. **Compile** the automaton against it (builds the graph + per-state token masks)
//! 3. **Create a matcher** per generation
//! 4. **Loop**: `fill_next_token_bitmask` → mask logits → sample → `accept_token`
//!
//! ```rust
//! use std::sync::Arc;
//! use pie_json_pda::structured::bitmask;
//! use pie_json_pda::structured::compiled::{CompileConfig, CompiledJsonGrammar};
//! use pie_json_pda::structured::matcher::JsonMatcher;
//! use pie_json_pda::structured::tokenizer::TokenizerInfo;
//!
//! let vocab = Arc::new(TokenizerInfo::from_raw(&["{\"", "name", "\": ", "\"pie\"", "}", "hello"]));
//! let compiled = CompiledJsonGrammar::get_or_compile(&vocab, &CompileConfig::default()).unwrap();
//! let mut matcher = JsonMatcher::new(compiled, 8);
//!
//! let mut bm = vec![0u32; bitmask::bitmask_size(6)];
//! matcher.fill_next_token_bitmask(&mut bm);
//! assert!(bitmask::get_bit(&bm, 0));  // `{"` opens an object and a key
//! assert!(!bitmask::get_bit(&bm, 5)); // `hello` cannot start a document
//!
//! assert!(matcher.accept_tokens(&[0, 1, 2, 3, 4]));
//! ```
//!
//! # Known limitations
//!
//! String escapes are not modeled: backslash and `/` are refused inside
//! strings and keys, so escaped quotes cannot be produced. The automaton keeps
//! no nesting stack, so it checks local well-formedness only.
//!
//! # Modules
//!
//! - [`state`] -- Grammar states and fixed rune tables
//! - [`graph`] -- The automaton: node arena and wiring
//! - [`validator`] -- Rune-level transition check
//! - [`tokenizer`] -- Vocabulary trait and decoding
//! - [`mask`] -- Per-state token mask pre-computation
//! - [`compiled`] -- Graph + masks pairing and the compile cache
//! - [`matcher`] -- Runtime cursor (bitmask, accept, rollback)
//! - [`bitmask`] -- Token bitmask utilities

pub mod bitmask;
pub mod compiled;
pub mod graph;
pub mod mask;
pub mod matcher;
pub mod state;
pub mod tokenizer;
pub mod validator;
