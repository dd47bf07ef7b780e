//! Per-state token mask pre-computation.
//!
//! For every automaton state, every vocabulary token is walked rune by rune
//! through [`advance_rune`](crate::structured::validator::advance_rune). Tokens
//! that survive the whole walk are recorded with the state they land in, so a
//! single multi-rune token can skip ahead across several transitions.
//!
//! Cost is O(states × V × token length). Two things keep it bounded:
//! - states are processed in parallel on the current rayon pool;
//! - tokens are visited in lexicographic order and a rejected token skips its
//!   whole trie subtree, since every extension of a rejected text is rejected
//!   along the same path.

use rayon::prelude::*;
use thiserror::Error;

use crate::structured::bitmask::TokenBitmask;
use crate::structured::graph::PdaGraph;
use crate::structured::state::JsonState;
use crate::structured::tokenizer::{SpecialToken, Vocabulary, build_trie_subtree_ranges};
use crate::structured::validator::validate_token;

/// Degenerate empty-string literal, never emitted as a single token.
const EMPTY_STRING_LITERAL: &str = "\"\"";

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("failed to decode token {token_id}")]
    Decode {
        token_id: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("vocabulary of {0} tokens does not fit a u32 token id")]
    VocabTooLarge(usize),
    #[error("failed to build mask worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// ---------------------------------------------------------------------------
// Decoded vocabulary
// ---------------------------------------------------------------------------

/// The whole vocabulary decoded once, sorted for trie-skipping scans.
pub struct DecodedVocab {
    texts: Vec<String>,
    /// False for BOS/EOS markers, empty texts and the `""` literal.
    candidate: Vec<bool>,
    /// Token ids ordered by decoded text, ties broken by id.
    sorted: Vec<u32>,
    /// For `sorted[i]`, the first sorted index whose text does not extend it.
    trie_end: Vec<usize>,
}

impl DecodedVocab {
    /// Decode every id in parallel. The first failure aborts the rest.
    pub fn decode<V: Vocabulary + ?Sized>(vocab: &V) -> Result<Self, MaskError> {
        let vocab_size = vocab.vocab_size();
        let n = u32::try_from(vocab_size).map_err(|_| MaskError::VocabTooLarge(vocab_size))?;

        let texts = (0..n)
            .into_par_iter()
            .map(|token_id| {
                vocab.decode(token_id).map_err(|e| MaskError::Decode {
                    token_id,
                    source: e.into(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let candidate = texts
            .par_iter()
            .enumerate()
            .map(|(id, text)| {
                let id = id as u32;
                !(text.is_empty()
                    || text == EMPTY_STRING_LITERAL
                    || vocab.is_special(id, SpecialToken::Bos)
                    || vocab.is_special(id, SpecialToken::Eos))
            })
            .collect();

        let mut sorted: Vec<u32> = (0..n).collect();
        sorted.par_sort_unstable_by(|&a, &b| {
            texts[a as usize].cmp(&texts[b as usize]).then(a.cmp(&b))
        });

        let sorted_texts: Vec<&str> = sorted.iter().map(|&id| texts[id as usize].as_str()).collect();
        let trie_end = build_trie_subtree_ranges(&sorted_texts);

        Ok(Self {
            texts,
            candidate,
            sorted,
            trie_end,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.texts.len()
    }

    pub fn text(&self, token_id: u32) -> &str {
        &self.texts[token_id as usize]
    }

    /// Whether the token is ever considered for a mask.
    pub fn is_candidate(&self, token_id: u32) -> bool {
        self.candidate[token_id as usize]
    }

    pub fn num_candidates(&self) -> usize {
        self.candidate.iter().filter(|&&c| c).count()
    }
}

// ---------------------------------------------------------------------------
// Node masks
// ---------------------------------------------------------------------------

/// The tokens legal from one state, each with its landing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMask {
    state: JsonState,
    /// Sorted by token id.
    tokens: Vec<(u32, JsonState)>,
    bitmask: TokenBitmask,
}

impl NodeMask {
    fn new(state: JsonState, mut tokens: Vec<(u32, JsonState)>, vocab_size: usize) -> Self {
        tokens.sort_unstable_by_key(|&(id, _)| id);
        let bitmask = TokenBitmask::from_token_ids(vocab_size, tokens.iter().map(|&(id, _)| id));
        Self {
            state,
            tokens,
            bitmask,
        }
    }

    pub fn state(&self) -> JsonState {
        self.state
    }

    /// Landing state after emitting `token_id`, or `None` if it is illegal here.
    #[inline]
    pub fn next_state(&self, token_id: u32) -> Option<JsonState> {
        self.tokens
            .binary_search_by_key(&token_id, |&(id, _)| id)
            .ok()
            .map(|i| self.tokens[i].1)
    }

    #[inline]
    pub fn contains(&self, token_id: u32) -> bool {
        self.bitmask.contains(token_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// No token can be emitted from this state. Not an error: the sampler
    /// decides how to recover.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// `(token_id, landing_state)` pairs in token id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, JsonState)> + '_ {
        self.tokens.iter().copied()
    }

    pub fn bitmask(&self) -> &TokenBitmask {
        &self.bitmask
    }
}

// ---------------------------------------------------------------------------
// Pre-computation
// ---------------------------------------------------------------------------

/// Compute one mask per state, in [`JsonState::ALL`] order.
pub fn precompute_masks(graph: &PdaGraph, vocab: &DecodedVocab, prefix_pruning: bool) -> Vec<NodeMask> {
    JsonState::ALL
        .par_iter()
        .map(|&state| compute_node_mask(graph, state, vocab, prefix_pruning))
        .collect()
}

/// Classify the whole vocabulary against one state.
pub fn compute_node_mask(
    graph: &PdaGraph,
    from: JsonState,
    vocab: &DecodedVocab,
    prefix_pruning: bool,
) -> NodeMask {
    let mut tokens = Vec::new();
    let mut visited = 0usize;
    let mut i = 0;

    while i < vocab.sorted.len() {
        let token_id = vocab.sorted[i];
        if !vocab.is_candidate(token_id) {
            i += 1;
            continue;
        }
        visited += 1;

        match validate_token(graph, from, vocab.text(token_id)) {
            Some(landing) => {
                tokens.push((token_id, landing));
                i += 1;
            }
            None if prefix_pruning => i = vocab.trie_end[i],
            None => i += 1,
        }
    }

    tracing::debug!(
        state = %from,
        allowed = tokens.len(),
        visited,
        "computed node mask"
    );

    NodeMask::new(from, tokens, vocab.vocab_size())
}
