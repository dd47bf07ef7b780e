//! Per-generation cursor over a [`CompiledJsonGrammar`].
//!
//! `JsonMatcher` is what the sampler holds between steps: it knows the
//! current automaton state, fills the next-token bitmask from that state's
//! precomputed mask, and advances on accepted tokens. Every lookup is a
//! binary search or a word copy; nothing is validated rune by rune here.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::structured::compiled::CompiledJsonGrammar;
use crate::structured::mask::NodeMask;
use crate::structured::state::JsonState;

pub struct JsonMatcher {
    compiled: Arc<CompiledJsonGrammar>,
    state: JsonState,
    /// States before each accepted token, most recent last, for rollback.
    history: VecDeque<JsonState>,
    /// Maximum number of tokens that can be rolled back.
    max_rollback_tokens: usize,
}

impl JsonMatcher {
    pub fn new(compiled: Arc<CompiledJsonGrammar>, max_rollback_tokens: usize) -> Self {
        let state = compiled.start();
        Self {
            compiled,
            state,
            history: VecDeque::new(),
            max_rollback_tokens,
        }
    }

    pub fn current_state(&self) -> JsonState {
        self.state
    }

    /// The mask of the current state.
    pub fn mask(&self) -> &NodeMask {
        self.compiled.mask(self.state)
    }

    /// False when no token is legal from here; the caller decides whether to
    /// force EOS or fail the request.
    pub fn has_legal_continuation(&self) -> bool {
        !self.mask().is_empty()
    }

    /// Write the allowed-token bitmask for the next step into `bitmask`.
    ///
    /// # Panics
    /// Panics if `bitmask` is shorter than `bitmask_size(vocab_size)`.
    pub fn fill_next_token_bitmask(&self, bitmask: &mut [u32]) {
        self.mask().bitmask().copy_into(bitmask);
    }

    /// Advance on `token_id`. Returns false, leaving the state untouched, if
    /// the token is not in the current mask.
    pub fn accept_token(&mut self, token_id: u32) -> bool {
        let Some(next) = self.compiled.next_state(self.state, token_id) else {
            tracing::debug!(state = %self.state, token_id, "rejected token");
            return false;
        };
        self.push_history(self.state);
        self.state = next;
        true
    }

    /// Accept a run of tokens atomically: on any rejection nothing changes.
    pub fn accept_tokens(&mut self, token_ids: &[u32]) -> bool {
        let mut state = self.state;
        let mut trail = Vec::with_capacity(token_ids.len());
        for &token_id in token_ids {
            match self.compiled.next_state(state, token_id) {
                Some(next) => {
                    trail.push(state);
                    state = next;
                }
                None => return false,
            }
        }
        for prev in trail {
            self.push_history(prev);
        }
        self.state = state;
        true
    }

    /// Undo the last `num_tokens` accepted tokens.
    ///
    /// Returns false, without changing anything, if fewer than `num_tokens`
    /// are retained.
    pub fn rollback(&mut self, num_tokens: usize) -> bool {
        if num_tokens > self.history.len() {
            return false;
        }
        for _ in 0..num_tokens {
            if let Some(prev) = self.history.pop_back() {
                self.state = prev;
            }
        }
        true
    }

    /// Back to the start state with an empty history.
    pub fn reset(&mut self) {
        self.state = self.compiled.start();
        self.history.clear();
    }

    fn push_history(&mut self, state: JsonState) {
        if self.max_rollback_tokens == 0 {
            return;
        }
        if self.history.len() == self.max_rollback_tokens {
            self.history.pop_front();
        }
        self.history.push_back(state);
    }
}
