//! Rune-level transition check shared by mask precomputation and the matcher.

use crate::structured::graph::PdaGraph;
use crate::structured::state::{JsonState, STRUCTURAL_RUNES, is_structural};

/// Structural runes already consumed by the token being validated.
///
/// A token may cross each structural boundary at most once, so a text like
/// `},}` cannot slip through on the strength of each rune having an edge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedRunes(u8);

impl ConsumedRunes {
    pub fn new() -> Self {
        Self(0)
    }

    #[inline]
    fn bit(r: char) -> Option<u8> {
        STRUCTURAL_RUNES
            .iter()
            .position(|&s| s == r)
            .map(|i| 1u8 << i)
    }

    #[inline]
    pub fn contains(self, r: char) -> bool {
        Self::bit(r).is_some_and(|b| self.0 & b != 0)
    }

    #[inline]
    fn insert(&mut self, r: char) {
        if let Some(b) = Self::bit(r) {
            self.0 |= b;
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Advance `from` by one rune.
///
/// Returns the destination state, or `None` when the rune is rejected.
/// Structural runes that pass are recorded in `consumed`.
#[inline]
pub fn advance_rune(
    graph: &PdaGraph,
    from: JsonState,
    r: char,
    consumed: &mut ConsumedRunes,
) -> Option<JsonState> {
    if consumed.contains(r) {
        return None;
    }

    let structural = is_structural(r);
    if structural && from.is_free_text() {
        return None;
    }

    let node = graph.node(from);
    if let Some(next) = node.edge(r) {
        if structural {
            // A structural rune must always move the automaton.
            if next == from {
                return None;
            }
            consumed.insert(r);
        }
        return Some(next);
    }

    node.any_rune()
}

/// Walk a whole token from `from` with a fresh consumed set.
///
/// Returns the landing state if every rune is accepted.
pub fn validate_token(graph: &PdaGraph, from: JsonState, text: &str) -> Option<JsonState> {
    let mut consumed = ConsumedRunes::new();
    text.chars()
        .try_fold(from, |state, r| advance_rune(graph, state, r, &mut consumed))
}
