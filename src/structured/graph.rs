//! Hand-wired JSON pushdown automaton.
//!
//! `PdaGraph` owns one [`PdaNode`] per [`JsonState`] in a flat arena indexed
//! by the state discriminant. Edges store the destination state rather than a
//! reference, so the cyclic, shared-target structure of the grammar (string
//! bodies looping on themselves, every value ending in the same comma node)
//! needs no shared ownership.
//!
//! The graph is vocabulary-independent and immutable once built; token masks
//! are layered on top by [`crate::structured::mask`].

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::structured::state::{BOOL_RUNES, JsonState, NULL_RUNES, NUMBER_RUNES};

/// Wiring errors detected when the graph is built.
///
/// These indicate a programming error in the builder, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("no node registered for state {0}")]
    MissingState(JsonState),
    #[error("node for state {state} stored at index {index}")]
    MisplacedNode { index: usize, state: JsonState },
    #[error("edge {from} --{}--> {to} targets an unregistered state", display_rune(.rune))]
    DanglingEdge {
        from: JsonState,
        /// `None` for the any-rune sentinel edge.
        rune: Option<char>,
        to: JsonState,
    },
}

fn display_rune(rune: &Option<char>) -> String {
    match rune {
        Some(r) => format!("{r:?}"),
        None => "<any>".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// One automaton state and its outgoing single-rune transitions.
#[derive(Debug, Clone)]
pub struct PdaNode {
    state: JsonState,
    edges: FxHashMap<char, JsonState>,
    /// Sentinel transition taken by any rune without an explicit edge.
    any_rune: Option<JsonState>,
}

impl PdaNode {
    pub fn new(state: JsonState) -> Self {
        Self {
            state,
            edges: FxHashMap::default(),
            any_rune: None,
        }
    }

    pub fn state(&self) -> JsonState {
        self.state
    }

    /// Explicit transition on `r`, ignoring the sentinel.
    #[inline]
    pub fn edge(&self, r: char) -> Option<JsonState> {
        self.edges.get(&r).copied()
    }

    #[inline]
    pub fn any_rune(&self) -> Option<JsonState> {
        self.any_rune
    }

    /// Explicit transitions, sorted by rune.
    pub fn edges(&self) -> Vec<(char, JsonState)> {
        let mut edges: Vec<_> = self.edges.iter().map(|(&r, &s)| (r, s)).collect();
        edges.sort_unstable();
        edges
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len() + usize::from(self.any_rune.is_some())
    }

    fn targets(&self) -> impl Iterator<Item = (Option<char>, JsonState)> + '_ {
        self.edges
            .iter()
            .map(|(&r, &s)| (Some(r), s))
            .chain(self.any_rune.map(|s| (None, s)))
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The JSON automaton: a node arena keyed by [`JsonState`].
#[derive(Debug, Clone)]
pub struct PdaGraph {
    nodes: Vec<PdaNode>,
}

impl PdaGraph {
    /// Build and validate the JSON automaton.
    pub fn build() -> Result<Self, GraphError> {
        let mut b = GraphBuilder::new();
        b.wire_json();
        b.build()
    }

    /// Validate an arbitrary node arena. Used to check hand-assembled graphs.
    pub fn from_nodes(nodes: Vec<PdaNode>) -> Result<Self, GraphError> {
        validate(&nodes)?;
        Ok(Self { nodes })
    }

    /// Entry point for a fresh generation.
    pub fn start(&self) -> JsonState {
        JsonState::Start
    }

    #[inline(always)]
    pub fn node(&self, state: JsonState) -> &PdaNode {
        &self.nodes[state.index()]
    }

    pub fn nodes(&self) -> &[PdaNode] {
        &self.nodes
    }

    pub fn num_edges(&self) -> usize {
        self.nodes.iter().map(PdaNode::num_edges).sum()
    }

    /// States no path from [`JsonState::Start`] reaches.
    ///
    /// They still get masks: a caller may seed a matcher at any state.
    pub fn unreachable_states(&self) -> Vec<JsonState> {
        let mut seen = [false; JsonState::COUNT];
        let mut stack = vec![self.start()];
        seen[self.start().index()] = true;
        while let Some(state) = stack.pop() {
            for (_, next) in self.node(state).targets() {
                if !seen[next.index()] {
                    seen[next.index()] = true;
                    stack.push(next);
                }
            }
        }
        JsonState::ALL
            .iter()
            .copied()
            .filter(|s| !seen[s.index()])
            .collect()
    }
}

fn validate(nodes: &[PdaNode]) -> Result<(), GraphError> {
    for (index, node) in nodes.iter().enumerate() {
        if node.state.index() != index {
            return Err(GraphError::MisplacedNode {
                index,
                state: node.state,
            });
        }
    }
    for node in nodes {
        for (rune, to) in node.targets() {
            if to.index() >= nodes.len() {
                return Err(GraphError::DanglingEdge {
                    from: node.state,
                    rune,
                    to,
                });
            }
        }
    }
    if let Some(&missing) = JsonState::ALL.get(nodes.len()) {
        return Err(GraphError::MissingState(missing));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Wires single-rune edges between the nodes of a fresh arena.
struct GraphBuilder {
    nodes: Vec<PdaNode>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            nodes: JsonState::ALL.iter().map(|&s| PdaNode::new(s)).collect(),
        }
    }

    fn connect(&mut self, from: JsonState, r: char, to: JsonState) {
        self.nodes[from.index()].edges.insert(r, to);
    }

    fn connect_all(&mut self, from: JsonState, runes: &[char], to: JsonState) {
        for &r in runes {
            self.connect(from, r, to);
        }
    }

    fn connect_any(&mut self, from: JsonState, to: JsonState) {
        self.nodes[from.index()].any_rune = Some(to);
    }

    /// Everywhere a value may terminate.
    fn add_ends(&mut self, from: JsonState) {
        self.connect(from, ',', JsonState::InComma);
        self.connect(from, '}', JsonState::InObjectEnd);
        self.connect(from, ']', JsonState::InListEnd);
    }

    /// Everywhere a value may begin.
    fn add_value_connections(&mut self, from: JsonState) {
        self.connect(from, '"', JsonState::InString);
        self.add_scalar_connections(from);
    }

    /// Value starts other than strings.
    fn add_scalar_connections(&mut self, from: JsonState) {
        self.connect_all(from, &NUMBER_RUNES, JsonState::InNumber);
        self.connect(from, 't', JsonState::InBool);
        self.connect(from, 'f', JsonState::InBool);
        self.connect(from, 'n', JsonState::InNull);
    }

    fn wire_json(&mut self) {
        use JsonState::*;

        self.connect(Start, '{', InObject);
        self.connect(Start, '[', InList);

        self.connect(InObject, '"', InObjectKey);
        self.connect(InObject, '\n', InNewline);
        self.connect(InObject, ' ', InObjSpace);

        self.connect(InNewline, '"', InObjectKey);
        self.connect(InNewline, '\t', InTab);
        self.connect(InNewline, '}', InObjectEnd);

        self.connect(InTab, '"', InObjectKey);

        self.connect_any(InObjectKey, InObjectKey);
        self.connect(InObjectKey, '"', InObjectKeyEnd);

        self.connect(InObjectKeyEnd, ':', InColon);

        self.connect(InObjectEnd, ',', InComma);
        self.connect(InObjectEnd, '}', InObjectEnd);

        // InColon and InSpace differ on purpose: only InSpace closes an object.
        self.connect(InColon, ' ', InSpace);
        self.connect(InColon, '[', InList);
        self.connect(InColon, '{', InObject);
        self.add_value_connections(InColon);

        self.connect(InSpace, '[', InList);
        self.connect(InSpace, '{', InObject);
        self.add_value_connections(InSpace);
        self.connect(InSpace, '}', InObjectEnd);

        self.connect_any(InString, InString);
        self.connect(InString, '"', InStringEnd);
        self.add_ends(InStringEnd);

        // TODO: bound the number of '.', 'e' and sign runes in a number.
        self.connect_all(InNumber, &NUMBER_RUNES, InNumber);
        self.add_ends(InNumber);

        self.connect_all(InBool, &BOOL_RUNES, InBool);
        self.add_ends(InBool);
        self.connect(InBool, ' ', InSpace);
        self.connect(InBool, '\n', InNewline);

        self.connect_all(InNull, &NULL_RUNES, InNull);
        self.add_ends(InNull);

        self.connect(InList, ',', InComma);
        self.connect(InList, '{', InObject);
        self.connect(InList, ' ', InList);
        self.connect(InList, '\n', InList);
        self.connect(InList, ']', InListEnd);
        self.add_value_connections(InList);

        self.connect(InListComma, ' ', InListComma);
        self.connect(InListComma, '{', InObject);
        self.connect(InListComma, '\n', InList);
        self.add_value_connections(InListComma);

        self.connect(InListObjectEnd, ',', InListComma);
        self.connect(InListObjectEnd, ']', InListEnd);

        self.connect(InListEnd, '}', InObjectEnd);
        self.connect(InListEnd, ',', InComma);

        // A value's trailing comma cannot tell an object from a list, so the
        // comma node and the space after it also admit scalar list elements.
        // '"' stays a key.
        self.connect(InComma, '{', InObject);
        self.connect(InComma, '\n', InList);
        self.connect(InComma, '\t', InTab);
        self.connect(InComma, '"', InObjectKey);
        self.connect(InComma, ' ', InObjSpace);
        self.add_scalar_connections(InComma);

        self.connect(InObjSpace, '"', InObjectKey);
        self.connect(InObjSpace, '\n', InNewline);
        self.add_scalar_connections(InObjSpace);
    }

    fn build(self) -> Result<PdaGraph, GraphError> {
        let graph = PdaGraph::from_nodes(self.nodes)?;
        tracing::debug!(
            states = graph.nodes.len(),
            edges = graph.num_edges(),
            unreachable = ?graph.unreachable_states(),
            "built JSON PDA graph"
        );
        Ok(graph)
    }
}
