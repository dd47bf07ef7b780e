//! JSON grammar states and the fixed character tables used to wire them.

use std::fmt;

/// A position in the JSON well-formedness automaton.
///
/// The discriminant doubles as the node index inside [`PdaGraph`], so the
/// declaration order here is the arena order.
///
/// [`PdaGraph`]: crate::structured::graph::PdaGraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JsonState {
    Start,
    InObject,
    InObjectKey,
    InObjectKeyEnd,
    /// Newline inside an object, before a key or the closing brace.
    InNewline,
    InTab,
    /// Space inside an object, before a key.
    InObjSpace,
    InColon,
    /// Space after a colon, before a value.
    InSpace,
    InString,
    InStringEnd,
    InNumber,
    InBool,
    InNull,
    InList,
    InListComma,
    InListObjectEnd,
    InListEnd,
    InObjectEnd,
    InComma,
}

impl JsonState {
    pub const COUNT: usize = 20;

    /// Every state, in arena order.
    pub const ALL: [JsonState; Self::COUNT] = [
        JsonState::Start,
        JsonState::InObject,
        JsonState::InObjectKey,
        JsonState::InObjectKeyEnd,
        JsonState::InNewline,
        JsonState::InTab,
        JsonState::InObjSpace,
        JsonState::InColon,
        JsonState::InSpace,
        JsonState::InString,
        JsonState::InStringEnd,
        JsonState::InNumber,
        JsonState::InBool,
        JsonState::InNull,
        JsonState::InList,
        JsonState::InListComma,
        JsonState::InListObjectEnd,
        JsonState::InListEnd,
        JsonState::InObjectEnd,
        JsonState::InComma,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// States whose content is free text: structural runes are never
    /// accepted here, everything else falls through the sentinel edge.
    #[inline]
    pub fn is_free_text(self) -> bool {
        matches!(self, JsonState::InString | JsonState::InObjectKey)
    }

    pub fn name(self) -> &'static str {
        match self {
            JsonState::Start => "start",
            JsonState::InObject => "in-object",
            JsonState::InObjectKey => "in-object-key",
            JsonState::InObjectKeyEnd => "in-object-key-end",
            JsonState::InNewline => "in-newline",
            JsonState::InTab => "in-tab",
            JsonState::InObjSpace => "in-obj-space",
            JsonState::InColon => "in-colon",
            JsonState::InSpace => "in-space",
            JsonState::InString => "in-string",
            JsonState::InStringEnd => "in-string-end",
            JsonState::InNumber => "in-number",
            JsonState::InBool => "in-bool",
            JsonState::InNull => "in-null",
            JsonState::InList => "in-list",
            JsonState::InListComma => "in-list-comma",
            JsonState::InListObjectEnd => "in-list-object-end",
            JsonState::InListEnd => "in-list-end",
            JsonState::InObjectEnd => "in-object-end",
            JsonState::InComma => "in-comma",
        }
    }
}

impl fmt::Display for JsonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// TODO: `/` is legal inside JSON strings; drop it from this table once escape
// sequences are modeled in the string states.
/// Runes with structural meaning. Each may be consumed at most once per token,
/// never inside free text, and never through a self-loop.
pub const STRUCTURAL_RUNES: [char; 8] = ['\\', '\n', '\t', '{', '}', ':', ',', '/'];

/// Runes that may begin or continue a number literal.
pub const NUMBER_RUNES: [char; 15] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', '+', 'e', 'E',
];

/// Letters of `true` and `false`.
pub const BOOL_RUNES: [char; 8] = ['t', 'r', 'u', 'e', 'f', 'a', 'l', 's'];

/// Letters of `null`.
pub const NULL_RUNES: [char; 3] = ['n', 'u', 'l'];

#[inline]
pub fn is_structural(r: char) -> bool {
    STRUCTURAL_RUNES.contains(&r)
}
