//! Shared vocabularies and helpers.

use anyhow::{Result, bail};

use pie_json_pda::structured::compiled::{CompileConfig, CompiledJsonGrammar};
use pie_json_pda::structured::tokenizer::{SpecialToken, TokenizerInfo, Vocabulary};

pub const BOS: u32 = 0;
pub const EOS: u32 = 1;

/// A small vocabulary mixing single runes, multi-rune tokens that straddle
/// several transitions, whitespace variants and junk.
pub const JSON_VOCAB: &[&str] = &[
    "<s>", "</s>", "", "\"\"", "{", "}", "[", "]", ":", ",", "\"", " ", "\n", "\t", "\\", "/",
    "a", "b", "key", "name", "1", "2", "12", "-3.5e+2", "true", "false", "null", "tru", "nul",
    "{\"", "\":", "\": ", "\",", "},", "},{", "}}", "]}", ",\"", ", \"", " \"", "\n\"", "\n\t",
    "\n}", "[1", "1,2", "1]", "\"a\"", "\"a\",", "hello world", "é", "{}", "[]", "x",
];

pub fn json_vocab() -> TokenizerInfo {
    TokenizerInfo::from_raw(JSON_VOCAB)
        .with_special_tokens(&[BOS], &[EOS])
        .unwrap()
}

pub fn compile(vocab: &TokenizerInfo) -> CompiledJsonGrammar {
    CompiledJsonGrammar::new(vocab, &CompileConfig::default()).unwrap()
}

pub fn token_id(text: &str) -> u32 {
    JSON_VOCAB
        .iter()
        .position(|&t| t == text)
        .unwrap_or_else(|| panic!("{text:?} not in JSON_VOCAB")) as u32
}

/// A vocabulary that fails to decode one id.
pub struct BrokenVocab {
    pub inner: TokenizerInfo,
    pub broken_id: u32,
}

impl Vocabulary for BrokenVocab {
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        if token_id == self.broken_id {
            bail!("invalid utf-8 in token {}", token_id);
        }
        self.inner.decode(token_id)
    }

    fn is_special(&self, token_id: u32, kind: SpecialToken) -> bool {
        self.inner.is_special(token_id, kind)
    }
}
