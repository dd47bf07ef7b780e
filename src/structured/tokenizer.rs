//! Vocabulary handling.
//!
//! Mask precomputation only needs three things from a tokenizer: how many ids
//! exist, the decoded text of each id, and whether an id is a BOS/EOS marker.
//! That is the [`Vocabulary`] trait. [`TokenizerInfo`] is the stock
//! implementation over a raw encoded vocabulary:
//! - Raw tokens, used as-is
//! - SentencePiece byte-fallback tokens (`<0xAB>`, `▁`)
//! - GPT-2 byte-level BPE tokens
//!
//! Decoded texts are approximations for bytes that are not valid UTF-8 on
//! their own: a byte-fallback token `<0x80>`..`<0xFF>` decodes to the Latin-1
//! code point of that byte, not to a UTF-8 continuation byte. Such tokens are
//! only ever free text inside strings and keys.

use std::sync::LazyLock;

use anyhow::{Result, bail, ensure};

/// Special-token classes that are never legal JSON continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialToken {
    Bos,
    Eos,
}

/// The tokenizer surface consumed by mask precomputation.
///
/// `decode` must be deterministic and total over `0..vocab_size()`; an error
/// for any id aborts precomputation.
pub trait Vocabulary: Sync {
    fn vocab_size(&self) -> usize;

    fn decode(&self, token_id: u32) -> Result<String>;

    fn is_special(&self, token_id: u32, kind: SpecialToken) -> bool;
}

/// The type of vocabulary encoding used by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabType {
    /// Tokens are used as-is, no decoding needed.
    Raw,
    /// Byte fallback encoding: `<0xAB>` → byte 0xAB, `▁` (U+2581) → space.
    /// Used by SentencePiece tokenizers (e.g., Llama).
    ByteFallback,
    /// Byte-level BPE: each byte is mapped to a unique Unicode character.
    /// Used by GPT-2/GPT-3 style tokenizers.
    ByteLevel,
}

/// Decoded vocabulary plus BOS/EOS ids.
#[derive(Debug, Clone)]
pub struct TokenizerInfo {
    /// decoded_vocab[token_id] = decoded string.
    decoded_vocab: Vec<String>,
    /// May exceed decoded_vocab.len(); the extra ids are padding and decode to "".
    vocab_size: usize,
    vocab_type: VocabType,
    bos_token_ids: Vec<u32>,
    eos_token_ids: Vec<u32>,
}

impl TokenizerInfo {
    /// Create a new TokenizerInfo from an encoded vocabulary.
    ///
    /// - `encoded_vocab`: The raw token strings from the tokenizer.
    /// - `vocab_type`: How to decode token strings.
    /// - `vocab_size`: Total vocabulary size (if larger than encoded_vocab.len(), extra tokens are
    ///   treated as padding).
    pub fn new(
        encoded_vocab: &[String],
        vocab_type: VocabType,
        vocab_size: Option<usize>,
    ) -> Result<Self> {
        let vocab_size = vocab_size.unwrap_or(encoded_vocab.len());
        ensure!(
            vocab_size >= encoded_vocab.len(),
            "vocab_size ({}) must be >= encoded_vocab.len() ({})",
            vocab_size,
            encoded_vocab.len()
        );
        ensure!(
            u32::try_from(vocab_size).is_ok(),
            "vocab_size ({vocab_size}) does not fit a u32 token id"
        );

        let decoded_vocab = encoded_vocab
            .iter()
            .map(|tok| decode_token(tok, vocab_type))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            decoded_vocab,
            vocab_size,
            vocab_type,
            bos_token_ids: Vec::new(),
            eos_token_ids: Vec::new(),
        })
    }

    /// Shorthand for a raw vocabulary, mostly for tests and tooling.
    pub fn from_raw<S: AsRef<str>>(vocab: &[S]) -> Self {
        Self {
            decoded_vocab: vocab.iter().map(|s| s.as_ref().to_owned()).collect(),
            vocab_size: vocab.len(),
            vocab_type: VocabType::Raw,
            bos_token_ids: Vec::new(),
            eos_token_ids: Vec::new(),
        }
    }

    /// Mark BOS/EOS ids. Ids outside the vocabulary are rejected.
    pub fn with_special_tokens(mut self, bos: &[u32], eos: &[u32]) -> Result<Self> {
        for &id in bos.iter().chain(eos) {
            if id as usize >= self.vocab_size {
                bail!("special token id {} out of range (vocab_size {})", id, self.vocab_size);
            }
        }
        self.bos_token_ids = sorted_ids(bos);
        self.eos_token_ids = sorted_ids(eos);
        Ok(self)
    }

    pub fn vocab_type(&self) -> VocabType {
        self.vocab_type
    }

    pub fn decoded_vocab(&self) -> &[String] {
        &self.decoded_vocab
    }

    pub fn bos_token_ids(&self) -> &[u32] {
        &self.bos_token_ids
    }

    pub fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }

    /// Get the decoded string for a token ID.
    pub fn decode_token(&self, token_id: u32) -> Option<&str> {
        self.decoded_vocab.get(token_id as usize).map(|s| s.as_str())
    }
}

impl Vocabulary for TokenizerInfo {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        if token_id as usize >= self.vocab_size {
            bail!("token id {} out of range (vocab_size {})", token_id, self.vocab_size);
        }
        Ok(self.decode_token(token_id).unwrap_or_default().to_owned())
    }

    fn is_special(&self, token_id: u32, kind: SpecialToken) -> bool {
        let ids = match kind {
            SpecialToken::Bos => &self.bos_token_ids,
            SpecialToken::Eos => &self.eos_token_ids,
        };
        ids.binary_search(&token_id).is_ok()
    }
}

fn sorted_ids(ids: &[u32]) -> Vec<u32> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Decode a single token according to the vocabulary type.
fn decode_token(encoded: &str, vocab_type: VocabType) -> Result<String> {
    match vocab_type {
        VocabType::Raw => Ok(encoded.to_string()),
        VocabType::ByteFallback => decode_byte_fallback(encoded),
        VocabType::ByteLevel => Ok(decode_byte_level(encoded)),
    }
}

/// Decode a byte-fallback token (SentencePiece style).
/// `<0xAB>` → byte 0xAB, `▁` (U+2581) → space.
fn decode_byte_fallback(encoded: &str) -> Result<String> {
    if let Some(hex) = encoded
        .strip_prefix("<0x")
        .and_then(|rest| rest.strip_suffix('>'))
        .filter(|hex| hex.len() == 2)
    {
        let Ok(byte) = u8::from_str_radix(hex, 16) else {
            bail!("invalid byte fallback token: {}", encoded);
        };
        return Ok(String::from(byte as char));
    }

    Ok(encoded.replace('\u{2581}', " "))
}

/// Bytes GPT-2's `bytes_to_unicode()` moves to codepoints 256 and up, in order.
static BYTE_LEVEL_GAP: LazyLock<Vec<u8>> = LazyLock::new(|| {
    (0u8..=255).filter(|&b| !is_byte_level_identity(b as u32)).collect()
});

fn is_byte_level_identity(cp: u32) -> bool {
    matches!(cp, 0x21..=0x7E | 0xA1..=0xAC | 0xAE..=0xFF)
}

/// Decode a byte-level BPE token (GPT-2 style).
/// Characters outside the mapping are kept as UTF-8; invalid byte sequences
/// are replaced lossily.
fn decode_byte_level(encoded: &str) -> String {
    let mut bytes = Vec::with_capacity(encoded.len());
    for c in encoded.chars() {
        match byte_level_char_to_byte(c as u32) {
            Some(b) => bytes.push(b),
            None => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn byte_level_char_to_byte(cp: u32) -> Option<u8> {
    if is_byte_level_identity(cp) {
        return Some(cp as u8);
    }
    let offset = cp.checked_sub(256)?;
    BYTE_LEVEL_GAP.get(offset as usize).copied()
}

/// Trie subtree ranges over lexicographically sorted texts.
///
/// `ranges[i]` is the index of the first entry after `i` that does NOT have
/// `sorted[i]` as a prefix, so a rejected prefix lets a scan skip every
/// extension of it in one jump.
pub(crate) fn build_trie_subtree_ranges<S: AsRef<str>>(sorted: &[S]) -> Vec<usize> {
    let n = sorted.len();
    let mut ranges = vec![n; n];
    let mut stack: Vec<(usize, &str)> = Vec::new();

    for (i, s) in sorted.iter().enumerate() {
        let s = s.as_ref();
        while let Some(&(idx, prefix)) = stack.last() {
            if s.starts_with(prefix) {
                break;
            }
            ranges[idx] = i;
            stack.pop();
        }
        stack.push((i, s));
    }

    ranges
}
