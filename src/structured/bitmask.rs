//! Token bitmasks.
//!
//! A bitmask is a packed `[u32]` where bit `i` indicates whether token `i` is
//! allowed. Bit 1 = allowed, bit 0 = rejected. [`TokenBitmask`] owns one; the
//! free functions work on borrowed sampler buffers.

/// Compute the number of `u32` words needed for a bitmask of `vocab_size` tokens.
pub fn bitmask_size(vocab_size: usize) -> usize {
    vocab_size.div_ceil(32)
}

/// Get bit `i` from the bitmask. Returns true if the token is allowed.
#[inline]
pub fn get_bit(bitmask: &[u32], i: usize) -> bool {
    (bitmask[i / 32] >> (i % 32)) & 1 == 1
}

/// Set logits of rejected tokens to `-inf`.
///
/// Logits past the end of the bitmask are rejected as well.
pub fn apply_token_bitmask_inplace(logits: &mut [f32], bitmask: &[u32]) {
    let covered = bitmask.len() * 32;
    for (i, logit) in logits.iter_mut().enumerate() {
        if i >= covered || !get_bit(bitmask, i) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// An owned, fixed-size token bitmask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBitmask {
    words: Vec<u32>,
    vocab_size: usize,
}

impl TokenBitmask {
    /// All tokens rejected.
    pub fn new(vocab_size: usize) -> Self {
        Self {
            words: vec![0; bitmask_size(vocab_size)],
            vocab_size,
        }
    }

    pub fn from_token_ids(vocab_size: usize, ids: impl IntoIterator<Item = u32>) -> Self {
        let mut bm = Self::new(vocab_size);
        for id in ids {
            bm.insert(id);
        }
        bm
    }

    /// Mark `token_id` allowed. Ids outside the vocabulary are ignored.
    #[inline]
    pub fn insert(&mut self, token_id: u32) {
        let i = token_id as usize;
        if i < self.vocab_size {
            self.words[i / 32] |= 1 << (i % 32);
        }
    }

    #[inline]
    pub fn contains(&self, token_id: u32) -> bool {
        let i = token_id as usize;
        i < self.vocab_size && get_bit(&self.words, i)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Copy into a sampler-owned buffer, zeroing any extra trailing words.
    ///
    /// # Panics
    /// Panics if `out` is shorter than [`bitmask_size`] of the vocabulary.
    pub fn copy_into(&self, out: &mut [u32]) {
        let n = self.words.len();
        out[..n].copy_from_slice(&self.words);
        out[n..].fill(0);
    }
}
