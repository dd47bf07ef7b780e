//! The JSON automaton paired with its precomputed token masks.
//!
//! `CompiledJsonGrammar` is built once per vocabulary and shared by every
//! [`JsonMatcher`](crate::structured::matcher::JsonMatcher) through an `Arc`.
//! After construction nothing in it is mutated, so any number of generation
//! sessions may read it concurrently.

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex, Weak};
use std::time::Instant;

use anyhow::ensure;
use lru::LruCache;
use thiserror::Error;

use crate::structured::graph::{GraphError, PdaGraph};
use crate::structured::mask::{DecodedVocab, MaskError, NodeMask, precompute_masks};
use crate::structured::state::JsonState;
use crate::structured::tokenizer::Vocabulary;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error("invalid compile config: {0:#}")]
    Config(anyhow::Error),
}

/// Knobs for mask pre-computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
    /// Skip trie subtrees under rejected tokens. Never changes the result.
    pub prefix_pruning: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            prefix_pruning: true,
        }
    }
}

impl CompileConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(n) = self.num_threads {
            ensure!(n > 0, "num_threads must be positive, got {n}");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compiled grammar
// ---------------------------------------------------------------------------

/// The immutable (graph, vocabulary masks) pairing.
pub struct CompiledJsonGrammar {
    graph: Arc<PdaGraph>,
    /// Indexed by `JsonState::index()`.
    masks: Vec<NodeMask>,
    vocab_size: usize,
}

impl CompiledJsonGrammar {
    /// Build the automaton and classify the whole vocabulary against it.
    ///
    /// Fails without exposing any partial mask if the vocabulary cannot be
    /// decoded.
    pub fn new<V: Vocabulary + ?Sized>(vocab: &V, config: &CompileConfig) -> Result<Self, CompileError> {
        let graph = Arc::new(PdaGraph::build()?);
        Self::with_graph(graph, vocab, config)
    }

    /// Compile masks for an already built graph.
    pub fn with_graph<V: Vocabulary + ?Sized>(
        graph: Arc<PdaGraph>,
        vocab: &V,
        config: &CompileConfig,
    ) -> Result<Self, CompileError> {
        config.validate().map_err(CompileError::Config)?;
        let started = Instant::now();

        let (decoded, masks) = match config.num_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("json-mask-{i}"))
                    .build()
                    .map_err(MaskError::from)?;
                pool.install(|| compute(&graph, vocab, config.prefix_pruning))?
            }
            None => compute(&graph, vocab, config.prefix_pruning)?,
        };

        let compiled = Self {
            graph,
            masks,
            vocab_size: decoded.vocab_size(),
        };

        tracing::info!(
            vocab_size = compiled.vocab_size,
            candidates = decoded.num_candidates(),
            mask_entries = compiled.total_mask_entries(),
            empty_states = ?compiled.empty_states(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled JSON token masks"
        );
        Ok(compiled)
    }

    /// Entry state for a fresh generation.
    pub fn start(&self) -> JsonState {
        self.graph.start()
    }

    pub fn graph(&self) -> &PdaGraph {
        &self.graph
    }

    #[inline(always)]
    pub fn mask(&self, state: JsonState) -> &NodeMask {
        &self.masks[state.index()]
    }

    pub fn masks(&self) -> &[NodeMask] {
        &self.masks
    }

    /// Landing state after emitting `token_id` from `state`.
    #[inline]
    pub fn next_state(&self, state: JsonState, token_id: u32) -> Option<JsonState> {
        self.mask(state).next_state(token_id)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn total_mask_entries(&self) -> usize {
        self.masks.iter().map(NodeMask::len).sum()
    }

    /// States from which no token in this vocabulary is legal.
    pub fn empty_states(&self) -> Vec<JsonState> {
        self.masks
            .iter()
            .filter(|m| m.is_empty())
            .map(NodeMask::state)
            .collect()
    }
}

fn compute<V: Vocabulary + ?Sized>(
    graph: &PdaGraph,
    vocab: &V,
    prefix_pruning: bool,
) -> Result<(DecodedVocab, Vec<NodeMask>), MaskError> {
    let decoded = DecodedVocab::decode(vocab)?;
    let masks = precompute_masks(graph, &decoded, prefix_pruning);
    Ok((decoded, masks))
}

// ---------------------------------------------------------------------------
// Compilation cache
// ---------------------------------------------------------------------------

/// Maximum number of compiled vocabularies to keep.
const CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(16).unwrap();

struct CacheEntry {
    /// Detects a dead vocabulary whose address was reused.
    vocab: Weak<dyn Vocabulary + Send>,
    compiled: Arc<CompiledJsonGrammar>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.vocab.strong_count() > 0
    }
}

/// Global LRU cache keyed by vocabulary `Arc` identity.
static CACHE: LazyLock<Mutex<LruCache<usize, CacheEntry>>> =
    LazyLock::new(|| Mutex::new(LruCache::new(CACHE_CAPACITY)));

impl CompiledJsonGrammar {
    /// Get the masks for `vocab` from cache, or compile and cache them.
    ///
    /// Two calls with the same `Arc` share one `Arc<CompiledJsonGrammar>`.
    /// Compilation runs outside the cache lock.
    pub fn get_or_compile<V>(vocab: &Arc<V>, config: &CompileConfig) -> Result<Arc<Self>, CompileError>
    where
        V: Vocabulary + Send + 'static,
    {
        config.validate().map_err(CompileError::Config)?;
        let key = Arc::as_ptr(vocab) as *const () as usize;

        if let Some(compiled) = lookup(key) {
            tracing::debug!(vocab = key, "JSON mask cache hit");
            return Ok(compiled);
        }

        let compiled = Arc::new(Self::new(&**vocab, config)?);

        let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = cache.get(&key).filter(|e| e.is_live()) {
            // Another caller finished first; keep theirs.
            return Ok(entry.compiled.clone());
        }
        let weak = Arc::downgrade(vocab);
        let weak: Weak<dyn Vocabulary + Send> = weak;
        cache.put(
            key,
            CacheEntry {
                vocab: weak,
                compiled: compiled.clone(),
            },
        );
        Ok(compiled)
    }
}

fn lookup(key: usize) -> Option<Arc<CompiledJsonGrammar>> {
    let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    let hit = cache
        .get(&key)
        .map(|entry| entry.is_live().then(|| entry.compiled.clone()));
    match hit {
        Some(Some(compiled)) => Some(compiled),
        Some(None) => {
            cache.pop(&key);
            None
        }
        None => None,
    }
}
