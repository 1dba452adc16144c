//! Parsing of shape sources and the parse-once cache.

use lru::LruCache;
use oxrdf::Graph;
use oxrdfio::{RdfFormat, RdfParser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::ShapeParseError;

/// Default number of parsed graphs kept by a [`ShapeGraphStore`].
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(128).unwrap();

/// Serialization of a shape source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeFormat {
    /// RDF/XML, the format of the XML artifacts.
    #[default]
    RdfXml,
    Turtle,
    NTriples,
}

impl ShapeFormat {
    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::RdfXml => RdfFormat::RdfXml,
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "rdf" | "xml" | "owl" | "shacl" => Some(Self::RdfXml),
            "ttl" => Some(Self::Turtle),
            "nt" => Some(Self::NTriples),
            _ => None,
        }
    }
}

impl FromStr for ShapeFormat {
    type Err = ShapeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rdfxml" | "rdf/xml" | "xml" | "rdf" => Ok(Self::RdfXml),
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            _ => Err(ShapeParseError::unsupported_format(s)),
        }
    }
}

impl fmt::Display for ShapeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RdfXml => "rdfxml",
            Self::Turtle => "turtle",
            Self::NTriples => "ntriples",
        })
    }
}

/// Shape source text together with its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeSource {
    pub text: String,
    #[serde(default)]
    pub format: ShapeFormat,
}

impl ShapeSource {
    pub fn new(text: impl Into<String>, format: ShapeFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

/// A parsed shapes graph.
#[derive(Debug, Clone)]
pub struct ShapeGraph {
    graph: Graph,
}

impl ShapeGraph {
    /// Parses shape source text. This is a pure function of its input.
    pub fn parse(text: &str, format: ShapeFormat) -> Result<Self, ShapeParseError> {
        let mut graph = Graph::new();
        for quad in RdfParser::from_format(format.rdf_format()).for_reader(text.as_bytes()) {
            graph.insert(quad?.as_ref());
        }
        Ok(Self { graph })
    }

    /// Wraps an already built graph.
    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }

    /// The underlying RDF graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

struct StoreState {
    cache: LruCache<ShapeSource, Arc<ShapeGraph>>,
    hits: u64,
    misses: u64,
}

/// Memoizes [`ShapeGraph::parse`] by exact source text, with LRU eviction.
///
/// Lookup and insertion both happen under the same lock, so concurrent callers
/// never evict twice for the same insertion. Parsing itself runs outside the lock.
pub struct ShapeGraphStore {
    state: Mutex<StoreState>,
}

impl ShapeGraphStore {
    /// Creates a store keeping at most `capacity` graphs.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                cache: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // The cache only holds derived data, a panic while holding the lock cannot corrupt it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parses a source, returning the cached graph when the same text was parsed before.
    pub fn parse(&self, source: &ShapeSource) -> Result<Arc<ShapeGraph>, ShapeParseError> {
        {
            let mut state = self.state();
            if let Some(graph) = state.cache.get(source).cloned() {
                state.hits += 1;
                debug!(format = %source.format, "shape graph cache hit");
                return Ok(graph);
            }
            state.misses += 1;
        }

        let graph = Arc::new(ShapeGraph::parse(&source.text, source.format)?);
        debug!(triples = graph.len(), format = %source.format, "parsed shape graph");

        let mut state = self.state();
        if let Some(existing) = state.cache.get(source) {
            return Ok(Arc::clone(existing));
        }
        state.cache.put(source.clone(), Arc::clone(&graph));
        Ok(graph)
    }

    /// Evicts every cached graph and resets the hit statistics.
    pub fn clear(&self) {
        let mut state = self.state();
        state.cache.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Number of cached graphs.
    pub fn len(&self) -> usize {
        self.state().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached graphs.
    pub fn capacity(&self) -> usize {
        self.state().cache.cap().get()
    }

    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub fn cache_hit_rate(&self) -> f64 {
        let state = self.state();
        let total = state.hits + state.misses;
        if total == 0 {
            0.
        } else {
            state.hits as f64 / total as f64
        }
    }
}

impl Default for ShapeGraphStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for ShapeGraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ShapeGraphStore")
            .field("len", &state.cache.len())
            .field("capacity", &state.cache.cap())
            .field("hits", &state.hits)
            .field("misses", &state.misses)
            .finish()
    }
}
