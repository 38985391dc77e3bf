//! Storage abstraction for the two vector collections.
//!
//! The [`VectorStore`] trait defines every operation the
//! [`VectorIndex`](crate::index::VectorIndex) needs over the *catalog*
//! collection (one entry per course) and the *content* collection (one
//! entry per chunk), enabling pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! A batch write must become visible to readers all at once.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CatalogEntry, ChunkMetadata, CourseChunk};

/// Conjunctive exact-match filter applied to content entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter {
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        let course_ok = self
            .course_title
            .as_deref()
            .map_or(true, |t| metadata.course_title == t);
        let lesson_ok = self
            .lesson_number
            .map_or(true, |n| metadata.lesson_number == Some(n));
        course_ok && lesson_ok
    }
}

/// A nearest-neighbor hit from the catalog collection.
#[derive(Debug, Clone)]
pub struct CatalogHit {
    pub entry: CatalogEntry,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// A nearest-neighbor hit from the content collection.
#[derive(Debug, Clone)]
pub struct ContentHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Abstract nearest-neighbor storage over the catalog and content collections.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_course`](VectorStore::insert_course) | Add a catalog entry unless the title exists |
/// | [`insert_chunks`](VectorStore::insert_chunks) | Add content entries, skipping known identities |
/// | [`query_catalog`](VectorStore::query_catalog) | Nearest catalog entries |
/// | [`query_content`](VectorStore::query_content) | Nearest content entries under a filter |
/// | [`get_course`](VectorStore::get_course) | Exact catalog lookup by title |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a catalog entry with this exact title exists.
    async fn has_course(&self, title: &str) -> Result<bool>;

    /// Store a catalog entry keyed by title.
    ///
    /// Returns `false` (and writes nothing) if the title is already present.
    async fn insert_course(&self, entry: &CatalogEntry, vector: &[f32]) -> Result<bool>;

    /// Store content entries, one vector per chunk.
    ///
    /// Chunks whose `(course_title, chunk_index)` already exists are
    /// skipped. Returns the number of entries written.
    async fn insert_chunks(&self, chunks: &[CourseChunk], vectors: &[Vec<f32>]) -> Result<usize>;

    /// Return up to `limit` catalog entries nearest to `query_vec`, closest first.
    async fn query_catalog(&self, query_vec: &[f32], limit: usize) -> Result<Vec<CatalogHit>>;

    /// Return up to `limit` content entries matching `filter`, closest first.
    async fn query_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentHit>>;

    /// Exact catalog lookup.
    async fn get_course(&self, title: &str) -> Result<Option<CatalogEntry>>;

    /// All catalog titles, sorted.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Number of content entries.
    async fn chunk_count(&self) -> Result<usize>;

    /// Drop every entry from both collections.
    async fn clear(&self) -> Result<()>;
}

/// Order hits by ascending distance and keep the closest `limit`.
pub fn closest<T>(mut hits: Vec<T>, limit: usize, distance: impl Fn(&T) -> f32) -> Vec<T> {
    hits.sort_by(|a, b| {
        distance(a)
            .partial_cmp(&distance(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
