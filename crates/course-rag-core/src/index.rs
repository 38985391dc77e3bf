//! Two-collection vector index.
//!
//! [`VectorIndex`] pairs a [`VectorStore`] with an [`EmbeddingProvider`]
//! and implements course-name resolution and filtered content search.
//!
//! ```text
//!   resolve_course_name("mcp")          search(q, course?, lesson?)
//!            │                                   │
//!            ▼                                   ▼
//!   embed name → catalog top-1          resolve course (if given)
//!            │                                   │
//!            ▼                                   ▼
//!      exact title                   embed q → content top-k under
//!                                    {course_title AND lesson_number}
//! ```
//!
//! Search never fails: embedding or storage faults come back as an
//! error-carrying [`SearchResults`].

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::embedding::EmbeddingProvider;
use crate::models::{CatalogEntry, Course, CourseChunk};
use crate::search::SearchResults;
use crate::store::{ContentFilter, VectorStore};

/// Default number of content results returned by [`VectorIndex::search`].
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Catalog + content index over a shared store.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_results: usize,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_results: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            max_results: max_results.max(1),
        }
    }

    /// Embed the title and store a catalog entry.
    ///
    /// Returns `false` without embedding when the title is already present.
    pub async fn upsert_course(&self, course: &Course) -> Result<bool> {
        if self.store.has_course(&course.title).await? {
            return Ok(false);
        }
        let vector = self.embedder.embed_one(&course.title).await?;
        self.store
            .insert_course(&CatalogEntry::from_course(course), &vector)
            .await
    }

    /// Embed chunk texts and store them as content entries.
    pub async fn upsert_chunks(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        self.store.insert_chunks(chunks, &vectors).await
    }

    /// Index a whole course: content first, then the catalog entry.
    ///
    /// The catalog entry marks the course as present, so it is written
    /// last; a failure part-way leaves the title free for a retry.
    /// Returns `None` if the course was already indexed.
    pub async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<Option<usize>> {
        if self.store.has_course(&course.title).await? {
            return Ok(None);
        }
        let added = self.upsert_chunks(chunks).await?;
        if !self.upsert_course(course).await? {
            return Ok(None);
        }
        Ok(Some(added))
    }

    /// Resolve a fuzzy course name to the nearest catalog title.
    ///
    /// No distance threshold: any non-empty catalog yields a match.
    pub async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>> {
        let vector = self.embedder.embed_one(course_name).await?;
        let hits = self.store.query_catalog(&vector, 1).await?;
        Ok(hits.into_iter().next().map(|h| h.entry.title))
    }

    /// Filtered top-k content search.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => {
                    return SearchResults::with_error(format!(
                        "No course found matching '{}'",
                        name
                    ))
                }
                Err(e) => return SearchResults::with_error(format!("Search error: {}", e)),
            },
            None => None,
        };

        let filter = ContentFilter {
            course_title,
            lesson_number,
        };

        let vector = match self.embedder.embed_one(query).await {
            Ok(v) => v,
            Err(e) => return SearchResults::with_error(format!("Search error: {}", e)),
        };
        match self
            .store
            .query_content(&vector, self.max_results, &filter)
            .await
        {
            Ok(hits) => SearchResults::from_hits(hits),
            Err(e) => SearchResults::with_error(format!("Search error: {}", e)),
        }
    }

    /// Link for a lesson, from the course's catalog entry.
    pub async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>> {
        Ok(self
            .store
            .get_course(course_title)
            .await?
            .and_then(|c| c.lesson_link(lesson_number).map(str::to_string)))
    }

    pub async fn get_course(&self, course_title: &str) -> Result<Option<CatalogEntry>> {
        self.store.get_course(course_title).await
    }

    pub async fn existing_course_titles(&self) -> Result<Vec<String>> {
        self.store.course_titles().await
    }

    pub async fn course_count(&self) -> Result<usize> {
        Ok(self.store.course_titles().await?.len())
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.chunk_count().await
    }

    /// Drop both collections.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}
