//! In-memory [`VectorStore`] implementation for tests and ephemeral runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Queries are
//! brute-force cosine distance over all stored vectors. Each batch insert
//! takes the write lock once, so readers never see half a batch.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{CatalogEntry, ChunkMetadata, CourseChunk};

use super::{closest, CatalogHit, ContentFilter, ContentHit, VectorStore};

struct StoredCourse {
    entry: CatalogEntry,
    vector: Vec<f32>,
}

struct StoredChunk {
    document: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

/// In-memory store; contents are lost when dropped.
pub struct InMemoryStore {
    catalog: RwLock<Vec<StoredCourse>>,
    content: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Vec::new()),
            content: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn has_course(&self, title: &str) -> Result<bool> {
        Ok(read(&self.catalog)?.iter().any(|c| c.entry.title == title))
    }

    async fn insert_course(&self, entry: &CatalogEntry, vector: &[f32]) -> Result<bool> {
        let mut catalog = write(&self.catalog)?;
        if catalog.iter().any(|c| c.entry.title == entry.title) {
            return Ok(false);
        }
        catalog.push(StoredCourse {
            entry: entry.clone(),
            vector: vector.to_vec(),
        });
        Ok(true)
    }

    async fn insert_chunks(&self, chunks: &[CourseChunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            anyhow::bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let mut content = write(&self.content)?;
        let mut written = 0;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let exists = content.iter().any(|s| {
                s.metadata.course_title == chunk.course_title
                    && s.metadata.chunk_index == chunk.chunk_index
            });
            if exists {
                continue;
            }
            content.push(StoredChunk {
                document: chunk.content.clone(),
                metadata: ChunkMetadata::from(chunk),
                vector: vector.clone(),
            });
            written += 1;
        }
        Ok(written)
    }

    async fn query_catalog(&self, query_vec: &[f32], limit: usize) -> Result<Vec<CatalogHit>> {
        let catalog = read(&self.catalog)?;
        let hits = catalog
            .iter()
            .map(|c| CatalogHit {
                entry: c.entry.clone(),
                distance: cosine_distance(query_vec, &c.vector),
            })
            .collect();
        Ok(closest(hits, limit, |h: &CatalogHit| h.distance))
    }

    async fn query_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentHit>> {
        let content = read(&self.content)?;
        let hits = content
            .iter()
            .filter(|s| filter.matches(&s.metadata))
            .map(|s| ContentHit {
                document: s.document.clone(),
                metadata: s.metadata.clone(),
                distance: cosine_distance(query_vec, &s.vector),
            })
            .collect();
        Ok(closest(hits, limit, |h: &ContentHit| h.distance))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CatalogEntry>> {
        Ok(read(&self.catalog)?
            .iter()
            .find(|c| c.entry.title == title)
            .map(|c| c.entry.clone()))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let mut titles: Vec<String> = read(&self.catalog)?
            .iter()
            .map(|c| c.entry.title.clone())
            .collect();
        titles.sort();
        Ok(titles)
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(read(&self.content)?.len())
    }

    async fn clear(&self) -> Result<()> {
        write(&self.catalog)?.clear();
        write(&self.content)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    fn chunk(course: &str, lesson: Option<u32>, index: i64, text: &str) -> CourseChunk {
        CourseChunk {
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
            content: text.to_string(),
        }
    }

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry::from_course(&Course {
            title: title.to_string(),
            course_link: None,
            instructor: None,
            lessons: vec![],
        })
    }

    #[tokio::test]
    async fn test_insert_course_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(store.insert_course(&entry("A"), &[1.0, 0.0]).await.unwrap());
        assert!(!store.insert_course(&entry("A"), &[0.0, 1.0]).await.unwrap());
        assert_eq!(store.course_titles().await.unwrap(), vec!["A".to_string()]);
        assert!(store.has_course("A").await.unwrap());
        assert!(!store.has_course("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_chunks_skips_known_identity() {
        let store = InMemoryStore::new();
        let chunks = vec![chunk("A", Some(1), 0, "x"), chunk("A", Some(1), 1, "y")];
        let vecs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(store.insert_chunks(&chunks, &vecs).await.unwrap(), 2);
        assert_eq!(store.insert_chunks(&chunks, &vecs).await.unwrap(), 0);
        assert_eq!(store.chunk_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_chunks_rejects_mismatched_vectors() {
        let store = InMemoryStore::new();
        let chunks = vec![chunk("A", None, 0, "x")];
        assert!(store.insert_chunks(&chunks, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_query_content_filters_conjunctively() {
        let store = InMemoryStore::new();
        let chunks = vec![
            chunk("A", Some(1), 0, "a1"),
            chunk("A", Some(2), 1, "a2"),
            chunk("B", Some(2), 0, "b2"),
        ];
        let vecs = vec![vec![1.0, 0.0]; 3];
        store.insert_chunks(&chunks, &vecs).await.unwrap();

        let filter = ContentFilter {
            course_title: Some("A".to_string()),
            lesson_number: Some(2),
        };
        let hits = store.query_content(&[1.0, 0.0], 5, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "a2");

        let lesson_only = ContentFilter {
            course_title: None,
            lesson_number: Some(2),
        };
        let hits = store
            .query_content(&[1.0, 0.0], 5, &lesson_only)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_query_content_orders_and_limits() {
        let store = InMemoryStore::new();
        let chunks = vec![
            chunk("A", None, 0, "far"),
            chunk("A", None, 1, "near"),
            chunk("A", None, 2, "mid"),
        ];
        let vecs = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        store.insert_chunks(&chunks, &vecs).await.unwrap();

        let hits = store
            .query_content(&[1.0, 0.0], 2, &ContentFilter::default())
            .await
            .unwrap();
        let docs: Vec<&str> = hits.iter().map(|h| h.document.as_str()).collect();
        assert_eq!(docs, vec!["near", "mid"]);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_clear_empties_both_collections() {
        let store = InMemoryStore::new();
        store.insert_course(&entry("A"), &[1.0]).await.unwrap();
        store
            .insert_chunks(&[chunk("A", None, 0, "x")], &[vec![1.0]])
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert!(store.course_titles().await.unwrap().is_empty());
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }
}
