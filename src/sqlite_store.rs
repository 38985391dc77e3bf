//! SQLite-backed [`VectorStore`] implementation.
//!
//! Vectors are stored as little-endian `f32` BLOBs next to their rows.
//! Nearest-neighbor queries load the rows that pass the metadata filter
//! and rank them by cosine distance in process.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use course_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use course_rag_core::models::{CatalogEntry, ChunkMetadata, CourseChunk, Lesson};
use course_rag_core::store::{closest, CatalogHit, ContentFilter, ContentHit, VectorStore};

use crate::config::DbConfig;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Record the embedding model on first use and reject a different one later.
    ///
    /// Vectors from different models are not comparable, so an index built
    /// with one model must be cleared before another is used.
    pub async fn check_embedding_model(&self, model: &str, dims: usize) -> Result<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'embedding_model'")
                .fetch_optional(&self.pool)
                .await?;
        let current = format!("{}:{}", model, dims);
        let populated =
            self.chunk_count().await? > 0 || !self.course_titles().await?.is_empty();

        match stored {
            Some(stored) if stored == current => Ok(()),
            Some(stored) if populated => {
                bail!(
                    "index was built with embedding model '{}' but '{}' is configured; \
                     run `crag ingest --clear` to rebuild",
                    stored,
                    current
                )
            }
            _ => {
                sqlx::query(
                    r#"
                    INSERT INTO index_meta (key, value) VALUES ('embedding_model', ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(&current)
                .execute(&self.pool)
                .await?;
                Ok(())
            }
        }
    }
}

fn catalog_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogEntry> {
    let lessons_json: String = row.get("lessons_json");
    let lessons: Vec<Lesson> =
        serde_json::from_str(&lessons_json).context("corrupt lessons_json in courses table")?;
    let ingested_at: i64 = row.get("ingested_at");
    Ok(CatalogEntry {
        title: row.get("title"),
        instructor: row.get("instructor"),
        course_link: row.get("course_link"),
        lessons,
        ingested_at: chrono::DateTime::from_timestamp(ingested_at, 0).unwrap_or_default(),
    })
}

fn lesson_number(row: &sqlx::sqlite::SqliteRow) -> Option<u32> {
    row.get::<Option<i64>, _>("lesson_number")
        .and_then(|n| u32::try_from(n).ok())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn has_course(&self, title: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn insert_course(&self, entry: &CatalogEntry, vector: &[f32]) -> Result<bool> {
        let lessons_json = serde_json::to_string(&entry.lessons)?;
        let result = sqlx::query(
            r#"
            INSERT INTO courses (title, instructor, course_link, lessons_json, embedding, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO NOTHING
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.instructor)
        .bind(&entry.course_link)
        .bind(&lessons_json)
        .bind(vec_to_blob(vector))
        .bind(entry.ingested_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_chunks(&self, chunks: &[CourseChunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let result = sqlx::query(
                r#"
                INSERT INTO course_chunks
                    (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(course_title, chunk_index) DO NOTHING
                "#,
            )
            .bind(chunk.id())
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number.map(i64::from))
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn query_catalog(&self, query_vec: &[f32], limit: usize) -> Result<Vec<CatalogHit>> {
        let rows = sqlx::query(
            "SELECT title, instructor, course_link, lessons_json, embedding, ingested_at FROM courses",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let distance = cosine_distance(query_vec, &blob_to_vec(&blob));
            hits.push(CatalogHit {
                entry: catalog_entry(row)?,
                distance,
            });
        }

        Ok(closest(hits, limit, |h| h.distance))
    }

    async fn query_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentHit>> {
        let mut sql = String::from(
            "SELECT course_title, lesson_number, chunk_index, content, embedding FROM course_chunks",
        );
        let mut clauses = Vec::new();
        if filter.course_title.is_some() {
            clauses.push("course_title = ?");
        }
        if filter.lesson_number.is_some() {
            clauses.push("lesson_number = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut query = sqlx::query(&sql);
        if let Some(title) = &filter.course_title {
            query = query.bind(title);
        }
        if let Some(n) = filter.lesson_number {
            query = query.bind(i64::from(n));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ContentHit {
                    document: row.get("content"),
                    metadata: ChunkMetadata {
                        course_title: row.get("course_title"),
                        lesson_number: lesson_number(row),
                        chunk_index: row.get("chunk_index"),
                    },
                    distance: cosine_distance(query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(closest(hits, limit, |h| h.distance))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query(
            "SELECT title, instructor, course_link, lessons_json, ingested_at FROM courses WHERE title = ?",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(catalog_entry).transpose()
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar("SELECT title FROM courses ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM course_chunks")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM courses").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
