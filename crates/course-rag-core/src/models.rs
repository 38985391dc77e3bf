//! Core data models used throughout course-rag.
//!
//! These types represent the courses, chunks, catalog entries, and source
//! records that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single lesson inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

/// Course metadata parsed from one source document.
///
/// Identity is the exact, case-sensitive `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A bounded span of course text, independently embedded and indexed.
///
/// `content` already carries the course/lesson context prefix; it is the
/// exact text that gets embedded and returned by search.
/// Identity is `(course_title, chunk_index)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseChunk {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: i64,
    pub content: String,
}

impl CourseChunk {
    /// Stable identifier derived from the chunk identity.
    pub fn id(&self) -> String {
        format!("{}#{}", self.course_title, self.chunk_index)
    }
}

/// Catalog collection entry: one per course, embedded on the title only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub instructor: Option<String>,
    pub course_link: Option<String>,
    pub lessons: Vec<Lesson>,
    pub ingested_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn from_course(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            course_link: course.course_link.clone(),
            lessons: course.lessons.clone(),
            ingested_at: Utc::now(),
        }
    }

    pub fn lesson_link(&self, lesson_number: u32) -> Option<&str> {
        self.lessons
            .iter()
            .find(|l| l.lesson_number == lesson_number)
            .and_then(|l| l.lesson_link.as_deref())
    }
}

/// Metadata stored next to every content entry, used for exact-match filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: i64,
}

impl From<&CourseChunk> for ChunkMetadata {
    fn from(chunk: &CourseChunk) -> Self {
        Self {
            course_title: chunk.course_title.clone(),
            lesson_number: chunk.lesson_number,
            chunk_index: chunk.chunk_index,
        }
    }
}

/// Provenance record for one search hit: a human-readable label plus the
/// lesson link, when the catalog has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    pub link: Option<String>,
}

/// Render the `Course Title - Lesson N` label (lesson part omitted when absent).
pub fn source_label(course_title: &str, lesson_number: Option<u32>) -> String {
    match lesson_number {
        Some(n) => format!("{} - Lesson {}", course_title, n),
        None => course_title.to_string(),
    }
}
