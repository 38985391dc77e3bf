//! Content query results.
//!
//! [`SearchResults`] carries parallel sequences of document text, chunk
//! metadata, and distance, plus an optional error. "Zero matches" and
//! "failed" are distinct states: an empty result has `error == None`.

use crate::models::ChunkMetadata;
use crate::store::ContentHit;

/// Result of one content query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// Build results from store hits, preserving their order.
    pub fn from_hits(hits: Vec<ContentHit>) -> Self {
        let mut results = Self::default();
        for hit in hits {
            results.documents.push(hit.document);
            results.metadata.push(hit.metadata);
            results.distances.push(hit.distance);
        }
        results
    }

    /// An error-carrying result with no documents.
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Iterate `(document, metadata, distance)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(&self.metadata)
            .zip(&self.distances)
            .map(|((d, m), dist)| (d.as_str(), m, *dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, idx: i64, distance: f32) -> ContentHit {
        ContentHit {
            document: doc.to_string(),
            metadata: ChunkMetadata {
                course_title: "C".to_string(),
                lesson_number: Some(1),
                chunk_index: idx,
            },
            distance,
        }
    }

    #[test]
    fn test_from_hits_keeps_order_and_alignment() {
        let r = SearchResults::from_hits(vec![hit("a", 0, 0.1), hit("b", 1, 0.4)]);
        assert_eq!(r.len(), 2);
        assert!(r.error.is_none());
        let triples: Vec<_> = r.iter().map(|(d, m, s)| (d, m.chunk_index, s)).collect();
        assert_eq!(triples, vec![("a", 0, 0.1), ("b", 1, 0.4)]);
    }

    #[test]
    fn test_empty_is_not_error() {
        let r = SearchResults::from_hits(vec![]);
        assert!(r.is_empty());
        assert!(r.error.is_none());

        let e = SearchResults::with_error("boom");
        assert!(e.is_empty());
        assert_eq!(e.error.as_deref(), Some("boom"));
    }
}
