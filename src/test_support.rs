//! Shared unit-test fixtures.

use anyhow::Result;
use async_trait::async_trait;

use course_rag_core::embedding::EmbeddingProvider;

/// Bag-of-words hashing embedder: texts sharing words land close together.
pub(crate) struct WordHashEmbedder;

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    fn model_name(&self) -> &str {
        "word-hash"
    }

    fn dims(&self) -> usize {
        256
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 256];
                for w in t.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if w.is_empty() {
                        continue;
                    }
                    let h = w
                        .bytes()
                        .fold(7u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64));
                    v[(h % 256) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}
