//! # course-rag core
//!
//! Shared, runtime-agnostic logic for course-rag: course models, document
//! parsing and sentence chunking, the embedding trait, the storage
//! abstraction, and the two-collection [`index::VectorIndex`].
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Concrete embedding providers and the SQLite
//! store live in the `course-rag` app crate.

pub mod chunk;
pub mod document;
pub mod embedding;
pub mod index;
pub mod models;
pub mod search;
pub mod store;
