//! Course document ingestion.
//!
//! Scans a folder for course documents, parses and chunks each one, and
//! adds it to the vector index:
//!
//! ```text
//! scan (walkdir + include/exclude globs)
//!   → read + parse_course_document    (bad file: logged, counted, skipped)
//!   → VectorIndex::add_course         (title already indexed: skipped)
//! ```
//!
//! Embedding or storage faults abort the run; the courses indexed before
//! the fault stay indexed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use course_rag_core::chunk::ChunkParams;
use course_rag_core::document::{parse_course_document, ParsedCourse};
use course_rag_core::index::VectorIndex;

use crate::config::{Config, DocumentsConfig};
use crate::rag::RagSystem;

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub files_scanned: usize,
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Titles skipped because they were already indexed.
    pub skipped: Vec<String>,
    /// Files that could not be read or parsed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Result of indexing one parsed course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseOutcome {
    Added { title: String, chunks: usize },
    AlreadyIndexed { title: String },
}

/// List course documents under `root`, sorted by path.
pub fn scan_documents(root: &Path, config: &DocumentsConfig) -> Result<Vec<PathBuf>> {
    check_folder(root)?;

    let include_set = build_globset(&config.include_globs)?;

    let mut excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();
    Ok(paths)
}

pub(crate) fn check_folder(folder: &Path) -> Result<()> {
    if !folder.is_dir() {
        bail!("Documents folder does not exist: {}", folder.display());
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Read and parse one course document.
pub fn load_course(path: &Path, params: &ChunkParams) -> Result<ParsedCourse> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_course_document(&text, params)
}

/// Index a parsed course unless its title is already present.
pub async fn index_course(index: &VectorIndex, parsed: &ParsedCourse) -> Result<CourseOutcome> {
    let title = parsed.course.title.clone();
    match index.add_course(&parsed.course, &parsed.chunks).await? {
        Some(chunks) => Ok(CourseOutcome::Added { title, chunks }),
        None => Ok(CourseOutcome::AlreadyIndexed { title }),
    }
}

/// Parse and index every file, in order.
pub async fn ingest_files(
    index: &VectorIndex,
    params: &ChunkParams,
    paths: &[PathBuf],
) -> Result<IngestSummary> {
    let mut summary = IngestSummary {
        files_scanned: paths.len(),
        ..IngestSummary::default()
    };

    for path in paths {
        let parsed = match load_course(path, params) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "skipping course document");
                summary.failed.push((path.clone(), format!("{:#}", e)));
                continue;
            }
        };

        match index_course(index, &parsed).await? {
            CourseOutcome::Added { title, chunks } => {
                info!(course = %title, chunks, "indexed course");
                summary.courses_added += 1;
                summary.chunks_added += chunks;
            }
            CourseOutcome::AlreadyIndexed { title } => {
                info!(course = %title, "course already indexed, skipping");
                summary.skipped.push(title);
            }
        }
    }

    Ok(summary)
}

/// `crag ingest`: index a folder and print a summary.
pub async fn run_ingest(config: &Config, folder: Option<PathBuf>, clear: bool) -> Result<()> {
    let folder = folder.unwrap_or_else(|| config.documents.root.clone());

    // --clear must empty the index before the embedding-model guard runs.
    let rag = if clear {
        check_folder(&folder)?;
        RagSystem::for_rebuild(config).await?
    } else {
        RagSystem::for_indexing(config).await?
    };

    let summary = rag.add_course_folder(&folder, false).await?;

    println!("Ingest: {}", folder.display());
    if clear {
        println!("  (existing index cleared)");
    }
    println!("  files scanned:    {}", summary.files_scanned);
    println!("  courses added:    {}", summary.courses_added);
    println!("  chunks added:     {}", summary.chunks_added);
    println!("  already indexed:  {}", summary.skipped.len());
    println!("  failed:           {}", summary.failed.len());
    for (path, reason) in &summary.failed {
        println!("    {}: {}", path.display(), reason);
    }

    Ok(())
}
