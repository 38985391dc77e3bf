//! Course catalog overview.
//!
//! Used by `crag courses` to show what is indexed: the database file,
//! course and chunk counts, and a per-course breakdown.

use anyhow::Result;

use crate::config::Config;
use crate::rag::RagSystem;

/// Run the courses command: read the catalog and print a summary.
pub async fn run_courses(config: &Config) -> Result<()> {
    let rag = RagSystem::for_indexing(config).await?;
    let stats = rag.course_stats().await?;
    let chunks = rag.index().chunk_count().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Course Catalog");
    println!("==============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Courses:     {}", stats.total_courses);
    println!("  Chunks:      {}", chunks);

    if !stats.course_titles.is_empty() {
        println!();
        println!("  {:<48} {:>7}   {}", "COURSE", "LESSONS", "INSTRUCTOR");
        println!("  {}", "-".repeat(76));

        for title in &stats.course_titles {
            let entry = rag.index().get_course(title).await?;
            let (lessons, instructor) = match &entry {
                Some(e) => (e.lessons.len(), e.instructor.as_deref().unwrap_or("-")),
                None => (0, "-"),
            };
            println!("  {:<48} {:>7}   {}", title, lessons, instructor);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
