//! `crag search`: run the content search tool from the command line.

use anyhow::{bail, Result};
use serde_json::json;

use crate::config::Config;
use crate::rag::{print_sources, RagSystem};

/// Build the `search_course_content` input from CLI arguments.
fn search_params(query: &str, course: Option<&str>, lesson: Option<u32>) -> serde_json::Value {
    let mut params = json!({ "query": query });
    if let Some(course) = course {
        params["course_name"] = json!(course);
    }
    if let Some(lesson) = lesson {
        params["lesson_number"] = json!(lesson);
    }
    params
}

pub async fn run_search(
    config: &Config,
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
) -> Result<()> {
    let rag = RagSystem::for_indexing(config).await?;
    let mut session = rag.tools().session();

    let result = session
        .execute("search_course_content", search_params(query, course, lesson))
        .await;
    if result.is_error {
        bail!("{}", result.content);
    }

    println!("{}", result.content);
    print_sources(&session.get_last_sources());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_omit_unset_filters() {
        assert_eq!(search_params("q", None, None), json!({ "query": "q" }));
        assert_eq!(
            search_params("q", Some("MCP"), Some(2)),
            json!({ "query": "q", "course_name": "MCP", "lesson_number": 2 })
        );
    }
}
