//! Course document parsing.
//!
//! Turns one structured course document into a [`Course`] record plus an
//! ordered sequence of [`CourseChunk`]s with contiguous, course-global
//! chunk indices.
//!
//! # Format
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson0
//! Welcome to the course. ...
//!
//! Lesson 1: Getting Started
//! ...
//! ```
//!
//! Text between the header and the first lesson becomes course-level
//! chunks (`lesson_number = None`). Malformed headers fail the whole
//! document.

use anyhow::{bail, Result};

use crate::chunk::{chunk_text, ChunkParams};
use crate::models::{Course, CourseChunk, Lesson};

/// A parsed document: course metadata plus its chunks.
#[derive(Debug, Clone)]
pub struct ParsedCourse {
    pub course: Course,
    pub chunks: Vec<CourseChunk>,
}

/// Parse a course document and chunk every section.
///
/// # Errors
///
/// - missing or empty `Course Title:` header
/// - a `Lesson N:` header with an empty title
/// - a lesson number that appears twice
pub fn parse_course_document(text: &str, params: &ChunkParams) -> Result<ParsedCourse> {
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    let mut title: Option<String> = None;
    let mut course_link: Option<String> = None;
    let mut instructor: Option<String> = None;
    let mut preamble: Vec<&str> = Vec::new();

    while i < lines.len() {
        let line = lines[i].trim();
        if parse_lesson_header(line)?.is_some() {
            break;
        }
        if let Some(v) = header_value(line, "Course Title:") {
            title = Some(v.to_string());
        } else if let Some(v) = header_value(line, "Course Link:") {
            course_link = non_empty(v);
        } else if let Some(v) = header_value(line, "Course Instructor:") {
            instructor = non_empty(v);
        } else if !line.is_empty() {
            preamble.push(line);
        }
        i += 1;
    }

    let title = match title {
        Some(t) if !t.is_empty() => t,
        _ => bail!("missing required 'Course Title:' header"),
    };

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut sections: Vec<(Option<u32>, String)> = vec![(None, preamble.join("\n"))];

    while i < lines.len() {
        let (number, lesson_title) = match parse_lesson_header(lines[i].trim())? {
            Some(h) => h,
            None => {
                i += 1;
                continue;
            }
        };
        i += 1;

        let mut lesson_link = None;
        let mut j = i;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }
        if let Some(v) = lines.get(j).and_then(|l| header_value(l.trim(), "Lesson Link:")) {
            lesson_link = non_empty(v);
            i = j + 1;
        }

        let mut body: Vec<&str> = Vec::new();
        while i < lines.len() && parse_lesson_header(lines[i].trim())?.is_none() {
            body.push(lines[i]);
            i += 1;
        }

        if lessons.iter().any(|l| l.lesson_number == number) {
            bail!("duplicate lesson number {} in course '{}'", number, title);
        }
        lessons.push(Lesson {
            lesson_number: number,
            title: lesson_title,
            lesson_link,
        });
        sections.push((Some(number), body.join("\n")));
    }

    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    for (lesson_number, body) in &sections {
        for piece in chunk_text(body, params) {
            chunks.push(make_chunk(&title, *lesson_number, chunk_index, &piece));
            chunk_index += 1;
        }
    }

    Ok(ParsedCourse {
        course: Course {
            title,
            course_link,
            instructor,
            lessons,
        },
        chunks,
    })
}

/// Recognize `Lesson <n>: <title>`.
///
/// Returns `Ok(None)` for lines that are not lesson headers (including
/// `Lesson Link:` lines) and an error for a numbered header with no title.
fn parse_lesson_header(line: &str) -> Result<Option<(u32, String)>> {
    let rest = match strip_prefix_ignore_case(line, "Lesson") {
        Some(r) if r.starts_with(char::is_whitespace) => r.trim_start(),
        _ => return Ok(None),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Ok(None);
    }
    let after = rest[digits_end..].trim_start();
    let Some(lesson_title) = after.strip_prefix(':') else {
        return Ok(None);
    };
    let number: u32 = match rest[..digits_end].parse() {
        Ok(n) => n,
        Err(_) => bail!("lesson number out of range in header: {}", line),
    };
    let lesson_title = lesson_title.trim();
    if lesson_title.is_empty() {
        bail!("lesson {} header has no title", number);
    }
    Ok(Some((number, lesson_title.to_string())))
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    strip_prefix_ignore_case(line, key).map(str::trim)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

fn non_empty(v: &str) -> Option<String> {
    (!v.is_empty()).then(|| v.to_string())
}

/// Build a chunk with its context prefix.
fn make_chunk(
    course_title: &str,
    lesson_number: Option<u32>,
    index: i64,
    text: &str,
) -> CourseChunk {
    let content = match lesson_number {
        Some(n) => format!("Course {} Lesson {} content: {}", course_title, n, text),
        None => format!("Course {} content: {}", course_title, text),
    };

    CourseChunk {
        course_title: course_title.to_string(),
        lesson_number,
        chunk_index: index,
        content,
    }
}
