//! HTML artifact rendering for completed jobs.
//!
//! Chapters are concatenated with a horizontal rule, converted from
//! markdown (tables and fenced code enabled), and wrapped in a fixed
//! document template: a header block with title/job id/timestamp, the
//! rendered body with a generated table of contents, and a footer with
//! the completion timestamp.

use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tutorgen_core::generation::GenerationOutput;
use tutorgen_core::types::{DbId, Timestamp};

/// Human-readable timestamp format used in the header and footer.
const DATE_FORMAT: &str = "%B %d, %Y at %I:%M %p";

/// Render a completed job's output into a standalone HTML document.
pub fn tutorial_html(job_id: DbId, output: &GenerationOutput, completed_at: Timestamp) -> String {
    let markdown = output
        .chapters
        .iter()
        .map(|c| c.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let (toc, body) = render_markdown(&markdown);

    let generated = chrono::Utc::now().format(DATE_FORMAT);
    let completed = completed_at.format(DATE_FORMAT);
    let title = escape_html(&output.project_name);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Job {job_id}</title>
    <style>
{STYLESHEET}
    </style>
</head>
<body>
    <div class="header">
        <h1>{title}</h1>
        <p><strong>Job ID:</strong> {job_id}</p>
        <p><strong>Generated:</strong> {generated}</p>
    </div>

{toc}
{body}
    <div class="footer">
        <p><em>Generated with the Tutorial Generator API</em></p>
        <p>Job completed on {completed}</p>
    </div>
</body>
</html>"#
    )
}

/// Convert the combined markdown into `(toc_html, body_html)`.
///
/// Headings get stable slug ids (deduplicated with a numeric suffix) so
/// the table of contents can link into the body.
fn render_markdown(markdown: &str) -> (String, String) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    // First pass: collect heading text in document order.
    let mut headings: Vec<(HeadingLevel, String)> = Vec::new();
    let mut current: Option<(HeadingLevel, String)> = None;
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer)) = &mut current {
                    buffer.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(heading) = current.take() {
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }

    // Assign deduplicated slugs.
    let mut seen: HashMap<String, usize> = HashMap::new();
    let slugs: Vec<String> = headings
        .iter()
        .map(|(_, text)| {
            let base = slugify(text);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}-{count}", count = *count)
            }
        })
        .collect();

    // Second pass: inject the slug ids into the heading tags.
    let mut index = 0;
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Start(Tag::Heading {
            level,
            id: _,
            classes,
            attrs,
        }) => {
            let slug = slugs.get(index).cloned().unwrap_or_default();
            index += 1;
            Event::Start(Tag::Heading {
                level,
                id: Some(CowStr::from(slug)),
                classes,
                attrs,
            })
        }
        other => other,
    });

    let mut body = String::new();
    html::push_html(&mut body, events);

    // Table of contents over top-level headings only.
    let mut toc = String::from("    <nav class=\"toc\">\n        <h2>Contents</h2>\n        <ul>\n");
    for ((level, text), slug) in headings.iter().zip(&slugs) {
        let class = match level {
            HeadingLevel::H1 => "toc-h1",
            HeadingLevel::H2 => "toc-h2",
            _ => continue,
        };
        toc.push_str(&format!(
            "            <li class=\"{class}\"><a href=\"#{slug}\">{}</a></li>\n",
            escape_html(text)
        ));
    }
    toc.push_str("        </ul>\n    </nav>\n");

    (toc, body)
}

/// Lowercase, alphanumeric-and-dashes anchor id for a heading.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const STYLESHEET: &str = r#"        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 800px;
            margin: 0 auto;
            padding: 20px;
            line-height: 1.6;
            color: #333;
        }
        h1, h2, h3, h4, h5, h6 {
            color: #2563eb;
            margin-top: 2em;
            margin-bottom: 0.5em;
        }
        h1 {
            border-bottom: 2px solid #e5e7eb;
            padding-bottom: 0.3em;
        }
        code {
            background: #f1f5f9;
            padding: 2px 6px;
            border-radius: 4px;
            font-family: 'Monaco', 'Menlo', 'Ubuntu Mono', monospace;
        }
        pre {
            background: #f8fafc;
            padding: 16px;
            border-radius: 8px;
            overflow-x: auto;
            border: 1px solid #e2e8f0;
        }
        pre code {
            background: none;
            padding: 0;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            margin: 16px 0;
        }
        th, td {
            border: 1px solid #e2e8f0;
            padding: 8px 12px;
            text-align: left;
        }
        th {
            background: #f9fafb;
            font-weight: 600;
        }
        .toc {
            background: #f8fafc;
            border-radius: 8px;
            padding: 16px 24px;
        }
        .toc ul {
            list-style: none;
            padding-left: 0;
        }
        .toc .toc-h2 {
            padding-left: 1.5em;
        }
        .header, .footer {
            text-align: center;
            padding: 20px;
            background: #f8fafc;
            border-radius: 8px;
        }
        .header {
            margin-bottom: 2em;
        }
        .footer {
            margin-top: 3em;
            color: #6b7280;
        }
        hr {
            border: none;
            border-top: 1px solid #e2e8f0;
            margin: 2em 0;
        }"#;

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tutorgen_core::generation::Chapter;

    use super::*;

    fn output_with(chapters: Vec<Chapter>) -> GenerationOutput {
        GenerationOutput {
            project_name: "demo".to_string(),
            language: "english".to_string(),
            abstractions: Vec::new(),
            relationships: Vec::new(),
            chapters,
        }
    }

    fn chapter(title: &str, markdown: &str) -> Chapter {
        Chapter {
            title: title.to_string(),
            markdown: markdown.to_string(),
        }
    }

    #[test]
    fn renders_tables_and_fenced_code() {
        let output = output_with(vec![chapter(
            "Overview",
            "# Overview\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n",
        )]);
        let html = tutorial_html(7, &output, Utc::now());

        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<code class=\"language-rust\">"));
        assert!(html.contains("fn main() {}"));
    }

    #[test]
    fn toc_links_match_heading_ids() {
        let output = output_with(vec![
            chapter("Overview", "# Overview\n\nIntro.\n"),
            chapter("Engine", "# Engine Internals\n\n## Scheduling\n\nDetails.\n"),
        ]);
        let html = tutorial_html(7, &output, Utc::now());

        assert!(html.contains("<a href=\"#overview\">Overview</a>"));
        assert!(html.contains("<h1 id=\"overview\">"));
        assert!(html.contains("<a href=\"#engine-internals\">Engine Internals</a>"));
        assert!(html.contains("<h2 id=\"scheduling\">"));
    }

    #[test]
    fn duplicate_headings_get_distinct_anchors() {
        let output = output_with(vec![
            chapter("A", "# Setup\n\nFirst.\n"),
            chapter("B", "# Setup\n\nSecond.\n"),
        ]);
        let html = tutorial_html(7, &output, Utc::now());

        assert!(html.contains("id=\"setup\""));
        assert!(html.contains("id=\"setup-2\""));
    }

    #[test]
    fn chapters_are_separated_by_rules() {
        let output = output_with(vec![
            chapter("A", "# A\n\nOne.\n"),
            chapter("B", "# B\n\nTwo.\n"),
        ]);
        let html = tutorial_html(7, &output, Utc::now());
        assert!(html.contains("<hr />"));
    }

    #[test]
    fn shell_names_the_job_and_completion_time() {
        let completed = Utc::now();
        let output = output_with(vec![chapter("A", "# A\n")]);
        let html = tutorial_html(42, &output, completed);

        assert!(html.contains("<strong>Job ID:</strong> 42"));
        assert!(html.contains(&format!(
            "Job completed on {}",
            completed.format(DATE_FORMAT)
        )));
    }
}
