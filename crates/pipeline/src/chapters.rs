//! Deterministic tutorial content generation from a fetched source tree.
//!
//! Files are grouped into "abstractions" by their top-level path segment;
//! each abstraction becomes one chapter, preceded by an overview chapter
//! that inventories the tree and the relationships between areas.

use std::collections::BTreeMap;

use tutorgen_core::generation::{Abstraction, Chapter, Relation};

use crate::source::{SourceFile, SourceTree};

/// Name used for files that live directly in the source root.
const ROOT_GROUP: &str = "root";

/// At most this many files are excerpted per chapter.
const EXCERPT_FILES: usize = 3;

/// At most this many lines are shown per excerpt.
const EXCERPT_LINES: usize = 24;

/// Group the source tree into at most `max` abstractions.
///
/// Larger groups come first; ties break on name so the output is stable
/// for a given tree.
pub fn identify_abstractions(tree: &SourceTree, max: usize) -> Vec<Abstraction> {
    let mut groups: BTreeMap<&str, Vec<&SourceFile>> = BTreeMap::new();
    for file in &tree.files {
        let segment = match file.path.split_once('/') {
            Some((first, _)) => first,
            None => ROOT_GROUP,
        };
        groups.entry(segment).or_default().push(file);
    }

    let mut abstractions: Vec<Abstraction> = groups
        .into_iter()
        .map(|(name, files)| Abstraction {
            name: name.to_string(),
            description: describe_group(name, files.len()),
            files: files.iter().map(|f| f.path.clone()).collect(),
        })
        .collect();

    abstractions.sort_by(|a, b| {
        b.files
            .len()
            .cmp(&a.files.len())
            .then_with(|| a.name.cmp(&b.name))
    });
    abstractions.truncate(max);
    abstractions
}

fn describe_group(name: &str, file_count: usize) -> String {
    let noun = if file_count == 1 { "file" } else { "files" };
    if name == ROOT_GROUP {
        format!("The {file_count} {noun} at the top of the source tree.")
    } else {
        format!("The `{name}` area of the codebase ({file_count} {noun}).")
    }
}

/// Derive cross-references between abstractions.
///
/// An abstraction references another when any of its files mentions the
/// other's name. Crude, but deterministic and surprisingly informative
/// for module-per-directory codebases.
pub fn derive_relationships(tree: &SourceTree, abstractions: &[Abstraction]) -> Vec<Relation> {
    let mut relations = Vec::new();
    for from in abstractions {
        for to in abstractions {
            if from.name == to.name || to.name == ROOT_GROUP || to.name.len() < 3 {
                continue;
            }
            let mentions = tree
                .files
                .iter()
                .filter(|f| from.files.contains(&f.path))
                .any(|f| f.content.contains(&to.name));
            if mentions {
                relations.push(Relation {
                    from: from.name.clone(),
                    to: to.name.clone(),
                    label: "references".to_string(),
                });
            }
        }
    }
    relations
}

/// Build the overview chapter: inventory plus relationship table.
pub fn overview_chapter(
    project_name: &str,
    language: &str,
    tree: &SourceTree,
    abstractions: &[Abstraction],
    relationships: &[Relation],
) -> Chapter {
    let mut md = String::new();
    md.push_str(&format!("# {project_name}\n\n"));
    md.push_str(&format!(
        "This tutorial walks through **{project_name}**: {} source files \
         organised into {} areas. Chapter prose is written in {language}.\n\n",
        tree.files.len(),
        abstractions.len(),
    ));

    md.push_str("## Areas\n\n");
    md.push_str("| Area | Files | Description |\n|---|---|---|\n");
    for abstraction in abstractions {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            abstraction.name,
            abstraction.files.len(),
            abstraction.description
        ));
    }
    md.push('\n');

    if !relationships.is_empty() {
        md.push_str("## How the areas connect\n\n");
        md.push_str("| From | To | Relationship |\n|---|---|---|\n");
        for relation in relationships {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                relation.from, relation.to, relation.label
            ));
        }
        md.push('\n');
    }

    Chapter {
        title: "Overview".to_string(),
        markdown: md,
    }
}

/// Build the chapter for one abstraction: file table plus code excerpts.
pub fn abstraction_chapter(tree: &SourceTree, abstraction: &Abstraction) -> Chapter {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n{}\n\n", abstraction.name, abstraction.description));

    md.push_str("## Files\n\n| Path | Lines |\n|---|---|\n");
    for path in &abstraction.files {
        let lines = tree
            .files
            .iter()
            .find(|f| &f.path == path)
            .map(|f| f.content.lines().count())
            .unwrap_or(0);
        md.push_str(&format!("| `{path}` | {lines} |\n"));
    }
    md.push('\n');

    md.push_str("## Highlights\n\n");
    for path in abstraction.files.iter().take(EXCERPT_FILES) {
        let Some(file) = tree.files.iter().find(|f| &f.path == path) else {
            continue;
        };
        let excerpt: Vec<&str> = file.content.lines().take(EXCERPT_LINES).collect();
        md.push_str(&format!("### `{path}`\n\n"));
        md.push_str(&format!("```{}\n", fence_tag(path)));
        md.push_str(&excerpt.join("\n"));
        md.push_str("\n```\n\n");
        if file.content.lines().count() > EXCERPT_LINES {
            md.push_str("*(truncated)*\n\n");
        }
    }

    Chapter {
        title: abstraction.name.clone(),
        markdown: md,
    }
}

/// Fence info string derived from the file extension.
fn fence_tag(path: &str) -> &str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("go") => "go",
        Some("rb") => "ruby",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        Some("md") => "markdown",
        Some("toml") => "toml",
        Some("yml") | Some("yaml") => "yaml",
        Some("json") => "json",
        Some("sql") => "sql",
        Some("sh") => "bash",
        _ => "",
    }
}
