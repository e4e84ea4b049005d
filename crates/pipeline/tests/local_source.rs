//! End-to-end pipeline run over a local directory.

use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use tutorgen_core::error::CoreError;
use tutorgen_core::generation::GenerationConfig;
use tutorgen_core::pipeline::{Pipeline, PipelineError};
use tutorgen_core::progress::ProgressSink;
use tutorgen_pipeline::TutorialPipeline;

/// Records every report it receives.
#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(String, u8, Option<String>)>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn report(
        &self,
        step: &str,
        progress: u8,
        message: Option<&str>,
    ) -> Result<(), CoreError> {
        self.reports.lock().unwrap().push((
            step.to_string(),
            progress,
            message.map(|m| m.to_string()),
        ));
        Ok(())
    }
}

fn config_for(dir: &TempDir) -> GenerationConfig {
    GenerationConfig {
        repo_url: None,
        local_dir: Some(dir.path().to_string_lossy().into_owned()),
        project_name: Some("fixture".to_string()),
        access_token: None,
        include_patterns: Some(vec!["*.rs".to_string(), "*.md".to_string()]),
        exclude_patterns: Some(vec!["*tests/*".to_string()]),
        max_file_size: Some(500),
        language: None,
        use_cache: None,
        max_chapters: None,
    }
}

fn write(dir: &TempDir, path: &str, content: &str) {
    let full = dir.path().join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}

fn fixture_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(&dir, "README.md", "# Fixture\nSee the engine directory.\n");
    write(&dir, "engine/core.rs", "pub fn run() -> u32 { 42 }\n");
    write(&dir, "engine/util.rs", "pub fn twice(n: u32) -> u32 { n * 2 }\n");
    write(&dir, "cli/main.rs", "fn main() { println!(\"{}\", engine::run()); }\n");
    // Filtered out: wrong extension, excluded directory, oversized file.
    write(&dir, "assets/logo.svg", "<svg/>\n");
    write(&dir, "engine/tests/core_test.rs", "#[test] fn t() {}\n");
    write(&dir, "engine/generated.rs", &"x".repeat(2000));
    dir
}

#[tokio::test]
async fn generates_chapters_from_a_local_directory() {
    let dir = fixture_tree();
    let sink = RecordingSink::default();

    let output = TutorialPipeline::new()
        .run(&config_for(&dir), &sink)
        .await
        .expect("pipeline should succeed");

    assert_eq!(output.project_name, "fixture");
    assert_eq!(output.language, "english");

    // Overview plus one chapter per area (engine, cli, root).
    assert_eq!(output.chapters.len(), 4);
    assert_eq!(output.chapters[0].title, "Overview");
    assert!(output.chapters.iter().any(|c| c.title == "engine"));

    // Filtered files never surface in chapter content.
    let all_markdown: String = output
        .chapters
        .iter()
        .map(|c| c.markdown.as_str())
        .collect();
    assert!(!all_markdown.contains("logo.svg"));
    assert!(!all_markdown.contains("core_test.rs"));
    assert!(!all_markdown.contains("generated.rs"));
    assert!(all_markdown.contains("engine/core.rs"));
}

#[tokio::test]
async fn progress_reports_name_each_phase() {
    let dir = fixture_tree();
    let sink = RecordingSink::default();

    TutorialPipeline::new()
        .run(&config_for(&dir), &sink)
        .await
        .unwrap();

    let reports = sink.reports.lock().unwrap();
    let steps: Vec<&str> = reports.iter().map(|(step, _, _)| step.as_str()).collect();
    assert!(steps.contains(&"Fetching source"));
    assert!(steps.contains(&"Identifying abstractions"));
    assert!(steps.contains(&"Writing chapters"));
    assert!(steps.contains(&"Finalizing"));

    // Percentages stay in range and end near completion.
    assert!(reports.iter().all(|(_, p, _)| *p <= 100));
    assert_eq!(reports.last().unwrap().1, 98);

    // The fetch summary counts only the files that passed the filters.
    let fetched = reports
        .iter()
        .find_map(|(_, _, m)| m.as_deref().filter(|m| m.starts_with("Fetched")))
        .expect("fetch summary should be reported");
    assert_eq!(fetched, "Fetched 4 files (3 skipped)");
}

#[tokio::test]
async fn empty_match_set_is_a_source_error() {
    let dir = fixture_tree();
    let mut config = config_for(&dir);
    config.include_patterns = Some(vec!["*.xyz".to_string()]);

    let err = TutorialPipeline::new()
        .run(&config, &RecordingSink::default())
        .await
        .expect_err("nothing matches, the run must fail");

    match err {
        PipelineError::Source(message) => {
            assert!(message.contains("No source files matched"));
        }
        other => panic!("expected a source error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_directory_is_a_source_error() {
    let config = GenerationConfig {
        local_dir: Some("/nonexistent/tutorgen-fixture".to_string()),
        ..config_for(&fixture_tree())
    };

    let err = TutorialPipeline::new()
        .run(&config, &RecordingSink::default())
        .await
        .expect_err("missing directory must fail");
    assert!(matches!(err, PipelineError::Source(_)));
}
