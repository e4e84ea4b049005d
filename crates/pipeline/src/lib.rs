//! The tutorial generation pipeline.
//!
//! [`TutorialPipeline`] implements the [`Pipeline`] capability: fetch a
//! source tree (local directory or GitHub repository), group it into
//! abstractions, and write one markdown chapter per abstraction plus an
//! overview. Progress goes through the [`ProgressSink`] it is handed;
//! the pipeline knows nothing about jobs or storage.

use async_trait::async_trait;
use tutorgen_core::generation::{ContentSource, GenerationConfig, GenerationOutput};
use tutorgen_core::pipeline::{Pipeline, PipelineError};
use tutorgen_core::progress::ProgressSink;

pub mod chapters;
pub mod globs;
pub mod source;

use source::SourceFilters;

/// Progress checkpoints, matching the relative weight of each phase.
const PROGRESS_FETCH_START: u8 = 5;
const PROGRESS_FETCH_DONE: u8 = 30;
const PROGRESS_ABSTRACTIONS: u8 = 45;
const PROGRESS_CHAPTERS_START: u8 = 55;
const PROGRESS_CHAPTERS_END: u8 = 95;
const PROGRESS_FINALIZE: u8 = 98;

/// Deterministic content-generation pipeline over real source trees.
#[derive(Debug, Default)]
pub struct TutorialPipeline;

impl TutorialPipeline {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Pipeline for TutorialPipeline {
    async fn run(
        &self,
        config: &GenerationConfig,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationOutput, PipelineError> {
        let content_source = config
            .source()
            .ok_or_else(|| PipelineError::Source("No content source configured".to_string()))?;
        let filters = SourceFilters::from_config(config)?;

        report(
            progress,
            "Fetching source",
            PROGRESS_FETCH_START,
            Some(&format!("Fetching source from {}", config.source_label())),
        )
        .await;

        let tree = source::fetch(&content_source, &filters, config.use_cache()).await?;
        if tree.files.is_empty() {
            return Err(PipelineError::Source(
                "No source files matched the configured filters".to_string(),
            ));
        }

        report(
            progress,
            "Fetching source",
            PROGRESS_FETCH_DONE,
            Some(&format!(
                "Fetched {} files ({} skipped)",
                tree.files.len(),
                tree.skipped
            )),
        )
        .await;

        let abstractions = chapters::identify_abstractions(&tree, config.max_chapters());
        let relationships = chapters::derive_relationships(&tree, &abstractions);
        report(
            progress,
            "Identifying abstractions",
            PROGRESS_ABSTRACTIONS,
            Some(&format!("Identified {} abstractions", abstractions.len())),
        )
        .await;

        let project_name = project_name(config, &content_source);
        let language = config.language().to_string();

        let mut chapter_list = Vec::with_capacity(abstractions.len() + 1);
        chapter_list.push(chapters::overview_chapter(
            &project_name,
            &language,
            &tree,
            &abstractions,
            &relationships,
        ));
        report(
            progress,
            "Writing chapters",
            PROGRESS_CHAPTERS_START,
            Some("Wrote chapter 1: Overview"),
        )
        .await;

        let span = PROGRESS_CHAPTERS_END - PROGRESS_CHAPTERS_START;
        for (index, abstraction) in abstractions.iter().enumerate() {
            let chapter = chapters::abstraction_chapter(&tree, abstraction);
            let percent = PROGRESS_CHAPTERS_START
                + (span as usize * (index + 1) / abstractions.len()) as u8;
            report(
                progress,
                "Writing chapters",
                percent,
                Some(&format!("Wrote chapter {}: {}", index + 2, chapter.title)),
            )
            .await;
            chapter_list.push(chapter);
        }

        report(progress, "Finalizing", PROGRESS_FINALIZE, Some("Generation finished")).await;

        Ok(GenerationOutput {
            project_name,
            language,
            abstractions,
            relationships,
            chapters: chapter_list,
        })
    }
}

/// Display name: explicit config, repository name, or directory basename.
fn project_name(config: &GenerationConfig, content_source: &ContentSource) -> String {
    if let Some(name) = config.project_name.as_deref().filter(|s| !s.trim().is_empty()) {
        return name.to_string();
    }
    match content_source {
        ContentSource::Remote { url, .. } => url
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("project")
            .to_string(),
        ContentSource::Local { dir } => std::path::Path::new(dir)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    }
}

/// Report progress, tolerating sink failures.
///
/// Losing a progress update must not abort content generation; the
/// terminal write will surface real storage trouble soon enough.
async fn report(progress: &dyn ProgressSink, step: &str, percent: u8, message: Option<&str>) {
    if let Err(error) = progress.report(step, percent, message).await {
        tracing::warn!(step, percent, %error, "Progress report failed");
    }
}
