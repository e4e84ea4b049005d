//! Generation request configuration and result payloads.
//!
//! [`GenerationConfig`] is the job configuration submitted by the caller;
//! [`GenerationOutput`] is what the pipeline hands back on success and what
//! gets persisted as the job's `result`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default cap on individual source file size, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: i64 = 100_000;

/// Default target language for generated chapters.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Default maximum number of abstraction chapters per tutorial.
pub const DEFAULT_MAX_CHAPTERS: usize = 10;

/// Configuration for one tutorial generation job.
///
/// Exactly the shape accepted by `POST /api/v1/jobs`. Every field except
/// the content source is optional and falls back to a documented default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Remote repository URL (e.g. `https://github.com/owner/repo`).
    pub repo_url: Option<String>,
    /// Local directory to read source files from.
    pub local_dir: Option<String>,
    /// Display name for the generated tutorial. Derived from the source
    /// when absent.
    pub project_name: Option<String>,
    /// Bearer credential for private remote repositories.
    pub access_token: Option<String>,
    /// Glob patterns a file must match to be included (e.g. `*.rs`).
    /// When absent, all files are candidates.
    pub include_patterns: Option<Vec<String>>,
    /// Glob patterns that exclude a file even if included.
    pub exclude_patterns: Option<Vec<String>>,
    /// Skip files larger than this many bytes.
    pub max_file_size: Option<i64>,
    /// Target language for chapter prose.
    pub language: Option<String>,
    /// Reuse previously fetched remote content when possible.
    pub use_cache: Option<bool>,
    /// Upper bound on the number of abstraction chapters.
    pub max_chapters: Option<usize>,
}

/// Where the source files for a job come from.
///
/// When both a remote URL and a local directory are configured, the
/// remote source wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Remote {
        url: String,
        access_token: Option<String>,
    },
    Local {
        dir: String,
    },
}

impl GenerationConfig {
    /// Validate that the config names a content source.
    ///
    /// This is deliberately minimal: anything beyond "where do the files
    /// come from" has a safe default and cannot make the job unrunnable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source().is_none() {
            return Err(CoreError::Validation(
                "Either repo_url or local_dir must be provided".to_string(),
            ));
        }
        if self.max_file_size.is_some_and(|n| n <= 0) {
            return Err(CoreError::Validation(
                "max_file_size must be positive".to_string(),
            ));
        }
        if self.max_chapters.is_some_and(|n| n == 0) {
            return Err(CoreError::Validation(
                "max_chapters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the content source, preferring the remote URL.
    pub fn source(&self) -> Option<ContentSource> {
        if let Some(url) = self.repo_url.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(ContentSource::Remote {
                url: url.to_string(),
                access_token: self.access_token.clone(),
            });
        }
        self.local_dir
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|dir| ContentSource::Local {
                dir: dir.to_string(),
            })
    }

    /// Human-readable label of the content source, for log messages.
    pub fn source_label(&self) -> &str {
        self.repo_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.local_dir.as_deref())
            .unwrap_or("<unspecified>")
    }

    pub fn max_file_size(&self) -> i64 {
        self.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache.unwrap_or(true)
    }

    pub fn max_chapters(&self) -> usize {
        self.max_chapters.unwrap_or(DEFAULT_MAX_CHAPTERS)
    }
}

/// One logical grouping of source files (a "concept" the tutorial explains).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Abstraction {
    pub name: String,
    pub description: String,
    /// Paths of the files belonging to this abstraction, relative to the
    /// source root.
    pub files: Vec<String>,
}

/// A directed relationship between two abstractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// One generated tutorial chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Chapter body as lightweight markup (markdown).
    pub markdown: String,
}

/// Successful pipeline output, persisted verbatim as the job result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub project_name: String,
    pub language: String,
    pub abstractions: Vec<Abstraction>,
    pub relationships: Vec<Relation>,
    pub chapters: Vec<Chapter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> GenerationConfig {
        GenerationConfig {
            repo_url: None,
            local_dir: None,
            project_name: None,
            access_token: None,
            include_patterns: None,
            exclude_patterns: None,
            max_file_size: None,
            language: None,
            use_cache: None,
            max_chapters: None,
        }
    }

    #[test]
    fn config_without_source_is_rejected() {
        let config = empty_config();
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_source_fields_do_not_count() {
        let config = GenerationConfig {
            repo_url: Some("   ".to_string()),
            local_dir: Some(String::new()),
            ..empty_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn local_dir_alone_is_enough() {
        let config = GenerationConfig {
            local_dir: Some("/tmp/project".to_string()),
            ..empty_config()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.source(),
            Some(ContentSource::Local {
                dir: "/tmp/project".to_string()
            })
        );
    }

    #[test]
    fn remote_source_wins_over_local() {
        let config = GenerationConfig {
            repo_url: Some("https://github.com/owner/repo".to_string()),
            local_dir: Some("/tmp/project".to_string()),
            ..empty_config()
        };
        match config.source() {
            Some(ContentSource::Remote { url, .. }) => {
                assert_eq!(url, "https://github.com/owner/repo");
            }
            other => panic!("expected remote source, got {other:?}"),
        }
        assert_eq!(config.source_label(), "https://github.com/owner/repo");
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = empty_config();
        assert_eq!(config.max_file_size(), DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.language(), DEFAULT_LANGUAGE);
        assert!(config.use_cache());
        assert_eq!(config.max_chapters(), DEFAULT_MAX_CHAPTERS);
    }

    #[test]
    fn nonsensical_limits_are_rejected() {
        let config = GenerationConfig {
            local_dir: Some("/tmp/project".to_string()),
            max_file_size: Some(0),
            ..empty_config()
        };
        assert!(config.validate().is_err());

        let config = GenerationConfig {
            local_dir: Some("/tmp/project".to_string()),
            max_chapters: Some(0),
            ..empty_config()
        };
        assert!(config.validate().is_err());
    }
}
