//! Source tree acquisition: local directory walk or GitHub crawl.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tutorgen_core::generation::{ContentSource, GenerationConfig};
use tutorgen_core::pipeline::PipelineError;

use crate::globs::PatternSet;

/// One text file pulled from the content source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    pub content: String,
}

/// The filtered set of files a tutorial is generated from.
#[derive(Debug, Default)]
pub struct SourceTree {
    /// Files in path order.
    pub files: Vec<SourceFile>,
    /// Files skipped by filters, size cap, or because they were not text.
    pub skipped: usize,
}

/// File filters derived from the job configuration.
pub struct SourceFilters {
    include: Option<PatternSet>,
    exclude: Option<PatternSet>,
    max_file_size: i64,
}

impl SourceFilters {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, PipelineError> {
        let include = config
            .include_patterns
            .as_deref()
            .map(PatternSet::compile)
            .transpose()?;
        let exclude = config
            .exclude_patterns
            .as_deref()
            .map(PatternSet::compile)
            .transpose()?;
        Ok(Self {
            include,
            exclude,
            max_file_size: config.max_file_size(),
        })
    }

    /// Whether a relative path passes the include/exclude patterns.
    fn path_allowed(&self, path: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.matches(path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matches(path) {
                return false;
            }
        }
        true
    }

    fn size_allowed(&self, size: u64) -> bool {
        size <= self.max_file_size as u64
    }
}

/// Fetch the source tree for a resolved content source.
pub async fn fetch(
    source: &ContentSource,
    filters: &SourceFilters,
    use_cache: bool,
) -> Result<SourceTree, PipelineError> {
    match source {
        ContentSource::Local { dir } => fetch_local(Path::new(dir), filters).await,
        ContentSource::Remote { url, access_token } => {
            fetch_github(url, access_token.as_deref(), filters, use_cache).await
        }
    }
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

async fn fetch_local(root: &Path, filters: &SourceFilters) -> Result<SourceTree, PipelineError> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| PipelineError::Source(format!("Cannot read {}: {e}", root.display())))?;
    if !metadata.is_dir() {
        return Err(PipelineError::Source(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut tree = SourceTree::default();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| PipelineError::Source(format!("Cannot list {}: {e}", dir.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Source(format!("Cannot list {}: {e}", dir.display())))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::Source(format!("Cannot stat {}: {e}", path.display())))?;

            if file_type.is_dir() {
                // Hidden directories (.git and friends) are never useful
                // tutorial material.
                if !name.starts_with('.') {
                    pending.push(path);
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            if !filters.path_allowed(&relative) {
                tree.skipped += 1;
                continue;
            }

            let size = entry
                .metadata()
                .await
                .map(|m| m.len())
                .unwrap_or(u64::MAX);
            if !filters.size_allowed(size) {
                tree.skipped += 1;
                continue;
            }

            match tokio::fs::read_to_string(&path).await {
                Ok(content) => tree.files.push(SourceFile {
                    path: relative,
                    content,
                }),
                // Binary or unreadable files are skipped, not fatal.
                Err(_) => tree.skipped += 1,
            }
        }
    }

    tree.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tree)
}

// ---------------------------------------------------------------------------
// GitHub repository
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    path: String,
    #[serde(rename = "type")]
    node_type: String,
    sha: String,
    size: Option<u64>,
}

/// Split `https://github.com/owner/repo[.git]` into `(owner, repo)`.
pub(crate) fn parse_github_url(url: &str) -> Result<(String, String), PipelineError> {
    let rest = url
        .trim_end_matches('/')
        .strip_prefix("https://github.com/")
        .or_else(|| url.trim_end_matches('/').strip_prefix("http://github.com/"))
        .ok_or_else(|| {
            PipelineError::Source(format!("Unsupported repository URL: {url}"))
        })?;

    let mut parts = rest.splitn(2, '/');
    let owner = parts.next().unwrap_or_default();
    let repo = parts
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(PipelineError::Source(format!(
            "Repository URL must look like https://github.com/owner/repo: {url}"
        )));
    }
    Ok((owner.to_string(), repo.to_string()))
}

async fn fetch_github(
    url: &str,
    access_token: Option<&str>,
    filters: &SourceFilters,
    use_cache: bool,
) -> Result<SourceTree, PipelineError> {
    let (owner, repo) = parse_github_url(url)?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("tutorgen/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| PipelineError::Source(format!("HTTP client error: {e}")))?;

    let info: RepoInfo = get_json(
        &client,
        &format!("https://api.github.com/repos/{owner}/{repo}"),
        access_token,
    )
    .await?;

    let listing: TreeResponse = get_json(
        &client,
        &format!(
            "https://api.github.com/repos/{owner}/{repo}/git/trees/{}?recursive=1",
            info.default_branch
        ),
        access_token,
    )
    .await?;

    let mut tree = SourceTree::default();
    for node in listing.tree {
        if node.node_type != "blob" {
            continue;
        }
        if !filters.path_allowed(&node.path) {
            tree.skipped += 1;
            continue;
        }
        if !filters.size_allowed(node.size.unwrap_or(u64::MAX)) {
            tree.skipped += 1;
            continue;
        }

        let raw_url = format!(
            "https://raw.githubusercontent.com/{owner}/{repo}/{}/{}",
            info.default_branch, node.path
        );
        match fetch_blob(&client, &raw_url, &node.sha, access_token, use_cache).await {
            Ok(content) => tree.files.push(SourceFile {
                path: node.path,
                content,
            }),
            Err(e) => {
                tracing::debug!(path = %node.path, error = %e, "Skipping unreadable blob");
                tree.skipped += 1;
            }
        }
    }

    tree.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tree)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    access_token: Option<&str>,
) -> Result<T, PipelineError> {
    let mut request = client.get(url);
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::Source(format!("Request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(PipelineError::Source(format!(
            "Request to {url} failed with status {}",
            response.status()
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| PipelineError::Source(format!("Invalid response from {url}: {e}")))
}

/// Fetch one raw file, going through the on-disk cache when enabled.
///
/// Cache entries are keyed by the blob's content hash, so a stale entry
/// is impossible: a changed file has a different sha.
async fn fetch_blob(
    client: &reqwest::Client,
    raw_url: &str,
    blob_sha: &str,
    access_token: Option<&str>,
    use_cache: bool,
) -> Result<String, PipelineError> {
    let cache_path = blob_cache_path(blob_sha);

    if use_cache {
        if let Ok(cached) = tokio::fs::read_to_string(&cache_path).await {
            return Ok(cached);
        }
    }

    let mut request = client.get(raw_url);
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::Source(format!("Request to {raw_url} failed: {e}")))?;
    if !response.status().is_success() {
        return Err(PipelineError::Source(format!(
            "Request to {raw_url} failed with status {}",
            response.status()
        )));
    }
    let content = response
        .text()
        .await
        .map_err(|e| PipelineError::Source(format!("Invalid body from {raw_url}: {e}")))?;

    if use_cache {
        if let Some(parent) = cache_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let _ = tokio::fs::write(&cache_path, &content).await;
    }

    Ok(content)
}

fn blob_cache_path(blob_sha: &str) -> PathBuf {
    let digest = Sha256::digest(blob_sha.as_bytes());
    std::env::temp_dir()
        .join("tutorgen-cache")
        .join(format!("{digest:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_urls_parse_into_owner_and_repo() {
        assert_eq!(
            parse_github_url("https://github.com/rust-lang/cargo").unwrap(),
            ("rust-lang".to_string(), "cargo".to_string())
        );
        assert_eq!(
            parse_github_url("https://github.com/rust-lang/cargo.git/").unwrap(),
            ("rust-lang".to_string(), "cargo".to_string())
        );
    }

    #[test]
    fn non_github_urls_are_rejected() {
        assert!(parse_github_url("https://gitlab.com/a/b").is_err());
        assert!(parse_github_url("https://github.com/just-owner").is_err());
        assert!(parse_github_url("https://github.com/a/b/tree/main").is_err());
    }
}
