//! Shell-style glob matching for include/exclude file filters.
//!
//! Patterns support `*` (any run of characters, including `/`) and `?`
//! (any single character), matched against the whole path relative to
//! the source root. `*.rs` therefore matches `src/lib.rs`, and
//! `*tests/*` matches anything under a `tests` directory.

use regex::Regex;

use tutorgen_core::pipeline::PipelineError;

/// A compiled set of glob patterns. Matches if ANY pattern matches.
#[derive(Debug)]
pub struct PatternSet {
    regexes: Vec<Regex>,
}

impl PatternSet {
    /// Compile a list of glob patterns.
    pub fn compile(patterns: &[String]) -> Result<Self, PipelineError> {
        let regexes = patterns
            .iter()
            .map(|pattern| {
                Regex::new(&glob_to_regex(pattern)).map_err(|e| {
                    PipelineError::Source(format!("Invalid file pattern \"{pattern}\": {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regexes })
    }

    /// Whether any pattern matches the given relative path.
    pub fn matches(&self, path: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(path))
    }
}

/// Translate one glob pattern into an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
