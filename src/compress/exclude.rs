//! Exclusion rules for packaging
//!
//! Paths are matched relative to the packaged location, not the workspace.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;

/// Patterns always excluded from packaged files
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".git/**",
    "**/.git",
    "**/.git/**",
    ".DS_Store",
    "**/.DS_Store",
];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Exclusion rules for filtering files
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: Vec<String>,
    glob_set: GlobSet,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        Self {
            patterns: Vec::new(),
            glob_set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }
}

impl ExcludeRules {
    /// Create exclusion rules with the defaults plus `patterns`
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExcludeError> {
        Self::default().with_patterns(patterns)
    }

    /// Add patterns from an ignore file (one glob per line, `#` comments)
    pub fn with_ignore_file(self, path: &Path) -> Result<Self, ExcludeError> {
        let contents = fs::read_to_string(path)?;
        let patterns: Vec<&str> = contents
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        self.with_patterns(&patterns)
    }

    /// Add additional patterns on top of the current ones
    pub fn with_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ExcludeError> {
        self.patterns.extend(
            patterns
                .iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty()),
        );

        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES {
            builder.add(Glob::new(pattern)?);
        }
        for pattern in &self.patterns {
            builder.add(Glob::new(pattern)?);
        }

        self.glob_set = builder.build()?;
        Ok(self)
    }

    /// User-supplied patterns, without the defaults
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.glob_set.is_match(path_str.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_git() {
        let rules = ExcludeRules::default();

        assert!(rules.is_excluded(Path::new(".git")));
        assert!(rules.is_excluded(Path::new(".git/config")));
        assert!(rules.is_excluded(Path::new("vendor/lib/.git/HEAD")));
    }

    #[test]
    fn test_default_excludes_ds_store() {
        let rules = ExcludeRules::default();

        assert!(rules.is_excluded(Path::new(".DS_Store")));
        assert!(rules.is_excluded(Path::new("dist/.DS_Store")));
    }

    #[test]
    fn test_normal_files_not_excluded() {
        let rules = ExcludeRules::default();

        assert!(!rules.is_excluded(Path::new("app.jar")));
        assert!(!rules.is_excluded(Path::new("dist/index.html")));
        assert!(!rules.is_excluded(Path::new(".gitignore")));
    }

    #[test]
    fn test_patterns_accumulate() {
        let rules = ExcludeRules::new(&["*.log"])
            .unwrap()
            .with_patterns(&["tmp/**"])
            .unwrap();

        assert!(rules.is_excluded(Path::new("debug.log")));
        assert!(rules.is_excluded(Path::new("tmp/scratch.bin")));
        assert!(rules.is_excluded(Path::new(".git")));
        assert_eq!(rules.patterns(), &["*.log".to_string(), "tmp/**".to_string()]);
    }

    #[test]
    fn test_invalid_glob_rejected() {
        assert!(matches!(
            ExcludeRules::new(&["a[b"]),
            Err(ExcludeError::GlobError(_))
        ));
    }

    #[test]
    fn test_ignore_file_parsing() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# Comment").unwrap();
        writeln!(file, "*.tmp").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  cache/**  ").unwrap();

        let rules = ExcludeRules::default().with_ignore_file(file.path()).unwrap();

        assert!(rules.is_excluded(Path::new("test.tmp")));
        assert!(rules.is_excluded(Path::new("cache/blob")));
        assert_eq!(rules.patterns().len(), 2);
    }
}
