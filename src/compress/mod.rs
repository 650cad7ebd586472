//! Packaging of workspace locations
//!
//! Turns a workspace-relative location into one temporary file ready for
//! upload. Archives are canonical: entries sorted by path, tar headers with
//! normalized mtime/uid/gid/mode, zip entries with a fixed timestamp, and a
//! gzip header without mtime. The same input bytes and mode always give the
//! same archive bytes.
//!
//! Failures are returned as `CompressError`, never as panics. The pipeline
//! treats any error as "no result" for that artifact and moves on.

mod archive;
mod exclude;

pub use archive::ArchiveCompressor;
pub use exclude::{ExcludeError, ExcludeRules};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tempfile::{NamedTempFile, TempPath};

/// How a location is packaged before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Upload a single file as-is. Directories fall back to `Zip`.
    None,
    /// Deflate zip archive
    #[default]
    Zip,
    /// Uncompressed canonical tar
    Tar,
    /// Gzip-compressed canonical tar
    #[serde(rename = "tgz", alias = "tar.gz", alias = "targz")]
    TarGz,
}

impl CompressionMode {
    /// File extension of the packaged file (empty for `None`)
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionMode::None => "",
            CompressionMode::Zip => "zip",
            CompressionMode::Tar => "tar",
            CompressionMode::TarGz => "tar.gz",
        }
    }

    /// Content type sent to the store
    pub fn content_type(&self) -> &'static str {
        match self {
            CompressionMode::None => "application/octet-stream",
            CompressionMode::Zip => "application/zip",
            CompressionMode::Tar => "application/x-tar",
            CompressionMode::TarGz => "application/gzip",
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMode::None => write!(f, "none"),
            CompressionMode::Zip => write!(f, "zip"),
            CompressionMode::Tar => write!(f, "tar"),
            CompressionMode::TarGz => write!(f, "tgz"),
        }
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CompressionMode::None),
            "zip" => Ok(CompressionMode::Zip),
            "tar" => Ok(CompressionMode::Tar),
            "tgz" | "tar.gz" | "targz" => Ok(CompressionMode::TarGz),
            other => Err(format!("unknown compression mode: {}", other)),
        }
    }
}

/// Errors for packaging operations
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("location escapes workspace: {0}")]
    PathEscapesWorkspace(String),

    #[error("location not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("nothing to package in {}", .0.display())]
    EmptyDirectory(PathBuf),

    #[error("symlink escapes workspace: {}", .path.display())]
    SymlinkEscapesRoot { path: PathBuf },

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedEntry(PathBuf),

    #[error("exclude rules error: {0}")]
    Exclude(#[from] ExcludeError),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Produces one packaged file per workspace location.
pub trait Compressor: Send + Sync {
    /// Package `location` (relative to `workspace`) using `mode`.
    fn compress(
        &self,
        workspace: &Path,
        location: &str,
        mode: CompressionMode,
    ) -> Result<PackagedFile, CompressError>;
}

/// A temporary file ready for upload.
///
/// The file on disk is deleted when this value is dropped, whichever path
/// the pipeline takes.
#[derive(Debug)]
pub struct PackagedFile {
    path: TempPath,
    mode: CompressionMode,
    len: u64,
    sha256: String,
    encrypted: bool,
}

impl PackagedFile {
    /// Seal a fully written temporary file.
    pub fn from_temp_file(file: NamedTempFile, mode: CompressionMode) -> io::Result<Self> {
        Self::seal(file, mode, false)
    }

    pub(crate) fn seal(file: NamedTempFile, mode: CompressionMode, encrypted: bool) -> io::Result<Self> {
        let path = file.into_temp_path();
        let (len, sha256) = digest_file(&path)?;
        Ok(Self {
            path,
            mode,
            len,
            sha256,
            encrypted,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective mode (may differ from the requested one, see `CompressionMode::None`)
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hex SHA-256 of the file contents
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Read the whole file into memory.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Delete the file now, reporting any error.
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

fn digest_file(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut len = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok((len, hex::encode(hasher.finalize())))
}

/// Resolve a declared location against the workspace root.
///
/// Empty and `.` mean the workspace itself. Absolute paths and paths that
/// climb above the root are rejected, as are existing paths whose canonical
/// form lies outside the root.
pub fn resolve_location(workspace: &Path, location: &str) -> Result<PathBuf, CompressError> {
    let trimmed = location.trim();
    let relative = Path::new(trimmed);

    if relative.is_absolute() {
        return Err(CompressError::PathEscapesWorkspace(trimmed.to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(CompressError::PathEscapesWorkspace(trimmed.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(CompressError::PathEscapesWorkspace(trimmed.to_string()));
            }
        }
    }

    let root = workspace
        .canonicalize()
        .map_err(|_| CompressError::NotFound(workspace.to_path_buf()))?;
    let candidate = root.join(&normalized);

    if std::fs::symlink_metadata(&candidate).is_err() {
        return Err(CompressError::NotFound(candidate));
    }

    let canonical = candidate
        .canonicalize()
        .map_err(|_| CompressError::NotFound(candidate.clone()))?;
    if !canonical.starts_with(&root) {
        return Err(CompressError::PathEscapesWorkspace(trimmed.to_string()));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("ZIP".parse::<CompressionMode>(), Ok(CompressionMode::Zip));
        assert_eq!("tar.gz".parse::<CompressionMode>(), Ok(CompressionMode::TarGz));
        assert_eq!("tgz".parse::<CompressionMode>(), Ok(CompressionMode::TarGz));
        assert_eq!("none".parse::<CompressionMode>(), Ok(CompressionMode::None));
        assert!("rar".parse::<CompressionMode>().is_err());
        assert_eq!(CompressionMode::TarGz.to_string(), "tgz");
    }

    #[test]
    fn test_mode_serde_aliases() {
        let mode: CompressionMode = serde_json::from_str("\"tar.gz\"").unwrap();
        assert_eq!(mode, CompressionMode::TarGz);
        assert_eq!(serde_json::to_string(&CompressionMode::TarGz).unwrap(), "\"tgz\"");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(CompressionMode::Zip.content_type(), "application/zip");
        assert_eq!(CompressionMode::TarGz.extension(), "tar.gz");
        assert_eq!(CompressionMode::None.extension(), "");
    }

    #[test]
    fn test_resolve_empty_is_workspace() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(resolve_location(dir.path(), "").unwrap(), root);
        assert_eq!(resolve_location(dir.path(), ".").unwrap(), root);
    }

    #[test]
    fn test_resolve_nested_with_parent_segments() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("build/out")).unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();

        let resolved = resolve_location(dir.path(), "build/../dist").unwrap();
        assert!(resolved.ends_with("dist"));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let dir = TempDir::new().unwrap();

        assert!(matches!(
            resolve_location(dir.path(), "../outside"),
            Err(CompressError::PathEscapesWorkspace(_))
        ));
        assert!(matches!(
            resolve_location(dir.path(), "/etc/passwd"),
            Err(CompressError::PathEscapesWorkspace(_))
        ));
    }

    #[test]
    fn test_resolve_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_location(dir.path(), "missing/path"),
            Err(CompressError::NotFound(_))
        ));
    }

    #[test]
    fn test_packaged_file_deleted_on_drop() {
        use std::io::Write;

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"payload").unwrap();
        let packaged = PackagedFile::from_temp_file(temp, CompressionMode::None).unwrap();
        let path = packaged.path().to_path_buf();

        assert_eq!(packaged.len(), 7);
        assert_eq!(packaged.sha256().len(), 64);
        assert!(path.exists());

        drop(packaged);
        assert!(!path.exists());
    }
}
