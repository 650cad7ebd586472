//! Canonical archive writers

use flate2::{Compression, GzBuilder};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Builder, Header};
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{resolve_location, CompressError, CompressionMode, Compressor, ExcludeRules, PackagedFile};

/// Default prefix for temporary packaged files
pub const TEMP_PREFIX: &str = "artifact-publisher-";

/// One archive member, keyed by its `/`-separated name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    File { source: PathBuf, executable: bool },
    Directory,
    Symlink { target: PathBuf },
}

/// Packages workspace locations into canonical zip/tar/tar.gz files.
#[derive(Debug, Clone)]
pub struct ArchiveCompressor {
    excludes: ExcludeRules,
    temp_dir: Option<PathBuf>,
    temp_prefix: String,
    dereference_symlinks: bool,
}

impl Default for ArchiveCompressor {
    fn default() -> Self {
        Self {
            excludes: ExcludeRules::default(),
            temp_dir: None,
            temp_prefix: TEMP_PREFIX.to_string(),
            dereference_symlinks: false,
        }
    }
}

impl ArchiveCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excludes(mut self, excludes: ExcludeRules) -> Self {
        self.excludes = excludes;
        self
    }

    /// Directory for temporary files (system temp dir when unset)
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Prefix temporary file names, typically with the project name
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Archive the contents of symlinks instead of the links themselves
    pub fn with_dereference_symlinks(mut self, dereference: bool) -> Self {
        self.dereference_symlinks = dereference;
        self
    }

    fn temp_file(&self, suffix: &str) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.temp_prefix).suffix(suffix);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    fn collect_entries(
        &self,
        root: &Path,
        source: &Path,
    ) -> Result<BTreeMap<String, EntryKind>, CompressError> {
        let mut entries = BTreeMap::new();

        // Excluded directories are pruned so nothing beneath them is walked.
        let walker = WalkDir::new(source)
            .follow_links(self.dereference_symlinks)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| match e.path().strip_prefix(source) {
                Ok(rel) if !rel.as_os_str().is_empty() => !self.excludes.is_excluded(rel),
                _ => true,
            });

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            let rel_path = match path.strip_prefix(source) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };

            if entry.path_is_symlink() {
                check_symlink(root, path)?;
            }

            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink {
                    target: fs::read_link(path)?,
                }
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File {
                    source: path.to_path_buf(),
                    executable: is_executable(path),
                }
            } else {
                return Err(CompressError::UnsupportedEntry(path.to_path_buf()));
            };

            entries.insert(archive_name(rel_path), kind);
        }

        Ok(entries)
    }

    fn copy_file(&self, source: &Path) -> Result<PackagedFile, CompressError> {
        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut temp = self.temp_file(&suffix)?;
        {
            let mut input = File::open(source)?;
            let mut output = BufWriter::new(temp.as_file_mut());
            io::copy(&mut input, &mut output)?;
            output.flush()?;
        }
        Ok(PackagedFile::from_temp_file(temp, CompressionMode::None)?)
    }
}

impl Compressor for ArchiveCompressor {
    fn compress(
        &self,
        workspace: &Path,
        location: &str,
        mode: CompressionMode,
    ) -> Result<PackagedFile, CompressError> {
        let source = resolve_location(workspace, location)?;
        let root = workspace.canonicalize()?;
        let metadata = fs::metadata(&source)?;

        let entries = if metadata.is_file() {
            if mode == CompressionMode::None {
                return self.copy_file(&source);
            }
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| CompressError::UnsupportedEntry(source.clone()))?;
            let mut single = BTreeMap::new();
            single.insert(
                name,
                EntryKind::File {
                    executable: is_executable(&source),
                    source: source.clone(),
                },
            );
            single
        } else if metadata.is_dir() {
            self.collect_entries(&root, &source)?
        } else {
            return Err(CompressError::UnsupportedEntry(source));
        };

        if entries.values().all(|kind| *kind == EntryKind::Directory) {
            return Err(CompressError::EmptyDirectory(source));
        }

        // A directory cannot be uploaded raw.
        let effective = match mode {
            CompressionMode::None => CompressionMode::Zip,
            other => other,
        };

        let mut temp = self.temp_file(&format!(".{}", effective.extension()))?;
        match effective {
            CompressionMode::Tar => {
                let mut writer = write_tar(BufWriter::new(temp.as_file_mut()), &entries)?;
                writer.flush()?;
            }
            CompressionMode::TarGz => {
                let encoder = GzBuilder::new()
                    .mtime(0)
                    .write(BufWriter::new(temp.as_file_mut()), Compression::default());
                let mut writer = write_tar(encoder, &entries)?.finish()?;
                writer.flush()?;
            }
            CompressionMode::Zip | CompressionMode::None => {
                write_zip(temp.as_file_mut(), &entries)?;
            }
        }

        Ok(PackagedFile::from_temp_file(temp, effective)?)
    }
}

fn canonical_header(mode: u32, entry_type: tar::EntryType) -> Header {
    let mut header = Header::new_gnu();
    header.set_size(0);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode);
    header.set_entry_type(entry_type);
    header
}

fn write_tar<W: Write>(writer: W, entries: &BTreeMap<String, EntryKind>) -> io::Result<W> {
    let mut builder = Builder::new(writer);

    for (name, kind) in entries {
        match kind {
            EntryKind::File { source, executable } => {
                let file = File::open(source)?;
                let mode = if *executable { 0o755 } else { 0o644 };
                let mut header = canonical_header(mode, tar::EntryType::Regular);
                header.set_size(file.metadata()?.len());
                builder.append_data(&mut header, name, file)?;
            }
            EntryKind::Directory => {
                let mut header = canonical_header(0o755, tar::EntryType::Directory);
                builder.append_data(&mut header, format!("{}/", name), io::empty())?;
            }
            EntryKind::Symlink { target } => {
                let mut header = canonical_header(0o777, tar::EntryType::Symlink);
                builder.append_link(&mut header, name, target)?;
            }
        }
    }

    builder.into_inner()
}

fn zip_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(mode)
}

/// Entries past 4 GiB need ZIP64 headers, which the writer only emits when asked.
fn zip_file_options(mode: u32, size: u64) -> SimpleFileOptions {
    zip_options(mode).large_file(needs_zip64(size))
}

fn needs_zip64(size: u64) -> bool {
    size >= u64::from(u32::MAX)
}

fn write_zip(file: &mut File, entries: &BTreeMap<String, EntryKind>) -> Result<(), CompressError> {
    let mut zip = ZipWriter::new(file);

    for (name, kind) in entries {
        match kind {
            EntryKind::File { source, executable } => {
                let mode = if *executable { 0o755 } else { 0o644 };
                let mut input = File::open(source)?;
                let size = input.metadata()?.len();
                zip.start_file(name.as_str(), zip_file_options(mode, size))?;
                io::copy(&mut input, &mut zip)?;
            }
            EntryKind::Directory => {
                zip.add_directory(name.as_str(), zip_options(0o755))?;
            }
            EntryKind::Symlink { target } => {
                let target = target.to_string_lossy().to_string();
                zip.add_symlink(name.as_str(), target, zip_options(0o777))?;
            }
        }
    }

    zip.finish()?.flush()?;
    Ok(())
}

/// Reject symlinks whose target lies outside `root`.
fn check_symlink(root: &Path, link: &Path) -> Result<(), CompressError> {
    let target = fs::read_link(link)?;
    let resolved = if target.is_absolute() {
        target
    } else {
        link.parent().unwrap_or(link).join(target)
    };

    let canonical = resolved
        .canonicalize()
        .unwrap_or_else(|_| lexical_normalize(&resolved));
    if !canonical.starts_with(root) {
        return Err(CompressError::SymlinkEscapesRoot {
            path: link.to_path_buf(),
        });
    }
    Ok(())
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn archive_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    false
}
