//! Stream-archive containers.
//!
//! An archive is a `.zip` or `.tar` container whose entries are bz2-compressed
//! line-delimited JSON. Enumeration and entry retrieval are separated so each
//! pipeline worker can hold its own [`EntryReader`] onto the container instead
//! of sharing one file cursor across threads.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Result, XvError};

/// A stream-archive container on disk.
pub struct Archive {
    path: PathBuf,
    name: String,
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    Tar,
}

/// One valid entry inside a container: a relative path plus enough location
/// information to retrieve it without re-enumerating.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    path: String,
    location: Location,
}

#[derive(Debug, Clone)]
enum Location {
    ZipIndex(usize),
    TarRange { offset: u64, size: u64 },
}

impl EntryInfo {
    /// Path of the entry relative to the container root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Archive {
    /// Open a container, dispatching on its extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(XvError::archive_not_found(path));
        }
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("zip") => Format::Zip,
            Some("tar") => Format::Tar,
            _ => return Err(XvError::unsupported_archive(path)),
        };
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        Ok(Self {
            path: path.to_path_buf(),
            name,
            format,
        })
    }

    /// The container's file name, used to key completed-entry markers.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enumerate the container's `.bz2` entries in container order.
    /// Directories and entries with other suffixes are skipped.
    pub fn entries(&self) -> Result<Vec<EntryInfo>> {
        match self.format {
            Format::Zip => self.zip_entries(),
            Format::Tar => self.tar_entries(),
        }
    }

    fn zip_entries(&self) -> Result<Vec<EntryInfo>> {
        let mut zip = ZipArchive::new(BufReader::new(self.open_file()?))?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip.by_index_raw(index)?;
            if file.is_dir() || !file.name().ends_with(".bz2") {
                continue;
            }
            entries.push(EntryInfo {
                path: file.name().to_string(),
                location: Location::ZipIndex(index),
            });
        }
        debug!(archive = %self.name, count = entries.len(), "enumerated zip entries");
        Ok(entries)
    }

    fn tar_entries(&self) -> Result<Vec<EntryInfo>> {
        let mut tar = tar::Archive::new(BufReader::new(self.open_file()?));
        let mut entries = Vec::new();
        for entry in tar.entries()? {
            let entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().into_owned();
            if !path.ends_with(".bz2") {
                continue;
            }
            entries.push(EntryInfo {
                path,
                location: Location::TarRange {
                    offset: entry.raw_file_position(),
                    size: entry.size(),
                },
            });
        }
        debug!(archive = %self.name, count = entries.len(), "enumerated tar entries");
        Ok(entries)
    }

    /// Open a fresh handle for retrieving entry byte streams. Each pipeline
    /// worker calls this once and keeps the reader for its whole run.
    pub fn reader(&self) -> Result<EntryReader> {
        match self.format {
            Format::Zip => Ok(EntryReader::Zip(ZipArchive::new(BufReader::new(
                self.open_file()?,
            ))?)),
            Format::Tar => Ok(EntryReader::Tar(self.open_file()?)),
        }
    }

    fn open_file(&self) -> Result<File> {
        File::open(&self.path).map_err(|source| XvError::path_error("open archive", &self.path, source))
    }
}

/// A private handle onto one container, owned by one worker.
pub enum EntryReader {
    Zip(ZipArchive<BufReader<File>>),
    Tar(File),
}

impl EntryReader {
    /// Open one entry as a decompressed byte stream. The stream borrows the
    /// reader, so a worker fully consumes one entry before opening the next.
    pub fn open(&mut self, entry: &EntryInfo) -> Result<Box<dyn Read + '_>> {
        match (self, &entry.location) {
            (Self::Zip(zip), Location::ZipIndex(index)) => {
                let raw = zip.by_index(*index)?;
                Ok(Box::new(MultiBzDecoder::new(raw)))
            }
            (Self::Tar(file), Location::TarRange { offset, size }) => {
                file.seek(SeekFrom::Start(*offset))?;
                Ok(Box::new(MultiBzDecoder::new(file.take(*size))))
            }
            _ => Err(XvError::EntryNotFound {
                entry: entry.path.clone(),
            }),
        }
    }
}

/// Expand a mixed list of archive files and directories into a sorted list of
/// container paths. Directories contribute their directly contained
/// `.zip`/`.tar` files; explicitly named files are taken as given.
pub fn collect_archives(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(XvError::archive_not_found(input));
        }
        if input.is_dir() {
            for entry in WalkDir::new(input).min_depth(1).max_depth(1).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() && is_container(entry.path()) {
                    found.push(entry.into_path());
                }
            }
        } else {
            found.push(input.clone());
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

fn is_container(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("zip" | "tar")
    )
}
