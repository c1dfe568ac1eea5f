//! Folder scanning and playlist construction.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::Error;

/// Extensions (lowercase, without dot) that are treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Return `true` if `path` has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|e| *e == ext)
        })
}

/// Number of images one folder contributed to a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCount {
    pub folder: PathBuf,
    pub images: usize,
}

/// Ordered playlist of image paths for one session.
///
/// A catalog is never edited after construction; a settings change builds a
/// new one.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<PathBuf>,
    folders: Vec<FolderCount>,
}

impl Catalog {
    /// Scan every folder in `folders` and build a playlist.
    ///
    /// With `shuffle` the combined list is a uniform random permutation;
    /// otherwise it is sorted by full path. Folders that are missing are
    /// skipped and reported with a zero count.
    pub fn build<R: Rng + ?Sized>(folders: &[PathBuf], shuffle: bool, rng: &mut R) -> Self {
        let mut entries = Vec::new();
        let mut counts = Vec::with_capacity(folders.len());
        for folder in folders {
            let found = match scan_folder(folder) {
                Ok(found) => found,
                Err(err) => {
                    warn!(folder = %folder.display(), "skipping folder: {err}");
                    Vec::new()
                }
            };
            debug!(folder = %folder.display(), images = found.len(), "scanned folder");
            counts.push(FolderCount {
                folder: folder.clone(),
                images: found.len(),
            });
            entries.extend(found);
        }

        if shuffle {
            entries.shuffle(rng);
        } else {
            entries.sort();
        }
        info!(
            images = entries.len(),
            folders = counts.len(),
            shuffle,
            "catalog built"
        );
        Self {
            entries,
            folders: counts,
        }
    }

    /// Build a catalog from an explicit, already ordered list of paths.
    #[must_use]
    pub fn from_entries(entries: Vec<PathBuf>) -> Self {
        Self {
            entries,
            folders: Vec::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow the entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(PathBuf::as_path)
    }

    /// Borrow the entries in playback order.
    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Per-folder image counts, in the order the folders were scanned.
    #[must_use]
    pub fn folder_counts(&self) -> &[FolderCount] {
        &self.folders
    }

    /// Index after `index`, wrapping at the end.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        (index + 1) % self.entries.len()
    }

    /// Index before `index`, wrapping at the start.
    #[must_use]
    pub fn previous_index(&self, index: usize) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let len = self.entries.len();
        (index % len + len - 1) % len
    }
}

/// Recursively collect supported images below `root`.
///
/// # Errors
/// Returns [`Error::BadDir`] if `root` is missing or not a directory.
pub fn scan_folder(root: &Path) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::BadDir(root.to_path_buf()));
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        // Skip hidden dot-directories *below* the root only.
        .filter_entry(|e| !should_skip_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if is_supported_image(path) {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}
