//! Discovers the source files in a content directory. Markdown files become
//! documents; every other file is an asset which is copied verbatim into the
//! output tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

pub const MARKDOWN_EXTENSION: &str = "md";

/// A file found in the content directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    /// The path relative to the content root.
    pub relative_path: PathBuf,

    /// The path on disk.
    pub absolute_path: PathBuf,
}

/// The set of files under a content root, in sorted order.
#[derive(Debug)]
pub struct ContentStore {
    pub root: PathBuf,
    pub documents: Vec<Source>,
    pub assets: Vec<Source>,
}

impl ContentStore {
    /// Walks `root` recursively. Entries whose name begins with `.` are
    /// skipped along with everything beneath them.
    pub fn discover(root: &Path) -> Result<ContentStore> {
        if !root.is_dir() {
            return Err(StoreError::MissingRoot(root.to_owned()));
        }

        let mut documents = Vec::new();
        let mut assets = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for result in walker {
            let entry = result?;
            if !entry.file_type().is_file() {
                continue;
            }
            let source = Source {
                // strip_prefix shouldn't fail since `root` is always an
                // ancestor of the entry.
                relative_path: entry
                    .path()
                    .strip_prefix(root)
                    .map_err(|_| {
                        StoreError::OutsideRoot(entry.path().to_owned())
                    })?
                    .to_owned(),
                absolute_path: entry.path().to_owned(),
            };
            if is_markdown(entry.path()) {
                documents.push(source);
            } else {
                assets.push(source);
            }
        }

        log::debug!(
            "discovered {} documents and {} assets in `{}`",
            documents.len(),
            assets.len(),
            root.display()
        );
        Ok(ContentStore {
            root: root.to_owned(),
            documents,
            assets,
        })
    }

    /// Reads the contents of a document source.
    pub fn read(&self, source: &Source) -> io::Result<String> {
        fs::read_to_string(&source.absolute_path)
    }

    /// Reports whether a file exists at `relative_path` under the content
    /// root.
    pub fn contains(&self, relative_path: &str) -> bool {
        self.root.join(relative_path).is_file()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == MARKDOWN_EXTENSION)
        .unwrap_or(false)
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Represents an error discovering content.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Returned when the content root doesn't exist or isn't a directory.
    #[error("content directory `{}` does not exist", .0.display())]
    MissingRoot(PathBuf),

    /// Returned when a walked entry isn't beneath the content root.
    #[error("`{}` is outside of the content directory", .0.display())]
    OutsideRoot(PathBuf),

    /// Returned for WalkDir I/O errors.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}
