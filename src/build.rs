//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: discovering and parsing the
//! documents ([`crate::parser`]), rendering them ([`crate::markdown`]),
//! indexing them ([`crate::index`]), assembling pages ([`crate::write`]),
//! copying assets, and generating the Atom feed ([`crate::feed`]).
//!
//! A build is all-or-nothing: everything is written to a staging directory
//! beside the output directory, which replaces the output directory only once
//! the whole site has been produced.

use crate::config::{Config, ErrorMode};
use crate::document::{Document, RenderedDocument};
use crate::feed::{write_feed, FeedConfig, FeedError};
use crate::index::SiteIndex;
use crate::markdown::{RenderError, Renderer};
use crate::parser::{parse_all, ParseError};
use crate::shortcode::Registry;
use crate::store::{ContentStore, Source, StoreError};
use crate::theme::{TemplateError, Theme};
use crate::write::{AssembleError, Site, Writer};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Marks a directory as produced by a build so later builds may replace it.
pub const MARKER_FILE: &str = ".lectern";

pub const FEED_FILE: &str = "feed.atom";

/// A document left out of an isolated-mode build.
#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// A summary of a finished build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// The number of document pages written, drafts included.
    pub documents: usize,

    /// The number of drafts among them.
    pub drafts: usize,

    /// The number of pages written, listings included.
    pub pages: usize,

    pub skipped: Vec<Skipped>,
}

/// Builds the site described by a [`Config`] on a thread pool sized by
/// `config.threads`.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()?;
    pool.install(|| build(config))
}

fn build(config: &Config) -> Result<BuildReport> {
    check_replaceable(&config.output_directory)?;

    // Without templates no page can be produced, so the theme is loaded
    // before any content work.
    let theme = Theme::load(&config.theme_directory)?;
    let store = ContentStore::discover(&config.content_directory)?;
    let mut skipped = Vec::new();

    let mut documents: Vec<Document> =
        Vec::with_capacity(store.documents.len());
    for (source, result) in parse_all(&store) {
        match result {
            Ok(document) => documents.push(document),
            Err(err) => isolate(
                config.error_mode,
                source,
                BuildError::Parse(err),
                &mut skipped,
            )?,
        }
    }
    if !config.drafts {
        documents.retain(|document| !document.draft);
    }

    let renderer =
        Renderer::new(config.site_root.clone(), Registry::with_builtins());
    let results: Vec<std::result::Result<RenderedDocument, RenderError>> =
        documents
            .par_iter()
            .map(|document| renderer.render(document))
            .collect();
    let mut rendered = Vec::with_capacity(results.len());
    for (document, result) in documents.iter().zip(results) {
        match result {
            Ok(r) => rendered.push(r),
            Err(err) => {
                let err = BuildError::Render {
                    path: document.source_path.clone(),
                    err,
                };
                match config.error_mode {
                    ErrorMode::Strict => return Err(err),
                    ErrorMode::Isolated => {
                        skip(&document.source_path, err, &mut skipped)
                    }
                }
            }
        }
    }

    let index = SiteIndex::build(&rendered);
    log::info!(
        "indexed {} published documents under {} tags",
        index.chronological.len(),
        index.tags.len()
    );

    let writer = Writer {
        theme: &theme,
        site: Site {
            title: &config.title,
            site_root: &config.site_root,
        },
        index_page_size: config.index_page_size,
    };
    let pages = writer.pages(&rendered, &index)?;
    let mut claimed: HashSet<&Path> =
        pages.iter().map(|p| p.path.as_path()).collect();
    claimed.insert(Path::new(FEED_FILE));
    for asset in &store.assets {
        if !claimed.insert(&asset.relative_path) {
            let path = asset.relative_path.clone();
            return Err(AssembleError::OutputCollision(path).into());
        }
    }

    let staging = staging_directory(&config.output_directory)?;
    let staged = (|| -> Result<()> {
        if let Some(dir) = &theme.static_directory {
            copy_dir(dir, &staging.join(crate::theme::STATIC_DIRECTORY))?;
        }
        for asset in &store.assets {
            copy_file(
                &asset.absolute_path,
                &staging.join(&asset.relative_path),
            )?;
        }
        writer.write_pages(&pages, &staging)?;

        let mut feed_file =
            BufWriter::new(File::create(staging.join(FEED_FILE))?);
        write_feed(
            &FeedConfig {
                title: &config.title,
                author: config.author.as_ref(),
                home_page: &config.site_root,
            },
            index.chronological.iter().map(|&i| &rendered[i]),
            &mut feed_file,
        )?;
        feed_file.flush()?;

        fs::write(staging.join(MARKER_FILE), "generated by lectern\n")?;
        Ok(())
    })();
    if let Err(err) = staged {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }
    replace_output(&staging, &config.output_directory)?;

    Ok(BuildReport {
        documents: rendered.len(),
        drafts: rendered.iter().filter(|r| r.document.draft).count(),
        pages: pages.len(),
        skipped,
    })
}

fn isolate(
    mode: ErrorMode,
    source: &Source,
    err: BuildError,
    skipped: &mut Vec<Skipped>,
) -> Result<()> {
    match mode {
        ErrorMode::Strict => Err(err),
        ErrorMode::Isolated => {
            skip(&source.relative_path, err, skipped);
            Ok(())
        }
    }
}

fn skip(path: &Path, err: BuildError, skipped: &mut Vec<Skipped>) {
    log::warn!("skipping `{}`: {}", path.display(), err);
    skipped.push(Skipped {
        path: path.to_owned(),
        reason: err.to_string(),
    });
}

/// Refuses to touch an output directory that holds anything but a previous
/// build's output.
fn check_replaceable(output_directory: &Path) -> Result<()> {
    let foreign =
        || BuildError::ForeignOutputDirectory(output_directory.to_owned());
    if !output_directory.exists() {
        return Ok(());
    }
    if !output_directory.is_dir() {
        return Err(foreign());
    }
    let empty = fs::read_dir(output_directory)?.next().is_none();
    if empty || output_directory.join(MARKER_FILE).is_file() {
        Ok(())
    } else {
        Err(foreign())
    }
}

/// Creates a fresh, empty staging directory beside `output_directory`.
fn staging_directory(output_directory: &Path) -> Result<PathBuf> {
    let name = output_directory.file_name().ok_or_else(|| {
        BuildError::ForeignOutputDirectory(output_directory.to_owned())
    })?;
    let staging = output_directory
        .with_file_name(format!(".{}.staging", name.to_string_lossy()));
    rmdir(&staging)?;
    fs::create_dir_all(&staging)?;
    Ok(staging)
}

fn replace_output(staging: &Path, output_directory: &Path) -> Result<()> {
    rmdir(output_directory)?;
    fs::rename(staging, output_directory)?;
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result.map_err(StoreError::from)?;
        if entry.file_type().is_file() {
            // strip_prefix shouldn't fail since `src` is always an ancestor
            // of the entry.
            if let Ok(relative) = entry.path().strip_prefix(src) {
                copy_file(entry.path(), &dst.join(relative))?;
            }
        }
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(BuildError::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// The error type for building a site.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Returned when the content directory can't be walked.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Returned for errors during parsing.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Returned for errors rendering a document body.
    #[error("rendering `{}`: {}", .path.display(), .err)]
    Render { path: PathBuf, err: RenderError },

    /// Returned for missing or malformed templates.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Returned for errors assembling or writing pages.
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// Returned for errors writing the feed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Returned when the output directory exists but wasn't created by a
    /// build.
    #[error(
        "refusing to replace `{}`: it is not empty and was not created by \
         lectern",
        .0.display()
    )]
    ForeignOutputDirectory(PathBuf),

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory `{}`: {}", .path.display(), .err)]
    Clean { path: PathBuf, err: io::Error },

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),
}
