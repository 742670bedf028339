//! Loads the build configuration from an optional `lectern.yaml` project file
//! and command-line overrides.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const PROJECT_FILE: &str = "lectern.yaml";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

#[derive(Deserialize, Default)]
struct Project {
    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    site_root: Option<Url>,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default)]
    content_directory: Option<PathBuf>,

    #[serde(default)]
    theme_directory: Option<PathBuf>,

    #[serde(default)]
    output_directory: Option<PathBuf>,

    #[serde(default)]
    skip_broken: bool,

    #[serde(default)]
    threads: Option<usize>,
}

/// How a build reacts to a document that fails to parse or render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorMode {
    /// The first failing document aborts the build.
    Strict,

    /// Failing documents are reported and skipped.
    Isolated,
}

/// Settings given on the command line. They take precedence over the project
/// file; relative paths are relative to the working directory.
#[derive(Debug, Default)]
pub struct Overrides {
    pub project_file: Option<PathBuf>,
    pub content_directory: Option<PathBuf>,
    pub theme_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub drafts: bool,
    pub skip_broken: bool,
    pub threads: Option<usize>,
}

#[derive(Debug)]
pub struct Config {
    pub title: String,
    pub author: Option<Author>,

    /// The URL of the output root. Always ends in `/`.
    pub site_root: Url,

    pub content_directory: PathBuf,
    pub theme_directory: PathBuf,
    pub output_directory: PathBuf,
    pub index_page_size: usize,

    /// Whether drafts get their own pages (they are never listed).
    pub drafts: bool,

    pub error_mode: ErrorMode,

    /// The number of worker threads; `None` lets rayon decide.
    pub threads: Option<usize>,
}

impl Config {
    /// Builds the configuration for a run started in `working_directory`. The
    /// project file is the one named in `overrides`, or else the first
    /// `lectern.yaml` found in `working_directory` or one of its ancestors.
    /// Without a project file, the content, theme, and output directories
    /// must all be given as overrides.
    pub fn load(
        working_directory: &Path,
        overrides: Overrides,
    ) -> Result<Config> {
        let project_file = match &overrides.project_file {
            Some(path) => Some(working_directory.join(path)),
            None => find_project_file(working_directory),
        };
        match project_file {
            Some(path) => {
                log::debug!("using project file `{}`", path.display());
                let contents = fs::read_to_string(&path).map_err(|err| {
                    ConfigError::Open {
                        path: path.clone(),
                        err,
                    }
                })?;
                let project: Project = serde_yaml::from_str(&contents)
                    .map_err(|err| ConfigError::Yaml {
                        path: path.clone(),
                        err,
                    })?;
                // `path` is a file, so it always has a parent.
                let project_root = path.parent().unwrap_or(working_directory);
                Config::from_project(
                    project,
                    Some(project_root),
                    working_directory,
                    overrides,
                )
            }
            None => Config::from_project(
                Project::default(),
                None,
                working_directory,
                overrides,
            ),
        }
    }

    fn from_project(
        project: Project,
        project_root: Option<&Path>,
        working_directory: &Path,
        overrides: Overrides,
    ) -> Result<Config> {
        let directory = |cli: Option<PathBuf>,
                         configured: Option<PathBuf>,
                         default: &str,
                         flag: &'static str|
         -> Result<PathBuf> {
            match (cli, project_root) {
                (Some(path), _) => Ok(working_directory.join(path)),
                (None, Some(root)) => Ok(root.join(
                    configured.unwrap_or_else(|| PathBuf::from(default)),
                )),
                (None, None) => Err(ConfigError::MissingInput(flag)),
            }
        };
        let content_directory = directory(
            overrides.content_directory,
            project.content_directory,
            "content",
            "--content",
        )?;
        let theme_directory = directory(
            overrides.theme_directory,
            project.theme_directory,
            "theme",
            "--theme",
        )?;
        let output_directory = directory(
            overrides.output_directory,
            project.output_directory,
            "public",
            "--output",
        )?;

        if project.index_page_size.0 == 0 {
            return Err(ConfigError::InvalidPageSize);
        }

        let site_root = match project.site_root {
            Some(url) => url,
            None => {
                Url::from_directory_path(&output_directory).map_err(|_| {
                    ConfigError::SiteRoot(
                        output_directory.display().to_string(),
                    )
                })?
            }
        };

        Ok(Config {
            title: project.title.unwrap_or_else(|| String::from("Untitled")),
            author: project.author,
            site_root: with_trailing_slash(site_root),
            content_directory,
            theme_directory,
            output_directory,
            index_page_size: project.index_page_size.0,
            drafts: overrides.drafts,
            error_mode: match overrides.skip_broken || project.skip_broken {
                true => ErrorMode::Isolated,
                false => ErrorMode::Strict,
            },
            threads: overrides.threads.or(project.threads),
        })
    }
}

/// Searches `dir` and its ancestors for a project file.
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|d| d.join(PROJECT_FILE))
        .find(|path| path.is_file())
}

// `Url::join` drops the last path segment unless it ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the project file can't be read.
    #[error("opening project file `{}`: {}", .path.display(), .err)]
    Open { path: PathBuf, err: io::Error },

    /// Returned when the project file is malformed.
    #[error("loading configuration `{}`: {}", .path.display(), .err)]
    Yaml {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when a required input is neither configured nor given.
    #[error("no project file found; `{0}` is required")]
    MissingInput(&'static str),

    #[error("`index_page_size` must be at least 1")]
    InvalidPageSize,

    /// Returned when no site root is configured and the output directory
    /// can't be expressed as a `file://` URL.
    #[error("can't derive a site root from `{0}`; set `site_root`")]
    SiteRoot(String),
}

#[cfg(test)]
mod test {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_load_project_file_from_ancestor() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Notes\nsite_root: https://example.org/blog\n\
             author:\n  name: Jane\n\
             index_page_size: 3\ncontent_directory: articles\n",
        )?;
        let nested = dir.path().join("articles/2021");
        fs::create_dir_all(&nested)?;

        let config = Config::load(&nested, Overrides::default())?;
        assert_eq!("Notes", config.title);
        assert_eq!("https://example.org/blog/", config.site_root.as_str());
        assert_eq!(
            Some("Jane"),
            config.author.as_ref().map(|a| a.name.as_str())
        );
        assert_eq!(3, config.index_page_size);
        assert_eq!(dir.path().join("articles"), config.content_directory);
        assert_eq!(dir.path().join("theme"), config.theme_directory);
        assert_eq!(dir.path().join("public"), config.output_directory);
        assert_eq!(ErrorMode::Strict, config.error_mode);
        Ok(())
    }

    #[test]
    fn test_overrides_take_precedence() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "output_directory: public\nthreads: 2\n",
        )?;
        let config = Config::load(
            dir.path(),
            Overrides {
                output_directory: Some(PathBuf::from("elsewhere")),
                skip_broken: true,
                threads: Some(4),
                ..Overrides::default()
            },
        )?;
        assert_eq!(dir.path().join("elsewhere"), config.output_directory);
        assert_eq!(ErrorMode::Isolated, config.error_mode);
        assert_eq!(Some(4), config.threads);
        Ok(())
    }

    #[test]
    fn test_without_project_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let config = Config::load(
            dir.path(),
            Overrides {
                content_directory: Some(PathBuf::from("content")),
                theme_directory: Some(PathBuf::from("theme")),
                output_directory: Some(PathBuf::from("out")),
                ..Overrides::default()
            },
        )?;
        assert_eq!("file", config.site_root.scheme());
        assert!(config.site_root.as_str().ends_with("/out/"));
        Ok(())
    }

    #[test]
    fn test_missing_inputs_without_project_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        match Config::load(dir.path(), Overrides::default()) {
            Err(ConfigError::MissingInput(flag)) => {
                assert_eq!("--content", flag)
            }
            other => panic!("wanted MissingInput; found {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_zero_page_size() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "index_page_size: 0\n")?;
        assert!(matches!(
            Config::load(dir.path(), Overrides::default()),
            Err(ConfigError::InvalidPageSize)
        ));
        Ok(())
    }
}
