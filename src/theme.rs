//! Loads a theme: the templates named in `theme.yaml` and an optional
//! `static/` directory of assets.

use gtmpl::Template;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "theme.yaml";
pub const STATIC_DIRECTORY: &str = "static";

#[derive(Deserialize)]
struct Manifest {
    document_template: Vec<PathBuf>,
    index_template: Vec<PathBuf>,

    #[serde(default)]
    tag_template: Option<Vec<PathBuf>>,

    #[serde(default)]
    tags_template: Option<Vec<PathBuf>>,
}

/// The parsed templates of a theme.
pub struct Theme {
    /// The template for document pages.
    pub document: Template,

    /// The template for chronological listing pages.
    pub index: Template,

    /// The template for per-tag listing pages; the index template is used
    /// when absent.
    tag: Option<Template>,

    /// The template for the page listing all tags. No such page is written
    /// when absent.
    pub tags: Option<Template>,

    /// The theme's static asset directory, if it has one.
    pub static_directory: Option<PathBuf>,
}

impl Theme {
    /// Loads the theme rooted at `root`. Every template named in the manifest
    /// must exist and parse.
    pub fn load(root: &Path) -> Result<Theme> {
        let manifest_path = root.join(MANIFEST_FILE);
        let contents =
            fs::read_to_string(&manifest_path).map_err(|err| {
                TemplateError::Open {
                    path: manifest_path.clone(),
                    err,
                }
            })?;
        let manifest: Manifest =
            serde_yaml::from_str(&contents).map_err(|err| {
                TemplateError::Manifest {
                    path: manifest_path,
                    err,
                }
            })?;

        let static_directory = root.join(STATIC_DIRECTORY);
        let theme = Theme {
            document: parse_template(
                "document_template",
                root,
                &manifest.document_template,
            )?,
            index: parse_template(
                "index_template",
                root,
                &manifest.index_template,
            )?,
            tag: optional_template(
                "tag_template",
                root,
                &manifest.tag_template,
            )?,
            tags: optional_template(
                "tags_template",
                root,
                &manifest.tags_template,
            )?,
            static_directory: match static_directory.is_dir() {
                true => Some(static_directory),
                false => None,
            },
        };
        log::debug!("loaded theme from `{}`", root.display());
        Ok(theme)
    }

    /// The template for per-tag listing pages.
    pub fn tag(&self) -> &Template {
        self.tag.as_ref().unwrap_or(&self.index)
    }
}

fn optional_template(
    kind: &'static str,
    root: &Path,
    files: &Option<Vec<PathBuf>>,
) -> Result<Option<Template>> {
    match files {
        Some(files) => Ok(Some(parse_template(kind, root, files)?)),
        None => Ok(None),
    }
}

// Loads the template file contents, concatenates them, and parses the result
// into a single template so later files can use `define`s from earlier ones.
fn parse_template(
    kind: &'static str,
    root: &Path,
    files: &[PathBuf],
) -> Result<Template> {
    if files.is_empty() {
        return Err(TemplateError::Empty(kind));
    }

    let mut contents = String::new();
    for file in files {
        let path = root.join(file);
        let text = fs::read_to_string(&path).map_err(|err| TemplateError::Open {
            path: path.clone(),
            err,
        })?;
        contents.push_str(&text);
        contents.push(' ');
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|message| TemplateError::Parse {
            kind,
            message: message.to_string(),
        })?;
    Ok(template)
}

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Represents a missing or malformed template. Any of these aborts the build
/// since no page can be produced without its template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Returned when a theme file can't be read.
    #[error("opening theme file `{}`: {}", .path.display(), .err)]
    Open { path: PathBuf, err: io::Error },

    /// Returned when `theme.yaml` is malformed.
    #[error("parsing theme manifest `{}`: {}", .path.display(), .err)]
    Manifest {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when a template lists no files.
    #[error("`{0}` must list at least one file")]
    Empty(&'static str),

    /// Returned for errors parsing template files.
    #[error("parsing `{kind}`: {message}")]
    Parse { kind: &'static str, message: String },

    /// Returned for errors applying a template to a page.
    #[error("executing template for `{}`: {}", .path.display(), .message)]
    Execute { path: PathBuf, message: String },
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_theme(dir: &Path, manifest: &str) -> io::Result<()> {
        fs::write(dir.join(MANIFEST_FILE), manifest)?;
        fs::write(
            dir.join("base.html"),
            r#"{{ define "header" }}<h1>{{ .site.title }}</h1>{{ end }}"#,
        )?;
        fs::write(
            dir.join("document.html"),
            r#"{{ template "header" . }}{{ .item.body }}"#,
        )?;
        fs::write(
            dir.join("index.html"),
            r#"{{ range .item }}{{ .title }}{{ end }}"#,
        )
    }

    #[test]
    fn test_load() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        write_theme(
            dir.path(),
            "document_template: [base.html, document.html]\n\
             index_template: [index.html]\n",
        )?;
        let theme = Theme::load(dir.path())?;
        assert!(theme.tags.is_none());
        assert!(theme.static_directory.is_none());
        Ok(())
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        match Theme::load(dir.path()) {
            Err(TemplateError::Open { path, .. }) => {
                assert!(path.ends_with(MANIFEST_FILE))
            }
            _ => panic!("wanted TemplateError::Open"),
        }
    }

    #[test]
    fn test_missing_template_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        write_theme(
            dir.path(),
            "document_template: [document.html]\n\
             index_template: [missing.html]\n",
        )?;
        match Theme::load(dir.path()) {
            Err(TemplateError::Open { path, .. }) => {
                assert!(path.ends_with("missing.html"))
            }
            _ => panic!("wanted TemplateError::Open"),
        }
        Ok(())
    }

    #[test]
    fn test_malformed_template() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        write_theme(
            dir.path(),
            "document_template: [broken.html]\nindex_template: [index.html]\n",
        )?;
        fs::write(
            dir.path().join("broken.html"),
            "{{ if .item }}never closed",
        )?;
        match Theme::load(dir.path()) {
            Err(TemplateError::Parse { kind, .. }) => {
                assert_eq!("document_template", kind)
            }
            _ => panic!("wanted TemplateError::Parse"),
        }
        Ok(())
    }
}
