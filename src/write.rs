//! Turns rendered documents and the [`SiteIndex`] into [`Page`]s, applies
//! the theme's templates, and writes the results to disk.

use crate::build::FEED_FILE;
use crate::document::RenderedDocument;
use crate::index::SiteIndex;
use crate::tag::Tag;
use crate::theme::{TemplateError, Theme};
use crate::value;
use gtmpl::{Context, Template};
use gtmpl_value::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Site-wide values made available to every template as `.site`.
pub struct Site<'a> {
    pub title: &'a str,
    pub site_root: &'a Url,
}

impl Site<'_> {
    fn to_value(&self) -> Result<Value> {
        Ok(value::object(vec![
            ("title", value::string(self.title)),
            ("home_page", value::url(self.site_root)),
            ("static_url", value::url(&self.site_root.join("static/")?)),
            ("feed_url", value::url(&self.site_root.join(FEED_FILE)?)),
        ]))
    }
}

/// Responsible for indexing, templating, and writing HTML pages to disk from
/// [`RenderedDocument`]s.
pub struct Writer<'a> {
    pub theme: &'a Theme,
    pub site: Site<'a>,

    /// The number of documents per listing page.
    pub index_page_size: usize,
}

/// An object representing an output HTML file.
pub struct Page<'a> {
    /// The target location relative to the output directory.
    pub path: PathBuf,

    /// The page-specific part of the template value; see [`Writer::execute`]
    /// for the complete shape.
    pub value: Vec<(&'static str, Value)>,

    /// The template with which the page will be rendered.
    pub template: &'a Template,
}

impl<'a> Writer<'a> {
    /// Creates every page of the site: one per document, the chronological
    /// listing, the per-tag listings, and, if the theme has a template for
    /// it, the tag overview. Fails if two pages would be written to the same
    /// path.
    pub fn pages(
        &self,
        documents: &[RenderedDocument],
        index: &SiteIndex,
    ) -> Result<Vec<Page<'a>>> {
        let mut pages = self.document_pages(documents, index)?;

        let main = Listing {
            directory: String::new(),
            tag: None,
            documents: &index.chronological,
        };
        pages.extend(main.to_pages(self, documents, &self.theme.index)?);

        for entry in index.tags.values() {
            let listing = Listing {
                directory: entry.tag.path(),
                tag: Some(&entry.tag),
                documents: &entry.documents,
            };
            pages.extend(listing.to_pages(self, documents, self.theme.tag())?);
        }

        if let Some(template) = &self.theme.tags {
            let tags = index
                .tags
                .values()
                .map(|entry| {
                    let url = entry.tag.url(self.site.site_root)?;
                    Ok(value::object(vec![
                        ("name", value::string(entry.tag.name.as_str())),
                        ("slug", value::string(entry.tag.slug.as_str())),
                        ("url", value::url(&url)),
                        ("count", value::number(entry.documents.len())),
                    ]))
                })
                .collect::<Result<Vec<Value>>>()?;
            pages.push(Page {
                path: PathBuf::from("tags/index.html"),
                value: vec![
                    ("item", Value::Array(tags)),
                    ("prev", Value::Nil),
                    ("next", Value::Nil),
                ],
                template,
            });
        }

        let mut seen = HashSet::new();
        for page in &pages {
            if !seen.insert(page.path.as_path()) {
                return Err(AssembleError::OutputCollision(page.path.clone()));
            }
        }
        Ok(pages)
    }

    /// Creates one page per document. Published documents link to their
    /// neighbours in the chronological listing; drafts link nowhere.
    fn document_pages(
        &self,
        documents: &[RenderedDocument],
        index: &SiteIndex,
    ) -> Result<Vec<Page<'a>>> {
        let url = |q: usize| &documents[index.chronological[q]].url;
        documents
            .iter()
            .enumerate()
            .map(|(i, rendered)| {
                let (prev, next) = match index.position(i) {
                    None => (None, None),
                    Some(p) => (
                        p.checked_sub(1).map(url),
                        Some(p + 1)
                            .filter(|&q| q < index.chronological.len())
                            .map(url),
                    ),
                };
                Ok(Page {
                    path: PathBuf::from(rendered.document.output_path()),
                    value: vec![
                        ("item", self.document_value(rendered, true)?),
                        ("prev", value::optional_url(prev)),
                        ("next", value::optional_url(next)),
                    ],
                    template: &self.theme.document,
                })
            })
            .collect()
    }

    /// Converts a document into a template value. Listing pages get the
    /// summary in place of the full body.
    fn document_value(
        &self,
        rendered: &RenderedDocument,
        full: bool,
    ) -> Result<Value> {
        let site_root = self.site.site_root;
        let doc = &rendered.document;
        let (summary, summarized) = rendered.summary();

        let tags = doc
            .tags
            .iter()
            .map(|tag| {
                Ok(value::object(vec![
                    ("name", value::string(tag.name.as_str())),
                    ("slug", value::string(tag.slug.as_str())),
                    ("url", value::url(&tag.url(site_root)?)),
                ]))
            })
            .collect::<Result<Vec<Value>>>()?;
        let resources = doc
            .resources
            .iter()
            .map(|resource| {
                let url = site_root.join(&doc.resource_path(resource))?;
                Ok(value::object(vec![
                    ("name", value::string(resource.name.as_str())),
                    ("url", value::url(&url)),
                ]))
            })
            .collect::<Result<Vec<Value>>>()?;
        let featured_image = match doc.resource("featured-image") {
            Some(resource) => {
                Some(site_root.join(&doc.resource_path(resource))?)
            }
            None => None,
        };

        Ok(value::object(vec![
            ("id", value::string(doc.id.as_str())),
            ("url", value::url(&rendered.url)),
            ("title", value::string(doc.title.as_str())),
            ("date", value::string(doc.date.format("%Y-%m-%d").to_string())),
            ("datetime", value::string(doc.date.to_rfc3339())),
            ("draft", Value::Bool(doc.draft)),
            (
                "description",
                match &doc.description {
                    Some(description) => value::string(description.as_str()),
                    None => Value::Nil,
                },
            ),
            ("tags", Value::Array(tags)),
            ("resources", Value::Array(resources)),
            ("featured_image", value::optional_url(featured_image.as_ref())),
            (
                "body",
                value::string(match full {
                    true => rendered.body.as_str(),
                    false => summary,
                }),
            ),
            ("summary", value::string(summary)),
            ("summarized", Value::Bool(summarized)),
        ]))
    }

    /// Applies a page's template. The value handed to the template is the
    /// page's own fields plus `site`.
    pub fn execute<W: io::Write>(&self, page: &Page, w: &mut W) -> Result<()> {
        let mut fields = page.value.clone();
        fields.push(("site", self.site.to_value()?));
        let context = Context::from(value::object(fields)).map_err(|message| {
            TemplateError::Execute {
                path: page.path.clone(),
                message: message.to_string(),
            }
        })?;
        page.template
            .execute(w, &context)
            .map_err(|message| TemplateError::Execute {
                path: page.path.clone(),
                message: message.to_string(),
            })?;
        Ok(())
    }

    /// Templates and writes `pages` beneath `output_directory`.
    pub fn write_pages(
        &self,
        pages: &[Page],
        output_directory: &Path,
    ) -> Result<()> {
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        for page in pages {
            let file_path = output_directory.join(&page.path);
            if let Some(dir) = file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    fs::create_dir_all(dir)?;
                }
            }
            log::debug!("writing `{}`", page.path.display());
            let mut file = io::BufWriter::new(File::create(&file_path)?);
            self.execute(page, &mut file)?;
            file.flush()?;
        }
        Ok(())
    }
}

/// A collection of documents listed together: either every published
/// document, or those bearing one tag.
struct Listing<'t> {
    /// The directory of the listing's pages relative to the output root,
    /// either empty or ending in `/`.
    directory: String,

    tag: Option<&'t Tag>,

    /// Positions of the listed documents, in order.
    documents: &'t [usize],
}

impl Listing<'_> {
    /// Paginates the listing. The first page is `index.html` and the rest
    /// are `1.html`, `2.html`, etc. An empty listing still gets its first
    /// page.
    fn to_pages<'a>(
        &self,
        writer: &Writer<'a>,
        documents: &[RenderedDocument],
        template: &'a Template,
    ) -> Result<Vec<Page<'a>>> {
        let page_size = writer.index_page_size.max(1);
        let chunks: Vec<&[usize]> = match self.documents.is_empty() {
            true => vec![self.documents],
            false => self.documents.chunks(page_size).collect(),
        };
        let total_pages = chunks.len();
        let site_root = writer.site.site_root;
        let page_path =
            |i: usize| format!("{}{}", self.directory, file_name(i));
        let page_url = |i: usize| site_root.join(&page_path(i));

        let tag = match self.tag {
            Some(tag) => value::object(vec![
                ("name", value::string(tag.name.as_str())),
                ("slug", value::string(tag.slug.as_str())),
                ("url", value::url(&tag.url(site_root)?)),
            ]),
            None => Value::Nil,
        };

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let items = chunk
                    .iter()
                    .map(|&d| writer.document_value(&documents[d], false))
                    .collect::<Result<Vec<Value>>>()?;
                let prev = match i {
                    0 => None,
                    _ => Some(page_url(i - 1)?),
                };
                let next = match i + 1 < total_pages {
                    true => Some(page_url(i + 1)?),
                    false => None,
                };
                Ok(Page {
                    path: PathBuf::from(page_path(i)),
                    value: vec![
                        ("item", Value::Array(items)),
                        ("prev", value::optional_url(prev.as_ref())),
                        ("next", value::optional_url(next.as_ref())),
                        ("tag", tag.clone()),
                        ("page_number", value::number(i + 1)),
                        ("total_pages", value::number(total_pages)),
                    ],
                    template,
                })
            })
            .collect()
    }
}

fn file_name(page: usize) -> String {
    match page {
        0 => String::from("index.html"),
        _ => format!("{}.html", page),
    }
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, AssembleError>;

/// Represents an error in a page-writing operation.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Returned when two pages map to the same output file.
    #[error("more than one page would be written to `{}`", .0.display())]
    OutputCollision(PathBuf),

    /// An error during templating.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Returned when a page URL can't be built.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// An error writing the output files.
    #[error(transparent)]
    Io(#[from] io::Error),
}
