//! Defines the [`Document`] type, the in-memory form of one article, and
//! [`RenderedDocument`], a document paired with its HTML body.

use crate::tag::Tag;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::path::PathBuf;
use url::{ParseError, Url};

/// The fold marker separating a document's summary from the rest of its body.
pub const FOLD_TAG: &str = "<!-- more -->";

/// A file attached to a document under a logical role, e.g., the
/// `featured-image`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Resource {
    /// The logical role of the resource.
    pub name: String,

    /// The path of the resource relative to the document's directory.
    pub src: String,
}

/// One article parsed from the content store.
#[derive(Clone, Debug)]
pub struct Document {
    /// The source path relative to the content root, `/`-separated and
    /// without the `.md` extension (e.g., `posts/solid`). Unique within a
    /// site and used as the tie-break when ordering documents.
    pub id: String,

    /// The source path relative to the content root.
    pub source_path: PathBuf,

    /// The title of the document.
    pub title: String,

    /// The publish timestamp.
    pub date: DateTime<FixedOffset>,

    /// Drafts are excluded from every published index.
    pub draft: bool,

    /// The tags in their declared order.
    pub tags: Vec<Tag>,

    /// Attached files, e.g., a featured image.
    pub resources: Vec<Resource>,

    /// An optional plain-text description for listing pages and feeds.
    pub description: Option<String>,

    /// The Markdown body.
    pub body: String,

    /// The 1-based line in the source file on which the body starts.
    pub body_line: usize,
}

impl Document {
    /// The output path of the document's page relative to the site root.
    pub fn output_path(&self) -> String {
        format!("{}.html", self.id)
    }

    /// The directory containing the document relative to the site root,
    /// either empty or ending in `/`.
    pub fn directory(&self) -> &str {
        match self.id.rfind('/') {
            Some(i) => &self.id[..=i],
            None => "",
        }
    }

    /// The URL of the document's page.
    pub fn url(&self, site_root: &Url) -> Result<Url, ParseError> {
        site_root.join(&self.output_path())
    }

    /// Looks up a resource by its logical role.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// The path of a resource relative to the site root.
    pub fn resource_path(&self, resource: &Resource) -> String {
        format!(
            "{}{}",
            self.directory(),
            resource.src.trim_start_matches("./")
        )
    }
}

impl AsRef<Document> for Document {
    fn as_ref(&self) -> &Document {
        self
    }
}

/// A [`Document`] together with its rendered HTML body.
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    pub document: Document,

    /// The absolute URL of the document's page.
    pub url: Url,

    /// The rendered HTML body.
    pub body: String,
}

impl RenderedDocument {
    /// Returns the part of the body above the fold and whether a fold was
    /// found. Without a fold the whole body is the summary.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }
}

impl AsRef<Document> for RenderedDocument {
    fn as_ref(&self) -> &Document {
        &self.document
    }
}
