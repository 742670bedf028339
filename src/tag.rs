//! Defines the [`Tag`] type, which represents a [`crate::document::Document`]
//! tag.

use serde::{Deserialize, Deserializer};
use std::hash::{Hash, Hasher};
use url::{ParseError, Url};

/// Represents a [`crate::document::Document`] tag. The `name` is kept exactly
/// as it was declared in the front-matter while the `slug` is derived from it
/// and used for equality, hashing, and URLs.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag's name as declared by the author.
    pub name: String,

    /// The slugified name, so e.g., `macOS` and `MacOS` resolve to the same
    /// value, and also so the field can be dropped into a [`Url`].
    pub slug: String,
}

impl Tag {
    /// Creates a tag from its declared name.
    pub fn new(name: &str) -> Tag {
        Tag {
            name: name.to_owned(),
            slug: slug::slugify(name),
        }
    }

    /// The path of the tag's first listing page relative to the site root.
    pub fn path(&self) -> String {
        format!("tags/{}/", self.slug)
    }

    /// The URL of the tag's first listing page. Given a `site_root`, this
    /// looks like `{site_root}/tags/{slug}/index.html`.
    pub fn url(&self, site_root: &Url) -> Result<Url, ParseError> {
        // NOTE: `Url::join` treats the last path component as a file name
        // unless it has a trailing slash, so the whole relative path is
        // joined at once.
        site_root.join(&format!("{}index.html", self.path()))
    }
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `slug`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slug.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `slug` field.
    fn eq(&self, other: &Self) -> bool {
        self.slug == other.slug
    }
}
impl Eq for Tag {}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Tag, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Tag::new(&String::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tags_compare_by_slug() {
        assert_eq!(Tag::new("macOS"), Tag::new("MacOS"));
        assert_ne!(Tag::new("go"), Tag::new("rust"));
    }

    #[test]
    fn test_name_is_verbatim() {
        let tag = Tag::new("Distributed Systems");
        assert_eq!("Distributed Systems", tag.name);
        assert_eq!("distributed-systems", tag.slug);
    }

    #[test]
    fn test_url() -> Result<(), ParseError> {
        let site_root = Url::parse("https://example.org/blog/")?;
        assert_eq!(
            "https://example.org/blog/tags/cap-theorem/index.html",
            Tag::new("CAP theorem").url(&site_root)?.as_str(),
        );
        Ok(())
    }
}
