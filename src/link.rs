//! Rewrites link targets found in document bodies. Links to other Markdown
//! documents on the site become links to their HTML pages; everything else is
//! resolved against the linking document's URL.

use url::{ParseError, Url};

const MARKDOWN_EXTENSION: &str = ".md";
const HTML_EXTENSION: &str = ".html";

pub struct Converter<'a> {
    site_root: &'a Url,
    base: Url,
}

impl<'a> Converter<'a> {
    /// Constructs a new `Converter`
    ///
    /// # Arguments
    ///
    /// * `site_root` - the URL of the site's output root; it should end in a
    ///   trailing slash.
    /// * `base` - the path of the linking page relative to `site_root` from
    ///   which relative targets are resolved.
    pub fn new(
        site_root: &'a Url,
        base: &str,
    ) -> Result<Converter<'a>, ParseError> {
        Ok(Converter {
            site_root,
            base: site_root.join(base)?,
        })
    }

    fn convert_absolute(&self, mut absolute: Url) -> Url {
        let internal = self
            .site_root
            .make_relative(&absolute)
            .map(|relative| !relative.starts_with("../"))
            .unwrap_or(false);
        if internal && absolute.path().ends_with(MARKDOWN_EXTENSION) {
            let path = absolute.path();
            let html = format!(
                "{}{}",
                &path[..path.len() - MARKDOWN_EXTENSION.len()],
                HTML_EXTENSION
            );
            absolute.set_path(&html);
        }
        absolute
    }

    fn convert_unknown(&self, url: &str) -> Result<Url, ParseError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(self.convert_absolute(absolute)),
            Err(ParseError::RelativeUrlWithoutBase) => {
                Ok(self.convert_absolute(self.base.join(url)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Converts a link target. Fragment-only links are kept as they are so
    /// in-page anchors keep working, and targets which can't be parsed are
    /// passed through untouched.
    pub fn convert(&self, url: &str) -> String {
        if url.is_empty() || url.starts_with('#') {
            return url.to_owned();
        }
        match self.convert_unknown(url) {
            Ok(converted) => converted.to_string(),
            Err(e) => {
                log::debug!("leaving link `{}` as is: {}", url, e);
                url.to_owned()
            }
        }
    }
}
