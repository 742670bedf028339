//! Parses [`Document`]s from source files. See [`parse_document`] for the
//! expected file layout.

use crate::document::{Document, Resource};
use crate::store::{ContentStore, Source};
use crate::tag::Tag;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use rayon::prelude::*;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FENCE: &str = "---";

/// Parses a single [`Document`] from its path relative to the content root and
/// the file contents. Each source file must be structured as follows:
///
/// 1. Initial frontmatter fence (`---`) on the first line
/// 2. YAML frontmatter with a `title` and a `date`, and optionally `draft`,
///    `tags`, `resources`, and `description`
/// 3. Terminal frontmatter fence (`---`) on a line of its own
/// 4. Markdown body
///
/// For example:
///
/// ```md
/// ---
/// title: Hello, world!
/// date: 2021-04-16
/// tags: [greet]
/// ---
/// # Hello
///
/// World
/// ```
///
/// Errors are annotated with `relative_path`.
pub fn parse_document(
    relative_path: &Path,
    contents: &str,
) -> Result<Document> {
    _parse_document(relative_path, contents).map_err(|err| {
        ParseError::Annotated {
            path: relative_path.to_owned(),
            err: Box::new(err),
        }
    })
}

fn _parse_document(relative_path: &Path, contents: &str) -> Result<Document> {
    let split = split_frontmatter(contents)?;
    let frontmatter: Frontmatter = match split.yaml.trim().is_empty() {
        true => Frontmatter::default(),
        false => serde_yaml::from_str(split.yaml)?,
    };

    let title = match frontmatter.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => return Err(ParseError::MissingTitle),
    };
    let date = match frontmatter.date {
        Some(date) => parse_date(date.trim())?,
        None => return Err(ParseError::MissingDate),
    };
    let tags = frontmatter
        .tags
        .into_vec()
        .iter()
        .map(|name| {
            let tag = Tag::new(name);
            match tag.slug.is_empty() {
                true => Err(ParseError::InvalidTag(name.clone())),
                false => Ok(tag),
            }
        })
        .collect::<Result<Vec<Tag>>>()?;

    Ok(Document {
        id: document_id(relative_path)?,
        source_path: relative_path.to_owned(),
        title,
        date,
        draft: frontmatter.draft,
        tags,
        resources: frontmatter.resources,
        description: frontmatter.description,
        body: split.body.to_owned(),
        body_line: split.body_line,
    })
}

/// Reads and parses every document in `store`. Parsing runs on the current
/// [`rayon`] pool; results come back in the store's (sorted) order, each
/// paired with the source it came from. Resources are checked against the
/// store so a document can't reference a file that won't be published.
pub fn parse_all(store: &ContentStore) -> Vec<(&Source, Result<Document>)> {
    store
        .documents
        .par_iter()
        .map(|source| (source, parse_source(store, source)))
        .collect()
}

fn parse_source(store: &ContentStore, source: &Source) -> Result<Document> {
    log::debug!("parsing `{}`", source.relative_path.display());
    let annotate = |err: ParseError| ParseError::Annotated {
        path: source.relative_path.clone(),
        err: Box::new(err),
    };
    let contents = store.read(source).map_err(|e| annotate(e.into()))?;
    let document = parse_document(&source.relative_path, &contents)?;
    for resource in &document.resources {
        if !store.contains(&document.resource_path(resource)) {
            return Err(annotate(ParseError::MissingResource(resource.clone())));
        }
    }
    Ok(document)
}

struct Split<'a> {
    yaml: &'a str,
    body: &'a str,
    body_line: usize,
}

/// Separates the frontmatter block from the body. Both fences must be on
/// lines of their own; trailing whitespace and `\r\n` endings are allowed.
fn split_frontmatter(input: &str) -> Result<Split<'_>> {
    let input = input.trim_start_matches('\u{feff}');
    let mut lines = input.split_inclusive('\n');

    let first = lines.next().unwrap_or("");
    if first.trim_end() != FENCE {
        return Err(ParseError::MissingStartFence);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for (i, line) in lines.enumerate() {
        if line.trim_end() == FENCE {
            return Ok(Split {
                yaml: &input[yaml_start..offset],
                body: &input[offset + line.len()..],
                // 1-based, after the opening fence, `i` yaml lines, and the
                // closing fence.
                body_line: i + 3,
            });
        }
        offset += line.len();
    }
    Err(ParseError::MissingEndFence)
}

/// Parses a publish timestamp. Accepts RFC 3339, a naive date-time (taken as
/// UTC), or a plain date (midnight UTC).
pub fn parse_date(input: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Ok(date);
    }
    let invalid = || ParseError::InvalidDate(input.to_owned());
    let utc = FixedOffset::east_opt(0).ok_or_else(invalid)?;
    for format in &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
    {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| utc.from_utc_datetime(&naive))
        .ok_or_else(invalid)
}

/// Derives a document ID from its relative path: `/`-separated, extension
/// removed.
fn document_id(relative_path: &Path) -> Result<String> {
    let invalid = || ParseError::InvalidFileName(relative_path.to_owned());
    let stem = relative_path.with_extension("");
    let mut components = Vec::new();
    for component in stem.components() {
        match component.as_os_str().to_str() {
            Some(s) => components.push(s),
            None => return Err(invalid()),
        }
    }
    match components.is_empty() {
        true => Err(invalid()),
        false => Ok(components.join("/")),
    }
}

#[derive(Deserialize, Default)]
struct Frontmatter {
    #[serde(default, alias = "Title", deserialize_with = "scalar")]
    title: Option<String>,

    #[serde(default, alias = "Date")]
    date: Option<String>,

    #[serde(default, alias = "Draft")]
    draft: bool,

    #[serde(default, alias = "Tags")]
    tags: Tags,

    #[serde(default, alias = "Resources")]
    resources: Vec<Resource>,

    #[serde(default, alias = "Description", deserialize_with = "scalar")]
    description: Option<String>,
}

/// `tags` may be written as a sequence, as a single scalar, or left empty.
/// Non-string scalars such as `2021` are taken by their text.
#[derive(Default)]
struct Tags(Vec<String>);

impl Tags {
    fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Tags, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TagsVisitor)
    }
}

struct TagsVisitor;

impl<'de> Visitor<'de> for TagsVisitor {
    type Value = Tags;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a tag or a sequence of tags")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Tags, E> {
        Ok(Tags::default())
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Tags, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut tags = Vec::new();
        while let Some(Scalar(tag)) = seq.next_element()? {
            tags.extend(tag);
        }
        Ok(Tags(tags))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Tags, E> {
        Ok(Tags(vec![v.to_owned()]))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Tags, E> {
        Ok(Tags(vec![v.to_string()]))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Tags, E> {
        Ok(Tags(vec![v.to_string()]))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Tags, E> {
        Ok(Tags(vec![v.to_string()]))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Tags, E> {
        Ok(Tags(vec![v.to_string()]))
    }
}

/// A YAML scalar read as text; null reads as `None`.
struct Scalar(Option<String>);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, or boolean")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Scalar, E> {
        Ok(Scalar(None))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Scalar, E>
    where
        E: de::Error,
    {
        Ok(Scalar(Some(v.to_owned())))
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Scalar, E>
    where
        E: de::Error,
    {
        Ok(Scalar(Some(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Scalar, E> {
        Ok(Scalar(Some(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Scalar, E> {
        Ok(Scalar(Some(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Scalar, E> {
        Ok(Scalar(Some(v.to_string())))
    }
}

/// Reads an optional scalar field such as `title: 1984` as text.
fn scalar<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Scalar::deserialize(deserializer)?.0)
}

/// Represents the result of a [`Document`]-parse operation.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Represents an error parsing a [`Document`] object.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Returned when a source file is missing its starting frontmatter
    /// fence (`---`).
    #[error("document must begin with `---`")]
    MissingStartFence,

    /// Returned when a source file is missing its terminal frontmatter
    /// fence (i.e., the starting fence was found but the ending one was
    /// missing).
    #[error("missing closing `---` after the frontmatter")]
    MissingEndFence,

    /// Returned when the frontmatter has no (or a blank) `title`.
    #[error("frontmatter is missing `title`")]
    MissingTitle,

    /// Returned when the frontmatter has no `date`.
    #[error("frontmatter is missing `date`")]
    MissingDate,

    #[error("invalid date `{0}`")]
    InvalidDate(String),

    /// Returned when a tag has no characters that survive slugification.
    #[error("invalid tag `{0}`")]
    InvalidTag(String),

    /// Returned when a declared resource doesn't exist.
    #[error("resource `{}` refers to missing file `{}`", .0.name, .0.src)]
    MissingResource(Resource),

    /// Returned when there was an error parsing the frontmatter as YAML.
    #[error(transparent)]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when a source file name isn't valid UTF-8.
    #[error("invalid file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error annotated with the path of the offending file.
    #[error("parsing `{}`: {}", .path.display(), .err)]
    Annotated { path: PathBuf, err: Box<ParseError> },
}

impl ParseError {
    /// Strips annotations, returning the underlying error.
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Annotated { err, .. } => err.root(),
            _ => self,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(contents: &str) -> Result<Document> {
        parse_document(Path::new("posts/cap.md"), contents)
    }

    #[test]
    fn test_parse_document() -> Result<()> {
        let doc = parse(
            "---\ntitle: Understanding CAP\ndate: 2023-02-11T09:30:00+01:00\n\
             tags: [Distributed Systems, databases]\n---\n# CAP\n",
        )?;
        assert_eq!("posts/cap", doc.id);
        assert_eq!("Understanding CAP", doc.title);
        assert_eq!("2023-02-11T09:30:00+01:00", doc.date.to_rfc3339());
        assert!(!doc.draft);
        assert_eq!("# CAP\n", doc.body);
        assert_eq!(6, doc.body_line);
        Ok(())
    }

    #[test]
    fn test_tag_order_preserved_verbatim() -> Result<()> {
        let doc = parse(
            "---\ntitle: T\ndate: 2021-01-01\n\
             tags: [Zeta, alpha, Mid Dle, alpha]\n---\n",
        )?;
        let names: Vec<&str> =
            doc.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(vec!["Zeta", "alpha", "Mid Dle", "alpha"], names);
        Ok(())
    }

    #[test]
    fn test_single_tag_string() -> Result<()> {
        let doc = parse("---\ntitle: T\ndate: 2021-01-01\ntags: solid\n---\n")?;
        assert_eq!(vec![Tag::new("solid")], doc.tags);
        Ok(())
    }

    #[test]
    fn test_scalar_tags_and_title() -> Result<()> {
        let doc = parse(
            "---\ntitle: 1984\ndate: 2021-01-01\ntags: [2021, go, true]\n---\n",
        )?;
        assert_eq!("1984", doc.title);
        let names: Vec<&str> =
            doc.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(vec!["2021", "go", "true"], names);
        assert_eq!("2021", doc.tags[0].slug);
        Ok(())
    }

    #[test]
    fn test_empty_tags() -> Result<()> {
        let doc = parse("---\ntitle: T\ndate: 2021-01-01\ntags:\n---\n")?;
        assert!(doc.tags.is_empty());
        let doc = parse("---\ntitle: T\ndate: 2021-01-01\ntags: []\n---\n")?;
        assert!(doc.tags.is_empty());
        Ok(())
    }

    #[test]
    fn test_capitalized_keys() -> Result<()> {
        let doc = parse(
            "---\nTitle: Hello\nDate: 2021-04-16\nTags: [greet]\n---\nWorld",
        )?;
        assert_eq!("Hello", doc.title);
        assert_eq!(vec![Tag::new("greet")], doc.tags);
        assert_eq!("World", doc.body);
        Ok(())
    }

    #[test]
    fn test_draft_and_resources() -> Result<()> {
        let doc = parse(
            "---\ntitle: T\ndate: 2021-01-01\ndraft: true\nresources:\n  \
             - name: featured-image\n    src: cap.png\n---\n",
        )?;
        assert!(doc.draft);
        assert_eq!(
            Some(&Resource {
                name: "featured-image".to_owned(),
                src: "cap.png".to_owned()
            }),
            doc.resource("featured-image")
        );
        Ok(())
    }

    #[test]
    fn test_crlf_and_bom() -> Result<()> {
        let doc = parse(
            "\u{feff}---\r\ntitle: T\r\ndate: 2021-01-01\r\n---\r\nbody\r\n",
        )?;
        assert_eq!("T", doc.title);
        assert_eq!("body\r\n", doc.body);
        Ok(())
    }

    #[test]
    fn test_dashes_inside_yaml_value_are_not_a_fence() -> Result<()> {
        let doc = parse("---\ntitle: a --- b\ndate: 2021-01-01\n---\nbody")?;
        assert_eq!("a --- b", doc.title);
        assert_eq!("body", doc.body);
        Ok(())
    }

    #[test]
    fn test_missing_start_fence() {
        let err = parse("title: T\n").unwrap_err();
        assert!(matches!(err.root(), ParseError::MissingStartFence));
    }

    #[test]
    fn test_missing_end_fence_names_file() {
        let err = parse("---\ntitle: T\ndate: 2021-01-01\nbody").unwrap_err();
        assert!(matches!(err.root(), ParseError::MissingEndFence));
        assert!(err.to_string().contains("posts/cap.md"));
    }

    #[test]
    fn test_missing_title() {
        let err = parse("---\ndate: 2021-01-01\n---\n").unwrap_err();
        assert!(matches!(err.root(), ParseError::MissingTitle));
        let err = parse("---\n---\n").unwrap_err();
        assert!(matches!(err.root(), ParseError::MissingTitle));
    }

    #[test]
    fn test_missing_and_invalid_date() {
        let err = parse("---\ntitle: T\n---\n").unwrap_err();
        assert!(matches!(err.root(), ParseError::MissingDate));
        let err = parse("---\ntitle: T\ndate: yesterday\n---\n").unwrap_err();
        assert!(matches!(err.root(), ParseError::InvalidDate(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("---\ntitle: [unclosed\ndate: 2021-01-01\n---\n")
            .unwrap_err();
        assert!(matches!(err.root(), ParseError::DeserializeYaml(_)));
    }

    #[test]
    fn test_parse_date_forms() -> Result<()> {
        assert_eq!(
            "2021-04-16T00:00:00+00:00",
            parse_date("2021-04-16")?.to_rfc3339()
        );
        assert_eq!(
            "2021-04-16T10:20:30+00:00",
            parse_date("2021-04-16 10:20:30")?.to_rfc3339()
        );
        assert_eq!(
            "2021-04-16T10:20:00-05:00",
            parse_date("2021-04-16T10:20:00-05:00")?.to_rfc3339()
        );
        Ok(())
    }

    #[test]
    fn test_document_id() -> Result<()> {
        assert_eq!("a/b/index", document_id(Path::new("a/b/index.md"))?);
        assert_eq!("top", document_id(Path::new("top.md"))?);
        Ok(())
    }
}
