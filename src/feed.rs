//! Support for creating Atom feeds from a list of documents.

use crate::config::Author;
use crate::document::RenderedDocument;
use atom_syndication::{Category, Content, Entry, Feed, Link, Person};
use chrono::{DateTime, FixedOffset};
use std::io::Write;
use thiserror::Error;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub author: Option<&'a Author>,
    pub home_page: &'a Url,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and the published
/// documents (newest first) and writes the result to a [`std::io::Write`].
pub fn write_feed<'a, W, I>(
    config: &FeedConfig,
    documents: I,
    w: W,
) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a RenderedDocument>,
{
    feed(config, documents).write_to(w)?;
    Ok(())
}

fn feed<'a, I>(config: &FeedConfig, documents: I) -> Feed
where
    I: IntoIterator<Item = &'a RenderedDocument>,
{
    let entries: Vec<Entry> = documents
        .into_iter()
        .map(|rendered| feed_entry(config, rendered))
        .collect();

    // The feed is as fresh as its newest entry, which keeps rebuilds of
    // unchanged content byte-identical.
    let updated: DateTime<FixedOffset> = entries
        .iter()
        .map(|entry| *entry.updated())
        .max()
        .unwrap_or_else(|| chrono::Utc::now().into());

    let mut feed = Feed::default();
    feed.set_title(config.title.to_owned());
    feed.set_id(config.home_page.to_string());
    feed.set_updated(updated);
    feed.set_authors(author_to_people(config.author));
    feed.set_links(vec![link(config.home_page)]);
    feed.set_entries(entries);
    feed
}

fn feed_entry(config: &FeedConfig, rendered: &RenderedDocument) -> Entry {
    let (summary, _) = rendered.summary();
    let doc = &rendered.document;

    let mut content = Content::default();
    content.set_content_type(Some("html".to_owned()));
    content.set_value(Some(summary.to_owned()));

    let categories = doc
        .tags
        .iter()
        .map(|tag| {
            let mut category = Category::default();
            category.set_term(tag.slug.as_str());
            category.set_label(Some(tag.name.clone()));
            category
        })
        .collect::<Vec<Category>>();

    let mut entry = Entry::default();
    entry.set_id(rendered.url.to_string());
    entry.set_title(doc.title.clone());
    entry.set_updated(doc.date);
    entry.set_published(Some(doc.date));
    entry.set_authors(author_to_people(config.author));
    entry.set_links(vec![link(&rendered.url)]);
    entry.set_categories(categories);
    entry.set_content(Some(content));
    entry
}

fn link(url: &Url) -> Link {
    let mut link = Link::default();
    link.set_href(url.as_str());
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, FeedError>;

/// Represents a problem creating a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Returned when there is an Atom-related error, including I/O errors
    /// while writing.
    #[error(transparent)]
    Atom(#[from] atom_syndication::Error),
}
