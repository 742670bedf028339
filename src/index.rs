//! Builds the chronological listing and the tag index from a set of
//! documents. Both are derived data: they hold positions into the document
//! slice they were built from and are rebuilt on every run.

use crate::document::Document;
use crate::tag::Tag;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The documents bearing one tag.
#[derive(Debug)]
pub struct TagEntry {
    /// The first-seen form of the tag in chronological order; its name is
    /// used for display.
    pub tag: Tag,

    /// Positions of the tagged documents, in chronological-listing order.
    /// Each document appears at most once.
    pub documents: Vec<usize>,
}

#[derive(Debug)]
pub struct SiteIndex {
    /// Positions of all published documents, newest first.
    pub chronological: Vec<usize>,

    /// Tag slug to tagged documents.
    pub tags: BTreeMap<String, TagEntry>,
}

impl SiteIndex {
    /// Indexes `documents`. Drafts are left out of both the chronological
    /// listing and the tag index.
    pub fn build<D: AsRef<Document>>(documents: &[D]) -> SiteIndex {
        let mut chronological: Vec<usize> = (0..documents.len())
            .filter(|&i| !documents[i].as_ref().draft)
            .collect();
        chronological.sort_by(|&a, &b| {
            listing_order(documents[a].as_ref(), documents[b].as_ref())
        });

        let mut tags: BTreeMap<String, TagEntry> = BTreeMap::new();
        for &i in &chronological {
            for tag in &documents[i].as_ref().tags {
                let entry =
                    tags.entry(tag.slug.clone()).or_insert_with(|| TagEntry {
                        tag: tag.clone(),
                        documents: Vec::new(),
                    });
                // A document listing the same tag twice is still indexed
                // once; documents arrive in order so only the tail can match.
                if entry.documents.last() != Some(&i) {
                    entry.documents.push(i);
                }
            }
        }

        SiteIndex {
            chronological,
            tags,
        }
    }

    /// The position of document `i` within the chronological listing, if it
    /// is published.
    pub fn position(&self, i: usize) -> Option<usize> {
        self.chronological.iter().position(|&j| j == i)
    }

    pub fn tag(&self, slug: &str) -> Option<&TagEntry> {
        self.tags.get(slug)
    }
}

/// Orders documents newest first. Equal timestamps fall back to the document
/// ID so the listing is the same on every build.
pub fn listing_order(a: &Document, b: &Document) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::test::document;

    fn ids<'a>(documents: &'a [Document], positions: &[usize]) -> Vec<&'a str> {
        positions.iter().map(|&i| documents[i].id.as_str()).collect()
    }

    #[test]
    fn test_chronological_newest_first() {
        let documents = vec![
            document("old", "2020-01-01", &[]),
            document("new", "2022-01-01", &[]),
            document("mid", "2021-01-01", &[]),
        ];
        let index = SiteIndex::build(&documents);
        assert_eq!(
            vec!["new", "mid", "old"],
            ids(&documents, &index.chronological)
        );
    }

    #[test]
    fn test_equal_timestamps_order_by_id_on_every_build() {
        let forward = vec![
            document("b", "2021-01-01", &[]),
            document("c", "2021-01-01", &[]),
            document("a", "2021-01-01", &[]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        for documents in &[forward, reversed] {
            let index = SiteIndex::build(documents);
            assert_eq!(
                vec!["a", "b", "c"],
                ids(documents, &index.chronological)
            );
        }
    }

    #[test]
    fn test_drafts_are_never_indexed() {
        let mut draft = document("draft", "2022-01-01", &["X"]);
        draft.draft = true;
        let documents =
            vec![draft, document("published", "2021-01-01", &["X"])];
        let index = SiteIndex::build(&documents);
        assert_eq!(vec!["published"], ids(&documents, &index.chronological));
        for entry in index.tags.values() {
            assert!(!entry.documents.contains(&0));
        }
        assert_eq!(None, index.position(0));
        assert_eq!(Some(0), index.position(1));
    }

    #[test]
    fn test_documents_are_indexed_under_exactly_their_tags() {
        let documents = vec![
            document("a", "2021-01-01", &["solid", "Design"]),
            document("b", "2021-01-02", &["design", "cap"]),
            document("c", "2021-01-03", &[]),
        ];
        let index = SiteIndex::build(&documents);
        assert_eq!(
            vec!["cap", "design", "solid"],
            index.tags.keys().map(String::as_str).collect::<Vec<_>>()
        );
        let tagged = |slug: &str| match index.tag(slug) {
            Some(entry) => ids(&documents, &entry.documents),
            None => panic!("missing tag `{}`", slug),
        };
        assert_eq!(vec!["b", "a"], tagged("design"));
        assert_eq!(vec!["a"], tagged("solid"));
        assert_eq!(vec!["b"], tagged("cap"));

        for (i, doc) in documents.iter().enumerate() {
            for (slug, entry) in &index.tags {
                let tagged = doc.tags.iter().any(|t| &t.slug == slug);
                assert_eq!(tagged, entry.documents.contains(&i));
            }
        }
    }

    #[test]
    fn test_duplicate_tags_index_once() {
        let documents = vec![document("a", "2021-01-01", &["x", "X", "x"])];
        let index = SiteIndex::build(&documents);
        assert_eq!(vec![0], index.tag("x").expect("x").documents);
    }

    #[test]
    fn test_display_name_is_first_seen() {
        let documents = vec![
            document("old", "2020-01-01", &["design"]),
            document("new", "2021-01-01", &["Design"]),
        ];
        let index = SiteIndex::build(&documents);
        assert_eq!("Design", index.tag("design").expect("design").tag.name);
    }
}
