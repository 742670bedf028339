//! The library code for the `lectern` static site generator. A build is a
//! pipeline of four steps:
//!
//! 1. Parsing documents from Markdown source files with YAML front-matter
//!    ([`crate::store`], [`crate::parser`])
//! 2. Rendering each document body to HTML, expanding shortcodes and
//!    rewriting links ([`crate::markdown`], [`crate::shortcode`])
//! 3. Indexing the published documents, chronologically and by tag
//!    ([`crate::index`])
//! 4. Assembling the output: document pages, paginated listings, the tag
//!    overview, the Atom feed, and copied assets ([`crate::write`],
//!    [`crate::feed`], [`crate::build`])
//!
//! The first two steps run per-document in parallel; the others need a view
//! of the whole site. The index is a plain value computed once from the
//! rendered documents, and each listing page is a window into it, so
//! documents are never copied into the pages that list them.
//!
//! The fourth step writes to a staging directory which replaces the output
//! directory only once every file has been produced.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod document;
pub mod feed;
mod htmlrenderer;
pub mod index;
mod link;
pub mod markdown;
pub mod parser;
pub mod shortcode;
pub mod store;
pub mod tag;
pub mod theme;
mod value;
pub mod write;
