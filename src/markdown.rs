//! Converts [`Document`] bodies to HTML. Shortcodes are expanded first (never
//! inside code blocks or code spans), then the result is parsed with
//! [`pulldown_cmark`], link targets are rewritten by
//! [`crate::link::Converter`], and the events are written by
//! [`crate::htmlrenderer`].

use crate::document::{Document, RenderedDocument};
use crate::htmlrenderer::push_html;
use crate::link::Converter as LinkConverter;
use crate::shortcode::{Registry, Unclosed};
use pulldown_cmark::escape::StrWrite;
use pulldown_cmark::*;
use std::io;
use thiserror::Error;
use url::Url;

/// Renders document bodies for one site.
#[derive(Debug)]
pub struct Renderer {
    site_root: Url,
    shortcodes: Registry,
}

impl Renderer {
    pub fn new(site_root: Url, shortcodes: Registry) -> Renderer {
        Renderer {
            site_root,
            shortcodes,
        }
    }

    /// Renders a document's body. This is a pure function of the document
    /// and the renderer, so rendering the same document twice yields the
    /// same bytes.
    pub fn render(
        &self,
        document: &Document,
    ) -> Result<RenderedDocument, RenderError> {
        let url = document.url(&self.site_root)?;
        let expanded = self.expand(&document.body, document.body_line)?;
        let mut body = String::with_capacity(expanded.len() * 3 / 2);
        to_html(
            &mut body,
            &self.site_root,
            &document.output_path(),
            &expanded,
            url.as_str(),
        )?;
        Ok(RenderedDocument {
            document: document.clone(),
            url,
            body,
        })
    }

    /// Checks that every code fence is closed and expands shortcodes outside
    /// of code.
    fn expand(
        &self,
        body: &str,
        first_line: usize,
    ) -> Result<String, RenderError> {
        let mut out = String::with_capacity(body.len());
        for segment in segments(body, first_line)? {
            match segment {
                Segment::Prose { text, line } => out.push_str(
                    &self.shortcodes.expand(text, line).map_err(
                        |Unclosed { name, line }| {
                            RenderError::UnclosedShortcode { name, line }
                        },
                    )?,
                ),
                Segment::Code(text) => out.push_str(text),
            }
        }
        Ok(out)
    }
}

/// Converts markdown to HTML, writing the result into `w`.
///
/// * `site_root` is the URL of the output root (e.g., https://example.org/).
///   This should end in a trailing slash.
/// * `output_path` is the path of the page being rendered relative to
///   `site_root`; relative links are resolved against it.
/// * `markdown` is the body to convert.
/// * `footnote_prefix` is the prefix to prepend onto footnote links.
pub fn to_html<W: StrWrite>(
    w: &mut W,
    site_root: &Url,
    output_path: &str,
    markdown: &str,
    footnote_prefix: &str,
) -> Result<(), RenderError> {
    let event_converter = EventConverter {
        link_converter: LinkConverter::new(site_root, output_path)?,
    };
    push_html(
        w,
        Parser::new_ext(markdown, options())
            .map(|ev| event_converter.convert(ev)),
        footnote_prefix,
    )?;
    Ok(())
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

struct EventConverter<'a> {
    link_converter: LinkConverter<'a>,
}

impl<'a> EventConverter<'a> {
    fn convert_tag<'b>(&self, tag: Tag<'b>) -> Tag<'b> {
        match tag {
            // Internal links (links from documents to documents and assets)
            // need to be converted from their input formats to their output
            // formats (e.g., a document linking to another document as
            // `foo.md` will need to be converted to an equivalent link ending
            // in `foo.html`).
            Tag::Link(LinkType::Email, url, title) => {
                Tag::Link(LinkType::Email, url, title)
            }
            Tag::Link(link, url, title) => {
                Tag::Link(link, self.convert_url(&url), title)
            }
            Tag::Image(link, url, title) => {
                Tag::Image(link, self.convert_url(&url), title)
            }
            _ => tag,
        }
    }

    fn convert_url<'b>(&self, url: &str) -> CowStr<'b> {
        CowStr::Boxed(self.link_converter.convert(url).into_boxed_str())
    }

    fn convert<'b>(&self, ev: Event<'b>) -> Event<'b> {
        match ev {
            Event::Start(tag) => Event::Start(self.convert_tag(tag)),
            _ => ev,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    /// Text outside of code and the 1-based line it starts on.
    Prose { text: &'a str, line: usize },

    /// A code block (fences included) or an inline code span.
    Code(&'a str),
}

/// Splits `body` into prose and code as [`pulldown_cmark`] sees it, so fences
/// nested in lists or block quotes and inline code spans count as code. A
/// fenced block without a closing fence is an error.
fn segments(
    body: &str,
    first_line: usize,
) -> Result<Vec<Segment<'_>>, RenderError> {
    let line_at =
        |offset: usize| first_line + body[..offset].matches('\n').count();
    let mut segments = Vec::new();
    let mut cursor = 0;

    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
        let block = match &event {
            Event::Start(Tag::CodeBlock(kind)) => {
                if let CodeBlockKind::Fenced(_) = kind {
                    if !is_closed(&body[range.clone()]) {
                        return Err(RenderError::UnterminatedCodeFence {
                            line: line_at(range.start),
                        });
                    }
                }
                true
            }
            Event::Code(_) => false,
            _ => continue,
        };
        if range.start < cursor {
            continue;
        }

        let mut end = range.end;
        // Blocks own their trailing newline so the next prose segment starts
        // on a line of its own.
        if block
            && !body[..end].ends_with('\n')
            && body[end..].starts_with('\n')
        {
            end += 1;
        }
        if range.start > cursor {
            segments.push(Segment::Prose {
                text: &body[cursor..range.start],
                line: line_at(cursor),
            });
        }
        segments.push(Segment::Code(&body[range.start..end]));
        cursor = end;
    }

    if body.len() > cursor {
        segments.push(Segment::Prose {
            text: &body[cursor..],
            line: line_at(cursor),
        });
    }
    Ok(segments)
}

/// Reports whether a fenced code block's source ends with a closing fence: a
/// line after the opening one made only of the opening character, at least
/// as many times. Leading block quote markers are ignored.
fn is_closed(block: &str) -> bool {
    let strip = |line: &str| {
        line.trim_start_matches(|c| c == ' ' || c == '>').trim_end().to_owned()
    };
    let mut lines = block.lines().map(strip);
    let opening = match lines.next() {
        Some(line) => line,
        None => return false,
    };
    let marker = match opening.chars().next() {
        Some(c) if c == '`' || c == '~' => c,
        _ => return false,
    };
    let len = opening.chars().take_while(|&c| c == marker).count();
    match lines.filter(|line| !line.is_empty()).last() {
        Some(closing) => {
            closing.chars().all(|c| c == marker)
                && closing.chars().count() >= len
        }
        None => false,
    }
}

/// Represents an error converting markdown to HTML. Everything other than an
/// unclosed construct degrades to literal text.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Returned when a code fence is never closed.
    #[error("code fence opened on line {line} is never closed")]
    UnterminatedCodeFence { line: usize },

    /// Returned when a paired shortcode is never closed.
    #[error("shortcode `{name}` opened on line {line} is never closed")]
    UnclosedShortcode { name: String, line: usize },

    /// Returned when the document's own URL can't be built.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// Returned for errors writing the HTML.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::test::document;

    fn renderer() -> Renderer {
        Renderer::new(
            Url::parse("https://example.org/").expect("url"),
            Registry::with_builtins(),
        )
    }

    fn render(body: &str) -> Result<String, RenderError> {
        let mut doc = document("posts/cap", "2021-01-01", &[]);
        doc.body = body.to_owned();
        Ok(renderer().render(&doc)?.body)
    }

    #[test]
    fn test_rendering_is_idempotent() -> Result<(), RenderError> {
        let body = "# CAP\n\nPick *two*.[^1]\n\n```go\nfunc main() {}\n```\n\n\
                    | C | A | P |\n|---|---|---|\n| y | y | n |\n\n\
                    {{< mermaid >}}\ngraph TD; C-->A\n{{< /mermaid >}}\n\n[^1]: Brewer.\n";
        assert_eq!(render(body)?, render(body)?);
        Ok(())
    }

    #[test]
    fn test_headings_keep_their_level() -> Result<(), RenderError> {
        assert_eq!("<h1>Title</h1><h3>Sub</h3>", render("# Title\n### Sub\n")?);
        Ok(())
    }

    #[test]
    fn test_internal_links_are_converted() -> Result<(), RenderError> {
        assert_eq!(
            r#"<p><a href="https://example.org/posts/solid.html" title="">SOLID</a></p>"#,
            render("[SOLID](solid.md)")?
        );
        Ok(())
    }

    #[test]
    fn test_images_are_resolved() -> Result<(), RenderError> {
        assert_eq!(
            r#"<p><img src="https://example.org/posts/cap.png" alt="CAP" /></p>"#,
            render("![CAP](cap.png)")?
        );
        Ok(())
    }

    #[test]
    fn test_code_is_not_executed_or_expanded() -> Result<(), RenderError> {
        let html =
            render("```python\n{{< mermaid >}}\n<script>x</script>\n```\n")?;
        assert_eq!(
            "<pre><code class=\"language-python\">{{&lt; mermaid &gt;}}\n\
             &lt;script&gt;x&lt;/script&gt;\n</code></pre>",
            html
        );
        Ok(())
    }

    #[test]
    fn test_mermaid_shortcode() -> Result<(), RenderError> {
        assert_eq!(
            "<div class=\"mermaid\">graph TD; C--&gt;A</div>\n",
            render("{{< mermaid >}}\ngraph TD; C-->A\n{{< /mermaid >}}\n")?
        );
        Ok(())
    }

    #[test]
    fn test_unknown_shortcode_passes_through() -> Result<(), RenderError> {
        assert_eq!(
            "<p>{{&lt; tweet 123 &gt;}}</p>",
            render("{{< tweet 123 >}}")?
        );
        Ok(())
    }

    #[test]
    fn test_unterminated_code_fence() {
        let mut doc = document("posts/cap", "2021-01-01", &[]);
        doc.body = "intro\n\n```rust\nfn main() {}\n".to_owned();
        doc.body_line = 5;
        match renderer().render(&doc) {
            Err(RenderError::UnterminatedCodeFence { line }) => {
                assert_eq!(7, line)
            }
            other => panic!("wanted UnterminatedCodeFence; found {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_shortcode() {
        match render("{{< mermaid >}}\ngraph TD;\n") {
            Err(RenderError::UnclosedShortcode { name, line }) => {
                assert_eq!("mermaid", name);
                assert_eq!(1, line);
            }
            other => panic!("wanted UnclosedShortcode; found {:?}", other),
        }
    }

    #[test]
    fn test_malformed_markdown_degrades_to_text() -> Result<(), RenderError> {
        assert_eq!(
            "<p>**not bold [link](</p>",
            render("**not bold [link](")?
        );
        Ok(())
    }

    #[test]
    fn test_segments() -> Result<(), RenderError> {
        assert_eq!(
            vec![
                Segment::Prose {
                    text: "a\n",
                    line: 1
                },
                Segment::Code("~~~~\n~~~\n~~~~\n"),
                Segment::Prose {
                    text: "b ",
                    line: 5
                },
                Segment::Code("`c`"),
                Segment::Prose {
                    text: "\n",
                    line: 5
                },
            ],
            segments("a\n~~~~\n~~~\n~~~~\nb `c`\n", 1)?
        );
        Ok(())
    }

    #[test]
    fn test_fence_in_list_item_is_code() -> Result<(), RenderError> {
        let html = render(
            "1.  Step\n\n    ```md\n    {{< mermaid >}}\n    ```\n",
        )?;
        assert!(html.contains("{{&lt; mermaid &gt;}}"));
        assert!(!html.contains("class=\"mermaid\""));
        Ok(())
    }

    #[test]
    fn test_unterminated_fence_in_list_item() {
        match render("- Step\n\n  ```md\n  {{< mermaid >}}\n") {
            Err(RenderError::UnterminatedCodeFence { line }) => {
                assert_eq!(3, line)
            }
            other => panic!("wanted UnterminatedCodeFence; found {:?}", other),
        }
    }

    #[test]
    fn test_code_span_is_not_expanded() -> Result<(), RenderError> {
        assert_eq!(
            "<p>Write <code>{{&lt; mermaid &gt;}}</code> to start a diagram.</p>",
            render("Write `{{< mermaid >}}` to start a diagram.")?
        );
        Ok(())
    }

    #[test]
    fn test_indented_code_is_not_expanded() -> Result<(), RenderError> {
        let html = render("Intro.\n\n    {{< mermaid >}}\n")?;
        assert!(html.contains("<pre><code>{{&lt; mermaid &gt;}}"));
        Ok(())
    }
}
