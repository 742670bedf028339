//! Shortcodes are directives embedded in Markdown bodies, written
//! `{{< name key="value" >}}` or, when they wrap content,
//! `{{< name >}}inner{{< /name >}}`. Registered names are expanded to HTML by
//! a [`Handler`]; anything else is left in place as literal text.

use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;
use std::fmt;

const OPEN: &str = "{{<";
const CLOSE: &str = ">}}";

/// A single argument in a shortcode call. Positional arguments have no key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arg {
    pub key: Option<String>,
    pub value: String,
}

/// A parsed shortcode invocation.
#[derive(Debug)]
pub struct Call<'a> {
    pub name: &'a str,
    pub args: Vec<Arg>,

    /// The wrapped content, for paired shortcodes.
    pub inner: Option<&'a str>,
}

impl Call<'_> {
    /// Looks up a named argument.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|a| a.key.as_deref() == Some(key))
            .map(|a| a.value.as_str())
    }

    /// Looks up the `n`th positional argument.
    pub fn positional(&self, n: usize) -> Option<&str> {
        self.args
            .iter()
            .filter(|a| a.key.is_none())
            .nth(n)
            .map(|a| a.value.as_str())
    }
}

/// Expands a shortcode into HTML.
pub trait Handler: Send + Sync {
    /// Paired handlers require a closing `{{< /name >}}` tag.
    fn paired(&self) -> bool;

    fn expand(&self, call: &Call<'_>) -> String;
}

/// Wraps a diagram definition in a container picked up by mermaid.js.
pub struct Mermaid;

impl Handler for Mermaid {
    fn paired(&self) -> bool {
        true
    }

    fn expand(&self, call: &Call<'_>) -> String {
        let mut out = String::from(r#"<div class="mermaid">"#);
        let _ = escape_html(&mut out, call.inner.unwrap_or("").trim());
        out.push_str("</div>");
        out
    }
}

/// Emits an image with an optional caption.
pub struct Figure;

impl Handler for Figure {
    fn paired(&self) -> bool {
        false
    }

    fn expand(&self, call: &Call<'_>) -> String {
        let mut out = String::from("<figure><img src=\"");
        let src = call.get("src").or_else(|| call.positional(0));
        let _ = escape_html(&mut out, src.unwrap_or(""));
        out.push_str("\" alt=\"");
        let _ = escape_html(&mut out, call.get("alt").unwrap_or(""));
        out.push_str("\" />");
        if let Some(caption) = call.get("caption") {
            out.push_str("<figcaption>");
            let _ = escape_html(&mut out, caption);
            out.push_str("</figcaption>");
        }
        out.push_str("</figure>");
        out
    }
}

/// The set of known shortcodes.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("handlers", &names).finish()
    }
}

impl Registry {
    /// A registry with the `mermaid` and `figure` shortcodes.
    pub fn with_builtins() -> Registry {
        let mut registry = Registry::default();
        registry.register("mermaid", Box::new(Mermaid));
        registry.register("figure", Box::new(Figure));
        registry
    }

    /// Registers a handler, replacing any previous handler for `name`.
    pub fn register(&mut self, name: &str, handler: Box<dyn Handler>) {
        self.handlers.insert(name.to_owned(), handler);
    }

    /// Expands every registered shortcode in `text`. `first_line` is the
    /// 1-based line on which `text` starts, for error messages.
    pub fn expand(
        &self,
        text: &str,
        first_line: usize,
    ) -> Result<String, Unclosed> {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while let Some(found) = text[pos..].find(OPEN) {
            let start = pos + found;
            out.push_str(&text[pos..start]);
            let tag = match parse_tag(&text[start..]) {
                Some(tag) => tag,
                None => {
                    // no terminating `>}}`; the rest is literal text.
                    pos = start;
                    break;
                }
            };
            let end = start + tag.len;
            let handler = match (tag.closing, self.handlers.get(tag.name)) {
                (false, Some(handler)) => handler,
                _ => {
                    out.push_str(&text[start..end]);
                    pos = end;
                    continue;
                }
            };

            let (inner, resume) = match handler.paired() {
                false => (None, end),
                true => match find_closing(&text[end..], tag.name) {
                    Some((inner_len, close_len)) => (
                        Some(&text[end..end + inner_len]),
                        end + inner_len + close_len,
                    ),
                    None => {
                        let line =
                            first_line + text[..start].matches('\n').count();
                        return Err(Unclosed {
                            name: tag.name.to_owned(),
                            line,
                        });
                    }
                },
            };
            let html = handler.expand(&Call {
                name: tag.name,
                args: parse_args(tag.args),
                inner,
            });
            // Blank lines would end the surrounding HTML block and let the
            // rest of the expansion be parsed as Markdown.
            let lines = html.lines().filter(|l| !l.trim().is_empty());
            for (i, line) in lines.enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(line);
            }
            pos = resume;
        }
        out.push_str(&text[pos..]);
        Ok(out)
    }
}

/// Returned when a paired shortcode has no closing tag.
#[derive(Debug, PartialEq, Eq)]
pub struct Unclosed {
    pub name: String,
    pub line: usize,
}

struct ParsedTag<'a> {
    name: &'a str,
    args: &'a str,
    closing: bool,

    /// The length of the whole tag including delimiters.
    len: usize,
}

/// Parses a tag at the start of `text`, which must begin with `{{<`.
fn parse_tag(text: &str) -> Option<ParsedTag<'_>> {
    let close = text[OPEN.len()..].find(CLOSE)?;
    let inside = text[OPEN.len()..OPEN.len() + close].trim();
    let (closing, inside) = match inside.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, inside),
    };
    let name_end = inside
        .find(char::is_whitespace)
        .unwrap_or_else(|| inside.len());
    Some(ParsedTag {
        name: &inside[..name_end],
        args: inside[name_end..].trim(),
        closing,
        len: OPEN.len() + close + CLOSE.len(),
    })
}

/// Finds `{{< /name >}}` in `text`, returning the length of the content before
/// it and the length of the closing tag itself.
fn find_closing(text: &str, name: &str) -> Option<(usize, usize)> {
    let mut pos = 0;
    while let Some(found) = text[pos..].find(OPEN) {
        let start = pos + found;
        let tag = parse_tag(&text[start..])?;
        if tag.closing && tag.name == name {
            return Some((start, tag.len));
        }
        pos = start + tag.len;
    }
    None
}

/// Splits `key="quoted value" key=bare "positional" positional` into
/// [`Arg`]s.
fn parse_args(input: &str) -> Vec<Arg> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            chars.next();
        }
        if chars.peek().is_none() {
            return args;
        }

        let mut key = None;
        let mut token = read_token(&mut chars);
        if chars.peek() == Some(&'=') {
            chars.next();
            key = Some(token);
            token = read_token(&mut chars);
        }
        args.push(Arg { key, value: token });
    }
}

fn read_token(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut token = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        while let Some(c) = chars.next() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        token.push(escaped);
                    }
                }
                _ => token.push(c),
            }
        }
        return token;
    }
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '=' {
            break;
        }
        token.push(c);
        chars.next();
    }
    token
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unregistered_shortcode_is_inert() {
        let registry = Registry::with_builtins();
        let text = "before {{< youtube abc123 >}} after";
        assert_eq!(Ok(text.to_owned()), registry.expand(text, 1));
    }

    #[test]
    fn test_mermaid() {
        let registry = Registry::with_builtins();
        let text = "{{< mermaid >}}\ngraph TD;\n\n  A-->B;\n{{< /mermaid >}}\n";
        assert_eq!(
            Ok("<div class=\"mermaid\">graph TD;\n  A--&gt;B;</div>\n".to_owned()),
            registry.expand(text, 1)
        );
    }

    #[test]
    fn test_figure() {
        let registry = Registry::with_builtins();
        assert_eq!(
            Ok(concat!(
                r#"<figure><img src="lb.png" alt="A &quot;balancer&quot;" />"#,
                "<figcaption>Round robin</figcaption></figure>"
            )
            .to_owned()),
            registry.expand(
                r#"{{< figure src="lb.png" alt="A \"balancer\"" caption="Round robin" >}}"#,
                1
            )
        );
    }

    #[test]
    fn test_unclosed_paired_shortcode() {
        let registry = Registry::with_builtins();
        assert_eq!(
            Err(Unclosed {
                name: "mermaid".to_owned(),
                line: 12
            }),
            registry.expand("intro\n\n{{< mermaid >}}\ngraph TD;", 10)
        );
    }

    #[test]
    fn test_unterminated_tag_is_literal() {
        let registry = Registry::with_builtins();
        assert_eq!(
            Ok("text {{< mermaid".to_owned()),
            registry.expand("text {{< mermaid", 1)
        );
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            vec![
                Arg {
                    key: Some("src".to_owned()),
                    value: "a b.png".to_owned()
                },
                Arg {
                    key: None,
                    value: "wide".to_owned()
                },
                Arg {
                    key: Some("n".to_owned()),
                    value: "3".to_owned()
                },
            ],
            parse_args(r#"src="a b.png" wide n=3"#)
        );
    }
}
