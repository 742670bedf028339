//! Helpers for building the [`Value`]s handed to templates.

use gtmpl_value::Value;
use std::collections::HashMap;
use url::Url;

/// Builds a [`Value::Object`] from field names and values.
pub fn object<I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let m: HashMap<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
    Value::Object(m)
}

pub fn string<S: Into<String>>(s: S) -> Value {
    Value::String(s.into())
}

pub fn url(url: &Url) -> Value {
    Value::String(url.to_string())
}

/// Converts an optional URL, mapping `None` to [`Value::Nil`] so templates can
/// test it with `if`.
pub fn optional_url(url: Option<&Url>) -> Value {
    match url {
        Some(url) => Value::String(url.to_string()),
        None => Value::Nil,
    }
}

pub fn number(n: usize) -> Value {
    Value::from(n as u64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object() {
        let value = object(vec![
            ("title", string("CAP")),
            ("next", optional_url(None)),
        ]);
        match value {
            Value::Object(m) => {
                assert!(matches!(
                    m.get("title"),
                    Some(Value::String(s)) if s == "CAP"
                ));
                assert!(matches!(m.get("next"), Some(Value::Nil)));
            }
            _ => panic!("wanted an object"),
        }
    }
}
