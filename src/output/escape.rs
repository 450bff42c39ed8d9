//! Escaping helpers for textual formats.

use std::borrow::Cow;

/// Replace `< > & ' "` with XML entities
pub fn escape_xml(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '>', '&', '\'', '"']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Render a YAML single-quoted scalar
pub fn quote_yaml(input: &str) -> String {
    format!("'{}'", input.replace('\'', "''"))
}
