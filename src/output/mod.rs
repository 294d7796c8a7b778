//! Rendering of normalized response documents for the terminal.

use serde_json::Value;

use crate::api::{Document, Response};
use crate::error::Result;

fn flat(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a document as plain text: aligned key/value rows for objects,
/// one row per item for lists, scalars verbatim.
pub fn render(document: &Document) -> String {
    match document {
        Document::Scalar(text) => format!("{}\n", text),
        Document::List(items) => {
            let mut out = String::new();
            for item in items {
                match item {
                    Value::Object(map) => {
                        let row: Vec<String> = map.values().map(flat).collect();
                        out.push_str(&row.join("\t"));
                    }
                    other => out.push_str(&flat(other)),
                }
                out.push('\n');
            }
            out
        }
        Document::Object(map) => {
            let width = map.keys().map(|key| key.len()).max().unwrap_or(0);
            let mut out = String::new();
            for (key, value) in map {
                out.push_str(&format!("{:width$}  {}\n", key, flat(value), width = width));
            }
            out
        }
    }
}

/// Print a response: diagnostic line to stderr on error or in verbose mode,
/// then the parsed document to stdout (pretty JSON when requested).
pub fn print_response(response: &Response, as_json: bool, verbose: bool) -> Result<()> {
    if response.is_error() || verbose {
        eprintln!("{}", response.diagnostic_line());
    }
    let document = response.parse()?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&document.to_value())?);
    } else {
        print!("{}", render(document));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => Document::Object(map),
            Value::Array(items) => Document::List(items),
            Value::String(text) => Document::Scalar(text),
            other => Document::Scalar(other.to_string()),
        }
    }

    #[test]
    fn scalars_print_verbatim() {
        assert_eq!(render(&document(json!("all done"))), "all done\n");
    }

    #[test]
    fn object_rows_are_aligned() {
        let rendered = render(&document(json!({"id": 42, "title": "monkeys"})));
        assert_eq!(rendered, "id     42\ntitle  monkeys\n");
    }

    #[test]
    fn list_items_become_rows() {
        let rendered = render(&document(json!([
            {"id": 1, "title": "a"},
            {"id": 2, "title": "b"}
        ])));
        assert_eq!(rendered, "1\ta\n2\tb\n");
    }
}
