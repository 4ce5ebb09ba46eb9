//! JSON and Python literal output

use crate::engine::value::Value;
use crate::output::formatter::Renderer;
use crate::output::plain::format_double;

/// Shared structure of the JSON and Python formats, which differ only in
/// how a missing value is spelled.
fn output_nested(out: &mut String, value: &Value<'_>, null: &str) {
    match value {
        Value::Null => out.push_str(null),
        Value::Int(i) | Value::Time(i) => out.push_str(&i.to_string()),
        Value::Double(d) if d.is_finite() => out.push_str(&format_double(*d)),
        Value::Double(_) => out.push_str(null),
        Value::Str(s) => push_string(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                output_nested(out, item, null);
            }
            out.push(']');
        }
        Value::Dict(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_string(out, key);
                out.push(':');
                push_string(out, value);
            }
            out.push('}');
        }
        Value::Blob(bytes) => push_string(out, &String::from_utf8_lossy(bytes)),
    }
}

/// JSON string escaping, which is also a valid Python 3 string literal
fn push_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn begin_query(&self, out: &mut String) {
        out.push('[');
    }

    fn separate_query_elements(&self, out: &mut String) {
        out.push_str(",\n");
    }

    fn end_query(&self, out: &mut String) {
        out.push_str("]\n");
    }

    fn begin_row(&self, out: &mut String) {
        out.push('[');
    }

    fn separate_row_elements(&self, out: &mut String) {
        out.push(',');
    }

    fn end_row(&self, out: &mut String) {
        out.push(']');
    }

    fn output(&self, out: &mut String, value: &Value<'_>) {
        output_nested(out, value, "null");
    }
}

pub struct PythonRenderer;

impl Renderer for PythonRenderer {
    fn begin_query(&self, out: &mut String) {
        out.push('[');
    }

    fn separate_query_elements(&self, out: &mut String) {
        out.push_str(",\n");
    }

    fn end_query(&self, out: &mut String) {
        out.push_str("]\n");
    }

    fn begin_row(&self, out: &mut String) {
        out.push('[');
    }

    fn separate_row_elements(&self, out: &mut String) {
        out.push(',');
    }

    fn end_row(&self, out: &mut String) {
        out.push(']');
    }

    fn output(&self, out: &mut String, value: &Value<'_>) {
        output_nested(out, value, "None");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::render_table;
    use std::borrow::Cow;

    #[test]
    fn test_json_parses_back() {
        let out = render_table(
            &JsonRenderer,
            &[
                vec![Value::from("h\"1"), Value::Int(0), Value::Double(0.5)],
                vec![
                    Value::from("h2"),
                    Value::List(vec![Value::from("a"), Value::from("b")]),
                    Value::Null,
                ],
            ],
        );
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([["h\"1", 0, 0.5], ["h2", ["a", "b"], null]])
        );
    }

    #[test]
    fn test_json_dict() {
        let dict = Value::Dict(vec![(Cow::Borrowed("TAGS"), Cow::Borrowed("prod"))]);
        let out = render_table(&JsonRenderer, &[vec![dict]]);
        assert_eq!(out, "[[{\"TAGS\":\"prod\"}]]\n");
    }

    #[test]
    fn test_python_none_and_nan() {
        let out = render_table(&PythonRenderer, &[vec![Value::Null, Value::Double(f64::NAN)]]);
        assert_eq!(out, "[[None,None]]\n");
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(render_table(&JsonRenderer, &[]), "[]\n");
    }
}
