//! RFC 4180 CSV output

use crate::engine::value::Value;
use crate::output::formatter::Renderer;
use crate::output::plain::format_double;

pub struct CsvRenderer;

impl CsvRenderer {
    fn push_quoted(out: &mut String, text: &str) {
        out.push('"');
        for c in text.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    }

    fn text_of(value: &Value<'_>) -> String {
        match value {
            Value::Null => String::new(),
            Value::Int(i) | Value::Time(i) => i.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Str(s) => s.to_string(),
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::List(parts) => parts
                        .iter()
                        .map(Self::text_of)
                        .collect::<Vec<_>>()
                        .join("|"),
                    other => Self::text_of(other),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Dict(entries) => entries
                .iter()
                .map(|(k, v)| format!("{}|{}", k, v))
                .collect::<Vec<_>>()
                .join(","),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl Renderer for CsvRenderer {
    fn begin_query(&self, _out: &mut String) {}

    fn separate_query_elements(&self, _out: &mut String) {}

    fn end_query(&self, _out: &mut String) {}

    fn begin_row(&self, _out: &mut String) {}

    fn separate_row_elements(&self, out: &mut String) {
        out.push(',');
    }

    fn end_row(&self, out: &mut String) {
        out.push_str("\r\n");
    }

    fn output(&self, out: &mut String, value: &Value<'_>) {
        Self::push_quoted(out, &Self::text_of(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::render_table;

    #[test]
    fn test_csv_quoting() {
        let out = render_table(
            &CsvRenderer,
            &[vec![Value::from("say \"hi\""), Value::from("a,b"), Value::Int(3)]],
        );
        assert_eq!(out, "\"say \"\"hi\"\"\",\"a,b\",\"3\"\r\n");
    }

    #[test]
    fn test_csv_lists() {
        let out = render_table(
            &CsvRenderer,
            &[vec![Value::List(vec![Value::from("x"), Value::from("y")])]],
        );
        assert_eq!(out, "\"x,y\"\r\n");
    }
}
