//! Separator based output without any escaping

use crate::engine::value::Value;
use crate::output::formatter::{Renderer, Separators};

pub struct PlainRenderer {
    separators: Separators,
}

impl PlainRenderer {
    pub fn new(separators: Separators) -> Self {
        Self { separators }
    }

    fn output_list_element(&self, out: &mut String, value: &Value<'_>) {
        match value {
            Value::List(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(self.separators.host_service());
                    }
                    self.output(out, part);
                }
            }
            other => self.output(out, other),
        }
    }
}

impl Renderer for PlainRenderer {
    fn begin_query(&self, _out: &mut String) {}

    fn separate_query_elements(&self, _out: &mut String) {}

    fn end_query(&self, _out: &mut String) {}

    fn begin_row(&self, _out: &mut String) {}

    fn separate_row_elements(&self, out: &mut String) {
        out.push_str(self.separators.field());
    }

    fn end_row(&self, out: &mut String) {
        out.push_str(self.separators.dataset());
    }

    fn output(&self, out: &mut String, value: &Value<'_>) {
        match value {
            Value::Null => {}
            Value::Int(i) | Value::Time(i) => out.push_str(&i.to_string()),
            Value::Double(d) => out.push_str(&format_double(*d)),
            Value::Str(s) => out.push_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(self.separators.list());
                    }
                    self.output_list_element(out, item);
                }
            }
            Value::Dict(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(self.separators.list());
                    }
                    out.push_str(key);
                    out.push_str(self.separators.host_service());
                    out.push_str(value);
                }
            }
            Value::Blob(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Doubles print like integers when they have no fractional part
pub(crate) fn format_double(d: f64) -> String {
    if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::render_table;

    #[test]
    fn test_plain_rows() {
        let r = PlainRenderer::new(Separators::default());
        let out = render_table(
            &r,
            &[
                vec![Value::from("h1"), Value::Int(0)],
                vec![Value::from("h2"), Value::Int(1)],
            ],
        );
        assert_eq!(out, "h1\t0\nh2\t1\n");
    }

    #[test]
    fn test_plain_lists_and_custom_separators() {
        let r = PlainRenderer::new(Separators::new('\n', ';', ',', '|'));
        let members = Value::List(vec![
            Value::List(vec![Value::from("h1"), Value::from("CPU")]),
            Value::List(vec![Value::from("h2"), Value::from("Disk")]),
        ]);
        let out = render_table(&r, &[vec![Value::from("g"), members]]);
        assert_eq!(out, "g;h1|CPU,h2|Disk\n");
    }

    #[test]
    fn test_plain_doubles() {
        assert_eq!(format_double(2.0), "2");
        assert_eq!(format_double(0.25), "0.25");
    }
}
