//! Output formatting module

pub mod csv;
pub mod formatter;
pub mod json;
pub mod plain;

pub use formatter::{make_renderer, OutputFormat, Renderer, Separators};

#[cfg(test)]
pub(crate) fn render_table(
    renderer: &dyn Renderer,
    rows: &[Vec<crate::engine::value::Value<'_>>],
) -> String {
    let mut out = String::new();
    renderer.begin_query(&mut out);
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            renderer.separate_query_elements(&mut out);
        }
        renderer.begin_row(&mut out);
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                renderer.separate_row_elements(&mut out);
            }
            renderer.output(&mut out, value);
        }
        renderer.end_row(&mut out);
    }
    renderer.end_query(&mut out);
    out
}
