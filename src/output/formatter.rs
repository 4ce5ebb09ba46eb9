//! Output formats and the renderer interface

use serde::{Deserialize, Serialize};

use crate::engine::value::Value;
use crate::output::csv::CsvRenderer;
use crate::output::json::{JsonRenderer, PythonRenderer};
use crate::output::plain::PlainRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Separator based format without escaping (`csv` on the wire)
    #[default]
    Plain,
    /// RFC 4180 CSV (`CSV` on the wire)
    Csv,
    Json,
    /// Python 3 literals
    Python,
}

impl OutputFormat {
    /// Names accepted by `OutputFormat:`
    pub const NAMES: [&'static str; 6] = ["CSV", "csv", "json", "plain", "python", "python3"];

    pub fn find(name: &str) -> Option<Self> {
        match name {
            "CSV" => Some(OutputFormat::Csv),
            "csv" | "plain" => Some(OutputFormat::Plain),
            "json" => Some(OutputFormat::Json),
            "python" | "python3" => Some(OutputFormat::Python),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Csv => write!(f, "CSV"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Python => write!(f, "python3"),
        }
    }
}

/// Separators of the plain format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Separators {
    dataset: String,
    field: String,
    list: String,
    host_service: String,
}

impl Separators {
    pub fn new(dataset: char, field: char, list: char, host_service: char) -> Self {
        Self {
            dataset: dataset.to_string(),
            field: field.to_string(),
            list: list.to_string(),
            host_service: host_service.to_string(),
        }
    }

    /// Ends a row
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Between the fields of a row
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Between list elements
    pub fn list(&self) -> &str {
        &self.list
    }

    /// Between the parts of a nested list element
    pub fn host_service(&self) -> &str {
        &self.host_service
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self::new('\n', '\t', ',', '|')
    }
}

/// Serializes a query result one element at a time
///
/// The executor drives the structure (query, rows, fields); renderers only
/// decide what goes between and around the pieces.
pub trait Renderer: Send {
    fn begin_query(&self, out: &mut String);
    fn separate_query_elements(&self, out: &mut String);
    fn end_query(&self, out: &mut String);

    fn begin_row(&self, out: &mut String);
    fn separate_row_elements(&self, out: &mut String);
    fn end_row(&self, out: &mut String);

    fn output(&self, out: &mut String, value: &Value<'_>);
}

/// Create the renderer for a format
pub fn make_renderer(format: OutputFormat, separators: &Separators) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Plain => Box::new(PlainRenderer::new(separators.clone())),
        OutputFormat::Csv => Box::new(CsvRenderer),
        OutputFormat::Json => Box::new(JsonRenderer),
        OutputFormat::Python => Box::new(PythonRenderer),
    }
}
