//! Stats columns and their streaming aggregation

use std::sync::Arc;

use crate::engine::column::{Column, Row, RowContext};
use crate::engine::filter::Filter;
use crate::engine::value::Value;
use crate::error::{LqlError, Result};
use crate::parser::AggregationKind;

/// One `Stats:` header bound to a table
#[derive(Debug, Clone)]
pub enum StatsColumn {
    /// Counts the rows the filter accepts
    Count(Filter),
    Aggregate {
        kind: AggregationKind,
        column: Arc<Column>,
    },
}

impl StatsColumn {
    pub fn aggregate(kind: AggregationKind, column: Arc<Column>) -> Result<Self> {
        if !column.column_type().is_numeric() {
            return Err(LqlError::BadRequest(format!(
                "cannot aggregate {} column '{}'",
                column.column_type(),
                column.name()
            )));
        }
        Ok(StatsColumn::Aggregate { kind, column })
    }

    /// Take the filter out of a counting stats column so it can be combined
    pub fn steal_filter(self) -> Result<Filter> {
        match self {
            StatsColumn::Count(filter) => Ok(filter),
            StatsColumn::Aggregate { kind, column } => Err(LqlError::BadRequest(format!(
                "cannot combine '{} {}', only counting stats can be combined",
                kind,
                column.name()
            ))),
        }
    }

    pub fn columns(&self) -> Vec<Arc<Column>> {
        match self {
            StatsColumn::Count(filter) => filter.columns(),
            StatsColumn::Aggregate { column, .. } => vec![Arc::clone(column)],
        }
    }

    pub fn create_aggregator(&self) -> Aggregator {
        Aggregator::default()
    }
}

/// Running state of one stats column within one group
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    count: u64,
    sum: f64,
    sum_of_squares: f64,
    sum_of_inverses: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Aggregator {
    pub fn update<'a>(&mut self, stats: &StatsColumn, row: Row<'a>, ctx: &RowContext<'a>) {
        match stats {
            StatsColumn::Count(filter) => {
                if filter.accepts(row, ctx) {
                    self.count += 1;
                }
            }
            StatsColumn::Aggregate { column, .. } => {
                if let Some(v) = column.value(row, ctx).as_f64() {
                    self.consume(v);
                }
            }
        }
    }

    fn consume(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_of_squares += v * v;
        self.sum_of_inverses += 1.0 / v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// The final value for the stats column
    pub fn value(&self, stats: &StatsColumn) -> Value<'static> {
        let kind = match stats {
            StatsColumn::Count(_) => return Value::from(self.count as i64),
            StatsColumn::Aggregate { kind, .. } => *kind,
        };
        let n = self.count as f64;
        let result = match kind {
            AggregationKind::Sum => self.sum,
            AggregationKind::Min => self.min.unwrap_or(0.0),
            AggregationKind::Max => self.max.unwrap_or(0.0),
            AggregationKind::Avg if self.count == 0 => 0.0,
            AggregationKind::Avg => self.sum / n,
            AggregationKind::Std if self.count < 2 => 0.0,
            AggregationKind::Std => {
                let mean = self.sum / n;
                (self.sum_of_squares / n - mean * mean).max(0.0).sqrt()
            }
            AggregationKind::SumInv => self.sum_of_inverses,
            AggregationKind::AvgInv if self.count == 0 => 0.0,
            AggregationKind::AvgInv => self.sum_of_inverses / n,
        };
        Value::Double(result)
    }
}
