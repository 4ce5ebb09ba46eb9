//! The `columns` table: every column of every table, itself included

use std::sync::Arc;

use crate::engine::column::{Column, ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::Table;
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;

pub struct ColumnsTable {
    columns: ColumnSet,
    tables: Vec<Arc<dyn Table>>,
}

fn describe<'a>(row: Row<'a>) -> Option<(&'a str, &'a Column)> {
    match row {
        Row::Column { table, column } => Some((table, column)),
        _ => None,
    }
}

impl ColumnsTable {
    pub fn new(tables: Vec<Arc<dyn Table>>) -> Self {
        let mut columns = ColumnSet::new();
        columns.add(Column::new("table", "The name of the table", ColumnType::String, |row, _| {
            describe(row).map_or(Value::from(""), |(table, _)| Value::from(table))
        }));
        columns.add(Column::new("name", "The name of the column within the table", ColumnType::String, |row, _| {
            describe(row).map_or(Value::from(""), |(_, column)| Value::from(column.name()))
        }));
        columns.add(Column::new("description", "A description of the column", ColumnType::String, |row, _| {
            describe(row).map_or(Value::from(""), |(_, column)| Value::from(column.description()))
        }));
        columns.add(Column::new("type", "The data type of the column (int, float, string, list)", ColumnType::String, |row, _| {
            describe(row).map_or(Value::from(""), |(_, column)| {
                Value::from(column.column_type().to_string())
            })
        }));
        Self { columns, tables }
    }

    fn scan_table(&self, name: &str, columns: &ColumnSet, scan: &mut Scan<'_, '_>) -> bool {
        columns.iter().all(|column| {
            scan.process_row(Row::Column {
                table: name,
                column: column.as_ref(),
            })
        })
    }
}

impl Table for ColumnsTable {
    fn name(&self) -> &str {
        "columns"
    }

    fn name_prefix(&self) -> &str {
        "column_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        for table in &self.tables {
            if !self.scan_table(table.name(), table.columns(), scan) {
                return Ok(());
            }
        }
        self.scan_table(self.name(), &self.columns, scan);
        Ok(())
    }
}
