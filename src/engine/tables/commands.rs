//! The `commands` table

use crate::engine::column::{ColumnBuilder, ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::{row_command, Table};
use crate::error::Result;
use crate::monitoring::{Command, MonitoringCore};

pub struct CommandsTable {
    columns: ColumnSet,
}

impl CommandsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        Self { columns }
    }
}

impl Default for CommandsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for CommandsTable {
    fn name(&self) -> &str {
        "commands"
    }

    fn name_prefix(&self) -> &str {
        "command_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        for command in scan.core().commands() {
            if !scan.process_row(Row::Command(command)) {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_command(key).map(Row::Command)
    }
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_command);
    b.string("name", "The name of the command", |c: &Command| c.name.as_str());
    b.string("line", "The shell command line", |c: &Command| c.line.as_str());
}
