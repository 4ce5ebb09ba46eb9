//! The `status` table: one row of global program state

use crate::engine::column::{ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::tables::Table;
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;
use crate::monitoring::{MonitoringCore, ProgramStatus};

pub struct StatusTable {
    columns: ColumnSet,
}

fn row_status<'a>(row: Row<'a>, _ctx: &RowContext<'a>) -> Option<&'a ProgramStatus> {
    match row {
        Row::Status(status) => Some(status),
        _ => None,
    }
}

impl StatusTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        let mut b = ColumnBuilder::new(&mut columns, "", row_status);
        b.string("program_version", "The version of the monitoring daemon", |p: &ProgramStatus| {
            p.program_version.as_str()
        });
        b.time("program_start", "The time of the last program start (UNIX timestamp)", |p: &ProgramStatus| {
            p.program_start
        });
        b.int("nagios_pid", "The process ID of the monitoring core", |p: &ProgramStatus| p.pid);
        b.time("last_command_check", "The time of the last check for a command (UNIX timestamp)", |p: &ProgramStatus| {
            p.last_command_check
        });
        b.time("last_log_rotation", "Time of the last log file rotation", |p: &ProgramStatus| {
            p.last_log_rotation
        });
        b.int("interval_length", "The default interval length", |p: &ProgramStatus| p.interval_length);

        let flags: [(&str, &str, fn(&ProgramStatus) -> bool); 10] = [
            ("enable_notifications", "Whether notifications are enabled in general (0/1)", |p| p.enable_notifications),
            ("execute_service_checks", "Whether active service checks are activated in general (0/1)", |p| p.execute_service_checks),
            ("accept_passive_service_checks", "Whether passive service checks are activated in general (0/1)", |p| p.accept_passive_service_checks),
            ("execute_host_checks", "Whether host checks are executed in general (0/1)", |p| p.execute_host_checks),
            ("accept_passive_host_checks", "Whether passive host checks are accepted in general (0/1)", |p| p.accept_passive_host_checks),
            ("enable_event_handlers", "Whether event handlers are activated in general (0/1)", |p| p.enable_event_handlers),
            ("enable_flap_detection", "Whether flap detection is activated in general (0/1)", |p| p.enable_flap_detection),
            ("process_performance_data", "Whether processing of performance data is activated in general (0/1)", |p| p.process_performance_data),
            ("check_service_freshness", "Whether service freshness checking is activated in general (0/1)", |p| p.check_service_freshness),
            ("check_host_freshness", "Whether host freshness checking is activated in general (0/1)", |p| p.check_host_freshness),
        ];
        for (name, description, flag) in flags {
            b.int(name, description, move |p| i64::from(flag(p)));
        }

        b.add("num_hosts", "The total number of hosts", ColumnType::Int, |_, ctx| {
            Value::from(ctx.core.hosts().len())
        });
        b.add("num_services", "The total number of services", ColumnType::Int, |_, ctx| {
            Value::from(ctx.core.services().len())
        });
        b.string("livestatus_version", "The version of the query engine", |_: &ProgramStatus| {
            env!("CARGO_PKG_VERSION")
        });
        Self { columns }
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for StatusTable {
    fn name(&self) -> &str {
        "status"
    }

    fn name_prefix(&self) -> &str {
        "status_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        scan.process_row(Row::Status(core.status()));
        Ok(())
    }

    fn get_default<'a>(&self, core: &'a dyn MonitoringCore) -> Option<Row<'a>> {
        Some(Row::Status(core.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::User;

    #[test]
    fn test_status_row() {
        let s = site();
        let table = StatusTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let row = table.get_default(&s).unwrap();
        assert_eq!(table.column("nagios_pid").unwrap().value(row, &ctx), Value::Int(4242));
        assert_eq!(table.column("num_services").unwrap().value(row, &ctx), Value::Int(5));
        assert_eq!(table.column("check_host_freshness").unwrap().value(row, &ctx), Value::Int(0));
        assert_eq!(table.column("program_start").unwrap().value(row, &ctx), Value::Time(1700000000));
    }
}
