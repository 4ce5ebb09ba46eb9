//! The `log` table: monitoring history
//!
//! Entries are kept sorted by time, so bounds on `time` in the filter narrow
//! the scan to a slice found by binary search. Rows are produced newest
//! first.

use tracing::debug;

use crate::engine::column::{ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::tables::{commands, contacts, hosts, services, Table};
use crate::error::Result;
use crate::monitoring::LogEntry;

pub struct LogTable {
    columns: ColumnSet,
}

fn row_log<'a>(row: Row<'a>, _ctx: &RowContext<'a>) -> Option<&'a LogEntry> {
    match row {
        Row::Log(entry) => Some(entry),
        _ => None,
    }
}

impl LogTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        let mut b = ColumnBuilder::new(&mut columns, "", row_log);
        b.time("time", "Time of the log event (UNIX timestamp)", |e: &LogEntry| e.time);
        b.int("lineno", "The number of the line in the log file", |e: &LogEntry| e.lineno);
        b.int("class", "The class of the message as integer (0:info, 1:state, 2:program, 3:notification, 4:passive, 5:command)", |e: &LogEntry| {
            i64::from(e.class)
        });
        b.string("type", "The type of the message (text before the colon)", |e: &LogEntry| e.kind.as_str());
        b.string("message", "The complete message line including the timestamp", |e: &LogEntry| {
            e.message.as_str()
        });
        b.string("options", "The part of the message after the ':'", |e: &LogEntry| e.options.as_str());
        b.string("comment", "A comment field used in various message types", |e: &LogEntry| {
            e.comment.as_str()
        });
        b.string("plugin_output", "The output of the check, if any is associated with the message", |e: &LogEntry| {
            e.plugin_output.as_str()
        });
        b.int("state", "The state of the host or service in question", |e: &LogEntry| i64::from(e.state));
        b.string("state_type", "The type of the state (varies on different log classes)", |e: &LogEntry| {
            e.state_type.as_str()
        });
        b.int("attempt", "The number of the check attempt", |e: &LogEntry| i64::from(e.attempt));
        b.string("host_name", "The name of the host the log entry is about (might be empty)", |e: &LogEntry| {
            e.host_name.as_str()
        });
        b.string("service_description", "The description of the service the log entry is about (might be empty)", |e: &LogEntry| {
            e.service_description.as_str()
        });
        b.string("contact_name", "The name of the contact the log entry is about (might be empty)", |e: &LogEntry| {
            e.contact_name.as_str()
        });
        b.string("command_name", "The name of the command of the log entry (e.g. for notifications)", |e: &LogEntry| {
            e.command_name.as_str()
        });

        hosts::add_columns(&mut columns, "current_host_");
        services::add_columns(&mut columns, "current_service_");
        contacts::add_columns(&mut columns, "current_contact_");
        commands::add_columns(&mut columns, "current_command_");
        Self { columns }
    }
}

impl Default for LogTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for LogTable {
    fn name(&self) -> &str {
        "log"
    }

    fn name_prefix(&self) -> &str {
        "log_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        let entries = core.log_entries();
        let since = scan.filter().greatest_lower_bound("time", scan.timezone_offset());
        let until = scan.filter().least_upper_bound("time", scan.timezone_offset());
        let start = since.map_or(0, |t| entries.partition_point(|e| e.time < t));
        let end = until.map_or(entries.len(), |t| entries.partition_point(|e| e.time <= t));
        if start >= end {
            debug!("time bounds {:?}..{:?} select no log entries", since, until);
            return Ok(());
        }
        debug!(
            "scanning {} of {} log entries for time bounds {:?}..{:?}",
            end - start,
            entries.len(),
            since,
            until
        );
        for entry in entries[start..end].iter().rev() {
            let host = entry.host.and_then(|id| core.host(id));
            let service = entry.service.and_then(|id| core.service(id));
            if user.is_authorized_for_object(host, service, false)
                && !scan.process_row(Row::Log(entry))
            {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::Value;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::User;

    #[test]
    fn test_joined_current_columns() {
        let s = site();
        let table = LogTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let alert = Row::Log(&s.log[2]);
        assert_eq!(table.column("log_type").unwrap().value(alert, &ctx), Value::from("SERVICE ALERT"));
        assert_eq!(table.column("current_service_state").unwrap().value(alert, &ctx), Value::Int(2));
        assert_eq!(table.column("current_host_address").unwrap().value(alert, &ctx), Value::from("10.0.0.1"));

        // The host is gone, so the joined columns fall back to defaults
        let orphan = Row::Log(&s.log[3]);
        assert_eq!(table.column("current_host_name").unwrap().value(orphan, &ctx), Value::from(""));
        assert_eq!(table.column("host_name").unwrap().value(orphan, &ctx), Value::from("gone"));
    }
}
