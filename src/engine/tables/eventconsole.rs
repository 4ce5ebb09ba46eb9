//! Tables answered by the event console
//!
//! Rows are not read from the core but fetched from the event console for
//! every query. Filters on a few columns the event console can evaluate
//! itself are pushed into the request; everything else is filtered here.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;

use crate::engine::column::{Column, ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::filter::Filter;
use crate::engine::tables::{hosts, Table};
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;
use crate::eventconsole::{split_list, EventConsoleClient, EMPTY_LIST};
use crate::monitoring::{HostId, MonitoringCore};
use crate::parser::RelationalOperator;
use crate::security::User;

/// Columns the event console filters on by itself
const GREPPING_COLUMNS: [&str; 10] = [
    "event_id",
    "event_text",
    "event_comment",
    "event_host",
    "event_contact",
    "event_application",
    "event_rule_id",
    "event_owner",
    "event_ipaddress",
    "event_core_host",
];

/// Columns every request asks for when the table has them
const SPECIAL_COLUMNS: [&str; 3] = [
    "event_host",
    "event_contact_groups_precedence",
    "event_contact_groups",
];

const EVENT_COLUMNS: [(&str, &str, ColumnType); 25] = [
    ("event_id", "The unique ID for this event", ColumnType::Int),
    ("event_count", "The number of occurrences of this event within period", ColumnType::Int),
    ("event_text", "The textual description of the event", ColumnType::String),
    ("event_first", "Time of the first occurrence of the event (Unix timestamp)", ColumnType::Time),
    ("event_last", "Time of the last occurrence of this event (Unix timestamp)", ColumnType::Time),
    ("event_comment", "Event comment", ColumnType::String),
    ("event_sl", "The service level for this event", ColumnType::Int),
    ("event_host", "The host name for this event, potentially rewritten", ColumnType::String),
    ("event_contact", "Contact information", ColumnType::String),
    ("event_application", "Syslog tag/application", ColumnType::String),
    ("event_pid", "The process ID of the originating process", ColumnType::Int),
    ("event_priority", "Syslog priority", ColumnType::Int),
    ("event_facility", "Syslog facility", ColumnType::Int),
    ("event_rule_id", "The ID of the rule", ColumnType::String),
    ("event_state", "The state of the event (0/1/2/3)", ColumnType::Int),
    ("event_phase", "The phase the event is currently in (one of open/closed/delayed/counting/ack)", ColumnType::String),
    ("event_owner", "The owner of the event", ColumnType::String),
    ("event_match_groups", "Text groups from regular expression match", ColumnType::List),
    ("event_contact_groups", "Contact groups", ColumnType::List),
    ("event_ipaddress", "The IP address where the event originated", ColumnType::String),
    ("event_orig_host", "The original host name for this event", ColumnType::String),
    ("event_contact_groups_precedence", "Whether or not the host- or rule groups have precedence", ColumnType::String),
    ("event_core_host", "The canonical name of the host for this event as known in the monitoring", ColumnType::String),
    ("event_host_in_downtime", "Whether or not the host (if found in core) was in downtime during event creation (0/1)", ColumnType::Int),
    ("event_match_groups_syslog_application", "The syslog application match groups", ColumnType::List),
];

const HISTORY_COLUMNS: [(&str, &str, ColumnType); 5] = [
    ("history_line", "The line number of the event in the history file", ColumnType::Int),
    ("history_time", "Time when the event was written into the history file (Unix timestamp)", ColumnType::Time),
    ("history_what", "What happened (one of ARCHIVED/AUTODELETE/CANCELLED/CHANGESTATE/COUNTFAILED/COUNTREACHED/DELAYOVER/DELETE/EMAIL/EXPIRED/NEW/NOCOUNT/ORPHANED/SCRIPT/UPDATE)", ColumnType::String),
    ("history_who", "The user who triggered the change", ColumnType::String),
    ("history_addinfo", "Additional information, like email recipient or script name", ColumnType::String),
];

const RULE_COLUMNS: [(&str, &str, ColumnType); 2] = [
    ("rule_id", "The ID of the rule", ColumnType::String),
    ("rule_hits", "The times rule matched an incoming message", ColumnType::Int),
];

/// One row of an event console reply
#[derive(Debug)]
pub struct EventRow {
    fields: HashMap<String, String>,
    /// The core host `event_host` designates
    pub host: Option<HostId>,
}

impl EventRow {
    pub fn new(core: &dyn MonitoringCore, header: &[String], fields: Vec<String>) -> Self {
        let fields: HashMap<String, String> = header.iter().cloned().zip(fields).collect();
        let host = fields
            .get("event_host")
            .and_then(|designation| core.find_host_by_designation(designation))
            .map(|h| h.id);
        Self { fields, host }
    }

    /// Raw field text, empty when the reply had no such column
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    fn number(&self, name: &str) -> f64 {
        let text = self.get(name).trim();
        text.parse::<i64>()
            .map(|i| i as f64)
            .or_else(|_| text.parse::<f64>())
            .unwrap_or(0.0)
    }

    fn contact_groups(&self) -> Option<Vec<&str>> {
        self.fields
            .get("event_contact_groups")
            .filter(|groups| groups.as_str() != EMPTY_LIST)
            .map(|groups| split_list(groups).collect())
    }

    fn is_authorized(&self, user: &User<'_>, core: &dyn MonitoringCore) -> bool {
        let host = self.host.and_then(|id| core.host(id));
        user.is_authorized_for_event(
            self.get("event_contact_groups_precedence"),
            self.contact_groups().as_deref(),
            host,
        )
    }
}

fn row_event<'a>(row: Row<'a>, _ctx: &RowContext<'a>) -> Option<&'a EventRow> {
    match row {
        Row::Event(event) => Some(event),
        _ => None,
    }
}

fn add_columns(set: &mut ColumnSet, specs: &[(&'static str, &'static str, ColumnType)]) {
    let mut b = ColumnBuilder::new(set, "", row_event);
    for &(name, description, column_type) in specs {
        match column_type {
            ColumnType::Int => b.int(name, description, move |e: &EventRow| e.number(name) as i64),
            ColumnType::Time => b.time(name, description, move |e: &EventRow| e.number(name) as i64),
            ColumnType::List => b.list(name, description, move |e, _| {
                split_list(e.get(name)).map(Value::from).collect()
            }),
            _ => b.string(name, description, move |e: &EventRow| e.get(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventTableKind {
    Events,
    History,
    Rules,
}

impl EventTableKind {
    /// Table name on the event console side
    fn remote_name(self) -> &'static str {
        match self {
            EventTableKind::Events => "events",
            EventTableKind::History => "history",
            EventTableKind::Rules => "rules",
        }
    }
}

pub struct EventConsoleTable {
    kind: EventTableKind,
    name: String,
    prefix: String,
    columns: ColumnSet,
    client: Option<EventConsoleClient>,
}

impl EventConsoleTable {
    fn with_columns(kind: EventTableKind, client: Option<EventConsoleClient>) -> Self {
        let name = format!("eventconsole{}", kind.remote_name());
        let prefix = format!("{}_", name);
        let mut columns = ColumnSet::new();
        match kind {
            EventTableKind::Events => add_columns(&mut columns, &EVENT_COLUMNS),
            EventTableKind::History => {
                add_columns(&mut columns, &HISTORY_COLUMNS);
                add_columns(&mut columns, &EVENT_COLUMNS);
            }
            EventTableKind::Rules => add_columns(&mut columns, &RULE_COLUMNS),
        }
        if kind != EventTableKind::Rules {
            hosts::add_columns(&mut columns, "host_");
        }
        Self {
            kind,
            name,
            prefix,
            columns,
            client,
        }
    }

    /// `eventconsoleevents`; `client` is `None` when the event console is
    /// disabled
    pub fn events(client: Option<EventConsoleClient>) -> Self {
        Self::with_columns(EventTableKind::Events, client)
    }

    pub fn history(client: Option<EventConsoleClient>) -> Self {
        Self::with_columns(EventTableKind::History, client)
    }

    pub fn rules(client: Option<EventConsoleClient>) -> Self {
        Self::with_columns(EventTableKind::Rules, client)
    }

    fn authorizes_rows(&self) -> bool {
        self.columns.find("event_contact_groups_precedence").is_some()
    }

    /// The request sent to the event console for a query
    pub fn request(&self, all_columns: &[Arc<Column>], filter: &Filter, timezone_offset: i64) -> String {
        let mut out = format!("GET {}\nOutputFormat: plain\nColumns:", self.kind.remote_name());
        for column in self.columns.iter() {
            let name = column.name();
            let wanted = SPECIAL_COLUMNS.contains(&name)
                || all_columns.iter().any(|c| c.name() == name);
            if wanted && !name.starts_with("host_") {
                let _ = write!(out, " {}", name);
            }
        }

        if let Some(glb) = filter.greatest_lower_bound("history_time", timezone_offset) {
            let _ = write!(out, "\nFilter: history_time >= {}", glb);
        }
        if let Some(lub) = filter.least_upper_bound("history_time", timezone_offset) {
            let _ = write!(out, "\nFilter: history_time <= {}", lub);
        }

        for name in GREPPING_COLUMNS {
            let conjuncts = filter.partial_filter(&|c: &Column| c.name() == name).conjuncts();
            if let [single] = conjuncts.as_slice() {
                if let Some(test) = single.as_column() {
                    use RelationalOperator::*;
                    if matches!(test.operator(), Equal | Matches | EqualIcase | MatchesIcase) {
                        let _ = write!(out, "\nFilter: {} {} {}", name, test.operator(), test.value());
                        continue;
                    }
                }
            }
            if let Some(value) = filter.string_value_restriction(name) {
                let _ = write!(out, "\nFilter: {} = {}", name, value);
            } else {
                let glb = filter.greatest_lower_bound(name, timezone_offset);
                let lub = filter.least_upper_bound(name, timezone_offset);
                if let (Some(glb), Some(lub)) = (glb, lub) {
                    if glb == lub {
                        let _ = write!(out, "\nFilter: {} = {}", name, glb);
                    }
                }
            }
        }
        out.push('\n');
        out
    }
}

impl Table for EventConsoleTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_prefix(&self) -> &str {
        &self.prefix
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let Some(client) = &self.client else {
            debug!("event console disabled, {} is empty", self.name);
            return Ok(());
        };
        let request = self.request(scan.all_columns(), scan.filter(), scan.timezone_offset());
        debug!("event console request: {:?}", request);
        let mut reply = client.query(&request)?;
        let header = reply.header().to_vec();
        let core = scan.core();
        let user = scan.user();
        let authorize = self.authorizes_rows();
        while let Some(fields) = reply.next_row()? {
            let event = EventRow::new(core, &header, fields);
            if authorize && !event.is_authorized(user, core) {
                continue;
            }
            if !scan.process_row(Row::Event(&event)) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::ColumnFilter;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::AuthorizationPolicy;

    fn condition(table: &EventConsoleTable, column: &str, op: RelationalOperator, value: &str) -> Filter {
        Filter::Column(ColumnFilter::new(table.column(column).unwrap(), op, value).unwrap())
    }

    fn event(core: &dyn MonitoringCore, pairs: &[(&str, &str)]) -> EventRow {
        let header: Vec<String> = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let fields = pairs.iter().map(|(_, v)| v.to_string()).collect();
        EventRow::new(core, &header, fields)
    }

    #[test]
    fn test_request_columns() {
        let table = EventConsoleTable::events(None);
        let columns = vec![
            table.column("event_text").unwrap(),
            table.column("host_name").unwrap(),
        ];
        let request = table.request(&columns, &Filter::tautology(), 0);
        assert_eq!(
            request,
            "GET events\nOutputFormat: plain\nColumns: event_text event_host event_contact_groups event_contact_groups_precedence\n"
        );
    }

    #[test]
    fn test_request_pushes_grepping_filters_only() {
        let table = EventConsoleTable::events(None);
        let filter = Filter::and(vec![
            condition(&table, "event_host", RelationalOperator::Matches, "^web"),
            condition(&table, "event_text", RelationalOperator::NotEqual, "x"),
            condition(&table, "event_id", RelationalOperator::Equal, "42"),
            condition(&table, "event_state", RelationalOperator::Equal, "2"),
        ]);
        let columns = filter.columns();
        let request = table.request(&columns, &filter, 0);
        let filters: Vec<&str> = request.lines().filter(|l| l.starts_with("Filter:")).collect();
        assert_eq!(filters, vec!["Filter: event_id = 42", "Filter: event_host ~ ^web"]);
    }

    #[test]
    fn test_request_history_time_bounds() {
        let table = EventConsoleTable::history(None);
        let filter = Filter::and(vec![
            condition(&table, "history_time", RelationalOperator::GreaterOrEqual, "100"),
            condition(&table, "history_time", RelationalOperator::Less, "200"),
        ]);
        let request = table.request(&filter.columns(), &filter, 0);
        assert!(request.starts_with("GET history\n"));
        assert!(request.contains("\nFilter: history_time >= 100\nFilter: history_time <= 199\n"));
    }

    #[test]
    fn test_event_row_values() {
        let s = site();
        let table = EventConsoleTable::events(None);
        let row = event(
            &s,
            &[
                ("event_id", "17"),
                ("event_first", "1700000000.75"),
                ("event_host", "web one"),
                ("event_match_groups", "a\x01b"),
            ],
        );
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let value = |name: &str| table.column(name).unwrap().value(Row::Event(&row), &ctx);
        assert_eq!(value("event_id"), Value::Int(17));
        assert_eq!(value("event_first"), Value::Time(1700000000));
        assert_eq!(value("event_match_groups").to_text(), "a|b");
        assert_eq!(value("event_contact_groups"), Value::List(vec![]));
        assert_eq!(value("host_name"), Value::from("h1"));
        assert_eq!(value("event_phase"), Value::from(""));
    }

    #[test]
    fn test_event_authorization() {
        let s = site();
        let policy = AuthorizationPolicy::default();
        let carol = User::resolve(&s, Some("carol"), &policy);
        let bob = User::resolve(&s, Some("bob"), &policy);

        let by_rule = event(&s, &[("event_contact_groups_precedence", "rule"), ("event_contact_groups", "web-admins")]);
        assert!(by_rule.is_authorized(&carol, &s));
        assert!(!by_rule.is_authorized(&bob, &s));

        let no_groups = event(
            &s,
            &[("event_contact_groups_precedence", "host"), ("event_contact_groups", "\x02"), ("event_host", "h3")],
        );
        assert!(no_groups.is_authorized(&carol, &s));
        assert!(!no_groups.is_authorized(&bob, &s));

        let unknown_host = event(&s, &[("event_contact_groups_precedence", "host"), ("event_host", "nowhere")]);
        assert!(unknown_host.is_authorized(&bob, &s));
    }

    #[test]
    fn test_rules_table_has_no_host_columns() {
        let table = EventConsoleTable::rules(None);
        assert_eq!(table.name(), "eventconsolerules");
        assert!(table.column("rule_hits").is_ok());
        assert!(table.column("host_name").is_err());
        assert!(!table.authorizes_rows());
    }
}
