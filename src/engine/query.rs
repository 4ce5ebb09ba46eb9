//! Binding of request headers to a table
//!
//! Every request level error is found here, before a single row is read.
//! Parsing goes on after the first error so that `ResponseHeader:` and
//! `KeepAlive:` are honoured even for broken requests; only the first error
//! is reported.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::column::Column;
use crate::engine::filter::{ColumnFilter, Filter};
use crate::engine::stats::StatsColumn;
use crate::engine::tables::Table;
use crate::error::{LqlError, Result};
use crate::monitoring::TriggerKind;
use crate::output::{OutputFormat, Separators};
use crate::parser::{parse_header, Condition, Header, HeaderLine, ResponseHeader, StatsSpec};

/// A request bound to its table, ready to execute
pub struct Query {
    pub table: Arc<dyn Table>,
    /// Output columns, also the group key of stats queries
    pub columns: Vec<Arc<Column>>,
    pub filter: Filter,
    pub wait_condition: Filter,
    pub stats: Vec<StatsColumn>,
    pub limit: Option<usize>,
    pub time_limit: Option<Duration>,
    pub output_format: OutputFormat,
    pub separators: Separators,
    pub show_column_headers: bool,
    pub auth_user: Option<String>,
    pub wait_trigger: TriggerKind,
    pub wait_object: Option<String>,
    /// Zero waits forever
    pub wait_timeout: Duration,
    /// Seconds to add to our times to get the client's
    pub timezone_offset: i64,
    /// Every column the query reads, in table order
    pub all_columns: Vec<Arc<Column>>,
}

/// Outcome of binding a `GET` request
pub struct ParsedRequest {
    pub response_header: ResponseHeader,
    pub keepalive: bool,
    pub query: Result<Query>,
}

/// Headers on top of the filter and stats stacks
struct Builder {
    query: Query,
    filters: Vec<Filter>,
    wait_conditions: Vec<Filter>,
    column_headers: Option<bool>,
    response_header: ResponseHeader,
    keepalive: bool,
}

fn on_stack(n: usize) -> String {
    match n {
        1 => "1 is".to_string(),
        n => format!("{} are", n),
    }
}

/// Pop the top `n` elements, oldest first
fn pop_n<T>(stack: &mut Vec<T>, n: usize, table: &str, what: &str) -> Result<Vec<T>> {
    if n > stack.len() {
        return Err(LqlError::BadRequest(format!(
            "error combining {} for table '{}': expected {} {}, but only {} on stack",
            what,
            table,
            n,
            what,
            on_stack(stack.len())
        )));
    }
    Ok(stack.split_off(stack.len() - n))
}

impl Builder {
    fn table_name(&self) -> String {
        self.query.table.name().to_string()
    }

    fn column(&self, name: &str) -> Result<Arc<Column>> {
        self.query.table.column(name)
    }

    fn condition(&self, condition: &Condition) -> Result<Filter> {
        let column = self.column(&condition.column)?;
        Ok(Filter::Column(ColumnFilter::new(
            column,
            condition.operator,
            &condition.value,
        )?))
    }

    fn combine(
        stack: &mut Vec<Filter>,
        n: usize,
        table: &str,
        what: &str,
        combine: fn(Vec<Filter>) -> Filter,
    ) -> Result<()> {
        let children = pop_n(stack, n, table, what)?;
        stack.push(combine(children));
        Ok(())
    }

    fn negate(stack: &mut Vec<Filter>, header: &str) -> Result<()> {
        let top = stack
            .pop()
            .ok_or_else(|| LqlError::BadRequest(format!("no {} header to negate", header)))?;
        stack.push(top.negate());
        Ok(())
    }

    fn combine_stats(&mut self, n: usize, combine: fn(Vec<Filter>) -> Filter) -> Result<()> {
        let table = self.table_name();
        let stats = pop_n(&mut self.query.stats, n, &table, "stats")?;
        let filters = stats
            .into_iter()
            .map(StatsColumn::steal_filter)
            .collect::<Result<Vec<_>>>()?;
        self.query.stats.push(StatsColumn::Count(combine(filters)));
        Ok(())
    }

    fn apply(&mut self, header: Header, now: i64) -> Result<()> {
        let table = self.table_name();
        match header {
            Header::Filter(condition) => {
                let filter = self.condition(&condition)?;
                self.filters.push(filter);
            }
            Header::And(n) => Self::combine(&mut self.filters, n, &table, "filters", Filter::and)?,
            Header::Or(n) => Self::combine(&mut self.filters, n, &table, "filters", Filter::or)?,
            Header::Negate => Self::negate(&mut self.filters, "Filter:")?,
            Header::Stats(StatsSpec::Count(condition)) => {
                let filter = self.condition(&condition)?;
                self.query.stats.push(StatsColumn::Count(filter));
            }
            Header::Stats(StatsSpec::Aggregate { kind, column }) => {
                let column = self.column(&column)?;
                self.query.stats.push(StatsColumn::aggregate(kind, column)?);
            }
            Header::StatsAnd(n) => self.combine_stats(n, Filter::and)?,
            Header::StatsOr(n) => self.combine_stats(n, Filter::or)?,
            Header::StatsNegate => {
                let top = self
                    .query
                    .stats
                    .pop()
                    .ok_or_else(|| LqlError::BadRequest("no Stats: header to negate".to_string()))?;
                self.query.stats.push(StatsColumn::Count(top.steal_filter()?.negate()));
            }
            Header::StatsGroupBy(names) => {
                warn!("the StatsGroupBy: header is deprecated, use Columns: instead");
                self.add_columns(&names)?;
            }
            Header::Columns(names) => self.add_columns(&names)?,
            Header::ColumnHeaders(on) => self.column_headers = Some(on),
            Header::Limit(n) => self.query.limit = Some(n),
            Header::Timelimit(secs) => self.query.time_limit = Some(Duration::from_secs(secs)),
            Header::AuthUser(name) => self.query.auth_user = Some(name),
            Header::Separators(separators) => self.query.separators = separators,
            Header::OutputFormat(format) => self.query.output_format = format,
            Header::ResponseHeader(mode) => self.response_header = mode,
            Header::KeepAlive(on) => self.keepalive = on,
            Header::WaitCondition(condition) => {
                let filter = self.condition(&condition)?;
                self.wait_conditions.push(filter);
            }
            Header::WaitConditionAnd(n) => {
                Self::combine(&mut self.wait_conditions, n, &table, "wait conditions", Filter::and)?
            }
            Header::WaitConditionOr(n) => {
                Self::combine(&mut self.wait_conditions, n, &table, "wait conditions", Filter::or)?
            }
            Header::WaitConditionNegate => Self::negate(&mut self.wait_conditions, "WaitCondition:")?,
            Header::WaitTrigger(name) => self.query.wait_trigger = name.parse()?,
            Header::WaitObject(key) => self.query.wait_object = Some(key),
            Header::WaitTimeout(ms) => self.query.wait_timeout = Duration::from_millis(ms),
            Header::Localtime(client_time) => {
                self.query.timezone_offset = timezone_offset(client_time, now)?;
            }
        }
        Ok(())
    }

    fn add_columns(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let column = self.column(name)?;
            self.query.columns.push(column);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Query> {
        self.query.filter = Filter::and(std::mem::take(&mut self.filters));
        self.query.wait_condition = Filter::and(std::mem::take(&mut self.wait_conditions));
        self.query.show_column_headers = self
            .column_headers
            .unwrap_or(self.query.columns.is_empty() && self.query.stats.is_empty());
        if self.query.wait_condition.is_contradiction() && self.query.wait_timeout.is_zero() {
            return Err(LqlError::BadRequest(
                "waiting for WaitCondition would hang forever".to_string(),
            ));
        }
        self.query.all_columns = referenced_columns(&self.query);
        Ok(self.query)
    }
}

/// Difference between the client's clock and ours, rounded to half hours
fn timezone_offset(client_time: i64, now: i64) -> Result<i64> {
    const HALF_HOUR: f64 = 1800.0;
    let too_far =
        || LqlError::BadRequest("timezone difference greater than or equal to 24 hours".to_string());
    let difference = client_time.checked_sub(now).ok_or_else(too_far)?;
    let offset = ((difference as f64 / HALF_HOUR).round() * HALF_HOUR) as i64;
    if offset.abs() >= 86400 {
        return Err(too_far());
    }
    if offset != 0 {
        debug!("timezone offset is {:.1}h", offset as f64 / 3600.0);
    }
    Ok(offset)
}

fn referenced_columns(query: &Query) -> Vec<Arc<Column>> {
    let mut referenced: Vec<Arc<Column>> = query.columns.clone();
    referenced.extend(query.filter.columns());
    referenced.extend(query.wait_condition.columns());
    for stats in &query.stats {
        referenced.extend(stats.columns());
    }
    query
        .table
        .columns()
        .iter()
        .filter(|c| referenced.iter().any(|r| Arc::ptr_eq(r, c)))
        .cloned()
        .collect()
}

impl Query {
    fn empty(table: Arc<dyn Table>) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filter: Filter::tautology(),
            wait_condition: Filter::tautology(),
            stats: Vec::new(),
            limit: None,
            time_limit: None,
            output_format: OutputFormat::default(),
            separators: Separators::default(),
            show_column_headers: true,
            auth_user: None,
            wait_trigger: TriggerKind::All,
            wait_object: None,
            wait_timeout: Duration::ZERO,
            timezone_offset: 0,
            all_columns: Vec::new(),
        }
    }

    /// Bind the headers of a `GET` request to `table`
    ///
    /// `now` is our current unix time, needed for `Localtime:`.
    pub fn parse(table: Arc<dyn Table>, headers: &[HeaderLine], now: i64) -> ParsedRequest {
        let mut builder = Builder {
            query: Query::empty(table),
            filters: Vec::new(),
            wait_conditions: Vec::new(),
            column_headers: None,
            response_header: ResponseHeader::Off,
            keepalive: false,
        };
        let mut error = None;
        for line in headers {
            if let Err(e) = parse_header(line).and_then(|h| builder.apply(h, now)) {
                debug!("error in header '{}': {}", line, e);
                error.get_or_insert(e.in_header(&line.name));
            }
        }
        let response_header = builder.response_header;
        let keepalive = builder.keepalive;
        let query = match error {
            Some(e) => Err(e),
            None => builder.finish(),
        };
        ParsedRequest {
            response_header,
            keepalive,
            query,
        }
    }

    /// Framing headers of a request whose table does not exist
    pub fn framing(headers: &[HeaderLine]) -> (ResponseHeader, bool) {
        let mut response_header = ResponseHeader::Off;
        let mut keepalive = false;
        for header in headers.iter().filter_map(|line| parse_header(line).ok()) {
            match header {
                Header::ResponseHeader(mode) => response_header = mode,
                Header::KeepAlive(on) => keepalive = on,
                _ => {}
            }
        }
        (response_header, keepalive)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table.name())
            .field("columns", &self.columns.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("filter", &self.filter.to_string())
            .field("stats", &self.stats.len())
            .field("limit", &self.limit)
            .field("output_format", &self.output_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tables::hosts::HostsTable;

    const NOW: i64 = 1_700_000_000;

    fn lines(text: &str) -> Vec<HeaderLine> {
        text.lines()
            .map(|line| match line.split_once(':') {
                Some((name, value)) => HeaderLine {
                    name: name.to_string(),
                    value: Some(value.trim_start().to_string()),
                },
                None => HeaderLine {
                    name: line.to_string(),
                    value: None,
                },
            })
            .collect()
    }

    fn parse(text: &str) -> ParsedRequest {
        Query::parse(Arc::new(HostsTable::new()), &lines(text), NOW)
    }

    fn query(text: &str) -> Query {
        parse(text).query.unwrap()
    }

    fn error(text: &str) -> String {
        parse(text).query.unwrap_err().to_string()
    }

    #[test]
    fn test_filters_are_anded() {
        let q = query("Filter: state = 1\nFilter: name = h1");
        assert_eq!(q.filter.to_string(), "(state = 1 AND name = h1)");
        assert!(q.show_column_headers);
    }

    #[test]
    fn test_or_and_negate() {
        let q = query("Filter: state = 1\nFilter: state = 2\nOr: 2\nNegate:");
        assert_eq!(q.filter.to_string(), "(state != 1 AND state != 2)");
    }

    #[test]
    fn test_stack_underflow() {
        assert_eq!(
            error("Filter: state = 1\nAnd: 3"),
            "And: error combining filters for table 'hosts': expected 3 filters, but only 1 is on stack"
        );
        assert_eq!(error("Negate:"), "Negate: no Filter: header to negate");
    }

    #[test]
    fn test_stats_combination() {
        let q = query("Stats: state = 0\nStats: state = 1\nStatsOr: 2\nStats: sum latency");
        assert_eq!(q.stats.len(), 2);
        assert!(matches!(&q.stats[0], StatsColumn::Count(Filter::Or(children)) if children.len() == 2));
        assert!(!q.show_column_headers);
        assert!(error("Stats: sum latency\nStatsNegate:").starts_with("StatsNegate: cannot combine"));
    }

    #[test]
    fn test_unknown_column_and_header() {
        assert_eq!(error("Columns: name bogus"), "Columns: table 'hosts' has no column 'bogus'");
        assert_eq!(error("Frobnicate: 1"), "Frobnicate: undefined request header");
    }

    #[test]
    fn test_framing_survives_errors() {
        let parsed = parse("Columns: bogus\nResponseHeader: fixed16\nKeepAlive: on");
        assert!(parsed.query.is_err());
        assert_eq!(parsed.response_header, ResponseHeader::Fixed16);
        assert!(parsed.keepalive);
    }

    #[test]
    fn test_first_error_wins() {
        assert_eq!(error("Limit: x\nColumns: bogus"), "Limit: expected non-negative integer");
    }

    #[test]
    fn test_column_headers_explicit_wins() {
        assert!(!query("Columns: name").show_column_headers);
        assert!(query("Columns: name\nColumnHeaders: on").show_column_headers);
        assert!(!query("ColumnHeaders: off").show_column_headers);
    }

    #[test]
    fn test_localtime() {
        assert_eq!(query(&format!("Localtime: {}", NOW + 3590)).timezone_offset, 3600);
        assert_eq!(query(&format!("Localtime: {}", NOW + 10)).timezone_offset, 0);
        assert_eq!(
            error(&format!("Localtime: {}", NOW + 86400)),
            "Localtime: timezone difference greater than or equal to 24 hours"
        );
    }

    #[test]
    fn test_localtime_far_from_now() {
        assert_eq!(
            error(&format!("Localtime: {}", i64::MAX)),
            "Localtime: timezone difference greater than or equal to 24 hours"
        );
        assert_eq!(error("Localtime: 9223372036854775808"), "Localtime: timestamp out of range");
        assert_eq!(
            timezone_offset(0, i64::MAX).unwrap_err().to_string(),
            "timezone difference greater than or equal to 24 hours"
        );
        assert_eq!(
            timezone_offset(i64::MIN, 1).unwrap_err().to_string(),
            "timezone difference greater than or equal to 24 hours"
        );
    }

    #[test]
    fn test_wait_headers() {
        let q = query("WaitObject: h1\nWaitCondition: state = 0\nWaitTrigger: state\nWaitTimeout: 500");
        assert_eq!(q.wait_object.as_deref(), Some("h1"));
        assert_eq!(q.wait_trigger, TriggerKind::State);
        assert_eq!(q.wait_timeout, Duration::from_millis(500));
        assert!(!q.wait_condition.is_tautology());
        assert_eq!(
            error("WaitCondition: state = 0\nWaitConditionNegate:\nWaitConditionOr: 0"),
            "waiting for WaitCondition would hang forever"
        );
    }

    #[test]
    fn test_all_columns_in_table_order() {
        let q = query("Columns: state name\nFilter: name = h1\nStats: sum latency");
        let names: Vec<&str> = q.all_columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["name", "state", "latency"]);
    }
}
