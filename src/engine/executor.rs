//! Query execution
//!
//! A query runs in two steps: an optional wait for its `WaitCondition:` and
//! a scan of its table. The scan is the single sink for rows; tables decide
//! which rows exist and the user may see, the scan filters, limits, renders
//! and aggregates them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::engine::column::{Column, Row, RowContext};
use crate::engine::filter::Filter;
use crate::engine::query::Query;
use crate::engine::stats::Aggregator;
use crate::error::{LqlError, Result};
use crate::monitoring::{LiveCore, MonitoringCore};
use crate::output::{make_renderer, Renderer};
use crate::security::{AuthorizationPolicy, User};

/// Server wide settings every query runs with
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub authorization: AuthorizationPolicy,
    /// Bytes of rendered output after which a query fails
    pub max_response_size: u64,
    /// Set when the server shuts down; running scans stop early
    pub shutdown: Arc<AtomicBool>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            authorization: AuthorizationPolicy::default(),
            max_response_size: 100 * 1024 * 1024,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ExecutionContext {
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Run a query and return its rendered body
///
/// `client_gone` is polled between rows so that abandoned queries stop.
pub fn execute_query(
    query: &Query,
    core: &LiveCore,
    ctx: &ExecutionContext,
    client_gone: &dyn Fn() -> bool,
) -> Result<String> {
    if !query.wait_condition.is_tautology() {
        wait_for_condition(query, core, ctx)?;
    }

    let snapshot = core.snapshot();
    let user = User::resolve(&*snapshot, query.auth_user.as_deref(), &ctx.authorization);
    let mut scan = Scan::new(query, ctx, client_gone, &*snapshot, &user);
    scan.begin();
    if let Err(e) = query.table.answer_query(&mut scan) {
        warn!("query on table '{}' failed: {}", query.table.name(), e);
        scan.fail(e);
    }
    scan.finish()
}

// ============================================================================
// Waiting
// ============================================================================

fn wait_for_condition(query: &Query, core: &LiveCore, ctx: &ExecutionContext) -> Result<()> {
    if wait_object_holds(query, &*core.snapshot())? {
        return Ok(());
    }
    debug!(
        "waiting for '{}' on trigger {}",
        query.wait_condition, query.wait_trigger
    );
    let satisfied = core.triggers().wait_for(query.wait_trigger, query.wait_timeout, || {
        ctx.is_shutting_down()
            || wait_object_holds(query, &*core.snapshot()).unwrap_or_else(|e| {
                debug!("ending wait, {}", e);
                true
            })
    });
    if !satisfied {
        debug!("wait timed out after {:?}", query.wait_timeout);
    }
    Ok(())
}

/// Evaluate the wait condition on the wait object, unrestricted by `AuthUser:`
fn wait_object_holds(query: &Query, core: &dyn MonitoringCore) -> Result<bool> {
    let row = match &query.wait_object {
        Some(key) => query.table.get(core, key).ok_or_else(|| {
            LqlError::BadRequest(format!(
                "primary key '{}' not found or not supported by this table",
                key
            ))
        })?,
        None => query
            .table
            .get_default(core)
            .ok_or_else(|| LqlError::BadRequest("missing WaitObject".to_string()))?,
    };
    let user = User::NoAuth;
    let row_context = RowContext {
        core,
        user: &user,
        timezone_offset: query.timezone_offset,
    };
    Ok(query.wait_condition.accepts(row, &row_context))
}

// ============================================================================
// Scanning
// ============================================================================

/// The receiving end of a table scan
pub struct Scan<'q, 'a> {
    query: &'q Query,
    ctx: &'q ExecutionContext,
    client_gone: &'q dyn Fn() -> bool,
    row_context: RowContext<'a>,
    renderer: Box<dyn Renderer>,
    out: String,
    /// Rows that passed the filter
    current_line: usize,
    started: Instant,
    error: Option<LqlError>,
    /// Rows written so far, the header row included
    rows_emitted: usize,
    groups: Vec<(String, Vec<Aggregator>)>,
    group_index: HashMap<String, usize>,
}

impl<'q, 'a> Scan<'q, 'a> {
    pub fn new(
        query: &'q Query,
        ctx: &'q ExecutionContext,
        client_gone: &'q dyn Fn() -> bool,
        core: &'a dyn MonitoringCore,
        user: &'a User<'a>,
    ) -> Self {
        let mut scan = Self {
            query,
            ctx,
            client_gone,
            row_context: RowContext {
                core,
                user,
                timezone_offset: query.timezone_offset,
            },
            renderer: make_renderer(query.output_format, &query.separators),
            out: String::new(),
            current_line: 0,
            started: Instant::now(),
            error: None,
            rows_emitted: 0,
            groups: Vec::new(),
            group_index: HashMap::new(),
        };
        if !query.stats.is_empty() && query.columns.is_empty() {
            scan.group(String::new());
        }
        scan
    }

    pub fn core(&self) -> &'a dyn MonitoringCore {
        self.row_context.core
    }

    pub fn user(&self) -> &'a User<'a> {
        self.row_context.user
    }

    pub fn filter(&self) -> &'q Filter {
        &self.query.filter
    }

    pub fn timezone_offset(&self) -> i64 {
        self.query.timezone_offset
    }

    /// Every column the query reads, in table order
    pub fn all_columns(&self) -> &'q [Arc<Column>] {
        &self.query.all_columns
    }

    fn begin(&mut self) {
        self.renderer.begin_query(&mut self.out);
        if !self.query.show_column_headers {
            return;
        }
        let mut names: Vec<String> = self
            .query
            .columns
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        names.extend((1..=self.query.stats.len()).map(|i| format!("stats_{}", i)));
        self.begin_output_row();
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.renderer.separate_row_elements(&mut self.out);
            }
            self.renderer.output(&mut self.out, &name.as_str().into());
        }
        self.renderer.end_row(&mut self.out);
    }

    fn fail(&mut self, error: LqlError) {
        self.error.get_or_insert(error);
    }

    fn should_stop(&self) -> bool {
        self.error.is_some() || self.ctx.is_shutting_down() || (self.client_gone)()
    }

    /// Offer a row to the query
    ///
    /// Returns false once the scan should stop: on errors, when the limit
    /// is reached, or when the client or the server went away.
    pub fn process_row(&mut self, row: Row<'_>) -> bool {
        if self.should_stop() {
            return false;
        }
        if self.out.len() as u64 > self.ctx.max_response_size {
            self.fail(LqlError::LimitExceeded(format!(
                "Maximum response size of {} bytes exceeded!",
                self.ctx.max_response_size
            )));
            return false;
        }
        if !self.query.filter.accepts(row, &self.row_context) {
            return true;
        }
        self.current_line += 1;
        if self.query.limit.map_or(false, |limit| self.current_line > limit) {
            return false;
        }
        if let Some(time_limit) = self.query.time_limit {
            if self.started.elapsed() >= time_limit {
                self.fail(LqlError::LimitExceeded(format!(
                    "Maximum query time of {} seconds exceeded!",
                    time_limit.as_secs()
                )));
                return false;
            }
        }
        if self.query.stats.is_empty() {
            self.render_row(row);
        } else {
            self.aggregate(row);
        }
        true
    }

    fn begin_output_row(&mut self) {
        if self.rows_emitted > 0 {
            self.renderer.separate_query_elements(&mut self.out);
        }
        self.rows_emitted += 1;
        self.renderer.begin_row(&mut self.out);
    }

    fn render_columns(&self, row: Row<'_>, out: &mut String) {
        for (i, column) in self.query.columns.iter().enumerate() {
            if i > 0 {
                self.renderer.separate_row_elements(out);
            }
            let value = column
                .value(row, &self.row_context)
                .shifted(self.query.timezone_offset);
            self.renderer.output(out, &value);
        }
    }

    fn render_row(&mut self, row: Row<'_>) {
        self.begin_output_row();
        let mut out = std::mem::take(&mut self.out);
        self.render_columns(row, &mut out);
        self.renderer.end_row(&mut out);
        self.out = out;
    }

    fn group(&mut self, key: String) -> usize {
        if let Some(index) = self.group_index.get(&key) {
            return *index;
        }
        let aggregators = self
            .query
            .stats
            .iter()
            .map(|stats| stats.create_aggregator())
            .collect();
        let index = self.groups.len();
        self.group_index.insert(key.clone(), index);
        self.groups.push((key, aggregators));
        index
    }

    fn aggregate(&mut self, row: Row<'_>) {
        let mut key = String::new();
        self.render_columns(row, &mut key);
        let index = self.group(key);
        let stats = &self.query.stats;
        for (column, aggregator) in stats.iter().zip(self.groups[index].1.iter_mut()) {
            aggregator.update(column, row, &self.row_context);
        }
    }

    fn finish(mut self) -> Result<String> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let groups = std::mem::take(&mut self.groups);
        for (key, aggregators) in &groups {
            self.begin_output_row();
            self.out.push_str(key);
            for (i, (column, aggregator)) in self.query.stats.iter().zip(aggregators).enumerate() {
                if i > 0 || !self.query.columns.is_empty() {
                    self.renderer.separate_row_elements(&mut self.out);
                }
                self.renderer.output(&mut self.out, &aggregator.value(column));
            }
            self.renderer.end_row(&mut self.out);
        }
        self.renderer.end_query(&mut self.out);
        debug!(
            "{} rows matched, {} bytes in {:?}",
            self.current_line,
            self.out.len(),
            self.started.elapsed()
        );
        Ok(self.out)
    }
}
