//! The table registry and request dispatch

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::engine::tables::by_group::{HostsByGroupTable, ServicesByGroupTable, ServicesByHostGroupTable};
use crate::engine::tables::columns::ColumnsTable;
use crate::engine::tables::commands::CommandsTable;
use crate::engine::tables::contacts::{ContactGroupsTable, ContactsTable};
use crate::engine::tables::eventconsole::EventConsoleTable;
use crate::engine::tables::hostgroups::HostGroupsTable;
use crate::engine::tables::hosts::HostsTable;
use crate::engine::tables::labels::LabelsTable;
use crate::engine::tables::log::LogTable;
use crate::engine::tables::servicegroups::ServiceGroupsTable;
use crate::engine::tables::services::ServicesTable;
use crate::engine::tables::status::StatusTable;
use crate::engine::tables::Table;
use crate::engine::{execute_query, ExecutionContext, Query};
use crate::error::{LqlError, Result};
use crate::eventconsole::EventConsoleClient;
use crate::monitoring::LiveCore;
use crate::parser::{parse_request, ExternalCommand, GetRequest, Request, ResponseHeader};
use crate::server::buffer::{OutputBuffer, ResponseCode};

/// What to send back for one request
#[derive(Debug)]
pub struct Answer {
    pub output: String,
    pub code: ResponseCode,
    /// Whether the connection stays open for another request
    pub keepalive: bool,
}

pub struct Store {
    core: Arc<LiveCore>,
    ctx: ExecutionContext,
    tables: Vec<Arc<dyn Table>>,
    event_console: Option<EventConsoleClient>,
}

impl Store {
    pub fn new(
        core: Arc<LiveCore>,
        ctx: ExecutionContext,
        event_console: Option<EventConsoleClient>,
    ) -> Self {
        let mut tables: Vec<Arc<dyn Table>> = vec![
            Arc::new(StatusTable::new()),
            Arc::new(HostsTable::new()),
            Arc::new(ServicesTable::new()),
            Arc::new(HostGroupsTable::new()),
            Arc::new(ServiceGroupsTable::new()),
            Arc::new(HostsByGroupTable::new()),
            Arc::new(ServicesByGroupTable::new()),
            Arc::new(ServicesByHostGroupTable::new()),
            Arc::new(ContactsTable::new()),
            Arc::new(ContactGroupsTable::new()),
            Arc::new(CommandsTable::new()),
            Arc::new(LogTable::new()),
            Arc::new(LabelsTable::new()),
            Arc::new(EventConsoleTable::events(event_console.clone())),
            Arc::new(EventConsoleTable::history(event_console.clone())),
            Arc::new(EventConsoleTable::rules(event_console.clone())),
        ];
        tables.push(Arc::new(ColumnsTable::new(tables.clone())));
        Self {
            core,
            ctx,
            tables,
            event_console,
        }
    }

    pub fn core(&self) -> &Arc<LiveCore> {
        &self.core
    }

    pub fn tables(&self) -> &[Arc<dyn Table>] {
        &self.tables
    }

    pub fn find_table(&self, name: &str) -> Option<&Arc<dyn Table>> {
        self.tables.iter().find(|table| table.name() == name)
    }

    /// Answer one request block
    ///
    /// `client_gone` is polled while a query runs.
    pub fn answer_request(&self, text: &str, client_gone: &dyn Fn() -> bool) -> Answer {
        let started = Instant::now();
        info!(
            "request: {} ({} lines)",
            text.lines().next().unwrap_or(""),
            text.lines().count()
        );
        debug!("request text:\n{}", text);

        let mut buffer = OutputBuffer::new(ResponseHeader::Off);
        let keepalive = match parse_request(text) {
            Ok(Request::Get(request)) => self.answer_get(&request, &mut buffer, client_gone),
            Ok(Request::Command(command)) => {
                self.answer_command(&command);
                true
            }
            Ok(Request::Invalid(method)) => {
                buffer.set_error(&LqlError::InvalidMethod(method));
                false
            }
            Err(e) => {
                buffer.set_error(&e);
                false
            }
        };
        let code = buffer.code();
        let output = buffer.finish();
        info!(
            "answered with {} in {:?}, {} bytes",
            code.code(),
            started.elapsed(),
            output.len()
        );
        Answer {
            output,
            code,
            keepalive,
        }
    }

    fn answer_get(
        &self,
        request: &GetRequest,
        buffer: &mut OutputBuffer,
        client_gone: &dyn Fn() -> bool,
    ) -> bool {
        let table = match self.lookup(&request.table) {
            Ok(table) => table,
            Err(e) => {
                let (response_header, keepalive) = Query::framing(&request.headers);
                buffer.set_response_header(response_header);
                buffer.set_error(&e);
                return keepalive;
            }
        };
        let parsed = Query::parse(
            Arc::clone(table),
            &request.headers,
            chrono::Utc::now().timestamp(),
        );
        buffer.set_response_header(parsed.response_header);
        let result = parsed
            .query
            .and_then(|query| execute_query(&query, &self.core, &self.ctx, client_gone));
        match result {
            Ok(body) => buffer.push_str(&body),
            Err(e) => {
                debug!("GET {} failed: {}", request.table, e);
                buffer.set_error(&e);
            }
        }
        parsed.keepalive
    }

    fn lookup(&self, name: &str) -> Result<&Arc<dyn Table>> {
        if name.is_empty() {
            return Err(LqlError::BadRequest(
                "Invalid GET request, missing table name".to_string(),
            ));
        }
        self.find_table(name).ok_or_else(|| {
            LqlError::TableNotFound(format!("Invalid GET request, no such table '{}'", name))
        })
    }

    fn answer_command(&self, command: &ExternalCommand) {
        let result = if command.is_event_console_command() {
            match &self.event_console {
                Some(client) => client.send_command(command),
                None => {
                    info!("event console disabled, dropping command {}", command.name);
                    Ok(())
                }
            }
        } else if command.name == "LOG" {
            let command = ExternalCommand {
                name: "_LOG".to_string(),
                ..command.clone()
            };
            self.core.submit_command(&command)
        } else {
            self.core.submit_command(command)
        };
        if let Err(e) = result {
            warn!("command {} failed: {}", command.name, e);
        }
    }
}
