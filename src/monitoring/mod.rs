//! Access to the monitoring core
//!
//! The query engine only reads the core through [`MonitoringCore`]. A
//! [`LiveCore`] holds the current state behind a lock, hands out consistent
//! snapshots to queries and wakes blocked queries when new state is
//! published.

pub mod model;
pub mod snapshot;
pub mod triggers;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::error::{LqlError, Result};
use crate::parser::ExternalCommand;

pub use model::*;
pub use snapshot::Snapshot;
pub use triggers::{TriggerKind, Triggers};

/// Read interface over the object graph of a monitoring core
pub trait MonitoringCore: Send + Sync {
    fn hosts(&self) -> &[Host];
    fn services(&self) -> &[Service];
    fn host_groups(&self) -> &[HostGroup];
    fn service_groups(&self) -> &[ServiceGroup];
    fn contacts(&self) -> &[Contact];
    fn contact_groups(&self) -> &[ContactGroup];
    fn commands(&self) -> &[Command];
    /// Sorted by time, oldest first
    fn log_entries(&self) -> &[LogEntry];
    fn status(&self) -> &ProgramStatus;

    fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts().get(id.0)
    }

    fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services().get(id.0)
    }

    fn host_group(&self, id: HostGroupId) -> Option<&HostGroup> {
        self.host_groups().get(id.0)
    }

    fn service_group(&self, id: ServiceGroupId) -> Option<&ServiceGroup> {
        self.service_groups().get(id.0)
    }

    fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.contacts().get(id.0)
    }

    fn contact_group(&self, id: ContactGroupId) -> Option<&ContactGroup> {
        self.contact_groups().get(id.0)
    }

    fn find_host(&self, name: &str) -> Option<&Host> {
        self.hosts().iter().find(|h| h.name == name)
    }

    fn find_service(&self, host_name: &str, description: &str) -> Option<&Service> {
        let host = self.find_host(host_name)?;
        host.services
            .iter()
            .filter_map(|id| self.service(*id))
            .find(|s| s.description == description)
    }

    fn find_host_group(&self, name: &str) -> Option<&HostGroup> {
        self.host_groups().iter().find(|g| g.name == name)
    }

    fn find_service_group(&self, name: &str) -> Option<&ServiceGroup> {
        self.service_groups().iter().find(|g| g.name == name)
    }

    fn find_contact(&self, name: &str) -> Option<&Contact> {
        self.contacts().iter().find(|c| c.name == name)
    }

    fn find_contact_group(&self, name: &str) -> Option<&ContactGroup> {
        self.contact_groups().iter().find(|g| g.name == name)
    }

    fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands().iter().find(|c| c.name == name)
    }

    /// Find a host by name, falling back to a case-insensitive match on
    /// name, alias or address
    fn find_host_by_designation(&self, designation: &str) -> Option<&Host> {
        self.find_host(designation).or_else(|| {
            self.hosts().iter().find(|h| {
                h.name.eq_ignore_ascii_case(designation)
                    || h.alias.eq_ignore_ascii_case(designation)
                    || h.address.eq_ignore_ascii_case(designation)
            })
        })
    }
}

/// Destination of external commands
pub trait CommandSink: Send + Sync {
    fn submit(&self, command: &ExternalCommand) -> Result<()>;
}

/// Logs commands without acting on them
#[derive(Debug, Default)]
pub struct LogCommandSink;

impl CommandSink for LogCommandSink {
    fn submit(&self, command: &ExternalCommand) -> Result<()> {
        info!("external command: {}", command);
        Ok(())
    }
}

/// Appends commands to the core's command pipe, one line each
#[derive(Debug)]
pub struct PipeCommandSink {
    path: PathBuf,
}

impl PipeCommandSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CommandSink for PipeCommandSink {
    fn submit(&self, command: &ExternalCommand) -> Result<()> {
        let mut pipe = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LqlError::Internal(format!(
                    "cannot open command pipe {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        let line = match command.timestamp {
            Some(_) => format!("{}\n", command),
            None => format!("[{}] {}\n", chrono::Utc::now().timestamp(), command),
        };
        pipe.write_all(line.as_bytes())?;
        info!("forwarded command {} to {}", command.name, self.path.display());
        Ok(())
    }
}

/// The current state of the core plus its change notifications
pub struct LiveCore {
    state: RwLock<Arc<dyn MonitoringCore>>,
    triggers: Triggers,
    commands: Box<dyn CommandSink>,
}

impl LiveCore {
    pub fn new(state: impl MonitoringCore + 'static) -> Self {
        let state: Arc<dyn MonitoringCore> = Arc::new(state);
        Self {
            state: RwLock::new(state),
            triggers: Triggers::new(),
            commands: Box::new(LogCommandSink),
        }
    }

    pub fn with_command_sink(mut self, sink: impl CommandSink + 'static) -> Self {
        self.commands = Box::new(sink);
        self
    }

    /// The state queries run against; it never changes underneath them
    pub fn snapshot(&self) -> Arc<dyn MonitoringCore> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&state)
    }

    /// Replace the state and wake queries waiting for `kind`
    pub fn publish(&self, state: impl MonitoringCore + 'static, kind: TriggerKind) {
        {
            let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
            *current = Arc::new(state);
        }
        if kind == TriggerKind::All {
            self.triggers.notify_all_kinds();
        } else {
            self.triggers.notify(kind);
        }
    }

    pub fn triggers(&self) -> &Triggers {
        &self.triggers
    }

    pub fn submit_command(&self, command: &ExternalCommand) -> Result<()> {
        self.commands.submit(command)?;
        self.triggers.notify(TriggerKind::Command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::snapshot::fixtures::site;
    use super::*;

    #[test]
    fn test_publish_replaces_state() {
        let core = LiveCore::new(site());
        let before = core.snapshot();
        core.publish(Snapshot::default(), TriggerKind::State);
        assert_eq!(before.hosts().len(), 3);
        assert_eq!(core.snapshot().hosts().len(), 0);
    }

    #[test]
    fn test_default_lookups() {
        struct Bare(Snapshot);
        impl MonitoringCore for Bare {
            fn hosts(&self) -> &[Host] {
                &self.0.hosts
            }
            fn services(&self) -> &[Service] {
                &self.0.services
            }
            fn host_groups(&self) -> &[HostGroup] {
                &self.0.host_groups
            }
            fn service_groups(&self) -> &[ServiceGroup] {
                &self.0.service_groups
            }
            fn contacts(&self) -> &[Contact] {
                &self.0.contacts
            }
            fn contact_groups(&self) -> &[ContactGroup] {
                &self.0.contact_groups
            }
            fn commands(&self) -> &[Command] {
                &self.0.commands
            }
            fn log_entries(&self) -> &[LogEntry] {
                &self.0.log
            }
            fn status(&self) -> &ProgramStatus {
                &self.0.status
            }
        }

        let core = Bare(site());
        assert_eq!(core.find_service("h1", "Disk").unwrap().check.state, 2);
        assert!(core.find_service("h2", "Disk").is_none());
        assert_eq!(core.find_host_group("web").unwrap().member_ids.len(), 2);
    }

    #[test]
    fn test_pipe_command_sink_appends_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmd");
        std::fs::write(&path, "").unwrap();
        let sink = PipeCommandSink::new(path.clone());
        let command = crate::parser::parse_external_command("[123] DISABLE_NOTIFICATIONS").unwrap();
        sink.submit(&command).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[123] DISABLE_NOTIFICATIONS\n");
    }
}
