//! Monitoring objects as the core exposes them
//!
//! Relations are stored as indices into the owning arena. The name based
//! fields (`contacts`, `members`, ...) are what snapshot files carry; the
//! `*_ids` fields are filled in when a snapshot is linked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub usize);
        )*
    };
}

arena_id! {
    /// Index into the host arena
    HostId,
    /// Index into the service arena
    ServiceId,
    HostGroupId,
    ServiceGroupId,
    ContactId,
    ContactGroupId,
}

/// Check related state shared by hosts and services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckState {
    pub check_command: String,
    /// Host: 0 up, 1 down, 2 unreachable. Service: 0 ok, 1 warn, 2 crit, 3 unknown
    pub state: i32,
    /// 0 soft, 1 hard
    pub state_type: i32,
    pub last_hard_state: i32,
    pub has_been_checked: bool,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub last_check: i64,
    pub next_check: i64,
    pub last_state_change: i64,
    pub current_attempt: i32,
    pub max_check_attempts: i32,
    pub acknowledged: bool,
    pub scheduled_downtime_depth: i32,
    pub latency: f64,
    pub execution_time: f64,
    pub check_interval: f64,
    pub active_checks_enabled: bool,
    pub notifications_enabled: bool,
    pub is_flapping: bool,
}

impl CheckState {
    /// The state a hard-state view reports
    pub fn hard_state(&self) -> i32 {
        if self.state_type == 1 {
            self.state
        } else {
            self.last_hard_state
        }
    }

    /// Problems that are acknowledged or in a downtime
    pub fn is_handled(&self) -> bool {
        self.acknowledged || self.scheduled_downtime_depth > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub name: String,
    pub alias: String,
    pub display_name: String,
    pub address: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    #[serde(flatten)]
    pub check: CheckState,
    pub parents: Vec<String>,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
    pub custom_variables: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,

    #[serde(skip)]
    pub id: HostId,
    #[serde(skip)]
    pub services: Vec<ServiceId>,
    #[serde(skip)]
    pub groups: Vec<HostGroupId>,
    #[serde(skip)]
    pub contact_ids: Vec<ContactId>,
    #[serde(skip)]
    pub contact_group_ids: Vec<ContactGroupId>,
    #[serde(skip)]
    pub children: Vec<HostId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub host_name: String,
    pub description: String,
    pub display_name: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    #[serde(flatten)]
    pub check: CheckState,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
    pub custom_variables: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,

    #[serde(skip)]
    pub id: ServiceId,
    #[serde(skip)]
    pub host: HostId,
    #[serde(skip)]
    pub groups: Vec<ServiceGroupId>,
    #[serde(skip)]
    pub contact_ids: Vec<ContactId>,
    #[serde(skip)]
    pub contact_group_ids: Vec<ContactGroupId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostGroup {
    pub name: String,
    pub alias: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub members: Vec<String>,

    #[serde(skip)]
    pub id: HostGroupId,
    #[serde(skip)]
    pub member_ids: Vec<HostId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceGroup {
    pub name: String,
    pub alias: String,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    /// `[host_name, service_description]` pairs
    pub members: Vec<(String, String)>,

    #[serde(skip)]
    pub id: ServiceGroupId,
    #[serde(skip)]
    pub member_ids: Vec<ServiceId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub alias: String,
    pub email: String,
    pub pager: String,
    pub host_notifications_enabled: bool,
    pub service_notifications_enabled: bool,
    pub can_submit_commands: bool,
    pub custom_variables: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,

    #[serde(skip)]
    pub id: ContactId,
    #[serde(skip)]
    pub groups: Vec<ContactGroupId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<String>,

    #[serde(skip)]
    pub id: ContactGroupId,
    #[serde(skip)]
    pub member_ids: Vec<ContactId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    pub name: String,
    pub line: String,
}

/// One line of the monitoring history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub time: i64,
    pub lineno: i64,
    /// 0 info, 1 alert, 2 program, 3 notification, 4 passive, 5 command, 6 state, 7 text
    pub class: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub options: String,
    pub comment: String,
    pub plugin_output: String,
    pub state: i32,
    pub state_type: String,
    pub attempt: i32,
    pub host_name: String,
    pub service_description: String,
    pub contact_name: String,
    pub command_name: String,

    #[serde(skip)]
    pub host: Option<HostId>,
    #[serde(skip)]
    pub service: Option<ServiceId>,
    #[serde(skip)]
    pub contact: Option<ContactId>,
}

/// Global state of the monitoring process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramStatus {
    pub program_version: String,
    pub program_start: i64,
    pub pid: i64,
    pub last_command_check: i64,
    pub last_log_rotation: i64,
    pub interval_length: i64,
    pub enable_notifications: bool,
    pub execute_service_checks: bool,
    pub accept_passive_service_checks: bool,
    pub execute_host_checks: bool,
    pub accept_passive_host_checks: bool,
    pub enable_event_handlers: bool,
    pub enable_flap_detection: bool,
    pub process_performance_data: bool,
    pub check_service_freshness: bool,
    pub check_host_freshness: bool,
}

impl Default for ProgramStatus {
    fn default() -> Self {
        Self {
            program_version: String::new(),
            program_start: 0,
            pid: 0,
            last_command_check: 0,
            last_log_rotation: 0,
            interval_length: 60,
            enable_notifications: true,
            execute_service_checks: true,
            accept_passive_service_checks: true,
            execute_host_checks: true,
            accept_passive_host_checks: true,
            enable_event_handlers: true,
            enable_flap_detection: true,
            process_performance_data: true,
            check_service_freshness: true,
            check_host_freshness: false,
        }
    }
}
