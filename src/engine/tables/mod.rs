//! Virtual tables over the monitoring core
//!
//! Every table declares its columns once, at startup, and answers queries by
//! handing authorized rows to a [`Scan`]. Column groups of one object kind
//! are shared between tables through the `add_columns(set, prefix)`
//! functions of the per-kind modules; which object such a group reads is
//! decided by the projections below.

pub mod by_group;
pub mod columns;
pub mod commands;
pub mod contacts;
pub mod eventconsole;
pub mod hostgroups;
pub mod hosts;
pub mod labels;
pub mod log;
pub mod servicegroups;
pub mod services;
pub mod status;

use std::sync::Arc;

use crate::engine::column::{Column, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::error::{LqlError, Result};
use crate::monitoring::{
    Command, Contact, ContactGroup, Host, HostGroup, MonitoringCore, Service, ServiceGroup,
};
use crate::security::User;

pub trait Table: Send + Sync {
    /// Name used in `GET <name>`
    fn name(&self) -> &str;

    /// Prefix that may be put in front of any column name
    fn name_prefix(&self) -> &str;

    fn columns(&self) -> &ColumnSet;

    /// Feed all rows the scan's user may see to the scan
    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()>;

    /// Row for a primary key
    fn get<'a>(&self, _core: &'a dyn MonitoringCore, _key: &str) -> Option<Row<'a>> {
        None
    }

    /// Row used by wait conditions without `WaitObject:`
    fn get_default<'a>(&self, _core: &'a dyn MonitoringCore) -> Option<Row<'a>> {
        None
    }

    /// Look up a column, stripping any number of name prefixes
    fn column(&self, name: &str) -> Result<Arc<Column>> {
        let prefix = self.name_prefix();
        let mut rest = name;
        loop {
            if let Some(column) = self.columns().find(rest) {
                return Ok(Arc::clone(column));
            }
            match rest.strip_prefix(prefix) {
                Some(stripped) if !prefix.is_empty() => rest = stripped,
                _ => break,
            }
        }
        Err(LqlError::BadRequest(format!(
            "table '{}' has no column '{}'",
            self.name(),
            name
        )))
    }
}

// ============================================================================
// Projections
// ============================================================================

pub(crate) fn row_host<'a>(row: Row<'a>, ctx: &RowContext<'a>) -> Option<&'a Host> {
    match row {
        Row::Host(h) | Row::HostInGroup(h, _) => Some(h),
        Row::Service(s) | Row::ServiceInGroup(s, _) | Row::ServiceInHostGroup(s, _) => {
            ctx.core.host(s.host)
        }
        Row::Log(entry) => entry.host.and_then(|id| ctx.core.host(id)),
        Row::Event(event) => event.host.and_then(|id| ctx.core.host(id)),
        _ => None,
    }
}

pub(crate) fn row_service<'a>(row: Row<'a>, ctx: &RowContext<'a>) -> Option<&'a Service> {
    match row {
        Row::Service(s) | Row::ServiceInGroup(s, _) | Row::ServiceInHostGroup(s, _) => Some(s),
        Row::Log(entry) => entry.service.and_then(|id| ctx.core.service(id)),
        _ => None,
    }
}

pub(crate) fn row_host_group<'a>(row: Row<'a>, _ctx: &RowContext<'a>) -> Option<&'a HostGroup> {
    match row {
        Row::HostGroup(g) | Row::HostInGroup(_, g) | Row::ServiceInHostGroup(_, g) => Some(g),
        _ => None,
    }
}

pub(crate) fn row_service_group<'a>(
    row: Row<'a>,
    _ctx: &RowContext<'a>,
) -> Option<&'a ServiceGroup> {
    match row {
        Row::ServiceGroup(g) | Row::ServiceInGroup(_, g) => Some(g),
        _ => None,
    }
}

pub(crate) fn row_contact<'a>(row: Row<'a>, ctx: &RowContext<'a>) -> Option<&'a Contact> {
    match row {
        Row::Contact(c) => Some(c),
        Row::Log(entry) => entry.contact.and_then(|id| ctx.core.contact(id)),
        _ => None,
    }
}

pub(crate) fn row_contact_group<'a>(
    row: Row<'a>,
    _ctx: &RowContext<'a>,
) -> Option<&'a ContactGroup> {
    match row {
        Row::ContactGroup(g) => Some(g),
        _ => None,
    }
}

pub(crate) fn row_command<'a>(row: Row<'a>, ctx: &RowContext<'a>) -> Option<&'a Command> {
    match row {
        Row::Command(c) => Some(c),
        Row::Log(entry) if !entry.command_name.is_empty() => {
            ctx.core.find_command(&entry.command_name)
        }
        _ => None,
    }
}

// ============================================================================
// State summaries
// ============================================================================

/// Rank of a service state in "worst state" order OK < WARN < UNKNOWN < CRIT
fn service_state_rank(state: i32) -> i32 {
    match state {
        0 => 0,
        1 => 1,
        3 => 2,
        _ => 3,
    }
}

/// Rank of a host state in "worst state" order UP < UNREACHABLE < DOWN
fn host_state_rank(state: i32) -> i32 {
    match state {
        0 => 0,
        2 => 1,
        _ => 2,
    }
}

/// Summaries over the services of a host or group the user may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceListState {
    Num,
    NumPending,
    NumHandledProblems,
    NumUnhandledProblems,
    NumOk,
    NumWarn,
    NumCrit,
    NumUnknown,
    WorstState,
    NumHardOk,
    NumHardWarn,
    NumHardCrit,
    NumHardUnknown,
    WorstHardState,
}

impl ServiceListState {
    /// Column suffixes and descriptions, in column order
    pub(crate) const ALL: [(ServiceListState, &'static str, &'static str); 14] = [
        (ServiceListState::Num, "num_services", "The total number of services"),
        (ServiceListState::NumPending, "num_services_pending", "The number of services that have not been checked yet"),
        (ServiceListState::NumHandledProblems, "num_services_handled_problems", "The number of services with handled problems"),
        (ServiceListState::NumUnhandledProblems, "num_services_unhandled_problems", "The number of services with unhandled problems"),
        (ServiceListState::NumOk, "num_services_ok", "The number of services that are OK"),
        (ServiceListState::NumWarn, "num_services_warn", "The number of services that are WARN"),
        (ServiceListState::NumCrit, "num_services_crit", "The number of services that are CRIT"),
        (ServiceListState::NumUnknown, "num_services_unknown", "The number of services that are UNKNOWN"),
        (ServiceListState::WorstState, "worst_service_state", "The worst soft state of all services (OK <= WARN <= UNKNOWN <= CRIT)"),
        (ServiceListState::NumHardOk, "num_services_hard_ok", "The number of services with hard state OK"),
        (ServiceListState::NumHardWarn, "num_services_hard_warn", "The number of services with hard state WARN"),
        (ServiceListState::NumHardCrit, "num_services_hard_crit", "The number of services with hard state CRIT"),
        (ServiceListState::NumHardUnknown, "num_services_hard_unknown", "The number of services with hard state UNKNOWN"),
        (ServiceListState::WorstHardState, "worst_service_hard_state", "The worst hard state of all services (OK <= WARN <= UNKNOWN <= CRIT)"),
    ];

    pub(crate) fn compute<'a>(self, services: impl Iterator<Item = &'a Service>, user: &User<'_>) -> i64 {
        let mut result = 0i64;
        let mut worst = 0i32;
        for service in services.filter(|s| user.is_authorized_for_service(s)) {
            let check = &service.check;
            let checked = check.has_been_checked;
            let counts = match self {
                ServiceListState::Num => true,
                ServiceListState::NumPending => !checked,
                ServiceListState::NumHandledProblems => {
                    checked && check.state != 0 && check.is_handled()
                }
                ServiceListState::NumUnhandledProblems => {
                    checked && check.state != 0 && !check.is_handled()
                }
                ServiceListState::NumOk => checked && check.state == 0,
                ServiceListState::NumWarn => checked && check.state == 1,
                ServiceListState::NumCrit => checked && check.state == 2,
                ServiceListState::NumUnknown => checked && check.state == 3,
                ServiceListState::NumHardOk => checked && check.hard_state() == 0,
                ServiceListState::NumHardWarn => checked && check.hard_state() == 1,
                ServiceListState::NumHardCrit => checked && check.hard_state() == 2,
                ServiceListState::NumHardUnknown => checked && check.hard_state() == 3,
                ServiceListState::WorstState => {
                    if service_state_rank(check.state) > service_state_rank(worst) {
                        worst = check.state;
                    }
                    false
                }
                ServiceListState::WorstHardState => {
                    if service_state_rank(check.hard_state()) > service_state_rank(worst) {
                        worst = check.hard_state();
                    }
                    false
                }
            };
            if counts {
                result += 1;
            }
        }
        match self {
            ServiceListState::WorstState | ServiceListState::WorstHardState => i64::from(worst),
            _ => result,
        }
    }
}

/// Summaries over the member hosts of a host group the user may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostListState {
    Num,
    NumPending,
    NumUp,
    NumDown,
    NumUnreachable,
    WorstState,
}

impl HostListState {
    pub(crate) const ALL: [(HostListState, &'static str, &'static str); 6] = [
        (HostListState::Num, "num_hosts", "The total number of hosts in the group"),
        (HostListState::NumPending, "num_hosts_pending", "The number of hosts in the group that are pending"),
        (HostListState::NumUp, "num_hosts_up", "The number of hosts in the group that are up"),
        (HostListState::NumDown, "num_hosts_down", "The number of hosts in the group that are down"),
        (HostListState::NumUnreachable, "num_hosts_unreach", "The number of hosts in the group that are unreachable"),
        (HostListState::WorstState, "worst_host_state", "The worst state of all of the groups' hosts (UP <= UNREACHABLE <= DOWN)"),
    ];

    pub(crate) fn compute<'a>(self, hosts: impl Iterator<Item = &'a Host>, user: &User<'_>) -> i64 {
        let mut result = 0i64;
        let mut worst = 0i32;
        for host in hosts.filter(|h| user.is_authorized_for_host(h)) {
            let check = &host.check;
            let counts = match self {
                HostListState::Num => true,
                HostListState::NumPending => !check.has_been_checked,
                HostListState::NumUp => check.has_been_checked && check.state == 0,
                HostListState::NumDown => check.has_been_checked && check.state == 1,
                HostListState::NumUnreachable => check.has_been_checked && check.state == 2,
                HostListState::WorstState => {
                    if host_state_rank(check.state) > host_state_rank(worst) {
                        worst = check.state;
                    }
                    false
                }
            };
            if counts {
                result += 1;
            }
        }
        match self {
            HostListState::WorstState => i64::from(worst),
            _ => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::AuthorizationPolicy;

    #[test]
    fn test_service_list_state() {
        let s = site();
        let user = User::NoAuth;
        let all = || s.services.iter();
        assert_eq!(ServiceListState::Num.compute(all(), &user), 5);
        assert_eq!(ServiceListState::NumPending.compute(all(), &user), 1);
        assert_eq!(ServiceListState::NumOk.compute(all(), &user), 1);
        assert_eq!(ServiceListState::NumHardWarn.compute(all(), &user), 0);
        assert_eq!(ServiceListState::NumHardOk.compute(all(), &user), 2);
        assert_eq!(ServiceListState::NumHandledProblems.compute(all(), &user), 1);
        assert_eq!(ServiceListState::NumUnhandledProblems.compute(all(), &user), 2);
        assert_eq!(ServiceListState::WorstState.compute(all(), &user), 2);
        let h3 = s.find_host("h3").unwrap();
        let h3_services = || h3.services.iter().filter_map(|id| s.service(*id));
        // UNKNOWN beats OK but not CRIT
        assert_eq!(ServiceListState::WorstState.compute(h3_services(), &user), 3);
    }

    #[test]
    fn test_service_list_state_respects_authorization() {
        let s = site();
        let bob = User::resolve(&s, Some("bob"), &AuthorizationPolicy::default());
        assert_eq!(ServiceListState::Num.compute(s.services.iter(), &bob), 1);
    }

    #[test]
    fn test_host_list_state() {
        let s = site();
        let user = User::NoAuth;
        assert_eq!(HostListState::NumUp.compute(s.hosts.iter(), &user), 2);
        assert_eq!(HostListState::NumDown.compute(s.hosts.iter(), &user), 1);
        assert_eq!(HostListState::WorstState.compute(s.hosts.iter(), &user), 1);
    }
}
