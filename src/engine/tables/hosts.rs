//! The `hosts` table and the host column group

use tracing::debug;

use crate::engine::column::{ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::tables::{row_host, ServiceListState, Table};
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;
use crate::monitoring::{CheckState, Host, MonitoringCore, Service};

pub struct HostsTable {
    columns: ColumnSet,
}

impl HostsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        Self { columns }
    }
}

impl Default for HostsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for HostsTable {
    fn name(&self) -> &str {
        "hosts"
    }

    fn name_prefix(&self) -> &str {
        "host_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        if let Some(name) = scan.filter().string_value_restriction("name") {
            debug!("using host name index with '{}'", name);
            if let Some(host) = core.find_host(name) {
                if user.is_authorized_for_host(host) {
                    scan.process_row(Row::Host(host));
                }
            }
            return Ok(());
        }
        for host in core.hosts() {
            if user.is_authorized_for_host(host) && !scan.process_row(Row::Host(host)) {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_host(key).map(Row::Host)
    }
}

fn services_of<'a>(host: &'a Host, ctx: &RowContext<'a>) -> impl Iterator<Item = &'a Service> + 'a {
    let core = ctx.core;
    host.services.iter().filter_map(move |id| core.service(*id))
}

/// Columns shared by hosts and services
pub(crate) fn add_check_columns<T: 'static>(
    b: &mut ColumnBuilder<'_, T>,
    check: for<'a> fn(&'a T) -> &'a CheckState,
) {
    b.string("check_command", "Logical command name for active checks", move |o| {
        check(o).check_command.as_str()
    });
    b.string("plugin_output", "Output of the last check", move |o| {
        check(o).plugin_output.as_str()
    });
    b.string("long_plugin_output", "Long (extra) output of the last check", move |o| {
        check(o).long_plugin_output.as_str()
    });
    b.string("perf_data", "Optional performance data of the last check", move |o| {
        check(o).perf_data.as_str()
    });
    b.int("state", "The current state of the object", move |o| {
        i64::from(check(o).state)
    });
    b.int("state_type", "Type of the current state (0: soft, 1: hard)", move |o| {
        i64::from(check(o).state_type)
    });
    b.int("hard_state", "The effective hard state of the object", move |o| {
        i64::from(check(o).hard_state())
    });
    b.int("last_hard_state", "Last hard state", move |o| {
        i64::from(check(o).last_hard_state)
    });
    b.int("has_been_checked", "Whether a check has already been executed (0/1)", move |o| {
        i64::from(check(o).has_been_checked)
    });
    b.int("current_attempt", "Number of the current check attempts", move |o| {
        i64::from(check(o).current_attempt)
    });
    b.int("max_check_attempts", "Max check attempts for active checks", move |o| {
        i64::from(check(o).max_check_attempts)
    });
    b.int("acknowledged", "Whether the current problem has been acknowledged (0/1)", move |o| {
        i64::from(check(o).acknowledged)
    });
    b.int("scheduled_downtime_depth", "The number of downtimes this object is currently in", move |o| {
        i64::from(check(o).scheduled_downtime_depth)
    });
    b.int("active_checks_enabled", "Whether active checks are enabled (0/1)", move |o| {
        i64::from(check(o).active_checks_enabled)
    });
    b.int("notifications_enabled", "Whether notifications are enabled (0/1)", move |o| {
        i64::from(check(o).notifications_enabled)
    });
    b.int("is_flapping", "Whether the state is flapping (0/1)", move |o| {
        i64::from(check(o).is_flapping)
    });
    b.double("check_interval", "Number of basic interval lengths between two scheduled checks", move |o| {
        check(o).check_interval
    });
    b.double("latency", "Time difference between scheduled check time and actual check time", move |o| {
        check(o).latency
    });
    b.double("execution_time", "Time the check needed for execution", move |o| {
        check(o).execution_time
    });
    b.time("last_check", "Time of the last check (Unix timestamp)", move |o| {
        check(o).last_check
    });
    b.time("next_check", "Scheduled time for the next check (Unix timestamp)", move |o| {
        check(o).next_check
    });
    b.time("last_state_change", "Time of the last state change (Unix timestamp)", move |o| {
        check(o).last_state_change
    });
}

/// Contacts of an object, directly or through its contact groups
pub(crate) fn contact_names<'a>(
    direct: &'a [String],
    groups: &'a [crate::monitoring::ContactGroupId],
    ctx: &RowContext<'a>,
) -> Vec<Value<'a>> {
    let mut names: Vec<&'a str> = direct.iter().map(String::as_str).collect();
    for group in groups.iter().filter_map(|id| ctx.core.contact_group(*id)) {
        for member in &group.members {
            if !names.contains(&member.as_str()) {
                names.push(member);
            }
        }
    }
    names.into_iter().map(Value::from).collect()
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_host);

    b.string("name", "Host name", |h: &Host| h.name.as_str());
    b.string("display_name", "Optional display name", |h: &Host| {
        h.display_name.as_str()
    });
    b.string("alias", "An alias name for the host", |h: &Host| h.alias.as_str());
    b.string("address", "IP address", |h: &Host| h.address.as_str());
    b.string("notes", "Optional notes for this host", |h: &Host| h.notes.as_str());
    b.string("notes_url", "An optional URL with further information about the host", |h: &Host| {
        h.notes_url.as_str()
    });
    b.string("action_url", "An optional URL to custom actions or information about this host", |h: &Host| {
        h.action_url.as_str()
    });
    add_check_columns(&mut b, |h: &Host| &h.check);

    b.string_list("parents", "A list of all direct parents of the host", |h: &Host| {
        &h.parents
    });
    b.list("childs", "A list of all direct children of the host", |h, ctx| {
        h.children
            .iter()
            .filter_map(|id| ctx.core.host(*id))
            .map(|child| Value::from(child.name.as_str()))
            .collect()
    });
    b.list("contacts", "A list of all contacts of this host, either direct or via a contact group", |h, ctx| {
        contact_names(&h.contacts, &h.contact_group_ids, ctx)
    });
    b.string_list("contact_groups", "A list of all contact groups this host is in", |h: &Host| {
        &h.contact_groups
    });
    b.list("groups", "A list of all host groups this host is in", |h, ctx| {
        h.groups
            .iter()
            .filter_map(|id| ctx.core.host_group(*id))
            .filter(|g| ctx.user.is_authorized_for_host_group(g))
            .map(|g| Value::from(g.name.as_str()))
            .collect()
    });
    b.list("services", "A list of all services of the host", |h, ctx| {
        services_of(h, ctx)
            .filter(|s| ctx.user.is_authorized_for_service(s))
            .map(|s| Value::from(s.description.as_str()))
            .collect()
    });
    b.list("services_with_state", "A list of all services of the host together with state and has_been_checked", |h, ctx| {
        services_of(h, ctx)
            .filter(|s| ctx.user.is_authorized_for_service(s))
            .map(|s| {
                Value::List(vec![
                    Value::from(s.description.as_str()),
                    Value::from(s.check.state),
                    Value::from(s.check.has_been_checked),
                ])
            })
            .collect()
    });
    b.list("services_with_info", "A list of all services including detailed information about each service", |h, ctx| {
        services_of(h, ctx)
            .filter(|s| ctx.user.is_authorized_for_service(s))
            .map(|s| {
                Value::List(vec![
                    Value::from(s.description.as_str()),
                    Value::from(s.check.state),
                    Value::from(s.check.has_been_checked),
                    Value::from(s.check.plugin_output.as_str()),
                ])
            })
            .collect()
    });
    for (state, name, description) in ServiceListState::ALL {
        b.add(name, description, ColumnType::Int, move |h, ctx| {
            Value::Int(state.compute(services_of(h, ctx), ctx.user))
        });
    }
    b.custom_variables(|h: &Host| &h.custom_variables);
    b.labels(|h: &Host| &h.labels);
}
