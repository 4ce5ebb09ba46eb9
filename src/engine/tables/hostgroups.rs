//! The `hostgroups` table and the host group column group

use crate::engine::column::{ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::tables::{row_host_group, HostListState, ServiceListState, Table};
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;
use crate::monitoring::{Host, HostGroup, MonitoringCore, Service};

pub struct HostGroupsTable {
    columns: ColumnSet,
}

impl HostGroupsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        Self { columns }
    }
}

impl Default for HostGroupsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for HostGroupsTable {
    fn name(&self) -> &str {
        "hostgroups"
    }

    fn name_prefix(&self) -> &str {
        "hostgroup_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        for group in core.host_groups() {
            if user.is_authorized_for_host_group(group) && !scan.process_row(Row::HostGroup(group)) {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_host_group(key).map(Row::HostGroup)
    }
}

fn members<'a>(group: &'a HostGroup, ctx: &RowContext<'a>) -> impl Iterator<Item = &'a Host> + 'a {
    let core = ctx.core;
    group.member_ids.iter().filter_map(move |id| core.host(*id))
}

fn member_services<'a>(
    group: &'a HostGroup,
    ctx: &RowContext<'a>,
) -> impl Iterator<Item = &'a Service> + 'a {
    let core = ctx.core;
    members(group, ctx).flat_map(move |h| h.services.iter().filter_map(move |id| core.service(*id)))
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_host_group);

    b.string("name", "Name of the hostgroup", |g: &HostGroup| g.name.as_str());
    b.string("alias", "An alias of the hostgroup", |g: &HostGroup| g.alias.as_str());
    b.string("notes", "Optional notes to the hostgroup", |g: &HostGroup| g.notes.as_str());
    b.string("notes_url", "An optional URL with further information about the hostgroup", |g: &HostGroup| {
        g.notes_url.as_str()
    });
    b.string("action_url", "An optional URL to custom actions or information about the hostgroup", |g: &HostGroup| {
        g.action_url.as_str()
    });
    b.list("members", "A list of all host names that are members of the hostgroup", |g, ctx| {
        members(g, ctx)
            .filter(|h| ctx.user.is_authorized_for_host(h))
            .map(|h| Value::from(h.name.as_str()))
            .collect()
    });
    b.list("members_with_state", "A list of all host names that are members of the hostgroup together with state and has_been_checked", |g, ctx| {
        members(g, ctx)
            .filter(|h| ctx.user.is_authorized_for_host(h))
            .map(|h| {
                Value::List(vec![
                    Value::from(h.name.as_str()),
                    Value::from(h.check.state),
                    Value::from(h.check.has_been_checked),
                ])
            })
            .collect()
    });
    for (state, name, description) in HostListState::ALL {
        b.add(name, description, ColumnType::Int, move |g, ctx| {
            Value::Int(state.compute(members(g, ctx), ctx.user))
        });
    }
    for (state, name, description) in ServiceListState::ALL {
        b.add(name, description, ColumnType::Int, move |g, ctx| {
            Value::Int(state.compute(member_services(g, ctx), ctx.user))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::User;

    #[test]
    fn test_group_summaries() {
        let s = site();
        let table = HostGroupsTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let web = Row::HostGroup(s.find_host_group("web").unwrap());
        let value = |name: &str| table.column(name).unwrap().value(web, &ctx);
        assert_eq!(value("members"), Value::List(vec![Value::from("h1"), Value::from("h3")]));
        assert_eq!(value("num_hosts"), Value::Int(2));
        assert_eq!(value("num_services"), Value::Int(4));
        assert_eq!(value("num_services_pending"), Value::Int(1));
        assert_eq!(value("worst_service_state"), Value::Int(2));
        assert_eq!(value("worst_host_state"), Value::Int(0));
    }
}
