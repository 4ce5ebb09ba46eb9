//! The `servicegroups` table and the service group column group

use crate::engine::column::{ColumnBuilder, ColumnSet, Row, RowContext};
use crate::engine::executor::Scan;
use crate::engine::tables::{row_service_group, ServiceListState, Table};
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;
use crate::monitoring::{MonitoringCore, Service, ServiceGroup};

pub struct ServiceGroupsTable {
    columns: ColumnSet,
}

impl ServiceGroupsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        Self { columns }
    }
}

impl Default for ServiceGroupsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ServiceGroupsTable {
    fn name(&self) -> &str {
        "servicegroups"
    }

    fn name_prefix(&self) -> &str {
        "servicegroup_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        for group in core.service_groups() {
            if user.is_authorized_for_service_group(group)
                && !scan.process_row(Row::ServiceGroup(group))
            {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_service_group(key).map(Row::ServiceGroup)
    }
}

fn members<'a>(
    group: &'a ServiceGroup,
    ctx: &RowContext<'a>,
) -> impl Iterator<Item = &'a Service> + 'a {
    let core = ctx.core;
    group.member_ids.iter().filter_map(move |id| core.service(*id))
}

fn host_name<'a>(service: &'a Service, ctx: &RowContext<'a>) -> Value<'a> {
    match ctx.core.host(service.host) {
        Some(host) => Value::from(host.name.as_str()),
        None => Value::from(service.host_name.as_str()),
    }
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_service_group);

    b.string("name", "Name of the servicegroup", |g: &ServiceGroup| g.name.as_str());
    b.string("alias", "An alias of the servicegroup", |g: &ServiceGroup| g.alias.as_str());
    b.string("notes", "Optional additional notes about the service group", |g: &ServiceGroup| {
        g.notes.as_str()
    });
    b.string("notes_url", "An optional URL to further notes on the service group", |g: &ServiceGroup| {
        g.notes_url.as_str()
    });
    b.string("action_url", "An optional URL to custom notes or actions on the service group", |g: &ServiceGroup| {
        g.action_url.as_str()
    });
    b.list("members", "A list of all members of the service group as host/service pairs", |g, ctx| {
        members(g, ctx)
            .filter(|s| ctx.user.is_authorized_for_service(s))
            .map(|s| Value::List(vec![host_name(s, ctx), Value::from(s.description.as_str())]))
            .collect()
    });
    b.list("members_with_state", "A list of all members of the service group with state and has_been_checked", |g, ctx| {
        members(g, ctx)
            .filter(|s| ctx.user.is_authorized_for_service(s))
            .map(|s| {
                Value::List(vec![
                    host_name(s, ctx),
                    Value::from(s.description.as_str()),
                    Value::from(s.check.state),
                    Value::from(s.check.has_been_checked),
                ])
            })
            .collect()
    });
    for (state, name, description) in ServiceListState::ALL {
        b.add(name, description, ColumnType::Int, move |g, ctx| {
            Value::Int(state.compute(members(g, ctx), ctx.user))
        });
    }
}
