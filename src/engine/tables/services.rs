//! The `services` table and the service column group

use tracing::debug;

use crate::engine::column::{ColumnBuilder, ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::hosts::{self, add_check_columns, contact_names};
use crate::engine::tables::{row_service, Table};
use crate::engine::value::Value;
use crate::error::Result;
use crate::monitoring::{MonitoringCore, Service};

pub struct ServicesTable {
    columns: ColumnSet,
}

impl ServicesTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        hosts::add_columns(&mut columns, "host_");
        Self { columns }
    }
}

impl Default for ServicesTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ServicesTable {
    fn name(&self) -> &str {
        "services"
    }

    fn name_prefix(&self) -> &str {
        "service_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        if let Some(host_name) = scan.filter().string_value_restriction("host_name") {
            debug!("using host name index with '{}'", host_name);
            let Some(host) = core.find_host(host_name) else {
                return Ok(());
            };
            for service in host.services.iter().filter_map(|id| core.service(*id)) {
                if user.is_authorized_for_service(service) && !scan.process_row(Row::Service(service)) {
                    break;
                }
            }
            return Ok(());
        }
        for service in core.services() {
            if user.is_authorized_for_service(service) && !scan.process_row(Row::Service(service)) {
                break;
            }
        }
        Ok(())
    }

    /// Primary key is `<host_name>;<description>`
    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        let (host_name, description) = key.split_once(';')?;
        core.find_service(host_name, description).map(Row::Service)
    }
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_service);

    b.string("description", "Service description", |s: &Service| {
        s.description.as_str()
    });
    b.string("display_name", "An optional display name", |s: &Service| {
        s.display_name.as_str()
    });
    b.string("notes", "Optional notes about the service", |s: &Service| {
        s.notes.as_str()
    });
    b.string("notes_url", "An optional URL for further notes", |s: &Service| {
        s.notes_url.as_str()
    });
    b.string("action_url", "An optional URL for actions or custom information about the service", |s: &Service| {
        s.action_url.as_str()
    });
    add_check_columns(&mut b, |s: &Service| &s.check);
    b.list("contacts", "A list of all contacts of the service, either direct or via a contact group", |s, ctx| {
        contact_names(&s.contacts, &s.contact_group_ids, ctx)
    });
    b.string_list("contact_groups", "A list of all contact groups this service is in", |s: &Service| {
        &s.contact_groups
    });
    b.list("groups", "A list of all service groups the service is in", |s, ctx| {
        s.groups
            .iter()
            .filter_map(|id| ctx.core.service_group(*id))
            .filter(|g| ctx.user.is_authorized_for_service_group(g))
            .map(|g| Value::from(g.name.as_str()))
            .collect()
    });
    b.custom_variables(|s: &Service| &s.custom_variables);
    b.labels(|s: &Service| &s.labels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;

    #[test]
    fn test_joined_host_columns() {
        let table = ServicesTable::new();
        assert_eq!(table.column("host_name").unwrap().name(), "host_name");
        assert_eq!(table.column("service_description").unwrap().name(), "description");
        assert!(table.column("host_services").is_ok());
    }

    #[test]
    fn test_get_by_compound_key() {
        let s = site();
        let table = ServicesTable::new();
        assert!(matches!(table.get(&s, "h1;Disk"), Some(Row::Service(svc)) if svc.check.state == 2));
        assert!(table.get(&s, "h1").is_none());
        assert!(table.get(&s, "h2;Disk").is_none());
    }
}
