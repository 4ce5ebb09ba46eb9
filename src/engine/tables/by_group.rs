//! Objects joined with each group they are a member of
//!
//! A host in two groups yields two rows, one per group.

use crate::engine::column::{ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::{hostgroups, hosts, servicegroups, services, Table};
use crate::error::Result;

pub struct HostsByGroupTable {
    columns: ColumnSet,
}

impl HostsByGroupTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        hosts::add_columns(&mut columns, "");
        hostgroups::add_columns(&mut columns, "hostgroup_");
        Self { columns }
    }
}

impl Default for HostsByGroupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for HostsByGroupTable {
    fn name(&self) -> &str {
        "hostsbygroup"
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
        for group in core.host_groups() {
            for host in group.member_ids.iter().filter_map(|id| core.host(*id)) {
                if user.is_authorized_for_host(host)
                    && !scan.process_row(Row::HostInGroup(host, group))
                {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

pub struct ServicesByGroupTable {
    columns: ColumnSet,
}

impl ServicesByGroupTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        services::add_columns(&mut columns, "");
        hosts::add_columns(&mut columns, "host_");
        servicegroups::add_columns(&mut columns, "servicegroup_");
        Self { columns }
    }
}

impl Default for ServicesByGroupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ServicesByGroupTable {
    fn name(&self) -> &str {
        "servicesbygroup"
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
        for group in core.service_groups() {
            for service in group.member_ids.iter().filter_map(|id| core.service(*id)) {
                if user.is_authorized_for_service(service)
                    && !scan.process_row(Row::ServiceInGroup(service, group))
                {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

pub struct ServicesByHostGroupTable {
    columns: ColumnSet,
}

impl ServicesByHostGroupTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        services::add_columns(&mut columns, "");
        hosts::add_columns(&mut columns, "host_");
        hostgroups::add_columns(&mut columns, "hostgroup_");
        Self { columns }
    }
}

impl Default for ServicesByHostGroupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ServicesByHostGroupTable {
    fn name(&self) -> &str {
        "servicesbyhostgroup"
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
        for group in core.host_groups() {
            let members = group.member_ids.iter().filter_map(|id| core.host(*id));
            for service in members.flat_map(|h| h.services.iter().filter_map(|id| core.service(*id))) {
                if user.is_authorized_for_service(service)
                    && !scan.process_row(Row::ServiceInHostGroup(service, group))
                {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::column::RowContext;
    use crate::engine::value::Value;
    use crate::monitoring::MonitoringCore;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::User;

    #[test]
    fn test_joined_columns_read_both_sides() {
        let s = site();
        let table = HostsByGroupTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let row = Row::HostInGroup(s.find_host("h3").unwrap(), s.find_host_group("web").unwrap());
        assert_eq!(table.column("host_name").unwrap().value(row, &ctx), Value::from("h3"));
        assert_eq!(table.column("hostgroup_name").unwrap().value(row, &ctx), Value::from("web"));
        assert_eq!(table.column("hostgroup_num_hosts").unwrap().value(row, &ctx), Value::Int(2));
    }

    #[test]
    fn test_service_tables_expose_three_groups() {
        let by_group = ServicesByGroupTable::new();
        assert!(by_group.column("servicegroup_alias").is_ok());
        assert!(by_group.column("host_address").is_ok());
        assert!(by_group.column("hostgroup_name").is_err());
        let by_host_group = ServicesByHostGroupTable::new();
        assert!(by_host_group.column("hostgroup_members").is_ok());
        assert!(by_host_group.column("service_description").is_ok());
    }
}
