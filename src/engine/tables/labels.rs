//! The `labels` table
//!
//! One row per distinct label of the hosts, services and contacts the user
//! may see, in the order the labels are first met.

use std::collections::{BTreeMap, HashSet};

use crate::engine::column::{Column, ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::Table;
use crate::engine::value::{ColumnType, Value};
use crate::error::Result;

pub struct LabelsTable {
    columns: ColumnSet,
}

impl LabelsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        columns.add(Column::new(
            "name",
            "The name of the label",
            ColumnType::String,
            |row, _| match row {
                Row::Label(name, _) => Value::from(name),
                _ => Value::default_for(ColumnType::String),
            },
        ));
        columns.add(Column::new(
            "value",
            "The value of the label",
            ColumnType::String,
            |row, _| match row {
                Row::Label(_, value) => Value::from(value),
                _ => Value::default_for(ColumnType::String),
            },
        ));
        Self { columns }
    }
}

impl Default for LabelsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for LabelsTable {
    fn name(&self) -> &str {
        "labels"
    }

    fn name_prefix(&self) -> &str {
        "label_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        let core = scan.core();
        let user = scan.user();
        let mut emitted = HashSet::new();

        // Services are visited even when their host is not authorized
        for host in core.hosts() {
            if user.is_authorized_for_host(host)
                && !process_labels(scan, &mut emitted, &host.labels)
            {
                return Ok(());
            }
            for service in host.services.iter().filter_map(|id| core.service(*id)) {
                if user.is_authorized_for_service(service)
                    && !process_labels(scan, &mut emitted, &service.labels)
                {
                    return Ok(());
                }
            }
        }
        for contact in core.contacts() {
            if !process_labels(scan, &mut emitted, &contact.labels) {
                break;
            }
        }
        Ok(())
    }
}

/// Hand the labels not emitted yet to the scan; false once it wants no more
fn process_labels<'a>(
    scan: &mut Scan<'_, '_>,
    emitted: &mut HashSet<(&'a str, &'a str)>,
    labels: &'a BTreeMap<String, String>,
) -> bool {
    for (name, value) in labels {
        if emitted.insert((name.as_str(), value.as_str()))
            && !scan.process_row(Row::Label(name, value))
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::executor::ExecutionContext;
    use crate::engine::query::Query;
    use crate::engine::execute_query;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::monitoring::LiveCore;
    use crate::parser::HeaderLine;
    use std::sync::Arc;

    fn answer(text: &str) -> String {
        let headers: Vec<HeaderLine> = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| HeaderLine {
                name: name.to_string(),
                value: Some(value.trim_start().to_string()),
            })
            .collect();
        let query = Query::parse(Arc::new(LabelsTable::new()), &headers, 1_700_000_000)
            .query
            .unwrap();
        execute_query(&query, &LiveCore::new(site()), &ExecutionContext::default(), &|| false)
            .unwrap()
    }

    #[test]
    fn test_labels_are_distinct_in_first_seen_order() {
        assert_eq!(
            answer("Columns: name value"),
            "os\tlinux\nsite\tprod\nteam\tops\nos\twindows\nteam\tweb\n"
        );
    }

    #[test]
    fn test_labels_follow_authorization() {
        assert_eq!(
            answer("Columns: name value\nAuthUser: alice"),
            "os\tlinux\nsite\tprod\nteam\tops\n"
        );
        // bob only sees his service; contact labels are always listed
        assert_eq!(answer("Columns: name value\nAuthUser: bob"), "team\tops\n");
        assert_eq!(answer("Columns: name value\nAuthUser: nobody"), "team\tops\n");
    }

    #[test]
    fn test_labels_filter_and_prefix() {
        assert_eq!(answer("Columns: label_value\nFilter: label_name = os"), "linux\nwindows\n");
        assert_eq!(answer("Stats: name = team"), "2\n");
    }
}
