//! The `contacts` and `contactgroups` tables
//!
//! Contacts are configuration, not monitoring state: every user may see all
//! of them.

use crate::engine::column::{ColumnBuilder, ColumnSet, Row};
use crate::engine::executor::Scan;
use crate::engine::tables::{row_contact, row_contact_group, Table};
use crate::engine::value::Value;
use crate::error::Result;
use crate::monitoring::{Contact, ContactGroup, MonitoringCore};

pub struct ContactsTable {
    columns: ColumnSet,
}

impl ContactsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        add_columns(&mut columns, "");
        Self { columns }
    }
}

impl Default for ContactsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ContactsTable {
    fn name(&self) -> &str {
        "contacts"
    }

    fn name_prefix(&self) -> &str {
        "contact_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        for contact in scan.core().contacts() {
            if !scan.process_row(Row::Contact(contact)) {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_contact(key).map(Row::Contact)
    }
}

pub(crate) fn add_columns(set: &mut ColumnSet, prefix: &str) {
    let mut b = ColumnBuilder::new(set, prefix, row_contact);

    b.string("name", "The login name of the contact person", |c: &Contact| c.name.as_str());
    b.string("alias", "The full name of the contact", |c: &Contact| c.alias.as_str());
    b.string("email", "The email address of the contact", |c: &Contact| c.email.as_str());
    b.string("pager", "The pager address of the contact", |c: &Contact| c.pager.as_str());
    b.int("host_notifications_enabled", "Whether the contact will be notified about host problems in general (0/1)", |c: &Contact| {
        i64::from(c.host_notifications_enabled)
    });
    b.int("service_notifications_enabled", "Whether the contact will be notified about service problems in general (0/1)", |c: &Contact| {
        i64::from(c.service_notifications_enabled)
    });
    b.int("can_submit_commands", "Whether the contact is allowed to submit commands (0/1)", |c: &Contact| {
        i64::from(c.can_submit_commands)
    });
    b.list("groups", "A list of the contact groups this contact is a member of", |c, ctx| {
        c.groups
            .iter()
            .filter_map(|id| ctx.core.contact_group(*id))
            .map(|g| Value::from(g.name.as_str()))
            .collect()
    });
    b.custom_variables(|c: &Contact| &c.custom_variables);
    b.labels(|c: &Contact| &c.labels);
}

pub struct ContactGroupsTable {
    columns: ColumnSet,
}

impl ContactGroupsTable {
    pub fn new() -> Self {
        let mut columns = ColumnSet::new();
        let mut b = ColumnBuilder::new(&mut columns, "", row_contact_group);
        b.string("name", "The name of the contactgroup", |g: &ContactGroup| g.name.as_str());
        b.string("alias", "The alias of the contactgroup", |g: &ContactGroup| g.alias.as_str());
        b.string_list("members", "A list of all members of this contactgroup", |g: &ContactGroup| {
            &g.members
        });
        Self { columns }
    }
}

impl Default for ContactGroupsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for ContactGroupsTable {
    fn name(&self) -> &str {
        "contactgroups"
    }

    fn name_prefix(&self) -> &str {
        "contactgroup_"
    }

    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn answer_query(&self, scan: &mut Scan<'_, '_>) -> Result<()> {
        for group in scan.core().contact_groups() {
            if !scan.process_row(Row::ContactGroup(group)) {
                break;
            }
        }
        Ok(())
    }

    fn get<'a>(&self, core: &'a dyn MonitoringCore, key: &str) -> Option<Row<'a>> {
        core.find_contact_group(key).map(Row::ContactGroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::column::RowContext;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::security::User;

    #[test]
    fn test_contact_columns() {
        let s = site();
        let table = ContactsTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let carol = table.get(&s, "carol").unwrap();
        assert_eq!(table.column("contact_groups").unwrap().value(carol, &ctx).to_text(), "web-admins");
        let alice = table.get(&s, "alice").unwrap();
        assert_eq!(table.column("can_submit_commands").unwrap().value(alice, &ctx), Value::Int(1));
        assert_eq!(table.column("email").unwrap().value(alice, &ctx), Value::from("alice@example.com"));
    }

    #[test]
    fn test_contact_group_members() {
        let s = site();
        let table = ContactGroupsTable::new();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let row = table.get(&s, "web-admins").unwrap();
        assert_eq!(table.column("members").unwrap().value(row, &ctx).to_text(), "carol");
        assert!(table.get(&s, "nobody").is_none());
    }
}
