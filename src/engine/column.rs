//! Columns: named, typed accessors over rows

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::tables::eventconsole::EventRow;
use crate::engine::value::{ColumnType, Value};
use crate::monitoring::{
    Command, Contact, ContactGroup, Host, HostGroup, LogEntry, MonitoringCore, ProgramStatus,
    Service, ServiceGroup,
};
use crate::security::User;

/// One row of some table, borrowed for the duration of a scan
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Host(&'a Host),
    Service(&'a Service),
    HostGroup(&'a HostGroup),
    ServiceGroup(&'a ServiceGroup),
    /// A host as a member of one of its groups
    HostInGroup(&'a Host, &'a HostGroup),
    ServiceInGroup(&'a Service, &'a ServiceGroup),
    ServiceInHostGroup(&'a Service, &'a HostGroup),
    Contact(&'a Contact),
    ContactGroup(&'a ContactGroup),
    Command(&'a Command),
    Log(&'a LogEntry),
    Status(&'a ProgramStatus),
    Column { table: &'a str, column: &'a Column },
    Event(&'a EventRow),
    /// A label name and value
    Label(&'a str, &'a str),
}

/// Everything besides the row a column may consult
pub struct RowContext<'a> {
    pub core: &'a dyn MonitoringCore,
    pub user: &'a User<'a>,
    /// Seconds between the client's clock and ours
    pub timezone_offset: i64,
}

type Getter = dyn for<'a> Fn(Row<'a>, &RowContext<'a>) -> Value<'a> + Send + Sync;

pub struct Column {
    name: String,
    description: String,
    column_type: ColumnType,
    getter: Box<Getter>,
}

impl Column {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        column_type: ColumnType,
        getter: F,
    ) -> Self
    where
        F: for<'a> Fn(Row<'a>, &RowContext<'a>) -> Value<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            column_type,
            getter: Box::new(getter),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn value<'a>(&self, row: Row<'a>, ctx: &RowContext<'a>) -> Value<'a> {
        (self.getter)(row, ctx)
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("type", &self.column_type)
            .finish()
    }
}

/// The ordered columns of one table
#[derive(Debug, Default)]
pub struct ColumnSet {
    columns: Vec<Arc<Column>>,
    index: HashMap<String, usize>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing an earlier one of the same name
    pub fn add(&mut self, column: Column) {
        match self.index.get(column.name()) {
            Some(&i) => self.columns[i] = Arc::new(column),
            None => {
                self.index.insert(column.name().to_string(), self.columns.len());
                self.columns.push(Arc::new(column));
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Column>> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Column>> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Column builders
// ============================================================================
//
// Tables describe their columns through a projection from the table's row to
// the object a group of columns reads. A projection returning `None` makes
// every column of the group yield its type's default.

/// Projection from a row to the object a column group reads
pub type Projection<T> = for<'a> fn(Row<'a>, &RowContext<'a>) -> Option<&'a T>;

/// Builds column groups for one kind of object under a name prefix
pub struct ColumnBuilder<'s, T: 'static> {
    set: &'s mut ColumnSet,
    prefix: String,
    projection: Projection<T>,
}

impl<'s, T: 'static> ColumnBuilder<'s, T> {
    pub fn new(set: &'s mut ColumnSet, prefix: &str, projection: Projection<T>) -> Self {
        Self {
            set,
            prefix: prefix.to_string(),
            projection,
        }
    }

    /// Add a column whose value is computed from the projected object
    pub fn add<F>(&mut self, name: &str, description: &str, column_type: ColumnType, f: F)
    where
        F: for<'a> Fn(&'a T, &RowContext<'a>) -> Value<'a> + Send + Sync + 'static,
    {
        let projection = self.projection;
        self.set.add(Column::new(
            format!("{}{}", self.prefix, name),
            description,
            column_type,
            move |row, ctx| match projection(row, ctx) {
                Some(object) => f(object, ctx),
                None => Value::default_for(column_type),
            },
        ));
    }

    pub fn string<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: for<'a> Fn(&'a T) -> &'a str + Send + Sync + 'static,
    {
        self.add(name, description, ColumnType::String, move |o, _| Value::from(f(o)))
    }

    pub fn int<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        self.add(name, description, ColumnType::Int, move |o, _| Value::Int(f(o)))
    }

    pub fn double<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        self.add(name, description, ColumnType::Double, move |o, _| Value::Double(f(o)))
    }

    /// Seconds since the epoch, in the core's clock
    pub fn time<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        self.add(name, description, ColumnType::Time, move |o, _| Value::Time(f(o)))
    }

    pub fn list<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: for<'a> Fn(&'a T, &RowContext<'a>) -> Vec<Value<'a>> + Send + Sync + 'static,
    {
        self.add(name, description, ColumnType::List, move |o, ctx| Value::List(f(o, ctx)))
    }

    pub fn string_list<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: for<'a> Fn(&'a T) -> &'a [String] + Send + Sync + 'static,
    {
        self.list(name, description, move |o, _| {
            f(o).iter().map(Value::from).collect()
        })
    }

    pub fn dict<F>(&mut self, name: &str, description: &str, f: F)
    where
        F: for<'a> Fn(&'a T) -> &'a std::collections::BTreeMap<String, String>
            + Send
            + Sync
            + 'static,
    {
        self.add(name, description, ColumnType::Dict, move |o, _| {
            Value::Dict(
                f(o).iter()
                    .map(|(k, v)| (k.as_str().into(), v.as_str().into()))
                    .collect(),
            )
        })
    }

    /// Names and values of custom variables as two lists plus a dict
    pub fn custom_variables<F>(&mut self, f: F)
    where
        F: for<'a> Fn(&'a T) -> &'a std::collections::BTreeMap<String, String>
            + Copy
            + Send
            + Sync
            + 'static,
    {
        self.list(
            "custom_variable_names",
            "A list of the names of the custom variables",
            move |o, _| f(o).keys().map(Value::from).collect(),
        );
        self.list(
            "custom_variable_values",
            "A list of the values of the custom variables",
            move |o, _| f(o).values().map(Value::from).collect(),
        );
        self.dict(
            "custom_variables",
            "A dictionary of the custom variables",
            f,
        );
    }

    pub fn labels<F>(&mut self, f: F)
    where
        F: for<'a> Fn(&'a T) -> &'a std::collections::BTreeMap<String, String>
            + Copy
            + Send
            + Sync
            + 'static,
    {
        self.list("label_names", "A list of the names of the labels", move |o, _| {
            f(o).keys().map(Value::from).collect()
        });
        self.list("label_values", "A list of the values of the labels", move |o, _| {
            f(o).values().map(Value::from).collect()
        });
        self.dict("labels", "A dictionary of the labels", f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;

    fn host_of<'a>(row: Row<'a>, _ctx: &RowContext<'a>) -> Option<&'a Host> {
        match row {
            Row::Host(h) => Some(h),
            _ => None,
        }
    }

    fn columns() -> ColumnSet {
        let mut set = ColumnSet::new();
        let mut b = ColumnBuilder::new(&mut set, "", host_of);
        b.string("name", "Host name", |h| h.name.as_str());
        b.int("state", "State", |h| i64::from(h.check.state));
        b.time("last_check", "Last check", |h| h.check.last_check);
        b.custom_variables(|h| &h.custom_variables);
        set
    }

    #[test]
    fn test_builder_columns_read_through_projection() {
        let s = site();
        let set = columns();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let h1 = &s.hosts[0];
        let name = set.find("name").unwrap();
        assert_eq!(name.value(Row::Host(h1), &ctx), Value::from("h1"));
        assert_eq!(name.column_type(), ColumnType::String);
        let vars = set.find("custom_variable_names").unwrap();
        assert_eq!(vars.value(Row::Host(h1), &ctx), Value::List(vec![Value::from("TAGS")]));
    }

    #[test]
    fn test_missing_object_yields_default() {
        let s = site();
        let set = columns();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 0,
        };
        let row = Row::Command(&s.commands[0]);
        assert_eq!(set.find("state").unwrap().value(row, &ctx), Value::Int(0));
        assert_eq!(set.find("name").unwrap().value(row, &ctx), Value::from(""));
    }

    #[test]
    fn test_time_columns_use_core_clock() {
        let s = site();
        let set = columns();
        let user = User::NoAuth;
        let ctx = RowContext {
            core: &s,
            user: &user,
            timezone_offset: 1800,
        };
        let v = set.find("last_check").unwrap().value(Row::Host(&s.hosts[0]), &ctx);
        assert_eq!(v, Value::Time(1700000100));
    }

    #[test]
    fn test_column_set_keeps_order() {
        let set = columns();
        let names: Vec<&str> = set.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "name",
                "state",
                "last_check",
                "custom_variable_names",
                "custom_variable_values",
                "custom_variables"
            ]
        );
    }
}
