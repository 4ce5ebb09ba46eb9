//! Boolean filter trees over columns
//!
//! Leaves compare one column against a literal that is parsed (and for regex
//! operators compiled) once, when the filter is built. Inner nodes combine
//! their children with `And`, `Or` and `Not`. Besides evaluation a filter can
//! be inspected statically, which tables use to narrow their scans.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::engine::column::{Column, Row, RowContext};
use crate::engine::value::{ColumnType, Value};
use crate::error::{LqlError, Result};
use crate::parser::RelationalOperator;

// ============================================================================
// Literals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Integer, else float, else the leading integer, else 0
    fn parse(text: &str) -> Number {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Number::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Number::Float(f);
        }
        let end = text
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
            .map_or(text.len(), |(i, _)| i);
        match text[..end].parse::<i64>() {
            Ok(i) => Number::Int(i),
            Err(_) => text[..end]
                .parse::<f64>()
                .map_or(Number::Int(0), Number::Float),
        }
    }

    fn shifted(self, offset: i64) -> Number {
        match self {
            Number::Int(i) => Number::Int(i.saturating_sub(offset)),
            Number::Float(f) => Number::Float(f - offset as f64),
        }
    }
}

#[derive(Debug, Clone)]
enum Operand {
    Number(Number),
    Text(Option<Regex>),
    List(Option<Regex>),
    Dict {
        key: String,
        value: String,
        regex: Option<Regex>,
    },
}

fn compile(operator: RelationalOperator, pattern: &str) -> Result<Option<Regex>> {
    if !operator.is_regex() {
        return Ok(None);
    }
    let icase = matches!(
        operator,
        RelationalOperator::MatchesIcase | RelationalOperator::DoesntMatchIcase
    );
    RegexBuilder::new(pattern)
        .case_insensitive(icase)
        .build()
        .map(Some)
        .map_err(|e| {
            LqlError::BadRequest(format!("invalid regular expression '{}': {}", pattern, e))
        })
}

fn eq_icase(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn ordering_matches(operator: RelationalOperator, ordering: Option<Ordering>) -> bool {
    use RelationalOperator::*;
    match (operator, ordering) {
        (NotEqual, None) => true,
        (_, None) => false,
        (Equal, Some(o)) => o == Ordering::Equal,
        (NotEqual, Some(o)) => o != Ordering::Equal,
        (Less, Some(o)) => o == Ordering::Less,
        (LessOrEqual, Some(o)) => o != Ordering::Greater,
        (Greater, Some(o)) => o == Ordering::Greater,
        (GreaterOrEqual, Some(o)) => o != Ordering::Less,
        _ => false,
    }
}

fn text_matches(
    operator: RelationalOperator,
    regex: Option<&Regex>,
    text: &str,
    reference: &str,
) -> bool {
    use RelationalOperator::*;
    match operator {
        Equal => text == reference,
        NotEqual => text != reference,
        EqualIcase => eq_icase(text, reference),
        NotEqualIcase => !eq_icase(text, reference),
        Matches | MatchesIcase => regex.map_or(false, |r| r.is_match(text)),
        DoesntMatch | DoesntMatchIcase => !regex.map_or(false, |r| r.is_match(text)),
        Less | LessOrEqual | Greater | GreaterOrEqual => {
            ordering_matches(operator, Some(text.cmp(reference)))
        }
    }
}

// ============================================================================
// Column Tests
// ============================================================================

/// `<column> <operator> <literal>`
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    column: Arc<Column>,
    operator: RelationalOperator,
    value: String,
    operand: Operand,
}

impl ColumnFilter {
    pub fn new(column: Arc<Column>, operator: RelationalOperator, value: &str) -> Result<Self> {
        let operand = match column.column_type() {
            ColumnType::Int | ColumnType::Double | ColumnType::Time => {
                Operand::Number(Number::parse(value))
            }
            ColumnType::String => Operand::Text(compile(operator, value)?),
            ColumnType::List => Operand::List(compile(operator, value)?),
            ColumnType::Dict => {
                let (key, rest) = match value.trim_start().split_once(char::is_whitespace) {
                    Some((key, rest)) => (key, rest.trim_start()),
                    None => (value.trim(), ""),
                };
                Operand::Dict {
                    key: key.to_string(),
                    value: rest.to_string(),
                    regex: compile(operator, rest)?,
                }
            }
            ColumnType::Blob | ColumnType::Null => {
                return Err(LqlError::BadRequest(format!(
                    "filtering on {} column '{}' is not supported",
                    column.column_type(),
                    column.name()
                )))
            }
        };
        Ok(Self {
            column,
            operator,
            value: value.to_string(),
            operand,
        })
    }

    pub fn column(&self) -> &Arc<Column> {
        &self.column
    }

    pub fn operator(&self) -> RelationalOperator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn accepts<'a>(&self, row: Row<'a>, ctx: &RowContext<'a>) -> bool {
        let value = self.column.value(row, ctx);
        match &self.operand {
            Operand::Number(reference) => {
                let reference = match self.column.column_type() {
                    ColumnType::Time => reference.shifted(ctx.timezone_offset),
                    _ => *reference,
                };
                let ordering = match (&value, reference) {
                    (Value::Int(v) | Value::Time(v), Number::Int(r)) => Some(v.cmp(&r)),
                    (Value::Int(v) | Value::Time(v), Number::Float(r)) => (*v as f64).partial_cmp(&r),
                    (Value::Double(v), Number::Int(r)) => v.partial_cmp(&(r as f64)),
                    (Value::Double(v), Number::Float(r)) => v.partial_cmp(&r),
                    _ => None,
                };
                self.operator.is_ordering() && ordering_matches(self.operator, ordering)
            }
            Operand::Text(regex) => {
                text_matches(self.operator, regex.as_ref(), &value.to_text(), &self.value)
            }
            Operand::List(regex) => self.list_accepts(&value, regex.as_ref()),
            Operand::Dict { key, value: reference, regex } => {
                let entry = match &value {
                    Value::Dict(entries) => entries
                        .iter()
                        .find(|(k, _)| k == key)
                        .map_or("", |(_, v)| &**v),
                    _ => "",
                };
                text_matches(self.operator, regex.as_ref(), entry, reference)
            }
        }
    }

    fn list_accepts(&self, value: &Value<'_>, regex: Option<&Regex>) -> bool {
        use RelationalOperator::*;
        let items: &[Value<'_>] = match value {
            Value::List(items) => items,
            _ => &[],
        };
        let contains = || items.iter().any(|item| item.to_text() == self.value);
        let contains_icase = || items.iter().any(|item| eq_icase(&item.to_text(), &self.value));
        let any_match = || {
            regex.map_or(false, |r| items.iter().any(|item| r.is_match(&item.to_text())))
        };
        match self.operator {
            Equal => self.value.is_empty() && items.is_empty(),
            NotEqual => self.value.is_empty() && !items.is_empty(),
            GreaterOrEqual => contains(),
            Less => !contains(),
            LessOrEqual => contains_icase(),
            Greater => !contains_icase(),
            Matches | MatchesIcase => any_match(),
            DoesntMatch | DoesntMatchIcase => !any_match(),
            EqualIcase | NotEqualIcase => false,
        }
    }

    /// Flip the operator where that selects exactly the complement
    fn negate(self) -> Filter {
        let exact = match self.operand {
            Operand::Text(_) | Operand::Dict { .. } => true,
            Operand::Number(_) => self.operator.is_ordering(),
            Operand::List(_) => false,
        };
        if exact {
            Filter::Column(ColumnFilter {
                operator: self.operator.negate(),
                ..self
            })
        } else {
            Filter::Not(Box::new(Filter::Column(self)))
        }
    }

    fn int_reference(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        if self.column.name() != column {
            return None;
        }
        let reference = match self.operand {
            Operand::Number(reference) => reference,
            _ => return None,
        };
        let reference = match self.column.column_type() {
            ColumnType::Time => reference.shifted(timezone_offset),
            _ => reference,
        };
        match reference {
            Number::Int(i) => Some(i),
            Number::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ColumnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.column.name(), self.operator, self.value)
    }
}

// ============================================================================
// Filter Trees
// ============================================================================

#[derive(Debug, Clone)]
pub enum Filter {
    Column(ColumnFilter),
    /// Empty conjunction is always true
    And(Vec<Filter>),
    /// Empty disjunction is always false
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::tautology()
    }
}

impl Filter {
    pub fn tautology() -> Self {
        Filter::And(Vec::new())
    }

    pub fn contradiction() -> Self {
        Filter::Or(Vec::new())
    }

    pub fn is_tautology(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, Filter::Or(children) if children.is_empty())
    }

    /// Conjunction, flattening nested conjunctions
    pub fn and(filters: Vec<Filter>) -> Filter {
        let mut children = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter {
                Filter::And(nested) => children.extend(nested),
                f if f.is_contradiction() => return Filter::contradiction(),
                f => children.push(f),
            }
        }
        if children.len() == 1 {
            children.remove(0)
        } else {
            Filter::And(children)
        }
    }

    /// Disjunction, flattening nested disjunctions
    pub fn or(filters: Vec<Filter>) -> Filter {
        let mut children = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter {
                Filter::Or(nested) => children.extend(nested),
                f if f.is_tautology() => return Filter::tautology(),
                f => children.push(f),
            }
        }
        if children.len() == 1 {
            children.remove(0)
        } else {
            Filter::Or(children)
        }
    }

    pub fn negate(self) -> Filter {
        match self {
            Filter::Column(test) => test.negate(),
            Filter::And(children) => Filter::or(children.into_iter().map(Filter::negate).collect()),
            Filter::Or(children) => Filter::and(children.into_iter().map(Filter::negate).collect()),
            Filter::Not(inner) => *inner,
        }
    }

    pub fn accepts<'a>(&self, row: Row<'a>, ctx: &RowContext<'a>) -> bool {
        match self {
            Filter::Column(test) => test.accepts(row, ctx),
            Filter::And(children) => children.iter().all(|f| f.accepts(row, ctx)),
            Filter::Or(children) => children.iter().any(|f| f.accepts(row, ctx)),
            Filter::Not(inner) => !inner.accepts(row, ctx),
        }
    }

    /// The single column test this filter consists of, if any
    pub fn as_column(&self) -> Option<&ColumnFilter> {
        match self {
            Filter::Column(test) => Some(test),
            _ => None,
        }
    }

    /// Every column the filter reads, in order of appearance
    pub fn columns(&self) -> Vec<Arc<Column>> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<Arc<Column>>) {
        match self {
            Filter::Column(test) => out.push(Arc::clone(&test.column)),
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            Filter::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Top level conjuncts
    pub fn conjuncts(&self) -> Vec<Filter> {
        match self {
            Filter::And(children) => children.clone(),
            other => vec![other.clone()],
        }
    }

    /// The weakest filter implied by this one that only reads columns
    /// accepted by `predicate`
    pub fn partial_filter(&self, predicate: &dyn Fn(&Column) -> bool) -> Filter {
        match self {
            Filter::Column(test) if predicate(&test.column) => self.clone(),
            Filter::Column(_) => Filter::tautology(),
            Filter::And(children) => {
                Filter::and(children.iter().map(|f| f.partial_filter(predicate)).collect())
            }
            Filter::Or(children) => {
                Filter::or(children.iter().map(|f| f.partial_filter(predicate)).collect())
            }
            Filter::Not(_) => {
                if self.columns().iter().all(|c| predicate(c)) {
                    self.clone()
                } else {
                    Filter::tautology()
                }
            }
        }
    }

    /// Smallest value of an int or time column every accepted row has
    pub fn greatest_lower_bound(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        use RelationalOperator::*;
        match self {
            Filter::Column(test) => {
                let reference = test.int_reference(column, timezone_offset)?;
                match test.operator {
                    Equal | GreaterOrEqual => Some(reference),
                    Greater => reference.checked_add(1),
                    _ => None,
                }
            }
            Filter::And(children) => children
                .iter()
                .filter_map(|f| f.greatest_lower_bound(column, timezone_offset))
                .max(),
            Filter::Or(children) => children
                .iter()
                .map(|f| f.greatest_lower_bound(column, timezone_offset))
                .collect::<Option<Vec<_>>>()
                .and_then(|bounds| bounds.into_iter().min()),
            Filter::Not(_) => None,
        }
    }

    /// Largest value of an int or time column every accepted row has
    pub fn least_upper_bound(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        use RelationalOperator::*;
        match self {
            Filter::Column(test) => {
                let reference = test.int_reference(column, timezone_offset)?;
                match test.operator {
                    Equal | LessOrEqual => Some(reference),
                    Less => reference.checked_sub(1),
                    _ => None,
                }
            }
            Filter::And(children) => children
                .iter()
                .filter_map(|f| f.least_upper_bound(column, timezone_offset))
                .min(),
            Filter::Or(children) => children
                .iter()
                .map(|f| f.least_upper_bound(column, timezone_offset))
                .collect::<Option<Vec<_>>>()
                .and_then(|bounds| bounds.into_iter().max()),
            Filter::Not(_) => None,
        }
    }

    /// The value a string column must equal for a row to be accepted
    pub fn string_value_restriction(&self, column: &str) -> Option<&str> {
        match self {
            Filter::Column(test)
                if test.column.name() == column
                    && test.column.column_type() == ColumnType::String
                    && test.operator == RelationalOperator::Equal =>
            {
                Some(&test.value)
            }
            Filter::And(children) => children
                .iter()
                .find_map(|f| f.string_value_restriction(column)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Column(test) => write!(f, "{}", test),
            Filter::And(children) if children.is_empty() => write!(f, "TRUE"),
            Filter::Or(children) if children.is_empty() => write!(f, "FALSE"),
            Filter::And(children) | Filter::Or(children) => {
                let op = if matches!(self, Filter::And(_)) { " AND " } else { " OR " };
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", op)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}
