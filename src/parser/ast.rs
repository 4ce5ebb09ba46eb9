//! Abstract Syntax Tree definitions for Livestatus requests

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LqlError, Result};
use crate::output::{OutputFormat, Separators};

/// Top-level request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// `GET <table>` followed by header lines
    Get(GetRequest),
    /// `COMMAND [<timestamp>] <NAME>;<arguments>`
    Command(ExternalCommand),
    /// Anything else on the method line
    Invalid(String),
}

/// A `GET` request before its headers are interpreted
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    /// Table name, empty when the method line had none
    pub table: String,
    pub headers: Vec<HeaderLine>,
}

/// One raw `Name: value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: String,
    /// `None` when the line had no colon at all
    pub value: Option<String>,
}

impl std::fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An external command passed through to the monitoring core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub timestamp: Option<i64>,
    pub name: String,
    /// Everything after the first `;`, without the `;`
    pub arguments: String,
}

impl ExternalCommand {
    /// Commands addressed to the event console carry an `EC_` prefix.
    pub fn is_event_console_command(&self) -> bool {
        self.name.starts_with("EC_")
    }
}

impl std::fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ts) = self.timestamp {
            write!(f, "[{}] ", ts)?;
        }
        write!(f, "{}", self.name)?;
        if !self.arguments.is_empty() {
            write!(f, ";{}", self.arguments)?;
        }
        Ok(())
    }
}

// ============================================================================
// Typed Headers
// ============================================================================

/// A header line after its arguments have been parsed
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    Filter(Condition),
    Or(usize),
    And(usize),
    Negate,
    Stats(StatsSpec),
    StatsOr(usize),
    StatsAnd(usize),
    StatsNegate,
    /// Deprecated spelling of `Columns:` for stats queries
    StatsGroupBy(Vec<String>),
    Columns(Vec<String>),
    ColumnHeaders(bool),
    Limit(usize),
    /// Seconds
    Timelimit(u64),
    AuthUser(String),
    Separators(Separators),
    OutputFormat(OutputFormat),
    ResponseHeader(ResponseHeader),
    KeepAlive(bool),
    WaitCondition(Condition),
    WaitConditionOr(usize),
    WaitConditionAnd(usize),
    WaitConditionNegate,
    WaitTrigger(String),
    WaitObject(String),
    /// Milliseconds, 0 waits forever
    WaitTimeout(u64),
    /// The client's current unix time
    Localtime(i64),
}

/// `<column> <operator> <value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub operator: RelationalOperator,
    pub value: String,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}

/// Argument of a `Stats:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsSpec {
    /// Count rows matching the condition
    Count(Condition),
    /// Aggregate a numeric column
    Aggregate {
        kind: AggregationKind,
        column: String,
    },
}

/// Framing of the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseHeader {
    #[default]
    Off,
    /// `<code> <length>\n`, 16 bytes in total
    Fixed16,
}

// ============================================================================
// Operators
// ============================================================================

/// Relational operators usable in `Filter:`, `Stats:` and `WaitCondition:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationalOperator {
    Equal,
    NotEqual,
    Matches,
    DoesntMatch,
    EqualIcase,
    NotEqualIcase,
    MatchesIcase,
    DoesntMatchIcase,
    Less,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
}

impl RelationalOperator {
    /// The operator selecting exactly the complement
    pub fn negate(self) -> Self {
        use RelationalOperator::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            Matches => DoesntMatch,
            DoesntMatch => Matches,
            EqualIcase => NotEqualIcase,
            NotEqualIcase => EqualIcase,
            MatchesIcase => DoesntMatchIcase,
            DoesntMatchIcase => MatchesIcase,
            Less => GreaterOrEqual,
            GreaterOrEqual => Less,
            Greater => LessOrEqual,
            LessOrEqual => Greater,
        }
    }

    /// True for the four regular expression operators
    pub fn is_regex(self) -> bool {
        use RelationalOperator::*;
        matches!(self, Matches | DoesntMatch | MatchesIcase | DoesntMatchIcase)
    }

    /// True for `=`, `!=`, `<`, `<=`, `>`, `>=`
    pub fn is_ordering(self) -> bool {
        use RelationalOperator::*;
        matches!(
            self,
            Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual
        )
    }
}

impl FromStr for RelationalOperator {
    type Err = LqlError;

    fn from_str(s: &str) -> Result<Self> {
        use RelationalOperator::*;
        match s {
            "=" => Ok(Equal),
            "!=" => Ok(NotEqual),
            "~" => Ok(Matches),
            "!~" => Ok(DoesntMatch),
            "=~" => Ok(EqualIcase),
            "!=~" => Ok(NotEqualIcase),
            "~~" => Ok(MatchesIcase),
            "!~~" => Ok(DoesntMatchIcase),
            "<" => Ok(Less),
            ">=" => Ok(GreaterOrEqual),
            ">" => Ok(Greater),
            "<=" => Ok(LessOrEqual),
            _ => Err(LqlError::BadRequest(format!(
                "invalid operator '{}'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RelationalOperator::*;
        let s = match self {
            Equal => "=",
            NotEqual => "!=",
            Matches => "~",
            DoesntMatch => "!~",
            EqualIcase => "=~",
            NotEqualIcase => "!=~",
            MatchesIcase => "~~",
            DoesntMatchIcase => "!~~",
            Less => "<",
            GreaterOrEqual => ">=",
            Greater => ">",
            LessOrEqual => "<=",
        };
        write!(f, "{}", s)
    }
}

/// Aggregation functions of `Stats: <function> <column>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationKind {
    Sum,
    Min,
    Max,
    Avg,
    Std,
    SumInv,
    AvgInv,
}

impl AggregationKind {
    /// Look up an aggregation keyword, `None` for anything else
    pub fn find(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggregationKind::Sum),
            "min" => Some(AggregationKind::Min),
            "max" => Some(AggregationKind::Max),
            "avg" => Some(AggregationKind::Avg),
            "std" => Some(AggregationKind::Std),
            "suminv" => Some(AggregationKind::SumInv),
            "avginv" => Some(AggregationKind::AvgInv),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationKind::Sum => write!(f, "sum"),
            AggregationKind::Min => write!(f, "min"),
            AggregationKind::Max => write!(f, "max"),
            AggregationKind::Avg => write!(f, "avg"),
            AggregationKind::Std => write!(f, "std"),
            AggregationKind::SumInv => write!(f, "suminv"),
            AggregationKind::AvgInv => write!(f, "avginv"),
        }
    }
}
