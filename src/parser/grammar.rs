//! Pest grammar parser for Livestatus requests

use pest::Parser;
use pest_derive::Parser;

use crate::error::{LqlError, Result};
use crate::output::{OutputFormat, Separators};
use crate::parser::ast::*;

#[derive(Parser)]
#[grammar = "../grammar/lql.pest"]
pub struct LqlParser;

/// Parse a request block into an AST
///
/// Header values are kept as raw text here, see [`parse_header`].
pub fn parse_request(input: &str) -> Result<Request> {
    let pairs = LqlParser::parse(Rule::request, input)
        .map_err(|e| LqlError::BadRequest(format!("malformed request: {}", e)))?;

    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| LqlError::BadRequest("empty request".to_string()))?;

    let mut inner = pair.into_inner();
    let method = inner
        .next()
        .ok_or_else(|| LqlError::BadRequest("missing request method".to_string()))?;

    let headers = inner
        .filter(|p| p.as_rule() == Rule::header)
        .map(parse_header_line)
        .collect::<Result<Vec<_>>>()?;

    match method.as_rule() {
        Rule::get_request => {
            let table = method
                .into_inner()
                .next()
                .map(|p| p.as_str().trim().to_string())
                .unwrap_or_default();
            Ok(Request::Get(GetRequest { table, headers }))
        }
        Rule::command_request => {
            let text = method
                .into_inner()
                .next()
                .ok_or_else(|| LqlError::BadRequest("missing command".to_string()))?;
            Ok(Request::Command(parse_external_command(text.as_str())?))
        }
        Rule::other_request => Ok(Request::Invalid(method.as_str().to_string())),
        _ => Err(LqlError::BadRequest(format!(
            "Unexpected rule in request: {:?}",
            method.as_rule()
        ))),
    }
}

fn parse_header_line(pair: pest::iterators::Pair<Rule>) -> Result<HeaderLine> {
    let mut inner = pair.into_inner();

    let name = inner
        .next()
        .ok_or_else(|| LqlError::BadRequest("Expected header name".to_string()))?
        .as_str()
        .trim()
        .to_string();
    let value = inner.next().map(|p| p.as_str().to_string());

    Ok(HeaderLine { name, value })
}

/// Parse `[<timestamp>] <NAME>;<arguments>`
pub fn parse_external_command(input: &str) -> Result<ExternalCommand> {
    let pair = LqlParser::parse(Rule::external_command, input.trim())
        .map_err(|_| LqlError::BadRequest(format!("malformed command '{}'", input)))?
        .next()
        .ok_or_else(|| LqlError::BadRequest("empty command".to_string()))?;

    let mut command = ExternalCommand {
        timestamp: None,
        name: String::new(),
        arguments: String::new(),
    };
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::timestamp => {
                let ts = item.as_str().parse().map_err(|_| {
                    LqlError::BadRequest(format!("invalid timestamp '{}'", item.as_str()))
                })?;
                command.timestamp = Some(ts);
            }
            Rule::command_name => command.name = item.as_str().to_string(),
            Rule::command_args => command.arguments = item.as_str()[1..].to_string(),
            _ => {}
        }
    }
    Ok(command)
}

// ============================================================================
// Header Parsing
// ============================================================================

/// Interpret one header line
///
/// Errors carry the bare message; callers prefix the header name.
pub fn parse_header(line: &HeaderLine) -> Result<Header> {
    let value = line.value.as_deref().ok_or_else(|| {
        LqlError::BadRequest(format!("malformed header line '{}'", line.name))
    })?;

    match line.name.as_str() {
        "Filter" => Ok(Header::Filter(parse_condition(value)?)),
        "Or" => Ok(Header::Or(parse_count(value)?)),
        "And" => Ok(Header::And(parse_count(value)?)),
        "Negate" => no_arguments(value).map(|_| Header::Negate),
        "Stats" => Ok(Header::Stats(parse_stats(value)?)),
        "StatsOr" => Ok(Header::StatsOr(parse_count(value)?)),
        "StatsAnd" => Ok(Header::StatsAnd(parse_count(value)?)),
        "StatsNegate" => no_arguments(value).map(|_| Header::StatsNegate),
        "StatsGroupBy" => Ok(Header::StatsGroupBy(owned(parse_arguments(value)?))),
        "Columns" => Ok(Header::Columns(owned(parse_arguments(value)?))),
        "ColumnHeaders" => Ok(Header::ColumnHeaders(parse_on_off(value)?)),
        "Limit" => Ok(Header::Limit(parse_count(value)?)),
        "Timelimit" => Ok(Header::Timelimit(parse_non_negative(value)?)),
        "AuthUser" => Ok(Header::AuthUser(single_argument(value)?.to_string())),
        "Separators" => Ok(Header::Separators(parse_separators(value)?)),
        "OutputFormat" => Ok(Header::OutputFormat(parse_output_format(value)?)),
        "ResponseHeader" => Ok(Header::ResponseHeader(parse_response_header(value)?)),
        "KeepAlive" => Ok(Header::KeepAlive(parse_on_off(value)?)),
        "WaitCondition" => Ok(Header::WaitCondition(parse_condition(value)?)),
        "WaitConditionOr" => Ok(Header::WaitConditionOr(parse_count(value)?)),
        "WaitConditionAnd" => Ok(Header::WaitConditionAnd(parse_count(value)?)),
        "WaitConditionNegate" => no_arguments(value).map(|_| Header::WaitConditionNegate),
        "WaitTrigger" => Ok(Header::WaitTrigger(single_argument(value)?.to_string())),
        "WaitObject" => {
            let key = value.trim_start();
            if key.is_empty() {
                return Err(LqlError::BadRequest("missing argument".to_string()));
            }
            Ok(Header::WaitObject(key.to_string()))
        }
        "WaitTimeout" => Ok(Header::WaitTimeout(parse_non_negative(value)?)),
        "Localtime" => Ok(Header::Localtime(parse_timestamp(value)?)),
        _ => Err(LqlError::BadRequest("undefined request header".to_string())),
    }
}

/// Parse `<column> <operator> [<value>]`
pub fn parse_condition(input: &str) -> Result<Condition> {
    let pair = LqlParser::parse(Rule::relation, input)
        .map_err(|_| {
            LqlError::BadRequest(
                "expected a column name, an operator and a value".to_string(),
            )
        })?
        .next()
        .ok_or_else(|| LqlError::BadRequest("empty condition".to_string()))?;

    let mut inner = pair.into_inner();

    let column = inner
        .next()
        .ok_or_else(|| LqlError::BadRequest("Expected column in condition".to_string()))?
        .as_str()
        .to_string();

    let operator = inner
        .next()
        .ok_or_else(|| LqlError::BadRequest("Expected operator in condition".to_string()))?
        .as_str()
        .parse()?;

    let value = inner
        .find(|p| p.as_rule() == Rule::operand)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();

    Ok(Condition {
        column,
        operator,
        value,
    })
}

fn parse_stats(input: &str) -> Result<StatsSpec> {
    let args = parse_arguments(input)?;
    match args.first().and_then(|first| AggregationKind::find(first)) {
        Some(kind) => match args.len() {
            1 => Err(LqlError::BadRequest("missing column name".to_string())),
            2 => Ok(StatsSpec::Aggregate {
                kind,
                column: args[1].to_string(),
            }),
            _ => Err(LqlError::BadRequest("superfluous argument(s)".to_string())),
        },
        None => Ok(StatsSpec::Count(parse_condition(input)?)),
    }
}

/// Split a header value at whitespace
pub fn parse_arguments(input: &str) -> Result<Vec<&str>> {
    let pair = LqlParser::parse(Rule::arguments, input)
        .map_err(|e| LqlError::BadRequest(e.to_string()))?
        .next()
        .ok_or_else(|| LqlError::BadRequest("Expected arguments".to_string()))?;

    Ok(pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::word)
        .map(|p| p.as_str())
        .collect())
}

fn owned(args: Vec<&str>) -> Vec<String> {
    args.into_iter().map(str::to_string).collect()
}

fn single_argument(input: &str) -> Result<&str> {
    let args = parse_arguments(input)?;
    match args.as_slice() {
        [] => Err(LqlError::BadRequest("missing argument".to_string())),
        [arg] => Ok(*arg),
        _ => Err(LqlError::BadRequest("superfluous argument(s)".to_string())),
    }
}

fn no_arguments(input: &str) -> Result<()> {
    if parse_arguments(input)?.is_empty() {
        Ok(())
    } else {
        Err(LqlError::BadRequest("superfluous argument(s)".to_string()))
    }
}

fn parse_non_negative(input: &str) -> Result<u64> {
    single_argument(input)?
        .parse()
        .map_err(|_| LqlError::BadRequest("expected non-negative integer".to_string()))
}

fn parse_count(input: &str) -> Result<usize> {
    usize::try_from(parse_non_negative(input)?)
        .map_err(|_| LqlError::BadRequest("expected non-negative integer".to_string()))
}

fn parse_timestamp(input: &str) -> Result<i64> {
    i64::try_from(parse_non_negative(input)?)
        .map_err(|_| LqlError::BadRequest("timestamp out of range".to_string()))
}

fn parse_on_off(input: &str) -> Result<bool> {
    match single_argument(input)? {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(LqlError::BadRequest("expected 'on' or 'off'".to_string())),
    }
}

fn parse_response_header(input: &str) -> Result<ResponseHeader> {
    match single_argument(input)? {
        "off" => Ok(ResponseHeader::Off),
        "fixed16" => Ok(ResponseHeader::Fixed16),
        _ => Err(LqlError::BadRequest(
            "expected 'off' or 'fixed16'".to_string(),
        )),
    }
}

fn parse_output_format(input: &str) -> Result<OutputFormat> {
    let args = parse_arguments(input)?;
    let format = match args.first() {
        Some(name) => OutputFormat::find(name),
        None => None,
    }
    .ok_or_else(|| {
        LqlError::BadRequest(format!(
            "missing/invalid output format, use one of {}",
            OutputFormat::NAMES
                .iter()
                .map(|n| format!("'{}'", n))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;
    if args.len() > 1 {
        return Err(LqlError::BadRequest("only 1 argument expected".to_string()));
    }
    Ok(format)
}

fn parse_separators(input: &str) -> Result<Separators> {
    let args = parse_arguments(input)?;
    if args.len() < 4 {
        return Err(LqlError::BadRequest("missing argument".to_string()));
    }
    if args.len() > 4 {
        return Err(LqlError::BadRequest("superfluous argument(s)".to_string()));
    }
    let mut chars = [' '; 4];
    for (slot, arg) in chars.iter_mut().zip(&args) {
        let code: u8 = arg.parse().map_err(|_| {
            LqlError::BadRequest("expected non-negative integer below 256".to_string())
        })?;
        *slot = char::from(code);
    }
    Ok(Separators::new(chars[0], chars[1], chars[2], chars[3]))
}
