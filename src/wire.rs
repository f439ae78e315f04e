//! Result cell text → row buffer field.
//!
//! Cells arrive as text, either as rendered by the execution adapter or as
//! produced by [`to_literal`](crate::value::to_literal). Numeric and
//! temporal cells may carry one pair of surrounding single quotes; text
//! cells are stored verbatim.
//!
//! A cell that does not parse never aborts the caller. Numeric fields take
//! the cell's longest numeric prefix (0 if there is none), temporal fields
//! become NULL (the zero value when `NOT NULL`), unknown labels store the
//! empty value. Each of these returns a [`DiagnosticKind`] so the caller
//! can report it.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
};
use rust_decimal::Decimal;

use crate::diagnostic::DiagnosticKind;
use crate::row::{FieldSlot, Written, set_null, write_field};
use crate::schema::{ColumnDescriptor, RelationalType};
use crate::types::{CqlType, map_type};
use crate::value::Value;

/// Whether a cell denotes SQL NULL: empty or exactly `NULL`.
pub fn is_null_cell(cell: &str) -> bool {
    cell.is_empty() || cell == "NULL"
}

/// Parse a cell and store it into the column's field of `buf`.
///
/// Returns the lenient conversion that took place, if any.
pub fn from_wire(
    column: &ColumnDescriptor,
    slot: FieldSlot,
    buf: &mut [u8],
    cell: &str,
) -> Option<DiagnosticKind> {
    let (value, parsed) = parse_cell(column, cell);
    if value.is_null() {
        set_null(slot, buf);
        return parsed;
    }

    let written = match write_field(column, slot, buf, &value) {
        Ok(written) => written,
        Err(err) => unreachable!("cell parsed to a value its own column rejects: {}", err),
    };
    parsed.or(match written {
        Written::Exact => None,
        Written::Truncated => Some(DiagnosticKind::Truncated),
        Written::Clamped => Some(DiagnosticKind::OutOfRange),
    })
}

/// Parse a cell into the value its column would store.
pub fn parse_cell(column: &ColumnDescriptor, cell: &str) -> (Value, Option<DiagnosticKind>) {
    if is_null_cell(cell) {
        let diagnostic = (!column.nullable).then_some(DiagnosticKind::NullInNotNull);
        return (Value::Null, diagnostic);
    }

    match &column.relational_type {
        ty if ty.is_integer() => parse_integer(unquoted(cell)),
        RelationalType::Float | RelationalType::Double => parse_float(unquoted(cell)),
        RelationalType::Decimal { .. } => parse_decimal(unquoted(cell)),
        RelationalType::Date => temporal(column, parse_date_cell(unquoted(cell)).map(Value::Date)),
        RelationalType::Time { .. } => {
            temporal(column, parse_time(unquoted(cell)).map(Value::Time))
        }
        RelationalType::DateTime { .. } | RelationalType::Timestamp { .. } => {
            temporal(column, parse_timestamp(unquoted(cell)).map(Value::DateTime))
        }
        RelationalType::Bit => parse_bool(unquoted(cell)),
        RelationalType::Enum(labels) => parse_enum(labels, cell),
        RelationalType::Set(labels) => parse_set(labels, cell),
        RelationalType::Json { .. } => {
            let valid = serde_json::from_str::<serde_json::Value>(cell).is_ok();
            (
                Value::text(cell),
                (!valid).then_some(DiagnosticKind::InvalidJson),
            )
        }
        _ if map_type(column) == CqlType::Blob => parse_blob(cell),
        _ if column.binary_charset => (Value::Bytes(cell.as_bytes().to_vec()), None),
        _ => (Value::text(cell), None),
    }
}

fn unquoted(cell: &str) -> &str {
    cell.strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(cell)
}

/// Unparseable temporal cells become NULL, or the zero value (midnight,
/// the Unix epoch) when the column is `NOT NULL`.
fn temporal(column: &ColumnDescriptor, parsed: Option<Value>) -> (Value, Option<DiagnosticKind>) {
    if let Some(value) = parsed {
        return (value, None);
    }
    let fallback = if column.nullable {
        Value::Null
    } else {
        match column.relational_type {
            RelationalType::Date => Value::Date(NaiveDate::default()),
            RelationalType::Time { .. } => Value::Time(NaiveTime::default()),
            _ => Value::DateTime(NaiveDateTime::default()),
        }
    };
    (fallback, Some(DiagnosticKind::BadTemporal))
}

fn parse_integer(s: &str) -> (Value, Option<DiagnosticKind>) {
    if let Ok(n) = s.parse::<i64>() {
        return (Value::Int(n), None);
    }
    if let Ok(wide) = s.parse::<i128>() {
        let clamped = wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        return (Value::Int(clamped), Some(DiagnosticKind::OutOfRange));
    }
    let n = integer_prefix(s)
        .ok()
        .map(|(_, prefix)| prefix)
        .and_then(|prefix| prefix.parse::<i128>().ok())
        .map_or(0, |wide| wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64);
    (Value::Int(n), Some(DiagnosticKind::NotANumber))
}

fn parse_float(s: &str) -> (Value, Option<DiagnosticKind>) {
    if let Ok(f) = s.parse::<f64>() {
        return (Value::Float(f), None);
    }
    let f = float_prefix(s)
        .ok()
        .and_then(|(_, prefix)| prefix.parse::<f64>().ok())
        .unwrap_or(0.0);
    (Value::Float(f), Some(DiagnosticKind::NotANumber))
}

fn parse_decimal(s: &str) -> (Value, Option<DiagnosticKind>) {
    if let Some(d) = decimal_from_str(s) {
        return (Value::Decimal(d), None);
    }
    if let Ok(f) = s.parse::<f64>() {
        return match Decimal::try_from(f) {
            Ok(d) => (Value::Decimal(d), None),
            Err(_) => {
                let edge = if f.is_sign_negative() {
                    Decimal::MIN
                } else {
                    Decimal::MAX
                };
                (Value::Decimal(edge), Some(DiagnosticKind::OutOfRange))
            }
        };
    }
    let d = float_prefix(s)
        .ok()
        .and_then(|(_, prefix)| decimal_from_str(prefix))
        .unwrap_or(Decimal::ZERO);
    (Value::Decimal(d), Some(DiagnosticKind::NotANumber))
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_bool(s: &str) -> (Value, Option<DiagnosticKind>) {
    if s == "1" || s.eq_ignore_ascii_case("true") {
        (Value::Bool(true), None)
    } else if s == "0" || s.eq_ignore_ascii_case("false") {
        (Value::Bool(false), None)
    } else {
        (Value::Bool(false), Some(DiagnosticKind::BadBoolean))
    }
}

fn label_index(labels: &[String], label: &str) -> Option<usize> {
    labels.iter().position(|l| l.eq_ignore_ascii_case(label))
}

fn parse_enum(labels: &[String], cell: &str) -> (Value, Option<DiagnosticKind>) {
    if unquoted(cell).is_empty() {
        return (Value::Enum(0), None);
    }
    let found = label_index(labels, cell).or_else(|| label_index(labels, unquoted(cell)));
    if let Some(idx) = found {
        return (Value::Enum(idx as u16 + 1), None);
    }
    match cell.parse::<u16>() {
        Ok(n) if n as usize <= labels.len() => (Value::Enum(n), None),
        _ => (Value::Enum(0), Some(DiagnosticKind::UnknownLabel)),
    }
}

fn parse_set(labels: &[String], cell: &str) -> (Value, Option<DiagnosticKind>) {
    if !cell.is_empty() && cell.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(mask) = cell.parse::<u64>() {
            return (Value::Set(mask), None);
        }
    }

    let mut mask = 0u64;
    let mut unknown = false;
    for label in unquoted(cell).split(',').map(str::trim).filter(|l| !l.is_empty()) {
        match label_index(labels, label) {
            Some(idx) => mask |= 1 << idx,
            None => unknown = true,
        }
    }
    (Value::Set(mask), unknown.then_some(DiagnosticKind::UnknownLabel))
}

fn parse_blob(cell: &str) -> (Value, Option<DiagnosticKind>) {
    let hex_digits = cell
        .strip_prefix("0x")
        .or_else(|| cell.strip_prefix("0X"));
    match hex_digits.map(crate::hex::decode) {
        Some(Ok(bytes)) => (Value::Bytes(bytes), None),
        _ => (
            Value::Bytes(cell.as_bytes().to_vec()),
            Some(DiagnosticKind::NotHex),
        ),
    }
}

fn parse_date_cell(s: &str) -> Option<NaiveDate> {
    parse_date(s).or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

/// Timestamp cells are epoch milliseconds or a datetime string.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    match s.parse::<i64>() {
        Ok(millis) => DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc()),
        Err(_) => parse_datetime(s),
    }
}

/// `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    all_consuming(date)(s).ok().map(|(_, d)| d)
}

/// `HH:MM:SS[.f…]`, fraction truncated to microseconds.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    all_consuming(time)(s).ok().map(|(_, t)| t)
}

/// `YYYY-MM-DD HH:MM:SS[.f…]`, `T` separator and trailing `Z` accepted.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    all_consuming(datetime)(s).ok().map(|(_, dt)| dt)
}

fn fixed_digits(n: usize) -> impl FnMut(&str) -> IResult<&str, u32> {
    move |input| {
        map_res(
            take_while_m_n(n, n, |c: char| c.is_ascii_digit()),
            str::parse::<u32>,
        )(input)
    }
}

fn date(input: &str) -> IResult<&str, NaiveDate> {
    map_opt(
        tuple((
            fixed_digits(4),
            char('-'),
            fixed_digits(2),
            char('-'),
            fixed_digits(2),
        )),
        |(y, _, m, _, d)| NaiveDate::from_ymd_opt(y as i32, m, d),
    )(input)
}

/// Fraction digits scaled to microseconds; digits past the sixth are dropped.
fn fraction(input: &str) -> IResult<&str, u32> {
    map(preceded(char('.'), digit1), |digits: &str| {
        digits
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(6)
            .fold(0u32, |acc, b| acc * 10 + (b - b'0') as u32)
    })(input)
}

fn time(input: &str) -> IResult<&str, NaiveTime> {
    map_opt(
        tuple((
            fixed_digits(2),
            char(':'),
            fixed_digits(2),
            char(':'),
            fixed_digits(2),
            opt(fraction),
        )),
        |(h, _, m, _, s, micros)| NaiveTime::from_hms_micro_opt(h, m, s, micros.unwrap_or(0)),
    )(input)
}

fn datetime(input: &str) -> IResult<&str, NaiveDateTime> {
    let (rest, (d, _, t, _)) = tuple((date, one_of(" T"), time, opt(char('Z'))))(input)?;
    Ok((rest, d.and_time(t)))
}

fn integer_prefix(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

fn float_prefix(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}
