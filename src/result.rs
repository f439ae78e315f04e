//! Tabular results returned by the execution adapter.
//!
//! A [`TabularResult`] is the flattened, textual shape of a CQL result set:
//! a header of column names as the store returned them (any case, any
//! order) and rows of cell text where `"NULL"` or an empty cell means NULL.
//!
//! Adapters that receive typed driver values build the cells with
//! [`NativeValue::to_cell`].

use std::fmt::Write as _;
use std::net::IpAddr;

use chrono::NaiveDate;
use num_bigint::{BigInt, Sign};
use uuid::Uuid;

use crate::value::{format_f32, format_f64};

/// Cell text for a native value with no textual rendering.
pub const UNSUPPORTED_CELL: &str = "[UNSUPPORTED_TYPE]";

/// Column header plus textual rows of one statement execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    pub fn new<C, S>(columns: C, rows: Vec<Vec<String>>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Result of a statement that returns no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from typed driver values.
    pub fn from_native<C, S>(columns: C, rows: Vec<Vec<NativeValue>>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(NativeValue::to_cell).collect())
            .collect();
        Self::new(columns, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}

/// A CQL value as decoded by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// `text`, `varchar` and `ascii`.
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Days, with the Unix epoch at 2^31.
    Date(u32),
    /// Nanoseconds since midnight.
    Time(i64),
    /// `uuid` and `timeuuid`.
    Uuid(Uuid),
    Blob(Vec<u8>),
    /// Big-endian two's complement unscaled value and scale.
    Decimal { unscaled: Vec<u8>, scale: i32 },
    /// Big-endian two's complement.
    Varint(Vec<u8>),
    Duration {
        months: i32,
        days: i32,
        nanoseconds: i64,
    },
    Inet(IpAddr),
    /// A collection, UDT or any type without a textual rendering.
    Unsupported,
}

const DATE_EPOCH: i64 = 1 << 31;
/// 1970-01-01 counted in days from the common era.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

impl NativeValue {
    /// Render the value as result cell text.
    pub fn to_cell(&self) -> String {
        match self {
            NativeValue::Null => "NULL".to_string(),
            NativeValue::TinyInt(n) => n.to_string(),
            NativeValue::SmallInt(n) => n.to_string(),
            NativeValue::Int(n) => n.to_string(),
            NativeValue::BigInt(n) | NativeValue::Counter(n) => n.to_string(),
            NativeValue::Float(f) => format_f32(*f),
            NativeValue::Double(f) => format_f64(*f),
            NativeValue::Boolean(b) => u8::from(*b).to_string(),
            NativeValue::Text(s) => s.clone(),
            NativeValue::Timestamp(ms) => ms.to_string(),
            NativeValue::Date(days) => render_date(*days),
            NativeValue::Time(nanos) => render_time(*nanos),
            NativeValue::Uuid(u) => u.hyphenated().to_string(),
            NativeValue::Blob(bytes) => format!("0x{}", crate::hex::encode(bytes)),
            NativeValue::Decimal { unscaled, scale } => render_decimal(unscaled, *scale),
            NativeValue::Varint(bytes) => BigInt::from_signed_bytes_be(bytes).to_string(),
            NativeValue::Duration {
                months,
                days,
                nanoseconds,
            } => render_duration(*months, *days, *nanoseconds),
            NativeValue::Inet(addr) => addr.to_string(),
            NativeValue::Unsupported => UNSUPPORTED_CELL.to_string(),
        }
    }
}

fn render_date(days: u32) -> String {
    let from_ce = UNIX_EPOCH_DAYS_FROM_CE + days as i64 - DATE_EPOCH;
    let date = i32::try_from(from_ce)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt);
    match date {
        Some(d) => format_date(d),
        // Outside chrono's range; keep the raw day count.
        None => days.to_string(),
    }
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn render_time(nanos: i64) -> String {
    let total_seconds = nanos.div_euclid(NANOS_PER_SECOND);
    let micros = nanos.rem_euclid(NANOS_PER_SECOND) / 1_000;
    format!(
        "{:02}:{:02}:{:02}.{:06}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        micros
    )
}

fn render_decimal(unscaled: &[u8], scale: i32) -> String {
    let n = BigInt::from_signed_bytes_be(unscaled);
    if scale <= 0 {
        let mut digits = n.to_string();
        if n.sign() != Sign::NoSign {
            digits.extend(std::iter::repeat_n('0', scale.unsigned_abs() as usize));
        }
        return digits;
    }

    let negative = n.sign() == Sign::Minus;
    let digits = n.magnitude().to_string();
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };
    let point = padded.len() - scale;
    format!(
        "{}{}.{}",
        if negative { "-" } else { "" },
        &padded[..point],
        &padded[point..]
    )
}

fn render_duration(months: i32, days: i32, nanoseconds: i64) -> String {
    if months == 0 && days == 0 && nanoseconds == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::new();
    if months < 0 || days < 0 || nanoseconds < 0 {
        out.push('-');
    }
    out.push('P');
    if months != 0 {
        let _ = write!(out, "{}M", months.unsigned_abs());
    }
    if days != 0 {
        let _ = write!(out, "{}D", days.unsigned_abs());
    }

    let nanos = nanoseconds.unsigned_abs();
    if nanos != 0 {
        let per_second = NANOS_PER_SECOND as u64;
        let total_seconds = nanos / per_second;
        let fraction = nanos % per_second;
        let (hours, minutes, seconds) = (
            total_seconds / 3600,
            (total_seconds % 3600) / 60,
            total_seconds % 60,
        );

        out.push('T');
        if hours != 0 {
            let _ = write!(out, "{}H", hours);
        }
        if minutes != 0 {
            let _ = write!(out, "{}M", minutes);
        }
        if seconds != 0 || fraction != 0 {
            let _ = write!(out, "{}", seconds);
            if fraction != 0 {
                let frac = format!("{:09}", fraction);
                let _ = write!(out, ".{}", frac.trim_end_matches('0'));
            }
            out.push('S');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_result_accessors() {
        let result = TabularResult::new(
            ["id", "name"],
            vec![vec!["1".to_string(), "a".to_string()]],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.cell(0, 1), Some("a"));
        assert_eq!(result.cell(1, 0), None);
        assert!(TabularResult::empty().is_empty());
    }

    #[test]
    fn test_scalar_cells() {
        assert_eq!(NativeValue::Null.to_cell(), "NULL");
        assert_eq!(NativeValue::TinyInt(-8).to_cell(), "-8");
        assert_eq!(NativeValue::Boolean(true).to_cell(), "1");
        assert_eq!(NativeValue::Double(0.1).to_cell(), "0.1");
        assert_eq!(NativeValue::Timestamp(-1).to_cell(), "-1");
        assert_eq!(NativeValue::Blob(vec![0xde, 0xad]).to_cell(), "0xdead");
        assert_eq!(
            NativeValue::Inet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))).to_cell(),
            "10.0.0.1"
        );
        assert_eq!(NativeValue::Unsupported.to_cell(), UNSUPPORTED_CELL);
    }

    #[test]
    fn test_date_is_centred() {
        assert_eq!(NativeValue::Date(1 << 31).to_cell(), "1970-01-01");
        assert_eq!(NativeValue::Date((1 << 31) - 1).to_cell(), "1969-12-31");
        assert_eq!(NativeValue::Date((1 << 31) + 19_723).to_cell(), "2024-01-01");
    }

    #[test]
    fn test_time_has_micros() {
        let nanos = ((23 * 3600 + 59 * 60 + 59) * NANOS_PER_SECOND) + 123_456_789;
        assert_eq!(NativeValue::Time(nanos).to_cell(), "23:59:59.123456");
        assert_eq!(NativeValue::Time(0).to_cell(), "00:00:00.000000");
    }

    #[test]
    fn test_decimal_and_varint() {
        let dec = |n: i64, scale| NativeValue::Decimal {
            unscaled: BigInt::from(n).to_signed_bytes_be(),
            scale,
        };
        assert_eq!(dec(1999, 2).to_cell(), "19.99");
        assert_eq!(dec(-5, 3).to_cell(), "-0.005");
        assert_eq!(dec(42, 0).to_cell(), "42");
        assert_eq!(dec(42, -2).to_cell(), "4200");

        let huge: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(
            NativeValue::Varint(huge.to_signed_bytes_be()).to_cell(),
            "123456789012345678901234567890"
        );
        assert_eq!(NativeValue::Varint(vec![0xff]).to_cell(), "-1");
    }

    #[test]
    fn test_duration() {
        let d = |months, days, nanoseconds| NativeValue::Duration {
            months,
            days,
            nanoseconds,
        };
        assert_eq!(d(0, 0, 0).to_cell(), "PT0S");
        assert_eq!(d(14, 3, 0).to_cell(), "P14M3D");
        assert_eq!(d(0, 0, 3_661 * NANOS_PER_SECOND + 5_000_000).to_cell(), "PT1H1M1.005S");
        assert_eq!(d(0, -2, 0).to_cell(), "-P2D");
    }

    #[test]
    fn test_from_native() {
        let result = TabularResult::from_native(
            ["k", "v"],
            vec![vec![NativeValue::Int(1), NativeValue::Null]],
        );
        assert_eq!(result.row(0), Some(&["1".to_string(), "NULL".to_string()][..]));
    }
}
