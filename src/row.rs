//! Row buffer layout and field codec.
//!
//! Row buffers are fixed-length and owned by the caller. A schema computes
//! one [`RowLayout`] up front; every field access goes through a `Copy`
//! [`FieldSlot`] plus a slice of the caller's buffer, so nothing here ever
//! holds on to a buffer or rebases a pointer.
//!
//! ## Record Layout
//!
//! ```text
//! +---------------------+---------+---------+-----+---------+
//! | Presence Bitmap     | Field 0 | Field 1 | ... | Field N |
//! | [u8; (N + 7) / 8]   |         |         |     |         |
//! +---------------------+---------+---------+-----+---------+
//! ```
//!
//! Bit `i` of the bitmap is set when column `i` holds a value and clear
//! when it is NULL, so a zeroed bitmap reads as "every column NULL".
//!
//! ## Field Encodings
//!
//! | Storage | Bytes | Encoding |
//! |---------|-------|----------|
//! | Int | 1/2/3/4/8 | two's complement, little-endian |
//! | Float32 / Float64 | 4 / 8 | IEEE 754, little-endian |
//! | Decimal | 16 | `rust_decimal` serialized form |
//! | Var | prefix + capacity | little-endian length, then data |
//! | Date | 4 | days from the common era |
//! | Time | 8 | microseconds since midnight |
//! | DateTime | 8 | microseconds since the Unix epoch (UTC) |
//! | Enum | 2 | 1-based label index |
//! | Set | 8 | label bitmask |
//! | Bool | 1 | 0 or 1 |

use std::ops::Range;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};
use rust_decimal::Decimal;

use crate::error::{CqlError, CqlResult};
use crate::schema::{ColumnDescriptor, RelationalType};
use crate::value::Value;

/// Bytes per character reserved for non-binary character columns.
const MAX_CHAR_BYTES: u32 = 4;

/// Physical storage class of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Int { bytes: u8 },
    Float32,
    Float64,
    Decimal { precision: u8, scale: u8 },
    Var { prefix: u8, capacity: u32 },
    Date,
    Time { fsp: u8 },
    DateTime { fsp: u8 },
    Enum { labels: u16 },
    Set { labels: u8 },
    Bool,
}

impl Storage {
    pub fn for_column(column: &ColumnDescriptor) -> Self {
        let chars = |length: u32| {
            if column.binary_charset {
                length
            } else {
                length.saturating_mul(MAX_CHAR_BYTES)
            }
        };

        match &column.relational_type {
            RelationalType::Tiny => Storage::Int { bytes: 1 },
            RelationalType::Short => Storage::Int { bytes: 2 },
            RelationalType::Medium => Storage::Int { bytes: 3 },
            RelationalType::Long => Storage::Int { bytes: 4 },
            RelationalType::LongLong => Storage::Int { bytes: 8 },
            RelationalType::Float => Storage::Float32,
            RelationalType::Double => Storage::Float64,
            RelationalType::Decimal { precision, scale } => Storage::Decimal {
                precision: *precision,
                scale: *scale,
            },
            RelationalType::Char { length } | RelationalType::VarChar { length } => {
                Storage::var(chars(*length))
            }
            RelationalType::Other { length, .. } => Storage::var(chars(*length)),
            RelationalType::Blob { length } | RelationalType::Json { length } => {
                Storage::var(*length)
            }
            RelationalType::Date => Storage::Date,
            RelationalType::Time { fsp } => Storage::Time { fsp: *fsp },
            RelationalType::DateTime { fsp } | RelationalType::Timestamp { fsp } => {
                Storage::DateTime { fsp: *fsp }
            }
            RelationalType::Enum(labels) => Storage::Enum {
                labels: labels.len().min(u16::MAX as usize) as u16,
            },
            RelationalType::Set(labels) => Storage::Set {
                labels: labels.len().min(64) as u8,
            },
            RelationalType::Bit => Storage::Bool,
        }
    }

    fn var(capacity: u32) -> Self {
        let prefix = if capacity <= 0xff {
            1
        } else if capacity <= 0xffff {
            2
        } else {
            4
        };
        Storage::Var { prefix, capacity }
    }

    /// Bytes the field occupies in a buffer.
    pub fn width(&self) -> usize {
        match self {
            Storage::Int { bytes } => *bytes as usize,
            Storage::Float32 => 4,
            Storage::Float64 => 8,
            Storage::Decimal { .. } => 16,
            Storage::Var { prefix, capacity } => *prefix as usize + *capacity as usize,
            Storage::Date => 4,
            Storage::Time { .. } | Storage::DateTime { .. } => 8,
            Storage::Enum { .. } => 2,
            Storage::Set { .. } => 8,
            Storage::Bool => 1,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Storage::Int { .. } => "integer",
            Storage::Float32 | Storage::Float64 => "float",
            Storage::Decimal { .. } => "decimal",
            Storage::Var { .. } => "text or bytes",
            Storage::Date => "date",
            Storage::Time { .. } => "time",
            Storage::DateTime { .. } => "datetime",
            Storage::Enum { .. } => "enum index",
            Storage::Set { .. } => "set bitmask",
            Storage::Bool => "boolean",
        }
    }
}

/// Where one column lives inside a row buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub offset: usize,
    pub null_bit: usize,
    pub storage: Storage,
}

impl FieldSlot {
    pub fn width(&self) -> usize {
        self.storage.width()
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.width()
    }
}

/// Byte-offset table for the row buffers of one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    null_bytes: usize,
    slots: Vec<FieldSlot>,
    record_len: usize,
}

impl RowLayout {
    pub fn new(columns: &[ColumnDescriptor]) -> Self {
        let null_bytes = columns.len().div_ceil(8);
        let mut offset = null_bytes;
        let mut slots = Vec::with_capacity(columns.len());

        for (idx, column) in columns.iter().enumerate() {
            let storage = Storage::for_column(column);
            slots.push(FieldSlot {
                offset,
                null_bit: idx,
                storage,
            });
            offset += storage.width();
        }

        Self {
            null_bytes,
            slots,
            record_len: offset,
        }
    }

    /// Size of the presence bitmap at the start of the buffer.
    pub fn null_bytes(&self) -> usize {
        self.null_bytes
    }

    /// Minimum length of a row buffer.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn slot(&self, idx: usize) -> FieldSlot {
        self.slots[idx]
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    /// A zeroed buffer: every column NULL.
    pub fn new_buffer(&self) -> Vec<u8> {
        vec![0; self.record_len]
    }

    /// Mark every column NULL without touching field bytes.
    pub fn reset_nulls(&self, buf: &mut [u8]) {
        self.check(buf);
        buf[..self.null_bytes].fill(0);
    }

    pub(crate) fn check(&self, buf: &[u8]) {
        assert!(
            buf.len() >= self.record_len,
            "row buffer of {} bytes is shorter than the {}-byte record",
            buf.len(),
            self.record_len
        );
    }
}

pub fn is_null(slot: FieldSlot, buf: &[u8]) -> bool {
    buf[slot.null_bit / 8] & (1 << (slot.null_bit % 8)) == 0
}

pub fn set_null(slot: FieldSlot, buf: &mut [u8]) {
    buf[slot.null_bit / 8] &= !(1 << (slot.null_bit % 8));
}

fn set_present(slot: FieldSlot, buf: &mut [u8]) {
    buf[slot.null_bit / 8] |= 1 << (slot.null_bit % 8);
}

/// How faithfully a write preserved the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Exact,
    /// Text or bytes cut at the field capacity.
    Truncated,
    /// Number or label index forced into the column range.
    Clamped,
}

/// Read one column's value out of a row buffer.
pub fn read_field(column: &ColumnDescriptor, slot: FieldSlot, buf: &[u8]) -> Value {
    if is_null(slot, buf) {
        return Value::Null;
    }
    decode(column, slot.storage, &buf[slot.range()])
}

/// Write one column's value into a row buffer.
///
/// On a type mismatch the buffer is left untouched.
pub fn write_field(
    column: &ColumnDescriptor,
    slot: FieldSlot,
    buf: &mut [u8],
    value: &Value,
) -> CqlResult<Written> {
    if value.is_null() {
        set_null(slot, buf);
        return Ok(Written::Exact);
    }
    let written = encode(column, slot.storage, &mut buf[slot.range()], value)?;
    set_present(slot, buf);
    Ok(written)
}

fn decode(column: &ColumnDescriptor, storage: Storage, bytes: &[u8]) -> Value {
    match storage {
        Storage::Int { .. } => Value::Int(decode_int(bytes)),
        Storage::Float32 => Value::Float(f32::from_le_bytes(array(bytes)) as f64),
        Storage::Float64 => Value::Float(f64::from_le_bytes(array(bytes))),
        Storage::Decimal { .. } => Value::Decimal(Decimal::deserialize(array(bytes))),
        Storage::Var { prefix, capacity } => {
            let prefix = prefix as usize;
            let mut len_bytes = [0u8; 4];
            len_bytes[..prefix].copy_from_slice(&bytes[..prefix]);
            let len = (u32::from_le_bytes(len_bytes).min(capacity)) as usize;
            let data = &bytes[prefix..prefix + len];
            if column.binary_charset {
                Value::Bytes(data.to_vec())
            } else {
                Value::Text(String::from_utf8_lossy(data).into_owned())
            }
        }
        Storage::Date => NaiveDate::from_num_days_from_ce_opt(i32::from_le_bytes(array(bytes)))
            .map_or(Value::Null, Value::Date),
        Storage::Time { .. } => {
            let micros = i64::from_le_bytes(array(bytes));
            u32::try_from(micros.div_euclid(1_000_000))
                .ok()
                .and_then(|secs| {
                    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                })
                .map_or(Value::Null, Value::Time)
        }
        Storage::DateTime { .. } => {
            DateTime::from_timestamp_micros(i64::from_le_bytes(array(bytes)))
                .map_or(Value::Null, |dt| Value::DateTime(dt.naive_utc()))
        }
        Storage::Enum { .. } => Value::Enum(u16::from_le_bytes(array(bytes))),
        Storage::Set { .. } => Value::Set(u64::from_le_bytes(array(bytes))),
        Storage::Bool => Value::Bool(bytes[0] != 0),
    }
}

fn encode(
    column: &ColumnDescriptor,
    storage: Storage,
    out: &mut [u8],
    value: &Value,
) -> CqlResult<Written> {
    match (storage, value) {
        (Storage::Int { bytes }, Value::Int(n)) => {
            let (min, max) = int_range(bytes);
            let clamped = (*n).clamp(min, max);
            out.copy_from_slice(&clamped.to_le_bytes()[..bytes as usize]);
            Ok(exact_unless(clamped != *n, Written::Clamped))
        }
        (Storage::Int { bytes }, Value::Bool(b)) => {
            out.copy_from_slice(&(*b as i64).to_le_bytes()[..bytes as usize]);
            Ok(Written::Exact)
        }
        (Storage::Float32, Value::Float(f)) => {
            out.copy_from_slice(&(*f as f32).to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Float32, Value::Int(n)) => {
            out.copy_from_slice(&(*n as f32).to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Float64, Value::Float(f)) => {
            out.copy_from_slice(&f.to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Float64, Value::Int(n)) => {
            out.copy_from_slice(&(*n as f64).to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Decimal { precision, scale }, Value::Decimal(d)) => {
            let (stored, clamped) = fit_decimal(*d, precision, scale);
            out.copy_from_slice(&stored.serialize());
            Ok(exact_unless(clamped, Written::Clamped))
        }
        (Storage::Decimal { precision, scale }, Value::Int(n)) => {
            let (stored, clamped) = fit_decimal(Decimal::from(*n), precision, scale);
            out.copy_from_slice(&stored.serialize());
            Ok(exact_unless(clamped, Written::Clamped))
        }
        (Storage::Var { prefix, capacity }, Value::Text(s)) => {
            let mut end = s.len().min(capacity as usize);
            if !column.binary_charset {
                if let Some((at, _)) = char_limit(column).and_then(|n| s.char_indices().nth(n)) {
                    end = end.min(at);
                }
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
            }
            write_var(out, prefix, &s.as_bytes()[..end]);
            Ok(exact_unless(end < s.len(), Written::Truncated))
        }
        (Storage::Var { prefix, capacity }, Value::Bytes(b)) => {
            let end = b.len().min(capacity as usize);
            write_var(out, prefix, &b[..end]);
            Ok(exact_unless(end < b.len(), Written::Truncated))
        }
        (Storage::Date, Value::Date(d)) => {
            out.copy_from_slice(&d.num_days_from_ce().to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Date, Value::DateTime(dt)) => {
            out.copy_from_slice(&dt.date().num_days_from_ce().to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Time { fsp }, Value::Time(t)) => {
            let micros = t.num_seconds_from_midnight() as i64 * 1_000_000
                + (t.nanosecond() / 1_000) as i64;
            out.copy_from_slice(&truncate_micros(micros, fsp).to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::DateTime { fsp }, Value::DateTime(dt)) => {
            let micros = dt.and_utc().timestamp_micros();
            out.copy_from_slice(&truncate_micros(micros, fsp).to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::DateTime { .. }, Value::Date(d)) => {
            let micros = d.and_time(NaiveTime::MIN).and_utc().timestamp_micros();
            out.copy_from_slice(&micros.to_le_bytes());
            Ok(Written::Exact)
        }
        (Storage::Enum { labels }, Value::Enum(idx)) => {
            let fits = *idx <= labels;
            let stored = if fits { *idx } else { 0 };
            out.copy_from_slice(&stored.to_le_bytes());
            Ok(exact_unless(!fits, Written::Clamped))
        }
        (Storage::Set { labels }, Value::Set(mask)) => {
            let allowed = if labels >= 64 { u64::MAX } else { (1u64 << labels) - 1 };
            out.copy_from_slice(&(mask & allowed).to_le_bytes());
            Ok(exact_unless(mask & !allowed != 0, Written::Clamped))
        }
        (Storage::Bool, Value::Bool(b)) => {
            out[0] = *b as u8;
            Ok(Written::Exact)
        }
        (Storage::Bool, Value::Int(n)) => {
            out[0] = (*n != 0) as u8;
            Ok(Written::Exact)
        }
        _ => Err(CqlError::mismatch(&column.name, storage.name())),
    }
}

/// Declared length in characters of a character column.
fn char_limit(column: &ColumnDescriptor) -> Option<usize> {
    match &column.relational_type {
        RelationalType::Char { length }
        | RelationalType::VarChar { length }
        | RelationalType::Other { length, .. } => Some(*length as usize),
        _ => None,
    }
}

fn exact_unless(cond: bool, otherwise: Written) -> Written {
    if cond { otherwise } else { Written::Exact }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn decode_int(bytes: &[u8]) -> i64 {
    let negative = bytes.last().is_some_and(|b| b & 0x80 != 0);
    let mut full = if negative { [0xff; 8] } else { [0; 8] };
    full[..bytes.len()].copy_from_slice(bytes);
    i64::from_le_bytes(full)
}

fn int_range(bytes: u8) -> (i64, i64) {
    if bytes >= 8 {
        (i64::MIN, i64::MAX)
    } else {
        let bits = bytes as u32 * 8 - 1;
        (-(1i64 << bits), (1i64 << bits) - 1)
    }
}

/// Rescale to the column scale and clamp to its precision.
fn fit_decimal(value: Decimal, precision: u8, scale: u8) -> (Decimal, bool) {
    let mut d = value;
    d.rescale(scale as u32);
    let max = Decimal::try_from_i128_with_scale(10i128.pow(precision as u32) - 1, scale as u32)
        .unwrap_or(Decimal::MAX);
    if d > max {
        (max, true)
    } else if d < -max {
        (-max, true)
    } else {
        (d, false)
    }
}

fn truncate_micros(micros: i64, fsp: u8) -> i64 {
    let unit = 10i64.pow(6 - fsp.min(6) as u32);
    micros - micros.rem_euclid(unit)
}

fn write_var(out: &mut [u8], prefix: u8, data: &[u8]) {
    let prefix = prefix as usize;
    out[..prefix].copy_from_slice(&(data.len() as u32).to_le_bytes()[..prefix]);
    out[prefix..prefix + data.len()].copy_from_slice(data);
    out[prefix + data.len()..].fill(0);
}

/// One part of a key buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPart {
    /// Schema index of the column.
    pub column: usize,
    /// Offset of the part (its null indicator, if any) in the key buffer.
    pub offset: usize,
    pub nullable: bool,
    pub storage: Storage,
}

impl KeyPart {
    /// Bytes the part occupies: null indicator plus field.
    pub fn store_length(&self) -> usize {
        self.nullable as usize + self.storage.width()
    }

    fn value_range(&self) -> Range<usize> {
        let start = self.offset + self.nullable as usize;
        start..start + self.storage.width()
    }
}

/// Layout of key buffers: parts packed in key order, each prefixed by a
/// one-byte null indicator (non-zero = NULL) when the column is nullable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    parts: Vec<KeyPart>,
    key_len: usize,
}

impl KeyLayout {
    pub fn new(columns: &[ColumnDescriptor], key_columns: &[usize]) -> Self {
        let mut offset = 0;
        let mut parts = Vec::with_capacity(key_columns.len());
        for &idx in key_columns {
            let column = &columns[idx];
            let part = KeyPart {
                column: idx,
                offset,
                nullable: column.nullable,
                storage: Storage::for_column(column),
            };
            offset += part.store_length();
            parts.push(part);
        }
        Self {
            parts,
            key_len: offset,
        }
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Length of a key buffer holding every part.
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Length of a key buffer holding the first `parts` parts.
    pub fn prefix_len(&self, parts: usize) -> usize {
        self.parts[..parts.min(self.parts.len())]
            .iter()
            .map(KeyPart::store_length)
            .sum()
    }

    /// Copy the key columns of a row buffer into a new key buffer.
    pub fn pack(&self, layout: &RowLayout, row: &[u8]) -> Vec<u8> {
        layout.check(row);
        let mut key = vec![0u8; self.key_len];
        for part in &self.parts {
            let slot = layout.slot(part.column);
            let null = is_null(slot, row);
            if part.nullable {
                key[part.offset] = null as u8;
            }
            if !null {
                key[part.value_range()].copy_from_slice(&row[slot.range()]);
            }
        }
        key
    }
}

/// Read one key part's value out of a key buffer.
pub fn read_key_part(column: &ColumnDescriptor, part: &KeyPart, key: &[u8]) -> Value {
    assert!(
        key.len() >= part.offset + part.store_length(),
        "key buffer of {} bytes ends before part at offset {}",
        key.len(),
        part.offset
    );
    if part.nullable && key[part.offset] != 0 {
        return Value::Null;
    }
    decode(column, part.storage, &key[part.value_range()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", RelationalType::Medium).not_null(),
            ColumnDescriptor::new("name", RelationalType::VarChar { length: 4 }),
            ColumnDescriptor::new(
                "price",
                RelationalType::Decimal {
                    precision: 5,
                    scale: 2,
                },
            ),
            ColumnDescriptor::new("at", RelationalType::DateTime { fsp: 3 }),
        ]
    }

    #[test]
    fn test_layout_offsets() {
        let layout = RowLayout::new(&columns());
        assert_eq!(layout.null_bytes(), 1);
        assert_eq!(layout.slot(0).offset, 1);
        assert_eq!(layout.slot(1).offset, 4);
        // varchar(4) in a 4-byte charset: 1-byte prefix + 16 bytes
        assert_eq!(layout.slot(2).offset, 21);
        assert_eq!(layout.slot(3).offset, 37);
        assert_eq!(layout.record_len(), 45);
    }

    #[test]
    fn test_new_buffer_is_all_null() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let buf = layout.new_buffer();
        for (i, col) in cols.iter().enumerate() {
            assert_eq!(read_field(col, layout.slot(i), &buf), Value::Null);
        }
    }

    #[test]
    fn test_int24_sign_extension_and_clamp() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        let slot = layout.slot(0);

        assert_eq!(write_field(&cols[0], slot, &mut buf, &Value::Int(-5)).unwrap(), Written::Exact);
        assert_eq!(read_field(&cols[0], slot, &buf), Value::Int(-5));

        assert_eq!(
            write_field(&cols[0], slot, &mut buf, &Value::Int(1 << 30)).unwrap(),
            Written::Clamped
        );
        assert_eq!(read_field(&cols[0], slot, &buf), Value::Int((1 << 23) - 1));
    }

    #[test]
    fn test_text_truncates_to_declared_length() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        let slot = layout.slot(1);
        assert_eq!(
            write_field(&cols[1], slot, &mut buf, &Value::text("ééééééééé")).unwrap(),
            Written::Truncated
        );
        assert_eq!(read_field(&cols[1], slot, &buf), Value::text("éééé"));

        assert_eq!(
            write_field(&cols[1], slot, &mut buf, &Value::text("abcd")).unwrap(),
            Written::Exact
        );
        assert_eq!(read_field(&cols[1], slot, &buf), Value::text("abcd"));
    }

    #[test]
    fn test_text_truncates_on_char_boundary() {
        // Text blobs are sized in bytes, not characters
        let cols = vec![ColumnDescriptor::new("memo", RelationalType::Blob { length: 5 })];
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        assert_eq!(
            write_field(&cols[0], layout.slot(0), &mut buf, &Value::text("ééé")).unwrap(),
            Written::Truncated
        );
        assert_eq!(read_field(&cols[0], layout.slot(0), &buf), Value::text("éé"));
    }

    #[test]
    fn test_decimal_rescales_and_clamps() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        let slot = layout.slot(2);

        let d = Decimal::from_str("1.5").unwrap();
        write_field(&cols[2], slot, &mut buf, &Value::Decimal(d)).unwrap();
        match read_field(&cols[2], slot, &buf) {
            Value::Decimal(d) => assert_eq!(d.to_string(), "1.50"),
            other => panic!("unexpected {:?}", other),
        }

        let big = Decimal::from_str("123456.7").unwrap();
        assert_eq!(
            write_field(&cols[2], slot, &mut buf, &Value::Decimal(big)).unwrap(),
            Written::Clamped
        );
        assert_eq!(
            read_field(&cols[2], slot, &buf),
            Value::Decimal(Decimal::from_str("999.99").unwrap())
        );
    }

    #[test]
    fn test_datetime_truncates_to_fsp() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        let slot = layout.slot(3);
        let dt = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap();
        write_field(&cols[3], slot, &mut buf, &Value::DateTime(dt)).unwrap();
        let expected = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap();
        assert_eq!(read_field(&cols[3], slot, &buf), Value::DateTime(expected));
    }

    #[test]
    fn test_mismatch_leaves_buffer_untouched() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        let before = buf.clone();
        let err = write_field(&cols[0], layout.slot(0), &mut buf, &Value::text("x")).unwrap_err();
        assert!(matches!(err, CqlError::ValueMismatch { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn test_null_bits_are_independent() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let mut buf = layout.new_buffer();
        write_field(&cols[0], layout.slot(0), &mut buf, &Value::Int(1)).unwrap();
        write_field(&cols[1], layout.slot(1), &mut buf, &Value::text("a")).unwrap();
        set_null(layout.slot(0), &mut buf);
        assert!(is_null(layout.slot(0), &buf));
        assert!(!is_null(layout.slot(1), &buf));
        layout.reset_nulls(&mut buf);
        assert!(is_null(layout.slot(1), &buf));
    }

    #[test]
    fn test_key_pack_and_read() {
        let cols = columns();
        let layout = RowLayout::new(&cols);
        let keys = KeyLayout::new(&cols, &[0, 1]);
        assert_eq!(keys.parts()[0].store_length(), 3);
        assert_eq!(keys.parts()[1].offset, 3);
        assert_eq!(keys.key_len(), 3 + 1 + 17);
        assert_eq!(keys.prefix_len(1), 3);

        let mut row = layout.new_buffer();
        write_field(&cols[0], layout.slot(0), &mut row, &Value::Int(42)).unwrap();
        let key = keys.pack(&layout, &row);
        assert_eq!(read_key_part(&cols[0], &keys.parts()[0], &key), Value::Int(42));
        assert_eq!(read_key_part(&cols[1], &keys.parts()[1], &key), Value::Null);
    }
}
