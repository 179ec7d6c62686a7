//! SQL value types and their canonical byte encoding.
//!
//! A row is hashed over the concatenation of its column encodings:
//!
//! - NULL is the single byte `N`
//! - any other value is `V`, its text length in bytes (base 10), `:`, then
//!   the text itself
//!
//! The text of a value is the server's own rendering (`CAST(col AS BINARY)`):
//! integers in base 10, decimals with their declared scale, temporal values as
//! the server prints them, text and binary data byte-for-byte. The MySQL
//! driver evaluates this encoding inside the server; [`SqlValue::encode_canonical`]
//! produces the same bytes for values already held in memory.

use std::borrow::Cow;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// SQL value with efficient memory usage.
///
/// Uses `Cow` for string and byte data so decoders can borrow from driver
/// buffers; values kept past a read are converted with [`SqlValue::into_owned`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (tinyint through bigint).
    I64(i64),

    /// Unsigned integer (`... unsigned` columns).
    U64(u64),

    /// 32-bit floating point (FLOAT).
    F32(f32),

    /// 64-bit floating point (DOUBLE).
    F64(f64),

    /// Exact numeric (DECIMAL).
    Decimal(Decimal),

    /// Text data.
    Text(Cow<'a, str>),

    /// Binary data.
    Bytes(Cow<'a, [u8]>),

    /// DATE, TIME, DATETIME, TIMESTAMP or YEAR as rendered by the server.
    ///
    /// Kept as text so negative and multi-day TIME values and zero dates
    /// survive unchanged; the server parses the text back when it is bound.
    Temporal(Cow<'a, str>),
}

/// A row of values in column ordinal order.
pub type Row = Vec<SqlValue<'static>>;

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::U64(v) => SqlValue::U64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Temporal(v) => SqlValue::Temporal(Cow::Owned(v.into_owned())),
        }
    }

    /// Check if this value is NULL.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Append the canonical encoding of this value to `out`.
    pub fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            SqlValue::Null => out.push(b'N'),
            SqlValue::Bool(v) => push_text(out, if *v { b"1" } else { b"0" }),
            SqlValue::I64(v) => push_text(out, v.to_string().as_bytes()),
            SqlValue::U64(v) => push_text(out, v.to_string().as_bytes()),
            SqlValue::F32(v) => push_text(out, v.to_string().as_bytes()),
            SqlValue::F64(v) => push_text(out, v.to_string().as_bytes()),
            SqlValue::Decimal(v) => push_text(out, v.to_string().as_bytes()),
            SqlValue::Text(v) | SqlValue::Temporal(v) => push_text(out, v.as_bytes()),
            SqlValue::Bytes(v) => push_text(out, v),
        }
    }
}

fn push_text(out: &mut Vec<u8>, text: &[u8]) {
    out.push(b'V');
    out.extend_from_slice(text.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(text);
}

/// Encode a whole row (column values in ordinal order).
pub fn encode_row(row: &[SqlValue<'_>], out: &mut Vec<u8>) {
    for value in row {
        value.encode_canonical(out);
    }
}

impl fmt::Display for SqlValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", u8::from(*v)),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::U64(v) => write!(f, "{}", v),
            SqlValue::F32(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            SqlValue::Bytes(v) => {
                write!(f, "0x")?;
                for b in v.iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            SqlValue::Temporal(v) => write!(f, "'{}'", v),
        }
    }
}

/// Value of a comparison key: one entry per key column, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue(pub Vec<SqlValue<'static>>);

impl KeyValue {
    /// Create a key from its column values.
    pub fn new(values: Vec<SqlValue<'static>>) -> Self {
        Self(values)
    }

    /// Get the inner values.
    pub fn values(&self) -> &[SqlValue<'static>] {
        &self.0
    }

    /// Number of key columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self(vec![SqlValue::I64(value)])
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self(vec![SqlValue::Text(Cow::Owned(value.to_string()))])
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            return write!(f, "{}", self.0[0]);
        }
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| v.to_string()))
    }
}
