use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Write};

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Integer(i64),
}

impl FieldValue {
    #[inline]
    pub fn as_i64(&self) -> i64 {
        match self {
            FieldValue::Integer(i) => *i,
        }
    }
}

macro_rules! impl_from_integer {
    ($typ:ident) => {
        impl From<$typ> for FieldValue {
            #[inline]
            fn from(value: $typ) -> Self {
                FieldValue::Integer(value as i64)
            }
        }
    };
}

impl_from_integer!(i64);
impl_from_integer!(i32);
impl_from_integer!(u32);
impl_from_integer!(i16);
impl_from_integer!(u16);
impl_from_integer!(u8);

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}i"),
        }
    }
}

/// A measurement carrying several named fields which share the same tags
/// and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,

    tags: BTreeMap<String, String>,

    fields: BTreeMap<String, FieldValue>,

    timestamp: DateTime<Utc>,
}

impl Metric {
    #[inline]
    pub fn new(
        name: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            name: name.into(),
            tags,
            fields,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[inline]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    #[inline]
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    #[inline]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

impl Display for Metric {
    /// Display a metric in a line-protocol like format
    ///
    /// ```text
    /// NAME,TAG=VALUE,... FIELD=VALUE,... TIMESTAMP
    /// ```
    ///
    /// Integer fields carry an `i` suffix, TIMESTAMP is nanoseconds since
    /// the unix epoch.
    ///
    /// example:
    /// ```text
    /// nats,port=4222,server=localhost connections=2i,memory=6193152i 1511858814970636678
    /// ```
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(&self.name)?;

        for (k, v) in &self.tags {
            write!(fmt, ",{k}={v}")?;
        }

        let mut first = true;
        for (k, v) in &self.fields {
            fmt.write_char(if first { ' ' } else { ',' })?;
            first = false;
            write!(fmt, "{k}={v}")?;
        }

        match self.timestamp.timestamp_nanos_opt() {
            Some(nanos) => write!(fmt, " {nanos}"),
            None => Ok(()),
        }
    }
}
