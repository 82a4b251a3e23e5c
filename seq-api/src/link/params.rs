//! Named values substituted into link templates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// A single value bound to a template variable.
///
/// Timestamps keep their own variant so they are always rendered in the same
/// round-trippable ISO-8601 form, independent of the caller's locale or
/// `Display` choices.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// A scalar rendered with its natural string form.
    Text(String),
    /// A timestamp rendered as RFC 3339 with full sub-second precision.
    Timestamp(DateTime<FixedOffset>),
    /// A list of scalars (RFC 6570 list value).
    List(Vec<String>),
}

impl ParamValue {
    /// Wire form of a scalar value; lists are joined by the template expander.
    pub(crate) fn scalar(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Timestamp(t) => Some(format_timestamp(t)),
            ParamValue::List(_) => None,
        }
    }
}

/// Round-trippable timestamp form: `2026-10-19T08:15:30.1234567Z`.
fn format_timestamp(t: &DateTime<FixedOffset>) -> String {
    if t.offset().local_minus_utc() == 0 {
        t.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    } else {
        t.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::List(items) => write!(f, "{}", items.join(",")),
            other => write!(f, "{}", other.scalar().unwrap_or_default()),
        }
    }
}

macro_rules! impl_text_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Text(value.to_string())
                }
            }
        )*
    };
}

impl_text_param!(&str, String, &String, bool, i32, i64, u16, u32, u64, usize, f64);

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for ParamValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        ParamValue::Timestamp(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<&[&str]> for ParamValue {
    fn from(value: &[&str]) -> Self {
        ParamValue::List(value.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Parameters for a link-follow, keyed by template variable name.
///
/// ```
/// # use seq_api::LinkParams;
/// let params = LinkParams::new().with("id", "event-42").with("count", 30);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkParams(BTreeMap<String, ParamValue>);

impl LinkParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding (builder-style).
    #[must_use]
    pub fn with<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.insert(name, value);
        self
    }

    /// Bind `name` to `value` only when a value is present.
    #[must_use]
    pub fn with_opt<K, V>(self, name: K, value: Option<V>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn insert<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.0.insert(name.into(), value.into());
    }

    /// Value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LinkParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = LinkParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
