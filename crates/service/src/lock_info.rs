//! Lock record exchanged with the state client and persisted in `<id>.lock`.
//!
//! Field names follow the client's wire format (`ID`, `Operation`, ...).
//! Lower-case keys are accepted on input as well. Only `ID` takes part in
//! conflict detection; every other field is opaque metadata.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(rename = "Operation", alias = "operation", default)]
    pub operation: String,
    #[serde(rename = "Info", alias = "info", default)]
    pub info: String,
    #[serde(rename = "Who", alias = "who", default)]
    pub who: String,
    #[serde(rename = "Version", alias = "version", default)]
    pub version: String,
    #[serde(rename = "Created", alias = "created", default = "zero_time", with = "rfc3339")]
    pub created: DateTime<FixedOffset>,
    #[serde(rename = "Path", alias = "path", default)]
    pub path: String,
}

impl LockInfo {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize with one space of indentation per level, the layout written to lock files.
    pub fn to_indented_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Whether `other` names the same lock holder.
    pub fn same_holder(&self, other: &LockInfo) -> bool {
        self.id == other.id
    }
}

/// Timestamp used when a payload carries no `Created` field (0001-01-01T00:00:00Z).
fn zero_time() -> DateTime<FixedOffset> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
        .and_utc()
        .into()
}

/// RFC3339 with nanosecond precision and trailing fractional zeros dropped
/// (`05.5Z`, not `05.500Z`); a `null` timestamp reads as [`zero_time`].
mod rfc3339 {
    use chrono::{DateTime, FixedOffset, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<FixedOffset>) -> String {
        let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
        let nanos = dt.nanosecond() % 1_000_000_000;
        if nanos > 0 {
            let frac = format!("{nanos:09}");
            out.push('.');
            out.push_str(frac.trim_end_matches('0'));
        }
        if dt.offset().local_minus_utc() == 0 {
            out.push('Z');
        } else {
            out.push_str(&dt.format("%:z").to_string());
        }
        out
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom),
            None => Ok(super::zero_time()),
        }
    }
}
