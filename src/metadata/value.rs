//! Field values carried by a metadata record.

use std::fmt;

use serde::{Serialize, Serializer};

/// Literal used wherever a base field is absent from the source record.
pub const UNKNOWN: &str = "Unknown";

/// One extracted field value.
///
/// Multi-valued DICOM attributes (value multiplicity > 1) become
/// [`FieldValue::List`]; everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text or coded string.
    Text(String),
    /// Integer string (`IS`) or binary integer value.
    Integer(i64),
    /// Date string, kept exactly as stored (no reformatting).
    Date(String),
    /// Ordered values of a multi-valued attribute.
    List(Vec<FieldValue>),
    /// Sentinel for a base field missing from the source.
    Unknown,
}

impl FieldValue {
    /// Convenience constructor for a text value.
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Builds a list of text values.
    pub fn text_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(values.into_iter().map(|v| FieldValue::Text(v.into())).collect())
    }

    /// Returns the string payload of text-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Date(s) => Some(s),
            FieldValue::Unknown => Some(UNKNOWN),
            _ => None,
        }
    }

    /// True for values whose natural form is a string.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            FieldValue::Text(_) | FieldValue::Date(_) | FieldValue::Unknown
        )
    }
}

/// Lists render with the DICOM value separator (`\`).
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Date(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Unknown => f.write_str(UNKNOWN),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) | FieldValue::Date(s) => serializer.serialize_str(s),
            FieldValue::Integer(n) => serializer.serialize_i64(*n),
            FieldValue::Unknown => serializer.serialize_str(UNKNOWN),
            FieldValue::List(items) => serializer.collect_seq(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_list_uses_backslash() {
        let value = FieldValue::text_list(["ORIGINAL", "PRIMARY", "AXIAL"]);
        assert_eq!(value.to_string(), "ORIGINAL\\PRIMARY\\AXIAL");
    }

    #[test]
    fn test_display_unknown() {
        assert_eq!(FieldValue::Unknown.to_string(), "Unknown");
        assert_eq!(FieldValue::Unknown.as_str(), Some("Unknown"));
    }

    #[test]
    fn test_serialize_json() {
        let value = FieldValue::List(vec![FieldValue::text("A"), FieldValue::Integer(3)]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["A",3]"#);
        assert_eq!(
            serde_json::to_string(&FieldValue::Unknown).unwrap(),
            r#""Unknown""#
        );
    }
}
