//! Canonical, hashable forms of field values.

use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::metadata::{FieldValue, UNKNOWN};

/// Single comparable element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scalar {
    Text(String),
    Integer(i64),
}

/// Hashable, equality-comparable form of a [`FieldValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalValue {
    Scalar(Scalar),
    /// Multi-valued text where element order is significant.
    Tuple(Vec<String>),
    /// Multi-valued field compared without regard to order.
    Set(BTreeSet<Scalar>),
}

/// How multi-valued fields compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SequencePolicy {
    /// All-text sequences keep their order; mixed sequences compare as sets.
    #[default]
    Ordered,
    /// Every sequence compares as a set.
    Unordered,
}

/// Converts a value to its canonical form. Never fails.
pub fn canonicalize(value: &FieldValue, policy: SequencePolicy) -> CanonicalValue {
    match value {
        FieldValue::List(items) => {
            let all_text = items.iter().all(FieldValue::is_text_like);
            if all_text && policy == SequencePolicy::Ordered {
                CanonicalValue::Tuple(items.iter().map(|v| v.to_string()).collect())
            } else {
                CanonicalValue::Set(items.iter().map(scalar).collect())
            }
        }
        other => CanonicalValue::Scalar(scalar(other)),
    }
}

fn scalar(value: &FieldValue) -> Scalar {
    match value {
        FieldValue::Integer(n) => Scalar::Integer(*n),
        FieldValue::Text(s) | FieldValue::Date(s) => Scalar::Text(s.clone()),
        FieldValue::Unknown => Scalar::Text(UNKNOWN.to_string()),
        // Nested lists fall back to their rendered form.
        nested @ FieldValue::List(_) => Scalar::Text(nested.to_string()),
    }
}
