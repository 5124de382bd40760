//! Insertion-ordered metadata record.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::value::FieldValue;

/// Flat mapping of field name to value that remembers insertion order.
///
/// Key order matters: the CSV exporter derives its header from the
/// first accepted record's keys, in this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    fields: Vec<(String, FieldValue)>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing the value in place if the key exists.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for MetadataRecord {
    fn from_iter<T: IntoIterator<Item = (K, FieldValue)>>(iter: T) -> Self {
        let mut record = MetadataRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut record = MetadataRecord::new();
        record.insert("Modality", FieldValue::text("CT"));
        record.insert("Manufacturer", FieldValue::text("GE"));
        record.insert("ImageType", FieldValue::text_list(["ORIGINAL"]));

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["Modality", "Manufacturer", "ImageType"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = MetadataRecord::new();
        record.insert("A", FieldValue::Integer(1));
        record.insert("B", FieldValue::Integer(2));
        record.insert("A", FieldValue::Integer(3));

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("A"), Some(&FieldValue::Integer(3)));
        assert_eq!(record.keys().next(), Some("A"));
    }

    #[test]
    fn test_serialize_keeps_key_order() {
        let record: MetadataRecord = vec![
            ("Z", FieldValue::text("last-alpha")),
            ("A", FieldValue::Unknown),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Z":"last-alpha","A":"Unknown"}"#);
    }
}
