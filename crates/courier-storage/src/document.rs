// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory form of a store document: named collections of JSON records.

use std::collections::BTreeMap;

use serde_json::Value;

use courier_core::Criteria;

/// A set of named collections, each an ordered list of records.
///
/// Serializes as `{"<collection>": [record, ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    collections: BTreeMap<String, Vec<Value>>,
}

impl Document {
    /// Parse a document. Anything that is not an object of arrays is rejected.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            collections: serde_json::from_str(raw)?,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.collections)
    }

    fn records(&self, collection: &str) -> &[Value] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn records_mut(&mut self, collection: &str) -> &mut Vec<Value> {
        self.collections.entry(collection.to_string()).or_default()
    }

    pub fn find(&self, collection: &str, criteria: &Criteria) -> Option<Value> {
        self.records(collection)
            .iter()
            .find(|r| criteria.matches(r))
            .cloned()
    }

    pub fn filter(&self, collection: &str, criteria: &Criteria) -> Vec<Value> {
        self.records(collection)
            .iter()
            .filter(|r| criteria.matches(r))
            .cloned()
            .collect()
    }

    pub fn append(&mut self, collection: &str, record: Value) {
        self.records_mut(collection).push(record);
    }

    /// Shallow-merge the top-level fields of `patch` into the first matching
    /// record. A `null` patch field removes that field.
    pub fn update(&mut self, collection: &str, criteria: &Criteria, patch: Value) -> Option<Value> {
        let record = self
            .records_mut(collection)
            .iter_mut()
            .find(|r| criteria.matches(r))?;
        if let (Value::Object(target), Value::Object(fields)) = (&mut *record, patch) {
            for (key, value) in fields {
                if value.is_null() {
                    target.remove(&key);
                } else {
                    target.insert(key, value);
                }
            }
        }
        Some(record.clone())
    }

    /// Remove every matching record; returns whether anything was removed.
    pub fn remove(&mut self, collection: &str, criteria: &Criteria) -> bool {
        let records = self.records_mut(collection);
        let before = records.len();
        records.retain(|r| !criteria.matches(r));
        records.len() != before
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Document {
        let mut doc = Document::default();
        doc.append("schedules", json!({"id": "a", "tenant_id": "u1", "status": "pending"}));
        doc.append("schedules", json!({"id": "b", "tenant_id": "u2", "status": "pending"}));
        doc.append("schedules", json!({"id": "c", "tenant_id": "u1", "status": "sent"}));
        doc
    }

    #[test]
    fn filter_preserves_insertion_order() {
        let doc = sample();
        let ids: Vec<_> = doc
            .filter("schedules", &Criteria::all().field("tenant_id", "u1"))
            .into_iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("c")]);
    }

    #[test]
    fn missing_collection_reads_as_empty() {
        let doc = Document::default();
        assert!(doc.filter("sessions", &Criteria::all()).is_empty());
        assert!(doc.find("sessions", &Criteria::all()).is_none());
    }

    #[test]
    fn update_merges_and_nulls_remove() {
        let mut doc = sample();
        doc.update(
            "schedules",
            &Criteria::all().field("id", "a"),
            json!({"error": "boom"}),
        );
        let updated = doc
            .update(
                "schedules",
                &Criteria::all().field("id", "a"),
                json!({"status": "failed", "error": null}),
            )
            .expect("record exists");
        assert_eq!(updated["status"], "failed");
        assert_eq!(updated["tenant_id"], "u1");
        assert!(updated.get("error").is_none());

        assert!(
            doc.update("schedules", &Criteria::all().field("id", "zz"), json!({}))
                .is_none()
        );
    }

    #[test]
    fn remove_reports_whether_anything_matched() {
        let mut doc = sample();
        let crit = Criteria::all().field("id", "b").field("tenant_id", "u1");
        assert!(!doc.remove("schedules", &crit));
        assert!(doc.remove("schedules", &Criteria::all().field("id", "b")));
        assert_eq!(doc.filter("schedules", &Criteria::all()).len(), 2);
    }

    #[test]
    fn parse_rejects_non_collection_documents() {
        assert!(Document::parse("[1,2]").is_err());
        assert!(Document::parse(r#"{"schedules": 5}"#).is_err());
        assert!(Document::parse("{not json").is_err());
        assert_eq!(Document::parse("").expect("empty is fine"), Document::default());
    }

    #[test]
    fn pretty_json_round_trips() {
        let doc = sample();
        let raw = doc.to_json_pretty().expect("serializable");
        assert_eq!(Document::parse(&raw).expect("parses"), doc);
    }
}
