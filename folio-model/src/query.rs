//! Document lookup predicates.
//!
//! The access-control rule language is external; what reaches storage is a
//! small structural filter that any backend can evaluate against the
//! flattened JSON view of a document.

use crate::Document;
use folio_types::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structural filter over a document's flattened JSON view.
///
/// Paths are dot-separated (`author.id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Where {
    Equals { path: String, value: Value },
    NotEquals { path: String, value: Value },
    In { path: String, values: Vec<Value> },
    Exists { path: String, exists: bool },
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Combines two filters, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Where) -> Self {
        let mut clauses = Vec::new();
        for clause in [self, other] {
            match clause {
                Where::And(inner) => clauses.extend(inner),
                other => clauses.push(other),
            }
        }
        Where::And(clauses)
    }

    /// Evaluates the filter against a flattened document view.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Where::Equals { path, value } => lookup(doc, path) == Some(value),
            Where::NotEquals { path, value } => lookup(doc, path) != Some(value),
            Where::In { path, values } => {
                lookup(doc, path).is_some_and(|found| values.contains(found))
            }
            Where::Exists { path, exists } => {
                lookup(doc, path).is_some_and(|v| !v.is_null()) == *exists
            }
            Where::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Where::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Lookup of a single document by id, optionally narrowed by an access filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: DocumentId,
    pub filter: Option<Where>,
}

impl Query {
    pub fn by_id(id: DocumentId) -> Self {
        Self { id, filter: None }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Option<Where>) -> Self {
        self.filter = filter;
        self
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// True when `doc` has this query's id and satisfies its filter.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.id == self.id
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(&doc.to_json()))
    }
}
