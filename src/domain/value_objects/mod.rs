use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Validated recipient selection. Exactly one selector family is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSpec {
    Emails(Vec<String>),
    SubscriberIds(Vec<i64>),
    ListIds(Vec<i64>),
    ListNames(Vec<String>),
}

impl RecipientSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            RecipientSpec::Emails(_) => "subscriber_emails",
            RecipientSpec::SubscriberIds(_) => "subscriber_ids",
            RecipientSpec::ListIds(_) => "list_ids",
            RecipientSpec::ListNames(_) => "list_names",
        }
    }
}

/// A user-supplied header set, as received on the wire.
pub type HeaderSet = BTreeMap<String, String>;

/// Ordered MIME header multimap. Keys are stored in canonical form
/// (`x-tx-id` becomes `X-Tx-Id`) and repeated keys keep every value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageHeaders(Vec<(String, String)>);

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges header sets by addition; a key present in several sets ends
    /// up with several values.
    pub fn from_sets(sets: &[HeaderSet]) -> Self {
        let mut headers = Self::new();
        for set in sets {
            for (key, value) in set {
                headers.add(key, value.clone());
            }
        }
        headers
    }

    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.0.push((canonical_key(key), value.into()));
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        self.0.retain(|(k, _)| *k != key);
        self.0.push((key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonical_key(key);
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        let key = canonical_key(key);
        self.0
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn canonical_key(key: &str) -> String {
    key.trim()
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
