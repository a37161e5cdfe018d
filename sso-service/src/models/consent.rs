//! Consent model - scopes a user has granted to a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub user_id: Uuid,
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    pub created_utc: DateTime<Utc>,
}

impl Consent {
    pub fn new(user_id: Uuid, client_id: &str, scopes: &[String]) -> Self {
        Self {
            user_id,
            client_id: client_id.to_string(),
            scopes: scopes.iter().cloned().collect(),
            created_utc: Utc::now(),
        }
    }

    /// Set inclusion: a previously granted superset satisfies a narrower request.
    pub fn covers(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Re-granting adds to what was already granted.
    pub fn merge(&mut self, scopes: &[String]) {
        self.scopes.extend(scopes.iter().cloned());
    }
}

/// Splits a space-delimited scope parameter, dropping duplicates and empties.
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope
        .split_whitespace()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Canonical space-delimited form (sorted, deduplicated).
pub fn join_scopes(scopes: &[String]) -> String {
    scopes
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ")
}
