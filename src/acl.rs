//! Access control resolution.
//!
//! Maps a user id to the set of (database, schema) pairs that user may
//! query. The table is read-only within a request; this deployment ships
//! a static in-memory table, but the [`AclResolver`] trait lets a real
//! policy store stand in without touching callers.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One authorized (database, schema) pair for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Database name.
    pub db: String,
    /// Schema name within the database.
    pub schema: String,
}

impl AclEntry {
    pub fn new(db: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            schema: schema.into(),
        }
    }
}

/// Pluggable lookup from user id to authorized (database, schema) pairs.
///
/// Absence of entries means zero access: an unknown user resolves to an
/// empty list, never an error.
pub trait AclResolver: Send + Sync {
    /// Entries the user may query, in provisioning order.
    fn resolve(&self, user_id: &str) -> Vec<AclEntry>;
}

/// Built-in sample table used when no ACL configuration is provided.
static SAMPLE_ACL: Lazy<HashMap<String, Vec<AclEntry>>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "sudipta".to_string(),
        vec![
            AclEntry::new("sample_data_dev", "tpcds"),
            AclEntry::new("sample_data_prod", "public"),
        ],
    );
    table.insert(
        "syed".to_string(),
        vec![
            AclEntry::new("sample_data_dev", "tpcds"),
            AclEntry::new("analytics", "reports"),
        ],
    );
    table
});

/// [`AclResolver`] over a read-only in-memory table.
pub struct StaticAclResolver {
    entries: HashMap<String, Vec<AclEntry>>,
}

impl StaticAclResolver {
    /// Build a resolver over an externally provisioned table.
    pub fn new(entries: HashMap<String, Vec<AclEntry>>) -> Self {
        Self { entries }
    }

    /// Resolver over the built-in sample table.
    pub fn sample() -> Self {
        Self::new(SAMPLE_ACL.clone())
    }
}

impl AclResolver for StaticAclResolver {
    fn resolve(&self, user_id: &str) -> Vec<AclEntry> {
        self.entries.get(user_id).cloned().unwrap_or_default()
    }
}
