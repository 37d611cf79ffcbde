use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::warn;

use super::model::{AccessPolicy, UserRule};

/// Compiled access-table patterns, keyed by source. Invalid patterns cache as `None`.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Option<Regex>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

const REGEX_CACHE_MAX: usize = 4_096;

fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(hit) = REGEX_CACHE.read().get(pattern) {
        return hit.clone();
    }
    let re = match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(target: "policy", pattern, "ignoring invalid access table regex: {}", e);
            None
        }
    };
    let mut cache = REGEX_CACHE.write();
    if cache.len() >= REGEX_CACHE_MAX { cache.clear(); }
    cache.insert(pattern.to_string(), re.clone());
    re
}

impl AccessPolicy {
    fn user_rule(&self, identity: Option<&str>) -> Option<&UserRule> {
        let id = identity?;
        self.users.iter().find(|u| u.email == id)
    }

    pub fn can_upload(&self, identity: Option<&str>) -> bool {
        self.user_rule(identity).map(|u| u.upload).unwrap_or(self.upload)
    }

    pub fn can_delete(&self, identity: Option<&str>) -> bool {
        self.user_rule(identity).map(|u| u.delete).unwrap_or(self.delete)
    }

    pub fn can_mkdir(&self, identity: Option<&str>) -> bool {
        self.user_rule(identity).map(|u| u.mkdir).unwrap_or(self.mkdir)
    }

    /// First matching access table decides; unmatched names are visible.
    pub fn is_visible(&self, filename: &str) -> bool {
        for table in &self.access_tables {
            let Some(re) = compiled(&table.regex) else { continue; };
            if re.is_match(filename) {
                return table.allow;
            }
        }
        true
    }

    /// Copy of this policy with the top-level flags already decided for `identity`.
    pub fn decided_for(&self, identity: Option<&str>) -> AccessPolicy {
        AccessPolicy {
            upload: self.can_upload(identity),
            delete: self.can_delete(identity),
            mkdir: self.can_mkdir(identity),
            ..self.clone()
        }
    }
}
