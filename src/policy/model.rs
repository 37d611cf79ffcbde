use serde::{Deserialize, Serialize};

/// Per-identity override of the three mutation flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserRule {
    #[serde(alias = "identity")]
    pub email: String,
    #[serde(default)]
    pub upload: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub mkdir: bool,
}

/// Filename visibility rule; `regex` is searched (not anchored) in the file name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTable {
    pub regex: String,
    pub allow: bool,
}

/// Effective access policy for one directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub upload: bool,
    pub delete: bool,
    pub mkdir: bool,
    #[serde(default)]
    pub users: Vec<UserRule>,
    #[serde(default)]
    pub access_tables: Vec<AccessTable>,
}

/// One on-disk policy file. Every field is optional: an absent field inherits, a present one
/// overrides, so `false` and "not mentioned" stay distinguishable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mkdir: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tables: Option<Vec<AccessTable>>,
}

impl PolicyFragment {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Fragment written into directories created through the mkdir endpoint.
    pub fn for_new_directory() -> Self {
        Self { upload: Some(true), delete: Some(true), mkdir: Some(false), users: None, access_tables: None }
    }
}

impl AccessPolicy {
    /// Root policy from process configuration: flags only, no users, no access tables.
    pub fn with_defaults(upload: bool, delete: bool, mkdir: bool) -> Self {
        Self { upload, delete, mkdir, users: Vec::new(), access_tables: Vec::new() }
    }

    /// Overlay a fragment onto this (inherited) policy.
    /// Scalars overwrite when present; `users` and `access_tables` are replaced wholesale.
    pub fn apply(&mut self, frag: &PolicyFragment) {
        if let Some(v) = frag.upload { self.upload = v; }
        if let Some(v) = frag.delete { self.delete = v; }
        if let Some(v) = frag.mkdir { self.mkdir = v; }
        if let Some(users) = &frag.users { self.users = users.clone(); }
        if let Some(tables) = &frag.access_tables { self.access_tables = tables.clone(); }
    }

    pub fn overlaid(mut self, frag: &PolicyFragment) -> Self {
        self.apply(frag);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_parse_as_none() {
        let f = PolicyFragment::parse(br#"{"delete": true}"#).unwrap();
        assert_eq!(f.delete, Some(true));
        assert_eq!(f.upload, None);
        assert_eq!(f.mkdir, None);
        assert!(f.users.is_none());
        assert!(f.access_tables.is_none());
    }

    #[test]
    fn parses_users_and_access_tables() {
        let f = PolicyFragment::parse(br#"{
            "upload": false,
            "users": [{"email": "a@x.com", "upload": true}, {"identity": "b@x.com", "delete": true}],
            "accessTables": [{"regex": "\\.log$", "allow": false}]
        }"#).unwrap();
        let users = f.users.unwrap();
        assert_eq!(users[0], UserRule { email: "a@x.com".into(), upload: true, delete: false, mkdir: false });
        assert_eq!(users[1].email, "b@x.com");
        assert!(users[1].delete);
        assert_eq!(f.access_tables.unwrap()[0].regex, "\\.log$");
    }

    #[test]
    fn apply_overrides_present_fields_only() {
        let parent = AccessPolicy {
            upload: true,
            delete: false,
            mkdir: true,
            users: vec![UserRule { email: "p@x.com".into(), upload: true, ..Default::default() }],
            access_tables: vec![AccessTable { regex: "^\\.".into(), allow: false }],
        };
        let eff = parent.clone().overlaid(&PolicyFragment { delete: Some(true), ..Default::default() });
        assert!(eff.upload);
        assert!(eff.delete);
        assert!(eff.mkdir);
        assert_eq!(eff.users, parent.users);
        assert_eq!(eff.access_tables, parent.access_tables);
    }

    #[test]
    fn lists_are_replaced_not_merged() {
        let parent = AccessPolicy {
            users: vec![UserRule { email: "p@x.com".into(), ..Default::default() }],
            ..AccessPolicy::with_defaults(false, false, false)
        };
        let eff = parent.overlaid(&PolicyFragment { users: Some(vec![]), ..Default::default() });
        assert!(eff.users.is_empty());
    }

    #[test]
    fn serializes_with_camel_case_tables() {
        let p = AccessPolicy::with_defaults(true, false, false);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["upload"], true);
        assert!(v.get("accessTables").is_some());
    }
}
