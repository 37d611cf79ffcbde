//!
//! dirserve configuration
//! ----------------------
//! Settings come from four layers, lowest precedence first: built-in defaults, an optional
//! JSON config file (`--conf PATH`), `DIRSERVE_*` environment variables, then CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::index::RefreshSchedule;
use crate::policy::AccessPolicy;

pub const USAGE: &str = "dirserve\n\nUSAGE:\n  dirserve [OPTIONS]\n\nOPTIONS:\n  --conf PATH              JSON config file\n  -r, --root PATH          Served root directory (env: DIRSERVE_ROOT, default ./)\n  -a, --addr ADDR          Listen address or bare port (env: DIRSERVE_ADDR, default 0.0.0.0:8000)\n  --upload                 Allow uploads by default (env: DIRSERVE_UPLOAD)\n  --delete                 Allow deletes by default (env: DIRSERVE_DELETE)\n  --mkdir                  Allow mkdir by default (env: DIRSERVE_MKDIR)\n  --auth-http USER:PASS    Require HTTP basic auth (env: DIRSERVE_AUTH_HTTP)\n  --identity-header NAME   Trusted header carrying the caller identity (env: DIRSERVE_IDENTITY_HEADER)\n  --cors                   Enable permissive CORS (env: DIRSERVE_CORS)\n  --title TEXT             Server title (env: DIRSERVE_TITLE)\n  --index-interval SECS    Seconds between index rebuilds (env: DIRSERVE_INDEX_INTERVAL, default 600)\n  --index-warmup SECS      Delay before the first rebuild (env: DIRSERVE_INDEX_WARMUP, default 1)\n  --debug                  Log the effective configuration at startup (env: DIRSERVE_DEBUG)\n  -h, --help               Print this help\n";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub root: String,
    pub addr: String,
    pub upload: bool,
    pub delete: bool,
    pub mkdir: bool,
    /// "user:pass" for HTTP basic auth; empty disables it.
    pub auth_http: Option<String>,
    pub identity_header: Option<String>,
    pub cors: bool,
    pub title: String,
    pub debug: bool,
    pub index_warmup_secs: u64,
    pub index_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: "./".to_string(),
            addr: "0.0.0.0:8000".to_string(),
            upload: false,
            delete: false,
            mkdir: false,
            auth_http: None,
            identity_header: None,
            cors: false,
            title: "Dirserve File Server".to_string(),
            debug: false,
            index_warmup_secs: 1,
            index_interval_secs: 600,
        }
    }
}

impl ServerConfig {
    /// Load from the process arguments and environment.
    pub fn from_env_and_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_sources(args, |k| std::env::var(k).ok())
    }

    /// Layer defaults, config file, `env` lookups and `args` (first element is the program name).
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let args = args.get(1..).unwrap_or(&[]);
        let conf_path = flag_value(args, &["--conf"])?.or_else(|| env("DIRSERVE_CONF"));
        let mut cfg = match conf_path {
            Some(p) => Self::from_file(PathBuf::from(p))?,
            None => Self::default(),
        };
        cfg.apply_env(&env)?;
        cfg.apply_args(args)?;
        cfg.addr = normalize_addr(&cfg.addr);
        Ok(cfg)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse { path, source })
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = env("DIRSERVE_ROOT") { self.root = v; }
        if let Some(v) = env("DIRSERVE_ADDR") { self.addr = v; }
        if let Some(v) = env("DIRSERVE_AUTH_HTTP") { self.auth_http = Some(v); }
        if let Some(v) = env("DIRSERVE_IDENTITY_HEADER") { self.identity_header = Some(v); }
        if let Some(v) = env("DIRSERVE_TITLE") { self.title = v; }
        for (name, slot) in [
            ("DIRSERVE_UPLOAD", &mut self.upload),
            ("DIRSERVE_DELETE", &mut self.delete),
            ("DIRSERVE_MKDIR", &mut self.mkdir),
            ("DIRSERVE_CORS", &mut self.cors),
            ("DIRSERVE_DEBUG", &mut self.debug),
        ] {
            if let Some(v) = env(name) { *slot = parse_bool(name, &v)?; }
        }
        if let Some(v) = env("DIRSERVE_INDEX_INTERVAL") { self.index_interval_secs = parse_secs("DIRSERVE_INDEX_INTERVAL", &v)?; }
        if let Some(v) = env("DIRSERVE_INDEX_WARMUP") { self.index_warmup_secs = parse_secs("DIRSERVE_INDEX_WARMUP", &v)?; }
        Ok(())
    }

    fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(v) = flag_value(args, &["--root", "-r"])? { self.root = v; }
        if let Some(v) = flag_value(args, &["--addr", "-a"])? { self.addr = v; }
        if let Some(v) = flag_value(args, &["--auth-http"])? { self.auth_http = Some(v); }
        if let Some(v) = flag_value(args, &["--identity-header"])? { self.identity_header = Some(v); }
        if let Some(v) = flag_value(args, &["--title"])? { self.title = v; }
        if let Some(v) = flag_value(args, &["--index-interval"])? { self.index_interval_secs = parse_secs("--index-interval", &v)?; }
        if let Some(v) = flag_value(args, &["--index-warmup"])? { self.index_warmup_secs = parse_secs("--index-warmup", &v)?; }
        if has_flag(args, "--upload") { self.upload = true; }
        if has_flag(args, "--delete") { self.delete = true; }
        if has_flag(args, "--mkdir") { self.mkdir = true; }
        if has_flag(args, "--cors") { self.cors = true; }
        if has_flag(args, "--debug") { self.debug = true; }
        Ok(())
    }

    pub fn default_policy(&self) -> AccessPolicy {
        AccessPolicy::with_defaults(self.upload, self.delete, self.mkdir)
    }

    pub fn refresh_schedule(&self) -> RefreshSchedule {
        RefreshSchedule {
            warmup: Duration::from_secs(self.index_warmup_secs),
            interval: Duration::from_secs(self.index_interval_secs.max(1)),
        }
    }

    /// Basic-auth credentials split into (user, pass); `None` when unset or malformed.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        let raw = self.auth_http.as_deref()?.trim();
        let (user, pass) = raw.split_once(':')?;
        if user.is_empty() { return None; }
        Some((user.to_string(), pass.to_string()))
    }
}

pub fn wants_help(args: &[String]) -> bool {
    has_flag(args, "--help") || has_flag(args, "-h")
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value(args: &[String], names: &[&str]) -> Result<Option<String>, ConfigError> {
    let mut i = 0;
    while i < args.len() {
        if names.contains(&args[i].as_str()) {
            return match args.get(i + 1) {
                Some(v) => Ok(Some(v.clone())),
                None => Err(ConfigError::MissingValue { flag: args[i].clone() }),
            };
        }
        if let Some((k, v)) = args[i].split_once('=') {
            if names.contains(&k) { return Ok(Some(v.to_string())); }
        }
        i += 1;
    }
    Ok(None)
}

fn parse_bool(name: &str, v: &str) -> Result<bool, ConfigError> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name: name.to_string(), value: v.to_string() }),
    }
}

fn parse_secs(name: &str, v: &str) -> Result<u64, ConfigError> {
    v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue { name: name.to_string(), value: v.to_string() })
}

/// Accept a bare port ("8000") or ":8000" and turn it into a bindable address.
fn normalize_addr(addr: &str) -> String {
    let a = addr.trim();
    if let Some(port) = a.strip_prefix(':') { return format!("0.0.0.0:{}", port); }
    if !a.contains(':') { return format!("0.0.0.0:{}", a); }
    a.to_string()
}
