//! Process configuration.
//!
//! Defaults are overridden by `GATEHOUSE_*` environment variables:
//!
//! | variable                       | field                  |
//! |--------------------------------|------------------------|
//! | `GATEHOUSE_BIND_ADDR`          | `bind_addr`            |
//! | `GATEHOUSE_SESSION_TTL_SECS`   | `session_ttl_secs`     |
//! | `GATEHOUSE_OPERATION_TIMEOUT_MS` | `operation_timeout_ms` |
//! | `GATEHOUSE_ROLE_MANAGEMENT`    | `role_management`      |
//! | `GATEHOUSE_PROVIDERS`          | `enabled_providers` (comma separated) |
//! | `GATEHOUSE_PERMISSIONS`        | `permissions` (comma separated ids) |
//! | `GATEHOUSE_ADMIN_USER` / `GATEHOUSE_ADMIN_PASSWORD` | `bootstrap_admin` |

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_auth::{Permission, PermissionCatalog};
use gatehouse_core::{IamError, PermissionId};

use crate::controller::ControllerSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),

    #[error("permission catalog: {0}")]
    Catalog(#[from] IamError),
}

/// Extra permission registered on top of the built-in `admin` / `public`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PermissionSpec {
    fn into_permission(self) -> Result<Permission, IamError> {
        let id = PermissionId::parse(&self.id)?;
        let derived = Permission::derived(id);
        Ok(Permission {
            category: self.category.unwrap_or(derived.category),
            description: self.description.unwrap_or(derived.description),
            id: derived.id,
        })
    }
}

/// Principal created at startup and granted the admin role.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatehouseConfig {
    pub bind_addr: String,
    pub session_ttl_secs: u64,
    pub operation_timeout_ms: u64,
    pub role_management: bool,
    /// Empty enables every registered provider.
    pub enabled_providers: Vec<String>,
    pub permissions: Vec<PermissionSpec>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            session_ttl_secs: 30 * 60,
            operation_timeout_ms: 5_000,
            role_management: true,
            enabled_providers: Vec::new(),
            permissions: Vec::new(),
            bootstrap_admin: None,
        }
    }
}

impl GatehouseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`GatehouseConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("GATEHOUSE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("GATEHOUSE_SESSION_TTL_SECS") {
            config.session_ttl_secs = parse_positive("GATEHOUSE_SESSION_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("GATEHOUSE_OPERATION_TIMEOUT_MS") {
            config.operation_timeout_ms = parse_positive("GATEHOUSE_OPERATION_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("GATEHOUSE_ROLE_MANAGEMENT") {
            config.role_management = parse_bool("GATEHOUSE_ROLE_MANAGEMENT", &raw)?;
        }
        if let Some(raw) = lookup("GATEHOUSE_PROVIDERS") {
            config.enabled_providers = split_list(&raw);
        }
        if let Some(raw) = lookup("GATEHOUSE_PERMISSIONS") {
            config.permissions = split_list(&raw)
                .into_iter()
                .map(|id| PermissionSpec {
                    id,
                    category: None,
                    description: None,
                })
                .collect();
        }

        match (lookup("GATEHOUSE_ADMIN_USER"), lookup("GATEHOUSE_ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => {
                config.bootstrap_admin = Some(BootstrapAdmin { user, password });
            }
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("GATEHOUSE_ADMIN_USER", "GATEHOUSE_ADMIN_PASSWORD"));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("GATEHOUSE_ADMIN_PASSWORD", "GATEHOUSE_ADMIN_USER"));
            }
            (None, None) => {}
        }

        Ok(config)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let enabled_providers = if self.enabled_providers.is_empty() {
            None
        } else {
            Some(self.enabled_providers.iter().cloned().collect::<BTreeSet<_>>())
        };
        ControllerSettings {
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            role_management: self.role_management,
            enabled_providers,
        }
    }

    /// Built-in permissions plus the configured extras.
    pub fn permission_catalog(&self) -> Result<PermissionCatalog, ConfigError> {
        let extra = self
            .permissions
            .iter()
            .cloned()
            .map(PermissionSpec::into_permission)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PermissionCatalog::standard_with(extra)?)
    }
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = GatehouseConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GatehouseConfig::default());
        assert_eq!(config.controller_settings().enabled_providers, None);
        assert_eq!(config.permission_catalog().unwrap().len(), 2);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = GatehouseConfig::from_lookup(lookup(&[
            ("GATEHOUSE_BIND_ADDR", "127.0.0.1:9000"),
            ("GATEHOUSE_SESSION_TTL_SECS", "60"),
            ("GATEHOUSE_OPERATION_TIMEOUT_MS", "250"),
            ("GATEHOUSE_ROLE_MANAGEMENT", "off"),
            ("GATEHOUSE_PROVIDERS", "local, ldap,"),
            ("GATEHOUSE_PERMISSIONS", "DB_CONNECT,report.read"),
            ("GATEHOUSE_ADMIN_USER", "root"),
            ("GATEHOUSE_ADMIN_PASSWORD", "changeme"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.enabled_providers, vec!["local", "ldap"]);

        let settings = config.controller_settings();
        assert_eq!(settings.operation_timeout, Duration::from_millis(250));
        assert!(!settings.role_management);
        assert_eq!(settings.enabled_providers.unwrap().len(), 2);

        let catalog = config.permission_catalog().unwrap();
        assert_eq!(catalog.len(), 4);
        let report = catalog.get(&PermissionId::parse("report.read").unwrap()).unwrap();
        assert_eq!(report.category, "report");

        assert_eq!(config.bootstrap_admin.unwrap().user, "root");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_SESSION_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GATEHOUSE_SESSION_TTL_SECS", .. }));

        let err = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_OPERATION_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_ROLE_MANAGEMENT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_ADMIN_USER", "root")])).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete(..)));
    }

    #[test]
    fn duplicate_or_bad_permissions_fail_catalog() {
        let config = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_PERMISSIONS", "admin")])).unwrap();
        assert!(matches!(config.permission_catalog(), Err(ConfigError::Catalog(IamError::Conflict(_)))));

        let config = GatehouseConfig::from_lookup(lookup(&[("GATEHOUSE_PERMISSIONS", "no spaces")])).unwrap();
        assert!(matches!(config.permission_catalog(), Err(ConfigError::Catalog(IamError::Validation(_)))));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: GatehouseConfig = serde_json::from_str(
            r#"{"session_ttl_secs": 10, "permissions": [{"id": "DB_CONNECT", "description": "Connect"}]}"#,
        )
        .unwrap();
        assert_eq!(config.session_ttl_secs, 10);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        let catalog = config.permission_catalog().unwrap();
        let db = catalog.get(&PermissionId::parse("DB_CONNECT").unwrap()).unwrap();
        assert_eq!(db.description, "Connect");
        assert_eq!(db.category, "general");
    }
}
