use serde::{Deserialize, Serialize};

pub mod ids;
pub mod time;

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order (after DB connection): CLI > ENV > DB, then persist back to DB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Stored as a hash (not plaintext).
    pub admin_key_hash: String,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
    /// Database DSN used for this process.
    pub dsn: String,
    /// Whether to redact sensitive fields in emitted events.
    pub event_redact_sensitive: bool,
    /// Disables the per-credential FIFO lock (§4.3); useful when upstream
    /// concurrency is already bounded elsewhere and the extra hop isn't
    /// wanted.
    pub disable_credential_lock: bool,
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub admin_key_hash: Option<String>,
    pub proxy: Option<String>,
    pub dsn: Option<String>,
    pub event_redact_sensitive: Option<bool>,
    pub disable_credential_lock: Option<bool>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.admin_key_hash.is_some() {
            self.admin_key_hash = other.admin_key_hash;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.event_redact_sensitive.is_some() {
            self.event_redact_sensitive = other.event_redact_sensitive;
        }
        if other.disable_credential_lock.is_some() {
            self.disable_credential_lock = other.disable_credential_lock;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8787),
            admin_key_hash: self
                .admin_key_hash
                .ok_or(GlobalConfigError::MissingField("admin_key_hash"))?,
            proxy: self.proxy,
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            event_redact_sensitive: self.event_redact_sensitive.unwrap_or(true),
            disable_credential_lock: self.disable_credential_lock.unwrap_or(false),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            admin_key_hash: Some(value.admin_key_hash),
            proxy: value.proxy,
            dsn: Some(value.dsn),
            event_redact_sensitive: Some(value.event_redact_sensitive),
            disable_credential_lock: Some(value.disable_credential_lock),
        }
    }
}

/// Per-key quota ceilings (§ API key data model). `None`/zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaCeilings {
    pub daily_request_ceiling: Option<i64>,
    pub monthly_request_ceiling: Option<i64>,
    pub lifetime_request_ceiling: Option<i64>,
    pub daily_cost_ceiling: Option<f64>,
    pub monthly_cost_ceiling: Option<f64>,
    pub lifetime_cost_ceiling: Option<f64>,
    pub per_minute_ceiling: Option<i64>,
    pub per_ip_concurrency_ceiling: Option<i64>,
    pub validity_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_later_values() {
        let mut base = GlobalConfigPatch {
            host: Some("127.0.0.1".to_string()),
            port: Some(8787),
            ..Default::default()
        };
        base.overlay(GlobalConfigPatch {
            port: Some(9090),
            ..Default::default()
        });
        assert_eq!(base.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(base.port, Some(9090));
    }

    #[test]
    fn into_config_requires_admin_key_and_dsn() {
        let patch = GlobalConfigPatch::default();
        assert!(matches!(
            patch.into_config(),
            Err(GlobalConfigError::MissingField("admin_key_hash"))
        ));
    }
}
