use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

use super::settings::{BlacklistSettings, Settings, SettingsError};

/// Parsed IP blacklist. IPv4-mapped IPv6 peers are matched against the IPv4 list.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    addresses: HashSet<IpAddr>,
}

impl Blacklist {
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.addresses.contains(&ip.to_canonical())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

pub fn parse_blacklist(settings: &BlacklistSettings) -> Result<Blacklist, SettingsError> {
    let mut addresses = HashSet::new();
    for entry in &settings.ipv4 {
        let ip: Ipv4Addr = entry
            .trim()
            .parse()
            .map_err(|_| SettingsError::Invalid(format!("blacklist.ipv4: `{}` is not an IPv4 address", entry)))?;
        addresses.insert(IpAddr::V4(ip));
    }
    for entry in &settings.ipv6 {
        let ip: Ipv6Addr = entry
            .trim()
            .parse()
            .map_err(|_| SettingsError::Invalid(format!("blacklist.ipv6: `{}` is not an IPv6 address", entry)))?;
        addresses.insert(IpAddr::V6(ip).to_canonical());
    }
    Ok(Blacklist { addresses })
}

pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    settings.network_config()?;

    if settings.port == 0 {
        return Err(SettingsError::Invalid("port must be non-zero".to_string()));
    }

    let endpoint = Url::parse(&settings.endpoint)
        .map_err(|e| SettingsError::Invalid(format!("endpoint `{}`: {}", settings.endpoint, e)))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(SettingsError::Invalid(format!(
            "endpoint must be http(s), got `{}`",
            endpoint.scheme()
        )));
    }

    if settings.engine.trim().is_empty() {
        return Err(SettingsError::Invalid("engine account id is empty".to_string()));
    }

    validate_database_url(&settings.database)?;
    parse_blacklist(&settings.blacklist)?;

    let indexer = &settings.indexer;
    if indexer.poll_interval_ms == 0 || indexer.call_timeout_ms == 0 || indexer.persist_timeout_ms == 0 {
        return Err(SettingsError::Invalid(
            "indexer poll interval, call timeout and persist timeout must be non-zero".to_string(),
        ));
    }
    if indexer.initial_backoff_ms == 0 || indexer.initial_backoff_ms > indexer.max_backoff_ms {
        return Err(SettingsError::Invalid(format!(
            "indexer backoff must satisfy 0 < initial ({}) <= max ({})",
            indexer.initial_backoff_ms, indexer.max_backoff_ms
        )));
    }
    if indexer.max_persist_attempts == 0 {
        return Err(SettingsError::Invalid(
            "indexer.max_persist_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_database_url(database: &str) -> Result<(), SettingsError> {
    let url = Url::parse(database)
        .map_err(|e| SettingsError::Invalid(format!("database URL: {}", e)))?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(SettingsError::Invalid(format!(
            "database URL must use postgres://, got `{}://`",
            other
        ))),
    }
}
