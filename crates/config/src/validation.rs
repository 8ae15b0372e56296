//! Configuration validation
//!
//! Catches misconfiguration at startup instead of at the first flush or the
//! first reconnect. Only structural checks live here; reachability is the
//! components' problem.

use crate::{Config, ConfigError, Result};

/// Validate the full configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_gateway(config)?;
    validate_process(config)?;
    validate_export(config)?;
    Ok(())
}

fn validate_gateway(config: &Config) -> Result<()> {
    let gw = &config.gateway;

    if !gw.base_url.is_empty() && !gw.base_url.starts_with("http") {
        return Err(ConfigError::invalid_value(
            "gateway",
            "base_url",
            "must start with http:// or https://",
        ));
    }
    if !gw.wss_url.is_empty() && !gw.wss_url.starts_with("ws") {
        return Err(ConfigError::invalid_value(
            "gateway",
            "wss_url",
            "must start with ws:// or wss://",
        ));
    }
    if gw.timeout_secs == 0 {
        return Err(ConfigError::invalid_value(
            "gateway",
            "timeout_secs",
            "must be non-zero",
        ));
    }
    Ok(())
}

fn validate_process(config: &Config) -> Result<()> {
    let p = &config.process;

    for (field, value) in [
        ("raw_buffer_size", p.raw_buffer_size),
        ("parsed_buffer_size", p.parsed_buffer_size),
        ("dead_buffer_size", p.dead_buffer_size),
        ("parser_workers", p.parser_workers),
        ("db_workers", p.db_workers),
        ("batch_size", p.batch_size),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid_value(
                "process",
                field,
                "must be non-zero",
            ));
        }
    }
    if p.flush_delay_ms == 0 {
        return Err(ConfigError::invalid_value(
            "process",
            "flush_delay_ms",
            "must be non-zero",
        ));
    }
    Ok(())
}

fn validate_export(config: &Config) -> Result<()> {
    let e = &config.export;

    if e.path.is_empty() {
        return Err(ConfigError::missing_field("export", "path"));
    }
    if e.interval_minutes == 0 {
        return Err(ConfigError::invalid_value(
            "export",
            "interval_minutes",
            "must be non-zero",
        ));
    }
    Ok(())
}
