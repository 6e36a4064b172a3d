use serde_json::json;

use fieldops_core::config::{AppConfig, LoadOptions, LogFormat};

/// Render the effective configuration as JSON, after file, environment,
/// and default resolution.
pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let format = match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            };
            let payload = json!({
                "command": "config",
                "status": "ok",
                "config": {
                    "database": {
                        "url": config.database.url,
                        "max_connections": config.database.max_connections,
                        "timeout_secs": config.database.timeout_secs,
                    },
                    "server": {
                        "bind_address": config.server.bind_address,
                        "port": config.server.port,
                        "graceful_shutdown_secs": config.server.graceful_shutdown_secs,
                    },
                    "pagination": {
                        "default_limit": config.pagination.default_limit,
                        "max_limit": config.pagination.max_limit,
                    },
                    "logging": {
                        "level": config.logging.level,
                        "format": format,
                    },
                },
            });
            serde_json::to_string_pretty(&payload).unwrap_or_else(|error| error.to_string())
        }
        Err(error) => json!({
            "command": "config",
            "status": "error",
            "error_class": "config_validation",
            "message": error.to_string(),
        })
        .to_string(),
    }
}
