use serde::Serialize;

use crate::commands::CommandResult;
use fieldops_core::config::{AppConfig, LoadOptions};
use fieldops_db::connect_with_settings;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> CommandResult {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "ok",
                detail: format!("database url `{}`", config.database.url),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "failed",
                detail: error.to_string(),
            });
            None
        }
    };

    if let Some(config) = &config {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => {
                let outcome = runtime.block_on(async {
                    let pool = connect_with_settings(
                        &config.database.url,
                        config.database.max_connections,
                        config.database.timeout_secs,
                    )
                    .await?;
                    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await?;
                    pool.close().await;
                    Ok::<(), sqlx::Error>(())
                });

                checks.push(match outcome {
                    Ok(()) => DoctorCheck {
                        name: "database",
                        status: "ok",
                        detail: "connected and answered a probe query".to_string(),
                    },
                    Err(error) => DoctorCheck {
                        name: "database",
                        status: "failed",
                        detail: error.to_string(),
                    },
                });
            }
            Err(error) => checks.push(DoctorCheck {
                name: "database",
                status: "failed",
                detail: format!("failed to initialize async runtime: {error}"),
            }),
        }
    }

    let healthy = checks.iter().all(|check| check.status == "ok");
    let report = DoctorReport {
        command: "doctor",
        status: if healthy { "ok" } else { "error" },
        checks,
    };

    let output = if json {
        serde_json::to_string(&report).unwrap_or_else(|error| error.to_string())
    } else {
        let mut lines = vec![format!("doctor: {}", report.status)];
        for check in &report.checks {
            lines.push(format!("  {} [{}] {}", check.name, check.status, check.detail));
        }
        lines.join("\n")
    };

    CommandResult { exit_code: if healthy { 0 } else { 2 }, output }
}
