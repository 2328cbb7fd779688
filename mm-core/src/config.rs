//! Runtime configuration, loaded exclusively from environment variables.
//! No TOML, no CLI flags: environment variables are the only configuration
//! surface.

use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub maker_api_key: String,
    pub maker_api_secret: String,
    pub reference_api_key: String,
    pub reference_api_secret: String,
    pub reference_api_passphrase: String,
    /// Connection fields for a SQL-backed `Recorder`. The SQL recorder
    /// itself is an external collaborator this crate does not implement
    /// (the binary always runs the file-backed `JournalRecorder`), so these
    /// are read-and-carried for whoever wires that collaborator in, not
    /// required at startup.
    pub db_host: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: String,
    pub db_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub metrics_addr: String,
}

impl Config {
    /// Load and validate configuration from the process environment.
    /// Accumulates every missing/invalid variable into a single error rather
    /// than failing on the first one, so a misconfigured deployment can be
    /// fixed in one pass.
    pub fn from_env() -> Result<Self> {
        let mut problems = Vec::new();
        let required = |name: &str, problems: &mut Vec<String>| -> String {
            match std::env::var(name) {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => {
                    problems.push(format!("{name} is set but empty"));
                    String::new()
                }
                Err(_) => {
                    problems.push(format!("{name} is not set"));
                    String::new()
                }
            }
        };

        let maker_api_key = required("MAKER_API_KEY", &mut problems);
        let maker_api_secret = required("MAKER_API_SECRET", &mut problems);
        let reference_api_key = required("REFERENCE_API_KEY", &mut problems);
        let reference_api_secret = required("REFERENCE_API_SECRET", &mut problems);
        let reference_api_passphrase = required("REFERENCE_API_PASSPHRASE", &mut problems);

        // Not validated: nothing in this crate opens a SQL connection, so
        // there is no dial attempt these would need to succeed for.
        let db_host = std::env::var("DB_HOST").ok();
        let db_user = std::env::var("DB_USER").ok();
        let db_password = std::env::var("DB_PASSWORD").ok();

        let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "market_maker".to_string());
        let db_port: u16 = std::env::var("DB_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5432);
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = std::env::var("LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let metrics_addr =
            std::env::var("METRICS_ADDR").unwrap_or_else(|_| "127.0.0.1:9090".to_string());

        if !problems.is_empty() {
            bail!("invalid configuration: {}", problems.join("; "));
        }

        Ok(Self {
            maker_api_key,
            maker_api_secret,
            reference_api_key,
            reference_api_secret,
            reference_api_passphrase,
            db_host,
            db_user,
            db_password,
            db_name,
            db_port,
            log_level,
            log_json,
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "MAKER_API_KEY",
            "MAKER_API_SECRET",
            "REFERENCE_API_KEY",
            "REFERENCE_API_SECRET",
            "REFERENCE_API_PASSPHRASE",
            "DB_HOST",
            "DB_USER",
            "DB_PASSWORD",
            "DB_NAME",
            "DB_PORT",
            "LOG_LEVEL",
            "LOG_JSON",
            "METRICS_ADDR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_vars_reports_all_problems() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = Config::from_env().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("MAKER_API_KEY"));
        assert!(msg.contains("REFERENCE_API_PASSPHRASE"));
    }

    #[test]
    fn complete_env_loads_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("MAKER_API_KEY", "k");
        std::env::set_var("MAKER_API_SECRET", "s");
        std::env::set_var("REFERENCE_API_KEY", "k2");
        std::env::set_var("REFERENCE_API_SECRET", "s2");
        std::env::set_var("REFERENCE_API_PASSPHRASE", "p");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.db_host, None);
        assert_eq!(cfg.db_user, None);
        assert_eq!(cfg.db_password, None);
        assert_eq!(cfg.db_name, "market_maker");
        assert_eq!(cfg.db_port, 5432);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
        clear_all();
    }

    #[test]
    fn db_vars_are_carried_through_when_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("MAKER_API_KEY", "k");
        std::env::set_var("MAKER_API_SECRET", "s");
        std::env::set_var("REFERENCE_API_KEY", "k2");
        std::env::set_var("REFERENCE_API_SECRET", "s2");
        std::env::set_var("REFERENCE_API_PASSPHRASE", "p");
        std::env::set_var("DB_HOST", "localhost");
        std::env::set_var("DB_USER", "u");
        std::env::set_var("DB_PASSWORD", "pw");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.db_host.as_deref(), Some("localhost"));
        assert_eq!(cfg.db_user.as_deref(), Some("u"));
        assert_eq!(cfg.db_password.as_deref(), Some("pw"));
        clear_all();
    }
}
