use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::attendance::policy::AttendancePolicy;
use crate::error::AppError;
use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,

    pub sheet_id: String,
    pub credentials_path: PathBuf,

    pub lock_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: tracing::Level,

    // Attendance policy
    pub policy: AttendancePolicy,

    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };

        let missing: Vec<&str> = ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASSWORD", "SHEET_ID"]
            .into_iter()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let policy = AttendancePolicy {
            signin_allowed: parse_time(&get, "SIGNIN_ALLOWED_TIME", "06:00")?,
            late_signin: parse_time(&get, "LATE_SIGNIN_TIME", "08:30")?,
            cutoff: parse_time(&get, "CUTOFF_TIME", "16:00")?,
            cooldown: Duration::from_secs(parse_num(&get, "COOLDOWN_SECONDS", 18)?),
        };
        if policy.signin_allowed > policy.cutoff {
            return Err(AppError::Config(
                "SIGNIN_ALLOWED_TIME must not be after CUTOFF_TIME".to_string(),
            ));
        }

        let retry = RetryPolicy {
            max_attempts: parse_num(&get, "RETRY_MAX_ATTEMPTS", 5)?,
            ..RetryPolicy::default()
        };

        let log_level = match get("LOG_LEVEL") {
            Some(v) => v
                .parse::<tracing::Level>()
                .map_err(|_| AppError::Config(format!("LOG_LEVEL has invalid value '{v}'")))?,
            None => tracing::Level::INFO,
        };

        Ok(Self {
            db_host: required("DB_HOST")?,
            db_port: parse_num(&get, "DB_PORT", 3306)?,
            db_name: required("DB_NAME")?,
            db_user: required("DB_USER")?,
            db_password: required("DB_PASSWORD")?,
            sheet_id: required("SHEET_ID")?,
            credentials_path: get("GOOGLE_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
            lock_file: get("LOCK_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("attendance_script.lock")),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            log_level,
            policy,
            retry,
        })
    }
}

fn parse_time<F>(get: &F, key: &str, default: &str) -> Result<NaiveTime, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| AppError::Config(format!("{key} must be HH:MM, got '{raw}'")))
}

fn parse_num<F, T>(get: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}
