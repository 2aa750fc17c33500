use crate::backup::RestoreStrategy;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub backups_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub client_dist: Option<PathBuf>,
    pub log_level: String,
    pub max_backups: usize,
    pub persist_backups: bool,
    pub restore_strategy: RestoreStrategy,
    pub backup_schedule: Option<String>,
    pub api_token: Option<String>,
    pub max_upload_bytes: usize,
    pub seed_services: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            port: 5000,
            db_path: data_dir.join("garage.db"),
            backups_dir: data_dir.join("backups"),
            upload_dir: data_dir.join("uploads"),
            data_dir,
            client_dist: None,
            log_level: "info".into(),
            max_backups: 5,
            persist_backups: true,
            restore_strategy: RestoreStrategy::Sequential,
            backup_schedule: None,
            api_token: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            seed_services: true,
        }
    }

    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let mut config = Self::with_data_dir(data_dir);

        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("BACKUPS_DIR") {
            config.backups_dir = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }
        config.client_dist = env_non_empty("CLIENT_DIST").map(PathBuf::from);
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(max) = env_parse::<usize>("MAX_BACKUPS") {
            // The archive just written must survive its own sweep.
            config.max_backups = max.max(1);
        }
        if let Some(persist) = env_flag("PERSIST_BACKUPS") {
            config.persist_backups = persist;
        }
        if let Ok(raw) = std::env::var("RESTORE_STRATEGY") {
            match raw.parse() {
                Ok(strategy) => config.restore_strategy = strategy,
                Err(e) => tracing::warn!("Ignoring RESTORE_STRATEGY: {}", e),
            }
        }
        config.backup_schedule = env_non_empty("BACKUP_SCHEDULE");
        config.api_token = env_non_empty("API_TOKEN");
        if let Some(limit) = env_parse("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit;
        }
        if let Some(seed) = env_flag("SEED_SERVICES") {
            config.seed_services = seed;
        }

        config
    }
}
