use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tenancy: TenancyConfig,
    pub sheets: SheetsConfig,
    pub cache: CacheConfig,
    pub sessions: SessionsConfig,
    pub transcription: TranscriptionConfig,
    pub email: EmailConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Static tenancy wiring: which tenant answers which number and which
/// remote sheet backs which tenant. Injected, never process-global.
#[derive(Clone, Debug)]
pub struct TenancyConfig {
    pub default_tenant: String,
    /// Dialed number -> tenant id, exact match.
    pub phone_numbers: BTreeMap<String, String>,
    /// Tenant id -> remote spreadsheet id.
    pub sheets: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    /// Directory holding the local CSV fallback tables.
    pub fallback_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

#[derive(Clone, Debug)]
pub struct TranscriptionConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub summary_model: String,
    pub timeout_secs: u64,
    /// Optional basic-auth pair for fetching recordings from the voice provider.
    pub recording_auth_sid: Option<String>,
    pub recording_auth_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub from_address: String,
    /// Reports land here when the transport is unconfigured or failing.
    pub fallback_path: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub default_tenant: Option<String>,
    pub log_level: Option<String>,
    pub sheets_api_key: Option<String>,
    pub sheets_fallback_dir: Option<PathBuf>,
    pub transcription_api_key: Option<String>,
    pub email_api_key: Option<String>,
    pub email_fallback_path: Option<PathBuf>,
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            tenancy: TenancyConfig {
                default_tenant: "cannonhill".to_string(),
                phone_numbers: BTreeMap::new(),
                sheets: BTreeMap::new(),
            },
            sheets: SheetsConfig {
                base_url: "https://sheets.googleapis.com/v4".to_string(),
                api_key: None,
                timeout_secs: 10,
                fallback_dir: PathBuf::from("sheet_templates"),
            },
            cache: CacheConfig { ttl_secs: 180, capacity: 100 },
            sessions: SessionsConfig { ttl_secs: 3600, capacity: 1000 },
            transcription: TranscriptionConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "whisper-1".to_string(),
                summary_model: "gpt-4o-mini".to_string(),
                timeout_secs: 60,
                recording_auth_sid: None,
                recording_auth_token: None,
            },
            email: EmailConfig {
                api_key: None,
                base_url: "https://api.sendgrid.com".to_string(),
                from_address: "noreply@ringline.example".to_string(),
                fallback_path: PathBuf::from("reports.log"),
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ringline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(tenancy) = patch.tenancy {
            if let Some(default_tenant) = tenancy.default_tenant {
                self.tenancy.default_tenant = default_tenant;
            }
            if let Some(phone_numbers) = tenancy.phone_numbers {
                self.tenancy.phone_numbers = phone_numbers;
            }
            if let Some(sheets) = tenancy.sheets {
                self.tenancy.sheets = sheets;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(base_url) = sheets.base_url {
                self.sheets.base_url = base_url;
            }
            if let Some(api_key) = sheets.api_key {
                self.sheets.api_key = Some(secret_value(api_key));
            }
            if let Some(timeout_secs) = sheets.timeout_secs {
                self.sheets.timeout_secs = timeout_secs;
            }
            if let Some(fallback_dir) = sheets.fallback_dir {
                self.sheets.fallback_dir = fallback_dir;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
            if let Some(capacity) = cache.capacity {
                self.cache.capacity = capacity;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(ttl_secs) = sessions.ttl_secs {
                self.sessions.ttl_secs = ttl_secs;
            }
            if let Some(capacity) = sessions.capacity {
                self.sessions.capacity = capacity;
            }
        }

        if let Some(transcription) = patch.transcription {
            if let Some(api_key) = transcription.api_key {
                self.transcription.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = transcription.base_url {
                self.transcription.base_url = base_url;
            }
            if let Some(model) = transcription.model {
                self.transcription.model = model;
            }
            if let Some(summary_model) = transcription.summary_model {
                self.transcription.summary_model = summary_model;
            }
            if let Some(timeout_secs) = transcription.timeout_secs {
                self.transcription.timeout_secs = timeout_secs;
            }
            if let Some(recording_auth_sid) = transcription.recording_auth_sid {
                self.transcription.recording_auth_sid = Some(recording_auth_sid);
            }
            if let Some(recording_auth_token) = transcription.recording_auth_token {
                self.transcription.recording_auth_token = Some(secret_value(recording_auth_token));
            }
        }

        if let Some(email) = patch.email {
            if let Some(api_key) = email.api_key {
                self.email.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = email.base_url {
                self.email.base_url = base_url;
            }
            if let Some(from_address) = email.from_address {
                self.email.from_address = from_address;
            }
            if let Some(fallback_path) = email.fallback_path {
                self.email.fallback_path = fallback_path;
            }
            if let Some(timeout_secs) = email.timeout_secs {
                self.email.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RINGLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RINGLINE_SERVER_PORT") {
            self.server.port = parse_u16("RINGLINE_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("RINGLINE_TENANCY_DEFAULT_TENANT") {
            self.tenancy.default_tenant = value;
        }

        if let Some(value) = read_env("RINGLINE_SHEETS_BASE_URL") {
            self.sheets.base_url = value;
        }
        if let Some(value) = read_env("RINGLINE_SHEETS_API_KEY") {
            self.sheets.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGLINE_SHEETS_TIMEOUT_SECS") {
            self.sheets.timeout_secs = parse_u64("RINGLINE_SHEETS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RINGLINE_SHEETS_FALLBACK_DIR") {
            self.sheets.fallback_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("RINGLINE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_u64("RINGLINE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("RINGLINE_CACHE_CAPACITY") {
            self.cache.capacity = parse_usize("RINGLINE_CACHE_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("RINGLINE_SESSIONS_TTL_SECS") {
            self.sessions.ttl_secs = parse_u64("RINGLINE_SESSIONS_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("RINGLINE_SESSIONS_CAPACITY") {
            self.sessions.capacity = parse_usize("RINGLINE_SESSIONS_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("RINGLINE_TRANSCRIPTION_API_KEY") {
            self.transcription.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGLINE_TRANSCRIPTION_BASE_URL") {
            self.transcription.base_url = value;
        }
        if let Some(value) = read_env("RINGLINE_TRANSCRIPTION_MODEL") {
            self.transcription.model = value;
        }
        if let Some(value) = read_env("RINGLINE_TRANSCRIPTION_SUMMARY_MODEL") {
            self.transcription.summary_model = value;
        }
        if let Some(value) = read_env("RINGLINE_TRANSCRIPTION_TIMEOUT_SECS") {
            self.transcription.timeout_secs =
                parse_u64("RINGLINE_TRANSCRIPTION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RINGLINE_RECORDING_AUTH_SID") {
            self.transcription.recording_auth_sid = Some(value);
        }
        if let Some(value) = read_env("RINGLINE_RECORDING_AUTH_TOKEN") {
            self.transcription.recording_auth_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("RINGLINE_EMAIL_API_KEY") {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGLINE_EMAIL_BASE_URL") {
            self.email.base_url = value;
        }
        if let Some(value) = read_env("RINGLINE_EMAIL_FROM") {
            self.email.from_address = value;
        }
        if let Some(value) = read_env("RINGLINE_EMAIL_FALLBACK_PATH") {
            self.email.fallback_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("RINGLINE_EMAIL_TIMEOUT_SECS") {
            self.email.timeout_secs = parse_u64("RINGLINE_EMAIL_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("RINGLINE_LOGGING_LEVEL").or_else(|| read_env("RINGLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RINGLINE_LOGGING_FORMAT").or_else(|| read_env("RINGLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(default_tenant) = overrides.default_tenant {
            self.tenancy.default_tenant = default_tenant;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(sheets_api_key) = overrides.sheets_api_key {
            self.sheets.api_key = Some(secret_value(sheets_api_key));
        }
        if let Some(sheets_fallback_dir) = overrides.sheets_fallback_dir {
            self.sheets.fallback_dir = sheets_fallback_dir;
        }
        if let Some(transcription_api_key) = overrides.transcription_api_key {
            self.transcription.api_key = Some(secret_value(transcription_api_key));
        }
        if let Some(email_api_key) = overrides.email_api_key {
            self.email.api_key = Some(secret_value(email_api_key));
        }
        if let Some(email_fallback_path) = overrides.email_fallback_path {
            self.email.fallback_path = email_fallback_path;
        }
        if let Some(cache_ttl_secs) = overrides.cache_ttl_secs {
            self.cache.ttl_secs = cache_ttl_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_tenancy(&self.tenancy)?;
        validate_sheets(&self.sheets)?;
        validate_cache(&self.cache)?;
        validate_sessions(&self.sessions)?;
        validate_transcription(&self.transcription)?;
        validate_email(&self.email)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ringline.toml"), PathBuf::from("config/ringline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_tenancy(tenancy: &TenancyConfig) -> Result<(), ConfigError> {
    if tenancy.default_tenant.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tenancy.default_tenant must not be empty".to_string(),
        ));
    }
    for (number, tenant) in &tenancy.phone_numbers {
        if tenant.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "tenancy.phone_numbers entry for `{number}` maps to an empty tenant id"
            )));
        }
    }
    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if !sheets.base_url.starts_with("http://") && !sheets.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "sheets.base_url must start with http:// or https://".to_string(),
        ));
    }
    if sheets.timeout_secs == 0 || sheets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.ttl_secs == 0 || cache.ttl_secs > 3600 {
        return Err(ConfigError::Validation(
            "cache.ttl_secs must be in range 1..=3600".to_string(),
        ));
    }
    if cache.capacity == 0 {
        return Err(ConfigError::Validation(
            "cache.capacity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_sessions(sessions: &SessionsConfig) -> Result<(), ConfigError> {
    if sessions.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.ttl_secs must be greater than zero".to_string(),
        ));
    }
    if sessions.capacity == 0 {
        return Err(ConfigError::Validation(
            "sessions.capacity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_transcription(transcription: &TranscriptionConfig) -> Result<(), ConfigError> {
    if !transcription.base_url.starts_with("http://")
        && !transcription.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "transcription.base_url must start with http:// or https://".to_string(),
        ));
    }
    if transcription.timeout_secs == 0 || transcription.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "transcription.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if !email.base_url.starts_with("http://") && !email.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "email.base_url must start with http:// or https://".to_string(),
        ));
    }
    if !email.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_address must be a valid address".to_string(),
        ));
    }
    if email.timeout_secs == 0 || email.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "email.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    tenancy: Option<TenancyPatch>,
    sheets: Option<SheetsPatch>,
    cache: Option<CachePatch>,
    sessions: Option<SessionsPatch>,
    transcription: Option<TranscriptionPatch>,
    email: Option<EmailPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct TenancyPatch {
    default_tenant: Option<String>,
    phone_numbers: Option<BTreeMap<String, String>>,
    sheets: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    fallback_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    ttl_secs: Option<u64>,
    capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    ttl_secs: Option<u64>,
    capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptionPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    summary_model: Option<String>,
    timeout_secs: Option<u64>,
    recording_auth_sid: Option<String>,
    recording_auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    from_address: Option<String>,
    fallback_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
