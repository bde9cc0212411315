use config::{Config, ConfigError, Environment, File};
use relay_core::{CommandWords, DEFAULT_SUMMARY_SIZE, MessageRouter};
use relay_sheets::AccessToken;
use relay_web_generic::ProcessorSettings;
use serde::{Deserialize, Serialize};
use std::env;
use time::UtcOffset;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Routing and reply behaviour
    pub relay: RelayConfig,
    /// Google Sheets row store; in-memory store when absent
    pub sheets: Option<SheetsConfig>,
    /// Join push notifier; replies are dropped when absent
    pub join: Option<JoinConfig>,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 5000)
    pub port: u16,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

/// Routing and reply configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// Keyword that asks for the sheet link (default: link)
    pub link_command: String,
    /// Keyword that asks for recent entries (default: summary)
    pub summary_command: String,
    /// Entries listed in a summary (default: 3)
    pub summary_size: usize,
    /// Confirm each logged entry by text (default: true)
    pub acknowledge_entries: bool,
    /// Offset of the receipt clock from UTC in minutes (default: 0)
    pub utc_offset_minutes: i32,
    /// Number that receives the daily check-in prompt
    pub owner_number: Option<String>,
    /// Secret the cron trigger must present
    pub cron_secret: Option<String>,
}

/// Google Sheets configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SheetsConfig {
    /// Spreadsheet ID from the sheet URL
    pub spreadsheet_id: String,
    /// OAuth2 access token with the spreadsheets scope; expires after about an hour
    #[serde(default)]
    pub access_token: Option<String>,
    /// File holding a token that an external refresher keeps current; wins
    /// over `access_token`
    #[serde(default)]
    pub access_token_file: Option<String>,
    /// A1 range of the log (default: Sheet1!A:D)
    #[serde(default = "default_sheets_range")]
    pub range: String,
    /// API base URL (default: https://sheets.googleapis.com)
    #[serde(default = "default_sheets_base_url")]
    pub base_url: String,
}

/// Join/AutoRemote configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JoinConfig {
    /// Push URL that triggers the SMS send on the phone
    pub send_url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_join_timeout")]
    pub timeout_seconds: u64,
}

/// Security configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Maximum webhook body size in bytes (default: 64KB)
    pub max_body_size: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    pub enabled: bool,
    /// Requests per minute per sender (default: 30)
    pub requests_per_minute: u32,
    /// Burst size (default: 10)
    pub burst_size: u32,
}

fn default_sheets_range() -> String {
    relay_sheets::DEFAULT_RANGE.to_string()
}

fn default_sheets_base_url() -> String {
    relay_sheets::DEFAULT_BASE_URL.to_string()
}

fn default_join_timeout() -> u64 {
    relay_join::DEFAULT_TIMEOUT.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            timeout_seconds: 30,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        let commands = CommandWords::default();
        Self {
            link_command: commands.link,
            summary_command: commands.summary,
            summary_size: DEFAULT_SUMMARY_SIZE,
            acknowledge_entries: true,
            utc_offset_minutes: 0,
            owner_number: None,
            cron_secret: None,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 30,
            burst_size: 10,
        }
    }
}

impl RelayConfig {
    pub fn message_router(&self) -> MessageRouter {
        MessageRouter::new(
            CommandWords {
                link: self.link_command.clone(),
                summary: self.summary_command.clone(),
            },
            self.summary_size,
        )
    }

    pub fn utc_offset(&self) -> Result<UtcOffset, ConfigError> {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes.saturating_mul(60)).map_err(|e| {
            ConfigError::Message(format!(
                "relay.utc_offset_minutes {} out of range: {}",
                self.utc_offset_minutes, e
            ))
        })
    }
}

impl SheetsConfig {
    pub fn access_token(&self) -> Result<AccessToken, ConfigError> {
        match (&self.access_token_file, &self.access_token) {
            (Some(path), _) => Ok(AccessToken::File(path.into())),
            (None, Some(token)) => Ok(AccessToken::Static(token.clone())),
            (None, None) => Err(ConfigError::Message(
                "sheets.access_token or sheets.access_token_file is required".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SMSRELAY_)
            .add_source(Environment::with_prefix("SMSRELAY").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Settings the web processor needs, validated.
    pub fn processor_settings(&self) -> Result<ProcessorSettings, ConfigError> {
        Ok(ProcessorSettings {
            acknowledge_entries: self.relay.acknowledge_entries,
            utc_offset: self.relay.utc_offset()?,
            owner_number: self.relay.owner_number.clone(),
            cron_secret: self.relay.cron_secret.clone(),
            max_body_size: self.security.max_body_size,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            relay: RelayConfig::default(),
            sheets: None,
            join: None,
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
