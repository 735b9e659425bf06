//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `desk-gateway.toml`
//! 3. Defaults
//!
//! `${VAR_NAME}` references inside the TOML file are expanded from the
//! environment before parsing.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Default config file name in the working directory
pub const CONFIG_FILE: &str = "desk-gateway.toml";

/// Longest supported escalation wait (one day)
pub const MAX_ESCALATION_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Business identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Business name used in the greeting
    #[serde(default = "default_business_name")]
    pub name: String,
    /// Customer identifier recorded on help requests
    #[serde(default = "default_customer_id")]
    pub customer_id: String,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            customer_id: default_customer_id(),
        }
    }
}

/// Database endpoint selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use the in-memory emulator instead of the database file
    #[serde(default = "default_emulator")]
    pub emulator: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            emulator: default_emulator(),
        }
    }
}

impl DatabaseConfig {
    /// Path handed to the SQLite stores
    pub fn effective_path(&self) -> &str {
        if self.emulator { ":memory:" } else { &self.path }
    }
}

/// Escalation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Seconds to wait for a supervisor after subscribing
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Phrase spoken before waiting (none = wait silently)
    #[serde(default = "default_acknowledgement")]
    pub acknowledgement: Option<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            acknowledgement: default_acknowledgement(),
        }
    }
}

impl EscalationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Knowledge matching policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Keyword overlap scoring
    #[default]
    Keywords,
    /// Exact question text
    Exact,
}

impl MatcherKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "keywords" | "keyword" => Some(Self::Keywords),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}

/// Knowledge base settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Minimum confidence for a direct answer
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Matching policy
    #[serde(default)]
    pub matcher: MatcherKind,
    /// Seed file loaded at startup
    pub seed_path: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            matcher: MatcherKind::default(),
            seed_path: None,
        }
    }
}

/// Identifiers for the external voice transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            llm_model: default_llm_model(),
            stt_model: default_stt_model(),
            tts_voice: default_tts_voice(),
        }
    }
}

/// Main configuration for desk-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub business: BusinessConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

fn default_business_name() -> String {
    "COLORS HAIR SALON".to_string()
}

fn default_customer_id() -> String {
    "test-user-123".to_string()
}

fn default_db_path() -> String {
    "data/desk-gateway.db".to_string()
}

fn default_emulator() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_acknowledgement() -> Option<String> {
    Some(
        "Let me check with my supervisor and get back to you within 3 minutes, please wait a moment."
            .to_string(),
    )
}

fn default_threshold() -> f64 {
    0.6
}

fn default_llm_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_stt_model() -> String {
    "assemblyai/universal-streaming:en".to_string()
}

fn default_tts_voice() -> String {
    "cartesia/sonic-2".to_string()
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML content (after `${VAR}` expansion), without env overrides
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded_content = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Self::from_toml_config(toml)
    }

    /// Load from `./desk-gateway.toml` if present, otherwise from the
    /// environment alone
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load from environment variables over defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_toml_config(toml: TomlConfig) -> crate::Result<Self> {
        let business = toml.business.unwrap_or_default();
        let database = toml.database.unwrap_or_default();
        let escalation = toml.escalation.unwrap_or_default();
        let knowledge = toml.knowledge.unwrap_or_default();
        let voice = toml.voice.unwrap_or_default();

        let matcher = match knowledge.matcher {
            Some(value) => MatcherKind::parse(&value)
                .ok_or_else(|| Error::Config(format!("Unknown knowledge matcher: {}", value)))?,
            None => MatcherKind::default(),
        };

        // An empty acknowledgement disables it
        let acknowledgement = match escalation.acknowledgement {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text),
            None => default_acknowledgement(),
        };

        Ok(Config {
            business: BusinessConfig {
                name: business.name.unwrap_or_else(default_business_name),
                customer_id: business.customer_id.unwrap_or_else(default_customer_id),
            },
            database: DatabaseConfig {
                path: database.path.unwrap_or_else(default_db_path),
                emulator: database.emulator.unwrap_or_else(default_emulator),
            },
            escalation: EscalationConfig {
                timeout_secs: escalation.timeout_secs.unwrap_or_else(default_timeout_secs),
                acknowledgement,
            },
            knowledge: KnowledgeConfig {
                threshold: knowledge.threshold.unwrap_or_else(default_threshold),
                matcher,
                seed_path: knowledge.seed_path,
            },
            voice: VoiceConfig {
                llm_model: voice.llm_model.unwrap_or_else(default_llm_model),
                stt_model: voice.stt_model.unwrap_or_else(default_stt_model),
                tts_voice: voice.tts_voice.unwrap_or_else(default_tts_voice),
            },
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("BUSINESS_NAME") {
            if !name.is_empty() {
                self.business.name = name;
            }
        }
        if let Ok(customer_id) = std::env::var("CUSTOMER_ID") {
            if !customer_id.is_empty() {
                self.business.customer_id = customer_id;
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            self.database.path = path;
        }
        if let Ok(emulator) = std::env::var("USE_EMULATOR") {
            self.database.emulator = emulator.to_lowercase() == "true";
        }

        if let Ok(timeout) = std::env::var("ESCALATION_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.escalation.timeout_secs = secs;
            }
        }

        if let Ok(threshold) = std::env::var("KNOWLEDGE_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.knowledge.threshold = t;
            }
        }
        if let Ok(matcher) = std::env::var("KNOWLEDGE_MATCHER") {
            if let Some(kind) = MatcherKind::parse(&matcher) {
                self.knowledge.matcher = kind;
            }
        }
        if let Ok(path) = std::env::var("KNOWLEDGE_SEED_PATH") {
            self.knowledge.seed_path = Some(path);
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            if !model.is_empty() {
                self.voice.llm_model = model;
            }
        }
        if let Ok(model) = std::env::var("STT_MODEL") {
            if !model.is_empty() {
                self.voice.stt_model = model;
            }
        }
        if let Ok(voice) = std::env::var("TTS_VOICE") {
            if !voice.is_empty() {
                self.voice.tts_voice = voice;
            }
        }
    }

    /// Reject settings the call flow cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.knowledge.threshold) {
            return Err(Error::Config(format!(
                "knowledge.threshold must be within 0..=1, got {}",
                self.knowledge.threshold
            )));
        }
        if self.escalation.timeout_secs == 0 {
            return Err(Error::Config(
                "escalation.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.escalation.timeout_secs > MAX_ESCALATION_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "escalation.timeout_secs must be at most {}, got {}",
                MAX_ESCALATION_TIMEOUT_SECS, self.escalation.timeout_secs
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    business: Option<TomlBusinessConfig>,
    database: Option<TomlDatabaseConfig>,
    escalation: Option<TomlEscalationConfig>,
    knowledge: Option<TomlKnowledgeConfig>,
    voice: Option<TomlVoiceConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBusinessConfig {
    name: Option<String>,
    customer_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDatabaseConfig {
    path: Option<String>,
    emulator: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlEscalationConfig {
    timeout_secs: Option<u64>,
    acknowledgement: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlKnowledgeConfig {
    threshold: Option<f64>,
    matcher: Option<String>,
    seed_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlVoiceConfig {
    llm_model: Option<String>,
    stt_model: Option<String>,
    tts_voice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.business.name, "COLORS HAIR SALON");
        assert_eq!(config.escalation.timeout_secs, 180);
        assert_eq!(config.escalation.timeout(), Duration::from_secs(180));
        assert!(config.escalation.acknowledgement.is_some());
        assert_eq!(config.knowledge.threshold, 0.6);
        assert_eq!(config.knowledge.matcher, MatcherKind::Keywords);
        assert!(config.database.emulator);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_emulator_path() {
        let mut db = DatabaseConfig::default();
        assert_eq!(db.effective_path(), ":memory:");
        db.emulator = false;
        assert_eq!(db.effective_path(), "data/desk-gateway.db");
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("DESK_GATEWAY_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${DESK_GATEWAY_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${DESK_GATEWAY_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("DESK_GATEWAY_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_passthrough() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
        assert_eq!(Config::expand_env_vars("cost $5"), "cost $5");
    }

    #[test]
    fn test_toml_parsing() {
        let config = Config::from_toml_str(
            r#"
[business]
name = "Test Salon"
customer_id = "caller-1"

[database]
path = "/tmp/desk.db"
emulator = false

[escalation]
timeout_secs = 300
acknowledgement = ""

[knowledge]
threshold = 0.75
matcher = "exact"
seed_path = "knowledge.toml"

[voice]
llm_model = "openai/gpt-4.1-mini"
"#,
        )
        .unwrap();

        assert_eq!(config.business.name, "Test Salon");
        assert_eq!(config.business.customer_id, "caller-1");
        assert_eq!(config.database.effective_path(), "/tmp/desk.db");
        assert_eq!(config.escalation.timeout_secs, 300);
        assert!(config.escalation.acknowledgement.is_none());
        assert_eq!(config.knowledge.threshold, 0.75);
        assert_eq!(config.knowledge.matcher, MatcherKind::Exact);
        assert_eq!(config.knowledge.seed_path.as_deref(), Some("knowledge.toml"));
        assert_eq!(config.voice.llm_model, "openai/gpt-4.1-mini");
        assert_eq!(config.voice.stt_model, "assemblyai/universal-streaming:en");
    }

    #[test]
    fn test_toml_unknown_matcher() {
        let result = Config::from_toml_str("[knowledge]\nmatcher = \"fuzzy\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[knowledge]\nthreshold = 1.5").unwrap();
        assert!(matches!(
            Config::from_toml_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_timeout() {
        let mut config = Config::default();
        config.escalation.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.escalation.timeout_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.escalation.timeout_secs = MAX_ESCALATION_TIMEOUT_SECS;
        assert!(config.validate().is_ok());
    }
}
