//! Settings loading for snowgate.
//!
//! Settings come from a single TOML file, located by this precedence chain:
//! 1. An explicit path (`--settings`)
//! 2. The `SNOWGATE_SETTINGS` environment variable
//! 3. `<snowgate home>/servicenow_reporting.toml`
//!
//! Environment variable overrides are applied on top. Every key is
//! optional; a missing default-location file yields the defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::{EnvironmentFilter, SeverityLevels, TriggerConditions};
use crate::error::{Result, SnowgateError};
use crate::secrets::{normalize_secret, CommandResolver, PassthroughResolver, SecretResolver};
use crate::util::read_to_string_limited;

/// File name of the settings file inside the snowgate home directory.
pub const SETTINGS_FILE_NAME: &str = "servicenow_reporting.toml";

/// Settings keys holding trigger lists.
pub const INCIDENT_CONDITIONS_KEY: &str = "incident_creation_conditions";
pub const EVENT_CONDITIONS_KEY: &str = "event_creation_conditions";

/// What kind of ServiceNow record a run produces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Create an incident in the incident table.
    #[default]
    IncidentManagement,
    /// Send an event to event management.
    EventManagement,
}

/// Valid values for the operation mode.
pub const VALID_OPERATION_MODES: &[&str] = &["incident_management", "event_management"];

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncidentManagement => "incident_management",
            Self::EventManagement => "event_management",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incident_management" => Some(Self::IncidentManagement),
            "event_management" => Some(Self::EventManagement),
            _ => None,
        }
    }

    /// Settings key holding this mode's trigger list.
    pub fn conditions_key(&self) -> &'static str {
        match self {
            Self::IncidentManagement => INCIDENT_CONDITIONS_KEY,
            Self::EventManagement => EVENT_CONDITIONS_KEY,
        }
    }
}

/// How selected facts are rendered in descriptions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactsFormat {
    #[default]
    PrettyJson,
    Json,
    Toml,
}

/// Incident fields copied verbatim into every incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IncidentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

/// Report processor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub operation_mode: OperationMode,
    /// Skip all processing when true.
    pub disabled: bool,
    /// ServiceNow instance, with or without `https://`.
    pub instance: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Takes precedence over user/password when set.
    pub oauth_token: Option<String>,
    pub pe_console_url: String,
    pub http_timeout_secs: u64,
    pub skip_certificate_validation: bool,
    /// Program used to decrypt `ENC[...]` secrets.
    pub secret_resolver_command: Option<PathBuf>,
    /// Kept as raw values so a malformed list is reported by key, not as
    /// a parse failure of the whole file.
    pub incident_creation_conditions: serde_json::Value,
    pub event_creation_conditions: serde_json::Value,
    pub allow_list: Vec<String>,
    pub block_list: Vec<String>,
    /// Dotted fact names, or `["all"]`.
    pub include_facts: Vec<String>,
    pub facts_format: FactsFormat,
    #[serde(flatten)]
    pub incident: IncidentFields,
    #[serde(flatten)]
    pub severities: SeverityLevels,
}

/// Facts included in descriptions unless configured otherwise.
pub const DEFAULT_INCLUDE_FACTS: &[&str] = &[
    "aio_agent_version",
    "id",
    "memorysize",
    "memoryfree",
    "ipaddress",
    "ipaddress6",
    "os.distro",
    "os.windows",
    "path",
    "uptime",
    "rubyversion",
];

/// Default HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

impl Default for Settings {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::default(),
            disabled: false,
            instance: String::new(),
            user: None,
            password: None,
            oauth_token: None,
            pe_console_url: String::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            skip_certificate_validation: false,
            secret_resolver_command: None,
            incident_creation_conditions: json!(["failures", "corrective_changes"]),
            event_creation_conditions: json!(["always"]),
            allow_list: vec!["all".to_string()],
            block_list: Vec::new(),
            include_facts: DEFAULT_INCLUDE_FACTS.iter().map(|s| s.to_string()).collect(),
            facts_format: FactsFormat::default(),
            incident: IncidentFields::default(),
            severities: SeverityLevels::default(),
        }
    }
}

impl Settings {
    /// Load settings with the full precedence chain, then resolve secrets.
    ///
    /// An explicit path or `SNOWGATE_SETTINGS` must point at a readable
    /// file. A missing file at the default location yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match Self::explicit_path(explicit) {
            Some(path) => Self::load_from_file(&path)?,
            None => match default_settings_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                Some(path) => {
                    tracing::debug!(path = %path.display(), "no settings file, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        settings.apply_env_overrides();
        let resolver = settings.secret_resolver();
        settings.resolve_secrets(resolver.as_ref())?;
        Ok(settings)
    }

    fn explicit_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        match env::var("SNOWGATE_SETTINGS") {
            Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => None,
        }
    }

    /// Load settings from a specific file, without overrides or secrets.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = read_to_string_limited(path)?;
        Self::from_toml_str(&content).map_err(|e| {
            SnowgateError::config(format!("invalid settings file {}: {}", path.display(), e))
        })
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SnowgateError::config(e.to_string()))
    }

    /// Apply environment variable overrides. Invalid values are ignored.
    pub fn apply_env_overrides(&mut self) {
        // SNOWGATE_OPERATION_MODE
        if let Ok(val) = env::var("SNOWGATE_OPERATION_MODE") {
            match OperationMode::parse(&val) {
                Some(mode) => self.operation_mode = mode,
                None => tracing::warn!(
                    "Invalid SNOWGATE_OPERATION_MODE value '{}'. Valid values: {:?}. Using '{}'.",
                    val,
                    VALID_OPERATION_MODES,
                    self.operation_mode.as_str()
                ),
            }
        }

        // SNOWGATE_INSTANCE
        if let Ok(val) = env::var("SNOWGATE_INSTANCE") {
            if val.is_empty() {
                tracing::warn!("SNOWGATE_INSTANCE is empty, ignoring");
            } else {
                self.instance = val;
            }
        }

        // SNOWGATE_DISABLED
        if let Ok(val) = env::var("SNOWGATE_DISABLED") {
            self.disabled = val == "true" || val == "1";
        }

        // SNOWGATE_HTTP_TIMEOUT_SECS
        if let Ok(val) = env::var("SNOWGATE_HTTP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => self.http_timeout_secs = n,
                _ => tracing::warn!(
                    "Invalid SNOWGATE_HTTP_TIMEOUT_SECS value '{}'. \
                    Expected a positive integer. Using '{}'.",
                    val,
                    self.http_timeout_secs
                ),
            }
        }
    }

    /// Resolver for stored secrets: the configured command, or passthrough.
    pub fn secret_resolver(&self) -> Box<dyn SecretResolver> {
        match &self.secret_resolver_command {
            Some(program) => Box::new(CommandResolver::new(program)),
            None => Box::new(PassthroughResolver),
        }
    }

    /// Chomp and resolve `password` and `oauth_token`.
    pub fn resolve_secrets(&mut self, resolver: &dyn SecretResolver) -> Result<()> {
        for secret in [&mut self.password, &mut self.oauth_token] {
            if let Some(raw) = secret.as_deref() {
                *secret = Some(resolver.resolve(&normalize_secret(raw))?);
            }
        }
        Ok(())
    }

    /// Validated incident trigger list.
    pub fn incident_conditions(&self) -> Result<TriggerConditions> {
        TriggerConditions::from_value(INCIDENT_CONDITIONS_KEY, &self.incident_creation_conditions)
    }

    /// Validated event trigger list.
    pub fn event_conditions(&self) -> Result<TriggerConditions> {
        TriggerConditions::from_value(EVENT_CONDITIONS_KEY, &self.event_creation_conditions)
    }

    /// Validated trigger list for the configured operation mode.
    pub fn trigger_conditions(&self) -> Result<TriggerConditions> {
        match self.operation_mode {
            OperationMode::IncidentManagement => self.incident_conditions(),
            OperationMode::EventManagement => self.event_conditions(),
        }
    }

    pub fn environment_filter(&self) -> EnvironmentFilter {
        EnvironmentFilter::new(self.allow_list.clone(), self.block_list.clone())
    }

    /// Check the settings needed before anything is sent.
    ///
    /// Both trigger lists must be lists of strings, severities must be in
    /// range, and an instance plus some form of credentials must be set.
    pub fn validate(&self) -> Result<()> {
        self.incident_conditions()?;
        self.event_conditions()?;

        if !self.severities.is_valid() {
            return Err(SnowgateError::config(format!(
                "event severities must be between 0 and {}",
                crate::core::severity::MAX_SEVERITY
            )));
        }
        if self.instance.trim().is_empty() {
            return Err(SnowgateError::config("settings['instance'] must be set"));
        }
        if self.oauth_token.is_none() && self.user.is_none() {
            return Err(SnowgateError::config(
                "either settings['oauth_token'] or settings['user'] must be set",
            ));
        }
        Ok(())
    }
}

/// Default settings file location, if a snowgate home exists.
pub fn default_settings_path() -> Option<PathBuf> {
    snowgate_home().map(|home| home.join(SETTINGS_FILE_NAME))
}

/// Get the snowgate home directory.
///
/// Checks `SNOWGATE_HOME` first, then falls back to `~/.snowgate`. An empty
/// `SNOWGATE_HOME` is ignored; a relative one is canonicalized when it
/// exists.
pub fn snowgate_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("SNOWGATE_HOME") {
        if home.is_empty() {
            tracing::warn!("SNOWGATE_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("SNOWGATE_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    dirs::home_dir().map(|home| home.join(".snowgate"))
}

/// Path of the crash log written by the panic hook.
pub fn crash_log_path() -> Option<PathBuf> {
    snowgate_home().map(|home| home.join("crash.log"))
}
