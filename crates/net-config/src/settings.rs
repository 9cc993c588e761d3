//! Process settings
//!
//! Loaded from an optional settings file, then overridden by `NCIF_*`
//! environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ncif_core::{ConfigError, DEFAULT_NAMESPACE};

use crate::schema::{DocumentPath, EncoderOptions};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "NCIF";

/// Connection and file settings for one device
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    pub hostkey_verify: bool,
    pub allow_agent: bool,
    pub look_for_keys: bool,
    pub filter_file: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub namespace: String,
    pub address_namespace: Option<String>,
    pub projection: String,
    pub target: String,
    pub require_non_empty: bool,
    pub locale: String,
    pub timeout_secs: u64,
    pub ssh_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 830,
            username: String::new(),
            password: None,
            key_file: None,
            hostkey_verify: true,
            allow_agent: true,
            look_for_keys: true,
            filter_file: None,
            state_file: None,
            audit_dir: Some(PathBuf::from(".")),
            namespace: DEFAULT_NAMESPACE.to_string(),
            address_namespace: Some(DEFAULT_NAMESPACE.to_string()),
            projection: DocumentPath::default_projection().to_string(),
            target: DocumentPath::default_target().to_string(),
            require_non_empty: false,
            locale: "en".to_string(),
            timeout_secs: 30,
            ssh_command: "ssh".to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("hostkey_verify", &self.hostkey_verify)
            .field("allow_agent", &self.allow_agent)
            .field("look_for_keys", &self.look_for_keys)
            .field("filter_file", &self.filter_file)
            .field("state_file", &self.state_file)
            .field("audit_dir", &self.audit_dir)
            .field("namespace", &self.namespace)
            .field("locale", &self.locale)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the fields a connection needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "host".to_string(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "username".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: self.port.to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".to_string(),
                value: self.timeout_secs.to_string(),
            });
        }
        self.projection_path()?;
        self.target_path()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn projection_path(&self) -> Result<DocumentPath, ConfigError> {
        self.projection.parse()
    }

    pub fn target_path(&self) -> Result<DocumentPath, ConfigError> {
        self.target.parse()
    }

    pub fn encoder_options(&self) -> Result<EncoderOptions, ConfigError> {
        let mut options = EncoderOptions::new(self.namespace.clone())
            .with_target(self.target_path()?)
            .require_non_empty(self.require_non_empty);
        options.address_namespace = self.address_namespace.clone();
        Ok(options)
    }

    /// Require a path setting, naming it in the error.
    pub fn require_path<'a>(
        value: &'a Option<PathBuf>,
        field: &str,
    ) -> Result<&'a PathBuf, ConfigError> {
        value.as_ref().ok_or_else(|| ConfigError::MissingField {
            field: field.to_string(),
        })
    }
}
