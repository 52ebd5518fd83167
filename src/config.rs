use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Marshaling engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarshalConfig {
    #[serde(default)]
    pub numeric: NumericConfig,

    #[serde(default)]
    pub decode: DecodeConfig,

    #[serde(default)]
    pub binding: BindingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericPolicy {
    /// Truncate toward zero and discard high bits
    ///
    /// Numbers are reduced modulo 2^64 before narrowing, so 2^64 stores as 0
    /// in every width and non-finite numbers store as 0.
    #[default]
    Truncate,
    /// Reject values that do not fit the target width
    Checked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Unsupported native values decode to an opaque placeholder
    #[default]
    Permissive,
    /// Unsupported native values are an error
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericConfig {
    #[serde(default)]
    pub policy: NumericPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub policy: DecodePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Hide array length parameters from host callers
    #[serde(default = "default_true")]
    pub hide_length_parameters: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            hide_length_parameters: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_true() -> bool { true }
fn default_level() -> String { "info".to_string() }
fn default_format() -> String { "pretty".to_string() }

impl MarshalConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    pub fn with_numeric_policy(mut self, policy: NumericPolicy) -> Self {
        self.numeric.policy = policy;
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode.policy = policy;
        self
    }

    pub fn with_hidden_lengths(mut self, hide: bool) -> Self {
        self.binding.hide_length_parameters = hide;
        self
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }
}
