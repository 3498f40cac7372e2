use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    external::Elevation,
    llm::LlmConfig,
    platform::{default_rules, KeywordRule, PlatformDetector},
    session::{ApprovalPolicy, HealingPolicy},
};

/// Which execution strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Approve or revise the script, then run it once.
    Interactive,
    /// Approve each attempt; failures are fed back for a corrected script.
    #[default]
    SelfHeal,
    /// Run generated command lines one by one, with a fix-and-retry on failure.
    Commands,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Interactive => "interactive",
            Mode::SelfHeal => "self-heal",
            Mode::Commands => "commands",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    pub max_attempts: u32,
    /// How much of a failed run's output (in characters, from the end) goes
    /// into the next prompt.
    pub failure_context_chars: usize,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            failure_context_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Unbounded when unset.
    pub max_revisions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub descriptor: PathBuf,
    pub kernel_command: String,
    pub macos_marker: String,
    pub keywords: Vec<KeywordRule>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            descriptor: PathBuf::from("/etc/os-release"),
            kernel_command: "uname".to_string(),
            macos_marker: "Darwin".to_string(),
            keywords: default_rules(),
        }
    }
}

impl PlatformConfig {
    pub fn detector(&self) -> PlatformDetector {
        PlatformDetector::new(
            self.descriptor.clone(),
            self.kernel_command.clone(),
            self.macos_marker.clone(),
            self.keywords.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub script_dir: PathBuf,
    pub elevation: Elevation,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("."),
            elevation: Elevation::Auto,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub llm: LlmConfig,
    pub healing: HealingConfig,
    pub approval: ApprovalConfig,
    pub platform: PlatformConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    const FILE_NAME: &'static str = "config.toml";

    /// `<config_dir>/scriptwright/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(Self::FILE_NAME))
    }

    /// Loads `explicit` if given (it must exist), otherwise the default path
    /// if present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|path| path.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn healing_policy(&self) -> HealingPolicy {
        HealingPolicy {
            max_attempts: self.healing.max_attempts,
            failure_context_chars: self.healing.failure_context_chars,
        }
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            max_revisions: self.approval.max_revisions,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.healing.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "healing.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.platform.keywords.iter().any(|rule| rule.keyword.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "platform.keywords entries need a non-empty keyword".to_string(),
            ));
        }
        Ok(())
    }
}
