//! Configuration
//!
//! Reads configuration from:
//! - `.templintrc.yaml` / `.templintrc.yml` / `.templintrc.json` (project-level)
//! - the same names in the home directory (user-level)
//!
//! Rules not mentioned in the configuration run at their default severity if
//! they are recommended and are off otherwise.

use crate::diagnostic::Severity;
use crate::rule::{ActiveRule, Rule};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// File names searched by [`Config::load_default`], in order
pub const CONFIG_FILE_NAMES: [&str; 3] = [".templintrc.yaml", ".templintrc.yml", ".templintrc.json"];

/// Patterns linted when no paths are given
pub const DEFAULT_INCLUDE: [&str; 2] = ["**/*.hbs", "**/*.html"];

const MAX_EXTENDS_DEPTH: usize = 10;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configured level of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Off,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl RuleLevel {
    /// Severity the rule runs at, or `None` when it is off
    pub fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Off => None,
            RuleLevel::Info => Some(Severity::Info),
            RuleLevel::Warning => Some(Severity::Warning),
            RuleLevel::Error => Some(Severity::Error),
        }
    }
}

impl From<Severity> for RuleLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => RuleLevel::Info,
            Severity::Warning => RuleLevel::Warning,
            Severity::Error => RuleLevel::Error,
        }
    }
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleLevel::Off => write!(f, "off"),
            RuleLevel::Info => write!(f, "info"),
            RuleLevel::Warning => write!(f, "warning"),
            RuleLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for RuleLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(RuleLevel::Off),
            other => other
                .parse::<Severity>()
                .map(RuleLevel::from)
                .map_err(|_| format!("Unknown rule level: {}", s)),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lint files in parallel (unset = parallel)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl EngineConfig {
    pub fn is_parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }
}

/// Output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: ColorMode,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Presets or configuration files this one builds on
    pub extends: Vec<String>,

    /// Rule levels by rule id
    pub rules: BTreeMap<String, RuleLevel>,

    /// Patterns linted when no paths are given (empty = defaults)
    pub include: Vec<String>,

    /// Paths never linted
    pub ignore: Vec<String>,

    pub engine: EngineConfig,

    pub output: OutputConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::preset_from(|rule| rule.meta().recommended)),
            "all" => Some(Self::preset_from(|_| true)),
            _ => None,
        }
    }

    fn preset_from(select: impl Fn(&dyn Rule) -> bool) -> Self {
        let rules: BTreeMap<String, RuleLevel> = crate::rules::builtin_rules()
            .iter()
            .filter(|rule| select(rule.as_ref()))
            .map(|rule| {
                let level = RuleLevel::from(rule.meta().default_severity);
                (rule.id().to_string(), level)
            })
            .collect();
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load configuration from a file, resolving `extends`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        if depth >= MAX_EXTENDS_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "Maximum config inheritance depth exceeded at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "json" => Self::from_json(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    path.display()
                )))
            }
        };

        let base_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_extends(base_dir, depth)
    }

    /// Fold `extends` entries into a base and merge `self` on top of it
    fn resolve_extends(self, base_dir: &Path, depth: usize) -> Result<Self, ConfigError> {
        if self.extends.is_empty() {
            return Ok(self);
        }

        let mut base = Self::default();
        for extend in &self.extends {
            let extended = if let Some(preset) = Self::preset(extend) {
                preset
            } else if Self::looks_like_file(extend) {
                let extend_path = if Path::new(extend).is_absolute() {
                    PathBuf::from(extend)
                } else {
                    base_dir.join(extend)
                };
                Self::load_with_depth(&extend_path, depth + 1)?
            } else {
                return Err(ConfigError::UnknownPreset(extend.clone()));
            };
            base.merge(extended);
        }

        base.merge(self);
        Ok(base)
    }

    fn looks_like_file(extend: &str) -> bool {
        matches!(
            Path::new(extend).extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml" | "json")
        )
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        // extends are resolved at load time and not inherited
        self.rules.extend(other.rules);
        if !other.include.is_empty() {
            self.include = other.include;
        }
        self.ignore.extend(other.ignore);

        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        if other.engine.parallel.is_some() {
            self.engine.parallel = other.engine.parallel;
        }

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in CONFIG_FILE_NAMES {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Override the level of one rule
    pub fn set_rule_level(&mut self, rule_id: &str, level: RuleLevel) {
        self.rules.insert(rule_id.to_string(), level);
    }

    /// Effective level of a rule
    pub fn rule_level(&self, rule: &dyn Rule) -> RuleLevel {
        match self.rules.get(rule.id()) {
            Some(level) => *level,
            None if rule.meta().recommended => rule.meta().default_severity.into(),
            None => RuleLevel::Off,
        }
    }

    /// Rules that are not off, in registry order, with their severity
    pub fn active_rules(&self, registry: &[Arc<dyn Rule>]) -> Vec<ActiveRule> {
        registry
            .iter()
            .filter_map(|rule| {
                let severity = self.rule_level(rule.as_ref()).severity()?;
                Some(ActiveRule::new(Arc::clone(rule)).with_severity(severity))
            })
            .collect()
    }

    /// Configured rule ids that no rule in `registry` has
    pub fn unknown_rules<'c>(&'c self, registry: &[Arc<dyn Rule>]) -> Vec<&'c str> {
        self.rules
            .keys()
            .filter(|id| !registry.iter().any(|rule| rule.id() == id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Patterns to expand when no paths are given
    pub fn include_patterns(&self) -> Vec<String> {
        if self.include.is_empty() {
            DEFAULT_INCLUDE.iter().map(|p| p.to_string()).collect()
        } else {
            self.include.clone()
        }
    }

    /// Compile the `ignore` patterns
    pub fn ignore_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }

    /// Check if a path matches an `ignore` pattern
    pub fn is_ignored(&self, path: &Path) -> bool {
        match self.ignore_set() {
            Ok(set) => set.is_match(path),
            Err(e) => {
                warn!("Ignoring invalid ignore patterns: {}", e);
                false
            }
        }
    }
}
