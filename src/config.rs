//! Analysis configuration and the guardian.yaml file format.
//!
//! `AnalysisConfig` is what the analyzer consumes. Strictness is policy
//! owned by the caller: it decides which rules end up in
//! `enabled_rules`, and the analyzer itself never reads it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::rules::{RuleRegistry, Severity};

/// Default config file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["guardian.yaml", ".guardian.yaml"];

/// Default debounce applied by the client adapter.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// How aggressively the policy layer enables rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Every registered rule.
    Strict,
    /// Error and warning rules.
    #[default]
    Balanced,
    /// Error rules only.
    Lenient,
}

impl Strictness {
    /// Whether a rule of `severity` is enabled under this policy.
    pub fn admits(&self, severity: Severity) -> bool {
        match self {
            Strictness::Strict => true,
            Strictness::Balanced => severity != Severity::Info,
            Strictness::Lenient => severity == Severity::Error,
        }
    }
}

impl std::fmt::Display for Strictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strictness::Strict => write!(f, "strict"),
            Strictness::Balanced => write!(f, "balanced"),
            Strictness::Lenient => write!(f, "lenient"),
        }
    }
}

impl std::str::FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "balanced" => Ok(Strictness::Balanced),
            "lenient" => Ok(Strictness::Lenient),
            _ => Err(format!("unknown strictness: {}", s)),
        }
    }
}

/// Input contract for a single analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Rule ids to run. Ids missing from the registry are ignored.
    pub enabled_rules: BTreeSet<String>,
    #[serde(default)]
    pub strictness: Strictness,
    /// Seeds violation ids. Never changes which violations are found.
    #[serde(default)]
    pub seed: u64,
}

impl AnalysisConfig {
    pub fn new<I, S>(enabled_rules: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled_rules: enabled_rules.into_iter().map(Into::into).collect(),
            strictness: Strictness::default(),
            seed,
        }
    }

    /// Enable every rule in `registry`.
    pub fn all_rules(registry: &RuleRegistry, seed: u64) -> Self {
        Self {
            enabled_rules: registry.ids().into_iter().map(str::to_string).collect(),
            strictness: Strictness::Strict,
            seed,
        }
    }

    /// Enable the rules `strictness` admits.
    pub fn from_policy(strictness: Strictness, seed: u64, registry: &RuleRegistry) -> Self {
        Self {
            enabled_rules: registry
                .all()
                .iter()
                .filter(|r| strictness.admits(r.severity))
                .map(|r| r.id.to_string())
                .collect(),
            strictness,
            seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_enabled(&self, rule_id: &str) -> bool {
        self.enabled_rules.contains(rule_id)
    }
}

/// Top-level guardian.yaml definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardianConfig {
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default)]
    pub seed: u64,
    /// Explicit rule list. When absent, strictness decides.
    #[serde(default)]
    pub enabled_rules: Option<Vec<String>>,
    /// Rules removed after strictness or `enabled_rules` are applied.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// Glob patterns for paths to exclude (e.g. "**/generated/**").
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_excluded_paths() -> Vec<String> {
    vec!["**/node_modules/**".to_string()]
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::default(),
            seed: 0,
            enabled_rules: None,
            disabled_rules: Vec::new(),
            excluded_paths: default_excluded_paths(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl GuardianConfig {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        let config: GuardianConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Find a config file in `dir`, if any.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Resolve the effective analysis config against `registry`.
    pub fn analysis_config(&self, registry: &RuleRegistry) -> AnalysisConfig {
        let mut config = match &self.enabled_rules {
            Some(rules) => AnalysisConfig {
                enabled_rules: rules.iter().cloned().collect(),
                strictness: self.strictness,
                seed: self.seed,
            },
            None => AnalysisConfig::from_policy(self.strictness, self.seed, registry),
        };
        for rule in &self.disabled_rules {
            config.enabled_rules.remove(rule);
        }
        config
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Compile `excluded_paths` into one matcher. `**` matches across
    /// directories.
    pub fn exclusions(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("excluded_paths: invalid glob {:?}: {}", pattern, e))?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }
}

/// Check a config for values that would silently do nothing.
pub fn validate(config: &GuardianConfig, registry: &RuleRegistry) -> anyhow::Result<()> {
    config.exclusions()?;
    if let Some(rules) = &config.enabled_rules {
        for rule in rules {
            if !registry.contains(rule) {
                tracing::warn!(rule = %rule, "enabled_rules names an unknown rule; it will be ignored");
            }
        }
    }
    Ok(())
}
