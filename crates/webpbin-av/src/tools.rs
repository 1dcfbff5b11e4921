//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the WebP
//! command-line binaries (cwebp, dwebp, gif2webp). It is built once from a
//! [`ToolsConfig`] and handed by reference to every job builder, so there is
//! no process-wide mutable state.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::{Error, Result};

/// Default tool timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// The binaries this crate knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// WebP encoder.
    CWebP,
    /// WebP decoder.
    DWebP,
    /// Animated GIF to WebP converter.
    Gif2WebP,
}

impl Tool {
    /// Every known tool, in reporting order.
    pub const ALL: [Tool; 3] = [Tool::CWebP, Tool::DWebP, Tool::Gif2WebP];

    /// Executable name searched for in `PATH`.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::CWebP => "cwebp",
            Tool::DWebP => "dwebp",
            Tool::Gif2WebP => "gif2webp",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cwebp" => Ok(Tool::CWebP),
            "dwebp" => Ok(Tool::DWebP),
            "gif2webp" => Ok(Tool::Gif2WebP),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}

/// User-facing tool settings, usually the `[tools]` table of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub cwebp_path: Option<PathBuf>,

    #[serde(default)]
    pub dwebp_path: Option<PathBuf>,

    #[serde(default)]
    pub gif2webp_path: Option<PathBuf>,

    /// Maximum run time of a single invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cwebp_path: None,
            dwebp_path: None,
            gif2webp_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolsConfig {
    /// The configured override for `tool`, if any.
    pub fn path_for(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::CWebP => self.cwebp_path.as_deref(),
            Tool::DWebP => self.dwebp_path.as_deref(),
            Tool::Gif2WebP => self.gif2webp_path.as_deref(),
        }
    }
}

/// Configuration for a single resolved tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Which binary this is.
    pub tool: Tool,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    #[serde(
        default = "default_timeout",
        with = "duration_secs",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn is_default_timeout(d: &Duration) -> bool {
    *d == DEFAULT_TIMEOUT
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl ToolConfig {
    /// A tool at an explicit path with the default timeout.
    pub fn new(tool: Tool, path: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start a command for this tool with its timeout applied.
    pub fn command<'a>(&self) -> ToolCommand<'a> {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.name(self.tool.binary_name()).timeout(self.timeout);
        cmd
    }

    /// Run `<tool> -version` and return its output with line breaks removed.
    ///
    /// gif2webp prints the encoder and mux versions on separate lines, which
    /// yields e.g. `"WebP Encoder version: 1.2.0WebP Mux version: 1.2.0"`.
    pub fn version(&self) -> Result<String> {
        let output = self.command().arg("-version").execute()?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.replace(['\n', '\r'], ""))
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string, if the tool answered `-version`.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<Tool, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the config supplies a custom path **and** that
    /// path exists, it is used directly. Otherwise [`which::which`] is used to
    /// locate the tool in `PATH`. Tools that are not found are silently
    /// omitted from the registry.
    pub fn discover(config: &ToolsConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut tools = HashMap::new();

        for tool in Tool::ALL {
            let name = tool.binary_name();
            let resolved = match config.path_for(tool) {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!("Configured path for {} does not exist: {:?}", name, p);
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!("Found {} at {:?}", name, path);
                    tools.insert(tool, ToolConfig::new(tool, path).with_timeout(timeout));
                }
                None => tracing::debug!("{} not found", name),
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit tool configs, skipping discovery.
    pub fn from_configs(configs: impl IntoIterator<Item = ToolConfig>) -> Self {
        Self {
            tools: configs.into_iter().map(|c| (c.tool, c)).collect(),
        }
    }

    /// Return the [`ToolConfig`] for the given tool, or
    /// [`Error::ToolNotFound`] if it was not found during discovery.
    pub fn require(&self, tool: Tool) -> Result<&ToolConfig> {
        self.tools
            .get(&tool)
            .ok_or_else(|| Error::tool_not_found(tool.binary_name()))
    }

    /// Whether the tool was found.
    pub fn contains(&self, tool: Tool) -> bool {
        self.tools.contains_key(&tool)
    }

    /// Run the version query for `tool`.
    pub fn version(&self, tool: Tool) -> Result<String> {
        self.require(tool)?.version()
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        Tool::ALL
            .iter()
            .map(|&tool| match self.tools.get(&tool) {
                Some(cfg) => ToolInfo {
                    name: tool.to_string(),
                    available: true,
                    version: cfg.version().ok().filter(|v| !v.is_empty()),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: tool.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // We cannot guarantee any tool is installed in CI,
        // but the call itself must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require(Tool::Gif2WebP).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { ref tool } if tool == "gif2webp"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::default();
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["cwebp", "dwebp", "gif2webp"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn configured_path_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-gif2webp");
        std::fs::write(&fake, b"").unwrap();

        let config = ToolsConfig {
            gif2webp_path: Some(fake.clone()),
            timeout_secs: 7,
            ..Default::default()
        };
        let registry = ToolRegistry::discover(&config);
        let tool = registry.require(Tool::Gif2WebP).unwrap();
        assert_eq!(tool.path, fake);
        assert_eq!(tool.timeout, Duration::from_secs(7));
    }

    #[test]
    fn tool_from_str() {
        assert_eq!("gif2webp".parse::<Tool>().ok(), Some(Tool::Gif2WebP));
        assert_eq!("CWEBP".parse::<Tool>().ok(), Some(Tool::CWebP));
        assert_eq!("ffmpeg".parse::<Tool>().ok(), None);
    }

    #[test]
    fn tool_config_serialization() {
        let cfg = ToolConfig::new(Tool::CWebP, "/usr/bin/cwebp");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"cwebp\""));
        assert!(!json.contains("timeout"));
        let back: ToolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool, Tool::CWebP);
        assert_eq!(back.timeout, DEFAULT_TIMEOUT);
    }
}
