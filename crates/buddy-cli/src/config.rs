//! Configuration file management for buddy.
//!
//! Provides a TOML-based config file at `~/.config/buddy/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use buddy_core::config::{OpenAiSettings, PipelineConfig};
use buddy_core::orchestrator::PlanOrchestrator;
use buddy_core::source::{ClassroomClient, CourseworkSource, StaticAccessTokens};

/// Default bind address for `buddy serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Default port for `buddy serve`.
pub const DEFAULT_PORT: u16 = 8000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub classroom: ClassroomSection,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OpenAiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClassroomSection {
    /// Bearer token used for every user. Per-user token storage is out of
    /// scope for the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SourcesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the buddy config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/buddy` or `~/.config/buddy`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("buddy");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("buddy")
}

/// Return the path to the buddy config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file is `Ok(None)`; an
/// unreadable or malformed one is an error.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Load the config file from its default location.
pub fn load_config() -> Result<Option<ConfigFile>> {
    load_config_from(&config_path())
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since the file may hold API keys.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub fixture: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct BuddyConfig {
    pub pipeline: PipelineConfig,
    pub classroom_token: Option<String>,
    pub classroom_base_url: Option<String>,
    pub bind: String,
    pub port: u16,
}

impl BuddyConfig {
    /// Resolve configuration from the default config file location.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Self::resolve_with(cli, load_config()?)
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Fixture: `--fixture` > `BUDDY_FIXTURE_PATH` > `sources.fixture_path` >
    ///   `PipelineConfig::DEFAULT_FIXTURE_PATH`
    /// - Timeout: `--timeout` > `BUDDY_UPSTREAM_TIMEOUT_SECS` >
    ///   `sources.upstream_timeout_secs` > 10 s
    /// - OpenAI: `OPENAI_API_KEY` / `OPENAI_MODEL` > `[openai]`; no key disables generation
    /// - Classroom: `BUDDY_CLASSROOM_TOKEN` > `classroom.access_token`; no token disables the tier
    /// - Server: `--bind` / `--port` > `[server]` > `DEFAULT_BIND` / `DEFAULT_PORT`
    pub fn resolve_with(cli: &CliOverrides, file: Option<ConfigFile>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let fixture_path = cli
            .fixture
            .clone()
            .or_else(|| env_nonempty("BUDDY_FIXTURE_PATH").map(PathBuf::from))
            .or(file.sources.fixture_path)
            .unwrap_or_else(|| PathBuf::from(PipelineConfig::DEFAULT_FIXTURE_PATH));

        let timeout_secs = match cli.timeout_secs {
            Some(secs) => Some(secs),
            None => match env_nonempty("BUDDY_UPSTREAM_TIMEOUT_SECS") {
                Some(raw) => Some(raw.parse::<u64>().with_context(|| {
                    format!("BUDDY_UPSTREAM_TIMEOUT_SECS is not a number: {raw:?}")
                })?),
                None => file.sources.upstream_timeout_secs,
            },
        };
        let upstream_timeout = match timeout_secs {
            Some(0) => bail!("upstream timeout must be at least 1 second"),
            Some(secs) => Duration::from_secs(secs),
            None => PipelineConfig::DEFAULT_UPSTREAM_TIMEOUT,
        };

        let mut pipeline = PipelineConfig::new(fixture_path).upstream_timeout(upstream_timeout);

        let api_key = env_nonempty("OPENAI_API_KEY")
            .or(file.openai.api_key.filter(|k| !k.trim().is_empty()));
        if let Some(key) = api_key {
            let mut settings = OpenAiSettings::new(key);
            if let Some(model) = env_nonempty("OPENAI_MODEL").or(file.openai.model) {
                settings = settings.model(model);
            }
            if let Some(url) = file.openai.base_url {
                settings = settings.base_url(url);
            }
            pipeline = pipeline.openai(settings);
        }

        let classroom_token = env_nonempty("BUDDY_CLASSROOM_TOKEN")
            .or(file.classroom.access_token.filter(|t| !t.is_empty()));

        Ok(Self {
            pipeline,
            classroom_token,
            classroom_base_url: file.classroom.base_url,
            bind: cli
                .bind
                .clone()
                .or(file.server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            port: cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
        })
    }

    /// The Classroom tier, when a token is configured.
    pub fn coursework_source(&self) -> Option<Arc<dyn CourseworkSource>> {
        let token = self.classroom_token.as_ref()?;
        let tokens = Arc::new(StaticAccessTokens::new().with_default(token.clone()));
        let mut client = ClassroomClient::new(tokens, self.pipeline.upstream_timeout);
        if let Some(url) = &self.classroom_base_url {
            client = client.with_base_url(url.clone());
        }
        Some(Arc::new(client))
    }

    /// Build the orchestrator for this configuration.
    pub fn orchestrator(&self) -> PlanOrchestrator {
        PlanOrchestrator::from_config(&self.pipeline, self.coursework_source())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
