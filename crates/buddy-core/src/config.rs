use std::path::PathBuf;
use std::time::Duration;

/// Settings for the OpenAI-backed text generator.
#[derive(Clone)]
pub struct OpenAiSettings {
    /// Bearer credential. Never logged.
    pub api_key: String,
    /// Model name passed to the Responses API.
    pub model: String,
    /// API root, without a trailing slash.
    pub base_url: String,
}

impl OpenAiSettings {
    /// Default model when none is configured.
    pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
    /// Default API root.
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

    /// Build settings for `api_key` with the default model and endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_owned(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Override the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API root (useful for proxies and tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Pipeline configuration.
///
/// Constructed once per process by the binary and passed down to the
/// resolver and orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Location of the local assignment fixture (second sourcing tier).
    pub fixture_path: PathBuf,
    /// Wall time limit applied to each external call.
    pub upstream_timeout: Duration,
    /// Generator settings; `None` disables the generative planner.
    pub openai: Option<OpenAiSettings>,
}

impl PipelineConfig {
    /// Fixture path used when nothing else is configured.
    pub const DEFAULT_FIXTURE_PATH: &str = "fixtures/assignments.json";
    /// Default per-call timeout for upstream services.
    pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

    /// Build a config with explicit values and no generator.
    pub fn new(fixture_path: impl Into<PathBuf>) -> Self {
        Self {
            fixture_path: fixture_path.into(),
            upstream_timeout: Self::DEFAULT_UPSTREAM_TIMEOUT,
            openai: None,
        }
    }

    /// Set the per-call upstream timeout.
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Enable the generative planner.
    pub fn openai(mut self, settings: OpenAiSettings) -> Self {
        self.openai = Some(settings);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FIXTURE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let cfg = PipelineConfig::new("/tmp/a.json");
        assert_eq!(cfg.fixture_path, PathBuf::from("/tmp/a.json"));
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(10));
        assert!(cfg.openai.is_none());
    }

    #[test]
    fn builder_sets_optional_fields() {
        let cfg = PipelineConfig::default()
            .upstream_timeout(Duration::from_secs(3))
            .openai(OpenAiSettings::new("sk-test").model("gpt-x"));
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(3));
        let openai = cfg.openai.expect("openai should be set");
        assert_eq!(openai.model, "gpt-x");
        assert_eq!(openai.base_url, OpenAiSettings::DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let s = OpenAiSettings::new("k").base_url("http://localhost:9999/v1/");
        assert_eq!(s.base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let s = OpenAiSettings::new("sk-very-secret");
        let debug = format!("{s:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("redacted"));
    }
}
