//! Resolved SDK configuration, plus the `clap::Parser`-based environment
//! loader. Grounded in the teacher's `Env`/`SchwabAuthEnv` split: a fluent
//! builder for explicit values, an env-backed struct for defaults, explicit
//! values always winning.
//!
//! [`Config`] carries the values the evaluator engine keeps reading for the
//! life of a `Client` (org name, default project, …) and is `Clone`.
//! [`TracerOptions`] carries the exporter-pipeline knobs that
//! [`crate::tracer::build_tracer`] consumes exactly once — it holds trait
//! objects, so it is not `Clone` and is moved out of the builder at most once.

use clap::Parser;

use crate::filter::SpanFilter;

pub const DEFAULT_API_URL: &str = "https://api.braintrust.dev";
pub const DEFAULT_APP_URL: &str = "https://www.braintrust.dev";
pub const DEFAULT_PROJECT_NAME: &str = "default-go-project";

/// Resolved, immutable SDK configuration kept for the life of a `Client`.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub app_url: String,
    pub org_name: Option<String>,
    pub default_project_id: Option<String>,
    pub default_project_name: String,
    pub blocking_login: bool,
}

/// Exporter-pipeline knobs consumed exactly once by
/// [`crate::tracer::build_tracer`].
pub struct TracerOptions {
    pub filter_ai_spans: bool,
    pub span_filters: Vec<Box<dyn SpanFilter>>,
    pub custom_processor: Option<Box<dyn opentelemetry_sdk::trace::SpanProcessor>>,
    pub debug_console_log: bool,
}

impl std::fmt::Debug for TracerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerOptions")
            .field("filter_ai_spans", &self.filter_ai_spans)
            .field("span_filter_count", &self.span_filters.len())
            .field("has_custom_processor", &self.custom_processor.is_some())
            .field("debug_console_log", &self.debug_console_log)
            .finish_non_exhaustive()
    }
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            filter_ai_spans: false,
            span_filters: Vec::new(),
            custom_processor: None,
            debug_console_log: false,
        }
    }
}

/// Fluent builder producing a [`Config`]/[`TracerOptions`] pair. Values set
/// here always win over anything [`EnvConfig`] would have supplied.
#[derive(Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    api_url: Option<String>,
    app_url: Option<String>,
    org_name: Option<String>,
    default_project_id: Option<String>,
    default_project_name: Option<String>,
    blocking_login: Option<bool>,
    filter_ai_spans: Option<bool>,
    span_filters: Vec<Box<dyn SpanFilter>>,
    custom_processor: Option<Box<dyn opentelemetry_sdk::trace::SpanProcessor>>,
    debug_console_log: Option<bool>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    #[must_use]
    pub fn api_url(mut self, value: impl Into<String>) -> Self {
        self.api_url = Some(value.into());
        self
    }

    #[must_use]
    pub fn app_url(mut self, value: impl Into<String>) -> Self {
        self.app_url = Some(value.into());
        self
    }

    #[must_use]
    pub fn org_name(mut self, value: impl Into<String>) -> Self {
        self.org_name = Some(value.into());
        self
    }

    #[must_use]
    pub fn default_project_id(mut self, value: impl Into<String>) -> Self {
        self.default_project_id = Some(value.into());
        self
    }

    #[must_use]
    pub fn default_project_name(mut self, value: impl Into<String>) -> Self {
        self.default_project_name = Some(value.into());
        self
    }

    #[must_use]
    pub fn blocking_login(mut self, value: bool) -> Self {
        self.blocking_login = Some(value);
        self
    }

    #[must_use]
    pub fn filter_ai_spans(mut self, value: bool) -> Self {
        self.filter_ai_spans = Some(value);
        self
    }

    #[must_use]
    pub fn add_span_filter(mut self, filter: Box<dyn SpanFilter>) -> Self {
        self.span_filters.push(filter);
        self
    }

    /// Replaces the OTLP/HTTP exporter pipeline entirely with a caller-supplied
    /// processor, e.g. one wrapping an `InMemorySpanExporter` in tests.
    #[must_use]
    pub fn custom_processor(mut self, processor: Box<dyn opentelemetry_sdk::trace::SpanProcessor>) -> Self {
        self.custom_processor = Some(processor);
        self
    }

    #[must_use]
    pub fn debug_console_log(mut self, value: bool) -> Self {
        self.debug_console_log = Some(value);
        self
    }

    /// Fills unset fields from `env`, then validates `api_key`/`app_url` are
    /// non-empty.
    pub fn build_with_env(self, env: &EnvConfig) -> Result<(Config, TracerOptions), ConfigError> {
        let api_key = self.api_key.or_else(|| env.braintrust_api_key.clone());
        let app_url = self
            .app_url
            .or_else(|| env.braintrust_app_url.clone())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());

        let Some(api_key) = api_key.filter(|s| !s.is_empty()) else {
            return Err(ConfigError::MissingApiKey);
        };
        if app_url.is_empty() {
            return Err(ConfigError::MissingAppUrl);
        }

        let config = Config {
            api_key,
            api_url: self
                .api_url
                .or_else(|| env.braintrust_api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            app_url,
            org_name: self.org_name.or_else(|| env.braintrust_org_name.clone()),
            default_project_id: self
                .default_project_id
                .or_else(|| env.braintrust_default_project_id.clone()),
            default_project_name: self
                .default_project_name
                .or_else(|| env.braintrust_default_project.clone())
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            blocking_login: self.blocking_login.unwrap_or(false),
        };

        let tracer_options = TracerOptions {
            filter_ai_spans: self
                .filter_ai_spans
                .or(env.braintrust_otel_filter_ai_spans)
                .unwrap_or(false),
            span_filters: self.span_filters,
            custom_processor: self.custom_processor,
            debug_console_log: self
                .debug_console_log
                .or(env.braintrust_enable_trace_console_log)
                .unwrap_or(false),
        };

        Ok((config, tracer_options))
    }

    /// Equivalent to `build_with_env(&EnvConfig::from_env())`.
    pub fn build(self) -> Result<(Config, TracerOptions), ConfigError> {
        self.build_with_env(&EnvConfig::from_env())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("api key must not be empty (set ConfigBuilder::api_key or BRAINTRUST_API_KEY)")]
    MissingApiKey,

    #[error("app url must not be empty")]
    MissingAppUrl,
}

/// `BRAINTRUST_*` environment variables, read exactly once at construction
/// time via `EnvConfig::from_env()`.
#[derive(Debug, Parser, Default)]
#[command(name = "braintrust-evals", disable_help_flag = true, disable_version_flag = true)]
pub struct EnvConfig {
    #[arg(long, env = "BRAINTRUST_API_KEY")]
    pub braintrust_api_key: Option<String>,

    #[arg(long, env = "BRAINTRUST_API_URL")]
    pub braintrust_api_url: Option<String>,

    #[arg(long, env = "BRAINTRUST_APP_URL")]
    pub braintrust_app_url: Option<String>,

    #[arg(long, env = "BRAINTRUST_ORG_NAME")]
    pub braintrust_org_name: Option<String>,

    #[arg(long, env = "BRAINTRUST_DEFAULT_PROJECT_ID")]
    pub braintrust_default_project_id: Option<String>,

    #[arg(long, env = "BRAINTRUST_DEFAULT_PROJECT")]
    pub braintrust_default_project: Option<String>,

    #[arg(long, env = "BRAINTRUST_ENABLE_TRACE_CONSOLE_LOG")]
    pub braintrust_enable_trace_console_log: Option<bool>,

    #[arg(long, env = "BRAINTRUST_OTEL_FILTER_AI_SPANS")]
    pub braintrust_otel_filter_ai_spans: Option<bool>,
}

impl EnvConfig {
    /// Parses from `std::env`, ignoring any non-env CLI arguments (this is
    /// never handed a real `argv`).
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse_from(std::iter::once(String::new()))
    }

    /// `ConfigBuilder::new().build_with_env(&self)`.
    pub fn into_config(self) -> Result<(Config, TracerOptions), ConfigError> {
        ConfigBuilder::new().build_with_env(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_builder_values_win_over_env() {
        let env = EnvConfig {
            braintrust_api_key: Some("env-key".to_string()),
            braintrust_app_url: Some("https://env.example.com".to_string()),
            ..Default::default()
        };

        let (config, _opts) = ConfigBuilder::new()
            .api_key("explicit-key")
            .build_with_env(&env)
            .unwrap();

        assert_eq!(config.api_key, "explicit-key");
        assert_eq!(config.app_url, "https://env.example.com");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let result = ConfigBuilder::new().build_with_env(&EnvConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn defaults_fill_in_when_nothing_is_supplied() {
        let (config, opts) = ConfigBuilder::new()
            .api_key("key")
            .build_with_env(&EnvConfig::default())
            .unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.app_url, DEFAULT_APP_URL);
        assert_eq!(config.default_project_name, DEFAULT_PROJECT_NAME);
        assert!(!config.blocking_login);
        assert!(!opts.filter_ai_spans);
    }
}
