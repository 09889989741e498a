//! Builds the `SdkTracerProvider` the rest of the SDK registers spans on.
//!
//! Endpoint construction and the scheme-based insecure-mode switch are
//! grounded in the teacher's `telemetry.rs`, which builds its HyperDX/Schwab
//! OTLP endpoint the same way: parse, discard any caller-supplied path,
//! append the fixed collector path.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider};
use url::Url;

use crate::config::{Config, TracerOptions};
use crate::error::TracerSetupError;
use crate::parent::Parent;
use crate::session::Session;
use crate::span_processor::BraintrustSpanProcessor;

const OTLP_TRACES_PATH: &str = "/otel/v1/traces";
const BATCH_MAX_QUEUE_SIZE: usize = 2048;
const BATCH_MAX_EXPORT_BATCH_SIZE: usize = 512;
const BATCH_SCHEDULED_DELAY: Duration = Duration::from_secs(5);

fn otlp_endpoint(api_url: &str) -> Result<String, TracerSetupError> {
    let parsed = Url::parse(api_url)
        .map_err(|e| TracerSetupError::InvalidEndpoint(api_url.to_string(), e.to_string()))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(TracerSetupError::InvalidEndpoint(
            api_url.to_string(),
            format!("unsupported scheme {scheme:?}"),
        ));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| TracerSetupError::InvalidEndpoint(api_url.to_string(), "missing host".to_string()))?;

    let mut endpoint = format!("{scheme}://{host}");
    if let Some(port) = parsed.port() {
        endpoint.push_str(&format!(":{port}"));
    }
    endpoint.push_str(OTLP_TRACES_PATH);
    Ok(endpoint)
}

fn default_parent(config: &Config) -> Parent {
    if let Some(id) = &config.default_project_id {
        Parent::project_id(id.clone())
    } else if !config.default_project_name.is_empty() {
        Parent::project_name(config.default_project_name.clone())
    } else {
        Parent::default_fallback()
    }
}

/// Builds the registered tracer provider: `options.custom_processor` if
/// supplied (test hook), otherwise an OTLP/HTTP exporter batched and wrapped
/// by [`BraintrustSpanProcessor`]; optionally mirrored to stdout for
/// debugging. Consumes `options` — the exporter pipeline is built exactly
/// once per `Client`.
pub fn build_tracer(
    config: &Config,
    options: TracerOptions,
    session: Arc<Session>,
) -> Result<SdkTracerProvider, TracerSetupError> {
    let parent = default_parent(config);

    let mut filters = options.span_filters;
    if options.filter_ai_spans {
        filters.push(Box::new(crate::filter::AiOnlyFilter));
    }

    let braintrust_processor: Box<dyn opentelemetry_sdk::trace::SpanProcessor> =
        if let Some(custom) = options.custom_processor {
            custom
        } else {
            let endpoints = session.endpoints();
            let endpoint = otlp_endpoint(&endpoints.api_url)?;

            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::HttpBinary)
                .with_headers(std::collections::HashMap::from([(
                    "authorization".to_string(),
                    format!("Bearer {}", endpoints.api_key),
                )]))
                .build()?;

            let batch = BatchSpanProcessor::builder(exporter)
                .with_max_queue_size(BATCH_MAX_QUEUE_SIZE)
                .with_max_export_batch_size(BATCH_MAX_EXPORT_BATCH_SIZE)
                .with_scheduled_delay(BATCH_SCHEDULED_DELAY)
                .build();

            Box::new(BraintrustSpanProcessor::new(
                Box::new(batch),
                parent,
                filters,
                Arc::clone(&session),
            ))
        };

    let mut builder = SdkTracerProvider::builder().with_span_processor(braintrust_processor);

    if options.debug_console_log {
        let console_exporter = opentelemetry_stdout::SpanExporter::default();
        let console_batch = BatchSpanProcessor::builder(console_exporter).build();
        builder = builder.with_span_processor(console_batch);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_fixed_traces_path_from_bare_host() {
        let endpoint = otlp_endpoint("https://api.braintrust.dev").unwrap();
        assert_eq!(endpoint, "https://api.braintrust.dev/otel/v1/traces");
    }

    #[test]
    fn discards_a_caller_supplied_path() {
        let endpoint = otlp_endpoint("https://api.braintrust.dev/some/other/path").unwrap();
        assert_eq!(endpoint, "https://api.braintrust.dev/otel/v1/traces");
    }

    #[test]
    fn keeps_explicit_port() {
        let endpoint = otlp_endpoint("http://localhost:4318").unwrap();
        assert_eq!(endpoint, "http://localhost:4318/otel/v1/traces");
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(otlp_endpoint("not a url").is_err());
    }
}
