//! The top-level handle: resolved config, the background auth session, and
//! the registered tracer provider, bound together so [`Evaluator`]s can be
//! minted per `(I, R)` pair without repeating setup.

use std::sync::Arc;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::SdkTracerProvider;

use braintrust_backend::{BackendClient, HttpBackendClient};

use crate::config::{Config, ConfigBuilder, TracerOptions};
use crate::error::{ClientError, SessionError};
use crate::eval::Evaluator;
use crate::session::{Session, SessionOptions};
use crate::tracer::build_tracer;

const TRACER_NAME: &str = "braintrust-evals";

/// Owns the resolved [`Config`], the background [`Session`], the registered
/// [`SdkTracerProvider`], and the [`BackendClient`] used to register
/// projects and experiments.
pub struct Client {
    config: Config,
    session: Arc<Session>,
    tracer_provider: SdkTracerProvider,
    backend: Arc<dyn BackendClient>,
}

impl Client {
    /// Builds a client from an already-resolved `Config`/`TracerOptions`
    /// pair (see [`ConfigBuilder::build`]). Awaits login before returning
    /// when `config.blocking_login` is set; otherwise login proceeds on its
    /// own background task.
    pub async fn new(config: Config, options: TracerOptions) -> Result<Self, ClientError> {
        let session = Session::new(SessionOptions {
            app_url: config.app_url.clone(),
            api_url: Some(config.api_url.clone()),
            api_key: config.api_key.clone(),
            org_name: config.org_name.clone(),
        })?;

        if config.blocking_login {
            session.login().await?;
        }

        let tracer_provider = build_tracer(&config, options, Arc::clone(&session))?;

        Ok(Self {
            config,
            session,
            tracer_provider,
            backend: Arc::new(HttpBackendClient::new()),
        })
    }

    /// `Client::new` with `Config`/`TracerOptions` resolved from
    /// `ConfigBuilder::new().build()` — explicit defaults plus whatever
    /// `BRAINTRUST_*` environment variables are set.
    pub async fn from_env() -> Result<Self, ClientError> {
        let (config, options) = ConfigBuilder::new().build()?;
        Self::new(config, options).await
    }

    /// Awaits the background login, surfacing its error if it failed.
    /// Non-blocking callers can instead read [`Session::info`] /
    /// [`Session::endpoints`] through this client's evaluators.
    pub async fn login(&self) -> Result<(), SessionError> {
        self.session.login().await
    }

    /// Binds this client's config, session and tracer to a concrete
    /// `(I, R)` pair for one `run` call. Cheap: clones an `Arc` and a small
    /// `Config`, and asks the tracer provider for a named `Tracer` handle.
    #[must_use]
    pub fn evaluator(&self) -> Evaluator {
        let tracer = self.tracer_provider.tracer(TRACER_NAME);
        Evaluator::new(self.config.clone(), Arc::clone(&self.session), tracer, Arc::clone(&self.backend))
    }

    /// Forwards to the registered tracer provider; blocks until every
    /// processor has exported its buffered spans.
    pub fn force_flush(&self) -> OTelSdkResult {
        self.tracer_provider.force_flush()
    }

    /// Shuts down the tracer provider (draining its processors) then closes
    /// the background session. The client is a DAG rooted here, not a cycle:
    /// the session never holds a handle back to the provider.
    pub fn shutdown(&self) -> OTelSdkResult {
        let result = self.tracer_provider.shutdown();
        self.session.close();
        result
    }
}
