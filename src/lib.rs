//! Client SDK for running offline AI-model evaluations and exporting their
//! execution as OpenTelemetry traces to a hosted Braintrust backend.
//!
//! A [`Client`] resolves configuration, starts the background auth
//! [`Session`], and registers an OTLP/HTTP tracer provider wrapped by
//! [`BraintrustSpanProcessor`]. Call [`Client::evaluator`] to bind it to a
//! concrete input/output type pair, then [`Evaluator::run`] with an
//! [`Opts`] built from a [`Cases`] source, a [`Task`] and zero or more
//! [`Scorer`]s.
//!
//! This crate never installs a global `tracing` subscriber — it only emits
//! events; wiring a subscriber is the embedding application's job.

mod client;
mod config;
mod error;
mod eval;
mod filter;
mod parent;
mod session;
mod span_processor;
mod tracer;

pub use client::Client;
pub use config::{Config, ConfigBuilder, ConfigError, EnvConfig, TracerOptions, DEFAULT_API_URL, DEFAULT_APP_URL, DEFAULT_PROJECT_NAME};
pub use error::{ClientError, EvalError, ExceptionKind, SessionError, SpanProcessorError, TracerSetupError};
pub use eval::{Case, Cases, EvalResult, Evaluator, Hooks, Opts, Score, Scorer, SimpleTask, Task, TaskResult, VecCases};
pub use filter::{AiOnlyFilter, FilterDecision, SpanFilter};
pub use parent::{Parent, ParentContextExt, ParentKind, PARENT_ATTRIBUTE_KEY};
pub use session::{AuthInfo, Endpoints, Session, SessionOptions};
pub use span_processor::BraintrustSpanProcessor;

pub use braintrust_backend::{
    BackendClient, BackendError, ExperimentRecord, ExperimentSpec, HttpBackendClient, OrgInfo, ProjectRecord,
};
