//! Layered error taxonomy, one enum per component, grounded in the same
//! "separate concerns, compose with `#[from]`" shape used throughout this
//! codebase's domain error types.

use thiserror::Error;

/// Errors from [`crate::session::Session`] construction and background login.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("api key must not be empty")]
    MissingApiKey,

    #[error("app url must not be empty")]
    MissingAppUrl,

    #[error("organisation {requested:?} not found, available: {available:?}")]
    OrgNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("api key is not part of any organisations")]
    NoOrganisations,

    #[error("login request failed: {0}")]
    Transport(String),
}

/// Errors building the OTLP exporter and tracer provider.
#[derive(Debug, Error)]
pub enum TracerSetupError {
    #[error("invalid OTLP endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),

    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// Currently uninhabited: [`crate::span_processor::BraintrustSpanProcessor`]
/// never fails out of band. A wrapped processor's own failures surface
/// through the `OTelSdkResult` its `force_flush`/`shutdown` return instead.
#[derive(Debug, Error)]
pub enum SpanProcessorError {}

/// Errors constructing a [`crate::client::Client`]: config resolution,
/// session startup, or tracer-provider setup.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Tracer(#[from] TracerSetupError),
}

/// The four exception kinds recorded on spans, plus a language-native
/// fallback, per the span-attribute schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    TaskRun,
    Scorer,
    CaseIterator,
    Eval,
}

impl ExceptionKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::TaskRun => "ErrTaskRun",
            Self::Scorer => "ErrScorer",
            Self::CaseIterator => "ErrCaseIterator",
            Self::Eval => "ErrEval",
        }
    }
}

fn join_display(errors: &[EvalError]) -> String {
    errors
        .iter()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors the evaluator engine can encounter per case, and the joined form
/// `run` hands back inside `EvalResult.error`.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("eval validation failed: {0}")]
    Validation(String),

    #[error("task failed: {0}")]
    TaskRun(String),

    #[error("{1} scorer(s) failed: {0}")]
    Scorer(String, usize),

    #[error("case iterator failed: {0}")]
    CaseIterator(String),

    #[error("{} case(s) failed:\n{}", .0.len(), join_display(.0))]
    Joined(Vec<EvalError>),

    #[error("backend registration failed: {0}")]
    Backend(#[from] braintrust_backend::BackendError),
}

impl EvalError {
    /// Joins per-case errors into a single displayable error, or `None` if
    /// the list is empty — mirrors the "Run aggregates errors ... with a
    /// join operator" requirement.
    pub(crate) fn join(errors: Vec<Self>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self::Joined(errors))
        }
    }
}
