//! Parent routing target plus its two propagation channels: an in-process
//! typed [`Context`] slot, and W3C baggage for cross-process callers.

use opentelemetry::baggage::{Baggage, BaggageExt};
use opentelemetry::{Context, KeyValue};
use std::fmt;
use std::str::FromStr;

/// Attribute/baggage key carrying the rendered [`Parent`] on every span.
pub const PARENT_ATTRIBUTE_KEY: &str = "braintrust.parent";

pub(crate) const DEFAULT_PROJECT_NAME: &str = "go-otel-default-project";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    ProjectName,
    ProjectId,
    ExperimentId,
}

impl ParentKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::ProjectName => "project_name",
            Self::ProjectId => "project_id",
            Self::ExperimentId => "experiment_id",
        }
    }
}

impl FromStr for ParentKind {
    type Err = ParseParentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project_name" => Ok(Self::ProjectName),
            "project_id" => Ok(Self::ProjectId),
            "experiment_id" => Ok(Self::ExperimentId),
            other => Err(ParseParentError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseParentError {
    #[error("parent string {0:?} has no \":\" separator")]
    NoSeparator(String),
    #[error("unknown parent kind {0:?}")]
    UnknownKind(String),
}

/// A tagged routing target: which project or experiment a span belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    pub kind: ParentKind,
    pub id: String,
}

impl Parent {
    #[must_use]
    pub fn project_name(name: impl Into<String>) -> Self {
        Self {
            kind: ParentKind::ProjectName,
            id: name.into(),
        }
    }

    #[must_use]
    pub fn project_id(id: impl Into<String>) -> Self {
        Self {
            kind: ParentKind::ProjectId,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn experiment_id(id: impl Into<String>) -> Self {
        Self {
            kind: ParentKind::ExperimentId,
            id: id.into(),
        }
    }

    /// The built-in fallback used when a run has neither a default project id
    /// nor a default project name configured.
    #[must_use]
    pub fn default_fallback() -> Self {
        Self::project_name(DEFAULT_PROJECT_NAME)
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for Parent {
    type Err = ParseParentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ParseParentError::NoSeparator(s.to_string()))?;
        Ok(Self {
            kind: kind.parse()?,
            id: id.to_string(),
        })
    }
}

/// Same-process and cross-process propagation for [`Parent`] via
/// [`Context`]: a typed value for in-process reads, mirrored into W3C
/// baggage for callers that cross a process boundary.
pub trait ParentContextExt {
    #[must_use]
    fn with_parent(&self, parent: Parent) -> Context;
    fn parent(&self) -> Option<Parent>;
}

impl ParentContextExt for Context {
    fn with_parent(&self, parent: Parent) -> Context {
        let rendered = parent.to_string();
        let baggage: Baggage = vec![KeyValue::new(PARENT_ATTRIBUTE_KEY, rendered)]
            .into_iter()
            .collect();
        self.with_value(parent).with_baggage(baggage)
    }

    fn parent(&self) -> Option<Parent> {
        if let Some(parent) = self.get::<Parent>() {
            return Some(parent.clone());
        }

        let raw = self.baggage().get(PARENT_ATTRIBUTE_KEY)?;
        match raw.as_str().parse::<Parent>() {
            Ok(parent) => Some(parent),
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse braintrust.parent baggage, treating as unset");
                None
            }
        }
    }
}
