//! Thin HTTP/JSON client for the hosted Braintrust backend.
//!
//! This crate deliberately covers only what the eval SDK needs to register
//! itself with the backend: logging in with an API key, and registering a
//! project and an experiment. The backend's full surface (datasets,
//! functions, experiment CRUD beyond registration) is out of scope; swap in
//! a different [`BackendClient`] to talk to a different implementation of
//! that surface, or to a mock during tests.

mod client;
mod error;
mod types;

pub use client::{BackendClient, HttpBackendClient};
pub use error::BackendError;
pub use types::{ExperimentRecord, ExperimentSpec, OrgInfo, ProjectRecord};
