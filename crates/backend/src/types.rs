use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One organisation entry returned by `POST /api/apikey/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrgInfo {
    pub id: String,
    pub name: String,
    pub api_url: Option<String>,
    pub proxy_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub org_info: Vec<OrgInfo>,
}

/// A registered (or already-existing) project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
}

/// A registered (or reused, when `update` is set) experiment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

/// Parameters for registering (or updating) an experiment.
#[derive(Debug, Clone, Default)]
pub struct ExperimentSpec {
    pub name: String,
    pub project_id: String,
    /// Reuse an existing experiment with the same name instead of creating a
    /// fresh, auto-suffixed one.
    pub update: bool,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}
