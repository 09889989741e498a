//! The run summary returned from `Evaluator::run`, and its permalink.

use std::time::Duration;

use crate::error::EvalError;

/// Outcome of one `Evaluator::run` call. Named `EvalResult` (the distilled
/// spec calls it "Result") to avoid colliding with `std::result::Result`.
/// Immutable after construction; `run` always returns one, even when every
/// case failed — failures are carried in `error`, not as an `Err`.
#[derive(Debug)]
pub struct EvalResult {
    pub experiment_id: Option<String>,
    pub name: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub error: Option<EvalError>,
    pub elapsed: Duration,
    pub permalink: String,
}

impl EvalResult {
    #[must_use]
    pub(crate) fn permalink(app_url: &str, org_name: &str, experiment_id: Option<&str>) -> String {
        match experiment_id {
            Some(id) if !org_name.is_empty() => format!(
                "{app_url}/app/{org_name}/object?object_type=experiment&object_id={id}"
            ),
            _ => String::new(),
        }
    }
}

impl std::fmt::Display for EvalResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Experiment: {} ===", self.name)?;
        writeln!(f, "Name: {}", self.name)?;
        let project = self
            .project_name
            .clone()
            .or_else(|| self.project_id.clone())
            .unwrap_or_default();
        writeln!(f, "Project: {project}")?;
        writeln!(f, "Duration: {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Link: {}", self.permalink)?;
        if let Some(error) = &self.error {
            writeln!(f, "Errors:")?;
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
