//! Evaluation execution: the case stream, the task under test, scorers, the
//! worker-pool engine, and the run summary they produce together.

pub mod case;
pub mod engine;
pub mod result;
pub mod scorer;
pub mod task;

pub use case::{Case, Cases, VecCases};
pub use engine::Evaluator;
pub use result::EvalResult;
pub use scorer::{Score, Scorer, TaskResult};
pub use task::{Hooks, SimpleTask, Task};

use serde_json::{Map, Value};

/// Per-run options passed to [`Evaluator::run`].
pub struct Opts<I, R> {
    pub experiment_name: String,
    pub project_name: Option<String>,
    pub cases: Box<dyn Cases<I, R>>,
    pub task: Box<dyn Task<I, R>>,
    pub scorers: Vec<Box<dyn Scorer<I, R>>>,
    pub tags: Vec<String>,
    pub metadata: Option<Map<String, Value>>,
    pub parallelism: usize,
    pub update: bool,
    pub quiet: bool,
}

impl<I, R> Opts<I, R> {
    /// A single-threaded, non-updating, non-quiet run with no scorers and no
    /// experiment-level tags/metadata — add those with the builder methods.
    #[must_use]
    pub fn new(experiment_name: impl Into<String>, cases: impl Cases<I, R> + 'static, task: impl Task<I, R> + 'static) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            project_name: None,
            cases: Box::new(cases),
            task: Box::new(task),
            scorers: Vec::new(),
            tags: Vec::new(),
            metadata: None,
            parallelism: 1,
            update: false,
            quiet: false,
        }
    }

    #[must_use]
    pub fn project_name(mut self, value: impl Into<String>) -> Self {
        self.project_name = Some(value.into());
        self
    }

    #[must_use]
    pub fn add_scorer(mut self, scorer: impl Scorer<I, R> + 'static) -> Self {
        self.scorers.push(Box::new(scorer));
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn parallelism(mut self, value: usize) -> Self {
        self.parallelism = value;
        self
    }

    #[must_use]
    pub fn update(mut self, value: bool) -> Self {
        self.update = value;
        self
    }

    #[must_use]
    pub fn quiet(mut self, value: bool) -> Self {
        self.quiet = value;
        self
    }
}
