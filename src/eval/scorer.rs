//! Scorers grade a task's output, and the aggregation that turns their
//! results into the `score` span's attribute shape.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::eval::task::Hooks;

/// `{ input, expected, output, metadata }` handed to every scorer, built
/// once the task has produced an output.
pub struct TaskResult<'a, I, R> {
    pub input: &'a I,
    pub expected: Option<&'a R>,
    pub output: &'a R,
    pub metadata: Option<&'a Map<String, Value>>,
}

/// One named score. An empty `name` inherits the producing scorer's name.
#[derive(Debug, Clone)]
pub struct Score {
    pub name: String,
    pub score: f64,
    pub metadata: Option<Map<String, Value>>,
}

impl Score {
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Grades a [`TaskResult`], producing one or more [`Score`]s.
#[async_trait]
pub trait Scorer<I, R>: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        task_result: &TaskResult<'_, I, R>,
    ) -> Result<Vec<Score>, Box<dyn std::error::Error + Send + Sync>>;
}

/// The accumulated score-span attribute layout: a flat `name -> score` map
/// always; `output`/`metadata` flattened to a single `{"score": v}` shape for
/// exactly one accumulated score, nested to a `name -> value` map shape for
/// two or more, and omitted entirely when there are zero.
pub struct ScoreSummary {
    pub scores: Map<String, Value>,
    pub output: Option<Value>,
    pub metadata: Option<Value>,
}

pub(crate) fn summarize(scores: &[Score]) -> ScoreSummary {
    let mut scores_map = Map::new();
    for score in scores {
        scores_map.insert(score.name.clone(), Value::from(score.score));
    }

    let (output, metadata) = match scores {
        [] => (None, None),
        [single] => {
            let output = Value::from(serde_json::json!({ "score": single.score }));
            let metadata = single.metadata.clone().map(Value::Object);
            (Some(output), metadata)
        }
        many => {
            let mut output_map = Map::new();
            let mut metadata_map = Map::new();
            for score in many {
                output_map.insert(score.name.clone(), Value::from(serde_json::json!({ "score": score.score })));
                if let Some(metadata) = &score.metadata {
                    metadata_map.insert(score.name.clone(), Value::Object(metadata.clone()));
                }
            }
            let metadata = if metadata_map.is_empty() {
                None
            } else {
                Some(Value::Object(metadata_map))
            };
            (Some(Value::Object(output_map)), metadata)
        }
    };

    ScoreSummary {
        scores: scores_map,
        output,
        metadata,
    }
}

/// Resolve an empty `Score.name` to the producing scorer's name — applied
/// as each scorer's results come back, before accumulation.
pub(crate) fn inherit_names<I, R>(scorer: &dyn Scorer<I, R>, mut scores: Vec<Score>) -> Vec<Score> {
    for score in &mut scores {
        if score.name.is_empty() {
            score.name = scorer.name().to_string();
        }
    }
    scores
}
