//! Scenario tests mirroring the eval engine's span-emission contract: one
//! full run through `Client`/`Evaluator` per scenario, spans captured via an
//! in-memory exporter swapped in for the real OTLP pipeline via
//! `TracerOptions::custom_processor`.

use async_trait::async_trait;
use httpmock::prelude::*;
use opentelemetry_sdk::trace::{BatchSpanProcessor, InMemorySpanExporter, SpanData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use braintrust_evals::{
    Case, Cases, Client, ConfigBuilder, EnvConfig, Opts, Score, Scorer, SimpleTask, TaskResult, VecCases,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Input {
    v: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Output {
    r: String,
}

fn mock_registration(mock: &MockServer) {
    mock.mock(|when, then| {
        when.method(POST).path("/api/project/register");
        then.status(200).json_body(json!({"id": "proj-1", "name": "scenario-project"}));
    });
    mock.mock(|when, then| {
        when.method(POST).path("/api/experiment/register");
        then.status(200).json_body(json!({"id": "exp-1", "name": "scenario", "project_id": "proj-1"}));
    });
}

async fn test_client(mock: &MockServer, exporter: InMemorySpanExporter) -> Client {
    let processor = BatchSpanProcessor::builder(exporter).build();
    let (config, options) = ConfigBuilder::new()
        .api_key("__TEST_API_KEY__")
        .api_url(mock.base_url())
        .app_url("https://www.braintrust.dev")
        .blocking_login(true)
        .custom_processor(Box::new(processor))
        .build_with_env(&EnvConfig::default())
        .unwrap();
    Client::new(config, options).await.unwrap()
}

fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes.iter().find(|kv| kv.key.as_str() == key).map(|kv| kv.value.to_string())
}

fn spans_named<'a>(spans: &'a [SpanData], name: &str) -> Vec<&'a SpanData> {
    spans.iter().filter(|s| s.name.as_ref() == name).collect()
}

struct Accuracy;

#[async_trait]
impl Scorer<Input, Output> for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    async fn run(&self, _task_result: &TaskResult<'_, Input, Output>) -> Result<Vec<Score>, Box<dyn std::error::Error + Send + Sync>> {
        let mut metadata = Map::new();
        metadata.insert("note".to_string(), Value::from("good"));
        Ok(vec![Score::new("accuracy", 0.95).with_metadata(metadata)])
    }
}

fn prefixing_task() -> SimpleTask<Input, Output> {
    SimpleTask::new(|input: Input| async move { Ok::<_, std::convert::Infallible>(Output { r: format!("output-{}", input.v) }) })
}

// Scenario 1: two simple cases, one scorer.
#[tokio::test]
async fn two_cases_one_scorer_emit_six_spans_with_expected_attributes() {
    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let mut meta1 = Map::new();
    meta1.insert("key".to_string(), Value::from("value"));

    let cases = vec![
        Case::new(Input { v: "test1".to_string() })
            .with_expected(Output { r: "expected1".to_string() })
            .with_tags(vec!["tag1".to_string(), "tag2".to_string()])
            .with_metadata(meta1),
        Case::new(Input { v: "test2".to_string() }).with_expected(Output { r: "expected2".to_string() }),
    ];

    let opts = Opts::new("scenario-1", VecCases::new(cases), prefixing_task())
        .add_scorer(Accuracy)
        .parallelism(1)
        .quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.is_none());

    client.force_flush().unwrap();
    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 6);

    let names: Vec<_> = spans.iter().map(|s| s.name.to_string()).collect();
    assert_eq!(names, vec!["task", "score", "eval", "task", "score", "eval"]);

    let task_spans = spans_named(&spans, "task");
    assert_eq!(attr(task_spans[0], "braintrust.input_json"), Some(json!({"v": "test1"}).to_string()));
    assert_eq!(attr(task_spans[0], "braintrust.output_json"), Some(json!({"r": "output-test1"}).to_string()));
    assert_eq!(attr(task_spans[0], "braintrust.expected"), Some(json!({"r": "expected1"}).to_string()));

    let score_spans = spans_named(&spans, "score");
    assert_eq!(attr(score_spans[0], "braintrust.scores"), Some(json!({"accuracy": 0.95}).to_string()));
    assert_eq!(attr(score_spans[0], "braintrust.output"), Some(json!({"score": 0.95}).to_string()));
    assert_eq!(attr(score_spans[0], "braintrust.metadata"), Some(json!({"note": "good"}).to_string()));

    let eval_spans = spans_named(&spans, "eval");
    assert!(attr(eval_spans[0], "braintrust.tags").is_some());
    assert_eq!(attr(eval_spans[0], "braintrust.metadata"), Some(json!({"key": "value"}).to_string()));
    assert!(attr(eval_spans[1], "braintrust.tags").is_none());
    assert!(attr(eval_spans[1], "braintrust.metadata").is_none());
}

// Scenario 2: task error on the middle of three cases, no scorers.
#[tokio::test]
async fn task_error_on_one_case_still_scores_siblings_and_surfaces_the_error() {
    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let cases = vec![
        Case::<String, String>::new("test1".to_string()),
        Case::<String, String>::new("error".to_string()),
        Case::<String, String>::new("test2".to_string()),
    ];

    let task = SimpleTask::new(|input: String| async move {
        if input == "error" {
            Err(std::io::Error::other("task blew up"))
        } else {
            Ok(format!("ok-{input}"))
        }
    });

    let opts = Opts::new("scenario-2", VecCases::new(cases), task).parallelism(1).quiet(true);
    let result = client.evaluator().run(opts).await;

    let error = result.error.expect("task failure must surface");
    assert!(error.to_string().contains("task failed"));

    client.force_flush().unwrap();
    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 3 + 2 + 3);

    let eval_spans = spans_named(&spans, "eval");
    assert_eq!(eval_spans.len(), 3);
    assert_eq!(eval_spans[1].status, opentelemetry::trace::Status::error("task blew up"));

    let failed_task_span = spans_named(&spans, "task")[1];
    assert!(failed_task_span.events.iter().any(|e| e.name.as_ref() == "exception"));
}

// Scenario 3: one scorer fails alongside two that succeed.
#[tokio::test]
async fn scorer_error_alongside_surviving_scorers() {
    struct Fixed {
        name: &'static str,
        score: f64,
        fail: bool,
    }

    #[async_trait]
    impl Scorer<String, String> for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _task_result: &TaskResult<'_, String, String>) -> Result<Vec<Score>, Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                Err("bad-scorer blew up".into())
            } else {
                Ok(vec![Score::new(self.name, self.score)])
            }
        }
    }

    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let cases = vec![Case::<String, String>::new("only".to_string())];
    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });

    let opts = Opts::new("scenario-3", VecCases::new(cases), task)
        .add_scorer(Fixed { name: "good-scorer", score: 0.8, fail: false })
        .add_scorer(Fixed { name: "bad-scorer", score: 0.0, fail: true })
        .add_scorer(Fixed { name: "another-good-scorer", score: 0.9, fail: false })
        .parallelism(1)
        .quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.unwrap().to_string().contains("scorer(s) failed"));

    client.force_flush().unwrap();
    let spans = exporter.get_finished_spans().unwrap();
    let score_span = spans_named(&spans, "score")[0];

    assert_eq!(
        attr(score_span, "braintrust.scores"),
        Some(json!({"good-scorer": 0.8, "another-good-scorer": 0.9}).to_string())
    );
    assert_eq!(
        attr(score_span, "braintrust.output"),
        Some(json!({"good-scorer": {"score": 0.8}, "another-good-scorer": {"score": 0.9}}).to_string())
    );
    assert_eq!(score_span.status, opentelemetry::trace::Status::error("bad-scorer blew up"));

    let eval_span = spans_named(&spans, "eval")[0];
    assert_eq!(eval_span.status, opentelemetry::trace::Status::error("bad-scorer blew up"));
}

// Scenario 4: the case iterator itself errors between two valid cases.
#[tokio::test]
async fn iterator_error_between_valid_cases_produces_a_lone_eval_span() {
    struct Sequence {
        remaining: Vec<Result<Case<String, String>, String>>,
    }

    impl Cases<String, String> for Sequence {
        fn next(&mut self) -> Option<Result<Case<String, String>, String>> {
            if self.remaining.is_empty() {
                None
            } else {
                Some(self.remaining.remove(0))
            }
        }
    }

    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let sequence = Sequence {
        remaining: vec![
            Ok(Case::new("first".to_string())),
            Ok(Case::new("second".to_string())),
            Err("iterator exploded".to_string()),
            Ok(Case::new("third".to_string())),
        ],
    };

    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });
    let opts = Opts::new("scenario-4", sequence, task).parallelism(1).quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.unwrap().to_string().contains("iterator exploded"));

    client.force_flush().unwrap();
    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 3 + 3 + 1 + 3);

    let eval_spans = spans_named(&spans, "eval");
    assert_eq!(eval_spans.len(), 4);
    let iterator_error_span = eval_spans[2];
    assert_eq!(iterator_error_span.status, opentelemetry::trace::Status::error("iterator exploded"));
    assert!(iterator_error_span.events.iter().any(|e| e.name.as_ref() == "exception"));
}

// Scenario 5: single scorer metadata flattens rather than nesting.
#[tokio::test]
async fn single_scorer_metadata_flattens_to_a_flat_object() {
    struct WithReasoning;

    #[async_trait]
    impl Scorer<String, String> for WithReasoning {
        fn name(&self) -> &str {
            "accuracy"
        }

        async fn run(&self, _task_result: &TaskResult<'_, String, String>) -> Result<Vec<Score>, Box<dyn std::error::Error + Send + Sync>> {
            let mut metadata = Map::new();
            metadata.insert("reasoning".to_string(), Value::from("Result is good"));
            metadata.insert("confidence".to_string(), Value::from(0.9));
            Ok(vec![Score::new("accuracy", 0.95).with_metadata(metadata)])
        }
    }

    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let cases = vec![Case::<String, String>::new("only".to_string())];
    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });
    let opts = Opts::new("scenario-5", VecCases::new(cases), task).add_scorer(WithReasoning).parallelism(1).quiet(true);

    client.evaluator().run(opts).await;
    client.force_flush().unwrap();

    let spans = exporter.get_finished_spans().unwrap();
    let score_span = spans_named(&spans, "score")[0];

    assert_eq!(attr(score_span, "braintrust.scores"), Some(json!({"accuracy": 0.95}).to_string()));
    assert_eq!(attr(score_span, "braintrust.output"), Some(json!({"score": 0.95}).to_string()));
    assert_eq!(
        attr(score_span, "braintrust.metadata"),
        Some(json!({"reasoning": "Result is good", "confidence": 0.9}).to_string())
    );
}

// Boundary: an empty scorer list still emits one score span with an empty map.
#[tokio::test]
async fn empty_scorer_list_still_emits_a_score_span() {
    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let cases = vec![Case::<String, String>::new("only".to_string())];
    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });
    let opts: Opts<String, String> = Opts::new("scenario-boundary-scorers", VecCases::new(cases), task).quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.is_none());

    client.force_flush().unwrap();
    let spans = exporter.get_finished_spans().unwrap();
    let score_span = spans_named(&spans, "score")[0];

    assert_eq!(attr(score_span, "braintrust.scores"), Some(json!({}).to_string()));
    assert!(attr(score_span, "braintrust.output").is_none());
    assert!(attr(score_span, "braintrust.metadata").is_none());
}

// Boundary: an iterator that ends immediately processes zero cases.
#[tokio::test]
async fn empty_case_iterator_processes_nothing_and_reports_zero_error() {
    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });
    let opts: Opts<String, String> = Opts::new("scenario-boundary-empty", VecCases::new(vec![]), task).quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.is_none());

    client.force_flush().unwrap();
    assert!(exporter.get_finished_spans().unwrap().is_empty());
}

// Boundary: Parallelism of zero is clamped to one rather than deadlocking.
#[tokio::test]
async fn zero_parallelism_is_clamped_to_one() {
    let mock = MockServer::start();
    mock_registration(&mock);
    let exporter = InMemorySpanExporter::default();
    let client = test_client(&mock, exporter.clone()).await;

    let cases = vec![Case::<String, String>::new("only".to_string())];
    let task = SimpleTask::new(|input: String| async move { Ok::<_, std::convert::Infallible>(input) });
    let opts = Opts::new("scenario-boundary-parallelism", VecCases::new(cases), task).parallelism(0).quiet(true);

    let result = client.evaluator().run(opts).await;
    assert!(result.error.is_none());

    client.force_flush().unwrap();
    assert_eq!(exporter.get_finished_spans().unwrap().len(), 3);
}
