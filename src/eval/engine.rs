//! The worker-pool evaluator: pulls cases off a channel, runs the nested
//! eval/task/score spans for each, and joins per-case errors into the final
//! [`EvalResult`].
//!
//! Grounded in the teacher's `tokio::spawn` + `mpsc` worker orchestration: a
//! single producer pulls the case source, a fixed pool of workers shares one
//! receiver behind a `tokio::sync::Mutex`, and a `std::sync::Mutex`-guarded
//! `Vec` accumulates errors without ever being held across a user callback.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Instant;

use opentelemetry::trace::{Status, TraceContextExt, Tracer as OtelTracer};
use opentelemetry::{Context, Key, KeyValue, StringValue};
use opentelemetry_sdk::trace::Tracer;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex as TokioMutex};

use braintrust_backend::{BackendClient, ExperimentSpec};

use crate::config::Config;
use crate::error::{EvalError, ExceptionKind};
use crate::eval::case::Case;
use crate::eval::result::EvalResult;
use crate::eval::scorer::{inherit_names, summarize, Scorer, TaskResult};
use crate::eval::task::{Hooks, Task};
use crate::eval::Opts;
use crate::parent::{Parent, ParentContextExt, PARENT_ATTRIBUTE_KEY};
use crate::session::Session;

type CaseItem<I, R> = Result<Case<I, R>, String>;

/// Binds a [`Config`], [`Session`] and registered [`Tracer`] to a concrete
/// `(I, R)` pair at `run` call time. Built by [`crate::client::Client::evaluator`].
pub struct Evaluator {
    config: Config,
    session: Arc<Session>,
    tracer: Tracer,
    backend: Arc<dyn BackendClient>,
}

impl Evaluator {
    pub(crate) fn new(
        config: Config,
        session: Arc<Session>,
        tracer: Tracer,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        Self {
            config,
            session,
            tracer,
            backend,
        }
    }

    /// Registers the experiment, runs every case through the worker pool,
    /// and returns a populated [`EvalResult`] — never an `Err`; failures are
    /// carried inside `EvalResult.error`.
    pub async fn run<I, R>(&self, opts: Opts<I, R>) -> EvalResult
    where
        I: Serialize + Clone + Send + 'static,
        R: Serialize + Send + Sync + 'static,
    {
        let start = Instant::now();
        let quiet = opts.quiet;

        if opts.experiment_name.is_empty() {
            return self.finish_early(
                String::new(),
                start,
                quiet,
                EvalError::Validation("experiment_name must not be empty".to_string()),
            );
        }

        let project_name = opts
            .project_name
            .clone()
            .unwrap_or_else(|| self.config.default_project_name.clone());

        let project = match self
            .backend
            .register_project(&self.config.api_url, &self.config.api_key, &project_name)
            .await
        {
            Ok(project) => project,
            Err(err) => return self.finish_early(opts.experiment_name, start, quiet, EvalError::from(err)),
        };

        let spec = ExperimentSpec {
            name: opts.experiment_name.clone(),
            project_id: project.id.clone(),
            update: opts.update,
            tags: opts.tags.clone(),
            metadata: opts.metadata.clone().map(|m| m.into_iter().collect()).unwrap_or_default(),
        };

        let experiment = match self
            .backend
            .register_experiment(&self.config.api_url, &self.config.api_key, &spec)
            .await
        {
            Ok(experiment) => experiment,
            Err(err) => return self.finish_early(opts.experiment_name, start, quiet, EvalError::from(err)),
        };

        let parent = Parent::experiment_id(experiment.id.clone());
        let worker_count = opts.parallelism.max(1);
        let channel_capacity = (worker_count * 2).min(100);

        let (tx, rx) = mpsc::channel::<CaseItem<I, R>>(channel_capacity);
        let rx = Arc::new(TokioMutex::new(rx));

        let mut cases = opts.cases;
        let producer = tokio::spawn(async move {
            while let Some(item) = cases.next() {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        let task: Arc<dyn Task<I, R>> = Arc::from(opts.task);
        let scorers = Arc::new(opts.scorers);
        let errors: Arc<StdMutex<Vec<EvalError>>> = Arc::new(StdMutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx = Arc::clone(&rx);
            let tracer = self.tracer.clone();
            let task = Arc::clone(&task);
            let scorers = Arc::clone(&scorers);
            let errors = Arc::clone(&errors);
            let parent = parent.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(item) = item else { break };
                    if let Some(err) = run_case(&tracer, &parent, task.as_ref(), &scorers, item).await {
                        errors.lock().unwrap_or_else(PoisonError::into_inner).push(err);
                    }
                }
            }));
        }

        let _ = producer.await;
        for worker in workers {
            let _ = worker.await;
        }

        let collected = {
            let mut guard = errors.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let error = EvalError::join(collected);

        let (_, auth_info) = self.session.info();
        let org_name = auth_info.as_ref().map(|info| info.org_name.clone()).unwrap_or_default();
        let app_url = auth_info
            .map(|info| info.app_public_url)
            .unwrap_or_else(|| self.config.app_url.clone());
        let permalink = EvalResult::permalink(&app_url, &org_name, Some(&experiment.id));

        let result = EvalResult {
            experiment_id: Some(experiment.id),
            name: opts.experiment_name,
            project_id: Some(project.id),
            project_name: Some(project.name),
            error,
            elapsed: start.elapsed(),
            permalink,
        };

        if !quiet {
            println!("{result}");
        }

        result
    }

    fn finish_early(&self, name: String, start: Instant, quiet: bool, error: EvalError) -> EvalResult {
        let result = EvalResult {
            experiment_id: None,
            name,
            project_id: None,
            project_name: None,
            error: Some(error),
            elapsed: start.elapsed(),
            permalink: String::new(),
        };
        if !quiet {
            println!("{result}");
        }
        result
    }
}

fn tags_key_value(tags: &[String]) -> KeyValue {
    let values: Vec<StringValue> = tags.iter().cloned().map(StringValue::from).collect();
    Key::new("braintrust.tags").array(values)
}

fn record_exception(cx: &Context, kind: ExceptionKind, message: &str) {
    cx.span().add_event(
        "exception",
        vec![
            KeyValue::new("exception.type", kind.as_str()),
            KeyValue::new("exception.message", message.to_string()),
        ],
    );
}

fn finalize_eval_span(
    cx: &Context,
    input_json: &str,
    output_json: Option<&str>,
    expected_json: Option<&str>,
    metadata: Option<&Map<String, Value>>,
) {
    let span = cx.span();
    span.set_attribute(KeyValue::new("braintrust.input_json", input_json.to_string()));
    if let Some(output_json) = output_json {
        span.set_attribute(KeyValue::new("braintrust.output_json", output_json.to_string()));
    }
    if let Some(expected_json) = expected_json {
        span.set_attribute(KeyValue::new("braintrust.expected", expected_json.to_string()));
    }
    span.set_attribute(KeyValue::new("braintrust.span_attributes", json!({ "type": "eval" }).to_string()));
    if let Some(metadata) = metadata {
        span.set_attribute(KeyValue::new("braintrust.metadata", Value::Object(metadata.clone()).to_string()));
    }
}

/// Runs the ten-step per-case span sequence: open `eval`, open `task`, run
/// the task, open `score` iff the task succeeded, run scorers, close
/// everything with the right attributes and status. Returns the case's
/// error, if any, for the caller to accumulate.
async fn run_case<I, R>(
    tracer: &Tracer,
    parent: &Parent,
    task: &dyn Task<I, R>,
    scorers: &[Box<dyn Scorer<I, R>>],
    item: CaseItem<I, R>,
) -> Option<EvalError>
where
    I: Serialize + Clone + Send,
    R: Serialize + Send + Sync,
{
    let eval_span = tracer.start("eval");
    let eval_cx = Context::new().with_parent(parent.clone()).with_span(eval_span);
    eval_cx.span().set_attribute(KeyValue::new(PARENT_ATTRIBUTE_KEY, parent.to_string()));

    let case = match item {
        Ok(case) => case,
        Err(message) => {
            record_exception(&eval_cx, ExceptionKind::CaseIterator, &message);
            eval_cx.span().set_status(Status::error(message.clone()));
            eval_cx.span().end();
            return Some(EvalError::CaseIterator(message));
        }
    };

    if let Some(tags) = &case.tags {
        if !tags.is_empty() {
            eval_cx.span().set_attribute(tags_key_value(tags));
        }
    }

    let input_json = serde_json::to_string(&case.input).unwrap_or_default();
    let expected_json = case.expected.as_ref().map(|e| serde_json::to_string(e).unwrap_or_default());

    let task_span = tracer.start_with_context("task", &eval_cx);
    let task_cx = eval_cx.with_span(task_span);
    task_cx.span().set_attribute(KeyValue::new("braintrust.input_json", input_json.clone()));
    if let Some(expected_json) = &expected_json {
        task_cx.span().set_attribute(KeyValue::new("braintrust.expected", expected_json.clone()));
    }
    task_cx
        .span()
        .set_attribute(KeyValue::new("braintrust.span_attributes", json!({ "type": "task" }).to_string()));

    let hooks = Hooks::new(case.expected.as_ref(), case.metadata.as_ref(), case.tags.as_deref(), &task_cx, &eval_cx);
    let task_input = case.input.clone();
    let task_result = task.run(task_input, &hooks).await;

    let output = match task_result {
        Ok(output) => output,
        Err(err) => {
            let message = err.to_string();
            record_exception(&task_cx, ExceptionKind::TaskRun, &message);
            task_cx.span().set_status(Status::error(message.clone()));
            task_cx.span().end();

            record_exception(&eval_cx, ExceptionKind::TaskRun, &message);
            eval_cx.span().set_status(Status::error(message.clone()));
            finalize_eval_span(&eval_cx, &input_json, None, expected_json.as_deref(), case.metadata.as_ref());
            eval_cx.span().end();
            return Some(EvalError::TaskRun(message));
        }
    };

    let output_json = serde_json::to_string(&output).unwrap_or_default();
    task_cx.span().set_attribute(KeyValue::new("braintrust.output_json", output_json.clone()));
    task_cx.span().end();

    let score_span = tracer.start_with_context("score", &eval_cx);
    let score_cx = eval_cx.with_span(score_span);
    score_cx
        .span()
        .set_attribute(KeyValue::new("braintrust.span_attributes", json!({ "type": "score" }).to_string()));

    let task_result_view = TaskResult {
        input: &case.input,
        expected: case.expected.as_ref(),
        output: &output,
        metadata: case.metadata.as_ref(),
    };

    let mut scores = Vec::new();
    let mut scorer_errors = Vec::new();
    for scorer in scorers {
        match scorer.run(&task_result_view).await {
            Ok(produced) => scores.extend(inherit_names(scorer.as_ref(), produced)),
            Err(err) => {
                let message = err.to_string();
                record_exception(&score_cx, ExceptionKind::Scorer, &message);
                score_cx.span().set_status(Status::error(message.clone()));
                scorer_errors.push(message);
            }
        }
    }

    let summary = summarize(&scores);
    score_cx
        .span()
        .set_attribute(KeyValue::new("braintrust.scores", Value::Object(summary.scores).to_string()));
    if let Some(output) = &summary.output {
        score_cx.span().set_attribute(KeyValue::new("braintrust.output", output.to_string()));
    }
    if let Some(metadata) = &summary.metadata {
        score_cx.span().set_attribute(KeyValue::new("braintrust.metadata", metadata.to_string()));
    }
    score_cx.span().end();

    if !scorer_errors.is_empty() {
        let count = scorer_errors.len();
        let message = scorer_errors.join("; ");
        record_exception(&eval_cx, ExceptionKind::Scorer, &message);
        eval_cx.span().set_status(Status::error(message.clone()));
        finalize_eval_span(
            &eval_cx,
            &input_json,
            Some(&output_json),
            expected_json.as_deref(),
            case.metadata.as_ref(),
        );
        eval_cx.span().end();
        return Some(EvalError::Scorer(message, count));
    }

    finalize_eval_span(
        &eval_cx,
        &input_json,
        Some(&output_json),
        expected_json.as_deref(),
        case.metadata.as_ref(),
    );
    eval_cx.span().end();
    None
}
