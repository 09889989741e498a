//! The user-supplied transformation under test, and the handles it receives
//! into the current task/eval spans.

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use serde_json::{Map, Value};

/// Everything a [`Task`] needs besides the input: the case's expected value,
/// metadata and tags, and handles to the current task span and the
/// enclosing eval span so the task may attach further attributes to either.
pub struct Hooks<'a, R> {
    pub expected: Option<&'a R>,
    pub metadata: Option<&'a Map<String, Value>>,
    pub tags: Option<&'a [String]>,
    task_cx: &'a Context,
    eval_cx: &'a Context,
}

impl<'a, R> Hooks<'a, R> {
    pub(crate) fn new(
        expected: Option<&'a R>,
        metadata: Option<&'a Map<String, Value>>,
        tags: Option<&'a [String]>,
        task_cx: &'a Context,
        eval_cx: &'a Context,
    ) -> Self {
        Self {
            expected,
            metadata,
            tags,
            task_cx,
            eval_cx,
        }
    }

    /// Attach an attribute to the current `task` span.
    pub fn set_task_attribute(&self, key: &'static str, value: impl Into<opentelemetry::Value>) {
        self.task_cx.span().set_attribute(opentelemetry::KeyValue::new(key, value.into()));
    }

    /// Attach an attribute to the enclosing `eval` span.
    pub fn set_eval_attribute(&self, key: &'static str, value: impl Into<opentelemetry::Value>) {
        self.eval_cx.span().set_attribute(opentelemetry::KeyValue::new(key, value.into()));
    }
}

/// The async transformation under test: `(input, hooks) -> Result<output, error>`.
#[async_trait]
pub trait Task<I, R>: Send + Sync {
    async fn run(
        &self,
        input: I,
        hooks: &Hooks<'_, R>,
    ) -> Result<R, Box<dyn std::error::Error + Send + Sync>>;
}

/// Adapts a plain `async fn(I) -> Result<R, E>` closure into a [`Task`],
/// for callers who don't need hook access.
pub struct SimpleTask<I, R> {
    #[allow(clippy::type_complexity)]
    f: Box<dyn Fn(I) -> BoxFuture<'static, Result<R, Box<dyn std::error::Error + Send + Sync>>> + Send + Sync>,
}

impl<I, R> SimpleTask<I, R> {
    pub fn new<F, Fut, E>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            f: Box::new(move |input| {
                let fut = f(input);
                Box::pin(async move { fut.await.map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>) })
            }),
        }
    }
}

#[async_trait]
impl<I: Send + 'static, R: Send + 'static> Task<I, R> for SimpleTask<I, R> {
    async fn run(
        &self,
        input: I,
        _hooks: &Hooks<'_, R>,
    ) -> Result<R, Box<dyn std::error::Error + Send + Sync>> {
        (self.f)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_task_forwards_ok_result() {
        let task = SimpleTask::new(|input: i32| async move { Ok::<_, std::convert::Infallible>(input * 2) });
        let task_cx = Context::new();
        let eval_cx = Context::new();
        let hooks = Hooks::<i32>::new(None, None, None, &task_cx, &eval_cx);
        let result = task.run(21, &hooks).await.unwrap();
        assert_eq!(result, 42);
    }
}
