//! The processor that stamps every span with routing and org metadata before
//! handing it to a wrapped exporter-backed processor.
//!
//! Grounded in the teacher's locking discipline around `session.rs`/
//! `tokens.rs`: reads of cached state never happen while a refresh is in
//! flight, and a refresh never blocks the caller on network I/O.

use std::sync::{Arc, RwLock};

use opentelemetry::trace::Span as _;
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};

use crate::filter::{run_chain, SpanFilter};
use crate::parent::{Parent, ParentContextExt, PARENT_ATTRIBUTE_KEY};
use crate::session::Session;

pub(crate) const ORG_ATTRIBUTE_KEY: &str = "braintrust.org";
pub(crate) const APP_URL_ATTRIBUTE_KEY: &str = "braintrust.app_url";

#[derive(Debug, Clone, Default)]
struct CachedIdentity {
    org_name: String,
    app_url: String,
}

/// Wraps a downstream [`SpanProcessor`] (typically a [`opentelemetry_sdk::trace::BatchSpanProcessor`]
/// feeding the OTLP/HTTP exporter) and adds routing and identity attributes,
/// and an opt-in filter chain, to every span that passes through it.
pub struct BraintrustSpanProcessor {
    inner: Box<dyn SpanProcessor>,
    default_parent: Parent,
    filters: Vec<Box<dyn SpanFilter>>,
    session: Arc<Session>,
    cached: RwLock<CachedIdentity>,
}

impl std::fmt::Debug for BraintrustSpanProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraintrustSpanProcessor")
            .field("default_parent", &self.default_parent)
            .field("filter_count", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl BraintrustSpanProcessor {
    #[must_use]
    pub fn new(
        inner: Box<dyn SpanProcessor>,
        default_parent: Parent,
        filters: Vec<Box<dyn SpanFilter>>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            inner,
            default_parent,
            filters,
            session,
            cached: RwLock::new(CachedIdentity::default()),
        }
    }

    fn refresh_cache(&self) {
        let (logged_in, info) = self.session.info();
        if !logged_in {
            return;
        }
        let Some(info) = info else { return };
        let mut cached = self
            .cached
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cached.org_name = info.org_name;
        cached.app_url = info.app_public_url;
    }
}

impl SpanProcessor for BraintrustSpanProcessor {
    fn on_start(&self, span: &mut Span, cx: &Context) {
        self.refresh_cache();

        let already_has_parent = span
            .exported_data()
            .is_some_and(|data| data.attributes.iter().any(|kv| kv.key.as_str() == PARENT_ATTRIBUTE_KEY));

        if !already_has_parent {
            let parent = cx.parent().unwrap_or_else(|| self.default_parent.clone());
            span.set_attribute(KeyValue::new(PARENT_ATTRIBUTE_KEY, parent.to_string()));
        }

        let cached = self
            .cached
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !cached.org_name.is_empty() {
            span.set_attribute(KeyValue::new(ORG_ATTRIBUTE_KEY, cached.org_name.clone()));
        }
        if !cached.app_url.is_empty() {
            span.set_attribute(KeyValue::new(APP_URL_ATTRIBUTE_KEY, cached.app_url.clone()));
        }
        drop(cached);

        self.inner.on_start(span, cx);
    }

    fn on_end(&self, span: SpanData) {
        let is_root = span.parent_span_id == opentelemetry::trace::SpanId::INVALID;
        if is_root || run_chain(&self.filters, &span) {
            self.inner.on_end(span);
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.inner.shutdown()
    }
}
