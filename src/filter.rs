//! Span filter chain evaluated in [`crate::span_processor::BraintrustSpanProcessor::on_end`].
//!
//! Grounded in the teacher's ordered, first-match-wins predicate chains (the
//! `Broker` trait's retry/skip classification in `crates/broker/src/lib.rs`):
//! filters are tried in order, the first one to return an opinion wins, and a
//! chain that abstains entirely defaults to keeping the span.

use opentelemetry_sdk::trace::SpanData;

/// A filter's opinion on whether a finished span should be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Drop,
    Abstain,
}

/// Evaluated in registration order against every non-root span; see
/// [`FilterDecision`] for how chain results combine.
pub trait SpanFilter: Send + Sync {
    fn evaluate(&self, span: &SpanData) -> FilterDecision;
}

const SYSTEM_ATTRIBUTE_KEYS: [&str; 3] = [
    crate::parent::PARENT_ATTRIBUTE_KEY,
    crate::span_processor::ORG_ATTRIBUTE_KEY,
    crate::span_processor::APP_URL_ATTRIBUTE_KEY,
];

const AI_PREFIXES: [&str; 5] = ["gen_ai.", "braintrust.", "llm.", "ai.", "traceloop."];

/// Keeps spans whose name, or any non-system attribute key, carries one of
/// the known AI/LLM instrumentation prefixes. Opt-in via
/// `Config::filter_ai_spans`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AiOnlyFilter;

impl SpanFilter for AiOnlyFilter {
    fn evaluate(&self, span: &SpanData) -> FilterDecision {
        if has_ai_prefix(&span.name) {
            return FilterDecision::Keep;
        }

        let carries_ai_attribute = span.attributes.iter().any(|kv| {
            let key = kv.key.as_str();
            !SYSTEM_ATTRIBUTE_KEYS.contains(&key) && has_ai_prefix(key)
        });

        if carries_ai_attribute {
            FilterDecision::Keep
        } else {
            FilterDecision::Drop
        }
    }
}

fn has_ai_prefix(s: &str) -> bool {
    AI_PREFIXES.iter().any(|prefix| s.starts_with(prefix))
}

/// Runs `filters` in order; the first non-abstaining decision wins. An empty
/// chain, or a chain where every filter abstains, keeps the span.
pub(crate) fn run_chain(filters: &[Box<dyn SpanFilter>], span: &SpanData) -> bool {
    for filter in filters {
        match filter.evaluate(span) {
            FilterDecision::Keep => return true,
            FilterDecision::Drop => return false,
            FilterDecision::Abstain => continue,
        }
    }
    true
}
