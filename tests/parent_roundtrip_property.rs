//! Property: rendering a `Parent` to its `kind:id` string and parsing it back
//! recovers an equal `Parent`, for every valid kind and every id that itself
//! contains no `:` (ids with colons are handled by `parses_first_colon_as_separator`
//! in `src/parent.rs`'s own unit tests, not this property).

use proptest::prelude::*;

use braintrust_evals::{Parent, ParentKind};

fn parent_kind() -> impl Strategy<Value = ParentKind> {
    prop_oneof![
        Just(ParentKind::ProjectName),
        Just(ParentKind::ProjectId),
        Just(ParentKind::ExperimentId),
    ]
}

fn colon_free_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,32}".prop_filter("must not contain a colon", |s| !s.contains(':'))
}

fn parent_with(kind: ParentKind, id: String) -> Parent {
    match kind {
        ParentKind::ProjectName => Parent::project_name(id),
        ParentKind::ProjectId => Parent::project_id(id),
        ParentKind::ExperimentId => Parent::experiment_id(id),
    }
}

proptest! {
    #[test]
    fn string_then_parse_roundtrips(kind in parent_kind(), id in colon_free_id()) {
        let original = parent_with(kind, id);
        let rendered = original.to_string();
        let reparsed: Parent = rendered.parse().expect("a Parent's own rendering must parse back");
        prop_assert_eq!(reparsed, original);
    }
}
