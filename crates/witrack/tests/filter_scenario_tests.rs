//! End-to-end filter behavior against an in-memory fixture


use harness::{ids, TestHarness};
use witrack::config::{QueryConfig, WitrackConfig};
use witrack::domain::{WorkItem, WorkItemUpdate};
use witrack::filter::{parse_filter, SearchRequest, SpaceScope};
use witrack::storage::WorkItemStore;
use witrack::{ErrorDocument, QueryError};

/// Space with labels important/backend/ui/rest on disjoint sets of items
struct LabelFixture {
    harness: TestHarness,
    space: String,
    important: Vec<String>,
    backend: Vec<String>,
    ui: Vec<String>,
    unlabelled: Vec<String>,
}

fn label_fixture() -> LabelFixture {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let labels = ["important", "backend", "ui", "rest"].map(|name| harness.label(&space, name));

    let tagged = |label: &str, count: usize| -> Vec<String> {
        (0..count)
            .map(|i| {
                harness.save(
                    WorkItem::new(&space, "task", format!("{} #{}", label, i)).with_labels([label]),
                )
            })
            .collect()
    };
    let important = tagged(&labels[0], 3);
    let ui = tagged(&labels[2], 5);
    let backend = tagged(&labels[1], 3);
    let unlabelled = vec![
        harness.item(&space, "task", "plain"),
        harness.save(WorkItem::new(&space, "task", "cleared").with_labels(Vec::<String>::new())),
    ];

    LabelFixture {
        harness,
        space,
        important,
        backend,
        ui,
        unlabelled,
    }
}

#[test]
fn test_label_in_matches_union_of_labelled_items() {
    let f = label_fixture();

    let result = f
        .harness
        .search(r#"{"label": {"$IN": ["important", "ui"]}}"#);

    assert_eq!(result.total_count, 8);
    let mut expected = f.important.clone();
    expected.extend(f.ui.clone());
    assert_eq!(ids(&result.items), expected);
}

#[test]
fn test_negated_label_in_space_is_complement() {
    let f = label_fixture();

    let result = f.harness.search(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"label": "backend", "negate": true}}]}}"#,
        f.space
    ));

    assert_eq!(result.total_count, 10);
    let returned = ids(&result.items);
    assert!(f.backend.iter().all(|id| !returned.contains(id)));
    assert!(f.unlabelled.iter().all(|id| returned.contains(id)));
}

#[test]
fn test_label_null_matches_unset_and_empty() {
    let f = label_fixture();

    let returned = f.harness.ids(r#"{"label": null}"#);
    assert_eq!(returned, f.unlabelled);

    let labelled = f.harness.search(r#"{"label": {"$NE": null}}"#);
    assert_eq!(labelled.total_count, 11);
}

#[test]
fn test_label_name_join() {
    let f = label_fixture();
    assert_eq!(f.harness.ids(r#"{"label.name": "backend"}"#), f.backend);
    assert_eq!(
        f.harness
            .search(r#"{"label.name": {"$SUBSTR": "port"}}"#)
            .total_count,
        3
    );
}

#[test]
fn test_unknown_type_group_under_valid_space_matches_nothing() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    harness.item(&space, "task", "A");

    let result = harness.search(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"typegroup.name": "No Such Group"}}]}}"#,
        space
    ));
    assert_eq!(result.total_count, 0);
    assert!(result.items.is_empty());
}

#[test]
fn test_type_group_membership() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    harness.type_group(&space, "Scenarios", &["scenario", "fundamental"]);
    let scenario = harness.item(&space, "scenario", "Login");
    let fundamental = harness.item(&space, "fundamental", "Auth");
    let bug = harness.item(&space, "bug", "Crash");

    let by_name = harness.ids(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"typegroup.name": "Scenarios"}}]}}"#,
        space
    ));
    assert_eq!(by_name, vec![scenario.clone(), fundamental.clone()]);

    let bare = harness.ids(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"Scenarios": "true"}}]}}"#,
        space
    ));
    assert_eq!(bare, vec![scenario, fundamental]);

    let outside = harness.ids(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"Scenarios": {{"$NE": "true"}}}}]}}"#,
        space
    ));
    assert_eq!(outside, vec![bug]);
}

#[test]
fn test_unknown_bare_group_under_valid_space_matches_nothing() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    harness.item(&space, "task", "A");

    let result = harness.search(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"NoSuchGroup": "x"}}]}}"#,
        space
    ));
    assert_eq!(result.total_count, 0);
    assert!(result.items.is_empty());
}

#[test]
fn test_unknown_bare_key_is_rejected_in_strict_mode() {
    let strict = TestHarness::with_config(&WitrackConfig {
        query: Some(QueryConfig {
            strict_keys: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    });
    let space = strict.space("Platform");
    strict.item(&space, "task", "A");

    let filter = format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"stat": "open"}}]}}"#,
        space
    );
    assert!(matches!(
        strict.search_err(&filter),
        QueryError::UnknownKey { .. }
    ));
}

#[test]
fn test_missing_closing_brace_yields_single_error_with_id() {
    let harness = TestHarness::new();

    let err = harness.search_err(r#"{"state": "open""#);
    assert!(matches!(err, QueryError::Syntax(_)));

    let document = ErrorDocument::from_error(&err);
    assert_eq!(document.errors.len(), 1);
    assert!(!document.errors[0].id.is_empty());
    assert_eq!(document.errors[0].status, "400");
}

#[test]
fn test_negate_with_null_is_invalid_combination() {
    let harness = TestHarness::new();
    let err = harness.search_err(r#"{"assignee": null, "negate": true}"#);
    assert!(matches!(err, QueryError::InvalidCombination(_)));
    assert_eq!(err.code(), "invalid_combination");
}

#[test]
fn test_assignee_null_survives_unrelated_update() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let unassigned = harness.item(&space, "task", "Nobody");
    harness.save(WorkItem::new(&space, "task", "Somebody").with_assignees(["alice"]));

    assert_eq!(harness.ids(r#"{"assignee": null}"#), vec![unassigned.clone()]);

    harness
        .storage
        .update_work_item(
            &unassigned,
            &WorkItemUpdate {
                title: Some("Still nobody".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(harness.ids(r#"{"assignee": null}"#), vec![unassigned]);
}

#[test]
fn test_iteration_name_confined_to_space() {
    let harness = TestHarness::new();
    let alpha = harness.space("Alpha");
    let beta = harness.space("Beta");
    let alpha_sprint = harness.iteration(&alpha, "Sprint 1");
    let beta_sprint = harness.iteration(&beta, "Sprint 1");
    let in_alpha = harness.save(WorkItem::new(&alpha, "task", "A").with_iteration(&alpha_sprint));
    let in_beta = harness.save(WorkItem::new(&beta, "task", "B").with_iteration(&beta_sprint));

    let scoped = harness.ids(&format!(
        r#"{{"$AND": [{{"space": "{}"}}, {{"iteration.name": "Sprint 1"}}]}}"#,
        alpha
    ));
    assert_eq!(scoped, vec![in_alpha.clone()]);

    let unscoped = harness.ids(r#"{"iteration.name": "Sprint 1"}"#);
    assert_eq!(unscoped, vec![in_alpha, in_beta]);
}

#[test]
fn test_ne_does_not_match_unset_but_negate_does() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let sprint = harness.iteration(&space, "Sprint 1");
    let planned = harness.save(WorkItem::new(&space, "task", "planned").with_iteration(&sprint));
    let unplanned = harness.item(&space, "task", "unplanned");
    let other = harness.iteration(&space, "Sprint 2");
    let elsewhere = harness.save(WorkItem::new(&space, "task", "later").with_iteration(&other));

    let ne = harness.ids(&format!(r#"{{"iteration": {{"$NE": "{}"}}}}"#, sprint));
    assert_eq!(ne, vec![elsewhere.clone()]);

    let negated = harness.ids(&format!(
        r#"{{"iteration": "{}", "negate": true}}"#,
        sprint
    ));
    assert_eq!(negated, vec![unplanned, elsewhere]);
    assert!(!negated.contains(&planned));
}

#[test]
fn test_substr_is_case_sensitive() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let safari = harness.item(&space, "bug", "Login fails on Safari");
    harness.item(&space, "bug", "login fails on chrome");

    assert_eq!(harness.ids(r#"{"title": {"$SUBSTR": "Login"}}"#), vec![safari]);
}

#[test]
fn test_and_or_over_direct_fields() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let open_bug = harness.save(WorkItem::new(&space, "bug", "A").with_state("open"));
    let closed_bug = harness.save(WorkItem::new(&space, "bug", "B").with_state("closed"));
    let open_task = harness.save(WorkItem::new(&space, "task", "C").with_state("open"));

    assert_eq!(
        harness.ids(r#"{"$AND": [{"type": "bug"}, {"state": "open"}]}"#),
        vec![open_bug.clone()]
    );
    assert_eq!(
        harness.ids(r#"{"$OR": [{"workitemtype": "bug"}, {"state": "Open"}]}"#),
        vec![open_bug.clone(), closed_bug.clone(), open_task.clone()]
    );
    assert_eq!(
        harness.ids(r#"{"state": {"$IN": ["closed", "resolved"]}}"#),
        vec![closed_bug]
    );
    assert_eq!(
        harness.ids(r#"{"type": "bug", "state": "open"}"#),
        vec![open_bug]
    );
}

#[test]
fn test_same_filter_twice_is_identical() {
    let f = label_fixture();
    let filter = format!(
        r#"{{"$OR": [{{"space": "{}"}}, {{"label": "ui"}}], "$OPTS": {{"tree_view": true}}}}"#,
        f.space
    );

    let first = f.harness.search(&filter);
    let second = f.harness.search(&filter);
    assert_eq!(first, second);
}

#[test]
fn test_total_count_ignores_paging() {
    let f = label_fixture();

    let page = f
        .harness
        .filter
        .search(&SearchRequest::new(r#"{"label": "ui"}"#).with_page(2, 2))
        .unwrap();

    assert_eq!(page.total_count, 5);
    assert_eq!(ids(&page.items), f.ui[2..4].to_vec());
}

#[test]
fn test_request_space_parameter_scopes_results() {
    let harness = TestHarness::new();
    let alpha = harness.space("Alpha");
    let beta = harness.space("Beta");
    let a = harness.item(&alpha, "bug", "A");
    harness.item(&beta, "bug", "B");

    let result = harness
        .filter
        .search(&SearchRequest::new(r#"{"type": "bug"}"#).in_space(&alpha))
        .unwrap();
    assert_eq!(ids(&result.items), vec![a]);
}

#[test]
fn test_scope_includes_every_space_comparison() {
    let harness = TestHarness::new();
    let alpha = harness.space("Alpha");
    let beta = harness.space("Beta");

    let document = parse_filter(
        format!(
            r#"{{"$OR": [{{"space": "{}"}}, {{"$AND": [{{"state": "open"}}, {{"space": "{}"}}]}}]}}"#,
            alpha, beta
        )
        .as_bytes(),
    )
    .unwrap();
    let compiled = harness.filter.compile(&document, None).unwrap();

    assert_eq!(compiled.scope(), &SpaceScope::of([alpha, beta]));
}

#[test]
fn test_creator_and_description() {
    let harness = TestHarness::new();
    let space = harness.space("Platform");
    let by_alice = harness.save(
        WorkItem::new(&space, "bug", "A")
            .with_creator("alice")
            .with_description("Fails when the cart is empty"),
    );
    let by_bob = harness.save(WorkItem::new(&space, "bug", "B").with_creator("bob"));
    let anonymous = harness.item(&space, "bug", "C");

    assert_eq!(harness.ids(r#"{"creator": "alice"}"#), vec![by_alice.clone()]);
    assert_eq!(harness.ids(r#"{"creator": null}"#), vec![anonymous]);
    assert_eq!(
        harness.ids(r#"{"description": {"$SUBSTR": "cart"}}"#),
        vec![by_alice.clone()]
    );
    assert_eq!(
        harness.ids(r#"{"creator": {"$NE": "alice"}}"#),
        vec![by_bob]
    );
}
