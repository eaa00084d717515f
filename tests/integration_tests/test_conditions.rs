// library-level tests for condition parsing and matching

use metaquery::conditions::{
    parse_condition, Comparator, Condition, ConditionGroup, ConditionType, Resource,
    ResourceScope,
};
use metaquery::query::{QuerySpecification, SortDirection};
use serde_json::json;

#[test]
fn test_parsed_tree_matches_records() {
    let condition = parse_condition(&json!({
        "operator": "AND",
        "conditions": [
            {"field": "metadata.size", "comparator": ">=", "value": 20},
            {"operator": "NOT", "conditions": [
                {"field": "tags", "comparator": "CONTAINS", "value": "image"}
            ]}
        ]
    }))
    .unwrap();

    assert!(condition.matches(&json!({"metadata": {"size": "250"}, "tags": []})));
    assert!(!condition.matches(&json!({"metadata": {"size": 40}, "tags": ["image"]})));
    assert!(!condition.matches(&json!({"metadata": {"size": 10}, "tags": []})));
}

#[test]
fn test_display_of_parsed_tree() {
    let condition = parse_condition(&json!({
        "operator": "OR",
        "conditions": [
            {"field": "a", "comparator": "EQUALS", "value": "x"},
            {"field": "b", "comparator": "NOT_EXISTS"}
        ]
    }))
    .unwrap();

    assert_eq!(condition.to_string(), r#"(a = "x" OR b NOT_EXISTS)"#);
}

#[test]
fn test_serde_round_trip_preserves_tree() {
    let group = ConditionGroup::and_group([
        Condition::equals("metadata.owner", "ana"),
        Condition::new("metadata.size", Comparator::LessThan, 100),
    ])
    .unwrap();
    let original = ConditionType::from(group);

    let json = serde_json::to_value(&original).unwrap();
    let back: ConditionType = serde_json::from_value(json).unwrap();
    assert_eq!(back, original);
}

#[test]
fn test_tagged_literals_keep_their_type_across_round_trip() {
    let condition = parse_condition(&json!({
        "operator": "OR",
        "conditions": [
            {"field": "metadata.price", "comparator": "EQUALS", "value": {"$decimal": "20.20"}},
            {"field": "metadata.created", "comparator": "<", "value": {"$timestamp": "2024-01-01T00:00:00Z"}}
        ]
    }))
    .unwrap();

    let wire = serde_json::to_value(&condition).unwrap();
    assert_eq!(wire["conditions"][0]["value"], json!({"$decimal": "20.20"}));

    let reparsed = parse_condition(&wire).unwrap();
    assert_eq!(reparsed, condition);

    let cheap = json!({"metadata": {"price": 20.2, "created": "2024-05-01"}});
    let old = json!({"metadata": {"price": 99, "created": "2023-12-31T08:00:00+00:00"}});
    let neither = json!({"metadata": {"price": "20.21", "created": "2024-02-01"}});
    assert!(reparsed.matches(&cheap));
    assert!(reparsed.matches(&old));
    assert!(!reparsed.matches(&neither));
}

#[test]
fn test_unknown_comparator_suggests_close_names() {
    let err = parse_condition(&json!({
        "operator": "AND",
        "conditions": [{"field": "a", "comparator": "BEGINS_WTIH", "value": "x"}]
    }))
    .unwrap_err();

    assert_eq!(err.path, "conditions[0].comparator");
    assert!(err.suggestions.contains(&"BEGINS_WITH".to_string()));
}

#[test]
fn test_resource_scope_then_query() {
    let condition = ConditionType::from(
        ConditionGroup::and_group([
            Condition::equals("dataset.metadata.owner", "ana"),
            Condition::equals("topic.name", "/camera"),
        ])
        .unwrap(),
    );

    let scoped = ResourceScope::new(Resource::Dataset).apply(condition).unwrap();
    assert_eq!(scoped.fields(), vec!["dataset.metadata.owner"]);

    let records = vec![
        json!({"metadata": {"owner": "ana"}, "name": "one"}),
        json!({"metadata": {"owner": "bo"}, "name": "two"}),
    ];
    let page = QuerySpecification::new(scoped).execute(&records).unwrap();
    assert_eq!(page.total_matched, 1);
    assert_eq!(page.items[0]["name"], "one");
}

#[test]
fn test_query_paging_across_pages() {
    let records: Vec<_> = (0..5).map(|i| json!({"n": i})).collect();
    let mut spec = QuerySpecification {
        limit: 2,
        sort_by: Some("n".to_string()),
        sort_direction: Some(SortDirection::Ascending),
        ..QuerySpecification::default()
    };

    let mut seen = Vec::new();
    loop {
        let page = spec.execute(&records).unwrap();
        seen.extend(page.items.iter().map(|r| r["n"].as_i64().unwrap()));
        match page.next_token {
            Some(token) => spec.after = Some(token),
            None => break,
        }
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}
