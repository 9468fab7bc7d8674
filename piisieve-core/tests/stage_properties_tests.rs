// piisieve-core/tests/stage_properties_tests.rs
//! Behaviour of the individual stages wired together by hand, without storage.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use piisieve_core::metrics::{aggregate, ProgressLogEntry, FLOW_PROGRESS};
use piisieve_core::router::route_all;
use piisieve_core::selector::{failed_rule_set, plan_for};
use piisieve_core::{
    apply, compile_rules, evaluate, route, EvaluationEvent, QuarantinedRecord, Record, Routed, RuleSet, RuleTable,
    RuleTemplate,
};

fn rec(v: Value) -> Record {
    v.as_object().cloned().unwrap()
}

fn default_rules(columns: &[&str]) -> RuleSet {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    compile_rules(&RuleTable::load_default().unwrap(), &columns).unwrap()
}

fn card_only_rules() -> RuleSet {
    let default = RuleTable::load_default().unwrap();
    let table = RuleTable { rules: vec![default.rules[0].clone()] };
    compile_rules(&table, &["card".to_string()]).unwrap()
}

#[test_log::test]
fn test_credit_card_scenario() {
    let rules = card_only_rules();
    let record = rec(json!({"card": "4111111111111111"}));

    let vector = evaluate(&record, &rules);
    let Routed::Quarantined(q) = route(record, &vector) else {
        panic!("card number must be quarantined");
    };
    assert_eq!(q.failed_rules, vec!["card may contain creditcard"]);

    // Nothing has been aggregated yet: no redaction is selected.
    assert!(plan_for(&failed_rule_set(&[]), &rules).is_empty());

    let routed = route_all(vec![q.record.clone()], &rules);
    let entry = ProgressLogEntry::flow_progress(Utc::now(), "clean", &rules, &routed.tallies);
    let events = aggregate([&entry]);
    let plan = plan_for(&failed_rule_set(&events), &rules);
    assert_eq!(plan.names().collect::<Vec<_>>(), vec!["card may contain creditcard"]);

    let processed = apply(&q, &plan);
    assert_eq!(processed.record["card"], json!(format!("{}111", "X".repeat(16))));
}

#[test_log::test]
fn test_ssn_scenario() {
    let rules = default_rules(&["ssn"]);
    let routed = route_all(vec![rec(json!({"ssn": "123-45-6789"}))], &rules);
    assert_eq!(routed.quarantined.len(), 1);

    let entry = ProgressLogEntry::flow_progress(Utc::now(), "clean", &rules, &routed.tallies);
    let plan = plan_for(&failed_rule_set(&aggregate([&entry])), &rules);
    let processed = apply(&routed.quarantined[0], &plan);
    assert_eq!(processed.record["ssn"], json!("[REDACTED]"));
}

#[test]
fn test_record_without_pii_is_routed_clean_untouched() {
    let rules = default_rules(&["name", "city", "note"]);
    let record = rec(json!({"name": "Ada Lovelace", "city": "London", "note": null}));
    let routed = route_all(vec![record.clone()], &rules);
    assert_eq!(routed.clean, vec![record]);
    assert!(routed.quarantined.is_empty());
    assert!(routed.tallies.iter().all(|t| t.failed == 0 && t.passed == 1));
}

#[test]
fn test_route_is_clean_iff_every_rule_passes() {
    let rules = default_rules(&["a", "b"]);
    let samples = [
        json!({"a": "hello", "b": "world"}),
        json!({"a": "10.1.2.3", "b": "world"}),
        json!({"a": "123", "b": "jane@example.com"}),
        json!({"a": "12/25", "b": 4111111111111111u64}),
        json!({"a": "hello"}),
    ];
    for sample in samples {
        let record = rec(sample);
        let vector = evaluate(&record, &rules);
        let expected: Vec<String> = vector.failed().map(str::to_string).collect();
        match route(record, &vector) {
            Routed::Clean(_) => assert!(vector.all_passed()),
            Routed::Quarantined(q) => {
                assert!(!vector.all_passed());
                assert_eq!(q.failed_rules, expected);
            }
        }
    }
}

#[test]
fn test_redaction_is_idempotent_for_every_family() {
    let rules = default_rules(&["card", "ssn", "exp", "cvv", "email", "ip"]);
    let record = rec(json!({
        "card": "4111111111111111",
        "ssn": "123-45-6789",
        "exp": "09/27",
        "cvv": "123",
        "email": "jane.doe@example.com",
        "ip": "192.168.10.1",
    }));
    let routed = route_all(vec![record], &rules);
    let entry = ProgressLogEntry::flow_progress(Utc::now(), "clean", &rules, &routed.tallies);
    let plan = plan_for(&failed_rule_set(&aggregate([&entry])), &rules);

    let once = apply(&routed.quarantined[0], &plan);
    assert!(once.is_redacted());
    let twice = apply(
        &QuarantinedRecord { record: once.record.clone(), failed_rules: once.failed_rules.clone() },
        &plan,
    );
    assert_eq!(once.record, twice.record);
    assert_eq!(once.record["exp"], json!("XX/27"));
    assert_eq!(once.record["email"], json!("example.com"));
    assert_eq!(once.record["ip"], json!("[REDACTED]"));
}

#[test]
fn test_failed_rule_set_is_monotone_over_windows() {
    let rules = default_rules(&["v"]);
    let mut history: Vec<EvaluationEvent> = Vec::new();
    let mut previous = failed_rule_set(&history);
    let batches = [
        vec![rec(json!({"v": "plain"}))],
        vec![rec(json!({"v": "123-45-6789"}))],
        vec![rec(json!({"v": "plain"}))],
        vec![rec(json!({"v": "8.8.8.8"}))],
    ];
    for (i, batch) in batches.into_iter().enumerate() {
        let routed = route_all(batch, &rules);
        let at = Utc.timestamp_opt(60 * i as i64, 0).unwrap();
        let entry = ProgressLogEntry::flow_progress(at, "clean", &rules, &routed.tallies);
        history.extend(aggregate([&entry]));
        let current = failed_rule_set(&history);
        assert!(current.is_superset(&previous));
        previous = current;
    }
    assert_eq!(previous.sorted(), vec!["v may contain ipv4", "v may contain ssn"]);
}

#[test]
fn test_missing_flow_progress_key_is_skipped_without_affecting_others() {
    let at = Utc.timestamp_opt(0, 0).unwrap();
    let good = ProgressLogEntry {
        id: "good".into(),
        timestamp: at,
        event_type: FLOW_PROGRESS.into(),
        details: json!({"flow_progress": {"data_quality": {"expectations": [
            {"name": "v may contain ssn", "dataset": "clean", "passed_records": 0, "failed_records": 1}
        ]}}}),
    };
    let bad = ProgressLogEntry {
        id: "bad".into(),
        timestamp: at,
        event_type: FLOW_PROGRESS.into(),
        details: json!({"cluster_resources": {"num_executors": 2}}),
    };
    let events = aggregate([&bad, &good]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rule_name, "v may contain ssn");
}

#[test]
fn test_unparseable_template_quarantines_instead_of_aborting() {
    let table = RuleTable {
        rules: vec![
            RuleTemplate::new("{} broken", "{} NOT REGEXP 'unclosed", "'x' AS {}"),
            RuleTemplate::new("{} ok", "{} NOT REGEXP '^secret$'", "'x' AS {}"),
        ],
    };
    let rules = compile_rules(&table, &["c".to_string()]).unwrap();
    let routed = route_all(vec![rec(json!({"c": "public"})), rec(json!({"c": "also public"}))], &rules);
    assert!(routed.clean.is_empty());
    assert!(routed.quarantined.iter().all(|q| q.failed_rules == vec!["c broken"]));
}
