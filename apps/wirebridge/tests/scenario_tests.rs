//! End-to-end command scenarios against an in-process host state.
//!
//! Lines go through the same parse → dispatch path the server uses; results
//! are checked both as typed values and as the JSON a client would see.

#![allow(clippy::unwrap_used, clippy::panic)]

use serde_json::{Value, json};
use wirebridge::dispatch::run_line;
use wirebridge::host::HostState;
use wirebridge::transport::encode_result;
use wirebridge_core::{CommandResult, ErrorKind, NodeCatalog, Payload};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn fresh() -> HostState {
    HostState::new(NodeCatalog::builtin())
}

fn exec(state: &mut HostState, line: &str) -> CommandResult {
    run_line(state, line).unwrap_or_else(|| panic!("no result for {:?}", line))
}

fn exec_json(state: &mut HostState, line: &str) -> Value {
    let bytes = encode_result(&exec(state, line));
    serde_json::from_slice(&bytes).unwrap()
}

fn checksum(state: &mut HostState) -> String {
    match exec(state, "export").payload {
        Some(Payload::Export { checksum, .. }) => checksum,
        other => panic!("unexpected export payload {:?}", other),
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn slider_to_panel_cascade_scenario() {
    let mut s = fresh();

    let created = exec_json(&mut s, r#"add "Number Slider" 100 100"#);
    assert_eq!(created["success"], json!(true));
    assert_eq!(created["payload"]["type"], json!("node_created"));
    assert_eq!(created["payload"]["id"], json!("n1"));

    let panel = exec_json(&mut s, "add Panel 200 100");
    assert_eq!(panel["payload"]["id"], json!("n2"));

    let wired = exec_json(&mut s, "wire n1 n2");
    assert_eq!(wired["payload"]["type"], json!("wired"));
    assert_eq!(
        wired["payload"]["connection"],
        json!({"source": "n1", "source_param": "output", "target": "n2", "target_param": "input"})
    );
    assert!(wired["payload"].get("replaced").is_none());

    assert!(exec(&mut s, "assert_connection n1 n2").success);
    assert!(exec(&mut s, "remove n1").success);

    let failed = exec_json(&mut s, "assert_connection n1 n2");
    assert_eq!(failed["success"], json!(false));
    assert_eq!(failed["error"]["kind"], json!("NotFoundError"));
    assert!(failed.get("payload").is_none());

    let count = exec_json(&mut s, "assert_count 1");
    assert_eq!(count["success"], json!(true));
    assert_eq!(count["payload"]["type"], json!("assertion"));
    assert_eq!(count["payload"]["observed"], json!(1));
}

#[test]
fn wiring_a_missing_node_leaves_document_unchanged() {
    let mut s = fresh();
    exec(&mut s, r#"add "Number Slider" 0 0"#);
    let before = checksum(&mut s);

    let result = exec(&mut s, "wire n1 n99");
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFoundError));
    assert_eq!(checksum(&mut s), before);
    assert_eq!(s.document.connection_count(), 0);
}

#[test]
fn rewiring_an_input_reports_the_replaced_edge() {
    let mut s = fresh();
    exec(&mut s, r#"add "Number Slider" 0 0"#);
    exec(&mut s, r#"add "Number Slider" 0 50"#);
    exec(&mut s, "add Panel 100 0");
    exec(&mut s, "wire n1 n3");

    let rewired = exec_json(&mut s, "wire n2 n3");
    assert_eq!(rewired["payload"]["replaced"]["source"], json!("n1"));
    assert_eq!(s.document.connection_count(), 1);
    assert!(exec(&mut s, "assert_connection n2 n3").success);
    assert_eq!(
        exec(&mut s, "assert_connection n1 n3").error_kind(),
        Some(ErrorKind::NotFoundError)
    );
}

#[test]
fn every_error_kind_reaches_the_wire() {
    let mut s = fresh();
    exec(&mut s, "add Addition 0 0");

    let cases = [
        ("frobnicate n1", "ParseError"),
        ("add Teapot 0 0", "UnknownTypeError"),
        ("remove n42", "NotFoundError"),
        ("set n1 a true", "ValidationError"),
        ("assert_param n1 a 5", "AssertionFailed"),
    ];
    for (line, kind) in cases {
        let result = exec_json(&mut s, line);
        assert_eq!(result["success"], json!(false), "line {:?}", line);
        assert_eq!(result["error"]["kind"], json!(kind), "line {:?}", line);
        assert!(result["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[test]
fn assertion_failure_details_show_expected_and_observed() {
    let mut s = fresh();
    exec(&mut s, "add Panel 0 0");

    let result = exec_json(&mut s, "assert_count 3");
    let details = &result["error"]["details"];
    assert_eq!(details["predicate"], json!("count == 3"));
    assert_eq!(details["expected"], json!(3));
    assert_eq!(details["observed"], json!(1));
    assert_eq!(details["passed"], json!(false));
}

#[test]
fn set_and_assert_param_round_trip() {
    let mut s = fresh();
    exec(&mut s, r#"add "Number Slider" 0 0"#);
    exec(&mut s, "add \"Text Join\" 0 0");

    let set = exec_json(&mut s, "set n1 value 3");
    assert_eq!(set["payload"]["type"], json!("param_set"));
    assert_eq!(set["payload"]["value"], json!(3.0));
    assert!(exec(&mut s, "assert_param n1 value 3").success);

    assert!(exec(&mut s, r#"set n2 separator ", ""#).success);
    assert!(exec(&mut s, r#"assert_param n2 separator ", ""#).success);

    assert_eq!(
        exec(&mut s, "set n1 output 1").error_kind(),
        Some(ErrorKind::ValidationError)
    );
}

#[test]
fn unwire_without_params_removes_every_parallel_edge() {
    let mut s = fresh();
    exec(&mut s, r#"add "Number Slider" 0 0"#);
    exec(&mut s, "add Addition 100 0");
    exec(&mut s, "wire n1 n2 output a");
    exec(&mut s, "wire n1 n2 output b");

    let result = exec_json(&mut s, "unwire n1 n2");
    assert_eq!(result["payload"]["connections"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        exec(&mut s, "unwire n1 n2").error_kind(),
        Some(ErrorKind::NotFoundError)
    );
}

#[test]
fn search_covers_catalog_and_live_nodes() {
    let mut s = fresh();
    exec(&mut s, "add Multiplication 0 0");

    let result = exec_json(&mut s, "search multi");
    assert_eq!(result["payload"]["types"][0]["name"], json!("Multiplication"));
    assert_eq!(result["payload"]["nodes"][0]["id"], json!("n1"));
}

#[test]
fn clear_is_idempotent_and_ids_keep_counting() {
    let mut s = fresh();
    exec(&mut s, "add Panel 0 0");
    exec(&mut s, "add Panel 0 0");
    let empty = {
        let mut other = fresh();
        checksum(&mut other)
    };

    let first = exec_json(&mut s, "clear");
    assert_eq!(first["payload"]["nodes"], json!(2));
    let second = exec_json(&mut s, "clear");
    assert_eq!(second["payload"]["nodes"], json!(0));
    assert_eq!(checksum(&mut s), empty);

    let next = exec_json(&mut s, "add Panel 0 0");
    assert_eq!(next["payload"]["id"], json!("n3"));
}

#[test]
fn replaying_a_script_reproduces_the_export() {
    let script = [
        r#"add "Number Slider" 100 100"#,
        "add Addition 200 100",
        "add Panel 300 100",
        "wire n1 n2 output a",
        "wire n1 n2 output b",
        "wire n2 n3",
        "set n1 value 0.25",
        "move n3 320 140",
    ];

    let mut first = fresh();
    let mut second = fresh();
    exec(&mut second, "add Panel 0 0");
    exec(&mut second, "clear");

    for line in script {
        assert!(exec(&mut first, line).success, "line {:?}", line);
    }
    // second document numbers its nodes from n2, so rewrite the references
    for line in script {
        let shifted = line
            .replace("n3", "n4")
            .replace("n2", "n3")
            .replace("n1", "n2");
        assert!(exec(&mut second, &shifted).success, "line {:?}", shifted);
    }

    assert_eq!(checksum(&mut first), checksum(&mut second));
}

#[test]
fn ping_and_catalog_describe_the_server() {
    let mut s = fresh();
    let pong = exec_json(&mut s, "ping");
    assert_eq!(pong["payload"]["version"], json!(env!("CARGO_PKG_VERSION")));

    let catalog = exec_json(&mut s, "catalog");
    assert_eq!(catalog["payload"]["count"], json!(14));
    assert!(
        catalog["payload"]["types"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["name"] == json!("Number Slider"))
    );
}
