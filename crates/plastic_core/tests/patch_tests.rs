//! Integration tests for patch files: evaluation into an environment and
//! running the resulting root.

use std::io::Write;
use std::path::PathBuf;

use plastic_core::dsp::root_environment;
use plastic_core::{Error, PatchFile, Phase, Primitive, RunReport, Value};
use serde_json::json;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("patches")
        .join(name)
}

fn patch(value: serde_json::Value) -> PatchFile {
    serde_json::from_value(value).expect("invalid patch literal")
}

fn run(patch: &PatchFile) -> RunReport {
    let env = root_environment().unwrap();
    patch
        .evaluate(&env)
        .and_then(|root| root.run())
        .unwrap_or_else(|e| panic!("patch failed: {e}"))
}

fn doubles(report: &RunReport, sink: &str) -> Vec<f64> {
    report.printed[sink]
        .iter()
        .map(|v| v.as_double().expect("expected a Double"))
        .collect()
}

// ─── Bundled patches ──────────────────────────────────────────────────────────

#[test]
fn const_sum_patch() {
    let report = run(&PatchFile::load(bundled("const_sum.json")).unwrap());
    assert_eq!(report.ticks, 1);
    assert_eq!(doubles(&report, "dbg"), [7.0]);
    assert_eq!(report.order.last().map(String::as_str), Some("dbg"));
    assert_eq!(report.order.len(), 4);
}

#[test]
fn square_wave_patch_with_forward_reference() {
    let report = run(&PatchFile::load(bundled("square_wave.json")).unwrap());
    assert_eq!(
        doubles(&report, "dbg"),
        [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0]
    );
    assert_eq!(report.order, ["wave", "dbg"]);
}

#[test]
fn accumulator_patch_feeds_back_through_delay() {
    let report = run(&PatchFile::load(bundled("accumulator.json")).unwrap());
    assert_eq!(doubles(&report, "dbg"), [1.0, 2.0, 3.0, 4.0, 5.0]);
}

// ─── Inline patches ───────────────────────────────────────────────────────────

#[test]
fn delay_initial_and_bool_kind() {
    let report = run(&patch(json!({
        "modules": [
            { "name": "loop_in", "factory": "PropagationDelayIn",
              "args": { "type": "Bool", "initial": true, "input": "@loop_out.out" } },
            { "name": "loop_out", "factory": "PropagationDelayOut",
              "args": { "type": "Bool", "source": "@loop_in" } },
            { "name": "dbg", "factory": "Print", "args": { "type": "Bool", "in": "@loop_out.out" } }
        ],
        "sinks": ["dbg"],
        "ticks": 2
    })));
    assert_eq!(report.printed["dbg"], [Primitive::Bool(true); 2]);
}

#[test]
fn ticks_default_to_one() {
    let report = run(&patch(json!({
        "modules": [
            { "name": "n", "factory": "Counter" },
            { "name": "dbg", "factory": "Print", "args": { "type": "Double", "in": "@n.out" } }
        ],
        "sinks": ["dbg"]
    })));
    assert_eq!(report.ticks, 1);
    assert_eq!(doubles(&report, "dbg"), [0.0]);
}

#[test]
fn multiple_sinks_share_upstream() {
    let report = run(&patch(json!({
        "modules": [
            { "name": "n", "factory": "Counter" },
            { "name": "left", "factory": "Print", "args": { "type": "Double", "in": "@n.out" } },
            { "name": "right", "factory": "Print", "args": { "type": "Double", "in": "@n.out" } }
        ],
        "sinks": ["left", "right"],
        "ticks": 3
    })));
    assert_eq!(report.order.iter().filter(|m| *m == "n").count(), 1);
    assert_eq!(doubles(&report, "left"), doubles(&report, "right"));
}

#[test]
fn run_leaves_modules_reset() {
    let env = root_environment().unwrap();
    let root = PatchFile::load(bundled("const_sum.json"))
        .unwrap()
        .evaluate(&env)
        .unwrap();
    root.run().unwrap();
    let Value::Module(sink) = env.get("dbg").unwrap() else {
        panic!("dbg is not a module");
    };
    assert_eq!(sink.phase(), Phase::Unbound);
    // A root can be run again.
    assert_eq!(root.run().unwrap().ticks, 1);
}

#[test]
fn load_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let text = json!({
        "modules": [
            { "name": "c", "factory": "Const", "args": { "value": 0.25 } },
            { "name": "dbg", "factory": "Print", "args": { "type": "Double", "in": "@c.out" } }
        ],
        "sinks": ["dbg"],
        "ticks": 2
    });
    write!(file, "{text}").unwrap();

    let report = run(&PatchFile::load(file.path()).unwrap());
    assert_eq!(doubles(&report, "dbg"), [0.25, 0.25]);
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[test]
fn unknown_factory() {
    let env = root_environment().unwrap();
    let result = patch(json!({
        "modules": [{ "name": "x", "factory": "Reverb", "args": {} }],
        "sinks": ["x"]
    }))
    .evaluate(&env);
    assert!(matches!(result, Err(Error::Unbound { name }) if name == "Reverb"));
}

#[test]
fn mistyped_argument_names_factory_and_field() {
    let env = root_environment().unwrap();
    let result = patch(json!({
        "modules": [{ "name": "c", "factory": "Const", "args": { "value": "loud" } }],
        "sinks": ["c"]
    }))
    .evaluate(&env);
    match result {
        Err(Error::ArgumentType { factory, field, .. }) => {
            assert_eq!(factory, "Const");
            assert_eq!(field, "value");
        }
        other => panic!("expected an argument type error, got {:?}", other.err()),
    }
}

#[test]
fn duplicate_declaration() {
    let env = root_environment().unwrap();
    let result = patch(json!({
        "modules": [
            { "name": "c", "factory": "Const", "args": { "value": 1.0 } },
            { "name": "c", "factory": "Const", "args": { "value": 2.0 } }
        ],
        "sinks": ["c"]
    }))
    .evaluate(&env);
    assert!(matches!(result, Err(Error::AlreadyBound { name }) if name == "c"));
}

#[test]
fn declarations_cannot_shadow_factories() {
    let env = root_environment().unwrap();
    let result = patch(json!({
        "modules": [{ "name": "Sum", "factory": "Const", "args": { "value": 1.0 } }],
        "sinks": ["Sum"]
    }))
    .evaluate(&env);
    assert!(matches!(result, Err(Error::AlreadyBound { .. })));
}

#[test]
fn cycle_is_reported_when_run() {
    let env = root_environment().unwrap();
    let root = patch(json!({
        "modules": [
            { "name": "a", "factory": "Sum", "args": { "count": 2, "in_0": "@b.out", "in_1": "@b.out" } },
            { "name": "b", "factory": "Sum", "args": { "count": 2, "in_0": "@a.out", "in_1": "@a.out" } }
        ],
        "sinks": ["b"]
    }))
    .evaluate(&env)
    .unwrap();
    assert!(matches!(root.run(), Err(Error::Cycle { .. })));
}

#[test]
fn sink_must_be_a_module() {
    let env = root_environment().unwrap();
    let root = patch(json!({
        "modules": [],
        "sinks": ["Sum"]
    }))
    .evaluate(&env)
    .unwrap();
    assert!(root.run().is_err());
}

#[test]
fn unknown_patch_field_is_rejected() {
    let result = PatchFile::from_json(r#"{ "modules": [], "sinks": ["x"], "speed": 2 }"#);
    assert!(matches!(result, Err(Error::Json(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = PatchFile::load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(Error::Io(_))));
}
