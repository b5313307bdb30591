//! End-to-end scenarios for the diagnose loop.
//!
//! These tests drive the full prepare + diagnose flow with scripted shell
//! commands standing in for the external analyzer and mutator. The fake
//! mutator appends every request it receives to a log file, so the tests
//! can assert exactly which edits were issued and in what order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use sift::cli::{run_diagnose, RunOptions};

const ERROR_HEADER: &str = "kind\tmessage\tclass\tmethod\tfile\n";
const FIX_HEADER: &str = "annotation\tlocation\tclass\tmethod\ttarget\turi\n";

/// A scratch working directory with metadata files and fake collaborators.
struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Harness {
        let harness = Harness {
            dir: TempDir::new().unwrap(),
        };
        // Empty relations by default; tests overwrite as needed.
        harness.write_call_graph(&[]);
        fs::write(
            harness.path().join("field_graph.csv"),
            "user_class\tuser_method\towner_class\tfield\n",
        )
        .unwrap();
        fs::write(
            harness.path().join("method_info.csv"),
            "class\tmethod\turi\tsuper_class\tsuper_method\n",
        )
        .unwrap();
        harness
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_call_graph(&self, rows: &[&str]) {
        let mut data =
            String::from("caller_class\tcaller_method\tcallee_class\tcallee_method\n");
        for row in rows {
            data.push_str(row);
            data.push('\n');
        }
        fs::write(self.path().join("call_graph.csv"), data).unwrap();
    }

    fn write_errors(&self, name: &str, rows: &[(&str, &str)]) {
        let mut data = String::from(ERROR_HEADER);
        for (class, method) in rows {
            data.push_str(&format!("K\tmessage\t{class}\t{method}\tsrc/{class}.java\n"));
        }
        fs::write(self.path().join(name), data).unwrap();
    }

    fn write_fixes_csv(&self, rows: &[String]) {
        let mut data = String::from(FIX_HEADER);
        for row in rows {
            data.push_str(row);
            data.push('\n');
        }
        fs::write(self.path().join("fixes.csv"), data).unwrap();
    }

    fn calls_log(&self) -> PathBuf {
        self.path().join("injector_calls.log")
    }

    /// Fake mutator: record the request, accept a single edit per call.
    fn inject_command(&self) -> String {
        let log = self.calls_log().display().to_string();
        format!(
            r#"cat >> {log}; printf '\n' >> {log}; echo '{{"status":"ok","results":[{{"applied":true}}]}}'"#
        )
    }

    fn injector_calls(&self) -> Vec<String> {
        if !self.calls_log().exists() {
            return Vec::new();
        }
        fs::read_to_string(self.calls_log())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn options(&self, build_command: &str) -> RunOptions {
        RunOptions {
            workspace: self.path().to_path_buf(),
            out_dir: self.path().to_path_buf(),
            build_command: build_command.to_string(),
            inject_command: self.inject_command(),
            optimized: false,
            revert_all: false,
            propagate_inheritance: false,
            timeout: Duration::from_secs(30),
        }
    }
}

fn param_fix_row(class: &str) -> String {
    format!("javax.annotation.Nullable\tPARAMETER\t{class}\tm()\t0\tsrc/{class}.java")
}

fn return_fix_row(class: &str) -> String {
    format!("javax.annotation.Nullable\tRETURN\t{class}\tm()\t\tsrc/{class}.java")
}

fn summary(json: &str) -> serde_json::Value {
    serde_json::from_str(json).unwrap()
}

#[test]
fn empty_candidate_list_yields_empty_work_list_and_reports() {
    let harness = Harness::new();
    harness.write_errors("errors.csv", &[("C", "m()")]);
    // No fixes.csv is deposited: the normal "nothing to do" case.

    let json = run_diagnose(&harness.options("true")).unwrap();
    let value = summary(&json);
    assert_eq!(value["status"], "ok");
    assert_eq!(value["candidates"], 0);
    assert_eq!(value["diagnosed"], 0);

    let diagnose: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(harness.path().join("diagnose.json")).unwrap())
            .unwrap();
    assert_eq!(diagnose, serde_json::json!({ "fixes": [] }));
    assert!(harness.injector_calls().is_empty());
}

#[test]
fn harmless_parameter_fix_is_kept_without_a_revert_edit() {
    let harness = Harness::new();
    harness.write_errors("errors.csv", &[("C", "m()")]);
    harness.write_fixes_csv(&[param_fix_row("C")]);

    // The re-scan changes nothing: zero new findings in class scope.
    let json = run_diagnose(&harness.options("true")).unwrap();
    let value = summary(&json);
    assert_eq!(value["kept"], 1);
    assert_eq!(value["reverted"], 0);

    let calls = harness.injector_calls();
    assert_eq!(calls.len(), 1, "only the apply, no inverse: {calls:?}");
    assert!(calls[0].contains(r#""inject":"true""#));
}

#[test]
fn regressing_return_fix_is_reverted_through_the_mutator() {
    let harness = Harness::new();
    harness.write_call_graph(&["A\tuse()\tC\tm()"]);
    harness.write_errors("base.csv", &[("A", "use()")]);
    harness.write_errors("after.csv", &[("A", "use()"), ("A", "broken()")]);
    harness.write_fixes_csv(&[return_fix_row("C")]);

    // First scan (preparation) deposits the baseline; every later scan sees
    // the applied edit and deposits one new finding in the caller.
    let build = "if [ -f scanned ]; then cp after.csv errors.csv; \
                 else cp base.csv errors.csv; touch scanned; fi";

    let json = run_diagnose(&harness.options(build)).unwrap();
    let value = summary(&json);
    assert_eq!(value["kept"], 0);
    assert_eq!(value["reverted"], 1);

    let calls = harness.injector_calls();
    assert_eq!(calls.len(), 2, "apply then inverse: {calls:?}");
    assert!(calls[0].contains(r#""inject":"true""#));
    assert!(calls[1].contains(r#""inject":"false""#));

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(harness.path().join("diagnose_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["reports"][0]["delta"], 1);
    assert_eq!(report["reports"][0]["decision"], "reverted");
    assert_eq!(report["reports"][0]["scope"], serde_json::json!(["A"]));
}

#[test]
fn fully_diagnosed_candidates_produce_an_empty_work_list() {
    let harness = Harness::new();
    harness.write_errors("errors.csv", &[("C", "m()")]);
    harness.write_fixes_csv(&[param_fix_row("C")]);

    // Prior run already covered today's only candidate.
    let diagnosed = serde_json::json!({
        "fixes": [{
            "annotation": "javax.annotation.Nullable",
            "location": "PARAMETER",
            "class": "C",
            "method": "m()",
            "target": "0",
            "uri": "src/C.java",
            "inject": "true",
        }]
    });
    fs::write(
        harness.path().join("diagnosed.json"),
        serde_json::to_string(&diagnosed).unwrap(),
    )
    .unwrap();

    let mut options = harness.options("true");
    options.optimized = true;
    let json = run_diagnose(&options).unwrap();
    let value = summary(&json);
    assert_eq!(value["candidates"], 0);
    assert!(harness.injector_calls().is_empty());
}

#[test]
fn rerunning_skips_fixes_already_in_the_report_file() {
    let harness = Harness::new();
    harness.write_errors("errors.csv", &[("C", "m()")]);
    harness.write_fixes_csv(&[param_fix_row("C")]);

    let options = harness.options("true");
    run_diagnose(&options).unwrap();
    assert_eq!(harness.injector_calls().len(), 1);

    // Same candidate list again: the prior report short-circuits the cycle
    // before any edit is issued.
    let json = run_diagnose(&options).unwrap();
    let value = summary(&json);
    assert_eq!(value["diagnosed"], 1);
    assert_eq!(harness.injector_calls().len(), 1);
}

#[test]
fn degenerate_return_fix_is_kept_and_flagged() {
    let harness = Harness::new();
    // No call graph entry for the edited method.
    harness.write_errors("errors.csv", &[("C", "m()")]);
    harness.write_fixes_csv(&[return_fix_row("C")]);

    let json = run_diagnose(&harness.options("true")).unwrap();
    let value = summary(&json);
    assert_eq!(value["kept"], 1);

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(harness.path().join("diagnose_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["reports"][0]["degenerate"], true);
    assert_eq!(report["reports"][0]["scope"], serde_json::json!([]));
}
