use ndfix_conformance::generator::{
    DEFAULT_CASES_PER_SUITE, DEFAULT_GENERATOR_SEED, generate_fixture_set, write_fixture_set,
};
use ndfix_conformance::{HarnessConfig, SUITE_NAMES, run_all_suites};
use std::fs;
use std::path::PathBuf;

fn temp_fixture_root(tag: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    std::env::temp_dir().join(format!("ndfix_{tag}_{ts}"))
}

#[test]
fn checked_in_fixtures_all_pass() {
    let cfg = HarnessConfig::default_paths();
    let reports = run_all_suites(&cfg).expect("suites should execute");

    assert_eq!(reports.len(), SUITE_NAMES.len());
    for report in reports {
        assert!(
            report.all_passed(),
            "suite {} failed with {:?}",
            report.suite,
            report.failures
        );
        assert!(report.case_count >= 1, "suite {} is empty", report.suite);
    }
}

#[test]
fn generated_fixtures_round_trip_through_the_suites() {
    let root = temp_fixture_root("round_trip");
    let set = generate_fixture_set(DEFAULT_GENERATOR_SEED, DEFAULT_CASES_PER_SUITE)
        .expect("generate fixtures");
    write_fixture_set(&root, &set).expect("write fixtures");

    let reports = run_all_suites(&HarnessConfig::at_root(&root)).expect("suites should execute");
    for report in reports {
        assert!(
            report.all_passed(),
            "suite {} failed with {:?}",
            report.suite,
            report.failures
        );
        assert_eq!(report.case_count, DEFAULT_CASES_PER_SUITE);
    }

    let _ = fs::remove_dir_all(root);
}

#[test]
fn written_fixture_files_cover_every_suite() {
    let root = temp_fixture_root("file_layout");
    let set = generate_fixture_set(9, 2).expect("generate fixtures");
    write_fixture_set(&root, &set).expect("write fixtures");

    for stem in SUITE_NAMES {
        let path = root.join(format!("{stem}.json"));
        assert!(path.exists(), "missing fixture file {}", path.display());
        let raw = fs::read_to_string(&path).expect("readable fixture file");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        let cases = parsed.as_array().expect("top-level array");
        assert_eq!(cases.len(), 2, "wrong case count in {stem}");
    }

    let _ = fs::remove_dir_all(root);
}

#[test]
fn tampered_fixture_is_caught_by_the_suite() {
    let root = temp_fixture_root("tampered");
    let mut set = generate_fixture_set(17, 2).expect("generate fixtures");
    set.transpose[1].result.data[0] += 0.5;
    write_fixture_set(&root, &set).expect("write fixtures");

    let reports = run_all_suites(&HarnessConfig::at_root(&root)).expect("suites should execute");
    let transpose = reports
        .iter()
        .find(|report| report.suite == "transpose")
        .expect("transpose report");
    assert_eq!(transpose.pass_count, 1);
    assert_eq!(transpose.failures.len(), 1);
    assert!(transpose.failures[0].starts_with("transpose[1]:"));

    for report in reports.iter().filter(|report| report.suite != "transpose") {
        assert!(
            report.all_passed(),
            "unrelated suite {} failed: {:?}",
            report.suite,
            report.failures
        );
    }

    let _ = fs::remove_dir_all(root);
}
