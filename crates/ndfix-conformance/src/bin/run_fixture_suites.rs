#![forbid(unsafe_code)]

use ndfix_conformance::{HarnessConfig, run_all_suites};

fn main() {
    if let Err(err) = run() {
        eprintln!("run_fixture_suites failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cfg = HarnessConfig::default_paths();
    let reports = run_all_suites(&cfg)?;

    let mut failed = 0usize;
    for report in &reports {
        println!(
            "{}: {}/{} passed",
            report.suite, report.pass_count, report.case_count
        );
        for failure in &report.failures {
            println!("  {failure}");
        }
        if !report.all_passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(format!("{failed} suite(s) failed"));
    }
    Ok(())
}
