#![forbid(unsafe_code)]

use ndfix_conformance::HarnessConfig;
use ndfix_conformance::generator::{
    DEFAULT_CASES_PER_SUITE, DEFAULT_GENERATOR_SEED, generate_fixture_set, write_fixture_set,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("generate_fixtures failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cfg = HarnessConfig::default_paths();
    let seed = std::env::var("NDFIX_GENERATOR_SEED")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_GENERATOR_SEED);

    let set = generate_fixture_set(seed, DEFAULT_CASES_PER_SUITE)?;
    write_fixture_set(&cfg.fixture_root, &set)?;

    println!(
        "wrote {} suites of {} cases (seed {seed:#x}) under {}",
        ndfix_conformance::SUITE_NAMES.len(),
        DEFAULT_CASES_PER_SUITE,
        cfg.fixture_root.display()
    );
    Ok(())
}
