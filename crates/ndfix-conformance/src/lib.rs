#![forbid(unsafe_code)]

pub mod generator;

use ndfix_linalg::matmul;
use ndfix_ndarray::NDArray;
use ndfix_ufunc::{add, power, reduce_mean, reduce_sum};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_ABS_TOL: f64 = 1e-9;
pub const DEFAULT_REL_TOL: f64 = 1e-9;

/// File stems of the per-operation fixture suites, in execution order.
pub const SUITE_NAMES: [&str; 8] = [
    "basic_ops",
    "dot",
    "reshape",
    "broadcast",
    "aggregate",
    "slicing",
    "transpose",
    "power",
];

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub abs_tol: f64,
    pub rel_tol: f64,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
            abs_tol: DEFAULT_ABS_TOL,
            rel_tol: DEFAULT_REL_TOL,
        }
    }

    #[must_use]
    pub fn at_root(fixture_root: impl Into<PathBuf>) -> Self {
        Self {
            fixture_root: fixture_root.into(),
            abs_tol: DEFAULT_ABS_TOL,
            rel_tol: DEFAULT_REL_TOL,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

/// Flat row-major array exchange format: `data.len()` must equal the product
/// of `shape`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRepr {
    pub data: Vec<f64>,
    pub shape: Vec<usize>,
}

impl ArrayRepr {
    pub fn to_ndarray(&self) -> Result<NDArray, String> {
        NDArray::new(self.shape.clone(), self.data.clone())
            .map_err(|err| format!("invalid array representation: {err}"))
    }

    #[must_use]
    pub fn from_ndarray(array: &NDArray) -> Self {
        Self {
            data: array.data().to_vec(),
            shape: array.shape().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryOpCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    #[serde(rename = "B")]
    pub b: ArrayRepr,
    pub result: ArrayRepr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshapeCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    pub new_shape: Vec<usize>,
    pub result: ArrayRepr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    pub sum: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicingCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    pub slice_indices: Vec<[usize; 2]>,
    pub result: ArrayRepr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransposeCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    pub result: ArrayRepr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerCase {
    #[serde(rename = "A")]
    pub a: ArrayRepr,
    pub exponent: f64,
    pub result: ArrayRepr,
}

// ── Execution entry points ──────────────────────────────────────────────
//
// One per fixture operation: deserialized inputs in, ArrayRepr (or scalars)
// out, engine errors flattened to strings for suite reporting.

pub fn execute_add(a: &ArrayRepr, b: &ArrayRepr) -> Result<ArrayRepr, String> {
    let lhs = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let rhs = b.to_ndarray().map_err(|err| format!("operand B: {err}"))?;
    let out = add(&lhs, &rhs).map_err(|err| format!("add failed: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&out))
}

pub fn execute_dot(a: &ArrayRepr, b: &ArrayRepr) -> Result<ArrayRepr, String> {
    let lhs = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let rhs = b.to_ndarray().map_err(|err| format!("operand B: {err}"))?;
    let out = matmul(&lhs, &rhs).map_err(|err| format!("dot failed: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&out))
}

pub fn execute_reshape(a: &ArrayRepr, new_shape: &[usize]) -> Result<ArrayRepr, String> {
    let input = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let out = input
        .reshape(new_shape)
        .map_err(|err| format!("reshape failed: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&out))
}

/// Whole-array aggregation, returning `(sum, mean)`.
pub fn execute_aggregate(a: &ArrayRepr) -> Result<(f64, f64), String> {
    let input = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let sum = reduce_sum(&input);
    let mean = reduce_mean(&input).map_err(|err| format!("mean failed: {err}"))?;
    Ok((sum, mean))
}

pub fn execute_slice(a: &ArrayRepr, slice_indices: &[[usize; 2]]) -> Result<ArrayRepr, String> {
    let input = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let ranges: Vec<(usize, usize)> = slice_indices
        .iter()
        .map(|&[start, end]| (start, end))
        .collect();
    let out = input
        .slice(&ranges)
        .map_err(|err| format!("slice failed: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&out))
}

pub fn execute_transpose(a: &ArrayRepr) -> Result<ArrayRepr, String> {
    let input = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    let out = input
        .transpose()
        .map_err(|err| format!("transpose failed: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&out))
}

pub fn execute_power(a: &ArrayRepr, exponent: f64) -> Result<ArrayRepr, String> {
    let input = a.to_ndarray().map_err(|err| format!("operand A: {err}"))?;
    Ok(ArrayRepr::from_ndarray(&power(&input, exponent)))
}

// ── Comparison ──────────────────────────────────────────────────────────

/// Element-wise tolerance comparison. Never exact: a value passes when
/// `abs_err <= abs_tol + rel_tol * |expected|`, which absorbs
/// accumulation-order differences between implementations.
#[must_use]
pub fn compare_arrays(
    expected: &ArrayRepr,
    actual: &ArrayRepr,
    abs_tol: f64,
    rel_tol: f64,
) -> (bool, f64, Option<String>) {
    if expected.shape != actual.shape {
        return (
            false,
            f64::INFINITY,
            Some(format!(
                "shape mismatch expected={:?} actual={:?}",
                expected.shape, actual.shape
            )),
        );
    }

    if expected.data.len() != actual.data.len() {
        return (
            false,
            f64::INFINITY,
            Some(format!(
                "value length mismatch expected={} actual={}",
                expected.data.len(),
                actual.data.len()
            )),
        );
    }

    let mut max_abs_error = 0.0f64;
    for (idx, (&expected_v, &actual_v)) in expected.data.iter().zip(&actual.data).enumerate() {
        // NaN expected and NaN produced is agreement, not a mismatch.
        if expected_v.is_nan() && actual_v.is_nan() {
            continue;
        }

        let abs_err = (expected_v - actual_v).abs();
        if abs_err > max_abs_error {
            max_abs_error = abs_err;
        }

        let threshold = abs_tol + rel_tol * expected_v.abs();
        if !(abs_err <= threshold) {
            return (
                false,
                max_abs_error,
                Some(format!(
                    "value mismatch at index {idx}: expected={expected_v} actual={actual_v} \
                     abs_err={abs_err} threshold={threshold}"
                )),
            );
        }
    }

    (true, max_abs_error, None)
}

#[must_use]
pub fn compare_scalar(
    label: &str,
    expected: f64,
    actual: f64,
    abs_tol: f64,
    rel_tol: f64,
) -> Option<String> {
    if expected.is_nan() && actual.is_nan() {
        return None;
    }

    let abs_err = (expected - actual).abs();
    let threshold = abs_tol + rel_tol * expected.abs();
    if abs_err <= threshold {
        None
    } else {
        Some(format!(
            "{label} mismatch: expected={expected} actual={actual} abs_err={abs_err} \
             threshold={threshold}"
        ))
    }
}

// ── Replay logging ──────────────────────────────────────────────────────
//
// Optional JSONL stream of per-case outcomes, enabled by `set_suite_log_path`
// or the NDFIX_SUITE_LOG_PATH environment variable.

#[derive(Debug, Clone, Serialize)]
pub struct SuiteLogEntry {
    pub suite: &'static str,
    pub case_index: usize,
    pub input_digest: String,
    pub output_digest: String,
    pub reason_code: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
}

static SUITE_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_suite_log_path(path: Option<PathBuf>) {
    let cell = SUITE_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

fn maybe_append_suite_log(entry: &SuiteLogEntry) -> Result<(), String> {
    let configured = SUITE_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("NDFIX_SUITE_LOG_PATH").map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing suite log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload)
        .map_err(|err| format!("failed appending suite log {}: {err}", path.display()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

fn digest_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_vec(value) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => "unserializable".to_string(),
    }
}

// ── Suite runners ───────────────────────────────────────────────────────

fn load_cases<T: DeserializeOwned>(fixture_root: &Path, stem: &str) -> Result<Vec<T>, String> {
    let path = fixture_root.join(format!("{stem}.json"));
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid json {}: {err}", path.display()))
}

struct CaseOutcome {
    passed: bool,
    reason_code: &'static str,
    output_digest: String,
    detail: Option<String>,
}

fn tally_case(
    report: &mut SuiteReport,
    case_index: usize,
    input_digest: String,
    outcome: CaseOutcome,
) -> Result<(), String> {
    if outcome.passed {
        report.pass_count += 1;
    } else {
        let detail = outcome
            .detail
            .clone()
            .unwrap_or_else(|| "unknown mismatch".to_string());
        report
            .failures
            .push(format!("{}[{case_index}]: {detail}", report.suite));
    }

    maybe_append_suite_log(&SuiteLogEntry {
        suite: report.suite,
        case_index,
        input_digest,
        output_digest: outcome.output_digest,
        reason_code: outcome.reason_code,
        passed: outcome.passed,
        detail: outcome.detail,
    })
}

fn array_outcome(
    expected: &ArrayRepr,
    actual: Result<ArrayRepr, String>,
    config: &HarnessConfig,
) -> CaseOutcome {
    match actual {
        Ok(actual) => {
            let (passed, _max_abs_error, detail) =
                compare_arrays(expected, &actual, config.abs_tol, config.rel_tol);
            CaseOutcome {
                passed,
                reason_code: if passed { "case_pass" } else { "case_mismatch" },
                output_digest: digest_json(&actual),
                detail,
            }
        }
        Err(err) => CaseOutcome {
            passed: false,
            reason_code: "case_execution_error",
            output_digest: digest_json(&err),
            detail: Some(err),
        },
    }
}

fn run_binary_suite(
    suite: &'static str,
    cases: &[BinaryOpCase],
    config: &HarnessConfig,
) -> Result<SuiteReport, String> {
    let mut report = SuiteReport {
        suite,
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&(&case.a, &case.b));
        let outcome = array_outcome(&case.result, execute_add(&case.a, &case.b), config);
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_basic_ops_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<BinaryOpCase> = load_cases(&config.fixture_root, "basic_ops")?;
    run_binary_suite("basic_ops", &cases, config)
}

pub fn run_broadcast_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<BinaryOpCase> = load_cases(&config.fixture_root, "broadcast")?;
    run_binary_suite("broadcast", &cases, config)
}

pub fn run_dot_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<BinaryOpCase> = load_cases(&config.fixture_root, "dot")?;
    let mut report = SuiteReport {
        suite: "dot",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&(&case.a, &case.b));
        let outcome = array_outcome(&case.result, execute_dot(&case.a, &case.b), config);
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_reshape_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<ReshapeCase> = load_cases(&config.fixture_root, "reshape")?;
    let mut report = SuiteReport {
        suite: "reshape",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&(&case.a, &case.new_shape));
        let outcome = array_outcome(
            &case.result,
            execute_reshape(&case.a, &case.new_shape),
            config,
        );
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_aggregate_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<AggregateCase> = load_cases(&config.fixture_root, "aggregate")?;
    let mut report = SuiteReport {
        suite: "aggregate",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&case.a);
        let outcome = match execute_aggregate(&case.a) {
            Ok((sum, mean)) => {
                let detail = compare_scalar("sum", case.sum, sum, config.abs_tol, config.rel_tol)
                    .or_else(|| {
                        compare_scalar("mean", case.mean, mean, config.abs_tol, config.rel_tol)
                    });
                let passed = detail.is_none();
                CaseOutcome {
                    passed,
                    reason_code: if passed { "case_pass" } else { "case_mismatch" },
                    output_digest: digest_json(&(sum, mean)),
                    detail,
                }
            }
            Err(err) => CaseOutcome {
                passed: false,
                reason_code: "case_execution_error",
                output_digest: digest_json(&err),
                detail: Some(err),
            },
        };
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_slicing_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<SlicingCase> = load_cases(&config.fixture_root, "slicing")?;
    let mut report = SuiteReport {
        suite: "slicing",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&(&case.a, &case.slice_indices));
        let outcome = array_outcome(
            &case.result,
            execute_slice(&case.a, &case.slice_indices),
            config,
        );
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_transpose_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<TransposeCase> = load_cases(&config.fixture_root, "transpose")?;
    let mut report = SuiteReport {
        suite: "transpose",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&case.a);
        let outcome = array_outcome(&case.result, execute_transpose(&case.a), config);
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

pub fn run_power_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases: Vec<PowerCase> = load_cases(&config.fixture_root, "power")?;
    let mut report = SuiteReport {
        suite: "power",
        case_count: cases.len(),
        pass_count: 0,
        failures: Vec::new(),
    };

    for (idx, case) in cases.iter().enumerate() {
        let input_digest = digest_json(&(&case.a, case.exponent));
        let outcome = array_outcome(
            &case.result,
            execute_power(&case.a, case.exponent),
            config,
        );
        tally_case(&mut report, idx, input_digest, outcome)?;
    }

    Ok(report)
}

/// Run all eight per-operation suites in `SUITE_NAMES` order.
pub fn run_all_suites(config: &HarnessConfig) -> Result<Vec<SuiteReport>, String> {
    Ok(vec![
        run_basic_ops_suite(config)?,
        run_dot_suite(config)?,
        run_reshape_suite(config)?,
        run_broadcast_suite(config)?,
        run_aggregate_suite(config)?,
        run_slicing_suite(config)?,
        run_transpose_suite(config)?,
        run_power_suite(config)?,
    ])
}
