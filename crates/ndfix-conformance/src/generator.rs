//! Deterministic fixture generation.
//!
//! Drives the engine over seeded random inputs and records the results as the
//! eight per-operation fixture files, so any other implementation of the same
//! operations can be regression-tested against them.

use crate::{
    AggregateCase, ArrayRepr, BinaryOpCase, PowerCase, ReshapeCase, SlicingCase, TransposeCase,
};
use ndfix_linalg::matmul;
use ndfix_ndarray::{NDArray, element_count};
use ndfix_ufunc::{add, power, reduce_mean, reduce_sum};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_GENERATOR_SEED: u64 = 0xF1DD_5EED_CAFE_D00D;
pub const DEFAULT_CASES_PER_SUITE: usize = 5;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;

#[must_use]
fn splitmix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(MIX_CONST1);
    x ^= x >> 27;
    x = x.wrapping_mul(MIX_CONST2);
    x ^ (x >> 31)
}

/// Counter-based deterministic stream: the nth draw depends only on the seed
/// and n, so regenerating a fixture set never depends on call interleaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureRng {
    stream_seed: u64,
    counter: u64,
}

impl FixtureRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            stream_seed: seed,
            counter: 0,
        }
    }

    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        splitmix64(
            self.stream_seed
                .wrapping_add(self.counter.wrapping_mul(GOLDEN_GAMMA)),
        )
    }

    /// Uniform draw in `[0, 1)` from the high 53 bits.
    #[must_use]
    pub fn next_f64(&mut self) -> f64 {
        let sample = self.next_u64() >> 11;
        sample as f64 / (1u64 << 53) as f64
    }

    #[must_use]
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Standard normal draw via the polar method.
    #[must_use]
    pub fn standard_normal(&mut self) -> f64 {
        loop {
            let u = 2.0 * self.next_f64() - 1.0;
            let v = 2.0 * self.next_f64() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                return u * (-2.0 * s.ln() / s).sqrt();
            }
        }
    }

    pub fn normal_array(&mut self, shape: Vec<usize>) -> Result<NDArray, String> {
        let count = element_count(&shape).map_err(|err| format!("generator shape: {err}"))?;
        let data = (0..count).map(|_| self.standard_normal()).collect();
        NDArray::new(shape, data).map_err(|err| format!("generator array: {err}"))
    }

    pub fn uniform_array(
        &mut self,
        shape: Vec<usize>,
        low: f64,
        high: f64,
    ) -> Result<NDArray, String> {
        let count = element_count(&shape).map_err(|err| format!("generator shape: {err}"))?;
        let data = (0..count).map(|_| self.uniform(low, high)).collect();
        NDArray::new(shape, data).map_err(|err| format!("generator array: {err}"))
    }
}

/// One complete set of fixture suites, ready to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureSet {
    pub basic_ops: Vec<BinaryOpCase>,
    pub dot: Vec<BinaryOpCase>,
    pub reshape: Vec<ReshapeCase>,
    pub broadcast: Vec<BinaryOpCase>,
    pub aggregate: Vec<AggregateCase>,
    pub slicing: Vec<SlicingCase>,
    pub transpose: Vec<TransposeCase>,
    pub power: Vec<PowerCase>,
}

/// Generate every suite from one seeded stream.
///
/// The case mix per suite is fixed: 2x2 operands for basic ops and
/// aggregates, a 2x3 by 3x2 product for dot, 2x3 to [3, 2] for reshape, a
/// column against a row (2x1 + 1x3) for broadcast, a 3x3 sliced with
/// [[0,2],[1,3]], a 2x3 transpose, and positive 2x2 bases squared for power.
pub fn generate_fixture_set(seed: u64, cases_per_suite: usize) -> Result<FixtureSet, String> {
    let mut rng = FixtureRng::new(seed);

    let mut basic_ops = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 2])?;
        let b = rng.normal_array(vec![2, 2])?;
        let result = add(&a, &b).map_err(|err| format!("basic_ops case: {err}"))?;
        basic_ops.push(BinaryOpCase {
            a: ArrayRepr::from_ndarray(&a),
            b: ArrayRepr::from_ndarray(&b),
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut dot = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 3])?;
        let b = rng.normal_array(vec![3, 2])?;
        let result = matmul(&a, &b).map_err(|err| format!("dot case: {err}"))?;
        dot.push(BinaryOpCase {
            a: ArrayRepr::from_ndarray(&a),
            b: ArrayRepr::from_ndarray(&b),
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut reshape = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 3])?;
        let new_shape = vec![3, 2];
        let result = a
            .reshape(&new_shape)
            .map_err(|err| format!("reshape case: {err}"))?;
        reshape.push(ReshapeCase {
            a: ArrayRepr::from_ndarray(&a),
            new_shape,
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut broadcast = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 1])?;
        let b = rng.normal_array(vec![1, 3])?;
        let result = add(&a, &b).map_err(|err| format!("broadcast case: {err}"))?;
        broadcast.push(BinaryOpCase {
            a: ArrayRepr::from_ndarray(&a),
            b: ArrayRepr::from_ndarray(&b),
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut aggregate = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 2])?;
        let sum = reduce_sum(&a);
        let mean = reduce_mean(&a).map_err(|err| format!("aggregate case: {err}"))?;
        aggregate.push(AggregateCase {
            a: ArrayRepr::from_ndarray(&a),
            sum,
            mean,
        });
    }

    let mut slicing = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![3, 3])?;
        let slice_indices = vec![[0, 2], [1, 3]];
        let result = a
            .slice(&[(0, 2), (1, 3)])
            .map_err(|err| format!("slicing case: {err}"))?;
        slicing.push(SlicingCase {
            a: ArrayRepr::from_ndarray(&a),
            slice_indices,
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut transpose = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        let a = rng.normal_array(vec![2, 3])?;
        let result = a
            .transpose()
            .map_err(|err| format!("transpose case: {err}"))?;
        transpose.push(TransposeCase {
            a: ArrayRepr::from_ndarray(&a),
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    let mut power_cases = Vec::with_capacity(cases_per_suite);
    for _ in 0..cases_per_suite {
        // Positive bases keep the squared results positive and well away from
        // the NaN-producing corners of pow.
        let a = rng.uniform_array(vec![2, 2], 0.0, 5.0)?;
        let exponent = 2.0;
        let result = power(&a, exponent);
        power_cases.push(PowerCase {
            a: ArrayRepr::from_ndarray(&a),
            exponent,
            result: ArrayRepr::from_ndarray(&result),
        });
    }

    Ok(FixtureSet {
        basic_ops,
        dot,
        reshape,
        broadcast,
        aggregate,
        slicing,
        transpose,
        power: power_cases,
    })
}

fn write_suite_file<T: Serialize>(root: &Path, stem: &str, cases: &[T]) -> Result<(), String> {
    let path = root.join(format!("{stem}.json"));
    let payload = serde_json::to_string_pretty(cases)
        .map_err(|err| format!("failed serializing {stem}: {err}"))?;
    fs::write(&path, payload).map_err(|err| format!("failed writing {}: {err}", path.display()))
}

/// Serialize every suite of `set` under `root`, one file per operation.
pub fn write_fixture_set(root: &Path, set: &FixtureSet) -> Result<(), String> {
    fs::create_dir_all(root).map_err(|err| format!("failed creating {}: {err}", root.display()))?;

    write_suite_file(root, "basic_ops", &set.basic_ops)?;
    write_suite_file(root, "dot", &set.dot)?;
    write_suite_file(root, "reshape", &set.reshape)?;
    write_suite_file(root, "broadcast", &set.broadcast)?;
    write_suite_file(root, "aggregate", &set.aggregate)?;
    write_suite_file(root, "slicing", &set.slicing)?;
    write_suite_file(root, "transpose", &set.transpose)?;
    write_suite_file(root, "power", &set.power)?;
    Ok(())
}
