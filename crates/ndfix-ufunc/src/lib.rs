#![forbid(unsafe_code)]

use ndfix_ndarray::{NDArray, ShapeError, broadcast_shape, element_count, row_major_strides};

pub const UFUNC_REASON_CODES: [&str; 2] = [
    "ufunc_shape_contract_violation",
    "ufunc_empty_reduction",
];

#[derive(Debug, Clone, PartialEq)]
pub enum UFuncError {
    Shape(ShapeError),
    EmptyReduction { shape: Vec<usize> },
}

impl UFuncError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Shape(_) => "ufunc_shape_contract_violation",
            Self::EmptyReduction { .. } => "ufunc_empty_reduction",
        }
    }
}

impl std::fmt::Display for UFuncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape(err) => write!(f, "shape error: {err}"),
            Self::EmptyReduction { shape } => {
                write!(f, "mean undefined for zero-element shape {shape:?}")
            }
        }
    }
}

impl std::error::Error for UFuncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            Self::EmptyReduction { .. } => None,
        }
    }
}

impl From<ShapeError> for UFuncError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }
}

/// Iteration plan for one broadcast binary operation.
///
/// `lhs_steps`/`rhs_steps` hold, per output axis, the flat-index increment
/// into the corresponding operand: 0 where that operand's right-aligned
/// dimension is 1 (the stretched case), its row-major stride otherwise.
/// Derived per operation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlan {
    out_shape: Vec<usize>,
    out_count: usize,
    lhs_steps: Vec<usize>,
    rhs_steps: Vec<usize>,
}

impl BroadcastPlan {
    pub fn new(lhs: &[usize], rhs: &[usize]) -> Result<Self, ShapeError> {
        let out_shape = broadcast_shape(lhs, rhs)?;
        let out_count = element_count(&out_shape)?;
        let lhs_steps = axis_steps(&out_shape, lhs);
        let rhs_steps = axis_steps(&out_shape, rhs);
        Ok(Self {
            out_shape,
            out_count,
            lhs_steps,
            rhs_steps,
        })
    }

    #[must_use]
    pub fn out_shape(&self) -> &[usize] {
        &self.out_shape
    }

    #[must_use]
    pub fn out_count(&self) -> usize {
        self.out_count
    }

    #[must_use]
    pub fn lhs_steps(&self) -> &[usize] {
        &self.lhs_steps
    }

    #[must_use]
    pub fn rhs_steps(&self) -> &[usize] {
        &self.rhs_steps
    }

    /// Flat source offset for one output multi-index. The odometer in
    /// [`elementwise`] computes the same mapping incrementally; this form
    /// exists so the projection is testable coordinate by coordinate.
    #[must_use]
    pub fn lhs_offset(&self, out_index: &[usize]) -> usize {
        out_index
            .iter()
            .zip(&self.lhs_steps)
            .map(|(&idx, &step)| idx * step)
            .sum()
    }

    #[must_use]
    pub fn rhs_offset(&self, out_index: &[usize]) -> usize {
        out_index
            .iter()
            .zip(&self.rhs_steps)
            .map(|(&idx, &step)| idx * step)
            .sum()
    }
}

#[must_use]
fn axis_steps(out_shape: &[usize], src_shape: &[usize]) -> Vec<usize> {
    let mut steps = vec![0usize; out_shape.len()];
    let strides = row_major_strides(src_shape);
    let offset = out_shape.len() - src_shape.len();
    for (axis, (&dim, &stride)) in src_shape.iter().zip(&strides).enumerate() {
        steps[axis + offset] = if dim == 1 { 0 } else { stride };
    }
    steps
}

/// Element-wise binary op with broadcasting; returns a fresh owned array.
pub fn elementwise(lhs: &NDArray, rhs: &NDArray, op: BinaryOp) -> Result<NDArray, UFuncError> {
    if lhs.shape() == rhs.shape() {
        let data = lhs
            .data()
            .iter()
            .zip(rhs.data())
            .map(|(&l, &r)| op.apply(l, r))
            .collect();
        return Ok(NDArray::new(lhs.shape().to_vec(), data)?);
    }

    let plan = BroadcastPlan::new(lhs.shape(), rhs.shape())?;
    let mut out = Vec::with_capacity(plan.out_count());

    // Advance the output index as an odometer and move both source flat
    // offsets incrementally, so no output coordinate is re-unraveled.
    let mut odometer = vec![0usize; plan.out_shape().len()];
    let mut lhs_flat = 0usize;
    let mut rhs_flat = 0usize;
    for flat in 0..plan.out_count() {
        out.push(op.apply(lhs.data()[lhs_flat], rhs.data()[rhs_flat]));
        if flat + 1 == plan.out_count() {
            break;
        }
        for axis in (0..plan.out_shape().len()).rev() {
            odometer[axis] += 1;
            lhs_flat += plan.lhs_steps()[axis];
            rhs_flat += plan.rhs_steps()[axis];
            if odometer[axis] < plan.out_shape()[axis] {
                break;
            }
            odometer[axis] = 0;
            lhs_flat -= plan.lhs_steps()[axis] * plan.out_shape()[axis];
            rhs_flat -= plan.rhs_steps()[axis] * plan.out_shape()[axis];
        }
    }

    Ok(NDArray::new(plan.out_shape().to_vec(), out)?)
}

pub fn add(lhs: &NDArray, rhs: &NDArray) -> Result<NDArray, UFuncError> {
    elementwise(lhs, rhs, BinaryOp::Add)
}

/// Element-wise scalar power with IEEE `pow` semantics (`0^0 == 1`, NaN
/// propagation).
#[must_use]
pub fn power(a: &NDArray, exponent: f64) -> NDArray {
    a.map(|v| v.powf(exponent))
}

/// Sum of all elements in flat row-major order (left to right, so results are
/// bit-comparable across runs). The empty array sums to 0.0.
#[must_use]
pub fn reduce_sum(a: &NDArray) -> f64 {
    a.data().iter().sum()
}

/// Arithmetic mean over all elements; undefined for zero-element arrays.
pub fn reduce_mean(a: &NDArray) -> Result<f64, UFuncError> {
    if a.is_empty() {
        return Err(UFuncError::EmptyReduction {
            shape: a.shape().to_vec(),
        });
    }
    Ok(reduce_sum(a) / a.len() as f64)
}
