#![forbid(unsafe_code)]

use core::fmt;

use ndfix_ndarray::{NDArray, ShapeError};

pub const LINALG_REASON_CODES: [&str; 3] = [
    "linalg_shape_contract_violation",
    "linalg_rank_contract_violation",
    "linalg_inner_dimension_mismatch",
];

#[derive(Debug, Clone, PartialEq)]
pub enum LinAlgError {
    Shape(ShapeError),
    NotTwoDimensional { shape: Vec<usize> },
    InnerDimensionMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
}

impl LinAlgError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Shape(_) => "linalg_shape_contract_violation",
            Self::NotTwoDimensional { .. } => "linalg_rank_contract_violation",
            Self::InnerDimensionMismatch { .. } => "linalg_inner_dimension_mismatch",
        }
    }
}

impl fmt::Display for LinAlgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(err) => write!(f, "shape error: {err}"),
            Self::NotTwoDimensional { shape } => {
                write!(f, "matmul requires rank-2 operands, got shape {shape:?}")
            }
            Self::InnerDimensionMismatch { lhs, rhs } => {
                write!(
                    f,
                    "inner dimensions must match for matmul: {lhs:?} against {rhs:?}"
                )
            }
        }
    }
}

impl std::error::Error for LinAlgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShapeError> for LinAlgError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

/// Validate a matmul operand pair, returning `(m, k, n)` for an
/// `[m, k] x [k, n]` product.
pub fn validate_matmul_shapes(
    lhs: &[usize],
    rhs: &[usize],
) -> Result<(usize, usize, usize), LinAlgError> {
    if lhs.len() != 2 {
        return Err(LinAlgError::NotTwoDimensional {
            shape: lhs.to_vec(),
        });
    }
    if rhs.len() != 2 {
        return Err(LinAlgError::NotTwoDimensional {
            shape: rhs.to_vec(),
        });
    }
    if lhs[1] != rhs[0] {
        return Err(LinAlgError::InnerDimensionMismatch {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        });
    }
    Ok((lhs[0], lhs[1], rhs[1]))
}

/// Matrix product of two rank-2 arrays.
///
/// Each output cell accumulates in increasing `k`, so results are
/// bit-comparable with any implementation that follows the same order.
pub fn matmul(lhs: &NDArray, rhs: &NDArray) -> Result<NDArray, LinAlgError> {
    let (m, k, n) = validate_matmul_shapes(lhs.shape(), rhs.shape())?;

    // [m, 0] x [0, n] operands make m * n unconstrained by either input
    // length, so the output count still needs an overflow check.
    let count = m.checked_mul(n).ok_or(ShapeError::Overflow)?;

    let a = lhs.data();
    let b = rhs.data();
    let mut out = vec![0.0f64; count];
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0f64;
            for step in 0..k {
                acc += a[i * k + step] * b[step * n + j];
            }
            out[i * n + j] = acc;
        }
    }

    Ok(NDArray::new(vec![m, n], out)?)
}
