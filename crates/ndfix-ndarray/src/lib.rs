#![forbid(unsafe_code)]

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    Overflow,
    DataLengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    IncompatibleBroadcast {
        lhs: Vec<usize>,
        rhs: Vec<usize>,
        axis: usize,
    },
    IncompatibleElementCount {
        from: Vec<usize>,
        to: Vec<usize>,
        old: usize,
        new: usize,
    },
    NotTwoDimensional {
        shape: Vec<usize>,
    },
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => write!(f, "shape element count overflowed"),
            Self::DataLengthMismatch {
                shape,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "data length {actual} does not match shape {shape:?} (expected {expected})"
                )
            }
            Self::IncompatibleBroadcast { lhs, rhs, axis } => {
                write!(
                    f,
                    "incompatible shapes for broadcasting: {lhs:?} with {rhs:?} at output axis {axis}"
                )
            }
            Self::IncompatibleElementCount { from, to, old, new } => {
                write!(
                    f,
                    "reshape size mismatch: {from:?} has {old} elements, {to:?} has {new}"
                )
            }
            Self::NotTwoDimensional { shape } => {
                write!(f, "operation requires a rank-2 array, got shape {shape:?}")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    RankMismatch {
        expected: usize,
        actual: usize,
    },
    OutOfBounds {
        axis: usize,
        index: usize,
        dim: usize,
    },
    RangeOutOfBounds {
        axis: usize,
        start: usize,
        end: usize,
        dim: usize,
    },
    InvertedRange {
        axis: usize,
        start: usize,
        end: usize,
    },
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RankMismatch { expected, actual } => {
                write!(f, "expected {expected} indices, got {actual}")
            }
            Self::OutOfBounds { axis, index, dim } => {
                write!(f, "index {index} out of bounds for axis {axis} with size {dim}")
            }
            Self::RangeOutOfBounds {
                axis,
                start,
                end,
                dim,
            } => {
                write!(
                    f,
                    "slice range [{start}, {end}) out of bounds for axis {axis} with size {dim}"
                )
            }
            Self::InvertedRange { axis, start, end } => {
                write!(f, "slice range [{start}, {end}) on axis {axis} has start > end")
            }
        }
    }
}

impl std::error::Error for IndexError {}

/// Number of elements a shape addresses. Rank 0 is a scalar with one element.
pub fn element_count(shape: &[usize]) -> Result<usize, ShapeError> {
    shape.iter().try_fold(1usize, |acc, &dim| {
        acc.checked_mul(dim).ok_or(ShapeError::Overflow)
    })
}

/// Row-major element strides: last dimension varies fastest. Empty for rank 0.
#[must_use]
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0usize; shape.len()];
    let mut stride = 1usize;
    for (axis, &dim) in shape.iter().enumerate().rev() {
        strides[axis] = stride;
        stride = stride.saturating_mul(dim);
    }
    strides
}

/// Merge two shapes under the right-aligned broadcasting rule.
///
/// The shorter shape is padded on the left with 1s. Aligned dimensions must be
/// equal or one of them must be 1; a size-1 dimension stretches to the other.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let nd = lhs.len().max(rhs.len());
    let mut out = vec![0usize; nd];

    for offset in 0..nd {
        let axis = nd - 1 - offset;
        let l = if offset < lhs.len() {
            lhs[lhs.len() - 1 - offset]
        } else {
            1
        };
        let r = if offset < rhs.len() {
            rhs[rhs.len() - 1 - offset]
        } else {
            1
        };

        out[axis] = if l == r {
            l
        } else if l == 1 {
            r
        } else if r == 1 {
            l
        } else {
            return Err(ShapeError::IncompatibleBroadcast {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
                axis,
            });
        };
    }

    Ok(out)
}

#[must_use]
pub fn can_broadcast(lhs: &[usize], rhs: &[usize]) -> bool {
    broadcast_shape(lhs, rhs).is_ok()
}

/// Owned, contiguous, row-major array of f64.
///
/// Invariant: `data.len() == element_count(shape)`, established at
/// construction and preserved by every operation. Arrays are never mutated
/// after construction; every operation returns a fresh owned array.
#[derive(Debug, Clone, PartialEq)]
pub struct NDArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NDArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = element_count(&shape)?;
        if data.len() != expected {
            return Err(ShapeError::DataLengthMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self, ShapeError> {
        let count = element_count(&shape)?;
        Ok(Self {
            shape,
            data: vec![0.0; count],
        })
    }

    /// Rank-0 array holding a single value.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn strides(&self) -> Vec<usize> {
        row_major_strides(&self.shape)
    }

    /// Flat row-major offset of a multi-index, validated per axis.
    pub fn flat_offset(&self, index: &[usize]) -> Result<usize, IndexError> {
        if index.len() != self.shape.len() {
            return Err(IndexError::RankMismatch {
                expected: self.shape.len(),
                actual: index.len(),
            });
        }

        let mut offset = 0usize;
        let mut stride = 1usize;
        for axis in (0..self.shape.len()).rev() {
            let dim = self.shape[axis];
            let idx = index[axis];
            if idx >= dim {
                return Err(IndexError::OutOfBounds {
                    axis,
                    index: idx,
                    dim,
                });
            }
            offset += idx * stride;
            stride *= dim;
        }
        Ok(offset)
    }

    pub fn get(&self, index: &[usize]) -> Result<f64, IndexError> {
        let offset = self.flat_offset(index)?;
        Ok(self.data[offset])
    }

    /// Apply a pure function to every element, preserving the shape.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Same flat element order under a new shape; element counts must match.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, ShapeError> {
        let new_count = element_count(new_shape)?;
        if new_count != self.data.len() {
            return Err(ShapeError::IncompatibleElementCount {
                from: self.shape.clone(),
                to: new_shape.to_vec(),
                old: self.data.len(),
                new: new_count,
            });
        }
        Ok(Self {
            shape: new_shape.to_vec(),
            data: self.data.clone(),
        })
    }

    /// Matrix transpose: `out[j][i] = self[i][j]`. Rank-2 only.
    pub fn transpose(&self) -> Result<Self, ShapeError> {
        if self.shape.len() != 2 {
            return Err(ShapeError::NotTwoDimensional {
                shape: self.shape.clone(),
            });
        }

        let rows = self.shape[0];
        let cols = self.shape[1];
        let mut data = vec![0.0f64; self.data.len()];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Ok(Self {
            shape: vec![cols, rows],
            data,
        })
    }

    /// Copy out the half-open hyper-rectangle `[start, end)` per axis.
    ///
    /// Empty ranges (`start == end`) are legal and produce a zero-sized axis.
    pub fn slice(&self, ranges: &[(usize, usize)]) -> Result<Self, IndexError> {
        if ranges.len() != self.shape.len() {
            return Err(IndexError::RankMismatch {
                expected: self.shape.len(),
                actual: ranges.len(),
            });
        }

        let mut out_shape = Vec::with_capacity(ranges.len());
        for (axis, (&(start, end), &dim)) in ranges.iter().zip(&self.shape).enumerate() {
            if start > end {
                return Err(IndexError::InvertedRange { axis, start, end });
            }
            if end > dim {
                return Err(IndexError::RangeOutOfBounds {
                    axis,
                    start,
                    end,
                    dim,
                });
            }
            out_shape.push(end - start);
        }

        let out_count: usize = out_shape.iter().product();
        let strides = self.strides();
        let base: usize = ranges
            .iter()
            .zip(&strides)
            .map(|(&(start, _), &stride)| start * stride)
            .sum();

        let mut data = Vec::with_capacity(out_count);
        if out_count > 0 {
            // Walk the output as an odometer; the source offset moves by the
            // source stride on the axis being incremented.
            let mut odometer = vec![0usize; out_shape.len()];
            let mut src = base;
            for flat in 0..out_count {
                data.push(self.data[src]);
                if flat + 1 == out_count {
                    break;
                }
                for axis in (0..out_shape.len()).rev() {
                    odometer[axis] += 1;
                    src += strides[axis];
                    if odometer[axis] < out_shape[axis] {
                        break;
                    }
                    odometer[axis] = 0;
                    src -= strides[axis] * out_shape[axis];
                }
            }
        }

        Ok(Self {
            shape: out_shape,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        IndexError, NDArray, ShapeError, broadcast_shape, can_broadcast, element_count,
        row_major_strides,
    };

    fn arange(shape: Vec<usize>) -> NDArray {
        let count = element_count(&shape).expect("test shape");
        let data = (0..count).map(|v| v as f64).collect();
        NDArray::new(shape, data).expect("test array")
    }

    #[test]
    fn broadcast_shape_follows_right_aligned_rule() {
        let out = broadcast_shape(&[2, 1], &[1, 3]).expect("broadcast should succeed");
        assert_eq!(out, vec![2, 3]);

        let out = broadcast_shape(&[8, 1, 6, 1], &[7, 1, 5]).expect("broadcast should succeed");
        assert_eq!(out, vec![8, 7, 6, 5]);

        let out = broadcast_shape(&[], &[4, 2]).expect("scalar stretches to any shape");
        assert_eq!(out, vec![4, 2]);
    }

    #[test]
    fn broadcast_shape_rejects_mismatched_dimensions() {
        let err = broadcast_shape(&[2, 3], &[4, 3]).expect_err("should fail");
        assert_eq!(
            err,
            ShapeError::IncompatibleBroadcast {
                lhs: vec![2, 3],
                rhs: vec![4, 3],
                axis: 0,
            }
        );
        assert!(!can_broadcast(&[2, 3], &[4, 3]));
    }

    #[test]
    fn broadcast_shape_names_the_mismatched_axis() {
        let err = broadcast_shape(&[5, 2, 3], &[5, 4, 3]).expect_err("should fail");
        match err {
            ShapeError::IncompatibleBroadcast { axis, .. } => assert_eq!(axis, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn element_count_handles_scalars_zeros_and_overflow() {
        assert_eq!(element_count(&[]).expect("scalar"), 1);
        assert_eq!(element_count(&[2, 0, 3]).expect("zero dim"), 0);
        assert_eq!(element_count(&[2, 3, 4]).expect("plain"), 24);
        assert_eq!(
            element_count(&[usize::MAX, 2]).expect_err("should overflow"),
            ShapeError::Overflow
        );
    }

    #[test]
    fn strides_are_row_major() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn construction_enforces_the_shape_invariant() {
        let err = NDArray::new(vec![2, 2], vec![1.0, 2.0, 3.0]).expect_err("short data");
        assert!(matches!(err, ShapeError::DataLengthMismatch { expected: 4, actual: 3, .. }));

        let arr = NDArray::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).expect("square");
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.ndim(), 2);

        let zeroed = NDArray::zeros(vec![2, 3]).expect("zeros");
        assert_eq!(zeroed.len(), 6);
        assert!(zeroed.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn scalar_arrays_have_rank_zero_and_one_element() {
        let s = NDArray::scalar(7.5);
        assert!(s.shape().is_empty());
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(&[]).expect("empty index"), 7.5);
    }

    #[test]
    fn get_validates_rank_and_bounds() {
        let arr = arange(vec![2, 3]);
        assert_eq!(arr.get(&[1, 2]).expect("in range"), 5.0);

        let err = arr.get(&[1]).expect_err("rank mismatch");
        assert_eq!(err, IndexError::RankMismatch { expected: 2, actual: 1 });

        let err = arr.get(&[1, 3]).expect_err("out of bounds");
        assert_eq!(
            err,
            IndexError::OutOfBounds {
                axis: 1,
                index: 3,
                dim: 3,
            }
        );
    }

    #[test]
    fn reshape_preserves_flat_order_and_round_trips() {
        let arr = arange(vec![2, 3]);
        let reshaped = arr.reshape(&[3, 2]).expect("same element count");
        assert_eq!(reshaped.shape(), &[3, 2]);
        assert_eq!(reshaped.data(), arr.data());

        let back = reshaped.reshape(&[2, 3]).expect("round trip");
        assert_eq!(back, arr);
    }

    #[test]
    fn reshape_rejects_element_count_mismatch() {
        let arr = arange(vec![2, 3]);
        let err = arr.reshape(&[4, 2]).expect_err("7 != 8");
        assert_eq!(
            err,
            ShapeError::IncompatibleElementCount {
                from: vec![2, 3],
                to: vec![4, 2],
                old: 6,
                new: 8,
            }
        );
    }

    #[test]
    fn transpose_swaps_axes_and_is_an_involution() {
        let arr = arange(vec![2, 3]);
        let t = arr.transpose().expect("rank 2");
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.data(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert_eq!(t.transpose().expect("rank 2"), arr);
    }

    #[test]
    fn transpose_rejects_non_matrix_input() {
        let err = arange(vec![6]).transpose().expect_err("rank 1");
        assert_eq!(err, ShapeError::NotTwoDimensional { shape: vec![6] });
    }

    #[test]
    fn slice_copies_the_requested_window() {
        // 3x3 filled 0..8 row-major, rows [0,2) and cols [1,3).
        let arr = arange(vec![3, 3]);
        let out = arr.slice(&[(0, 2), (1, 3)]).expect("in range");
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data(), &[1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn slice_supports_full_single_and_empty_ranges() {
        let arr = arange(vec![3, 3]);

        let full = arr.slice(&[(0, 3), (0, 3)]).expect("full range");
        assert_eq!(full, arr);

        let single = arr.slice(&[(2, 3), (0, 1)]).expect("single element");
        assert_eq!(single.shape(), &[1, 1]);
        assert_eq!(single.data(), &[6.0]);

        let empty = arr.slice(&[(1, 1), (0, 3)]).expect("empty start==end");
        assert_eq!(empty.shape(), &[0, 3]);
        assert!(empty.is_empty());
    }

    #[test]
    fn slice_validates_ranges() {
        let arr = arange(vec![3, 3]);

        let err = arr.slice(&[(0, 2)]).expect_err("rank mismatch");
        assert_eq!(err, IndexError::RankMismatch { expected: 2, actual: 1 });

        let err = arr.slice(&[(0, 4), (0, 3)]).expect_err("end past dim");
        assert_eq!(
            err,
            IndexError::RangeOutOfBounds {
                axis: 0,
                start: 0,
                end: 4,
                dim: 3,
            }
        );

        let err = arr.slice(&[(2, 1), (0, 3)]).expect_err("inverted");
        assert_eq!(
            err,
            IndexError::InvertedRange {
                axis: 0,
                start: 2,
                end: 1,
            }
        );
    }

    #[test]
    fn slice_generalizes_past_rank_two() {
        let arr = arange(vec![2, 3, 4]);
        let out = arr.slice(&[(1, 2), (0, 2), (2, 4)]).expect("3-d window");
        assert_eq!(out.shape(), &[1, 2, 2]);
        assert_eq!(out.data(), &[14.0, 15.0, 18.0, 19.0]);
    }

    #[test]
    fn slice_of_scalar_is_identity() {
        let s = NDArray::scalar(3.0);
        let out = s.slice(&[]).expect("no axes to slice");
        assert_eq!(out, s);
    }

    #[test]
    fn every_op_preserves_the_shape_invariant() {
        let arr = arange(vec![3, 3]);
        for produced in [
            arr.reshape(&[9]).expect("reshape"),
            arr.transpose().expect("transpose"),
            arr.slice(&[(0, 2), (1, 3)]).expect("slice"),
            arr.slice(&[(0, 0), (0, 3)]).expect("empty slice"),
        ] {
            let count = element_count(produced.shape()).expect("count");
            assert_eq!(produced.data().len(), count);
        }
    }
}
