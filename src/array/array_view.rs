//! Views of arrays.
//!
//! A view remaps the dimensions of an array without copying it.
//! A [slice](super::MDArray::slice) fixes a dimension to an index, a [transpose](super::MDArray::transpose) reorders
//! the dimensions. Views compose: each is a [`ViewMapping`] from the dimensions of the view to those of the base array.

use ndarray::{ArrayViewD, IxDyn};

use crate::error::MdError;

use super::{block_transpose::transpose_2d_batched, ArrayError, ArrayShape};

/// The source of the index of a dimension of a base array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AxisSource {
    /// Fixed by a slice.
    Fixed(u64),
    /// A dimension of the view.
    View(usize),
}

/// A mapping from the dimensions of a view to those of its base array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ViewMapping {
    /// One entry per dimension of the base array.
    base_axes: Vec<AxisSource>,
}

/// A view window mapped to the base array.
pub(crate) struct BaseWindow {
    pub(crate) start: Vec<u64>,
    pub(crate) count: Vec<u64>,
    pub(crate) step: Vec<i64>,
}

impl ViewMapping {
    /// The mapping of an array onto itself.
    pub(crate) fn identity(dimensionality: usize) -> Self {
        Self {
            base_axes: (0..dimensionality).map(AxisSource::View).collect(),
        }
    }

    /// The number of dimensions of the view.
    pub(crate) fn dimensionality(&self) -> usize {
        self.base_axes
            .iter()
            .filter(|source| matches!(source, AxisSource::View(_)))
            .count()
    }

    /// The dimensions of the base array backing each dimension of the view.
    pub(crate) fn view_to_base(&self) -> Vec<usize> {
        let mut base = vec![0; self.dimensionality()];
        for (axis, source) in self.base_axes.iter().enumerate() {
            if let AxisSource::View(view_axis) = source {
                base[*view_axis] = axis;
            }
        }
        base
    }

    /// The shape of the view of a base array of `base_shape`.
    pub(crate) fn shape(&self, base_shape: &[u64]) -> ArrayShape {
        self.view_to_base()
            .into_iter()
            .map(|axis| base_shape.get(axis).copied().unwrap_or(0))
            .collect()
    }

    /// The view with its dimensions reordered: dimension `i` of the transposed view is dimension `axes[i]` of this view.
    ///
    /// # Errors
    /// Returns [`MdError::InvalidArgument`] if `axes` is not a permutation of the dimensions of the view.
    pub(crate) fn transpose(&self, axes: &[usize]) -> Result<Self, MdError> {
        let dimensionality = self.dimensionality();
        let mut seen = vec![false; dimensionality];
        if axes.len() != dimensionality {
            return Err(MdError::InvalidArgument(format!(
                "Transpose() expects {dimensionality} axes, got {}",
                axes.len()
            )));
        }
        for axis in axes {
            match seen.get_mut(*axis) {
                Some(seen) if !*seen => *seen = true,
                _ => {
                    return Err(MdError::InvalidArgument(format!(
                        "Invalid axis permutation {axes:?}"
                    )))
                }
            }
        }
        let base_axes = self
            .base_axes
            .iter()
            .map(|source| match source {
                AxisSource::View(view_axis) => AxisSource::View(
                    axes.iter()
                        .position(|axis| axis == view_axis)
                        .unwrap_or(*view_axis),
                ),
                fixed @ AxisSource::Fixed(_) => *fixed,
            })
            .collect();
        Ok(Self { base_axes })
    }

    /// The view with its dimension `axis` fixed to `index`.
    ///
    /// # Errors
    /// Returns [`MdError::InvalidArgument`] if `axis` is not a dimension of the view or `index` is out of bounds.
    pub(crate) fn slice(&self, axis: usize, index: u64, view_shape: &[u64]) -> Result<Self, MdError> {
        match view_shape.get(axis) {
            None => {
                return Err(MdError::InvalidArgument(format!(
                    "Invalid axis {axis} for a view of {} dimensions",
                    view_shape.len()
                )))
            }
            Some(extent) if index >= *extent => {
                return Err(MdError::InvalidArgument(format!(
                    "Index {index} is out of bounds of dimension {axis} of size {extent}"
                )))
            }
            Some(_) => {}
        }
        let base_axes = self
            .base_axes
            .iter()
            .map(|source| match source {
                AxisSource::View(view_axis) if *view_axis == axis => AxisSource::Fixed(index),
                AxisSource::View(view_axis) if *view_axis > axis => AxisSource::View(view_axis - 1),
                other => *other,
            })
            .collect();
        Ok(Self { base_axes })
    }

    /// Map a window of the view onto the base array.
    ///
    /// The arguments are expected to have the dimensionality of the view.
    pub(crate) fn base_window(&self, start: &[u64], count: &[u64], step: &[i64]) -> BaseWindow {
        let mut window = BaseWindow {
            start: Vec::with_capacity(self.base_axes.len()),
            count: Vec::with_capacity(self.base_axes.len()),
            step: Vec::with_capacity(self.base_axes.len()),
        };
        for source in &self.base_axes {
            let (start, count, step) = match source {
                AxisSource::Fixed(index) => (*index, 1, 1),
                AxisSource::View(axis) => (start[*axis], count[*axis], step[*axis]),
            };
            window.start.push(start);
            window.count.push(count);
            window.step.push(step);
        }
        window
    }

    /// The dimensions of the view in the order of the dimensions of the base array.
    pub(crate) fn base_order(&self) -> Vec<usize> {
        self.base_axes
            .iter()
            .filter_map(|source| match source {
                AxisSource::View(axis) => Some(*axis),
                AxisSource::Fixed(_) => None,
            })
            .collect()
    }

    /// The axis permutation from the order of the base array to the order of the view.
    pub(crate) fn read_permutation(&self) -> Vec<usize> {
        let base_order = self.base_order();
        (0..base_order.len())
            .map(|axis| {
                base_order
                    .iter()
                    .position(|base_axis| *base_axis == axis)
                    .unwrap_or(axis)
            })
            .collect()
    }
}

/// Permute the axes of the row-major array `src` of `shape` with `element_size` byte elements.
///
/// Axis `i` of the output is axis `axes[i]` of the input.
/// A transpose of the last two axes uses a cache-blocked transpose.
///
/// # Errors
/// Returns [`ArrayError::InvalidBytesInputSize`] if `src` is not the size of the array.
pub(crate) fn permute(
    src: Vec<u8>,
    shape: &[u64],
    axes: &[usize],
    element_size: usize,
) -> Result<Vec<u8>, ArrayError> {
    let expected = shape
        .iter()
        .try_fold(element_size, |size, extent| {
            usize::try_from(*extent)
                .ok()
                .and_then(|extent| size.checked_mul(extent))
        })
        .ok_or_else(|| ArrayError::WindowTooLarge(shape.to_vec()))?;
    if src.len() != expected {
        return Err(ArrayError::InvalidBytesInputSize(src.len(), expected));
    }

    // Unit axes do not move any data.
    let kept: Vec<usize> = (0..shape.len()).filter(|axis| shape[*axis] != 1).collect();
    let dims: Vec<usize> = kept
        .iter()
        .map(|axis| usize::try_from(shape[*axis]).unwrap_or(usize::MAX))
        .collect();
    let axes: Vec<usize> = axes
        .iter()
        .filter_map(|axis| kept.iter().position(|kept| kept == axis))
        .collect();

    let n = axes.len();
    if axes.iter().enumerate().all(|(i, axis)| i == *axis) {
        return Ok(src);
    }
    if n >= 2
        && axes[n - 2] == n - 1
        && axes[n - 1] == n - 2
        && axes[..n - 2].iter().enumerate().all(|(i, axis)| i == *axis)
    {
        let batch = dims[..n - 2].iter().product();
        let mut dst = vec![0; src.len()];
        transpose_2d_batched(&src, &mut dst, batch, dims[n - 2], dims[n - 1], element_size);
        return Ok(dst);
    }

    let mut element_dims = dims;
    element_dims.push(element_size);
    let mut element_axes = axes;
    element_axes.push(n);
    let view = ArrayViewD::from_shape(IxDyn(&element_dims), &src)
        .map_err(|_| ArrayError::InvalidBytesInputSize(src.len(), expected))?;
    Ok(view
        .permuted_axes(IxDyn(&element_axes))
        .iter()
        .copied()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_mapping_transpose_slice() {
        let base_shape = [2, 3, 4];
        let mapping = ViewMapping::identity(3).transpose(&[2, 0, 1]).unwrap();
        assert_eq!(mapping.shape(&base_shape), vec![4, 2, 3]);
        assert_eq!(mapping.base_order(), vec![1, 2, 0]);
        assert_eq!(mapping.read_permutation(), vec![2, 0, 1]);

        let sliced = mapping.slice(1, 1, &[4, 2, 3]).unwrap();
        assert_eq!(sliced.dimensionality(), 2);
        assert_eq!(sliced.shape(&base_shape), vec![4, 3]);
        let window = sliced.base_window(&[3, 0], &[1, 3], &[1, 1]);
        assert_eq!(window.start, vec![1, 0, 3]);
        assert_eq!(window.count, vec![1, 3, 1]);

        assert!(mapping.transpose(&[0, 0, 1]).is_err());
        assert!(mapping.transpose(&[0, 1]).is_err());
        assert!(mapping.slice(3, 0, &[4, 2, 3]).is_err());
        assert!(mapping.slice(0, 4, &[4, 2, 3]).is_err());
    }

    fn naive_permute(src: &[u16], shape: &[usize], axes: &[usize]) -> Vec<u16> {
        let out_shape: Vec<usize> = axes.iter().map(|axis| shape[*axis]).collect();
        let strides: Vec<usize> = (0..shape.len())
            .map(|axis| shape[axis + 1..].iter().product())
            .collect();
        let total: usize = shape.iter().product();
        (0..total)
            .map(|linear| {
                let mut rem = linear;
                let mut index = 0;
                for (i, extent) in out_shape.iter().enumerate().rev() {
                    index += (rem % extent) * strides[axes[i]];
                    rem /= extent;
                }
                src[index]
            })
            .collect()
    }

    #[test]
    fn permute_matches_naive() {
        let shape = [3usize, 1, 4, 5];
        let src: Vec<u16> = (0..60).collect();
        let shape_u64: Vec<u64> = shape.iter().map(|extent| *extent as u64).collect();
        for axes in [[0, 1, 2, 3], [0, 1, 3, 2], [3, 2, 1, 0], [2, 0, 3, 1], [1, 0, 2, 3]] {
            let permuted = permute(
                bytemuck::cast_slice(&src).to_vec(),
                &shape_u64,
                &axes,
                2,
            )
            .unwrap();
            let permuted: Vec<u16> = bytemuck::pod_collect_to_vec(&permuted);
            assert_eq!(permuted, naive_permute(&src, &shape, &axes), "{axes:?}");
        }
        assert!(permute(vec![0; 3], &[2], &[0], 2).is_err());
    }
}
