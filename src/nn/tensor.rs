//! Tensor API.
//!
//! Tensors are the inputs and outputs of neural networks: N-dimensional arrays of `f32` values.
//! This module provides just enough structure to move image data into a network and to pull typed
//! slices back out of its outputs.

use std::fmt;

use crate::iter::zip_exact;
use tinyvec::TinyVec;

/// Shape and strides of a tensor, stored back to back in one small vector.
#[derive(Clone)]
struct Layout(TinyVec<[usize; 8]>);

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut vec = TinyVec::from(shape);
        vec.extend(shape.iter().map(|_| 0));

        let mut stride = 1;
        for (out, size) in zip_exact(
            vec[shape.len()..].iter_mut().rev(),
            shape.iter().copied().rev(),
        ) {
            *out = stride;
            stride *= size;
        }

        Self(vec)
    }

    fn shape(&self) -> &[usize] {
        &self.0[..self.0.len() / 2]
    }

    fn elements(&self) -> usize {
        self.shape().iter().product()
    }

    fn strides(&self) -> &[usize] {
        &self.0[self.0.len() / 2..]
    }

    fn shape_and_strides(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.shape()
            .iter()
            .copied()
            .zip(self.strides().iter().copied())
    }

    fn remove_prefix(&self, num: usize) -> Layout {
        assert!(num <= self.shape().len());

        let mut vec = TinyVec::with_capacity(self.shape().len() - num);
        for &size in &self.shape()[num..] {
            vec.push(size);
        }
        for &stride in &self.strides()[num..] {
            vec.push(stride);
        }
        Layout(vec)
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

/// A dynamically sized tensor with `f32` elements.
///
/// [`Tensor::index`] creates a [`TensorView`] of a suffix of the tensor's dimensions. The data of
/// 1-dimensional tensors/views is accessed with `as_slice`, and 0-dimensional ones with
/// `as_singular`. Together these cover every access pattern the model glue in this crate needs.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed view into a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates an `N`-dimensional tensor of the given shape by calling `f` for each element.
    ///
    /// `f` is invoked with successive index vectors, starting at `[0, ..., 0]` and incrementing
    /// the innermost dimension first.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let mut data = Vec::with_capacity(shape.iter().product());
        let mut index = [0; N];
        if shape.iter().all(|&dim| dim != 0) {
            'fill: loop {
                data.push(f(index));
                for dim in (0..N).rev() {
                    if index[dim] + 1 < shape[dim] {
                        index[dim] += 1;
                        continue 'fill;
                    }
                    index[dim] = 0;
                }
                break;
            }
        }
        Self {
            layout: Layout::from_shape(&shape),
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as `shape` describes, otherwise this method
    /// panics.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<_> = iter.into_iter().collect();
        assert_eq!(data.len(), layout.elements());
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> Self {
        Self::from_iter(
            tract.shape(),
            tract.as_slice::<f32>().unwrap().iter().copied(),
        )
    }

    pub(super) fn to_tract(&self) -> tract_onnx::prelude::Tensor {
        tract_onnx::prelude::Tensor::from_shape(self.shape(), &self.data).unwrap()
    }

    pub(super) fn as_raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the shape of this tensor: the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[2, 3, 4]` with `[a]` yields a view of shape `[3, 4]`; with
    /// `[a, b, c]` it yields a 0-dimensional view (a single value).
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any index is out of
    /// bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );

        let mut data = &*self.data;
        for ((length, stride), index) in self.layout.shape_and_strides().zip(indices) {
            assert!(
                index < length,
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape(),
                indices
            );
            data = &data[index * stride..(index + 1) * stride];
        }
        TensorView {
            layout: self.layout.remove_prefix(N),
            data,
        }
    }

    /// Iterates over the outermost dimension of this tensor.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor"
        );
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values stored in a 1-dimensional tensor as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape()
        );
        &self.data
    }

    /// Returns the value stored in a 0-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor of shape {:?} as singular element",
            self.shape(),
        );
        self.data[0]
    }
}

impl<'a> From<&'a [f32]> for Tensor {
    fn from(slice: &'a [f32]) -> Self {
        Tensor::from_iter(&[slice.len()], slice.iter().copied())
    }
}

impl<'d> TensorView<'d> {
    /// Returns the shape of this tensor view.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions of this view.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the view's dimensions with `indices`; see [`Tensor::index`].
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor view of shape {:?} with {:?}",
            self.shape(),
            indices
        );
        let mut data = self.data;
        for (&stride, &index) in self.layout.strides().iter().zip(&indices) {
            data = &data[index * stride..(index + 1) * stride];
        }
        TensorView {
            layout: self.layout.remove_prefix(N),
            data,
        }
    }

    /// Iterates over the outermost dimension of this view.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor view"
        );
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values stored in a 1-dimensional view as a slice.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as slice",
            self.shape()
        );
        self.data
    }

    /// Returns the value stored in a 0-dimensional view.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access view of shape {:?} as singular element",
            self.shape(),
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor").field("shape", &self.shape()).finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shape_fn_order() {
        let expected = [
            [0, 0, 0],
            [0, 0, 1],
            [0, 0, 2],
            [0, 1, 0],
            [0, 1, 1],
            [0, 1, 2],
        ];

        let mut iter = expected.into_iter();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            assert_eq!(iter.next(), Some(index));
            0.0
        });
        assert_eq!(tensor.rank(), 3);
        assert_eq!(tensor.shape(), &[1, 2, 3]);
    }

    #[test]
    fn empty_dimension() {
        let tensor = Tensor::from_array_shape_fn([1, 2, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[1, 2, 0, 3]);
        assert_eq!(tensor.iter().count(), 1);
    }

    #[test]
    fn index_views() {
        let iter = [[0.0, 1.0], [2.0, 3.0]].into_iter().flatten();
        let tensor = Tensor::from_iter(&[2, 2], iter);
        assert_eq!(tensor.shape(), [2, 2]);

        let row0 = tensor.index([0]);
        assert_eq!(row0.shape(), [2]);
        assert_eq!(row0.as_slice(), [0.0, 1.0]);

        let row1 = tensor.index([1]);
        assert_eq!(row1.as_slice(), [2.0, 3.0]);

        assert_eq!(tensor.index([1, 1]).as_singular(), 3.0);
        assert_eq!(tensor.index([1, 0]).as_singular(), 2.0);
    }
}
