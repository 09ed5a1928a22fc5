use anyhow::{bail, Result};

use crate::core::{
    array::{copy_iter, Array},
    dtype::{Dtype, Element},
    errors::*,
    iters::Strider,
    shape::{Shape, Stride},
};

/// Strided view over an [`Array`].
///
/// Cloning a tensor clones the handle; both clones read and write the same
/// memory. Use [`Tensor::materialize`] for an independent copy.
#[derive(Clone)]
pub struct Tensor {
    pub(crate) array: Array,
    pub(crate) shape: Shape,
}

impl Tensor {
    // --- Construction ---

    /// Lays `array` out row-major as `sizes`.
    pub fn from_array(array: Array, sizes: &[usize]) -> Result<Tensor> {
        let shape = Shape::new(sizes);
        shape.valid_data_length(array.len())?;

        Ok(Tensor { array, shape })
    }

    /// Pairs an array with an arbitrary layout. The layout must stay inside
    /// the array.
    pub fn with_layout(array: Array, shape: Shape) -> Result<Tensor> {
        let extent = shape.extent();
        if extent > array.len() {
            bail!(ShapeError::DataLength {
                data_length: array.len(),
                tensor_size: extent,
            });
        }

        Ok(Tensor { array, shape })
    }

    pub fn new<T: Element>(data: &[T], sizes: &[usize]) -> Result<Tensor> {
        Tensor::from_array(Array::from_slice(data), sizes)
    }

    pub fn new_1d<T: Element>(data: &[T]) -> Tensor {
        Tensor {
            array: Array::from_slice(data),
            shape: Shape::new(&[data.len()]),
        }
    }

    /// Rank-0 tensor holding one element.
    pub fn scalar<T: Element>(value: T) -> Tensor {
        Tensor {
            array: Array::from_slice(&[value]),
            shape: Shape::scalar(),
        }
    }

    pub fn zeros(dtype: &Dtype, sizes: &[usize]) -> Tensor {
        let shape = Shape::new(sizes);

        Tensor {
            array: Array::create(dtype, shape.numel()),
            shape,
        }
    }

    pub fn from_bools(data: &[bool], sizes: &[usize]) -> Result<Tensor> {
        Tensor::from_array(Array::from_bools(data), sizes)
    }

    // --- Attributes ---

    pub fn dtype(&self) -> &Dtype {
        self.array.dtype()
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn sizes(&self) -> &[usize] {
        self.shape.sizes()
    }

    pub fn strides(&self) -> &[Stride] {
        self.shape.strides()
    }

    pub fn offset(&self) -> usize {
        self.shape.offset()
    }

    pub fn is_contiguous(&self) -> bool {
        self.shape.is_contiguous()
    }

    pub fn shares_buffer(&self, other: &Tensor) -> bool {
        self.array.shares_buffer(&other.array)
    }

    pub fn is_natively_accessible(&self) -> bool {
        self.array.is_natively_accessible()
    }

    // --- Same Data, Different Shape ---

    pub(crate) fn with_shape(&self, shape: Shape) -> Tensor {
        Tensor {
            array: self.array.clone(),
            shape,
        }
    }

    pub fn transpose(&self, dim_1: usize, dim_2: usize) -> Result<Tensor> {
        Ok(self.with_shape(self.shape.transpose(dim_1, dim_2)?))
    }

    pub fn flip(&self, flips: &[usize]) -> Result<Tensor> {
        Ok(self.with_shape(self.shape.flip(flips)?))
    }

    pub fn expand(&self, expansions: &[usize]) -> Result<Tensor> {
        Ok(self.with_shape(self.shape.expand(expansions)?))
    }

    pub fn broadcast_to(&self, sizes: &[usize]) -> Result<Tensor> {
        Ok(self.with_shape(self.shape.broadcast_to(sizes)?))
    }

    // --- Data ---

    /// Contiguous deep copy in logical order.
    pub fn materialize(&self) -> Result<Tensor> {
        let out = Tensor::zeros(self.dtype(), self.sizes());
        let mut dst_iter = Strider::from_shape(&out.shape);
        let mut src_iter = Strider::from_shape(&self.shape);

        copy_iter(&out.array, &self.array, &mut dst_iter, &mut src_iter)?;
        Ok(out)
    }

    fn gather<R>(&self, read: impl Fn(usize) -> Result<R>) -> Result<Vec<R>> {
        Strider::from_shape(&self.shape).map(read).collect()
    }

    /// Elements in logical (row-major) order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.is_contiguous() {
            let start = self.offset();
            let data = self.array.slice(start, start + self.numel())?;
            return data.to_vec();
        }

        self.gather(|offset| self.array.get::<T>(offset))
    }

    pub fn to_bools(&self) -> Result<Vec<bool>> {
        if !self.dtype().is_bool() {
            bail!(self.dtype().mismatch(&Dtype::boolean()));
        }

        self.gather(|offset| Ok(self.array.get_bytes(offset)?[0] != 0))
    }

    pub fn get<T: Element>(&self, indices: &[usize]) -> Result<T> {
        self.array.get(self.shape.index(indices)?)
    }
}
