use std::{
    cmp::{max, Ordering},
    iter::repeat,
};

use crate::core::errors::*;

#[derive(Clone, Debug)]
pub struct Shape {
    pub(crate) sizes: Vec<usize>,
    pub(crate) strides: Vec<Stride>,
    pub(crate) offset: usize,
}

#[derive(Copy, Clone, Debug)]
pub enum Stride {
    Positive(usize),
    Negative(usize),
}

impl Shape {
    /// Row-major layout of `sizes` starting at offset zero.
    pub fn new(sizes: &[usize]) -> Shape {
        Shape {
            sizes: sizes.to_vec(),
            strides: row_major(sizes),
            offset: 0,
        }
    }

    pub fn scalar() -> Shape {
        Shape::new(&[])
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn strides(&self) -> &[Stride] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn numel(&self) -> usize {
        self.sizes.iter().product()
    }

    /// Largest element offset this layout touches, plus one.
    pub(crate) fn extent(&self) -> usize {
        if self.numel() == 0 {
            return self.offset;
        }

        self.sizes
            .iter()
            .zip(&self.strides)
            .map(|(&size, stride)| stride.magnitude() * (size - 1))
            .sum::<usize>()
            + self.offset
            + 1
    }

    /// True when two logical positions map to the same element.
    pub(crate) fn overlaps(&self) -> bool {
        let numel = self.numel();
        if numel <= 1 {
            return false;
        }

        let zero_stride = self
            .sizes
            .iter()
            .zip(&self.strides)
            .any(|(&size, stride)| size > 1 && stride.magnitude() == 0);

        zero_stride || self.extent() - self.offset < numel
    }

    // --- Shape operations ---

    pub(crate) fn permute(&self, permutation: &[usize]) -> Result<Shape, DimensionError> {
        self.valid_rank(permutation.len())?;
        self.valid_dimensions(permutation)?;

        let (sizes, strides) = permutation
            .iter()
            .map(|&i| (self.sizes[i], self.strides[i]))
            .unzip();

        Ok(Shape {
            sizes,
            strides,
            offset: self.offset,
        })
    }

    pub(crate) fn transpose(&self, dim_1: usize, dim_2: usize) -> anyhow::Result<Shape> {
        let rank = self.rank();
        if rank < 2 {
            return Err(ShapeError::Transpose.into());
        }

        self.valid_dimensions(&[dim_1])?;
        self.valid_dimensions(&[dim_2])?;

        let mut permutation = Vec::from_iter(0..rank);
        permutation.swap(dim_1, dim_2);

        Ok(self.permute(&permutation)?)
    }

    pub(crate) fn flip(&self, flips: &[usize]) -> Result<Shape, DimensionError> {
        self.valid_dimensions(flips)?;

        let strides = self
            .strides
            .iter()
            .enumerate()
            .map(|(i, &stride)| {
                if flips.contains(&i) {
                    match stride {
                        Stride::Positive(stride_val) => Stride::Negative(stride_val),
                        Stride::Negative(stride_val) => Stride::Positive(stride_val),
                    }
                } else {
                    stride
                }
            })
            .collect();

        Ok(Shape {
            sizes: self.sizes.to_vec(),
            strides,
            offset: self.offset,
        })
    }

    pub(crate) fn expand(&self, expansions: &[usize]) -> anyhow::Result<Shape> {
        if self.sizes == expansions {
            return Ok(self.clone());
        }

        self.valid_rank(expansions.len())?;

        let (sizes, strides) = self
            .sizes
            .iter()
            .zip(self.strides.iter())
            .zip(expansions)
            .map(|((&size, &stride), &expansion)| {
                if expansion == size {
                    Ok((size, stride))
                } else if size == 1 {
                    Ok((expansion, Stride::Positive(0)))
                } else {
                    Err(ShapeError::Expansion { size, expansion })
                }
            })
            .collect::<Result<(Vec<usize>, Vec<Stride>), ShapeError>>()?;

        Ok(Shape {
            sizes,
            strides,
            offset: self.offset,
        })
    }

    /// Prepends size-1 axes until the rank is `unsqueezed`.
    pub(crate) fn unsqueeze(&self, unsqueezed: usize) -> Result<Shape, ShapeError> {
        let current = self.rank();

        match unsqueezed.cmp(&current) {
            Ordering::Equal => Ok(self.clone()),
            Ordering::Less => Err(ShapeError::Unsqueeze {
                current,
                unsqueezed,
            }),
            Ordering::Greater => {
                let ones_len = unsqueezed - current;
                let outer = self
                    .sizes
                    .first()
                    .zip(self.strides.first())
                    .map_or(1, |(&size, stride)| size * stride.magnitude());

                let mut sizes = self.sizes.to_vec();
                let mut strides = self.strides.to_vec();
                sizes.splice(..0, repeat(1).take(ones_len));
                strides.splice(..0, repeat(Stride::Positive(outer.max(1))).take(ones_len));

                Ok(Shape {
                    sizes,
                    strides,
                    offset: self.offset,
                })
            }
        }
    }

    /// Layout of this shape stretched to `sizes` with zero strides on
    /// broadcast axes.
    pub(crate) fn broadcast_to(&self, sizes: &[usize]) -> anyhow::Result<Shape> {
        if self.sizes == sizes {
            return Ok(self.clone());
        }

        self.unsqueeze(sizes.len())?.expand(sizes)
    }

    // --- Index ---

    pub(crate) fn idx(&self, indices: &[usize]) -> usize {
        self.sizes
            .iter()
            .zip(self.strides.iter())
            .zip(indices)
            .map(|((&size, stride), &index)| stride.offset(index, size))
            .sum::<usize>()
            + self.offset
    }

    pub(crate) fn index(&self, indices: &[usize]) -> anyhow::Result<usize> {
        self.valid_rank(indices.len())?;

        for (&index, &size) in indices.iter().zip(&self.sizes) {
            if index >= size {
                return Err(IndexError::Element {
                    index,
                    length: size,
                }
                .into());
            }
        }

        Ok(self.idx(indices))
    }

    // --- Broadcast ---

    /// Result sizes of two operands aligned on their trailing axes.
    pub(crate) fn broadcast(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, BroadcastError> {
        let rank = max(lhs.len(), rhs.len());
        let padded = |sizes: &[usize], axis: usize| {
            (axis + sizes.len()).checked_sub(rank).map_or(1, |i| sizes[i])
        };

        (0..rank)
            .map(|axis| match (padded(lhs, axis), padded(rhs, axis)) {
                (l, r) if l == r || r == 1 => Ok(l),
                (1, r) => Ok(r),
                _ => Err(BroadcastError {
                    lhs_sizes: lhs.to_vec(),
                    rhs_sizes: rhs.to_vec(),
                }),
            })
            .collect()
    }

    // --- Validation ---

    /// Row-major with positive strides. Size-1 axes are ignored.
    pub(crate) fn is_contiguous(&self) -> bool {
        let mut expected = 1;

        for (&size, &stride) in self.sizes.iter().zip(&self.strides).rev() {
            if size == 1 {
                continue;
            }

            match stride {
                Stride::Positive(stride_val) if stride_val == expected => expected *= size,
                _ => return false,
            }
        }

        true
    }

    pub(crate) fn valid_dimensions(&self, dimensions: &[usize]) -> Result<(), DimensionError> {
        for (i, &dimension) in dimensions.iter().enumerate() {
            if dimension >= self.rank() {
                return Err(DimensionError::OutOfRange {
                    dimension,
                    dim_range: self.rank().saturating_sub(1),
                });
            }
            if dimensions[..i].contains(&dimension) {
                return Err(DimensionError::Repetition(dimension));
            }
        }

        Ok(())
    }

    fn valid_rank(&self, num_indices: usize) -> Result<(), DimensionError> {
        let num_dimensions = self.rank();

        if num_indices != num_dimensions {
            Err(DimensionError::Rank {
                num_indices,
                num_dimensions,
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn valid_data_length(&self, data_length: usize) -> Result<(), ShapeError> {
        let numel = self.numel();

        if data_length != numel {
            Err(ShapeError::DataLength {
                data_length,
                tensor_size: numel,
            })
        } else {
            Ok(())
        }
    }
}

fn row_major(sizes: &[usize]) -> Vec<Stride> {
    let mut current = 1;
    let mut strides: Vec<Stride> = sizes
        .iter()
        .rev()
        .map(|size| {
            let stride_val = current;
            current *= size;
            Stride::Positive(stride_val)
        })
        .collect();
    strides.reverse();
    strides
}

impl Stride {
    pub(crate) fn magnitude(&self) -> usize {
        match self {
            Stride::Positive(stride_val) | Stride::Negative(stride_val) => *stride_val,
        }
    }

    pub(crate) fn offset(&self, index: usize, size: usize) -> usize {
        match self {
            Stride::Positive(stride_val) => index * stride_val,
            Stride::Negative(stride_val) => (size - 1 - index) * stride_val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_is_contiguous() {
        let shape = Shape::new(&[2, 3, 4]);

        assert!(shape.is_contiguous());
        assert_eq!(shape.numel(), 24);
        assert_eq!(shape.idx(&[1, 2, 3]), 23);
        assert!(Shape::scalar().is_contiguous());
    }

    #[test]
    fn transpose_and_flip_break_contiguity() {
        let shape = Shape::new(&[2, 3]);

        let transposed = shape.transpose(0, 1).unwrap();
        assert!(!transposed.is_contiguous());
        assert_eq!(transposed.idx(&[2, 1]), 5);

        let flipped = shape.flip(&[1]).unwrap();
        assert!(!flipped.is_contiguous());
        assert_eq!(flipped.idx(&[0, 0]), 2);
    }

    #[test]
    fn broadcast_sizes() {
        assert_eq!(Shape::broadcast(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(Shape::broadcast(&[2, 1], &[1, 4]).unwrap(), vec![2, 4]);
        assert!(Shape::broadcast(&[2, 3], &[4]).is_err());
    }

    #[test]
    fn broadcast_to_uses_zero_strides() {
        let row = Shape::new(&[3]).broadcast_to(&[2, 3]).unwrap();

        assert_eq!(row.sizes(), &[2, 3]);
        assert_eq!(row.idx(&[1, 2]), 2);
        assert_eq!(row.extent(), 3);
        assert!(!row.is_contiguous());
    }

    #[test]
    fn overlapping_layouts() {
        assert!(!Shape::new(&[2, 3]).overlaps());
        assert!(!Shape::new(&[2, 3]).flip(&[0]).unwrap().overlaps());
        assert!(!Shape::new(&[1]).broadcast_to(&[1, 1]).unwrap().overlaps());
        assert!(Shape::new(&[3]).broadcast_to(&[2, 3]).unwrap().overlaps());

        let folded = Shape {
            sizes: vec![2, 2],
            strides: vec![Stride::Positive(1), Stride::Positive(1)],
            offset: 4,
        };
        assert!(folded.overlaps());
    }

    #[test]
    fn unsqueeze_keeps_strides() {
        let transposed = Shape::new(&[2, 3]).transpose(0, 1).unwrap();
        let unsqueezed = transposed.unsqueeze(3).unwrap();

        assert_eq!(unsqueezed.sizes(), &[1, 3, 2]);
        assert_eq!(unsqueezed.idx(&[0, 2, 1]), transposed.idx(&[2, 1]));
    }

    #[test]
    fn index_validates() {
        let shape = Shape::new(&[2, 2]);

        assert_eq!(shape.index(&[1, 0]).unwrap(), 2);
        assert!(shape.index(&[2, 0]).is_err());
        assert!(shape.index(&[0]).is_err());
    }
}
