use smallvec::SmallVec;

use crate::core::shape::{Shape, Stride};

type Axes<T> = SmallVec<[T; 4]>;

#[derive(Clone, Debug)]
enum Traversal {
    Flat {
        start: usize,
        stride: usize,
    },
    Strided {
        sizes: Axes<usize>,
        strides: Axes<Stride>,
        offset: usize,
    },
}

/// Restartable cursor over element offsets.
///
/// Flat striders step by a fixed stride from `start`. Strided ones walk a
/// per-axis odometer, so transposed, flipped and broadcast (zero-stride)
/// layouts are traversed without copying.
#[derive(Clone, Debug)]
pub struct Strider {
    traversal: Traversal,
    indices: Axes<usize>,
    current: usize,
    maximum: usize,
}

impl Strider {
    pub fn flat(start: usize, stride: usize, len: usize) -> Strider {
        Strider {
            traversal: Traversal::Flat { start, stride },
            indices: Axes::new(),
            current: 0,
            maximum: len,
        }
    }

    pub fn strided(shape: &Shape) -> Strider {
        Strider {
            traversal: Traversal::Strided {
                sizes: shape.sizes().iter().copied().collect(),
                strides: shape.strides().iter().copied().collect(),
                offset: shape.offset(),
            },
            indices: SmallVec::from_elem(0, shape.rank()),
            current: 0,
            maximum: shape.numel(),
        }
    }

    /// Flat traversal when the layout allows it, strided otherwise.
    pub fn from_shape(shape: &Shape) -> Strider {
        if shape.is_contiguous() {
            Strider::flat(shape.offset(), 1, shape.numel())
        } else {
            Strider::strided(shape)
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.traversal, Traversal::Flat { .. })
    }

    /// Total number of offsets in one pass.
    pub fn steps(&self) -> usize {
        self.maximum
    }

    /// Rewinds to the first offset. The sequence that follows is identical
    /// to the one produced since construction.
    pub fn reset(&mut self) {
        self.current = 0;
        self.indices.iter_mut().for_each(|index| *index = 0);
    }
}

impl Iterator for Strider {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.maximum {
            return None;
        }

        let next = match &self.traversal {
            Traversal::Flat { start, stride } => start + self.current * stride,
            Traversal::Strided {
                sizes,
                strides,
                offset,
            } => {
                let next = sizes
                    .iter()
                    .zip(strides)
                    .zip(&self.indices)
                    .map(|((&size, stride), &index)| stride.offset(index, size))
                    .sum::<usize>()
                    + offset;

                for i in (0..sizes.len()).rev() {
                    self.indices[i] += 1;

                    if self.indices[i] < sizes[i] {
                        break;
                    }

                    self.indices[i] = 0;
                }

                next
            }
        };

        self.current += 1;
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.maximum - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Strider {}
