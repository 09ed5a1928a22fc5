use anyhow::{bail, Result};
use log::debug;

use crate::core::{
    dtype::{Dtype, Dtypes},
    errors::*,
    kernels::{BinaryKernels, CmpKernels, Kernels, UnaryKernels},
    shape::Shape,
    tensor::Tensor,
};

/// Operands of one engine call.
#[derive(Clone, Copy, Debug)]
pub enum Operands<'a> {
    /// Tensor with tensor. Shapes broadcast by the trailing-axis rule.
    Binary(&'a Tensor, &'a Tensor),
    /// Tensor with a one-element scalar. `left_tensor` tells which side the
    /// tensor sits on.
    Mixed {
        tensor: &'a Tensor,
        scalar: &'a Tensor,
        left_tensor: bool,
    },
    Unary(&'a Tensor),
    Compare(&'a Tensor, &'a Tensor),
}

impl<'a> Operands<'a> {
    /// Left operand, or the tensor side of a mixed op.
    pub fn primary(&self) -> &'a Tensor {
        match *self {
            Operands::Binary(a, _) | Operands::Compare(a, _) | Operands::Unary(a) => a,
            Operands::Mixed { tensor, .. } => tensor,
        }
    }

    pub(crate) fn secondary(&self) -> Option<&'a Tensor> {
        match *self {
            Operands::Binary(_, b) | Operands::Compare(_, b) => Some(b),
            Operands::Mixed { scalar, .. } => Some(scalar),
            Operands::Unary(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Operands::Binary(..) => "binary",
            Operands::Mixed { .. } => "mixed",
            Operands::Unary(_) => "unary",
            Operands::Compare(..) => "compare",
        }
    }
}

/// Caller options for one engine call.
///
/// ```ignore
/// let opts = Opts::new().reuse(&dest);
/// let opts = Opts::new().unsafe_();
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Opts<'a> {
    unsafe_: bool,
    reuse: Option<&'a Tensor>,
    incr: Option<&'a Tensor>,
    as_same_type: bool,
}

impl<'a> Opts<'a> {
    pub fn new() -> Opts<'a> {
        Opts::default()
    }

    /// Write the result into the left (or sole tensor) operand.
    pub fn unsafe_(mut self) -> Opts<'a> {
        self.unsafe_ = true;
        self
    }

    /// Write the result into `dest`.
    pub fn reuse(mut self, dest: &'a Tensor) -> Opts<'a> {
        self.reuse = Some(dest);
        self
    }

    /// Add the result onto `dest`.
    pub fn incr(mut self, dest: &'a Tensor) -> Opts<'a> {
        self.incr = Some(dest);
        self
    }

    /// Comparisons return one/zero in the operand dtype instead of bools.
    pub fn as_same_type(mut self) -> Opts<'a> {
        self.as_same_type = true;
        self
    }
}

/// Per-call decision record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpFlags {
    pub safe: bool,
    pub to_reuse: bool,
    pub incr: bool,
    pub use_iter: bool,
    pub left_tensor: bool,
    pub same: bool,
}

/// Kernels resolved for a plan.
#[derive(Clone, Copy, Debug)]
pub enum Resolved {
    Binary(BinaryKernels),
    Unary {
        kernels: UnaryKernels,
        add: Option<BinaryKernels>,
    },
    Compare {
        kernels: CmpKernels,
        add: Option<BinaryKernels>,
    },
}

/// Validated operation, ready for dispatch.
#[derive(Clone, Debug)]
pub struct Plan<'a> {
    pub(crate) op: &'a str,
    pub(crate) operands: Operands<'a>,
    pub(crate) dest: Option<&'a Tensor>,
    pub(crate) flags: OpFlags,
    pub(crate) resolved: Resolved,
    pub(crate) result_dtype: Dtype,
    pub(crate) sizes: Vec<usize>,
    /// Operand layouts stretched to `sizes`.
    pub(crate) layouts: Vec<Shape>,
}

impl<'a> Plan<'a> {
    pub fn op(&self) -> &str {
        self.op
    }

    pub fn flags(&self) -> OpFlags {
        self.flags
    }

    pub fn operands(&self) -> Operands<'a> {
        self.operands
    }

    pub fn result_dtype(&self) -> &Dtype {
        &self.result_dtype
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }
}

/// Validates operands and options against the registries and computes
/// the flags for one call.
pub struct Planner<'r> {
    dtypes: &'r Dtypes,
    kernels: &'r Kernels,
}

/// Equal sizes, treating every one-element shape as a scalar.
fn same_sizes(lhs: &[usize], rhs: &[usize]) -> bool {
    lhs == rhs || (lhs.iter().product::<usize>() == 1 && rhs.iter().product::<usize>() == 1)
}

/// Layout reading `tensor` as if it had `sizes`. One-element tensors are
/// read from their single offset whatever their rank.
pub(crate) fn layout_for(tensor: &Tensor, sizes: &[usize]) -> Result<Shape> {
    if tensor.numel() == 1 {
        let mut point = Shape::scalar();
        point.offset = tensor.offset();
        return point.broadcast_to(sizes);
    }

    tensor.shape().broadcast_to(sizes)
}

fn accessible(tensor: &Tensor) -> Result<(), InaccessibleBufferError> {
    match tensor.array.buffer().inaccessible() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl<'r> Planner<'r> {
    pub fn new(dtypes: &'r Dtypes, kernels: &'r Kernels) -> Planner<'r> {
        Planner { dtypes, kernels }
    }

    pub fn plan<'a>(&self, op: &'a str, operands: Operands<'a>, opts: Opts<'a>) -> Result<Plan<'a>> {
        let primary = operands.primary();
        let dtype = primary.dtype().clone();

        // Types
        if let Some(other) = operands.secondary() {
            if other.dtype() != &dtype {
                bail!(dtype.mismatch(other.dtype()));
            }
        }

        let same = match operands {
            Operands::Compare(a, _) => opts.as_same_type || a.dtype().is_bool(),
            _ => true,
        };
        // Same-typed comparisons without a destination are written into `a`.
        let in_place = opts.unsafe_
            || (matches!(operands, Operands::Compare(..))
                && same
                && opts.reuse.is_none()
                && opts.incr.is_none());

        // Shapes
        let sizes = match operands {
            Operands::Binary(a, b) | Operands::Compare(a, b) => {
                let sizes = Shape::broadcast(a.sizes(), b.sizes())?;
                if in_place && !same_sizes(a.sizes(), &sizes) {
                    bail!(ShapeError::InPlace {
                        operand: a.sizes().to_vec(),
                        result: sizes,
                    });
                }
                sizes
            }
            Operands::Mixed { tensor, scalar, .. } => {
                if scalar.numel() != 1 {
                    bail!(ShapeError::Scalar(scalar.numel()));
                }
                tensor.sizes().to_vec()
            }
            Operands::Unary(a) => a.sizes().to_vec(),
        };

        if in_place && primary.shape().overlaps() {
            bail!(ShapeError::Overlap(primary.sizes().to_vec()));
        }

        // Memory
        accessible(primary)?;
        if let Some(other) = operands.secondary() {
            accessible(other)?;
        }

        let result_dtype = if same {
            dtype.clone()
        } else {
            self.dtypes.boolean()
        };

        for dest in [opts.incr, opts.reuse].into_iter().flatten() {
            accessible(dest)?;

            if dest.dtype() != &result_dtype {
                bail!(result_dtype.mismatch(dest.dtype()));
            }
            if !same_sizes(dest.sizes(), &sizes) {
                bail!(ShapeError::Destination {
                    expected: sizes,
                    found: dest.sizes().to_vec(),
                });
            }
            if dest.shape().overlaps() {
                bail!(ShapeError::Overlap(dest.sizes().to_vec()));
            }
        }

        if opts.incr.is_some() && !same {
            bail!(TypeMismatchError {
                expected: dtype.name().to_string(),
                found: format!("{} (cannot accumulate)", result_dtype.name()),
            });
        }

        // Kernels
        let add = match opts.incr {
            Some(_) => Some(self.kernels.binary("add", &dtype)?),
            None => None,
        };
        let resolved = match operands {
            Operands::Binary(..) | Operands::Mixed { .. } => {
                Resolved::Binary(self.kernels.binary(op, &dtype)?)
            }
            Operands::Unary(_) => Resolved::Unary {
                kernels: self.kernels.unary(op, &dtype)?,
                add,
            },
            Operands::Compare(..) => Resolved::Compare {
                kernels: self.kernels.cmp(op, &dtype)?,
                add,
            },
        };

        // Layouts
        let layouts = match operands {
            Operands::Binary(a, b) | Operands::Compare(a, b) => {
                vec![layout_for(a, &sizes)?, layout_for(b, &sizes)?]
            }
            Operands::Mixed { tensor, scalar, .. } => {
                vec![tensor.shape().clone(), layout_for(scalar, &sizes)?]
            }
            Operands::Unary(a) => vec![a.shape().clone()],
        };

        let broadcasts = match operands {
            Operands::Binary(a, b) | Operands::Compare(a, b) => {
                a.sizes() != sizes.as_slice() || b.sizes() != sizes.as_slice()
            }
            _ => false,
        };
        let strided = [Some(primary), operands.secondary(), opts.incr, opts.reuse]
            .into_iter()
            .flatten()
            .any(|tensor| !tensor.is_contiguous());

        let flags = OpFlags {
            safe: !opts.unsafe_,
            to_reuse: opts.reuse.is_some(),
            incr: opts.incr.is_some(),
            use_iter: broadcasts || strided,
            left_tensor: match operands {
                Operands::Mixed { left_tensor, .. } => left_tensor,
                _ => true,
            },
            same,
        };

        debug!(
            "plan {} {} {} {:?} -> {:?}",
            operands.kind(),
            op,
            dtype,
            sizes,
            flags
        );

        Ok(Plan {
            op,
            operands,
            dest: opts.incr.or(opts.reuse),
            flags,
            resolved,
            result_dtype,
            sizes,
            layouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::Buffer;
    use crate::core::array::Array;

    fn registries() -> (Dtypes, Kernels) {
        (Dtypes::new(), Kernels::new())
    }

    #[test]
    fn flags_follow_options() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let a = Tensor::new_1d(&[1i32, 2, 3]);
        let b = Tensor::new_1d(&[4i32, 5, 6]);
        let dest = Tensor::new_1d(&[0i32; 3]);

        let flags = planner
            .plan("add", Operands::Binary(&a, &b), Opts::new())
            .unwrap()
            .flags();
        assert!(flags.safe && !flags.to_reuse && !flags.incr && !flags.use_iter);

        let flags = planner
            .plan("add", Operands::Binary(&a, &b), Opts::new().reuse(&dest).incr(&dest))
            .unwrap()
            .flags();
        assert!(flags.to_reuse && flags.incr);

        let flags = planner
            .plan("sub", Operands::Binary(&a, &b), Opts::new().unsafe_())
            .unwrap()
            .flags();
        assert!(!flags.safe);
    }

    #[test]
    fn strided_or_broadcast_operands_use_iterators() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let m = Tensor::new(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let row = Tensor::new_1d(&[1.0f32, 2.0]);

        let plan = planner
            .plan("mul", Operands::Binary(&m, &row), Opts::new())
            .unwrap();
        assert!(plan.flags().use_iter);
        assert_eq!(plan.sizes(), &[2, 2]);

        let t = m.transpose(0, 1).unwrap();
        let plan = planner.plan("mul", Operands::Binary(&t, &m), Opts::new()).unwrap();
        assert!(plan.flags().use_iter);
    }

    #[test]
    fn mixed_records_side() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let a = Tensor::new_1d(&[1u8, 2]);
        let s = Tensor::scalar(3u8);

        let operands = Operands::Mixed {
            tensor: &a,
            scalar: &s,
            left_tensor: false,
        };
        let flags = planner.plan("div", operands, Opts::new()).unwrap().flags();
        assert!(!flags.left_tensor);

        let wide = Tensor::new_1d(&[3u8, 4]);
        let operands = Operands::Mixed {
            tensor: &a,
            scalar: &wide,
            left_tensor: true,
        };
        let err = planner.plan("div", operands, Opts::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<ShapeError>(), Some(&ShapeError::Scalar(2)));
    }

    #[test]
    fn validation_order() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let a = Tensor::new_1d(&[1i64, 2, 3]);
        let b = Tensor::new_1d(&[1.0f64, 2.0, 3.0]);
        let c = Tensor::new_1d(&[1i64, 2]);

        let err = planner.plan("add", Operands::Binary(&a, &b), Opts::new()).unwrap_err();
        assert!(err.downcast_ref::<TypeMismatchError>().is_some());

        let err = planner.plan("add", Operands::Binary(&a, &c), Opts::new()).unwrap_err();
        assert!(err.downcast_ref::<BroadcastError>().is_some());

        let foreign = Array::from_buffer(&Dtype::of::<i64>(), &Buffer::foreign(0x1000, 24), 3, 3)
            .unwrap();
        let dest = Tensor::from_array(foreign, &[3]).unwrap();
        let err = planner
            .plan("add", Operands::Binary(&a, &a), Opts::new().reuse(&dest))
            .unwrap_err();
        assert!(err.downcast_ref::<InaccessibleBufferError>().is_some());

        let dest = Tensor::new_1d(&[0i32; 3]);
        let err = planner
            .plan("add", Operands::Binary(&a, &a), Opts::new().reuse(&dest))
            .unwrap_err();
        assert!(err.downcast_ref::<TypeMismatchError>().is_some());

        let dest = Tensor::new_1d(&[0i64; 4]);
        let err = planner
            .plan("add", Operands::Binary(&a, &a), Opts::new().incr(&dest))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShapeError>(),
            Some(ShapeError::Destination { .. })
        ));

        let err = planner.plan("pow", Operands::Binary(&a, &a), Opts::new()).unwrap_err();
        assert!(err.downcast_ref::<UnsupportedKernelError>().is_some());
    }

    #[test]
    fn in_place_target_must_hold_result() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let row = Tensor::new_1d(&[1i32, 2]);
        let m = Tensor::new(&[1i32, 2, 3, 4], &[2, 2]).unwrap();

        let err = planner
            .plan("add", Operands::Binary(&row, &m), Opts::new().unsafe_())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShapeError>(),
            Some(ShapeError::InPlace { .. })
        ));
        assert!(planner
            .plan("add", Operands::Binary(&m, &row), Opts::new().unsafe_())
            .is_ok());
    }

    #[test]
    fn comparison_result_types() {
        let (dtypes, kernels) = registries();
        let planner = Planner::new(&dtypes, &kernels);
        let a = Tensor::new_1d(&[1i32, 5]);
        let b = Tensor::new_1d(&[2i32, 2]);

        let plan = planner.plan("gt", Operands::Compare(&a, &b), Opts::new()).unwrap();
        assert!(!plan.flags().same);
        assert!(plan.result_dtype().is_bool());

        let plan = planner
            .plan("gt", Operands::Compare(&a, &b), Opts::new().as_same_type())
            .unwrap();
        assert!(plan.flags().same);
        assert_eq!(plan.result_dtype(), &Dtype::of::<i32>());

        let dest = Tensor::zeros(&Dtype::boolean(), &[2]);
        let err = planner
            .plan("gt", Operands::Compare(&a, &b), Opts::new().incr(&dest))
            .unwrap_err();
        assert!(err.downcast_ref::<TypeMismatchError>().is_some());

        let x = Tensor::from_bools(&[true, false], &[2]).unwrap();
        let plan = planner.plan("eq", Operands::Compare(&x, &x), Opts::new()).unwrap();
        assert!(plan.flags().same);
    }

    #[test]
    fn unary_increment_needs_add() {
        let dtypes = Dtypes::new();
        let mut kernels = Kernels::empty();
        kernels.register_unary::<f64, crate::core::kernels::Sqrt>("float64");
        let planner = Planner::new(&dtypes, &kernels);

        let a = Tensor::new_1d(&[4.0f64]);
        let dest = Tensor::new_1d(&[1.0f64]);

        assert!(planner.plan("sqrt", Operands::Unary(&a), Opts::new()).is_ok());
        let err = planner
            .plan("sqrt", Operands::Unary(&a), Opts::new().incr(&dest))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnsupportedKernelError>(),
            Some(&UnsupportedKernelError {
                op: "add".to_string(),
                dtype: "float64".to_string(),
            })
        );
    }
}
