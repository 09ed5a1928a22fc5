use anyhow::{Context, Result};
use log::{debug, trace};

use crate::core::{
    array::{copy_iter, with_access},
    dtype::Dtypes,
    errors::KernelError,
    iters::Strider,
    kernels::{BinaryKernels, CmpKernels, Kernels, Order, UnaryKernels},
    planner::{layout_for, OpFlags, Operands, Opts, Plan, Planner, Resolved},
    shape::Shape,
    tensor::Tensor,
};

// --- Strategy selection ---

/// Where a binary result is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// `dest += a op b`
    Accumulate,
    /// Copy the left operand into the destination, then combine with the right.
    Reuse,
    /// Copy the tensor into the destination, then combine with the scalar on
    /// the side given by `left_tensor`.
    ReuseMixed { left_tensor: bool },
    /// Overwrite the left (or tensor) operand.
    InPlace,
    /// Write into a fresh buffer.
    Allocate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryStrategy {
    /// Transform a copy, then add it onto the destination.
    Accumulate,
    Reuse,
    InPlace,
    Allocate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpStrategy {
    /// Same-typed result computed into a copy, then added onto the destination.
    Accumulate,
    /// Copy the left operand into the destination and compare there.
    ReuseSame,
    /// Write bools into the destination.
    ReuseInto,
    /// Same-typed result written over the left operand.
    InPlace,
    /// Bools in a freshly allocated tensor.
    AllocBool,
}

pub fn select(flags: OpFlags, mixed: bool) -> Strategy {
    match (flags.incr, flags.to_reuse, mixed, flags.safe) {
        (true, ..) => Strategy::Accumulate,
        (false, true, false, _) => Strategy::Reuse,
        (false, true, true, _) => Strategy::ReuseMixed {
            left_tensor: flags.left_tensor,
        },
        (false, false, _, false) => Strategy::InPlace,
        (false, false, _, true) => Strategy::Allocate,
    }
}

pub fn select_unary(flags: OpFlags) -> UnaryStrategy {
    match (flags.incr, flags.to_reuse, flags.safe) {
        (true, ..) => UnaryStrategy::Accumulate,
        (false, true, _) => UnaryStrategy::Reuse,
        (false, false, false) => UnaryStrategy::InPlace,
        (false, false, true) => UnaryStrategy::Allocate,
    }
}

/// Without a destination, a same-typed result always lands in the left
/// operand. Panics on an increment into a bool result; the planner rejects it.
pub fn select_cmp(flags: OpFlags) -> CmpStrategy {
    match (flags.incr, flags.to_reuse, flags.same, flags.safe) {
        (true, _, true, _) => CmpStrategy::Accumulate,
        (true, _, false, _) => unreachable!("increment into a bool comparison result"),
        (false, true, true, _) => CmpStrategy::ReuseSame,
        (false, true, false, _) => CmpStrategy::ReuseInto,
        (false, false, true, _) | (false, false, false, false) => CmpStrategy::InPlace,
        (false, false, false, true) => CmpStrategy::AllocBool,
    }
}

// --- Execution ---

/// Tensor memory read or written through a layout of the result's sizes.
#[derive(Clone, Copy)]
struct Side<'t> {
    tensor: &'t Tensor,
    layout: &'t Shape,
}

impl<'t> Side<'t> {
    fn whole(tensor: &'t Tensor) -> Side<'t> {
        Side {
            tensor,
            layout: tensor.shape(),
        }
    }

    fn strider(&self) -> Strider {
        Strider::from_shape(self.layout)
    }

    fn range(&self, length: usize) -> Result<std::ops::Range<usize>, KernelError> {
        let size = self.tensor.dtype().size();
        let shape = self.tensor.shape();
        let (start, end) = (shape.offset(), shape.offset() + shape.numel());

        if end * size > length {
            return Err(KernelError::Offset {
                offset: end,
                length: length / size.max(1),
            });
        }
        Ok(start * size..end * size)
    }

    /// The tensor's own contiguous run of bytes.
    fn span<'b>(&self, bytes: &'b [u8]) -> Result<&'b [u8], KernelError> {
        Ok(&bytes[self.range(bytes.len())?])
    }

    fn span_mut<'b>(&self, bytes: &'b mut [u8]) -> Result<&'b mut [u8], KernelError> {
        let range = self.range(bytes.len())?;
        Ok(&mut bytes[range])
    }
}

struct Exec {
    use_iter: bool,
}

impl Exec {
    fn copy(&self, dst: Side, src: Side, dst_iter: &mut Strider) -> Result<()> {
        trace!("copy pass, use_iter: {}", self.use_iter);

        if self.use_iter {
            copy_iter(&dst.tensor.array, &src.tensor.array, dst_iter, &mut src.strider())?;
            return Ok(());
        }

        with_access(&dst.tensor.array, &[&src.tensor.array], |target, sources| {
            let target = dst.span_mut(target)?;
            let source = src.span(sources[0])?;
            let count = target.len().min(source.len());

            target[..count].copy_from_slice(&source[..count]);
            Ok(())
        })
    }

    fn combine(
        &self,
        kernels: &BinaryKernels,
        dst: Side,
        src: Side,
        order: Order,
        dst_iter: &mut Strider,
    ) -> Result<()> {
        trace!("combine pass, {:?}", order);

        with_access(&dst.tensor.array, &[&src.tensor.array], |target, sources| {
            if self.use_iter {
                (kernels.iter)(target, sources[0], order, dst_iter, &mut src.strider())?;
            } else {
                (kernels.flat)(dst.span_mut(target)?, src.span(sources[0])?, order)?;
            }
            Ok(())
        })
    }

    fn accumulate(&self, kernels: &BinaryKernels, a: Side, b: Side, dst: Side) -> Result<()> {
        trace!("increment pass");

        let srcs = [&a.tensor.array, &b.tensor.array];
        with_access(&dst.tensor.array, &srcs, |target, sources| {
            if self.use_iter {
                (kernels.iter_incr)(
                    sources[0],
                    sources[1],
                    target,
                    &mut a.strider(),
                    &mut b.strider(),
                    &mut dst.strider(),
                )?;
            } else {
                (kernels.flat_incr)(a.span(sources[0])?, b.span(sources[1])?, dst.span_mut(target)?)?;
            }
            Ok(())
        })
    }

    fn transform(&self, kernels: &UnaryKernels, dst: Side, dst_iter: &mut Strider) -> Result<()> {
        trace!("transform pass");

        dst.tensor.array.byte_view_mut(|bytes| -> Result<()> {
            if self.use_iter {
                (kernels.iter)(bytes, dst_iter)?;
            } else {
                (kernels.flat)(dst.span_mut(bytes)?)?;
            }
            Ok(())
        })?
    }

    fn compare_into(&self, kernels: &CmpKernels, a: Side, b: Side, out: Side) -> Result<()> {
        trace!("compare pass");

        let srcs = [&a.tensor.array, &b.tensor.array];
        with_access(&out.tensor.array, &srcs, |target, sources| {
            if self.use_iter {
                (kernels.iter)(
                    sources[0],
                    sources[1],
                    target,
                    &mut a.strider(),
                    &mut b.strider(),
                    &mut out.strider(),
                )?;
            } else {
                (kernels.flat)(a.span(sources[0])?, b.span(sources[1])?, out.span_mut(target)?)?;
            }
            Ok(())
        })
    }

    fn compare_same(
        &self,
        kernels: &CmpKernels,
        dst: Side,
        src: Side,
        dst_iter: &mut Strider,
    ) -> Result<()> {
        trace!("compare pass, same type");

        with_access(&dst.tensor.array, &[&src.tensor.array], |target, sources| {
            if self.use_iter {
                (kernels.iter_same)(target, sources[0], dst_iter, &mut src.strider())?;
            } else {
                (kernels.flat_same)(dst.span_mut(target)?, src.span(sources[0])?)?;
            }
            Ok(())
        })
    }
}

fn operands<'p>(plan: &'p Plan) -> (Side<'p>, Option<Side<'p>>) {
    let primary = Side {
        tensor: plan.operands.primary(),
        layout: &plan.layouts[0],
    };
    let secondary = plan
        .operands
        .secondary()
        .zip(plan.layouts.get(1))
        .map(|(tensor, layout)| Side { tensor, layout });

    (primary, secondary)
}

fn destination<'p>(plan: &'p Plan) -> Side<'p> {
    match plan.dest {
        Some(dest) => Side::whole(dest),
        None => unreachable!("strategy needs a destination the plan does not have"),
    }
}

fn second<'p>(side: Option<Side<'p>>) -> Side<'p> {
    match side {
        Some(side) => side,
        None => unreachable!("binary plan without a second operand"),
    }
}

/// Private copy of `side` when the copy pass into `dest` would overwrite it.
fn detached(dest: &Tensor, side: Side, sizes: &[usize]) -> Result<Option<(Tensor, Shape)>> {
    if !dest.shares_buffer(side.tensor) {
        return Ok(None);
    }

    trace!("operand shares the destination buffer, reading from a copy");
    let copy = side.tensor.materialize()?;
    let layout = layout_for(&copy, sizes)?;
    Ok(Some((copy, layout)))
}

fn reading<'s>(held: &'s Option<(Tensor, Shape)>, side: Side<'s>) -> Side<'s> {
    match held {
        Some((tensor, layout)) => Side { tensor, layout },
        None => side,
    }
}

fn binary(plan: &Plan, kernels: &BinaryKernels) -> Result<Tensor> {
    let flags = plan.flags;
    let exec = Exec {
        use_iter: flags.use_iter,
    };
    let (left, right) = operands(plan);
    let right = second(right);
    let order = if flags.left_tensor {
        Order::Forward
    } else {
        Order::Reversed
    };

    let strategy = select(flags, matches!(plan.operands, Operands::Mixed { .. }));
    debug!("StdEng.{} {:?}, use_iter: {}", plan.op, strategy, flags.use_iter);

    match strategy {
        Strategy::Accumulate => {
            let dest = destination(plan);
            let (a, b) = match order {
                Order::Forward => (left, right),
                Order::Reversed => (right, left),
            };

            exec.accumulate(kernels, a, b, dest)?;
            Ok(dest.tensor.clone())
        }
        Strategy::Reuse | Strategy::ReuseMixed { .. } => {
            let dest = destination(plan);
            let held = detached(dest.tensor, right, &plan.sizes)?;
            let right = reading(&held, right);

            let mut dst_iter = dest.strider();
            exec.copy(dest, left, &mut dst_iter)?;
            dst_iter.reset();
            exec.combine(kernels, dest, right, order, &mut dst_iter)?;
            Ok(dest.tensor.clone())
        }
        Strategy::InPlace => {
            exec.combine(kernels, left, right, order, &mut left.strider())?;
            Ok(left.tensor.clone())
        }
        Strategy::Allocate => {
            let fresh = Tensor::zeros(&plan.result_dtype, &plan.sizes);
            let dest = Side::whole(&fresh);

            let mut dst_iter = dest.strider();
            exec.copy(dest, left, &mut dst_iter)?;
            dst_iter.reset();
            exec.combine(kernels, dest, right, order, &mut dst_iter)?;
            Ok(fresh)
        }
    }
}

fn unary(plan: &Plan, kernels: &UnaryKernels, add: Option<BinaryKernels>) -> Result<Tensor> {
    let flags = plan.flags;
    let exec = Exec {
        use_iter: flags.use_iter,
    };
    let (source, _) = operands(plan);

    let strategy = select_unary(flags);
    debug!("StdEng.{} {:?}, use_iter: {}", plan.op, strategy, flags.use_iter);

    match strategy {
        UnaryStrategy::Accumulate => {
            let dest = destination(plan);
            let Some(add) = add else {
                unreachable!("increment plan without an add kernel")
            };

            let copy = source.tensor.materialize()?;
            let transformed = Side::whole(&copy);
            Exec { use_iter: false }.transform(kernels, transformed, &mut transformed.strider())?;
            exec.combine(&add, dest, transformed, Order::Forward, &mut dest.strider())?;
            Ok(dest.tensor.clone())
        }
        UnaryStrategy::Reuse => {
            let dest = destination(plan);

            let mut dst_iter = dest.strider();
            exec.copy(dest, source, &mut dst_iter)?;
            dst_iter.reset();
            exec.transform(kernels, dest, &mut dst_iter)?;
            Ok(dest.tensor.clone())
        }
        UnaryStrategy::InPlace => {
            exec.transform(kernels, source, &mut source.strider())?;
            Ok(source.tensor.clone())
        }
        UnaryStrategy::Allocate => {
            let fresh = Tensor::zeros(&plan.result_dtype, &plan.sizes);
            let dest = Side::whole(&fresh);

            let mut dst_iter = dest.strider();
            exec.copy(dest, source, &mut dst_iter)?;
            dst_iter.reset();
            exec.transform(kernels, dest, &mut dst_iter)?;
            Ok(fresh)
        }
    }
}

fn compare(plan: &Plan, kernels: &CmpKernels, add: Option<BinaryKernels>) -> Result<Tensor> {
    let flags = plan.flags;
    let exec = Exec {
        use_iter: flags.use_iter,
    };
    let (left, right) = operands(plan);
    let right = second(right);

    let strategy = select_cmp(flags);
    debug!("StdEng.{} {:?}, use_iter: {}", plan.op, strategy, flags.use_iter);

    match strategy {
        CmpStrategy::Accumulate => {
            let dest = destination(plan);
            let Some(add) = add else {
                unreachable!("increment plan without an add kernel")
            };

            let scratch = Tensor::zeros(&plan.result_dtype, &plan.sizes);
            let target = Side::whole(&scratch);
            let mut scratch_iter = target.strider();
            exec.copy(target, left, &mut scratch_iter)?;
            scratch_iter.reset();
            exec.compare_same(kernels, target, right, &mut scratch_iter)?;

            exec.combine(&add, dest, target, Order::Forward, &mut dest.strider())?;
            Ok(dest.tensor.clone())
        }
        CmpStrategy::ReuseSame => {
            let dest = destination(plan);
            let held = detached(dest.tensor, right, &plan.sizes)?;
            let right = reading(&held, right);

            let mut dst_iter = dest.strider();
            exec.copy(dest, left, &mut dst_iter)?;
            dst_iter.reset();
            exec.compare_same(kernels, dest, right, &mut dst_iter)?;
            Ok(dest.tensor.clone())
        }
        CmpStrategy::ReuseInto => {
            let dest = destination(plan);
            exec.compare_into(kernels, left, right, dest)?;
            Ok(dest.tensor.clone())
        }
        CmpStrategy::InPlace => {
            exec.compare_same(kernels, left, right, &mut left.strider())?;
            Ok(left.tensor.clone())
        }
        CmpStrategy::AllocBool => {
            let fresh = Tensor::zeros(&plan.result_dtype, &plan.sizes);
            exec.compare_into(kernels, left, right, Side::whole(&fresh))?;
            Ok(fresh)
        }
    }
}

/// Runs a validated plan and returns the tensor holding the result: the
/// destination, the mutated left operand, or a new tensor.
pub fn dispatch(plan: &Plan) -> Result<Tensor> {
    let result = match plan.resolved {
        Resolved::Binary(kernels) => binary(plan, &kernels),
        Resolved::Unary { kernels, add } => unary(plan, &kernels, add),
        Resolved::Compare { kernels, add } => compare(plan, &kernels, add),
    };

    result.with_context(|| format!("StdEng.{}", plan.op))
}

// --- Facade ---

/// Entry point owning the dtype and kernel registries.
///
/// ```ignore
/// let engine = Engine::new();
/// let sum = engine.add(&a, &b, Opts::new())?;
/// engine.mul_scalar(&a, &Tensor::scalar(2.0f32), true, Opts::new().unsafe_())?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Engine {
    dtypes: Dtypes,
    kernels: Kernels,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_registries(Dtypes::new(), Kernels::new())
    }

    pub fn with_registries(dtypes: Dtypes, kernels: Kernels) -> Engine {
        Engine { dtypes, kernels }
    }

    pub fn dtypes(&self) -> &Dtypes {
        &self.dtypes
    }

    pub fn kernels(&self) -> &Kernels {
        &self.kernels
    }

    pub fn planner(&self) -> Planner<'_> {
        Planner::new(&self.dtypes, &self.kernels)
    }

    pub fn apply<'a>(&self, op: &'a str, operands: Operands<'a>, opts: Opts<'a>) -> Result<Tensor> {
        let plan = self.planner().plan(op, operands, opts)?;
        dispatch(&plan)
    }
}

macro_rules! binary_ops {
    ($($op:ident, $scalar_op:ident);+ $(;)?) => {
        impl Engine {
            $(
                pub fn $op(&self, lhs: &Tensor, rhs: &Tensor, opts: Opts) -> Result<Tensor> {
                    self.apply(stringify!($op), Operands::Binary(lhs, rhs), opts)
                }

                pub fn $scalar_op(
                    &self,
                    tensor: &Tensor,
                    scalar: &Tensor,
                    left_tensor: bool,
                    opts: Opts,
                ) -> Result<Tensor> {
                    let operands = Operands::Mixed {
                        tensor,
                        scalar,
                        left_tensor,
                    };
                    self.apply(stringify!($op), operands, opts)
                }
            )+
        }
    };
}

macro_rules! unary_ops {
    ($($op:ident),+ $(,)?) => {
        impl Engine {
            $(
                pub fn $op(&self, tensor: &Tensor, opts: Opts) -> Result<Tensor> {
                    self.apply(stringify!($op), Operands::Unary(tensor), opts)
                }
            )+
        }
    };
}

macro_rules! cmp_ops {
    ($($op:ident),+ $(,)?) => {
        impl Engine {
            $(
                pub fn $op(&self, lhs: &Tensor, rhs: &Tensor, opts: Opts) -> Result<Tensor> {
                    self.apply(stringify!($op), Operands::Compare(lhs, rhs), opts)
                }
            )+
        }
    };
}

binary_ops! {
    add, add_scalar;
    sub, sub_scalar;
    mul, mul_scalar;
    div, div_scalar;
}

unary_ops!(neg, abs, square, sqrt, exp, ln);
cmp_ops!(gt, gte, lt, lte, eq, ne);

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(incr: bool, to_reuse: bool, safe: bool, same: bool) -> OpFlags {
        OpFlags {
            safe,
            to_reuse,
            incr,
            use_iter: false,
            left_tensor: true,
            same,
        }
    }

    #[test]
    fn increment_wins() {
        assert_eq!(select(flags(true, true, false, true), false), Strategy::Accumulate);
        assert_eq!(select_unary(flags(true, true, false, true)), UnaryStrategy::Accumulate);
        assert_eq!(select_cmp(flags(true, true, false, true)), CmpStrategy::Accumulate);
    }

    #[test]
    fn reuse_before_in_place() {
        assert_eq!(select(flags(false, true, false, true), false), Strategy::Reuse);

        let mut mixed = flags(false, true, false, true);
        mixed.left_tensor = false;
        assert_eq!(
            select(mixed, true),
            Strategy::ReuseMixed { left_tensor: false }
        );

        assert_eq!(select(flags(false, false, false, true), true), Strategy::InPlace);
        assert_eq!(select(flags(false, false, true, true), false), Strategy::Allocate);
    }

    #[test]
    fn comparison_matrix() {
        assert_eq!(select_cmp(flags(false, true, true, true)), CmpStrategy::ReuseSame);
        assert_eq!(select_cmp(flags(false, true, true, false)), CmpStrategy::ReuseInto);
        assert_eq!(select_cmp(flags(false, false, false, false)), CmpStrategy::InPlace);
        assert_eq!(select_cmp(flags(false, false, true, true)), CmpStrategy::InPlace);
        assert_eq!(select_cmp(flags(false, false, true, false)), CmpStrategy::AllocBool);
    }

    #[test]
    #[should_panic]
    fn bool_increment_is_a_planner_defect() {
        select_cmp(flags(true, false, true, false));
    }

    #[test]
    fn facade_names_ops() {
        let engine = Engine::new();
        let a = Tensor::new_1d(&[1.0f32, 4.0, 9.0]);

        let roots = engine.sqrt(&a, Opts::new()).unwrap();
        assert_eq!(roots.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);

        let half = engine
            .div_scalar(&a, &Tensor::scalar(2.0f32), true, Opts::new())
            .unwrap();
        assert_eq!(half.to_vec::<f32>().unwrap(), vec![0.5, 2.0, 4.5]);
    }
}
