mod array;
mod display;
mod dtype;
mod engine;
mod errors;
mod iters;
mod kernels;
mod planner;
mod shape;
mod storage;
mod tensor;

pub use array::{copy_array, Array};
pub use dtype::{Dtype, Dtypes, Element, Kind};
pub use engine::{
    dispatch, select, select_cmp, select_unary, CmpStrategy, Engine, Strategy, UnaryStrategy,
};
pub use errors::*;
pub use iters::Strider;
pub use kernels::{
    Arith, BinaryKernels, BinaryOp, CmpKernels, CmpOp, FloatArith, Kernels, Order, SignedArith,
    UnaryKernels, UnaryOp,
};
pub use planner::{OpFlags, Operands, Opts, Plan, Planner, Resolved};
pub use shape::{Shape, Stride};
pub use storage::{Buffer, Header};
pub use tensor::Tensor;

/// Operation types for registering kernels.
pub mod ops {
    pub use super::kernels::{
        Abs, Add, Div, Equal, Exp, Gt, Gte, Ln, Lt, Lte, Mul, Neg, NotEqual, Sqrt, Square, Sub,
    };
}
