mod arith;
mod bodies;

use anyhow::Result;
use std::collections::HashMap;

use crate::core::{dtype::Dtype, errors::*, iters::Strider};

pub use arith::{
    Abs, Add, Arith, BinaryOp, CmpOp, Div, Equal, Exp, FloatArith, Gt, Gte, Ln, Lt, Lte, Mul, Neg,
    NotEqual, SignedArith, Sqrt, Square, Sub, UnaryOp,
};

/// Operand order for a combine into the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// `dst = dst op src`
    Forward,
    /// `dst = src op dst`
    Reversed,
}

type KernelResult = std::result::Result<(), KernelError>;

pub type BinaryFlat = fn(&mut [u8], &[u8], Order) -> KernelResult;
pub type BinaryFlatIncr = fn(&[u8], &[u8], &mut [u8]) -> KernelResult;
pub type BinaryIter = fn(&mut [u8], &[u8], Order, &mut Strider, &mut Strider) -> KernelResult;
pub type BinaryIterIncr =
    fn(&[u8], &[u8], &mut [u8], &mut Strider, &mut Strider, &mut Strider) -> KernelResult;

pub type UnaryFlat = fn(&mut [u8]) -> KernelResult;
pub type UnaryIter = fn(&mut [u8], &mut Strider) -> KernelResult;

pub type CmpFlat = fn(&[u8], &[u8], &mut [u8]) -> KernelResult;
pub type CmpFlatSame = fn(&mut [u8], &[u8]) -> KernelResult;
pub type CmpIter =
    fn(&[u8], &[u8], &mut [u8], &mut Strider, &mut Strider, &mut Strider) -> KernelResult;
pub type CmpIterSame = fn(&mut [u8], &[u8], &mut Strider, &mut Strider) -> KernelResult;

/// Kernel variants of one binary op for one dtype.
#[derive(Clone, Copy, Debug)]
pub struct BinaryKernels {
    pub flat: BinaryFlat,
    pub flat_incr: BinaryFlatIncr,
    pub iter: BinaryIter,
    pub iter_incr: BinaryIterIncr,
}

#[derive(Clone, Copy, Debug)]
pub struct UnaryKernels {
    pub flat: UnaryFlat,
    pub iter: UnaryIter,
}

/// Comparison kernels. The plain variants write into a bool buffer, the
/// `same` variants overwrite the left operand with one or zero.
#[derive(Clone, Copy, Debug)]
pub struct CmpKernels {
    pub flat: CmpFlat,
    pub flat_same: CmpFlatSame,
    pub iter: CmpIter,
    pub iter_same: CmpIterSame,
}

type Table<K> = HashMap<&'static str, HashMap<String, K>>;

/// Registry of element kernels keyed by op name and dtype name.
#[derive(Clone, Debug, Default)]
pub struct Kernels {
    binary: Table<BinaryKernels>,
    unary: Table<UnaryKernels>,
    cmp: Table<CmpKernels>,
}

macro_rules! table {
    ($kernels:ident, $register:ident, $op:ty => $($type:ty),+) => {
        $( $kernels.$register::<$type, $op>(<$type as crate::core::dtype::Element>::DTYPE); )+
    };
}

macro_rules! numbers {
    ($kernels:ident, $register:ident: $($op:ty),+) => {
        $( table!($kernels, $register, $op => i8, i16, i32, i64, u8, u16, u32, u64, f32, f64); )+
    };
}

macro_rules! signed {
    ($kernels:ident, $register:ident: $($op:ty),+) => {
        $( table!($kernels, $register, $op => i8, i16, i32, i64, f32, f64); )+
    };
}

macro_rules! floats {
    ($kernels:ident, $register:ident: $($op:ty),+) => {
        $( table!($kernels, $register, $op => f32, f64); )+
    };
}

fn insert<K>(table: &mut Table<K>, op: &'static str, dtype: &str, kernels: K) {
    table.entry(op).or_default().insert(dtype.to_string(), kernels);
}

fn lookup<K: Copy>(table: &Table<K>, op: &str, dtype: &Dtype) -> Result<K> {
    table
        .get(op)
        .and_then(|by_dtype| by_dtype.get(dtype.name()))
        .copied()
        .ok_or_else(|| {
            UnsupportedKernelError {
                op: op.to_string(),
                dtype: dtype.name().to_string(),
            }
            .into()
        })
}

impl Kernels {
    /// Registry without any kernels.
    pub fn empty() -> Kernels {
        Kernels::default()
    }

    /// Registry with the builtin arithmetic, unary and comparison kernels.
    pub fn new() -> Kernels {
        let mut kernels = Kernels::empty();

        numbers!(kernels, register_binary: Add, Sub, Mul, Div);
        numbers!(kernels, register_unary: Square);
        signed!(kernels, register_unary: Neg, Abs);
        floats!(kernels, register_unary: Sqrt, Exp, Ln);
        numbers!(kernels, register_cmp: Gt, Gte, Lt, Lte, Equal, NotEqual);

        // bools are stored as one byte each
        kernels.register_cmp::<u8, Equal>("bool");
        kernels.register_cmp::<u8, NotEqual>("bool");

        kernels
    }

    pub fn register_binary<T: Arith, O: BinaryOp<T>>(&mut self, dtype: &str) {
        let kernels = BinaryKernels {
            flat: bodies::binary_flat::<T, O>,
            flat_incr: bodies::binary_flat_incr::<T, O>,
            iter: bodies::binary_iter::<T, O>,
            iter_incr: bodies::binary_iter_incr::<T, O>,
        };
        insert(&mut self.binary, O::NAME, dtype, kernels);
    }

    pub fn register_unary<T: Arith, O: UnaryOp<T>>(&mut self, dtype: &str) {
        let kernels = UnaryKernels {
            flat: bodies::unary_flat::<T, O>,
            iter: bodies::unary_iter::<T, O>,
        };
        insert(&mut self.unary, O::NAME, dtype, kernels);
    }

    pub fn register_cmp<T: Arith, O: CmpOp<T>>(&mut self, dtype: &str) {
        let kernels = CmpKernels {
            flat: bodies::cmp_flat::<T, O>,
            flat_same: bodies::cmp_flat_same::<T, O>,
            iter: bodies::cmp_iter::<T, O>,
            iter_same: bodies::cmp_iter_same::<T, O>,
        };
        insert(&mut self.cmp, O::NAME, dtype, kernels);
    }

    pub fn binary(&self, op: &str, dtype: &Dtype) -> Result<BinaryKernels> {
        lookup(&self.binary, op, dtype)
    }

    pub fn unary(&self, op: &str, dtype: &Dtype) -> Result<UnaryKernels> {
        lookup(&self.unary, op, dtype)
    }

    pub fn cmp(&self, op: &str, dtype: &Dtype) -> Result<CmpKernels> {
        lookup(&self.cmp, op, dtype)
    }

    pub fn has_binary(&self, op: &str, dtype: &Dtype) -> bool {
        self.binary(op, dtype).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_numeric_types() {
        let kernels = Kernels::new();

        for dtype in [Dtype::of::<i8>(), Dtype::of::<u64>(), Dtype::of::<f32>()] {
            assert!(kernels.binary("div", &dtype).is_ok());
            assert!(kernels.cmp("gte", &dtype).is_ok());
        }

        assert!(kernels.unary("sqrt", &Dtype::of::<f64>()).is_ok());
        assert!(kernels.unary("square", &Dtype::of::<u8>()).is_ok());
        assert!(kernels.unary("abs", &Dtype::of::<u8>()).is_err());
        assert!(kernels.cmp("eq", &Dtype::boolean()).is_ok());
    }

    #[test]
    fn missing_kernels_are_reported() {
        let kernels = Kernels::new();

        let err = kernels.unary("neg", &Dtype::of::<u32>()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnsupportedKernelError>(),
            Some(&UnsupportedKernelError {
                op: "neg".to_string(),
                dtype: "uint32".to_string(),
            })
        );

        assert!(kernels.binary("add", &Dtype::boolean()).is_err());
        assert!(kernels.unary("sqrt", &Dtype::of::<i32>()).is_err());
        assert!(!Kernels::empty().has_binary("add", &Dtype::of::<f32>()));
    }

    #[test]
    fn registered_kernels_run() {
        let mut kernels = Kernels::empty();
        kernels.register_binary::<u16, Mul>("uint16");

        let mul = kernels.binary("mul", &Dtype::of::<u16>()).unwrap();
        let mut dst = bytemuck::cast_slice::<u16, u8>(&[2, 3]).to_vec();
        (mul.flat)(&mut dst, bytemuck::cast_slice::<u16, u8>(&[4, 5]), Order::Forward).unwrap();

        assert_eq!(bytemuck::cast_slice::<u8, u16>(&dst), &[8, 15]);
    }
}
