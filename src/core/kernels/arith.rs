use num_traits::{Float, One, Zero};

use crate::core::{dtype::Element, errors::KernelError};

/// Elementwise arithmetic. Integers wrap on overflow; integer division by
/// zero is an error instead of a panic.
pub trait Arith: Element + Zero + One {
    fn plus(self, rhs: Self) -> Self;
    fn minus(self, rhs: Self) -> Self;
    fn times(self, rhs: Self) -> Self;
    fn quotient(self, rhs: Self) -> Result<Self, KernelError>;
}

pub trait SignedArith: Arith {
    fn negated(self) -> Self;
    fn magnitude(self) -> Self;
}

pub trait FloatArith: Arith + Float {}

macro_rules! int_arith {
    ($($type:ty),+) => {
        $(
            impl Arith for $type {
                fn plus(self, rhs: Self) -> Self {
                    self.wrapping_add(rhs)
                }

                fn minus(self, rhs: Self) -> Self {
                    self.wrapping_sub(rhs)
                }

                fn times(self, rhs: Self) -> Self {
                    self.wrapping_mul(rhs)
                }

                fn quotient(self, rhs: Self) -> Result<Self, KernelError> {
                    if rhs == 0 {
                        Err(KernelError::DivisionByZero)
                    } else {
                        Ok(self.wrapping_div(rhs))
                    }
                }
            }
        )+
    };
}

macro_rules! signed_int_arith {
    ($($type:ty),+) => {
        $(
            impl SignedArith for $type {
                fn negated(self) -> Self {
                    self.wrapping_neg()
                }

                fn magnitude(self) -> Self {
                    self.wrapping_abs()
                }
            }
        )+
    };
}

macro_rules! float_arith {
    ($($type:ty),+) => {
        $(
            impl Arith for $type {
                fn plus(self, rhs: Self) -> Self {
                    self + rhs
                }

                fn minus(self, rhs: Self) -> Self {
                    self - rhs
                }

                fn times(self, rhs: Self) -> Self {
                    self * rhs
                }

                fn quotient(self, rhs: Self) -> Result<Self, KernelError> {
                    Ok(self / rhs)
                }
            }

            impl SignedArith for $type {
                fn negated(self) -> Self {
                    -self
                }

                fn magnitude(self) -> Self {
                    self.abs()
                }
            }

            impl FloatArith for $type {}
        )+
    };
}

int_arith!(i8, i16, i32, i64, u8, u16, u32, u64);
signed_int_arith!(i8, i16, i32, i64);
float_arith!(f32, f64);

// --- Operations ---

pub trait BinaryOp<T>: 'static {
    const NAME: &'static str;
    fn apply(lhs: T, rhs: T) -> Result<T, KernelError>;
}

pub trait UnaryOp<T>: 'static {
    const NAME: &'static str;
    fn apply(value: T) -> T;
}

pub trait CmpOp<T>: 'static {
    const NAME: &'static str;
    fn apply(lhs: T, rhs: T) -> bool;
}

macro_rules! binary_op {
    ($op:ident, $name:literal, $method:ident, fallible) => {
        pub struct $op;

        impl<T: Arith> BinaryOp<T> for $op {
            const NAME: &'static str = $name;
            fn apply(lhs: T, rhs: T) -> Result<T, KernelError> {
                lhs.$method(rhs)
            }
        }
    };
    ($op:ident, $name:literal, $method:ident) => {
        pub struct $op;

        impl<T: Arith> BinaryOp<T> for $op {
            const NAME: &'static str = $name;
            fn apply(lhs: T, rhs: T) -> Result<T, KernelError> {
                Ok(lhs.$method(rhs))
            }
        }
    };
}

binary_op!(Add, "add", plus);
binary_op!(Sub, "sub", minus);
binary_op!(Mul, "mul", times);
binary_op!(Div, "div", quotient, fallible);

macro_rules! unary_op {
    ($op:ident, $name:literal, $bound:ident, |$value:ident| $body:expr) => {
        pub struct $op;

        impl<T: $bound> UnaryOp<T> for $op {
            const NAME: &'static str = $name;
            fn apply($value: T) -> T {
                $body
            }
        }
    };
}

unary_op!(Neg, "neg", SignedArith, |value| value.negated());
unary_op!(Abs, "abs", SignedArith, |value| value.magnitude());
unary_op!(Square, "square", Arith, |value| value.times(value));
unary_op!(Sqrt, "sqrt", FloatArith, |value| Float::sqrt(value));
unary_op!(Exp, "exp", FloatArith, |value| Float::exp(value));
unary_op!(Ln, "ln", FloatArith, |value| Float::ln(value));

macro_rules! cmp_op {
    ($op:ident, $name:literal, $cmp:tt) => {
        pub struct $op;

        impl<T: Element> CmpOp<T> for $op {
            const NAME: &'static str = $name;
            fn apply(lhs: T, rhs: T) -> bool {
                lhs $cmp rhs
            }
        }
    };
}

cmp_op!(Gt, "gt", >);
cmp_op!(Gte, "gte", >=);
cmp_op!(Lt, "lt", <);
cmp_op!(Lte, "lte", <=);
cmp_op!(Equal, "eq", ==);
cmp_op!(NotEqual, "ne", !=);
