use bytemuck::Pod;
use std::any::type_name;

use crate::core::{errors::KernelError, iters::Strider};

use super::{
    arith::{Arith, BinaryOp, CmpOp, UnaryOp},
    Order,
};

fn typed<T: Pod>(bytes: &[u8]) -> Result<&[T], KernelError> {
    bytemuck::try_cast_slice(bytes).map_err(|_| KernelError::Cast {
        bytes: bytes.len(),
        dtype: type_name::<T>(),
    })
}

fn typed_mut<T: Pod>(bytes: &mut [u8]) -> Result<&mut [T], KernelError> {
    let length = bytes.len();
    bytemuck::try_cast_slice_mut(bytes).map_err(|_| KernelError::Cast {
        bytes: length,
        dtype: type_name::<T>(),
    })
}

/// Element `i`, or the only element of a one-element operand.
fn pick<T: Copy>(data: &[T], i: usize) -> Option<T> {
    match data {
        [only] => Some(*only),
        _ => data.get(i).copied(),
    }
}

fn at<T: Copy>(data: &[T], offset: usize) -> Result<T, KernelError> {
    data.get(offset).copied().ok_or(KernelError::Offset {
        offset,
        length: data.len(),
    })
}

fn at_mut<T>(data: &mut [T], offset: usize) -> Result<&mut T, KernelError> {
    let length = data.len();
    data.get_mut(offset)
        .ok_or(KernelError::Offset { offset, length })
}

fn combine<T, O: BinaryOp<T>>(dst: T, src: T, order: Order) -> Result<T, KernelError> {
    match order {
        Order::Forward => O::apply(dst, src),
        Order::Reversed => O::apply(src, dst),
    }
}

fn truth<T: Arith>(value: bool) -> T {
    if value {
        T::one()
    } else {
        T::zero()
    }
}

// --- Binary ---

/// `dst[i] = dst[i] op src[i]`. A one-element `src` is applied to every
/// element of `dst`.
pub(crate) fn binary_flat<T: Arith, O: BinaryOp<T>>(
    dst: &mut [u8],
    src: &[u8],
    order: Order,
) -> Result<(), KernelError> {
    let dst = typed_mut::<T>(dst)?;
    let src = typed::<T>(src)?;

    for (i, d) in dst.iter_mut().enumerate() {
        let Some(s) = pick(src, i) else { break };
        *d = combine::<T, O>(*d, s, order)?;
    }

    Ok(())
}

/// `incr[i] += a[i] op b[i]`. Either operand may hold a single element.
pub(crate) fn binary_flat_incr<T: Arith, O: BinaryOp<T>>(
    a: &[u8],
    b: &[u8],
    incr: &mut [u8],
) -> Result<(), KernelError> {
    let (a, b) = (typed::<T>(a)?, typed::<T>(b)?);
    let incr = typed_mut::<T>(incr)?;

    for (i, r) in incr.iter_mut().enumerate() {
        let (Some(x), Some(y)) = (pick(a, i), pick(b, i)) else {
            break;
        };
        *r = r.plus(O::apply(x, y)?);
    }

    Ok(())
}

pub(crate) fn binary_iter<T: Arith, O: BinaryOp<T>>(
    dst: &mut [u8],
    src: &[u8],
    order: Order,
    dst_iter: &mut Strider,
    src_iter: &mut Strider,
) -> Result<(), KernelError> {
    let dst = typed_mut::<T>(dst)?;
    let src = typed::<T>(src)?;

    for (i, j) in dst_iter.by_ref().zip(src_iter.by_ref()) {
        let s = at(src, j)?;
        let d = at_mut(dst, i)?;
        *d = combine::<T, O>(*d, s, order)?;
    }

    Ok(())
}

pub(crate) fn binary_iter_incr<T: Arith, O: BinaryOp<T>>(
    a: &[u8],
    b: &[u8],
    incr: &mut [u8],
    a_iter: &mut Strider,
    b_iter: &mut Strider,
    incr_iter: &mut Strider,
) -> Result<(), KernelError> {
    let (a, b) = (typed::<T>(a)?, typed::<T>(b)?);
    let incr = typed_mut::<T>(incr)?;

    for ((i, j), k) in a_iter.by_ref().zip(b_iter.by_ref()).zip(incr_iter.by_ref()) {
        let value = O::apply(at(a, i)?, at(b, j)?)?;
        let r = at_mut(incr, k)?;
        *r = r.plus(value);
    }

    Ok(())
}

// --- Unary ---

pub(crate) fn unary_flat<T: Arith, O: UnaryOp<T>>(data: &mut [u8]) -> Result<(), KernelError> {
    typed_mut::<T>(data)?
        .iter_mut()
        .for_each(|value| *value = O::apply(*value));
    Ok(())
}

pub(crate) fn unary_iter<T: Arith, O: UnaryOp<T>>(
    data: &mut [u8],
    iter: &mut Strider,
) -> Result<(), KernelError> {
    let data = typed_mut::<T>(data)?;

    for i in iter.by_ref() {
        let value = at_mut(data, i)?;
        *value = O::apply(*value);
    }

    Ok(())
}

// --- Comparison ---

/// Writes `a[i] op b[i]` into a bool buffer.
pub(crate) fn cmp_flat<T: Arith, O: CmpOp<T>>(
    a: &[u8],
    b: &[u8],
    out: &mut [u8],
) -> Result<(), KernelError> {
    let (a, b) = (typed::<T>(a)?, typed::<T>(b)?);

    for (i, r) in out.iter_mut().enumerate() {
        let (Some(x), Some(y)) = (pick(a, i), pick(b, i)) else {
            break;
        };
        *r = u8::from(O::apply(x, y));
    }

    Ok(())
}

/// Overwrites `a[i]` with one or zero of its own type.
pub(crate) fn cmp_flat_same<T: Arith, O: CmpOp<T>>(
    a: &mut [u8],
    b: &[u8],
) -> Result<(), KernelError> {
    let a = typed_mut::<T>(a)?;
    let b = typed::<T>(b)?;

    for (i, x) in a.iter_mut().enumerate() {
        let Some(y) = pick(b, i) else { break };
        *x = truth(O::apply(*x, y));
    }

    Ok(())
}

pub(crate) fn cmp_iter<T: Arith, O: CmpOp<T>>(
    a: &[u8],
    b: &[u8],
    out: &mut [u8],
    a_iter: &mut Strider,
    b_iter: &mut Strider,
    out_iter: &mut Strider,
) -> Result<(), KernelError> {
    let (a, b) = (typed::<T>(a)?, typed::<T>(b)?);

    for ((i, j), k) in a_iter.by_ref().zip(b_iter.by_ref()).zip(out_iter.by_ref()) {
        let value = O::apply(at(a, i)?, at(b, j)?);
        *at_mut(out, k)? = u8::from(value);
    }

    Ok(())
}

pub(crate) fn cmp_iter_same<T: Arith, O: CmpOp<T>>(
    a: &mut [u8],
    b: &[u8],
    a_iter: &mut Strider,
    b_iter: &mut Strider,
) -> Result<(), KernelError> {
    let a = typed_mut::<T>(a)?;
    let b = typed::<T>(b)?;

    for (i, j) in a_iter.by_ref().zip(b_iter.by_ref()) {
        let y = at(b, j)?;
        let x = at_mut(a, i)?;
        *x = truth(O::apply(*x, y));
    }

    Ok(())
}
