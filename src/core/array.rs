use anyhow::{bail, Result};
use bytemuck::Pod;
use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    mem::size_of,
    ops::Range,
    sync::RwLockReadGuard,
};

use crate::core::{
    dtype::{Dtype, Element, Kind},
    errors::*,
    iters::Strider,
    storage::{Buffer, Header, Slab},
};

/// Typed, type-erased run of elements over a shared buffer.
///
/// An array never owns its memory exclusively: slices and clones share the
/// same [`Buffer`], and writes through any of them are visible to all.
#[derive(Clone)]
pub struct Array {
    buffer: Buffer,
    header: Header,
    dtype: Dtype,
}

impl Array {
    // --- Construction ---

    /// Allocates `length` zero-valued elements.
    pub fn create(dtype: &Dtype, length: usize) -> Array {
        let buffer = match dtype.kind() {
            Kind::String => Buffer::from_strings(vec![String::new(); length]),
            Kind::Parameterized => {
                let zero = dtype.zero_value();
                let mut data = Vec::with_capacity(length * dtype.size());
                for _ in 0..length {
                    data.extend_from_slice(&zero);
                }
                Buffer::from_bytes(&data)
            }
            _ => Buffer::zeroed(length * dtype.size()),
        };

        Array {
            buffer,
            header: Header::new(0, length, length),
            dtype: dtype.clone(),
        }
    }

    /// Wraps existing memory without copying it.
    pub fn from_buffer(
        dtype: &Dtype,
        buffer: &Buffer,
        length: usize,
        capacity: usize,
    ) -> Result<Array> {
        let available = buffer.elements(dtype.size());
        if length > capacity || capacity > available {
            bail!(IndexError::Buffer {
                length,
                capacity,
                available,
            });
        }

        Ok(Array {
            buffer: buffer.clone(),
            header: Header::new(0, length, capacity),
            dtype: dtype.clone(),
        })
    }

    pub fn from_slice<T: Element>(data: &[T]) -> Array {
        Array {
            buffer: Buffer::from_slice(data),
            header: Header::new(0, data.len(), data.len()),
            dtype: Dtype::of::<T>(),
        }
    }

    pub fn from_bools(data: &[bool]) -> Array {
        let bytes: Vec<u8> = data.iter().map(|&b| u8::from(b)).collect();

        Array {
            buffer: Buffer::from_bytes(&bytes),
            header: Header::new(0, data.len(), data.len()),
            dtype: Dtype::boolean(),
        }
    }

    pub fn from_strings(data: &[&str]) -> Array {
        let strings: Vec<String> = data.iter().map(|s| s.to_string()).collect();

        Array {
            buffer: Buffer::from_strings(strings),
            header: Header::new(0, data.len(), data.len()),
            dtype: Dtype::string(),
        }
    }

    // --- Attributes ---

    pub fn dtype(&self) -> &Dtype {
        &self.dtype
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.header.capacity()
    }

    /// Byte extent of the element range.
    pub fn mem_size(&self) -> usize {
        self.header.len() * self.dtype.size()
    }

    pub fn shares_buffer(&self, other: &Array) -> bool {
        self.buffer.ptr_eq(&other.buffer)
    }

    pub fn is_natively_accessible(&self) -> bool {
        self.buffer.is_natively_accessible()
    }

    fn byte_range(&self) -> Range<usize> {
        self.header.byte_range(self.dtype.size())
    }

    fn window<'s>(&self, bytes: &'s [u8]) -> Result<&'s [u8]> {
        let range = self.byte_range();
        let length = bytes.len();
        bytes.get(range.clone()).ok_or_else(|| {
            KernelError::Offset {
                offset: range.end,
                length,
            }
            .into()
        })
    }

    fn window_mut<'s>(&self, bytes: &'s mut [u8]) -> Result<&'s mut [u8]> {
        let range = self.byte_range();
        let length = bytes.len();
        bytes.get_mut(range.clone()).ok_or_else(|| {
            KernelError::Offset {
                offset: range.end,
                length,
            }
            .into()
        })
    }

    // --- Slicing ---

    /// Returns a view of elements `start..end` sharing this array's memory.
    pub fn slice(&self, start: usize, end: usize) -> Result<Array> {
        Ok(Array {
            buffer: self.buffer.clone(),
            header: self.header.slice(start, end)?,
            dtype: self.dtype.clone(),
        })
    }

    /// Like [`Array::slice`], but retargets `res` instead of building a new array.
    pub fn slice_into(&self, start: usize, end: usize, res: &mut Array) -> Result<()> {
        res.header = self.header.slice(start, end)?;
        if !res.buffer.ptr_eq(&self.buffer) {
            res.buffer = self.buffer.clone();
        }
        if res.dtype != self.dtype {
            res.dtype = self.dtype.clone();
        }

        Ok(())
    }

    // --- Bulk mutation ---

    /// Exchanges elements `i` and `j` in place.
    pub fn swap(&self, i: usize, j: usize) -> Result<()> {
        self.header.valid_index(i)?;
        self.header.valid_index(j)?;

        if i == j {
            return Ok(());
        }

        let mut slab = self.buffer.write();

        if self.dtype.kind() == Kind::String {
            let range = self.header.range();
            let strings = slab.strings_mut().ok_or_else(|| self.string_storage())?;
            strings[range].swap(i, j);
            return Ok(());
        }

        let size = self.dtype.size();
        let bytes = self.window_mut(slab.bytes_mut()?)?;

        if !self.dtype.kind().is_parameterized() {
            match size {
                8 => return swap_words::<u64>(bytes, i, j),
                4 => return swap_words::<u32>(bytes, i, j),
                2 => return swap_words::<u16>(bytes, i, j),
                1 => return swap_words::<u8>(bytes, i, j),
                _ => {}
            }
        }

        let (is, js) = (i * size, j * size);
        let mut tmp = vec![0; size];
        tmp.copy_from_slice(&bytes[is..is + size]);
        bytes.copy_within(js..js + size, is);
        bytes[js..js + size].copy_from_slice(&tmp);

        Ok(())
    }

    /// Resets every element to the dtype's zero value.
    pub fn zero(&self) -> Result<()> {
        let mut slab = self.buffer.write();

        match self.dtype.kind() {
            Kind::String => {
                let range = self.header.range();
                let strings = slab.strings_mut().ok_or_else(|| self.string_storage())?;
                strings[range].iter_mut().for_each(String::clear);
            }
            Kind::Parameterized => {
                let size = self.dtype.size();
                if size == 0 {
                    return Ok(());
                }

                let bytes = self.window_mut(slab.bytes_mut()?)?;
                for element in bytes.chunks_exact_mut(size) {
                    element.copy_from_slice(&self.dtype.zero_value());
                }
            }
            _ => self.window_mut(slab.bytes_mut()?)?.fill(0),
        }

        Ok(())
    }

    /// Deep copy of the element range into a fresh allocation.
    pub fn duplicate(&self) -> Result<Array> {
        let copy = Array::create(&self.dtype, self.len());
        copy_array(&copy, self)?;
        Ok(copy)
    }

    // --- Raw access ---

    /// Runs `f` over the raw bytes of the element range.
    pub(crate) fn byte_view<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let slab = self.buffer.read();
        Ok(f(self.window(slab.bytes()?)?))
    }

    pub(crate) fn byte_view_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut slab = self.buffer.write();
        Ok(f(self.window_mut(slab.bytes_mut()?)?))
    }

    // --- Typed access ---

    fn expect_element<T: Element>(&self) -> Result<()> {
        if self.dtype.name() != T::DTYPE || self.dtype.size() != size_of::<T>() {
            bail!(TypeMismatchError {
                expected: self.dtype.name().to_string(),
                found: T::DTYPE.to_string(),
            });
        }

        Ok(())
    }

    fn string_storage(&self) -> TypeMismatchError {
        TypeMismatchError {
            expected: "string storage".to_string(),
            found: self.dtype.name().to_string(),
        }
    }

    pub fn get<T: Element>(&self, index: usize) -> Result<T> {
        self.expect_element::<T>()?;
        self.header.valid_index(index)?;

        let size = size_of::<T>();
        self.byte_view(|bytes| bytemuck::pod_read_unaligned(&bytes[index * size..(index + 1) * size]))
    }

    pub fn set<T: Element>(&self, index: usize, value: T) -> Result<()> {
        self.expect_element::<T>()?;
        self.header.valid_index(index)?;

        let size = size_of::<T>();
        self.byte_view_mut(|bytes| {
            bytes[index * size..(index + 1) * size].copy_from_slice(bytemuck::bytes_of(&value))
        })
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.expect_element::<T>()?;

        self.byte_view(|bytes| {
            bytes
                .chunks_exact(size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect()
        })
    }

    pub fn to_bools(&self) -> Result<Vec<bool>> {
        if !self.dtype.is_bool() {
            bail!(self.dtype.mismatch(&Dtype::boolean()));
        }

        self.byte_view(|bytes| bytes.iter().map(|&b| b != 0).collect())
    }

    /// Raw bytes of one element. Not available for strings.
    pub fn get_bytes(&self, index: usize) -> Result<Vec<u8>> {
        self.header.valid_index(index)?;

        let size = self.dtype.size();
        self.byte_view(|bytes| bytes[index * size..(index + 1) * size].to_vec())
    }

    pub fn set_bytes(&self, index: usize, value: &[u8]) -> Result<()> {
        self.header.valid_index(index)?;

        let size = self.dtype.size();
        if value.len() != size {
            bail!(TypeMismatchError {
                expected: format!("{} bytes", size),
                found: format!("{} bytes", value.len()),
            });
        }

        self.byte_view_mut(|bytes| bytes[index * size..(index + 1) * size].copy_from_slice(value))
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        self.header.valid_index(index)?;

        let slab = self.buffer.read();
        let strings = slab.strings().ok_or_else(|| self.string_storage())?;
        Ok(strings[self.header.offset + index].clone())
    }

    pub fn set_string(&self, index: usize, value: &str) -> Result<()> {
        self.header.valid_index(index)?;

        let mut slab = self.buffer.write();
        let strings = slab.strings_mut().ok_or_else(|| self.string_storage())?;
        strings[self.header.offset + index] = value.to_string();
        Ok(())
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("dtype", &self.dtype.name())
            .field("offset", &self.header.offset)
            .field("len", &self.header.length)
            .field("cap", &self.header.capacity)
            .finish()
    }
}

fn swap_words<W: Pod>(bytes: &mut [u8], i: usize, j: usize) -> Result<()> {
    let length = bytes.len();
    let words: &mut [W] = bytemuck::try_cast_slice_mut(bytes).map_err(|_| KernelError::Cast {
        bytes: length,
        dtype: type_name::<W>(),
    })?;

    words.swap(i, j);
    Ok(())
}

// --- Copies ---

/// Copies `min(dst.len(), src.len())` elements and returns the count.
/// Overlapping ranges of one buffer behave like `memmove`.
pub fn copy_array(dst: &Array, src: &Array) -> Result<usize> {
    if dst.dtype != src.dtype {
        bail!(dst.dtype.mismatch(&src.dtype));
    }

    let count = dst.len().min(src.len());
    if count == 0 {
        return Ok(0);
    }

    if dst.dtype.kind() == Kind::String {
        let items = {
            let slab = src.buffer.read();
            let strings = slab.strings().ok_or_else(|| src.string_storage())?;
            strings[src.header.offset..src.header.offset + count].to_vec()
        };

        let mut slab = dst.buffer.write();
        let strings = slab.strings_mut().ok_or_else(|| dst.string_storage())?;
        strings[dst.header.offset..dst.header.offset + count].clone_from_slice(&items);
        return Ok(count);
    }

    let bytes = count * dst.dtype.size();
    with_access(dst, &[src], |target, sources| {
        target[..bytes].copy_from_slice(&sources[0][..bytes]);
        Ok(count)
    })
}

/// Copies the elements at paired iterator offsets, advancing both cursors in
/// lockstep until either is exhausted. Offsets are relative to the start of
/// each array. Fixed-width storage only.
pub(crate) fn copy_iter(
    dst: &Array,
    src: &Array,
    dst_iter: &mut Strider,
    src_iter: &mut Strider,
) -> Result<usize> {
    if dst.dtype != src.dtype {
        bail!(dst.dtype.mismatch(&src.dtype));
    }

    let size = dst.dtype.size();
    with_access(dst, &[src], |target, sources| {
        let source = sources[0];
        let mut count = 0;

        for (d, s) in dst_iter.by_ref().zip(src_iter.by_ref()) {
            let (ds, ss) = (d * size, s * size);
            if ds + size > target.len() || ss + size > source.len() {
                bail!(KernelError::Offset {
                    offset: d.max(s),
                    length: target.len().min(source.len()) / size.max(1),
                });
            }

            target[ds..ds + size].copy_from_slice(&source[ss..ss + size]);
            count += 1;
        }

        Ok(count)
    })
}

enum Slot {
    Snapshot(Vec<u64>, usize),
    Guard(usize),
}

/// Copies `bytes` into word-aligned storage so typed views of the copy line up.
fn snapshot(bytes: &[u8]) -> Slot {
    let mut words = vec![0u64; bytes.len().div_ceil(8)];
    bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
    Slot::Snapshot(words, bytes.len())
}

/// Locks `dst` for writing and every array in `srcs` for reading, then runs
/// `f` over their byte ranges.
///
/// A source that shares a buffer with `dst` is copied out before `dst` is
/// locked, so `f` always sees the operands as they were before the write.
/// Each distinct buffer is locked once.
pub(crate) fn with_access<R>(
    dst: &Array,
    srcs: &[&Array],
    f: impl FnOnce(&mut [u8], &[&[u8]]) -> Result<R>,
) -> Result<R> {
    let mut guards: Vec<(&Buffer, RwLockReadGuard<'_, Slab>)> = Vec::new();
    let mut slots = Vec::with_capacity(srcs.len());

    for src in srcs {
        if src.buffer.ptr_eq(&dst.buffer) {
            slots.push(src.byte_view(snapshot)?);
        } else if let Some(i) = guards.iter().position(|(b, _)| b.ptr_eq(&src.buffer)) {
            slots.push(Slot::Guard(i));
        } else {
            guards.push((&src.buffer, src.buffer.read()));
            slots.push(Slot::Guard(guards.len() - 1));
        }
    }

    let views = srcs
        .iter()
        .zip(&slots)
        .map(|(src, slot)| match slot {
            Slot::Snapshot(words, length) => Ok(&bytemuck::cast_slice::<u64, u8>(words)[..*length]),
            Slot::Guard(i) => src.window(guards[*i].1.bytes()?),
        })
        .collect::<Result<Vec<&[u8]>>>()?;

    let mut slab = dst.buffer.write();
    let target = dst.window_mut(slab.bytes_mut()?)?;
    f(target, &views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn create_zeroes_every_kind() {
        let ints = Array::create(&Dtype::of::<i32>(), 3);
        assert_eq!(ints.to_vec::<i32>().unwrap(), vec![0, 0, 0]);

        let strings = Array::create(&Dtype::string(), 2);
        assert_eq!(strings.get_string(1).unwrap(), "");

        let point = Dtype::parameterized("point", 3, || vec![7, 0, 7]).unwrap();
        let points = Array::create(&point, 2);
        assert_eq!(points.get_bytes(1).unwrap(), vec![7, 0, 7]);
    }

    #[test]
    fn from_buffer_shares_memory() {
        let buffer = Buffer::from_slice(&[1i32, 2, 3, 4]);
        let dtype = Dtype::of::<i32>();

        let a = Array::from_buffer(&dtype, &buffer, 2, 4).unwrap();
        let b = Array::from_buffer(&dtype, &buffer, 4, 4).unwrap();
        a.set(1, 20i32).unwrap();

        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 20, 3, 4]);
        assert!(a.shares_buffer(&b));
        assert_eq!(a.capacity(), 4);
    }

    #[test]
    fn from_buffer_rejects_oversized_views() {
        let buffer = Buffer::from_slice(&[1i32, 2]);
        let dtype = Dtype::of::<i32>();

        let err = Array::from_buffer(&dtype, &buffer, 2, 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Buffer { available: 2, .. })
        ));
        assert!(Array::from_buffer(&dtype, &buffer, 3, 2).is_err());
    }

    #[test]
    fn slice_and_swap_alias_parent() {
        let a = Array::from_slice(&[1i32, 2, 3, 4]);
        let s = a.slice(1, 3).unwrap();
        assert_eq!(s.to_vec::<i32>().unwrap(), vec![2, 3]);
        assert_eq!(s.capacity(), 3);

        s.swap(0, 1).unwrap();
        assert_eq!(s.to_vec::<i32>().unwrap(), vec![3, 2]);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn slice_beyond_length_within_capacity() {
        let a = Array::from_slice(&[1u8, 2, 3, 4]).slice(0, 2).unwrap();
        let wider = a.slice(1, 4).unwrap();

        assert_eq!(wider.to_vec::<u8>().unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn slice_bounds() {
        let a = Array::from_slice(&[1i64, 2, 3]);

        for (i, j) in [(2, 1), (0, 4), (4, 4)] {
            let err = a.slice(i, j).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<IndexError>(),
                Some(IndexError::OutOfRange { .. })
            ));
        }
        assert!(a.slice(3, 3).unwrap().is_empty());
    }

    #[test]
    fn slice_into_retargets() {
        let a = Array::from_slice(&[1.0f32, 2.0, 3.0]);
        let mut res = Array::create(&Dtype::of::<f32>(), 0);

        a.slice_into(1, 3, &mut res).unwrap();
        assert_eq!(res.to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
        assert!(res.shares_buffer(&a));
    }

    #[test]
    fn swap_strings_and_records() {
        let names = Array::from_strings(&["a", "b", "c"]);
        names.swap(0, 2).unwrap();
        assert_eq!(names.get_string(0).unwrap(), "c");
        assert_eq!(names.get_string(2).unwrap(), "a");

        let rgb = Dtype::parameterized("rgb", 3, || vec![0; 3]).unwrap();
        let colors = Array::create(&rgb, 2);
        colors.set_bytes(0, &[1, 2, 3]).unwrap();
        colors.set_bytes(1, &[4, 5, 6]).unwrap();
        colors.swap(0, 1).unwrap();
        assert_eq!(colors.get_bytes(0).unwrap(), vec![4, 5, 6]);
        assert_eq!(colors.get_bytes(1).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn swap_out_of_range() {
        let a = Array::from_slice(&[1u16, 2]);
        let err = a.swap(0, 2).unwrap_err();

        assert_eq!(
            err.downcast_ref::<IndexError>(),
            Some(&IndexError::Element {
                index: 2,
                length: 2
            })
        );
    }

    #[test]
    fn zero_restores_zero_values() {
        let floats = Array::from_slice(&[1.5f64, -2.0]);
        floats.zero().unwrap();
        assert_eq!(floats.to_vec::<f64>().unwrap(), vec![0.0, 0.0]);

        let names = Array::from_strings(&["x", "y"]);
        names.zero().unwrap();
        assert_eq!(names.get_string(0).unwrap(), "");

        let tagged = Dtype::parameterized("tagged", 2, || vec![0xaa, 0]).unwrap();
        let records = Array::create(&tagged, 3);
        records.set_bytes(2, &[1, 1]).unwrap();
        records.zero().unwrap();
        for i in 0..3 {
            assert_eq!(records.get_bytes(i).unwrap(), tagged.zero_value());
        }
    }

    #[test]
    fn zero_only_touches_slice() {
        let a = Array::from_slice(&[1i32, 2, 3, 4]);
        a.slice(1, 3).unwrap().zero().unwrap();

        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 0, 0, 4]);
    }

    #[test]
    fn copy_counts_and_types() {
        let dst = Array::create(&Dtype::of::<i32>(), 2);
        let src = Array::from_slice(&[7i32, 8, 9]);
        assert_eq!(copy_array(&dst, &src).unwrap(), 2);
        assert_eq!(dst.to_vec::<i32>().unwrap(), vec![7, 8]);

        let wrong = Array::from_slice(&[1.0f32]);
        let err = copy_array(&dst, &wrong).unwrap_err();
        assert!(err.downcast_ref::<TypeMismatchError>().is_some());
    }

    #[test]
    fn copy_overlapping_slices() {
        let a = Array::from_slice(&[1u32, 2, 3, 4, 5]);
        let head = a.slice(0, 4).unwrap();
        let tail = a.slice(1, 5).unwrap();

        assert_eq!(copy_array(&tail, &head).unwrap(), 4);
        assert_eq!(a.to_vec::<u32>().unwrap(), vec![1, 1, 2, 3, 4]);
    }

    #[test]
    fn copy_strings() {
        let dst = Array::create(&Dtype::string(), 3);
        let src = Array::from_strings(&["p", "q"]);

        assert_eq!(copy_array(&dst, &src).unwrap(), 2);
        assert_eq!(dst.get_string(1).unwrap(), "q");
        assert_eq!(dst.get_string(2).unwrap(), "");
    }

    #[test]
    fn copy_iter_follows_offsets() {
        let dst = Array::create(&Dtype::of::<i16>(), 3);
        let src = Array::from_slice(&[1i16, 2, 3, 4, 5, 6]);
        let mut dit = Strider::flat(0, 1, 3);
        let mut sit = Strider::flat(0, 2, 3);

        assert_eq!(copy_iter(&dst, &src, &mut dit, &mut sit).unwrap(), 3);
        assert_eq!(dst.to_vec::<i16>().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn foreign_arrays_are_inaccessible() {
        let buffer = Buffer::foreign(0xdead_0000, 32);
        let a = Array::from_buffer(&Dtype::of::<f32>(), &buffer, 8, 8).unwrap();

        assert!(!a.is_natively_accessible());
        let err = a.zero().unwrap_err();
        assert!(err.downcast_ref::<InaccessibleBufferError>().is_some());
    }

    #[test]
    fn typed_access_checks_dtype() {
        let a = Array::from_slice(&[1i32]);

        assert!(a.get::<u32>(0).is_err());
        assert!(a.get::<i32>(1).is_err());
        assert_eq!(a.mem_size(), 4);
    }

    proptest! {
        #[test]
        fn swap_twice_is_identity(
            data in proptest::collection::vec(any::<i64>(), 1..32),
            i in 0usize..32,
            j in 0usize..32,
        ) {
            let (i, j) = (i % data.len(), j % data.len());
            let a = Array::from_slice(&data);

            a.swap(i, j).unwrap();
            a.swap(i, j).unwrap();
            prop_assert_eq!(a.to_vec::<i64>().unwrap(), data);
        }

        #[test]
        fn swap_twice_is_identity_for_narrow_words(
            data in proptest::collection::vec(any::<u8>(), 2..32),
        ) {
            let a = Array::from_slice(&data);
            let last = data.len() - 1;

            a.swap(0, last).unwrap();
            a.swap(0, last).unwrap();
            prop_assert_eq!(a.to_vec::<u8>().unwrap(), data);
        }

        #[test]
        fn slice_aliases_parent(
            data in proptest::collection::vec(any::<i32>(), 1..32),
            start in 0usize..32,
            value in any::<i32>(),
        ) {
            let a = Array::from_slice(&data);
            let start = start % data.len();
            let s = a.slice(start, data.len()).unwrap();

            prop_assert_eq!(s.len(), data.len() - start);
            s.set(0, value).unwrap();
            prop_assert_eq!(a.get::<i32>(start).unwrap(), value);

            a.set(start, data[start]).unwrap();
            prop_assert_eq!(s.get::<i32>(0).unwrap(), data[start]);
        }
    }
}
