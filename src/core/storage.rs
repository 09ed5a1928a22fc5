use anyhow::Result;
use bytemuck::Pod;
use std::{
    mem::size_of,
    ops::Range,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::core::errors::{IndexError, InaccessibleBufferError, TypeMismatchError};

/// Backing memory of one allocation.
///
/// Byte slabs are stored as `u64` words so every typed view of an element of
/// at most eight bytes starts on an aligned address.
pub(crate) enum Slab {
    Words { words: Vec<u64>, bytes: usize },
    Strings(Vec<String>),
    Foreign { address: usize, bytes: usize },
}

impl Slab {
    fn zeroed(bytes: usize) -> Slab {
        Slab::Words {
            words: vec![0; bytes.div_ceil(size_of::<u64>())],
            bytes,
        }
    }

    pub(crate) fn bytes(&self) -> Result<&[u8]> {
        match self {
            Slab::Words { words, bytes } => Ok(&bytemuck::cast_slice::<u64, u8>(words)[..*bytes]),
            Slab::Strings(_) => Err(string_slab().into()),
            Slab::Foreign { address, bytes } => Err(InaccessibleBufferError {
                address: *address,
                bytes: *bytes,
            }
            .into()),
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match self {
            Slab::Words { words, bytes } => Ok(&mut bytemuck::cast_slice_mut::<u64, u8>(words)[..*bytes]),
            Slab::Strings(_) => Err(string_slab().into()),
            Slab::Foreign { address, bytes } => Err(InaccessibleBufferError {
                address: *address,
                bytes: *bytes,
            }
            .into()),
        }
    }

    pub(crate) fn strings(&self) -> Option<&[String]> {
        match self {
            Slab::Strings(strings) => Some(strings),
            _ => None,
        }
    }

    pub(crate) fn strings_mut(&mut self) -> Option<&mut [String]> {
        match self {
            Slab::Strings(strings) => Some(strings),
            _ => None,
        }
    }
}

fn string_slab() -> TypeMismatchError {
    TypeMismatchError {
        expected: "fixed-width storage".to_string(),
        found: "string".to_string(),
    }
}

/// Shared handle to backing memory. Every array and slice derived from one
/// allocation holds a clone; the memory lives until the last one drops.
#[derive(Clone)]
pub struct Buffer {
    slab: Arc<RwLock<Slab>>,
}

impl Buffer {
    fn wrap(slab: Slab) -> Buffer {
        Buffer {
            slab: Arc::new(RwLock::new(slab)),
        }
    }

    pub fn zeroed(bytes: usize) -> Buffer {
        Buffer::wrap(Slab::zeroed(bytes))
    }

    pub fn from_bytes(data: &[u8]) -> Buffer {
        let mut slab = Slab::zeroed(data.len());
        if let Slab::Words { words, bytes } = &mut slab {
            bytemuck::cast_slice_mut::<u64, u8>(words)[..*bytes].copy_from_slice(data);
        }

        Buffer::wrap(slab)
    }

    pub fn from_slice<T: Pod>(data: &[T]) -> Buffer {
        Buffer::from_bytes(bytemuck::cast_slice(data))
    }

    pub fn from_strings(data: Vec<String>) -> Buffer {
        Buffer::wrap(Slab::Strings(data))
    }

    /// Memory owned outside this process' address space (device memory,
    /// mapped handles). It can be described but not read or written.
    pub fn foreign(address: usize, bytes: usize) -> Buffer {
        Buffer::wrap(Slab::Foreign { address, bytes })
    }

    /// Number of whole elements of `size` bytes the buffer holds.
    pub fn elements(&self, size: usize) -> usize {
        match &*self.read() {
            Slab::Strings(strings) => strings.len(),
            Slab::Words { bytes, .. } | Slab::Foreign { bytes, .. } => {
                if size == 0 {
                    0
                } else {
                    bytes / size
                }
            }
        }
    }

    pub fn is_natively_accessible(&self) -> bool {
        !matches!(&*self.read(), Slab::Foreign { .. })
    }

    pub(crate) fn inaccessible(&self) -> Option<InaccessibleBufferError> {
        match &*self.read() {
            Slab::Foreign { address, bytes } => Some(InaccessibleBufferError {
                address: *address,
                bytes: *bytes,
            }),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.slab, &other.slab)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Slab> {
        self.slab.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Slab> {
        self.slab.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `{offset, length, capacity}` view over a buffer, counted in elements.
/// The header never owns the memory it describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub(crate) offset: usize,
    pub(crate) length: usize,
    pub(crate) capacity: usize,
}

impl Header {
    pub(crate) fn new(offset: usize, length: usize, capacity: usize) -> Header {
        Header {
            offset,
            length,
            capacity,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }

    pub(crate) fn byte_range(&self, size: usize) -> Range<usize> {
        self.offset * size..(self.offset + self.length) * size
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Result<Header, IndexError> {
        if end < start || end > self.capacity {
            return Err(IndexError::OutOfRange {
                start,
                end,
                capacity: self.capacity,
            });
        }

        Ok(Header {
            offset: self.offset + start,
            length: end - start,
            capacity: self.capacity - start,
        })
    }

    pub(crate) fn valid_index(&self, index: usize) -> Result<(), IndexError> {
        if index >= self.length {
            return Err(IndexError::Element {
                index,
                length: self.length,
            });
        }

        Ok(())
    }
}
