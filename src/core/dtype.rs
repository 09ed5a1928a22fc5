use anyhow::{bail, Result};
use bytemuck::Pod;
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    mem::size_of,
    sync::Arc,
};

use crate::core::errors::TypeMismatchError;

/// Element kind. Decides which slow or fast path the storage layer takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Parameterized,
}

impl Kind {
    /// Kinds whose elements are not plain fixed-width numbers.
    pub fn is_parameterized(self) -> bool {
        matches!(self, Kind::String | Kind::Parameterized)
    }

    pub fn is_number(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint | Kind::Float)
    }
}

type ZeroFn = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

struct Descriptor {
    name: String,
    size: usize,
    kind: Kind,
    zero: Option<ZeroFn>,
}

/// Shared, immutable element type descriptor.
///
/// Cloning a `Dtype` clones the handle, not the descriptor. Two dtypes are
/// equal when their name, size and kind agree.
#[derive(Clone)]
pub struct Dtype(Arc<Descriptor>);

impl Dtype {
    fn build(name: &str, size: usize, kind: Kind, zero: Option<ZeroFn>) -> Dtype {
        Dtype(Arc::new(Descriptor {
            name: name.to_string(),
            size,
            kind,
            zero,
        }))
    }

    pub fn of<T: Element>() -> Dtype {
        Dtype::build(T::DTYPE, size_of::<T>(), T::KIND, None)
    }

    pub fn boolean() -> Dtype {
        Dtype::build("bool", 1, Kind::Bool, None)
    }

    pub fn string() -> Dtype {
        Dtype::build("string", size_of::<String>(), Kind::String, None)
    }

    /// User-defined fixed-size record. `zero` builds the record's zero value,
    /// which does not have to be all zero bytes.
    pub fn parameterized(
        name: &str,
        size: usize,
        zero: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) -> Result<Dtype> {
        let produced = zero().len();
        if produced != size {
            bail!(TypeMismatchError {
                expected: format!("{name} zero value of {size} bytes"),
                found: format!("{produced} bytes"),
            });
        }

        Ok(Dtype::build(name, size, Kind::Parameterized, Some(Arc::new(zero))))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    pub fn is_bool(&self) -> bool {
        self.0.kind == Kind::Bool
    }

    /// Byte image of one zero element. Strings have no byte image and yield
    /// an empty vector.
    pub fn zero_value(&self) -> Vec<u8> {
        match (&self.0.zero, self.0.kind) {
            (Some(zero), _) => zero(),
            (None, Kind::String) => Vec::new(),
            (None, _) => vec![0; self.0.size],
        }
    }

    pub(crate) fn mismatch(&self, found: &Dtype) -> TypeMismatchError {
        TypeMismatchError {
            expected: self.name().to_string(),
            found: found.name().to_string(),
        }
    }
}

impl PartialEq for Dtype {
    fn eq(&self, rhs: &Dtype) -> bool {
        Arc::ptr_eq(&self.0, &rhs.0)
            || (self.0.name == rhs.0.name && self.0.size == rhs.0.size && self.0.kind == rhs.0.kind)
    }
}

impl Eq for Dtype {}

impl Debug for Dtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dtype")
            .field("name", &self.0.name)
            .field("size", &self.0.size)
            .field("kind", &self.0.kind)
            .finish()
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

// --- Elements ---

/// Fixed-width numeric types that can be viewed directly over a byte slab.
pub trait Element: Pod + PartialOrd + Debug + Display + Send + Sync + 'static {
    const DTYPE: &'static str;
    const KIND: Kind;
}

macro_rules! element {
    ($type:ty, $name:literal, $kind:ident) => {
        impl Element for $type {
            const DTYPE: &'static str = $name;
            const KIND: Kind = Kind::$kind;
        }
    };
}

element!(i8, "int8", Int);
element!(i16, "int16", Int);
element!(i32, "int32", Int);
element!(i64, "int64", Int);

element!(u8, "uint8", Uint);
element!(u16, "uint16", Uint);
element!(u32, "uint32", Uint);
element!(u64, "uint64", Uint);

element!(f32, "float32", Float);
element!(f64, "float64", Float);

// --- Registry ---

/// Dtype registry. Built once at initialisation and passed by reference.
#[derive(Clone, Debug)]
pub struct Dtypes {
    by_name: HashMap<String, Dtype>,
}

impl Dtypes {
    pub fn new() -> Dtypes {
        let mut dtypes = Dtypes {
            by_name: HashMap::new(),
        };

        for dtype in [
            Dtype::boolean(),
            Dtype::of::<i8>(),
            Dtype::of::<i16>(),
            Dtype::of::<i32>(),
            Dtype::of::<i64>(),
            Dtype::of::<u8>(),
            Dtype::of::<u16>(),
            Dtype::of::<u32>(),
            Dtype::of::<u64>(),
            Dtype::of::<f32>(),
            Dtype::of::<f64>(),
            Dtype::string(),
        ] {
            dtypes.register(dtype);
        }

        dtypes
    }

    /// Registers a dtype, returning the descriptor it replaced.
    pub fn register(&mut self, dtype: Dtype) -> Option<Dtype> {
        self.by_name.insert(dtype.name().to_string(), dtype)
    }

    pub fn get(&self, name: &str) -> Option<Dtype> {
        self.by_name.get(name).cloned()
    }

    pub fn of<T: Element>(&self) -> Dtype {
        self.get(T::DTYPE).unwrap_or_else(Dtype::of::<T>)
    }

    pub fn boolean(&self) -> Dtype {
        self.get("bool").unwrap_or_else(Dtype::boolean)
    }

    pub fn string(&self) -> Dtype {
        self.get("string").unwrap_or_else(Dtype::string)
    }
}

impl Default for Dtypes {
    fn default() -> Self {
        Dtypes::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sizes() {
        let dtypes = Dtypes::new();

        assert_eq!(dtypes.of::<i8>().size(), 1);
        assert_eq!(dtypes.of::<u16>().size(), 2);
        assert_eq!(dtypes.of::<f32>().size(), 4);
        assert_eq!(dtypes.of::<i64>().size(), 8);
        assert_eq!(dtypes.boolean().size(), 1);
        assert_eq!(dtypes.string().kind(), Kind::String);
    }

    #[test]
    fn registry_hands_out_shared_descriptors() {
        let dtypes = Dtypes::new();
        let a = dtypes.of::<f64>();
        let b = dtypes.get("float64").unwrap();

        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, Dtype::of::<f64>());
        assert_ne!(a, dtypes.of::<i64>());
    }

    #[test]
    fn parameterized_zero_value() {
        let point = Dtype::parameterized("point", 4, || vec![0xff, 0, 0xff, 0]).unwrap();

        assert!(point.kind().is_parameterized());
        assert_eq!(point.zero_value(), vec![0xff, 0, 0xff, 0]);
    }

    #[test]
    fn parameterized_zero_must_fill_element() {
        let err = Dtype::parameterized("short", 4, || vec![1, 2]).unwrap_err();
        assert!(err.downcast_ref::<TypeMismatchError>().is_some());
    }
}
