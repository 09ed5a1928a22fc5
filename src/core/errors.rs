use thiserror::Error;

// --- Index ---

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("Cannot slice [{start}:{end}]. Bounds are out of range for capacity {capacity}.")]
    OutOfRange {
        start: usize,
        end: usize,
        capacity: usize,
    },

    #[error("Index {index} is out of range for array of length {length}.")]
    Element { index: usize, length: usize },

    #[error("Length {length} and capacity {capacity} do not fit a buffer of {available} elements.")]
    Buffer {
        length: usize,
        capacity: usize,
        available: usize,
    },
}

// --- Type ---

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Type mismatch. Expected {expected}, found {found}.")]
pub struct TypeMismatchError {
    pub expected: String,
    pub found: String,
}

// --- Shape ---

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Shapes {lhs_sizes:?} and {rhs_sizes:?} cannot broadcasted together.")]
pub struct BroadcastError {
    pub lhs_sizes: Vec<usize>,
    pub rhs_sizes: Vec<usize>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Destination of shape {found:?} cannot hold a result of shape {expected:?}.")]
    Destination {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Operand of shape {operand:?} cannot be written in place with a result of shape {result:?}.")]
    InPlace {
        operand: Vec<usize>,
        result: Vec<usize>,
    },

    #[error("Cannot write through a layout of shape {0:?} whose elements overlap.")]
    Overlap(Vec<usize>),

    #[error("Scalar operand must hold exactly one element, found {0}.")]
    Scalar(usize),

    #[error("Data length ({data_length}) does not match size of tensor ({tensor_size}).")]
    DataLength {
        data_length: usize,
        tensor_size: usize,
    },

    #[error("Size {size} cannot be expaned to size {expansion}. To be expanded, size should be 1.")]
    Expansion { size: usize, expansion: usize },

    #[error("Current rank ({current}) is greater than unsqueezed rank ({unsqueezed}).")]
    Unsqueeze { current: usize, unsqueezed: usize },

    #[error("Transpose requires at least two dimensions.")]
    Transpose,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DimensionError {
    #[error("Dimension {dimension} is greater than max range of dimensions, {dim_range}.")]
    OutOfRange { dimension: usize, dim_range: usize },

    #[error("Dimension {0} repeats.")]
    Repetition(usize),

    #[error("Number of indices ({num_indices}) does not match the number of dimensions {num_dimensions}.")]
    Rank {
        num_indices: usize,
        num_dimensions: usize,
    },
}

// --- Memory ---

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Buffer at {address:#x} ({bytes} bytes) is not natively accessible.")]
pub struct InaccessibleBufferError {
    pub address: usize,
    pub bytes: usize,
}

// --- Kernels ---

#[derive(Error, Debug, PartialEq, Eq)]
#[error("No `{op}` kernel is registered for dtype {dtype}.")]
pub struct UnsupportedKernelError {
    pub op: String,
    pub dtype: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KernelError {
    #[error("Division by zero.")]
    DivisionByZero,

    #[error("Byte range of {bytes} bytes cannot be viewed as {dtype}.")]
    Cast { bytes: usize, dtype: &'static str },

    #[error("Offset {offset} is out of range for {length} elements.")]
    Offset { offset: usize, length: usize },
}
