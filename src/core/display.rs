use anyhow::Result;
use prettytable::{
    format::consts::FORMAT_BOX_CHARS,
    {Cell, Row, Table},
};
use std::fmt::{self, Debug, Display, Formatter};

use crate::core::{
    array::Array,
    dtype::{Element, Kind},
    tensor::Tensor,
};

impl Debug for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype().name())
            .field("dims", &self.rank())
            .field("elems", &self.numel())
            .field("shape", &self.sizes())
            .finish()
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let n = self.rank();

        if n == 0 {
            let row = Row::new(vec![Cell::new(&element(&self.array, self.offset()))]);
            write!(f, "{}", set_style(Table::init(vec![row])))?;
        } else if n <= 8 {
            let table = if n % 2 == 1 {
                let row = odd_dimensions(self, n, 0);
                set_style(Table::init(vec![row]))
            } else {
                even_dimensions(self, n, 0)
            };

            write!(f, "{}", table)?;
        }

        writeln!(f, "{:?}", self)
    }
}

macro_rules! numeric {
    ($array:ident, $offset:ident; $($type:ty),+) => {{
        let name = $array.dtype().name();
        $(
            if name == <$type as Element>::DTYPE {
                return $array.get::<$type>($offset).map(|value| value.to_string());
            }
        )+
    }};
}

fn number(array: &Array, offset: usize) -> Result<String> {
    numeric!(array, offset; i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

    // numeric kinds registered under custom names
    bytes(array, offset)
}

fn bytes(array: &Array, offset: usize) -> Result<String> {
    let bytes = array.get_bytes(offset)?;
    Ok(bytes.iter().map(|byte| format!("{:02x}", byte)).collect())
}

/// Text of the element at `offset`. Unreadable elements print as `?`.
fn element(array: &Array, offset: usize) -> String {
    let text = match array.dtype().kind() {
        Kind::Bool => array.get_bytes(offset).map(|b| (b[0] != 0).to_string()),
        Kind::String => array.get_string(offset),
        Kind::Int | Kind::Uint | Kind::Float => number(array, offset),
        Kind::Parameterized => bytes(array, offset),
    };

    text.unwrap_or_else(|_| "?".to_string())
}

fn odd_dimensions(tensor: &Tensor, n: usize, stride_offset: usize) -> Row {
    let dim = tensor.rank() - n;
    let size = tensor.shape.sizes[dim];
    let stride = tensor.shape.strides[dim];

    if n == 1 {
        let offset = tensor.offset() + stride_offset;
        Row::from((0..size).map(|index| {
            let index = stride.offset(index, size) + offset;
            Cell::new(&element(&tensor.array, index))
        }))
    } else {
        Row::from((0..size).map(|index| {
            let offset = stride.offset(index, size) + stride_offset;
            even_dimensions(tensor, n - 1, offset)
        }))
    }
}

fn even_dimensions(tensor: &Tensor, n: usize, stride_offset: usize) -> Table {
    let dim = tensor.rank() - n;
    let size = tensor.shape.sizes[dim];
    let stride = tensor.shape.strides[dim];

    let rows = (0..size)
        .map(|index| {
            let offset = stride.offset(index, size) + stride_offset;
            odd_dimensions(tensor, n - 1, offset)
        })
        .collect();

    set_style(Table::init(rows))
}

fn set_style(mut table: Table) -> Table {
    table.set_format(*FORMAT_BOX_CHARS);
    table
}
