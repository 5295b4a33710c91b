use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element storage of a [`HostTensor`], flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum TensorData {
    /// Byte-string elements (the host's string type)
    Bytes(Vec<Vec<u8>>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Fp32(Vec<f32>),
    Fp64(Vec<f64>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Fp32(v) => v.len(),
            Self::Fp64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Fp32(_) => "fp32",
            Self::Fp64(_) => "fp64",
        }
    }
}

/// # HostTensor
///
/// A named tensor as exchanged with the host.
///
/// The adapter's fields are all `[1, 1]`: batch dimension of one, a single
/// element. The accessors read element `[0][0]` and fail if the tensor is
/// empty or holds the wrong element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTensor {
    name: String,
    shape: Vec<usize>,
    data: TensorData,
}

impl HostTensor {
    /// Build a tensor from raw parts, as the host supplies them.
    pub fn from_parts(name: impl Into<String>, shape: Vec<usize>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    /// A `[1, 1]` byte-string tensor.
    pub fn bytes(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::from_parts(name, vec![1, 1], TensorData::Bytes(vec![value.into()]))
    }

    /// A `[1, 1]` byte-string tensor holding UTF-8 text.
    pub fn string(name: impl Into<String>, value: &str) -> Self {
        Self::bytes(name, value.as_bytes())
    }

    pub fn int32(name: impl Into<String>, value: i32) -> Self {
        Self::from_parts(name, vec![1, 1], TensorData::Int32(vec![value]))
    }

    pub fn int64(name: impl Into<String>, value: i64) -> Self {
        Self::from_parts(name, vec![1, 1], TensorData::Int64(vec![value]))
    }

    pub fn fp32(name: impl Into<String>, value: f32) -> Self {
        Self::from_parts(name, vec![1, 1], TensorData::Fp32(vec![value]))
    }

    pub fn fp64(name: impl Into<String>, value: f64) -> Self {
        Self::from_parts(name, vec![1, 1], TensorData::Fp64(vec![value]))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Raw bytes of element `[0][0]`.
    pub fn first_bytes(&self) -> Result<&[u8]> {
        match &self.data {
            TensorData::Bytes(values) => values
                .first()
                .map(Vec::as_slice)
                .ok_or_else(|| self.empty()),
            other => Err(self.wrong_type("bytes", other)),
        }
    }

    /// Element `[0][0]` decoded as UTF-8.
    pub fn first_str(&self) -> Result<&str> {
        let bytes = self.first_bytes()?;
        std::str::from_utf8(bytes)
            .map_err(|e| Error::invalid_request(format!("`{}` is not valid UTF-8: {e}", self.name)))
    }

    /// Element `[0][0]` of an integer tensor.
    pub fn first_int(&self) -> Result<i64> {
        let value = match &self.data {
            TensorData::Int32(values) => values.first().map(|v| i64::from(*v)),
            TensorData::Int64(values) => values.first().copied(),
            other => return Err(self.wrong_type("an integer type", other)),
        };
        value.ok_or_else(|| self.empty())
    }

    /// Element `[0][0]` of a floating-point tensor.
    pub fn first_float(&self) -> Result<f64> {
        let value = match &self.data {
            TensorData::Fp32(values) => values.first().map(|v| f64::from(*v)),
            TensorData::Fp64(values) => values.first().copied(),
            other => return Err(self.wrong_type("a float type", other)),
        };
        value.ok_or_else(|| self.empty())
    }

    fn empty(&self) -> Error {
        Error::invalid_request(format!("`{}` has no elements", self.name))
    }

    fn wrong_type(&self, expected: &str, got: &TensorData) -> Error {
        Error::invalid_request(format!(
            "`{}` must hold {expected}, got {}",
            self.name,
            got.dtype()
        ))
    }
}
