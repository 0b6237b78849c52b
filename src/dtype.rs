// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Data type utilities.
//!
//! The interop layer speaks `candle_core::DType` as its element-type
//! vocabulary; these helpers cover the queries the crate needs without
//! pattern matching at every site. Extension-trait pattern: [`DTypeExt`]
//! extends the foreign type rather than wrapping it.

use candle_core::DType;

/// Size in bytes of a single element of the given dtype.
#[must_use]
pub fn bytes_per_element(dtype: DType) -> usize {
    dtype.size_in_bytes()
}

/// Whether a dtype is a floating-point type.
#[must_use]
pub fn is_floating_point(dtype: DType) -> bool {
    matches!(dtype, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
}

/// Extension trait adding utility methods to `candle_core::DType`.
pub trait DTypeExt {
    /// Whether this dtype is a half-precision float (f16 or bf16).
    fn is_half_precision(&self) -> bool;

    /// Human-readable name, for diagnostics and log fields.
    fn name(&self) -> &'static str;
}

impl DTypeExt for DType {
    fn is_half_precision(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16)
    }

    fn name(&self) -> &'static str {
        match self {
            DType::U8 => "u8",
            DType::U32 => "u32",
            DType::I64 => "i64",
            DType::BF16 => "bf16",
            DType::F16 => "f16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}
