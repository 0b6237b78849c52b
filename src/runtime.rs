// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! The native call boundary and the dispatch protocol.
//!
//! ## The Boundary
//!
//! Every native entry point takes zero or more opaque handles plus scalar
//! arguments and returns either a new handle or [`NULL_HANDLE`] on failure.
//! A parallel last-error channel holds a human-readable diagnostic after a
//! failure. [`NativeRuntime`] captures exactly that surface as a trait so
//! that production backends (an FFI binding to a tensor runtime) and the
//! in-process [`StubRuntime`](crate::stub::StubRuntime) are interchangeable.
//!
//! ## The Protocol
//!
//! [`check_returned_handle`] is the single chokepoint through which native
//! failures become [`Error::NativeCallFailed`](crate::error::Error). Every
//! call site follows the same sequence: issue call, pass the returned handle
//! through the chokepoint, wrap it. No layer checks success informally, and
//! no wrapper is ever constructed from the sentinel.

use crate::device::Device;
use crate::error::{Error, Result};
use candle_core::DType;
use std::fmt;

/// An address-sized opaque identifier for memory owned by the native runtime.
///
/// A value of [`NULL_HANDLE`] denotes "operation failed, no resource
/// produced" and must never be treated as a valid resource.
pub type RawHandle = usize;

/// The failure sentinel returned by native entry points.
pub const NULL_HANDLE: RawHandle = 0;

/// The native entry-point surface the interop core dispatches into.
///
/// Implementations own the actual tensor storage. Handle-returning methods
/// signal failure by returning [`NULL_HANDLE`] and recording a diagnostic
/// retrievable through [`last_error`](Self::last_error); they never panic
/// across the boundary.
pub trait NativeRuntime: Send + Sync + fmt::Debug {
    /// Allocate a one-element tensor holding `value` on `device` with `dtype`.
    fn scalar_tensor(&self, value: f64, device: Device, dtype: DType) -> RawHandle;

    /// Dropout forward kernel.
    ///
    /// During training, zeroes elements of `input` with probability `p`,
    /// producing a new tensor (or mutating in place when `inplace` holds,
    /// still returning a handle to the result).
    fn dropout(&self, input: RawHandle, p: f64, train: bool, inplace: bool) -> RawHandle;

    /// Move/convert a tensor to the given device and dtype, producing a new
    /// handle. The input handle remains owned by the caller.
    fn to_device(&self, tensor: RawHandle, device: Device, dtype: DType) -> RawHandle;

    /// Release a tensor's native storage. Must be called exactly once per
    /// live handle; the handle is invalid afterwards.
    fn free_tensor(&self, tensor: RawHandle);

    /// Return the diagnostic recorded by the most recent failed entry point,
    /// clearing the channel.
    fn last_error(&self) -> Option<String>;

    /// Whether the given device is usable by this runtime.
    fn device_available(&self, device: Device) -> bool {
        device == Device::Cpu
    }
}

/// The dispatch-protocol chokepoint: validate a handle returned by a native
/// entry point.
///
/// On the sentinel, drains the runtime's last-error channel and raises
/// [`Error::NativeCallFailed`] carrying whatever diagnostic was available.
///
/// # Errors
///
/// Returns `NativeCallFailed` when `raw` is [`NULL_HANDLE`].
pub fn check_returned_handle(runtime: &dyn NativeRuntime, raw: RawHandle) -> Result<RawHandle> {
    if raw == NULL_HANDLE {
        let message = runtime
            .last_error()
            .unwrap_or_else(|| "native call failed without a diagnostic".to_string());
        return Err(Error::native_call_failed(message));
    }
    Ok(raw)
}
