// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Exclusive ownership of native tensor handles.
//!
//! ## Why This Module Exists
//!
//! The native runtime is not garbage collected: every handle it hands out
//! must be released exactly once, and a handle must never be used after
//! release. A leak or premature release corrupts results or crashes the
//! process far from the call site that caused it. [`NativeTensor`] makes the
//! compiler enforce the ownership rules:
//!
//! - exactly one wrapper owns a given handle (no `Clone`, move-only),
//! - release happens deterministically on drop,
//! - explicit [`release`](NativeTensor::release) is idempotence-guarded, so
//!   even a release followed by drop frees the native storage once.
//!
//! Wrapping happens the instant a handle is obtained: [`NativeTensor::wrap`]
//! runs the returned handle through the dispatch chokepoint, so the null
//! sentinel can never become a live wrapper.

use crate::device::Device;
use crate::error::Result;
use crate::runtime::{check_returned_handle, NativeRuntime, RawHandle, NULL_HANDLE};
use candle_core::DType;
use std::fmt;
use std::sync::Arc;

/// Sole owner of one native tensor handle.
///
/// Carries the device/dtype the tensor lives on, and the runtime that
/// allocated it (used for release and for further native calls on the
/// tensor).
pub struct NativeTensor {
    raw: RawHandle,
    device: Device,
    dtype: DType,
    runtime: Arc<dyn NativeRuntime>,
}

impl NativeTensor {
    /// Wrap a handle freshly returned by a native entry point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NativeCallFailed`](crate::error::Error) when `raw` is
    /// the null sentinel; no wrapper is constructed in that case.
    pub fn wrap(
        runtime: Arc<dyn NativeRuntime>,
        raw: RawHandle,
        device: Device,
        dtype: DType,
    ) -> Result<Self> {
        let raw = check_returned_handle(runtime.as_ref(), raw)?;
        Ok(Self {
            raw,
            device,
            dtype,
            runtime,
        })
    }

    /// Allocate a one-element tensor on the runtime and wrap it.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when the native allocation fails.
    pub fn scalar(
        runtime: Arc<dyn NativeRuntime>,
        value: f64,
        device: Device,
        dtype: DType,
    ) -> Result<Self> {
        let raw = runtime.scalar_tensor(value, device, dtype);
        Self::wrap(runtime, raw, device, dtype)
    }

    /// The owned handle, for marshaling into native calls.
    ///
    /// The returned value must not outlive `self` and must never be passed
    /// to a releasing entry point; release goes through this wrapper.
    #[must_use]
    pub fn raw(&self) -> RawHandle {
        debug_assert_ne!(self.raw, NULL_HANDLE, "use of released tensor handle");
        self.raw
    }

    /// The device this tensor lives on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// The element type of this tensor.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The runtime that owns this tensor's storage.
    #[must_use]
    pub fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }

    /// Move/convert this tensor to `device`/`dtype`, producing a new tensor.
    ///
    /// The source tensor stays live; the caller decides whether to replace it
    /// (module transfer swaps the new wrapper in and lets the old one drop).
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when the native move fails.
    pub fn to(&self, device: Device, dtype: DType) -> Result<Self> {
        let raw = self.runtime.to_device(self.raw(), device, dtype);
        Self::wrap(Arc::clone(&self.runtime), raw, device, dtype)
    }

    /// Release the native storage now.
    ///
    /// Safe to call any number of times; only the first call reaches the
    /// runtime. Drop performs the same release if it has not happened yet.
    pub fn release(&mut self) {
        if self.raw != NULL_HANDLE {
            self.runtime.free_tensor(self.raw);
            self.raw = NULL_HANDLE;
        }
    }

    /// Whether the native storage has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.raw == NULL_HANDLE
    }
}

impl Drop for NativeTensor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NativeTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeTensor")
            .field("raw", &self.raw)
            .field("device", &self.device)
            .field("dtype", &self.dtype)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubRuntime;

    fn scalar(runtime: &Arc<StubRuntime>, value: f64) -> NativeTensor {
        NativeTensor::scalar(
            Arc::clone(runtime) as Arc<dyn NativeRuntime>,
            value,
            Device::Cpu,
            DType::F32,
        )
        .expect("stub allocation")
    }

    #[test]
    fn test_wrap_rejects_sentinel() {
        let runtime = StubRuntime::shared();
        runtime.inject_failure("allocation failed");

        let result = NativeTensor::scalar(
            Arc::clone(&runtime) as Arc<dyn NativeRuntime>,
            1.0,
            Device::Cpu,
            DType::F32,
        );
        assert!(result.is_err());
        // Nothing was allocated, so nothing may leak or be freed.
        assert_eq!(runtime.live_tensors(), 0);
        assert_eq!(runtime.free_count(), 0);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let runtime = StubRuntime::shared();
        {
            let _t = scalar(&runtime, 3.5);
            assert_eq!(runtime.live_tensors(), 1);
        }
        assert_eq!(runtime.live_tensors(), 0);
        assert_eq!(runtime.free_count(), 1);
        assert_eq!(runtime.double_free_count(), 0);
    }

    #[test]
    fn test_explicit_release_is_idempotent() {
        let runtime = StubRuntime::shared();
        let mut t = scalar(&runtime, 1.0);

        t.release();
        assert!(t.is_released());
        t.release();
        t.release();
        drop(t);

        assert_eq!(runtime.free_count(), 1);
        assert_eq!(runtime.double_free_count(), 0);
    }

    #[test]
    fn test_to_produces_new_handle() {
        let runtime = StubRuntime::shared();
        let t = scalar(&runtime, 2.0);
        let moved = t.to(Device::Cpu, DType::F64).expect("move");

        assert_ne!(t.raw(), moved.raw());
        assert_eq!(moved.dtype(), DType::F64);
        assert_eq!(runtime.live_tensors(), 2);

        drop(t);
        drop(moved);
        assert_eq!(runtime.live_tensors(), 0);
    }
}
