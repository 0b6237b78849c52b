// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! In-process reference implementation of the native boundary.
//!
//! [`StubRuntime`] backs every handle with a plain `f64` buffer in a slab
//! and gives each entry point a call counter, so tests can assert on native
//! traffic (zero transfer calls on a stateless subtree, exactly one release
//! per handle) instead of trusting the managed layer's word for it. It also
//! serves as the implementation template for a real FFI backend: same
//! surface, same sentinel-and-last-error failure convention.
//!
//! Semantics are deliberately minimal and deterministic:
//!
//! - `dropout` copies its input, zeroing every element when `p >= 1.0` and
//!   training is on; intermediate probabilities copy unchanged (no RNG in a
//!   test backend). A fresh handle is always produced, even for `inplace`
//!   requests, preserving exclusive ownership on the managed side.
//! - `to_device` copies storage and re-tags device/dtype.
//! - Out-of-range probabilities and unknown handles fail natively: sentinel
//!   return plus a diagnostic on the last-error channel.
//!
//! Double frees do not abort; they are counted via
//! [`double_free_count`](StubRuntime::double_free_count) so tests can assert
//! none occurred.

use crate::device::Device;
use crate::dtype::bytes_per_element;
use crate::runtime::{NativeRuntime, RawHandle, NULL_HANDLE};
use candle_core::DType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct StubTensor {
    values: Vec<f64>,
    device: Device,
    dtype: DType,
}

/// Call-counting, failure-injectable native runtime over in-process storage.
#[derive(Debug, Default)]
pub struct StubRuntime {
    tensors: Mutex<HashMap<RawHandle, StubTensor>>,
    next_handle: AtomicUsize,
    scalar_calls: AtomicUsize,
    dropout_calls: AtomicUsize,
    transfer_calls: AtomicUsize,
    free_calls: AtomicUsize,
    double_frees: AtomicUsize,
    last_error: Mutex<Option<String>>,
    pending_failure: Mutex<Option<String>>,
}

impl StubRuntime {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty runtime behind an `Arc`, ready to hand to wrappers.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make the next handle-returning entry point fail with `message`.
    pub fn inject_failure(&self, message: impl Into<String>) {
        *self.pending_failure.lock().expect("stub lock") = Some(message.into());
    }

    /// Number of tensors currently allocated.
    #[must_use]
    pub fn live_tensors(&self) -> usize {
        self.tensors.lock().expect("stub lock").len()
    }

    /// Copy of a live tensor's storage, if the handle is valid.
    #[must_use]
    pub fn values(&self, handle: RawHandle) -> Option<Vec<f64>> {
        self.tensors
            .lock()
            .expect("stub lock")
            .get(&handle)
            .map(|t| t.values.clone())
    }

    /// Total `scalar_tensor` invocations.
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.scalar_calls.load(Ordering::SeqCst)
    }

    /// Total `dropout` invocations.
    #[must_use]
    pub fn dropout_count(&self) -> usize {
        self.dropout_calls.load(Ordering::SeqCst)
    }

    /// Total `to_device` invocations.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    /// Total successful `free_tensor` invocations.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_calls.load(Ordering::SeqCst)
    }

    /// Number of `free_tensor` calls that targeted an already-freed or
    /// unknown handle.
    #[must_use]
    pub fn double_free_count(&self) -> usize {
        self.double_frees.load(Ordering::SeqCst)
    }

    fn fail(&self, message: impl Into<String>) -> RawHandle {
        *self.last_error.lock().expect("stub lock") = Some(message.into());
        NULL_HANDLE
    }

    fn take_injected_failure(&self) -> Option<String> {
        self.pending_failure.lock().expect("stub lock").take()
    }

    fn insert(&self, tensor: StubTensor) -> RawHandle {
        // Handles start at 1; 0 is the failure sentinel.
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.tensors
            .lock()
            .expect("stub lock")
            .insert(handle, tensor);
        handle
    }

    fn lookup(&self, handle: RawHandle) -> Option<StubTensor> {
        self.tensors.lock().expect("stub lock").get(&handle).cloned()
    }
}

impl NativeRuntime for StubRuntime {
    fn scalar_tensor(&self, value: f64, device: Device, dtype: DType) -> RawHandle {
        self.scalar_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.take_injected_failure() {
            return self.fail(message);
        }
        tracing::trace!(
            value,
            nbytes = bytes_per_element(dtype),
            "stub: allocating scalar tensor"
        );
        self.insert(StubTensor {
            values: vec![value],
            device,
            dtype,
        })
    }

    fn dropout(&self, input: RawHandle, p: f64, train: bool, _inplace: bool) -> RawHandle {
        self.dropout_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.take_injected_failure() {
            return self.fail(message);
        }
        if !(0.0..=1.0).contains(&p) {
            return self.fail(format!(
                "dropout probability has to be between 0 and 1, but got {p}"
            ));
        }
        let Some(mut tensor) = self.lookup(input) else {
            return self.fail(format!("invalid tensor handle {input}"));
        };
        if train && p >= 1.0 {
            tensor.values.iter_mut().for_each(|v| *v = 0.0);
        }
        self.insert(tensor)
    }

    fn to_device(&self, tensor: RawHandle, device: Device, dtype: DType) -> RawHandle {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.take_injected_failure() {
            return self.fail(message);
        }
        if !self.device_available(device) {
            return self.fail(format!("device {device} is not available"));
        }
        let Some(mut copy) = self.lookup(tensor) else {
            return self.fail(format!("invalid tensor handle {tensor}"));
        };
        copy.device = device;
        copy.dtype = dtype;
        self.insert(copy)
    }

    fn free_tensor(&self, tensor: RawHandle) {
        if self
            .tensors
            .lock()
            .expect("stub lock")
            .remove(&tensor)
            .is_some()
        {
            self.free_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
            tracing::error!(handle = tensor, "stub: free of unknown or freed handle");
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("stub lock").take()
    }

    fn device_available(&self, device: Device) -> bool {
        device == Device::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_start_above_sentinel() {
        let runtime = StubRuntime::new();
        let h = runtime.scalar_tensor(1.0, Device::Cpu, DType::F32);
        assert!(h > NULL_HANDLE);
        assert_eq!(runtime.values(h), Some(vec![1.0]));
    }

    #[test]
    fn test_dropout_zeroes_at_probability_one() {
        let runtime = StubRuntime::new();
        let input = runtime.scalar_tensor(5.0, Device::Cpu, DType::F32);

        let zeroed = runtime.dropout(input, 1.0, true, false);
        assert_eq!(runtime.values(zeroed), Some(vec![0.0]));

        // Eval mode passes values through untouched.
        let kept = runtime.dropout(input, 1.0, false, false);
        assert_eq!(runtime.values(kept), Some(vec![5.0]));
    }

    #[test]
    fn test_dropout_rejects_bad_probability() {
        let runtime = StubRuntime::new();
        let input = runtime.scalar_tensor(1.0, Device::Cpu, DType::F32);

        let out = runtime.dropout(input, 1.5, true, false);
        assert_eq!(out, NULL_HANDLE);
        let message = runtime.last_error().unwrap();
        assert!(message.contains("between 0 and 1"));
        // Channel is drained after a read.
        assert!(runtime.last_error().is_none());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let runtime = StubRuntime::new();
        runtime.inject_failure("out of memory");

        assert_eq!(
            runtime.scalar_tensor(1.0, Device::Cpu, DType::F32),
            NULL_HANDLE
        );
        assert_eq!(runtime.last_error().unwrap(), "out of memory");

        // Subsequent calls succeed again.
        assert_ne!(
            runtime.scalar_tensor(1.0, Device::Cpu, DType::F32),
            NULL_HANDLE
        );
    }

    #[test]
    fn test_double_free_is_counted_not_fatal() {
        let runtime = StubRuntime::new();
        let h = runtime.scalar_tensor(1.0, Device::Cpu, DType::F32);

        runtime.free_tensor(h);
        runtime.free_tensor(h);

        assert_eq!(runtime.free_count(), 1);
        assert_eq!(runtime.double_free_count(), 1);
    }

    #[test]
    fn test_to_device_rejects_unavailable_device() {
        let runtime = StubRuntime::new();
        let h = runtime.scalar_tensor(1.0, Device::Cpu, DType::F32);

        let moved = runtime.to_device(h, Device::Cuda(0), DType::F32);
        assert_eq!(moved, NULL_HANDLE);
        assert!(runtime.last_error().unwrap().contains("not available"));
    }
}
