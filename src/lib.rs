// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! # nn-interop
//!
//! Native-resource ownership and module-composition core for exposing a
//! torch-style native tensor runtime to safe Rust: opaque handle ownership,
//! a composable module tree with device/precision transfer and training-mode
//! propagation, the uniform native-dispatch protocol, and a checkpoint
//! download utility with SHA-256 verification.
//!
//! ## Design Philosophy
//!
//! **Check every handle**: native failures are signaled by a null sentinel,
//! not an exception. Every native call site runs its result through one
//! chokepoint before a wrapper exists, so the sentinel can never masquerade
//! as a live resource.
//!
//! **Own exactly once**: a [`NativeTensor`] is the sole owner of its handle.
//! It is move-only, released deterministically on drop, and double-release
//! proof.
//!
//! ## Modules
//!
//! - [`runtime`] - The native call boundary and dispatch chokepoint
//! - [`handle`] - Exclusive ownership of native tensor handles
//! - [`module`] - Module trait, tree state, transfer and mode propagation
//! - [`layers`] - Dropout (the representative transform) and Sequential
//! - [`device`] - Device model and CUDA-first selection
//! - [`dtype`] - Element-type utilities over `candle_core::DType`
//! - [`hub`] - Checkpoint download with integrity verification
//! - [`stub`] - In-process reference runtime for tests and as an FFI template
//! - [`error`] - Unified error types
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use nn_interop::{Device, Dropout, Module, NativeTensor, StubRuntime};
//! use candle_core::DType;
//!
//! fn main() -> nn_interop::Result<()> {
//!     let runtime = StubRuntime::shared();
//!
//!     let mut layer = Dropout::new(1.0, false)?;
//!     let input = NativeTensor::scalar(runtime, 1.0, Device::Cpu, DType::F32)?;
//!
//!     // Training mode: p = 1.0 zeroes the input.
//!     let output = layer.forward(&input)?;
//!     assert_ne!(input.raw(), output.raw());
//!
//!     // Eval mode: identity.
//!     layer.eval();
//!     let _kept = layer.forward(&input)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! A module tree is single-threaded by design: no internal locking, matching
//! the one-thread-per-model usage pattern. The download utility is the sole
//! concurrent operation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod device;
pub mod dtype;
pub mod error;
pub mod handle;
pub mod hub;
pub mod layers;
pub mod logging;
pub mod module;
pub mod runtime;
pub mod stub;

// Re-exports for convenience
pub use device::{select_device, warn_if_cpu, Device, DeviceConfig};
pub use dtype::{bytes_per_element, is_floating_point, DTypeExt};
pub use error::{Error, Result};
pub use handle::NativeTensor;
pub use hub::{download_url_to_file, download_url_to_file_async, file_sha256};
pub use layers::{functional, Dropout, Sequential};
pub use logging::{init_logging, LogConfig};
pub use module::{Module, ModuleState, Tensors};
pub use runtime::{check_returned_handle, NativeRuntime, RawHandle, NULL_HANDLE};
pub use stub::StubRuntime;
