// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Device model and CUDA-first device selection.
//!
//! The native runtime addresses devices by kind and ordinal, so the crate
//! carries its own [`Device`] value type rather than borrowing one from a
//! compute framework. Selection logic is CUDA-first: GPU is preferred, and
//! falling back to CPU emits a one-time warning so users notice when they are
//! not getting native acceleration.
//!
//! ## Environment Variables
//!
//! - `NN_INTEROP_FORCE_CPU` - Set to `1` or `true` to force CPU execution
//! - `NN_INTEROP_CUDA_DEVICE` - Set to a device ordinal (e.g. `0`, `1`)
//!
//! ## Example
//!
//! ```rust
//! use nn_interop::{select_device, Device, DeviceConfig, StubRuntime};
//!
//! let runtime = StubRuntime::new();
//! let config = DeviceConfig::new().with_force_cpu(true);
//! let device = select_device(&config, &runtime);
//! assert_eq!(device, Device::Cpu);
//! ```

use crate::runtime::NativeRuntime;
use std::fmt;
use std::str::FromStr;
use std::sync::Once;

/// A compute device as addressed by the native runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host CPU.
    #[default]
    Cpu,
    /// CUDA device at the given ordinal.
    Cuda(usize),
}

impl Device {
    /// Whether this device is a CUDA device.
    #[must_use]
    pub fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = crate::error::Error;

    /// Parse `"cpu"`, `"cuda"` (ordinal 0), or `"cuda:N"`.
    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(0)),
            other => {
                if let Some(ordinal) = other.strip_prefix("cuda:") {
                    let ordinal = ordinal.parse::<usize>().map_err(|_| {
                        crate::error::Error::invalid_config(format!(
                            "invalid CUDA ordinal in device string \"{other}\""
                        ))
                    })?;
                    Ok(Self::Cuda(ordinal))
                } else {
                    Err(crate::error::Error::invalid_config(format!(
                        "unrecognized device string \"{other}\" (expected \"cpu\" or \"cuda[:N]\")"
                    )))
                }
            }
        }
    }
}

/// Configuration for device selection.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Preferred CUDA device ordinal.
    pub cuda_device: usize,
    /// Force CPU execution (disables GPU).
    pub force_cpu: bool,
    /// Caller name used in fallback warnings.
    pub caller: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            cuda_device: 0,
            force_cpu: false,
            caller: None,
        }
    }
}

impl DeviceConfig {
    /// Create a new device configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred CUDA device ordinal.
    #[must_use]
    pub fn with_cuda_device(mut self, ordinal: usize) -> Self {
        self.cuda_device = ordinal;
        self
    }

    /// Force CPU execution.
    #[must_use]
    pub fn with_force_cpu(mut self, force: bool) -> Self {
        self.force_cpu = force;
        self
    }

    /// Set the caller name used in warnings.
    #[must_use]
    pub fn with_caller(mut self, name: impl Into<String>) -> Self {
        self.caller = Some(name.into());
        self
    }

    /// Build configuration from environment variables.
    ///
    /// Reads `NN_INTEROP_FORCE_CPU` and `NN_INTEROP_CUDA_DEVICE`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("NN_INTEROP_FORCE_CPU") {
            if val == "1" || val.to_lowercase() == "true" {
                config.force_cpu = true;
            }
        }

        if let Ok(val) = std::env::var("NN_INTEROP_CUDA_DEVICE") {
            if let Ok(ordinal) = val.parse::<usize>() {
                config.cuda_device = ordinal;
            }
        }

        config
    }
}

/// Select a device according to configuration, preferring CUDA.
///
/// 1. If `force_cpu` is set, returns [`Device::Cpu`] with a warning.
/// 2. Otherwise asks the runtime whether the configured CUDA ordinal is
///    available and uses it.
/// 3. Falls back to CPU with a one-time warning when it is not.
pub fn select_device(config: &DeviceConfig, runtime: &dyn NativeRuntime) -> Device {
    let caller = config.caller.as_deref().unwrap_or("nn-interop");

    if config.force_cpu {
        tracing::warn!(
            "{caller}: CPU device forced via configuration; \
             native acceleration is disabled"
        );
        return Device::Cpu;
    }

    let cuda = Device::Cuda(config.cuda_device);
    if runtime.device_available(cuda) {
        tracing::info!("{caller}: using {cuda} for native execution");
        cuda
    } else {
        warn_if_cpu(Device::Cpu, caller);
        Device::Cpu
    }
}

/// Emit a one-time warning if running on CPU.
///
/// Call this when entering native-dispatch paths so users are reminded that
/// CUDA is preferred. The warning fires only once per process to avoid log
/// spam.
pub fn warn_if_cpu(device: Device, caller: &str) {
    static WARN_ONCE: Once = Once::new();

    if device == Device::Cpu {
        WARN_ONCE.call_once(|| {
            tracing::warn!(
                "{caller}: CPU device in use. CUDA is the intended default; \
                 CPU mode exists only as a compatibility fallback. \
                 Set NN_INTEROP_FORCE_CPU=1 to silence this warning."
            );
        });
    }
}
