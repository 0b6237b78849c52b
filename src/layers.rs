// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Layer variants and their composition.
//!
//! Only one concrete kernel-backed layer ships here, [`Dropout`], together
//! with the [`Sequential`] container. Every further layer variant follows
//! the identical shape:
//! a config-validating factory, an embedded
//! [`ModuleState`](crate::module::ModuleState), and a `forward` that is
//! nothing but marshal, native call, chokepoint check, wrap.

use crate::error::{Error, Result};
use crate::handle::NativeTensor;
use crate::module::{Module, ModuleState};

/// Free-function forms of the native kernels, shared by module `forward`
/// implementations and callers that do not want module bookkeeping.
pub mod functional {
    use super::{NativeTensor, Result};
    use crate::runtime::NativeRuntime as _;

    /// Dropout: during training, randomly zeroes elements of `input` with
    /// probability `p`.
    ///
    /// The uniform dispatch sequence: marshal the input handle into the
    /// native call, run the result through the chokepoint, wrap it. The
    /// output keeps the input's device and dtype.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when the native kernel signals failure
    /// (for example an out-of-range probability); no wrapper is constructed
    /// then.
    pub fn dropout(input: &NativeTensor, p: f64, train: bool, inplace: bool) -> Result<NativeTensor> {
        let runtime = input.runtime();
        let raw = runtime.dropout(input.raw(), p, train, inplace);
        NativeTensor::wrap(
            std::sync::Arc::clone(runtime),
            raw,
            input.device(),
            input.dtype(),
        )
    }
}

/// Dropout module: randomly zeroes input elements with probability `p`
/// during training; identity in eval mode.
///
/// Owns neither parameters nor buffers, so device/precision transfer on it
/// is the zero-native-call fast path.
#[derive(Debug)]
pub struct Dropout {
    state: ModuleState,
    p: f64,
    inplace: bool,
}

impl Dropout {
    /// Create a dropout module.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `0.0 <= p <= 1.0`.
    pub fn new(p: f64, inplace: bool) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::invalid_config(format!(
                "dropout probability must be within [0, 1], got {p}"
            )));
        }
        Ok(Self {
            state: ModuleState::new("Dropout"),
            p,
            inplace,
        })
    }

    /// The zeroing probability.
    #[must_use]
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Module for Dropout {
    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn forward(&self, input: &NativeTensor) -> Result<NativeTensor> {
        functional::dropout(input, self.p, self.state.is_training(), self.inplace)
    }
}

/// Sequential container: threads the input through its children in
/// registration order.
#[derive(Debug)]
pub struct Sequential {
    state: ModuleState,
}

impl Sequential {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ModuleState::new("Sequential"),
        }
    }

    /// Append a module under an auto-assigned index name (`"0"`, `"1"`, ...).
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the generated name collides with a
    /// manually registered child.
    pub fn push(&mut self, module: Box<dyn Module>) -> Result<()> {
        let name = self.state.children().len().to_string();
        self.state.register_child(name, module)
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.children().len()
    }

    /// Whether the container has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.children().is_empty()
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    /// Forward through each child in order.
    ///
    /// Exclusive handle ownership means an empty container cannot hand back
    /// a duplicate of its input, so forwarding through one is an error.
    fn forward(&self, input: &NativeTensor) -> Result<NativeTensor> {
        let mut children = self.state.children().iter();
        let Some((_, first)) = children.next() else {
            return Err(Error::invalid_config(
                "cannot forward through an empty Sequential",
            ));
        };
        let mut output = first.forward(input)?;
        for (_, child) in children {
            output = child.forward(&output)?;
        }
        Ok(output)
    }
}
