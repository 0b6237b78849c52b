// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Composable computation modules and the tree operations over them.
//!
//! A [`Module`] is a unit of computation owning named parameters, buffers,
//! and child modules, plus a `training` flag. Concrete layers implement
//! [`Module::forward`] and embed a [`ModuleState`] for the tree bookkeeping;
//! the tree-wide operations (`set_train`, `to`, `parameters`) are provided
//! methods that work uniformly over any implementation, trait objects
//! included.
//!
//! ## Traversal Order
//!
//! Transfer and mode propagation visit every node exactly once in pre-order:
//! a module's own tensors are handled before its children, children in
//! registration order. The same order applies uniformly to `set_train`,
//! `to`, `parameters`, and `buffers`.
//!
//! ## Threading
//!
//! A module tree is a single-threaded structure: `set_train` and `to` mutate
//! parameter/buffer collections without internal locking. Callers that share
//! a tree across threads must serialize access externally; this matches the
//! one-thread-per-model usage pattern of the domain.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::handle::NativeTensor;
use candle_core::DType;
use std::fmt;

/// Tree bookkeeping embedded in every concrete module.
///
/// Parameters, buffers, and children are ordered mappings: registration
/// order is preserved and names are unique per kind within one module.
/// Sibling modules may share a display name; only registration keys are
/// uniqueness-checked.
#[derive(Debug)]
pub struct ModuleState {
    name: String,
    training: bool,
    parameters: Vec<(String, NativeTensor)>,
    buffers: Vec<(String, NativeTensor)>,
    children: Vec<(String, Box<dyn Module>)>,
}

impl ModuleState {
    /// Create empty state for a module with the given display name.
    ///
    /// Modules start in training mode, matching the native runtime's
    /// convention.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            training: true,
            parameters: Vec::new(),
            buffers: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The module's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current training mode.
    #[must_use]
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Register a named parameter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a parameter with this name already
    /// exists on this module.
    pub fn register_parameter(
        &mut self,
        name: impl Into<String>,
        tensor: NativeTensor,
    ) -> Result<()> {
        let name = name.into();
        if self.parameters.iter().any(|(n, _)| *n == name) {
            return Err(Error::invalid_config(format!(
                "duplicate parameter \"{name}\" on module \"{}\"",
                self.name
            )));
        }
        self.parameters.push((name, tensor));
        Ok(())
    }

    /// Register a named buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a buffer with this name already exists
    /// on this module.
    pub fn register_buffer(&mut self, name: impl Into<String>, tensor: NativeTensor) -> Result<()> {
        let name = name.into();
        if self.buffers.iter().any(|(n, _)| *n == name) {
            return Err(Error::invalid_config(format!(
                "duplicate buffer \"{name}\" on module \"{}\"",
                self.name
            )));
        }
        self.buffers.push((name, tensor));
        Ok(())
    }

    /// Register a named child module.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a child with this name already exists
    /// on this module.
    pub fn register_child(
        &mut self,
        name: impl Into<String>,
        child: Box<dyn Module>,
    ) -> Result<()> {
        let name = name.into();
        if self.children.iter().any(|(n, _)| *n == name) {
            return Err(Error::invalid_config(format!(
                "duplicate child \"{name}\" on module \"{}\"",
                self.name
            )));
        }
        self.children.push((name, child));
        Ok(())
    }

    /// Immutable view of the registered children.
    #[must_use]
    pub fn children(&self) -> &[(String, Box<dyn Module>)] {
        &self.children
    }

    /// Whether this subtree owns any parameters or buffers.
    ///
    /// A subtree owning neither is a pure transform: device/precision
    /// transfer on it must issue zero native calls.
    #[must_use]
    pub fn has_native_state(&self) -> bool {
        !self.parameters.is_empty()
            || !self.buffers.is_empty()
            || self
                .children
                .iter()
                .any(|(_, child)| child.state().has_native_state())
    }

    /// Set training mode on this node and every descendant, unconditionally.
    pub fn set_train(&mut self, mode: bool) {
        self.training = mode;
        for (_, child) in &mut self.children {
            child.state_mut().set_train(mode);
        }
    }

    /// Move owned tensors to `device`/`dtype`, pre-order, in place.
    ///
    /// The pure-transform fast path returns before issuing any native call.
    /// Each moved tensor's old wrapper is dropped as the new one is swapped
    /// in, performing the single release of the old handle. Tensors already
    /// on the target device and dtype are skipped entirely.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when a native move fails; tensors moved
    /// before the failure keep their new placement.
    pub fn transfer(&mut self, device: Device, dtype: DType) -> Result<()> {
        if !self.has_native_state() {
            tracing::trace!(module = %self.name, "transfer skipped: pure transform");
            return Ok(());
        }

        for (name, tensor) in self.parameters.iter_mut().chain(self.buffers.iter_mut()) {
            if tensor.device() == device && tensor.dtype() == dtype {
                continue;
            }
            tracing::debug!(
                module = %self.name,
                tensor = %name,
                target = %device,
                dtype = crate::dtype::DTypeExt::name(&dtype),
                "moving tensor"
            );
            *tensor = tensor.to(device, dtype)?;
        }

        for (_, child) in &mut self.children {
            child.state_mut().transfer(device, dtype)?;
        }
        Ok(())
    }

    /// Lazily enumerate this subtree's parameters, depth-first.
    #[must_use]
    pub fn parameters(&self) -> Tensors<'_> {
        Tensors::new(self, SlotKind::Parameter)
    }

    /// Lazily enumerate this subtree's buffers, depth-first.
    #[must_use]
    pub fn buffers(&self) -> Tensors<'_> {
        Tensors::new(self, SlotKind::Buffer)
    }
}

/// A composable unit of computation.
///
/// Implementors embed a [`ModuleState`] and define the forward pass; the
/// tree-wide operations come for free and behave identically for every
/// layer variant.
pub trait Module: fmt::Debug + Send {
    /// The embedded tree state.
    fn state(&self) -> &ModuleState;

    /// The embedded tree state, mutably.
    fn state_mut(&mut self) -> &mut ModuleState;

    /// Run the forward pass.
    ///
    /// Implementations marshal the input's handle into a native call, pass
    /// the result through the dispatch chokepoint, and wrap it. They read
    /// but never mutate shared state beyond consuming/producing handles.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when the native kernel signals failure.
    fn forward(&self, input: &NativeTensor) -> Result<NativeTensor>;

    /// The module's display name.
    fn name(&self) -> &str {
        self.state().name()
    }

    /// Current training mode.
    fn is_training(&self) -> bool {
        self.state().is_training()
    }

    /// Set training mode on this module and its whole subtree.
    fn set_train(&mut self, mode: bool) {
        self.state_mut().set_train(mode);
    }

    /// Switch the subtree to training mode.
    fn train(&mut self) {
        self.set_train(true);
    }

    /// Switch the subtree to evaluation mode.
    fn eval(&mut self) {
        self.set_train(false);
    }

    /// Move the subtree's parameters and buffers to `device`/`dtype`,
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns `NativeCallFailed` when a native move fails.
    fn to(&mut self, device: Device, dtype: DType) -> Result<()> {
        self.state_mut().transfer(device, dtype)
    }

    /// Lazily enumerate the subtree's parameters, depth-first. Restartable:
    /// each call yields a fresh iterator over the same sequence.
    fn parameters(&self) -> Tensors<'_> {
        self.state().parameters()
    }

    /// Lazily enumerate the subtree's buffers, depth-first.
    fn buffers(&self) -> Tensors<'_> {
        self.state().buffers()
    }

    /// Whether the subtree owns any parameters or buffers.
    fn has_native_state(&self) -> bool {
        self.state().has_native_state()
    }
}

/// Which tensor slot a [`Tensors`] iterator walks.
#[derive(Debug, Clone, Copy)]
enum SlotKind {
    Parameter,
    Buffer,
}

/// Lazy depth-first iterator over a subtree's parameters or buffers.
///
/// Yields this module's entries first, then each child's subtree in
/// registration order. Holds only shared borrows, so any number of
/// traversals can run over an unmodified tree.
pub struct Tensors<'a> {
    kind: SlotKind,
    stack: Vec<Frame<'a>>,
}

struct Frame<'a> {
    tensors: std::slice::Iter<'a, (String, NativeTensor)>,
    children: std::slice::Iter<'a, (String, Box<dyn Module>)>,
}

impl<'a> Tensors<'a> {
    fn new(root: &'a ModuleState, kind: SlotKind) -> Self {
        Self {
            kind,
            stack: vec![Frame::of(root, kind)],
        }
    }
}

impl<'a> Frame<'a> {
    fn of(state: &'a ModuleState, kind: SlotKind) -> Self {
        let tensors = match kind {
            SlotKind::Parameter => state.parameters.iter(),
            SlotKind::Buffer => state.buffers.iter(),
        };
        Self {
            tensors,
            children: state.children.iter(),
        }
    }
}

impl<'a> Iterator for Tensors<'a> {
    type Item = &'a NativeTensor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some((_, tensor)) = frame.tensors.next() {
                return Some(tensor);
            }
            if let Some((_, child)) = frame.children.next() {
                let next = Frame::of(child.state(), self.kind);
                self.stack.push(next);
                continue;
            }
            self.stack.pop();
        }
    }
}

impl fmt::Debug for Tensors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensors")
            .field("kind", &self.kind)
            .field("depth", &self.stack.len())
            .finish()
    }
}
