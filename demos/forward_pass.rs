//! Example: Forward Dispatch And Ownership
//!
//! Builds a small module tree over the in-process stub runtime, runs a
//! forward pass in training and eval mode, and shows that every native
//! handle is released exactly once.
//!
//! Run with:
//! ```bash
//! cargo run --example forward_pass
//! ```

use candle_core::DType;
use nn_interop::{
    init_logging, Device, Dropout, LogConfig, Module, NativeRuntime, NativeTensor, Result,
    Sequential, StubRuntime,
};
use std::sync::Arc;

fn main() -> Result<()> {
    init_logging(&LogConfig::development());

    let runtime = StubRuntime::shared();

    let mut model = Sequential::new();
    model.push(Box::new(Dropout::new(1.0, false)?))?;
    model.push(Box::new(Dropout::new(0.0, false)?))?;

    let input = NativeTensor::scalar(
        Arc::clone(&runtime) as Arc<dyn NativeRuntime>,
        42.0,
        Device::Cpu,
        DType::F32,
    )?;
    println!("input: {input:?}");

    // Training mode: the p = 1.0 stage zeroes everything.
    let output = model.forward(&input)?;
    println!(
        "training output values: {:?}",
        runtime.values(output.raw())
    );
    drop(output);

    // Eval mode: dropout is the identity.
    model.eval();
    let output = model.forward(&input)?;
    println!("eval output values: {:?}", runtime.values(output.raw()));
    drop(output);
    drop(input);

    // A stateless tree transfers for free.
    model.to(Device::Cpu, DType::F16)?;
    println!(
        "native transfer calls: {} (pure transform fast path)",
        runtime.transfer_count()
    );

    println!(
        "frees: {}, double frees: {}, still live: {}",
        runtime.free_count(),
        runtime.double_free_count(),
        runtime.live_tensors()
    );
    Ok(())
}
