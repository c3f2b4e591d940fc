//! Drives the Filecoin VM through test vectors.
//! * The api package holds the driver, which applies one message to a prior state and returns
//!   the receipt and the new state root. It talks to a VM only through a factory trait, so
//!   it can run against the real FVM or a recording fake.
//! * The vm package implements the factory over the real FVM, with fake signature verification
//!   and a patched actor manifest for the chaos actor.
//! * This package reads message-class vectors and replays them through the driver.

pub use fvm_tvx_api as api;
pub use fvm_tvx_vm as vm;

pub use runner::{run_vector, VectorError, VectorRun};
pub use vector::MessageVector;

use fvm_tvx_api::{ActorOverride, Driver, NETWORK_VERSION};
use fvm_tvx_vm::FvmFactory;

pub mod runner;
pub mod vector;

/// Creates a driver over the real FVM at the fixed network version.
pub fn fvm_driver(chaos: ActorOverride) -> anyhow::Result<Driver<FvmFactory>> {
    Ok(Driver::new(FvmFactory::new(NETWORK_VERSION)?, chaos))
}
