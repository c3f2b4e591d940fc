pub use externs::TestExterns;
pub use factory::{FvmFactory, FvmStateView, TestExecutor};
pub use kernel::TestKernel;
pub use machine::FvmVm;

pub mod externs;
pub mod factory;
pub mod kernel;
pub mod machine;
pub mod manifest;
