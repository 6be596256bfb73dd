// core.rs splits responsibilities into submodules for easier maintenance.
pub mod block;
pub mod validation;

pub use block::*;
pub use validation::*;
