//! 型定義

pub mod endpoint;
pub mod probe;
pub mod validation;

pub use endpoint::{EndpointConfig, EndpointState};
pub use probe::{ProbeResult, TestResult};
pub use validation::ValidationVerdict;
