//! 共通型定義

pub mod error;

pub use error::{MonitorError, StoreError};
