//! 裝置連線模組
//!
//! 實作裝置連線生命週期管理與生命週期掛鉤

mod hooks;
mod manager;

pub use hooks::{DeviceHooks, NoopHooks};
pub use manager::{DeviceConfig, DeviceError, TelnetDevice};
