//! Telnet 裝置核心函式庫
//!
//! 提供建構 Telnet 裝置客戶端的核心功能：
//! - `device`: 裝置連線生命週期管理、掛鉤與分隔符讀取
//! - `transport`: 底層位元組串流抽象
//! - `access`: 連線的獨佔與共享存取控制

pub mod access;
pub mod device;
pub mod transport;

pub use access::{ConnectionHandle, ExclusiveConnection, GatePass, SharedGate};
pub use device::{DeviceConfig, DeviceError, DeviceHooks, NoopHooks, TelnetDevice};
pub use transport::{TcpTransport, Transport, TransportStream};
