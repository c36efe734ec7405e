//! 裝置生命週期掛鉤
//!
//! 在連線建立後與斷線前的固定時點被呼叫，預設什麼都不做；
//! 具體裝置以此實作協定交握或斷線前的收尾

use async_trait::async_trait;

use super::manager::{DeviceError, TelnetDevice};

/// 生命週期掛鉤
///
/// 掛鉤內可以使用裝置的讀寫方法（此時串流已開啟）；
/// 掛鉤失敗會讓外層的連線或斷線操作跟著失敗
#[async_trait]
pub trait DeviceHooks: Send {
    /// 串流開啟成功後、裝置標記為已連線前呼叫
    async fn after_connect(&mut self, _device: &mut TelnetDevice) -> Result<(), DeviceError> {
        Ok(())
    }

    /// 嘗試關閉串流之前呼叫
    async fn before_disconnect(&mut self, _device: &mut TelnetDevice) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// 什麼都不做的預設掛鉤
pub struct NoopHooks;

#[async_trait]
impl DeviceHooks for NoopHooks {}
