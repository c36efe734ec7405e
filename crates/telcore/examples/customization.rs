//! 自訂掛鉤：在連線建立後與斷線前插入自己的邏輯

use async_trait::async_trait;
use telcore::{DeviceError, DeviceHooks, TelnetDevice};

struct AnnouncingHooks;

#[async_trait]
impl DeviceHooks for AnnouncingHooks {
    async fn after_connect(&mut self, _device: &mut TelnetDevice) -> Result<(), DeviceError> {
        println!("After connect logic");
        Ok(())
    }

    async fn before_disconnect(&mut self, _device: &mut TelnetDevice) -> Result<(), DeviceError> {
        println!("Before disconnect logic");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), DeviceError> {
    let mut device = TelnetDevice::new("10.211.0.91", 23);
    device.set_hooks(Box::new(AnnouncingHooks));

    device.connect().await?;
    println!("Connected!");

    device.disconnect().await?;
    println!("Disconnected");

    Ok(())
}
