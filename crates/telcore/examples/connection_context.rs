//! 獨佔連線範圍：三個併發操作輪流獨佔同一台裝置
//!
//! 每個操作都拿到一條專屬的新連線，操作結束連線就收回，
//! 下一個等待者才會開始連線

use std::sync::Arc;
use std::time::Duration;

use telcore::{DeviceError, ExclusiveConnection, TelnetDevice};
use tokio::sync::Mutex;

async fn run_command(
    exclusive: ExclusiveConnection,
    command: &'static str,
) -> Result<(), DeviceError> {
    exclusive
        .run(|device| {
            Box::pin(async move {
                println!("Running command {}", command);
                device.send_line(command).await?;
                // 模擬需要一段時間的回應
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), DeviceError> {
    let device = Arc::new(Mutex::new(TelnetDevice::new("10.211.0.91", 23)));
    let exclusive = ExclusiveConnection::new(device);

    let (a, b, c) = tokio::join!(
        run_command(exclusive.clone(), "foo"),
        run_command(exclusive.clone(), "bar"),
        run_command(exclusive.clone(), "baz"),
    );
    a?;
    b?;
    c?;

    Ok(())
}
