//! 共用連線閘門：多個操作以有限的併發數共用一條已開啟的連線
//!
//! 和獨佔範圍不同，這裡整段過程只連線一次，
//! 閘門只負責限制同時進行的操作數量

use std::sync::Arc;
use std::time::Duration;

use telcore::{DeviceError, SharedGate, TelnetDevice};
use tokio::sync::Mutex;

async fn run_command(
    device: Arc<Mutex<TelnetDevice>>,
    gate: Arc<SharedGate>,
    command: &'static str,
) -> Result<(), DeviceError> {
    let _pass = gate.enter().await;
    println!("Running command {}", command);

    device.lock().await.send_line(command).await?;
    // 模擬需要一段時間的回應
    tokio::time::sleep(Duration::from_secs(1)).await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), DeviceError> {
    let device = Arc::new(Mutex::new(TelnetDevice::new("10.211.0.91", 23)));
    device.lock().await.connect().await?;

    let gate = Arc::new(SharedGate::new(2));
    let (a, b, c) = tokio::join!(
        run_command(device.clone(), gate.clone(), "foo"),
        run_command(device.clone(), gate.clone(), "bar"),
        run_command(device.clone(), gate.clone(), "baz"),
    );
    a?;
    b?;
    c?;

    let result = device.lock().await.disconnect().await;
    result
}
