//! 基本用法：連線到裝置後立刻斷線

use telcore::{DeviceError, TelnetDevice};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), DeviceError> {
    // 初始化日誌
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut device = TelnetDevice::new("10.211.0.91", 23);

    device.connect().await?;
    println!("Connected!");

    device.disconnect().await?;
    println!("Disconnected");

    Ok(())
}
