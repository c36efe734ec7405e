//! 傳輸層抽象模組
//!
//! 將底層位元組串流的建立抽象化，讓測試可以用記憶體中的串流取代 TCP

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::device::DeviceError;

/// 可讀寫的雙向位元組串流
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TransportStream for T {}

/// 傳輸層，負責開啟到遠端端點的串流
#[async_trait]
pub trait Transport: Send + Sync {
    /// 開啟到 (host, port) 的連線
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn TransportStream>, DeviceError>;
}

/// TCP 傳輸
#[derive(Debug, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn TransportStream>, DeviceError> {
        // 解析主機名稱
        let addr = format!("{}:{}", host, port);
        let socket_addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| DeviceError::DnsResolutionFailed(e.to_string()))?
            .collect();

        if socket_addrs.is_empty() {
            return Err(DeviceError::DnsResolutionFailed(format!(
                "無法解析主機: {}",
                host
            )));
        }

        debug!("已解析到位址: {:?}", socket_addrs);

        let stream = TcpStream::connect(&socket_addrs[0]).await?;
        stream.set_nodelay(true)?;

        Ok(Box::new(stream))
    }
}
