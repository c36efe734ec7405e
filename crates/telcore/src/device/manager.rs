//! Telnet 裝置連線管理
//!
//! 非同步連線生命週期：連線、斷線、重連，以及分隔符讀取

use std::io;
use std::mem;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info};

use super::hooks::{DeviceHooks, NoopHooks};
use crate::transport::{TcpTransport, Transport, TransportStream};

/// 裝置連線錯誤
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("連線失敗: {0}")]
    ConnectionFailed(#[from] io::Error),

    #[error("連線逾時")]
    Timeout,

    #[error("未連線")]
    NotConnected,

    #[error("DNS 解析失敗: {0}")]
    DnsResolutionFailed(String),

    #[error("掛鉤執行失敗: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Telnet 裝置配置
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// 連線逾時
    pub connect_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Telnet 裝置連線管理器
///
/// 擁有到裝置的實體連線並管理其生命週期。`host` 與 `port` 在建構時
/// 決定，之後每次 `connect` 都開啟一條新串流、每次 `disconnect` 收回；
/// 管理器本身跨越多次連線循環持續存在。
///
/// 只有在串流開啟成功且 `after_connect` 掛鉤完成後才視為已連線。
pub struct TelnetDevice {
    host: String,
    port: u16,
    config: DeviceConfig,
    transport: Box<dyn Transport>,
    hooks: Box<dyn DeviceHooks>,
    stream: Option<Box<dyn TransportStream>>,
    connected: bool,
}

impl TelnetDevice {
    /// 創建新的裝置管理器（預設使用 TCP 傳輸與無動作掛鉤）
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            config: DeviceConfig::default(),
            transport: Box::new(TcpTransport),
            hooks: Box::new(NoopHooks),
            stream: None,
            connected: false,
        }
    }

    /// 設置配置
    pub fn set_config(&mut self, config: DeviceConfig) {
        self.config = config;
    }

    /// 設置傳輸層
    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
    }

    /// 設置生命週期掛鉤
    pub fn set_hooks(&mut self, hooks: Box<dyn DeviceHooks>) {
        self.hooks = hooks;
    }

    /// 是否已連線
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 連線到裝置
    ///
    /// 開啟串流後會先執行 `after_connect` 掛鉤，掛鉤完成才標記為已連線。
    /// 掛鉤失敗視同連線失敗：剛開啟的串流會被關閉，錯誤往外傳。
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        info!("正在連線到 {}:{}", self.host, self.port);

        let stream = timeout(
            self.config.connect_timeout,
            self.transport.open(&self.host, self.port),
        )
        .await
        .map_err(|_| DeviceError::Timeout)??;

        self.stream = Some(stream);

        let mut hooks = mem::replace(&mut self.hooks, Box::new(NoopHooks));
        let hooked = hooks.after_connect(self).await;
        self.hooks = hooks;

        if let Err(e) = hooked {
            if let Some(mut stream) = self.stream.take() {
                let _ = stream.shutdown().await;
            }
            return Err(e);
        }

        self.connected = true;
        info!("已連線到 {}:{}", self.host, self.port);

        Ok(())
    }

    /// 斷開連線
    ///
    /// 先執行 `before_disconnect` 掛鉤（掛鉤的錯誤會往外傳），
    /// 之後無論關閉是否成功都視為已斷線。
    /// 在沒有開啟串流時呼叫也不會出錯。
    pub async fn disconnect(&mut self) -> Result<(), DeviceError> {
        let mut hooks = mem::replace(&mut self.hooks, Box::new(NoopHooks));
        let hooked = hooks.before_disconnect(self).await;
        self.hooks = hooks;
        hooked?;

        self.connected = false;

        if let Some(mut stream) = self.stream.take() {
            // 對方可能已經先掛斷，關閉失敗直接忽略
            let _ = stream.shutdown().await;
        }

        info!("已斷開連線");
        Ok(())
    }

    /// 重新連線（先斷線再連線）
    pub async fn reconnect(&mut self) -> Result<(), DeviceError> {
        self.disconnect().await?;
        self.connect().await
    }

    /// 逐位元組讀取，直到累積內容以指定片語結尾
    ///
    /// 回傳包含片語在內的完整累積內容；
    /// 若串流在片語出現前就結束則回傳 `None`
    pub async fn read_until(&mut self, phrase: &str) -> Result<Option<String>, DeviceError> {
        let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;

        let needle = phrase.as_bytes();
        let mut buf = BytesMut::new();
        let mut byte = [0u8; 1];

        loop {
            let n = stream.read(&mut byte).await?;
            if n == 0 {
                // 串流提前結束，片語沒有出現
                return Ok(None);
            }
            buf.put_u8(byte[0]);

            if buf.ends_with(needle) {
                return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
            }
        }
    }

    /// 發送一行文字（自動附加 CRLF）
    pub async fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;

        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");

        stream.write_all(&data).await?;
        stream.flush().await?;

        debug!("已發送: {}", line);
        Ok(())
    }

    /// 發送原始位元組
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// 立刻丟棄串流並標記為未連線，不執行掛鉤
    ///
    /// 供無法等待非同步斷線的清理路徑使用（例如被取消的獨佔區塊）
    pub(crate) fn abort(&mut self) {
        self.connected = false;
        self.stream = None;
    }
}
