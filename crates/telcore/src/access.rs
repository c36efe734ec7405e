//! 連線存取控制模組
//!
//! 提供兩種互不混用的策略：
//! - `ExclusiveConnection`: 一次只讓一個呼叫者獨佔一條新建立的連線，
//!   進入時自動連線、離開時自動斷線
//! - `SharedGate`: 讓多個呼叫者以有限的併發數共用一條已開啟的連線，
//!   不驅動連線與斷線

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::device::{DeviceError, TelnetDevice};

/// 獨佔連線存取
///
/// 包裝（不擁有）一台裝置，保證同一時間只有一個呼叫者在
/// 「連線、操作、斷線」的區間內。等待者依先來後到的順序取得連線。
///
/// 不應該用於長時間操作，否則其他呼叫者會一直等不到連線。
#[derive(Clone)]
pub struct ExclusiveConnection {
    device: Arc<Mutex<TelnetDevice>>,
}

impl ExclusiveConnection {
    /// 建立新的獨佔存取；每台裝置只該有一個實例，要跨任務共用就複製它
    pub fn new(device: Arc<Mutex<TelnetDevice>>) -> Self {
        Self { device }
    }

    /// 取得獨佔連線
    ///
    /// 等到取得鎖之後才連線。連線失敗時鎖會先釋放、錯誤才回傳，
    /// 不會留下被失敗者占住的鎖。
    pub async fn acquire(&self) -> Result<ConnectionHandle, DeviceError> {
        let mut guard = self.device.clone().lock_owned().await;
        // 連線失敗時 guard 在這裡離開作用域，鎖隨之釋放
        guard.connect().await?;
        Ok(ConnectionHandle { guard: Some(guard) })
    }

    /// 在獨佔範圍內執行一項操作
    ///
    /// 依序：取得鎖、連線、執行、斷線、釋放鎖。
    /// 斷線失敗的錯誤會在鎖釋放之後往外傳。
    pub async fn run<F, R>(&self, op: F) -> Result<R, DeviceError>
    where
        F: for<'a> FnOnce(&'a mut TelnetDevice) -> BoxFuture<'a, Result<R, DeviceError>> + Send,
        R: Send,
    {
        let mut conn = self.acquire().await?;
        let result = op(&mut *conn).await;
        conn.release().await?;
        result
    }
}

/// 已取得的獨佔連線
///
/// 透過 Deref 直接當作 `TelnetDevice` 使用。用完應呼叫 `release`
/// 正常斷線；直接丟棄（包括操作被取消）時改走立即清理：
/// 不執行掛鉤、直接丟棄串流，然後釋放鎖。
pub struct ConnectionHandle {
    guard: Option<OwnedMutexGuard<TelnetDevice>>,
}

impl ConnectionHandle {
    /// 斷線並釋放鎖
    ///
    /// 斷線失敗時鎖仍然會釋放，錯誤在釋放之後回傳
    pub async fn release(mut self) -> Result<(), DeviceError> {
        match self.guard.take() {
            Some(mut guard) => {
                let result = guard.disconnect().await;
                drop(guard);
                result
            }
            None => Ok(()),
        }
    }
}

impl Deref for ConnectionHandle {
    type Target = TelnetDevice;

    fn deref(&self) -> &TelnetDevice {
        self.guard.as_ref().expect("連線已釋放")
    }
}

impl DerefMut for ConnectionHandle {
    fn deref_mut(&mut self) -> &mut TelnetDevice {
        self.guard.as_mut().expect("連線已釋放")
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            // Drop 中無法等待非同步斷線，改為直接丟棄串流
            warn!("獨佔連線未正常釋放，直接丟棄串流");
            guard.abort();
        }
    }
}

/// 共用連線閘門
///
/// 以計數信號量限制同時使用一條已開啟連線的操作數量。
/// 閘門不會自動連線或斷線，連線的建立與收回由呼叫者自行安排。
pub struct SharedGate {
    permits: Arc<Semaphore>,
}

impl SharedGate {
    /// 建立允許 `limit` 個併發操作的閘門
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// 等待取得一個名額
    pub async fn enter(&self) -> GatePass {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("閘門的信號量不會被關閉");
        GatePass { _permit: permit }
    }
}

/// 閘門通行證，丟棄時歸還名額
pub struct GatePass {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceHooks;
    use crate::transport::{Transport, TransportStream};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// 計算開啟次數的測試傳輸，可設定成永遠失敗
    struct CountingTransport {
        opens: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn open(
            &self,
            _host: &str,
            _port: u16,
        ) -> Result<Box<dyn TransportStream>, DeviceError> {
            if self.fail {
                return Err(DeviceError::ConnectionFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "連線被拒",
                )));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            let (local, _remote) = tokio::io::duplex(64);
            Ok(Box::new(local))
        }
    }

    struct CountingHooks {
        disconnects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DeviceHooks for CountingHooks {
        async fn before_disconnect(
            &mut self,
            _device: &mut TelnetDevice,
        ) -> Result<(), DeviceError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingDisconnectHooks;

    #[async_trait]
    impl DeviceHooks for FailingDisconnectHooks {
        async fn before_disconnect(
            &mut self,
            _device: &mut TelnetDevice,
        ) -> Result<(), DeviceError> {
            Err(DeviceError::Hook("模擬收尾失敗".into()))
        }
    }

    fn shared_device(fail: bool) -> (Arc<Mutex<TelnetDevice>>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut device = TelnetDevice::new("10.211.0.91", 23);
        device.set_transport(Box::new(CountingTransport {
            opens: opens.clone(),
            fail,
        }));
        (Arc::new(Mutex::new(device)), opens)
    }

    #[tokio::test]
    async fn test_run_returns_operation_result() {
        let (device, _opens) = shared_device(false);
        let exclusive = ExclusiveConnection::new(device);

        let value = exclusive
            .run(|device| {
                Box::pin(async move {
                    assert!(device.is_connected());
                    Ok(42)
                })
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_mutual_exclusion() {
        let (device, opens) = shared_device(false);
        let disconnects = Arc::new(AtomicUsize::new(0));
        device.lock().await.set_hooks(Box::new(CountingHooks {
            disconnects: disconnects.clone(),
        }));

        let exclusive = ExclusiveConnection::new(device);
        let inside = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let exclusive = exclusive.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                exclusive
                    .run(move |device| {
                        Box::pin(async move {
                            // 同一時間只能有一個呼叫者在獨佔區內
                            assert!(!inside.swap(true, Ordering::SeqCst));
                            assert!(device.is_connected());
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            inside.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(opens.load(Ordering::SeqCst), 3);
        assert_eq!(disconnects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connect_failure_releases_lock() {
        let (device, _opens) = shared_device(true);
        let exclusive = ExclusiveConnection::new(device);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let exclusive = exclusive.clone();
            handles.push(tokio::spawn(
                async move { exclusive.acquire().await.err() },
            ));
        }
        for handle in handles {
            // 所有呼叫者最終都要拿到錯誤，而不是卡死
            assert!(handle.await.unwrap().is_some());
        }

        // 鎖必須已經釋放，後續的取得不能被卡住
        let again = tokio::time::timeout(Duration::from_secs(1), exclusive.acquire()).await;
        assert!(matches!(again, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_disconnect_failure_still_releases_lock() {
        let (device, _opens) = shared_device(false);
        device.lock().await.set_hooks(Box::new(FailingDisconnectHooks));
        let exclusive = ExclusiveConnection::new(device);

        let result = exclusive
            .run(|_device| Box::pin(async move { Ok(()) }))
            .await;
        assert!(matches!(result, Err(DeviceError::Hook(_))));

        // 斷線失敗不能把鎖帶進墳墓
        let again = tokio::time::timeout(Duration::from_secs(1), exclusive.acquire()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_acquire_never_holds_lock() {
        let (device, _opens) = shared_device(false);
        let exclusive = ExclusiveConnection::new(device);

        let held = exclusive.acquire().await.unwrap();

        // 第二個呼叫者還在排隊時就被取消
        let waiting = tokio::spawn({
            let exclusive = exclusive.clone();
            async move {
                let _ = exclusive.acquire().await;
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiting.abort();
        let _ = waiting.await;

        held.release().await.unwrap();

        // 被取消的等待者沒拿到鎖，也就不能留下任何占用
        let again = tokio::time::timeout(Duration::from_secs(1), exclusive.acquire()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_drop_without_release() {
        let (device, _opens) = shared_device(false);
        let exclusive = ExclusiveConnection::new(device.clone());

        let handle = exclusive.acquire().await.unwrap();
        assert!(handle.is_connected());
        drop(handle);

        // 鎖已釋放，裝置也被標記為未連線
        assert!(!device.lock().await.is_connected());
    }

    #[tokio::test]
    async fn test_shared_gate_limits_concurrency() {
        let gate = Arc::new(SharedGate::new(2));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let gate = gate.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _pass = gate.enter().await;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
