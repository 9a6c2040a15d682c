//! Readiness poller for the remote automation server.
//!
//! State machine: `Disconnected -> Connecting -> (QrPending | Ready)`.
//! Network failures only move the state to `Disconnected`; they are never
//! raised to the operator as errors, so transient blips stay quiet.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{channel::port::RemoteServerApi, utils::ActivityLog};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Server is waiting for the pairing code to be scanned.
    QrPending,
    Ready,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::QrPending => "qr-pending",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct LiaisonState {
    link: LinkState,
    qr_code: Option<String>,
    log: ActivityLog,
}

#[derive(Clone, Debug)]
pub struct LiaisonSnapshot {
    pub state: LinkState,
    pub qr_code: Option<String>,
    pub log: Vec<String>,
}

pub struct Liaison {
    api: Arc<dyn RemoteServerApi>,
    base_url: String,
    state: Mutex<LiaisonState>,
}

impl Liaison {
    pub fn new(api: Arc<dyn RemoteServerApi>, base_url: &str, log_capacity: usize) -> Self {
        Self {
            api,
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(LiaisonState {
                link: LinkState::Disconnected,
                qr_code: None,
                log: ActivityLog::new(log_capacity),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enter remote-server mode.
    pub async fn start(&self) {
        let mut st = self.state.lock().await;
        st.link = LinkState::Connecting;
        st.log.push(&format!("connecting to {}...", self.base_url));
        tracing::info!(url = %self.base_url, "connecting to automation server");
    }

    pub async fn state(&self) -> LinkState {
        self.state.lock().await.link
    }

    pub async fn qr_code(&self) -> Option<String> {
        self.state.lock().await.qr_code.clone()
    }

    pub async fn snapshot(&self) -> LiaisonSnapshot {
        let st = self.state.lock().await;
        LiaisonSnapshot {
            state: st.link,
            qr_code: st.qr_code.clone(),
            log: st.log.snapshot(),
        }
    }

    /// Append to the operator activity log.
    pub async fn log(&self, msg: &str) {
        self.state.lock().await.log.push(msg);
    }

    /// One status poll. Returns the resulting state.
    pub async fn check_once(&self) -> LinkState {
        let status = match self.api.status(&self.base_url).await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(error = %e, "status check failed");
                let mut st = self.state.lock().await;
                st.link = LinkState::Disconnected;
                return st.link;
            }
        };

        if status.is_ready {
            let mut st = self.state.lock().await;
            if st.link != LinkState::Ready {
                st.link = LinkState::Ready;
                st.qr_code = None;
                st.log.push("server ready");
                tracing::info!("automation server ready");
            }
            return st.link;
        }

        if status.qr_ready() {
            let need_qr = {
                let mut st = self.state.lock().await;
                st.link = LinkState::QrPending;
                st.qr_code.is_none()
            };
            if need_qr {
                self.fetch_qr().await;
            }
            return LinkState::QrPending;
        }

        // Still initializing. Reaching the server at all is enough to leave
        // `Disconnected`; nothing is logged.
        let mut st = self.state.lock().await;
        if st.link == LinkState::Disconnected {
            st.link = LinkState::Connecting;
        }
        st.link
    }

    async fn fetch_qr(&self) {
        match self.api.qr_code(&self.base_url).await {
            Ok(Some(code)) => {
                let mut st = self.state.lock().await;
                if st.link == LinkState::QrPending {
                    st.qr_code = Some(code);
                    st.log.push("pairing code received, scan it");
                    tracing::info!("pairing code received");
                }
            }
            Ok(None) => {}
            // Retried on the next poll since no image is held.
            Err(e) => tracing::debug!(error = %e, "qr fetch failed"),
        }
    }

    /// Check immediately, then every `every`, until `cancel` fires.
    pub fn spawn_poller(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let liaison = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    tokio::select! {
                      _ = cancel.cancelled() => break,
                      _ = liaison.check_once() => {}
                    }
                  }
                }
            }
            tracing::debug!(url = %liaison.base_url, "liaison poller stopped");
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        channel::types::{SendRequest, ServerStatus},
        errors::Error,
        Result,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted server: pops one status per poll; an empty script means
    /// the server is unreachable.
    #[derive(Default)]
    pub(crate) struct FakeServer {
        pub statuses: StdMutex<VecDeque<Option<ServerStatus>>>,
        pub qr: StdMutex<Option<String>>,
        pub status_calls: AtomicUsize,
        pub qr_calls: AtomicUsize,
        pub send_result: StdMutex<Option<std::result::Result<(), String>>>,
        pub sent: StdMutex<Vec<SendRequest>>,
    }

    impl FakeServer {
        pub(crate) fn script(statuses: Vec<Option<ServerStatus>>) -> Self {
            Self {
                statuses: StdMutex::new(statuses.into()),
                ..Default::default()
            }
        }
    }

    pub(crate) fn ready() -> Option<ServerStatus> {
        Some(ServerStatus {
            status: "ready".to_string(),
            is_ready: true,
        })
    }

    pub(crate) fn qr_ready() -> Option<ServerStatus> {
        Some(ServerStatus {
            status: "qr_ready".to_string(),
            is_ready: false,
        })
    }

    pub(crate) fn initializing() -> Option<ServerStatus> {
        Some(ServerStatus {
            status: "initializing".to_string(),
            is_ready: false,
        })
    }

    #[async_trait]
    impl RemoteServerApi for FakeServer {
        async fn status(&self, _base_url: &str) -> Result<ServerStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or_else(|| Error::Remote("connection refused".to_string()))
        }

        async fn qr_code(&self, _base_url: &str) -> Result<Option<String>> {
            self.qr_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.qr.lock().unwrap().clone())
        }

        async fn send(&self, _base_url: &str, req: &SendRequest) -> Result<()> {
            self.sent.lock().unwrap().push(req.clone());
            match self.send_result.lock().unwrap().clone() {
                Some(Err(reason)) => Err(Error::Remote(reason)),
                _ => Ok(()),
            }
        }
    }

    fn liaison_with(server: FakeServer) -> (Arc<FakeServer>, Liaison) {
        let server = Arc::new(server);
        let liaison = Liaison::new(server.clone(), "http://localhost:3001/", 8);
        (server, liaison)
    }

    #[tokio::test]
    async fn qr_ready_fetches_pairing_image_once() {
        let (server, liaison) = liaison_with(FakeServer::script(vec![qr_ready(), qr_ready()]));
        *server.qr.lock().unwrap() = Some("data:image/png;base64,AAA".to_string());
        liaison.start().await;

        assert_eq!(liaison.check_once().await, LinkState::QrPending);
        assert_eq!(
            liaison.qr_code().await.as_deref(),
            Some("data:image/png;base64,AAA")
        );
        liaison.check_once().await;
        assert_eq!(server.qr_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ready_clears_pairing_image_and_logs_once() {
        let (server, liaison) =
            liaison_with(FakeServer::script(vec![qr_ready(), ready(), ready()]));
        *server.qr.lock().unwrap() = Some("data:image/png;base64,AAA".to_string());
        liaison.start().await;

        liaison.check_once().await;
        assert_eq!(liaison.check_once().await, LinkState::Ready);
        liaison.check_once().await;

        let snap = liaison.snapshot().await;
        assert_eq!(snap.qr_code, None);
        let ready_lines = snap.log.iter().filter(|l| l.ends_with("server ready")).count();
        assert_eq!(ready_lines, 1);
        assert!(snap.log[0].ends_with("server ready"));
    }

    #[tokio::test]
    async fn unreachable_server_is_disconnected_without_logging() {
        let (_server, liaison) = liaison_with(FakeServer::script(vec![None]));
        liaison.start().await;
        assert_eq!(liaison.check_once().await, LinkState::Disconnected);
        assert_eq!(liaison.snapshot().await.log.len(), 1);
    }

    #[tokio::test]
    async fn initializing_status_keeps_connecting() {
        let (_server, liaison) =
            liaison_with(FakeServer::script(vec![initializing(), None, initializing()]));
        liaison.start().await;
        assert_eq!(liaison.check_once().await, LinkState::Connecting);
        assert_eq!(liaison.check_once().await, LinkState::Disconnected);
        assert_eq!(liaison.check_once().await, LinkState::Connecting);
        assert_eq!(liaison.snapshot().await.log.len(), 1);
    }

    #[tokio::test]
    async fn missing_qr_is_retried_next_poll() {
        let (server, liaison) = liaison_with(FakeServer::script(vec![qr_ready(), qr_ready()]));
        liaison.start().await;
        liaison.check_once().await;
        assert_eq!(liaison.qr_code().await, None);
        *server.qr.lock().unwrap() = Some("data:image/png;base64,BBB".to_string());
        liaison.check_once().await;
        assert_eq!(server.qr_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            liaison.qr_code().await.as_deref(),
            Some("data:image/png;base64,BBB")
        );
    }

    #[tokio::test]
    async fn base_url_is_trimmed() {
        let (_server, liaison) = liaison_with(FakeServer::default());
        assert_eq!(liaison.base_url(), "http://localhost:3001");
    }

    #[tokio::test(start_paused = true)]
    async fn poller_checks_immediately_and_stops_on_cancel() {
        let server = Arc::new(FakeServer::script(vec![ready(), ready(), ready(), ready()]));
        let liaison = Arc::new(Liaison::new(server.clone(), "http://x", 8));
        let cancel = CancellationToken::new();
        let handle = liaison.spawn_poller(Duration::from_secs(5), cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(liaison.state().await, LinkState::Ready);
        assert_eq!(server.statuses.lock().unwrap().len(), 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(server.statuses.lock().unwrap().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(server.statuses.lock().unwrap().len(), 2);
    }
}
