//! Top-level owner of one messaging run.
//!
//! Holds the settings, template, contact queue and active delivery channel,
//! and runs the liaison poller while in remote-server mode. State sits
//! behind a single mutex that is never held across a network call.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{
        port::{DeliveryChannel, LinkOpener, RemoteServerApi},
        types::DeliveryFailure,
        DirectLinkChannel, RemoteServerChannel,
    },
    config::{is_http_url, Config},
    domain::{ChannelMode, Contact, SessionConfig},
    errors::Error,
    import::{contacts_from_entries, parse_report, ImportReport},
    liaison::{Liaison, LiaisonSnapshot, LinkState},
    queue::{DispatchQueue, TickOutcome},
    store::StatusCounts,
    template::Template,
    Result,
};

/// What happened when the operator (or auto-play) asked for a send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// No pending contact left.
    NothingPending,
    /// A previous attempt has not settled yet.
    Busy,
    Sent(Contact),
    Failed {
        contact: Contact,
        failure: DeliveryFailure,
    },
}

/// Result of one auto-play second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickReport {
    Idle,
    Countdown(u32),
    Dispatched(SendOutcome),
}

/// Read-only view of the session for rendering.
#[derive(Clone, Debug)]
pub struct SessionView {
    pub config: SessionConfig,
    pub template: String,
    pub started: bool,
    pub contacts: Vec<Contact>,
    pub current_index: Option<usize>,
    pub current_message: Option<String>,
    pub finished: bool,
    pub auto_play: bool,
    pub countdown: u32,
    pub auto_delay: u32,
    pub last_error: Option<String>,
    pub progress_percent: u8,
    pub counts: StatusCounts,
    pub channel_available: bool,
    pub link: Option<LiaisonSnapshot>,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SessionState {
    config: SessionConfig,
    template: Template,
    queue: DispatchQueue,
    started: bool,
    channel: Arc<dyn DeliveryChannel>,
    liaison: Option<Arc<Liaison>>,
    poller: Option<Poller>,
}

pub struct Session {
    cfg: Arc<Config>,
    opener: Arc<dyn LinkOpener>,
    remote: Arc<dyn RemoteServerApi>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session in direct-link mode. Call [`apply_config`](Self::apply_config)
    /// to switch to the configured mode (this starts the poller when needed).
    pub fn new(
        cfg: Arc<Config>,
        opener: Arc<dyn LinkOpener>,
        remote: Arc<dyn RemoteServerApi>,
    ) -> Self {
        let config = SessionConfig::default();
        let channel: Arc<dyn DeliveryChannel> =
            Arc::new(DirectLinkChannel::new(opener.clone(), cfg.compose_url.clone()));
        let queue = DispatchQueue::new(cfg.timing, config.mode);

        Self {
            cfg,
            opener,
            remote,
            state: Mutex::new(SessionState {
                config,
                template: Template::default(),
                queue,
                started: false,
                channel,
                liaison: None,
                poller: None,
            }),
        }
    }

    /// Replace the session settings wholesale.
    ///
    /// Any poller for the previous settings is stopped before the new channel
    /// is built, and auto-play is switched off.
    pub async fn apply_config(&self, config: SessionConfig) -> Result<()> {
        if config.mode == ChannelMode::RemoteServer && !is_http_url(&config.server_url) {
            return Err(Error::Config(format!(
                "server URL must start with http:// or https://, got `{}`",
                config.server_url
            )));
        }

        let mut st = self.state.lock().await;
        stop_poller(&mut st).await;

        st.queue.set_mode(config.mode);
        st.config = config;
        self.install_channel(&mut st).await;

        tracing::info!(mode = %st.config.mode, url = %st.config.server_url, "settings applied");
        Ok(())
    }

    async fn install_channel(&self, st: &mut SessionState) {
        match st.config.mode {
            ChannelMode::DirectLink => {
                st.liaison = None;
                st.channel = Arc::new(DirectLinkChannel::new(
                    self.opener.clone(),
                    self.cfg.compose_url.clone(),
                ));
            }
            ChannelMode::RemoteServer => {
                let liaison = Arc::new(Liaison::new(
                    self.remote.clone(),
                    st.config.base_url(),
                    self.cfg.log_capacity,
                ));
                liaison.start().await;

                let cancel = CancellationToken::new();
                let handle = liaison.spawn_poller(self.cfg.poll_interval, cancel.clone());
                st.poller = Some(Poller { cancel, handle });
                st.channel = Arc::new(RemoteServerChannel::new(
                    self.remote.clone(),
                    liaison.clone(),
                ));
                st.liaison = Some(liaison);
            }
        }
    }

    pub async fn config(&self) -> SessionConfig {
        self.state.lock().await.config.clone()
    }

    /// Parse pasted text and replace the contact list with the result.
    ///
    /// Fails without touching the current list when no line is usable.
    pub async fn import_text(&self, text: &str) -> Result<ImportReport> {
        let report = parse_report(text);
        if report.entries.is_empty() {
            return Err(Error::Import(
                "no valid numbers found; put one number per line".to_string(),
            ));
        }

        let mut st = self.state.lock().await;
        st.queue.load(contacts_from_entries(report.entries.clone()));
        st.started = false;
        tracing::info!(
            imported = report.entries.len(),
            dropped = report.dropped,
            "contacts imported"
        );
        Ok(report)
    }

    pub async fn set_template(&self, content: impl Into<String>) {
        self.state.lock().await.template.set(content);
    }

    pub async fn template(&self) -> String {
        self.state.lock().await.template.content().to_string()
    }

    /// Begin dispatching. Needs at least one contact and a non-blank template.
    pub async fn start(&self) -> Result<()> {
        let mut st = self.state.lock().await;
        if st.queue.contacts().is_empty() {
            return Err(Error::Session(
                "add at least one contact before starting".to_string(),
            ));
        }
        st.template.validate()?;
        st.started = true;
        Ok(())
    }

    pub async fn is_started(&self) -> bool {
        self.state.lock().await.started
    }

    /// Attempt delivery to the current contact through the active channel.
    pub async fn send_current(&self) -> Result<SendOutcome> {
        let (contact, message, channel) = {
            let mut st = self.state.lock().await;
            if !st.started {
                return Err(Error::Session("dispatch has not been started".to_string()));
            }
            if st.queue.in_flight() {
                return Ok(SendOutcome::Busy);
            }
            let Some(contact) = st.queue.begin_send() else {
                return Ok(SendOutcome::NothingPending);
            };
            let message = st.template.render(&contact);
            (contact, message, st.channel.clone())
        };

        let result = channel.attempt_send(&contact, &message).await;

        let mut st = self.state.lock().await;
        st.queue.finish_send(contact.id, &result);
        let contact = st.queue.store().get(contact.id).cloned().unwrap_or(contact);

        Ok(match result {
            Ok(()) => SendOutcome::Sent(contact),
            Err(failure) => SendOutcome::Failed { contact, failure },
        })
    }

    /// Mark the current contact skipped.
    pub async fn skip_current(&self) -> Option<Contact> {
        self.state.lock().await.queue.skip_current()
    }

    /// Flip auto-play; returns the new value.
    pub async fn toggle_auto_play(&self) -> bool {
        self.state.lock().await.queue.toggle_auto_play()
    }

    /// Advance auto-play by one second, sending when the countdown expires.
    pub async fn tick(&self) -> Result<TickReport> {
        let outcome = {
            let mut st = self.state.lock().await;
            if !st.started {
                return Ok(TickReport::Idle);
            }
            let available = st.channel.is_available().await;
            st.queue.tick(available)
        };

        match outcome {
            TickOutcome::Idle => Ok(TickReport::Idle),
            TickOutcome::Countdown(n) => Ok(TickReport::Countdown(n)),
            TickOutcome::SendDue => Ok(TickReport::Dispatched(self.send_current().await?)),
        }
    }

    /// Discard the whole list. Destructive: callers must pass the operator's
    /// explicit confirmation. Returns whether the reset happened.
    pub async fn reset(&self, confirmed: bool) -> bool {
        if !confirmed {
            return false;
        }

        let mut st = self.state.lock().await;
        stop_poller(&mut st).await;
        st.queue.reset();
        st.started = false;
        self.install_channel(&mut st).await;
        tracing::info!("session reset");
        true
    }

    /// Current server link state; `None` in direct-link mode.
    pub async fn link_state(&self) -> Option<LinkState> {
        let liaison = self.state.lock().await.liaison.clone()?;
        Some(liaison.state().await)
    }

    pub async fn view(&self) -> SessionView {
        let st = self.state.lock().await;
        let current = st.queue.current();
        let link = match &st.liaison {
            Some(l) => Some(l.snapshot().await),
            None => None,
        };

        SessionView {
            config: st.config.clone(),
            template: st.template.content().to_string(),
            started: st.started,
            contacts: st.queue.contacts().to_vec(),
            current_index: st.queue.current_index(),
            current_message: current.map(|c| st.template.render(c)),
            finished: st.queue.is_finished(),
            auto_play: st.queue.auto_play(),
            countdown: st.queue.countdown(),
            auto_delay: st.queue.auto_delay(),
            last_error: st.queue.last_error().map(str::to_string),
            progress_percent: st.queue.progress_percent(),
            counts: st.queue.counts(),
            channel_available: st.channel.is_available().await,
            link,
        }
    }

    /// Stop background work. The session stays usable in direct-link mode.
    pub async fn shutdown(&self) {
        let mut st = self.state.lock().await;
        stop_poller(&mut st).await;
        st.queue.stop_auto_play();
    }
}

async fn stop_poller(st: &mut SessionState) {
    if let Some(poller) = st.poller.take() {
        poller.cancel.cancel();
        if let Err(e) = poller.handle.await {
            tracing::warn!(error = %e, "liaison poller ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::types::SendRequest,
        domain::ContactStatus,
        liaison::tests::{qr_ready, ready, FakeServer},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeOpener {
        refuse: AtomicBool,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl LinkOpener for FakeOpener {
        async fn open(&self, _url: &str) -> Result<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::External("blocked".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Holds its first attempt until released, then reports it blocked.
    #[derive(Default)]
    struct SlowOpener {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl LinkOpener for SlowOpener {
        async fn open(&self, _url: &str) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.release.notified().await;
                return Err(Error::External("blocked".into()));
            }
            Ok(())
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            poll_interval: Duration::from_secs(3600),
            ..Config::default()
        })
    }

    fn session_with(server: FakeServer) -> (Arc<FakeOpener>, Arc<FakeServer>, Session) {
        let opener = Arc::new(FakeOpener::default());
        let server = Arc::new(server);
        let session = Session::new(test_config(), opener.clone(), server.clone());
        (opener, server, session)
    }

    fn remote_config() -> SessionConfig {
        SessionConfig {
            mode: ChannelMode::RemoteServer,
            server_url: "http://localhost:3001/".to_string(),
        }
    }

    async fn wait_for_state(session: &Session, want: LinkState) {
        for _ in 0..100 {
            if session.link_state().await == Some(want) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("liaison never reached {want}");
    }

    #[tokio::test]
    async fn import_then_send_in_direct_link_mode() {
        let (opener, _server, session) = session_with(FakeServer::default());
        let report = session
            .import_text("João, 11999998888\n41977776666\nbad")
            .await
            .unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.dropped, 1);

        session.start().await.unwrap();
        let out = session.send_current().await.unwrap();
        match out {
            SendOutcome::Sent(c) => {
                assert_eq!(c.phone, "5511999998888");
                assert_eq!(c.status, ContactStatus::Sent);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(opener.opened.load(Ordering::SeqCst), 1);

        let view = session.view().await;
        assert_eq!(view.current_index, Some(1));
        assert_eq!(view.progress_percent, 50);
    }

    #[tokio::test]
    async fn import_without_valid_lines_keeps_previous_list() {
        let (_opener, _server, session) = session_with(FakeServer::default());
        session.import_text("11999998888").await.unwrap();
        assert!(session.import_text("\n  \n123").await.is_err());
        assert_eq!(session.view().await.contacts.len(), 1);
    }

    #[tokio::test]
    async fn start_requires_contacts_and_template() {
        let (_opener, _server, session) = session_with(FakeServer::default());
        assert!(matches!(session.start().await, Err(Error::Session(_))));
        assert!(matches!(session.send_current().await, Err(Error::Session(_))));
        session.import_text("11999998888").await.unwrap();
        session.set_template("   ").await;
        assert!(matches!(session.start().await, Err(Error::Template(_))));
        session.set_template("Olá {nome}").await;
        session.start().await.unwrap();
        assert!(session.is_started().await);
    }

    #[tokio::test]
    async fn popup_block_stops_auto_play_and_keeps_contact_pending() {
        let (opener, _server, session) = session_with(FakeServer::default());
        session.import_text("11999998888").await.unwrap();
        session.start().await.unwrap();
        session.toggle_auto_play().await;
        opener.refuse.store(true, Ordering::SeqCst);

        let out = session.send_current().await.unwrap();
        assert!(matches!(
            out,
            SendOutcome::Failed {
                failure: DeliveryFailure::PopupBlocked,
                ..
            }
        ));
        let view = session.view().await;
        assert!(!view.auto_play);
        assert_eq!(view.contacts[0].status, ContactStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_marks_error_and_records_reason() {
        let (_opener, server, session) = session_with(FakeServer::script(vec![ready()]));
        *server.send_result.lock().unwrap() = Some(Err("x".to_string()));
        session.apply_config(remote_config()).await.unwrap();
        wait_for_state(&session, LinkState::Ready).await;

        session.import_text("11999998888\n21988887777").await.unwrap();
        session.start().await.unwrap();
        session.toggle_auto_play().await;

        session.send_current().await.unwrap();
        let view = session.view().await;
        assert_eq!(view.contacts[0].status, ContactStatus::Error);
        assert!(!view.auto_play);
        assert_eq!(view.last_error.as_deref(), Some("x"));
        assert_eq!(view.current_index, Some(1));

        let expected = SendRequest {
            phone: "5511999998888".into(),
            message: session.template().await.replacen("{nome}", "", 1),
        };
        let sent = server.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![expected]);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn remote_send_refused_until_ready() {
        let (_opener, server, session) = session_with(FakeServer::script(vec![qr_ready()]));
        session.apply_config(remote_config()).await.unwrap();
        wait_for_state(&session, LinkState::QrPending).await;

        session.import_text("11999998888").await.unwrap();
        session.start().await.unwrap();
        let out = session.send_current().await.unwrap();
        assert!(matches!(
            out,
            SendOutcome::Failed {
                failure: DeliveryFailure::NotReady,
                ..
            }
        ));
        assert!(server.sent.lock().unwrap().is_empty());
        assert_eq!(session.view().await.contacts[0].status, ContactStatus::Pending);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn auto_play_sends_after_warmup() {
        let (opener, _server, session) = session_with(FakeServer::default());
        session.import_text("11999998888\n21988887777").await.unwrap();
        session.start().await.unwrap();
        assert!(session.toggle_auto_play().await);

        assert_eq!(session.tick().await.unwrap(), TickReport::Countdown(2));
        assert_eq!(session.tick().await.unwrap(), TickReport::Countdown(1));
        assert!(matches!(
            session.tick().await.unwrap(),
            TickReport::Dispatched(SendOutcome::Sent(_))
        ));
        assert_eq!(opener.opened.load(Ordering::SeqCst), 1);
        assert_eq!(session.view().await.countdown, 2);
    }

    #[tokio::test]
    async fn tick_is_idle_before_start() {
        let (_opener, _server, session) = session_with(FakeServer::default());
        session.import_text("11999998888").await.unwrap();
        session.toggle_auto_play().await;
        assert_eq!(session.tick().await.unwrap(), TickReport::Idle);
    }

    #[tokio::test]
    async fn reset_needs_confirmation() {
        let (_opener, _server, session) = session_with(FakeServer::default());
        session.import_text("11999998888").await.unwrap();
        assert!(!session.reset(false).await);
        assert_eq!(session.view().await.contacts.len(), 1);
        assert!(session.reset(true).await);
        let view = session.view().await;
        assert!(view.contacts.is_empty());
        assert!(view.finished);
        assert!(!view.started);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_back_to_direct_link_drops_liaison() {
        let (_opener, _server, session) = session_with(FakeServer::script(vec![ready()]));
        assert_eq!(session.link_state().await, None);
        session.apply_config(remote_config()).await.unwrap();
        wait_for_state(&session, LinkState::Ready).await;
        assert!(session.view().await.link.is_some());
        session.apply_config(SessionConfig::default()).await.unwrap();
        let view = session.view().await;
        assert!(view.link.is_none());
        assert_eq!(session.link_state().await, None);
        assert!(view.channel_available);
        assert_eq!(view.auto_delay, 2);
    }

    #[tokio::test]
    async fn reimport_during_send_keeps_single_flight() {
        let opener = Arc::new(SlowOpener::default());
        let session = Arc::new(Session::new(
            test_config(),
            opener.clone(),
            Arc::new(FakeServer::default()),
        ));
        session.import_text("11999998888").await.unwrap();
        session.start().await.unwrap();

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.send_current().await }
        });
        while opener.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.import_text("21988887777\n21977776666").await.unwrap();
        session.start().await.unwrap();
        assert!(session.toggle_auto_play().await);
        assert_eq!(session.send_current().await.unwrap(), SendOutcome::Busy);
        assert_eq!(session.tick().await.unwrap(), TickReport::Idle);
        assert_eq!(opener.calls.load(Ordering::SeqCst), 1);

        opener.release.notify_one();
        let out = first.await.unwrap().unwrap();
        assert!(matches!(
            out,
            SendOutcome::Failed {
                failure: DeliveryFailure::PopupBlocked,
                ..
            }
        ));

        let view = session.view().await;
        assert!(view.auto_play);
        assert_eq!(view.last_error, None);
        assert_eq!(view.counts.pending, 2);

        assert!(matches!(
            session.send_current().await.unwrap(),
            SendOutcome::Sent(c) if c.phone == "5521988887777"
        ));
        assert_eq!(opener.calls.load(Ordering::SeqCst), 2);
    }

    fn polling_session(server: FakeServer) -> (Arc<FakeServer>, Session) {
        let server = Arc::new(server);
        let cfg = Arc::new(Config {
            poll_interval: Duration::from_secs(5),
            ..Config::default()
        });
        let session = Session::new(cfg, Arc::new(FakeOpener::default()), server.clone());
        (server, session)
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_remote_mode_stops_polling() {
        let (server, session) = polling_session(FakeServer::default());
        session.apply_config(remote_config()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        let polled = server.status_calls.load(Ordering::SeqCst);
        assert_eq!(polled, 3);

        session.apply_config(SessionConfig::default()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(server.status_calls.load(Ordering::SeqCst), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_replaces_the_poller() {
        let (server, session) = polling_session(FakeServer::default());
        session.apply_config(remote_config()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 1);

        assert!(session.reset(true).await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 2);

        // One poller left: one check per interval.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 6);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_server_url_without_scheme() {
        let (_opener, _server, session) = session_with(FakeServer::default());
        let bad = SessionConfig {
            mode: ChannelMode::RemoteServer,
            server_url: "localhost:3001".into(),
        };
        assert!(session.apply_config(bad).await.is_err());
        assert_eq!(session.config().await.mode, ChannelMode::DirectLink);
    }
}
