//! In-memory stand-ins for the tag reader and the media service.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jukebox_core::config::DispatcherConfig;
use jukebox_core::coordinator::Coordinator;
use jukebox_core::dispatcher::PlaybackDispatcher;
use jukebox_core::error::{PlaybackError, ReaderError};
use jukebox_core::media::MediaController;
use jukebox_core::reader::TagReader;
use jukebox_core::registration::Registrar;
use jukebox_core::session::{AccessToken, AuthSession};
use jukebox_core::store::MappingStore;

/// `poll` reports whatever tag is "on" the reader; `read_blocking` waits for
/// tags pushed with `scan`.
pub struct FakeReader {
    present: Mutex<Option<String>>,
    scan_tx: Mutex<Option<mpsc::Sender<String>>>,
    scan_rx: Mutex<mpsc::Receiver<String>>,
    fail_poll: AtomicBool,
    pub polls: AtomicUsize,
    pub blocking_reads: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeReader {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(Self {
            present: Mutex::new(None),
            scan_tx: Mutex::new(Some(tx)),
            scan_rx: Mutex::new(rx),
            fail_poll: AtomicBool::new(false),
            polls: AtomicUsize::new(0),
            blocking_reads: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn place(&self, token_id: &str) {
        *self.present.lock().unwrap() = Some(token_id.to_string());
    }

    pub fn remove(&self) {
        *self.present.lock().unwrap() = None;
    }

    pub fn scan(&self, token_id: &str) {
        if let Some(tx) = self.scan_tx.lock().unwrap().as_ref() {
            tx.send(token_id.to_string()).unwrap();
        }
    }

    /// Make pending and future blocking reads fail.
    pub fn close(&self) {
        self.scan_tx.lock().unwrap().take();
    }

    pub fn fail_polls(&self) {
        self.fail_poll.store(true, Ordering::SeqCst);
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl TagReader for FakeReader {
    fn poll(&self) -> Result<Option<String>, ReaderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(ReaderError::Unavailable("spi bus gone".into()));
        }
        Ok(self.present.lock().unwrap().clone())
    }

    fn read_blocking(&self) -> Result<String, ReaderError> {
        self.blocking_reads.fetch_add(1, Ordering::SeqCst);
        self.scan_rx
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| ReaderError::Closed)
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCall {
    Single(String),
    Context(String),
}

#[derive(Clone, Default)]
pub struct RecordingController {
    calls: Arc<Mutex<Vec<PlayCall>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let c = Self::default();
        c.fail.store(true, Ordering::SeqCst);
        c
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PlayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlayCall) -> Result<(), PlaybackError> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Rejected {
                status: 404,
                message: "NO_ACTIVE_DEVICE".into(),
            });
        }
        Ok(())
    }
}

impl MediaController for RecordingController {
    async fn play_single(&self, media_ref: &str) -> Result<(), PlaybackError> {
        self.record(PlayCall::Single(media_ref.to_string()))
    }

    async fn play_context(&self, media_ref: &str) -> Result<(), PlaybackError> {
        self.record(PlayCall::Context(media_ref.to_string()))
    }
}

pub fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        idle_interval_ms: 2,
        poll_interval_ms: 5,
    }
}

pub fn live_session() -> AuthSession {
    AuthSession::with_token(AccessToken::bearer("test-token"))
}

/// Everything wired together the way the daemon does it.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub reader: Arc<FakeReader>,
    pub store: MappingStore,
    pub controller: RecordingController,
    pub registrar: Arc<Registrar>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_resume_timeout(None).await
    }

    pub async fn with_resume_timeout(resume_timeout: Option<Duration>) -> Self {
        let coordinator = Arc::new(Coordinator::new());
        let reader = FakeReader::new();
        let store = MappingStore::open_in_memory().await.unwrap();
        let controller = RecordingController::new();
        let registrar = Arc::new(Registrar::new(
            Arc::clone(&coordinator),
            reader.clone(),
            store.clone(),
            resume_timeout,
        ));
        Self {
            coordinator,
            reader,
            store,
            controller,
            registrar,
        }
    }

    pub fn dispatcher(&self) -> PlaybackDispatcher<RecordingController> {
        self.dispatcher_with_session(live_session())
    }

    pub fn dispatcher_with_session(
        &self,
        session: AuthSession,
    ) -> PlaybackDispatcher<RecordingController> {
        PlaybackDispatcher::new(
            Arc::clone(&self.coordinator),
            self.reader.clone(),
            self.store.clone(),
            self.controller.clone(),
            session,
            fast_config(),
        )
    }

    /// Wait until a spawned registration has paused the coordinator.
    pub async fn wait_paused(&self) {
        for _ in 0..200 {
            if !self.coordinator.is_listening() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("coordinator never paused");
    }
}
