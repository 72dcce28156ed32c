//! Background scan-and-play loop.
//!
//! Every tick checks the coordinator, polls the reader, resolves the tag and
//! starts playback:
//!
//! ```text
//!   Paused                  → forget last tag, sleep idle_interval
//!   Listening, no tag       → forget last tag, sleep poll_interval
//!   Listening, same tag     → debounced, sleep poll_interval
//!   Listening, new tag      → lookup → play (or ignore), sleep poll_interval
//! ```
//!
//! A tag resting on the reader is reported on every poll; a bound tag
//! triggers playback once per continuous presence. Unbound tags are looked up
//! again on each poll so a binding committed while the tag rests on the
//! reader takes effect.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::binding::Binding;
use crate::config::DispatcherConfig;
use crate::coordinator::Coordinator;
use crate::error::{DispatchError, ReaderError};
use crate::media::{play_binding, MediaController};
use crate::reader::{ReaderGuard, TagReader};
use crate::session::AuthSession;
use crate::store::MappingStore;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Registration owns the reader; nothing was touched.
    Paused,
    NoTag,
    /// Tag already played during this presence.
    Debounced(String),
    /// Tag has no binding (or the lookup failed).
    Unmapped(String),
    Played(Binding),
    PlaybackFailed(Binding),
}

pub struct PlaybackDispatcher<M> {
    coordinator: Arc<Coordinator>,
    reader: Arc<dyn TagReader>,
    store: MappingStore,
    controller: M,
    session: AuthSession,
    config: DispatcherConfig,
    /// Tag handed to the player during the current presence; cleared by an
    /// empty poll or a pause.
    last_token: Option<String>,
    /// Pause epoch `last_token` was recorded under.
    seen_epoch: u64,
}

impl<M: MediaController> PlaybackDispatcher<M> {
    pub fn new(
        coordinator: Arc<Coordinator>,
        reader: Arc<dyn TagReader>,
        store: MappingStore,
        controller: M,
        session: AuthSession,
        config: DispatcherConfig,
    ) -> Self {
        let coordinator_epoch = coordinator.epoch();
        Self {
            coordinator,
            reader,
            store,
            controller,
            session,
            config,
            last_token: None,
            seen_epoch: coordinator_epoch,
        }
    }

    /// Run until `shutdown` fires or a fatal error occurs. The reader is
    /// released on every exit path.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), DispatchError> {
        let _guard = ReaderGuard::new(Arc::clone(&self.reader));

        if let Err(e) = self.session.bearer() {
            error!("dispatcher: no usable media session, not starting: {}", e);
            return Err(e.into());
        }
        info!(
            "dispatcher: listening (poll {:?}, idle {:?})",
            self.config.poll_interval(),
            self.config.idle_interval()
        );

        loop {
            let tick = match self.tick().await {
                Ok(tick) => tick,
                Err(e) => {
                    error!("dispatcher: reader failure, stopping: {}", e);
                    return Err(e.into());
                }
            };

            let delay = match tick {
                Tick::Paused => self.config.idle_interval(),
                _ => self.config.poll_interval(),
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("dispatcher: shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One poll → lookup → play step, without the trailing sleep.
    pub async fn tick(&mut self) -> Result<Tick, ReaderError> {
        let coordinator = Arc::clone(&self.coordinator);
        let _lease = coordinator.tick_lease().await;

        if !coordinator.is_listening() {
            return Ok(self.paused());
        }
        // A registration came and went between two ticks.
        let epoch = coordinator.epoch();
        if epoch != self.seen_epoch {
            self.last_token = None;
            self.seen_epoch = epoch;
        }

        let Some(token_id) = self.reader.poll()? else {
            self.last_token = None;
            return Ok(Tick::NoTag);
        };
        // The gate is re-checked after every step that can race with pause().
        if !coordinator.is_listening() {
            return Ok(self.paused());
        }

        if self.last_token.as_deref() == Some(token_id.as_str()) {
            debug!("dispatcher: tag {} still present, skipping", token_id);
            return Ok(Tick::Debounced(token_id));
        }

        let binding = match self.store.get(&token_id).await {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                debug!("dispatcher: tag {} is not registered", token_id);
                return Ok(Tick::Unmapped(token_id));
            }
            Err(e) => {
                warn!("dispatcher: lookup for tag {} failed: {}", token_id, e);
                return Ok(Tick::Unmapped(token_id));
            }
        };
        if !coordinator.is_listening() {
            return Ok(self.paused());
        }

        info!("dispatcher: scanned tag {}", token_id);
        self.last_token = Some(token_id);
        match play_binding(&self.controller, &binding).await {
            Ok(()) => {
                info!("dispatcher: playing {} ({})", binding.media_ref, binding.kind);
                Ok(Tick::Played(binding))
            }
            Err(e) => {
                warn!("dispatcher: playback of {} failed: {}", binding.media_ref, e);
                Ok(Tick::PlaybackFailed(binding))
            }
        }
    }

    /// A registration may rebind whatever is on the reader, so a pause ends
    /// the current presence.
    fn paused(&mut self) -> Tick {
        self.last_token = None;
        Tick::Paused
    }
}
