//! Foreground registration workflow.
//!
//! `begin_registration` pauses the dispatcher and blocks until a tag is
//! scanned; `commit_registration` parses the submitted link, writes the
//! binding and resumes the dispatcher. A rejected link leaves the dispatcher
//! paused so the same tag can be committed again with a corrected link.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::binding::UpsertOutcome;
use crate::coordinator::Coordinator;
use crate::error::RegistrationError;
use crate::link;
use crate::reader::TagReader;
use crate::store::MappingStore;

pub struct Registrar {
    coordinator: Arc<Coordinator>,
    reader: Arc<dyn TagReader>,
    store: MappingStore,
    /// Auto-resume delay for a pause that is never committed.
    resume_timeout: Option<Duration>,
    /// One blocking read at a time.
    read_lock: Mutex<()>,
}

impl Registrar {
    pub fn new(
        coordinator: Arc<Coordinator>,
        reader: Arc<dyn TagReader>,
        store: MappingStore,
        resume_timeout: Option<Duration>,
    ) -> Self {
        Self {
            coordinator,
            reader,
            store,
            resume_timeout,
            read_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Pause the dispatcher and wait for a tag. There is no read timeout; if
    /// the caller goes away the read keeps waiting on its blocking thread and
    /// the dispatcher stays paused unless `resume_timeout` is configured.
    pub async fn begin_registration(&self) -> Result<String, RegistrationError> {
        let _read = self.read_lock.lock().await;

        let epoch = self.coordinator.pause();
        if let Some(timeout) = self.resume_timeout {
            let coordinator = Arc::clone(&self.coordinator);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if coordinator.resume_if_epoch(epoch) {
                    warn!(
                        "registration: no commit within {:?}, dispatcher resumed",
                        timeout
                    );
                }
            });
        }

        // A tick that checked the gate before the pause may still be polling.
        self.coordinator.drain().await;

        info!("registration: waiting for a tag");
        let reader = Arc::clone(&self.reader);
        let read = tokio::task::spawn_blocking(move || {
            reader.read_blocking().map_err(|e| {
                reader.release();
                e
            })
        })
        .await?;

        match read {
            Ok(token_id) => {
                info!("registration: read tag {}", token_id);
                Ok(token_id)
            }
            Err(e) => {
                // The registration is over; hand the reader back.
                warn!("registration: tag read failed: {}", e);
                self.coordinator.resume_if_epoch(epoch);
                Err(e.into())
            }
        }
    }

    /// Bind `token_id` to the media behind `url` and resume the dispatcher.
    pub async fn commit_registration(
        &self,
        token_id: &str,
        url: &str,
    ) -> Result<UpsertOutcome, RegistrationError> {
        let (media_ref, kind) = link::parse(url).map_err(|e| {
            warn!("registration: rejected link for tag {}: {}", token_id, e);
            e
        })?;

        let outcome = self.store.upsert(token_id, &media_ref, kind).await?;
        info!(
            "registration: tag {} -> {} ({:?})",
            token_id, media_ref, outcome
        );

        self.coordinator.resume();
        Ok(outcome)
    }
}
