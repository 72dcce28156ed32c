use std::future::Future;

use crate::binding::{Binding, MediaKind};
use crate::error::PlaybackError;

/// Remote playback service.
pub trait MediaController: Send + Sync {
    /// Play exactly one item (a track).
    fn play_single(&self, media_ref: &str)
        -> impl Future<Output = Result<(), PlaybackError>> + Send;

    /// Play a context (album or playlist) from its start.
    fn play_context(&self, media_ref: &str)
        -> impl Future<Output = Result<(), PlaybackError>> + Send;
}

/// Issue the playback command matching the binding's kind.
pub async fn play_binding<M: MediaController>(
    controller: &M,
    binding: &Binding,
) -> Result<(), PlaybackError> {
    match binding.kind {
        MediaKind::Track => controller.play_single(&binding.media_ref).await,
        MediaKind::Album | MediaKind::Playlist => {
            controller.play_context(&binding.media_ref).await
        }
    }
}
