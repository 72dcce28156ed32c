//! Spotify Web API playback controller.
//!
//! Both commands go to `PUT /me/player/play`; a single track is sent as a
//! one-element `uris` list, albums and playlists as `context_uri`.

use std::time::Duration;

use jukebox_core::config::SpotifyConfig;
use jukebox_core::error::PlaybackError;
use jukebox_core::media::MediaController;
use jukebox_core::session::AuthSession;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub struct SpotifyController {
    client: Client,
    api_base: String,
    device_id: Option<String>,
    session: AuthSession,
}

impl SpotifyController {
    pub fn new(config: &SpotifyConfig, session: AuthSession) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            device_id: config.device_id.clone(),
            session,
        })
    }

    async fn start_playback(&self, body: Value) -> Result<(), PlaybackError> {
        let token = self.session.bearer()?;

        let mut request = self
            .client
            .put(format!("{}/me/player/play", self.api_base))
            .bearer_auth(token)
            .json(&body);
        if let Some(device_id) = &self.device_id {
            request = request.query(&[("device_id", device_id)]);
        }

        debug!("spotify: start playback {}", body);
        let response = request
            .send()
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(PlaybackError::Rejected {
            status: status.as_u16(),
            message: error_message(&message),
        })
    }
}

impl MediaController for SpotifyController {
    async fn play_single(&self, media_ref: &str) -> Result<(), PlaybackError> {
        self.start_playback(single_body(media_ref)).await
    }

    async fn play_context(&self, media_ref: &str) -> Result<(), PlaybackError> {
        self.start_playback(context_body(media_ref)).await
    }
}

fn single_body(media_ref: &str) -> Value {
    json!({ "uris": [media_ref] })
}

fn context_body(media_ref: &str) -> Value {
    json!({ "context_uri": media_ref })
}

/// Pull `error.message` out of a Web API error body, falling back to the raw
/// text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bodies() {
        assert_eq!(
            single_body("spotify:track:abc123"),
            json!({ "uris": ["spotify:track:abc123"] })
        );
        assert_eq!(
            context_body("spotify:album:xyz"),
            json!({ "context_uri": "spotify:album:xyz" })
        );
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"status":404,"message":"Player command failed: No active device found","reason":"NO_ACTIVE_DEVICE"}}"#;
        assert_eq!(
            error_message(body),
            "Player command failed: No active device found"
        );
        assert_eq!(error_message(" Bad gateway \n"), "Bad gateway");
    }

    #[tokio::test]
    async fn test_missing_session_fails_before_request() {
        let controller = SpotifyController::new(
            &SpotifyConfig {
                api_base: "http://127.0.0.1:9".into(),
                ..SpotifyConfig::default()
            },
            AuthSession::new(),
        )
        .unwrap();
        let err = controller.play_single("spotify:track:x").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Auth(_)));
    }
}
