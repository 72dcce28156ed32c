use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use jukebox_core::binding::Binding;
use jukebox_core::error::RegistrationError;
use jukebox_core::registration::Registrar;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    registrar: Arc<Registrar>,
}

#[derive(Deserialize)]
struct RegisterForm {
    rfid_tag: String,
    spotify_uri: String,
}

#[derive(Serialize)]
struct ApiState {
    listening: bool,
    bindings: Vec<Binding>,
}

pub fn router(registrar: Arc<Registrar>) -> Router {
    Router::new()
        .route("/register", get(begin_register).post(commit_register))
        .route("/api/state", get(get_state))
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState { registrar })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    registrar: Arc<Registrar>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(registrar);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("Registration form at http://{}/register", addr);

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
        {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn begin_register(State(state): State<HttpState>) -> Response {
    info!("HTTP: registration started, waiting for a tag");
    match state.registrar.begin_registration().await {
        Ok(token_id) => Html(register_page(&token_id)).into_response(),
        Err(e) => {
            error!("HTTP: tag read failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(message_page("Could not read a tag.")),
            )
                .into_response()
        }
    }
}

async fn commit_register(
    State(state): State<HttpState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let token_id = form.rfid_tag.trim();
    match state
        .registrar
        .commit_registration(token_id, &form.spotify_uri)
        .await
    {
        Ok(outcome) => Html(message_page(outcome.message())).into_response(),
        Err(RegistrationError::InvalidLink(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(message_page("Invalid Spotify URL.")),
        )
            .into_response(),
        Err(e) => {
            error!("HTTP: saving binding for {} failed: {}", token_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(message_page("Could not save the mapping.")),
            )
                .into_response()
        }
    }
}

async fn get_state(State(state): State<HttpState>) -> Result<Json<ApiState>, StatusCode> {
    let bindings = state.registrar.store().list().await.map_err(|e| {
        error!("HTTP: listing bindings failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ApiState {
        listening: state.registrar.coordinator().is_listening(),
        bindings,
    }))
}

fn register_page(token_id: &str) -> String {
    let token_id = escape(token_id);
    format!(
        r#"<!doctype html>
<html><body>
<h1>Register tag</h1>
<p>Scanned tag: <strong>{token_id}</strong></p>
<form method="post" action="/register">
  <input type="hidden" name="rfid_tag" value="{token_id}">
  <label>Spotify link <input type="url" name="spotify_uri" size="60" required></label>
  <button type="submit">Save</button>
</form>
</body></html>"#
    )
}

fn message_page(message: &str) -> String {
    format!(
        "<!doctype html>\n<html><body>\n<p>{}</p>\n<p><a href=\"/register\">Register another tag</a></p>\n</body></html>",
        escape(message)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use jukebox_core::binding::MediaKind;
    use jukebox_core::coordinator::Coordinator;
    use jukebox_core::error::ReaderError;
    use jukebox_core::reader::TagReader;
    use jukebox_core::store::MappingStore;
    use tower::ServiceExt;

    struct OneTag(&'static str);

    impl TagReader for OneTag {
        fn poll(&self) -> Result<Option<String>, ReaderError> {
            Ok(None)
        }

        fn read_blocking(&self) -> Result<String, ReaderError> {
            Ok(self.0.to_string())
        }

        fn release(&self) {}
    }

    async fn app() -> (Router, Arc<Registrar>) {
        let registrar = Arc::new(Registrar::new(
            Arc::new(Coordinator::new()),
            Arc::new(OneTag("584190")),
            MappingStore::open_in_memory().await.unwrap(),
            None,
        ));
        (router(registrar.clone()), registrar)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(body: &'static str) -> Request<Body> {
        Request::post("/register")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_register_pauses_and_shows_tag() {
        let (app, registrar) = app().await;

        let response = app
            .oneshot(Request::get("/register").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("value=\"584190\""));
        assert!(!registrar.coordinator().is_listening());
    }

    #[tokio::test]
    async fn test_post_register_creates_then_updates() {
        let (app, registrar) = app().await;
        let form = "rfid_tag=584190&spotify_uri=https%3A%2F%2Fopen.spotify.com%2Ftrack%2Fabc123";

        let response = app.clone().oneshot(post_form(form)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("New mapping created successfully!"));

        let response = app.oneshot(post_form(form)).await.unwrap();
        assert!(body_text(response).await.contains("Mapping updated successfully!"));

        let b = registrar.store().get("584190").await.unwrap().unwrap();
        assert_eq!(b.media_ref, "spotify:track:abc123");
    }

    #[tokio::test]
    async fn test_post_register_invalid_link() {
        let (app, registrar) = app().await;

        let response = app
            .oneshot(post_form("rfid_tag=584190&spotify_uri=https%3A%2F%2Fhost%2Fbadpath"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("Invalid Spotify URL."));
        assert!(registrar.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_state() {
        let (app, registrar) = app().await;
        registrar
            .store()
            .upsert("584190", "spotify:album:xyz", MediaKind::Album)
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["listening"], true);
        assert_eq!(json["bindings"][0]["token_id"], "584190");
        assert_eq!(json["bindings"][0]["media_ref"], "spotify:album:xyz");
        assert_eq!(json["bindings"][0]["kind"], "album");
    }
}
