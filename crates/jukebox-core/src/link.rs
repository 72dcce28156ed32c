//! Share-link parsing.
//!
//! `https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3?si=abc` becomes
//! `("spotify:album:1DFixLWuPkv3KT3TnV35m3", MediaKind::Album)`. Only the
//! first two path segments matter; host, query and fragment are ignored.

use reqwest::Url;

use crate::binding::MediaKind;
use crate::error::LinkError;

pub const URI_SCHEME: &str = "spotify";

pub fn parse(link: &str) -> Result<(String, MediaKind), LinkError> {
    let url = Url::parse(link.trim()).map_err(|_| LinkError::Malformed(link.to_string()))?;

    let mut segments = url.path().trim_matches('/').split('/');
    let (kind, id) = match (segments.next(), segments.next()) {
        (Some(kind), Some(id)) if !kind.is_empty() && !id.is_empty() => (kind, id),
        _ => return Err(LinkError::MissingSegments(url.path().to_string())),
    };

    let kind: MediaKind = kind.parse().map_err(LinkError::UnknownKind)?;
    Ok((media_ref(kind, id), kind))
}

pub fn media_ref(kind: MediaKind, id: &str) -> String {
    format!("{}:{}:{}", URI_SCHEME, kind, id)
}
