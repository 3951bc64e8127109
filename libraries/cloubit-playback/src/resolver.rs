//! Track URL resolution
//!
//! The HTTP client behind this trait lives outside the session; timeouts and
//! retries are its concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lyric::Lyric;
use crate::types::TrackId;

/// Playable location for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrl {
    pub url: String,
}

impl ResolvedUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Whether the engine can be pointed at this URL
    pub fn is_usable(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Resolves track ids to playable sources
///
/// `Ok(None)`, an empty URL and `Err(_)` are all treated the same way by the
/// session: the track is considered unplayable and skipped.
#[async_trait]
pub trait TrackUrlResolver: Send + Sync {
    /// Look up a playable URL for `id`
    async fn resolve(&self, id: TrackId) -> Result<Option<ResolvedUrl>>;

    /// Fetch the lyric for `id`
    ///
    /// Defaults to "no lyric".
    async fn fetch_lyric(&self, id: TrackId) -> Result<Option<Lyric>> {
        let _ = id;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_is_unusable() {
        assert!(ResolvedUrl::new("https://cdn/1.mp3").is_usable());
        assert!(!ResolvedUrl::new("").is_usable());
        assert!(!ResolvedUrl::new("   ").is_usable());
    }

    struct UrlOnly;

    #[async_trait]
    impl TrackUrlResolver for UrlOnly {
        async fn resolve(&self, id: TrackId) -> Result<Option<ResolvedUrl>> {
            Ok(Some(ResolvedUrl::new(format!("https://cdn/{}.mp3", id))))
        }
    }

    #[tokio::test]
    async fn lyric_defaults_to_none() {
        let resolver = UrlOnly;
        assert!(resolver.fetch_lyric(TrackId(1)).await.unwrap().is_none());
        assert_eq!(
            resolver.resolve(TrackId(1)).await.unwrap().unwrap().url,
            "https://cdn/1.mp3"
        );
    }
}
