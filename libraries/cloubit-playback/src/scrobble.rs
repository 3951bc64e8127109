//! Listening reports

use std::time::Duration;

use crate::error::Result;
use crate::types::TrackId;

/// Receives "listened for N seconds" reports when the session moves away
/// from a track
///
/// Fire-and-forget: implementations should hand the report to a background
/// task rather than block.
pub trait Scrobbler: Send + Sync {
    /// Report that `id` (queued from `source_tag`) was played up to `listened`
    fn scrobble(&self, id: TrackId, source_tag: i32, listened: Duration) -> Result<()>;
}
