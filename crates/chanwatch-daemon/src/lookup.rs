//! Initial member lookup backed by a JSON file.

use chanwatch_presence::{LookupError, MemberLookup};
use chanwatch_types::{ChannelId, MemberId};
use std::path::PathBuf;

/// Reads the channel's current members from a JSON array of ids.
///
/// Stands in for a platform query when the daemon is fed from a recorded
/// or piped transition stream.
#[derive(Debug, Clone)]
pub struct FileLookup {
    path: PathBuf,
}

impl FileLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemberLookup for FileLookup {
    async fn fetch_current_members(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<MemberId>, LookupError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| LookupError::Unavailable(format!("{}: {e}", self.path.display())))?;

        let members: Vec<MemberId> = serde_json::from_str(&contents)
            .map_err(|e| LookupError::Malformed(format!("{}: {e}", self.path.display())))?;

        tracing::debug!(
            channel = %channel_id,
            path = %self.path.display(),
            count = members.len(),
            "loaded initial members"
        );
        Ok(members)
    }
}
