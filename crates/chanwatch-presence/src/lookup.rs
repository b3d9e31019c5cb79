//! Initial membership lookup performed once when an observer starts.

use crate::error::LookupError;
use chanwatch_types::{ChannelId, MemberId};
use std::future::Future;

/// Source of the members already present in a channel.
///
/// Implementations query the platform (or any stand-in for it) for the
/// current occupants of `channel_id`. The observer calls this at most once.
pub trait MemberLookup {
    fn fetch_current_members(
        &self,
        channel_id: &ChannelId,
    ) -> impl Future<Output = Result<Vec<MemberId>, LookupError>> + Send;
}
