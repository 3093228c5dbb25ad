//! Rank tiering: a pure mapping from published feed count to a user rank.

use super::{DomainError, DomainResult};

/// Feed counts at which each tier starts. A count exactly on a boundary
/// belongs to the higher tier.
pub const RANK_2_MIN_FEEDS: i64 = 10;
pub const RANK_3_MIN_FEEDS: i64 = 50;
pub const RANK_4_MIN_FEEDS: i64 = 100;
pub const RANK_5_MIN_FEEDS: i64 = 200;
pub const RANK_6_MIN_FEEDS: i64 = 500;

pub const MIN_RANK: i32 = 1;
pub const MAX_RANK: i32 = 6;

/// Map a published feed count to a rank tier in [MIN_RANK, MAX_RANK].
/// Negative counts are a caller bug, not a tier.
pub fn rank_for(feed_count: i64) -> DomainResult<i32> {
    if feed_count < 0 {
        return Err(DomainError::InvalidArgument(format!(
            "feed_count must be non-negative, got {feed_count}"
        )));
    }

    let rank = if feed_count < RANK_2_MIN_FEEDS {
        1
    } else if feed_count < RANK_3_MIN_FEEDS {
        2
    } else if feed_count < RANK_4_MIN_FEEDS {
        3
    } else if feed_count < RANK_5_MIN_FEEDS {
        4
    } else if feed_count < RANK_6_MIN_FEEDS {
        5
    } else {
        6
    };

    Ok(rank)
}
