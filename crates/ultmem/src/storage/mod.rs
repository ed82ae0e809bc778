pub mod record;
pub mod tiers;

pub use tiers::{TierStats, TierStore, TierUsage};
