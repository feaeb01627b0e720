//! Envelope module
//!
//! Divisible money pools: creation, concurrent claiming, refund of expired
//! stock, and the split policy deciding each share.

mod distributor;
mod model;
pub mod repository;
pub mod split;

pub use distributor::{
    EnvelopeDistributor, LinkSettings, Receiver, RefundOutcome, SendOut, DEFAULT_BLESSING,
    ENVELOPE_TTL_HOURS,
};
pub use model::{flag_luckiest, ClaimView, Envelope, EnvelopeActivity, EnvelopeClaim, NewEnvelope};

/// 1-based page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        assert_eq!(Page::default().offset(), 0);
        assert_eq!(Page::new(3, 20).offset(), 40);
        assert_eq!(Page::new(0, 0), Page::new(1, 1));
        assert_eq!(Page::new(1, 10_000).limit(), 100);
    }
}
