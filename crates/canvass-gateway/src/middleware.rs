//! Gateway middleware.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;

/// Per-account throttle on login attempts.
///
/// Keyed by normalized email so an attacker cannot dodge it by varying case.
pub struct LoginRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `attempts_per_minute` per account.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Record an attempt for `email`; false once the quota is exhausted.
    #[must_use]
    pub fn check(&self, email: &str) -> bool {
        self.limiter
            .check_key(&canvass_core::validation::normalize_email(email))
            .is_ok()
    }

    /// Drop idle keys.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("tracked", &self.limiter.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_per_account() {
        let limiter = LoginRateLimiter::new(2);
        assert!(limiter.check("ana@campaign.org"));
        assert!(limiter.check("ANA@campaign.org"));
        assert!(!limiter.check(" ana@campaign.org"));

        // Other accounts are unaffected.
        assert!(limiter.check("bob@campaign.org"));
    }
}
