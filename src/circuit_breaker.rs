use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Breaker guarding the profile site.
pub type ProfileSiteBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Consecutive failures that open the profile-site breaker.
pub const PROFILE_FAILURE_THRESHOLD: u32 = 5;

/// Creates a circuit breaker for profile page fetches so a site outage
/// degrades straight to the next biography source instead of timing out on
/// every handle variant.
///
/// # Configuration
///
/// - **Failure threshold**: `failures` consecutive transport errors or 5xx
///   responses trigger the OPEN state. A 404 is an answer, not a failure.
/// - **Backoff**: Exponential backoff from 30s to 5min before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if the site recovered.
pub fn create_profile_site_breaker(failures: u32) -> ProfileSiteBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(30),  // Initial delay
        Duration::from_secs(300), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(failures, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
