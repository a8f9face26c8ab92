//! Shared HTTP agent setup

use std::time::Duration;

/// Timeout applied to every request, connect to last body byte
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a blocking agent that hands back non-2xx responses
///
/// Status codes are classified by the API clients themselves (rate limits,
/// rejected messages) so they must not be turned into transport errors.
pub fn agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build();
    ureq::Agent::new_with_config(config)
}
