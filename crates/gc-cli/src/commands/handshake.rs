//! Single handshake attempt

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use gc_client::handshake::attempt_tcp;
use gc_client::{connect_with_retry, ExponentialBackoff};
use gc_core::config::GatecheckConfig;

use super::connect_template;
use crate::output::{format_attempt, print_error, print_info, print_success};

/// Run one handshake (retrying up to `retries` more times on transient
/// failures) and print the outcome.
///
/// Returns whether the handshake succeeded.
pub async fn handshake_command(
    config: &GatecheckConfig,
    retries: u32,
    cancel: &CancellationToken,
) -> Result<bool> {
    let template = connect_template(config)?;
    let backoff = ExponentialBackoff::from_config(&config.retry);

    print_info(&format!("Connecting to {}", config.gateway.endpoint()));

    let report = connect_with_retry(
        |number| {
            if number > 1 {
                print_info(&format!("Attempt {}", number));
            }
            attempt_tcp(config, template.clone(), cancel.clone())
        },
        backoff,
        retries.saturating_add(1),
        cancel,
    )
    .await;

    print!("{}", format_attempt(&report));

    match report.outcome.failure() {
        None => {
            print_success("Handshake succeeded");
            Ok(true)
        }
        Some(failure) => {
            print_error(&format!("Handshake failed: {}", failure));
            Ok(false)
        }
    }
}
