//! Staged connectivity check
//!
//! Runs the stages in order, stops running real work after the first
//! failure (later stages are recorded as skipped), prints each result as it
//! lands and finishes with a summary, failure details and suggestions.

use std::path::Path;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use gc_client::handshake::attempt_tcp;
use gc_client::probe::{probe_local_forward, probe_tcp};
use gc_client::{
    connect_with_retry, AttemptReport, ConnectTemplate, ExponentialBackoff, HandshakeOutcome,
    TcpTransport,
};
use gc_core::config::GatecheckConfig;
use gc_core::time::duration_ms;
use gc_core::{DeviceInfo, Transport};

use super::connect_template;
use crate::output::{
    format_counts, format_failures, format_summary_table, print_info, print_stage, print_success,
    print_warning, rule,
};
use crate::report::{CheckReport, StageResult, StageStatus, Summary};

pub const STAGE_TUNNEL: &str = "tunnel";
pub const STAGE_REACHABILITY: &str = "reachability";
pub const STAGE_TRANSPORT: &str = "transport";
pub const STAGE_HANDSHAKE: &str = "handshake";

/// Results of a full run
#[derive(Debug)]
pub struct StageRun {
    pub results: Vec<StageResult>,
    /// Identity used by the handshake stage, if it ran with one
    pub device: Option<DeviceInfo>,
}

/// Stage names in run order for this configuration
pub fn planned_stages(config: &GatecheckConfig) -> Vec<&'static str> {
    let mut stages = Vec::with_capacity(4);
    if config.tunnel.enabled {
        stages.push(STAGE_TUNNEL);
    }
    stages.extend([STAGE_REACHABILITY, STAGE_TRANSPORT, STAGE_HANDSHAKE]);
    stages
}

/// Run every stage, calling `on_stage` as each result is produced
pub async fn run_stages<F>(
    config: &GatecheckConfig,
    template: ConnectTemplate,
    retries: u32,
    cancel: &CancellationToken,
    mut on_stage: F,
) -> StageRun
where
    F: FnMut(&StageResult),
{
    let mut results = Vec::new();
    let mut device = None;
    let mut failed_stage: Option<&'static str> = None;

    for stage in planned_stages(config) {
        let result = if let Some(failed) = failed_stage {
            StageResult::skip(stage, format!("skipped: {} failed", failed))
        } else if cancel.is_cancelled() {
            StageResult::skip(stage, "skipped: cancelled")
        } else {
            match stage {
                STAGE_TUNNEL => tunnel_stage(config).await,
                STAGE_REACHABILITY => reachability_stage(config).await,
                STAGE_TRANSPORT => transport_stage(config).await,
                _ => {
                    let (result, used) =
                        handshake_stage(config, template.clone(), retries, cancel).await;
                    device = used;
                    result
                }
            }
        };

        if result.status == StageStatus::Fail && failed_stage.is_none() {
            failed_stage = Some(stage);
        }
        on_stage(&result);
        results.push(result);
    }

    StageRun { results, device }
}

async fn tunnel_stage(config: &GatecheckConfig) -> StageResult {
    let port = config.gateway.port;
    let started = Instant::now();
    let probed = probe_local_forward(port, config.tunnel.probe_timeout).await;
    let elapsed = started.elapsed();

    let result = match probed {
        Ok(_) => StageResult::pass(
            STAGE_TUNNEL,
            elapsed,
            format!("Local forward listening on 127.0.0.1:{}", port),
        ),
        Err(e) => StageResult::fail(
            STAGE_TUNNEL,
            elapsed,
            format!("No local forward on 127.0.0.1:{}: {}", port, e),
        ),
    };

    let result = result.with_detail("local_port", port);
    match config.tunnel.ssh_command(port) {
        Some(command) => result.with_detail("ssh_command", command),
        None => result,
    }
}

async fn reachability_stage(config: &GatecheckConfig) -> StageResult {
    let endpoint = config.gateway.endpoint();
    let started = Instant::now();
    let probed = probe_tcp(&endpoint, config.probe.timeout).await;
    let elapsed = started.elapsed();

    let result = match probed {
        Ok(latency) => StageResult::pass(
            STAGE_REACHABILITY,
            elapsed,
            format!("TCP connect to {} succeeded", endpoint),
        )
        .with_detail("latency_ms", duration_ms(latency)),
        Err(e) => StageResult::fail(STAGE_REACHABILITY, elapsed, e.to_string()),
    };
    result.with_detail("address", endpoint.address())
}

async fn transport_stage(config: &GatecheckConfig) -> StageResult {
    let mut transport = TcpTransport::new(config.gateway.endpoint(), config.probe.timeout);
    let peer = transport.peer();
    let started = Instant::now();

    let result = match transport.open().await {
        Ok(()) => {
            let elapsed = started.elapsed();
            if let Err(e) = transport.close().await {
                tracing::debug!("Closing {} after transport check: {}", peer, e);
            }
            StageResult::pass(STAGE_TRANSPORT, elapsed, format!("Opened {}", peer))
        }
        Err(e) => StageResult::fail(STAGE_TRANSPORT, started.elapsed(), e.to_string()),
    };
    result.with_detail("peer", peer)
}

async fn handshake_stage(
    config: &GatecheckConfig,
    template: ConnectTemplate,
    retries: u32,
    cancel: &CancellationToken,
) -> (StageResult, Option<DeviceInfo>) {
    let backoff = ExponentialBackoff::from_config(&config.retry);
    let started = Instant::now();
    let mut attempts = 0u32;

    let report = connect_with_retry(
        |number| {
            attempts = number;
            attempt_tcp(config, template.clone(), cancel.clone())
        },
        backoff,
        retries.saturating_add(1),
        cancel,
    )
    .await;

    let result = handshake_result(config, &report, started.elapsed())
        .with_detail("attempts", attempts);
    (result, report.device)
}

fn handshake_result(
    config: &GatecheckConfig,
    report: &AttemptReport,
    elapsed: std::time::Duration,
) -> StageResult {
    let result = match &report.outcome {
        HandshakeOutcome::Succeeded(hello) => StageResult::pass(
            STAGE_HANDSHAKE,
            elapsed,
            format!("hello-ok, protocol {}", hello.protocol_version),
        )
        .with_detail("protocol", hello.protocol_version)
        .with_detail("device_token_issued", !hello.device_token.is_empty()),
        HandshakeOutcome::Failed(failure) => {
            StageResult::fail(STAGE_HANDSHAKE, elapsed, failure.error.to_string())
                .with_detail("stage", failure.stage.as_str())
                .with_detail("error_kind", failure.error.kind())
        }
    };

    let result = result
        .with_detail("device_auth", config.handshake.device_auth)
        .with_detail("ignored_frames", report.ignored_frames);
    match config.gateway.masked_token() {
        Some(masked) => result.with_detail("token", masked),
        None => result,
    }
}

/// Suggestions for the first failed stage
pub fn suggestions(config: &GatecheckConfig, results: &[StageResult]) -> Vec<String> {
    let Some(failed) = results.iter().find(|r| r.status == StageStatus::Fail) else {
        return Vec::new();
    };

    let host = &config.gateway.host;
    let port = config.gateway.port;
    let ssh_target = format!(
        "{}@{}",
        config.tunnel.ssh_user,
        config.tunnel.ssh_host.as_deref().unwrap_or(host)
    );
    let mut tips = Vec::new();

    match failed.name.as_str() {
        STAGE_TUNNEL => {
            match config.tunnel.ssh_command(port) {
                Some(command) => tips.push(format!("Start the SSH tunnel: {}", command)),
                None => tips.push(
                    "Set tunnel.ssh_host (or pass --ssh-host) and start the SSH tunnel"
                        .to_string(),
                ),
            }
            tips.push(format!(
                "Check that nothing else is bound to local port {}",
                port
            ));
        }
        STAGE_REACHABILITY => {
            tips.push(format!("Check that the gateway is running on {}", host));
            tips.push(format!("Check that port {} is open in the firewall", port));
            tips.push(format!("Check that {} is reachable from this machine", host));
            if !config.tunnel.enabled && !config.gateway.endpoint().is_loopback() {
                tips.push(format!(
                    "Or reach it through an SSH tunnel: ssh -N -L {}:127.0.0.1:{} {} and use --tunnel",
                    port, config.tunnel.remote_port, ssh_target
                ));
            }
        }
        STAGE_TRANSPORT => {
            tips.push("Check that the gateway is accepting connections".to_string());
            tips.push(format!("Check the gateway logs: ssh {}", ssh_target));
        }
        _ => handshake_suggestions(config, failed, &ssh_target, &mut tips),
    }

    tips
}

fn handshake_suggestions(
    config: &GatecheckConfig,
    failed: &StageResult,
    ssh_target: &str,
    tips: &mut Vec<String>,
) {
    let detail = |key: &str| failed.details.get(key).and_then(|v| v.as_str()).unwrap_or("");

    match (detail("error_kind"), detail("stage")) {
        ("timeout", "awaiting_challenge") => {
            tips.push("No challenge arrived before the timeout".to_string());
            tips.push(format!(
                "Check that port {} serves the gateway protocol",
                config.gateway.port
            ));
            tips.push("The token may be invalid or the device may need pairing approval".to_string());
        }
        ("timeout", _) => {
            tips.push("The gateway never answered the connect request".to_string());
            tips.push("The token may be invalid or the device may need pairing approval".to_string());
        }
        ("rejected", _) => {
            tips.push("Check that the gateway token is valid and not expired".to_string());
            if config.handshake.device_auth {
                tips.push("A new device may need pairing approval on the gateway".to_string());
            } else {
                tips.push(
                    "The gateway may require device auth: retry without --no-device".to_string(),
                );
            }
            tips.push("Check the gateway auth mode".to_string());
        }
        ("version_mismatch", _) => {
            tips.push(format!(
                "This client accepts protocol {}..{}; update gatecheck or adjust [protocol]",
                config.protocol.min, config.protocol.max
            ));
        }
        ("decode", _) | ("malformed_success", _) => {
            tips.push("The gateway sent frames this client could not understand".to_string());
            tips.push("Check that the gateway version matches this client".to_string());
        }
        ("encode", _) => {
            tips.push(
                "The connect request could not be built; check the [client] settings".to_string(),
            );
        }
        ("crypto", _) => {
            tips.push("Device key generation failed; retry with --no-device".to_string());
        }
        ("cancelled", _) => return,
        _ => {
            tips.push("The connection dropped during the handshake".to_string());
        }
    }
    tips.push(format!("Inspect the gateway: ssh {}", ssh_target));
}

/// Run the full check and print the report.
///
/// Writes the JSON report to `report_path` when given. Returns whether
/// every stage passed.
pub async fn check_command(
    config: &GatecheckConfig,
    retries: u32,
    report_path: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<bool> {
    let template = connect_template(config)?;
    let endpoint = config.gateway.endpoint();

    println!("{}", rule());
    println!("Gateway check: {}", endpoint);
    println!(
        "Token: {}  Device auth: {}",
        config.gateway.masked_token().unwrap_or_default(),
        if config.handshake.device_auth { "on" } else { "off" }
    );
    println!("{}", rule());

    let run = run_stages(config, template, retries, cancel, print_stage).await;
    let summary = Summary::from_results(&run.results);

    println!();
    println!("{}", format_summary_table(&run.results));
    println!("{}", format_counts(&summary));

    if summary.failed > 0 {
        println!();
        println!("Failures:");
        print!("{}", format_failures(&run.results));

        let tips = suggestions(config, &run.results);
        if !tips.is_empty() {
            println!();
            println!("Suggestions:");
            for (i, tip) in tips.iter().enumerate() {
                println!("  {}. {}", i + 1, tip);
            }
        }
    }

    if let Some(path) = report_path {
        let report = CheckReport::new(endpoint, run.device, run.results);
        report.write_to(path)?;
        print_info(&format!("Report written to {}", path.display()));
    }

    println!();
    if summary.all_passed() {
        print_success("All checks passed");
    } else {
        print_warning(&format!("{} of {} checks failed", summary.failed, summary.total));
    }

    Ok(summary.all_passed())
}
