//! Runs a few waits behind a terminal spinner
//!
//! Press Ctrl-C while the cancelable wait is showing to cancel it. Set
//! `RUST_LOG=debug` to follow the wait lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use wait_indicator::{
    join_operations, CancellationToken, ForegroundThread, OperationError, WaitIndicator,
    WaitIndicatorConfig, WaitRequest,
};
use wait_reporters::{SpinnerConfig, SpinnerDialogService};

/// Pretends to restore one package
async fn restore(package: &'static str, token: CancellationToken) -> Result<&'static str, OperationError> {
    for _ in 0..20 {
        if token.is_cancelled() {
            return Err(OperationError::Canceled);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(package)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = WaitIndicatorConfig::new().with_foreground_thread_name("console-foreground")?;
    let spinner = SpinnerDialogService::with_config(
        indicatif::MultiProgress::new(),
        SpinnerConfig::new().with_tick_interval(Duration::from_millis(80))?,
    )?;

    let cancel = spinner.cancel_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !cancel.cancel() {
                println!("nothing to cancel");
            }
        }
    });

    let indicator = Arc::new(WaitIndicator::with_config(
        Arc::new(ForegroundThread::from_config(&config)?),
        Arc::new(spinner),
        config,
    )?);
    indicator.activate().await;

    let waiter = indicator.clone();
    tokio::task::spawn_blocking(move || -> Result<(), wait_indicator::WaitError> {
        let checksum = waiter.wait_for_operation(
            &WaitRequest::new("Verifying", "hashing lock file"),
            Some(|_token| {
                std::thread::sleep(Duration::from_millis(800));
                Ok(0x5eed_u32)
            }),
        )?;
        println!("lock file checksum: {checksum:#x}");

        let (outcome, restored) = waiter.wait_for_async_operation_with_result(
            &WaitRequest::new("Restoring", "restoring packages").cancelable(true),
            Some(|token: CancellationToken| async move {
                let packages = ["serde", "tokio", "tracing"]
                    .into_iter()
                    .map(|package| tokio::spawn(restore(package, token.clone())));
                join_operations(packages.map(|handle| async move { handle.await? })).await
            }),
        )?;
        println!("restore {outcome:?}: {restored:?}");
        Ok(())
    })
    .await??;

    indicator.deactivate().await;
    Ok(())
}
