// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! Demonstrates `nursery::Scope` end to end: a handful of workers run inside
//! a scope until Ctrl-C arrives, at which point the scope closes and cancels
//! whichever workers are still running. Grounded on the teacher's
//! `bin/inx-chronicle/src/main.rs`.

use clap::Parser;
use nursery::{cli::ClArgs, config::Config, ErrorLevel, IsCancellation, Scope, Unmask};

#[derive(Debug, thiserror::Error, Clone)]
enum DemoError {
    #[error("failed to load config: {0}")]
    Config(String),
    #[error(transparent)]
    Spawn(#[from] nursery::SpawnError),
}

impl IsCancellation for DemoError {
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl ErrorLevel for DemoError {
    fn level(&self) -> log::Level {
        match self {
            DemoError::Config(_) => log::Level::Error,
            DemoError::Spawn(err) => err.level(),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    std::panic::set_hook(Box::new(|info| {
        log::error!("panic: {info}");
    }));

    if let Err(err) = run().await {
        log::log!(err.level(), "demo exited with an error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), DemoError> {
    let args = ClArgs::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).map_err(|err| DemoError::Config(err.to_string()))?,
        None => Config::default(),
    };
    config.apply_cli_args(&args);

    log::info!("starting {} demo worker(s)", config.worker_count);

    Scope::open(|scope| async move {
        for id in 0..config.worker_count {
            scope.spawn_detached_with_unmask(move |unmask| async move { worker(id, unmask).await })?;
        }

        shutdown_signal().await;
        log::info!("shutdown signal received, closing scope");
        Ok(())
    })
    .await
}

async fn worker(id: u32, unmask: Unmask) -> Result<(), DemoError> {
    let mut ticks = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        if unmask.unmask(ticks.tick()).await.is_err() {
            log::debug!("worker {id} cancelled");
            return Ok(());
        }
        log::info!("worker {id} tick");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
