// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ofd` — optical-flow fleet daemon.

use tracing_subscriber::EnvFilter;

use of_daemon::lifecycle::{self, Config};

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("OF_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match of_daemon::env::log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ofd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), lifecycle::DaemonError> {
    // hold the appender guard so buffered log lines flush on exit
    let _guard = init_tracing();
    lifecycle::run(Config::from_env()).await
}
