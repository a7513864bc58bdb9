/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

use crate::jobs::{JobService, Registry};
use proto::jobs::job_service_server::JobServiceServer;
use std::borrow::BorrowMut;
use std::sync::Arc;
use tokio::{
    signal::unix::SignalKind,
    sync::watch::{channel, Receiver, Sender},
};
use tonic_health::server::HealthReporter;
use tracing::info;

pub(crate) struct GracefulShutdown {
    health_reporter: HealthReporter,
    registry: Arc<Registry>,
    shutdown_broadcaster: Sender<()>,
}

impl GracefulShutdown {
    pub fn new(
        health_reporter: HealthReporter,
        registry: Arc<Registry>,
    ) -> Self {
        let (tx, _) = channel(());
        Self { health_reporter, registry, shutdown_broadcaster: tx }
    }

    /// Subscribe to the shutdown broadcast channel
    pub fn subscribe(&self) -> Receiver<()> {
        self.shutdown_broadcaster.subscribe()
    }

    /// Waits for SIGTERM or SIGINT and then...
    /// * Flips the health service to NOT_SERVING
    /// * Broadcasts a shutdown signal to all subscribers. See [Self::subscribe]
    /// * Waits for all subscribers to drop
    /// * Kills every job and joins every supervisor via [Registry::shutdown]
    ///
    /// Returns after processing the first received signal.
    pub async fn wait(mut self) {
        tokio::select! {
            _ = wait_for_sigterm() => {},
            _ = wait_for_sigint() => {},
        }
        info!("shutdown signal received");

        let health_reporter = self.health_reporter.borrow_mut();
        health_reporter
            .set_not_serving::<JobServiceServer<JobService>>()
            .await;

        self.shutdown_broadcaster.send_replace(());
        // wait for all subscribers to drop
        self.shutdown_broadcaster.closed().await;

        self.registry.shutdown().await;
    }
}

pub async fn wait_for_sigterm() {
    let mut stream = tokio::signal::unix::signal(SignalKind::terminate())
        .expect("failed to listen for SIGTERM");

    let _ = stream.recv().await;
}

pub async fn wait_for_sigint() {
    let mut stream = tokio::signal::unix::signal(SignalKind::interrupt())
        .expect("failed to listen for SIGINT");

    let _ = stream.recv().await;
}
