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

//! Multi-tenant process-execution daemon.
//!
//! Clients authenticated by mutual TLS submit command lines to be spawned
//! under enforced CPU, memory and I/O limits. Any number of concurrent
//! clients may stop a job or tail its combined standard output from the
//! first byte, even when they connect long after the process exited.

// Lint groups: https://doc.rust-lang.org/rustc/lints/groups.html
#![warn(future_incompatible, nonstandard_style, unused)]
#![warn(
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    unconditional_recursion,
    unused_comparisons,
    while_true
)]
#![warn(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
#![warn(clippy::unwrap_used)]

use crate::auth::Authorizer;
use crate::jobs::{IoDevice, JobRuntime, JobService, Registry};
use anyhow::Context;
use proto::jobs::job_service_server::JobServiceServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{error, info, trace};

pub mod auth;
pub mod jobs;
pub mod tls;

mod graceful_shutdown;

/// Default TCP bind address for the daemon.
pub const DEFAULT_SOCKET: &str = "[::]:8080";

/// Default v2 cgroup mount the per-job hierarchies are created under. The
/// mount must exist and be writable by the service.
pub const DEFAULT_CGROUP_ROOT: &str = "/lib_cgroup";

/// Default exit code for successful termination of hatchd.
pub const EXIT_OKAY: i32 = 0;

/// Default exit code for a runtime error of hatchd.
pub const EXIT_ERROR: i32 = 1;

/// Each instance of hatchd holds internal state in memory. Below are the
/// settings which can be configured for a given daemon instance.
///
/// Note: the certificate fields are file paths, not the material itself;
/// they are read from the local filesystem when the server starts.
#[derive(Debug, Clone)]
pub struct HatchdRuntime {
    /// Certificate Authority that signed the client certificates.
    pub ca_crt: PathBuf,
    /// The signed server X509 certificate for this instance.
    pub server_crt: PathBuf,
    /// The secret key for this instance.
    pub server_key: PathBuf,
    /// TCP address to serve on.
    pub socket: String,
    /// v2 cgroup mount point for per-job hierarchies.
    pub cgroup_root: PathBuf,
    /// Path to the cradle helper executable.
    pub cradle: PathBuf,
    /// Block device write-iops caps apply to.
    pub io_device: IoDevice,
}

impl Default for HatchdRuntime {
    fn default() -> Self {
        Self {
            ca_crt: PathBuf::from("/etc/hatch/pki/ca.crt"),
            server_crt: PathBuf::from("/etc/hatch/pki/_signed.server.crt"),
            server_key: PathBuf::from("/etc/hatch/pki/server.key"),
            socket: DEFAULT_SOCKET.to_string(),
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            cradle: default_cradle_path(),
            io_device: IoDevice::default(),
        }
    }
}

/// The cradle is installed beside the daemon binary unless configured
/// otherwise.
pub fn default_cradle_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("cradle")))
        .unwrap_or_else(|| PathBuf::from("cradle"))
}

/// Starts the server loop and runs until a shutdown signal arrives. All
/// jobs are killed and their supervisors joined before this returns.
pub async fn run(
    runtime: HatchdRuntime,
    authz: Authorizer,
) -> anyhow::Result<()> {
    trace!("{:#?}", runtime);

    let acceptor = tls::load_acceptor(
        &runtime.ca_crt,
        &runtime.server_crt,
        &runtime.server_key,
    )
    .await
    .context("loading TLS material")?;
    info!("Registered server TLS identity");

    let addr: SocketAddr = runtime
        .socket
        .parse()
        .with_context(|| format!("invalid socket address '{}'", runtime.socket))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    let registry = Arc::new(Registry::new(JobRuntime {
        cradle: runtime.cradle.clone(),
        cgroup_root: runtime.cgroup_root.clone(),
    }));

    // Build gRPC services
    let (mut health_reporter, health_service) =
        tonic_health::server::health_reporter();

    let job_service =
        JobService::new(registry.clone(), authz, runtime.io_device);
    let job_service_server =
        JobServiceServer::with_interceptor(job_service, auth::interceptor);
    health_reporter.set_serving::<JobServiceServer<JobService>>().await;

    let graceful_shutdown =
        graceful_shutdown::GracefulShutdown::new(health_reporter, registry);
    let graceful_shutdown_signal = graceful_shutdown.subscribe();

    // Run the server concurrently
    let incoming = tls::incoming(listener, acceptor);
    let server_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(health_service)
            .add_service(job_service_server)
            .serve_with_incoming_shutdown(incoming, async {
                let mut graceful_shutdown_signal = graceful_shutdown_signal;
                let _ = graceful_shutdown_signal.changed().await;
                info!("gRPC server received shutdown signal...");
            })
            .await?;

        info!("gRPC server exited successfully");

        Ok::<_, tonic::transport::Error>(())
    });

    let graceful_shutdown_handle =
        tokio::spawn(async { graceful_shutdown.wait().await });

    let (server_result, _) =
        tokio::try_join!(server_handle, graceful_shutdown_handle)?;

    if let Err(e) = server_result {
        error!("gRPC server exited with error: {e}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runtime_points_at_the_standard_cgroup_mount() {
        let runtime = HatchdRuntime::default();
        assert_eq!(runtime.cgroup_root, PathBuf::from("/lib_cgroup"));
        assert_eq!(runtime.socket, "[::]:8080");
    }
}
