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

// Lint groups: https://doc.rust-lang.org/rustc/lints/groups.html
#![warn(future_incompatible, nonstandard_style, unused)]
#![warn(clippy::unwrap_used)]

use clap::Parser;
use hatchd::auth::Authorizer;
use hatchd::jobs::IoDevice;
use hatchd::{HatchdRuntime, EXIT_ERROR, EXIT_OKAY};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line options for hatchd.
///
/// Defines the configurable options which can be used to populate
/// a HatchdRuntime structure.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct HatchdOptions {
    /// The signed server certificate. Defaults to /etc/hatch/pki/_signed.server.crt
    #[clap(
        long,
        value_parser,
        default_value = "/etc/hatch/pki/_signed.server.crt"
    )]
    server_crt: String,
    /// The secret server key. Defaults to /etc/hatch/pki/server.key
    #[clap(long, value_parser, default_value = "/etc/hatch/pki/server.key")]
    server_key: String,
    /// The CA certificate. Defaults to /etc/hatch/pki/ca.crt
    #[clap(long, value_parser, default_value = "/etc/hatch/pki/ca.crt")]
    ca_crt: String,
    /// TCP address to serve on. Defaults to [::]:8080
    #[clap(short, long, value_parser, default_value = hatchd::DEFAULT_SOCKET)]
    socket: String,
    /// v2 cgroup mount point per-job hierarchies are created under.
    #[clap(long, value_parser, default_value = hatchd::DEFAULT_CGROUP_ROOT)]
    cgroup_root: String,
    /// Path to the cradle helper. Defaults to a 'cradle' executable beside
    /// this binary.
    #[clap(long, value_parser)]
    cradle: Option<String>,
    /// Block device (major:minor) that write-iops caps apply to.
    #[clap(long, value_parser, default_value = "8:0")]
    io_device: String,
    /// Toggle verbosity. Default false
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    std::process::exit(daemon().await);
}

async fn daemon() -> i32 {
    let options = HatchdOptions::parse();

    let default_level = if options.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting hatchd");
    info!("hatchd is pid {}", std::process::id());

    let io_device = match parse_io_device(&options.io_device) {
        Ok(io_device) => io_device,
        Err(e) => {
            error!("{e}");
            return EXIT_ERROR;
        }
    };

    let runtime = HatchdRuntime {
        ca_crt: PathBuf::from(options.ca_crt),
        server_crt: PathBuf::from(options.server_crt),
        server_key: PathBuf::from(options.server_key),
        socket: options.socket,
        cgroup_root: PathBuf::from(options.cgroup_root),
        cradle: options
            .cradle
            .map(PathBuf::from)
            .unwrap_or_else(hatchd::default_cradle_path),
        io_device,
    };

    match hatchd::run(runtime, Authorizer::with_fixture_users()).await {
        Ok(()) => EXIT_OKAY,
        Err(e) => {
            error!("{e:?}");
            EXIT_ERROR
        }
    }
}

fn parse_io_device(value: &str) -> Result<IoDevice, String> {
    let (major, minor) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid io device '{value}', want major:minor"))?;
    let major = major
        .parse()
        .map_err(|_| format!("invalid io device major '{major}'"))?;
    let minor = minor
        .parse()
        .map_err(|_| format!("invalid io device minor '{minor}'"))?;
    Ok(IoDevice { major, minor })
}
