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

//! Operator CLI for hatchd: start, inspect, stop and tail jobs.

#![warn(future_incompatible, nonstandard_style, unused)]
#![warn(clippy::unwrap_used)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use client::{Client, HatchConfig};
use proto::jobs::job_service_client::JobServiceClient;
use proto::jobs::{GetRequest, StartRequest, StopRequest, StreamRequest};
use std::io::Write;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct HatchctlOptions {
    /// Path to the CA certificate file.
    #[clap(long, value_parser, global = true)]
    ca_cert: Option<String>,
    /// Path to the client certificate file.
    #[clap(long, value_parser, global = true)]
    client_cert: Option<String>,
    /// Path to the client key file.
    #[clap(long, value_parser, global = true)]
    client_key: Option<String>,
    /// Target address of the server.
    #[clap(long, value_parser, global = true)]
    target: Option<String>,
    #[clap(subcommand)]
    subcmd: SubCommands,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    /// Show a job's id, command and status.
    Get {
        #[clap(long, value_parser)]
        id: i32,
    },
    /// Start a job from the trailing command line.
    Start {
        #[clap(
            value_parser,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true
        )]
        cmd: Vec<String>,
    },
    /// Stop a job and report its exit code and status.
    Stop {
        #[clap(long, value_parser)]
        id: i32,
    },
    /// Tail a job's output from the first byte until end-of-stream.
    Stream {
        #[clap(long, value_parser)]
        id: i32,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = cmd().await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn cmd() -> anyhow::Result<()> {
    let options = HatchctlOptions::parse();
    let config = resolve_config(&options)?;

    let client = Client::new(config).await.context("failed to connect")?;
    let mut jobs = JobServiceClient::new(client.channel());

    match options.subcmd {
        SubCommands::Get { id } => {
            let job = jobs.get(GetRequest { id }).await?.into_inner();
            println!(
                "id: {} cmd: {} status: {}",
                job.id,
                job.cmd.join(" "),
                job.status
            );
        }
        SubCommands::Start { cmd } => {
            let job = jobs
                .start(StartRequest {
                    cmd,
                    cpu_weight: 0,
                    max_mem_use: 0,
                    max_disk_io: 0,
                })
                .await?
                .into_inner();
            println!("job id: {}", job.id);
        }
        SubCommands::Stop { id } => {
            let stopped = jobs.stop(StopRequest { id }).await?.into_inner();
            println!(
                "exit code: {} status: {}",
                stopped.exit_code, stopped.status
            );
        }
        SubCommands::Stream { id } => {
            let mut stream =
                jobs.stream(StreamRequest { id }).await?.into_inner();
            let mut stdout = std::io::stdout().lock();
            while let Some(chunk) = stream.message().await? {
                stdout.write_all(&chunk.stream)?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}

/// Flags override the config file; the file supplies whatever the flags
/// leave out.
fn resolve_config(options: &HatchctlOptions) -> anyhow::Result<HatchConfig> {
    let mut config = HatchConfig::try_default().unwrap_or_else(|_| {
        HatchConfig::from_options(
            "/etc/hatch/pki/ca.crt",
            "/etc/hatch/pki/_signed.client.crt",
            "/etc/hatch/pki/client.key",
            "localhost:8080",
        )
    });

    if let Some(ca_cert) = &options.ca_cert {
        config.auth.ca_crt = ca_cert.clone();
    }
    if let Some(client_cert) = &options.client_cert {
        config.auth.client_crt = client_cert.clone();
    }
    if let Some(client_key) = &options.client_key {
        config.auth.client_key = client_key.clone();
    }
    if let Some(target) = &options.target {
        config.system.target = target.clone();
    }

    Ok(config)
}
