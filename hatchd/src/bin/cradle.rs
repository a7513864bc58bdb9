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

//! The cradle: argv is `[cgroup_path, target_argv0, target_args...]`.
//!
//! It enrolls its own pid into the cgroup, then execs the target, which
//! therefore inherits the cgroup membership with no window in which the
//! target (or anything it forks) runs uncontained. Stdio is inherited, so
//! the supervisor's pipes observe the target directly.

use anyhow::{anyhow, Context};
use hatchd::jobs::cgroup;
use nix::sys::prctl;
use nix::sys::signal::Signal;
use nix::unistd::getpid;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

fn main() {
    if let Err(e) = run() {
        eprintln!("cradle: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args_os().skip(1);
    let cgroup_path = args
        .next()
        .ok_or_else(|| anyhow!("usage: cradle <cgroup-path> <cmd> [args...]"))?;
    let program = args.next().ok_or_else(|| anyhow!("missing command"))?;

    // If the supervisor dies, so does the target.
    prctl::set_pdeathsig(Signal::SIGKILL)
        .context("failed to set parent-death signal")?;

    cgroup::enroll_pid(Path::new(&cgroup_path), getpid())
        .context("failed to enroll in cgroup")?;

    // exec only returns on failure; on success the target takes over this
    // pid, and with it the cgroup membership and the parent-death signal.
    let err = Command::new(&program).args(args).exec();
    Err(err).with_context(|| format!("failed to exec {program:?}"))
}
