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

//! Skip guards for tests that need privileges or kernel features the build
//! host may not have.

// Nix has a collection of test helpers that are not exposed publicly by
// their crate. The below skip helpers are here:
// https://github.com/nix-rust/nix/blob/master/test/common/mod.rs

#[macro_export]
macro_rules! skip {
    ($($reason: expr),+) => {
        use ::std::io::{self, Write};

        let stderr = io::stderr();
        let mut handle = stderr.lock();
        writeln!(handle, $($reason),+).unwrap();
        return;
    }
}

#[macro_export]
macro_rules! skip_if_not_root {
    ($name:expr) => {
        use nix::unistd::Uid;

        if !Uid::current().is_root() {
            skip!("{} requires root privileges. Skipping test.", $name);
        }
    };
}

/// Skips unless a v2 cgroup hierarchy with the cpu, memory and io
/// controllers is mounted at the given root.
#[macro_export]
macro_rules! skip_if_no_cgroup2 {
    ($name:expr, $root:expr) => {
        match ::std::fs::read_to_string(
            ::std::path::Path::new($root).join("cgroup.controllers"),
        ) {
            Ok(controllers)
                if ["cpu", "memory", "io"]
                    .iter()
                    .all(|c| controllers.split_whitespace().any(|x| x == *c)) => {}
            _ => {
                skip!(
                    "{} requires a v2 cgroup mount with cpu, memory and io \
                     controllers at {}. Skipping test.",
                    $name,
                    $root
                );
            }
        }
    };
}
