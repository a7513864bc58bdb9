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

#![allow(dead_code)]

use hatchd::jobs::{JobRuntime, Registry};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// A stand-in cradle for unprivileged tests: it drops the cgroup path
/// argument and execs the target, so job semantics can be exercised without
/// root or a writable cgroup mount.
pub fn fake_cradle() -> PathBuf {
    let path = std::env::temp_dir()
        .join(format!("fake-cradle-{}.sh", uuid::Uuid::new_v4()));
    fs::write(&path, "#!/bin/sh\nshift\nexec \"$@\"\n")
        .expect("write fake cradle");
    let mut perms = fs::metadata(&path).expect("stat fake cradle").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake cradle");
    path
}

/// A plain directory standing in for the v2 cgroup mount.
pub fn fake_cgroup_root() -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("cgroup-root-{}", uuid::Uuid::new_v4()));
    fs::create_dir(&dir).expect("create fake cgroup root");
    fs::write(dir.join("cgroup.subtree_control"), b"")
        .expect("seed subtree_control");
    dir
}

pub fn fake_registry() -> Registry {
    Registry::new(JobRuntime {
        cradle: fake_cradle(),
        cgroup_root: fake_cgroup_root(),
    })
}

pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
