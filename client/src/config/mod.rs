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

//! Configuration used to authenticate with a remote hatchd.
//!
//! [`HatchConfig::try_default()`] follows an ordered priority for searching
//! for configuration on a client's machine:
//!
//! 1. ${HOME}/.hatch/config
//! 2. /etc/hatch/config

pub use self::{
    auth_config::AuthConfig, cert_material::CertMaterial,
    system_config::SystemConfig,
};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

mod auth_config;
mod cert_material;
mod system_config;

/// Client configuration: authentication material plus the server to dial.
#[derive(Debug, Clone, Deserialize)]
pub struct HatchConfig {
    /// Authentication material
    pub auth: AuthConfig,
    /// System configuration
    pub system: SystemConfig,
}

impl HatchConfig {
    /// Attempt to load configuration from the well-known locations.
    pub fn try_default() -> Result<Self> {
        let home =
            std::env::var("HOME").context("missing $HOME environment variable")?;

        let search_paths =
            [format!("{home}/.hatch/config"), "/etc/hatch/config".to_string()];

        for path in &search_paths {
            if let Ok(config) = Self::parse_from_file(path) {
                return Ok(config);
            }
        }

        Err(anyhow!("unable to find valid config file"))
    }

    /// Attempt to parse a config file into memory.
    pub fn parse_from_file<P: AsRef<Path>>(path: P) -> Result<HatchConfig> {
        let mut config_toml = String::new();
        let mut file = File::open(path)?;

        if file
            .read_to_string(&mut config_toml)
            .with_context(|| "could not read HatchConfig toml")?
            == 0
        {
            return Err(anyhow!("empty config"));
        }

        Ok(toml::from_str(&config_toml)?)
    }

    /// Create a new HatchConfig from the given options.
    ///
    /// # Arguments
    ///
    /// * `ca_crt` - Path to the CA certificate
    /// * `client_crt` - Path to the client certificate
    /// * `client_key` - Path to the client key
    /// * `target` - Address of the hatchd server
    pub fn from_options<
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    >(
        ca_crt: S1,
        client_crt: S2,
        client_key: S3,
        target: S4,
    ) -> Self {
        let auth = AuthConfig {
            ca_crt: ca_crt.into(),
            client_crt: client_crt.into(),
            client_key: client_key.into(),
        };
        let system = SystemConfig { target: target.into() };
        Self { auth, system }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_config() {
        let toml = r#"
[auth]
ca_crt = "/etc/hatch/pki/ca.crt"
client_crt = "/etc/hatch/pki/_signed.client.alice.crt"
client_key = "/etc/hatch/pki/client.alice.key"

[system]
target = "localhost:8080"
"#;
        let config: HatchConfig = toml::from_str(toml).expect("parse config");
        assert_eq!(config.system.target, "localhost:8080");
        assert_eq!(config.auth.ca_crt, "/etc/hatch/pki/ca.crt");
    }
}
