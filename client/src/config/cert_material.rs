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

use crate::config::auth_config::AuthConfig;
use anyhow::Context;

/// PEM material loaded into memory from an [AuthConfig].
pub struct CertMaterial {
    pub server_root_ca_cert: Vec<u8>,
    pub client_cert: Vec<u8>,
    pub client_key: Vec<u8>,
}

impl CertMaterial {
    pub async fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let server_root_ca_cert =
            tokio::fs::read(&config.ca_crt).await.with_context(|| {
                format!(
                    "Failed to read server root CA certificate from path '{}'",
                    config.ca_crt
                )
            })?;

        let client_cert =
            tokio::fs::read(&config.client_crt).await.with_context(|| {
                format!(
                    "Failed to read client certificate from path '{}'",
                    config.client_crt
                )
            })?;

        let client_key =
            tokio::fs::read(&config.client_key).await.with_context(|| {
                format!(
                    "Failed to read client key from path '{}'",
                    config.client_key
                )
            })?;

        Ok(Self { server_root_ca_cert, client_cert, client_key })
    }
}
