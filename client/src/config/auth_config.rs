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

use crate::config::cert_material::CertMaterial;
use serde::Deserialize;

/// Authentication material for a hatch client.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// The same CA certificate the server trusts.
    pub ca_crt: String,
    /// The unique client certificate signed by the CA.
    pub client_crt: String,
    /// The client secret key.
    pub client_key: String,
}

impl AuthConfig {
    pub async fn to_cert_material(&self) -> anyhow::Result<CertMaterial> {
        CertMaterial::from_config(self).await
    }
}
