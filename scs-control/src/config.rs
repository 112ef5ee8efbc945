/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Endpoint and peer-directory documents.
//!
//! Both are JSON5 files. An endpoint document names this host and the broker
//! bridge to use:
//!
//! ```json5
//! {
//!     client_tag: "scs-bgx-401",
//!     transport: { bridge: { command: "mqtt-bridge", args: ["--host", "broker.local"] } },
//! }
//! ```
//!
//! A peer directory maps hostnames to the device identity used to reach them:
//!
//! ```json5
//! {
//!     peers: {
//!         "scs-cube-001": { tag: "scs-be2-3", shared_secret: "...", topic: "south-coast-science-dev/cube/device/control" },
//!     },
//! }
//! ```

use crate::digest::SharedSecret;
use crate::error::ControlError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Tag this host signs its requests with.
    pub client_tag: String,
    pub transport: TransportConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum TransportConfig {
    /// Child process exchanging JSON-line envelopes on stdin/stdout.
    Bridge {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// TCP peer exchanging JSON-line envelopes.
    Tcp { address: String },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PeerRecord {
    pub tag: String,
    pub shared_secret: SharedSecret,
    pub topic: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PeerDirectory {
    #[serde(default)]
    peers: BTreeMap<String, PeerRecord>,
}

impl EndpointConfig {
    pub fn load(path: &Path) -> Result<Self, ControlError> {
        load_json5(path, "endpoint")
    }

    pub fn from_json5(contents: &str) -> Result<Self, ControlError> {
        json5::from_str(contents)
            .map_err(|e| ControlError::configuration(format!("Unable to parse endpoint: {e}")))
    }
}

impl PeerDirectory {
    pub fn load(path: &Path) -> Result<Self, ControlError> {
        load_json5(path, "peer directory")
    }

    pub fn from_json5(contents: &str) -> Result<Self, ControlError> {
        json5::from_str(contents).map_err(|e| {
            ControlError::configuration(format!("Unable to parse peer directory: {e}"))
        })
    }

    pub fn lookup(&self, hostname: &str) -> Result<&PeerRecord, ControlError> {
        self.peers.get(hostname).ok_or_else(|| {
            ControlError::configuration(format!("No peer record for host '{hostname}'"))
        })
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }
}

fn load_json5<T>(path: &Path, what: &str) -> Result<T, ControlError>
where
    T: for<'de> Deserialize<'de>,
{
    let contents = fs::read_to_string(path).map_err(|e| {
        ControlError::configuration(format!(
            "Unable to read {what} file {}: {e}",
            path.display()
        ))
    })?;

    json5::from_str(&contents).map_err(|e| {
        ControlError::configuration(format!(
            "Unable to parse {what} file {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{EndpointConfig, PeerDirectory, TransportConfig};
    use crate::digest::SharedSecret;
    use crate::error::ControlError;
    use std::path::Path;

    #[test]
    fn endpoint_with_bridge_transport_parses() {
        let endpoint = EndpointConfig::from_json5(
            r#"{
                // this host
                client_tag: "scs-bgx-401",
                transport: { bridge: { command: "mqtt-bridge", args: ["--host", "broker"] } },
            }"#,
        )
        .expect("endpoint should parse");

        assert_eq!(endpoint.client_tag, "scs-bgx-401");
        assert_eq!(
            endpoint.transport,
            TransportConfig::Bridge {
                command: "mqtt-bridge".to_string(),
                args: vec!["--host".to_string(), "broker".to_string()],
            }
        );
    }

    #[test]
    fn endpoint_with_tcp_transport_parses() {
        let endpoint = EndpointConfig::from_json5(
            r#"{ client_tag: "h", transport: { tcp: { address: "127.0.0.1:7000" } } }"#,
        )
        .expect("endpoint should parse");

        assert_eq!(
            endpoint.transport,
            TransportConfig::Tcp {
                address: "127.0.0.1:7000".to_string()
            }
        );
    }

    #[test]
    fn endpoint_rejects_unknown_fields() {
        let result = EndpointConfig::from_json5(
            r#"{ client_tag: "h", transport: { tcp: { address: "a" } }, broker: "x" }"#,
        );

        assert!(matches!(result, Err(ControlError::Configuration(_))));
    }

    #[test]
    fn peer_lookup_finds_record() {
        let directory = PeerDirectory::from_json5(
            r#"{
                peers: {
                    "scs-cube-001": { tag: "scs-be2-3", shared_secret: "S1", topic: "dev/control" },
                },
            }"#,
        )
        .expect("directory should parse");

        let peer = directory.lookup("scs-cube-001").expect("peer should exist");

        assert_eq!(peer.tag, "scs-be2-3");
        assert_eq!(peer.shared_secret, SharedSecret::new("S1"));
        assert_eq!(peer.topic, "dev/control");
        assert_eq!(directory.hostnames().collect::<Vec<_>>(), vec!["scs-cube-001"]);
    }

    #[test]
    fn missing_peer_is_a_configuration_error() {
        let directory = PeerDirectory::default();

        let error = directory.lookup("nowhere").expect_err("lookup should fail");

        assert!(matches!(error, ControlError::Configuration(_)));
        assert!(error.to_string().contains("nowhere"));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let result = EndpointConfig::load(Path::new("/nonexistent/endpoint.json5"));

        assert!(matches!(result, Err(ControlError::Configuration(_))));
    }
}
