use clap::Args;
use scs_control::{ControlError, EndpointConfig, PeerDirectory, SessionTarget, SharedSecret};
use std::path::PathBuf;

pub(crate) const DEFAULT_PEERS_PATH: &str = "peers.json5";
#[allow(dead_code)]
pub(crate) const DEFAULT_WAIT_SECS: u64 = 10;

#[derive(Debug, Args)]
pub(crate) struct EndpointArgs {
    /// JSON5 endpoint document naming this host and its broker transport
    #[arg(short = 'e', long = "endpoint", value_name = "ENDPOINT")]
    pub(crate) endpoint: PathBuf,
}

impl EndpointArgs {
    pub(crate) fn load(&self) -> Result<EndpointConfig, ControlError> {
        EndpointConfig::load(&self.endpoint)
    }
}

/// Device a host sends commands to: a peer-directory hostname, or explicit identity.
#[derive(Debug, Args)]
pub(crate) struct HostTargetArgs {
    /// Hostname of the device in the peer directory
    #[arg(
        short = 'H',
        long = "host",
        value_name = "HOST",
        required_unless_present_all = ["device_tag", "secret", "topic"],
        conflicts_with_all = ["device_tag", "secret", "topic"]
    )]
    pub(crate) host: Option<String>,

    /// JSON5 peer directory used with --host
    #[arg(short = 'p', long = "peers", value_name = "PEERS", default_value = DEFAULT_PEERS_PATH)]
    pub(crate) peers: PathBuf,

    /// Tag of the device
    #[arg(short = 'd', long = "device-tag", value_name = "TAG", requires_all = ["secret", "topic"])]
    pub(crate) device_tag: Option<String>,

    /// Secret shared with the device
    #[arg(short = 'k', long = "secret", value_name = "SECRET", requires = "topic")]
    pub(crate) secret: Option<String>,

    /// Control topic of the device
    #[arg(short = 't', long = "topic", value_name = "TOPIC", requires = "secret")]
    pub(crate) topic: Option<String>,
}

impl HostTargetArgs {
    #[allow(dead_code)]
    pub(crate) fn resolve(&self) -> Result<SessionTarget, ControlError> {
        if let Some(host) = &self.host {
            let directory = PeerDirectory::load(&self.peers)?;
            return Ok(SessionTarget::from(directory.lookup(host)?));
        }

        match (&self.device_tag, &self.secret, &self.topic) {
            (Some(tag), Some(secret), Some(topic)) => Ok(SessionTarget::new(
                tag,
                topic,
                SharedSecret::new(secret.as_str()),
            )),
            _ => Err(ControlError::configuration(
                "either --host or all of --device-tag, --secret and --topic are required",
            )),
        }
    }
}

/// Identity a device answers as: its own peer-directory record, or explicit secret and topic.
#[derive(Debug, Args)]
pub(crate) struct DeviceTargetArgs {
    /// Hostname of this device in the peer directory
    #[arg(
        short = 'H',
        long = "host",
        value_name = "HOST",
        required_unless_present_all = ["secret", "topic"],
        conflicts_with_all = ["secret", "topic"]
    )]
    pub(crate) host: Option<String>,

    /// JSON5 peer directory used with --host
    #[arg(short = 'p', long = "peers", value_name = "PEERS", default_value = DEFAULT_PEERS_PATH)]
    pub(crate) peers: PathBuf,

    /// Secret shared with controlling hosts
    #[arg(short = 'k', long = "secret", value_name = "SECRET", requires = "topic")]
    pub(crate) secret: Option<String>,

    /// Control topic to answer on
    #[arg(short = 't', long = "topic", value_name = "TOPIC", requires = "secret")]
    pub(crate) topic: Option<String>,
}

impl DeviceTargetArgs {
    /// Without a peer record the device answers to the endpoint's client tag.
    #[allow(dead_code)]
    pub(crate) fn resolve(&self, endpoint: &EndpointConfig) -> Result<SessionTarget, ControlError> {
        if let Some(host) = &self.host {
            let directory = PeerDirectory::load(&self.peers)?;
            return Ok(SessionTarget::from(directory.lookup(host)?));
        }

        match (&self.secret, &self.topic) {
            (Some(secret), Some(topic)) => Ok(SessionTarget::new(
                &endpoint.client_tag,
                topic,
                SharedSecret::new(secret.as_str()),
            )),
            _ => Err(ControlError::configuration(
                "either --host or both --secret and --topic are required",
            )),
        }
    }
}
