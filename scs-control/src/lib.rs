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

//! # scs-control
//!
//! `scs-control` sends authenticated shell commands to a remote device over a
//! publish/subscribe broker and collects the device's signed reply.
//!
//! A host publishes a [`ControlDatum`] on the device's control topic. The
//! device executes it and publishes a [`ControlReceipt`] on the same topic.
//! Both messages carry an HMAC digest over their fields keyed with a secret
//! shared by host and device. The broker offers no request ids, so the host
//! recognises the receipt for its request by content: the receipt echoes the
//! request's sender tag (`tag`) and digest (`omd`).
//!
//! ## One exchange against an in-process device
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scs_control::{
//!     CommandExecutor, CommandResult, ControlResponder, ControlSession, MemoryBus, MessageBus,
//!     SessionConfig, SessionTarget, SharedSecret,
//! };
//! use async_trait::async_trait;
//!
//! struct Uptime;
//!
//! #[async_trait]
//! impl CommandExecutor for Uptime {
//!     async fn execute(&self, _cmd: &[String]) -> CommandResult {
//!         CommandResult::new(vec!["up 3 days".to_string()], vec![])
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let topic = "south-coast-science-dev/cube/device/control";
//! let secret = SharedSecret::new("S1");
//! let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
//!
//! let device = ControlResponder::new("scs-be2-3", topic, secret.clone(), bus.clone(), Arc::new(Uptime));
//! bus.subscribe(topic, Arc::new(device)).await.unwrap();
//!
//! let mut config = SessionConfig::new("scs-bgx-401", SessionTarget::new("scs-be2-3", topic, secret));
//! config.timeout = Duration::from_secs(2);
//! let mut session = ControlSession::connect(bus, config, Vec::new(), Vec::new())
//!     .await
//!     .unwrap();
//!
//! let receipt = session.send(vec!["uptime".to_string()]).await.unwrap().unwrap();
//! assert_eq!(receipt.command().stdout, vec!["up 3 days".to_string()]);
//!
//! let (stdout, _stderr) = session.close().await;
//! assert_eq!(stdout, b"up 3 days\n");
//! # });
//! ```
//!
//! ## Layout
//!
//! - Messages: [`ControlDatum`], [`ControlReceipt`] and the [`digest`] codec
//! - Correlation: [`ControlCorrelator`] holds the single pending request
//! - Host side: [`ControlSession`] runs one-shot and interactive exchanges
//! - Device side: [`ControlResponder`] executes datums through a [`CommandExecutor`]
//! - Transport: [`MessageBus`] with the [`MemoryBus`] and [`LineBus`] adapters
//!
//! ## Observability model
//!
//! Library code emits `tracing` events and never installs a subscriber.
//! Binaries and tests initialise `tracing_subscriber` at the process boundary.

mod bus;
pub use bus::{BusMessage, LineBus, MemoryBus, MessageBus, MessageListener};

mod config;
pub use config::{EndpointConfig, PeerDirectory, PeerRecord, TransportConfig};

mod correlator;
pub use correlator::{ControlCorrelator, ExchangeState, ReceiptListener};

mod datum;
pub use datum::ControlDatum;

pub mod digest;
pub use digest::{Digest, SharedSecret};

mod error;
pub use error::{BusError, ControlError};

#[doc(hidden)]
pub mod observability;

mod receipt;
pub use receipt::{CommandResult, ControlReceipt};

mod responder;
pub use responder::{CommandExecutor, ControlResponder, ProcessExecutor};

mod session;
pub use session::{
    forward_lines, tokenize, ControlSession, LineSource, RetryPolicy, SessionConfig,
    SessionTarget, DEFAULT_TIMEOUT, PROMPT,
};
