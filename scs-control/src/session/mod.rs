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

//! Host-side orchestration of control exchanges.
//!
//! A [`ControlSession`] owns the bus handle, the correlator and the two
//! writers remote output is rendered to. Each exchange signs a datum,
//! publishes it with bounded retry and, when asked to, waits for the matching
//! receipt and checks its digest before printing it.

mod repl;
mod retry;

pub use repl::{forward_lines, tokenize, LineSource, PROMPT};
pub use retry::RetryPolicy;

use crate::bus::MessageBus;
use crate::config::PeerRecord;
use crate::correlator::{ControlCorrelator, ReceiptListener};
use crate::datum::ControlDatum;
use crate::digest::SharedSecret;
use crate::error::ControlError;
use crate::observability::{events, fields};
use crate::receipt::ControlReceipt;
use chrono::Utc;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};

const COMPONENT: &str = "control_session";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The device a session talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTarget {
    pub device_tag: String,
    pub topic: String,
    pub secret: SharedSecret,
}

impl SessionTarget {
    pub fn new(
        device_tag: impl Into<String>,
        topic: impl Into<String>,
        secret: SharedSecret,
    ) -> Self {
        Self {
            device_tag: device_tag.into(),
            topic: topic.into(),
            secret,
        }
    }
}

impl From<&PeerRecord> for SessionTarget {
    fn from(peer: &PeerRecord) -> Self {
        Self::new(&peer.tag, &peer.topic, peer.shared_secret.clone())
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Tag this host signs its datums with.
    pub sender_tag: String,
    pub target: SessionTarget,
    /// How long to wait for a receipt after publishing.
    pub timeout: Duration,
    /// Whether one-shot exchanges wait for a receipt. Interactive ones always do.
    pub wait_for_receipt: bool,
    /// Echo outgoing datums and incoming receipts to the error writer.
    pub verbose: bool,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    pub fn new(sender_tag: impl Into<String>, target: SessionTarget) -> Self {
        Self {
            sender_tag: sender_tag.into(),
            target,
            timeout: DEFAULT_TIMEOUT,
            wait_for_receipt: true,
            verbose: false,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ControlSession<O, E> {
    bus: Arc<dyn MessageBus>,
    correlator: Arc<ControlCorrelator>,
    config: SessionConfig,
    out: O,
    err: E,
}

impl<O: Write, E: Write> ControlSession<O, E> {
    /// Subscribes to the target's control topic and returns a ready session.
    pub async fn connect(
        bus: Arc<dyn MessageBus>,
        config: SessionConfig,
        out: O,
        err: E,
    ) -> Result<Self, ControlError> {
        let correlator = Arc::new(ControlCorrelator::new());
        let listener = Arc::new(ReceiptListener::new(correlator.clone()));

        if let Err(err) = bus.subscribe(&config.target.topic, listener).await {
            error!(
                event = events::SESSION_CONNECT_FAILED,
                component = COMPONENT,
                topic = config.target.topic.as_str(),
                err = %err,
                "unable to subscribe to control topic"
            );
            return Err(ControlError::Subscribe(err));
        }

        info!(
            event = events::SESSION_CONNECT_OK,
            component = COMPONENT,
            sender_tag = config.sender_tag.as_str(),
            device_tag = config.target.device_tag.as_str(),
            topic = config.target.topic.as_str(),
            "control session ready"
        );

        Ok(Self {
            bus,
            correlator,
            config,
            out,
            err,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<ControlCorrelator> {
        &self.correlator
    }

    /// Runs one exchange, waiting for a receipt only if the session is configured to.
    pub async fn send(
        &mut self,
        tokens: Vec<String>,
    ) -> Result<Option<ControlReceipt>, ControlError> {
        let wait = self.config.wait_for_receipt;
        self.exchange(tokens, wait).await
    }

    /// One-shot mode: exactly one exchange.
    pub async fn run_once(
        &mut self,
        tokens: Vec<String>,
    ) -> Result<Option<ControlReceipt>, ControlError> {
        self.send(tokens).await
    }

    pub(crate) async fn exchange(
        &mut self,
        tokens: Vec<String>,
        wait: bool,
    ) -> Result<Option<ControlReceipt>, ControlError> {
        let target = &self.config.target;
        let datum = ControlDatum::new(
            &self.config.sender_tag,
            &target.device_tag,
            Utc::now(),
            tokens,
            &target.secret,
        );

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::EXCHANGE_START,
                component = COMPONENT,
                device_tag = datum.attn(),
                cmd = fields::format_tokens(datum.cmd()).as_str(),
                digest = fields::format_digest(datum.digest()).as_str(),
                "starting exchange"
            );
        }

        let payload = datum.payload();
        self.correlator.register(datum).await;

        if self.config.verbose {
            writeln!(self.err, "{payload}")?;
            self.err.flush()?;
        }

        retry::publish_with_retry(
            self.bus.as_ref(),
            &self.config.target.topic,
            &payload,
            &self.config.retry,
        )
        .await?;

        if !wait {
            debug!(
                event = events::EXCHANGE_NO_WAIT,
                component = COMPONENT,
                "not waiting for a receipt"
            );
            return Ok(None);
        }

        let timeout = self.config.timeout;
        let Some(receipt) = self.correlator.wait_for_match(timeout).await else {
            warn!(
                event = events::EXCHANGE_TIMED_OUT,
                component = COMPONENT,
                timeout_ms = timeout.as_millis() as u64,
                "no receipt before deadline"
            );
            return Err(ControlError::Timeout(timeout));
        };

        if self.config.verbose {
            writeln!(self.err, "{}", receipt.payload())?;
        }

        if !receipt.is_valid(&self.config.target.secret) {
            error!(
                event = events::EXCHANGE_INVALID,
                component = COMPONENT,
                sender_tag = receipt.tag(),
                omd = fields::format_digest(receipt.omd()).as_str(),
                digest = fields::format_digest(receipt.digest()).as_str(),
                "receipt digest does not verify"
            );
            return Err(ControlError::Authentication {
                tag: receipt.tag().to_string(),
                omd: receipt.omd().clone(),
            });
        }

        debug!(
            event = events::EXCHANGE_VALID,
            component = COMPONENT,
            omd = fields::format_digest(receipt.omd()).as_str(),
            "receipt verified"
        );
        self.render(&receipt)?;

        Ok(Some(receipt))
    }

    fn render(&mut self, receipt: &ControlReceipt) -> Result<(), ControlError> {
        for line in &receipt.command().stdout {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;

        for line in &receipt.command().stderr {
            writeln!(self.err, "{line}")?;
        }
        self.err.flush()?;
        Ok(())
    }

    /// Forgets any pending request, disconnects the bus and hands the writers back.
    pub async fn close(self) -> (O, E) {
        self.correlator.clear().await;

        if let Err(err) = self.bus.disconnect().await {
            warn!(
                event = events::SESSION_CLOSE,
                component = COMPONENT,
                err = %err,
                "bus disconnect failed"
            );
        } else {
            debug!(
                event = events::SESSION_CLOSE,
                component = COMPONENT,
                "control session closed"
            );
        }

        (self.out, self.err)
    }
}
