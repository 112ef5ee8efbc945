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

use async_trait::async_trait;
use scs_control::{
    BusMessage, CommandResult, ControlDatum, ControlReceipt, Digest, MessageBus, MessageListener,
    SharedSecret,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// How a scripted device spoils the receipts it publishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReceiptFault {
    #[default]
    None,
    /// `omd` does not echo the request digest.
    WrongOmd,
    /// `tag` does not echo the request sender.
    WrongTag,
    /// Signed with a secret the host does not share.
    WrongSecret,
}

#[derive(Clone, Debug)]
pub struct DeviceScript {
    pub fault: ReceiptFault,
    /// Pause before replying to any command without its own entry in `delays`.
    pub delay: Duration,
    /// Per-command pause, keyed by the space-joined command tokens.
    pub delays: HashMap<String, Duration>,
    /// Commands that never get a reply, keyed like `delays`.
    pub silent: Vec<String>,
    /// Number of identical receipts published per datum.
    pub copies: usize,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            fault: ReceiptFault::None,
            delay: Duration::ZERO,
            delays: HashMap::new(),
            silent: Vec::new(),
            copies: 1,
        }
    }
}

impl DeviceScript {
    pub fn with_fault(fault: ReceiptFault) -> Self {
        Self {
            fault,
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// Fake device answering every datum on its topic with a scripted receipt.
///
/// Stdout echoes the command as `"<cmd>: ok"`; stderr is empty.
pub struct ScriptedDevice {
    bus: Arc<dyn MessageBus>,
    topic: String,
    secret: SharedSecret,
    script: DeviceScript,
    received: Mutex<Vec<ControlDatum>>,
}

impl ScriptedDevice {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        topic: &str,
        secret: SharedSecret,
        script: DeviceScript,
    ) -> Self {
        Self {
            bus,
            topic: topic.to_string(),
            secret,
            script,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Creates the device and subscribes it to `topic`.
    pub async fn attach(
        bus: Arc<dyn MessageBus>,
        topic: &str,
        secret: SharedSecret,
        script: DeviceScript,
    ) -> Arc<Self> {
        let device = Arc::new(Self::new(bus.clone(), topic, secret, script));
        bus.subscribe(topic, device.clone())
            .await
            .expect("scripted device should subscribe");
        device
    }

    pub async fn received(&self) -> Vec<ControlDatum> {
        self.received.lock().await.clone()
    }

    pub fn stdout_for(cmd: &[String]) -> String {
        format!("{}: ok", cmd.join(" "))
    }

    fn receipt_for(&self, datum: &ControlDatum) -> ControlReceipt {
        let result = CommandResult::new(vec![Self::stdout_for(datum.cmd())], vec![]);

        match self.script.fault {
            ReceiptFault::None => ControlReceipt::answering(datum, result, &self.secret),
            ReceiptFault::WrongOmd => ControlReceipt::new(
                datum.tag(),
                Digest::from_hex("0".repeat(64)),
                result,
                &self.secret,
            ),
            ReceiptFault::WrongTag => ControlReceipt::new(
                "scs-someone-else",
                datum.digest().clone(),
                result,
                &self.secret,
            ),
            ReceiptFault::WrongSecret => {
                ControlReceipt::answering(datum, result, &SharedSecret::new("not-the-secret"))
            }
        }
    }
}

#[async_trait]
impl MessageListener for ScriptedDevice {
    async fn on_receive(&self, message: BusMessage) {
        let Ok(datum) = ControlDatum::from_payload(&message.payload) else {
            return;
        };
        self.received.lock().await.push(datum.clone());

        let key = datum.cmd().join(" ");
        if self.script.silent.contains(&key) {
            debug!("scripted device staying silent for '{key}'");
            return;
        }

        let delay = self
            .script
            .delays
            .get(&key)
            .copied()
            .unwrap_or(self.script.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let receipt = self.receipt_for(&datum);
        for _ in 0..self.script.copies {
            if let Err(err) = self.bus.publish(&self.topic, &receipt.payload()).await {
                debug!("scripted device could not publish receipt: {err}");
            }
        }
    }
}
