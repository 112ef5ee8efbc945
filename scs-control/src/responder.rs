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

//! Device side of the exchange: execute authenticated datums, publish receipts.

use crate::bus::{BusMessage, MessageBus, MessageListener};
use crate::datum::ControlDatum;
use crate::digest::SharedSecret;
use crate::observability::{events, fields};
use crate::receipt::{CommandResult, ControlReceipt};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "control_responder";

/// Runs the tokens of a datum and captures their output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, cmd: &[String]) -> CommandResult;
}

/// Executes `cmd[0]` as a child process with `cmd[1..]` as its arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, cmd: &[String]) -> CommandResult {
        let Some((program, args)) = cmd.split_first() else {
            return CommandResult::new(vec![], vec!["empty command".to_string()]);
        };

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => CommandResult::new(
                split_lines(&output.stdout),
                split_lines(&output.stderr),
            ),
            Err(err) => CommandResult::new(vec![], vec![format!("{program}: {err}")]),
        }
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Listener answering datums addressed to one device.
///
/// Only the most recent receipt is remembered. A datum carrying the same digest
/// as the last one executed is answered from it instead of running again, so
/// broker redelivery does not repeat side effects.
pub struct ControlResponder {
    device_tag: String,
    topic: String,
    secret: SharedSecret,
    bus: Arc<dyn MessageBus>,
    executor: Arc<dyn CommandExecutor>,
    last_receipt: Mutex<Option<ControlReceipt>>,
}

impl ControlResponder {
    pub fn new(
        device_tag: impl Into<String>,
        topic: impl Into<String>,
        secret: SharedSecret,
        bus: Arc<dyn MessageBus>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            device_tag: device_tag.into(),
            topic: topic.into(),
            secret,
            bus,
            executor,
            last_receipt: Mutex::new(None),
        }
    }

    pub fn device_tag(&self) -> &str {
        &self.device_tag
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Executes or replays `datum` and returns the receipt to publish, if any.
    pub async fn answer(&self, datum: &ControlDatum) -> Option<ControlReceipt> {
        if datum.attn() != self.device_tag {
            debug!(
                event = events::RESPONDER_OTHER_DEVICE_IGNORED,
                component = COMPONENT,
                device_tag = datum.attn(),
                "datum is addressed to another device"
            );
            return None;
        }

        if !datum.is_valid(&self.secret) {
            warn!(
                event = events::RESPONDER_AUTH_FAILED,
                component = COMPONENT,
                sender_tag = datum.tag(),
                digest = fields::format_digest(datum.digest()).as_str(),
                "datum digest does not verify; dropping"
            );
            return None;
        }

        // Held across execution so redelivered copies wait for the first run.
        let mut last_receipt = self.last_receipt.lock().await;

        if let Some(receipt) = last_receipt.as_ref().filter(|r| r.omd() == datum.digest()) {
            debug!(
                event = events::RESPONDER_DUPLICATE_REPLAYED,
                component = COMPONENT,
                omd = fields::format_digest(receipt.omd()).as_str(),
                "replaying receipt for repeated datum"
            );
            return Some(receipt.clone());
        }

        let result = self.executor.execute(datum.cmd()).await;
        let receipt = ControlReceipt::answering(datum, result, &self.secret);

        if tracing::enabled!(Level::INFO) {
            info!(
                event = events::RESPONDER_EXECUTED,
                component = COMPONENT,
                sender_tag = datum.tag(),
                cmd = fields::format_tokens(datum.cmd()).as_str(),
                stdout_lines = receipt.command().stdout.len(),
                stderr_lines = receipt.command().stderr.len(),
                "executed command"
            );
        }

        *last_receipt = Some(receipt.clone());
        Some(receipt)
    }
}

#[async_trait]
impl MessageListener for ControlResponder {
    async fn on_receive(&self, message: BusMessage) {
        let datum = match ControlDatum::from_payload(&message.payload) {
            Ok(datum) => datum,
            Err(err) => {
                debug!(
                    event = events::MESSAGE_UNDECODABLE_DROPPED,
                    component = COMPONENT,
                    topic = message.topic.as_str(),
                    reason = fields::REASON_NOT_A_DATUM,
                    err = %err,
                    "dropping non-datum message"
                );
                return;
            }
        };

        debug!(
            event = events::RESPONDER_DATUM_RECEIVED,
            component = COMPONENT,
            sender_tag = datum.tag(),
            device_tag = datum.attn(),
            digest = fields::format_digest(datum.digest()).as_str(),
            "received datum"
        );

        let Some(receipt) = self.answer(&datum).await else {
            return;
        };

        if let Err(err) = self.bus.publish(&self.topic, &receipt.payload()).await {
            warn!(
                event = events::RESPONDER_PUBLISH_FAILED,
                component = COMPONENT,
                topic = self.topic.as_str(),
                omd = fields::format_digest(receipt.omd()).as_str(),
                err = %err,
                "unable to publish receipt"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandExecutor, ControlResponder, ProcessExecutor};
    use crate::bus::{BusMessage, MemoryBus, MessageBus, MessageListener};
    use crate::datum::ControlDatum;
    use crate::digest::SharedSecret;
    use crate::receipt::{CommandResult, ControlReceipt};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

    const TOPIC: &str = "dev/control";

    #[derive(Default)]
    struct CountingExecutor {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl CommandExecutor for CountingExecutor {
        async fn execute(&self, cmd: &[String]) -> CommandResult {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            CommandResult::new(vec![format!("{} #{run}", cmd.join(" "))], vec![])
        }
    }

    struct ReceiptSink(UnboundedSender<ControlReceipt>);

    #[async_trait]
    impl MessageListener for ReceiptSink {
        async fn on_receive(&self, message: BusMessage) {
            if let Ok(receipt) = ControlReceipt::from_payload(&message.payload) {
                let _ = self.0.send(receipt);
            }
        }
    }

    fn responder(executor: Arc<CountingExecutor>) -> ControlResponder {
        ControlResponder::new(
            "scs-device-7",
            TOPIC,
            SharedSecret::new("S1"),
            Arc::new(MemoryBus::new()),
            executor,
        )
    }

    fn datum(attn: &str, secret: &str) -> ControlDatum {
        ControlDatum::new(
            "scs-host-1",
            attn,
            Utc::now(),
            vec!["uptime".to_string()],
            &SharedSecret::new(secret),
        )
    }

    #[tokio::test]
    async fn answers_authenticated_datum_for_this_device() {
        let executor = Arc::new(CountingExecutor::default());
        let responder = responder(executor.clone());
        let datum = datum("scs-device-7", "S1");

        let receipt = responder.answer(&datum).await.expect("receipt expected");

        assert!(receipt.answers(&datum));
        assert!(receipt.is_valid(&SharedSecret::new("S1")));
        assert_eq!(receipt.command().stdout, vec!["uptime #1".to_string()]);
    }

    #[tokio::test]
    async fn ignores_other_devices_and_bad_digests() {
        let executor = Arc::new(CountingExecutor::default());
        let responder = responder(executor.clone());

        assert!(responder.answer(&datum("scs-device-8", "S1")).await.is_none());
        assert!(responder.answer(&datum("scs-device-7", "S2")).await.is_none());
        assert_eq!(executor.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_datum_is_replayed_not_executed() {
        let executor = Arc::new(CountingExecutor::default());
        let responder = responder(executor.clone());
        let datum = datum("scs-device-7", "S1");

        let first = responder.answer(&datum).await;
        let second = responder.answer(&datum).await;

        assert_eq!(first, second);
        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_publishes_receipt_on_the_control_topic() {
        let bus = Arc::new(MemoryBus::new());
        let executor = Arc::new(CountingExecutor::default());
        let responder = Arc::new(ControlResponder::new(
            "scs-device-7",
            TOPIC,
            SharedSecret::new("S1"),
            bus.clone(),
            executor,
        ));
        let (tx, mut rx) = unbounded_channel();
        bus.subscribe(TOPIC, responder.clone())
            .await
            .expect("subscribe should succeed");
        bus.subscribe(TOPIC, Arc::new(ReceiptSink(tx)))
            .await
            .expect("subscribe should succeed");
        let datum = datum("scs-device-7", "S1");

        bus.publish(TOPIC, &json!({"unrelated": true}))
            .await
            .expect("publish should succeed");
        bus.publish(TOPIC, &datum.payload())
            .await
            .expect("publish should succeed");

        let receipt = rx.recv().await.expect("receipt should be published");
        assert!(receipt.answers(&datum));
    }

    #[tokio::test]
    async fn process_executor_reports_empty_command() {
        let result = ProcessExecutor.execute(&[]).await;

        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, vec!["empty command".to_string()]);
    }

    #[tokio::test]
    async fn process_executor_reports_spawn_failure_on_stderr() {
        let result = ProcessExecutor
            .execute(&["/nonexistent/scs-command".to_string()])
            .await;

        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr.len(), 1);
        assert!(result.stderr[0].starts_with("/nonexistent/scs-command: "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_executor_captures_output_lines() {
        let result = ProcessExecutor
            .execute(&[
                "sh".to_string(),
                "-c".to_string(),
                "echo one; echo two; echo oops >&2".to_string(),
            ])
            .await;

        assert_eq!(result.stdout, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(result.stderr, vec!["oops".to_string()]);
    }
}
