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

//! Broker bridge speaking newline-delimited JSON envelopes.
//!
//! The bridge (an MQTT client process, or a TCP peer in front of one) writes
//! one `{"topic": .., "payload": ..}` envelope per line for every message it
//! receives, and accepts the same envelopes to publish. A `{"subscribe": ..}`
//! line asks it to subscribe to a topic.

use crate::bus::{BusMessage, MessageBus, MessageListener};
use crate::config::TransportConfig;
use crate::error::BusError;
use crate::observability::{events, fields};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "line_bus";

type TopicListeners = Arc<Mutex<HashMap<String, Vec<Arc<dyn MessageListener>>>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Serialize)]
struct SubscribeFrame<'a> {
    subscribe: &'a str,
}

#[derive(Serialize)]
struct PublishFrame<'a> {
    topic: &'a str,
    payload: &'a Value,
}

/// [`MessageBus`] over a pair of byte streams carrying JSON lines.
pub struct LineBus {
    writer: Mutex<Option<BoxedWriter>>,
    listeners: TopicListeners,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    bridge: Mutex<Option<Child>>,
}

impl LineBus {
    /// Wraps an already-connected stream pair and starts the inbound reader.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_parts(reader, writer, None)
    }

    fn from_parts<R, W>(reader: R, writer: W, bridge: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let listeners: TopicListeners = Arc::default();
        let reader_task = tokio::spawn(Self::read_loop(reader, listeners.clone()));

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            listeners,
            reader_task: Mutex::new(Some(reader_task)),
            bridge: Mutex::new(bridge),
        }
    }

    /// Opens the transport described by an endpoint document.
    pub async fn open(config: &TransportConfig) -> Result<Self, BusError> {
        match config {
            TransportConfig::Bridge { command, args } => Self::spawn_bridge(command, args),
            TransportConfig::Tcp { address } => Self::connect_tcp(address).await,
        }
    }

    /// Spawns a bridge process and talks to it over its stdin/stdout.
    ///
    /// The bridge's stderr is inherited so its diagnostics stay on ours.
    pub fn spawn_bridge(command: &str, args: &[String]) -> Result<Self, BusError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BusError::Subscribe(format!(
                "bridge '{command}' did not expose piped stdio"
            )));
        };

        info!(
            event = events::BUS_BRIDGE_SPAWN_OK,
            component = COMPONENT,
            command,
            pid = child.id(),
            "bridge process started"
        );

        Ok(Self::from_parts(stdout, stdin, Some(child)))
    }

    pub async fn connect_tcp(address: &str) -> Result<Self, BusError> {
        let stream = TcpStream::connect(address).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }

    async fn read_loop<R>(reader: R, listeners: TopicListeners)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut lines = BufReader::new(reader).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!(
                        event = events::BUS_READER_CLOSED,
                        component = COMPONENT,
                        "bridge closed its output"
                    );
                    break;
                }
                Err(err) => {
                    warn!(
                        event = events::BUS_READER_CLOSED,
                        component = COMPONENT,
                        err = %err,
                        "bridge read failed"
                    );
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let message: BusMessage = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(err) => {
                    debug!(
                        event = events::BUS_FRAME_DROPPED,
                        component = COMPONENT,
                        reason = fields::REASON_INVALID_ENVELOPE,
                        err = %err,
                        "dropping unparseable bridge line"
                    );
                    continue;
                }
            };

            let targets = listeners
                .lock()
                .await
                .get(&message.topic)
                .cloned()
                .unwrap_or_default();

            for listener in targets {
                let message = message.clone();
                tokio::spawn(async move {
                    listener.on_receive(message).await;
                });
            }
        }
    }

    async fn write_frame<T: Serialize>(&self, frame: &T) -> Result<(), BusError> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(BusError::Closed)?;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for LineBus {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), BusError> {
        self.write_frame(&PublishFrame { topic, payload })
            .await
            .map_err(|err| match err {
                BusError::Closed => BusError::Closed,
                other => BusError::Publish(other.to_string()),
            })
    }

    async fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), BusError> {
        let first_for_topic = {
            let mut listeners = self.listeners.lock().await;
            let entry = listeners.entry(topic.to_string()).or_default();
            entry.push(listener.clone());
            entry.len() == 1
        };

        debug!(
            event = events::BUS_SUBSCRIBE,
            component = COMPONENT,
            topic,
            first_for_topic,
            "subscribing listener"
        );

        if first_for_topic {
            if let Err(err) = self.write_frame(&SubscribeFrame { subscribe: topic }).await {
                // Unregister so a later subscribe sends the frame again.
                let mut listeners = self.listeners.lock().await;
                if let Some(entry) = listeners.get_mut(topic) {
                    entry.retain(|registered| !Arc::ptr_eq(registered, &listener));
                    if entry.is_empty() {
                        listeners.remove(topic);
                    }
                }
                return Err(BusError::Subscribe(err.to_string()));
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(reader_task) = self.reader_task.lock().await.take() {
            reader_task.abort();
        }
        self.listeners.lock().await.clear();

        if let Some(mut bridge) = self.bridge.lock().await.take() {
            bridge.kill().await?;
        }

        info!(
            event = events::BUS_DISCONNECT,
            component = COMPONENT,
            "line bus disconnected"
        );
        Ok(())
    }
}
