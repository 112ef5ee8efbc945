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

//! In-process broker with asynchronous delivery.

use crate::bus::{BusMessage, MessageBus, MessageListener};
use crate::error::BusError;
use crate::observability::{events, fields};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, Level};

const COMPONENT: &str = "memory_bus";

type TopicListeners = HashMap<String, Vec<Arc<dyn MessageListener>>>;

/// Loopback [`MessageBus`] where every subscriber on a topic receives every
/// publish on it, including the publisher's own messages.
///
/// Each delivery runs on its own spawned task, so listeners observe messages
/// concurrently with the publisher and in no guaranteed order.
#[derive(Default)]
pub struct MemoryBus {
    listeners: Mutex<TopicListeners>,
    closed: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn listener_count(&self, topic: &str) -> usize {
        self.listeners
            .lock()
            .await
            .get(topic)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let targets = self
            .listeners
            .lock()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default();

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::BUS_DELIVER,
                component = COMPONENT,
                topic,
                listeners = targets.len(),
                "delivering message"
            );
        }

        for listener in targets {
            let message = BusMessage::new(topic, payload.clone());
            tokio::spawn(async move {
                listener.on_receive(message).await;
            });
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        debug!(
            event = events::BUS_SUBSCRIBE,
            component = COMPONENT,
            topic,
            "subscribing listener"
        );
        self.listeners
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(listener);

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::Release);
        self.listeners.lock().await.clear();
        debug!(
            event = events::BUS_DISCONNECT,
            component = COMPONENT,
            reason = fields::NONE,
            "memory bus disconnected"
        );
        Ok(())
    }
}
