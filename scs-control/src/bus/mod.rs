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

//! Publish/subscribe transport seam.
//!
//! The protocol only needs two operations from a broker: publish a JSON payload
//! on a topic, and deliver every payload seen on a topic to a listener. Delivery
//! is asynchronous and at-least-once; it may reorder or duplicate messages.
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use scs_control::{BusMessage, MemoryBus, MessageBus, MessageListener};
//! use serde_json::json;
//!
//! struct PrintListener;
//!
//! #[async_trait]
//! impl MessageListener for PrintListener {
//!     async fn on_receive(&self, message: BusMessage) {
//!         eprintln!("{}: {}", message.topic, message.payload);
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
//! bus.subscribe("south-coast-science-dev/control", Arc::new(PrintListener))
//!     .await
//!     .unwrap();
//! bus.publish("south-coast-science-dev/control", &json!({"hello": "device"}))
//!     .await
//!     .unwrap();
//! # });
//! ```

pub(crate) mod line;
pub(crate) mod memory;

pub use line::LineBus;
pub use memory::MemoryBus;

use crate::error::BusError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A payload delivered on a topic, the `{topic, payload}` envelope of the wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Value,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Handler invoked by a bus for every message on a subscribed topic.
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_receive(&self, message: BusMessage);
}

/// Broker binding used by sessions and responders.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), BusError>;

    async fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), BusError>;

    /// Stops delivery and releases the connection. Publishing afterwards fails.
    async fn disconnect(&self) -> Result<(), BusError> {
        Ok(())
    }
}
