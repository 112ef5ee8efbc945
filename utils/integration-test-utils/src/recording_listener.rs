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
use scs_control::{BusMessage, ControlDatum, ControlReceipt, MessageListener};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Keeps every message seen on the topics it is subscribed to.
#[derive(Clone, Default)]
pub struct RecordingListener {
    message_store: Arc<Mutex<Vec<BusMessage>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<BusMessage> {
        self.message_store.lock().await.clone()
    }

    pub async fn datums(&self) -> Vec<ControlDatum> {
        self.message_store
            .lock()
            .await
            .iter()
            .filter_map(|m| ControlDatum::from_payload(&m.payload).ok())
            .collect()
    }

    pub async fn receipts(&self) -> Vec<ControlReceipt> {
        self.message_store
            .lock()
            .await
            .iter()
            .filter_map(|m| ControlReceipt::from_payload(&m.payload).ok())
            .collect()
    }
}

#[async_trait]
impl MessageListener for RecordingListener {
    async fn on_receive(&self, message: BusMessage) {
        debug!("recording message on {}", message.topic);
        self.message_store.lock().await.push(message);
    }
}
