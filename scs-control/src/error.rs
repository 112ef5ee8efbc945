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

//! Error types surfaced by control exchanges and bus adapters.

use crate::digest::Digest;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`MessageBus`](crate::MessageBus) adapter.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection is closed")]
    Closed,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of a control exchange or of the setup that precedes it.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Missing or invalid endpoint, credential or peer record.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every publish attempt failed.
    #[error("publish failed after {attempts} attempt(s): {source}")]
    Publish {
        attempts: u32,
        #[source]
        source: BusError,
    },

    #[error("unable to subscribe: {0}")]
    Subscribe(#[source] BusError),

    #[error("no receipt within {0:?}")]
    Timeout(Duration),

    /// A correlated receipt whose digest does not verify under the shared secret.
    #[error("receipt for {omd} from '{tag}' failed authentication")]
    Authentication { tag: String, omd: Digest },

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ControlError::Configuration(message.into())
    }

    /// Errors the interactive loop reports and then carries on from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ControlError::Timeout(_) | ControlError::Publish { .. }
        )
    }
}
