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

//! Matches asynchronously delivered receipts to the one outstanding request.
//!
//! The transport has no request id, so a receipt is recognised by content: its
//! `tag` must equal the pending datum's sender tag and its `omd` the pending
//! datum's digest. Only one request is outstanding at a time; registering a new
//! one discards the previous request and any receipt matched for it.

use crate::bus::{BusMessage, MessageListener};
use crate::datum::ControlDatum;
use crate::observability::{events, fields};
use crate::receipt::ControlReceipt;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, Level};

const COMPONENT: &str = "correlator";

/// Where the current exchange stands from the correlator's point of view.
///
/// Timing out and judging a match valid or invalid happen after the correlator
/// has done its part. Those outcomes are carried by the result of
/// [`ControlSession::send`](crate::ControlSession::send), and the state stays
/// `Sent` or `Matched` until the next `register` or `clear`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    /// Nothing registered.
    Idle,
    /// A request is registered and unanswered.
    Sent,
    /// The first receipt answering the registered request has arrived.
    Matched,
}

#[derive(Default)]
struct Slot {
    outgoing: Option<ControlDatum>,
    matched: Option<ControlReceipt>,
}

/// Single-slot holder for the pending request and its first matching receipt.
#[derive(Default)]
pub struct ControlCorrelator {
    slot: Mutex<Slot>,
    matched_signal: Notify,
}

impl ControlCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `datum` the pending request and forgets any earlier match.
    pub async fn register(&self, datum: ControlDatum) {
        let mut slot = self.slot.lock().await;
        debug!(
            event = events::CORRELATOR_REGISTER,
            component = COMPONENT,
            sender_tag = datum.tag(),
            device_tag = datum.attn(),
            digest = fields::format_digest(datum.digest()).as_str(),
            "registering pending request"
        );
        slot.outgoing = Some(datum);
        slot.matched = None;
    }

    /// Offers a receipt from the delivery path. Returns true when it became the match.
    pub async fn on_message(&self, receipt: ControlReceipt) -> bool {
        let mut slot = self.slot.lock().await;

        let Some(outgoing) = slot.outgoing.as_ref() else {
            debug!(
                event = events::RECEIPT_NOTHING_PENDING,
                component = COMPONENT,
                omd = fields::format_digest(receipt.omd()).as_str(),
                "ignoring receipt with nothing pending"
            );
            return false;
        };

        if !receipt.answers(outgoing) {
            if tracing::enabled!(Level::DEBUG) {
                debug!(
                    event = events::RECEIPT_UNRELATED_IGNORED,
                    component = COMPONENT,
                    sender_tag = receipt.tag(),
                    omd = fields::format_digest(receipt.omd()).as_str(),
                    digest = fields::format_digest(outgoing.digest()).as_str(),
                    "ignoring receipt for another request"
                );
            }
            return false;
        }

        if slot.matched.is_some() {
            debug!(
                event = events::RECEIPT_DUPLICATE_IGNORED,
                component = COMPONENT,
                omd = fields::format_digest(receipt.omd()).as_str(),
                "ignoring repeated receipt"
            );
            return false;
        }

        debug!(
            event = events::RECEIPT_MATCHED,
            component = COMPONENT,
            omd = fields::format_digest(receipt.omd()).as_str(),
            "receipt matched pending request"
        );
        slot.matched = Some(receipt);
        drop(slot);

        self.matched_signal.notify_one();
        true
    }

    pub async fn poll(&self) -> Option<ControlReceipt> {
        self.slot.lock().await.matched.clone()
    }

    pub async fn state(&self) -> ExchangeState {
        let slot = self.slot.lock().await;
        match (&slot.outgoing, &slot.matched) {
            (None, _) => ExchangeState::Idle,
            (Some(_), None) => ExchangeState::Sent,
            (Some(_), Some(_)) => ExchangeState::Matched,
        }
    }

    /// Waits until the pending request is matched or `timeout` elapses.
    ///
    /// Wakes on each match notification; a wake-up left over from an earlier
    /// exchange only causes one extra check of the slot. A timeout too long to
    /// place on the clock waits without a deadline.
    pub async fn wait_for_match(&self, timeout: Duration) -> Option<ControlReceipt> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if let Some(receipt) = self.poll().await {
                return Some(receipt);
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, self.matched_signal.notified())
                        .await
                        .is_err()
                    {
                        return self.poll().await;
                    }
                }
                None => self.matched_signal.notified().await,
            }
        }
    }

    /// Drops the pending request and any match, returning to [`ExchangeState::Idle`].
    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        slot.outgoing = None;
        slot.matched = None;
    }
}

/// Bus listener feeding decoded receipts into a [`ControlCorrelator`].
///
/// The control topic also carries datums (our own included) and unrelated
/// traffic, so payloads that are not receipts are dropped without complaint.
pub struct ReceiptListener {
    correlator: Arc<ControlCorrelator>,
}

impl ReceiptListener {
    pub fn new(correlator: Arc<ControlCorrelator>) -> Self {
        Self { correlator }
    }
}

#[async_trait]
impl MessageListener for ReceiptListener {
    async fn on_receive(&self, message: BusMessage) {
        match ControlReceipt::from_payload(&message.payload) {
            Ok(receipt) => {
                self.correlator.on_message(receipt).await;
            }
            Err(err) => {
                debug!(
                    event = events::MESSAGE_UNDECODABLE_DROPPED,
                    component = COMPONENT,
                    topic = message.topic.as_str(),
                    reason = fields::REASON_NOT_A_RECEIPT,
                    err = %err,
                    "dropping non-receipt message"
                );
            }
        }
    }
}
