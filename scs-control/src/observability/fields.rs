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

//! Canonical structured field keys and value-format helpers.

use crate::digest::Digest;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const TOPIC: &str = "topic";
pub const SENDER_TAG: &str = "sender_tag";
pub const DEVICE_TAG: &str = "device_tag";
pub const DIGEST: &str = "digest";
pub const OMD: &str = "omd";
pub const CMD: &str = "cmd";
pub const ATTEMPT: &str = "attempt";
pub const BACKOFF_MS: &str = "backoff_ms";
pub const TIMEOUT_MS: &str = "timeout_ms";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_NOT_A_RECEIPT: &str = "not_a_receipt";
pub const REASON_NOT_A_DATUM: &str = "not_a_datum";
pub const REASON_INVALID_ENVELOPE: &str = "invalid_envelope";

/// Number of hex characters kept when a digest is logged.
pub const DIGEST_PREFIX_LEN: usize = 12;

/// Shortens a digest for log lines; the full value is on the wire.
pub fn format_digest(digest: &Digest) -> String {
    digest.as_str().chars().take(DIGEST_PREFIX_LEN).collect()
}

pub fn format_tokens(tokens: &[String]) -> String {
    if tokens.is_empty() {
        return NONE.to_string();
    }
    tokens.join(" ")
}
