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

//! Keyed digest over canonical message fields.
//!
//! Both the request ([`ControlDatum`](crate::ControlDatum)) and the receipt that
//! answers it carry an HMAC-SHA256 digest keyed with the device's shared secret.
//! Fields are fed to the MAC length-prefixed so that no two distinct field
//! sequences share a canonical encoding.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Per-device secret shared between the controlling host and the device.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Lowercase hex encoding of a keyed digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of the canonical digest input.
#[derive(Clone, Copy, Debug)]
pub enum DigestField<'a> {
    Scalar(&'a str),
    List(&'a [String]),
}

struct CanonicalMac(HmacSha256);

impl CanonicalMac {
    fn new(secret: &SharedSecret) -> Self {
        Self(HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length"))
    }

    fn feed(mut self, fields: &[DigestField<'_>]) -> HmacSha256 {
        for field in fields {
            match field {
                DigestField::Scalar(value) => self.scalar(value),
                DigestField::List(values) => {
                    self.0.update(&(values.len() as u64).to_be_bytes());
                    for value in values.iter() {
                        self.scalar(value);
                    }
                }
            }
        }
        self.0
    }

    fn scalar(&mut self, value: &str) {
        self.0.update(&(value.len() as u64).to_be_bytes());
        self.0.update(value.as_bytes());
    }
}

/// Computes the digest of `fields` under `secret`.
pub fn compute(secret: &SharedSecret, fields: &[DigestField<'_>]) -> Digest {
    let mac = CanonicalMac::new(secret).feed(fields);
    Digest(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `digest` against `fields` and `secret` in constant time.
///
/// A digest that is not valid hex never verifies.
pub fn verify(digest: &Digest, secret: &SharedSecret, fields: &[DigestField<'_>]) -> bool {
    let Ok(expected) = hex::decode(digest.as_str()) else {
        return false;
    };

    CanonicalMac::new(secret)
        .feed(fields)
        .verify_slice(&expected)
        .is_ok()
}
