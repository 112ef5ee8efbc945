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

//! The control request sent to a device.

use crate::digest::{self, Digest, DigestField, SharedSecret};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// [`ControlDatum`] asks the device named by `attn` to execute `cmd`.
///
/// The digest is computed once, in [`ControlDatum::new`], over the sender tag,
/// device tag, timestamp and command tokens. Fields are read-only afterwards so
/// the digest always describes the datum it travels with.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use scs_control::{ControlDatum, SharedSecret};
///
/// let secret = SharedSecret::new("S1");
/// let datum = ControlDatum::new(
///     "scs-host-1",
///     "scs-device-7",
///     Utc::now(),
///     vec!["uptime".to_string()],
///     &secret,
/// );
///
/// assert!(datum.is_valid(&secret));
/// assert_eq!(datum.payload()["attn"], "scs-device-7");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDatum {
    tag: String,
    attn: String,
    #[serde(with = "rec_format")]
    rec: DateTime<Utc>,
    cmd: Vec<String>,
    digest: Digest,
}

impl ControlDatum {
    /// Builds a datum and signs it with `secret`. `rec` is truncated to whole seconds.
    pub fn new(
        tag: impl Into<String>,
        attn: impl Into<String>,
        rec: DateTime<Utc>,
        cmd: Vec<String>,
        secret: &SharedSecret,
    ) -> Self {
        let tag = tag.into();
        let attn = attn.into();
        let rec = rec.trunc_subsecs(0);
        let digest = digest::compute(
            secret,
            &Self::digest_fields(&tag, &attn, &rec_format::format(&rec), &cmd),
        );

        Self {
            tag,
            attn,
            rec,
            cmd,
            digest,
        }
    }

    /// Decodes a bus payload; anything without the datum fields is rejected.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }

    pub fn payload(&self) -> Value {
        json!({
            "tag": self.tag,
            "attn": self.attn,
            "rec": rec_format::format(&self.rec),
            "cmd": self.cmd,
            "digest": self.digest,
        })
    }

    pub fn is_valid(&self, secret: &SharedSecret) -> bool {
        digest::verify(
            &self.digest,
            secret,
            &Self::digest_fields(
                &self.tag,
                &self.attn,
                &rec_format::format(&self.rec),
                &self.cmd,
            ),
        )
    }

    fn digest_fields<'a>(
        tag: &'a str,
        attn: &'a str,
        rec: &'a str,
        cmd: &'a [String],
    ) -> [DigestField<'a>; 4] {
        [
            DigestField::Scalar(tag),
            DigestField::Scalar(attn),
            DigestField::Scalar(rec),
            DigestField::List(cmd),
        ]
    }

    /// Sender tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Target device tag.
    pub fn attn(&self) -> &str {
        &self.attn
    }

    pub fn rec(&self) -> DateTime<Utc> {
        self.rec
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// ISO 8601 UTC with whole seconds, e.g. `2026-10-18T09:30:00Z`.
mod rec_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn format(rec: &DateTime<Utc>) -> String {
        rec.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub(super) fn serialize<S: Serializer>(
        rec: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(rec))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|rec| rec.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
