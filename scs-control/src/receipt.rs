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

//! The device's answer to a [`ControlDatum`](crate::ControlDatum).

use crate::datum::ControlDatum;
use crate::digest::{self, Digest, DigestField, SharedSecret};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Output captured from the remote command, one entry per line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub stdout: Vec<String>,
    #[serde(default)]
    pub stderr: Vec<String>,
}

impl CommandResult {
    pub fn new(stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self { stdout, stderr }
    }
}

/// Receipt published by a device once it has executed a datum's command.
///
/// `tag` echoes the sender tag of the request and `omd` its digest; together
/// they identify the one request this receipt answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReceipt {
    tag: String,
    omd: Digest,
    command: CommandResult,
    digest: Digest,
}

impl ControlReceipt {
    pub fn new(
        tag: impl Into<String>,
        omd: Digest,
        command: CommandResult,
        secret: &SharedSecret,
    ) -> Self {
        let tag = tag.into();
        let digest = digest::compute(secret, &Self::digest_fields(&tag, &omd, &command));

        Self {
            tag,
            omd,
            command,
            digest,
        }
    }

    /// Builds the receipt answering `datum`.
    pub fn answering(datum: &ControlDatum, command: CommandResult, secret: &SharedSecret) -> Self {
        Self::new(datum.tag(), datum.digest().clone(), command, secret)
    }

    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }

    pub fn payload(&self) -> Value {
        json!({
            "tag": self.tag,
            "omd": self.omd,
            "command": {
                "stdout": self.command.stdout,
                "stderr": self.command.stderr,
            },
            "digest": self.digest,
        })
    }

    /// True when `(tag, omd)` identifies `datum`.
    pub fn answers(&self, datum: &ControlDatum) -> bool {
        self.tag == datum.tag() && &self.omd == datum.digest()
    }

    pub fn is_valid(&self, secret: &SharedSecret) -> bool {
        digest::verify(
            &self.digest,
            secret,
            &Self::digest_fields(&self.tag, &self.omd, &self.command),
        )
    }

    fn digest_fields<'a>(
        tag: &'a str,
        omd: &'a Digest,
        command: &'a CommandResult,
    ) -> [DigestField<'a>; 4] {
        [
            DigestField::Scalar(tag),
            DigestField::Scalar(omd.as_str()),
            DigestField::List(&command.stdout),
            DigestField::List(&command.stderr),
        ]
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn omd(&self) -> &Digest {
        &self.omd
    }

    pub fn command(&self) -> &CommandResult {
        &self.command
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}
