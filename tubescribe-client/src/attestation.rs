/* This file is part of the TubeScribe project - https://github.com/tubescribe/tubescribe
*
*  Copyright (C) 2025 TubeScribe contributors
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use chrono::Utc;
use cloneable_errors::{anyhow, bail, ErrContext, ErrorContext, ResContext};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::errors::Error;
use crate::state::AppConfig;
use crate::transport::PlatformTransport;

/// Parsed `Create` challenge payload. Consumed exactly once per minting
/// attempt - never persisted, never reused.
#[derive(Serialize, Clone, Debug)]
pub struct AttestationChallenge {
    pub message_id: Option<String>,
    /// Interpreter script the program depends on. Loading it is a
    /// precondition for running the program.
    pub interpreter_script: Option<String>,
    pub interpreter_url: Option<String>,
    /// The opaque, vendor-issued attestation program.
    pub program: String,
    /// Global name under which the program registers its entry point.
    pub global_name: String,
}

/// Hosts the vendor attestation program. Implementations run the program in
/// their own execution boundary and hand the produced signal blob back
/// unmodified - nothing in this crate interprets it.
#[async_trait]
pub trait AttestationRunner: Send + Sync {
    async fn evaluate(&self, challenge: &AttestationChallenge, visitor_data: &str) -> Result<String, ErrorContext>;
}

/// Default runner: the vendor program executes in an external process.
/// Challenge JSON goes in on stdin, the attestation response comes back on
/// stdout. The evaluation deadline is enforced by the minter, not here.
pub struct ProcessRunner {
    command: Vec<String>,
}

impl ProcessRunner {
    pub fn new(config: &AppConfig) -> ProcessRunner {
        ProcessRunner { command: config.attestation.runner_command.clone() }
    }
}

#[derive(Serialize)]
struct RunnerInput<'a> {
    challenge: &'a AttestationChallenge,
    #[serde(rename="visitorData")]
    visitor_data: &'a str,
}

#[async_trait]
impl AttestationRunner for ProcessRunner {
    async fn evaluate(&self, challenge: &AttestationChallenge, visitor_data: &str) -> Result<String, ErrorContext> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("No attestation runner command configured");
        };
        let input = serde_json::to_vec(&RunnerInput { challenge, visitor_data })
            .context("Failed to serialize the runner input")?;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn the attestation runner")?;

        let mut stdin = child.stdin.take().context("Runner stdin was not captured")?;
        stdin.write_all(&input).await.context("Failed to write the challenge to the runner")?;
        drop(stdin);

        let output = child.wait_with_output().await.context("Failed to wait for the attestation runner")?;
        if !output.status.success() {
            bail!("Attestation runner exited with {}", output.status);
        }
        let response = String::from_utf8(output.stdout).context("Runner output was not valid utf-8")?;
        let response = response.trim();
        if response.is_empty() {
            bail!("Attestation runner produced no response");
        }
        Ok(response.to_owned())
    }
}

/// Runs the full challenge/response exchange for one visitor identity and
/// mints the access token bound to it. Every step is a hard failure - the
/// caller retries the whole session bootstrap, if at all, at full cost, since
/// neither the challenge nor the integrity token can be reused.
pub(crate) async fn mint_access_token(
    config: &AppConfig,
    transport: &dyn PlatformTransport,
    runner: &dyn AttestationRunner,
    visitor_data: &str,
) -> Result<String, Error> {
    let request_key = config.attestation.request_key.as_str();

    let raw = transport.create_challenge(request_key).await
        .map_err(|e| Error::Protocol(e.context("Failed to obtain an attestation challenge")))?;
    let challenge = parse_challenge(&raw)?;
    match challenge.interpreter_script {
        Some(ref script) if !script.is_empty() => {},
        _ => return Err(Error::AttestationUnavailable(anyhow!("the challenge carried no interpreter script"))),
    }

    debug!("Evaluating the attestation program bound to '{}'", challenge.global_name);
    let deadline = Duration::from_secs_f64(config.attestation.deadline_secs);
    let response = match timeout(deadline, runner.evaluate(&challenge, visitor_data)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => return Err(Error::AttestationUnavailable(err.context("Failed to evaluate the attestation program"))),
        Err(_) => return Err(Error::AttestationUnavailable(anyhow!("attestation program evaluation missed its {deadline:?} deadline"))),
    };

    let raw = transport.generate_integrity_token(request_key, &response).await
        .map_err(|e| Error::Protocol(e.context("Failed to exchange the attestation response for an integrity token")))?;
    let integrity_token = raw.as_array()
        .and_then(|arr| arr.first())
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol(anyhow!("the integrity token response did not start with a credential")))?;

    info!("Minting an access token for the current visitor identity");
    mint_token(integrity_token, visitor_data).map_err(Error::Protocol)
}

/// The `Create` reply either carries the challenge array directly or as a
/// scrambled string. Fields are positional: message id, wrapped interpreter
/// script, interpreter URL, program, global name.
pub(crate) fn parse_challenge(raw: &Value) -> Result<AttestationChallenge, Error> {
    let outer = raw.as_array()
        .ok_or_else(|| Error::Protocol(anyhow!("the challenge response was not an array")))?;

    let fields: Vec<Value> = if let Some(scrambled) = outer.get(1).and_then(Value::as_str) {
        let descrambled = descramble(scrambled).map_err(Error::Protocol)?;
        serde_json::from_str(&descrambled)
            .map_err(|e| Error::Protocol(e.context("Failed to parse the descrambled challenge")))?
    } else if let Some(Value::Array(fields)) = outer.first() {
        fields.clone()
    } else {
        return Err(Error::Protocol(anyhow!("the challenge response carried no challenge data")));
    };

    let message_id = fields.first().and_then(Value::as_str).map(str::to_owned);
    // The interpreter script hides as the only string element of a nested array.
    let interpreter_script = fields.get(1)
        .and_then(Value::as_array)
        .and_then(|wrapped| wrapped.iter().find_map(Value::as_str))
        .map(str::to_owned);
    let interpreter_url = fields.get(2).and_then(Value::as_str).map(str::to_owned);
    let program = fields.get(3).and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol(anyhow!("the challenge carried no attestation program")))?
        .to_owned();
    let global_name = fields.get(4).and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol(anyhow!("the challenge carried no global binding name")))?
        .to_owned();

    Ok(AttestationChallenge {
        message_id,
        interpreter_script,
        interpreter_url,
        program,
        global_name,
    })
}

// Scrambled challenges are base64 of the JSON text with every byte shifted
// down by 97.
fn descramble(scrambled: &str) -> Result<String, ErrorContext> {
    let mut bytes = BASE64_STANDARD.decode(scrambled)
        .context("Scrambled challenge was not valid base64")?;
    for byte in &mut bytes {
        *byte = byte.wrapping_add(97);
    }
    String::from_utf8(bytes).context("Descrambled challenge was not valid utf-8")
}

/// The final mint is a local operation - no further network round trip. The
/// packet binds the visitor identity to the integrity token by deriving the
/// obfuscation keys from the token's leading bytes.
pub(crate) fn mint_token(integrity_token: &str, visitor_data: &str) -> Result<String, ErrorContext> {
    let token_bytes = BASE64_URL_SAFE_NO_PAD.decode(integrity_token.trim_end_matches('='))
        .or_else(|_| BASE64_STANDARD.decode(integrity_token))
        .context("Integrity token was not valid base64")?;
    let &[key0, key1, ..] = token_bytes.as_slice() else {
        bail!("Integrity token was too short to derive obfuscation keys");
    };

    let identity = visitor_data.as_bytes();
    let ts = Utc::now().timestamp() as u32;

    // Header (2 bytes) + payload (keys, flags, timestamp, identity).
    let mut packet = vec![0u8; 10 + identity.len()];
    packet[0] = 0x22;
    packet[1] = (8 + identity.len()) as u8;
    packet[2] = key0;
    packet[3] = key1;
    packet[4] = 0;
    packet[5] = 1;
    packet[6..10].copy_from_slice(&ts.to_be_bytes());
    packet[10..].copy_from_slice(identity);

    // Payload starts after the 2 header bytes; its first two bytes are the keys.
    let payload_len = 8 + identity.len();
    for i in 2..payload_len {
        packet[2 + i] ^= packet[2 + (i & 1)];
    }

    Ok(BASE64_URL_SAFE_NO_PAD.encode(&packet))
}
