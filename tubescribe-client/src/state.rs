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
use std::collections::HashMap;
use std::sync::Arc;

use cloneable_errors::ErrContext;
use futures::future::{BoxFuture, Shared};
use futures::lock::Mutex;
use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationRunner;
use crate::constants::{ATTESTATION_API_KEY, REQUEST_KEY};
use crate::errors::Error;
use crate::innertube::{self, VideoInfo};
use crate::session::{self, AuthenticatedSession};
use crate::transport::PlatformTransport;

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Optional session cookie for a personalized bootstrap identity.
    pub cookie: Option<String>,
    pub reqwest_timeout_secs: f64,
    pub attestation: AttestationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            reqwest_timeout_secs: 20.,
            attestation: AttestationConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AttestationConfig {
    pub request_key: String,
    pub api_key: String,
    /// Command hosting the vendor attestation program.
    pub runner_command: Vec<String>,
    /// Deadline for one attestation program evaluation.
    pub deadline_secs: f64,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            request_key: REQUEST_KEY.to_owned(),
            api_key: ATTESTATION_API_KEY.to_owned(),
            runner_command: vec!["node".to_owned(), "./attestation-runner.mjs".to_owned()],
            deadline_secs: 15.,
        }
    }
}

type SessionResult = Result<Arc<AuthenticatedSession>, Error>;
type SharedSessionFuture = Shared<BoxFuture<'static, SessionResult>>;

/// Process-wide memoization: the single session future plus the per-video
/// info map. Constructor-injected rather than ambient module state, so every
/// test run gets an isolated instance. Lives until the process exits.
pub struct SessionCache {
    session: Mutex<Option<SharedSessionFuture>>,
    video_infos: Mutex<HashMap<Arc<str>, Arc<VideoInfo>>>,
    config: Arc<AppConfig>,
    transport: Arc<dyn PlatformTransport>,
    runner: Arc<dyn AttestationRunner>,
}

impl SessionCache {
    pub fn new(config: Arc<AppConfig>, transport: Arc<dyn PlatformTransport>, runner: Arc<dyn AttestationRunner>) -> SessionCache {
        SessionCache {
            session: Mutex::default(),
            video_infos: Mutex::default(),
            config,
            transport,
            runner,
        }
    }

    pub(crate) fn transport(&self) -> &dyn PlatformTransport {
        self.transport.as_ref()
    }

    /// The first caller kicks off the bootstrap/mint sequence; concurrent and
    /// later callers share its result instead of re-minting. Minting is
    /// rate-limited remotely, so a duplicate build is never acceptable.
    pub async fn session(&self) -> SessionResult {
        let future = {
            let mut slot = self.session.lock().await;
            slot.get_or_insert_with(|| {
                session::build_session(self.config.clone(), self.transport.clone(), self.runner.clone())
                    .boxed()
                    .shared()
            }).clone()
        };
        future.await
    }

    /// Cache hits are returned unchanged for the rest of the process - no
    /// revalidation, no expiry.
    pub async fn video_info(&self, video_id: &str) -> Result<Arc<VideoInfo>, Error> {
        {
            let cache = self.video_infos.lock().await;
            if let Some(info) = cache.get(video_id) {
                debug!("Video info cache hit for {video_id}");
                return Ok(info.clone());
            }
        }

        let session = self.session().await?;
        let response = self.transport.player(&session, video_id).await
            .map_err(|e| Error::VideoNotFound {
                video_id: video_id.into(),
                context: e.context("Failed to query the platform for video info"),
            })?;
        let info = Arc::new(innertube::into_video_info(video_id, response)?);

        let mut cache = self.video_infos.lock().await;
        Ok(cache.entry(video_id.into()).or_insert(info).clone())
    }
}
