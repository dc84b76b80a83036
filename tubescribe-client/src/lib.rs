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

//! Client for retrieving video metadata and caption transcripts from a
//! platform that requires a freshly minted proof-of-origin token before it
//! serves caption data.
//!
//! The pipeline: an unauthenticated bootstrap call yields a visitor identity,
//! the attestation challenge/response exchange turns that identity into an
//! access token, and the resulting session is memoized for the process
//! lifetime together with every video info response it fetches. Repeated
//! lookups for the same video never touch the network twice.
//!
//! ```no_run
//! use tubescribe_client::{AppConfig, Youtube};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let youtube = Youtube::new(AppConfig::default())?;
//! let metadata = youtube.get_metadata("dQw4w9WgXcQ").await?;
//! let transcript = youtube.get_transcript("dQw4w9WgXcQ").await?;
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod constants;
pub mod errors;
pub mod innertube;
pub mod metadata;
pub mod session;
pub mod state;
pub mod transcript;
pub mod transport;

use std::sync::Arc;

use cloneable_errors::ErrorContext;

pub use crate::attestation::{AttestationChallenge, AttestationRunner, ProcessRunner};
pub use crate::errors::{Error, ErrorKind};
pub use crate::innertube::{CaptionTrack, VideoInfo};
pub use crate::metadata::Metadata;
pub use crate::session::AuthenticatedSession;
pub use crate::state::{AppConfig, AttestationConfig, SessionCache};
pub use crate::transcript::decode_captions;
pub use crate::transport::{HttpTransport, PlatformTransport};

/// The externally consumed surface. Both operations are idempotent within one
/// process - repeated calls for the same id are served from the session
/// cache.
pub struct Youtube {
    cache: SessionCache,
}

impl Youtube {
    /// Production wiring: one reqwest client for all calls, the vendor
    /// attestation program hosted by the configured external command.
    pub fn new(config: AppConfig) -> Result<Youtube, ErrorContext> {
        let config = Arc::new(config);
        let transport = Arc::new(HttpTransport::new(&config)?);
        let runner = Arc::new(ProcessRunner::new(&config));
        Ok(Youtube { cache: SessionCache::new(config, transport, runner) })
    }

    /// Injected seams - used by tests to substitute stub transports and
    /// runners for isolated, instrumented pipelines.
    pub fn with_parts(
        config: AppConfig,
        transport: Arc<dyn PlatformTransport>,
        runner: Arc<dyn AttestationRunner>,
    ) -> Youtube {
        Youtube { cache: SessionCache::new(Arc::new(config), transport, runner) }
    }

    pub async fn get_metadata(&self, video_id: &str) -> Result<Metadata, Error> {
        let info = self.cache.video_info(video_id).await?;
        metadata::from_video_info(&info)
    }

    pub async fn get_transcript(&self, video_id: &str) -> Result<String, Error> {
        transcript::fetch_transcript(&self.cache, video_id).await
    }
}
