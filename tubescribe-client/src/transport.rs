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
use std::time::Duration;

use async_trait::async_trait;
use cloneable_errors::{ErrorContext, ResContext};
use reqwest::header::{CONTENT_TYPE, COOKIE, USER_AGENT};
use serde_json::Value;

use crate::constants::*;
use crate::innertube::it;
use crate::session::AuthenticatedSession;
use crate::state::AppConfig;

/// The wire boundary of the pipeline. Everything that leaves the process goes
/// through this trait, so tests can substitute an instrumented stub.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// Fetch the unauthenticated bootstrap page the visitor identity is scraped from.
    async fn bootstrap_page(&self, cookie: Option<&str>) -> Result<String, ErrorContext>;
    /// `Create` call of the attestation service.
    async fn create_challenge(&self, request_key: &str) -> Result<Value, ErrorContext>;
    /// `GenerateIT` call of the attestation service.
    async fn generate_integrity_token(&self, request_key: &str, attestation_response: &str) -> Result<Value, ErrorContext>;
    /// Platform video info query, authenticated by the session's token pair.
    async fn player(&self, session: &AuthenticatedSession, video_id: &str) -> Result<it::player::out::Video, ErrorContext>;
    /// Retrieve a captions document from a fully built track URL.
    async fn fetch_captions(&self, url: &str) -> Result<String, ErrorContext>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> Result<HttpTransport, ErrorContext> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.reqwest_timeout_secs))
            .build()
            .context("Failed to construct the reqwest client")?;
        Ok(HttpTransport {
            client,
            api_key: config.attestation.api_key.clone(),
        })
    }

    // Both attestation endpoints take a JSON array body with protobuf-flavored
    // headers and answer with a JSON array.
    async fn attestation_call(&self, url: &reqwest::Url, body: &Value) -> Result<Value, ErrorContext> {
        let body = serde_json::to_vec(body).context("Failed to serialize the request body")?;
        let resp = self.client.post(url.clone())
            .header(CONTENT_TYPE, ATTESTATION_CONTENT_TYPE)
            .header("x-goog-api-key", &self.api_key)
            .header("x-user-agent", ATTESTATION_USER_AGENT)
            .body(body)
            .send().await.context("Failed to send the request")?;
        let resp = resp.error_for_status().context("Request failed")?;
        resp.json().await.context("Failed to deserialize the response")
    }
}

#[async_trait]
impl PlatformTransport for HttpTransport {
    async fn bootstrap_page(&self, cookie: Option<&str>) -> Result<String, ErrorContext> {
        let mut req = self.client.get(YT_BASE_URL.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT);
        if let Some(cookie) = cookie {
            req = req.header(COOKIE, cookie);
        }
        let resp = req.send().await.context("Failed to send the bootstrap page request")?;
        let resp = resp.error_for_status().context("Bootstrap page request failed")?;
        resp.text().await.context("Failed to receive the bootstrap page")
    }

    async fn create_challenge(&self, request_key: &str) -> Result<Value, ErrorContext> {
        self.attestation_call(&WAA_CREATE_URL, &serde_json::json!([request_key])).await
    }

    async fn generate_integrity_token(&self, request_key: &str, attestation_response: &str) -> Result<Value, ErrorContext> {
        self.attestation_call(&WAA_GENERATE_IT_URL, &serde_json::json!([request_key, attestation_response])).await
    }

    async fn player(&self, session: &AuthenticatedSession, video_id: &str) -> Result<it::player::out::Video, ErrorContext> {
        let input = {
            let mut context = it::Context::default();
            context.client.visitor_data = Some(&session.visitor_data);
            it::player::Input {
                context,
                video_id,
                service_integrity_dimensions: Some(it::player::Sid { po_token: &session.access_token }),
            }
        };
        let mut req = self.client.post(IT_PLAYER_URL.clone())
            .json(&input)
            .header("X-Goog-Visitor-Id", session.visitor_data.as_ref());
        if let Some(cookie) = session.cookie.as_deref() {
            req = req.header(COOKIE, cookie);
        }
        let resp = req.send().await.context("Failed to send the player request")?;
        let resp = resp.error_for_status().context("Player request failed")?;
        resp.json().await.context("Failed to deserialize the player response")
    }

    async fn fetch_captions(&self, url: &str) -> Result<String, ErrorContext> {
        let url = reqwest::Url::parse(url).context("Failed to parse the caption track URL")?;
        let resp = self.client.get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send().await.context("Failed to send the caption track request")?;
        let resp = resp.error_for_status().context("Caption track request failed")?;
        resp.text().await.context("Failed to receive the captions document")
    }
}
