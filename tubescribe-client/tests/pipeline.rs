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

//! Full pipeline tests over an instrumented stub transport: session
//! bootstrap, token minting, video info caching and both extractors, without
//! touching the network.

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::Arc;

use async_trait::async_trait;
use cloneable_errors::ErrorContext;
use serde_json::{json, Value};
use tubescribe_client::innertube::it::player::out;
use tubescribe_client::{
    AppConfig, AttestationChallenge, AttestationRunner, AuthenticatedSession, ErrorKind,
    PlatformTransport, SessionCache, Youtube,
};

const VIDEO_ID: &str = "dQw4w9WgXcQ";
const VISITOR_DATA: &str = "CgtStubVisitor";
const CAPTIONS: &str = concat!(
    r#"<transcript><text start="0" dur="2">It&#39;s &amp; great</text>"#,
    r#"<text start="2" dur="2">second line</text></transcript>"#,
);

#[derive(Default)]
struct Counters {
    bootstrap: AtomicUsize,
    challenge: AtomicUsize,
    integrity: AtomicUsize,
    player: AtomicUsize,
    captions: AtomicUsize,
}

struct StubTransport {
    counters: Arc<Counters>,
    bootstrap_body: String,
    captions_body: String,
    with_captions: bool,
    with_title: bool,
}

impl StubTransport {
    fn new(counters: Arc<Counters>) -> StubTransport {
        StubTransport {
            counters,
            bootstrap_body: format!(r#"<html>ytcfg.set({{"VISITOR_DATA":"{VISITOR_DATA}"}})</html>"#),
            captions_body: CAPTIONS.to_owned(),
            with_captions: true,
            with_title: true,
        }
    }
}

#[async_trait]
impl PlatformTransport for StubTransport {
    async fn bootstrap_page(&self, _cookie: Option<&str>) -> Result<String, ErrorContext> {
        self.counters.bootstrap.fetch_add(1, Relaxed);
        Ok(self.bootstrap_body.clone())
    }

    async fn create_challenge(&self, _request_key: &str) -> Result<Value, ErrorContext> {
        self.counters.challenge.fetch_add(1, Relaxed);
        Ok(json!([[
            "msg-id",
            [null, "interpreter-script"],
            "https://example.invalid/interpreter.js",
            "program-bytes",
            "attestationEntry",
        ]]))
    }

    async fn generate_integrity_token(&self, _request_key: &str, attestation_response: &str) -> Result<Value, ErrorContext> {
        self.counters.integrity.fetch_add(1, Relaxed);
        assert_eq!(attestation_response, "stub-attestation-response");
        Ok(json!(["SW50ZWdyaXR5", 43200, 100]))
    }

    async fn player(&self, session: &AuthenticatedSession, video_id: &str) -> Result<out::Video, ErrorContext> {
        self.counters.player.fetch_add(1, Relaxed);
        assert_eq!(session.visitor_data.as_ref(), VISITOR_DATA);
        assert!(!session.access_token.is_empty());
        Ok(out::Video {
            video_details: Some(out::VideoDetails {
                video_id: video_id.to_owned(),
                title: self.with_title.then(|| "Stub video".to_owned()),
                short_description: Some("A description".to_owned()),
                channel_id: Some("UCstub".to_owned()),
                author: Some("Stub channel".to_owned()),
                view_count: Some("1234".to_owned()),
                keywords: None,
            }),
            captions: self.with_captions.then(|| out::Captions {
                player_captions_tracklist_renderer: Some(out::TracklistRenderer {
                    caption_tracks: vec![out::CaptionTrack {
                        base_url: "https://captions.example.invalid/api/timedtext?v=stub&lang=en".to_owned(),
                        language_code: Some("en".to_owned()),
                        name: None,
                    }],
                }),
            }),
            microformat: Some(out::Microformat {
                player_microformat_renderer: Some(out::MicroformatRenderer {
                    publish_date: Some("2024-08-08".to_owned()),
                    category: Some("Education".to_owned()),
                    like_count: None,
                }),
            }),
            playability_status: Some(out::PlayabilityStatus { status: Some("OK".to_owned()) }),
        })
    }

    async fn fetch_captions(&self, url: &str) -> Result<String, ErrorContext> {
        self.counters.captions.fetch_add(1, Relaxed);
        assert!(url.contains("pot="), "caption URL should carry the access token: {url}");
        Ok(self.captions_body.clone())
    }
}

struct StubRunner;

#[async_trait]
impl AttestationRunner for StubRunner {
    async fn evaluate(&self, challenge: &AttestationChallenge, visitor_data: &str) -> Result<String, ErrorContext> {
        assert_eq!(challenge.global_name, "attestationEntry");
        assert_eq!(challenge.program, "program-bytes");
        assert_eq!(visitor_data, VISITOR_DATA);
        Ok("stub-attestation-response".to_owned())
    }
}

fn youtube_with(transport: StubTransport) -> Youtube {
    Youtube::with_parts(AppConfig::default(), Arc::new(transport), Arc::new(StubRunner))
}

#[tokio::test]
async fn metadata_and_transcript_come_out_normalized() {
    let counters = Arc::new(Counters::default());
    let youtube = youtube_with(StubTransport::new(counters.clone()));

    let metadata = youtube.get_metadata(VIDEO_ID).await.unwrap();
    assert_eq!(metadata.id, VIDEO_ID);
    assert_eq!(metadata.title, "Stub video");
    assert_eq!(metadata.channel_id, "UCstub");
    assert_eq!(metadata.published_at, "2024-08-08");
    assert_eq!(metadata.view_count, 1234);
    assert_eq!(metadata.like_count, None);
    assert_eq!(metadata.tags, Vec::<String>::new());

    let transcript = youtube.get_transcript(VIDEO_ID).await.unwrap();
    assert_eq!(transcript, "It's & great second line");

    assert_eq!(counters.bootstrap.load(Relaxed), 1);
    assert_eq!(counters.challenge.load(Relaxed), 1);
    assert_eq!(counters.integrity.load(Relaxed), 1);
    assert_eq!(counters.captions.load(Relaxed), 1);
}

#[tokio::test]
async fn repeated_lookups_are_served_from_the_cache() {
    let counters = Arc::new(Counters::default());
    let youtube = youtube_with(StubTransport::new(counters.clone()));

    youtube.get_metadata(VIDEO_ID).await.unwrap();
    youtube.get_metadata(VIDEO_ID).await.unwrap();

    assert_eq!(counters.player.load(Relaxed), 1);
    assert_eq!(counters.bootstrap.load(Relaxed), 1);
}

#[tokio::test]
async fn cache_hits_return_the_same_video_info() {
    let counters = Arc::new(Counters::default());
    let cache = SessionCache::new(
        Arc::new(AppConfig::default()),
        Arc::new(StubTransport::new(counters)),
        Arc::new(StubRunner),
    );

    let first = cache.video_info(VIDEO_ID).await.unwrap();
    let second = cache.video_info(VIDEO_ID).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn concurrent_callers_share_one_session_build() {
    let counters = Arc::new(Counters::default());
    let youtube = youtube_with(StubTransport::new(counters.clone()));

    let (metadata, transcript) = futures::join!(
        youtube.get_metadata(VIDEO_ID),
        youtube.get_transcript(VIDEO_ID),
    );
    metadata.unwrap();
    transcript.unwrap();

    // Only the first caller may run the bootstrap/mint sequence.
    assert_eq!(counters.bootstrap.load(Relaxed), 1);
    assert_eq!(counters.challenge.load(Relaxed), 1);
    assert_eq!(counters.integrity.load(Relaxed), 1);
}

#[tokio::test]
async fn bootstrap_failure_skips_the_attestation_exchange() {
    let counters = Arc::new(Counters::default());
    let mut transport = StubTransport::new(counters.clone());
    transport.bootstrap_body = "<html>no identity in here</html>".to_owned();
    let youtube = youtube_with(transport);

    let err = youtube.get_metadata(VIDEO_ID).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BootstrapFailed);
    assert_eq!(counters.challenge.load(Relaxed), 0);
}

#[tokio::test]
async fn short_captions_payload_is_a_placeholder() {
    let counters = Arc::new(Counters::default());
    let mut transport = StubTransport::new(counters.clone());
    transport.captions_body = "<transcript/>".to_owned();
    let youtube = youtube_with(transport);

    let err = youtube.get_transcript(VIDEO_ID).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TranscriptUnavailable);
}

#[tokio::test]
async fn videos_without_caption_tracks_have_no_transcript() {
    let counters = Arc::new(Counters::default());
    let mut transport = StubTransport::new(counters.clone());
    transport.with_captions = false;
    let youtube = youtube_with(transport);

    let err = youtube.get_transcript(VIDEO_ID).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoCaptionsFound);

    // Metadata for the same video still works.
    youtube.get_metadata(VIDEO_ID).await.unwrap();
}

#[tokio::test]
async fn missing_title_fails_validation() {
    let counters = Arc::new(Counters::default());
    let mut transport = StubTransport::new(counters.clone());
    transport.with_title = false;
    let youtube = youtube_with(transport);

    let err = youtube.get_metadata(VIDEO_ID).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}
