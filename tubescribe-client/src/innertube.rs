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
use std::sync::Arc;

use cloneable_errors::anyhow;

use crate::errors::Error;

/// Owned view of one player response. Immutable once it lands in the session
/// cache - the same value is returned for this id until the process exits.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub video_id: Arc<str>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub view_count: Option<u64>,
    pub keywords: Option<Vec<String>>,
    pub publish_date: Option<String>,
    pub category: Option<String>,
    pub like_count: Option<u64>,
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone)]
pub struct CaptionTrack {
    /// Base retrieval URL. Freshness parameters get appended at request time.
    pub base_url: String,
    pub language_code: Option<String>,
    pub name: Option<String>,
}

pub(crate) fn into_video_info(video_id: &str, response: it::player::out::Video) -> Result<VideoInfo, Error> {
    let Some(details) = response.video_details else {
        return Err(Error::VideoNotFound {
            video_id: video_id.into(),
            context: anyhow!("the player response carried no video details"),
        });
    };
    if details.video_id != video_id {
        return Err(Error::VideoNotFound {
            video_id: video_id.into(),
            context: anyhow!("the platform returned the wrong video - requested: {video_id}, got: {}", details.video_id),
        });
    }
    if let Some(status) = response.playability_status.and_then(|s| s.status) {
        if status != "OK" {
            return Err(Error::VideoNotFound {
                video_id: video_id.into(),
                context: anyhow!("video is not playable: {status}"),
            });
        }
    }

    let microformat = response.microformat.and_then(|m| m.player_microformat_renderer);
    let (publish_date, category, like_count) = match microformat {
        Some(m) => (m.publish_date, m.category, m.like_count.and_then(|count| count.parse().ok())),
        None => (None, None, None),
    };

    let caption_tracks = response.captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .map(|renderer| renderer.caption_tracks)
        .unwrap_or_default()
        .into_iter()
        .map(|track| CaptionTrack {
            base_url: track.base_url,
            language_code: track.language_code,
            name: track.name.and_then(|name| name.simple_text),
        })
        .collect();

    Ok(VideoInfo {
        video_id: video_id.into(),
        title: details.title,
        description: details.short_description,
        channel_id: details.channel_id,
        channel_title: details.author,
        view_count: details.view_count.and_then(|count| count.parse().ok()),
        keywords: details.keywords,
        publish_date,
        category,
        like_count,
        caption_tracks,
    })
}

pub mod it {
    use serde::Serialize;
    use serde_with::skip_serializing_none;

    use crate::constants::{CLIENT_NAME, CLIENT_VERSION};

    #[derive(Serialize, Clone, Default)]
    pub struct Context<'a> {
        pub client: Client<'a>,
    }

    #[skip_serializing_none]
    #[derive(Serialize, Clone)]
    pub struct Client<'a> {
        #[serde(rename="clientName")]
        pub client_name: &'static str,
        #[serde(rename="clientVersion")]
        pub client_version: &'static str,
        #[serde(rename="visitorData")]
        pub visitor_data: Option<&'a str>,
    }

    impl Default for Client<'_> {
        fn default() -> Self {
            Self {
                client_name: CLIENT_NAME,
                client_version: CLIENT_VERSION,
                visitor_data: None,
            }
        }
    }

    pub mod player {
        use serde::Serialize;
        use serde_with::skip_serializing_none;

        #[skip_serializing_none]
        #[derive(Serialize, Clone)]
        pub struct Input<'a> {
            pub context: super::Context<'a>,
            #[serde(rename="videoId")]
            pub video_id: &'a str,
            #[serde(rename="serviceIntegrityDimensions")]
            pub service_integrity_dimensions: Option<Sid<'a>>,
        }

        #[derive(Serialize, Clone)]
        pub struct Sid<'a> {
            #[serde(rename="poToken")]
            pub po_token: &'a str
        }

        pub mod out {
            use serde::Deserialize;
            use serde_with::{serde_as, VecSkipError};

            #[derive(Deserialize, Clone, Default)]
            pub struct Video {
                #[serde(rename="videoDetails")]
                pub video_details: Option<VideoDetails>,
                pub captions: Option<Captions>,
                pub microformat: Option<Microformat>,
                #[serde(rename="playabilityStatus")]
                pub playability_status: Option<PlayabilityStatus>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct PlayabilityStatus {
                pub status: Option<String>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct VideoDetails {
                #[serde(rename="videoId")]
                pub video_id: String,
                pub title: Option<String>,
                #[serde(rename="shortDescription")]
                pub short_description: Option<String>,
                #[serde(rename="channelId")]
                pub channel_id: Option<String>,
                pub author: Option<String>,
                #[serde(rename="viewCount")]
                pub view_count: Option<String>,
                pub keywords: Option<Vec<String>>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct Captions {
                #[serde(rename="playerCaptionsTracklistRenderer")]
                pub player_captions_tracklist_renderer: Option<TracklistRenderer>,
            }

            #[serde_as]
            #[derive(Deserialize, Clone, Default)]
            pub struct TracklistRenderer {
                #[serde_as(as="VecSkipError<_>")]
                #[serde(rename="captionTracks", default)]
                pub caption_tracks: Vec<CaptionTrack>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct CaptionTrack {
                #[serde(rename="baseUrl")]
                pub base_url: String,
                #[serde(rename="languageCode")]
                pub language_code: Option<String>,
                pub name: Option<TrackName>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct TrackName {
                #[serde(rename="simpleText")]
                pub simple_text: Option<String>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct Microformat {
                #[serde(rename="playerMicroformatRenderer")]
                pub player_microformat_renderer: Option<MicroformatRenderer>,
            }

            #[derive(Deserialize, Clone, Default)]
            pub struct MicroformatRenderer {
                #[serde(rename="publishDate")]
                pub publish_date: Option<String>,
                pub category: Option<String>,
                #[serde(rename="likeCount")]
                pub like_count: Option<String>,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::it::player::out;
    use super::into_video_info;
    use crate::errors::ErrorKind;

    fn details(video_id: &str) -> out::VideoDetails {
        out::VideoDetails {
            video_id: video_id.to_owned(),
            title: Some("A title".to_owned()),
            ..out::VideoDetails::default()
        }
    }

    #[test]
    fn missing_video_details_is_video_not_found() {
        let err = into_video_info("dQw4w9WgXcQ", out::Video::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VideoNotFound);
    }

    #[test]
    fn wrong_video_id_is_video_not_found() {
        let response = out::Video {
            video_details: Some(details("aaaaaaaaaaa")),
            ..out::Video::default()
        };
        let err = into_video_info("dQw4w9WgXcQ", response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VideoNotFound);
    }

    #[test]
    fn unplayable_video_is_video_not_found() {
        let response = out::Video {
            video_details: Some(details("dQw4w9WgXcQ")),
            playability_status: Some(out::PlayabilityStatus { status: Some("LOGIN_REQUIRED".to_owned()) }),
            ..out::Video::default()
        };
        let err = into_video_info("dQw4w9WgXcQ", response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VideoNotFound);
    }

    #[test]
    fn numeric_strings_are_parsed_and_bad_ones_dropped() {
        let mut video_details = details("dQw4w9WgXcQ");
        video_details.view_count = Some("1234".to_owned());
        let response = out::Video {
            video_details: Some(video_details),
            microformat: Some(out::Microformat {
                player_microformat_renderer: Some(out::MicroformatRenderer {
                    like_count: Some("not a number".to_owned()),
                    ..out::MicroformatRenderer::default()
                }),
            }),
            ..out::Video::default()
        };
        let info = into_video_info("dQw4w9WgXcQ", response).unwrap();
        assert_eq!(info.view_count, Some(1234));
        assert_eq!(info.like_count, None);
    }
}
