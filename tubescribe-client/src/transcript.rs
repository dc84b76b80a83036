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
use cloneable_errors::{anyhow, ErrContext, ErrorContext, ResContext};
use log::debug;

use crate::constants::{CAPTION_SPAN_REGEX, CLIENT_NAME, CLIENT_VERSION, MIN_CAPTIONS_BYTES};
use crate::errors::Error;
use crate::state::SessionCache;

// Match priority at each position, in contract order. The order and the
// single-pass scan are load-bearing: replacement output is never rescanned,
// so an ampersand decoded from `&amp;` cannot merge with the following text
// into a second entity.
const ENTITIES: [(&str, char); 5] = [
    ("&#39;", '\''),
    ("&quot;", '"'),
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
];

/// Turns a raw captions document into a normalized transcript string: the
/// inner content of every `<text>` span (attributes ignored), joined with a
/// single space, entities decoded. Pure and total - no spans means an empty
/// string.
pub fn decode_captions(markup: &str) -> String {
    let joined = CAPTION_SPAN_REGEX.captures_iter(markup)
        .map(|captures| captures.get(1).map_or("", |m| m.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    decode_entities(&joined)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (entity, decoded) in ENTITIES {
            if rest.starts_with(entity) {
                out.push(decoded);
                rest = &rest[entity.len()..];
                continue 'outer;
            }
        }
        // Not one of the five caption entities - leave it alone.
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

/// Retrieves and decodes the transcript for one video. The result is never
/// cached - the track URL embeds freshness parameters, so it is rebuilt from
/// the cached [`crate::innertube::VideoInfo`] on every call.
pub(crate) async fn fetch_transcript(cache: &SessionCache, video_id: &str) -> Result<String, Error> {
    let info = cache.video_info(video_id).await?;
    let Some(track) = info.caption_tracks.first() else {
        return Err(Error::NoCaptionsFound { video_id: video_id.into() });
    };

    let session = cache.session().await?;
    let url = caption_url(&track.base_url, &session.access_token)
        .map_err(Error::Protocol)?;

    debug!("Retrieving captions for {video_id}");
    let markup = cache.transport().fetch_captions(url.as_str()).await
        .map_err(|e| Error::TranscriptUnavailable {
            video_id: video_id.into(),
            context: e.context("Failed to retrieve the captions document"),
        })?;

    if markup.len() < MIN_CAPTIONS_BYTES {
        return Err(Error::TranscriptUnavailable {
            video_id: video_id.into(),
            context: anyhow!("the platform returned a {} byte placeholder instead of captions", markup.len()),
        });
    }
    Ok(decode_captions(&markup))
}

/// Appends the freshness/track-selection parameters the platform requires on
/// top of the track's base URL, including the session's access token.
fn caption_url(base_url: &str, access_token: &str) -> Result<reqwest::Url, ErrorContext> {
    let mut url = reqwest::Url::parse(base_url).context("Failed to parse the caption track base URL")?;
    url.query_pairs_mut()
        .append_pair("pot", access_token)
        .append_pair("c", CLIENT_NAME)
        .append_pair("cver", CLIENT_VERSION);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{caption_url, decode_captions, decode_entities};

    #[test]
    fn joins_every_span_with_a_single_space() {
        let markup = r#"<text start="0" dur="1.5">one</text><text a="1" b="2">two</text><text>three</text>"#;
        assert_eq!(decode_captions(markup), "one two three");
    }

    #[test]
    fn no_spans_decode_to_an_empty_string() {
        assert_eq!(decode_captions("<transcript></transcript>"), "");
        assert_eq!(decode_captions(""), "");
    }

    #[test]
    fn decodes_the_five_caption_entities() {
        assert_eq!(decode_captions(r#"<text a="1">It&#39;s &amp; great</text>"#), "It's & great");
        assert_eq!(decode_captions("<text>&quot;x&quot; &lt;y&gt;</text>"), "\"x\" <y>");
    }

    #[test]
    fn entity_decoding_is_a_single_pass() {
        // A decoded ampersand must not merge with following text into a new entity.
        assert_eq!(decode_captions("<text>&amp;lt;</text>"), "&lt;");
        assert_eq!(decode_captions("<text>&amp;amp;</text>"), "&amp;");
    }

    #[test]
    fn decoding_is_idempotent_on_plain_text() {
        let plain = decode_captions("<text>no entities in here at all</text>");
        assert_eq!(decode_entities(&plain), plain);
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(decode_captions("<text>&nbsp; &#39; &</text>"), "&nbsp; ' &");
    }

    #[test]
    fn caption_urls_carry_the_access_token() {
        let url = caption_url("https://example.invalid/api/timedtext?v=abc&lang=en", "the-token").unwrap();
        let query: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert!(query.contains(&("v".to_owned(), "abc".to_owned())));
        assert!(query.contains(&("pot".to_owned(), "the-token".to_owned())));
        assert!(query.contains(&("c".to_owned(), "WEB".to_owned())));
    }
}
