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
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::LazyLock;

use anyhow::{bail, Context};
use env_logger::Env;
use log::error;
use regex::Regex;
use tubescribe_client::{AppConfig, Youtube};

const CONFIG_PATH: &str = "config.toml";

static BARE_ID_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("BARE_ID_REGEX should be valid")
);
static URL_ID_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"(?:v=|youtu\.be/|/shorts/|/embed/|/live/)([A-Za-z0-9_-]{11})").expect("URL_ID_REGEX should be valid")
);

/// Accepts a bare 11-character video id or any of the common watch page,
/// short-link, shorts, embed and live URL shapes.
fn extract_video_id(arg: &str) -> Option<&str> {
    if BARE_ID_REGEX.is_match(arg) {
        return Some(arg);
    }
    URL_ID_REGEX.captures(arg).map(|captures| captures.get(1).expect("URL_ID_REGEX has one capture group").as_str())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let mut config = match File::open(CONFIG_PATH) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents).with_context(|| format!("Failed to read {CONFIG_PATH}"))?;
            toml::from_str(&contents).with_context(|| format!("Failed to deserialize contents of {CONFIG_PATH}"))?
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let cfg = AppConfig::default();
            let serialized = toml::to_string(&cfg).context("Failed to serialize default AppConfig as TOML")?;
            let mut file = File::options().write(true).create_new(true).open(CONFIG_PATH).with_context(|| format!("Failed to create {CONFIG_PATH}"))?;
            write!(file, "{serialized}").with_context(|| format!("Failed to write serialized default AppConfig to {CONFIG_PATH}"))?;
            cfg
        },
        Err(e) => {
            return Err(e).context(format!("Failed to open {CONFIG_PATH}"));
        }
    };
    // The cookie carries account credentials, so the environment wins over
    // the on-disk config.
    if let Ok(cookie) = std::env::var("YOUTUBE_COOKIE") {
        if !cookie.is_empty() {
            config.cookie = Some(cookie);
        }
    }
    Ok(config)
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let (Some(command), Some(target)) = (args.get(1), args.get(2)) else {
        bail!("Usage: {} <metadata|transcript> <video id or URL>", args.first().map_or("tubescribe", String::as_str));
    };
    let Some(video_id) = extract_video_id(target) else {
        bail!("Could not find a video id in {target:?}");
    };

    let youtube = Youtube::new(load_config()?).context("Failed to set up the client")?;
    match command.as_str() {
        "metadata" => {
            let metadata = youtube.get_metadata(video_id).await?;
            println!("{}", serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata as JSON")?);
        },
        "transcript" => {
            println!("{}", youtube.get_transcript(video_id).await?);
        },
        other => bail!("Unknown command {other:?}, expected \"metadata\" or \"transcript\""),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::extract_video_id;

    #[test]
    fn accepts_bare_ids() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("tooshort"), None);
        assert_eq!(extract_video_id("way-too-long-to-be-an-id"), None);
    }

    #[test]
    fn accepts_common_url_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url), Some("dQw4w9WgXcQ"), "failed for {url}");
        }
    }

    #[test]
    fn rejects_urls_without_an_id() {
        assert_eq!(extract_video_id("https://www.youtube.com/"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
    }
}
