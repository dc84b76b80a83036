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
use serde::Serialize;

use crate::errors::Error;
use crate::innertube::VideoInfo;

/// The normalized metadata shape handed to the application layer. Optional
/// platform fields fall back to safe defaults; only id and title are
/// mandatory.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
pub struct Metadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub view_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
}

pub(crate) fn from_video_info(info: &VideoInfo) -> Result<Metadata, Error> {
    if info.video_id.is_empty() {
        return Err(Error::Validation { video_id: info.video_id.clone(), field: "id" });
    }
    let title = match info.title {
        Some(ref title) if !title.is_empty() => title.clone(),
        _ => return Err(Error::Validation { video_id: info.video_id.clone(), field: "title" }),
    };

    Ok(Metadata {
        id: info.video_id.to_string(),
        title,
        description: info.description.clone().unwrap_or_default(),
        published_at: info.publish_date.clone().unwrap_or_default(),
        channel_id: info.channel_id.clone().unwrap_or_default(),
        channel_title: info.channel_title.clone().unwrap_or_default(),
        category: info.category.clone().unwrap_or_default(),
        tags: info.keywords.clone().unwrap_or_default(),
        view_count: info.view_count.unwrap_or_default(),
        like_count: info.like_count,
    })
}
