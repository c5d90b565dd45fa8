use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variant::{best_variant, strip_tag_param};

const ITEM_CONTENT: &str = "/content/itemContent";
const TWEET_RESULTS: &str = "/content/itemContent/tweet_results";
const RESULT_KEY: &str = "result";
const LEGACY: &str = "/content/itemContent/tweet_results/result/legacy";
const USER_LEGACY: &str =
    "/content/itemContent/tweet_results/result/core/user_results/result/legacy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPost {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub entry_id: Option<String>,
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub author_name: String,
    pub author_avatar_url: String,
    pub body_text: String,
    pub created_at: String,
    pub image_urls: Vec<String>,
    pub video_urls: Vec<String>,
}

impl NormalizedPost {
    pub fn link(&self) -> String {
        format!("https://x.com/{}/status/{}", self.author_handle, self.id)
    }

    pub fn profile_link(&self) -> String {
        format!("https://x.com/{}", self.author_handle)
    }
}

/// Why a raw entry cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Ads, cursors and other non-post timeline entries.
    NotAPost,
    MissingResult,
    MissingLegacy,
    MissingField(&'static str),
    UnsafeIdentifier(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::NotAPost => write!(f, "entry is not a post"),
            InvalidReason::MissingResult => write!(f, "post result is missing"),
            InvalidReason::MissingLegacy => write!(f, "post has no legacy section"),
            InvalidReason::MissingField(field) => write!(f, "missing field: {field}"),
            InvalidReason::UnsafeIdentifier(id) => {
                write!(f, "identifier is not a single path segment: {id:?}")
            }
        }
    }
}

pub fn normalize(raw: &Value) -> Result<NormalizedPost, InvalidReason> {
    check_validity(raw)?;

    let legacy = raw.pointer(LEGACY).ok_or(InvalidReason::MissingLegacy)?;
    let user = raw
        .pointer(USER_LEGACY)
        .ok_or(InvalidReason::MissingField("core.user_results.result.legacy"))?;

    let id = required_str(legacy, "id_str")?;
    let author_id = required_str(legacy, "user_id_str")?;
    ensure_path_segment(&id)?;
    ensure_path_segment(&author_id)?;

    Ok(NormalizedPost {
        entry_id: raw.get("entryId").and_then(Value::as_str).map(str::to_owned),
        id,
        author_id,
        author_handle: required_str(user, "screen_name")?,
        author_name: required_str(user, "name")?,
        author_avatar_url: required_str(user, "profile_image_url_https")?,
        body_text: required_str(legacy, "full_text")?,
        created_at: required_str(legacy, "created_at")?,
        image_urls: image_urls(legacy),
        video_urls: video_urls(legacy),
    })
}

fn check_validity(raw: &Value) -> Result<(), InvalidReason> {
    if !raw.pointer(ITEM_CONTENT).is_some_and(is_present) {
        return Err(InvalidReason::NotAPost);
    }

    let has_result = raw
        .pointer(TWEET_RESULTS)
        .and_then(Value::as_object)
        .is_some_and(|results| results.contains_key(RESULT_KEY));
    if !has_result {
        return Err(InvalidReason::MissingResult);
    }

    if !raw.pointer(LEGACY).is_some_and(is_present) {
        return Err(InvalidReason::MissingLegacy);
    }

    Ok(())
}

/// Absent-like values (null, empty containers, empty strings, false) do not count.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(_) => true,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn required_str(section: &Value, key: &'static str) -> Result<String, InvalidReason> {
    section
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(InvalidReason::MissingField(key))
}

fn ensure_path_segment(id: &str) -> Result<(), InvalidReason> {
    let unsafe_id = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control);
    if unsafe_id {
        return Err(InvalidReason::UnsafeIdentifier(id.to_owned()));
    }
    Ok(())
}

fn media_entries<'a>(legacy: &'a Value, pointer: &str) -> &'a [Value] {
    legacy
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn image_urls(legacy: &Value) -> Vec<String> {
    media_entries(legacy, "/entities/media")
        .iter()
        .filter_map(|entry| entry.get("media_url_https").and_then(Value::as_str))
        .map(str::to_owned)
        .collect()
}

fn video_urls(legacy: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    for entry in media_entries(legacy, "/extended_entities/media") {
        let Some(variants) = entry.pointer("/video_info/variants").and_then(Value::as_array)
        else {
            continue;
        };

        let candidates = variants
            .iter()
            .filter_map(|variant| variant.get("url").and_then(Value::as_str));
        match best_variant(candidates) {
            Some(best) => urls.push(strip_tag_param(best)),
            None => {
                let media_id = entry.get("id_str").and_then(Value::as_str).unwrap_or_default();
                tracing::debug!(
                    media_id,
                    "video attachment has no mp4 variant; skipping"
                );
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_post(legacy: Value) -> Value {
        json!({
            "entryId": "tweet-1050118621198921728",
            "content": {
                "itemContent": {
                    "tweet_results": {
                        "result": {
                            "core": {
                                "user_results": {
                                    "result": {
                                        "legacy": {
                                            "screen_name": "rustlang",
                                            "name": "Rust Language",
                                            "profile_image_url_https": "https://pbs.twimg.com/profile_images/1/avatar_normal.jpg"
                                        }
                                    }
                                }
                            },
                            "legacy": legacy
                        }
                    }
                }
            }
        })
    }

    fn legacy_fields() -> Value {
        json!({
            "id_str": "1050118621198921728",
            "user_id_str": "165262228",
            "full_text": "Caf\u{e9} \u{1f980}",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "entities": {}
        })
    }

    #[test]
    fn extracts_flat_fields() -> anyhow::Result<()> {
        let post = normalize(&raw_post(legacy_fields()))
            .map_err(|reason| anyhow::anyhow!("{reason}"))?;

        assert_eq!(post.entry_id.as_deref(), Some("tweet-1050118621198921728"));
        assert_eq!(post.id, "1050118621198921728");
        assert_eq!(post.author_id, "165262228");
        assert_eq!(post.author_handle, "rustlang");
        assert_eq!(post.author_name, "Rust Language");
        assert_eq!(
            post.author_avatar_url,
            "https://pbs.twimg.com/profile_images/1/avatar_normal.jpg"
        );
        assert_eq!(post.body_text, "Caf\u{e9} \u{1f980}");
        assert_eq!(post.created_at, "Wed Oct 10 20:19:24 +0000 2018");
        assert!(post.image_urls.is_empty());
        assert!(post.video_urls.is_empty());
        assert_eq!(
            post.link(),
            "https://x.com/rustlang/status/1050118621198921728"
        );
        Ok(())
    }

    #[test]
    fn entries_without_item_content_are_not_posts() {
        let cursor = json!({"entryId": "cursor-top-1", "content": {"value": "abc"}});
        assert_eq!(normalize(&cursor), Err(InvalidReason::NotAPost));

        let empty = json!({"content": {"itemContent": {}}});
        assert_eq!(normalize(&empty), Err(InvalidReason::NotAPost));

        let no_content = json!({"entryId": "promoted-1"});
        assert_eq!(normalize(&no_content), Err(InvalidReason::NotAPost));
    }

    #[test]
    fn missing_result_is_invalid() {
        let raw = json!({"content": {"itemContent": {"tweet_results": {}}}});
        assert_eq!(normalize(&raw), Err(InvalidReason::MissingResult));

        let raw = json!({"content": {"itemContent": {"itemType": "TimelineTweet"}}});
        assert_eq!(normalize(&raw), Err(InvalidReason::MissingResult));
    }

    #[test]
    fn result_without_legacy_is_invalid() {
        let raw = json!({
            "content": {"itemContent": {"tweet_results": {"result": {
                "__typename": "TweetWithVisibilityResults",
                "tweet": {}
            }}}}
        });
        assert_eq!(normalize(&raw), Err(InvalidReason::MissingLegacy));

        let raw = raw_post(json!({}));
        assert_eq!(normalize(&raw), Err(InvalidReason::MissingLegacy));
    }

    #[test]
    fn missing_fields_are_invalid_instead_of_panicking() {
        let mut legacy = legacy_fields();
        if let Some(fields) = legacy.as_object_mut() {
            fields.remove("full_text");
        }
        assert_eq!(
            normalize(&raw_post(legacy)),
            Err(InvalidReason::MissingField("full_text"))
        );
    }

    #[test]
    fn identifiers_must_be_path_segments() {
        let mut legacy = legacy_fields();
        legacy["id_str"] = json!("../escape");
        assert_eq!(
            normalize(&raw_post(legacy)),
            Err(InvalidReason::UnsafeIdentifier("../escape".to_owned()))
        );
    }

    #[test]
    fn image_urls_keep_source_order() -> anyhow::Result<()> {
        let mut legacy = legacy_fields();
        legacy["entities"] = json!({"media": [
            {"media_url_https": "https://pbs.twimg.com/media/b.jpg"},
            {"media_url_https": "https://pbs.twimg.com/media/a.jpg"}
        ]});

        let post = normalize(&raw_post(legacy)).map_err(|reason| anyhow::anyhow!("{reason}"))?;
        assert_eq!(
            post.image_urls,
            vec![
                "https://pbs.twimg.com/media/b.jpg",
                "https://pbs.twimg.com/media/a.jpg"
            ]
        );
        Ok(())
    }

    #[test]
    fn video_urls_collapse_each_attachment_to_one_variant() -> anyhow::Result<()> {
        let mut legacy = legacy_fields();
        legacy["extended_entities"] = json!({"media": [
            {
                "id_str": "1",
                "media_url_https": "https://pbs.twimg.com/thumb/1.jpg",
                "video_info": {"variants": [
                    {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/1/pl/a.m3u8?tag=10"},
                    {"bitrate": 256000, "content_type": "video/mp4", "url": "https://video.twimg.com/1/vid/avc1/480x270/low.mp4?tag=10"},
                    {"bitrate": 2176000, "content_type": "video/mp4", "url": "https://video.twimg.com/1/vid/avc1/1280x720/high.mp4?tag=10"}
                ]}
            },
            {"id_str": "2", "media_url_https": "https://pbs.twimg.com/media/photo.jpg"},
            {
                "id_str": "3",
                "video_info": {"variants": [
                    {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/3/pl/only.m3u8"}
                ]}
            },
            {
                "id_str": "4",
                "video_info": {"variants": [
                    {"bitrate": 0, "content_type": "video/mp4", "url": "https://video.twimg.com/tweet_video/loop.mp4"}
                ]}
            }
        ]});

        let post = normalize(&raw_post(legacy)).map_err(|reason| anyhow::anyhow!("{reason}"))?;
        assert_eq!(
            post.video_urls,
            vec![
                "https://video.twimg.com/1/vid/avc1/1280x720/high.mp4",
                "https://video.twimg.com/tweet_video/loop.mp4"
            ]
        );
        Ok(())
    }
}
