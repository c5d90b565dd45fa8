use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::layout::{SITE_RELATIVE_DIRS, STYLESHEET_FILE};
use crate::post::NormalizedPost;

pub const SOURCE_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S +0000 %Y";
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M%p";

const PAGE_TITLE: &str = "Liked Posts Export";
const VIEWPORT: &str =
    "width=device-width, initial-scale=1, minimum-scale=1.0, maximum-scale=1.0";

pub fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let _ = write!(out, "&#{};", u32::from(ch));
        }
    }
    out
}

/// The weekday must agree with the date; a mismatch is rejected like any other
/// malformed timestamp.
pub fn format_timestamp(created_at: &str) -> anyhow::Result<String> {
    let parsed = NaiveDateTime::parse_from_str(created_at, SOURCE_TIMESTAMP_FORMAT)
        .map_err(|err| anyhow::anyhow!("parse timestamp {created_at:?}: {err}"))?;
    Ok(parsed.format(DISPLAY_TIMESTAMP_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBlock {
    None,
    Images(Vec<String>),
    Videos(Vec<VideoSource>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub src: String,
    pub poster: Option<String>,
}

/// A post with every link already resolved to either a remote URL or a site-relative path.
#[derive(Debug, Clone)]
pub struct PostView<'a> {
    pub post: &'a NormalizedPost,
    pub avatar_src: String,
    pub media: MediaBlock,
    pub detail_href: String,
}

pub fn post_fragment(view: &PostView<'_>) -> String {
    let post = view.post;
    let mut html = String::from("<div class=\"post_wrapper\">");

    html.push_str("<div class=\"post_author_wrapper\">");
    let _ = write!(
        html,
        "<div class='post_author_avatar'><img loading='lazy' src='{}'></div>",
        view.avatar_src
    );
    html.push_str("<div class='author_context'><div class='post_author_handle'>");
    let _ = write!(
        html,
        "<a href='{}' target='_blank'>@{}</a></div>",
        post.profile_link(),
        escape_non_ascii(&post.author_handle)
    );
    let _ = write!(
        html,
        "<div class='post_author_name'>{}</div>",
        escape_non_ascii(&post.author_name)
    );
    html.push_str("</div></div>\n");

    let _ = write!(
        html,
        "<div class='post_content'>{}</div>",
        escape_non_ascii(&post.body_text)
    );

    match &view.media {
        MediaBlock::None => {}
        MediaBlock::Videos(videos) => {
            html.push_str("<div class='post_videos_wrapper'>");
            for video in videos {
                html.push_str("<div class='post_media'><video controls preload='none'");
                if let Some(poster) = &video.poster {
                    let _ = write!(html, " poster='{poster}'");
                }
                let _ = write!(
                    html,
                    "><a href='{src}' target='_blank'>Download video</a>\
                     <source src='{src}' type='video/mp4' /></video></div>",
                    src = video.src
                );
            }
            html.push_str("</div>\n");
        }
        MediaBlock::Images(images) => {
            html.push_str("<div class='post_media_wrapper'>");
            for src in images {
                let _ = write!(
                    html,
                    "<div class='post_media'><a href='{src}' target='_blank'>\
                     <img loading='lazy' src='{src}'></a></div>"
                );
            }
            html.push_str("</div>\n");
        }
    }

    let created_at = match format_timestamp(&post.created_at) {
        Ok(formatted) => formatted,
        Err(err) => {
            tracing::warn!(post_id = %post.id, error = %err, "showing timestamp verbatim");
            escape_non_ascii(&post.created_at)
        }
    };
    let _ = write!(html, "<div class='post_created_at'>{created_at}</div>");

    html.push_str("<div class='post_link'>");
    let _ = write!(
        html,
        "<a href='{}' target='_blank'>Original post &#8599;</a> &#8226; ",
        post.link()
    );
    let _ = write!(
        html,
        "<a href='{}' target='_blank'>Local version</a>",
        view.detail_href
    );
    html.push_str("</div>");

    html.push_str("</div>\n\n");
    html
}

const LINK_ATTRIBUTES: [&str; 3] = ["src", "href", "poster"];

/// Rewrites site-relative `src`/`href`/`poster` values of a list-page fragment so they
/// resolve from a page one directory below the site root. Post text is left alone.
pub fn rewrite_for_detail_page(fragment: &str) -> String {
    let mut out = fragment.to_owned();
    for attr in LINK_ATTRIBUTES {
        for dir in SITE_RELATIVE_DIRS {
            for quote in ['\'', '"'] {
                out = out.replace(
                    &format!("{attr}={quote}{dir}/"),
                    &format!("{attr}={quote}../{dir}/"),
                );
            }
        }
    }
    out
}

fn page_head(stylesheet_href: &str) -> String {
    format!(
        "<html><head><meta name=\"viewport\" content=\"{VIEWPORT}\" />\
         <title>{PAGE_TITLE}</title>\
         <link rel=\"stylesheet\" href=\"{stylesheet_href}\"></head>"
    )
}

pub fn list_page_start() -> String {
    let mut html = page_head(STYLESHEET_FILE);
    html.push_str("<body><h1>Liked Posts</h1><div class=\"post_list\">");
    html
}

pub fn page_end() -> &'static str {
    "</div></body></html>"
}

pub fn detail_page(fragment: &str) -> String {
    let mut html = page_head(&format!("../{STYLESHEET_FILE}"));
    html.push_str("<body><div class=\"post_list\">");
    html.push_str(&rewrite_for_detail_page(fragment));
    html.push_str(page_end());
    html
}
