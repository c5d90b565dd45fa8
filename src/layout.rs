use std::path::{Path, PathBuf};

use sha2::Digest as _;
use url::Url;

pub const INDEX_FILE: &str = "index.html";
pub const STYLESHEET_FILE: &str = "styles.css";
pub const AVATARS_DIR: &str = "avatars";
pub const IMAGES_DIR: &str = "images";
pub const VIDEOS_DIR: &str = "videos";
pub const VIDEO_THUMBS_DIR: &str = "video_thumbs";
pub const POSTS_DIR: &str = "posts";

/// Directories whose references must be rewritten on detail pages, which live one level
/// below the site root.
pub const SITE_RELATIVE_DIRS: [&str; 5] =
    [AVATARS_DIR, IMAGES_DIR, VIDEOS_DIR, VIDEO_THUMBS_DIR, POSTS_DIR];

/// Paths of the generated site. `*_href` values are relative to the site root and are
/// what the list page links to; `*_path` values are filesystem locations.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    root: PathBuf,
}

impl SiteLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn path_for(&self, href: &str) -> PathBuf {
        href.split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn avatar_href(user_id: &str) -> String {
        format!("{AVATARS_DIR}/{user_id}.jpg")
    }

    pub fn image_href(url: &str) -> String {
        format!("{IMAGES_DIR}/{}", media_file_name(url))
    }

    pub fn video_href(url: &str) -> String {
        format!("{VIDEOS_DIR}/{}", media_file_name(url))
    }

    pub fn video_thumb_href(post_id: &str) -> String {
        format!("{VIDEO_THUMBS_DIR}/{post_id}.jpg")
    }

    pub fn post_href(post_id: &str) -> String {
        format!("{POSTS_DIR}/{post_id}.html")
    }
}

/// Local file name for a remote media URL: the last path segment, or a content-addressed
/// name when the URL has no usable segment.
pub fn media_file_name(url: &str) -> String {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_owned),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_owned),
    };

    match segment {
        Some(name) if is_safe_file_name(&name) => name,
        _ => hashed_file_name(url),
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '%'])
        && !name.chars().any(char::is_control)
}

fn hashed_file_name(url: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(url.as_bytes());
    format!("media_{}", hex::encode(hasher.finalize()))
}
