use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(rename = "OUTPUT_JSON_FILE_PATH")]
    output_json_file_path: String,
    #[serde(rename = "DOWNLOAD_IMAGES", default)]
    download_images: bool,
    #[serde(rename = "DOWNLOAD_VIDEOS", default)]
    download_videos: bool,
    #[serde(rename = "OUTPUT_HTML_DIRECTORY", default)]
    output_html_directory: Option<String>,
    #[serde(rename = "FFMPEG_PATH", default)]
    ffmpeg_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Single-line JSON array of raw records.
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub download_images: bool,
    pub download_videos: bool,
    pub ffmpeg: String,
}

pub const DEFAULT_OUTPUT_DIR: &str = "html";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json(&contents, base_dir)
            .with_context(|| format!("parse config: {}", path.display()))
    }

    /// Relative paths in the document resolve against `base_dir`.
    pub fn from_json(contents: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_json::from_str(contents).context("deserialize config")?;
        if file.output_json_file_path.trim().is_empty() {
            anyhow::bail!("OUTPUT_JSON_FILE_PATH must not be empty");
        }

        let output_dir = file
            .output_html_directory
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_DIR);

        Ok(Self {
            input_path: base_dir.join(&file.output_json_file_path),
            output_dir: base_dir.join(output_dir),
            download_images: file.download_images,
            download_videos: file.download_videos,
            ffmpeg: file.ffmpeg_path.unwrap_or_else(|| DEFAULT_FFMPEG.to_owned()),
        })
    }
}
