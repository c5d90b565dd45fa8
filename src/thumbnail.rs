use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::Context as _;

/// Extracts the first frame of a cached video with an external `ffmpeg`.
#[derive(Debug, Clone)]
pub struct Thumbnailer {
    ffmpeg: String,
}

impl Thumbnailer {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Returns `true` when `out` holds a thumbnail afterwards. Decode failures are
    /// reported and yield `false`; they never abort the run.
    pub fn create(&self, video: &Path, out: &Path) -> bool {
        if out.exists() {
            return true;
        }

        match self.extract_first_frame(video, out) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    video = %video.display(),
                    error = %format!("{err:#}"),
                    "failed to create video thumbnail; the file is likely broken"
                );
                false
            }
        }
    }

    fn extract_first_frame(&self, video: &Path, out: &Path) -> anyhow::Result<()> {
        if let Some(parent) = out.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create thumbnail dir: {}", parent.display()))?;
        }

        let output = match Command::new(&self.ffmpeg)
            .args(["-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(video)
            .args(["-frames:v", "1", "-f", "image2"])
            .arg(out)
            .output()
        {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                anyhow::bail!("ffmpeg not found: {}", self.ffmpeg)
            }
            Err(err) => return Err(err).with_context(|| format!("run ffmpeg: {}", self.ffmpeg)),
        };

        if !output.status.success() || !out.exists() {
            // ffmpeg may leave a truncated file behind on failure.
            let _ = std::fs::remove_file(out);
            anyhow::bail!(
                "ffmpeg failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_decoder_omits_thumbnail() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let video = temp.path().join("videos").join("clip.mp4");
        let out = temp.path().join("video_thumbs").join("1.jpg");

        let thumbnailer = Thumbnailer::new("likes-archive-test-no-such-ffmpeg");
        assert!(!thumbnailer.create(&video, &out));
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn existing_thumbnail_is_reused() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("1.jpg");
        std::fs::write(&out, b"jpeg")?;

        let thumbnailer = Thumbnailer::new("likes-archive-test-no-such-ffmpeg");
        assert!(thumbnailer.create(&temp.path().join("clip.mp4"), &out));
        Ok(())
    }
}
