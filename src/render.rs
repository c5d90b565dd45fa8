use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

use crate::config::Config;
use crate::html::{self, MediaBlock, PostView, VideoSource};
use crate::layout::SiteLayout;
use crate::media::{Fetch, MediaCache, RetryPolicy, Saved};
use crate::post::{NormalizedPost, normalize};
use crate::thumbnail::Thumbnailer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped: usize,
}

pub struct SiteRenderer<F> {
    layout: SiteLayout,
    download_images: bool,
    download_videos: bool,
    media: MediaCache<F>,
    thumbnailer: Thumbnailer,
}

impl<F: Fetch> SiteRenderer<F> {
    pub fn new(config: &Config, fetcher: F) -> Self {
        Self::with_retry(config, fetcher, RetryPolicy::default())
    }

    pub fn with_retry(config: &Config, fetcher: F, retry: RetryPolicy) -> Self {
        Self {
            layout: SiteLayout::new(&config.output_dir),
            download_images: config.download_images,
            download_videos: config.download_videos,
            media: MediaCache::new(fetcher, retry),
            thumbnailer: Thumbnailer::new(&config.ffmpeg),
        }
    }

    /// Writes `index.html` plus one detail page per valid record, in source order.
    pub fn render(&self, raw_records: &[Value]) -> anyhow::Result<RenderSummary> {
        let root = self.layout.root();
        std::fs::create_dir_all(root)
            .with_context(|| format!("create output dir: {}", root.display()))?;

        let index_path = self.layout.index_path();
        let index_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&index_path)
            .with_context(|| format!("create list page: {}", index_path.display()))?;
        let mut index = BufWriter::new(index_file);
        index
            .write_all(html::list_page_start().as_bytes())
            .context("write list page header")?;

        let mut summary = RenderSummary::default();
        for (position, raw) in raw_records.iter().enumerate() {
            let post = match normalize(raw) {
                Ok(post) => post,
                Err(reason) => {
                    let entry_id = raw.get("entryId").and_then(Value::as_str).unwrap_or_default();
                    tracing::debug!(
                        position,
                        entry_id,
                        %reason,
                        "skipping record"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            tracing::info!(
                post = %post.link(),
                progress = %format!("{}/{}", position + 1, raw_records.len()),
                "rendering post"
            );
            let fragment = self
                .render_post(&post)
                .with_context(|| format!("render post {}", post.id))?;
            index
                .write_all(fragment.as_bytes())
                .context("write list page entry")?;
            summary.rendered += 1;
        }

        index
            .write_all(html::page_end().as_bytes())
            .context("write list page footer")?;
        index.flush().context("flush list page")?;

        tracing::info!(
            rendered = summary.rendered,
            skipped = summary.skipped,
            out = %root.display(),
            "site rendered"
        );
        Ok(summary)
    }

    /// Returns the list-page fragment and writes the detail page as a side effect.
    fn render_post(&self, post: &NormalizedPost) -> anyhow::Result<String> {
        let view = PostView {
            post,
            avatar_src: self.avatar_src(post)?,
            media: self.media_block(post)?,
            detail_href: SiteLayout::post_href(&post.id),
        };
        let fragment = html::post_fragment(&view);

        let detail_path = self.layout.path_for(&view.detail_href);
        write_page(&detail_path, &html::detail_page(&fragment))?;

        Ok(fragment)
    }

    fn avatar_src(&self, post: &NormalizedPost) -> anyhow::Result<String> {
        if !self.download_images {
            return Ok(post.author_avatar_url.clone());
        }
        let href = SiteLayout::avatar_href(&post.author_id);
        self.cache(&post.author_avatar_url, &href)
    }

    /// Videos take precedence: a post with videos never shows its images.
    fn media_block(&self, post: &NormalizedPost) -> anyhow::Result<MediaBlock> {
        if !post.video_urls.is_empty() {
            let mut videos = Vec::with_capacity(post.video_urls.len());
            for (idx, url) in post.video_urls.iter().enumerate() {
                videos.push(self.video_source(post, idx, url)?);
            }
            return Ok(MediaBlock::Videos(videos));
        }

        if !post.image_urls.is_empty() {
            let mut images = Vec::with_capacity(post.image_urls.len());
            for url in &post.image_urls {
                let src = if self.download_images {
                    self.cache(url, &SiteLayout::image_href(url))?
                } else {
                    url.clone()
                };
                images.push(src);
            }
            return Ok(MediaBlock::Images(images));
        }

        Ok(MediaBlock::None)
    }

    fn video_source(
        &self,
        post: &NormalizedPost,
        idx: usize,
        url: &str,
    ) -> anyhow::Result<VideoSource> {
        if !self.download_videos {
            return Ok(VideoSource {
                src: url.to_owned(),
                poster: None,
            });
        }

        let href = SiteLayout::video_href(url);
        let src = self.cache(url, &href)?;

        // One thumbnail per post, taken from its first video.
        let mut poster = None;
        if idx == 0 && src == href {
            let thumb_href = SiteLayout::video_thumb_href(&post.id);
            let created = self.thumbnailer.create(
                &self.layout.path_for(&href),
                &self.layout.path_for(&thumb_href),
            );
            if created {
                poster = Some(thumb_href);
            }
        }

        Ok(VideoSource { src, poster })
    }

    /// Caches `url` at `href`; falls back to the remote URL when the server refused it.
    fn cache(&self, url: &str, href: &str) -> anyhow::Result<String> {
        match self.media.save(url, &self.layout.path_for(href))? {
            Saved::Downloaded | Saved::AlreadyCached => Ok(href.to_owned()),
            Saved::Unavailable => Ok(url.to_owned()),
        }
    }
}

fn write_page(path: &Path, contents: &str) -> anyhow::Result<()> {
    let parent_dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("page path must have parent: {}", path.display()))?;
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("create page dir: {}", parent_dir.display()))?;
    std::fs::write(path, contents).with_context(|| format!("write page: {}", path.display()))?;
    Ok(())
}
