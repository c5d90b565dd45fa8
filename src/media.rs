use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::USER_AGENT;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error of a single fetch attempt. Only connection failures are retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_body() {
            FetchError::Connection(Box::new(err))
        } else {
            FetchError::Request(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("automatic retries exceeded for downloading {url}")]
    RetriesExhausted {
        url: String,
        #[source]
        last: FetchError,
    },
    #[error("download {url}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build media http client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, "likes-archive/0.1")
            .send()
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().map_err(FetchError::from_reqwest)?;
        Ok(body.to_vec())
    }
}

/// Fixed linear backoff after a failed first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Downloaded,
    AlreadyCached,
    /// The server answered with a non-success status; nothing was written.
    Unavailable,
}

pub struct MediaCache<F> {
    fetcher: F,
    retry: RetryPolicy,
}

impl<F: Fetch> MediaCache<F> {
    pub fn new(fetcher: F, retry: RetryPolicy) -> Self {
        Self { fetcher, retry }
    }

    /// Downloads `url` to `dest` unless `dest` already exists.
    pub fn save(&self, url: &str, dest: &Path) -> anyhow::Result<Saved> {
        if dest.exists() {
            tracing::debug!(url, dest = %dest.display(), "media already cached");
            return Ok(Saved::AlreadyCached);
        }

        let parent_dir = dest
            .parent()
            .ok_or_else(|| anyhow::anyhow!("media path must have parent: {}", dest.display()))?;
        std::fs::create_dir_all(parent_dir)
            .with_context(|| format!("create media dir: {}", parent_dir.display()))?;

        let bytes = match self.fetch_with_retry(url) {
            Ok(bytes) => bytes,
            Err(MediaError::Fetch {
                source: FetchError::Status(status),
                ..
            }) => {
                tracing::warn!(url, status, "remote media unavailable; not cached");
                return Ok(Saved::Unavailable);
            }
            Err(err) => return Err(err.into()),
        };

        std::fs::write(dest, &bytes)
            .with_context(|| format!("write media: {}", dest.display()))?;
        Ok(Saved::Downloaded)
    }

    fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let mut last = match self.fetcher.fetch(url) {
            Ok(bytes) => return Ok(bytes),
            Err(err @ FetchError::Connection(_)) => err,
            Err(source) => {
                return Err(MediaError::Fetch {
                    url: url.to_owned(),
                    source,
                });
            }
        };

        tracing::warn!(
            url,
            retries = self.retry.retries,
            delay_secs = self.retry.delay.as_secs(),
            error = %last,
            "download failed; retrying"
        );

        for attempt in 1..=self.retry.retries {
            std::thread::sleep(self.retry.delay);
            match self.fetcher.fetch(url) {
                Ok(bytes) => {
                    tracing::info!(url, attempt, "retry succeeded");
                    return Ok(bytes);
                }
                Err(err @ FetchError::Connection(_)) => last = err,
                Err(source) => {
                    return Err(MediaError::Fetch {
                        url: url.to_owned(),
                        source,
                    });
                }
            }
        }

        Err(MediaError::RetriesExhausted {
            url: url.to_owned(),
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;

    /// Replays scripted outcomes; `None` stands for a connection failure.
    struct ScriptedFetcher {
        outcomes: RefCell<VecDeque<Option<Result<Vec<u8>, u16>>>>,
        calls: Cell<usize>,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Option<Result<Vec<u8>, u16>>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl Fetch for &ScriptedFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            match self.outcomes.borrow_mut().pop_front() {
                Some(Some(Ok(bytes))) => Ok(bytes),
                Some(Some(Err(status))) => Err(FetchError::Status(status)),
                Some(None) | None => Err(FetchError::Connection(Box::new(
                    std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                ))),
            }
        }
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn save_fetches_once_for_the_same_destination() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("images").join("a.jpg");
        let fetcher = ScriptedFetcher::new(vec![Some(Ok(b"jpeg".to_vec()))]);
        let cache = MediaCache::new(&fetcher, no_delay());

        assert_eq!(cache.save("https://pbs.twimg.com/media/a.jpg", &dest)?, Saved::Downloaded);
        assert_eq!(
            cache.save("https://pbs.twimg.com/media/a.jpg", &dest)?,
            Saved::AlreadyCached
        );

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(std::fs::read(&dest)?, b"jpeg");
        Ok(())
    }

    #[test]
    fn connection_failures_are_retried_until_success() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("videos").join("v.mp4");
        let fetcher = ScriptedFetcher::new(vec![None, None, Some(Ok(b"mp4".to_vec()))]);
        let cache = MediaCache::new(&fetcher, no_delay());

        assert_eq!(cache.save("https://video.twimg.com/v.mp4", &dest)?, Saved::Downloaded);
        assert_eq!(fetcher.calls.get(), 3);
        assert_eq!(std::fs::read(&dest)?, b"mp4");
        Ok(())
    }

    #[test]
    fn exhausted_retries_name_the_url() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("avatars").join("1.jpg");
        let fetcher = ScriptedFetcher::new(Vec::new());
        let cache = MediaCache::new(&fetcher, no_delay());

        let err = cache
            .save("https://pbs.twimg.com/profile_images/1/a.jpg", &dest)
            .expect_err("unreachable host must fail");

        assert_eq!(fetcher.calls.get(), 4);
        assert!(
            err.to_string()
                .contains("https://pbs.twimg.com/profile_images/1/a.jpg")
        );
        assert!(matches!(
            err.downcast_ref::<MediaError>(),
            Some(MediaError::RetriesExhausted { .. })
        ));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn http_errors_are_not_cached_and_not_fatal() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("images").join("gone.jpg");
        let fetcher = ScriptedFetcher::new(vec![Some(Err(404))]);
        let cache = MediaCache::new(&fetcher, no_delay());

        assert_eq!(
            cache.save("https://pbs.twimg.com/media/gone.jpg", &dest)?,
            Saved::Unavailable
        );
        assert_eq!(fetcher.calls.get(), 1);
        assert!(!dest.exists());
        Ok(())
    }
}
