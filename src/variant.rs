use std::sync::OnceLock;

use regex::{Captures, Regex};

const MP4_MARKER: &str = ".mp4";

fn resolution_re() -> &'static Regex {
    static RESOLUTION_RE: OnceLock<Regex> = OnceLock::new();
    RESOLUTION_RE.get_or_init(|| {
        Regex::new(r"(?:^|/)(\d+)x(\d+)(?:/|$)").expect("valid resolution regex")
    })
}

fn tag_param_re() -> &'static Regex {
    static TAG_PARAM_RE: OnceLock<Regex> = OnceLock::new();
    TAG_PARAM_RE.get_or_init(|| Regex::new(r"([?&])tag=\d*(&|#|$)").expect("valid tag regex"))
}

pub fn is_mp4(url: &str) -> bool {
    url.contains(MP4_MARKER)
}

/// Pixel area encoded in the URL path, or 0 when there is no parseable token.
pub fn resolution_area(url: &str) -> u64 {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let Some(caps) = resolution_re().captures(path) else {
        return 0;
    };

    let width = caps[1].parse::<u64>().ok();
    let height = caps[2].parse::<u64>().ok();
    match (width, height) {
        (Some(width), Some(height)) => width.checked_mul(height).unwrap_or(0),
        _ => 0,
    }
}

/// Returns the `.mp4` variant with the largest area. Ties keep the earliest candidate.
/// `None` when no variant is an `.mp4`.
pub fn best_variant<'a, I>(urls: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, u64)> = None;
    for url in urls.into_iter().filter(|url| is_mp4(url)) {
        let area = resolution_area(url);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((url, area)),
        }
    }
    best.map(|(url, _)| url)
}

/// Removes the `tag=<digits>` tracking pair from the query, leaving other pairs and the
/// fragment intact.
pub fn strip_tag_param(url: &str) -> String {
    tag_param_re()
        .replace(url, |caps: &Captures<'_>| match &caps[2] {
            "&" => caps[1].to_owned(),
            trailing => trailing.to_owned(),
        })
        .into_owned()
}
