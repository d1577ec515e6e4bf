use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const AT_SCHEME: &str = "at://";
pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const WEB_BASE: &str = "https://bsky.app";

static PROFILE_POST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/profile/([A-Za-z0-9_.:-]+)/post/([A-Za-z0-9_]+)")
        .expect("valid profile post regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid post URL format")]
    InvalidFormat,
}

/// Canonical `at://` identifier of a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostUri(String);

impl PostUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Repository (DID or handle) that owns the record.
    pub fn authority(&self) -> &str {
        self.0
            .strip_prefix(AT_SCHEME)
            .unwrap_or(&self.0)
            .split('/')
            .next()
            .unwrap_or_default()
    }

    pub fn record_key(&self) -> &str {
        record_key(&self.0)
    }
}

impl fmt::Display for PostUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PostUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a post reference into its canonical form.
///
/// `at://` identifiers pass through untouched. Web links of the form
/// `https://bsky.app/profile/<actor>/post/<rkey>` are rewritten to
/// `at://<actor>/app.bsky.feed.post/<rkey>`.
pub fn resolve(reference: &str) -> Result<PostUri, ResolveError> {
    if reference.starts_with(AT_SCHEME) {
        return Ok(PostUri(reference.to_string()));
    }

    let caps = PROFILE_POST_RE
        .captures(reference)
        .ok_or(ResolveError::InvalidFormat)?;
    let actor = &caps[1];
    let rkey = &caps[2];
    Ok(PostUri(format!(
        "{AT_SCHEME}{actor}/{POST_COLLECTION}/{rkey}"
    )))
}

/// Last path segment of a record URI.
pub fn record_key(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or_default()
}

/// Link to a post on the Bluesky web client.
pub fn web_url(actor: &str, rkey: &str) -> String {
    format!("{WEB_BASE}/profile/{actor}/post/{rkey}")
}
