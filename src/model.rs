use std::collections::HashSet;

use serde::Deserialize;

/// Reply URIs the thread author has hidden through a threadgate.
pub type HiddenReplies = HashSet<String>;

/// Top-level payload of `app.bsky.feed.getPostThread`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadResponse {
    #[serde(default)]
    pub thread: Option<ThreadNode>,
}

/// One node of a reply tree. Blocked and missing posts come back from the
/// AppView as nodes without a `post` and with the matching flag set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadNode {
    #[serde(default)]
    pub post: Option<PostView>,
    #[serde(default)]
    pub replies: Option<Vec<ThreadNode>>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub not_found: bool,
}

impl ThreadNode {
    pub fn like_count(&self) -> i64 {
        self.post
            .as_ref()
            .and_then(|post| post.like_count)
            .unwrap_or(0)
    }

    pub fn text(&self) -> &str {
        self.post
            .as_ref()
            .map(|post| post.record.text.as_str())
            .unwrap_or_default()
    }

    pub fn replies(&self) -> &[ThreadNode] {
        self.replies.as_deref().unwrap_or_default()
    }

    /// Hidden reply URIs from the post's threadgate, if one is attached.
    pub fn hidden_replies(&self) -> Option<HiddenReplies> {
        let gate = self.post.as_ref()?.threadgate.as_ref()?;
        let record = gate.record.as_ref()?;
        Some(record.hidden_replies.iter().cloned().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub author: Author,
    #[serde(default)]
    pub record: PostRecord,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub threadgate: Option<ThreadGate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub did: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Author {
    /// Display name when set and non-blank, the handle otherwise.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.handle.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadGate {
    #[serde(default)]
    pub record: Option<ThreadGateRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadGateRecord {
    #[serde(default)]
    pub hidden_replies: Vec<String>,
}
