use crate::model::{HiddenReplies, ThreadNode};

/// Placeholder text used on Bluesky for replies that only pin the thread.
pub const PIN_MARKER: &str = "📌";

/// Filters and orders one level of replies.
///
/// Drops replies that were hidden by the thread author, blocked, not found,
/// missing their post, or consisting solely of the pin marker. The rest are
/// ordered by like count, highest first; ties keep their input order.
pub fn curate<'a>(replies: &'a [ThreadNode], hidden: Option<&HiddenReplies>) -> Vec<&'a ThreadNode> {
    let mut kept: Vec<&ThreadNode> = replies
        .iter()
        .filter(|reply| is_displayable(reply, hidden))
        .collect();
    // `sort_by` is stable.
    kept.sort_by(|a, b| b.like_count().cmp(&a.like_count()));
    kept
}

pub fn is_displayable(reply: &ThreadNode, hidden: Option<&HiddenReplies>) -> bool {
    if reply.blocked || reply.not_found {
        return false;
    }
    let Some(post) = reply.post.as_ref() else {
        return false;
    };
    if hidden.is_some_and(|hidden| hidden.contains(&post.uri)) {
        return false;
    }
    post.record.text.trim() != PIN_MARKER
}
