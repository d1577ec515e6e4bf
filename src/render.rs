use std::borrow::Cow;
use std::fmt::Write;

use crate::curate::curate;
use crate::model::{HiddenReplies, ThreadNode};
use crate::uri;

pub const DEFAULT_STYLE: &str = r#"
a {
  color: #4eaaff;
  text-decoration: none;
  word-break: break-all;
}
a:hover {
  color: #82cfff;
  text-decoration: underline;
}
.author a img {
  margin-right: 0.4em;
  border-radius: 100%;
  vertical-align: middle;
}
.replies-container {
  margin-left: 1em;
  padding-left: 0.8em;
  border-left: 1px solid #444;
}
"#;

/// Inputs for one paint of a loaded thread.
pub struct ThreadView<'a> {
    pub thread: &'a ThreadNode,
    pub replies: &'a [&'a ThreadNode],
    pub hidden: Option<&'a HiddenReplies>,
    pub visible_count: usize,
    pub include_style: bool,
}

/// Escapes `&`, `<`, `>`, `"` and `'` so the value is inert in both text and
/// quoted attribute positions.
pub fn escape(raw: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(raw)
}

pub fn render_error(message: &str) -> String {
    format!(r#"<p class="error">{}</p>"#, escape(message))
}

pub fn render_thread(view: &ThreadView<'_>) -> String {
    let mut out = String::new();
    out.push_str("<comments>\n");
    if let Some(post) = view.thread.post.as_ref() {
        let href = uri::web_url(&post.author.did, uri::record_key(&post.uri));
        let _ = writeln!(
            out,
            r#"<p class="reply-info"><a href="{}" target="_blank" rel="noopener noreferrer">Reply on Bluesky</a> to leave a comment.</p>"#,
            escape(&href)
        );
    }

    out.push_str(r#"<div id="comments">"#);
    out.push('\n');
    for reply in view.replies.iter().take(view.visible_count) {
        render_comment(&mut out, reply, view.hidden);
    }
    out.push_str("</div>\n");

    if has_more(view.visible_count, view.replies.len()) {
        out.push_str(r#"<button id="show-more">Show more comments</button>"#);
        out.push('\n');
    }
    out.push_str("</comments>\n");

    if view.include_style {
        let _ = writeln!(out, "<style>{DEFAULT_STYLE}</style>");
    }
    out
}

/// Whether the "show more" control is shown for a list of `total` replies.
pub fn has_more(visible_count: usize, total: usize) -> bool {
    visible_count < total
}

fn render_comment(out: &mut String, reply: &ThreadNode, hidden: Option<&HiddenReplies>) {
    let Some(post) = reply.post.as_ref() else {
        return;
    };
    let author = &post.author;
    let href = uri::web_url(&author.did, uri::record_key(&post.uri));

    out.push_str(r#"<div class="comment">"#);
    out.push_str(r#"<div class="author">"#);
    let _ = write!(
        out,
        r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
        escape(&href)
    );
    if let Some(avatar) = author.avatar.as_deref().filter(|a| !a.is_empty()) {
        let _ = write!(out, r#"<img width="22px" src="{}" />"#, escape(avatar));
    }
    let _ = write!(
        out,
        "{} @{}</a>",
        escape(author.label()),
        escape(&author.handle)
    );
    let _ = write!(
        out,
        r#"<p class="comment-text">{}</p>"#,
        escape(&post.record.text)
    );
    out.push_str("</div>");

    let children = curate(reply.replies(), hidden);
    if !children.is_empty() {
        out.push_str(r#"<div class="replies-container">"#);
        for child in children {
            render_comment(out, child, hidden);
        }
        out.push_str("</div>");
    }
    out.push_str("</div>\n");
}
