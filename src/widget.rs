use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::curate::curate;
use crate::fetch::{FetchError, ThreadFetcher};
use crate::model::{HiddenReplies, ThreadNode};
use crate::render::{self, ThreadView};
use crate::uri;

pub const POST_ATTRIBUTE: &str = "post";
pub const NO_CSS_ATTRIBUTE: &str = "no-css";
pub const DEFAULT_VISIBLE_COUNT: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// The fixed set of messages a widget ever shows in place of comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("Post URI is required")]
    PostRequired,
    #[error("Invalid Bluesky post URL format")]
    InvalidPostUrl,
    #[error("Error loading comments")]
    LoadFailed,
    #[error("No comments found")]
    NoComments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Rendered,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub initial_visible: usize,
    pub page_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_visible: DEFAULT_VISIBLE_COUNT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WidgetState {
    pub visible_count: usize,
    pub thread: Option<ThreadNode>,
    pub hidden_replies: Option<HiddenReplies>,
    pub error: Option<WidgetError>,
}

struct PendingLoad {
    request_id: u64,
    uri: uri::PostUri,
    rx: Receiver<Result<ThreadNode, FetchError>>,
}

/// `<bluesky-comments-section>`: renders the replies to one post.
///
/// The host drives the element lifecycle: set attributes, call
/// [`connected`](Self::connected), then [`poll`](Self::poll) or
/// [`wait`](Self::wait) until the load settles. The thread is fetched on a
/// worker; every state change happens on the owning thread.
pub struct CommentsSection {
    fetcher: Arc<dyn ThreadFetcher>,
    options: Options,
    attributes: BTreeMap<String, String>,
    state: WidgetState,
    phase: Phase,
    shadow: String,
    active: bool,
    next_request_id: u64,
    pending: Option<PendingLoad>,
}

impl CommentsSection {
    pub fn new(fetcher: Arc<dyn ThreadFetcher>, options: Options) -> Self {
        Self {
            fetcher,
            options,
            attributes: BTreeMap::new(),
            state: WidgetState {
                visible_count: options.initial_visible,
                ..WidgetState::default()
            },
            phase: Phase::Idle,
            shadow: String::new(),
            active: false,
            next_request_id: 1,
            pending: None,
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    /// Current contents of the element's shadow root.
    pub fn shadow_html(&self) -> &str {
        &self.shadow
    }

    /// Attaches the element and starts a load cycle.
    pub fn connected(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.state.thread = None;
        self.state.hidden_replies = None;
        self.state.error = None;

        let Some(reference) = self.get_attribute(POST_ATTRIBUTE).map(str::to_string) else {
            self.fail(WidgetError::PostRequired);
            return;
        };
        let post_uri = match uri::resolve(&reference) {
            Ok(post_uri) => post_uri,
            Err(err) => {
                tracing::warn!(reference = %reference, error = %err, "cannot resolve post reference");
                self.fail(WidgetError::InvalidPostUrl);
                return;
            }
        };
        self.start_load(post_uri);
    }

    /// Detaches the element. A load still in flight is abandoned and its
    /// result never reaches this instance.
    pub fn disconnected(&mut self) {
        self.active = false;
        if let Some(pending) = self.pending.take() {
            tracing::debug!(request_id = pending.request_id, uri = %pending.uri, "abandoning thread load");
        }
        if self.phase == Phase::Loading {
            self.phase = Phase::Idle;
        }
    }

    /// Applies a finished load, if any. Returns true when the markup changed.
    pub fn poll(&mut self) -> bool {
        let Some(pending) = self.pending.as_ref() else {
            return false;
        };
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                tracing::error!(request_id = pending.request_id, "thread fetch worker exited without a result");
                self.pending = None;
                self.fail(WidgetError::LoadFailed);
                return true;
            }
        };
        self.finish_load(result);
        true
    }

    /// Blocks until the pending load, if any, has been applied.
    pub fn wait(&mut self) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };
        match pending.rx.recv() {
            Ok(result) => self.finish_load(result),
            Err(_) => {
                tracing::error!(request_id = pending.request_id, "thread fetch worker exited without a result");
                self.pending = None;
                self.fail(WidgetError::LoadFailed);
            }
        }
    }

    /// The "show more" control. Reveals another page of already-fetched
    /// replies; returns false when there is nothing more to show.
    pub fn show_more(&mut self) -> bool {
        if !self.active || self.phase != Phase::Rendered {
            return false;
        }
        let total = match self.state.thread.as_ref() {
            Some(thread) => curate(thread.replies(), self.state.hidden_replies.as_ref()).len(),
            None => 0,
        };
        if !render::has_more(self.state.visible_count, total) {
            return false;
        }
        self.state.visible_count = self.state.visible_count.saturating_add(self.options.page_size);
        self.render();
        true
    }

    fn start_load(&mut self, post_uri: uri::PostUri) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let (tx, rx) = bounded(1);
        let fetcher = Arc::clone(&self.fetcher);
        let target = post_uri.clone();
        thread::spawn(move || {
            let result = fetcher.fetch_thread(target.as_str());
            if tx.send(result).is_err() {
                tracing::debug!(request_id, uri = %target, "element detached before thread load finished");
            }
        });

        tracing::debug!(request_id, uri = %post_uri, "thread load started");
        self.pending = Some(PendingLoad {
            request_id,
            uri: post_uri,
            rx,
        });
        self.phase = Phase::Loading;
        self.shadow.clear();
    }

    fn finish_load(&mut self, result: Result<ThreadNode, FetchError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if !self.active {
            tracing::debug!(request_id = pending.request_id, "dropping thread for detached element");
            return;
        }
        match result {
            Ok(thread) => {
                self.state.hidden_replies = thread.hidden_replies();
                self.state.thread = Some(thread);
                self.render();
            }
            Err(err) => {
                tracing::warn!(uri = %pending.uri, error = %err, "error loading comments");
                self.fail(WidgetError::LoadFailed);
            }
        }
    }

    fn render(&mut self) {
        let Some(thread) = self.state.thread.as_ref() else {
            self.fail(WidgetError::NoComments);
            return;
        };
        let hidden = self.state.hidden_replies.as_ref();
        let replies = curate(thread.replies(), hidden);
        if replies.is_empty() {
            self.fail(WidgetError::NoComments);
            return;
        }
        let html = render::render_thread(&ThreadView {
            thread,
            replies: &replies,
            hidden,
            visible_count: self.state.visible_count,
            include_style: !self.has_attribute(NO_CSS_ATTRIBUTE),
        });
        self.shadow = html;
        self.phase = Phase::Rendered;
    }

    fn fail(&mut self, error: WidgetError) {
        self.state.error = Some(error);
        self.shadow = render::render_error(&error.to_string());
        self.phase = Phase::Error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, PostRecord, PostView, ThreadGate, ThreadGateRecord};
    use crossbeam_channel::Sender;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reply(handle: &str, likes: i64, text: &str) -> ThreadNode {
        ThreadNode {
            post: Some(PostView {
                uri: format!("at://did:plc:{handle}/app.bsky.feed.post/r{handle}"),
                author: Author {
                    did: format!("did:plc:{handle}"),
                    handle: format!("{handle}.test"),
                    ..Author::default()
                },
                record: PostRecord {
                    text: text.to_string(),
                },
                like_count: Some(likes),
                ..PostView::default()
            }),
            replies: Some(Vec::new()),
            ..ThreadNode::default()
        }
    }

    fn root(replies: Vec<ThreadNode>) -> ThreadNode {
        let mut root = reply("root", 0, "root post");
        root.replies = Some(replies);
        root
    }

    struct StubFetcher {
        result: Mutex<Option<Result<ThreadNode, FetchError>>>,
        thread: Option<ThreadNode>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn ok(thread: ThreadNode) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(None),
                thread: Some(thread),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn err(err: FetchError) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Err(err))),
                thread: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ThreadFetcher for StubFetcher {
        fn fetch_thread(&self, uri: &str) -> Result<ThreadNode, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(uri.to_string());
            if let Some(result) = self.result.lock().take() {
                return result;
            }
            self.thread.clone().ok_or(FetchError::InvalidThread)
        }
    }

    /// Holds every fetch until the test releases it.
    struct GatedFetcher {
        gate: Receiver<()>,
        thread: ThreadNode,
    }

    impl ThreadFetcher for GatedFetcher {
        fn fetch_thread(&self, _uri: &str) -> Result<ThreadNode, FetchError> {
            let _ = self.gate.recv();
            Ok(self.thread.clone())
        }
    }

    fn gated(thread: ThreadNode) -> (Arc<GatedFetcher>, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(GatedFetcher { gate: rx, thread }), tx)
    }

    fn widget(fetcher: Arc<dyn ThreadFetcher>, post: Option<&str>) -> CommentsSection {
        let mut widget = CommentsSection::new(fetcher, Options::default());
        if let Some(post) = post {
            widget.set_attribute(POST_ATTRIBUTE, post);
        }
        widget
    }

    const WEB_URL: &str = "https://bsky.app/profile/alice.test/post/3abc123";

    #[test]
    fn missing_post_attribute_is_an_error_without_fetch() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher.clone(), None);
        widget.connected();
        assert_eq!(widget.phase(), Phase::Error);
        assert_eq!(widget.state().error, Some(WidgetError::PostRequired));
        assert_eq!(
            widget.shadow_html(),
            r#"<p class="error">Post URI is required</p>"#
        );
        widget.wait();
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn malformed_reference_is_an_error_without_fetch() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher.clone(), Some("https://example.com/not-a-post"));
        widget.connected();
        widget.wait();
        assert_eq!(widget.state().error, Some(WidgetError::InvalidPostUrl));
        assert!(widget
            .shadow_html()
            .contains("Invalid Bluesky post URL format"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn web_url_is_resolved_before_fetch() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher.clone(), Some(WEB_URL));
        widget.connected();
        assert_eq!(widget.phase(), Phase::Loading);
        widget.wait();
        assert_eq!(
            fetcher.seen.lock().as_slice(),
            ["at://alice.test/app.bsky.feed.post/3abc123"]
        );
        assert_eq!(widget.phase(), Phase::Rendered);
    }

    #[test]
    fn renders_replies_most_liked_first() {
        let fetcher = StubFetcher::ok(root(vec![reply("five", 5, "five"), reply("nine", 9, "nine")]));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.wait();
        let html = widget.shadow_html();
        let nine = html.find("nine.test").unwrap();
        let five = html.find("five.test").unwrap();
        assert!(nine < five);
        assert!(html.contains("<style>"));
        assert!(!html.contains("show-more"));
    }

    #[test]
    fn no_css_attribute_suppresses_default_style() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.set_attribute(NO_CSS_ATTRIBUTE, "");
        widget.connected();
        widget.wait();
        assert!(!widget.shadow_html().contains("<style>"));
        assert!(widget.shadow_html().contains(r#"<div id="comments">"#));
    }

    #[test]
    fn all_pin_marker_replies_show_no_comments() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 3, "📌"), reply("b", 1, " 📌 ")]));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.wait();
        assert_eq!(widget.phase(), Phase::Error);
        assert_eq!(widget.state().error, Some(WidgetError::NoComments));
        assert!(widget.state().thread.is_some());
        assert!(widget.shadow_html().contains("No comments found"));
    }

    #[test]
    fn fetch_failure_shows_generic_message() {
        let fetcher = StubFetcher::err(FetchError::Status("Internal Server Error".into()));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.wait();
        assert_eq!(widget.state().error, Some(WidgetError::LoadFailed));
        assert_eq!(
            widget.shadow_html(),
            r#"<p class="error">Error loading comments</p>"#
        );
        assert!(!widget.shadow_html().contains("Internal Server Error"));
    }

    #[test]
    fn threadgate_hidden_replies_are_filtered() {
        let mut thread = root(vec![reply("keep", 1, "keep"), reply("hide", 10, "hide")]);
        if let Some(post) = thread.post.as_mut() {
            post.threadgate = Some(ThreadGate {
                record: Some(ThreadGateRecord {
                    hidden_replies: vec!["at://did:plc:hide/app.bsky.feed.post/rhide".into()],
                }),
            });
        }
        let fetcher = StubFetcher::ok(thread);
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.wait();
        let hidden = widget.state().hidden_replies.as_ref().unwrap();
        assert_eq!(hidden.len(), 1);
        assert!(widget.shadow_html().contains("keep.test"));
        assert!(!widget.shadow_html().contains("hide.test"));
    }

    #[test]
    fn show_more_reveals_five_without_refetch() {
        let replies = (0..57).map(|i| reply(&format!("r{i}"), 100 - i, "x")).collect();
        let fetcher = StubFetcher::ok(root(replies));
        let mut widget = widget(fetcher.clone(), Some(WEB_URL));
        widget.connected();
        widget.wait();
        let count = |w: &CommentsSection| w.shadow_html().matches(r#"<div class="comment">"#).count();

        assert_eq!(widget.state().visible_count, 50);
        assert_eq!(count(&widget), 50);
        assert!(widget.shadow_html().contains("show-more"));

        assert!(widget.show_more());
        assert_eq!(widget.state().visible_count, 55);
        assert_eq!(count(&widget), 55);
        assert!(widget.shadow_html().contains("show-more"));

        assert!(widget.show_more());
        assert_eq!(widget.state().visible_count, 60);
        assert_eq!(count(&widget), 57);
        assert!(!widget.shadow_html().contains("show-more"));

        assert!(!widget.show_more());
        assert_eq!(widget.state().visible_count, 60);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn show_more_does_nothing_outside_rendered() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher, None);
        assert!(!widget.show_more());
        widget.connected();
        assert!(!widget.show_more());
        assert_eq!(widget.state().visible_count, DEFAULT_VISIBLE_COUNT);
    }

    #[test]
    fn poll_applies_result_once_ready() {
        let (fetcher, release) = gated(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        assert!(!widget.poll());
        assert_eq!(widget.phase(), Phase::Loading);
        release.send(()).unwrap();
        widget.wait();
        assert_eq!(widget.phase(), Phase::Rendered);
        assert!(!widget.poll());
    }

    #[test]
    fn detached_element_ignores_late_result() {
        let (fetcher, release) = gated(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.disconnected();
        release.send(()).unwrap();
        assert!(!widget.poll());
        widget.wait();
        assert_eq!(widget.phase(), Phase::Idle);
        assert!(widget.state().thread.is_none());
        assert!(widget.shadow_html().is_empty());
    }

    #[test]
    fn reattach_restarts_the_load_and_keeps_visible_count() {
        let replies = (0..60).map(|i| reply(&format!("r{i}"), i, "x")).collect();
        let fetcher = StubFetcher::ok(root(replies));
        let mut widget = widget(fetcher.clone(), Some(WEB_URL));
        widget.connected();
        widget.wait();
        assert!(widget.show_more());

        widget.disconnected();
        widget.connected();
        widget.wait();
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(widget.phase(), Phase::Rendered);
        assert_eq!(widget.state().visible_count, 55);
    }

    #[test]
    fn show_more_is_inert_after_detach() {
        let replies = (0..60).map(|i| reply(&format!("r{i}"), i, "x")).collect();
        let fetcher = StubFetcher::ok(root(replies));
        let mut widget = widget(fetcher, Some(WEB_URL));
        widget.connected();
        widget.wait();
        let before = widget.shadow_html().to_string();

        widget.disconnected();
        assert!(!widget.show_more());
        assert_eq!(widget.state().visible_count, 50);
        assert_eq!(widget.shadow_html(), before);
    }

    #[test]
    fn connecting_twice_does_not_refetch() {
        let fetcher = StubFetcher::ok(root(vec![reply("a", 1, "x")]));
        let mut widget = widget(fetcher.clone(), Some(WEB_URL));
        widget.connected();
        widget.connected();
        widget.wait();
        assert_eq!(fetcher.calls(), 1);
    }
}
