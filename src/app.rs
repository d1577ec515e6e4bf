use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::config;
use crate::fetch::{self, ThreadFetcher};
use crate::registry;
use crate::widget::{self, NO_CSS_ATTRIBUTE, POST_ATTRIBUTE};

/// What the host page would put on the element.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub post: Option<String>,
    pub no_css: bool,
    /// Number of "show more" activations after the first paint.
    pub show_more: usize,
    pub config_file: Option<PathBuf>,
}

/// Embeds one comment section and returns its rendered markup.
pub fn run(options: RunOptions) -> Result<String> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let client = fetch::Client::new(fetch::ClientConfig {
        base_url: Some(cfg.api.base_url.clone()),
        user_agent: Some(cfg.api.user_agent.clone()),
        http_client: None,
    })
    .context("build thread client")?;

    render_with(Arc::new(client), &cfg, &options)
}

pub fn render_with(
    fetcher: Arc<dyn ThreadFetcher>,
    cfg: &config::Config,
    options: &RunOptions,
) -> Result<String> {
    registry::register().context("register comments element")?;

    let widget_options = widget::Options {
        initial_visible: cfg.widget.initial_visible,
        page_size: cfg.widget.page_size,
    };
    let mut element =
        registry::create_element(registry::COMMENTS_SECTION_TAG, fetcher, widget_options)
            .ok_or_else(|| anyhow!("{} is not defined", registry::COMMENTS_SECTION_TAG))?;

    if let Some(post) = options.post.as_deref() {
        element.set_attribute(POST_ATTRIBUTE, post);
    }
    if options.no_css || cfg.widget.no_css {
        element.set_attribute(NO_CSS_ATTRIBUTE, "");
    }

    element.connected();
    element.wait();
    for _ in 0..options.show_more {
        if !element.show_more() {
            break;
        }
    }

    let markup = element.shadow_html().to_string();
    element.disconnected();
    Ok(markup)
}
