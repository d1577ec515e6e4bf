use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use crate::fetch::ThreadFetcher;
use crate::widget::{CommentsSection, Options};

pub const COMMENTS_SECTION_TAG: &str = "bluesky-comments-section";

pub type Constructor = fn(Arc<dyn ThreadFetcher>, Options) -> CommentsSection;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("element name {0:?} has already been defined")]
    AlreadyDefined(String),
    #[error("{0:?} is not a valid custom element name")]
    InvalidName(String),
}

static DEFINITIONS: Lazy<RwLock<HashMap<String, Constructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Adds an element definition to the process-wide registry. A name can be
/// defined only once.
pub fn define(name: &str, constructor: Constructor) -> Result<(), RegistryError> {
    if !is_valid_name(name) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    let mut definitions = DEFINITIONS.write();
    if definitions.contains_key(name) {
        return Err(RegistryError::AlreadyDefined(name.to_string()));
    }
    definitions.insert(name.to_string(), constructor);
    tracing::debug!(element = name, "element defined");
    Ok(())
}

/// Defines `<bluesky-comments-section>`. Safe to call any number of times;
/// only the first call touches the registry.
pub fn register() -> Result<(), RegistryError> {
    REGISTERED
        .get_or_try_init(|| define(COMMENTS_SECTION_TAG, CommentsSection::new))
        .map(|_| ())
}

pub fn is_defined(name: &str) -> bool {
    DEFINITIONS.read().contains_key(name)
}

/// Instantiates a defined element, or `None` for unknown names.
pub fn create_element(
    name: &str,
    fetcher: Arc<dyn ThreadFetcher>,
    options: Options,
) -> Option<CommentsSection> {
    let constructor = *DEFINITIONS.read().get(name)?;
    Some(constructor(fetcher, options))
}

// Custom element names are lowercase, start with a letter and contain a hyphen.
fn is_valid_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.contains('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}
