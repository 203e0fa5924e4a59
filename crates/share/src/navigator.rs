use lanyue_download::{DownloadItem, SourceRequest};
use lanyue_protocol::{ApiError, DirectoryEntry, ShareQuery, Suppressed};
use tracing::{debug, info, warn};

use crate::api::ShareApi;
use crate::path::PathStack;
use crate::store::{KeyValueStore, StoreError};

const GENERIC_LISTING_ERROR: &str = "failed to load directory";

/// What the share view should currently show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareState {
    Browsing,
    Loading,
    /// Prompt for the share password. `incorrect` when the last one was wrong.
    PasswordRequired { incorrect: bool },
    /// The share is missing, cancelled or expired.
    NotFound,
    Error { message: String },
}

/// Result of activating an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// A directory was listed (see [`ShareNavigator::state`] for the result).
    Listed,
    /// A file was activated; nothing was fetched.
    Preview(DirectoryEntry),
}

/// Browsing state for one share link.
///
/// The password lives in `durable` keyed by mark. The path stack lives in
/// `session`, so a reload within the same session returns to the same
/// directory.
pub struct ShareNavigator<'a> {
    api: &'a dyn ShareApi,
    durable: &'a dyn KeyValueStore,
    session: &'a dyn KeyValueStore,
    mark: String,
    password: String,
    stack: PathStack,
    pending: Option<String>,
    listing: Vec<DirectoryEntry>,
    selected: Option<DirectoryEntry>,
    state: ShareState,
}

impl<'a> ShareNavigator<'a> {
    /// Restores the path stack and password for `mark`. Does not fetch.
    pub fn new(
        api: &'a dyn ShareApi,
        mark: impl Into<String>,
        durable: &'a dyn KeyValueStore,
        session: &'a dyn KeyValueStore,
    ) -> Self {
        let mark = mark.into();
        let password = durable.get(&mark).unwrap_or_default();

        let mut nav = Self {
            api,
            durable,
            session,
            stack: PathStack::new(),
            pending: None,
            listing: Vec::new(),
            selected: None,
            state: ShareState::Browsing,
            password,
            mark,
        };
        match nav.session.get(&nav.stack_key()).map(|raw| PathStack::from_json(&raw)) {
            Some(Ok(stack)) => nav.stack = stack,
            Some(Err(e)) => {
                warn!(mark = %nav.mark, error = %e, "discarding unreadable path stack");
                nav.store_stack();
            }
            None => nav.store_stack(),
        }
        nav
    }

    pub fn mark(&self) -> &str {
        &self.mark
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn state(&self) -> &ShareState {
        &self.state
    }

    pub fn listing(&self) -> &[DirectoryEntry] {
        &self.listing
    }

    pub fn path_stack(&self) -> &PathStack {
        &self.stack
    }

    /// Directory currently shown, ending in `/`.
    pub fn current_path(&self) -> String {
        self.stack.joined()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn selected(&self) -> Option<&DirectoryEntry> {
        self.selected.as_ref()
    }

    /// Lists the current directory, or `target` inside it.
    ///
    /// On success the target is pushed onto the path stack; on failure the
    /// state says why and the previous listing and stack are kept.
    pub async fn request_listing(&mut self, target: Option<&str>) {
        self.pending = target.map(str::to_string);
        self.load().await;
    }

    /// Remembers `password` for this share and retries the pending listing.
    ///
    /// The listing is retried even if the password could not be persisted.
    pub async fn submit_password(&mut self, password: &str) -> Result<(), StoreError> {
        self.password = password.to_string();
        let stored = self.durable.set(&self.mark, password);
        if let Err(e) = &stored {
            warn!(mark = %self.mark, error = %e, "failed to persist share password");
        }
        self.load().await;
        stored
    }

    /// Activates an entry of the current listing.
    ///
    /// A directory without a name goes back to the root.
    pub async fn navigate_to(&mut self, entry: &DirectoryEntry) -> Navigation {
        self.selected = None;
        if !entry.is_dir {
            return Navigation::Preview(entry.clone());
        }
        if entry.name.is_empty() {
            self.pending = None;
            self.load_from(PathStack::new()).await;
        } else {
            self.pending = Some(entry.name.clone());
            self.load().await;
        }
        Navigation::Listed
    }

    /// Selects `entry`, or clears the selection if it is already selected.
    pub fn select(&mut self, entry: &DirectoryEntry) {
        if self.selected.as_ref() == Some(entry) {
            self.selected = None;
        } else {
            self.selected = Some(entry.clone());
        }
    }

    /// Source request for a file in the current directory.
    pub fn source_request(&self, entry: &DirectoryEntry) -> Option<SourceRequest> {
        if entry.is_dir {
            return None;
        }
        Some(SourceRequest::new(
            self.mark.clone(),
            self.stack.joined() + &entry.name,
            self.password.clone(),
        ))
    }

    /// Download item for the selected file, if a file is selected.
    pub fn download_selected(&self) -> Option<DownloadItem> {
        let entry = self.selected.as_ref()?;
        let request = self.source_request(entry)?;
        Some(DownloadItem {
            request,
            name: entry.name.clone(),
            size: (entry.size > 0).then_some(entry.size),
        })
    }

    async fn load(&mut self) {
        self.load_from(self.stack.clone()).await;
    }

    /// Lists `pending` under `base`. The stack becomes `base` plus the
    /// pending name only once the listing arrives.
    async fn load_from(&mut self, mut base: PathStack) {
        let previous = std::mem::replace(&mut self.state, ShareState::Loading);
        if let Some(name) = &self.pending {
            base.truncate_at(name);
        }

        let query = ShareQuery {
            mark: self.mark.clone(),
            path: base.listing_path(self.pending.as_deref()),
            password: self.password.clone(),
        };
        debug!(mark = %self.mark, path = %query.path, "listing share directory");

        self.state = match self.api.view(&query).await {
            Ok(entries) => {
                info!(mark = %self.mark, path = %query.path, entries = entries.len(), "share listed");
                self.listing = entries;
                if let Some(name) = self.pending.take() {
                    base.push(name);
                }
                self.stack = base;
                self.store_stack();
                ShareState::Browsing
            }
            Err(ApiError::Rejected(r)) => match r.suppressed() {
                Some(Suppressed::NotFound) => ShareState::NotFound,
                Some(Suppressed::PasswordRequired) => ShareState::PasswordRequired { incorrect: false },
                Some(Suppressed::PasswordIncorrect) => ShareState::PasswordRequired { incorrect: true },
                Some(Suppressed::Reserved) => previous,
                None => {
                    warn!(mark = %self.mark, code = r.code, "share listing rejected");
                    let message = if r.message.is_empty() {
                        GENERIC_LISTING_ERROR.to_string()
                    } else {
                        r.message
                    };
                    ShareState::Error { message }
                }
            },
            Err(e) => {
                warn!(mark = %self.mark, error = %e, "share listing failed");
                ShareState::Error {
                    message: GENERIC_LISTING_ERROR.to_string(),
                }
            }
        };
    }

    fn stack_key(&self) -> String {
        format!("share-path:{}", self.mark)
    }

    fn store_stack(&self) {
        let result = self
            .stack
            .to_json()
            .map_err(StoreError::from)
            .and_then(|json| self.session.set(&self.stack_key(), &json));
        if let Err(e) = result {
            warn!(mark = %self.mark, error = %e, "failed to store path stack");
        }
    }
}
