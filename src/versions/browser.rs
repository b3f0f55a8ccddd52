//! Version list state for one parent record.
//!
//! `VersionBrowser` keeps the versions of a parent, the selected version and
//! its line items, and runs the row actions. Line-item fetches are tagged with
//! a generation; a fetch that completes after the selection moved on is
//! discarded.

use std::sync::Arc;

use crate::config::VersionsConfig;
use crate::db::{Database, LineItemRecord, VersionRecord, VersionStatus};
use crate::error::{DatabaseError, VersionError};
use crate::versions::create::CreateSession;
use crate::versions::edit::EditSession;
use crate::versions::lifecycle::{VersionAction, available_actions, ensure_permitted};
use crate::versions::notify::{RefreshBus, RefreshSubscription, RefreshTopic};
use crate::versions::sync::find_synced;
use crate::versions::workflow::OperatorPrompt;

/// Ticket for one line-item fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemFetch {
    pub generation: u64,
    pub version_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was stored; the count of line items now shown.
    Applied(usize),
    /// The selection changed while the fetch was running.
    Discarded,
}

pub struct VersionBrowser {
    db: Arc<dyn Database>,
    bus: RefreshBus,
    config: VersionsConfig,
    prompt: Arc<dyn OperatorPrompt>,
    parent_id: String,
    versions: Vec<VersionRecord>,
    selected: Option<String>,
    generation: u64,
    line_items: Vec<LineItemRecord>,
    warnings: Vec<VersionError>,
    list_sub: Option<RefreshSubscription>,
    items_sub: Option<RefreshSubscription>,
}

impl VersionBrowser {
    /// Subscribe to refresh signals and load the parent's versions.
    pub async fn open(
        db: Arc<dyn Database>,
        bus: RefreshBus,
        config: VersionsConfig,
        prompt: Arc<dyn OperatorPrompt>,
        parent_id: &str,
    ) -> Result<Self, VersionError> {
        let list_sub = bus.subscribe(RefreshTopic::VersionList);
        let items_sub = bus.subscribe(RefreshTopic::VersionLineItems);
        let mut browser = Self {
            db,
            bus,
            config,
            prompt,
            parent_id: parent_id.to_string(),
            versions: Vec::new(),
            selected: None,
            generation: 0,
            line_items: Vec::new(),
            warnings: Vec::new(),
            list_sub: Some(list_sub),
            items_sub: Some(items_sub),
        };
        browser.refresh_versions().await?;
        Ok(browser)
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    pub fn selected_version(&self) -> Option<&VersionRecord> {
        let id = self.selected.as_deref()?;
        self.versions.iter().find(|v| v.id == id)
    }

    /// Line items of the selected version, as last fetched.
    pub fn line_items(&self) -> &[LineItemRecord] {
        &self.line_items
    }

    pub fn warnings(&self) -> &[VersionError] {
        &self.warnings
    }

    /// Take and clear the accumulated warnings.
    pub fn drain_warnings(&mut self) -> Vec<VersionError> {
        std::mem::take(&mut self.warnings)
    }

    fn find(&self, version_id: &str) -> Result<&VersionRecord, VersionError> {
        self.versions
            .iter()
            .find(|v| v.id == version_id)
            .ok_or_else(|| VersionError::UnknownVersion {
                version_id: version_id.to_string(),
            })
    }

    /// Reload versions and the selected version's line items.
    ///
    /// A selection that still exists is kept. Otherwise the syncing version,
    /// if any, becomes the selection.
    pub async fn refresh_versions(&mut self) -> Result<(), VersionError> {
        let versions = self
            .db
            .list_versions(&self.parent_id)
            .await
            .map_err(VersionError::VersionLoad)?;

        let synced_id = match find_synced(&versions) {
            Ok(synced) => synced.map(|v| v.id.clone()),
            Err(e) => {
                self.warnings.push(e);
                None
            }
        };
        self.versions = versions;

        let still_present = self
            .selected
            .as_deref()
            .is_some_and(|id| self.versions.iter().any(|v| v.id == id));
        if !still_present {
            self.selected = synced_id;
        }
        tracing::debug!(
            parent_id = %self.parent_id,
            count = self.versions.len(),
            selected = ?self.selected,
            "Refreshed versions"
        );

        self.load_selected_line_items().await;
        Ok(())
    }

    /// Select a version. The returned ticket must be completed with
    /// `complete_fetch` to show its line items.
    pub fn select(&mut self, version_id: &str) -> Result<LineItemFetch, VersionError> {
        self.find(version_id)?;
        self.selected = Some(version_id.to_string());
        self.line_items.clear();
        self.begin_fetch().ok_or_else(|| VersionError::UnknownVersion {
            version_id: version_id.to_string(),
        })
    }

    /// A new fetch ticket for the current selection. Earlier tickets become
    /// stale.
    pub fn begin_fetch(&mut self) -> Option<LineItemFetch> {
        let version_id = self.selected.clone()?;
        self.generation += 1;
        Some(LineItemFetch {
            generation: self.generation,
            version_id,
        })
    }

    pub async fn fetch_line_items(
        &self,
        fetch: &LineItemFetch,
    ) -> Result<Vec<LineItemRecord>, DatabaseError> {
        self.db.list_line_items(&fetch.version_id).await
    }

    /// Apply a fetch result if its ticket is still current.
    ///
    /// A failed fetch for the current selection clears the line items and is
    /// kept as a warning.
    pub fn complete_fetch(
        &mut self,
        fetch: LineItemFetch,
        result: Result<Vec<LineItemRecord>, DatabaseError>,
    ) -> FetchOutcome {
        if fetch.generation != self.generation
            || self.selected.as_deref() != Some(fetch.version_id.as_str())
        {
            tracing::debug!(
                version_id = %fetch.version_id,
                generation = fetch.generation,
                current = self.generation,
                "Discarding stale line item fetch"
            );
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(records) => {
                self.line_items = records;
            }
            Err(e) => {
                tracing::warn!(version_id = %fetch.version_id, error = %e, "Failed to load line items");
                self.line_items.clear();
                self.warnings.push(VersionError::LineItemLoad(e));
            }
        }
        FetchOutcome::Applied(self.line_items.len())
    }

    /// Fetch and apply line items for the current selection.
    pub async fn load_selected_line_items(&mut self) -> FetchOutcome {
        let Some(fetch) = self.begin_fetch() else {
            self.line_items.clear();
            return FetchOutcome::Applied(0);
        };
        let result = self.fetch_line_items(&fetch).await;
        self.complete_fetch(fetch, result)
    }

    /// Actions to offer on a row. Unknown versions offer none.
    pub fn row_actions(&self, version_id: &str) -> Vec<VersionAction> {
        self.find(version_id)
            .map(|v| available_actions(v.status, v.syncing))
            .unwrap_or_default()
    }

    async fn confirm(&self, version: &VersionRecord, action: VersionAction) -> Result<(), VersionError> {
        let message = match action {
            VersionAction::Delete => format!(
                "Delete version \"{}\"? This cannot be undone.",
                version.name
            ),
            _ => format!("{} version \"{}\"?", capitalize(action.as_str()), version.name),
        };
        if self.prompt.confirm(&message).await {
            Ok(())
        } else {
            tracing::info!(version_id = %version.id, action = %action, "Operator declined");
            Err(VersionError::Cancelled { action })
        }
    }

    /// Approve a version, making it the syncing one.
    pub async fn approve(&mut self, version_id: &str) -> Result<(), VersionError> {
        let version = self.find(version_id)?.clone();
        ensure_permitted(&version, VersionAction::Approve)?;
        self.confirm(&version, VersionAction::Approve).await?;

        self.db
            .set_version_status(version_id, VersionStatus::Approved)
            .await
            .map_err(VersionError::SaveFailure)?;
        tracing::info!(version_id, "Approved version");

        self.selected = Some(version_id.to_string());
        self.after_write().await;
        Ok(())
    }

    pub async fn delete(&mut self, version_id: &str) -> Result<(), VersionError> {
        let version = self.find(version_id)?.clone();
        ensure_permitted(&version, VersionAction::Delete)?;
        self.confirm(&version, VersionAction::Delete).await?;

        self.db
            .delete_version(version_id)
            .await
            .map_err(VersionError::SaveFailure)?;
        tracing::info!(version_id, "Deleted version");

        if self.selected.as_deref() == Some(version_id) {
            self.selected = None;
        }
        self.after_write().await;
        Ok(())
    }

    /// Announce a committed write and reload.
    ///
    /// The browser's own signal is consumed here, since the reload covers it.
    /// The write already succeeded, so a failed reload is kept as a warning.
    async fn after_write(&mut self) {
        self.bus.publish(RefreshTopic::VersionList);
        if let Some(list) = self.list_sub.as_mut() {
            while list.try_recv().is_some() {}
        }
        if let Err(e) = self.refresh_versions().await {
            tracing::warn!(parent_id = %self.parent_id, error = %e, "Reload after write failed");
            self.warnings.push(e);
        }
    }

    pub async fn open_editor(&self, version_id: &str) -> Result<EditSession, VersionError> {
        let version = self.find(version_id)?;
        EditSession::open(self.db.clone(), self.bus.clone(), &self.config, version).await
    }

    pub async fn open_creator(&self) -> Result<CreateSession, VersionError> {
        CreateSession::open(
            self.db.clone(),
            self.bus.clone(),
            &self.config,
            &self.parent_id,
        )
        .await
    }

    /// Wait for a refresh signal from any session. `None` once closed.
    pub async fn next_refresh(&mut self) -> Option<RefreshTopic> {
        let (Some(list), Some(items)) = (self.list_sub.as_mut(), self.items_sub.as_mut()) else {
            return None;
        };
        tokio::select! {
            Some(_) = list.recv() => Some(RefreshTopic::VersionList),
            Some(_) = items.recv() => Some(RefreshTopic::VersionLineItems),
            else => None,
        }
    }

    /// A refresh signal that has already arrived, without waiting.
    pub fn pending_refresh(&mut self) -> Option<RefreshTopic> {
        if let Some(list) = self.list_sub.as_mut()
            && list.try_recv().is_some()
        {
            return Some(RefreshTopic::VersionList);
        }
        if let Some(items) = self.items_sub.as_mut()
            && items.try_recv().is_some()
        {
            return Some(RefreshTopic::VersionLineItems);
        }
        None
    }

    /// Both topics invalidate versions (totals) and the shown line items.
    pub async fn handle_refresh(&mut self, topic: RefreshTopic) -> Result<(), VersionError> {
        tracing::debug!(parent_id = %self.parent_id, topic = topic.as_str(), "Handling refresh");
        self.refresh_versions().await
    }

    /// Release subscriptions. The browser stops receiving refresh signals.
    pub fn close(&mut self) {
        self.list_sub = None;
        self.items_sub = None;
        tracing::debug!(parent_id = %self.parent_id, "Closed version browser");
    }

    pub fn is_closed(&self) -> bool {
        self.list_sub.is_none() && self.items_sub.is_none()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
