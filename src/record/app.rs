//! The application record
//!
//! An [`App`] is shared between every plugin that contributes to it, so all
//! mutable state lives behind a single `RwLock` and every mutator takes
//! `&self`. State and progress changes are broadcast to observers after the
//! lock has been released.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::core::sync::{read_recover, write_recover};
use crate::record::flags::{Kudos, RefineFlags};
use crate::record::media::{Review, Screenshot};
use crate::record::quality::Tiered;
use crate::record::types::{
    AppKind, AppState, IdKind, Quality, RatingKind, Relation, UpdateSeverity, UrlKind,
};

pub const SIZE_UNKNOWN: u64 = 0;
pub const SIZE_MISSING: u64 = 1;
pub const INSTALL_DATE_UNSET: u64 = 0;
pub const INSTALL_DATE_UNKNOWN: u64 = 1;
pub const RATING_UNSET: i32 = -1;

const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Observable change on a record
#[derive(Debug, Clone, PartialEq)]
pub enum AppChange {
    StateChanged { id: String, state: AppState },
    ProgressChanged { id: String, progress: u32 },
}

#[derive(Debug, Clone, Default)]
struct AppData {
    kind: AppKind,
    id_kind: IdKind,
    state: AppState,
    state_recover: Option<AppState>,
    progress: u32,

    name: Tiered<String>,
    summary: Tiered<String>,
    description: Tiered<String>,
    licence: Tiered<String>,

    sources: Vec<String>,
    source_ids: Vec<String>,
    management_plugin: Option<String>,
    origin: Option<String>,
    version: Option<String>,
    update_version: Option<String>,
    update_details: Option<String>,
    update_severity: UpdateSeverity,
    urls: BTreeMap<UrlKind, String>,
    metadata: BTreeMap<String, String>,

    size: u64,
    install_date: u64,
    rating: i32,
    rating_confidence: i32,
    rating_kind: RatingKind,
    reviews: Vec<Review>,
    kudos: Kudos,

    addons: Vec<String>,
    related: Vec<String>,
    history: Vec<String>,
    categories: Vec<String>,
    keywords: Vec<String>,
    screenshots: Vec<Screenshot>,
    menu_path: Vec<String>,
    project_group: Option<String>,
    summary_missing: Option<String>,
    to_be_installed: bool,
    search_sort_key: Option<String>,

    refined: RefineFlags,
    pending: Vec<(Relation, Arc<App>)>,
}

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) -> bool {
    let value = value.into();
    if list.iter().any(|existing| *existing == value) {
        return false;
    }
    list.push(value);
    true
}

fn fill_unset(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

pub struct App {
    id: String,
    data: RwLock<AppData>,
    changes: broadcast::Sender<AppChange>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("App")
            .field("id", &self.id)
            .field("kind", &data.kind)
            .field("state", &data.state)
            .field("name", &data.name.value())
            .finish()
    }
}

impl App {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            id: id.into(),
            data: RwLock::new(AppData {
                rating: RATING_UNSET,
                rating_confidence: RATING_UNSET,
                ..Default::default()
            }),
            changes,
        })
    }

    /// Convenience constructor used heavily by plugins
    pub fn with_kind(id: impl Into<String>, kind: AppKind) -> Arc<Self> {
        let app = Self::new(id);
        app.set_kind(kind);
        app
    }

    fn read(&self) -> RwLockReadGuard<'_, AppData> {
        read_recover(self.data.read(), "App::read")
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppData> {
        write_recover(self.data.write(), "App::write")
    }

    fn notify(&self, change: AppChange) {
        // No receivers is the normal case
        let _ = self.changes.send(change);
    }

    /// Observe state and progress changes
    pub fn subscribe(&self) -> broadcast::Receiver<AppChange> {
        self.changes.subscribe()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // --- identity -------------------------------------------------------

    pub fn kind(&self) -> AppKind {
        self.read().kind
    }

    pub fn set_kind(&self, kind: AppKind) {
        self.write().kind = kind;
    }

    pub fn id_kind(&self) -> IdKind {
        self.read().id_kind
    }

    pub fn set_id_kind(&self, id_kind: IdKind) {
        self.write().id_kind = id_kind;
    }

    // --- lifecycle ------------------------------------------------------

    pub fn state(&self) -> AppState {
        self.read().state
    }

    /// Move to `state` if the lifecycle allows it
    ///
    /// Returns `false` for a no-op or a rejected transition. Any accepted
    /// change clears the record's refined set so the next refine pass
    /// re-queries it.
    pub fn set_state(&self, state: AppState) -> bool {
        {
            let mut data = self.write();
            let current = data.state;
            if current == state {
                return false;
            }
            if !current.can_transition_to(state) {
                log::warn!(
                    "{}: refusing state change {} -> {}",
                    self.id,
                    current,
                    state
                );
                return false;
            }
            log::debug!("{}: state {} -> {}", self.id, current, state);

            data.state_recover = if state.is_transient() {
                Some(current)
            } else {
                None
            };
            data.state = state;
            data.refined = RefineFlags::empty();
        }
        self.notify(AppChange::StateChanged {
            id: self.id.clone(),
            state,
        });
        true
    }

    /// Return to the state held before the current install or remove began
    pub fn set_state_recover(&self) -> bool {
        let previous = {
            let data = self.read();
            if !data.state.is_transient() {
                return false;
            }
            data.state_recover
        };
        match previous {
            Some(previous) => self.set_state(previous),
            None => false,
        }
    }

    pub fn progress(&self) -> u32 {
        self.read().progress
    }

    pub fn set_progress(&self, percentage: u32) {
        let progress = percentage.min(100);
        {
            let mut data = self.write();
            if data.progress == progress {
                return;
            }
            data.progress = progress;
        }
        self.notify(AppChange::ProgressChanged {
            id: self.id.clone(),
            progress,
        });
    }

    // --- quality-tracked text -------------------------------------------

    pub fn name(&self) -> Option<String> {
        self.read().name.value().cloned()
    }

    pub fn name_quality(&self) -> Quality {
        self.read().name.quality()
    }

    pub fn set_name(&self, quality: Quality, name: impl Into<String>) -> bool {
        self.write().name.offer(name.into(), quality)
    }

    pub fn summary(&self) -> Option<String> {
        self.read().summary.value().cloned()
    }

    pub fn summary_quality(&self) -> Quality {
        self.read().summary.quality()
    }

    pub fn set_summary(&self, quality: Quality, summary: impl Into<String>) -> bool {
        self.write().summary.offer(summary.into(), quality)
    }

    pub fn description(&self) -> Option<String> {
        self.read().description.value().cloned()
    }

    pub fn description_quality(&self) -> Quality {
        self.read().description.quality()
    }

    pub fn set_description(&self, quality: Quality, description: impl Into<String>) -> bool {
        self.write().description.offer(description.into(), quality)
    }

    pub fn licence(&self) -> Option<String> {
        self.read().licence.value().cloned()
    }

    pub fn licence_quality(&self) -> Quality {
        self.read().licence.quality()
    }

    pub fn set_licence(&self, quality: Quality, licence: impl Into<String>) -> bool {
        self.write().licence.offer(licence.into(), quality)
    }

    // --- sources --------------------------------------------------------

    /// Package names backing this record
    pub fn sources(&self) -> Vec<String> {
        self.read().sources.clone()
    }

    pub fn source_default(&self) -> Option<String> {
        self.read().sources.first().cloned()
    }

    pub fn add_source(&self, source: impl Into<String>) -> bool {
        push_unique(&mut self.write().sources, source)
    }

    /// Backend-specific package identifiers, such as `name;version;arch;repo`
    pub fn source_ids(&self) -> Vec<String> {
        self.read().source_ids.clone()
    }

    pub fn source_id_default(&self) -> Option<String> {
        self.read().source_ids.first().cloned()
    }

    pub fn add_source_id(&self, source_id: impl Into<String>) -> bool {
        push_unique(&mut self.write().source_ids, source_id)
    }

    pub fn management_plugin(&self) -> Option<String> {
        self.read().management_plugin.clone()
    }

    pub fn set_management_plugin(&self, plugin: impl Into<String>) {
        self.write().management_plugin = Some(plugin.into());
    }

    pub fn origin(&self) -> Option<String> {
        self.read().origin.clone()
    }

    pub fn set_origin(&self, origin: impl Into<String>) {
        self.write().origin = Some(origin.into());
    }

    // --- versions and updates -------------------------------------------

    pub fn version(&self) -> Option<String> {
        self.read().version.clone()
    }

    pub fn set_version(&self, version: impl Into<String>) {
        self.write().version = Some(version.into());
    }

    pub fn update_version(&self) -> Option<String> {
        self.read().update_version.clone()
    }

    pub fn set_update_version(&self, version: impl Into<String>) {
        self.write().update_version = Some(version.into());
    }

    pub fn update_details(&self) -> Option<String> {
        self.read().update_details.clone()
    }

    pub fn set_update_details(&self, details: impl Into<String>) {
        self.write().update_details = Some(details.into());
    }

    pub fn update_severity(&self) -> UpdateSeverity {
        self.read().update_severity
    }

    pub fn set_update_severity(&self, severity: UpdateSeverity) {
        self.write().update_severity = severity;
    }

    // --- urls and metadata ----------------------------------------------

    pub fn url(&self, kind: UrlKind) -> Option<String> {
        self.read().urls.get(&kind).cloned()
    }

    pub fn urls(&self) -> BTreeMap<UrlKind, String> {
        self.read().urls.clone()
    }

    pub fn set_url(&self, kind: UrlKind, url: impl Into<String>) {
        self.write().urls.insert(kind, url.into());
    }

    pub fn metadata_item(&self, key: &str) -> Option<String> {
        self.read().metadata.get(key).cloned()
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.read().metadata.clone()
    }

    /// Set a metadata value; an existing different value is kept
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        let mut data = self.write();
        match data.metadata.get(&key) {
            Some(existing) if *existing == value => true,
            Some(existing) => {
                log::debug!(
                    "{}: metadata {} already set to '{}', ignoring '{}'",
                    self.id,
                    key,
                    existing,
                    value
                );
                false
            }
            None => {
                data.metadata.insert(key, value);
                true
            }
        }
    }

    // --- size and dates -------------------------------------------------

    /// Installed size in bytes, or one of the size sentinels
    pub fn size(&self) -> u64 {
        self.read().size
    }

    pub fn set_size(&self, size: u64) {
        self.write().size = size;
    }

    pub fn install_date(&self) -> u64 {
        self.read().install_date
    }

    pub fn set_install_date(&self, date: u64) {
        self.write().install_date = date;
    }

    // --- ratings --------------------------------------------------------

    /// 0-100, or [`RATING_UNSET`]
    pub fn rating(&self) -> i32 {
        self.read().rating
    }

    pub fn set_rating(&self, rating: i32) {
        self.write().rating = rating.clamp(RATING_UNSET, 100);
    }

    pub fn rating_confidence(&self) -> i32 {
        self.read().rating_confidence
    }

    pub fn set_rating_confidence(&self, confidence: i32) {
        self.write().rating_confidence = confidence.clamp(RATING_UNSET, 100);
    }

    pub fn rating_kind(&self) -> RatingKind {
        self.read().rating_kind
    }

    pub fn set_rating_kind(&self, kind: RatingKind) {
        self.write().rating_kind = kind;
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.read().reviews.clone()
    }

    pub fn add_review(&self, review: Review) -> bool {
        let mut data = self.write();
        if data.reviews.iter().any(|r| r.same_review(&review)) {
            return false;
        }
        data.reviews.push(review);
        true
    }

    pub fn kudos(&self) -> Kudos {
        self.read().kudos
    }

    pub fn add_kudo(&self, kudo: Kudos) {
        self.write().kudos |= kudo;
    }

    pub fn kudos_percentage(&self) -> u32 {
        self.read().kudos.percentage()
    }

    // --- categorisation -------------------------------------------------

    pub fn categories(&self) -> Vec<String> {
        self.read().categories.clone()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.read().categories.iter().any(|c| c == category)
    }

    pub fn add_category(&self, category: impl Into<String>) -> bool {
        push_unique(&mut self.write().categories, category)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.read().keywords.clone()
    }

    pub fn add_keyword(&self, keyword: impl Into<String>) -> bool {
        push_unique(&mut self.write().keywords, keyword)
    }

    pub fn screenshots(&self) -> Vec<Screenshot> {
        self.read().screenshots.clone()
    }

    pub fn add_screenshot(&self, screenshot: Screenshot) -> bool {
        let mut data = self.write();
        if data.screenshots.iter().any(|s| s.url == screenshot.url) {
            return false;
        }
        data.screenshots.push(screenshot);
        true
    }

    pub fn menu_path(&self) -> Vec<String> {
        self.read().menu_path.clone()
    }

    pub fn set_menu_path(&self, path: Vec<String>) {
        self.write().menu_path = path;
    }

    pub fn project_group(&self) -> Option<String> {
        self.read().project_group.clone()
    }

    pub fn set_project_group(&self, group: impl Into<String>) {
        self.write().project_group = Some(group.into());
    }

    pub fn summary_missing(&self) -> Option<String> {
        self.read().summary_missing.clone()
    }

    pub fn set_summary_missing(&self, text: impl Into<String>) {
        self.write().summary_missing = Some(text.into());
    }

    pub fn to_be_installed(&self) -> bool {
        self.read().to_be_installed
    }

    pub fn set_to_be_installed(&self, to_be_installed: bool) {
        self.write().to_be_installed = to_be_installed;
    }

    pub fn search_sort_key(&self) -> Option<String> {
        self.read().search_sort_key.clone()
    }

    pub fn set_search_sort_key(&self, key: impl Into<String>) {
        self.write().search_sort_key = Some(key.into());
    }

    // --- refine bookkeeping ---------------------------------------------

    /// Requirements a refine pass has already satisfied since the last state change
    pub fn refined(&self) -> RefineFlags {
        self.read().refined
    }

    pub fn add_refined(&self, flags: RefineFlags) {
        self.write().refined |= flags;
    }

    // --- relations ------------------------------------------------------

    pub fn addons(&self) -> Vec<String> {
        self.read().addons.clone()
    }

    pub fn related(&self) -> Vec<String> {
        self.read().related.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.read().history.clone()
    }

    /// Queue `addon` for adoption; it is linked once the loader has deduplicated it
    pub fn add_addon(&self, addon: Arc<App>) {
        self.queue_relation(Relation::Addon, addon);
    }

    pub fn add_related(&self, related: Arc<App>) {
        self.queue_relation(Relation::Related, related);
    }

    pub fn add_history(&self, entry: Arc<App>) {
        self.queue_relation(Relation::History, entry);
    }

    fn queue_relation(&self, relation: Relation, other: Arc<App>) {
        if other.id == self.id {
            log::debug!("{}: ignoring {} relation to itself", self.id, relation);
            return;
        }
        self.write().pending.push((relation, other));
    }

    /// Drain relations queued by plugins
    pub fn take_pending_relations(&self) -> Vec<(Relation, Arc<App>)> {
        std::mem::take(&mut self.write().pending)
    }

    /// Record a relation by canonical id
    pub fn link(&self, relation: Relation, id: &str) -> bool {
        if id == self.id {
            return false;
        }
        let mut data = self.write();
        let list = match relation {
            Relation::Addon => &mut data.addons,
            Relation::Related => &mut data.related,
            Relation::History => &mut data.history,
        };
        push_unique(list, id)
    }

    // --- merging --------------------------------------------------------

    /// Absorb the data of `other`, which describes the same software
    ///
    /// Quality-tracked fields follow tier precedence, plain fields are only
    /// filled when unset, collections are unioned and kudos are OR'd. The
    /// id and state of `self` are never touched.
    pub fn subsume(&self, other: &App) {
        if std::ptr::eq(self, other) {
            return;
        }
        let donor = other.read().clone();
        log::trace!("{}: subsuming {}", self.id, other.id);

        let mut data = self.write();

        if data.kind == AppKind::Unknown {
            data.kind = donor.kind;
        }
        if data.id_kind == IdKind::Unknown {
            data.id_kind = donor.id_kind;
        }

        data.name.merge_from(&donor.name);
        data.summary.merge_from(&donor.summary);
        data.description.merge_from(&donor.description);
        data.licence.merge_from(&donor.licence);

        for source in donor.sources {
            push_unique(&mut data.sources, source);
        }
        for source_id in donor.source_ids {
            push_unique(&mut data.source_ids, source_id);
        }
        fill_unset(&mut data.management_plugin, donor.management_plugin);
        fill_unset(&mut data.origin, donor.origin);
        fill_unset(&mut data.version, donor.version);
        fill_unset(&mut data.update_version, donor.update_version);
        fill_unset(&mut data.update_details, donor.update_details);
        fill_unset(&mut data.project_group, donor.project_group);
        fill_unset(&mut data.summary_missing, donor.summary_missing);
        fill_unset(&mut data.search_sort_key, donor.search_sort_key);
        if data.update_severity == UpdateSeverity::Unknown {
            data.update_severity = donor.update_severity;
        }

        for (kind, url) in donor.urls {
            data.urls.entry(kind).or_insert(url);
        }
        for (key, value) in donor.metadata {
            data.metadata.entry(key).or_insert(value);
        }

        if data.size <= SIZE_MISSING && donor.size > data.size {
            data.size = donor.size;
        }
        if data.install_date <= INSTALL_DATE_UNKNOWN && donor.install_date > data.install_date {
            data.install_date = donor.install_date;
        }
        if data.rating == RATING_UNSET && donor.rating != RATING_UNSET {
            data.rating = donor.rating;
            data.rating_confidence = donor.rating_confidence;
            data.rating_kind = donor.rating_kind;
        }
        for review in donor.reviews {
            if !data.reviews.iter().any(|r| r.same_review(&review)) {
                data.reviews.push(review);
            }
        }
        data.kudos |= donor.kudos;

        for id in donor.addons {
            push_unique(&mut data.addons, id);
        }
        for id in donor.related {
            push_unique(&mut data.related, id);
        }
        for id in donor.history {
            push_unique(&mut data.history, id);
        }
        for category in donor.categories {
            push_unique(&mut data.categories, category);
        }
        for keyword in donor.keywords {
            push_unique(&mut data.keywords, keyword);
        }
        for screenshot in donor.screenshots {
            if !data.screenshots.iter().any(|s| s.url == screenshot.url) {
                data.screenshots.push(screenshot);
            }
        }
        if data.menu_path.is_empty() {
            data.menu_path = donor.menu_path;
        }
        data.to_be_installed |= donor.to_be_installed;
        data.refined |= donor.refined;
        data.pending.extend(donor.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let app = App::new("org.example.Foo.desktop");
        assert_eq!(app.id(), "org.example.Foo.desktop");
        assert_eq!(app.kind(), AppKind::Unknown);
        assert_eq!(app.state(), AppState::Unknown);
        assert_eq!(app.size(), SIZE_UNKNOWN);
        assert_eq!(app.install_date(), INSTALL_DATE_UNSET);
        assert_eq!(app.rating(), RATING_UNSET);
        assert_eq!(app.name(), None);
        assert!(app.refined().is_empty());
    }

    #[test]
    fn test_name_quality_precedence() {
        let app = App::new("foo");
        app.set_name(Quality::Lowest, "Foo");
        app.set_name(Quality::Normal, "Bar");
        app.set_name(Quality::Lowest, "Baz");
        assert_eq!(app.name().as_deref(), Some("Bar"));
        assert_eq!(app.name_quality(), Quality::Normal);
    }

    #[test]
    fn test_sources_are_deduplicated() {
        let app = App::new("foo");
        assert!(app.add_source("foo"));
        assert!(!app.add_source("foo"));
        assert!(app.add_source("foo-data"));
        assert_eq!(app.sources(), vec!["foo", "foo-data"]);
        assert_eq!(app.source_default().as_deref(), Some("foo"));
    }

    #[tokio::test]
    async fn test_state_change_notifies_observers() {
        let app = App::new("foo");
        let mut rx = app.subscribe();

        assert!(app.set_state(AppState::Available));
        assert_eq!(
            rx.recv().await.unwrap(),
            AppChange::StateChanged {
                id: "foo".to_string(),
                state: AppState::Available
            }
        );
    }

    #[test]
    fn test_same_state_is_silent_noop() {
        let app = App::new("foo");
        app.set_state(AppState::Installed);
        let mut rx = app.subscribe();

        assert!(!app.set_state(AppState::Installed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let app = App::new("foo");
        app.set_state(AppState::Available);
        let mut rx = app.subscribe();

        assert!(!app.set_state(AppState::Installed));
        assert_eq!(app.state(), AppState::Available);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_state_recover_after_failed_install() {
        let app = App::new("foo");
        app.set_state(AppState::Available);
        app.set_state(AppState::Installing);

        assert!(app.set_state_recover());
        assert_eq!(app.state(), AppState::Available);
        // Nothing left to recover
        assert!(!app.set_state_recover());
    }

    #[test]
    fn test_state_recover_after_failed_remove() {
        let app = App::new("foo");
        app.set_state(AppState::Updatable);
        app.set_state(AppState::Removing);
        assert!(app.set_state_recover());
        assert_eq!(app.state(), AppState::Updatable);
    }

    #[test]
    fn test_state_change_clears_refined() {
        let app = App::new("foo");
        app.add_refined(RefineFlags::REQUIRE_LICENCE);
        app.set_state(AppState::Available);
        assert!(app.refined().is_empty());
    }

    #[test]
    fn test_progress_is_clamped() {
        let app = App::new("foo");
        let mut rx = app.subscribe();
        app.set_progress(250);
        assert_eq!(app.progress(), 100);
        assert_eq!(
            rx.try_recv().unwrap(),
            AppChange::ProgressChanged {
                id: "foo".to_string(),
                progress: 100
            }
        );
    }

    #[test]
    fn test_metadata_keeps_first_value() {
        let app = App::new("foo");
        assert!(app.set_metadata("X-Steam-GameID", "1234"));
        assert!(app.set_metadata("X-Steam-GameID", "1234"));
        assert!(!app.set_metadata("X-Steam-GameID", "9999"));
        assert_eq!(app.metadata_item("X-Steam-GameID").as_deref(), Some("1234"));
    }

    #[test]
    fn test_kudos_accumulate() {
        let app = App::new("foo");
        app.add_kudo(Kudos::HAS_KEYWORDS);
        app.add_kudo(Kudos::POPULAR);
        app.add_kudo(Kudos::POPULAR);
        assert_eq!(app.kudos_percentage(), 40);
    }

    #[test]
    fn test_relations_are_queued_then_linked() {
        let app = App::new("foo");
        app.add_addon(App::new("foo-plugin"));
        app.add_addon(App::new("foo"));
        assert!(app.addons().is_empty());

        let pending = app.take_pending_relations();
        assert_eq!(pending.len(), 1);
        let (relation, addon) = &pending[0];
        assert_eq!(*relation, Relation::Addon);
        assert!(app.link(*relation, addon.id()));
        assert!(!app.link(*relation, addon.id()));
        assert_eq!(app.addons(), vec!["foo-plugin"]);
        assert!(app.take_pending_relations().is_empty());
    }

    #[test]
    fn test_subsume_merges_without_touching_identity() {
        let canonical = App::new("org.example.Foo.desktop");
        canonical.set_kind(AppKind::Normal);
        canonical.set_state(AppState::Installed);
        canonical.set_name(Quality::Normal, "Foo");
        canonical.set_size(SIZE_MISSING);
        canonical.add_source("foo");

        let package = App::new("foo");
        package.set_kind(AppKind::Package);
        package.set_state(AppState::Available);
        package.set_name(Quality::Lowest, "foo");
        package.set_summary(Quality::Lowest, "A foo");
        package.set_licence(Quality::Normal, "GPL-2.0+");
        package.set_size(4096);
        package.add_source("foo");
        package.add_source("foo-libs");
        package.add_kudo(Kudos::POPULAR);
        package.set_management_plugin("packagekit");

        canonical.subsume(&package);

        assert_eq!(canonical.id(), "org.example.Foo.desktop");
        assert_eq!(canonical.kind(), AppKind::Normal);
        assert_eq!(canonical.state(), AppState::Installed);
        assert_eq!(canonical.name().as_deref(), Some("Foo"));
        assert_eq!(canonical.summary().as_deref(), Some("A foo"));
        assert_eq!(canonical.licence().as_deref(), Some("GPL-2.0+"));
        assert_eq!(canonical.size(), 4096);
        assert_eq!(canonical.sources(), vec!["foo", "foo-libs"]);
        assert_eq!(canonical.kudos(), Kudos::POPULAR);
        assert_eq!(canonical.management_plugin().as_deref(), Some("packagekit"));
    }

    #[test]
    fn test_subsume_prefers_higher_tier_from_donor() {
        let canonical = App::new("a");
        canonical.set_name(Quality::Lowest, "low");
        let donor = App::new("b");
        donor.set_name(Quality::Highest, "high");

        canonical.subsume(&donor);
        assert_eq!(canonical.name().as_deref(), Some("high"));
        assert_eq!(canonical.name_quality(), Quality::Highest);
    }

    #[test]
    fn test_subsume_self_is_noop() {
        let app = App::new("foo");
        app.add_source("foo");
        app.subsume(&app);
        assert_eq!(app.sources(), vec!["foo"]);
    }
}
