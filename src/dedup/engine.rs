//! Deduplication engine
//!
//! Keeps the arena of canonical records. Records produced by different
//! plugins for the same software are folded into one canonical record, which
//! is what callers see from then on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::core::sync::lock_recover;
use crate::record::api::{App, AppKind};

#[derive(Default)]
struct Arena {
    /// Canonical records by id
    canonical: BTreeMap<String, Arc<App>>,
    /// Folded record id -> canonical id
    aliases: HashMap<String, String>,
    /// Candidates already folded, by address. Entries whose record has been
    /// dropped are pruned as the map grows.
    folded: HashMap<usize, (Weak<App>, String)>,
    prune_at: usize,
}

const MIN_PRUNE_AT: usize = 64;

impl Arena {
    fn canonical_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    fn get(&self, id: &str) -> Option<&Arc<App>> {
        self.canonical.get(self.canonical_id(id))
    }

    fn remember(&mut self, candidate: &Arc<App>, canonical_id: &str) {
        if self.folded.len() >= self.prune_at.max(MIN_PRUNE_AT) {
            self.prune_folded();
        }
        self.folded.insert(
            address(candidate),
            (Arc::downgrade(candidate), canonical_id.to_string()),
        );
    }

    /// Drop entries for records nobody holds any more
    fn prune_folded(&mut self) {
        let before = self.folded.len();
        let canonical = &self.canonical;
        self.folded.retain(|_, (candidate, canonical_id)| {
            candidate.strong_count() > 0 && canonical.contains_key(canonical_id.as_str())
        });
        self.prune_at = self.folded.len() * 2;
        log::trace!("dedup: pruned {} folded entries", before - self.folded.len());
    }

    /// Canonical id a still-live candidate was folded into
    fn folded_into(&self, candidate: &Arc<App>) -> Option<&str> {
        let (folded, canonical_id) = self.folded.get(&address(candidate))?;
        let folded = folded.upgrade()?;
        Arc::ptr_eq(&folded, candidate).then_some(canonical_id.as_str())
    }

    /// Point every alias and folded entry for `from` at `to`
    fn redirect(&mut self, from: &str, to: &str) {
        for target in self.aliases.values_mut() {
            if target == from {
                *target = to.to_string();
            }
        }
        for (_, target) in self.folded.values_mut() {
            if target == from {
                *target = to.to_string();
            }
        }
        self.aliases.insert(from.to_string(), to.to_string());
    }

    fn find_overlap(&self, candidate: &App, wanted: fn(AppKind) -> bool) -> Option<Arc<App>> {
        let sources = candidate.sources();
        if sources.is_empty() {
            return None;
        }
        self.canonical
            .values()
            .filter(|existing| wanted(existing.kind()))
            .find(|existing| existing.sources().iter().any(|s| sources.contains(s)))
            .cloned()
    }
}

fn address(app: &Arc<App>) -> usize {
    Arc::as_ptr(app) as usize
}

fn is_package(kind: AppKind) -> bool {
    kind == AppKind::Package
}

fn is_application(kind: AppKind) -> bool {
    matches!(kind, AppKind::Normal | AppKind::System)
}

/// Arena of canonical records shared by every loader operation
#[derive(Default)]
pub struct DedupEngine {
    arena: Mutex<Arena>,
}

impl std::fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.lock();
        f.debug_struct("DedupEngine")
            .field("canonical", &arena.canonical.len())
            .field("aliases", &arena.aliases.len())
            .finish()
    }
}

impl DedupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        lock_recover(self.arena.lock(), "DedupEngine::arena")
    }

    /// Return the canonical record for `candidate`, folding it in if needed
    ///
    /// Matching is by id (or a recorded alias) first, then by a source shared
    /// between a package record and an application record. Without a match
    /// the candidate itself becomes canonical.
    pub fn dedupe(&self, candidate: Arc<App>) -> Arc<App> {
        let mut arena = self.lock();

        if let Some(existing) = arena.get(candidate.id()) {
            if Arc::ptr_eq(existing, &candidate) {
                return candidate;
            }
        }
        if let Some(canonical_id) = arena.folded_into(&candidate) {
            if let Some(existing) = arena.canonical.get(canonical_id) {
                return existing.clone();
            }
        }

        if let Some(existing) = arena.get(candidate.id()).cloned() {
            log::trace!("dedup: {} matched by id", candidate.id());
            existing.subsume(&candidate);
            let canonical_id = existing.id().to_string();
            arena.remember(&candidate, &canonical_id);
            return existing;
        }

        if is_package(candidate.kind()) {
            if let Some(app) = arena.find_overlap(&candidate, is_application) {
                log::debug!("dedup: folding package {} into {}", candidate.id(), app.id());
                app.subsume(&candidate);
                arena.aliases.insert(candidate.id().to_string(), app.id().to_string());
                let canonical_id = app.id().to_string();
                arena.remember(&candidate, &canonical_id);
                return app;
            }
        } else if is_application(candidate.kind()) {
            if let Some(package) = arena.find_overlap(&candidate, is_package) {
                log::debug!(
                    "dedup: {} replaces package {}",
                    candidate.id(),
                    package.id()
                );
                candidate.subsume(&package);
                arena.canonical.remove(package.id());
                arena.redirect(package.id(), candidate.id());
                arena.remember(&package, candidate.id());
                arena
                    .canonical
                    .insert(candidate.id().to_string(), candidate.clone());
                return candidate;
            }
        }

        arena
            .canonical
            .insert(candidate.id().to_string(), candidate.clone());
        candidate
    }

    /// Dedupe every record, keeping order and dropping repeats
    pub fn dedupe_all(&self, apps: Vec<Arc<App>>) -> Vec<Arc<App>> {
        let mut result: Vec<Arc<App>> = Vec::with_capacity(apps.len());
        for app in apps {
            let canonical = self.dedupe(app);
            if !result.iter().any(|seen| Arc::ptr_eq(seen, &canonical)) {
                result.push(canonical);
            }
        }
        result
    }

    /// Canonical record for an id or a folded alias
    pub fn resolve(&self, id: &str) -> Option<Arc<App>> {
        self.lock().get(id).cloned()
    }

    /// Adopt the related records plugins parked on `app`
    ///
    /// Each parked record is deduplicated into the arena and linked to `app`
    /// by its canonical id. Returns the canonical records adopted.
    pub fn adopt_relations(&self, app: &App) -> Vec<Arc<App>> {
        let mut adopted = Vec::new();
        for (relation, related) in app.take_pending_relations() {
            let canonical = self.dedupe(related);
            app.link(relation, canonical.id());
            adopted.push(canonical);
        }
        adopted
    }

    pub fn len(&self) -> usize {
        self.lock().canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
