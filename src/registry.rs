// src/registry.rs
//! Source registry: the configured set of ingestible feed sources.
//! Seeding is an idempotent upsert by URL, safe on every process start.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::store::{Source, Store};

/// Built-in environmental feed sources, mirrored into the store at startup.
pub const DEFAULT_SOURCES: &[(&str, &str, &str)] = &[
    (
        "NASA Climate Change",
        "https://climate.nasa.gov/rss/news.rss",
        "Climate Science",
    ),
    (
        "EPA News",
        "https://www.epa.gov/newsreleases/rss.xml",
        "Policy",
    ),
    (
        "Environmental News Network",
        "https://www.enn.com/rss",
        "General",
    ),
    ("Yale Environment 360", "https://e360.yale.edu/feed", "Research"),
    (
        "Green Building Advisor",
        "https://www.greenbuildingadvisor.com/rss.xml",
        "Green Building",
    ),
    (
        "Renewable Energy World",
        "https://www.renewableenergyworld.com/feed/",
        "Renewable Energy",
    ),
    (
        "Environmental Defense Fund",
        "https://www.edf.org/rss.xml",
        "Conservation",
    ),
    ("CleanTechnica", "https://cleantechnica.com/feed/", "Clean Technology"),
];

pub struct SourceRegistry {
    store: Arc<Store>,
}

impl SourceRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Upsert the built-in source list. Returns the number of newly
    /// created sources (zero on a warm re-seed).
    pub fn seed_defaults(&self) -> usize {
        let mut created = 0;
        for (name, url, category) in DEFAULT_SOURCES {
            if self.store.upsert_source(name, url, category) {
                created += 1;
            }
        }
        info!(created, total = DEFAULT_SOURCES.len(), "feed sources seeded");
        created
    }

    pub fn add_source(&self, name: &str, url: &str, category: &str) -> bool {
        self.store.upsert_source(name, url, category)
    }

    pub fn active_sources(&self) -> Vec<Source> {
        self.store.active_sources()
    }

    pub fn all_sources(&self) -> Vec<Source> {
        self.store.all_sources()
    }

    /// Sources are never deleted, only switched off.
    pub fn deactivate(&self, id: u64) -> bool {
        self.store.set_source_active(id, false)
    }

    /// Recorded by the collector after a successful fetch of this source.
    pub fn mark_fetched(&self, id: u64, when: DateTime<Utc>) {
        self.store.mark_source_fetched(id, when);
    }
}
