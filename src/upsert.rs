// src/upsert.rs
//! Deduplication & upsert engine: the single write path between collectors
//! and the store. Content dedups by `source_key` (skip on duplicate),
//! catalog items by `(name, brand)` (update mutable fields in place),
//! metric readings always insert.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::debug;

use crate::collect::types::CollectedItem;
use crate::collect::{make_excerpt, read_minutes};
use crate::store::{Article, NewArticle, ProductObservation, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl UpsertCounts {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: UpsertCounts) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

pub struct UpsertEngine {
    store: Arc<Store>,
}

impl UpsertEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist one collected item, deciding insert vs update vs skip by the
    /// entity's natural key.
    pub fn upsert(&self, item: CollectedItem) -> UpsertOutcome {
        let outcome = match item {
            CollectedItem::Article(a) => self.upsert_article(a).map_or(
                UpsertOutcome::Skipped,
                |_| UpsertOutcome::Inserted,
            ),
            CollectedItem::Product(p) => self.upsert_product(p),
            CollectedItem::Metric(m) => {
                self.store.insert_metric(m);
                UpsertOutcome::Inserted
            }
        };
        match outcome {
            UpsertOutcome::Inserted => counter!("pipeline_inserted_total").increment(1),
            UpsertOutcome::Updated => counter!("pipeline_updated_total").increment(1),
            UpsertOutcome::Skipped => counter!("pipeline_skipped_total").increment(1),
        }
        outcome
    }

    /// Batch variant; returns the counts plus the articles that were newly
    /// inserted, for the downstream notification hook.
    pub fn upsert_batch(&self, items: Vec<CollectedItem>) -> (UpsertCounts, Vec<Article>) {
        let mut counts = UpsertCounts::default();
        let mut new_articles = Vec::new();
        for item in items {
            match item {
                CollectedItem::Article(a) => match self.upsert_article(a) {
                    Some(article) => {
                        counter!("pipeline_inserted_total").increment(1);
                        counts.record(UpsertOutcome::Inserted);
                        new_articles.push(article);
                    }
                    None => {
                        counter!("pipeline_skipped_total").increment(1);
                        counts.record(UpsertOutcome::Skipped);
                    }
                },
                other => counts.record(self.upsert(other)),
            }
        }
        (counts, new_articles)
    }

    /// Content records are immutable once ingested: a reappearing feed
    /// entry is a genuine duplicate, never an update.
    fn upsert_article(&self, new: NewArticle) -> Option<Article> {
        if self.store.article_by_source_key(&new.source_key).is_some() {
            debug!(source_key = %new.source_key, "duplicate article skipped");
            return None;
        }
        let excerpt = make_excerpt(&new.body);
        let minutes = read_minutes(&new.body);
        // insert_article re-checks the key under the write lock; losing
        // that race within the process is a skip, not an error.
        self.store.insert_article(new, excerpt, minutes, Utc::now())
    }

    fn upsert_product(&self, obs: ProductObservation) -> UpsertOutcome {
        let now = Utc::now();
        if let Some(existing) = self.store.catalog_by_name_brand(&obs.name, &obs.brand) {
            self.store
                .update_catalog_observation(existing.id, obs.price, obs.rating, obs.in_stock, now);
            return UpsertOutcome::Updated;
        }
        let category = categorize_product(&obs.name);
        let score = sustainability_score(&obs.name, &obs.brand);
        match self.store.insert_catalog_item(obs, category, score, now) {
            Some(_) => UpsertOutcome::Inserted,
            None => UpsertOutcome::Skipped,
        }
    }
}

/// Rough category bucketing by product-name keywords.
pub fn categorize_product(name: &str) -> String {
    const BUCKETS: &[(&str, &[&str])] = &[
        ("Home & Garden", &["plates", "sheets", "bulbs", "lights"]),
        ("Personal Care", &["toothbrush", "soap", "shampoo"]),
        ("Electronics", &["charger", "battery", "solar"]),
        ("Food & Kitchen", &["wraps", "containers", "bottles"]),
    ];
    let lower = name.to_lowercase();
    for (category, keywords) in BUCKETS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category.to_string();
        }
    }
    "General".to_string()
}

/// Static-attribute sustainability score: base 70, +5 per eco keyword in
/// the name/brand text, capped at 98. Computed once, at insert.
pub fn sustainability_score(name: &str, brand: &str) -> u32 {
    const ECO_KEYWORDS: &[&str] = &["eco", "green", "organic", "sustainable", "bamboo", "solar"];
    let text = format!("{name} {brand}").to_lowercase();
    let mut score = 70u32;
    for keyword in ECO_KEYWORDS {
        if text.contains(keyword) {
            score += 5;
        }
    }
    score.min(98)
}
