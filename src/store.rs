//! store.rs — in-process persistent store for the ingestion pipeline.
//!
//! Tables for sources, articles, environmental metrics, and catalog items,
//! each behind its own `RwLock`. Dedup lookups are served from natural-key
//! indexes so reads are consistent with the latest write from this process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub category: String,
    pub active: bool,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub category: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    /// Natural key: the canonical origin URL of the entry. Unique.
    pub source_key: String,
    pub trending: bool,
    pub featured: bool,
    pub tags: Vec<String>,
    pub read_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for an article; derived fields (excerpt, read time)
/// are filled in by the upsert engine.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub category: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub source_key: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: u64,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub region: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMetric {
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub region: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub sustainability_score: u32,
    pub in_stock: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One observation of a product as seen upstream, keyed by `(name, brand)`.
#[derive(Debug, Clone)]
pub struct ProductObservation {
    pub name: String,
    pub brand: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub in_stock: bool,
}

#[derive(Default)]
struct Tables {
    sources: Vec<Source>,
    articles: Vec<Article>,
    metrics: Vec<MetricRecord>,
    catalog: Vec<CatalogItem>,
    /// source_key -> index into `articles`
    article_keys: HashMap<String, usize>,
    /// lowercased (name, brand) -> index into `catalog`
    catalog_keys: HashMap<(String, String), usize>,
}

/// The shared store. Cheap to clone behind an `Arc` at the call sites.
pub struct Store {
    inner: RwLock<Tables>,
    next_id: AtomicU64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ---- sources ----

    /// Idempotent upsert by `url`. Re-seeding on every process start is safe:
    /// an existing source gets its name/category refreshed and is re-activated,
    /// `last_fetched` is preserved. Returns true when a new source was created.
    pub fn upsert_source(&self, name: &str, url: &str, category: &str) -> bool {
        let mut t = self.inner.write().expect("store lock poisoned");
        if let Some(src) = t.sources.iter_mut().find(|s| s.url == url) {
            src.name = name.to_string();
            src.category = category.to_string();
            src.active = true;
            return false;
        }
        let id = self.alloc_id();
        t.sources.push(Source {
            id,
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            active: true,
            last_fetched: None,
        });
        true
    }

    pub fn active_sources(&self) -> Vec<Source> {
        let t = self.inner.read().expect("store lock poisoned");
        t.sources.iter().filter(|s| s.active).cloned().collect()
    }

    pub fn all_sources(&self) -> Vec<Source> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .sources
            .clone()
    }

    /// Sources are never hard-deleted, only deactivated.
    pub fn set_source_active(&self, id: u64, active: bool) -> bool {
        let mut t = self.inner.write().expect("store lock poisoned");
        match t.sources.iter_mut().find(|s| s.id == id) {
            Some(src) => {
                src.active = active;
                true
            }
            None => false,
        }
    }

    pub fn mark_source_fetched(&self, id: u64, when: DateTime<Utc>) {
        let mut t = self.inner.write().expect("store lock poisoned");
        if let Some(src) = t.sources.iter_mut().find(|s| s.id == id) {
            src.last_fetched = Some(when);
        }
    }

    // ---- articles ----

    pub fn article_by_source_key(&self, key: &str) -> Option<Article> {
        let t = self.inner.read().expect("store lock poisoned");
        t.article_keys.get(key).map(|&i| t.articles[i].clone())
    }

    /// Inserts a new article. Fails if `source_key` already exists; callers
    /// go through the upsert engine which checks first, so a collision here
    /// means a race lost within this process and the item is skipped.
    pub fn insert_article(
        &self,
        new: NewArticle,
        excerpt: String,
        read_minutes: u32,
        now: DateTime<Utc>,
    ) -> Option<Article> {
        let mut t = self.inner.write().expect("store lock poisoned");
        if t.article_keys.contains_key(&new.source_key) {
            return None;
        }
        let id = self.alloc_id();
        let article = Article {
            id,
            title: new.title,
            body: new.body,
            excerpt,
            category: new.category,
            author: new.author,
            published_at: new.published_at,
            source_name: new.source_name,
            source_key: new.source_key.clone(),
            trending: false,
            featured: false,
            tags: new.tags,
            read_minutes,
            created_at: now,
            updated_at: now,
        };
        let idx = t.articles.len();
        t.articles.push(article.clone());
        t.article_keys.insert(new.source_key, idx);
        Some(article)
    }

    /// Most recent articles published at or after `since`, newest first.
    pub fn articles_published_since(&self, since: DateTime<Utc>) -> Vec<Article> {
        let t = self.inner.read().expect("store lock poisoned");
        let mut out: Vec<Article> = t
            .articles
            .iter()
            .filter(|a| a.published_at >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        out
    }

    pub fn trending_articles(&self) -> Vec<Article> {
        let t = self.inner.read().expect("store lock poisoned");
        t.articles.iter().filter(|a| a.trending).cloned().collect()
    }

    pub fn set_trending(&self, id: u64, trending: bool, now: DateTime<Utc>) {
        let mut t = self.inner.write().expect("store lock poisoned");
        if let Some(a) = t.articles.iter_mut().find(|a| a.id == id) {
            a.trending = trending;
            a.updated_at = now;
        }
    }

    pub fn set_featured(&self, id: u64, featured: bool, now: DateTime<Utc>) {
        let mut t = self.inner.write().expect("store lock poisoned");
        if let Some(a) = t.articles.iter_mut().find(|a| a.id == id) {
            a.featured = featured;
            a.updated_at = now;
        }
    }

    pub fn article_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").articles.len()
    }

    /// Deletes every article matching the predicate, returns the count.
    /// The source_key index is rebuilt after removal.
    pub fn delete_articles_where<F: Fn(&Article) -> bool>(&self, pred: F) -> usize {
        let mut t = self.inner.write().expect("store lock poisoned");
        let before = t.articles.len();
        t.articles.retain(|a| !pred(a));
        let deleted = before - t.articles.len();
        if deleted > 0 {
            t.article_keys = t
                .articles
                .iter()
                .enumerate()
                .map(|(i, a)| (a.source_key.clone(), i))
                .collect();
        }
        deleted
    }

    // ---- metrics ----

    /// Append-only: repeated readings per type/region/time are all valid.
    pub fn insert_metric(&self, new: NewMetric) -> MetricRecord {
        let mut t = self.inner.write().expect("store lock poisoned");
        let record = MetricRecord {
            id: self.alloc_id(),
            metric_type: new.metric_type,
            value: new.value,
            unit: new.unit,
            region: new.region,
            source: new.source,
            recorded_at: new.recorded_at,
        };
        t.metrics.push(record.clone());
        record
    }

    pub fn metric_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").metrics.len()
    }

    pub fn metrics_of_type(&self, metric_type: &str) -> Vec<MetricRecord> {
        let t = self.inner.read().expect("store lock poisoned");
        t.metrics
            .iter()
            .filter(|m| m.metric_type == metric_type)
            .cloned()
            .collect()
    }

    pub fn delete_metrics_where<F: Fn(&MetricRecord) -> bool>(&self, pred: F) -> usize {
        let mut t = self.inner.write().expect("store lock poisoned");
        let before = t.metrics.len();
        t.metrics.retain(|m| !pred(m));
        before - t.metrics.len()
    }

    // ---- catalog ----

    fn catalog_key(name: &str, brand: &str) -> (String, String) {
        (name.to_lowercase(), brand.to_lowercase())
    }

    pub fn catalog_by_name_brand(&self, name: &str, brand: &str) -> Option<CatalogItem> {
        let t = self.inner.read().expect("store lock poisoned");
        t.catalog_keys
            .get(&Self::catalog_key(name, brand))
            .map(|&i| t.catalog[i].clone())
    }

    pub fn insert_catalog_item(
        &self,
        obs: ProductObservation,
        category: String,
        sustainability_score: u32,
        now: DateTime<Utc>,
    ) -> Option<CatalogItem> {
        let mut t = self.inner.write().expect("store lock poisoned");
        let key = Self::catalog_key(&obs.name, &obs.brand);
        if t.catalog_keys.contains_key(&key) {
            return None;
        }
        let item = CatalogItem {
            id: self.alloc_id(),
            name: obs.name,
            brand: obs.brand,
            category,
            price: obs.price,
            rating: obs.rating,
            description: obs.description,
            sustainability_score,
            in_stock: obs.in_stock,
            featured: false,
            created_at: now,
            updated_at: now,
        };
        let idx = t.catalog.len();
        t.catalog.push(item.clone());
        t.catalog_keys.insert(key, idx);
        Some(item)
    }

    /// Refresh the mutable fields of an existing item in place.
    /// Identity fields (name, brand, category, score) are untouched, and
    /// an observation missing price or rating keeps the stored values.
    pub fn update_catalog_observation(
        &self,
        id: u64,
        price: Option<f64>,
        rating: Option<f64>,
        in_stock: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let mut t = self.inner.write().expect("store lock poisoned");
        match t.catalog.iter_mut().find(|c| c.id == id) {
            Some(item) => {
                if price.is_some() {
                    item.price = price;
                }
                if rating.is_some() {
                    item.rating = rating;
                }
                item.in_stock = in_stock;
                item.updated_at = now;
                true
            }
            None => false,
        }
    }

    pub fn catalog_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").catalog.len()
    }

    pub fn all_catalog_items(&self) -> Vec<CatalogItem> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .catalog
            .clone()
    }

    pub fn delete_catalog_where<F: Fn(&CatalogItem) -> bool>(&self, pred: F) -> usize {
        let mut t = self.inner.write().expect("store lock poisoned");
        let before = t.catalog.len();
        t.catalog.retain(|c| !pred(c));
        let deleted = before - t.catalog.len();
        if deleted > 0 {
            t.catalog_keys = t
                .catalog
                .iter()
                .enumerate()
                .map(|(i, c)| (Self::catalog_key(&c.name, &c.brand), i))
                .collect();
        }
        deleted
    }
}
