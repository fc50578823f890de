// src/trending.rs
//! Trend classification. Trending is a derived, time-decaying property:
//! every pass both promotes fresh keyword matches and demotes records that
//! aged out of the window, so a flag set once never sticks around.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TrendReport {
    pub evaluated: usize,
    pub marked: usize,
    pub cleared: usize,
}

pub struct TrendClassifier {
    store: Arc<Store>,
}

impl TrendClassifier {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn reclassify(&self, cfg: &PipelineConfig, now: DateTime<Utc>) -> TrendReport {
        let cutoff = now - Duration::days(cfg.trend_window_days);
        let mut report = TrendReport::default();

        // Promote: bounded scan over the most recent candidates.
        let candidates = self.store.articles_published_since(cutoff);
        for article in candidates.iter().take(cfg.trend_candidate_limit) {
            report.evaluated += 1;
            if article.trending {
                continue;
            }
            let text = format!("{} {}", article.title, article.body).to_lowercase();
            if cfg.trend_keywords.iter().any(|k| text.contains(&k.to_lowercase())) {
                self.store.set_trending(article.id, true, now);
                report.marked += 1;
            }
        }

        // Decay: anything trending that slid past the window is reset,
        // unconditionally, on every pass.
        for article in self.store.trending_articles() {
            if article.published_at < cutoff {
                self.store.set_trending(article.id, false, now);
                report.cleared += 1;
            }
        }

        info!(
            evaluated = report.evaluated,
            marked = report.marked,
            cleared = report.cleared,
            "trend reclassification pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewArticle;

    fn insert(store: &Store, key: &str, title: &str, age_days: i64) -> u64 {
        let now = Utc::now();
        store
            .insert_article(
                NewArticle {
                    title: title.into(),
                    body: "body text".into(),
                    category: "General".into(),
                    author: "a".into(),
                    published_at: now - Duration::days(age_days),
                    source_name: "s".into(),
                    source_key: key.into(),
                    tags: vec![],
                },
                String::new(),
                1,
                now,
            )
            .unwrap()
            .id
    }

    #[test]
    fn fresh_keyword_match_becomes_trending() {
        let store = Arc::new(Store::new());
        let id = insert(&store, "k1", "Solar adoption accelerates", 1);
        insert(&store, "k2", "Local bake sale", 1);

        let classifier = TrendClassifier::new(store.clone());
        let report = classifier.reclassify(&PipelineConfig::default(), Utc::now());
        assert_eq!(report.marked, 1);
        assert!(store.article_by_source_key("k1").unwrap().trending);
        assert!(!store.article_by_source_key("k2").unwrap().trending);
        let _ = id;
    }

    #[test]
    fn aged_trending_flag_decays() {
        let store = Arc::new(Store::new());
        let now = Utc::now();
        let id = insert(&store, "old", "Solar boom", 10);
        store.set_trending(id, true, now);

        let classifier = TrendClassifier::new(store.clone());
        let report = classifier.reclassify(&PipelineConfig::default(), now);
        assert_eq!(report.cleared, 1);
        assert!(!store.article_by_source_key("old").unwrap().trending);
    }

    #[test]
    fn candidate_bound_limits_evaluation() {
        let store = Arc::new(Store::new());
        for i in 0..20 {
            insert(&store, &format!("k{i}"), "Recycling drive announced", 1);
        }
        let cfg = PipelineConfig {
            trend_candidate_limit: 5,
            ..Default::default()
        };
        let classifier = TrendClassifier::new(store);
        let report = classifier.reclassify(&cfg, Utc::now());
        assert_eq!(report.evaluated, 5);
        assert_eq!(report.marked, 5);
    }
}
