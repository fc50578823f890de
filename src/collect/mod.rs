// src/collect/mod.rs
pub mod catalog;
pub mod feed;
pub mod metric;
pub mod types;

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::collect::types::{CollectedItem, Collector};
use crate::store::Source;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_items_collected_total",
            "Items produced by collectors before dedup."
        );
        describe_counter!(
            "pipeline_source_errors_total",
            "Per-source fetch/parse failures."
        );
        describe_counter!("pipeline_inserted_total", "Records inserted by the upsert engine.");
        describe_counter!("pipeline_updated_total", "Records updated in place by the upsert engine.");
        describe_counter!("pipeline_skipped_total", "Duplicate items skipped by the upsert engine.");
        describe_counter!("pipeline_pruned_total", "Records deleted by retention passes.");
        describe_counter!("pipeline_job_runs_total", "Completed job executions.");
        describe_gauge!("pipeline_job_last_run_ts", "Unix ts of the last completed run per job.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Outcome of driving one collector across its family's sources.
#[derive(Debug, Default)]
pub struct FamilyRun {
    pub items: Vec<CollectedItem>,
    /// Ids of sources that were fetched successfully (registry-backed only).
    pub fetched_source_ids: Vec<u64>,
    pub failed_sources: usize,
}

/// Drive `collector` over `sources` sequentially. A failure on one source
/// is logged and counted, never aborts the rest. The inter-source delay is
/// part of the contract: it keeps the pipeline polite to upstream hosts.
pub async fn collect_family(
    collector: &dyn Collector,
    sources: &[Source],
    delay: Duration,
) -> FamilyRun {
    ensure_metrics_described();
    let mut run = FamilyRun::default();
    for (i, source) in sources.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match collector.collect(source).await {
            Ok(items) => {
                counter!("pipeline_items_collected_total").increment(items.len() as u64);
                run.items.extend(items);
                run.fetched_source_ids.push(source.id);
            }
            Err(e) => {
                warn!(
                    family = collector.family(),
                    source = %source.name,
                    error = ?e,
                    "source collection failed"
                );
                counter!("pipeline_source_errors_total").increment(1);
                run.failed_sources += 1;
            }
        }
    }
    run
}

/// Decode entities, strip tags, collapse whitespace.
pub fn strip_html(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&decoded, " ").to_string();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// First two substantial sentences of the body, with a trailing ellipsis
/// when the text continues past them.
pub fn make_excerpt(body: &str) -> String {
    let clean = strip_html(body);
    let sentences: Vec<&str> = clean
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > 20)
        .collect();
    let mut excerpt = sentences.iter().take(2).copied().collect::<Vec<_>>().join(". ");
    if sentences.len() > 2 {
        excerpt.push_str("...");
    }
    excerpt
}

/// Estimated reading time at 200 words per minute, never below one minute.
pub fn read_minutes(body: &str) -> u32 {
    let words = strip_html(body).split_whitespace().count();
    (words as u32).div_ceil(200).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;

    use crate::store::NewMetric;

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let s = "<p>Solar&nbsp;power   is <b>growing</b></p>";
        assert_eq!(strip_html(s), "Solar power is growing");
    }

    #[test]
    fn excerpt_takes_two_sentences_and_marks_continuation() {
        let body = "Renewable capacity grew again this quarter. \
                    Wind additions led the increase across Europe. \
                    Analysts expect the trend to continue next year.";
        let ex = make_excerpt(body);
        assert!(ex.starts_with("Renewable capacity grew again this quarter"));
        assert!(ex.ends_with("..."));
    }

    #[test]
    fn read_minutes_has_a_floor_of_one() {
        assert_eq!(read_minutes("short text"), 1);
        let long = "word ".repeat(450);
        assert_eq!(read_minutes(&long), 3);
    }

    struct FlakyCollector;

    #[async_trait::async_trait]
    impl Collector for FlakyCollector {
        fn family(&self) -> &'static str {
            "flaky"
        }
        async fn collect(&self, source: &Source) -> anyhow::Result<Vec<CollectedItem>> {
            if source.name == "B" {
                return Err(anyhow!("connection reset"));
            }
            Ok(vec![CollectedItem::Metric(NewMetric {
                metric_type: "test".into(),
                value: 1.0,
                unit: "x".into(),
                region: source.name.clone(),
                source: "test".into(),
                recorded_at: Utc::now(),
            })])
        }
    }

    fn src(id: u64, name: &str) -> Source {
        Source {
            id,
            name: name.into(),
            url: format!("https://{name}.example/rss"),
            category: "General".into(),
            active: true,
            last_fetched: None,
        }
    }

    #[tokio::test]
    async fn one_bad_source_does_not_stop_the_family() {
        let sources = vec![src(1, "A"), src(2, "B"), src(3, "C")];
        let run = collect_family(&FlakyCollector, &sources, Duration::ZERO).await;
        assert_eq!(run.items.len(), 2);
        assert_eq!(run.failed_sources, 1);
        assert_eq!(run.fetched_source_ids, vec![1, 3]);
    }
}
