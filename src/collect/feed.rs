// src/collect/feed.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::collect::types::{CollectedItem, Collector};
use crate::collect::strip_html;
use crate::store::{NewArticle, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

enum FetchMode {
    Http { client: reqwest::Client },
    /// Canned feed bodies keyed by source URL, for tests.
    Fixture(HashMap<String, String>),
}

/// Collects articles from syndicated feeds. Every kept entry carries its
/// canonical link as `source_key`; entries without a resolvable link are
/// discarded since they cannot be deduplicated safely.
pub struct FeedCollector {
    mode: FetchMode,
    entry_limit: usize,
}

impl FeedCollector {
    pub fn over_http(timeout: Duration, entry_limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: FetchMode::Http { client },
            entry_limit,
        })
    }

    pub fn from_fixtures<I>(fixtures: I, entry_limit: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            mode: FetchMode::Fixture(fixtures.into_iter().collect()),
            entry_limit,
        }
    }

    fn parse_feed(&self, source: &Source, body: &str) -> Result<Vec<CollectedItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(body);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing feed xml from {}", source.name))?;

        let collected_at = Utc::now();
        let mut out = Vec::new();
        for it in rss.channel.item.into_iter().take(self.entry_limit) {
            // No canonical link, no natural key: drop the entry.
            let Some(link) = it.link.filter(|l| !l.trim().is_empty()) else {
                continue;
            };

            let body_text = strip_html(it.description.as_deref().unwrap_or_default());
            out.push(CollectedItem::Article(NewArticle {
                title: it
                    .title
                    .map(|t| strip_html(&t))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Untitled".to_string()),
                body: body_text,
                category: source.category.clone(),
                author: it
                    .author
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| source.name.clone()),
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_rfc2822)
                    .unwrap_or(collected_at),
                source_name: source.name.clone(),
                source_key: link.trim().to_string(),
                tags: it.categories,
            }));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl Collector for FeedCollector {
    async fn collect(&self, source: &Source) -> Result<Vec<CollectedItem>> {
        let body = match &self.mode {
            FetchMode::Http { client } => client
                .get(&source.url)
                .send()
                .await
                .with_context(|| format!("fetching feed {}", source.url))?
                .error_for_status()
                .with_context(|| format!("feed {} returned error status", source.name))?
                .text()
                .await
                .context("reading feed body")?,
            FetchMode::Fixture(map) => map
                .get(&source.url)
                .cloned()
                .ok_or_else(|| anyhow!("no fixture for {}", source.url))?,
        };
        self.parse_feed(source, &body)
    }

    fn family(&self) -> &'static str {
        "feeds"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
