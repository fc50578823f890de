// src/collect/types.rs
use anyhow::Result;

use crate::store::{NewArticle, NewMetric, ProductObservation, Source};

/// One item produced by a collector, not yet persisted. Everything crosses
/// into the upsert engine in this shape regardless of source family.
#[derive(Debug, Clone)]
pub enum CollectedItem {
    Article(NewArticle),
    Metric(NewMetric),
    Product(ProductObservation),
}

/// Uniform contract for one external source family. `collect` fails only
/// for unrecoverable per-source errors (network failure, malformed feed);
/// the caller isolates those per source and keeps the loop going.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    fn family(&self) -> &'static str;
    async fn collect(&self, source: &Source) -> Result<Vec<CollectedItem>>;
}
