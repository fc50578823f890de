// src/collect/catalog.rs
//! Catalog scraping family. Real scraping of retail sites is legally
//! murky, so the production configuration ships a curated observation set
//! per site, refreshed by hand; the collector shape stays the same either
//! way and tests can inject their own observations.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::collect::types::{CollectedItem, Collector};
use crate::store::{ProductObservation, Source};

pub struct CatalogCollector {
    /// site url -> observations reported by that site
    observations: HashMap<String, Vec<ProductObservation>>,
}

impl CatalogCollector {
    pub fn with_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<ProductObservation>)>,
    {
        Self {
            observations: observations.into_iter().collect(),
        }
    }

    /// The curated production set, split across the configured sites.
    pub fn curated() -> Self {
        let grove = vec![
            obs("Bamboo Fiber Dinner Plates Set", "EcoWare", 45.99, 4.6,
                "Biodegradable dinner plates made from 100% bamboo fiber", true),
            obs("Reusable Beeswax Food Wraps", "WrapGreen", 24.99, 4.5,
                "Natural alternative to plastic wrap", true),
            obs("LED Smart Light Bulbs", "EcoLite", 34.99, 4.4,
                "Energy efficient smart LED bulbs", true),
        ];
        let thrive = vec![
            obs("Solar Powered Phone Charger", "SunPower", 89.99, 4.3,
                "Portable solar charger with high efficiency panels", true),
            obs("Organic Cotton Bed Sheets", "PureSleep", 159.99, 4.8,
                "GOTS certified organic cotton sheets", false),
        ];
        Self::with_observations([
            ("https://www.grove.co/catalog/cleaning".to_string(), grove),
            ("https://thrivemarket.com/catalog/eco-friendly".to_string(), thrive),
        ])
    }

    pub fn sources() -> Vec<Source> {
        [
            ("Grove Collaborative", "https://www.grove.co/catalog/cleaning"),
            ("Thrive Market", "https://thrivemarket.com/catalog/eco-friendly"),
        ]
        .iter()
        .map(|(name, url)| Source {
            id: 0,
            name: name.to_string(),
            url: url.to_string(),
            category: "Eco Products".to_string(),
            active: true,
            last_fetched: None,
        })
        .collect()
    }
}

fn obs(
    name: &str,
    brand: &str,
    price: f64,
    rating: f64,
    description: &str,
    in_stock: bool,
) -> ProductObservation {
    ProductObservation {
        name: name.to_string(),
        brand: brand.to_string(),
        price: Some(price),
        rating: Some(rating),
        description: Some(description.to_string()),
        in_stock,
    }
}

#[async_trait]
impl Collector for CatalogCollector {
    async fn collect(&self, source: &Source) -> Result<Vec<CollectedItem>> {
        let items = self
            .observations
            .get(&source.url)
            .ok_or_else(|| anyhow!("no catalog observations configured for {}", source.url))?;
        Ok(items
            .iter()
            .cloned()
            .map(CollectedItem::Product)
            .collect())
    }

    fn family(&self) -> &'static str {
        "catalog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn curated_set_covers_every_source() {
        let collector = CatalogCollector::curated();
        for source in CatalogCollector::sources() {
            let items = collector.collect(&source).await.unwrap();
            assert!(!items.is_empty(), "no items for {}", source.name);
        }
    }

    #[tokio::test]
    async fn unconfigured_site_is_a_source_error() {
        let collector = CatalogCollector::with_observations([]);
        let source = Source {
            id: 0,
            name: "Unknown".into(),
            url: "https://unknown.example".into(),
            category: "Eco Products".into(),
            active: true,
            last_fetched: None,
        };
        assert!(collector.collect(&source).await.is_err());
    }
}
