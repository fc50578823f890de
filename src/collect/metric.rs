// src/collect/metric.rs
//! Environmental metric readings. Most series are simulated around their
//! published baselines (the upstream agencies have no free realtime APIs);
//! city temperatures come from a real weather API when a key is configured
//! and degrade to a logged no-op when it is not.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::collect::types::{CollectedItem, Collector};
use crate::store::{NewMetric, Source};

const WEATHER_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const CITIES: &[(&str, f64, f64)] = &[
    ("New York", 40.7128, -74.0060),
    ("London", 51.5074, -0.1278),
    ("Tokyo", 35.6762, 139.6503),
    ("Sydney", -33.8688, 151.2093),
    ("São Paulo", -23.5505, -46.6333),
];

const RENEWABLE_BASELINES: &[(&str, f64)] = &[
    ("global", 32.8),
    ("north_america", 28.0),
    ("europe", 42.0),
    ("asia", 31.0),
    ("africa", 24.0),
];

pub struct MetricCollector {
    weather_api_key: Option<String>,
    client: reqwest::Client,
}

impl MetricCollector {
    pub fn new(weather_api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building weather http client")?;
        Ok(Self {
            weather_api_key,
            client,
        })
    }

    pub fn from_env(timeout: Duration) -> Result<Self> {
        Self::new(std::env::var(WEATHER_KEY_ENV).ok(), timeout)
    }

    /// The metric family's source descriptors. These live outside the feed
    /// registry; ids are zero because nothing writes back to them.
    pub fn sources() -> Vec<Source> {
        [
            ("NASA GISS", "sim://global-temperature", "Climate Science"),
            ("Mauna Loa Observatory", "sim://co2", "Climate Science"),
            (
                "IEA Renewable Energy Statistics",
                "sim://renewable-share",
                "Renewable Energy",
            ),
            ("NOAA Sea Level Trends", "sim://sea-level", "Oceans"),
            ("NSIDC Sea Ice Index", "sim://arctic-ice", "Cryosphere"),
            ("OpenWeatherMap", "weather://cities", "Weather"),
        ]
        .iter()
        .map(|(name, url, category)| Source {
            id: 0,
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            active: true,
            last_fetched: None,
        })
        .collect()
    }

    fn jittered(base: f64, spread: f64) -> f64 {
        base + rand::rng().random_range(-spread..spread)
    }

    fn reading(
        metric_type: &str,
        value: f64,
        unit: &str,
        region: &str,
        source: &str,
        recorded_at: DateTime<Utc>,
    ) -> CollectedItem {
        CollectedItem::Metric(NewMetric {
            metric_type: metric_type.to_string(),
            value,
            unit: unit.to_string(),
            region: region.to_string(),
            source: source.to_string(),
            recorded_at,
        })
    }

    async fn collect_city_temperatures(
        &self,
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<CollectedItem>> {
        let Some(key) = &self.weather_api_key else {
            // Missing credentials degrade this family member to a no-op.
            warn!("{WEATHER_KEY_ENV} not set, skipping city temperature readings");
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (i, (city, lat, lon)) in CITIES.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            let url = format!(
                "https://api.openweathermap.org/data/2.5/weather?lat={lat}&lon={lon}&appid={key}&units=metric"
            );
            match self.fetch_city(&url).await {
                Ok(temp) => out.push(Self::reading(
                    "city_temperature",
                    temp,
                    "°C",
                    city,
                    "OpenWeatherMap",
                    recorded_at,
                )),
                Err(e) => {
                    warn!(city, error = ?e, "city weather fetch failed");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_city(&self, url: &str) -> Result<f64> {
        #[derive(Deserialize)]
        struct WeatherResp {
            main: WeatherMain,
        }
        #[derive(Deserialize)]
        struct WeatherMain {
            temp: f64,
        }
        let resp: WeatherResp = self
            .client
            .get(url)
            .send()
            .await
            .context("weather request")?
            .error_for_status()
            .context("weather non-2xx")?
            .json()
            .await
            .context("weather json")?;
        Ok(resp.main.temp)
    }
}

#[async_trait]
impl Collector for MetricCollector {
    async fn collect(&self, source: &Source) -> Result<Vec<CollectedItem>> {
        // One timestamp per collection pass: repeated collection must never
        // back-date readings.
        let recorded_at = Utc::now();

        let items = match source.url.as_str() {
            "sim://global-temperature" => vec![Self::reading(
                "global_temperature_anomaly",
                Self::jittered(1.28, 0.05),
                "°C",
                "global",
                "NASA GISS",
                recorded_at,
            )],
            "sim://co2" => vec![Self::reading(
                "co2_concentration",
                Self::jittered(421.44, 1.0),
                "ppm",
                "global",
                "Mauna Loa Observatory",
                recorded_at,
            )],
            "sim://renewable-share" => RENEWABLE_BASELINES
                .iter()
                .map(|(region, base)| {
                    Self::reading(
                        "renewable_energy_share",
                        Self::jittered(*base, 1.0),
                        "%",
                        region,
                        "IEA Renewable Energy Statistics",
                        recorded_at,
                    )
                })
                .collect(),
            "sim://sea-level" => vec![Self::reading(
                "sea_level_rise",
                Self::jittered(21.0, 0.5),
                "cm",
                "global",
                "NOAA Sea Level Trends",
                recorded_at,
            )],
            "sim://arctic-ice" => vec![Self::reading(
                "arctic_sea_ice_extent",
                Self::jittered(4.92, 0.25),
                "million_km2",
                "arctic",
                "NSIDC Sea Ice Index",
                recorded_at,
            )],
            "weather://cities" => self.collect_city_temperatures(recorded_at).await?,
            other => {
                warn!(url = other, "unknown metric source, ignoring");
                Vec::new()
            }
        };
        Ok(items)
    }

    fn family(&self) -> &'static str {
        "metrics"
    }
}
