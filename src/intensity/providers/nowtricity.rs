use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::intensity::types::{IntensitySource, TimeWindow};
use crate::region::RegionCode;

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    intensity: Option<f64>,
}

// Tolerant payload shapes: bare list, or a list wrapped under `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    List(Vec<Item>),
    Wrapped { data: Vec<Item> },
}

/// Extract the numeric intensity values from a response body.
/// Items without an `intensity` number are skipped.
pub fn parse_intensities(body: &str) -> Result<Vec<f64>> {
    let payload: Payload = serde_json::from_str(body).context("parsing intensity payload")?;
    let items = match payload {
        Payload::List(v) => v,
        Payload::Wrapped { data } => data,
    };
    Ok(items.into_iter().filter_map(|it| it.intensity).collect())
}

/// Nowtricity-style REST client: `GET {base}/carbon-intensity/{code}?start=..&end=..`.
pub struct NowtricityClient {
    base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl NowtricityClient {
    pub fn new(base: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("carbon-region-advisor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .context("building intensity http client")?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn url_for(&self, region: &RegionCode) -> String {
        format!("{}/carbon-intensity/{}", self.base, region)
    }
}

#[async_trait]
impl IntensitySource for NowtricityClient {
    async fn fetch_window(&self, region: &RegionCode, window: &TimeWindow) -> Result<Vec<f64>> {
        let t0 = std::time::Instant::now();
        let mut req = self
            .client
            .get(self.url_for(region))
            .query(&[("start", window.start_param()), ("end", window.end_param())]);
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                counter!("intensity_source_errors_total", "region" => region.to_string())
                    .increment(1);
                return Err(e).context("intensity http get()");
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("intensity_source_errors_total", "region" => region.to_string()).increment(1);
            bail!("intensity source returned {status} for {region}");
        }

        let body = resp.text().await.context("intensity http .text()")?;
        let values = parse_intensities(&body)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("intensity_fetch_ms").record(ms);
        Ok(values)
    }

    fn name(&self) -> &'static str {
        "nowtricity"
    }
}
