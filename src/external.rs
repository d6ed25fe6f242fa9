use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::error::{AprError, Result};
use crate::structs::Observation;

pub const BINANCE_EARN_URL: &str =
    "https://www.binance.com/bapi/earn/v2/friendly/finance-earn/calculator/product/list";

/// Differences below this are treated as no bonus.
const MIN_STEP: f64 = 0.000_000_01;

/*
{
  "code": "000000",
  "data": {
    "savingFlexibleProduct": [
      { "asset": "USDT", "apy": "0.05120000", "marketApr": "0.03920000", ... }
    ],
    ...
  },
  "success": true
}
*/
#[derive(Deserialize, Debug)]
pub struct ProductListResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ProductList>,
}

#[derive(Deserialize, Debug)]
pub struct ProductList {
    #[serde(rename = "savingFlexibleProduct", default)]
    saving_flexible_product: Vec<FlexibleProduct>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FlexibleProduct {
    asset: String,
    #[serde(deserialize_with = "deserialize_rate")]
    apy: f64,
    #[serde(rename = "marketApr", deserialize_with = "deserialize_rate")]
    market_apr: f64,
}

impl FlexibleProduct {
    pub fn into_observation(self, time: DateTime<Utc>) -> Observation {
        let bonus = bonus(self.apy, self.market_apr);
        Observation::new(time, self.asset, self.apy, bonus)
    }
}

/// The API sends rates as decimal strings, occasionally as plain numbers.
fn deserialize_rate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rate {
        Text(String),
        Number(f64),
    }

    match Rate::deserialize(deserializer)? {
        Rate::Number(n) => Ok(n),
        Rate::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

/// Promotional part of the APY, rounded to three decimals.
pub fn bonus(apy: f64, market_apr: f64) -> f64 {
    let diff = apy - market_apr;
    if diff.abs() >= MIN_STEP {
        (diff * 1000.0).round() / 1000.0
    } else {
        0.0
    }
}

/// Client for the Binance Earn flexible-product calculator.
#[derive(Clone, Debug)]
pub struct BinanceEarn {
    client: reqwest::Client,
    url: String,
}

impl BinanceEarn {
    pub fn new() -> Self {
        Self::with_url(BINANCE_EARN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn flexible_product(&self, asset: &str) -> Result<FlexibleProduct> {
        let response: ProductListResponse = self
            .client
            .get(&self.url)
            .query(&[("asset", asset), ("type", "Flexible")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("{} response: {:?}", asset, response);
        if !response.success {
            return Err(AprError::RemoteApi {
                asset: asset.to_string(),
                reason: response.message.unwrap_or_else(|| "success=false".to_string()),
            });
        }
        response
            .data
            .and_then(|d| d.saving_flexible_product.into_iter().next())
            .ok_or_else(|| AprError::RemoteApi {
                asset: asset.to_string(),
                reason: "no flexible product listed".to_string(),
            })
    }

    /// One observation per asset stamped with `time`, highest APY first.
    pub async fn fetch(&self, assets: &[String], time: DateTime<Utc>) -> Result<Vec<Observation>> {
        let mut results = Vec::with_capacity(assets.len());
        for asset in assets {
            let product = self.flexible_product(asset).await?;
            results.push(product.into_observation(time));
        }
        results.sort_by(|a, b| b.apy.total_cmp(&a.apy));
        info!("fetched {} APR quotes", results.len());
        Ok(results)
    }
}

impl Default for BinanceEarn {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
pub fn test_response_gets_deserialized_properly() {
    let json_str = r#"
    {
        "code": "000000",
        "message": null,
        "data": {
            "savingFlexibleProduct": [
                {
                    "asset": "USDT",
                    "apy": "0.05120000",
                    "marketApr": "0.03920000",
                    "productId": "USDT001"
                }
            ]
        },
        "success": true
    }
    "#;
    let response: ProductListResponse = serde_json::from_str(json_str).unwrap();
    assert!(response.success);
    let mut list = response.data.unwrap();
    let product = list.saving_flexible_product.remove(0);
    assert_eq!(product.asset, "USDT");
    assert_eq!(product.apy, 0.0512);
    let t = crate::structs::parse_time("2024-01-01 00:00:00").unwrap();
    let obs = product.into_observation(t);
    assert_eq!(obs.bonus, 0.012);
}

#[test]
pub fn test_numeric_rates_are_accepted() {
    let product: FlexibleProduct =
        serde_json::from_str(r#"{"asset": "DAI", "apy": 0.03, "marketApr": 0.03}"#).unwrap();
    assert_eq!(product.market_apr, 0.03);
}

#[test]
pub fn test_bonus_rounding_and_threshold() {
    assert_eq!(bonus(0.05, 0.05), 0.0);
    assert_eq!(bonus(0.05, 0.05 - 0.000_000_001), 0.0);
    assert_eq!(bonus(0.0512, 0.0392), 0.012);
    assert_eq!(bonus(0.02, 0.0354), -0.015);
}
