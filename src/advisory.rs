//! Client for the external fair-price advisory service
//!
//! The service is a black box reached over HTTP:
//! - `POST /predict` with `{seller_price, buyer_price}` returns a fair price
//!   and a suggestion
//! - `GET /price-history` returns recent market prices plus a short forecast
//!
//! Every call is a single attempt bounded by the configured timeout.

use crate::error::{HubError, Result};
use crate::types::PricePair;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on one advisory exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct PredictRequest {
    seller_price: f64,
    buyer_price: f64,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    seller_price: Option<f64>,
    #[serde(default)]
    buyer_price: Option<f64>,
    fair_price: f64,
    suggestion: String,
}

/// Fair-price suggestion for one completed round
#[derive(Clone, Debug, PartialEq)]
pub struct Advice {
    pub seller_price: f64,
    pub buyer_price: f64,
    pub fair_price: f64,
    pub suggestion: String,
}

/// One dated market price
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub day: String,
    pub price: f64,
}

/// Recent prices and the service's forecast
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub history: Vec<PricePoint>,
    #[serde(default)]
    pub predictions: Vec<PricePoint>,
}

/// HTTP client for the advisory service
#[derive(Clone, Debug)]
pub struct AdvisoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl AdvisoryClient {
    /// Create a client for the service rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Configuration(format!("advisory client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service for a fair price between both sides' bids
    pub async fn evaluate(&self, prices: PricePair) -> Result<Advice> {
        let url = format!("{}/predict", self.base_url);
        let request = PredictRequest {
            seller_price: prices.seller_price,
            buyer_price: prices.buyer_price,
        };

        tracing::debug!(
            seller = prices.seller_price,
            buyer = prices.buyer_price,
            "Requesting fair price from {}",
            url
        );

        let response = self.client.post(&url).json(&request).send().await?;
        let response = check_status(response).await?;

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| HubError::Advisory(format!("malformed predict response: {}", e)))?;

        if !body.fair_price.is_finite() {
            return Err(HubError::Advisory(format!(
                "fair price is not a number: {}",
                body.fair_price
            )));
        }

        Ok(Advice {
            seller_price: body.seller_price.unwrap_or(prices.seller_price),
            buyer_price: body.buyer_price.unwrap_or(prices.buyer_price),
            fair_price: body.fair_price,
            suggestion: body.suggestion,
        })
    }

    /// Fetch the price chart data the service publishes
    pub async fn price_history(&self) -> Result<PriceHistory> {
        let url = format!("{}/price-history", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| HubError::Advisory(format!("malformed price history: {}", e)))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(HubError::Advisory(format!(
        "service returned {}: {}",
        status,
        body.chars().take(200).collect::<String>()
    )))
}
