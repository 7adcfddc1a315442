//! Yahoo Finance chart API quote client.

use crate::domain::errors::QuoteError;
use crate::domain::repositories::market_data::{Quote, QuoteProvider, QuoteResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_QUOTE_BASE: &str = "https://query1.finance.yahoo.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Chart API response, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    currency: Option<String>,
}

pub struct YahooQuoteClient {
    client: Client,
    base_url: String,
}

impl YahooQuoteClient {
    pub fn new(base_url: Option<&str>) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| QuoteError::RequestFailed(e.to_string()))?;
        Ok(YahooQuoteClient {
            client,
            base_url: base_url.unwrap_or(DEFAULT_QUOTE_BASE).trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteClient {
    async fn get_quote(&self, symbol: &str) -> QuoteResult<Option<Quote>> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(QuoteError::RequestFailed(format!(
                "quote endpoint returned {}",
                response.status()
            )));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::MalformedPayload(e.to_string()))?;

        if let Some(error) = body.chart.error {
            debug!(symbol, "quote lookup failed: {}", error.description);
            return Ok(None);
        }

        let meta = match body
            .chart
            .result
            .and_then(|mut results| results.pop())
            .map(|r| r.meta)
        {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let price = match meta.regular_market_price {
            Some(price) if price.is_finite() && price > 0.0 => price,
            _ => return Ok(None),
        };
        let previous_close = meta.chart_previous_close.unwrap_or(price);
        let change = price - previous_close;
        let change_percent = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Ok(Some(Quote {
            price,
            change,
            change_percent,
            currency: meta.currency.unwrap_or_else(|| "EUR".to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_payload_parsing() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 178.5,
                        "chartPreviousClose": 175.0,
                        "currency": "USD"
                    }
                }],
                "error": null
            }
        }"#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        let meta = parsed.chart.result.unwrap().pop().unwrap().meta;
        assert_eq!(meta.regular_market_price, Some(178.5));
        assert_eq!(meta.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_chart_error_payload_parsing() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        }"#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.chart.result.is_none());
        assert_eq!(parsed.chart.error.unwrap().description, "No data found");
    }
}
