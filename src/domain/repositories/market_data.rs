//! Quote Provider Trait
//!
//! Common interface for market data sources. The core treats a missing quote
//! as "keep last known price", never as zero; providers therefore return
//! `Option<Quote>` per symbol and only error on transport-level failures.

use crate::domain::errors::QuoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type QuoteResult<T> = Result<T, QuoteError>;

/// A single market quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
}

/// Market data collaborator seam.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the latest quote for one symbol. `Ok(None)` means the provider
    /// has no data for the symbol right now.
    async fn get_quote(&self, symbol: &str) -> QuoteResult<Option<Quote>>;

    /// Fetch quotes for several symbols. Symbols without data are absent from
    /// the result; a transport failure fails the whole batch.
    async fn get_quotes(&self, symbols: &[String]) -> QuoteResult<Vec<(String, Quote)>> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(quote) = self.get_quote(symbol).await? {
                quotes.push((symbol.clone(), quote));
            }
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedQuotes {
        quotes: HashMap<String, Quote>,
    }

    #[async_trait]
    impl QuoteProvider for FixedQuotes {
        async fn get_quote(&self, symbol: &str) -> QuoteResult<Option<Quote>> {
            Ok(self.quotes.get(symbol).cloned())
        }
    }

    #[tokio::test]
    async fn test_default_batch_skips_missing_symbols() {
        let mut quotes = HashMap::new();
        quotes.insert(
            "AAPL".to_string(),
            Quote {
                price: 150.0,
                change: 1.0,
                change_percent: 0.67,
                currency: "EUR".to_string(),
            },
        );
        let provider = FixedQuotes { quotes };

        let result = provider
            .get_quotes(&["AAPL".to_string(), "MISSING".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "AAPL");
    }
}
