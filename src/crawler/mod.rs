use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    declare::{Category, FetchResult, HighLow},
    error::FetchError,
};

/// IEX Trading REST API
pub mod iex;
/// 失敗重試
pub mod retry;

/// 行情資料來源。
///
/// 每個方法對單一股票發出一次請求，失敗直接回傳錯誤，重試交給 [`retry`]。
#[async_trait]
pub trait MarketData: Send + Sync {
    /// 取得最新成交價
    async fn fetch_price(&self, symbol: &str) -> Result<Decimal, FetchError>;
    /// 取得 52 週最高、最低價
    async fn fetch_high_low(&self, symbol: &str) -> Result<HighLow, FetchError>;
    /// 取得公司 logo 網址
    async fn fetch_logo_url(&self, symbol: &str) -> Result<String, FetchError>;

    /// 依類別取得資料
    async fn fetch(&self, category: Category, symbol: &str) -> Result<FetchResult, FetchError> {
        Ok(match category {
            Category::Price => FetchResult::Price(self.fetch_price(symbol).await?),
            Category::HighLow => FetchResult::HighLow(self.fetch_high_low(symbol).await?),
            Category::LogoUrl => FetchResult::LogoUrl(self.fetch_logo_url(symbol).await?),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use hashbrown::HashMap;
    use rust_decimal_macros::dec;

    use super::*;

    /// 測試用的資料來源：每個代號先失敗 `failures` 次後才回傳固定的資料
    #[derive(Default)]
    pub(crate) struct FakeMarket {
        pub prices: HashMap<String, Decimal>,
        pub high_lows: HashMap<String, HighLow>,
        pub logos: HashMap<String, String>,
        pub failures: HashMap<String, usize>,
        pub attempts: std::sync::Mutex<HashMap<String, usize>>,
    }

    impl FakeMarket {
        pub(crate) fn with_prices(prices: &[(&str, Decimal)]) -> Self {
            FakeMarket {
                prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
                ..Default::default()
            }
        }

        pub(crate) fn attempts_of(&self, symbol: &str) -> usize {
            self.attempts
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .unwrap_or_default()
        }

        fn attempt(&self, symbol: &str) -> Result<(), FetchError> {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(symbol.to_string()).or_insert(0);
            *n += 1;

            let failures = self.failures.get(symbol).copied().unwrap_or_default();
            if *n <= failures {
                return Err(FetchError::Parse {
                    url: format!("fake://{}", symbol),
                    reason: format!("attempt {} fails", n),
                });
            }

            Ok(())
        }

        fn missing(symbol: &str, field: &'static str) -> FetchError {
            FetchError::MissingField {
                url: format!("fake://{}", symbol),
                field,
            }
        }
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn fetch_price(&self, symbol: &str) -> Result<Decimal, FetchError> {
            self.attempt(symbol)?;
            self.prices
                .get(symbol)
                .copied()
                .ok_or_else(|| Self::missing(symbol, "price"))
        }

        async fn fetch_high_low(&self, symbol: &str) -> Result<HighLow, FetchError> {
            self.attempt(symbol)?;
            self.high_lows
                .get(symbol)
                .copied()
                .ok_or_else(|| Self::missing(symbol, "week52High"))
        }

        async fn fetch_logo_url(&self, symbol: &str) -> Result<String, FetchError> {
            self.attempt(symbol)?;
            self.logos
                .get(symbol)
                .cloned()
                .ok_or_else(|| Self::missing(symbol, "url"))
        }
    }

    #[tokio::test]
    async fn test_fetch_dispatches_by_category() {
        let mut market = FakeMarket::with_prices(&[("GE", dec!(142.5))]);
        market.high_lows.insert(
            "GE".to_string(),
            HighLow {
                high: dec!(190),
                low: dec!(120),
            },
        );
        market
            .logos
            .insert("GE".to_string(), "https://logo/ge.png".to_string());

        assert_eq!(
            market.fetch(Category::Price, "GE").await.unwrap(),
            FetchResult::Price(dec!(142.5))
        );
        assert_eq!(
            market.fetch(Category::HighLow, "GE").await.unwrap().category(),
            Category::HighLow
        );
        assert_eq!(
            market.fetch(Category::LogoUrl, "GE").await.unwrap(),
            FetchResult::LogoUrl("https://logo/ge.png".to_string())
        );
        assert!(market.fetch(Category::Price, "AAPL").await.is_err());
    }
}
