use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_decimal::Decimal;

use crate::{
    collector::Snapshot,
    database::{
        table::{
            stock_highlow::StockHighLow, stock_image_url::StockImageUrl, stock_price::StockPrice,
        },
        PostgresSQL,
    },
    declare::{FetchResult, HighLow},
};

/// 資料寫入端，三種類別各對應一張表
#[async_trait]
pub trait Sink: Send + Sync {
    /// 新增一筆成交價，重複的值也會新增
    async fn append_price_row(
        &self,
        timestamp: DateTime<Local>,
        symbol: &str,
        price: Decimal,
    ) -> Result<()>;

    /// 取代該股票的 52 週高低價，每檔最多一筆
    async fn replace_high_low(&self, symbol: &str, high: Decimal, low: Decimal) -> Result<()>;

    /// 取代該股票的 logo 網址，每檔最多一筆
    async fn replace_logo_url(&self, symbol: &str, url: &str) -> Result<()>;

    /// 將一輪的結果逐筆寫入，回傳寫入筆數。
    ///
    /// 遇到第一個錯誤就停止並回傳，剩下的留給下一輪。
    async fn persist(&self, snapshot: &Snapshot) -> Result<usize> {
        let mut written = 0;

        for (symbol, result) in snapshot.entries.iter() {
            if result.category() != snapshot.category {
                return Err(anyhow!(
                    "{} of {} does not belong to a {} snapshot",
                    result.category(),
                    symbol,
                    snapshot.category
                ));
            }

            let res = match result {
                FetchResult::Price(price) => {
                    self.append_price_row(snapshot.captured_at, symbol, *price)
                        .await
                }
                FetchResult::HighLow(HighLow { high, low }) => {
                    self.replace_high_low(symbol, *high, *low).await
                }
                FetchResult::LogoUrl(url) => self.replace_logo_url(symbol, url).await,
            };

            res.with_context(|| {
                format!(
                    "Failed to persist {} of {} into {} ({} of {} written)",
                    snapshot.category,
                    symbol,
                    snapshot.category.table(),
                    written,
                    snapshot.len()
                )
            })?;

            written += 1;
        }

        Ok(written)
    }
}

/// 寫入 PostgreSQL，所有輪詢共用同一個連線池
pub struct PostgresSink {
    db: PostgresSQL,
}

impl PostgresSink {
    pub fn new(db: PostgresSQL) -> Self {
        PostgresSink { db }
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn append_price_row(
        &self,
        timestamp: DateTime<Local>,
        symbol: &str,
        price: Decimal,
    ) -> Result<()> {
        StockPrice::new(timestamp, symbol.to_string(), price)
            .insert(self.db.pool())
            .await?;

        Ok(())
    }

    async fn replace_high_low(&self, symbol: &str, high: Decimal, low: Decimal) -> Result<()> {
        StockHighLow::new(symbol.to_string(), high, low)
            .upsert(self.db.pool())
            .await?;

        Ok(())
    }

    async fn replace_logo_url(&self, symbol: &str, url: &str) -> Result<()> {
        StockImageUrl::new(symbol.to_string(), url.to_string())
            .upsert(self.db.pool())
            .await?;

        Ok(())
    }
}
