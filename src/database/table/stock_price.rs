use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use sqlx::{postgres::PgQueryResult, PgPool};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
/// 成交價歷史資料列（`stock_prices`），同一檔股票每次輪詢都新增一筆
pub struct StockPrice {
    pub time: DateTime<Local>,
    pub stock_name: String,
    pub price: Decimal,
}

impl StockPrice {
    pub fn new(time: DateTime<Local>, stock_name: String, price: Decimal) -> Self {
        StockPrice {
            time,
            stock_name,
            price,
        }
    }

    /// 新增一筆成交價，不做任何去重。
    ///
    /// # Errors
    /// 當 transaction 或 SQL 執行失敗時回傳錯誤。
    pub async fn insert(&self, pool: &PgPool) -> Result<PgQueryResult> {
        let mut tx = pool.begin().await?;

        match sqlx::query(
            r#"
INSERT INTO stock_prices (time, stock_name, price)
VALUES ($1, $2, $3);
"#,
        )
        .bind(self.time)
        .bind(&self.stock_name)
        .bind(self.price)
        .execute(&mut *tx)
        .await
        {
            Ok(r) => {
                tx.commit().await?;
                Ok(r)
            }
            Err(why) => {
                tx.rollback().await?;
                Err(anyhow!(
                    "Failed to insert into stock_prices({}) because: {:?}",
                    self.stock_name,
                    why
                ))
            }
        }
    }

    /// 取得指定股票最近的成交價
    pub async fn fetch_latest(pool: &PgPool, stock_name: &str, limit: i64) -> Result<Vec<StockPrice>> {
        Ok(sqlx::query_as::<_, StockPrice>(
            r#"
SELECT time, stock_name, price
FROM stock_prices
WHERE stock_name = $1
ORDER BY time DESC
LIMIT $2;
"#,
        )
        .bind(stock_name)
        .bind(limit)
        .fetch_all(pool)
        .await?)
    }
}
