use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use sqlx::{postgres::PgQueryResult, PgPool};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
/// 52 週高低價（`stock_highlow`），每檔股票最多一筆
pub struct StockHighLow {
    pub stock_name: String,
    pub high_val52wk: Decimal,
    pub low_val52wk: Decimal,
}

impl StockHighLow {
    pub fn new(stock_name: String, high_val52wk: Decimal, low_val52wk: Decimal) -> Self {
        StockHighLow {
            stock_name,
            high_val52wk,
            low_val52wk,
        }
    }

    /// 以單一 upsert 取代舊資料，最後寫入的為準。
    ///
    /// # Errors
    /// 當 transaction 或 SQL 執行失敗時回傳錯誤。
    pub async fn upsert(&self, pool: &PgPool) -> Result<PgQueryResult> {
        let mut tx = pool.begin().await?;

        match sqlx::query(
            r#"
INSERT INTO stock_highlow (stock_name, high_val52wk, low_val52wk)
VALUES ($1, $2, $3)
ON CONFLICT (stock_name) DO UPDATE SET
    high_val52wk = EXCLUDED.high_val52wk,
    low_val52wk = EXCLUDED.low_val52wk;
"#,
        )
        .bind(&self.stock_name)
        .bind(self.high_val52wk)
        .bind(self.low_val52wk)
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
                    "Failed to upsert stock_highlow({}) because: {:?}",
                    self.stock_name,
                    why
                ))
            }
        }
    }

    pub async fn fetch_by_stock_name(pool: &PgPool, stock_name: &str) -> Result<Vec<StockHighLow>> {
        Ok(sqlx::query_as::<_, StockHighLow>(
            "SELECT stock_name, high_val52wk, low_val52wk FROM stock_highlow WHERE stock_name = $1;",
        )
        .bind(stock_name)
        .fetch_all(pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{config::App, database::PostgresSQL};

    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_upsert_keeps_one_row() {
        dotenv::dotenv().ok();
        let db = PostgresSQL::new(&App::get().unwrap()).unwrap();

        StockHighLow::new("ZZTEST".to_string(), dec!(190.0), dec!(120.0))
            .upsert(db.pool())
            .await
            .unwrap();
        StockHighLow::new("ZZTEST".to_string(), dec!(195.0), dec!(118.0))
            .upsert(db.pool())
            .await
            .unwrap();

        let rows = StockHighLow::fetch_by_stock_name(db.pool(), "ZZTEST").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].high_val52wk, dec!(195.0));
        assert_eq!(rows[0].low_val52wk, dec!(118.0));

        let _ = sqlx::query("DELETE FROM stock_highlow WHERE stock_name = $1;")
            .bind("ZZTEST")
            .execute(db.pool())
            .await;
    }
}
