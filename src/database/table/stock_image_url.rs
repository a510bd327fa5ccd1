use anyhow::{anyhow, Result};
use sqlx::{postgres::PgQueryResult, PgPool};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
/// 公司 logo 網址（`stock_image_urls`），每檔股票最多一筆
pub struct StockImageUrl {
    pub stock_name: String,
    pub image_url: String,
}

impl StockImageUrl {
    pub fn new(stock_name: String, image_url: String) -> Self {
        StockImageUrl {
            stock_name,
            image_url,
        }
    }

    /// 以單一 upsert 取代舊網址。
    ///
    /// # Errors
    /// 當 transaction 或 SQL 執行失敗時回傳錯誤。
    pub async fn upsert(&self, pool: &PgPool) -> Result<PgQueryResult> {
        let mut tx = pool.begin().await?;

        match sqlx::query(
            r#"
INSERT INTO stock_image_urls (stock_name, image_url)
VALUES ($1, $2)
ON CONFLICT (stock_name) DO UPDATE SET image_url = EXCLUDED.image_url;
"#,
        )
        .bind(&self.stock_name)
        .bind(&self.image_url)
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
                    "Failed to upsert stock_image_urls({}) because: {:?}",
                    self.stock_name,
                    why
                ))
            }
        }
    }

    pub async fn fetch_by_stock_name(pool: &PgPool, stock_name: &str) -> Result<Vec<StockImageUrl>> {
        Ok(sqlx::query_as::<_, StockImageUrl>(
            "SELECT stock_name, image_url FROM stock_image_urls WHERE stock_name = $1;",
        )
        .bind(stock_name)
        .fetch_all(pool)
        .await?)
    }
}
