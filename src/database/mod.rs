use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config;

pub mod table;

/// PostgreSQL 連線池封裝。
///
/// 所有輪詢共用同一個連線池，連線數至少要等於同時執行的類別數。
#[derive(Clone)]
pub struct PostgresSQL {
    /// SQLx PostgreSQL 連線池實例。
    pub pool: PgPool,
}

impl PostgresSQL {
    /// 建立 PostgreSQL 連線池，實際連線在第一次使用時才建立。
    ///
    /// # Errors
    /// 當連線字串無法解析時回傳錯誤。
    pub fn new(settings: &config::App) -> Result<PostgresSQL> {
        let database_url = settings.database_url();
        let db = PgPoolOptions::new()
            .max_lifetime(Some(Duration::from_secs(1800))) // 30 分鐘
            .max_connections(settings.postgresql.max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600))) // 10 分鐘
            .connect_lazy(&database_url)
            .with_context(|| {
                format!(
                    "wrong database URL postgres://{}@{}:{}/{}",
                    settings.postgresql.user,
                    settings.postgresql.host,
                    settings.postgresql.port,
                    settings.postgresql.db
                )
            })?;

        Ok(Self { pool: db })
    }

    /// 取得連線池參考。
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 啟動時確認資料庫可以連線
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .context("Failed to ping PostgreSQL")?;

        Ok(())
    }
}
