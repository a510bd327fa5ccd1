#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::{env, sync::Arc};

use anyhow::{anyhow, Context as _, Result};
use tokio_util::sync::CancellationToken;

use crate::{
    crawler::{iex::Iex, retry::RetryPolicy},
    database::PostgresSQL,
    scheduler::Context,
    sink::PostgresSink,
};

pub mod collector;
pub mod config;
pub mod crawler;
pub mod database;
pub mod declare;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod sink;
pub mod util;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if let Err(why) = run().await {
        logging::error_file_async(format!("StockStreamer 啟動失敗: {:?}", why));
        return Err(why);
    }

    Ok(())
}

async fn run() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    // 設定有誤就在開始輪詢前結束
    let settings = config::App::get().context("Config error")?;
    let symbols = settings.symbol_set()?;

    let iex = Iex::from_config(&settings.iex)?;
    let probed = iex
        .probe(&symbols[0])
        .await
        .with_context(|| format!("{} is unreachable", settings.iex.base_url))?;
    logging::info_file_async(format!("{} 目前報價:{}", symbols[0], probed));

    let db = PostgresSQL::new(&settings)?;
    db.ping().await?;

    let ctx = Arc::new(Context {
        symbols,
        source: Arc::new(iex),
        sink: Arc::new(PostgresSink::new(db)),
        retry: RetryPolicy::from_config(&settings.retry),
    });

    let cancel = CancellationToken::new();
    let handles = scheduler::start(ctx, &settings.streamer, &cancel);

    let msg = format!(
        "StockStreamer 已啟動\r\nRust OS/Arch: {}/{}\r\n股票:{}",
        env::consts::OS,
        env::consts::ARCH,
        settings.streamer.symbols.join(",")
    );
    logging::info_file_async(msg.clone());
    logging::info_console(msg);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    logging::info_console("收到結束訊號，停止所有輪詢".to_string());
    cancel.cancel();

    for (category, handle) in handles {
        match handle.await {
            Ok(ticks) => logging::info_file_async(format!("{} 共完成 {} 輪", category, ticks)),
            Err(why) => logging::error_file_async(format!("{} 輪詢異常結束: {:?}", category, why)),
        }
    }

    Ok(())
}
