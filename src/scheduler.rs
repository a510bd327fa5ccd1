use std::{sync::Arc, time::Duration};

use scopeguard::defer;
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    collector::{self, Snapshot},
    config,
    crawler::{retry::RetryPolicy, MarketData},
    declare::{Category, SymbolSet},
    logging,
    sink::Sink,
};

/// 所有輪詢共用的資源，啟動時建立一次
pub struct Context {
    pub symbols: SymbolSet,
    pub source: Arc<dyn MarketData>,
    pub sink: Arc<dyn Sink>,
    pub retry: RetryPolicy,
}

/// 單一類別的輪詢：採集 → 寫入 → 休息，直到收到取消
#[derive(Debug, Clone, Copy)]
pub struct PollLoop {
    pub category: Category,
    pub interval: Duration,
}

impl PollLoop {
    pub fn new(category: Category, interval: Duration) -> Self {
        PollLoop { category, interval }
    }

    /// 執行到取消為止，回傳完成的輪數（休息結束才算完成一輪）。
    pub async fn run(self, ctx: Arc<Context>, cancel: CancellationToken) -> u64 {
        let category = self.category;
        logging::info_file_async(format!(
            "{} 輪詢開始，每 {:?} 一次，股票:{}",
            category, self.interval, ctx.symbols
        ));
        defer! {
            logging::info_file_async(format!("{} 輪詢結束", category));
        }

        let mut ticks: u64 = 0;

        loop {
            match collector::collect_all(
                Arc::clone(&ctx.source),
                category,
                &ctx.symbols,
                ctx.retry,
                &cancel,
            )
            .await
            {
                Ok(snapshot) => self.persist(&ctx, snapshot).await,
                Err(why) if why.is_cancelled() => break,
                Err(why) => {
                    logging::error_file_async(format!("Failed to collect {} because {}", category, why));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(self.interval) => ticks += 1,
            }
        }

        ticks
    }

    /// 寫入失敗只記錄，不中斷輪詢
    async fn persist(&self, ctx: &Context, snapshot: Snapshot) {
        if snapshot.is_empty() {
            logging::warn_file_async(format!(
                "{} 本輪沒有取得任何資料，失敗:{:?}",
                self.category, snapshot.failed
            ));
            return;
        }

        if !snapshot.is_complete() {
            logging::warn_file_async(format!(
                "{} 本輪略過 {:?}，其餘照常寫入",
                self.category, snapshot.failed
            ));
        }

        match ctx.sink.persist(&snapshot).await {
            Ok(written) => {
                logging::debug_file_async(format!(
                    "{} 寫入 {} 筆 @ {}",
                    self.category,
                    written,
                    snapshot.captured_at.format("%F %X")
                ));
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to persist {}, skip this tick because {:?}",
                    self.category, why
                ));
            }
        }
    }
}

/// 每個啟用的類別各開一個 task 執行輪詢，彼此互不等待。
pub fn start(
    ctx: Arc<Context>,
    streamer: &config::Streamer,
    cancel: &CancellationToken,
) -> Vec<(Category, JoinHandle<u64>)> {
    Category::iterator()
        .filter(|category| streamer.schedule(*category).enabled)
        .map(|category| {
            let poll = PollLoop::new(category, streamer.schedule(category).interval());
            let handle = tokio::spawn(poll.run(Arc::clone(&ctx), cancel.clone()));
            (category, handle)
        })
        .collect()
}
