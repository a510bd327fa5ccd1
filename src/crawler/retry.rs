use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config,
    crawler::MarketData,
    declare::{Category, FetchResult},
    error::FetchError,
    logging,
};

/// 單一股票請求失敗時的重試方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 含第一次在內的最多嘗試次數，0 代表一直重試到成功為止
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(settings: &config::Retry) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// 每次重試前的等待時間：base、2*base、4*base... 上限 max_delay，再乘上 jitter
    fn strategy(&self) -> impl Iterator<Item = Duration> + Send {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let retries = if self.is_unbounded() {
            usize::MAX
        } else {
            self.max_attempts - 1
        };

        ExponentialBackoff::from_millis(2)
            .factor((base_ms / 2).max(1))
            .max_delay(self.max_delay)
            .map(jitter)
            .take(retries)
    }
}

/// 取得單一股票的資料，失敗時依 `policy` 重試。
///
/// # Errors
/// * [`FetchError::Exhausted`]：用完嘗試次數仍失敗，帶著最後一次的錯誤
/// * [`FetchError::Cancelled`]：等待或請求途中收到取消
pub async fn fetch_with_retry(
    source: &dyn MarketData,
    category: Category,
    symbol: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<FetchResult, FetchError> {
    let attempts = AtomicUsize::new(0);
    let counter = &attempts;

    let action = move || async move {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        source.fetch(category, symbol).await.inspect_err(|why| {
            logging::warn_file_async(format!(
                "Attempt {} to fetch {} of {} failed because {}",
                attempt, category, symbol, why
            ));
        })
    };

    let retry = RetryIf::spawn(policy.strategy(), action, |why: &FetchError| {
        !why.is_cancelled()
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = retry => res.map_err(|last| {
            if last.is_cancelled() {
                return last;
            }

            FetchError::Exhausted {
                symbol: symbol.to_string(),
                category: category.to_string(),
                attempts: attempts.load(Ordering::SeqCst),
                last: Box::new(last),
            }
        }),
    }
}
