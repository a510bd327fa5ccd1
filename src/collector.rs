use std::sync::Arc;

use chrono::{DateTime, Local};
use futures::future::join_all;
use hashbrown::HashMap;
use tokio::{sync::Mutex, task};
use tokio_util::sync::CancellationToken;

use crate::{
    crawler::{
        retry::{self, RetryPolicy},
        MarketData,
    },
    declare::{Category, FetchResult, SymbolSet},
    error::FetchError,
    logging,
};

/// 一輪採集的結果，所有資料共用同一個擷取時間
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub category: Category,
    pub captured_at: DateTime<Local>,
    pub entries: HashMap<String, FetchResult>,
    /// 重試用盡仍失敗而被略過的代號
    pub failed: Vec<String>,
}

impl Snapshot {
    pub fn new(category: Category, captured_at: DateTime<Local>) -> Self {
        Snapshot {
            category,
            captured_at,
            entries: HashMap::new(),
            failed: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 每個代號都有取到資料
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 每個代號各開一個 task 同時向遠端取資料，全部完成後組成 [`Snapshot`]。
///
/// 重試用盡的代號不會出現在 `entries`，而是記在 `failed`。
///
/// # Errors
/// 途中收到取消時回傳 [`FetchError::Cancelled`]，已取得的部分資料一併捨棄。
pub async fn collect_all(
    source: Arc<dyn MarketData>,
    category: Category,
    symbols: &SymbolSet,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Snapshot, FetchError> {
    let mut snapshot = Snapshot::new(category, Local::now());
    let results = Arc::new(Mutex::new(HashMap::with_capacity(symbols.len())));

    let tasks: Vec<_> = symbols
        .iter()
        .map(|symbol| {
            let source = Arc::clone(&source);
            let results = Arc::clone(&results);
            let symbol = symbol.clone();
            let cancel = cancel.clone();

            task::spawn(async move {
                match retry::fetch_with_retry(source.as_ref(), category, &symbol, policy, &cancel)
                    .await
                {
                    Ok(r) => {
                        results.lock().await.insert(symbol, r);
                        Ok(())
                    }
                    Err(why) => Err((symbol, why)),
                }
            })
        })
        .collect();

    let mut cancelled = false;

    for (symbol, joined) in symbols.iter().zip(join_all(tasks).await) {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err((_, why))) if why.is_cancelled() => cancelled = true,
            Ok(Err((symbol, why))) => {
                logging::error_file_async(format!(
                    "Failed to fetch {} of {} because {}",
                    category, symbol, why
                ));
                snapshot.failed.push(symbol);
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "The {} task of {} panicked because {:?}",
                    category, symbol, why
                ));
                snapshot.failed.push(symbol.clone());
            }
        }
    }

    if cancelled || cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    snapshot.entries = match Arc::try_unwrap(results) {
        Ok(m) => m.into_inner(),
        Err(shared) => shared.lock().await.clone(),
    };

    Ok(snapshot)
}
