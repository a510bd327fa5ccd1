use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use config::{Config as config_config, File as config_file};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::declare::{Category, SymbolSet};

const CONFIG_PATH: &str = "app.json";

/// 原始版本追蹤的股票
const DEFAULT_SYMBOLS: &str = "GE,AMZN,GOOG,TSLA,AAPL,NFLX";
const DEFAULT_BASE_URL: &str = "https://api.iextrading.com/1.0/stock";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub iex: Iex,
    #[serde(default)]
    pub postgresql: PostgreSQL,
    #[serde(default)]
    pub streamer: Streamer,
    #[serde(default)]
    pub retry: Retry,
}

const IEX_BASE_URL: &str = "IEX_BASE_URL";
const IEX_CONNECT_TIMEOUT_SECS: &str = "IEX_CONNECT_TIMEOUT_SECS";
const IEX_TIMEOUT_SECS: &str = "IEX_TIMEOUT_SECS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Iex {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Iex {
    fn default() -> Self {
        Iex {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

const POSTGRESQL_HOST: &str = "POSTGRESQL_HOST";
const POSTGRESQL_PORT: &str = "POSTGRESQL_PORT";
const POSTGRESQL_USER: &str = "POSTGRESQL_USER";
const POSTGRESQL_PASSWORD: &str = "POSTGRESQL_PASSWORD";
const POSTGRESQL_DB: &str = "POSTGRESQL_DB";
const POSTGRESQL_MAX_CONNECTIONS: &str = "POSTGRESQL_MAX_CONNECTIONS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostgreSQL {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: i32,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgreSQL {
    fn default() -> Self {
        PostgreSQL {
            host: "localhost".to_string(),
            port: default_pg_port(),
            user: Default::default(),
            password: Default::default(),
            db: "stocks".to_string(),
            max_connections: default_max_connections(),
        }
    }
}

const STREAMER_SYMBOLS: &str = "STREAMER_SYMBOLS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Streamer {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_price_schedule")]
    pub price: Schedule,
    #[serde(default = "default_metadata_schedule")]
    pub high_low: Schedule,
    #[serde(default = "default_metadata_schedule")]
    pub logo_url: Schedule,
}

impl Default for Streamer {
    fn default() -> Self {
        Streamer {
            symbols: default_symbols(),
            price: default_price_schedule(),
            high_low: default_metadata_schedule(),
            logo_url: default_metadata_schedule(),
        }
    }
}

impl Streamer {
    /// 取得指定類別的排程設定
    pub fn schedule(&self, category: Category) -> &Schedule {
        match category {
            Category::Price => &self.price,
            Category::HighLow => &self.high_low,
            Category::LogoUrl => &self.logo_url,
        }
    }

    fn schedule_mut(&mut self, category: Category) -> &mut Schedule {
        match category {
            Category::Price => &mut self.price,
            Category::HighLow => &mut self.high_low,
            Category::LogoUrl => &mut self.logo_url,
        }
    }
}

/// 單一類別的輪詢設定
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Schedule {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const RETRY_MAX_ATTEMPTS: &str = "RETRY_MAX_ATTEMPTS";
const RETRY_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
const RETRY_MAX_DELAY_MS: &str = "RETRY_MAX_DELAY_MS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    /// 0 代表不設上限
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Retry {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    8
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_pg_port() -> i32 {
    5432
}

fn default_max_connections() -> u32 {
    // 三個類別各一條，再留一條給啟動檢查
    4
}

fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.split(',').map(String::from).collect()
}

fn default_enabled() -> bool {
    true
}

fn default_price_schedule() -> Schedule {
    Schedule {
        enabled: true,
        interval_secs: 5,
    }
}

fn default_metadata_schedule() -> Schedule {
    Schedule {
        enabled: true,
        interval_secs: 5000,
    }
}

fn default_max_attempts() -> usize {
    5
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl App {
    /// 讀取 `app.json`（若存在）再以環境變數覆蓋，最後檢查設定是否可用。
    ///
    /// # Errors
    /// 設定檔格式錯誤或 [`App::validate`] 未通過時回傳錯誤。
    pub fn get() -> Result<Self> {
        let config_path = config_path();
        let app = if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()
                .context("Failed to deserialize app.json")?;
            config.override_with_env()?
        } else {
            App::default().override_with_env()?
        };

        app.validate()?;

        Ok(app)
    }

    /// 將來自於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(self) -> Result<Self> {
        self.override_with(|key| env::var(key).ok())
    }

    /// 依 `lookup` 取得的值覆蓋設定，有設定但格式錯誤的變數直接回傳錯誤
    fn override_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(IEX_BASE_URL) {
            self.iex.base_url = url;
        }

        if let Some(secs) = parse_var(&lookup, IEX_CONNECT_TIMEOUT_SECS)? {
            self.iex.connect_timeout_secs = secs;
        }

        if let Some(secs) = parse_var(&lookup, IEX_TIMEOUT_SECS)? {
            self.iex.timeout_secs = secs;
        }

        if let Some(host) = lookup(POSTGRESQL_HOST) {
            self.postgresql.host = host;
        }

        if let Some(port) = parse_var(&lookup, POSTGRESQL_PORT)? {
            self.postgresql.port = port;
        }

        if let Some(user) = lookup(POSTGRESQL_USER) {
            self.postgresql.user = user;
        }

        if let Some(password) = lookup(POSTGRESQL_PASSWORD) {
            self.postgresql.password = password;
        }

        if let Some(db) = lookup(POSTGRESQL_DB) {
            self.postgresql.db = db;
        }

        if let Some(max) = parse_var(&lookup, POSTGRESQL_MAX_CONNECTIONS)? {
            self.postgresql.max_connections = max;
        }

        if let Some(symbols) = lookup(STREAMER_SYMBOLS) {
            let symbols = SymbolSet::parse(&symbols)
                .with_context(|| format!("Invalid {} '{}'", STREAMER_SYMBOLS, symbols))?;
            self.streamer.symbols = symbols.to_vec();
        }

        for category in Category::iterator() {
            let prefix = format!("STREAMER_{}", category.to_string().to_uppercase());
            let interval = parse_var(&lookup, &format!("{}_INTERVAL_SECS", prefix))?;
            let enabled = parse_var(&lookup, &format!("{}_ENABLED", prefix))?;
            let schedule = self.streamer.schedule_mut(category);

            if let Some(secs) = interval {
                schedule.interval_secs = secs;
            }

            if let Some(enabled) = enabled {
                schedule.enabled = enabled;
            }
        }

        if let Some(attempts) = parse_var(&lookup, RETRY_MAX_ATTEMPTS)? {
            self.retry.max_attempts = attempts;
        }

        if let Some(ms) = parse_var(&lookup, RETRY_BASE_DELAY_MS)? {
            self.retry.base_delay_ms = ms;
        }

        if let Some(ms) = parse_var(&lookup, RETRY_MAX_DELAY_MS)? {
            self.retry.max_delay_ms = ms;
        }

        Ok(self)
    }

    /// 啟動前檢查設定，有問題就直接失敗，不進入輪詢。
    pub fn validate(&self) -> Result<()> {
        self.symbol_set()?;

        let url = Url::parse(&self.iex.base_url)
            .with_context(|| format!("Invalid iex.base_url {}", self.iex.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "iex.base_url must be http or https, got {}",
                self.iex.base_url
            ));
        }

        if self.iex.timeout_secs == 0 {
            return Err(anyhow!("iex.timeout_secs must be greater than 0"));
        }

        for category in Category::iterator() {
            let schedule = self.streamer.schedule(category);
            if schedule.enabled && schedule.interval_secs == 0 {
                return Err(anyhow!(
                    "streamer.{}.interval_secs must be greater than 0",
                    category
                ));
            }
        }

        if Category::iterator().all(|c| !self.streamer.schedule(c).enabled) {
            return Err(anyhow!("every category is disabled, nothing to stream"));
        }

        if self.retry.base_delay_ms == 0 || self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(anyhow!(
                "retry delays are invalid: base {} ms, max {} ms",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            ));
        }

        if self.postgresql.max_connections == 0 {
            return Err(anyhow!("postgresql.max_connections must be greater than 0"));
        }

        Ok(())
    }

    pub fn symbol_set(&self) -> Result<SymbolSet> {
        SymbolSet::new(&self.streamer.symbols).context("Invalid streamer.symbols")
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?application_name=stock_streamer",
            self.postgresql.user,
            self.postgresql.password,
            self.postgresql.host,
            self.postgresql.port,
            self.postgresql.db
        )
    }
}

/// 變數未設定時回傳 `None`，設定了卻無法解析時回傳錯誤
fn parse_var<T>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|why| anyhow!("{}='{}' is invalid: {}", key, raw, why)),
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
