//! # IEX 行情採集模組
//!
//! 從 IEX Trading 的 REST API 取得美股資料。
//!
//! ## 端點
//!
//! - `GET {base}/{symbol}/price`：純文字的最新成交價
//! - `GET {base}/{symbol}/quote`：JSON，含 `week52High`、`week52Low`
//! - `GET {base}/{symbol}/logo`：JSON，含 `url`

use anyhow::Result;
use async_trait::async_trait;
use concat_string::concat_string;
use reqwest::Client;
use rust_decimal::Decimal;

use crate::{
    config,
    crawler::MarketData,
    declare::{Category, HighLow},
    error::FetchError,
    util::{self, http::ClientOptions},
};

/// 回應內容解析
pub mod payload;

/// IEX 採集器
pub struct Iex {
    client: Client,
    base_url: String,
}

impl Iex {
    pub fn new(client: Client, base_url: &str) -> Self {
        Iex {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 依設定建立專用的 http client
    pub fn from_config(settings: &config::Iex) -> Result<Self> {
        let client = util::http::build_client(ClientOptions {
            connect_timeout: std::time::Duration::from_secs(settings.connect_timeout_secs),
            timeout: std::time::Duration::from_secs(settings.timeout_secs),
        })?;

        Ok(Self::new(client, &settings.base_url))
    }

    /// 組出 `{base}/{symbol}/{suffix}`
    pub fn url(&self, category: Category, symbol: &str) -> String {
        concat_string!(self.base_url, "/", symbol, "/", category.path_suffix())
    }

    /// 啟動時確認遠端位址可用，只打一次不重試。
    pub async fn probe(&self, symbol: &str) -> Result<Decimal, FetchError> {
        self.fetch_price(symbol).await
    }
}

#[async_trait]
impl MarketData for Iex {
    async fn fetch_price(&self, symbol: &str) -> Result<Decimal, FetchError> {
        let url = self.url(Category::Price, symbol);
        let text = util::http::get(&self.client, &url).await?;

        payload::parse_price(&url, &text)
    }

    async fn fetch_high_low(&self, symbol: &str) -> Result<HighLow, FetchError> {
        let url = self.url(Category::HighLow, symbol);
        let quote = util::http::get_json::<payload::Quote>(&self.client, &url).await?;

        quote.into_high_low(&url)
    }

    async fn fetch_logo_url(&self, symbol: &str) -> Result<String, FetchError> {
        let url = self.url(Category::LogoUrl, symbol);
        let logo = util::http::get_json::<payload::Logo>(&self.client, &url).await?;

        logo.into_url(&url)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use rust_decimal_macros::dec;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use crate::{declare::FetchResult, logging};

    use super::*;

    /// 本機 http server，依路徑回傳固定的狀態碼與內容，其餘路徑一律 404
    async fn serve(routes: Vec<(&'static str, &'static str, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/");

                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or(("404 Not Found", ""));
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );

                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{}/stock/", addr)
    }

    fn iex(base_url: &str) -> Iex {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = util::http::build_client(ClientOptions::default()).unwrap();
        Iex::new(client, base_url)
    }

    #[test]
    fn test_url() {
        let e = iex("https://api.iextrading.com/1.0/stock/");
        assert_eq!(
            e.url(Category::Price, "GE"),
            "https://api.iextrading.com/1.0/stock/GE/price"
        );
        assert_eq!(
            e.url(Category::HighLow, "AAPL"),
            "https://api.iextrading.com/1.0/stock/AAPL/quote"
        );

        let e = iex("http://localhost:8080/stock");
        assert_eq!(
            e.url(Category::LogoUrl, "TSLA"),
            "http://localhost:8080/stock/TSLA/logo"
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_http_errors() {
        let base = serve(vec![
            ("/stock/GE/price", "503 Service Unavailable", "maintenance"),
            ("/stock/GE/quote", "200 OK", "<html>not json</html>"),
            ("/stock/GE/logo", "200 OK", r#"{"url":""}"#),
            ("/stock/AAPL/price", "200 OK", "189.3\n"),
            ("/stock/AAPL/quote", "200 OK", r#"{"week52High":195.0,"week52Low":118.25}"#),
            ("/stock/AAPL/logo", "200 OK", r#"{"url":"https://logo/aapl.png"}"#),
        ])
        .await;
        let e = iex(&base);

        match e.fetch(Category::Price, "GE").await {
            Err(FetchError::Status { status, url }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert!(url.ends_with("/stock/GE/price"));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            e.fetch(Category::HighLow, "GE").await,
            Err(FetchError::Parse { .. })
        ));
        assert!(matches!(
            e.fetch(Category::LogoUrl, "GE").await,
            Err(FetchError::MissingField { field: "url", .. })
        ));
        assert!(matches!(
            e.fetch(Category::Price, "TSLA").await,
            Err(FetchError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));

        assert_eq!(e.probe("AAPL").await.unwrap(), dec!(189.3));
        assert_eq!(
            e.fetch(Category::HighLow, "AAPL").await.unwrap(),
            FetchResult::HighLow(HighLow {
                high: dec!(195.0),
                low: dec!(118.25)
            })
        );
        assert_eq!(
            e.fetch(Category::LogoUrl, "AAPL").await.unwrap(),
            FetchResult::LogoUrl("https://logo/aapl.png".to_string())
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_live() {
        dotenv::dotenv().ok();
        let e = iex("https://api.iextrading.com/1.0/stock");

        for category in Category::iterator() {
            match e.fetch(category, "AAPL").await {
                Ok(r) => logging::debug_file_async(format!("{} : {:?}", category, r)),
                Err(why) => {
                    logging::debug_file_async(format!("Failed to fetch {} because {:?}", category, why));
                }
            }
        }
    }
}
