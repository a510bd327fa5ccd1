use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::{error::FetchError, logging::Logger};

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// reqwest client 的連線參數
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            connect_timeout: Duration::from_secs(8),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Builds a reqwest client shared by every request of one data provider.
///
/// # Errors
///
/// Returns an error if the TLS backend or the connection pool cannot be initialised.
pub fn build_client(options: ClientOptions) -> Result<Client> {
    Client::builder()
        // ===== 壓縮 =====
        .gzip(true)
        // ===== 超時設置 =====
        .connect_timeout(options.connect_timeout)
        .timeout(options.timeout)
        // ===== TCP 優化 =====
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        // ===== 連接池 =====
        .pool_max_idle_per_host(20)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
}

/// Performs an HTTP GET request and returns the response as text.
///
/// A non-2xx status is reported as [`FetchError::Status`].
pub async fn get(client: &Client, url: &str) -> Result<String, FetchError> {
    send(client, url)
        .await?
        .text()
        .await
        .map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
pub async fn get_json<RES: DeserializeOwned>(client: &Client, url: &str) -> Result<RES, FetchError> {
    let text = get(client, url).await?;

    serde_json::from_str::<RES>(&text).map_err(|why| FetchError::Parse {
        url: url.to_string(),
        reason: format!("{}: {}", why, text),
    })
}

async fn send(client: &Client, url: &str) -> Result<Response, FetchError> {
    let start = Instant::now();
    let res = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) if response.status().is_success() => {
            LOGGER.debug(format!("GET:{} {} {} ms", url, response.status(), elapsed));
            Ok(response)
        }
        Ok(response) => {
            LOGGER.warn(format!("GET:{} {} {} ms", url, response.status(), elapsed));
            Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            })
        }
        Err(why) => {
            LOGGER.warn(format!("GET:{} failed because {:?}. {} ms", url, why, elapsed));
            Err(FetchError::Http {
                url: url.to_string(),
                source: why,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        build_client(ClientOptions::default()).unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = build_client(ClientOptions {
            connect_timeout: Duration::from_millis(200),
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        match get(&client, "http://127.0.0.1:1/GE/price").await {
            Err(FetchError::Http { url, .. }) => assert_eq!(url, "http://127.0.0.1:1/GE/price"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_get_live() {
        dotenv::dotenv().ok();
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = build_client(ClientOptions::default()).unwrap();
        match get(&client, "https://api.iextrading.com/1.0/stock/aapl/price").await {
            Ok(text) => crate::logging::debug_file_async(format!("price: {}", text)),
            Err(why) => {
                crate::logging::error_file_async(format!("Failed to get because {:?}", why));
            }
        }
    }
}
