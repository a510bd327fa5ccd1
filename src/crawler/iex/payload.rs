use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::{declare::HighLow, error::FetchError, util::text};

/// `/quote` 的回應，只保留 52 週高低價
#[derive(Deserialize, Debug, Clone)]
pub struct Quote {
    #[serde(rename = "week52High")]
    week52_high: Option<Value>,
    #[serde(rename = "week52Low")]
    week52_low: Option<Value>,
}

impl Quote {
    pub fn into_high_low(self, url: &str) -> Result<HighLow, FetchError> {
        Ok(HighLow {
            high: number_field(url, "week52High", self.week52_high)?,
            low: number_field(url, "week52Low", self.week52_low)?,
        })
    }
}

/// `/logo` 的回應
#[derive(Deserialize, Debug, Clone)]
pub struct Logo {
    url: Option<String>,
}

impl Logo {
    pub fn into_url(self, url: &str) -> Result<String, FetchError> {
        match self.url {
            Some(u) if !u.trim().is_empty() => Ok(u.trim().to_string()),
            _ => Err(FetchError::MissingField { url: url.to_string(), field: "url" }),
        }
    }
}

/// `/price` 回傳的是一個純文字的數字，只允許前後有空白
pub fn parse_price(url: &str, body: &str) -> Result<Decimal, FetchError> {
    let trimmed = body.trim();
    Decimal::from_str(trimmed).map_err(|why| FetchError::Parse {
        url: url.to_string(),
        reason: format!("'{}' is not a decimal: {}", trimmed, why),
    })
}

fn number_field(url: &str, field: &'static str, value: Option<Value>) -> Result<Decimal, FetchError> {
    match value {
        // 用原字串轉 Decimal，避免經過 f64 失真
        Some(Value::Number(n)) => text::parse_decimal(&n.to_string(), None).map_err(|why| {
            FetchError::Parse {
                url: url.to_string(),
                reason: format!("{}: {}", field, why),
            }
        }),
        None | Some(Value::Null) => Err(FetchError::MissingField { url: url.to_string(), field }),
        Some(other) => Err(FetchError::Parse {
            url: url.to_string(),
            reason: format!("{} is not a number: {}", field, other),
        }),
    }
}
