use std::{fmt, ops::Deref, sync::Arc};

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use strum::{Display, EnumIter, IntoEnumIterator};

/// 追蹤的資料類別
#[derive(Display, EnumIter, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// 最新成交價
    #[strum(serialize = "price")]
    Price,
    /// 52 週最高、最低價
    #[strum(serialize = "high_low")]
    HighLow,
    /// 公司 logo 網址
    #[strum(serialize = "logo_url")]
    LogoUrl,
}

impl Category {
    /// 遠端 API 的路徑後綴
    pub fn path_suffix(&self) -> &'static str {
        match self {
            Category::Price => "price",
            Category::HighLow => "quote",
            Category::LogoUrl => "logo",
        }
    }

    /// 寫入的資料表
    pub fn table(&self) -> &'static str {
        match self {
            Category::Price => "stock_prices",
            Category::HighLow => "stock_highlow",
            Category::LogoUrl => "stock_image_urls",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// 52 週高低價
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HighLow {
    pub high: Decimal,
    pub low: Decimal,
}

/// 單一股票在某個類別下取得的資料
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Price(Decimal),
    HighLow(HighLow),
    LogoUrl(String),
}

impl FetchResult {
    pub fn category(&self) -> Category {
        match self {
            FetchResult::Price(_) => Category::Price,
            FetchResult::HighLow(_) => Category::HighLow,
            FetchResult::LogoUrl(_) => Category::LogoUrl,
        }
    }
}

/// 追蹤中的股票代號，建立後不可變動
#[derive(Clone, PartialEq, Eq)]
pub struct SymbolSet(Arc<[String]>);

impl SymbolSet {
    /// 代號會去除空白並轉成大寫，重複的只保留第一個。
    ///
    /// # Errors
    /// 清單為空或含有空白代號時回傳錯誤。
    pub fn new<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();

        for raw in symbols {
            let symbol = raw.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                return Err(anyhow!("symbol list contains a blank entry"));
            }

            if !list.contains(&symbol) {
                list.push(symbol);
            }
        }

        if list.is_empty() {
            return Err(anyhow!("symbol list is empty"));
        }

        Ok(SymbolSet(list.into()))
    }

    /// 以逗號分隔的字串建立，例︰`GE,AAPL`
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(text.split(',').filter(|s| !s.trim().is_empty()))
    }
}

impl Deref for SymbolSet {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_symbol_set_normalizes_and_dedups() {
        let symbols = SymbolSet::new([" ge", "AAPL", "GE"]).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(&symbols[..], &["GE".to_string(), "AAPL".to_string()]);
        assert_eq!(symbols.to_string(), "GE,AAPL");
    }

    #[test]
    fn test_symbol_set_rejects_empty() {
        assert!(SymbolSet::new(Vec::<String>::new()).is_err());
        assert!(SymbolSet::parse(" , ").is_err());
        assert!(SymbolSet::new(["GE", " "]).is_err());
    }

    #[test]
    fn test_symbol_set_parse() {
        let symbols = SymbolSet::parse("GE, AMZN,goog,").unwrap();
        assert_eq!(symbols.to_string(), "GE,AMZN,GOOG");
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(Category::Price.path_suffix(), "price");
        assert_eq!(Category::HighLow.path_suffix(), "quote");
        assert_eq!(Category::LogoUrl.path_suffix(), "logo");
        assert_eq!(Category::HighLow.table(), "stock_highlow");
        assert_eq!(Category::LogoUrl.to_string(), "logo_url");
        assert_eq!(Category::iterator().count(), 3);
    }

    #[test]
    fn test_fetch_result_category() {
        assert_eq!(FetchResult::Price(dec!(1.5)).category(), Category::Price);
        assert_eq!(
            FetchResult::HighLow(HighLow {
                high: dec!(2),
                low: dec!(1)
            })
            .category(),
            Category::HighLow
        );
        assert_eq!(
            FetchResult::LogoUrl("x".to_string()).category(),
            Category::LogoUrl
        );
    }
}
