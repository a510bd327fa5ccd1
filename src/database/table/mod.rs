/// 52 週高低價（每檔一筆）
pub mod stock_highlow;
/// logo 網址（每檔一筆）
pub mod stock_image_url;
/// 成交價歷史（只新增）
pub mod stock_price;
