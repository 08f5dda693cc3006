use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::errors::FeedError;
use crate::models::DailyClose;

const USER_AGENT: &str = "portfolio-sentinel/0.1";

/// Source of daily closes for US-listed symbols.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Name recorded as the `source` of stored prices.
    fn source(&self) -> &'static str;

    async fn latest_daily_close(&self, symbol: &str) -> Result<DailyClose, FeedError>;
}

#[derive(Clone)]
pub struct StooqClient {
    http: Client,
    base_url: String,
}

impl StooqClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn quote_url(&self, symbol: &str) -> String {
        // stooq wants lower-case tickers with a .us suffix; f=sd2c => Symbol,Date,Close
        format!(
            "{}/q/l/?s={}.us&f=sd2c&h&e=csv",
            self.base_url,
            symbol.trim().to_lowercase()
        )
    }
}

#[async_trait]
impl PriceFeed for StooqClient {
    fn source(&self) -> &'static str {
        "stooq"
    }

    async fn latest_daily_close(&self, symbol: &str) -> Result<DailyClose, FeedError> {
        let res = self.http.get(self.quote_url(symbol)).send().await?;

        if !res.status().is_success() {
            return Err(FeedError::Http(res.status().as_u16()));
        }

        let body = res.text().await?;
        parse_daily_close_csv(&body)
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

/// Reads the last row of a stooq quote CSV. Only `Date` and `Close` are
/// used; header case varies between responses.
pub fn parse_daily_close_csv(body: &str) -> Result<DailyClose, FeedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = rdr.headers().map_err(|_| FeedError::BadCsv)?.clone();

    let mut last: Option<csv::StringRecord> = None;
    for rec in rdr.records() {
        last = Some(rec.map_err(|_| FeedError::BadCsv)?);
    }
    let last = last.ok_or(FeedError::Empty)?;

    let date_raw = column(&headers, "date").and_then(|i| last.get(i)).unwrap_or("");
    let close_raw = column(&headers, "close").and_then(|i| last.get(i)).unwrap_or("");
    if date_raw.is_empty() || close_raw.is_empty() {
        return Err(FeedError::BadCsv);
    }

    let close: f64 = close_raw.parse().map_err(|_| FeedError::BadClose)?;
    if !close.is_finite() || close <= 0.0 {
        return Err(FeedError::BadClose);
    }

    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d").map_err(|_| FeedError::BadDate)?;

    Ok(DailyClose { date, close })
}
