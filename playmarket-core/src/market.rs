//! Market data structures for play-money prediction markets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PlaymarketError, PlaymarketResult};

/// Lowest quotable share price in cents
pub const MIN_PRICE_CENTS: i64 = 1;

/// Highest quotable share price in cents
pub const MAX_PRICE_CENTS: i64 = 99;

/// Status of a prediction market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Market is open for trading
    #[default]
    Open,
    /// Trading halted, outcome not yet known
    Closed,
    /// Outcome decided and payouts settled
    Resolved,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Open => "open",
            MarketStatus::Closed => "closed",
            MarketStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = PlaymarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(MarketStatus::Open),
            "closed" => Ok(MarketStatus::Closed),
            "resolved" => Ok(MarketStatus::Resolved),
            _ => Err(PlaymarketError::invalid(format!("Unknown market status: {}", s))),
        }
    }
}

/// Final outcome of a resolved market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketOutcome {
    ResolvedYes,
    ResolvedNo,
}

impl MarketOutcome {
    /// The side whose holders get paid
    pub fn winning_side(&self) -> Side {
        match self {
            MarketOutcome::ResolvedYes => Side::Yes,
            MarketOutcome::ResolvedNo => Side::No,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketOutcome::ResolvedYes => "resolved_yes",
            MarketOutcome::ResolvedNo => "resolved_no",
        }
    }
}

impl fmt::Display for MarketOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketOutcome {
    type Err = PlaymarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resolved_yes" => Ok(MarketOutcome::ResolvedYes),
            "resolved_no" => Ok(MarketOutcome::ResolvedNo),
            _ => Err(PlaymarketError::invalid(format!("Unknown outcome: {}", s))),
        }
    }
}

/// Which outcome a trade or position bets on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = PlaymarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            _ => Err(PlaymarketError::invalid(format!("Unknown side: {}", s))),
        }
    }
}

/// A play-money prediction market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Unique identifier
    pub id: String,

    /// Human-readable title/question
    pub title: String,

    /// Detailed description of the market
    pub description: Option<String>,

    /// Category (e.g., "Politics", "Sports")
    pub category: Option<String>,

    /// When the market stops accepting trades
    pub closes_at: Option<DateTime<Utc>>,

    /// Current status of the market
    pub status: MarketStatus,

    /// Set exactly when `status` is `Resolved`
    pub outcome: Option<MarketOutcome>,

    /// Price of one YES share in cents
    pub yes_price: i64,

    /// Price of one NO share in cents
    pub no_price: i64,

    /// When the market was created
    pub created_at: DateTime<Utc>,
}

impl Market {
    /// Current price for one share of `side`
    pub fn price_for(&self, side: Side) -> i64 {
        match side {
            Side::Yes => self.yes_price,
            Side::No => self.no_price,
        }
    }

    /// Check if this market accepts trades at `now`
    pub fn is_tradeable(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Open && self.closes_at.is_none_or(|closes| closes > now)
    }
}

/// Input for creating a market
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMarket {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
    pub yes_price: i64,
    pub no_price: i64,
}

impl NewMarket {
    /// Check the input and normalize optional text fields.
    ///
    /// Blank description or category become `None`. Prices are independent of
    /// each other and only need to fall within the quotable range.
    pub fn validated(self) -> PlaymarketResult<NewMarket> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(PlaymarketError::invalid("Title is required"));
        }

        for (label, price) in [("YES", self.yes_price), ("NO", self.no_price)] {
            if !(MIN_PRICE_CENTS..=MAX_PRICE_CENTS).contains(&price) {
                return Err(PlaymarketError::invalid(format!(
                    "{} price must be between {} and {} cents, got {}",
                    label, MIN_PRICE_CENTS, MAX_PRICE_CENTS, price
                )));
            }
        }

        Ok(NewMarket {
            title,
            description: non_blank(self.description),
            category: non_blank(self.category),
            closes_at: self.closes_at,
            yes_price: self.yes_price,
            no_price: self.no_price,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Filters for listing markets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketFilter {
    /// `all` or a blank value lists every status
    #[serde(default, deserialize_with = "status_filter")]
    pub status: Option<MarketStatus>,
    pub category: Option<String>,
}

fn status_filter<'de, D>(deserializer: D) -> Result<Option<MarketStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_market() -> Market {
        Market {
            id: "m1".to_string(),
            title: "Will it rain tomorrow?".to_string(),
            description: None,
            category: Some("Weather".to_string()),
            closes_at: None,
            status: MarketStatus::Open,
            outcome: None,
            yes_price: 55,
            no_price: 45,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_for_side() {
        let market = sample_market();
        assert_eq!(market.price_for(Side::Yes), 55);
        assert_eq!(market.price_for(Side::No), 45);
    }

    #[test]
    fn test_tradeable_respects_status_and_close_time() {
        let now = Utc::now();
        let mut market = sample_market();
        assert!(market.is_tradeable(now));

        market.closes_at = Some(now - Duration::minutes(1));
        assert!(!market.is_tradeable(now));

        market.closes_at = Some(now + Duration::hours(1));
        assert!(market.is_tradeable(now));

        market.status = MarketStatus::Closed;
        assert!(!market.is_tradeable(now));
    }

    #[test]
    fn test_parsing() {
        assert_eq!("YES".parse::<Side>().unwrap(), Side::Yes);
        assert_eq!("no".parse::<Side>().unwrap(), Side::No);
        assert!("maybe".parse::<Side>().is_err());
        assert_eq!(
            "resolved_no".parse::<MarketOutcome>().unwrap(),
            MarketOutcome::ResolvedNo
        );
        assert_eq!("Closed".parse::<MarketStatus>().unwrap(), MarketStatus::Closed);
        assert_eq!(MarketOutcome::ResolvedYes.winning_side(), Side::Yes);
    }

    #[test]
    fn test_new_market_validation() {
        let input = NewMarket {
            title: "  Election  ".to_string(),
            description: Some("   ".to_string()),
            category: Some("Politics".to_string()),
            closes_at: None,
            yes_price: 60,
            no_price: 60,
        };
        let valid = input.validated().unwrap();
        assert_eq!(valid.title, "Election");
        assert_eq!(valid.description, None);
        assert_eq!(valid.category.as_deref(), Some("Politics"));

        let bad_price = NewMarket {
            title: "x".to_string(),
            yes_price: 100,
            no_price: 45,
            ..NewMarket::default()
        };
        assert!(matches!(
            bad_price.validated(),
            Err(PlaymarketError::InvalidArgument(_))
        ));

        let no_title = NewMarket {
            title: " ".to_string(),
            yes_price: 50,
            no_price: 50,
            ..NewMarket::default()
        };
        assert!(no_title.validated().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_value(sample_market()).unwrap();
        assert_eq!(json["status"], "open");
        assert_eq!(json["outcome"], serde_json::Value::Null);
        assert_eq!(
            serde_json::to_value(MarketOutcome::ResolvedYes).unwrap(),
            "resolved_yes"
        );
    }

    #[test]
    fn test_status_filter_accepts_all() {
        let filter = |value: serde_json::Value| serde_json::from_value::<MarketFilter>(value);

        assert_eq!(filter(serde_json::json!({ "status": "all" })).unwrap().status, None);
        assert_eq!(filter(serde_json::json!({ "status": "ALL" })).unwrap().status, None);
        assert_eq!(filter(serde_json::json!({ "status": " " })).unwrap().status, None);
        assert_eq!(filter(serde_json::json!({})).unwrap().status, None);
        assert_eq!(
            filter(serde_json::json!({ "status": "closed", "category": "Sports" }))
                .unwrap()
                .status,
            Some(MarketStatus::Closed)
        );
        assert!(filter(serde_json::json!({ "status": "bogus" })).is_err());
    }
}
