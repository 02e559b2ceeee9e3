//! Typed view over the `stats` object reported by a trading server.
//!
//! Upstream payloads are loosely shaped: any field may be missing, null or of
//! an unexpected type. Decoding is done once, when a response arrives, and a
//! field that cannot be read is simply absent. Nothing here ever rejects a
//! payload as a whole.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::str::FromStr;

/// Number of daily slots in the recent-profit history
pub const PROFIT_HISTORY_DAYS: usize = 7;

/// Risk statistics of one trading server. Every field is optional.
///
/// Money amounts are exact [`Decimal`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskStats {
    pub start_day_balance: Option<Decimal>,
    pub current_balance: Option<Decimal>,
    pub current_equity: Option<Decimal>,
    pub day_profit: Option<Decimal>,
    pub deals_count: Option<u64>,
    pub limit_reached: Option<bool>,
    pub auto_close_on_limit: Option<bool>,
    pub max_daily_loss: Option<Decimal>,
    pub positions_profit: Option<Decimal>,
    pub max_day_balance: Option<Decimal>,
    /// Profit per day, most recent first; only the first seven entries are kept
    pub profits_last_7_days: Option<[Option<Decimal>; PROFIT_HISTORY_DAYS]>,
    pub start_trading_balance: Option<Decimal>,
    pub date_profit: Option<Decimal>,
    pub date_commission: Option<Decimal>,
}

impl RiskStats {
    /// Extract stats from a raw upstream body.
    ///
    /// Returns `None` unless the body reports `"status": "ok"` and carries a
    /// usable `stats` value. A `stats` value that is truthy but not an object
    /// yields empty stats: the server counts as active but contributes nothing.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let body = payload.as_object()?;
        if body.get("status").and_then(Value::as_str) != Some("ok") {
            return None;
        }

        let stats = body.get("stats").filter(|v| is_truthy(v))?;
        Some(stats.as_object().map(Self::from_map).unwrap_or_default())
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            start_day_balance: number(map, "start_day_balance"),
            current_balance: number(map, "current_balance"),
            current_equity: number(map, "current_equity"),
            day_profit: number(map, "day_profit"),
            deals_count: count(map, "deals_count"),
            limit_reached: flag(map, "limit_reached"),
            auto_close_on_limit: flag(map, "auto_close_on_limit"),
            max_daily_loss: number(map, "max_daily_loss"),
            positions_profit: number(map, "positions_profit"),
            max_day_balance: number(map, "max_day_balance"),
            profits_last_7_days: profit_history(map, "profits_last_7_days"),
            start_trading_balance: number(map, "start_trading_balance"),
            date_profit: number(map, "date_profit"),
            date_commission: number(map, "date_commission"),
        }
    }
}

fn number(map: &Map<String, Value>, key: &str) -> Option<Decimal> {
    match map.get(key)? {
        Value::Number(n) => decimal(n),
        _ => None,
    }
}

/// Exact decimal for a JSON number, read from its textual form
fn decimal(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| n.as_f64().and_then(Decimal::from_f64))
}

fn count(map: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = map.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    })
}

fn flag(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Null => None,
        value => Some(is_truthy(value)),
    }
}

fn profit_history(
    map: &Map<String, Value>,
    key: &str,
) -> Option<[Option<Decimal>; PROFIT_HISTORY_DAYS]> {
    let entries = map.get(key)?.as_array()?;
    let mut days = [None; PROFIT_HISTORY_DAYS];
    for (slot, entry) in days.iter_mut().zip(entries.iter()) {
        *slot = match entry {
            Value::Number(n) => decimal(n),
            _ => None,
        };
    }
    Some(days)
}

/// Loose truthiness as used by the trading servers' JSON producers
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_requires_ok_status_and_stats() {
        assert!(RiskStats::from_payload(&json!({"status": "ok", "stats": {}})).is_some());
        assert!(RiskStats::from_payload(&json!({"status": "error", "stats": {}})).is_none());
        assert!(RiskStats::from_payload(&json!({"status": "ok"})).is_none());
        assert!(RiskStats::from_payload(&json!({"status": "ok", "stats": null})).is_none());
        assert!(RiskStats::from_payload(&json!("ok")).is_none());
        assert!(RiskStats::from_payload(&json!({"stats": {"day_profit": 1}})).is_none());
    }

    #[test]
    fn test_decodes_present_fields() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {
                "start_day_balance": 1000,
                "current_balance": 1050.5,
                "day_profit": 0,
                "deals_count": 12,
                "limit_reached": true,
                "auto_close_on_limit": false,
                "date_commission": -3.25
            }
        }))
        .unwrap();

        assert_eq!(stats.start_day_balance, Some(dec!(1000)));
        assert_eq!(stats.current_balance, Some(dec!(1050.5)));
        assert_eq!(stats.day_profit, Some(dec!(0)));
        assert_eq!(stats.deals_count, Some(12));
        assert_eq!(stats.limit_reached, Some(true));
        assert_eq!(stats.auto_close_on_limit, Some(false));
        assert_eq!(stats.date_commission, Some(dec!(-3.25)));
        assert_eq!(stats.current_equity, None);
        assert_eq!(stats.profits_last_7_days, None);
    }

    #[test]
    fn test_wrong_types_are_absent() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {
                "current_balance": "1000",
                "deals_count": 2.5,
                "limit_reached": null,
                "profits_last_7_days": "none"
            }
        }))
        .unwrap();

        assert_eq!(stats, RiskStats::default());
    }

    #[test]
    fn test_flags_follow_truthiness() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {"limit_reached": 1, "auto_close_on_limit": ""}
        }))
        .unwrap();

        assert_eq!(stats.limit_reached, Some(true));
        assert_eq!(stats.auto_close_on_limit, Some(false));
    }

    #[test]
    fn test_profit_history_keeps_first_seven_days() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {"profits_last_7_days": [1, null, 3, "x", 5, 6, 7, 8, 9]}
        }))
        .unwrap();

        assert_eq!(
            stats.profits_last_7_days,
            Some([
                Some(dec!(1)),
                None,
                Some(dec!(3)),
                None,
                Some(dec!(5)),
                Some(dec!(6)),
                Some(dec!(7))
            ])
        );
    }

    #[test]
    fn test_short_profit_history_leaves_tail_empty() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {"profits_last_7_days": [10, 20]}
        }))
        .unwrap();

        let days = stats.profits_last_7_days.unwrap();
        assert_eq!(days[0], Some(dec!(10)));
        assert_eq!(days[1], Some(dec!(20)));
        assert!(days[2..].iter().all(Option::is_none));
    }

    #[test]
    fn test_truthy_non_object_stats_is_empty() {
        let stats = RiskStats::from_payload(&json!({"status": "ok", "stats": true})).unwrap();
        assert_eq!(stats, RiskStats::default());
    }

    #[test]
    fn test_fractional_amounts_are_exact() {
        let stats = RiskStats::from_payload(&json!({
            "status": "ok",
            "stats": {"day_profit": 0.1, "current_balance": 1e21, "profits_last_7_days": [0.3]}
        }))
        .unwrap();

        assert_eq!(stats.day_profit, Some(dec!(0.1)));
        assert_eq!(stats.current_balance, Some(dec!(1000000000000000000000)));
        assert_eq!(stats.profits_last_7_days.unwrap()[0], Some(dec!(0.3)));
    }
}
