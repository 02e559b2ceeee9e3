//! Reduction of one poll cycle's results into a [`Snapshot`].
//!
//! Pure and deterministic apart from the completion timestamp, which
//! [`aggregate_at`] takes explicitly.

use crate::config::TargetConfig;
use crate::domain::{FetchResult, RiskStats, ServerConfigInfo, ServerEntry, Snapshot, Summary};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Aggregate a batch of results, stamped with the current time
pub fn aggregate(results: &[FetchResult], registry: &[TargetConfig]) -> Snapshot {
    aggregate_at(results, registry, Utc::now())
}

/// Aggregate a batch of results with an explicit completion time
pub fn aggregate_at(
    results: &[FetchResult],
    registry: &[TargetConfig],
    completed_at: DateTime<Utc>,
) -> Snapshot {
    let mut servers = BTreeMap::new();
    let mut summary = Summary {
        total_servers: results.len(),
        ..Summary::default()
    };

    for result in results {
        let target = registry.iter().find(|t| t.name == result.server);
        // Later duplicates overwrite earlier ones
        servers.insert(
            result.server.clone(),
            ServerEntry {
                result: result.clone(),
                config: ServerConfigInfo::from(target),
            },
        );

        if result.is_active() {
            if let Some(stats) = &result.stats {
                summary.add(stats);
            }
        }
    }

    Snapshot {
        timestamp: Some(completed_at),
        servers,
        summary,
    }
}

impl Summary {
    /// Fold the stats of one active server into the totals
    fn add(&mut self, stats: &RiskStats) {
        self.active_servers += 1;

        // Reported values, zero included
        add_defined(&mut self.total_current_balance, stats.current_balance);
        add_defined(&mut self.total_current_equity, stats.current_equity);
        add_defined(&mut self.total_day_profit, stats.day_profit);
        add_defined(&mut self.total_positions_profit, stats.positions_profit);
        add_defined(&mut self.total_start_trading_balance, stats.start_trading_balance);
        add_defined(&mut self.total_date_profit, stats.date_profit);
        add_defined(&mut self.total_date_commission, stats.date_commission);

        // Limits and balances that only count when set to something non-zero
        add_nonzero(&mut self.total_start_day_balance, stats.start_day_balance);
        add_nonzero(&mut self.total_max_daily_loss, stats.max_daily_loss);
        add_nonzero(&mut self.total_max_day_balance, stats.max_day_balance);
        if let Some(deals) = stats.deals_count.filter(|n| *n != 0) {
            self.total_deals_count = self.total_deals_count.saturating_add(deals);
        }

        if stats.limit_reached == Some(true) {
            self.servers_with_limit_reached += 1;
        }
        if stats.auto_close_on_limit == Some(true) {
            self.servers_with_auto_close_on_limit += 1;
        }

        if let Some(days) = &stats.profits_last_7_days {
            for (total, day) in self.total_profits_last_7_days.iter_mut().zip(days) {
                add_defined(total, *day);
            }
        }
    }
}

fn add_defined(total: &mut Decimal, value: Option<Decimal>) {
    if let Some(v) = value {
        *total = total.saturating_add(v);
    }
}

fn add_nonzero(total: &mut Decimal, value: Option<Decimal>) {
    add_defined(total, value.filter(|v| !v.is_zero()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FetchStatus;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn target(name: &str) -> TargetConfig {
        TargetConfig::new(name, format!("http://{}", name.to_lowercase()))
    }

    fn ok(name: &str, body: Value) -> FetchResult {
        FetchResult::success(&target(name), body)
    }

    fn stats(name: &str, stats: Value) -> FetchResult {
        ok(name, json!({"status": "ok", "stats": stats}))
    }

    fn failed(name: &str, error: &str) -> FetchResult {
        FetchResult::failure(&target(name), error)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_batch_is_zero_summary() {
        let snapshot = aggregate_at(&[], &[target("A")], fixed_time());
        assert_eq!(snapshot.summary, Summary::default());
        assert!(snapshot.servers.is_empty());
        assert_eq!(snapshot.timestamp, Some(fixed_time()));
    }

    #[test]
    fn test_one_ok_one_failed() {
        let registry = vec![target("A"), target("B")];
        let results = vec![
            stats("A", json!({"day_profit": 100, "deals_count": 5})),
            failed("B", "timeout"),
        ];

        let snapshot = aggregate_at(&results, &registry, fixed_time());

        let expected = Summary {
            total_servers: 2,
            active_servers: 1,
            total_day_profit: dec!(100),
            total_deals_count: 5,
            ..Summary::default()
        };
        assert_eq!(snapshot.summary, expected);
        assert_eq!(snapshot.servers["B"].result.status, FetchStatus::Error);
        assert_eq!(snapshot.servers["B"].result.error.as_deref(), Some("timeout"));
        assert_eq!(snapshot.servers["A"].result.status, FetchStatus::Ok);
    }

    #[test]
    fn test_all_failed_contributes_nothing() {
        let registry = vec![target("A"), target("B"), target("C")];
        let results = vec![
            failed("A", "connect ECONNREFUSED"),
            failed("B", "Request failed with status code 502"),
            failed("C", "timeout of 5000ms exceeded"),
        ];

        let summary = aggregate_at(&results, &registry, fixed_time()).summary;
        assert_eq!(
            summary,
            Summary {
                total_servers: 3,
                ..Summary::default()
            }
        );
    }

    #[test]
    fn test_upstream_error_status_is_inactive() {
        let results = vec![ok(
            "A",
            json!({"status": "error", "message": "terminal disconnected", "stats": {"day_profit": 50}}),
        )];

        let snapshot = aggregate_at(&results, &[target("A")], fixed_time());
        assert_eq!(snapshot.summary.total_servers, 1);
        assert_eq!(snapshot.summary.active_servers, 0);
        assert_eq!(snapshot.summary.total_day_profit, Decimal::ZERO);
        assert_eq!(snapshot.servers["A"].result.status, FetchStatus::Ok);
    }

    #[test]
    fn test_missing_stats_counts_only_in_total() {
        let results = vec![ok("A", json!({"status": "ok"}))];
        let summary = aggregate_at(&results, &[target("A")], fixed_time()).summary;
        assert_eq!(summary.total_servers, 1);
        assert_eq!(summary.active_servers, 0);
    }

    #[test]
    fn test_profit_history_ignores_eighth_day() {
        let results = vec![
            stats("A", json!({"profits_last_7_days": [1, 2, 3, 4, 5, 6, 7, 8]})),
            stats("B", json!({"profits_last_7_days": [10, null, 30]})),
        ];

        let summary = aggregate_at(&results, &[], fixed_time()).summary;
        assert_eq!(
            summary.total_profits_last_7_days,
            [dec!(11), dec!(2), dec!(33), dec!(4), dec!(5), dec!(6), dec!(7)]
        );
    }

    #[test]
    fn test_all_fields_are_summed() {
        let full = json!({
            "start_day_balance": 1000,
            "current_balance": 1010,
            "current_equity": 1020,
            "day_profit": 10,
            "deals_count": 3,
            "limit_reached": true,
            "auto_close_on_limit": true,
            "max_daily_loss": 50,
            "positions_profit": 10,
            "max_day_balance": 1030,
            "start_trading_balance": 900,
            "date_profit": 110,
            "date_commission": -2
        });
        let results = vec![stats("A", full.clone()), stats("B", full)];

        let summary = aggregate_at(&results, &[], fixed_time()).summary;
        assert_eq!(summary.active_servers, 2);
        assert_eq!(summary.total_start_day_balance, dec!(2000));
        assert_eq!(summary.total_current_balance, dec!(2020));
        assert_eq!(summary.total_current_equity, dec!(2040));
        assert_eq!(summary.total_day_profit, dec!(20));
        assert_eq!(summary.total_deals_count, 6);
        assert_eq!(summary.servers_with_limit_reached, 2);
        assert_eq!(summary.servers_with_auto_close_on_limit, 2);
        assert_eq!(summary.total_max_daily_loss, dec!(100));
        assert_eq!(summary.total_positions_profit, dec!(20));
        assert_eq!(summary.total_max_day_balance, dec!(2060));
        assert_eq!(summary.total_start_trading_balance, dec!(1800));
        assert_eq!(summary.total_date_profit, dec!(220));
        assert_eq!(summary.total_date_commission, dec!(-4));
    }

    #[test]
    fn test_false_flags_are_not_counted() {
        let results = vec![stats(
            "A",
            json!({"limit_reached": false, "auto_close_on_limit": 0}),
        )];
        let summary = aggregate_at(&results, &[], fixed_time()).summary;
        assert_eq!(summary.active_servers, 1);
        assert_eq!(summary.servers_with_limit_reached, 0);
        assert_eq!(summary.servers_with_auto_close_on_limit, 0);
    }

    #[test]
    fn test_summary_is_order_independent() {
        let registry = vec![target("A"), target("B"), target("C"), target("D"), target("E")];
        let results = vec![
            stats(
                "A",
                json!({"day_profit": 0.1, "deals_count": 2, "profits_last_7_days": [0.1, 2]}),
            ),
            stats(
                "B",
                json!({"day_profit": 0.2, "current_balance": 200.7, "limit_reached": true,
                       "profits_last_7_days": [0.2]}),
            ),
            failed("C", "timeout"),
            ok("D", json!({"status": "error"})),
            stats(
                "E",
                json!({"day_profit": 0.3, "current_balance": 0.1, "date_commission": -0.35,
                       "profits_last_7_days": [0.3, 0.05]}),
            ),
        ];

        let forward = aggregate_at(&results, &registry, fixed_time());
        assert_eq!(forward.summary.total_day_profit, dec!(0.6));
        assert_eq!(forward.summary.total_current_balance, dec!(200.8));
        assert_eq!(forward.summary.total_profits_last_7_days[0], dec!(0.6));
        assert_eq!(forward.summary.total_profits_last_7_days[1], dec!(2.05));

        let mut permuted = results.clone();
        for _ in 0..results.len() {
            permuted.rotate_left(1);
            let rotated = aggregate_at(&permuted, &registry, fixed_time());
            assert_eq!(forward.summary, rotated.summary);

            let mut reversed_results = permuted.clone();
            reversed_results.reverse();
            let reversed = aggregate_at(&reversed_results, &registry, fixed_time());
            assert_eq!(forward.summary, reversed.summary);
            assert_eq!(forward.servers, reversed.servers);
        }

        let json = serde_json::to_value(&forward.summary).unwrap();
        assert_eq!(json["total_day_profit"], json!(0.6));
    }

    #[test]
    fn test_active_never_exceeds_total() {
        let results = vec![
            stats("A", json!({})),
            stats("B", json!({})),
            failed("C", "x"),
        ];
        let summary = aggregate_at(&results, &[], fixed_time()).summary;
        assert_eq!(summary.total_servers, results.len());
        assert!(summary.active_servers <= summary.total_servers);
        assert_eq!(summary.active_servers, 2);
    }

    #[test]
    fn test_registry_fields_are_copied() {
        let registry =
            vec![TargetConfig::new("A", "http://a").with_trading_start("2024.01.15", Some(10000.0))];
        let results = vec![stats("A", json!({})), stats("Gone", json!({}))];

        let snapshot = aggregate_at(&results, &registry, fixed_time());
        let config = &snapshot.servers["A"].config;
        assert_eq!(config.date_start_trading.as_deref(), Some("2024.01.15"));
        assert_eq!(config.start_trading_balance, Some(10000.0));
        assert_eq!(snapshot.servers["Gone"].config, ServerConfigInfo::default());
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let results = vec![failed("A", "first"), failed("A", "second")];
        let snapshot = aggregate_at(&results, &[], fixed_time());
        assert_eq!(snapshot.summary.total_servers, 2);
        assert_eq!(snapshot.servers.len(), 1);
        assert_eq!(snapshot.servers["A"].result.error.as_deref(), Some("second"));
    }
}
