//! Scanning many markets for opportunities.
//!
//! Markets are independent, so each one is searched on the blocking pool
//! with at most `workers` searches in flight.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::generator::{find_opportunities, to_opportunities, SearchParams};
use super::opportunity::Opportunity;
use crate::error::ArbitrageError;
use crate::metrics;
use crate::odds::MarketSnapshot;

/// How scan results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Keep only the highest-margin opportunity per event.
    pub best_per_event: bool,
    /// Maximum number of opportunities returned.
    pub limit: usize,
    /// Maximum number of markets searched concurrently.
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            best_per_event: true,
            limit: 50,
            workers: 8,
        }
    }
}

/// Merged result of a scan.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Opportunities, best margin first.
    pub opportunities: Vec<Opportunity>,
    /// Number of markets searched.
    pub markets_scanned: usize,
    /// Opportunities found before per-event deduplication and the limit.
    pub opportunities_before_dedup: usize,
    /// Markets whose search stopped on its budget (partial results kept).
    pub truncated_markets: Vec<String>,
    /// Markets skipped because of invalid input.
    pub failed_markets: Vec<String>,
}

impl ScanReport {
    /// Number of opportunities returned.
    pub fn count(&self) -> usize {
        self.opportunities.len()
    }
}

/// Result of searching one market.
#[derive(Debug)]
enum MarketScan {
    Complete(Vec<Opportunity>),
    Truncated(String, Vec<Opportunity>),
    Failed(String),
}

fn scan_market(market: &MarketSnapshot, params: &SearchParams) -> MarketScan {
    let _timer = metrics::timer_market_scan();
    let key = market.context.key();

    match find_opportunities(&market.book, &market.context, params) {
        Ok(opportunities) => MarketScan::Complete(opportunities),
        Err(ArbitrageError::ComputeBudgetExceeded {
            evaluated,
            limit,
            partial,
        }) => {
            warn!(
                market = %key,
                evaluated,
                limit = %limit,
                partial = partial.len(),
                "Enumeration budget exceeded, keeping partial results"
            );
            let opportunities =
                to_opportunities(&market.context, partial, params, OffsetDateTime::now_utc());
            MarketScan::Truncated(key, opportunities)
        }
        Err(e) => {
            warn!(market = %key, error = %e, "Skipping market");
            MarketScan::Failed(key)
        }
    }
}

/// Search every market and merge the results.
#[instrument(skip_all, fields(markets = markets.len(), workers = options.workers))]
pub async fn scan_markets(
    markets: Vec<MarketSnapshot>,
    params: SearchParams,
    options: ScanOptions,
) -> ScanReport {
    let markets_scanned = markets.len();
    let params = Arc::new(params);
    let permits = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut tasks = JoinSet::new();

    for market in markets {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            error!("Scan worker pool closed");
            break;
        };
        let params = Arc::clone(&params);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            scan_market(&market, &params)
        });
    }

    let mut report = ScanReport {
        markets_scanned,
        ..ScanReport::default()
    };
    let mut found = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(MarketScan::Complete(opportunities)) => found.extend(opportunities),
            Ok(MarketScan::Truncated(key, opportunities)) => {
                report.truncated_markets.push(key);
                found.extend(opportunities);
            }
            Ok(MarketScan::Failed(key)) => report.failed_markets.push(key),
            Err(e) => error!(error = %e, "Market scan task failed"),
        }
    }

    report.opportunities_before_dedup = found.len();
    report.opportunities = merge(found, &options);
    report.truncated_markets.sort();
    report.failed_markets.sort();

    info!(
        markets = report.markets_scanned,
        found = report.opportunities_before_dedup,
        returned = report.count(),
        truncated = report.truncated_markets.len(),
        failed = report.failed_markets.len(),
        "Scan complete"
    );

    report
}

/// Deduplicate per event if requested, rank and apply the limit.
fn merge(found: Vec<Opportunity>, options: &ScanOptions) -> Vec<Opportunity> {
    let mut merged = if options.best_per_event {
        let mut best: HashMap<String, Opportunity> = HashMap::new();
        for opportunity in found {
            match best.get(&opportunity.event_id) {
                Some(existing) if existing.profit_margin() >= opportunity.profit_margin() => {}
                _ => {
                    best.insert(opportunity.event_id.clone(), opportunity);
                }
            }
        }
        best.into_values().collect()
    } else {
        found
    };

    merged.sort_by(|a, b| {
        b.profit_margin()
            .cmp(&a.profit_margin())
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(options.limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::generator::EnumerationBudget;
    use crate::odds::{MarketContext, OddsBook};
    use rust_decimal_macros::dec;

    fn market(event: &str, market: &str, home: &str, away: &str) -> MarketSnapshot {
        MarketSnapshot {
            context: MarketContext::new(event, market),
            book: OddsBook::from_quotes([
                ("Home", "A", home.parse().unwrap()),
                ("Home", "B", dec!(1.5)),
                ("Away", "B", away.parse().unwrap()),
                ("Away", "C", dec!(1.5)),
            ]),
        }
    }

    #[tokio::test]
    async fn scan_ranks_and_limits() {
        let markets = vec![
            market("evt-1", "mkt-1", "2.10", "2.20"),
            market("evt-2", "mkt-1", "2.40", "2.40"),
            market("evt-3", "mkt-1", "1.90", "1.90"),
        ];
        let options = ScanOptions {
            limit: 1,
            ..ScanOptions::default()
        };

        let report = scan_markets(markets, SearchParams::default(), options).await;

        assert_eq!(report.markets_scanned, 3);
        assert_eq!(report.opportunities_before_dedup, 2);
        assert_eq!(report.count(), 1);
        assert_eq!(report.opportunities[0].event_id, "evt-2");
    }

    #[tokio::test]
    async fn best_per_event_keeps_top_margin() {
        let book = OddsBook::from_quotes([
            ("Home", "A", dec!(2.10)),
            ("Home", "B", dec!(2.30)),
            ("Away", "C", dec!(2.20)),
        ]);
        let markets = vec![MarketSnapshot {
            context: MarketContext::new("evt-1", "mkt-1"),
            book,
        }];

        let deduped = scan_markets(markets.clone(), SearchParams::default(), ScanOptions::default()).await;
        let all = scan_markets(
            markets,
            SearchParams::default(),
            ScanOptions {
                best_per_event: false,
                ..ScanOptions::default()
            },
        )
        .await;

        assert_eq!(deduped.count(), 1);
        assert_eq!(deduped.opportunities_before_dedup, 2);
        assert_eq!(
            deduped.opportunities[0].combination.selection("Home").unwrap().price,
            dec!(2.30)
        );
        assert_eq!(all.count(), 2);
    }

    #[tokio::test]
    async fn budget_exceeded_market_reports_partial_results() {
        let markets = vec![market("evt-1", "mkt-1", "2.10", "2.20")];
        let params = SearchParams {
            budget: EnumerationBudget {
                max_evaluations: Some(2),
                max_duration: None,
            },
            ..SearchParams::default()
        };

        let report = scan_markets(markets, params, ScanOptions::default()).await;

        assert_eq!(report.truncated_markets, vec!["evt-1/mkt-1".to_string()]);
        assert_eq!(report.count(), 1);
    }

    #[tokio::test]
    async fn invalid_params_mark_markets_failed() {
        let markets = vec![market("evt-1", "mkt-1", "2.10", "2.20")];

        let report = scan_markets(
            markets,
            SearchParams::with_min_profit_margin(dec!(-1)),
            ScanOptions::default(),
        )
        .await;

        assert_eq!(report.failed_markets, vec!["evt-1/mkt-1".to_string()]);
        assert_eq!(report.count(), 0);
    }

    #[tokio::test]
    async fn empty_scan_is_empty_report() {
        let report = scan_markets(Vec::new(), SearchParams::default(), ScanOptions::default()).await;

        assert_eq!(report.markets_scanned, 0);
        assert!(report.opportunities.is_empty());
    }
}
