//! End-to-end tests over the public API: detection, stakes and snapshot scans.

use odds_arb::arbitrage::{
    allocate_stakes, find_opportunities, scan_markets, ScanOptions, SearchParams, StakeRounding,
};
use odds_arb::error::{ArbitrageError, InvalidInput};
use odds_arb::odds::{MarketContext, OddsBook, OddsSnapshot};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn two_way_book() -> OddsBook {
    serde_json::from_str(
        r#"{
            "Home": [{"source": "A", "price": "2.10"}],
            "Away": [{"bookmaker": "B", "odds": 2.20}]
        }"#,
    )
    .unwrap()
}

#[test]
fn two_way_market_yields_one_opportunity() {
    let context = MarketContext::new("evt-1", "mkt-1");

    let opportunities =
        find_opportunities(&two_way_book(), &context, &SearchParams::default()).unwrap();

    assert_eq!(opportunities.len(), 1);
    let margin = opportunities[0].profit_margin();
    assert!(margin > dec!(0.0692) && margin < dec!(0.0693));
    assert_eq!(opportunities[0].selections().len(), 2);
}

#[test]
fn stakes_equalize_payouts() {
    let context = MarketContext::new("evt-1", "mkt-1");
    let opportunity = find_opportunities(&two_way_book(), &context, &SearchParams::default())
        .unwrap()
        .remove(0);

    let plan = allocate_stakes(&opportunity, dec!(1000), StakeRounding::PerSelection).unwrap();

    let home = plan.stakes.iter().find(|s| s.outcome == "Home").unwrap();
    let away = plan.stakes.iter().find(|s| s.outcome == "Away").unwrap();
    assert_eq!(home.stake, dec!(511.63));
    assert_eq!(away.stake, dec!(488.37));
    assert_eq!(home.potential_return, away.potential_return);
    assert_eq!(plan.total_stake, dec!(1000.00));
    assert_eq!(plan.guaranteed_profit, dec!(69.26));
    assert!(plan.worst_case_return() > plan.total_stake);
}

#[test]
fn bookmaker_over_round_has_no_opportunity() {
    let book = OddsBook::from_quotes([
        ("Home", "A", dec!(2.50)),
        ("Draw", "A", dec!(3.20)),
        ("Away", "A", dec!(2.90)),
    ]);

    let opportunities = find_opportunities(
        &book,
        &MarketContext::new("evt-1", "mkt-1"),
        &SearchParams::default(),
    )
    .unwrap();

    assert!(opportunities.is_empty());
}

#[test]
fn zero_bankroll_is_invalid_input() {
    let context = MarketContext::new("evt-1", "mkt-1");
    let opportunity = find_opportunities(&two_way_book(), &context, &SearchParams::default())
        .unwrap()
        .remove(0);

    let result = allocate_stakes(&opportunity, Decimal::ZERO, StakeRounding::PerSelection);

    assert!(matches!(
        result,
        Err(ArbitrageError::InvalidInput(InvalidInput::NonPositiveBankroll(_)))
    ));
}

#[test]
fn snapshot_scan_end_to_end() {
    let json = r#"{
        "events": [
            {"id": "evt-1", "homeTeam": "Arsenal", "awayTeam": "Chelsea",
             "sport": "soccer_epl", "startsAt": "2026-10-18T15:00:00Z"},
            {"id": "evt-2", "homeTeam": "Lakers", "awayTeam": "Celtics"}
        ],
        "odds": [
            {"eventId": "evt-1", "marketId": "h2h-1", "marketType": "h2h", "selection": "Home", "source": "A", "decimal": "3.40"},
            {"eventId": "evt-1", "marketId": "h2h-1", "marketType": "h2h", "selection": "Draw", "source": "B", "decimal": "3.90"},
            {"eventId": "evt-1", "marketId": "h2h-1", "marketType": "h2h", "selection": "Away", "source": "C", "decimal": "3.30"},
            {"eventId": "evt-1", "marketId": "h2h-1", "marketType": "h2h", "selection": "Away", "source": "D", "decimal": "2.80"},
            {"eventId": "evt-1", "marketId": "h2h-1", "marketType": "h2h", "selection": "Away", "source": "E", "decimal": "9.00", "isActive": false},
            {"eventId": "evt-2", "marketId": "tot-1", "marketType": "totals", "selection": "Over", "source": "A", "decimal": "1.90"},
            {"eventId": "evt-2", "marketId": "tot-1", "marketType": "totals", "selection": "Under", "source": "B", "decimal": "1.90"},
            {"eventId": "evt-2", "marketId": "tot-1", "marketType": "totals", "selection": "Under", "decimal": "0"}
        ]
    }"#;

    let snapshot: OddsSnapshot = serde_json::from_str(json).unwrap();
    let markets = snapshot.into_markets().unwrap();
    assert_eq!(markets.len(), 2);

    let report = tokio_test::block_on(scan_markets(
        markets,
        SearchParams::default(),
        ScanOptions::default(),
    ));

    assert_eq!(report.markets_scanned, 2);
    assert_eq!(report.count(), 1);
    let best = &report.opportunities[0];
    assert_eq!(best.id, "evt-1-h2h-1-1");
    assert_eq!(best.combination.selection("Away").unwrap().source, "C");
    assert!(best.expires_at.is_some());

    let plan = allocate_stakes(best, dec!(100), StakeRounding::AbsorbRemainder).unwrap();
    assert_eq!(plan.total_stake, dec!(100.00));
    assert!(plan.payout_spread() <= dec!(0.05));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["opportunities"][0]["marketType"], "MATCH_WINNER");
    assert_eq!(json["marketsScanned"], 2);
}
