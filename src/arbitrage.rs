//! Arbitrage opportunity calculation.
//!
//! Pure function over a snapshot: every unordered pair of exchanges with
//! both prices present becomes an opportunity, ranked by percentage
//! spread. Nothing here does I/O or caches.

use crate::types::{ArbitrageOpportunity, ExchangeId, Snapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Ranks the price spreads in `snapshot`, largest percentage first; ties
/// break on exchange-name order so output is deterministic. Quotes with
/// errors are excluded from every pair; fewer than two priced quotes
/// yield an empty list.
pub fn opportunities(snapshot: &Snapshot) -> Vec<ArbitrageOpportunity> {
    let priced: Vec<(ExchangeId, Decimal)> = snapshot
        .quotes
        .iter()
        .filter_map(|q| q.price.map(|p| (q.exchange, p)))
        .collect();

    let mut out = Vec::with_capacity(priced.len() * priced.len().saturating_sub(1) / 2);
    for i in 0..priced.len() {
        for j in (i + 1)..priced.len() {
            let (ex_a, price_a) = priced[i];
            let (ex_b, price_b) = priced[j];

            let price_difference = (price_a - price_b).abs();
            let average = (price_a + price_b) / dec!(2);
            let percentage_difference = price_difference / average * dec!(100);

            let (buy_exchange, sell_exchange) = if price_a <= price_b {
                (ex_a, ex_b)
            } else {
                (ex_b, ex_a)
            };

            out.push(ArbitrageOpportunity {
                buy_exchange,
                sell_exchange,
                price_difference,
                percentage_difference,
            });
        }
    }

    out.sort_by(|a, b| {
        b.percentage_difference
            .cmp(&a.percentage_difference)
            .then_with(|| a.buy_exchange.cmp(&b.buy_exchange))
            .then_with(|| a.sell_exchange.cmp(&b.sell_exchange))
    });
    out
}
