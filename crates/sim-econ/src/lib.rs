#![deny(warnings)]

//! Market math for Market Mavericks.
//!
//! This module provides validated utilities for:
//! - Moving a price by a percentage change, rounded to cents
//! - Valuing a position bought at one price and marked at another
//! - Ranking teams into a leaderboard
//! - Drawing seeded, reproducible market moves

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::TeamId;
use thiserror::Error;
use tracing::trace;

/// Errors produced by market helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Reference prices must be strictly positive.
    #[error("invalid price: {0}")]
    InvalidPrice(Decimal),
    /// The change would leave the price at or below zero.
    #[error("price change of {pct}% drives price {price} to {result}")]
    NonPositivePrice {
        price: Decimal,
        pct: Decimal,
        result: Decimal,
    },
    /// Decimal arithmetic overflowed.
    #[error("decimal overflow")]
    Overflow,
    /// Bounds on market moves must be non-negative.
    #[error("invalid bound: {0}")]
    InvalidBound(Decimal),
    /// Numeric conversion failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Round a monetary value to 2 decimal places, midpoint to even.
///
/// Example:
/// assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1234, 2));
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Apply a percentage change: `round(price * (1 + pct / 100), 2)`.
///
/// The result must stay strictly positive.
///
/// Example:
/// let p = apply_price_change(Decimal::new(200_000, 0), Decimal::new(10, 0)).unwrap();
/// assert_eq!(p, Decimal::new(220_000, 0));
pub fn apply_price_change(price: Decimal, pct: Decimal) -> Result<Decimal, EconError> {
    if price <= Decimal::ZERO {
        return Err(EconError::InvalidPrice(price));
    }
    let factor = pct
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|f| Decimal::ONE.checked_add(f))
        .ok_or(EconError::Overflow)?;
    let moved = price.checked_mul(factor).ok_or(EconError::Overflow)?;
    let result = round_money(moved);
    if result <= Decimal::ZERO {
        return Err(EconError::NonPositivePrice { price, pct, result });
    }
    Ok(result)
}

/// Value of `amount` invested at `entry` once the price has moved to `exit`.
///
/// Buys `amount / entry` units and marks them at `exit`. Not rounded.
pub fn position_value(amount: Decimal, entry: Decimal, exit: Decimal) -> Result<Decimal, EconError> {
    if entry <= Decimal::ZERO {
        return Err(EconError::InvalidPrice(entry));
    }
    if amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let units = amount.checked_div(entry).ok_or(EconError::Overflow)?;
    units.checked_mul(exit).ok_or(EconError::Overflow)
}

/// Sum of several positions `(amount, entry, exit)`, rounded to cents.
pub fn portfolio_value<I>(positions: I) -> Result<Decimal, EconError>
where
    I: IntoIterator<Item = (Decimal, Decimal, Decimal)>,
{
    let mut total = Decimal::ZERO;
    for (amount, entry, exit) in positions {
        let v = position_value(amount, entry, exit)?;
        total = total.checked_add(v).ok_or(EconError::Overflow)?;
    }
    Ok(round_money(total))
}

/// One line of a leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based position.
    pub rank: usize,
    pub team: TeamId,
    pub wealth: Decimal,
}

/// Rank teams by wealth, highest first. Equal wealth keeps input order.
pub fn leaderboard(results: Vec<(TeamId, Decimal)>) -> Vec<Standing> {
    let mut sorted = results;
    // Vec::sort_by is stable
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, (team, wealth))| Standing {
            rank: i + 1,
            team,
            wealth,
        })
        .collect()
}

/// Draw `count` whole-percent changes uniformly in `[-bound, bound]`.
///
/// Seeded for reproducibility; the same seed always yields the same moves.
///
/// Example:
/// let moves = random_price_changes(5, Decimal::new(50, 0), 42).unwrap();
/// assert_eq!(moves.len(), 5);
pub fn random_price_changes(
    count: usize,
    bound_pct: Decimal,
    seed: u64,
) -> Result<Vec<Decimal>, EconError> {
    if bound_pct < Decimal::ZERO {
        return Err(EconError::InvalidBound(bound_pct));
    }
    let bound = bound_pct.trunc().to_i64().ok_or(EconError::NonFinite)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let moves: Vec<Decimal> = (0..count)
        .map(|_| Decimal::from(rng.gen_range(-bound..=bound)))
        .collect();
    trace!(seed, ?moves, "drew market moves");
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1234, 2));
        assert_eq!(round_money(Decimal::new(12355, 3)), Decimal::new(1236, 2));
        assert_eq!(round_money(Decimal::new(1234567, 4)), Decimal::new(12346, 2));
    }

    #[test]
    fn price_change_examples() {
        assert_eq!(apply_price_change(d(200_000), d(10)).unwrap(), d(220_000));
        assert_eq!(apply_price_change(d(200_000), d(-20)).unwrap(), d(160_000));
        assert_eq!(apply_price_change(d(200_000), d(0)).unwrap(), d(200_000));
        // 333.33 * 1.07 = 356.6631
        assert_eq!(
            apply_price_change(Decimal::new(33333, 2), d(7)).unwrap(),
            Decimal::new(35666, 2)
        );
    }

    #[test]
    fn price_change_rejects_collapse() {
        assert!(matches!(
            apply_price_change(d(100), d(-100)),
            Err(EconError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            apply_price_change(Decimal::new(1, 2), d(-60)),
            Err(EconError::NonPositivePrice { .. })
        ));
        assert_eq!(
            apply_price_change(Decimal::ZERO, d(10)),
            Err(EconError::InvalidPrice(Decimal::ZERO))
        );
    }

    #[test]
    fn position_value_examples() {
        assert_eq!(position_value(d(200_000), d(200_000), d(220_000)).unwrap(), d(220_000));
        assert_eq!(position_value(d(0), d(200_000), d(1)).unwrap(), Decimal::ZERO);
        assert_eq!(
            position_value(d(1), Decimal::ZERO, d(1)),
            Err(EconError::InvalidPrice(Decimal::ZERO))
        );
    }

    #[test]
    fn portfolio_of_nothing_is_zero() {
        assert_eq!(portfolio_value(Vec::new()).unwrap(), Decimal::ZERO);
        let flat = vec![(d(0), d(200_000), d(260_000)); 5];
        assert_eq!(portfolio_value(flat).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn leaderboard_is_stable() {
        let t = |s: &str| TeamId::new(s);
        let board = leaderboard(vec![
            (t("A"), d(10)),
            (t("B"), d(30)),
            (t("C"), d(10)),
            (t("D"), d(30)),
        ]);
        let order: Vec<_> = board.iter().map(|s| s.team.0.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "A", "C"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[3].rank, 4);
    }

    #[test]
    fn market_moves_are_seeded_and_bounded() {
        let a = random_price_changes(5, d(50), 42).unwrap();
        let b = random_price_changes(5, d(50), 42).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|m| *m >= d(-50) && *m <= d(50)));
        let flat = random_price_changes(3, Decimal::ZERO, 7).unwrap();
        assert_eq!(flat, vec![Decimal::ZERO; 3]);
        assert_eq!(
            random_price_changes(1, d(-1), 7),
            Err(EconError::InvalidBound(d(-1)))
        );
    }

    proptest! {
        #[test]
        fn price_change_matches_formula(cents in 1i64..100_000_000, pct in -50i64..=50) {
            let price = Decimal::new(cents, 2);
            let expected = round_money(price * (Decimal::ONE + Decimal::new(pct, 2)));
            match apply_price_change(price, Decimal::from(pct)) {
                Ok(p) => {
                    prop_assert_eq!(p, expected);
                    prop_assert!(p > Decimal::ZERO);
                }
                Err(EconError::NonPositivePrice { result, .. }) => prop_assert_eq!(result, expected),
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }

        #[test]
        fn full_allocation_is_proportional(capital in 1i64..10_000_000, pct in -50i64..=50) {
            let entry = d(200_000);
            let exit = apply_price_change(entry, Decimal::from(pct)).unwrap();
            let value = portfolio_value(vec![(d(capital), entry, exit)]).unwrap();
            let expected = round_money(d(capital) * (Decimal::ONE + Decimal::new(pct, 2)));
            prop_assert!((value - expected).abs() <= Decimal::new(1, 2));
        }

        #[test]
        fn leaderboard_descending(w in proptest::collection::vec(0i64..1_000, 1..10)) {
            let input: Vec<_> = w.iter().enumerate().map(|(i, x)| (TeamId(format!("T{i}")), d(*x))).collect();
            let board = leaderboard(input);
            for pair in board.windows(2) {
                prop_assert!(pair[0].wealth >= pair[1].wealth);
                if pair[0].wealth == pair[1].wealth {
                    let i0: usize = pair[0].team.0[1..].parse().unwrap();
                    let i1: usize = pair[1].team.0[1..].parse().unwrap();
                    prop_assert!(i0 < i1);
                }
            }
        }
    }
}
