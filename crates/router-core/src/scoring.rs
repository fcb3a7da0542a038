//! Quote scoring and ranking.
//!
//! Pure functions over one aggregation round's successful quotes. Each
//! quote receives four sub-scores in [0, 1] which combine into a weighted
//! composite; the ordering is fully deterministic, with ties broken by
//! response time and then provider name.

use router_types::{normalized_ratio, ProviderQuote};
use rust_decimal::Decimal;

// Composite weights. Fixed constants for now; they sum to 1.
const PRICE_WEIGHT: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5
const GAS_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 1); // 0.2
const CONFIDENCE_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 1); // 0.2
const TIME_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 1); // 0.1

/// Neutral gas score for quotes that report no estimate.
const NEUTRAL_GAS_SCORE: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5

/// Scores and ranks the successful quotes in place.
///
/// Rank 1 is the highest composite; ranks 2..N follow in descending
/// composite order. Failed quotes keep `rank = None`. Returns the index
/// of the winning quote, or `None` when nothing succeeded.
pub fn rank_quotes(quotes: &mut [ProviderQuote]) -> Option<usize> {
	let successes: Vec<usize> = quotes
		.iter()
		.enumerate()
		.filter(|(_, q)| q.success)
		.map(|(i, _)| i)
		.collect();
	if successes.is_empty() {
		return None;
	}

	let mut scored: Vec<(usize, Decimal)> = successes
		.iter()
		.map(|&i| (i, composite_score(&quotes[i], quotes, &successes)))
		.collect();

	// Deterministic total order: composite desc, response time asc,
	// provider name asc.
	scored.sort_by(|(a, score_a), (b, score_b)| {
		score_b
			.cmp(score_a)
			.then_with(|| quotes[*a].response_time_ms.cmp(&quotes[*b].response_time_ms))
			.then_with(|| quotes[*a].provider.cmp(&quotes[*b].provider))
	});

	for (rank, (index, _)) in scored.iter().enumerate() {
		quotes[*index].rank = Some(rank as u32 + 1);
	}

	scored.first().map(|(index, _)| *index)
}

fn composite_score(quote: &ProviderQuote, quotes: &[ProviderQuote], successes: &[usize]) -> Decimal {
	PRICE_WEIGHT * price_score(quote, quotes, successes)
		+ GAS_WEIGHT * gas_score(quote, quotes, successes)
		+ CONFIDENCE_WEIGHT * quote.confidence
		+ TIME_WEIGHT * time_score(quote.response_time_ms)
}

/// Linear min-max normalization of the output amount across the round.
fn price_score(quote: &ProviderQuote, quotes: &[ProviderQuote], successes: &[usize]) -> Decimal {
	let amounts = successes.iter().map(|&i| quotes[i].amount_out);
	let min = amounts.clone().min().unwrap_or_default();
	let max = amounts.max().unwrap_or_default();
	if max == min {
		return Decimal::ONE;
	}
	normalized_ratio(quote.amount_out - min, max - min)
}

/// Inverted min-max normalization of gas: cheaper execution scores
/// higher. Quotes without an estimate sit at the neutral midpoint.
fn gas_score(quote: &ProviderQuote, quotes: &[ProviderQuote], successes: &[usize]) -> Decimal {
	if quote.gas_estimate == 0 {
		return NEUTRAL_GAS_SCORE;
	}
	let estimates = successes
		.iter()
		.map(|&i| quotes[i].gas_estimate)
		.filter(|&gas| gas > 0);
	let min = estimates.clone().min().unwrap_or_default();
	let max = estimates.max().unwrap_or_default();
	if max == min {
		return Decimal::ONE;
	}
	Decimal::ONE - Decimal::from(quote.gas_estimate - min) / Decimal::from(max - min)
}

/// Stepped responsiveness score.
fn time_score(response_time_ms: u64) -> Decimal {
	match response_time_ms {
		0..=200 => Decimal::ONE,
		201..=500 => Decimal::new(8, 1),
		501..=1000 => Decimal::new(6, 1),
		1001..=2000 => Decimal::new(4, 1),
		_ => Decimal::new(2, 1),
	}
}
