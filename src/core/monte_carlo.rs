use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::engine::{Growth, HORIZON_AGE, YearIndex, step_year};
use super::portfolio::Portfolio;
use super::stochastic::{ReturnModel, ReturnModelError};
use super::types::{
    MonteCarloRequest, MonteCarloResult, PercentileDataPoint, ReturnDistributionPoint, Scenario,
};

pub const MAX_RUNS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct RunYear {
    net_worth: f64,
    stock_return: f64,
}

#[derive(Debug)]
struct RunOutcome {
    years: Vec<RunYear>,
    success: bool,
}

struct SampleAccumulator {
    net_worth: Vec<Vec<f64>>,
    stock_returns: Vec<Vec<f64>>,
}

impl SampleAccumulator {
    fn new(year_count: usize, expected_samples: usize) -> Self {
        let make = || {
            (0..year_count)
                .map(|_| Vec::with_capacity(expected_samples))
                .collect::<Vec<_>>()
        };
        Self {
            net_worth: make(),
            stock_returns: make(),
        }
    }

    fn push_run(&mut self, years: &[RunYear]) {
        for (idx, year) in years.iter().enumerate() {
            self.net_worth[idx].push(year.net_worth);
            self.stock_returns[idx].push(year.stock_return);
        }
    }

    fn into_points(
        mut self,
        indices: &[YearIndex],
    ) -> (Vec<PercentileDataPoint>, Vec<ReturnDistributionPoint>) {
        let mut percentile_data = Vec::with_capacity(indices.len());
        let mut box_data = Vec::with_capacity(indices.len());
        for (idx, index) in indices.iter().enumerate() {
            let worth = &mut self.net_worth[idx];
            percentile_data.push(PercentileDataPoint {
                age: index.age,
                year: index.year,
                p10: percentile(worth, 10.0),
                p25: percentile(worth, 25.0),
                p50: percentile(worth, 50.0),
                p75: percentile(worth, 75.0),
                p90: percentile(worth, 90.0),
                mean: mean(worth),
            });

            let returns = &mut self.stock_returns[idx];
            box_data.push(ReturnDistributionPoint {
                age: index.age,
                year: index.year,
                min: percentile(returns, 0.0),
                q1: percentile(returns, 25.0),
                median: percentile(returns, 50.0),
                q3: percentile(returns, 75.0),
                max: percentile(returns, 100.0),
                p10: percentile(returns, 10.0),
                p90: percentile(returns, 90.0),
            });
        }
        (percentile_data, box_data)
    }
}

pub fn run_monte_carlo(request: &MonteCarloRequest) -> Result<MonteCarloResult, ReturnModelError> {
    let num_runs = request.num_runs.clamp(1, MAX_RUNS as i64) as u32;
    let scenario = &request.params;
    let model = ReturnModel::new(
        request.stock_volatility,
        request.real_estate_volatility,
        request.inflation_volatility,
        scenario.general_inflation,
    )?;
    let base_seed = request.seed.unwrap_or_else(rand::random);

    let indices: Vec<YearIndex> = (scenario.current_age..=HORIZON_AGE)
        .map(|age| YearIndex::new(scenario, age))
        .collect();
    let mut acc = SampleAccumulator::new(indices.len(), num_runs as usize);
    let mut successes = 0_u32;

    for run_index in 0..num_runs {
        let mut rng = ChaCha8Rng::seed_from_u64(derive_run_seed(base_seed, run_index));
        let run = simulate_run(scenario, &indices, &model, &mut rng);
        if run.success {
            successes += 1;
        }
        acc.push_run(&run.years);
    }

    let success_rate = successes as f64 / num_runs as f64 * 100.0;
    info!(num_runs, seed = base_seed, success_rate, "monte carlo complete");

    let (percentile_data, stock_return_box_data) = acc.into_points(&indices);
    Ok(MonteCarloResult {
        percentile_data,
        stock_return_box_data,
        success_rate,
        num_runs,
    })
}

fn simulate_run<R: Rng + ?Sized>(
    scenario: &Scenario,
    indices: &[YearIndex],
    model: &ReturnModel,
    rng: &mut R,
) -> RunOutcome {
    let mut portfolio = Portfolio::from_assets(&scenario.assets);
    let mut years = Vec::with_capacity(indices.len());
    let mut success = true;

    for &index in indices {
        let market = model.sample_year(rng);
        let (next, outcome) = step_year(scenario, portfolio, index, Growth::Sampled(market));
        portfolio = next;

        if !outcome.fully_funded && index.age < HORIZON_AGE {
            success = false;
        }
        years.push(RunYear {
            net_worth: outcome.entry.nominal_net_worth,
            stock_return: outcome.stock_return.unwrap_or(market.stock_shock),
        });
    }

    RunOutcome { years, success }
}

fn derive_run_seed(base_seed: u64, run_index: u32) -> u64 {
    splitmix64(splitmix64(base_seed) ^ run_index as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Linear interpolation between order statistics at rank `(n - 1) * p`.
/// Sorts `values` in place; returns 0 for an empty sample.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::run_projection;
    use crate::core::types::{Asset, Stream, TaxTreatment};
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn asset(name: &str, value: f64, growth_rate: f64, treatment: TaxTreatment) -> Asset {
        Asset {
            name: name.to_string(),
            value,
            growth_rate,
            tax_treatment: treatment,
            kind: None,
        }
    }

    fn sample_scenario() -> Scenario {
        Scenario {
            current_year: 2025,
            current_age: 60,
            target_retirement_age: 60,
            retirement_withdrawal_age: 60,
            general_inflation: 0.03,
            assets: vec![
                asset("401k", 600_000.0, 0.055, TaxTreatment::PreTax),
                asset("Roth IRA", 80_000.0, 0.055, TaxTreatment::Roth),
                asset("Brokerage (Stocks)", 250_000.0, 0.055, TaxTreatment::Taxable),
                asset("Bitcoin", 50_000.0, 0.07, TaxTreatment::Taxable),
                asset("Rental Portfolio", 400_000.0, 0.02, TaxTreatment::RealEstate),
                asset("Primary Home", 750_000.0, 0.02, TaxTreatment::RealEstate),
            ],
            inflows: vec![Stream {
                name: "Social Security".to_string(),
                amount: 34_000.0,
                start_year: 2032,
                end_year: 2090,
                growth_rate: Some(0.025),
            }],
            outflows: vec![Stream {
                name: "Living Expenses".to_string(),
                amount: 90_000.0,
                start_year: 2025,
                end_year: 2090,
                growth_rate: None,
            }],
            other_assets: Vec::new(),
            one_time_expenses: Vec::new(),
        }
    }

    fn request(seed: Option<u64>, num_runs: i64) -> MonteCarloRequest {
        MonteCarloRequest {
            params: sample_scenario(),
            num_runs,
            stock_volatility: 0.16,
            real_estate_volatility: 0.05,
            inflation_volatility: 0.01,
            seed,
        }
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_approx(percentile(&mut values, 25.0), 1.75);
        assert_approx(percentile(&mut values, 0.0), 1.0);
        assert_approx(percentile(&mut values, 100.0), 4.0);
        assert_approx(percentile(&mut values, 50.0), 2.5);
    }

    #[test]
    fn empty_samples_summarize_to_zero() {
        assert_eq!(percentile(&mut [], 50.0), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn same_seed_reproduces_results_bit_for_bit() {
        let a = run_monte_carlo(&request(Some(42), 40)).expect("valid request");
        let b = run_monte_carlo(&request(Some(42), 40)).expect("valid request");
        assert_eq!(a.percentile_data, b.percentile_data);
        assert_eq!(a.stock_return_box_data, b.stock_return_box_data);
        assert_eq!(a.success_rate.to_bits(), b.success_rate.to_bits());

        let c = run_monte_carlo(&request(Some(43), 40)).expect("valid request");
        assert_ne!(a.percentile_data, c.percentile_data);
    }

    #[test]
    fn run_count_is_clamped() {
        let low = run_monte_carlo(&request(Some(1), 0)).expect("valid request");
        assert_eq!(low.num_runs, 1);
        let negative = run_monte_carlo(&request(Some(1), -5)).expect("valid request");
        assert_eq!(negative.num_runs, 1);

        let mut req = request(Some(1), 5_000);
        req.params.current_age = 94;
        let high = run_monte_carlo(&req).expect("valid request");
        assert_eq!(high.num_runs, MAX_RUNS);
    }

    #[test]
    fn output_covers_every_age_through_horizon() {
        let result = run_monte_carlo(&request(Some(7), 25)).expect("valid request");
        assert_eq!(result.percentile_data.len(), (95 - 60 + 1) as usize);
        assert_eq!(result.stock_return_box_data.len(), result.percentile_data.len());
        assert_eq!(result.percentile_data[0].age, 60);
        assert_eq!(result.percentile_data[0].year, 2025);
        assert_eq!(result.percentile_data.last().map(|p| p.age), Some(95));
        assert!((0.0..=100.0).contains(&result.success_rate));

        for point in &result.percentile_data {
            assert!(point.p10 <= point.p25);
            assert!(point.p25 <= point.p50);
            assert!(point.p50 <= point.p75);
            assert!(point.p75 <= point.p90);
        }
        for point in &result.stock_return_box_data {
            assert!(point.min <= point.p10 && point.p10 <= point.q1);
            assert!(point.q1 <= point.median && point.median <= point.q3);
            assert!(point.q3 <= point.p90 && point.p90 <= point.max);
            assert!(point.min >= -0.95 && point.max <= 1.5);
        }
    }

    #[test]
    fn zero_volatility_matches_deterministic_projection() {
        let mut req = request(Some(5), 10);
        req.stock_volatility = 0.0;
        req.real_estate_volatility = 0.0;
        req.inflation_volatility = 0.0;

        let monte_carlo = run_monte_carlo(&req).expect("valid request");
        let deterministic = run_projection(&req.params);

        for (point, entry) in monte_carlo
            .percentile_data
            .iter()
            .zip(deterministic.timeline.iter())
        {
            let tol = 1e-9 * entry.nominal_net_worth.abs().max(1.0);
            assert!((point.p10 - entry.nominal_net_worth).abs() <= tol);
            assert!((point.p90 - entry.nominal_net_worth).abs() <= tol);
            assert!((point.mean - entry.nominal_net_worth).abs() <= tol);
        }
    }

    #[test]
    fn unfunded_years_before_horizon_fail_the_run() {
        let mut req = request(Some(3), 20);
        req.params.assets = vec![asset("Brokerage", 1_000.0, 0.05, TaxTreatment::Taxable)];
        let result = run_monte_carlo(&req).expect("valid request");
        assert_eq!(result.success_rate, 0.0);

        req.params.outflows.clear();
        let result = run_monte_carlo(&req).expect("valid request");
        assert_eq!(result.success_rate, 100.0);
    }

    #[test]
    fn unfunded_horizon_year_alone_does_not_fail_the_run() {
        let mut req = request(Some(3), 5);
        req.params.current_age = 95;
        req.params.assets.clear();
        let result = run_monte_carlo(&req).expect("valid request");
        assert_eq!(result.percentile_data.len(), 1);
        assert_eq!(result.success_rate, 100.0);
    }

    #[test]
    fn run_seeds_differ_per_run() {
        assert_ne!(derive_run_seed(42, 0), derive_run_seed(42, 1));
        assert_ne!(derive_run_seed(42, 0), derive_run_seed(43, 0));
    }

    #[test]
    fn result_serializes_with_camel_case_keys() {
        let result = run_monte_carlo(&request(Some(11), 3)).expect("valid request");
        let json = serde_json::to_value(&result).expect("result should serialize");
        assert!(json["percentileData"].is_array());
        assert!(json["stockReturnBoxData"].is_array());
        assert!(json["successRate"].is_number());
        assert_eq!(json["numRuns"], 3);
        let p50 = json["percentileData"][0]["p50"].as_f64().expect("numeric p50");
        assert_eq!(p50, p50.round());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_percentiles_are_ordered(samples in vec(-1.0e7f64..1.0e7, 1..200)) {
            let mut values = samples.clone();
            let p10 = percentile(&mut values, 10.0);
            let p25 = percentile(&mut values, 25.0);
            let p50 = percentile(&mut values, 50.0);
            let p75 = percentile(&mut values, 75.0);
            let p90 = percentile(&mut values, 90.0);
            prop_assert!(p10 <= p25 + 1e-9);
            prop_assert!(p25 <= p50 + 1e-9);
            prop_assert!(p50 <= p75 + 1e-9);
            prop_assert!(p75 <= p90 + 1e-9);
        }

        #[test]
        fn prop_symmetric_sample_median_equals_mean(
            half in vec(0.0f64..1.0e6, 1..100),
            center in -1.0e6f64..1.0e6,
        ) {
            let mut values: Vec<f64> = half
                .iter()
                .flat_map(|d| [center - d, center + d])
                .collect();
            let avg = mean(&values);
            let median = percentile(&mut values, 50.0);
            prop_assert!((median - avg).abs() <= 1e-6 * center.abs().max(1.0) + 1e-3);
        }
    }
}
