mod engine;
mod monte_carlo;
mod portfolio;
mod stochastic;
mod tax;
mod types;

pub use engine::{
    Growth, HORIZON_AGE, YearFlows, YearIndex, YearOutcome, run_projection, step_year,
};
pub use monte_carlo::{MAX_RUNS, run_monte_carlo};
pub use portfolio::Portfolio;
pub use stochastic::{MarketYear, ReturnModel, ReturnModelError};
pub use tax::federal_income_tax;
pub use types::{
    AfterTaxIncome, Asset, AssetKind, AssetSubtotals, MonteCarloRequest, MonteCarloResult,
    OneTimeExpense, OtherAsset, PercentileDataPoint, ProjectionMetrics, ProjectionResult,
    ReturnDistributionPoint, Scenario, Stream, TaxTreatment, TimelineEntry,
};
