use tracing::{debug, info};

use super::portfolio::{AssetClass, Portfolio};
use super::stochastic::MarketYear;
use super::tax::{distribution_divisor, federal_income_tax};
use super::types::{AfterTaxIncome, ProjectionMetrics, ProjectionResult, Scenario, TimelineEntry};

pub const HORIZON_AGE: u32 = 95;

const FUNDING_TOLERANCE: f64 = 1.0;
const WATERFALL_STOP: f64 = 0.1;
const DIVIDEND_YIELD: f64 = 0.02;
const CAPITAL_GAINS_RATE: f64 = 0.15;

const WATERFALL: [(AssetClass, f64); 5] = [
    (AssetClass::Brokerage, CAPITAL_GAINS_RATE),
    (AssetClass::Bitcoin, CAPITAL_GAINS_RATE),
    (AssetClass::RetirementTraditional, 0.25),
    (AssetClass::RentalProperty, CAPITAL_GAINS_RATE),
    (AssetClass::RetirementRoth, 0.0),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InflowCategory {
    Wages,
    Rental,
    Royalties,
    SocialSecurity,
    Other,
}

impl InflowCategory {
    fn from_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if lowered.contains("w2") || lowered.contains("salary") {
            InflowCategory::Wages
        } else if lowered.contains("rental") {
            InflowCategory::Rental
        } else if lowered.contains("royalt") {
            InflowCategory::Royalties
        } else if lowered.contains("social") {
            InflowCategory::SocialSecurity
        } else {
            InflowCategory::Other
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IncomeBreakdown {
    pub w2_income: f64,
    pub rental_income: f64,
    pub royalty_income: f64,
    pub dividend_income: f64,
    pub social_security: f64,
    pub retirement_withdrawals: f64,
    pub brokerage_withdrawals: f64,
    pub bitcoin_withdrawals: f64,
    pub roth_withdrawals: f64,
    pub other_income: f64,
}

impl IncomeBreakdown {
    pub fn taxable_total(&self) -> f64 {
        self.w2_income
            + self.rental_income
            + self.royalty_income
            + self.dividend_income
            + self.social_security
            + self.retirement_withdrawals
            + self.other_income
    }

    pub fn passive_total(&self) -> f64 {
        self.rental_income
            + self.dividend_income
            + self.royalty_income
            + self.social_security
            + self.retirement_withdrawals
    }

    pub fn after_tax(&self, effective_rate: f64) -> AfterTaxIncome {
        let keep = 1.0 - effective_rate;
        let capital_keep = 1.0 - CAPITAL_GAINS_RATE;
        AfterTaxIncome {
            w2_income: self.w2_income * keep,
            rental_income: self.rental_income * keep,
            royalty_income: self.royalty_income * keep,
            dividend_income: self.dividend_income * keep,
            social_security: self.social_security * keep,
            retirement_withdrawals: self.retirement_withdrawals * keep,
            brokerage_withdrawals: self.brokerage_withdrawals * capital_keep,
            bitcoin_withdrawals: self.bitcoin_withdrawals * capital_keep,
            roth_withdrawals: self.roth_withdrawals,
        }
    }

    fn withdrawal_total(&self) -> f64 {
        self.retirement_withdrawals
            + self.brokerage_withdrawals
            + self.bitcoin_withdrawals
            + self.roth_withdrawals
    }

    fn record_withdrawal(&mut self, class: AssetClass, gross: f64) {
        match class {
            AssetClass::Brokerage | AssetClass::RentalProperty => {
                self.brokerage_withdrawals += gross
            }
            AssetClass::Bitcoin => self.bitcoin_withdrawals += gross,
            AssetClass::RetirementTraditional => self.retirement_withdrawals += gross,
            AssetClass::RetirementRoth => self.roth_withdrawals += gross,
            AssetClass::PrimaryHome => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct YearIndex {
    pub age: u32,
    pub year: i32,
    pub years_passed: u32,
}

impl YearIndex {
    pub fn new(scenario: &Scenario, age: u32) -> Self {
        let years_passed = age.saturating_sub(scenario.current_age);
        Self {
            age,
            year: scenario.current_year + years_passed as i32,
            years_passed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Growth {
    Configured,
    Sampled(MarketYear),
}

impl Growth {
    fn stream_inflation(&self, base: f64) -> f64 {
        match self {
            Growth::Configured => base,
            Growth::Sampled(market) => market.inflation.unwrap_or(base),
        }
    }

    fn apply(&self, portfolio: &mut Portfolio) {
        match self {
            Growth::Configured => portfolio.grow_with(|bucket| bucket.growth_rate),
            Growth::Sampled(market) => portfolio.grow_with(|bucket| market.bucket_return(bucket)),
        }
    }
}

// Money moved into and out of the buckets during the year, before growth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YearFlows {
    pub credited: f64,
    pub distributions: f64,
    pub withdrawals: f64,
    pub reinvested: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearOutcome {
    pub entry: TimelineEntry,
    pub fully_funded: bool,
    pub ran_waterfall: bool,
    pub shortfall: f64,
    pub passive_covers_expenses: bool,
    pub stock_return: Option<f64>,
    pub flows: YearFlows,
}

pub fn step_year(
    scenario: &Scenario,
    mut portfolio: Portfolio,
    index: YearIndex,
    growth: Growth,
) -> (Portfolio, YearOutcome) {
    let stream_inflation = growth.stream_inflation(scenario.general_inflation);
    let tax_inflation = scenario.general_inflation;

    let mut flows = YearFlows::default();
    let (one_time_expenses, credited) = apply_one_time_events(scenario, &mut portfolio, index.year);
    flows.credited = credited;
    let target_expenses =
        recurring_expenses(scenario, index, stream_inflation) + one_time_expenses;

    let mut income = aggregate_income(scenario, &mut portfolio, index, stream_inflation);
    flows.distributions = income.withdrawal_total();
    let mut taxable_income = income.taxable_total();
    let initial_tax = federal_income_tax(taxable_income, index.years_passed, tax_inflation);
    let surplus = taxable_income - initial_tax - target_expenses;

    let ran_waterfall = surplus < -FUNDING_TOLERANCE;
    let mut shortfall = 0.0;
    let fully_funded = if ran_waterfall {
        let remaining = run_waterfall(
            &mut portfolio,
            &mut income,
            &mut taxable_income,
            -surplus,
            index.age,
            scenario.retirement_withdrawal_age,
        );
        flows.withdrawals = income.withdrawal_total() - flows.distributions;
        if remaining > FUNDING_TOLERANCE {
            shortfall = remaining;
            debug!(age = index.age, year = index.year, shortfall, "year left unfunded");
            false
        } else {
            true
        }
    } else {
        if surplus > FUNDING_TOLERANCE {
            if let Some(target) = portfolio.surplus_target() {
                portfolio.credit(target, surplus);
                flows.reinvested = surplus;
            }
        }
        true
    };

    let final_tax = federal_income_tax(taxable_income, index.years_passed, tax_inflation);
    let effective_rate = if taxable_income > 0.0 {
        final_tax / taxable_income
    } else {
        0.0
    };

    let mut after_tax = income.after_tax(effective_rate);
    if ran_waterfall && fully_funded {
        let charted = after_tax.total();
        if charted > 0.0 {
            after_tax.scale(target_expenses / charted);
        }
    }

    let passive_covers_expenses =
        income.passive_total() * (1.0 - effective_rate) > target_expenses;

    let nominal_net_worth = portfolio.total_value();
    let price_index = (1.0 + scenario.general_inflation).powi(index.years_passed as i32);
    let entry = TimelineEntry {
        year: index.year,
        age: index.age,
        nominal_net_worth,
        real_net_worth: nominal_net_worth / price_index,
        total_expenses: target_expenses,
        after_tax,
        assets: portfolio.subtotals(),
    };

    let stock_return = match growth {
        Growth::Configured => None,
        Growth::Sampled(market) => Some(market.stock_return(&portfolio)),
    };
    growth.apply(&mut portfolio);

    (
        portfolio,
        YearOutcome {
            entry,
            fully_funded,
            ran_waterfall,
            shortfall,
            passive_covers_expenses,
            stock_return,
            flows,
        },
    )
}

pub fn run_projection(scenario: &Scenario) -> ProjectionResult {
    let mut portfolio = Portfolio::from_assets(&scenario.assets);
    let mut timeline = Vec::new();
    let mut freedom_year = None;
    let mut unfunded_years = 0_u32;

    for age in scenario.current_age..=HORIZON_AGE {
        let index = YearIndex::new(scenario, age);
        let (next, outcome) = step_year(scenario, portfolio, index, Growth::Configured);
        portfolio = next;

        if freedom_year.is_none() && outcome.passive_covers_expenses {
            freedom_year = Some(index.year);
        }
        if !outcome.fully_funded {
            unfunded_years += 1;
        }
        timeline.push(outcome.entry);
    }

    info!(
        years = timeline.len(),
        unfunded_years,
        freedom_year = ?freedom_year,
        "deterministic projection complete"
    );

    let entry_at = |age: u32| timeline.iter().find(|entry| entry.age == age).cloned();
    let metrics = ProjectionMetrics {
        nw_at_retirement: entry_at(scenario.target_retirement_age),
        nw_at_90: entry_at(90),
        nw_at_95: entry_at(95),
    };

    ProjectionResult {
        timeline,
        freedom_year,
        metrics,
    }
}

// Returns this year's one-time expenses and the amount credited to buckets.
// Expenses flagged for the primary home are both spent and added to its value.
fn apply_one_time_events(
    scenario: &Scenario,
    portfolio: &mut Portfolio,
    year: i32,
) -> (f64, f64) {
    let mut credited = 0.0;
    for lump in scenario
        .other_assets
        .iter()
        .filter(|lump| lump.add_year == year && lump.value > 0.0)
    {
        if let Some(target) = portfolio.first_of(AssetClass::Brokerage) {
            portfolio.credit(target, lump.value);
            credited += lump.value;
        }
    }

    let mut total = 0.0;
    for expense in scenario
        .one_time_expenses
        .iter()
        .filter(|expense| expense.year == year && expense.amount > 0.0)
    {
        total += expense.amount;
        if expense.add_to_primary_home {
            if let Some(home) = portfolio.first_of(AssetClass::PrimaryHome) {
                portfolio.credit(home, expense.amount);
                credited += expense.amount;
            }
        }
    }
    (total, credited)
}

fn recurring_expenses(scenario: &Scenario, index: YearIndex, stream_inflation: f64) -> f64 {
    scenario
        .outflows
        .iter()
        .filter(|stream| stream.is_active(index.year))
        .map(|stream| stream.amount_in(index.years_passed, stream_inflation))
        .sum()
}

pub fn aggregate_income(
    scenario: &Scenario,
    portfolio: &mut Portfolio,
    index: YearIndex,
    stream_inflation: f64,
) -> IncomeBreakdown {
    let mut income = IncomeBreakdown::default();

    for stream in scenario
        .inflows
        .iter()
        .filter(|stream| stream.is_active(index.year))
    {
        let amount = stream.amount_in(index.years_passed, stream_inflation);
        match InflowCategory::from_name(&stream.name) {
            InflowCategory::Wages => income.w2_income += amount,
            InflowCategory::Rental => {
                income.rental_income += amount * portfolio.rental_equity_fraction()
            }
            InflowCategory::Royalties => income.royalty_income += amount,
            InflowCategory::SocialSecurity => income.social_security += amount,
            InflowCategory::Other => income.other_income += amount,
        }
    }

    income.dividend_income = portfolio.dividend_base() * DIVIDEND_YIELD;
    income.retirement_withdrawals += take_mandatory_distributions(portfolio, index.age);
    income
}

fn take_mandatory_distributions(portfolio: &mut Portfolio, age: u32) -> f64 {
    let divisor = distribution_divisor(age);
    if divisor <= 0.0 {
        return 0.0;
    }

    let mut total = 0.0;
    for idx in portfolio.indices_of(AssetClass::RetirementTraditional) {
        let value = portfolio.value_at(idx);
        if value > 0.0 {
            total += portfolio.withdraw(idx, value / divisor);
        }
    }
    total
}

fn run_waterfall(
    portfolio: &mut Portfolio,
    income: &mut IncomeBreakdown,
    taxable_income: &mut f64,
    mut needed: f64,
    age: u32,
    retirement_withdrawal_age: u32,
) -> f64 {
    for (class, assumed_tax) in WATERFALL {
        if needed <= WATERFALL_STOP {
            break;
        }
        if class == AssetClass::RetirementTraditional && age < retirement_withdrawal_age {
            continue;
        }

        let net_share = 1.0 - assumed_tax;
        for idx in portfolio.indices_of(class) {
            if portfolio.value_at(idx) <= 0.0 {
                continue;
            }

            let take = portfolio.withdraw(idx, needed / net_share);
            match class {
                AssetClass::RetirementTraditional => *taxable_income += take,
                AssetClass::RentalProperty => {
                    let balance_after = portfolio.value_at(idx);
                    portfolio.record_rental_sale(take, balance_after);
                }
                _ => {}
            }
            income.record_withdrawal(class, take);
            needed -= take * net_share;

            if needed <= WATERFALL_STOP {
                break;
            }
        }
    }
    needed
}
