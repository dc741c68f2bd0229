use serde::{Deserialize, Serialize, Serializer};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxTreatment {
    Taxable,
    PreTax,
    Roth,
    RealEstate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Standard,
    Bitcoin,
    Primary,
}

impl AssetKind {
    pub fn infer(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if lowered.contains("primary") {
            AssetKind::Primary
        } else if lowered.contains("bitcoin") {
            AssetKind::Bitcoin
        } else {
            AssetKind::Standard
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub value: f64,
    pub growth_rate: f64,
    pub tax_treatment: TaxTreatment,
    #[serde(default)]
    pub kind: Option<AssetKind>,
}

impl Asset {
    pub fn resolved_kind(&self) -> AssetKind {
        self.kind.unwrap_or_else(|| AssetKind::infer(&self.name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub name: String,
    pub amount: f64,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub growth_rate: Option<f64>,
}

impl Stream {
    pub fn is_active(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    pub fn amount_in(&self, years_passed: u32, default_growth: f64) -> f64 {
        let rate = self.growth_rate.unwrap_or(default_growth);
        self.amount * (1.0 + rate).powi(years_passed as i32)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtherAsset {
    pub name: String,
    pub value: f64,
    pub add_year: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneTimeExpense {
    pub name: String,
    pub amount: f64,
    pub year: i32,
    #[serde(default)]
    pub add_to_primary_home: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_current_year")]
    pub current_year: i32,
    #[serde(default = "default_current_age")]
    pub current_age: u32,
    pub target_retirement_age: u32,
    #[serde(default = "default_retirement_withdrawal_age")]
    pub retirement_withdrawal_age: u32,
    pub general_inflation: f64,
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub inflows: Vec<Stream>,
    #[serde(default)]
    pub outflows: Vec<Stream>,
    #[serde(default)]
    pub other_assets: Vec<OtherAsset>,
    #[serde(default)]
    pub one_time_expenses: Vec<OneTimeExpense>,
}

fn default_current_year() -> i32 {
    2025
}

fn default_current_age() -> u32 {
    38
}

fn default_retirement_withdrawal_age() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonteCarloRequest {
    pub params: Scenario,
    #[serde(default = "default_num_runs")]
    pub num_runs: i64,
    #[serde(default = "default_stock_volatility")]
    pub stock_volatility: f64,
    #[serde(default = "default_real_estate_volatility")]
    pub real_estate_volatility: f64,
    #[serde(default)]
    pub inflation_volatility: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_runs() -> i64 {
    500
}

fn default_stock_volatility() -> f64 {
    0.15
}

fn default_real_estate_volatility() -> f64 {
    0.05
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AfterTaxIncome {
    #[serde(rename = "w2_income_after_tax", serialize_with = "round_whole")]
    pub w2_income: f64,
    #[serde(rename = "rental_income_after_tax", serialize_with = "round_whole")]
    pub rental_income: f64,
    #[serde(rename = "royalty_income_after_tax", serialize_with = "round_whole")]
    pub royalty_income: f64,
    #[serde(rename = "dividend_income_after_tax", serialize_with = "round_whole")]
    pub dividend_income: f64,
    #[serde(rename = "social_security_after_tax", serialize_with = "round_whole")]
    pub social_security: f64,
    #[serde(
        rename = "retirement_withdrawals_after_tax",
        serialize_with = "round_whole"
    )]
    pub retirement_withdrawals: f64,
    #[serde(
        rename = "brokerage_withdrawals_after_tax",
        serialize_with = "round_whole"
    )]
    pub brokerage_withdrawals: f64,
    #[serde(
        rename = "bitcoin_withdrawals_after_tax",
        serialize_with = "round_whole"
    )]
    pub bitcoin_withdrawals: f64,
    #[serde(rename = "roth_withdrawals_after_tax", serialize_with = "round_whole")]
    pub roth_withdrawals: f64,
}

impl AfterTaxIncome {
    pub fn total(&self) -> f64 {
        self.w2_income
            + self.rental_income
            + self.royalty_income
            + self.dividend_income
            + self.social_security
            + self.retirement_withdrawals
            + self.brokerage_withdrawals
            + self.bitcoin_withdrawals
            + self.roth_withdrawals
    }

    pub fn scale(&mut self, factor: f64) {
        for value in [
            &mut self.w2_income,
            &mut self.rental_income,
            &mut self.royalty_income,
            &mut self.dividend_income,
            &mut self.social_security,
            &mut self.retirement_withdrawals,
            &mut self.brokerage_withdrawals,
            &mut self.bitcoin_withdrawals,
            &mut self.roth_withdrawals,
        ] {
            *value *= factor;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AssetSubtotals {
    #[serde(serialize_with = "round_whole")]
    pub retirement_traditional: f64,
    #[serde(serialize_with = "round_whole")]
    pub retirement_roth: f64,
    #[serde(serialize_with = "round_whole")]
    pub brokerage: f64,
    #[serde(serialize_with = "round_whole")]
    pub bitcoin: f64,
    #[serde(serialize_with = "round_whole")]
    pub rental_properties: f64,
    #[serde(serialize_with = "round_whole")]
    pub primary_home: f64,
}

impl AssetSubtotals {
    pub fn total(&self) -> f64 {
        self.retirement_traditional
            + self.retirement_roth
            + self.brokerage
            + self.bitcoin
            + self.rental_properties
            + self.primary_home
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub year: i32,
    pub age: u32,
    #[serde(serialize_with = "round_whole")]
    pub nominal_net_worth: f64,
    #[serde(serialize_with = "round_whole")]
    pub real_net_worth: f64,
    #[serde(serialize_with = "round_whole")]
    pub total_expenses: f64,
    #[serde(flatten)]
    pub after_tax: AfterTaxIncome,
    #[serde(flatten)]
    pub assets: AssetSubtotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionMetrics {
    pub nw_at_retirement: Option<TimelineEntry>,
    pub nw_at_90: Option<TimelineEntry>,
    pub nw_at_95: Option<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionResult {
    pub timeline: Vec<TimelineEntry>,
    pub freedom_year: Option<i32>,
    pub metrics: ProjectionMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileDataPoint {
    pub age: u32,
    pub year: i32,
    #[serde(serialize_with = "round_whole")]
    pub p10: f64,
    #[serde(serialize_with = "round_whole")]
    pub p25: f64,
    #[serde(serialize_with = "round_whole")]
    pub p50: f64,
    #[serde(serialize_with = "round_whole")]
    pub p75: f64,
    #[serde(serialize_with = "round_whole")]
    pub p90: f64,
    #[serde(serialize_with = "round_whole")]
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnDistributionPoint {
    pub age: u32,
    pub year: i32,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub p10: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    pub percentile_data: Vec<PercentileDataPoint>,
    pub stock_return_box_data: Vec<ReturnDistributionPoint>,
    pub success_rate: f64,
    pub num_runs: u32,
}

fn round_whole<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.round())
}
