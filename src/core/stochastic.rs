use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use thiserror::Error;

use super::portfolio::{Bucket, Portfolio};
use super::types::TaxTreatment;

pub const MIN_RETURN: f64 = -0.95;
pub const MAX_RETURN: f64 = 1.5;

const CRASH_PROBABILITY: f64 = 0.12;
const CRASH_MEAN: f64 = -0.35;
const CRASH_SD: f64 = 0.12;
const CALM_SD: f64 = 0.08;

const INFLATION_FLOOR: f64 = -0.02;
const INFLATION_CEILING: f64 = 0.15;

#[derive(Debug, Error)]
pub enum ReturnModelError {
    #[error("invalid {name} volatility {value}")]
    Volatility {
        name: &'static str,
        value: f64,
        #[source]
        source: NormalError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketYear {
    pub stock_shock: f64,
    pub real_estate_shock: f64,
    pub inflation: Option<f64>,
}

impl MarketYear {
    pub fn bucket_return(&self, bucket: &Bucket) -> f64 {
        let shock = if bucket.treatment == TaxTreatment::RealEstate {
            self.real_estate_shock
        } else {
            self.stock_shock
        };
        (bucket.growth_rate + shock).clamp(MIN_RETURN, MAX_RETURN)
    }

    pub fn stock_return(&self, portfolio: &Portfolio) -> f64 {
        let (weighted, weight) = portfolio
            .buckets()
            .iter()
            .filter(|b| b.treatment != TaxTreatment::RealEstate && b.value > 0.0)
            .fold((0.0, 0.0), |(weighted, weight), b| {
                (weighted + b.value * self.bucket_return(b), weight + b.value)
            });
        if weight > 0.0 {
            weighted / weight
        } else {
            self.stock_shock.clamp(MIN_RETURN, MAX_RETURN)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReturnModel {
    crash: Normal<f64>,
    calm: Normal<f64>,
    stock_scale: f64,
    real_estate: Normal<f64>,
    inflation: Option<Normal<f64>>,
}

impl ReturnModel {
    pub fn new(
        stock_volatility: f64,
        real_estate_volatility: f64,
        inflation_volatility: f64,
        base_inflation: f64,
    ) -> Result<Self, ReturnModelError> {
        let stock_volatility = stock_volatility.max(0.0);
        if !stock_volatility.is_finite() {
            return Err(ReturnModelError::Volatility {
                name: "stock",
                value: stock_volatility,
                source: NormalError::BadVariance,
            });
        }

        let real_estate = gaussian("real estate", 0.0, real_estate_volatility.max(0.0))?;
        let inflation_volatility = inflation_volatility.max(0.0);
        let inflation = if inflation_volatility > 0.0 {
            Some(gaussian("inflation", base_inflation, inflation_volatility)?)
        } else {
            None
        };

        Ok(Self {
            crash: gaussian("crash regime", CRASH_MEAN, CRASH_SD)?,
            calm: gaussian("calm regime", calm_regime_mean(), CALM_SD)?,
            stock_scale: stock_volatility / raw_mixture_variance().sqrt(),
            real_estate,
            inflation,
        })
    }

    /// Draw order: regime, stock shock, real-estate shock, then inflation
    /// noise when enabled.
    pub fn sample_year<R: Rng + ?Sized>(&self, rng: &mut R) -> MarketYear {
        let raw_stock = if rng.gen_bool(CRASH_PROBABILITY) {
            self.crash.sample(rng)
        } else {
            self.calm.sample(rng)
        };
        let real_estate_shock = self.real_estate.sample(rng);
        let inflation = self
            .inflation
            .as_ref()
            .map(|noise| noise.sample(rng).clamp(INFLATION_FLOOR, INFLATION_CEILING));

        MarketYear {
            stock_shock: raw_stock * self.stock_scale,
            real_estate_shock,
            inflation,
        }
    }
}

fn gaussian(name: &'static str, mean: f64, sd: f64) -> Result<Normal<f64>, ReturnModelError> {
    let invalid = |source| ReturnModelError::Volatility {
        name,
        value: sd,
        source,
    };
    if !sd.is_finite() {
        return Err(invalid(NormalError::BadVariance));
    }
    Normal::new(mean, sd).map_err(invalid)
}

fn calm_regime_mean() -> f64 {
    -CRASH_PROBABILITY * CRASH_MEAN / (1.0 - CRASH_PROBABILITY)
}

fn raw_mixture_variance() -> f64 {
    let calm_mean = calm_regime_mean();
    CRASH_PROBABILITY * (CRASH_SD * CRASH_SD + CRASH_MEAN * CRASH_MEAN)
        + (1.0 - CRASH_PROBABILITY) * (CALM_SD * CALM_SD + calm_mean * calm_mean)
}
