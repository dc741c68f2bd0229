use super::types::{Asset, AssetKind, AssetSubtotals, TaxTreatment};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssetClass {
    RetirementTraditional,
    RetirementRoth,
    Brokerage,
    Bitcoin,
    RentalProperty,
    PrimaryHome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub value: f64,
    pub growth_rate: f64,
    pub treatment: TaxTreatment,
    pub kind: AssetKind,
}

impl Bucket {
    pub fn class(&self) -> AssetClass {
        match (self.treatment, self.kind) {
            (_, AssetKind::Primary) => AssetClass::PrimaryHome,
            (TaxTreatment::PreTax, _) => AssetClass::RetirementTraditional,
            (TaxTreatment::Roth, _) => AssetClass::RetirementRoth,
            (TaxTreatment::Taxable, AssetKind::Bitcoin) => AssetClass::Bitcoin,
            (TaxTreatment::Taxable, _) => AssetClass::Brokerage,
            (TaxTreatment::RealEstate, _) => AssetClass::RentalProperty,
        }
    }

    pub fn pays_dividends(&self) -> bool {
        matches!(
            self.class(),
            AssetClass::Brokerage | AssetClass::Bitcoin | AssetClass::RetirementRoth
        )
    }
}

/// Per-run bucket values plus the unsold share of the rental base.
///
/// Bucket order is the scenario's asset order and every "first bucket of
/// class X" lookup depends on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    buckets: Vec<Bucket>,
    rental_equity_fraction: f64,
}

impl Portfolio {
    pub fn from_assets(assets: &[Asset]) -> Self {
        let buckets = assets
            .iter()
            .map(|asset| Bucket {
                name: asset.name.clone(),
                value: asset.value,
                growth_rate: asset.growth_rate,
                treatment: asset.tax_treatment,
                kind: asset.resolved_kind(),
            })
            .collect();
        Self {
            buckets,
            rental_equity_fraction: 1.0,
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn rental_equity_fraction(&self) -> f64 {
        self.rental_equity_fraction
    }

    pub fn total_value(&self) -> f64 {
        self.buckets.iter().map(|b| b.value).sum()
    }

    pub fn class_value(&self, class: AssetClass) -> f64 {
        self.buckets
            .iter()
            .filter(|b| b.class() == class)
            .map(|b| b.value)
            .sum()
    }

    pub fn dividend_base(&self) -> f64 {
        self.buckets
            .iter()
            .filter(|b| b.pays_dividends())
            .map(|b| b.value)
            .sum()
    }

    pub fn subtotals(&self) -> AssetSubtotals {
        AssetSubtotals {
            retirement_traditional: self.class_value(AssetClass::RetirementTraditional),
            retirement_roth: self.class_value(AssetClass::RetirementRoth),
            brokerage: self.class_value(AssetClass::Brokerage),
            bitcoin: self.class_value(AssetClass::Bitcoin),
            rental_properties: self.class_value(AssetClass::RentalProperty),
            primary_home: self.class_value(AssetClass::PrimaryHome),
        }
    }

    pub fn first_of(&self, class: AssetClass) -> Option<usize> {
        self.buckets.iter().position(|b| b.class() == class)
    }

    pub fn surplus_target(&self) -> Option<usize> {
        self.first_of(AssetClass::Brokerage)
            .or_else(|| self.first_of(AssetClass::Bitcoin))
    }

    pub fn indices_of(&self, class: AssetClass) -> Vec<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.class() == class)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn value_at(&self, index: usize) -> f64 {
        self.buckets[index].value
    }

    pub fn credit(&mut self, index: usize, amount: f64) {
        self.buckets[index].value += amount;
    }

    pub fn withdraw(&mut self, index: usize, gross: f64) -> f64 {
        let bucket = &mut self.buckets[index];
        let take = gross.min(bucket.value).max(0.0);
        bucket.value -= take;
        take
    }

    pub fn record_rental_sale(&mut self, take: f64, balance_after: f64) {
        let pre_sale = balance_after + take;
        if pre_sale > 0.0 {
            self.rental_equity_fraction *= 1.0 - take / pre_sale;
        }
    }

    pub fn grow_with(&mut self, mut rate_for: impl FnMut(&Bucket) -> f64) {
        for bucket in &mut self.buckets {
            let rate = rate_for(bucket);
            bucket.value *= 1.0 + rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, value: f64, treatment: TaxTreatment) -> Asset {
        Asset {
            name: name.to_string(),
            value,
            growth_rate: 0.05,
            tax_treatment: treatment,
            kind: None,
        }
    }

    fn sample_portfolio() -> Portfolio {
        Portfolio::from_assets(&[
            asset("401k", 1_000.0, TaxTreatment::PreTax),
            asset("Roth IRA", 200.0, TaxTreatment::Roth),
            asset("Bitcoin", 300.0, TaxTreatment::Taxable),
            asset("Brokerage", 400.0, TaxTreatment::Taxable),
            asset("Rental Portfolio", 2_000.0, TaxTreatment::RealEstate),
            asset("Primary Home", 750.0, TaxTreatment::RealEstate),
        ])
    }

    #[test]
    fn subtotals_partition_total_value() {
        let portfolio = sample_portfolio();
        let subtotals = portfolio.subtotals();
        assert_eq!(subtotals.retirement_traditional, 1_000.0);
        assert_eq!(subtotals.retirement_roth, 200.0);
        assert_eq!(subtotals.bitcoin, 300.0);
        assert_eq!(subtotals.brokerage, 400.0);
        assert_eq!(subtotals.rental_properties, 2_000.0);
        assert_eq!(subtotals.primary_home, 750.0);
        assert_eq!(subtotals.total(), portfolio.total_value());
    }

    #[test]
    fn surplus_target_prefers_brokerage_over_earlier_bitcoin() {
        let portfolio = sample_portfolio();
        assert_eq!(portfolio.surplus_target(), Some(3));

        let bitcoin_only = Portfolio::from_assets(&[
            asset("Primary Home", 750.0, TaxTreatment::RealEstate),
            asset("Bitcoin", 300.0, TaxTreatment::Taxable),
        ]);
        assert_eq!(bitcoin_only.surplus_target(), Some(1));

        let none = Portfolio::from_assets(&[asset("401k", 1.0, TaxTreatment::PreTax)]);
        assert_eq!(none.surplus_target(), None);
    }

    #[test]
    fn dividend_base_covers_taxable_and_roth() {
        let portfolio = sample_portfolio();
        assert_eq!(portfolio.dividend_base(), 200.0 + 300.0 + 400.0);
    }

    #[test]
    fn withdraw_never_takes_more_than_balance() {
        let mut portfolio = sample_portfolio();
        assert_eq!(portfolio.withdraw(3, 150.0), 150.0);
        assert_eq!(portfolio.value_at(3), 250.0);
        assert_eq!(portfolio.withdraw(3, 1_000.0), 250.0);
        assert_eq!(portfolio.value_at(3), 0.0);
        assert_eq!(portfolio.withdraw(3, 10.0), 0.0);
    }

    #[test]
    fn rental_sale_scales_equity_fraction() {
        let mut portfolio = sample_portfolio();
        let take = portfolio.withdraw(4, 500.0);
        portfolio.record_rental_sale(take, portfolio.value_at(4));
        assert!((portfolio.rental_equity_fraction() - 0.75).abs() < 1e-12);

        let take = portfolio.withdraw(4, 750.0);
        portfolio.record_rental_sale(take, portfolio.value_at(4));
        assert!((portfolio.rental_equity_fraction() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn grow_with_applies_per_bucket_rate() {
        let mut portfolio = sample_portfolio();
        portfolio.grow_with(|b| b.growth_rate);
        assert!((portfolio.value_at(0) - 1_050.0).abs() < 1e-9);
        assert!((portfolio.value_at(5) - 787.5).abs() < 1e-9);
    }
}
