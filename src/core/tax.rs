const BASE_STANDARD_DEDUCTION: f64 = 29_200.0;

// Married filing jointly.
const BASE_BRACKETS: [(f64, f64); 6] = [
    (23_200.0, 0.10),
    (94_300.0, 0.12),
    (201_050.0, 0.22),
    (383_900.0, 0.24),
    (487_450.0, 0.32),
    (731_200.0, 0.35),
];

const TOP_MARGINAL_RATE: f64 = 0.37;

pub fn federal_income_tax(taxable_income: f64, years_passed: u32, inflation: f64) -> f64 {
    let index = (1.0 + inflation).powi(years_passed as i32);
    let income = (taxable_income - BASE_STANDARD_DEDUCTION * index).max(0.0);

    let mut tax = 0.0;
    let mut prev_limit = 0.0;
    for (base_limit, rate) in BASE_BRACKETS {
        if income <= prev_limit {
            return tax;
        }
        let limit = base_limit * index;
        tax += (income.min(limit) - prev_limit) * rate;
        prev_limit = limit;
    }

    if income > prev_limit {
        tax += (income - prev_limit) * TOP_MARGINAL_RATE;
    }
    tax
}

pub fn distribution_divisor(age: u32) -> f64 {
    match age {
        0..=72 => 0.0,
        73 => 26.5,
        74 => 25.5,
        75 => 24.6,
        76 => 23.7,
        77 => 22.9,
        78 => 22.0,
        79 => 21.1,
        80 => 20.2,
        81 => 19.4,
        82 => 18.5,
        83 => 17.7,
        84 => 16.8,
        85 => 16.0,
        86 => 15.2,
        87 => 14.4,
        88 => 13.7,
        89 => 12.9,
        90 => 12.2,
        91 => 11.5,
        92 => 10.8,
        93 => 10.1,
        94 => 9.5,
        95 => 8.9,
        96 => 8.4,
        _ => 8.0,
    }
}
