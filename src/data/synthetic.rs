//! Seeded synthetic harmonized tables.
//!
//! Each country gets a GDP level and growth rate, budget shares drawn once,
//! and a latent "development" score derived from its health share. Labels are
//! linear in that score plus a time trend and Gaussian noise, so a regression
//! on the budget columns has real signal to find.

use std::ops::RangeInclusive;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{HarmonizedRow, HarmonizedTable, LABELS};
use crate::error::AppError;

/// Budget-side columns, in table order.
pub const FEATURE_COLUMNS: [&str; 5] = [
    "health_budget",
    "education_budget",
    "defence_budget",
    "total_expenditure",
    "gross_debt",
];

const COUNTRY_NAMES: [&str; 12] = [
    "Austria", "Belgium", "Chile", "Denmark", "Estonia", "Finland", "Greece", "Hungary", "Iceland", "Japan",
    "Mexico", "Portugal",
];

/// Probability that a label cell is left missing (first year per country is always observed).
const MISSING_LABEL_SHARE: f64 = 0.1;

struct CountryProfile {
    name: String,
    gdp: f64,
    growth: f64,
    shares: [f64; 5],
    development: f64,
}

/// Build a table of `countries` × `years` rows.
pub fn generate_table(seed: u64, countries: usize, years: RangeInclusive<i32>) -> Result<HarmonizedTable, AppError> {
    if countries == 0 {
        return Err(AppError::input("Synthetic table needs at least one country."));
    }
    if years.is_empty() {
        return Err(AppError::input("Synthetic table needs a non-empty year range."));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).map_err(|e| AppError::compute(format!("Noise distribution error: {e}")))?;

    let profiles: Vec<CountryProfile> = (0..countries)
        .map(|i| {
            let name = COUNTRY_NAMES
                .get(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Country {}", i + 1));
            let health = rng.gen_range(0.04..0.10);
            CountryProfile {
                name,
                gdp: rng.gen_range(200.0..2000.0),
                growth: rng.gen_range(0.01..0.04),
                shares: [
                    health,
                    rng.gen_range(0.04..0.07),
                    rng.gen_range(0.01..0.03),
                    rng.gen_range(0.35..0.55),
                    rng.gen_range(0.40..1.20),
                ],
                development: (health - 0.04) / 0.06,
            }
        })
        .collect();

    let first_year = *years.start();
    let mut rows = Vec::new();
    for profile in &profiles {
        for year in years.clone() {
            let t = (year - first_year) as f64;
            let gdp = profile.gdp * (1.0 + profile.growth).powf(t);
            let mut values: Vec<Option<f64>> = profile
                .shares
                .iter()
                .map(|share| Some(round2(share * gdp * 100.0)))
                .collect();

            let d = profile.development;
            let mut draw = |scale: f64| scale * noise.sample(&mut rng);
            let neonatal = (12.0 - 8.0 * d - 0.15 * t + draw(0.5)).max(0.5);
            let labels = [
                neonatal,
                (2.2 * neonatal + draw(1.0)).max(1.0),
                (60.0 - 45.0 * d - 0.8 * t + draw(3.0)).max(2.0),
                (45.0 + 30.0 * d + 0.3 * t + draw(2.0)).clamp(0.0, 100.0),
                (50.0 - 35.0 * d - 0.5 * t + draw(2.0)).max(1.0),
                (60.0 + 35.0 * d + 0.4 * t + draw(2.0)).clamp(0.0, 100.0),
            ];
            for label in labels {
                let blank = year != first_year && rng.gen_bool(MISSING_LABEL_SHARE);
                values.push((!blank).then_some(round2(label)));
            }

            rows.push(HarmonizedRow {
                country: profile.name.clone(),
                code: Some(profile.name.chars().take(3).collect::<String>().to_uppercase()),
                year,
                values,
            });
        }
    }
    rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

    let mut columns: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
    columns.extend(LABELS.iter().map(|s| s.to_string()));

    Ok(HarmonizedTable { columns, rows })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
