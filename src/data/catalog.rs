//! Indicator catalog: what `fetch` downloads, grouped by category.

use clap::ValueEnum;
use serde::Deserialize;

use crate::domain::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Macro,
    Expectation,
    Bond,
    Wage,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Macro,
        Category::Expectation,
        Category::Bond,
        Category::Wage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Macro => "macro",
            Category::Expectation => "expectation",
            Category::Bond => "bond",
            Category::Wage => "wage",
        }
    }
}

/// One provider series feeding one output column.
#[derive(Debug, Clone, Copy)]
pub struct SeriesColumn {
    pub column: &'static str,
    pub series_id: &'static str,
}

/// `column = minuend - subtrahend`, on dates where both exist.
#[derive(Debug, Clone, Copy)]
pub struct Spread {
    pub column: &'static str,
    pub minuend: &'static str,
    pub subtrahend: &'static str,
}

/// A downloadable indicator, written to `<name>_raw.csv`.
#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    pub name: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub frequency: Frequency,
    pub unit: &'static str,
    pub columns: &'static [SeriesColumn],
    pub spread: Option<Spread>,
}

pub const INDICATORS: &[Indicator] = &[
    Indicator {
        name: "cpi",
        category: Category::Macro,
        description: "Consumer price index, all urban consumers",
        frequency: Frequency::Monthly,
        unit: "index 1982-84=100",
        columns: &[SeriesColumn { column: "value", series_id: "CPIAUCSL" }],
        spread: None,
    },
    Indicator {
        name: "ppi",
        category: Category::Macro,
        description: "Producer price index, all commodities",
        frequency: Frequency::Monthly,
        unit: "index 1982=100",
        columns: &[SeriesColumn { column: "value", series_id: "PPIACO" }],
        spread: None,
    },
    Indicator {
        name: "m2",
        category: Category::Macro,
        description: "M2 money stock",
        frequency: Frequency::Monthly,
        unit: "billions of dollars",
        columns: &[SeriesColumn { column: "value", series_id: "M2SL" }],
        spread: None,
    },
    Indicator {
        name: "loans",
        category: Category::Macro,
        description: "Commercial and industrial loans, all commercial banks",
        frequency: Frequency::Monthly,
        unit: "billions of dollars",
        columns: &[SeriesColumn { column: "value", series_id: "BUSLOANS" }],
        spread: None,
    },
    Indicator {
        name: "gdp",
        category: Category::Macro,
        description: "Real gross domestic product",
        frequency: Frequency::Quarterly,
        unit: "billions of chained 2017 dollars",
        columns: &[SeriesColumn { column: "value", series_id: "GDPC1" }],
        spread: None,
    },
    Indicator {
        name: "sentiment",
        category: Category::Expectation,
        description: "University of Michigan consumer sentiment",
        frequency: Frequency::Monthly,
        unit: "index 1966:Q1=100",
        columns: &[SeriesColumn { column: "value", series_id: "UMCSENT" }],
        spread: None,
    },
    Indicator {
        name: "inflation_expectation",
        category: Category::Expectation,
        description: "University of Michigan one-year inflation expectation",
        frequency: Frequency::Monthly,
        unit: "percent",
        columns: &[SeriesColumn { column: "value", series_id: "MICH" }],
        spread: None,
    },
    Indicator {
        name: "bond",
        category: Category::Bond,
        description: "Treasury constant-maturity yields and 10y-2y spread",
        frequency: Frequency::Daily,
        unit: "percent",
        columns: &[
            SeriesColumn { column: "rate_2y", series_id: "DGS2" },
            SeriesColumn { column: "rate_10y", series_id: "DGS10" },
        ],
        spread: Some(Spread {
            column: "spread",
            minuend: "rate_10y",
            subtrahend: "rate_2y",
        }),
    },
    Indicator {
        name: "wage",
        category: Category::Wage,
        description: "Real median household income",
        frequency: Frequency::Annual,
        unit: "2023 dollars",
        columns: &[SeriesColumn { column: "value", series_id: "MEHOINUSA672N" }],
        spread: None,
    },
];

/// Catalog entries for `categories`, in catalog order.
pub fn indicators_for(categories: &[Category]) -> Vec<&'static Indicator> {
    INDICATORS
        .iter()
        .filter(|ind| categories.contains(&ind.category))
        .collect()
}
