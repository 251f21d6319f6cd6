use serde::Serialize;

pub const DEFAULT_MAX_SIM_YEARS: u32 = 300;
pub const MAX_SIM_YEARS: u32 = 1_000;
pub const MAX_AGE: u32 = 200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCondition {
    OutOfMoney,
    BreakevenWithInflation,
    NumYearsSimTime,
    Age,
    NumYearsAfterRetirement,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Termination {
    pub stop_if_out_of_money: bool,
    pub stop_if_breakeven_with_inflation: bool,
    pub max_sim_years: u32,
    pub stop_at_age: Option<u32>,
    pub max_years_after_retirement: Option<u32>,
}

impl Default for Termination {
    fn default() -> Self {
        Self {
            stop_if_out_of_money: true,
            stop_if_breakeven_with_inflation: true,
            max_sim_years: DEFAULT_MAX_SIM_YEARS,
            stop_at_age: None,
            max_years_after_retirement: None,
        }
    }
}

impl Termination {
    pub fn until_age(ceiling: u32) -> Self {
        Self {
            stop_if_out_of_money: true,
            stop_if_breakeven_with_inflation: false,
            max_sim_years: DEFAULT_MAX_SIM_YEARS,
            stop_at_age: Some(ceiling),
            max_years_after_retirement: None,
        }
    }
}

/// Inputs for one wealth trajectory. Rates are growth factors (`1.05` = +5% a year).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimulationParameters {
    pub initial_age: u32,
    pub initial_money: f64,
    pub annual_cost_of_living: f64,
    pub annual_gross_earn_rate: f64,
    pub interest_rate: f64,
    pub inflation_rate: f64,
    pub retirement_age: u32,
    pub termination: Termination,
    /// Elapsed years at which `initial_money` applies. Non-zero when continuing an earlier run.
    pub start_year: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub n: u32,
    pub age: u32,
    pub wealth: f64,
    pub retired: bool,
    pub years_since_retirement: Option<u32>,
    pub breakeven_threshold: Option<f64>,
    pub broke_even: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    records: Vec<YearRecord>,
}

impl TimeSeries {
    pub(crate) fn starting_with(first: YearRecord) -> Self {
        Self {
            records: vec![first],
        }
    }

    pub(crate) fn push(&mut self, record: YearRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[YearRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_solvent(&self) -> Option<&YearRecord> {
        self.records.iter().rev().find(|r| r.wealth > 0.0)
    }

    pub fn terminal(&self) -> &YearRecord {
        // construction always seeds one record
        &self.records[self.records.len() - 1]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub end_condition: EndCondition,
    pub series: TimeSeries,
}

impl SimulationRun {
    pub fn terminal(&self) -> &YearRecord {
        self.series.terminal()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifespan {
    Finite(u32),
    Indefinite,
}

impl Lifespan {
    pub fn as_f64(self) -> f64 {
        match self {
            Lifespan::Finite(years) => f64::from(years),
            Lifespan::Indefinite => f64::INFINITY,
        }
    }

    pub fn is_indefinite(self) -> bool {
        matches!(self, Lifespan::Indefinite)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSummary {
    pub interest_rate: f64,
    pub retirement_age: u32,
    pub end_condition: EndCondition,
    pub final_age: u32,
    pub final_wealth: f64,
    pub broke_even_with_inflation: bool,
    pub years_since_retirement: Option<u32>,
    pub happiness: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePoint {
    pub n: u32,
    pub age: u32,
    pub cost_of_living: f64,
    pub pure_breakeven: Option<f64>,
    pub breakeven_with_inflation: Option<f64>,
}
