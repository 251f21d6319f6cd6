use serde::Serialize;

use super::types::{GridSummary, SimulationRun};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HappinessScale {
    Integrated,
    Average,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HappinessWeights {
    pub working: f64,
    pub free: f64,
    pub scale: HappinessScale,
}

/// Years of a life spent working versus free, counted from birth.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LifeSplit {
    pub working_years: f64,
    pub free_years: f64,
}

impl LifeSplit {
    pub fn single(retirement_age: u32, final_age: u32, years_since_retirement: Option<u32>) -> Self {
        Self {
            working_years: f64::from(retirement_age.min(final_age)),
            free_years: f64::from(years_since_retirement.unwrap_or(0)),
        }
    }

    pub fn two_phase(
        first_retirement_age: u32,
        first_final_age: u32,
        first_years_retired: Option<u32>,
        second_retirement_age: u32,
        second_final_age: u32,
        second_years_retired: Option<u32>,
    ) -> Self {
        let first = Self::single(first_retirement_age, first_final_age, first_years_retired);
        let second_working = second_retirement_age
            .min(second_final_age)
            .saturating_sub(first_final_age);
        Self {
            working_years: first.working_years + f64::from(second_working),
            free_years: first.free_years + f64::from(second_years_retired.unwrap_or(0)),
        }
    }
}

impl HappinessWeights {
    pub fn never_retire(&self) -> bool {
        self.working >= self.free
    }

    pub fn score(&self, split: LifeSplit, final_age: u32) -> f64 {
        if self.never_retire() {
            return match self.scale {
                HappinessScale::Integrated => self.working * f64::from(final_age),
                HappinessScale::Average => self.working,
            };
        }

        let weighted = split.working_years * self.working + split.free_years * self.free;
        match self.scale {
            HappinessScale::Integrated => weighted,
            HappinessScale::Average => {
                let total = split.working_years + split.free_years;
                if total > 0.0 {
                    weighted / total
                } else {
                    self.working
                }
            }
        }
    }

    pub fn score_run(&self, retirement_age: u32, run: &SimulationRun) -> f64 {
        let last = run.terminal();
        self.score(
            LifeSplit::single(retirement_age, last.age, last.years_since_retirement),
            last.age,
        )
    }

    pub fn summarize(&self, interest_rate: f64, retirement_age: u32, run: &SimulationRun) -> GridSummary {
        let last = run.terminal();
        GridSummary {
            interest_rate,
            retirement_age,
            end_condition: run.end_condition,
            final_age: last.age,
            final_wealth: last.wealth,
            broke_even_with_inflation: last.broke_even,
            years_since_retirement: last.years_since_retirement,
            happiness: self.score_run(retirement_age, run),
        }
    }
}
