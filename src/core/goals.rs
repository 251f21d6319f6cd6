use serde::Serialize;

use super::error::SimError;
use super::sweep::{Scenario, SurvivalPoint, survival_by_retirement_age};
use super::types::{EndCondition, Lifespan};

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialGoals {
    pub interest_rate: f64,
    pub age_breakeven_with_inflation: Lifespan,
    pub wealth_at_breakeven: Option<f64>,
    pub retirement_age_to_outlive_savings_risk: u32,
}

pub fn financial_goals_by_rate(
    scenario: &Scenario,
    rates: &[f64],
) -> Result<Vec<FinancialGoals>, SimError> {
    scenario.validate()?;
    let ages = scenario.retirement_ages();
    tracing::debug!(rates = rates.len(), ages = ages.len(), "financial goals sweep");

    rates
        .iter()
        .map(|&rate| {
            let points = survival_by_retirement_age(scenario, rate, &ages)?;
            goals_for_rate(scenario, rate, &points)
        })
        .collect()
}

fn goals_for_rate(
    scenario: &Scenario,
    interest_rate: f64,
    points: &[SurvivalPoint],
) -> Result<FinancialGoals, SimError> {
    let breakeven = points
        .iter()
        .find(|p| p.end_condition == EndCondition::BreakevenWithInflation);

    let survivor = points
        .iter()
        .find(|p| {
            p.end_condition == EndCondition::BreakevenWithInflation
                || p.final_age >= scenario.maximum_death_age
        })
        .ok_or(SimError::EmptySweepResult {
            sweep: "retirement_age_to_outlive_savings_risk",
        })?;

    Ok(FinancialGoals {
        interest_rate,
        age_breakeven_with_inflation: breakeven
            .map_or(Lifespan::Indefinite, |p| Lifespan::Finite(p.final_age)),
        wealth_at_breakeven: breakeven.map(|p| p.final_wealth),
        retirement_age_to_outlive_savings_risk: survivor.retirement_age,
    })
}
