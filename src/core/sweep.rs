#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use super::engine::simulate;
use super::error::SimError;
use super::happiness::{HappinessWeights, LifeSplit};
use super::optimizer::{
    Objective, approx_eq, pick_last_best, select_last_best, summed_squared_distance,
};
use super::types::{
    EndCondition, GridSummary, Lifespan, MAX_AGE, SimulationParameters, SimulationRun,
    Termination,
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub initial_age: u32,
    pub initial_money: f64,
    pub annual_cost_of_living: f64,
    pub annual_gross_earn_rate: f64,
    pub inflation_rate: f64,
    pub maximum_death_age: u32,
    pub happiness: HappinessWeights,
}

impl Scenario {
    pub fn parameters(
        &self,
        interest_rate: f64,
        retirement_age: u32,
        termination: Termination,
    ) -> SimulationParameters {
        SimulationParameters {
            initial_age: self.initial_age,
            initial_money: self.initial_money,
            annual_cost_of_living: self.annual_cost_of_living,
            annual_gross_earn_rate: self.annual_gross_earn_rate,
            interest_rate,
            inflation_rate: self.inflation_rate,
            retirement_age,
            termination,
            start_year: 0,
        }
    }

    pub fn lifetime_parameters(&self, interest_rate: f64, retirement_age: u32) -> SimulationParameters {
        self.parameters(
            interest_rate,
            retirement_age,
            Termination::until_age(self.maximum_death_age.saturating_add(1)),
        )
    }

    pub fn retirement_ages(&self) -> Vec<u32> {
        (self.initial_age..=self.maximum_death_age).collect()
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.maximum_death_age > MAX_AGE {
            return Err(SimError::invalid(
                "maximum_death_age",
                format!("must be <= {MAX_AGE}, got {}", self.maximum_death_age),
            ));
        }
        if self.maximum_death_age < self.initial_age {
            return Err(SimError::invalid(
                "maximum_death_age",
                format!(
                    "must be >= initial_age ({}), got {}",
                    self.initial_age, self.maximum_death_age
                ),
            ));
        }
        if !self.happiness.working.is_finite() || !self.happiness.free.is_finite() {
            return Err(SimError::invalid("happiness", "weights must be finite"));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrder {
    Ascending,
    Descending,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RateGrid {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
    pub order: RateOrder,
}

impl RateGrid {
    pub fn rates(&self) -> Vec<f64> {
        let mut rates = linspace(self.min, self.max, self.steps);
        if self.order == RateOrder::Descending {
            rates.reverse();
        }
        rates
    }
}

pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = steps - 1;
            let step = (end - start) / last as f64;
            (0..steps)
                .map(|i| if i == last { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

fn map_grid<T, R, F>(items: &[T], f: F) -> Result<Vec<R>, SimError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, SimError> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(f).collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalPoint {
    pub retirement_age: u32,
    pub end_condition: EndCondition,
    pub final_age: u32,
    pub final_wealth: f64,
    pub age_out_of_money: Lifespan,
    pub years_survived_after_retiring: Lifespan,
}

pub fn survival_by_retirement_age(
    scenario: &Scenario,
    interest_rate: f64,
    retirement_ages: &[u32],
) -> Result<Vec<SurvivalPoint>, SimError> {
    retirement_ages
        .iter()
        .map(|&retirement_age| {
            let run = simulate(&scenario.parameters(
                interest_rate,
                retirement_age,
                Termination::default(),
            ))?;
            Ok(survival_point(retirement_age, &run))
        })
        .collect()
}

fn survival_point(retirement_age: u32, run: &SimulationRun) -> SurvivalPoint {
    let last = run.terminal();
    let (age_out_of_money, years_survived_after_retiring) =
        if run.end_condition == EndCondition::BreakevenWithInflation {
            (Lifespan::Indefinite, Lifespan::Indefinite)
        } else {
            (
                Lifespan::Finite(last.age),
                Lifespan::Finite(last.age.saturating_sub(retirement_age)),
            )
        };

    SurvivalPoint {
        retirement_age,
        end_condition: run.end_condition,
        final_age: last.age,
        final_wealth: last.wealth,
        age_out_of_money,
        years_survived_after_retiring,
    }
}

pub fn fixed_retirement_by_rate(
    scenario: &Scenario,
    rates: &[f64],
    retirement_age: u32,
) -> Result<Vec<GridSummary>, SimError> {
    scenario.validate()?;
    tracing::debug!(rates = rates.len(), retirement_age, "fixed retirement sweep");
    map_grid(rates, |&rate| {
        let run = simulate(&scenario.lifetime_parameters(rate, retirement_age))?;
        Ok(scenario.happiness.summarize(rate, retirement_age, &run))
    })
}

pub fn immediate_retirement_by_rate(
    scenario: &Scenario,
    rates: &[f64],
) -> Result<Vec<GridSummary>, SimError> {
    fixed_retirement_by_rate(scenario, rates, scenario.initial_age)
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimalRetirement {
    pub interest_rate: f64,
    pub retirement_age: u32,
    pub max_happiness: f64,
    pub death_age: u32,
    pub broke_even_with_inflation: bool,
}

impl From<&GridSummary> for OptimalRetirement {
    fn from(summary: &GridSummary) -> Self {
        Self {
            interest_rate: summary.interest_rate,
            retirement_age: summary.retirement_age,
            max_happiness: summary.happiness,
            death_age: summary.final_age,
            broke_even_with_inflation: summary.broke_even_with_inflation,
        }
    }
}

pub fn optimal_retirement_age(
    scenario: &Scenario,
    interest_rate: f64,
    retirement_ages: &[u32],
) -> Result<OptimalRetirement, SimError> {
    let summaries = retirement_ages
        .iter()
        .map(|&retirement_age| {
            let run = simulate(&scenario.lifetime_parameters(interest_rate, retirement_age))?;
            Ok(scenario
                .happiness
                .summarize(interest_rate, retirement_age, &run))
        })
        .collect::<Result<Vec<_>, SimError>>()?;

    let best = pick_last_best(
        &summaries,
        Objective::Maximize,
        "optimal_retirement_age",
        |summary| summary.happiness,
    )?;
    Ok(OptimalRetirement::from(best))
}

pub fn optimal_retirement_by_rate(
    scenario: &Scenario,
    rates: &[f64],
) -> Result<Vec<OptimalRetirement>, SimError> {
    scenario.validate()?;
    let ages = scenario.retirement_ages();
    tracing::debug!(rates = rates.len(), ages = ages.len(), "optimal retirement sweep");
    map_grid(rates, |&rate| optimal_retirement_age(scenario, rate, &ages))
}

/// Outcome of retiring at `initial_retirement_age` and, if the money runs out, going back
/// to work and retiring a second time at the best age from there.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleRetirement {
    pub interest_rate: f64,
    pub initial_retirement_age: u32,
    pub first_phase_end: EndCondition,
    pub first_phase_final_age: u32,
    pub second_retirement_age: Option<u32>,
    pub happiness: f64,
    pub death_age: u32,
    pub broke_even_with_inflation: bool,
}

impl DoubleRetirement {
    pub fn returned_to_work(&self) -> bool {
        self.second_retirement_age.is_some()
    }
}

#[derive(Copy, Clone, Debug)]
struct SecondPhase {
    retirement_age: u32,
    happiness: f64,
    death_age: u32,
    broke_even: bool,
}

pub fn double_retirement(
    scenario: &Scenario,
    interest_rate: f64,
    initial_retirement_age: u32,
) -> Result<DoubleRetirement, SimError> {
    let first = simulate(&scenario.lifetime_parameters(interest_rate, initial_retirement_age))?;
    let first_last = *first.terminal();

    if first.end_condition != EndCondition::OutOfMoney {
        return Ok(DoubleRetirement {
            interest_rate,
            initial_retirement_age,
            first_phase_end: first.end_condition,
            first_phase_final_age: first_last.age,
            second_retirement_age: None,
            happiness: scenario.happiness.score_run(initial_retirement_age, &first),
            death_age: first_last.age,
            broke_even_with_inflation: first_last.broke_even,
        });
    }

    // back to work from the last year that still had money
    let seed = first.series.last_solvent().copied().unwrap_or(first_last);

    let mut phases = Vec::new();
    for second_age in seed.age..=scenario.maximum_death_age {
        let params = SimulationParameters {
            initial_money: seed.wealth,
            start_year: seed.n,
            ..scenario.lifetime_parameters(interest_rate, second_age)
        };
        let second = simulate(&params)?;
        let last = second.terminal();
        let split = LifeSplit::two_phase(
            initial_retirement_age,
            seed.age,
            seed.years_since_retirement,
            second_age,
            last.age,
            last.years_since_retirement,
        );
        phases.push(SecondPhase {
            retirement_age: second_age,
            happiness: scenario.happiness.score(split, last.age),
            death_age: last.age,
            broke_even: last.broke_even,
        });
    }

    let best = pick_last_best(
        &phases,
        Objective::Maximize,
        "second_retirement_age",
        |phase| phase.happiness,
    )?;

    Ok(DoubleRetirement {
        interest_rate,
        initial_retirement_age,
        first_phase_end: first.end_condition,
        first_phase_final_age: first_last.age,
        second_retirement_age: Some(best.retirement_age),
        happiness: best.happiness,
        death_age: best.death_age,
        broke_even_with_inflation: best.broke_even,
    })
}

pub fn double_retirement_by_rate(
    scenario: &Scenario,
    rates: &[f64],
) -> Result<Vec<DoubleRetirement>, SimError> {
    scenario.validate()?;
    tracing::debug!(rates = rates.len(), "double retirement sweep");
    let outcomes = map_grid(rates, |&rate| {
        double_retirement(scenario, rate, scenario.initial_age)
    })?;
    Ok(outcomes
        .into_iter()
        .filter(DoubleRetirement::returned_to_work)
        .collect())
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitCandidate {
    pub retirement_age: u32,
    pub summed_squared_distance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticRetirementFit {
    pub retirement_age: u32,
    pub least_squared_distance: f64,
    pub candidates: Vec<FitCandidate>,
    pub points: Vec<DoubleRetirement>,
}

pub fn static_retirement_fit(
    scenario: &Scenario,
    rates: &[f64],
    candidate_ages: &[u32],
) -> Result<StaticRetirementFit, SimError> {
    let optimal = optimal_retirement_by_rate(scenario, rates)?;
    static_retirement_fit_against(scenario, &optimal, candidate_ages)
}

pub fn static_retirement_fit_against(
    scenario: &Scenario,
    optimal: &[OptimalRetirement],
    candidate_ages: &[u32],
) -> Result<StaticRetirementFit, SimError> {
    scenario.validate()?;
    tracing::debug!(
        rates = optimal.len(),
        candidates = candidate_ages.len(),
        "static retirement least squares fit"
    );

    let reference: Vec<(f64, f64)> = optimal
        .iter()
        .map(|o| (o.interest_rate, o.max_happiness))
        .collect();
    let rates: Vec<f64> = optimal.iter().map(|o| o.interest_rate).collect();

    let mut evaluated = Vec::with_capacity(candidate_ages.len());
    for &age in candidate_ages {
        let points = map_grid(&rates, |&rate| double_retirement(scenario, rate, age))?;
        let curve: Vec<(f64, f64)> = points
            .iter()
            .map(|p| (p.interest_rate, p.happiness))
            .collect();
        let candidate = FitCandidate {
            retirement_age: age,
            summed_squared_distance: summed_squared_distance(&reference, &curve)?,
        };
        evaluated.push((candidate, points));
    }

    let best_idx = select_last_best(
        evaluated.iter().map(|(c, _)| c.summed_squared_distance),
        Objective::Minimize,
    )
    .ok_or(SimError::EmptySweepResult {
        sweep: "static_retirement_age",
    })?;

    let candidates = evaluated.iter().map(|(c, _)| *c).collect();
    let (chosen, points) = evaluated.swap_remove(best_idx);
    Ok(StaticRetirementFit {
        retirement_age: chosen.retirement_age,
        least_squared_distance: chosen.summed_squared_distance,
        candidates,
        points,
    })
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePoint {
    pub retirement_age: u32,
    pub end_condition: EndCondition,
    pub years_survived_after_retirement: u32,
    pub survival_ratio: f64,
    pub happiness: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProfile {
    pub interest_rate: f64,
    pub points: Vec<ProfilePoint>,
}

pub fn retirement_age_profile(
    scenario: &Scenario,
    rates: &[f64],
    retirement_ages: &[u32],
) -> Result<Vec<RetirementProfile>, SimError> {
    scenario.validate()?;
    if retirement_ages.contains(&0) {
        return Err(SimError::invalid(
            "retirement_age",
            "survival ratio needs retirement ages > 0",
        ));
    }

    let termination = Termination {
        stop_if_breakeven_with_inflation: false,
        ..Termination::default()
    };

    map_grid(rates, |&rate| {
        let points = retirement_ages
            .iter()
            .map(|&retirement_age| {
                let run = simulate(&scenario.parameters(rate, retirement_age, termination))?;
                let years = run.terminal().years_since_retirement.unwrap_or(0);
                Ok(ProfilePoint {
                    retirement_age,
                    end_condition: run.end_condition,
                    years_survived_after_retirement: years,
                    survival_ratio: f64::from(years) / f64::from(retirement_age),
                    happiness: scenario.happiness.score_run(retirement_age, &run),
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(RetirementProfile {
            interest_rate: rate,
            points,
        })
    })
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HappinessGap {
    pub interest_rate: f64,
    pub difference: f64,
}

pub fn happiness_gaps(
    optimal: &[OptimalRetirement],
    other: &[(f64, f64)],
    skip_equal: bool,
) -> Vec<HappinessGap> {
    other
        .iter()
        .filter_map(|&(rate, happiness)| {
            let best = optimal
                .iter()
                .find(|o| approx_eq(o.interest_rate, rate))?;
            if skip_equal && approx_eq(best.max_happiness, happiness) {
                return None;
            }
            Some(HappinessGap {
                interest_rate: rate,
                difference: best.max_happiness - happiness,
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub immediate: Vec<GridSummary>,
    pub optimal: Vec<OptimalRetirement>,
    pub double: Vec<DoubleRetirement>,
    pub static_fit: StaticRetirementFit,
    pub optimal_vs_double: Vec<HappinessGap>,
    pub optimal_vs_static: Vec<HappinessGap>,
}

pub fn compare_strategies(
    scenario: &Scenario,
    rates: &[f64],
) -> Result<StrategyComparison, SimError> {
    let immediate = immediate_retirement_by_rate(scenario, rates)?;
    let optimal = optimal_retirement_by_rate(scenario, rates)?;
    let double = double_retirement_by_rate(scenario, rates)?;
    let static_fit = static_retirement_fit_against(scenario, &optimal, &scenario.retirement_ages())?;

    let double_curve: Vec<(f64, f64)> = double
        .iter()
        .map(|d| (d.interest_rate, d.happiness))
        .collect();
    let static_curve: Vec<(f64, f64)> = static_fit
        .points
        .iter()
        .map(|p| (p.interest_rate, p.happiness))
        .collect();

    Ok(StrategyComparison {
        optimal_vs_double: happiness_gaps(&optimal, &double_curve, true),
        optimal_vs_static: happiness_gaps(&optimal, &static_curve, false),
        immediate,
        optimal,
        double,
        static_fit,
    })
}
