mod engine;
mod error;
mod goals;
mod happiness;
mod optimizer;
mod sweep;
mod types;

pub use engine::{
    breakeven_with_inflation, cost_of_living, next_wealth, possible_to_breakeven_with_inflation,
    pure_breakeven, reference_curves, simulate,
};
pub use error::SimError;
pub use goals::{FinancialGoals, financial_goals_by_rate};
pub use happiness::{HappinessScale, HappinessWeights, LifeSplit};
pub use optimizer::{
    Objective, approx_eq, pick_last_best, select_last_best, summed_squared_distance,
};
pub use sweep::{
    DoubleRetirement, FitCandidate, HappinessGap, OptimalRetirement, ProfilePoint, RateGrid,
    RateOrder, RetirementProfile, Scenario, StaticRetirementFit, StrategyComparison,
    SurvivalPoint, compare_strategies, double_retirement, double_retirement_by_rate,
    fixed_retirement_by_rate, happiness_gaps, immediate_retirement_by_rate, linspace,
    optimal_retirement_age, optimal_retirement_by_rate, retirement_age_profile,
    static_retirement_fit, static_retirement_fit_against, survival_by_retirement_age,
};
pub use types::{
    DEFAULT_MAX_SIM_YEARS, EndCondition, GridSummary, Lifespan, MAX_AGE, MAX_SIM_YEARS,
    ReferencePoint, SimulationParameters, SimulationRun, Termination, TimeSeries, YearRecord,
};
