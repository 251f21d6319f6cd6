use super::error::SimError;
use super::types::{
    EndCondition, MAX_SIM_YEARS, ReferencePoint, SimulationParameters, SimulationRun, Termination,
    TimeSeries, YearRecord,
};

pub fn possible_to_breakeven_with_inflation(interest_rate: f64, inflation_rate: f64) -> bool {
    interest_rate > inflation_rate
}

pub fn cost_of_living(annual_cost_of_living: f64, inflation_rate: f64, n: u32) -> f64 {
    annual_cost_of_living * inflation_rate.powf(f64::from(n))
}

pub fn pure_breakeven(
    annual_cost_of_living: f64,
    interest_rate: f64,
    inflation_rate: f64,
    n: u32,
) -> Result<f64, SimError> {
    if interest_rate <= 1.0 {
        return Err(SimError::DivisionByZero {
            interest_rate,
            reference_rate: 1.0,
        });
    }
    Ok(cost_of_living(annual_cost_of_living, inflation_rate, n) / (interest_rate - 1.0))
}

/// Wealth whose interest pays for the cost of living and also keeps pace with inflation:
/// `x * (interest - 1) = cost + x * (inflation - 1)`.
pub fn breakeven_with_inflation(
    annual_cost_of_living: f64,
    interest_rate: f64,
    inflation_rate: f64,
    n: u32,
) -> Result<f64, SimError> {
    if !possible_to_breakeven_with_inflation(interest_rate, inflation_rate) {
        return Err(SimError::DivisionByZero {
            interest_rate,
            reference_rate: inflation_rate,
        });
    }
    Ok(cost_of_living(annual_cost_of_living, inflation_rate, n) / (interest_rate - inflation_rate))
}

pub fn next_wealth(params: &SimulationParameters, wealth: f64, n: u32, earning: bool) -> f64 {
    let income = if earning {
        params.annual_gross_earn_rate
    } else {
        0.0
    };
    wealth * params.interest_rate
        + (income - params.annual_cost_of_living) * params.inflation_rate.powf(f64::from(n))
}

pub fn simulate(params: &SimulationParameters) -> Result<SimulationRun, SimError> {
    validate_parameters(params)?;

    let termination = params.termination;
    let can_break_even =
        possible_to_breakeven_with_inflation(params.interest_rate, params.inflation_rate);

    let mut record = year_record(params, can_break_even, params.start_year, params.initial_money);
    let mut series = TimeSeries::starting_with(record);

    loop {
        if let Some(end_condition) = end_condition_for(&termination, &record) {
            return Ok(SimulationRun {
                end_condition,
                series,
            });
        }

        let wealth = next_wealth(params, record.wealth, record.n, !record.retired);
        record = year_record(params, can_break_even, record.n.saturating_add(1), wealth);
        series.push(record);
    }
}

pub fn reference_curves(params: &SimulationParameters, last_age: u32) -> Vec<ReferencePoint> {
    let years = last_age.saturating_sub(params.initial_age);
    (0..=years)
        .map(|n| ReferencePoint {
            n,
            age: params.initial_age.saturating_add(n),
            cost_of_living: cost_of_living(params.annual_cost_of_living, params.inflation_rate, n),
            pure_breakeven: pure_breakeven(
                params.annual_cost_of_living,
                params.interest_rate,
                params.inflation_rate,
                n,
            )
            .ok(),
            breakeven_with_inflation: breakeven_with_inflation(
                params.annual_cost_of_living,
                params.interest_rate,
                params.inflation_rate,
                n,
            )
            .ok(),
        })
        .collect()
}

fn year_record(
    params: &SimulationParameters,
    can_break_even: bool,
    n: u32,
    wealth: f64,
) -> YearRecord {
    let age = params.initial_age.saturating_add(n);
    let retired = age >= params.retirement_age;
    let breakeven_threshold = if can_break_even {
        breakeven_with_inflation(
            params.annual_cost_of_living,
            params.interest_rate,
            params.inflation_rate,
            n,
        )
        .ok()
    } else {
        None
    };

    YearRecord {
        n,
        age,
        wealth,
        retired,
        years_since_retirement: retired.then(|| age - params.retirement_age),
        breakeven_threshold,
        broke_even: breakeven_threshold.is_some_and(|threshold| wealth >= threshold),
    }
}

fn end_condition_for(termination: &Termination, record: &YearRecord) -> Option<EndCondition> {
    if termination.stop_if_out_of_money && record.wealth <= 0.0 {
        return Some(EndCondition::OutOfMoney);
    }

    if termination.stop_if_breakeven_with_inflation && record.broke_even {
        return Some(EndCondition::BreakevenWithInflation);
    }

    if record.n >= termination.max_sim_years {
        return Some(EndCondition::NumYearsSimTime);
    }

    if termination
        .stop_at_age
        .is_some_and(|ceiling| record.age >= ceiling)
    {
        return Some(EndCondition::Age);
    }

    match (
        termination.max_years_after_retirement,
        record.years_since_retirement,
    ) {
        (Some(cap), Some(years)) if years >= cap => Some(EndCondition::NumYearsAfterRetirement),
        _ => None,
    }
}

fn validate_parameters(params: &SimulationParameters) -> Result<(), SimError> {
    for (field, value) in [
        ("initial_money", params.initial_money),
        ("annual_cost_of_living", params.annual_cost_of_living),
        ("annual_gross_earn_rate", params.annual_gross_earn_rate),
    ] {
        if !value.is_finite() {
            return Err(SimError::invalid(field, format!("must be finite, got {value}")));
        }
    }

    for (field, value) in [
        ("interest_rate", params.interest_rate),
        ("inflation_rate", params.inflation_rate),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(SimError::invalid(
                field,
                format!("growth factor must be finite and > 0, got {value}"),
            ));
        }
    }

    if params.termination.max_sim_years > MAX_SIM_YEARS {
        return Err(SimError::invalid(
            "max_sim_years",
            format!(
                "must be <= {MAX_SIM_YEARS}, got {}",
                params.termination.max_sim_years
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn baseline_params() -> SimulationParameters {
        SimulationParameters {
            initial_age: 28,
            initial_money: 300_000.0,
            annual_cost_of_living: 38_000.0,
            annual_gross_earn_rate: 75_000.0,
            interest_rate: 1.05,
            inflation_rate: 1.0323,
            retirement_age: 28,
            termination: Termination::default(),
            start_year: 0,
        }
    }

    fn flat_params() -> SimulationParameters {
        SimulationParameters {
            initial_age: 28,
            initial_money: 100.0,
            annual_cost_of_living: 0.0,
            annual_gross_earn_rate: 10.0,
            interest_rate: 1.1,
            inflation_rate: 1.0,
            retirement_age: 30,
            termination: Termination::until_age(30),
            start_year: 0,
        }
    }

    #[test]
    fn immediate_retirement_at_five_percent_runs_out_of_money_at_37() {
        let run = simulate(&baseline_params()).expect("valid params");

        assert_eq!(run.end_condition, EndCondition::OutOfMoney);
        assert_eq!(run.series.len(), 10);
        let last = run.terminal();
        assert_eq!(last.n, 9);
        assert_eq!(last.age, 37);
        assert_eq!(last.years_since_retirement, Some(9));
        assert!((last.wealth - -7_127.133_720_112_528).abs() <= 1e-4);
        assert!(!last.broke_even);

        let solvent = run.series.last_solvent().expect("started with money");
        assert_eq!(solvent.age, 36);
        assert!((solvent.wealth - 39_882.674_355_663_97).abs() <= 1e-4);
    }

    #[test]
    fn zero_interest_never_breaks_even_with_inflation() {
        let mut params = baseline_params();
        params.interest_rate = 1.0;
        assert!(!possible_to_breakeven_with_inflation(
            params.interest_rate,
            params.inflation_rate
        ));

        let run = simulate(&params).expect("valid params");
        assert_eq!(run.end_condition, EndCondition::OutOfMoney);
        assert_eq!(run.terminal().age, 36);
        assert!(run.terminal().wealth <= 0.0);
        assert!(
            run.series
                .records()
                .iter()
                .all(|r| r.breakeven_threshold.is_none() && !r.broke_even)
        );
    }

    #[test]
    fn oracle_earning_years_compound_then_stop_at_age() {
        let run = simulate(&flat_params()).expect("valid params");

        // 100 -> 100*1.1+10 = 120 -> 120*1.1+10 = 142
        assert_eq!(run.end_condition, EndCondition::Age);
        let wealth: Vec<f64> = run.series.records().iter().map(|r| r.wealth).collect();
        assert_eq!(wealth.len(), 3);
        assert_approx(wealth[0], 100.0);
        assert_approx(wealth[1], 120.0);
        assert_approx(wealth[2], 142.0);
    }

    #[test]
    fn transition_year_counts_as_retired() {
        let mut params = flat_params();
        params.termination = Termination::until_age(32);
        let run = simulate(&params).expect("valid params");
        let records = run.series.records();

        assert!(!records[1].retired);
        assert_eq!(records[1].years_since_retirement, None);
        assert!(records[2].retired);
        assert_eq!(records[2].age, 30);
        assert_eq!(records[2].years_since_retirement, Some(0));
        // no earnings once retired: 142 * 1.1
        assert_approx(records[3].wealth, 156.2);
        assert_eq!(records[4].years_since_retirement, Some(2));
    }

    #[test]
    fn out_of_money_wins_over_breakeven_in_same_year() {
        let mut params = flat_params();
        params.initial_money = 0.0;
        params.termination = Termination::default();

        let run = simulate(&params).expect("valid params");
        let first = run.terminal();
        assert!(first.broke_even);
        assert_eq!(run.end_condition, EndCondition::OutOfMoney);
        assert_eq!(run.series.len(), 1);
    }

    #[test]
    fn sim_time_cap_ends_runs_that_never_resolve() {
        let params = SimulationParameters {
            interest_rate: 1.0,
            inflation_rate: 1.0,
            annual_gross_earn_rate: 0.0,
            termination: Termination {
                max_sim_years: 50,
                ..Termination::default()
            },
            ..flat_params()
        };

        let run = simulate(&params).expect("valid params");
        assert_eq!(run.end_condition, EndCondition::NumYearsSimTime);
        assert_eq!(run.series.len(), 51);
        assert_eq!(run.terminal().n, 50);
        assert_approx(run.terminal().wealth, 100.0);
    }

    #[test]
    fn sim_time_cap_takes_priority_over_age_ceiling() {
        let params = SimulationParameters {
            termination: Termination {
                max_sim_years: 2,
                stop_if_breakeven_with_inflation: false,
                stop_at_age: Some(30),
                ..Termination::default()
            },
            ..flat_params()
        };

        let run = simulate(&params).expect("valid params");
        assert_eq!(run.end_condition, EndCondition::NumYearsSimTime);
        assert_eq!(run.terminal().age, 30);
    }

    #[test]
    fn years_after_retirement_cap_stops_run() {
        let params = SimulationParameters {
            termination: Termination {
                stop_if_breakeven_with_inflation: false,
                max_years_after_retirement: Some(5),
                ..Termination::default()
            },
            ..flat_params()
        };

        let run = simulate(&params).expect("valid params");
        assert_eq!(run.end_condition, EndCondition::NumYearsAfterRetirement);
        assert_eq!(run.terminal().age, 35);
        assert_eq!(run.terminal().years_since_retirement, Some(5));
    }

    #[test]
    fn continuation_starts_from_seeded_year() {
        let mut params = baseline_params();
        params.start_year = 5;
        params.initial_money = 50_000.0;
        params.retirement_age = 40;
        params.termination = Termination::until_age(34);

        let run = simulate(&params).expect("valid params");
        let records = run.series.records();
        assert_eq!(records[0].n, 5);
        assert_eq!(records[0].age, 33);
        let expected =
            50_000.0 * 1.05 + (75_000.0 - 38_000.0) * 1.0323_f64.powf(5.0);
        assert_approx(records[1].wealth, expected);
        assert_eq!(run.end_condition, EndCondition::Age);
    }

    #[test]
    fn breakeven_thresholds_guard_division_by_zero() {
        assert!(matches!(
            pure_breakeven(38_000.0, 1.0, 1.0323, 0),
            Err(SimError::DivisionByZero { .. })
        ));
        assert!(matches!(
            breakeven_with_inflation(38_000.0, 1.0323, 1.0323, 3),
            Err(SimError::DivisionByZero { .. })
        ));

        assert_approx(
            pure_breakeven(38_000.0, 1.04, 1.0, 0).expect("defined"),
            950_000.0,
        );
        assert_approx(
            breakeven_with_inflation(10_000.0, 1.05, 1.03, 0).expect("defined"),
            500_000.0,
        );
    }

    #[test]
    fn reference_curves_mark_undefined_thresholds() {
        let mut params = baseline_params();
        params.interest_rate = 1.02;
        let curves = reference_curves(&params, 30);

        assert_eq!(curves.len(), 3);
        assert_eq!(curves[2].age, 30);
        assert_approx(curves[1].cost_of_living, 38_000.0 * 1.0323);
        assert!(curves.iter().all(|p| p.pure_breakeven.is_some()));
        assert!(curves.iter().all(|p| p.breakeven_with_inflation.is_none()));
    }

    #[test]
    fn ages_saturate_at_the_numeric_ceiling() {
        let params = SimulationParameters {
            initial_age: u32::MAX - 1,
            termination: Termination::until_age(u32::MAX),
            ..flat_params()
        };

        let run = simulate(&params).expect("valid params");
        assert_eq!(run.end_condition, EndCondition::Age);
        assert_eq!(run.terminal().age, u32::MAX);
        assert_eq!(run.series.len(), 2);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let mut params = baseline_params();
        params.initial_money = f64::NAN;
        assert!(matches!(
            simulate(&params),
            Err(SimError::InvalidParameter {
                field: "initial_money",
                ..
            })
        ));

        let mut params = baseline_params();
        params.termination.max_sim_years = MAX_SIM_YEARS + 1;
        assert!(matches!(
            simulate(&params),
            Err(SimError::InvalidParameter {
                field: "max_sim_years",
                ..
            })
        ));

        let mut params = baseline_params();
        params.interest_rate = 0.0;
        assert!(matches!(
            simulate(&params),
            Err(SimError::InvalidParameter {
                field: "interest_rate",
                ..
            })
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_rates_above_inflation_eventually_break_even(
            initial_money in 1u32..500_000,
            cost in 20_000u32..50_000,
            surplus in 10_000u32..50_000,
            inflation_bp in 0u32..500,
            excess_bp in 100u32..3_000,
        ) {
            let inflation_rate = 1.0 + f64::from(inflation_bp) / 10_000.0;
            let params = SimulationParameters {
                initial_age: 30,
                initial_money: f64::from(initial_money),
                annual_cost_of_living: f64::from(cost),
                annual_gross_earn_rate: f64::from(cost + surplus),
                interest_rate: inflation_rate + f64::from(excess_bp) / 10_000.0,
                inflation_rate,
                retirement_age: u32::MAX,
                termination: Termination::default(),
                start_year: 0,
            };

            let run = simulate(&params).expect("valid params");
            prop_assert_eq!(run.end_condition, EndCondition::BreakevenWithInflation);
            prop_assert!(run.terminal().broke_even);
        }

        #[test]
        fn prop_rates_at_or_below_inflation_never_break_even(
            initial_money in 0u32..2_000_000,
            cost in 1_000u32..80_000,
            earn in 0u32..150_000,
            inflation_bp in 0u32..800,
            shortfall_bp in 0u32..3_000,
            retire_offset in 0u32..60,
        ) {
            let inflation_rate = 1.0 + f64::from(inflation_bp) / 10_000.0;
            let params = SimulationParameters {
                initial_age: 30,
                initial_money: f64::from(initial_money),
                annual_cost_of_living: f64::from(cost),
                annual_gross_earn_rate: f64::from(earn),
                interest_rate: inflation_rate - f64::from(shortfall_bp) / 10_000.0,
                inflation_rate,
                retirement_age: 30 + retire_offset,
                termination: Termination {
                    stop_at_age: Some(120),
                    ..Termination::default()
                },
                start_year: 0,
            };

            let run = simulate(&params).expect("valid params");
            prop_assert!(matches!(
                run.end_condition,
                EndCondition::OutOfMoney | EndCondition::Age | EndCondition::NumYearsSimTime
            ));
            prop_assert!(run.series.records().iter().all(|r| !r.broke_even));
        }

        #[test]
        fn prop_reruns_are_identical(
            initial_money in 0u32..1_000_000,
            earn in 0u32..150_000,
            interest_bp in 7_000u32..13_000,
            retire_offset in 0u32..40,
        ) {
            let params = SimulationParameters {
                initial_money: f64::from(initial_money),
                annual_gross_earn_rate: f64::from(earn),
                interest_rate: f64::from(interest_bp) / 10_000.0,
                retirement_age: 28 + retire_offset,
                termination: Termination::until_age(125),
                ..baseline_params()
            };

            let first = simulate(&params).expect("valid params");
            let second = simulate(&params).expect("valid params");
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_higher_earnings_never_reduce_pre_retirement_wealth(
            initial_money in 0u32..500_000,
            earn in 0u32..100_000,
            raise in 0u32..50_000,
            interest_bp in 8_000u32..12_000,
            retire_offset in 1u32..40,
        ) {
            let low = SimulationParameters {
                initial_money: f64::from(initial_money),
                annual_gross_earn_rate: f64::from(earn),
                interest_rate: f64::from(interest_bp) / 10_000.0,
                retirement_age: 28 + retire_offset,
                termination: Termination {
                    stop_if_out_of_money: false,
                    stop_if_breakeven_with_inflation: false,
                    stop_at_age: Some(28 + retire_offset),
                    ..Termination::default()
                },
                ..baseline_params()
            };
            let high = SimulationParameters {
                annual_gross_earn_rate: f64::from(earn + raise),
                ..low
            };

            let low_run = simulate(&low).expect("valid params");
            let high_run = simulate(&high).expect("valid params");
            prop_assert_eq!(low_run.series.len(), high_run.series.len());
            for (a, b) in low_run.series.records().iter().zip(high_run.series.records()) {
                prop_assert_eq!(a.age, b.age);
                prop_assert!(b.wealth >= a.wealth);
            }
        }
    }
}
