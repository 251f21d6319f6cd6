use axum::{
    Router,
    extract::{Json, Path, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    DEFAULT_MAX_SIM_YEARS, DoubleRetirement, EndCondition, FinancialGoals, GridSummary,
    HappinessScale, HappinessWeights, MAX_AGE, MAX_SIM_YEARS, OptimalRetirement, RateGrid,
    RateOrder, ReferencePoint, RetirementProfile, Scenario, SimError, SimulationParameters, StrategyComparison,
    SurvivalPoint, Termination, TimeSeries, compare_strategies, double_retirement_by_rate,
    financial_goals_by_rate, immediate_retirement_by_rate, optimal_retirement_by_rate,
    reference_curves, retirement_age_profile, simulate, survival_by_retirement_age,
};

const MAX_RATE_STEPS: usize = 10_001;
// each static-fit candidate reruns every rate with a nested second-retirement scan
const MAX_STRATEGY_RATE_STEPS: usize = 121;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Report {
    Simulate,
    Survival,
    Goals,
    Immediate,
    Optimal,
    Double,
    Strategies,
    Profile,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliHappinessScale {
    Integrated,
    Average,
}

impl From<CliHappinessScale> for HappinessScale {
    fn from(value: CliHappinessScale) -> Self {
        match value {
            CliHappinessScale::Integrated => HappinessScale::Integrated,
            CliHappinessScale::Average => HappinessScale::Average,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRateOrder {
    Ascending,
    Descending,
}

impl From<CliRateOrder> for RateOrder {
    fn from(value: CliRateOrder) -> Self {
        match value {
            CliRateOrder::Ascending => RateOrder::Ascending,
            CliRateOrder::Descending => RateOrder::Descending,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiHappinessScale {
    Integrated,
    #[serde(alias = "avg")]
    Average,
}

impl From<ApiHappinessScale> for CliHappinessScale {
    fn from(value: ApiHappinessScale) -> Self {
        match value {
            ApiHappinessScale::Integrated => CliHappinessScale::Integrated,
            ApiHappinessScale::Average => CliHappinessScale::Average,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRateOrder {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl From<ApiRateOrder> for CliRateOrder {
    fn from(value: ApiRateOrder) -> Self {
        match value {
            ApiRateOrder::Ascending => CliRateOrder::Ascending,
            ApiRateOrder::Descending => CliRateOrder::Descending,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReportPayload {
    initial_age: Option<u32>,
    initial_money: Option<f64>,
    annual_cost_of_living: Option<f64>,
    annual_gross_earn_rate: Option<f64>,
    inflation_rate: Option<f64>,
    interest_rate: Option<f64>,
    retirement_age: Option<u32>,
    maximum_death_age: Option<u32>,

    max_sim_years: Option<u32>,
    stop_at_age: Option<u32>,
    max_years_after_retirement: Option<u32>,
    continue_past_breakeven: Option<bool>,

    working_happiness: Option<f64>,
    free_happiness: Option<f64>,
    happiness_scale: Option<ApiHappinessScale>,

    min_rate: Option<f64>,
    max_rate: Option<f64>,
    rate_steps: Option<usize>,
    rate_order: Option<ApiRateOrder>,
    candidate_ages: Option<Vec<u32>>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "retire",
    about = "Deterministic retirement wealth simulator with happiness-optimal retirement sweeps"
)]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = Report::Simulate)]
    report: Report,
    #[arg(long, default_value_t = 29)]
    initial_age: u32,
    #[arg(long, default_value_t = 300_000.0)]
    initial_money: f64,
    #[arg(
        long,
        default_value_t = 38_000.0,
        help = "Cost of living in the first year; grows with inflation"
    )]
    annual_cost_of_living: f64,
    #[arg(
        long,
        default_value_t = 69_000.0,
        help = "Gross earnings per year while working; grows with inflation"
    )]
    annual_gross_earn_rate: f64,
    #[arg(long, default_value_t = 3.23, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        allow_negative_numbers = true,
        help = "Annual savings interest in percent (simulate and survival reports)"
    )]
    interest_rate: f64,
    #[arg(long, help = "Retirement age for the simulate report; defaults to --initial-age")]
    retirement_age: Option<u32>,
    #[arg(long, default_value_t = 124, help = "Last age a sweep may retire at")]
    maximum_death_age: u32,

    #[arg(long, default_value_t = DEFAULT_MAX_SIM_YEARS)]
    max_sim_years: u32,
    #[arg(long)]
    stop_at_age: Option<u32>,
    #[arg(long)]
    max_years_after_retirement: Option<u32>,
    #[arg(long, help = "Keep simulating after savings break even with inflation")]
    continue_past_breakeven: bool,

    #[arg(
        long,
        default_value_t = -0.7971938776,
        allow_negative_numbers = true,
        help = "Happiness per working year"
    )]
    working_happiness: f64,
    #[arg(
        long,
        default_value_t = 0.6653911565,
        allow_negative_numbers = true,
        help = "Happiness per retired year"
    )]
    free_happiness: f64,
    #[arg(long, value_enum, default_value_t = CliHappinessScale::Integrated)]
    happiness_scale: CliHappinessScale,

    #[arg(
        long,
        default_value_t = -30.0,
        allow_negative_numbers = true,
        help = "Lowest swept interest rate in percent"
    )]
    min_rate: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        allow_negative_numbers = true,
        help = "Highest swept interest rate in percent"
    )]
    max_rate: f64,
    #[arg(long, default_value_t = 61)]
    rate_steps: usize,
    #[arg(long, value_enum, default_value_t = CliRateOrder::Ascending)]
    rate_order: CliRateOrder,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Retirement ages for the profile report; defaults to every age up to --maximum-death-age"
    )]
    candidate_ages: Vec<u32>,

    #[arg(long, default_value = "info", help = "Log level when RUST_LOG is unset")]
    pub log_level: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportRequest {
    pub report: Report,
    pub scenario: Scenario,
    pub simulation: SimulationParameters,
    pub rate_grid: RateGrid,
    pub candidate_ages: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    end_condition: EndCondition,
    final_age: u32,
    final_wealth: f64,
    years_since_retirement: Option<u32>,
    broke_even_with_inflation: bool,
    happiness: f64,
    records: TimeSeries,
    reference: Vec<ReferencePoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalResponse {
    interest_rate: f64,
    earliest_indefinite_retirement_age: Option<u32>,
    points: Vec<SurvivalPoint>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "report", content = "result", rename_all = "kebab-case")]
pub enum ReportResponse {
    Simulate(SimulateResponse),
    Survival(SurvivalResponse),
    Goals(Vec<FinancialGoals>),
    Immediate(Vec<GridSummary>),
    Optimal(Vec<OptimalRetirement>),
    Double(Vec<DoubleRetirement>),
    Strategies(StrategyComparison),
    Profile(Vec<RetirementProfile>),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownReport(_) => StatusCode::NOT_FOUND,
            ApiError::Simulation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Serialization(_) | ApiError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "rejected request");
        }
        error_response(status, &self.to_string())
    }
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

fn growth_factor(percent: f64) -> f64 {
    1.0 + percent / 100.0
}

pub fn build_request(cli: Cli) -> Result<ReportRequest, ApiError> {
    if !cli.initial_money.is_finite() {
        return Err(invalid("--initial-money must be a finite number"));
    }

    if !cli.annual_cost_of_living.is_finite() || cli.annual_cost_of_living < 0.0 {
        return Err(invalid("--annual-cost-of-living must be >= 0"));
    }

    if !cli.annual_gross_earn_rate.is_finite() || cli.annual_gross_earn_rate < 0.0 {
        return Err(invalid("--annual-gross-earn-rate must be >= 0"));
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate <= -100.0 {
        return Err(invalid("--inflation-rate must be > -100"));
    }

    if !cli.interest_rate.is_finite() || cli.interest_rate <= -100.0 {
        return Err(invalid("--interest-rate must be > -100"));
    }

    if cli.maximum_death_age > MAX_AGE {
        return Err(invalid(format!("--maximum-death-age must be <= {MAX_AGE}")));
    }

    if cli.maximum_death_age < cli.initial_age {
        return Err(invalid("--maximum-death-age must be >= --initial-age"));
    }

    let retirement_age = cli.retirement_age.unwrap_or(cli.initial_age);
    if retirement_age < cli.initial_age {
        return Err(invalid("--retirement-age must be >= --initial-age"));
    }

    if !(1..=MAX_SIM_YEARS).contains(&cli.max_sim_years) {
        return Err(invalid(format!(
            "--max-sim-years must be between 1 and {MAX_SIM_YEARS}"
        )));
    }

    if cli.stop_at_age.is_some_and(|age| age <= cli.initial_age) {
        return Err(invalid("--stop-at-age must be > --initial-age"));
    }

    if !cli.working_happiness.is_finite() {
        return Err(invalid("--working-happiness must be a finite number"));
    }

    if !cli.free_happiness.is_finite() {
        return Err(invalid("--free-happiness must be a finite number"));
    }

    if !cli.min_rate.is_finite() || cli.min_rate <= -100.0 {
        return Err(invalid("--min-rate must be > -100"));
    }

    if !cli.max_rate.is_finite() || cli.max_rate < cli.min_rate {
        return Err(invalid("--max-rate must be >= --min-rate"));
    }

    if !(1..=MAX_RATE_STEPS).contains(&cli.rate_steps) {
        return Err(invalid(format!(
            "--rate-steps must be between 1 and {MAX_RATE_STEPS}"
        )));
    }

    if cli.report == Report::Strategies && cli.rate_steps > MAX_STRATEGY_RATE_STEPS {
        return Err(invalid(format!(
            "--rate-steps must be <= {MAX_STRATEGY_RATE_STEPS} for the strategies report"
        )));
    }

    if let Some(age) = cli
        .candidate_ages
        .iter()
        .find(|age| !(cli.initial_age..=cli.maximum_death_age).contains(*age))
    {
        return Err(invalid(format!(
            "--candidate-ages must lie between --initial-age and --maximum-death-age, got {age}"
        )));
    }

    let scenario = Scenario {
        initial_age: cli.initial_age,
        initial_money: cli.initial_money,
        annual_cost_of_living: cli.annual_cost_of_living,
        annual_gross_earn_rate: cli.annual_gross_earn_rate,
        inflation_rate: growth_factor(cli.inflation_rate),
        maximum_death_age: cli.maximum_death_age,
        happiness: HappinessWeights {
            working: cli.working_happiness,
            free: cli.free_happiness,
            scale: cli.happiness_scale.into(),
        },
    };

    let termination = Termination {
        stop_if_out_of_money: true,
        stop_if_breakeven_with_inflation: !cli.continue_past_breakeven,
        max_sim_years: cli.max_sim_years,
        stop_at_age: cli.stop_at_age,
        max_years_after_retirement: cli.max_years_after_retirement,
    };

    let candidate_ages = if cli.candidate_ages.is_empty() {
        scenario.retirement_ages()
    } else {
        cli.candidate_ages
    };

    Ok(ReportRequest {
        report: cli.report,
        simulation: scenario.parameters(growth_factor(cli.interest_rate), retirement_age, termination),
        scenario,
        rate_grid: RateGrid {
            min: growth_factor(cli.min_rate),
            max: growth_factor(cli.max_rate),
            steps: cli.rate_steps,
            order: cli.rate_order.into(),
        },
        candidate_ages,
    })
}

pub fn run_report(request: &ReportRequest) -> Result<ReportResponse, ApiError> {
    let scenario = &request.scenario;
    let rates = request.rate_grid.rates();

    let response = match request.report {
        Report::Simulate => {
            let run = simulate(&request.simulation)?;
            let last = *run.terminal();
            ReportResponse::Simulate(SimulateResponse {
                end_condition: run.end_condition,
                final_age: last.age,
                final_wealth: last.wealth,
                years_since_retirement: last.years_since_retirement,
                broke_even_with_inflation: last.broke_even,
                happiness: scenario
                    .happiness
                    .score_run(request.simulation.retirement_age, &run),
                reference: reference_curves(&request.simulation, last.age),
                records: run.series,
            })
        }
        Report::Survival => {
            let points = survival_by_retirement_age(
                scenario,
                request.simulation.interest_rate,
                &scenario.retirement_ages(),
            )?;
            ReportResponse::Survival(SurvivalResponse {
                interest_rate: request.simulation.interest_rate,
                earliest_indefinite_retirement_age: points
                    .iter()
                    .find(|p| p.age_out_of_money.is_indefinite())
                    .map(|p| p.retirement_age),
                points,
            })
        }
        Report::Goals => ReportResponse::Goals(financial_goals_by_rate(scenario, &rates)?),
        Report::Immediate => {
            ReportResponse::Immediate(immediate_retirement_by_rate(scenario, &rates)?)
        }
        Report::Optimal => ReportResponse::Optimal(optimal_retirement_by_rate(scenario, &rates)?),
        Report::Double => ReportResponse::Double(double_retirement_by_rate(scenario, &rates)?),
        Report::Strategies => ReportResponse::Strategies(compare_strategies(scenario, &rates)?),
        Report::Profile => ReportResponse::Profile(retirement_age_profile(
            scenario,
            &rates,
            &request.candidate_ages,
        )?),
    };
    Ok(response)
}

pub fn run_cli(cli: Cli) -> Result<(), ApiError> {
    let request = build_request(cli)?;
    tracing::info!(report = ?request.report, rates = request.rate_grid.steps, "running report");
    let response = run_report(&request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub fn app() -> Router {
    Router::new()
        .route(
            "/api/:report",
            get(report_get_handler).post(report_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "retire HTTP API listening");

    axum::serve(listener, app()).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn report_get_handler(
    Path(name): Path<String>,
    Query(payload): Query<ReportPayload>,
) -> Response {
    report_handler_impl(name, payload).await
}

async fn report_post_handler(
    Path(name): Path<String>,
    Json(payload): Json<ReportPayload>,
) -> Response {
    report_handler_impl(name, payload).await
}

async fn report_handler_impl(name: String, payload: ReportPayload) -> Response {
    match handle_report(&name, payload).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => err.into_response(),
    }
}

async fn handle_report(name: &str, payload: ReportPayload) -> Result<ReportResponse, ApiError> {
    let report = <Report as ValueEnum>::from_str(name, true)
        .map_err(|_| ApiError::UnknownReport(name.to_string()))?;
    let request = request_from_payload(report, payload)?;
    tracing::info!(?report, rates = request.rate_grid.steps, "handling report request");

    // sweeps are CPU bound; keep them off the async workers
    tokio::task::spawn_blocking(move || run_report(&request))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn request_from_json(report: Report, json: &str) -> Result<ReportRequest, ApiError> {
    let payload = serde_json::from_str::<ReportPayload>(json)
        .map_err(|e| invalid(format!("Invalid API JSON payload: {e}")))?;
    request_from_payload(report, payload)
}

fn request_from_payload(report: Report, payload: ReportPayload) -> Result<ReportRequest, ApiError> {
    let mut cli = default_cli_for_api();
    cli.report = report;

    if let Some(v) = payload.initial_age {
        cli.initial_age = v;
    }
    if let Some(v) = payload.initial_money {
        cli.initial_money = v;
    }
    if let Some(v) = payload.annual_cost_of_living {
        cli.annual_cost_of_living = v;
    }
    if let Some(v) = payload.annual_gross_earn_rate {
        cli.annual_gross_earn_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if payload.retirement_age.is_some() {
        cli.retirement_age = payload.retirement_age;
    }
    if let Some(v) = payload.maximum_death_age {
        cli.maximum_death_age = v;
    }
    if let Some(v) = payload.max_sim_years {
        cli.max_sim_years = v;
    }
    if payload.stop_at_age.is_some() {
        cli.stop_at_age = payload.stop_at_age;
    }
    if payload.max_years_after_retirement.is_some() {
        cli.max_years_after_retirement = payload.max_years_after_retirement;
    }
    if let Some(v) = payload.continue_past_breakeven {
        cli.continue_past_breakeven = v;
    }
    if let Some(v) = payload.working_happiness {
        cli.working_happiness = v;
    }
    if let Some(v) = payload.free_happiness {
        cli.free_happiness = v;
    }
    if let Some(v) = payload.happiness_scale {
        cli.happiness_scale = v.into();
    }
    if let Some(v) = payload.min_rate {
        cli.min_rate = v;
    }
    if let Some(v) = payload.max_rate {
        cli.max_rate = v;
    }
    if let Some(v) = payload.rate_steps {
        cli.rate_steps = v;
    }
    if let Some(v) = payload.rate_order {
        cli.rate_order = v.into();
    }
    if let Some(v) = payload.candidate_ages {
        cli.candidate_ages = v;
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        report: Report::Simulate,
        initial_age: 29,
        initial_money: 300_000.0,
        annual_cost_of_living: 38_000.0,
        annual_gross_earn_rate: 69_000.0,
        inflation_rate: 3.23,
        interest_rate: 5.0,
        retirement_age: None,
        maximum_death_age: 124,
        max_sim_years: DEFAULT_MAX_SIM_YEARS,
        stop_at_age: None,
        max_years_after_retirement: None,
        continue_past_breakeven: false,
        working_happiness: -0.7971938776,
        free_happiness: 0.6653911565,
        happiness_scale: CliHappinessScale::Integrated,
        min_rate: -30.0,
        max_rate: 30.0,
        rate_steps: 61,
        rate_order: CliRateOrder::Ascending,
        candidate_ages: Vec::new(),
        log_level: "info".to_string(),
    }
}
