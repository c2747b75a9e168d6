use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AcceleratorPolicy, BaselineReference, LoanParameters, ScheduleRow, SimulationResult, simulate,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStrategy {
    None,
    FlatStep,
    PercentStep,
    TermShorten,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiStrategy {
    None,
    #[serde(alias = "amount", alias = "flatStep", alias = "flat_step")]
    FlatStep,
    #[serde(alias = "percent", alias = "percentStep", alias = "percent_step")]
    PercentStep,
    #[serde(alias = "shorten", alias = "termShorten", alias = "term_shorten")]
    TermShorten,
}

impl From<ApiStrategy> for CliStrategy {
    fn from(value: ApiStrategy) -> Self {
        match value {
            ApiStrategy::None => CliStrategy::None,
            ApiStrategy::FlatStep => CliStrategy::FlatStep,
            ApiStrategy::PercentStep => CliStrategy::PercentStep,
            ApiStrategy::TermShorten => CliStrategy::TermShorten,
        }
    }
}

impl From<CliStrategy> for ApiStrategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::None => ApiStrategy::None,
            CliStrategy::FlatStep => ApiStrategy::FlatStep,
            CliStrategy::PercentStep => ApiStrategy::PercentStep,
            CliStrategy::TermShorten => ApiStrategy::TermShorten,
        }
    }
}

/// Accepted by both `GET /api/simulate` (query string) and
/// `POST /api/simulate` (JSON body). Aliases keep the keys of the original
/// web form working.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(alias = "loanAmount")]
    principal: Option<f64>,
    #[serde(alias = "rate", alias = "annualRatePercent", alias = "loanRate")]
    rate_percent: Option<f64>,
    #[serde(alias = "years", alias = "loanYears")]
    term_years: Option<u32>,
    #[serde(alias = "mode")]
    strategy: Option<ApiStrategy>,
    #[serde(alias = "stepEUR")]
    step_amount: Option<f64>,
    percent_step: Option<f64>,
    #[serde(alias = "monthsShorten")]
    months_per_year: Option<u32>,
    #[serde(alias = "startYear")]
    activation_year: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "versneller",
    about = "Mortgage accelerator: amortization schedules under overpayment strategies"
)]
struct Cli {
    #[arg(long, default_value_t = 300_000.0, help = "Outstanding mortgage principal")]
    principal: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Nominal annual interest rate in percent, e.g. 4"
    )]
    rate_percent: f64,
    #[arg(long, default_value_t = 30, help = "Remaining loan term in years (5-40)")]
    term_years: u32,
    #[arg(
        long,
        value_enum,
        default_value_t = CliStrategy::None,
        help = "Overpayment strategy applied from the activation year onwards"
    )]
    strategy: CliStrategy,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Yearly increase of the monthly payment for flat-step, in currency units"
    )]
    step_amount: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Yearly increase of the monthly payment for percent-step, in percent"
    )]
    percent_step: f64,
    #[arg(
        long,
        default_value_t = 2,
        help = "Months shaved off the remaining term per activated year for term-shorten"
    )]
    months_per_year: u32,
    #[arg(
        long,
        default_value_t = 1,
        help = "First loan-year (1-based) in which the strategy takes effect"
    )]
    activation_year: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    principal: f64,
    rate_percent: f64,
    term_years: u32,
    strategy: ApiStrategy,
    activation_year: Option<u32>,
    rows: Vec<ScheduleRow>,
    total_paid: f64,
    total_interest: f64,
    payoff_month: Option<u32>,
    baseline: BaselineReference,
    interest_saved: f64,
    months_saved: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: Cli) -> Result<(LoanParameters, AcceleratorPolicy), String> {
    if !cli.principal.is_finite() || cli.principal <= 0.0 {
        return Err("--principal must be > 0".to_string());
    }

    if !cli.rate_percent.is_finite() || cli.rate_percent < 0.0 {
        return Err("--rate-percent must be >= 0".to_string());
    }

    if !(5..=40).contains(&cli.term_years) {
        return Err("--term-years must be between 5 and 40".to_string());
    }

    if cli.activation_year == 0 {
        return Err("--activation-year must be >= 1".to_string());
    }

    if !cli.step_amount.is_finite() || cli.step_amount < 0.0 {
        return Err("--step-amount must be >= 0".to_string());
    }

    if !cli.percent_step.is_finite() || cli.percent_step < 0.0 {
        return Err("--percent-step must be >= 0".to_string());
    }

    if cli.strategy == CliStrategy::TermShorten && cli.months_per_year == 0 {
        return Err("--months-per-year must be >= 1 for term-shorten".to_string());
    }

    let policy = match cli.strategy {
        CliStrategy::None => AcceleratorPolicy::None,
        CliStrategy::FlatStep => AcceleratorPolicy::FlatStep {
            step_amount: cli.step_amount,
            activation_year: cli.activation_year,
        },
        CliStrategy::PercentStep => AcceleratorPolicy::PercentStep {
            fraction: cli.percent_step / 100.0,
            activation_year: cli.activation_year,
        },
        CliStrategy::TermShorten => AcceleratorPolicy::TermShorten {
            months_per_year: cli.months_per_year,
            activation_year: cli.activation_year,
        },
    };

    let params = LoanParameters {
        principal: cli.principal,
        annual_rate_percent: cli.rate_percent,
        term_years: cli.term_years,
    };

    Ok((params, policy))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("versneller HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match cli_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let strategy = request.strategy;
    let activation_year = match strategy {
        CliStrategy::None => None,
        _ => Some(request.activation_year),
    };
    let (params, policy) = match build_params(request) {
        Ok(built) => built,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let result = simulate(&params, &policy);
    let response = build_simulate_response(&params, strategy, activation_year, result);
    json_response(StatusCode::OK, response)
}

fn build_simulate_response(
    params: &LoanParameters,
    strategy: CliStrategy,
    activation_year: Option<u32>,
    result: SimulationResult,
) -> SimulateResponse {
    let interest_saved = (result.baseline.total_interest - result.total_interest).max(0.0);
    let baseline_months = result
        .baseline
        .payoff_month
        .unwrap_or(result.baseline.total_months);
    let months_saved = result
        .payoff_month
        .map(|month| baseline_months.saturating_sub(month));

    SimulateResponse {
        principal: params.principal,
        rate_percent: params.annual_rate_percent,
        term_years: params.term_years,
        strategy: strategy.into(),
        activation_year,
        rows: result.rows,
        total_paid: result.total_paid,
        total_interest: result.total_interest,
        payoff_month: result.payoff_month,
        baseline: result.baseline,
        interest_saved,
        months_saved,
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
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
fn cli_from_json(json: &str) -> Result<Cli, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    cli_from_payload(payload)
}

fn cli_from_payload(payload: SimulatePayload) -> Result<Cli, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.principal {
        cli.principal = v;
    }
    if let Some(v) = payload.rate_percent {
        cli.rate_percent = v;
    }
    if let Some(v) = payload.term_years {
        cli.term_years = v;
    }
    if let Some(v) = payload.strategy {
        cli.strategy = v.into();
    }
    if let Some(v) = payload.step_amount {
        cli.step_amount = v;
    }
    if let Some(v) = payload.percent_step {
        cli.percent_step = v;
    }
    if let Some(v) = payload.months_per_year {
        cli.months_per_year = v;
    }
    if let Some(v) = payload.activation_year {
        cli.activation_year = v;
    }

    Ok(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        principal: 300_000.0,
        rate_percent: 4.0,
        term_years: 30,
        strategy: CliStrategy::None,
        step_amount: 10.0,
        percent_step: 2.0,
        months_per_year: 2,
        activation_year: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_params_accepts_defaults() {
        let (params, policy) = build_params(sample_cli()).expect("valid defaults");
        assert_approx(params.principal, 300_000.0);
        assert_approx(params.annual_rate_percent, 4.0);
        assert_eq!(params.term_years, 30);
        assert_eq!(policy, AcceleratorPolicy::None);
    }

    #[test]
    fn build_params_rejects_non_positive_principal() {
        let mut cli = sample_cli();
        cli.principal = 0.0;
        let err = build_params(cli).expect_err("must reject zero principal");
        assert!(err.contains("--principal"));
    }

    #[test]
    fn build_params_rejects_negative_rate() {
        let mut cli = sample_cli();
        cli.rate_percent = -0.5;
        let err = build_params(cli).expect_err("must reject negative rate");
        assert!(err.contains("--rate-percent"));
    }

    #[test]
    fn build_params_rejects_term_outside_range() {
        let mut cli = sample_cli();
        cli.term_years = 4;
        let err = build_params(cli).expect_err("must reject short term");
        assert!(err.contains("--term-years"));

        let mut cli = sample_cli();
        cli.term_years = 41;
        assert!(build_params(cli).is_err());
    }

    #[test]
    fn build_params_rejects_zero_shorten_months() {
        let mut cli = sample_cli();
        cli.strategy = CliStrategy::TermShorten;
        cli.months_per_year = 0;
        let err = build_params(cli).expect_err("must reject zero shorten months");
        assert!(err.contains("--months-per-year"));
    }

    #[test]
    fn build_params_converts_percent_step_to_fraction() {
        let mut cli = sample_cli();
        cli.strategy = CliStrategy::PercentStep;
        cli.percent_step = 2.0;
        cli.activation_year = 3;

        let (_, policy) = build_params(cli).expect("valid inputs");
        match policy {
            AcceleratorPolicy::PercentStep {
                fraction,
                activation_year,
            } => {
                assert_approx(fraction, 0.02);
                assert_eq!(activation_year, 3);
            }
            other => panic!("expected percent-step policy, got {other:?}"),
        }
    }

    #[test]
    fn cli_from_json_parses_web_keys() {
        let json = r#"{
          "principal": 250000,
          "ratePercent": 3.5,
          "termYears": 25,
          "strategy": "flat-step",
          "stepAmount": 25,
          "activationYear": 4
        }"#;
        let cli = cli_from_json(json).expect("valid payload");
        assert_approx(cli.principal, 250_000.0);
        assert_approx(cli.rate_percent, 3.5);
        assert_eq!(cli.term_years, 25);
        assert_eq!(cli.strategy, CliStrategy::FlatStep);
        assert_approx(cli.step_amount, 25.0);
        assert_eq!(cli.activation_year, 4);
    }

    #[test]
    fn cli_from_json_accepts_legacy_form_aliases() {
        let json = r#"{
          "loanAmount": 180000,
          "loanRate": 2.8,
          "loanYears": 20,
          "mode": "shorten",
          "monthsShorten": 6,
          "startYear": 2
        }"#;
        let cli = cli_from_json(json).expect("valid payload");
        assert_approx(cli.principal, 180_000.0);
        assert_approx(cli.rate_percent, 2.8);
        assert_eq!(cli.term_years, 20);
        assert_eq!(cli.strategy, CliStrategy::TermShorten);
        assert_eq!(cli.months_per_year, 6);
        assert_eq!(cli.activation_year, 2);
    }

    #[test]
    fn cli_from_json_falls_back_to_defaults() {
        let cli = cli_from_json("{}").expect("empty payload is valid");
        assert_approx(cli.principal, 300_000.0);
        assert_eq!(cli.strategy, CliStrategy::None);
    }

    #[test]
    fn simulate_response_reports_savings_versus_baseline() {
        let (params, policy) = build_params(Cli {
            strategy: CliStrategy::FlatStep,
            step_amount: 50.0,
            ..sample_cli()
        })
        .expect("valid inputs");

        let result = simulate(&params, &policy);
        let response =
            build_simulate_response(&params, CliStrategy::FlatStep, Some(1), result);

        assert!(response.interest_saved > 0.0);
        let months_saved = response.months_saved.expect("accelerated loan pays off");
        assert!(months_saved > 0);
        assert_eq!(response.rows.len(), 30);
    }

    #[test]
    fn simulate_response_serializes_camel_case() {
        let (params, policy) = build_params(sample_cli()).expect("valid defaults");
        let result = simulate(&params, &policy);
        let response = build_simulate_response(&params, CliStrategy::None, None, result);

        let value = serde_json::to_value(&response).expect("serializable");
        let object = value.as_object().expect("json object");
        for key in [
            "principal",
            "ratePercent",
            "termYears",
            "strategy",
            "rows",
            "totalPaid",
            "totalInterest",
            "payoffMonth",
            "baseline",
            "interestSaved",
            "monthsSaved",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(object["strategy"], serde_json::json!("none"));

        let first_row = value["rows"][0].as_object().expect("row object");
        assert!(first_row.contains_key("monthlyPayment"));
        assert!(first_row.contains_key("paymentIncrease"));
        assert!(first_row.contains_key("endOfYearBalance"));
    }
}
