mod error;

use axum::{
    Router,
    body::Bytes,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::core::{
    MonteCarloRequest, MonteCarloResult, ProjectionResult, Scenario, run_monte_carlo,
    run_projection,
};

pub use error::ApiError;

const MAX_CURRENT_AGE: u32 = 120;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router() -> Router {
    Router::new()
        .route("/simulate", post(simulate_handler))
        .route("/monte-carlo", post(monte_carlo_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
}

pub async fn run_http_server(addr: SocketAddr) -> std::io::Result<()> {
    let app = router();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "finsim HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(body: Bytes) -> Response {
    match parse_json::<Scenario>(&body).and_then(|scenario| simulate(&scenario)) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => api_error_response(&err),
    }
}

async fn monte_carlo_handler(body: Bytes) -> Response {
    match parse_json::<MonteCarloRequest>(&body).and_then(|request| monte_carlo(&request)) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => api_error_response(&err),
    }
}

pub fn simulate(scenario: &Scenario) -> Result<ProjectionResult, ApiError> {
    validate_scenario(scenario)?;
    Ok(run_projection(scenario))
}

pub fn monte_carlo(request: &MonteCarloRequest) -> Result<MonteCarloResult, ApiError> {
    validate_scenario(&request.params)?;
    for (name, value) in [
        ("stock_volatility", request.stock_volatility),
        ("real_estate_volatility", request.real_estate_volatility),
        ("inflation_volatility", request.inflation_volatility),
    ] {
        if !value.is_finite() {
            return Err(invalid(format!("{name} must be a finite number")));
        }
    }
    Ok(run_monte_carlo(request)?)
}

pub fn load_scenario(path: &Path) -> Result<Scenario, ApiError> {
    let raw = fs::read(path).map_err(|source| ApiError::ReadScenario {
        path: path.to_path_buf(),
        source,
    })?;
    let scenario = parse_json::<Scenario>(&raw)?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

fn parse_json<T: DeserializeOwned>(raw: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(raw).map_err(ApiError::ParseScenario)
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, ApiError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(ApiError::WriteOutput)
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ApiError> {
    if scenario.current_age > MAX_CURRENT_AGE {
        return Err(invalid(format!("current_age must be <= {MAX_CURRENT_AGE}")));
    }

    check_rate("general_inflation", scenario.general_inflation)?;

    for asset in &scenario.assets {
        if !asset.value.is_finite() || asset.value < 0.0 {
            return Err(invalid(format!(
                "asset '{}' value must be a finite number >= 0",
                asset.name
            )));
        }
        check_rate(&format!("asset '{}' growth_rate", asset.name), asset.growth_rate)?;
    }

    for (kind, streams) in [("inflow", &scenario.inflows), ("outflow", &scenario.outflows)] {
        for stream in streams {
            if !stream.amount.is_finite() {
                return Err(invalid(format!(
                    "{kind} '{}' amount must be a finite number",
                    stream.name
                )));
            }
            if stream.start_year > stream.end_year {
                return Err(invalid(format!(
                    "{kind} '{}' start_year must be <= end_year",
                    stream.name
                )));
            }
            if let Some(rate) = stream.growth_rate {
                check_rate(&format!("{kind} '{}' growth_rate", stream.name), rate)?;
            }
        }
    }

    for other in &scenario.other_assets {
        if !other.value.is_finite() {
            return Err(invalid(format!(
                "other asset '{}' value must be a finite number",
                other.name
            )));
        }
    }

    for expense in &scenario.one_time_expenses {
        if !expense.amount.is_finite() {
            return Err(invalid(format!(
                "one-time expense '{}' amount must be a finite number",
                expense.name
            )));
        }
    }

    Ok(())
}

fn check_rate(name: &str, rate: f64) -> Result<(), ApiError> {
    if !rate.is_finite() || rate <= -1.0 {
        return Err(invalid(format!("{name} must be a finite number > -1")));
    }
    Ok(())
}

fn invalid(msg: String) -> ApiError {
    ApiError::InvalidScenario(msg)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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

fn api_error_response(err: &ApiError) -> Response {
    let status = err.status();
    warn!(%status, error = %err, "request rejected");
    error_response(status, &err.to_string())
}
