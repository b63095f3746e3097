use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    CourseKind, LoanInputs, Plan, PlanRule, Projection, ProjectionError, REPAYMENT_RATE,
    SalaryChange, SalarySchedule, SalarySolveConfig, SalarySolveResult, WriteOffRule,
    plan_for_course, plan_rules, run_projection, solve_clearing_salary,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "loanpath",
    about = "UK student loan balance projection (Plan 1, 2, 4, 5 and Postgraduate Loan)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project the balance year by year until repayment or write-off
    Project {
        #[command(flatten)]
        loan: LoanArgs,
        #[arg(long, help = "Print the projection as JSON")]
        json: bool,
    },
    /// Find the lowest flat salary that clears the loan before write-off
    Solve {
        #[command(flatten)]
        loan: LoanArgs,
        #[arg(long, default_value_t = 500_000.0)]
        search_max: f64,
        #[arg(long, default_value_t = 1.0, help = "Salary precision of the search")]
        tolerance: f64,
        #[arg(long)]
        json: bool,
    },
    /// Print thresholds, interest rates and write-off rules
    Plans {
        #[arg(long)]
        json: bool,
    },
    /// Work out the repayment plan from the course type and start date
    WhichPlan {
        #[arg(
            long,
            help = "undergraduate, pgce, advanced-learner-loan, short-course or postgraduate"
        )]
        course: String,
        #[arg(long)]
        start_year: i32,
        #[arg(long)]
        start_month: u32,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoanArgs {
    #[arg(
        long,
        default_value = "plan-1",
        help = "plan-1, plan-2, plan-4, plan-5 or postgraduate-loan"
    )]
    plan: String,
    #[arg(long, default_value_t = 2010)]
    first_loan_year: i32,
    #[arg(long, default_value_t = 50_000.0)]
    loan_amount: f64,
    #[arg(long, default_value_t = 35_000.0, help = "Current annual salary")]
    salary: f64,
    #[arg(
        long = "salary-change",
        value_name = "YEAR:SALARY",
        value_parser = parse_salary_change_arg,
        help = "Future salary from the given year; repeatable, later entries win"
    )]
    salary_changes: Vec<SalaryChange>,
    #[arg(
        long,
        help = "Annual interest rate in percent, replacing the plan's table rate"
    )]
    interest_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ApiSalaryChange {
    year: i32,
    salary: f64,
}

/// JSON bodies send a list; query strings send `YEAR:SALARY,YEAR:SALARY`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SalaryChangesField {
    List(Vec<ApiSalaryChange>),
    Encoded(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    plan: Option<String>,
    first_loan_year: Option<i32>,
    loan_amount: Option<f64>,
    initial_salary: Option<f64>,
    salary_changes: Option<SalaryChangesField>,
    interest_rate: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WhichPlanQuery {
    course: Option<String>,
    start_year: Option<i32>,
    start_month: Option<u32>,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: LoanInputs,
    solve: SalarySolveConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlansResponse {
    repayment_rate: f64,
    plans: Vec<PlanRule>,
}

#[derive(Debug, Serialize)]
struct WhichPlanResponse {
    plan: Plan,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

fn parse_salary_change(raw: &str) -> Result<SalaryChange, ProjectionError> {
    let Some((year, salary)) = raw.trim().split_once(':') else {
        return Err(ProjectionError::InvalidYearRange(format!(
            "salary change `{raw}` must be written as YEAR:SALARY"
        )));
    };
    let year = year.trim().parse::<i32>().map_err(|_| {
        ProjectionError::InvalidYearRange(format!("salary change year `{year}` is not a year"))
    })?;
    let salary = salary.trim().parse::<f64>().map_err(|_| {
        ProjectionError::InvalidAmount(format!("salary change amount `{salary}` is not a number"))
    })?;
    Ok(SalaryChange { year, salary })
}

fn parse_salary_change_arg(raw: &str) -> Result<SalaryChange, String> {
    parse_salary_change(raw).map_err(|e| e.to_string())
}

fn parse_salary_changes(raw: &str) -> Result<Vec<SalaryChange>, ProjectionError> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_salary_change)
        .collect()
}

fn build_inputs(args: LoanArgs) -> Result<LoanInputs, ProjectionError> {
    let plan = args.plan.parse::<Plan>()?;

    if let Some(rate) = args.interest_rate {
        if !(0.0..=100.0).contains(&rate) {
            return Err(ProjectionError::InvalidAmount(
                "--interest-rate must be between 0 and 100".to_string(),
            ));
        }
    }

    let mut schedule = SalarySchedule::new();
    for change in args.salary_changes {
        schedule.add_checked(args.first_loan_year, args.salary, change.year, change.salary)?;
    }

    Ok(LoanInputs {
        plan,
        first_loan_year: args.first_loan_year,
        loan_amount: args.loan_amount,
        initial_salary: args.salary,
        salary_changes: schedule.snapshot(),
        annual_interest_rate: args.interest_rate.map(|rate| rate / 100.0),
    })
}

fn solve_config(search_max: f64, tolerance: f64) -> SalarySolveConfig {
    SalarySolveConfig {
        search_max,
        tolerance,
        ..SalarySolveConfig::default()
    }
}

pub async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Command::Project { loan, json } => {
            let projection = run_projection(&build_inputs(loan)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projection)?);
            } else {
                print_projection(&projection);
            }
        }
        Command::Solve {
            loan,
            search_max,
            tolerance,
            json,
        } => {
            let inputs = build_inputs(loan)?;
            let result = solve_clearing_salary(&inputs, solve_config(search_max, tolerance))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_solve_result(&inputs, &result);
            }
        }
        Command::Plans { json } => {
            let response = plans_response();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_plans(&response);
            }
        }
        Command::WhichPlan {
            course,
            start_year,
            start_month,
        } => {
            let course = course.parse::<CourseKind>()?;
            let plan = plan_for_course(course, start_year, start_month)?;
            println!("{plan}");
        }
        Command::Serve { port } => run_http_server(port).await?,
    }
    Ok(())
}

fn print_projection(projection: &Projection) {
    println!(
        "{} | first loan year {} | write-off year {}",
        projection.plan, projection.first_loan_year, projection.write_off_year
    );
    println!(
        "Threshold £{:.2} | interest {:.2}% | collection {:.0}% above threshold",
        projection.threshold,
        projection.annual_interest_rate * 100.0,
        REPAYMENT_RATE * 100.0
    );
    println!(
        "{:>6} {:>12} {:>12} {:>12} {:>14}",
        "Year", "Salary", "Repaid", "Interest", "Balance"
    );
    for row in &projection.years {
        let marker = if projection.salary_change_years.contains(&row.year) {
            "  salary change"
        } else {
            ""
        };
        println!(
            "{:>6} {:>12.2} {:>12.2} {:>12.2} {:>14.2}{marker}",
            row.year, row.salary, row.repaid, row.interest, row.balance
        );
    }

    let summary = &projection.summary;
    match summary.cleared_year {
        Some(year) => println!("Cleared in {year}."),
        None => println!(
            "£{:.2} written off in {}.",
            summary.written_off, summary.write_off_year
        ),
    }
    println!(
        "Total repaid £{:.2}, total interest £{:.2}.",
        summary.total_repaid, summary.total_interest
    );
}

fn print_solve_result(inputs: &LoanInputs, result: &SalarySolveResult) {
    println!(
        "{} | £{:.2} from {} | write-off year {}",
        inputs.plan, inputs.loan_amount, inputs.first_loan_year, result.write_off_year
    );
    match (result.solved_salary, result.cleared_year) {
        (Some(salary), Some(year)) => {
            println!("Clearing salary £{salary:.2} (cleared in {year}).")
        }
        _ => println!("No clearing salary up to £{:.2}.", result.search_max),
    }
    println!("{}", result.message);
}

fn print_plans(response: &PlansResponse) {
    println!(
        "{:<18} {:>10} {:>8}  Write-off",
        "Plan", "Threshold", "Rate"
    );
    for rule in &response.plans {
        let write_off = match rule.write_off_rule {
            WriteOffRule::Fixed { years } => format!("{years} years"),
            WriteOffRule::Cohort {
                cutoff_year,
                years_from,
                years_before,
            } => format!(
                "{years_from} years ({years_before} if first loan before {cutoff_year})"
            ),
        };
        println!(
            "{:<18} {:>10.0} {:>7.2}%  {write_off}",
            rule.plan.label(),
            rule.threshold,
            rule.annual_interest_rate * 100.0
        );
    }
}

fn plans_response() -> PlansResponse {
    PlansResponse {
        repayment_rate: REPAYMENT_RATE,
        plans: plan_rules(),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/solve",
            get(solve_get_handler).post(solve_post_handler),
        )
        .route("/api/plans", get(plans_handler))
        .route("/api/which-plan", get(which_plan_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Student loan API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/plans");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorResponse {
            error: "Not found".to_string(),
            kind: "not-found",
        },
    )
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_response(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_response(payload)
}

async fn solve_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    solve_response(payload)
}

async fn solve_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    solve_response(payload)
}

async fn plans_handler() -> Response {
    json_response(StatusCode::OK, plans_response())
}

async fn which_plan_handler(Query(query): Query<WhichPlanQuery>) -> Response {
    which_plan_response(query)
}

fn project_response(payload: ProjectPayload) -> Response {
    match api_request_from_payload(payload).and_then(|request| run_projection(&request.inputs)) {
        Ok(projection) => json_response(StatusCode::OK, projection),
        Err(err) => projection_error_response(&err),
    }
}

fn solve_response(payload: ProjectPayload) -> Response {
    let result = api_request_from_payload(payload)
        .and_then(|request| solve_clearing_salary(&request.inputs, request.solve));
    match result {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => projection_error_response(&err),
    }
}

fn which_plan_response(query: WhichPlanQuery) -> Response {
    let (Some(course), Some(start_year), Some(start_month)) =
        (query.course, query.start_year, query.start_month)
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "course, startYear and startMonth are required",
            "missing-field",
        );
    };
    let course = match course.parse::<CourseKind>() {
        Ok(course) => course,
        Err(err) => return projection_error_response(&err),
    };
    match plan_for_course(course, start_year, start_month) {
        Ok(plan) => json_response(
            StatusCode::OK,
            WhichPlanResponse {
                plan,
                label: plan.label(),
            },
        ),
        Err(err) => projection_error_response(&err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str, kind: &'static str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            kind,
        },
    )
}

fn projection_error_response(err: &ProjectionError) -> Response {
    eprintln!("Rejected request: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string(), err.kind())
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ApiRequest, ProjectionError> {
    let mut args = default_loan_args();
    let mut solve = SalarySolveConfig::default();

    if let Some(v) = payload.plan {
        args.plan = v;
    }
    if let Some(v) = payload.first_loan_year {
        args.first_loan_year = v;
    }
    if let Some(v) = payload.loan_amount {
        args.loan_amount = v;
    }
    if let Some(v) = payload.initial_salary {
        args.salary = v;
    }
    if let Some(v) = payload.salary_changes {
        args.salary_changes = match v {
            SalaryChangesField::List(list) => list
                .into_iter()
                .map(|c| SalaryChange {
                    year: c.year,
                    salary: c.salary,
                })
                .collect(),
            SalaryChangesField::Encoded(raw) => parse_salary_changes(&raw)?,
        };
    }
    if let Some(v) = payload.interest_rate {
        args.interest_rate = Some(v);
    }
    if let Some(v) = payload.search_max {
        solve.search_max = v;
    }
    if let Some(v) = payload.tolerance {
        solve.tolerance = v;
    }

    let inputs = build_inputs(args)?;
    Ok(ApiRequest { inputs, solve })
}

fn default_loan_args() -> LoanArgs {
    LoanArgs {
        plan: "plan-1".to_string(),
        first_loan_year: 2010,
        loan_amount: 50_000.0,
        salary: 35_000.0,
        salary_changes: Vec::new(),
        interest_rate: None,
    }
}
