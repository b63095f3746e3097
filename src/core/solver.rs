use std::collections::BTreeMap;

use serde::Serialize;

use super::engine::{project_years, validate_inputs};
use super::error::ProjectionError;
use super::rules::{annual_interest_rate_for, write_off_year_for};
use super::types::LoanInputs;

#[derive(Debug, Clone, Copy)]
pub struct SalarySolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SalarySolveConfig {
    fn default() -> Self {
        Self {
            search_min: 0.0,
            search_max: 500_000.0,
            tolerance: 1.0,
            max_iterations: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalarySolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_salary: f64,
    pub cleared_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalarySolveResult {
    pub write_off_year: i32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_salary: Option<f64>,
    pub cleared_year: Option<i32>,
    pub iterations: Vec<SalarySolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

pub fn solve_clearing_salary(
    inputs: &LoanInputs,
    config: SalarySolveConfig,
) -> Result<SalarySolveResult, ProjectionError> {
    validate_inputs(inputs)?;
    validate_config(config)?;

    let write_off_year = write_off_year_for(inputs.plan, inputs.first_loan_year);
    let mut iterations = Vec::with_capacity(config.max_iterations as usize);

    let low_cleared = cleared_year_at(inputs, write_off_year, config.search_min);
    let high_cleared = cleared_year_at(inputs, write_off_year, config.search_max);

    let mut solved_salary = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_cleared.is_some() {
        solved_salary = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Balance already clears at the lower salary bound.".to_string();
    } else if high_cleared.is_none() {
        feasible = false;
        message = "No salary within the search bounds clears the balance before write-off."
            .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let cleared_year = cleared_year_at(inputs, write_off_year, mid);
            iterations.push(SalarySolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_salary: mid,
                cleared_year,
            });

            if cleared_year.is_some() {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_salary = Some(hi);
        feasible = true;
        message = if converged {
            "Solved clearing salary.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let cleared_year =
        solved_salary.and_then(|salary| cleared_year_at(inputs, write_off_year, salary));

    Ok(SalarySolveResult {
        write_off_year,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        solved_salary,
        cleared_year,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn cleared_year_at(inputs: &LoanInputs, write_off_year: i32, salary: f64) -> Option<i32> {
    let rate = inputs
        .annual_interest_rate
        .unwrap_or_else(|| annual_interest_rate_for(inputs.plan));
    project_years(
        inputs.plan,
        inputs.loan_amount,
        inputs.first_loan_year,
        write_off_year,
        salary,
        &BTreeMap::new(),
        rate,
    )
    .iter()
    .find(|row| row.balance <= 0.0)
    .map(|row| row.year)
}

fn validate_config(config: SalarySolveConfig) -> Result<(), ProjectionError> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(ProjectionError::InvalidAmount(
            "search bounds must be finite".to_string(),
        ));
    }
    if config.search_min < 0.0 {
        return Err(ProjectionError::InvalidAmount(
            "search_min must be >= 0".to_string(),
        ));
    }
    if config.search_max <= config.search_min {
        return Err(ProjectionError::InvalidAmount(
            "search_max must be greater than search_min".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(ProjectionError::InvalidAmount(
            "tolerance must be > 0".to_string(),
        ));
    }
    if config.max_iterations == 0 {
        return Err(ProjectionError::InvalidAmount(
            "max_iterations must be > 0".to_string(),
        ));
    }
    Ok(())
}
