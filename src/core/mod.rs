mod engine;
mod error;
mod rules;
mod schedule;
mod solver;
mod types;

pub use engine::{
    MAX_FIRST_LOAN_YEAR, MIN_FIRST_LOAN_YEAR, project, project_years, run_projection,
    validate_inputs,
};
pub use error::ProjectionError;
pub use rules::{
    REPAYMENT_RATE, annual_interest_rate_for, annual_repayment, plan_for_course, plan_rule,
    plan_rules, threshold_for, write_off_year_for,
};
pub use schedule::SalarySchedule;
pub use solver::{SalarySolveConfig, SalarySolveIteration, SalarySolveResult, solve_clearing_salary};
pub use types::{
    CourseKind, LoanInputs, Plan, PlanRule, Projection, ProjectionPoint, ProjectionSummary,
    ProjectionYear, SalaryChange, WriteOffRule,
};
