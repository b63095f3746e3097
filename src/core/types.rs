use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::ProjectionError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub enum Plan {
    #[serde(rename = "plan-1")]
    Plan1,
    #[serde(rename = "plan-2")]
    Plan2,
    #[serde(rename = "plan-4")]
    Plan4,
    #[serde(rename = "plan-5")]
    Plan5,
    #[serde(rename = "postgraduate-loan")]
    PostgraduateLoan,
}

impl Plan {
    pub const ALL: [Plan; 5] = [
        Plan::Plan1,
        Plan::Plan2,
        Plan::Plan4,
        Plan::Plan5,
        Plan::PostgraduateLoan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Plan::Plan1 => "Plan 1",
            Plan::Plan2 => "Plan 2",
            Plan::Plan4 => "Plan 4",
            Plan::Plan5 => "Plan 5",
            Plan::PostgraduateLoan => "Postgraduate Loan",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Plan {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "plan1" | "1" => Ok(Plan::Plan1),
            "plan2" | "2" => Ok(Plan::Plan2),
            "plan4" | "4" => Ok(Plan::Plan4),
            "plan5" | "5" => Ok(Plan::Plan5),
            "postgraduateloan" | "postgraduate" | "pgl" => Ok(Plan::PostgraduateLoan),
            _ => Err(ProjectionError::InvalidPlan(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WriteOffRule {
    #[serde(rename_all = "camelCase")]
    Fixed { years: i32 },
    #[serde(rename_all = "camelCase")]
    Cohort {
        cutoff_year: i32,
        years_from: i32,
        years_before: i32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRule {
    pub plan: Plan,
    pub threshold: f64,
    pub annual_interest_rate: f64,
    pub write_off_rule: WriteOffRule,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct SalaryChange {
    pub year: i32,
    pub salary: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CourseKind {
    Undergraduate,
    Pgce,
    AdvancedLearnerLoan,
    HigherEducationShortCourse,
    Postgraduate,
}

impl FromStr for CourseKind {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "undergraduate" | "ug" => Ok(CourseKind::Undergraduate),
            "pgce" => Ok(CourseKind::Pgce),
            "advanced-learner-loan" | "all" => Ok(CourseKind::AdvancedLearnerLoan),
            "short-course" | "higher-education-short-course" => {
                Ok(CourseKind::HigherEducationShortCourse)
            }
            "postgraduate" | "masters" | "doctoral" => Ok(CourseKind::Postgraduate),
            _ => Err(ProjectionError::InvalidCourse(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoanInputs {
    pub plan: Plan,
    pub first_loan_year: i32,
    pub loan_amount: f64,
    pub initial_salary: f64,
    pub salary_changes: BTreeMap<i32, f64>,
    pub annual_interest_rate: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub year: i32,
    pub balance: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub year: i32,
    pub salary: f64,
    pub repayment_due: f64,
    pub repaid: f64,
    pub interest: f64,
    pub balance: f64,
}

impl From<ProjectionYear> for ProjectionPoint {
    fn from(row: ProjectionYear) -> Self {
        ProjectionPoint {
            year: row.year,
            balance: row.balance,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub write_off_year: i32,
    pub cleared_year: Option<i32>,
    pub final_balance: f64,
    pub written_off: f64,
    pub total_repaid: f64,
    pub total_interest: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub plan: Plan,
    pub first_loan_year: i32,
    pub write_off_year: i32,
    pub threshold: f64,
    pub annual_interest_rate: f64,
    pub points: Vec<ProjectionPoint>,
    pub years: Vec<ProjectionYear>,
    pub salary_change_years: Vec<i32>,
    pub summary: ProjectionSummary,
}
