use super::error::ProjectionError;
use super::types::{CourseKind, Plan, PlanRule, WriteOffRule};

pub const REPAYMENT_RATE: f64 = 0.09;

const COHORT_RULE: WriteOffRule = WriteOffRule::Cohort {
    cutoff_year: 2006,
    years_from: 25,
    years_before: 65,
};

pub fn plan_rule(plan: Plan) -> PlanRule {
    let (threshold, annual_interest_rate, write_off_rule) = match plan {
        Plan::Plan1 => (22_015.0, 0.0625, COHORT_RULE),
        Plan::Plan2 => (27_295.0, 0.077, WriteOffRule::Fixed { years: 30 }),
        Plan::Plan4 => (27_660.0, 0.0625, COHORT_RULE),
        Plan::Plan5 => (25_000.0, 0.077, WriteOffRule::Fixed { years: 40 }),
        Plan::PostgraduateLoan => (21_000.0, 0.077, WriteOffRule::Fixed { years: 30 }),
    };
    PlanRule {
        plan,
        threshold,
        annual_interest_rate,
        write_off_rule,
    }
}

pub fn plan_rules() -> Vec<PlanRule> {
    Plan::ALL.into_iter().map(plan_rule).collect()
}

pub fn threshold_for(plan: Plan) -> f64 {
    plan_rule(plan).threshold
}

pub fn annual_interest_rate_for(plan: Plan) -> f64 {
    plan_rule(plan).annual_interest_rate
}

pub fn write_off_year_for(plan: Plan, first_loan_year: i32) -> i32 {
    match plan_rule(plan).write_off_rule {
        WriteOffRule::Fixed { years } => first_loan_year.saturating_add(years),
        WriteOffRule::Cohort {
            cutoff_year,
            years_from,
            years_before,
        } => {
            if first_loan_year >= cutoff_year {
                first_loan_year.saturating_add(years_from)
            } else {
                first_loan_year.saturating_add(years_before)
            }
        }
    }
}

pub fn annual_repayment(plan: Plan, salary: f64) -> f64 {
    let threshold = threshold_for(plan);
    if salary > threshold {
        (salary - threshold) * REPAYMENT_RATE
    } else {
        0.0
    }
}

pub fn plan_for_course(
    course: CourseKind,
    start_year: i32,
    start_month: u32,
) -> Result<Plan, ProjectionError> {
    if !(1..=12).contains(&start_month) {
        return Err(ProjectionError::InvalidYearRange(format!(
            "course start month {start_month} must be between 1 and 12"
        )));
    }

    let started = (start_year, start_month);
    if started >= (2023, 8) {
        Ok(match course {
            CourseKind::Undergraduate | CourseKind::Pgce | CourseKind::AdvancedLearnerLoan => {
                Plan::Plan5
            }
            CourseKind::HigherEducationShortCourse => Plan::Plan2,
            CourseKind::Postgraduate => Plan::PostgraduateLoan,
        })
    } else if started >= (2012, 9) {
        Ok(match course {
            CourseKind::Postgraduate => Plan::PostgraduateLoan,
            _ => Plan::Plan2,
        })
    } else {
        Ok(Plan::Plan1)
    }
}
