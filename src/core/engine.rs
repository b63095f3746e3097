use std::collections::BTreeMap;

use super::error::ProjectionError;
use super::rules::{annual_interest_rate_for, annual_repayment, threshold_for, write_off_year_for};
use super::types::{
    LoanInputs, Plan, Projection, ProjectionPoint, ProjectionSummary, ProjectionYear,
};

pub const MIN_FIRST_LOAN_YEAR: i32 = 1980;
pub const MAX_FIRST_LOAN_YEAR: i32 = 2100;

pub fn project(
    plan: Plan,
    loan_amount: f64,
    first_loan_year: i32,
    write_off_year: i32,
    initial_salary: f64,
    salary_changes: &BTreeMap<i32, f64>,
    annual_interest_rate: f64,
) -> Vec<ProjectionPoint> {
    project_years(
        plan,
        loan_amount,
        first_loan_year,
        write_off_year,
        initial_salary,
        salary_changes,
        annual_interest_rate,
    )
    .into_iter()
    .map(ProjectionPoint::from)
    .collect()
}

pub fn project_years(
    plan: Plan,
    loan_amount: f64,
    first_loan_year: i32,
    write_off_year: i32,
    initial_salary: f64,
    salary_changes: &BTreeMap<i32, f64>,
    annual_interest_rate: f64,
) -> Vec<ProjectionYear> {
    let mut salary = initial_salary;
    let mut balance = loan_amount;
    let mut rows = vec![ProjectionYear {
        year: first_loan_year,
        salary,
        repayment_due: 0.0,
        repaid: 0.0,
        interest: 0.0,
        balance,
    }];
    let Some(start) = first_loan_year.checked_add(1) else {
        return rows;
    };

    // a change keyed on year Y already applies to year Y's repayment
    for year in start..=write_off_year {
        if let Some(&changed) = salary_changes.get(&year) {
            salary = changed;
        }
        if balance <= 0.0 {
            break;
        }

        let repayment_due = annual_repayment(plan, salary);
        let interest = balance * annual_interest_rate;
        let accrued = balance + interest;
        let new_balance = (accrued - repayment_due).max(0.0);

        rows.push(ProjectionYear {
            year,
            salary,
            repayment_due,
            repaid: accrued - new_balance,
            interest,
            balance: new_balance,
        });
        balance = new_balance;
    }

    rows
}

pub fn validate_inputs(inputs: &LoanInputs) -> Result<(), ProjectionError> {
    if !(MIN_FIRST_LOAN_YEAR..=MAX_FIRST_LOAN_YEAR).contains(&inputs.first_loan_year) {
        return Err(ProjectionError::InvalidYearRange(format!(
            "first loan year {} must be between {MIN_FIRST_LOAN_YEAR} and {MAX_FIRST_LOAN_YEAR}",
            inputs.first_loan_year
        )));
    }

    if !inputs.loan_amount.is_finite() || inputs.loan_amount < 0.0 {
        return Err(ProjectionError::InvalidAmount(
            "loan amount must be >= 0".to_string(),
        ));
    }

    if !inputs.initial_salary.is_finite() || inputs.initial_salary < 0.0 {
        return Err(ProjectionError::InvalidAmount(
            "initial salary must be >= 0".to_string(),
        ));
    }

    for (&year, &salary) in &inputs.salary_changes {
        if year <= inputs.first_loan_year {
            return Err(ProjectionError::InvalidYearRange(format!(
                "salary change year {year} must be after first loan year {}",
                inputs.first_loan_year
            )));
        }
        if !salary.is_finite() || salary < 0.0 {
            return Err(ProjectionError::InvalidAmount(format!(
                "salary change for {year} must be >= 0"
            )));
        }
    }

    if let Some(rate) = inputs.annual_interest_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ProjectionError::InvalidAmount(
                "annual interest rate must be between 0 and 1".to_string(),
            ));
        }
    }

    Ok(())
}

pub fn run_projection(inputs: &LoanInputs) -> Result<Projection, ProjectionError> {
    validate_inputs(inputs)?;

    let write_off_year = write_off_year_for(inputs.plan, inputs.first_loan_year);
    let annual_interest_rate = inputs
        .annual_interest_rate
        .unwrap_or_else(|| annual_interest_rate_for(inputs.plan));

    let years = project_years(
        inputs.plan,
        inputs.loan_amount,
        inputs.first_loan_year,
        write_off_year,
        inputs.initial_salary,
        &inputs.salary_changes,
        annual_interest_rate,
    );
    let points = years.iter().copied().map(ProjectionPoint::from).collect();
    let summary = summarize(&years, write_off_year);

    Ok(Projection {
        plan: inputs.plan,
        first_loan_year: inputs.first_loan_year,
        write_off_year,
        threshold: threshold_for(inputs.plan),
        annual_interest_rate,
        points,
        years,
        salary_change_years: inputs.salary_changes.keys().copied().collect(),
        summary,
    })
}

fn summarize(years: &[ProjectionYear], write_off_year: i32) -> ProjectionSummary {
    let final_balance = years.last().map(|row| row.balance).unwrap_or(0.0);
    let cleared_year = years
        .iter()
        .find(|row| row.balance <= 0.0)
        .map(|row| row.year);

    ProjectionSummary {
        write_off_year,
        cleared_year,
        final_balance,
        written_off: if cleared_year.is_some() {
            0.0
        } else {
            final_balance
        },
        total_repaid: years.iter().map(|row| row.repaid).sum(),
        total_interest: years.iter().map(|row| row.interest).sum(),
    }
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

    fn sample_inputs() -> LoanInputs {
        LoanInputs {
            plan: Plan::Plan2,
            first_loan_year: 2015,
            loan_amount: 50_000.0,
            initial_salary: 35_000.0,
            salary_changes: BTreeMap::new(),
            annual_interest_rate: None,
        }
    }

    fn plan_2_points(loan_amount: f64, changes: &BTreeMap<i32, f64>) -> Vec<ProjectionPoint> {
        project(Plan::Plan2, loan_amount, 2015, 2045, 35_000.0, changes, 0.077)
    }

    #[test]
    fn first_point_is_starting_balance() {
        let points = plan_2_points(50_000.0, &BTreeMap::new());
        assert_eq!(
            points[0],
            ProjectionPoint {
                year: 2015,
                balance: 50_000.0
            }
        );
    }

    #[test]
    fn oracle_plan_2_first_year_step() {
        let points = plan_2_points(50_000.0, &BTreeMap::new());
        // 50000 * 1.077 - (35000 - 27295) * 0.09
        assert_eq!(points[1].year, 2016);
        assert_approx(points[1].balance, 53_156.55);

        let points = plan_2_points(35_000.0, &BTreeMap::new());
        assert_approx(points[1].balance, 37_001.55);
    }

    #[test]
    fn plan_2_runs_to_write_off_when_repayment_below_interest() {
        let projection = run_projection(&sample_inputs()).expect("valid inputs");
        assert_eq!(projection.write_off_year, 2045);
        assert_eq!(projection.points.len(), 31);
        assert_eq!(projection.points.last().map(|p| p.year), Some(2045));
        assert!(projection.summary.cleared_year.is_none());
        assert!(projection.summary.written_off > 50_000.0);
        assert_approx(projection.summary.written_off, projection.summary.final_balance);
        for pair in projection.points.windows(2) {
            assert!(pair[1].balance > pair[0].balance, "interest capitalizes");
        }
    }

    #[test]
    fn salary_change_applies_from_its_own_year() {
        let mut changes = BTreeMap::new();
        changes.insert(2020, 50_000.0);

        let no_changes = BTreeMap::new();
        let base = project_years(Plan::Plan2, 50_000.0, 2015, 2045, 35_000.0, &no_changes, 0.077);
        let raised = project_years(Plan::Plan2, 50_000.0, 2015, 2045, 35_000.0, &changes, 0.077);

        for (a, b) in base.iter().zip(raised.iter()) {
            if a.year < 2020 {
                assert_eq!(a, b);
            }
        }
        let row_2019 = raised.iter().find(|r| r.year == 2019).expect("2019 row");
        let row_2020 = raised.iter().find(|r| r.year == 2020).expect("2020 row");
        let row_2021 = raised.iter().find(|r| r.year == 2021).expect("2021 row");
        assert_approx(row_2019.repayment_due, (35_000.0 - 27_295.0) * 0.09);
        assert_approx(row_2020.repayment_due, (50_000.0 - 27_295.0) * 0.09);
        assert_approx(row_2021.repayment_due, (50_000.0 - 27_295.0) * 0.09);
        assert_approx(row_2020.salary, 50_000.0);

        let base_2020 = base.iter().find(|r| r.year == 2020).expect("2020 row");
        assert!(row_2020.balance < base_2020.balance);
    }

    #[test]
    fn zero_loan_yields_single_point() {
        let points = plan_2_points(0.0, &BTreeMap::new());
        assert_eq!(
            points,
            vec![ProjectionPoint {
                year: 2015,
                balance: 0.0
            }]
        );

        let mut inputs = sample_inputs();
        inputs.loan_amount = 0.0;
        let projection = run_projection(&inputs).expect("valid inputs");
        assert_eq!(projection.summary.cleared_year, Some(2015));
        assert_approx(projection.summary.written_off, 0.0);
        assert_approx(projection.summary.total_repaid, 0.0);
    }

    #[test]
    fn write_off_before_first_year_yields_single_point() {
        let no_changes = BTreeMap::new();
        let points = project(Plan::Plan1, 10_000.0, 2015, 2010, 30_000.0, &no_changes, 0.0625);
        assert_eq!(points.len(), 1);
        assert_approx(points[0].balance, 10_000.0);
    }

    #[test]
    fn extreme_years_do_not_overflow() {
        let no_changes = BTreeMap::new();
        let points = project(Plan::Plan2, 1.0, i32::MAX, i32::MAX, 30_000.0, &no_changes, 0.077);
        assert_eq!(
            points,
            vec![ProjectionPoint {
                year: i32::MAX,
                balance: 1.0
            }]
        );

        let rows = project_years(Plan::Plan2, 1.0, i32::MAX - 1, i32::MAX, 0.0, &no_changes, 0.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].year, i32::MAX);
    }

    #[test]
    fn high_salary_clears_loan_and_stops() {
        let mut inputs = sample_inputs();
        inputs.loan_amount = 5_000.0;
        inputs.initial_salary = 100_000.0;
        let projection = run_projection(&inputs).expect("valid inputs");

        // repayment 6543.45 vs 5385 owed after one year of interest
        assert_eq!(projection.points.len(), 2);
        assert_eq!(projection.summary.cleared_year, Some(2016));
        assert_approx(projection.points[1].balance, 0.0);
        assert_approx(projection.years[1].repaid, 5_385.0);
        assert_approx(projection.summary.total_repaid, 5_385.0);
        assert_approx(projection.summary.total_interest, 385.0);
        assert_approx(projection.summary.written_off, 0.0);
    }

    #[test]
    fn changes_beyond_write_off_are_ignored() {
        let mut inputs = sample_inputs();
        let baseline = run_projection(&inputs).expect("valid inputs");
        inputs.salary_changes.insert(2050, 1_000_000.0);
        let with_late_change = run_projection(&inputs).expect("valid inputs");

        assert_eq!(baseline.points, with_late_change.points);
        assert_eq!(with_late_change.salary_change_years, vec![2050]);
    }

    #[test]
    fn interest_override_replaces_table_rate() {
        let mut inputs = sample_inputs();
        inputs.annual_interest_rate = Some(0.0);
        let projection = run_projection(&inputs).expect("valid inputs");
        assert_approx(projection.annual_interest_rate, 0.0);
        assert_approx(projection.points[1].balance, 50_000.0 - 693.45);
    }

    #[test]
    fn plan_1_pre_2006_cohort_projects_sixty_five_years() {
        let mut inputs = sample_inputs();
        inputs.plan = Plan::Plan1;
        inputs.first_loan_year = 2000;
        inputs.loan_amount = 1_000.0;
        inputs.initial_salary = 0.0;
        let projection = run_projection(&inputs).expect("valid inputs");
        assert_eq!(projection.write_off_year, 2065);
        assert_eq!(projection.points.len(), 66);
    }

    #[test]
    fn validate_rejects_bad_inputs_without_computing() {
        let mut inputs = sample_inputs();
        inputs.first_loan_year = 1970;
        let err = run_projection(&inputs).expect_err("year out of range");
        assert!(matches!(err, ProjectionError::InvalidYearRange(_)));

        let mut inputs = sample_inputs();
        inputs.loan_amount = -1.0;
        let err = run_projection(&inputs).expect_err("negative loan");
        assert!(matches!(err, ProjectionError::InvalidAmount(_)));

        let mut inputs = sample_inputs();
        inputs.initial_salary = f64::INFINITY;
        let err = run_projection(&inputs).expect_err("infinite salary");
        assert!(matches!(err, ProjectionError::InvalidAmount(_)));

        let mut inputs = sample_inputs();
        inputs.salary_changes.insert(2015, 40_000.0);
        let err = run_projection(&inputs).expect_err("change in first loan year");
        assert!(matches!(err, ProjectionError::InvalidYearRange(_)));

        let mut inputs = sample_inputs();
        inputs.salary_changes.insert(2020, -5.0);
        let err = run_projection(&inputs).expect_err("negative change salary");
        assert!(matches!(err, ProjectionError::InvalidAmount(_)));

        let mut inputs = sample_inputs();
        inputs.annual_interest_rate = Some(1.5);
        let err = run_projection(&inputs).expect_err("rate above 100%");
        assert!(matches!(err, ProjectionError::InvalidAmount(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_projection_invariants(
            plan_idx in 0usize..5,
            first_year in 1980i32..2060,
            loan in 0u32..150_000,
            salary in 0u32..150_000,
            change_offsets in proptest::collection::vec((1i32..70, 0u32..200_000), 0..6),
        ) {
            let plan = Plan::ALL[plan_idx];
            let changes: BTreeMap<i32, f64> = change_offsets
                .into_iter()
                .map(|(offset, s)| (first_year + offset, s as f64))
                .collect();
            let inputs = LoanInputs {
                plan,
                first_loan_year: first_year,
                loan_amount: loan as f64,
                initial_salary: salary as f64,
                salary_changes: changes,
                annual_interest_rate: None,
            };

            let a = run_projection(&inputs).expect("valid inputs");
            let b = run_projection(&inputs).expect("valid inputs");
            prop_assert_eq!(&a.points, &b.points);

            prop_assert_eq!(a.points[0], ProjectionPoint { year: first_year, balance: loan as f64 });
            prop_assert!(a.points.last().map(|p| p.year).unwrap_or(first_year) <= a.write_off_year);

            for (idx, point) in a.points.iter().enumerate() {
                prop_assert!(point.balance >= 0.0);
                prop_assert_eq!(point.year, first_year + idx as i32);
                if point.balance == 0.0 {
                    prop_assert_eq!(idx, a.points.len() - 1);
                }
            }

            let cleared = a.points.last().map(|p| p.balance == 0.0).unwrap_or(false);
            if !cleared {
                prop_assert_eq!(a.points.len() as i32, a.write_off_year - first_year + 1);
            }
        }
    }
}
