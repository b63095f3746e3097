use std::collections::BTreeMap;

use super::error::ProjectionError;
use super::types::SalaryChange;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalarySchedule {
    entries: Vec<SalaryChange>,
}

impl SalarySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, year: i32, salary: f64) {
        self.entries.push(SalaryChange { year, salary });
    }

    pub fn add_checked(
        &mut self,
        first_loan_year: i32,
        initial_salary: f64,
        year: i32,
        salary: f64,
    ) -> Result<(), ProjectionError> {
        if year <= first_loan_year {
            return Err(ProjectionError::InvalidYearRange(format!(
                "salary change year {year} must be after first loan year {first_loan_year}"
            )));
        }
        if !salary.is_finite() || salary < 0.0 {
            return Err(ProjectionError::InvalidAmount(format!(
                "salary change for {year} must be a non-negative amount"
            )));
        }
        let current = self.salary_in_effect(year, initial_salary);
        if salary < current {
            return Err(ProjectionError::InvalidAmount(format!(
                "salary change for {year} must be >= salary in effect ({current})"
            )));
        }
        self.add(year, salary);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<SalaryChange> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn entries(&self) -> &[SalaryChange] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn salary_in_effect(&self, year: i32, initial_salary: f64) -> f64 {
        self.snapshot()
            .range(..=year)
            .next_back()
            .map(|(_, salary)| *salary)
            .unwrap_or(initial_salary)
    }

    pub fn snapshot(&self) -> BTreeMap<i32, f64> {
        let mut by_year = BTreeMap::new();
        for change in &self.entries {
            by_year.insert(change.year, change.salary);
        }
        by_year
    }
}

impl FromIterator<SalaryChange> for SalarySchedule {
    fn from_iter<I: IntoIterator<Item = SalaryChange>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
