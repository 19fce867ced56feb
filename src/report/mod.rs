use console::style;

use crate::store::{self, Record};

/// Records whose output field is still absent or empty
#[derive(Debug, Clone, PartialEq)]
pub struct MissingReport {
    pub field: String,
    pub total: usize,
    /// Position and label of each incomplete record
    pub missing: Vec<(usize, String)>,
}

impl MissingReport {
    pub fn build(records: &[Record], field: &str, label_field: &str) -> Self {
        let missing = records
            .iter()
            .enumerate()
            .filter(|(_, record)| store::text_field(record, field).is_none())
            .map(|(index, record)| (index, store::label(record, label_field).to_string()))
            .collect();

        Self {
            field: field.to_string(),
            total: records.len(),
            missing,
        }
    }

    /// Share of records carrying the field, 0-100
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.total - self.missing.len()) as f64 / self.total as f64 * 100.0
    }

    /// One-line summary printed after a run
    pub fn coverage_line(&self) -> String {
        format!(
            "{} of {} items now have {} ({:.2}%)",
            self.total - self.missing.len(),
            self.total,
            self.field,
            self.completion_percentage()
        )
    }

    /// Plain-text rendering of the report
    pub fn format(&self) -> String {
        let mut out = format!("Items missing {}:\n{}\n", self.field, "-".repeat(50));
        for (index, name) in &self.missing {
            out.push_str(&format!("Index {}: {}\n", index, name));
        }
        out.push_str(&format!(
            "\nTotal items missing {}: {}\nTotal items in dataset: {}\nCompletion percentage: {:.2}%",
            self.field,
            self.missing.len(),
            self.total,
            self.completion_percentage()
        ));
        out
    }
}

/// Print the report to the console
pub fn print_to_console(report: &MissingReport) {
    println!("{}", report.format());
    let summary = format!(
        "{} of {} complete",
        report.total - report.missing.len(),
        report.total
    );
    if report.missing.is_empty() {
        println!("{}", style(summary).green());
    } else {
        println!("{}", style(summary).yellow());
    }
}
