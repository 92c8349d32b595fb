use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("log ended before the thermodynamic output section was reached")]
    MainPhaseNotReached,
}

/// The tabular thermodynamic output scraped from an engine run log.
///
/// The parser enforces exactly one precondition: the log must contain at
/// least one thermo section (a `Step ...` header line), proving the run
/// reached its main computation phase. Everything after that checkpoint is
/// lenient - a column that never appeared simply yields an empty series.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermoLog {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ThermoLog {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut in_section = false;

        for line in text.lines() {
            let trimmed = line.trim();
            let mut tokens = trimmed.split_whitespace();
            match tokens.next() {
                Some("Step") => {
                    let header: Vec<String> = std::iter::once("Step".to_string())
                        .chain(tokens.map(|t| t.to_string()))
                        .collect();
                    if columns.is_empty() {
                        columns = header;
                    }
                    in_section = true;
                }
                Some("Loop") => {
                    in_section = false;
                }
                Some(_) if in_section => {
                    let values: Option<Vec<f64>> = trimmed
                        .split_whitespace()
                        .map(|t| t.parse::<f64>().ok())
                        .collect();
                    match values {
                        Some(v) if v.len() == columns.len() => rows.push(v),
                        // Anything non-numeric inside a section (engine
                        // chatter, truncation) ends the section.
                        _ => in_section = false,
                    }
                }
                _ => {}
            }
        }

        if columns.is_empty() {
            return Err(ParseError::MainPhaseNotReached);
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The series for one thermo column; empty when the column is absent.
    pub fn series(&self, column: &str) -> Vec<f64> {
        match self.columns.iter().position(|c| c == column) {
            Some(idx) => self.rows.iter().map(|r| r[idx]).collect(),
            None => Vec::new(),
        }
    }

    pub fn steps(&self) -> Vec<f64> {
        self.series("Step")
    }

    /// All series keyed by column name.
    pub fn to_map(&self) -> HashMap<String, Vec<f64>> {
        self.columns
            .iter()
            .map(|c| (c.clone(), self.series(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
units metal
Setting up run ...
Per MPI rank memory allocation (min/avg/max) = 3.2 | 3.2 | 3.2 Mbytes
Step Temp PotEng TotEng Press
       0          300   -13.44     -12.98     1724.5
     100          287   -13.41     -12.97     1698.2
     200          291   -13.42     -12.97     1703.9
Loop time of 0.32 on 1 procs
Total wall time: 0:00:01
";

    #[test]
    fn parses_the_thermo_section() {
        let log = ThermoLog::parse(SAMPLE).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.steps(), vec![0.0, 100.0, 200.0]);
        let temp = log.series("Temp");
        assert_eq!(temp, vec![300.0, 287.0, 291.0]);
    }

    #[test]
    fn missing_main_phase_is_a_precondition_error() {
        let truncated = "units metal\nSetting up run ...\n";
        assert_eq!(
            ThermoLog::parse(truncated),
            Err(ParseError::MainPhaseNotReached)
        );
    }

    #[test]
    fn absent_columns_degrade_to_empty_series() {
        let log = ThermoLog::parse(SAMPLE).unwrap();
        assert!(log.series("Pxx").is_empty());
    }

    #[test]
    fn truncated_rows_are_dropped_without_error() {
        let partial = "\
Step Temp
       0          300
     100
";
        let log = ThermoLog::parse(partial).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.steps(), vec![0.0]);
    }

    #[test]
    fn repeated_run_sections_are_concatenated() {
        let two_runs = format!("{SAMPLE}\nStep Temp PotEng TotEng Press\n     300 290 -13.4 -12.9 1700.0\nLoop time of 0.1 on 1 procs\n");
        let log = ThermoLog::parse(&two_runs).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log.steps().last(), Some(&300.0));
    }
}
