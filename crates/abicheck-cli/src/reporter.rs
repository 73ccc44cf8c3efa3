//! Case reporter - display run results

use abicheck_runtime::{CaseOutcome, RunSummary};
use colored::*;
use std::io::{self, Write};
use std::time::Duration;

/// Reporter with output configuration
pub struct CaseReporter {
    /// Show a PASS/FAIL line with timing for each case
    verbose: bool,
    /// Disable colored output
    no_color: bool,
}

impl Default for CaseReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CaseReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Print the whole run to stdout
    pub fn report(&self, summary: &RunSummary) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_report(&mut out, summary)
    }

    /// Write the run report
    ///
    /// The `index:signature:1|0` lines and the closing `result:` line are
    /// always present; the verbose view adds decorated lines and a summary.
    pub fn write_report<W: Write>(&self, out: &mut W, summary: &RunSummary) -> io::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }

        for outcome in &summary.outcomes {
            self.write_outcome(out, outcome)?;
        }

        if self.verbose {
            writeln!(out)?;
            self.write_summary(out, summary)?;
        }

        writeln!(
            out,
            "result: call_aggrs: {}",
            if summary.all_passed() { 1 } else { 0 }
        )?;

        if self.no_color {
            colored::control::unset_override();
        }
        Ok(())
    }

    fn write_outcome<W: Write>(&self, out: &mut W, outcome: &CaseOutcome) -> io::Result<()> {
        writeln!(
            out,
            "{}:{}:{}",
            outcome.index,
            outcome.signature,
            if outcome.passed { 1 } else { 0 }
        )?;

        if let Some(diagnostic) = &outcome.diagnostic {
            writeln!(out, "{}", diagnostic)?;
        }

        if self.verbose {
            let elapsed = Duration::from_micros(outcome.elapsed_us);
            let status = if outcome.passed {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            writeln!(out, "  {} {} ({:.2?})", status, outcome.signature, elapsed)?;
        }
        Ok(())
    }

    fn write_summary<W: Write>(&self, out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let failed = summary.failed();

        writeln!(out, "{}", "─".repeat(50))?;

        let status = if failed > 0 {
            "FAILED".red().bold()
        } else {
            "PASSED".green().bold()
        };

        writeln!(
            out,
            "Case result: {} | {} total, {} passed, {} failed",
            status,
            summary.outcomes.len().to_string().bold(),
            summary.passed().to_string().green().bold(),
            if failed > 0 {
                failed.to_string().red().bold()
            } else {
                failed.to_string().normal()
            }
        )?;
        writeln!(
            out,
            "Time: {:.2?}",
            Duration::from_micros(summary.total_elapsed_us())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, signature: &str, diagnostic: Option<&str>) -> CaseOutcome {
        CaseOutcome {
            index,
            signature: signature.to_string(),
            passed: diagnostic.is_none(),
            failure: None,
            position: None,
            diagnostic: diagnostic.map(str::to_string),
            elapsed_us: 12,
        }
    }

    fn render(reporter: &CaseReporter, summary: &RunSummary) -> String {
        let mut buf = Vec::new();
        reporter.write_report(&mut buf, summary).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plain_report_lines() {
        let summary = RunSummary {
            outcomes: vec![
                outcome(0, "ii", None),
                outcome(1, "ic", Some("'c':1: 0 != 7 ; arg mismatch at 1")),
            ],
        };

        let text = render(&CaseReporter::new(false), &summary);
        assert_eq!(
            text,
            "0:ii:1\n1:ic:0\n'c':1: 0 != 7 ; arg mismatch at 1\nresult: call_aggrs: 0\n"
        );
    }

    #[test]
    fn test_empty_run_passes() {
        let text = render(&CaseReporter::new(false), &RunSummary::default());
        assert_eq!(text, "result: call_aggrs: 1\n");
    }

    #[test]
    fn test_verbose_adds_summary() {
        let summary = RunSummary {
            outcomes: vec![outcome(0, "ii", None)],
        };

        let reporter = CaseReporter::new(true).with_no_color(true);
        let text = render(&reporter, &summary);
        assert!(text.contains("PASS ii"));
        assert!(text.contains("Case result: PASSED | 1 total, 1 passed, 0 failed"));
        assert!(text.ends_with("result: call_aggrs: 1\n"));
    }
}
