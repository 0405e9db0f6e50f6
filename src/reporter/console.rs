use colored::Colorize;
use tabled::{Table, Tabled, settings::{Alignment, Modify, Style, object::Rows}};

use crate::models::{ProbeStatus, RiskLevel, ScanReport, Severity};

pub struct ConsoleReporter;

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Probe")]
    probe: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Time")]
    duration: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn colored_severity(severity: Severity) -> String {
    match severity {
        Severity::Critical => "CRITICAL".red().bold().to_string(),
        Severity::High => "HIGH".red().to_string(),
        Severity::Medium => "MEDIUM".yellow().to_string(),
        Severity::Low => "LOW".blue().to_string(),
    }
}

fn colored_level(level: RiskLevel) -> String {
    match level {
        RiskLevel::Critical => level.to_string().red().bold().to_string(),
        RiskLevel::High => level.to_string().red().to_string(),
        RiskLevel::Medium => level.to_string().yellow().to_string(),
        RiskLevel::Low => level.to_string().blue().to_string(),
        RiskLevel::None => level.to_string().green().to_string(),
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn print_probes(&self, report: &ScanReport) {
        if report.results.is_empty() {
            println!("\n{}", "No probes were run.".dimmed());
            return;
        }

        let rows: Vec<ProbeRow> = report
            .results
            .values()
            .map(|result| ProbeRow {
                probe: result.probe_name.clone(),
                status: match result.status {
                    ProbeStatus::Ok => "OK".green().to_string(),
                    ProbeStatus::Errored => "ERRORED".red().to_string(),
                },
                duration: format!("{:.2}s", result.duration_ms as f64 / 1000.0),
                detail: result
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!("\n{}", table);
    }

    pub fn print_summary(&self, report: &ScanReport) {
        let summary = &report.summary;
        let errored = report.errored_probes().count();

        println!("\n{}", "Summary".bold().underline());
        println!(
            "{} probes against {} ({} errored)",
            report.results.len(),
            report.domain.white().bold(),
            errored
        );
        println!(
            "Risk score: {:.1}/10 [{}]",
            summary.display_score(),
            colored_level(summary.risk_level)
        );

        for (severity, count) in [
            (Severity::Critical, summary.critical),
            (Severity::High, summary.high),
            (Severity::Medium, summary.medium),
            (Severity::Low, summary.low),
        ] {
            if count > 0 {
                println!("  {}: {}", colored_severity(severity), count);
            }
        }
        if summary.total == 0 {
            println!("  {}", "No vulnerabilities found".green());
        }
        println!();
    }

    pub fn print_details(&self, report: &ScanReport) {
        if report.vulnerabilities.is_empty() {
            return;
        }

        println!("\n{}", "Findings".bold().underline());

        let mut findings: Vec<_> = report.vulnerabilities.iter().collect();
        findings.sort_by_key(|v| std::cmp::Reverse(v.severity.numeric_value()));

        for vuln in findings {
            let cvss = vuln.cvss.map(|c| format!(" (CVSS {:.1})", c)).unwrap_or_default();
            println!(
                "\n[{}] {}{}",
                colored_severity(vuln.severity),
                vuln.title.white().bold(),
                cvss
            );
            println!("  → {}", vuln.description);
            if let Some(fix) = &vuln.recommendation {
                println!("    {}: {}", "Fix".cyan(), fix);
            }
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}
