use anyhow::{Context, Result};
use std::fs;
use tera::{Context as TeraContext, Tera};

use crate::models::{ProbeStatus, ScanReport, Severity};

pub struct JsonExporter;

impl JsonExporter {
    pub fn export(report: &ScanReport, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        fs::write(path, json).with_context(|| format!("Failed to write to {}", path))?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<ScanReport> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a scan report", path))?;
        Ok(report)
    }
}

pub struct HtmlExporter;

impl HtmlExporter {
    pub fn export(report: &ScanReport, path: &str) -> Result<()> {
        let html = Self::render(report)?;
        fs::write(path, html).with_context(|| format!("Failed to write to {}", path))?;
        Ok(())
    }

    pub fn render(report: &ScanReport) -> Result<String> {
        let mut tera = Tera::default();
        tera.add_raw_template("report.html", TEMPLATE)?;

        let summary = &report.summary;
        let mut context = TeraContext::new();
        context.insert("domain", &report.domain);
        context.insert("scan_id", &report.scan_id.to_string());
        context.insert(
            "scan_time",
            &report.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        context.insert("risk_score", &format!("{:.1}", summary.display_score()));
        context.insert("risk_level", &summary.risk_level.to_string());
        context.insert("risk_class", &summary.risk_level.to_string().to_lowercase());
        context.insert("critical_count", &summary.critical);
        context.insert("high_count", &summary.high);
        context.insert("medium_count", &summary.medium);
        context.insert("low_count", &summary.low);

        let probes: Vec<ProbeRow> = report
            .results
            .values()
            .map(|r| ProbeRow {
                name: r.probe_name.clone(),
                ok: r.status == ProbeStatus::Ok,
                duration_ms: r.duration_ms,
                error: r.error.as_ref().map(|e| e.message.clone()).unwrap_or_default(),
            })
            .collect();
        context.insert("probes", &probes);

        let mut findings: Vec<FindingRow> = report
            .vulnerabilities
            .iter()
            .map(|v| FindingRow {
                title: v.title.clone(),
                description: v.description.clone(),
                severity: v.severity.to_string(),
                severity_class: Self::severity_class(v.severity).to_string(),
                rank: v.severity.numeric_value(),
                recommendation: v.recommendation.clone().unwrap_or_default(),
            })
            .collect();
        findings.sort_by(|a, b| b.rank.cmp(&a.rank));
        context.insert("findings", &findings);

        Ok(tera.render("report.html", &context)?)
    }

    fn severity_class(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(serde::Serialize)]
struct ProbeRow {
    name: String,
    ok: bool,
    duration_ms: u64,
    error: String,
}

#[derive(serde::Serialize)]
struct FindingRow {
    title: String,
    description: String,
    severity: String,
    severity_class: String,
    rank: u8,
    recommendation: String,
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Scanward Report: {{ domain }}</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0d1117; color: #c9d1d9; line-height: 1.6; }
        .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
        h1 { color: #58a6ff; margin-bottom: 0.5rem; }
        h2 { margin: 2rem 0 1rem; }
        .subtitle { color: #8b949e; margin-bottom: 2rem; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 1rem; margin-bottom: 2rem; }
        .stat { background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; text-align: center; }
        .stat-value { font-size: 2rem; font-weight: bold; }
        .stat-label { color: #8b949e; font-size: 0.875rem; }
        .critical .stat-value, .high .stat-value { color: #f85149; }
        .medium .stat-value { color: #d29922; }
        .low .stat-value { color: #58a6ff; }
        .none .stat-value { color: #3fb950; }
        table { width: 100%; border-collapse: collapse; background: #161b22; border: 1px solid #30363d; border-radius: 6px; overflow: hidden; }
        th, td { padding: 0.75rem 1rem; text-align: left; border-bottom: 1px solid #30363d; }
        th { background: #21262d; font-weight: 600; }
        .severity { padding: 0.25rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; }
        .severity.critical, .severity.high, .severity.errored { background: #f8514933; color: #f85149; }
        .severity.medium { background: #d2992233; color: #d29922; }
        .severity.low { background: #58a6ff33; color: #58a6ff; }
        .severity.ok { background: #3fb95033; color: #3fb950; }
        .details { font-size: 0.875rem; color: #8b949e; margin-top: 0.5rem; }
        .fix { color: #f0883e; font-weight: 500; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Scan Report: {{ domain }}</h1>
        <p class="subtitle">Scan {{ scan_id }} &middot; {{ scan_time }}</p>

        <div class="summary">
            <div class="stat {{ risk_class }}">
                <div class="stat-value">{{ risk_score }}</div>
                <div class="stat-label">Risk ({{ risk_level }})</div>
            </div>
            <div class="stat critical">
                <div class="stat-value">{{ critical_count }}</div>
                <div class="stat-label">Critical</div>
            </div>
            <div class="stat high">
                <div class="stat-value">{{ high_count }}</div>
                <div class="stat-label">High</div>
            </div>
            <div class="stat medium">
                <div class="stat-value">{{ medium_count }}</div>
                <div class="stat-label">Medium</div>
            </div>
            <div class="stat low">
                <div class="stat-value">{{ low_count }}</div>
                <div class="stat-label">Low</div>
            </div>
        </div>

        <h2>Findings</h2>
        {% if findings %}
        <table>
            <thead><tr><th>Finding</th><th>Severity</th></tr></thead>
            <tbody>
                {% for f in findings %}
                <tr>
                    <td>
                        {{ f.title }}
                        <div class="details">{{ f.description }}</div>
                        {% if f.recommendation %}<div class="details"><span class="fix">Fix:</span> {{ f.recommendation }}</div>{% endif %}
                    </td>
                    <td><span class="severity {{ f.severity_class }}">{{ f.severity }}</span></td>
                </tr>
                {% endfor %}
            </tbody>
        </table>
        {% else %}
        <p class="subtitle">No vulnerabilities found.</p>
        {% endif %}

        <h2>Probes</h2>
        <table>
            <thead><tr><th>Probe</th><th>Status</th><th>Time (ms)</th></tr></thead>
            <tbody>
                {% for p in probes %}
                <tr>
                    <td>{{ p.name }}{% if p.error %}<div class="details">{{ p.error }}</div>{% endif %}</td>
                    <td>{% if p.ok %}<span class="severity ok">OK</span>{% else %}<span class="severity errored">ERRORED</span>{% endif %}</td>
                    <td>{{ p.duration_ms }}</td>
                </tr>
                {% endfor %}
            </tbody>
        </table>
    </div>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ResultAggregator;
    use crate::error::ProbeError;
    use crate::models::{ProbeResult, ScanId};
    use crate::probes::VULNERABILITY_PROBE;
    use std::time::Duration;

    fn report() -> ScanReport {
        let results = vec![
            ProbeResult::ok(
                VULNERABILITY_PROBE,
                serde_json::json!({"vulnerabilities": [
                    {"title": "Reflected input", "description": "marker echoed", "severity": "high",
                     "recommendation": "Encode output"}
                ]}),
                120,
            ),
            ProbeResult::errored("network_tls", &ProbeError::Timeout(Duration::from_secs(30)), 30_000),
        ];
        ResultAggregator::summarize(ScanId::new(), "example.com", results, chrono::Utc::now())
    }

    #[test]
    fn test_html_contains_findings_and_probe_status() {
        let html = HtmlExporter::render(&report()).unwrap();
        assert!(html.contains("Scan Report: example.com"));
        assert!(html.contains("Reflected input"));
        assert!(html.contains("Encode output"));
        assert!(html.contains("ERRORED"));
        assert!(html.contains("0.7"));
    }

    #[test]
    fn test_json_export_and_load() {
        let report = report();
        let path = std::env::temp_dir().join(format!("scanward-{}.json", report.scan_id));
        let path = path.to_string_lossy().to_string();

        JsonExporter::export(&report, &path).unwrap();
        let loaded = JsonExporter::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.scan_id, report.scan_id);
        assert_eq!(loaded.vulnerabilities, report.vulnerabilities);
        assert_eq!(loaded.summary.high, 1);
    }

    #[test]
    fn test_load_rejects_non_report() {
        let path = std::env::temp_dir().join("scanward-not-a-report.json");
        std::fs::write(&path, "{\"hello\": 1}").unwrap();
        assert!(JsonExporter::load(&path.to_string_lossy()).is_err());
        std::fs::remove_file(&path).ok();
    }
}
