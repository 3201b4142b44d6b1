//! Prometheus text exposition format.
//!
//! Renders a scheduler snapshot into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use std::fmt::Write;

use fairgrid_core::{OrgQueueStats, QueueMetrics};

/// Render a snapshot into Prometheus text format.
///
/// Global gauges first, then per-org series with an `org` label. Orgs are
/// emitted in sorted order so output is stable across scrapes.
pub fn render_prometheus(metrics: &QueueMetrics) -> String {
    let mut out = String::new();

    gauge_header(&mut out, "fairgrid_active_jobs_total", "Active jobs across all orgs.");
    let _ = writeln!(out, "fairgrid_active_jobs_total {}", metrics.total_active_jobs);

    gauge_header(&mut out, "fairgrid_active_orgs", "Orgs holding at least one active job.");
    let _ = writeln!(out, "fairgrid_active_orgs {}", metrics.active_orgs);

    gauge_header(
        &mut out,
        "fairgrid_overall_avg_wait_ms",
        "Sample-weighted average wait time in milliseconds.",
    );
    let _ = writeln!(
        out,
        "fairgrid_overall_avg_wait_ms {:.2}",
        metrics.overall_avg_wait_time_ms
    );

    let mut orgs: Vec<&OrgQueueStats> = metrics.org_stats.values().collect();
    orgs.sort_by(|a, b| a.org_id.cmp(&b.org_id));

    gauge_header(&mut out, "fairgrid_org_active_jobs", "Active jobs per org.");
    for s in &orgs {
        let _ = writeln!(
            out,
            "fairgrid_org_active_jobs{{org=\"{}\"}} {}",
            escape_label(&s.org_id),
            s.active_jobs
        );
    }

    counter_header(
        &mut out,
        "fairgrid_org_completed_jobs_total",
        "Jobs released successfully per org.",
    );
    for s in &orgs {
        let _ = writeln!(
            out,
            "fairgrid_org_completed_jobs_total{{org=\"{}\"}} {}",
            escape_label(&s.org_id),
            s.completed_jobs
        );
    }

    counter_header(
        &mut out,
        "fairgrid_org_failed_jobs_total",
        "Jobs released as failed per org.",
    );
    for s in &orgs {
        let _ = writeln!(
            out,
            "fairgrid_org_failed_jobs_total{{org=\"{}\"}} {}",
            escape_label(&s.org_id),
            s.failed_jobs
        );
    }

    gauge_header(
        &mut out,
        "fairgrid_org_avg_wait_ms",
        "Average wait time over the last 100 samples, per org.",
    );
    for s in &orgs {
        let _ = writeln!(
            out,
            "fairgrid_org_avg_wait_ms{{org=\"{}\"}} {:.2}",
            escape_label(&s.org_id),
            s.avg_wait_time_ms
        );
    }

    gauge_header(
        &mut out,
        "fairgrid_org_avg_processing_ms",
        "Average processing time over the last 100 samples, per org.",
    );
    for s in &orgs {
        let _ = writeln!(
            out,
            "fairgrid_org_avg_processing_ms{{org=\"{}\"}} {:.2}",
            escape_label(&s.org_id),
            s.avg_processing_time_ms
        );
    }

    out
}

fn gauge_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn counter_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_stats(org_id: &str) -> OrgQueueStats {
        OrgQueueStats {
            org_id: org_id.to_string(),
            active_jobs: 2,
            completed_jobs: 40,
            failed_jobs: 3,
            total_processed: 43,
            avg_wait_time_ms: 12.5,
            avg_processing_time_ms: 250.25,
            last_activity_at: 1000,
        }
    }

    fn test_metrics(orgs: &[&str]) -> QueueMetrics {
        QueueMetrics {
            total_active_jobs: 2 * orgs.len() as u32,
            active_orgs: orgs.len(),
            org_stats: orgs
                .iter()
                .map(|o| (o.to_string(), test_stats(o)))
                .collect::<HashMap<_, _>>(),
            overall_avg_wait_time_ms: 12.5,
        }
    }

    #[test]
    fn render_empty() {
        let output = render_prometheus(&test_metrics(&[]));
        // Should still have type declarations.
        assert!(output.contains("# TYPE fairgrid_active_jobs_total gauge"));
        assert!(output.contains("fairgrid_active_jobs_total 0\n"));
        assert!(output.contains("# TYPE fairgrid_org_completed_jobs_total counter"));
    }

    #[test]
    fn render_single_org() {
        let output = render_prometheus(&test_metrics(&["acme"]));

        assert!(output.contains("fairgrid_active_jobs_total 2\n"));
        assert!(output.contains("fairgrid_active_orgs 1\n"));
        assert!(output.contains("fairgrid_overall_avg_wait_ms 12.50\n"));
        assert!(output.contains("fairgrid_org_active_jobs{org=\"acme\"} 2"));
        assert!(output.contains("fairgrid_org_completed_jobs_total{org=\"acme\"} 40"));
        assert!(output.contains("fairgrid_org_failed_jobs_total{org=\"acme\"} 3"));
        assert!(output.contains("fairgrid_org_avg_wait_ms{org=\"acme\"} 12.50"));
        assert!(output.contains("fairgrid_org_avg_processing_ms{org=\"acme\"} 250.25"));
    }

    #[test]
    fn orgs_render_in_sorted_order() {
        let output = render_prometheus(&test_metrics(&["zeta", "alpha", "mid"]));
        let alpha = output.find("fairgrid_org_active_jobs{org=\"alpha\"}").unwrap();
        let mid = output.find("fairgrid_org_active_jobs{org=\"mid\"}").unwrap();
        let zeta = output.find("fairgrid_org_active_jobs{org=\"zeta\"}").unwrap();
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn label_values_are_escaped() {
        let output = render_prometheus(&test_metrics(&["we\"ird"]));
        assert!(output.contains("org=\"we\\\"ird\""));
    }

    #[test]
    fn every_sample_line_has_a_value() {
        let output = render_prometheus(&test_metrics(&["a", "b"]));
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let value = line.rsplit(' ').next().unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad sample line: {line}");
        }
    }
}
