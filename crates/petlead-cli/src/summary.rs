//! Per-site run summary printed after `petlead run`.

use petlead_scraper::{JobStatus, RunResult, RunSummary};

pub(crate) fn render(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::with_capacity(summary.results.len() + 2);
    lines.push(format!(
        "Run {} (started {})",
        summary.run_id,
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for result in &summary.results {
        lines.push(render_result(result));
    }

    let completed = summary
        .results
        .iter()
        .filter(|r| r.status == JobStatus::Completed)
        .count();
    lines.push(format!(
        "Run complete: {} unique records, {completed}/{} sites completed",
        summary.total_unique(),
        summary.results.len()
    ));
    lines
}

fn render_result(result: &RunResult) -> String {
    let counts = format!(
        "{:>3} queries {:>5} raw {:>5} unique {:>3} errors",
        result.queries_attempted,
        result.raw_records,
        result.unique(),
        result.queries_failed
    );
    match &result.status {
        JobStatus::Failed { reason } => {
            format!("  \u{2717} {:<20} {reason}", result.site_id)
        }
        JobStatus::Cancelled if result.queries_attempted == 0 => {
            format!("  - {:<20} cancelled before start", result.site_id)
        }
        status => {
            let marker = match status {
                JobStatus::Cancelled => '-',
                _ if result.write_error.is_some() => '!',
                _ => '\u{2713}',
            };
            let destination = match (&result.output, &result.write_error) {
                (_, Some(e)) => format!("NOT WRITTEN: {e}"),
                (Some(path), None) => path.display().to_string(),
                (None, None) if result.queries_failed > 0 => format!(
                    "no data ({} of {} queries failed)",
                    result.queries_failed, result.queries_attempted
                ),
                (None, None) => "no data".to_string(),
            };
            let suffix = if *status == JobStatus::Cancelled {
                " (cancelled)"
            } else {
                ""
            };
            format!(
                "  {marker} {:<20} {counts}  {destination}{suffix}",
                result.site_id
            )
        }
    }
}
