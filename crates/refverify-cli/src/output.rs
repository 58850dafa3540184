use std::io::Write;

use owo_colors::OwoColorize;
use refverify_core::{ProgressEvent, RefReport, Verdict, VerdictStats};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn verdict_symbol(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Verified => "✓",
        Verdict::Review => "?",
        Verdict::Unverified => "✗",
        Verdict::Suspicious => "⚠",
    }
}

fn write_verdict(w: &mut dyn Write, verdict: Verdict, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        match verdict {
            Verdict::Verified => write!(w, "{}", verdict.as_str().green()),
            Verdict::Review => write!(w, "{}", verdict.as_str().yellow()),
            Verdict::Unverified => write!(w, "{}", verdict.as_str().red()),
            Verdict::Suspicious => write!(w, "{}", verdict.as_str().magenta()),
        }
    } else {
        write!(w, "{}", verdict.as_str())
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Checking {
            index,
            total,
            title,
        } => {
            let short = truncate(title, 50);
            writeln!(w, "[{}/{}] Checking: \"{}\"", index + 1, total, short)?;
        }
        ProgressEvent::Classified {
            index,
            total,
            verdict,
            score,
        } => {
            write!(w, "[{}/{}] -> ", index + 1, total)?;
            write_verdict(w, *verdict, color)?;
            writeln!(w, " (score {:.2})", score)?;
        }
        ProgressEvent::LookupRetry {
            index,
            attempt,
            error,
        } => {
            let msg = format!(
                "[{}] lookup attempt {} failed ({}), retrying...",
                index + 1,
                attempt,
                error
            );
            if color.enabled() {
                writeln!(w, "{}", msg.dimmed())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
        ProgressEvent::Reextracting {
            index,
            corrected_title,
        } => {
            writeln!(
                w,
                "[{}] Re-extracted title: \"{}\"",
                index + 1,
                truncate(corrected_title, 60)
            )?;
        }
        ProgressEvent::AdjudicationBatch {
            batch,
            total_batches,
            size,
        } => {
            writeln!(
                w,
                "Adjudicating batch {}/{} ({} references)...",
                batch, total_batches, size
            )?;
        }
        ProgressEvent::VerdictChanged {
            index,
            from,
            to,
            stage,
        } => {
            write!(w, "[{}] ", index + 1)?;
            write_verdict(w, *from, color)?;
            write!(w, " -> ")?;
            write_verdict(w, *to, color)?;
            writeln!(w, " ({})", stage.as_str())?;
        }
    }
    Ok(())
}

/// Print the detailed report, most trustworthy verdicts first.
pub fn print_report(
    w: &mut dyn Write,
    reports: &[RefReport],
    color: ColorMode,
) -> std::io::Result<()> {
    let mut sorted: Vec<&RefReport> = reports.iter().collect();
    sorted.sort_by_key(|r| (r.verdict().severity(), r.reference.number));

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "REFERENCE VERIFICATION REPORT".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "REFERENCE VERIFICATION REPORT")?;
        writeln!(w, "{}", sep)?;
    }

    for report in sorted {
        let latest = report.latest();
        writeln!(w)?;
        write!(
            w,
            "{} [{}] ",
            verdict_symbol(report.verdict()),
            report.reference.number
        )?;
        write_verdict(w, report.verdict(), color)?;
        writeln!(w, " (score {:.2})", latest.score)?;

        let title = truncate(&report.reference.raw_title, 70);
        if color.enabled() {
            writeln!(w, "    {}", title.cyan())?;
        } else {
            writeln!(w, "    {}", title)?;
        }

        if let Some(ref best) = latest.best {
            writeln!(w, "    Matched: {}", truncate(&best.title, 70))?;
            if let Some(ref venue) = best.venue {
                let year = best
                    .year
                    .map(|y| format!(", {}", y))
                    .unwrap_or_default();
                if color.enabled() {
                    writeln!(w, "    {}", format!("({}{})", venue, year).dimmed())?;
                } else {
                    writeln!(w, "    ({}{})", venue, year)?;
                }
            }
        }
        writeln!(w, "    Reason: {}", latest.reason)?;

        for (from, to) in report.verdict_changes() {
            let msg = format!(
                "Changed {} -> {} at {} stage",
                from.verdict,
                to.verdict,
                to.stage.as_str()
            );
            if color.enabled() {
                writeln!(w, "    {}", msg.dimmed())?;
            } else {
                writeln!(w, "    {}", msg)?;
            }
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the final summary.
pub fn print_summary(
    w: &mut dyn Write,
    reports: &[RefReport],
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = VerdictStats::from_reports(reports);
    let pct = |n: usize| {
        if stats.total == 0 {
            0.0
        } else {
            100.0 * n as f64 / stats.total as f64
        }
    };

    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  References checked: {}", stats.total)?;
    writeln!(w)?;

    let rows = [
        (Verdict::Verified, stats.verified),
        (Verdict::Review, stats.review),
        (Verdict::Unverified, stats.unverified),
        (Verdict::Suspicious, stats.suspicious),
    ];
    for (verdict, count) in rows {
        write!(w, "  {} ", verdict_symbol(verdict))?;
        write_verdict(w, verdict, color)?;
        writeln!(w, ": {} ({:.1}%)", count, pct(count))?;
    }

    writeln!(w)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
