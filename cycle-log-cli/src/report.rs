//! Run summary for the operator

use cycle_log_engine::RunMetrics;
use std::io::{self, Write};

/// Write the end-of-run summary to `out`
pub fn write_summary<W: Write>(out: &mut W, metrics: &RunMetrics, records_saved: usize) -> io::Result<()> {
    writeln!(out, "\n===== Processing Summary =====")?;
    writeln!(out, "Files processed:   {}", metrics.files_processed)?;
    if metrics.files_failed > 0 {
        writeln!(out, "Files skipped:     {}", metrics.files_failed)?;
    }
    writeln!(out, "Events parsed:     {}", metrics.events_parsed)?;
    writeln!(out, "Cycles completed:  {}", metrics.cycles_completed)?;
    writeln!(out, "Cycle errors:      {}", metrics.cycle_errors)?;
    if metrics.order_anomalies > 0 {
        writeln!(out, "Order anomalies:   {}", metrics.order_anomalies)?;
    }
    writeln!(out, "Records saved:     {}", records_saved)?;
    Ok(())
}

pub fn print_summary(metrics: &RunMetrics, records_saved: usize) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_summary(&mut out, metrics, records_saved)?;
    out.flush()
}
