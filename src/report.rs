//! Human-readable summary printed after a successful run.

use std::io::{self, Write};

use crate::stats::AccountStats;

/// Balance lines, bucket averages, then one line per month that saw activity
pub fn render_report(stats: &AccountStats) -> String {
    let mut lines = vec![
        format!("Total balance is {:.2}", stats.balance),
        format!(
            "Balance for the processed transactions is {:.2}",
            stats.file_balance
        ),
        format!("Average Debit amount: {:.2}", stats.debit_avg()),
        format!("Average Credit amount: {:.2}", stats.credit_avg()),
    ];

    lines.extend(
        stats
            .transactions_per_month
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(month, count)| format!("Number of transactions in {}: {}", month.name(), count)),
    );

    let mut report = lines.join("\n");
    report.push('\n');
    report
}

pub fn write_report<W: Write>(stats: &AccountStats, out: &mut W) -> io::Result<()> {
    out.write_all(render_report(stats).as_bytes())?;
    out.flush()
}
