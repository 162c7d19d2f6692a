use bytesize::ByteSize;

/// Peak resident set size of this process, in kilobytes.
pub fn peak_rss_kb() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if result != 0 {
        log::warn!("getrusage failed, reporting zero memory usage");
        return 0;
    }

    // ru_maxrss is in kilobytes on Linux.
    usage.ru_maxrss as u64
}

pub struct RunReport {
    pub label: &'static str,
    pub elapsed_ms: u128,
    pub peak_rss_delta_kb: u64,
}

pub fn print_results(reports: &[RunReport]) {
    println!();
    println!("=== RESULTS ===");
    println!("Processing time:");
    for report in reports {
        println!(" - {}: {} ms", report.label, report.elapsed_ms);
    }

    println!();
    println!("Peak memory delta:");
    for report in reports {
        println!(
            " - {}: {}",
            report.label,
            ByteSize::kib(report.peak_rss_delta_kb)
        );
    }
}
