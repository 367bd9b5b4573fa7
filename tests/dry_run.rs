// tests/dry_run.rs

mod common;
use crate::common::at;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};

use clockdag::dry_run_report;

#[test]
fn dry_run_lists_tasks_in_dependency_order_with_next_due_minute() {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "report",
            TaskConfigBuilder::cron("0 9 * * 1-5")
                .run("make-report")
                .depend_on("ingest")
                .timeout("10m")
                .build(),
        )
        .with_task(
            "ingest",
            TaskConfigBuilder::at("08:00")
                .time("20:00")
                .while_loop("today-1d", "today", "12h", &["fetch %Y%m%d%H"])
                .build(),
        )
        .build();

    // 2026-10-19 is a Monday.
    let out = dry_run_report(&cfg, at("2026-10-19 12:00")).unwrap();

    let ingest = out.find("  - ingest").unwrap();
    let report = out.find("  - report").unwrap();
    assert!(ingest < report);

    assert!(out.contains("trigger: time [08:00, 20:00]"));
    assert!(out.contains("next due: 2026-10-19 20:00"));
    assert!(out.contains("next due: 2026-10-20 09:00"));
    assert!(out.contains("depend_on: {\"ingest\"}"));
    assert!(out.contains("while: today-1d .. today"));
    assert!(out.contains("run: fetch %Y%m%d%H"));
    assert!(out.contains("timeout: 600s"));
}
