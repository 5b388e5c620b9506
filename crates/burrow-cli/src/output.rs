//! Formatted output helpers for CLI commands.

use std::fmt::Write;

use burrow_common::types::ContainerRecord;

/// Renders containers as a left-aligned table with a header row.
#[must_use]
pub fn render_containers(records: &[ContainerRecord]) -> String {
    let mut out = format!(
        "{:<12} {:<16} {:<8} {:<8} {:<20} {:<24}\n",
        "ID", "NAME", "PID", "STATUS", "CREATED", "COMMAND"
    );
    for r in records {
        let pid = if r.pid.is_empty() { "-" } else { r.pid.as_str() };
        let _ = writeln!(
            out,
            "{:<12} {:<16} {:<8} {:<8} {:<20} {:<24}",
            r.id.as_str(),
            r.name,
            pid,
            r.status.to_string(),
            r.created_time,
            r.command
        );
    }
    out
}

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use burrow_common::types::{ContainerId, ContainerStatus};

    use super::*;

    #[test]
    fn table_has_header_and_one_row_per_container() {
        let mut stopped =
            ContainerRecord::running("", ContainerId::new("a1b2c3d4e5"), "db", "sleep 9", "", Vec::new());
        stopped.status = ContainerStatus::Stopped;
        let running =
            ContainerRecord::running("4321", ContainerId::new("f6g7h8i9j0"), "web", "top", "", Vec::new());

        let table = render_containers(&[running, stopped]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("4321") && lines[1].contains("running"));
        assert!(lines[2].contains(" - ") && lines[2].contains("stopped"));
    }

    #[test]
    fn empty_list_renders_header_only() {
        assert_eq!(render_containers(&[]).lines().count(), 1);
    }

    #[test]
    fn format_bytes_displays_kib() {
        assert_eq!(format_bytes(2048), "2.0 KiB");
    }

    #[test]
    fn format_bytes_displays_mib() {
        assert_eq!(format_bytes(134_217_728), "128.0 MiB");
    }
}
