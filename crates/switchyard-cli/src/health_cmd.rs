//! `switchyard health` and `switchyard capabilities`: inspect the adapters
//! the registry knows about.

use std::fmt::Write as _;

use anyhow::Result;

use switchyard_core::model::Capability;
use switchyard_core::registry::{AdapterRegistry, AdapterStatus};

/// Probe every adapter and print a status table.
///
/// Returns whether every adapter is healthy.
pub async fn run_health(registry: &AdapterRegistry) -> Result<bool> {
    let report = registry.health_check_all().await;
    print!("{}", render_health_table(&registry.statuses()));
    Ok(report.values().all(|healthy| *healthy))
}

/// Print capabilities for one adapter, or for all of them.
pub fn run_capabilities(registry: &AdapterRegistry, adapter: Option<&str>) -> Result<()> {
    let names = match adapter {
        Some(name) => {
            // Fails with a not-found error for unknown names.
            registry.get_or_default(Some(name))?;
            vec![name.to_string()]
        }
        None => registry.names(),
    };

    for (i, name) in names.iter().enumerate() {
        let Some(adapter) = registry.get(name) else {
            continue;
        };
        if i > 0 {
            println!();
        }
        print!(
            "{}",
            render_capabilities(name, adapter.version(), &adapter.capabilities())
        );
    }
    Ok(())
}

pub fn render_health_table(statuses: &[AdapterStatus]) -> String {
    if statuses.is_empty() {
        return "No adapters registered.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<10} {:<10} {:<8} {:<20}",
        "NAME", "VERSION", "HEALTHY", "DEFAULT", "CHECKED"
    );
    let _ = writeln!(out, "{}", "-".repeat(72));
    for status in statuses {
        let healthy = match status.healthy {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        };
        let checked = status
            .last_health_check
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(
            out,
            "{:<20} {:<10} {:<10} {:<8} {:<20}",
            status.name,
            status.version,
            healthy,
            if status.is_default { "*" } else { "" },
            checked
        );
    }
    out
}

pub fn render_capabilities(name: &str, version: &str, capabilities: &[Capability]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{name} ({version})");
    for cap in capabilities {
        let mark = if cap.available { "+" } else { "-" };
        let _ = writeln!(out, "  [{mark}] {:<18} {}", cap.name, cap.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use switchyard_core::model::Feature;

    fn status(name: &str, healthy: Option<bool>, is_default: bool) -> AdapterStatus {
        AdapterStatus {
            name: name.to_string(),
            version: "0.1.0".to_string(),
            registered_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            last_health_check: healthy
                .map(|_| Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap()),
            healthy,
            is_default,
        }
    }

    #[test]
    fn health_table_lists_every_adapter() {
        let table = render_health_table(&[
            status("claude-code", Some(true), true),
            status("gemini", Some(false), false),
            status("codex", None, false),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5, "{table}");
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].starts_with("claude-code"));
        assert!(lines[2].contains("yes"));
        assert!(lines[2].contains('*'));
        assert!(lines[2].contains("2026-01-01 00:05:00"));
        assert!(lines[3].contains("no"));
        assert!(lines[4].contains("unknown"));
        assert!(lines[4].contains("never"));
    }

    #[test]
    fn empty_registry_says_so() {
        assert_eq!(render_health_table(&[]), "No adapters registered.\n");
    }

    #[test]
    fn capabilities_mark_availability() {
        let mut missing = Capability::for_feature(Feature::WebSearch, None);
        missing.available = false;
        let out = render_capabilities(
            "gemini",
            "0.3.0",
            &[Capability::for_feature(Feature::BashExecution, None), missing],
        );
        assert!(out.starts_with("gemini (0.3.0)\n"));
        assert!(out.contains("[+] bash-execution"));
        assert!(out.contains("[-] web-search"));
    }
}
