// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `energy-probe list` command: print the live process table.

use resource_monitor::ProcessEntry;

pub fn execute(filter: Option<&str>, json: bool) -> anyhow::Result<()> {
    let entries = matching(resource_monitor::list_processes(), filter);
    tracing::debug!(count = entries.len(), "processes listed");

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No matching processes.");
        return Ok(());
    }
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0).max(4);
    println!("  {:<width$}  {:>7}", "NAME", "PID");
    for entry in &entries {
        println!("  {:<width$}  {:>7}", entry.name, entry.pid);
    }
    Ok(())
}

fn matching(entries: Vec<ProcessEntry>, filter: Option<&str>) -> Vec<ProcessEntry> {
    match filter {
        Some(needle) => {
            let needle = needle.to_lowercase();
            entries
                .into_iter()
                .filter(|e| e.name.to_lowercase().contains(&needle))
                .collect()
        }
        None => entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, pid: u32) -> ProcessEntry {
        ProcessEntry {
            name: name.into(),
            pid,
        }
    }

    #[test]
    fn test_filter_is_case_insensitive_and_keeps_order() {
        let entries = vec![entry("bash", 10), entry("Firefox", 20), entry("firefox-bin", 5)];
        let kept = matching(entries, Some("FIRE"));
        assert_eq!(kept, vec![entry("Firefox", 20), entry("firefox-bin", 5)]);
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        assert_eq!(matching(entries.clone(), None), entries);
    }
}
