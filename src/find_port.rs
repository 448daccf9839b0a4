// Interactive port-discovery CLI (spec.md §1 "out of scope" for the bus
// core itself, §6.3 for the CLI surface). Kept as a pure, testable diff
// function plus a thin interactive driver so the `find-port` subcommand
// has no untestable logic of its own.

use std::collections::HashSet;
use std::path::PathBuf;

/// List `/dev/tty*` device paths, matching the original's
/// `find_available_ports` (`Path("/dev").glob("tty*")`).
pub fn list_tty_ports() -> Vec<PathBuf> {
    let mut ports = Vec::new();
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return ports;
    };
    for entry in entries.flatten() {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with("tty") {
                ports.push(entry.path());
            }
        }
    }
    ports.sort();
    ports
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortDiff {
    /// Exactly one port disappeared between the two scans: this is the port.
    Found(PathBuf),
    /// No port disappeared.
    NoneFound,
    /// More than one port disappeared; the scans are ambiguous.
    Ambiguous(Vec<PathBuf>),
}

/// Diff two port listings the way `find_port` does:
/// `set(before) - set(after)`, classified by cardinality.
pub fn diff_ports(before: &[PathBuf], after: &[PathBuf]) -> PortDiff {
    let after_set: HashSet<&PathBuf> = after.iter().collect();
    let removed: Vec<PathBuf> = before
        .iter()
        .filter(|p| !after_set.contains(p))
        .cloned()
        .collect();

    match removed.len() {
        0 => PortDiff::NoneFound,
        1 => PortDiff::Found(removed.into_iter().next().expect("len checked")),
        _ => PortDiff::Ambiguous(removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_removed_port_is_found() {
        let before = vec![PathBuf::from("/dev/tty.a"), PathBuf::from("/dev/tty.b")];
        let after = vec![PathBuf::from("/dev/tty.a")];
        assert_eq!(diff_ports(&before, &after), PortDiff::Found(PathBuf::from("/dev/tty.b")));
    }

    #[test]
    fn no_removed_port_is_none_found() {
        let before = vec![PathBuf::from("/dev/tty.a")];
        let after = vec![PathBuf::from("/dev/tty.a")];
        assert_eq!(diff_ports(&before, &after), PortDiff::NoneFound);
    }

    #[test]
    fn multiple_removed_ports_are_ambiguous() {
        let before = vec![
            PathBuf::from("/dev/tty.a"),
            PathBuf::from("/dev/tty.b"),
            PathBuf::from("/dev/tty.c"),
        ];
        let after = vec![PathBuf::from("/dev/tty.c")];
        match diff_ports(&before, &after) {
            PortDiff::Ambiguous(mut ports) => {
                ports.sort();
                assert_eq!(
                    ports,
                    vec![PathBuf::from("/dev/tty.a"), PathBuf::from("/dev/tty.b")]
                );
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn new_port_appearing_is_not_a_removal() {
        let before = vec![PathBuf::from("/dev/tty.a")];
        let after = vec![PathBuf::from("/dev/tty.a"), PathBuf::from("/dev/tty.b")];
        assert_eq!(diff_ports(&before, &after), PortDiff::NoneFound);
    }
}
