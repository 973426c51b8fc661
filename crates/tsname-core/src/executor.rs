use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::planner::RenameOperation;
use crate::{Error, Result};

/// One filesystem rename. `finalize` marks the renamed file read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub from: String,
    pub to: String,
    pub finalize: bool,
}

fn staging_name(source: &str) -> String {
    format!(".{}.tsname-tmp", source)
}

/// Turn a verified plan into renames that never overwrite a file that is
/// still waiting to be moved.
///
/// When a target is the source of another operation, that operation runs
/// first. Rings of operations (a→b, b→a) are broken by parking one source
/// under a staging name.
pub fn schedule(operations: &[RenameOperation]) -> Vec<Step> {
    let by_source: HashMap<&str, usize> = operations
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.is_noop())
        .map(|(i, o)| (o.source_name.as_str(), i))
        .collect();

    let mut done = vec![false; operations.len()];
    let mut steps = Vec::with_capacity(operations.len());

    for start in 0..operations.len() {
        if done[start] {
            continue;
        }

        // Follow targets that are still occupied by pending sources.
        let mut chain = vec![start];
        let mut in_chain: HashSet<usize> = HashSet::from([start]);
        let mut ring_start = None;
        let mut cur = start;
        while let Some(&next) = by_source.get(operations[cur].target_name.as_str()) {
            if done[next] || next == cur {
                break;
            }
            if !in_chain.insert(next) {
                ring_start = Some(next);
                break;
            }
            chain.push(next);
            cur = next;
        }

        let mut parked = None;
        if let Some(r) = ring_start {
            let source = &operations[r].source_name;
            let staged = staging_name(source);
            steps.push(Step {
                from: source.clone(),
                to: staged.clone(),
                finalize: false,
            });
            parked = Some((r, staged));
        }

        for &i in chain.iter().rev() {
            let op = &operations[i];
            let from = match &parked {
                Some((r, staged)) if *r == i => staged.clone(),
                _ => op.source_name.clone(),
            };
            steps.push(Step {
                from,
                to: op.target_name.clone(),
                finalize: true,
            });
            done[i] = true;
        }
    }

    steps
}

/// Apply `operations` inside `dir`, marking every target read-only.
///
/// The plan must already have passed [`crate::planner::verify`]. A name that
/// appeared on disk since then still stops the rename onto it.
pub fn apply(dir: &Path, operations: &[RenameOperation]) -> Result<u64> {
    let mut renamed = 0u64;
    for step in schedule(operations) {
        let from = dir.join(&step.from);
        let to = dir.join(&step.to);
        if step.from != step.to {
            if to.symlink_metadata().is_ok() {
                return Err(Error::TargetExists {
                    source_name: step.from,
                    target: step.to,
                });
            }
            fs::rename(&from, &to).map_err(|e| Error::fs(&from, e))?;
            log::debug!("renamed {} => {}", step.from, step.to);
            if step.finalize {
                renamed += 1;
            }
        }
        if step.finalize {
            set_read_only(&to).map_err(|e| Error::fs(&to, e))?;
        }
    }
    Ok(renamed)
}

fn set_read_only(path: &Path) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(source: &str, target: &str) -> RenameOperation {
        RenameOperation {
            source_name: source.to_string(),
            target_name: target.to_string(),
        }
    }

    fn pairs(steps: &[Step]) -> Vec<(&str, &str)> {
        steps.iter().map(|s| (s.from.as_str(), s.to.as_str())).collect()
    }

    #[test]
    fn test_independent_operations_keep_plan_order() {
        let steps = schedule(&[op("a.jpg", "1-x.jpg"), op("b.jpg", "2-y.jpg")]);
        assert_eq!(pairs(&steps), vec![("a.jpg", "1-x.jpg"), ("b.jpg", "2-y.jpg")]);
        assert!(steps.iter().all(|s| s.finalize));
    }

    #[test]
    fn test_chain_runs_from_the_end() {
        let steps = schedule(&[op("new.jpg", "1-a.jpg"), op("1-a.jpg", "2-a.jpg")]);
        assert_eq!(pairs(&steps), vec![("1-a.jpg", "2-a.jpg"), ("new.jpg", "1-a.jpg")]);
    }

    #[test]
    fn test_ring_is_broken_with_staging_name() {
        let steps = schedule(&[op("1-b.jpg", "2-b.jpg"), op("2-b.jpg", "1-b.jpg")]);
        assert_eq!(
            pairs(&steps),
            vec![
                ("1-b.jpg", ".1-b.jpg.tsname-tmp"),
                ("2-b.jpg", "1-b.jpg"),
                (".1-b.jpg.tsname-tmp", "2-b.jpg"),
            ]
        );
        assert!(!steps[0].finalize);
    }

    #[test]
    fn test_noop_is_kept_for_read_only_marking() {
        let steps = schedule(&[op("1-a.jpg", "1-a.jpg")]);
        assert_eq!(pairs(&steps), vec![("1-a.jpg", "1-a.jpg")]);
        assert!(steps[0].finalize);
    }

    #[test]
    fn test_apply_renames_and_marks_read_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("new.jpg"), b"new").unwrap();
        fs::write(dir.path().join("1-a.jpg"), b"old").unwrap();

        let renamed = apply(
            dir.path(),
            &[op("new.jpg", "1-a.jpg"), op("1-a.jpg", "2-a.jpg")],
        )
        .unwrap();

        assert_eq!(renamed, 2);
        assert_eq!(fs::read(dir.path().join("1-a.jpg")).unwrap(), b"new");
        assert_eq!(fs::read(dir.path().join("2-a.jpg")).unwrap(), b"old");
        assert!(!dir.path().join("new.jpg").exists());
        for name in ["1-a.jpg", "2-a.jpg"] {
            let perms = fs::metadata(dir.path().join(name)).unwrap().permissions();
            assert!(perms.readonly());
        }
    }

    #[test]
    fn test_apply_swaps_ring_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1-b.jpg"), b"one").unwrap();
        fs::write(dir.path().join("2-b.jpg"), b"two").unwrap();

        let renamed = apply(
            dir.path(),
            &[op("1-b.jpg", "2-b.jpg"), op("2-b.jpg", "1-b.jpg")],
        )
        .unwrap();

        assert_eq!(renamed, 2);
        assert_eq!(fs::read(dir.path().join("2-b.jpg")).unwrap(), b"one");
        assert_eq!(fs::read(dir.path().join("1-b.jpg")).unwrap(), b"two");
        assert!(!dir.path().join(".1-b.jpg.tsname-tmp").exists());
    }

    #[test]
    fn test_apply_refuses_to_overwrite_unplanned_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("1-a.jpg"), b"other").unwrap();

        match apply(dir.path(), &[op("a.jpg", "1-a.jpg")]) {
            Err(Error::TargetExists { source_name, target }) => {
                assert_eq!(source_name, "a.jpg");
                assert_eq!(target, "1-a.jpg");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fs::read(dir.path().join("1-a.jpg")).unwrap(), b"other");
        assert!(dir.path().join("a.jpg").exists());
    }
}
