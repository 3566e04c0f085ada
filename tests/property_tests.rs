//! Property-based tests for the journal and the history engine.
//!
//! These tests use proptest to check that the undo/redo laws hold for
//! randomly shaped histories.

use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;
use tempfile::TempDir;

use rewind::core::action::Action;
use rewind::core::metadata::RatingMetadata;
use rewind::core::ops::journal::Journal;
use rewind::core::paths::RewindPaths;
use rewind::core::target::NullTarget;
use rewind::core::types::{GroupId, Rating};
use rewind::engine::history::HistoryEngine;

/// One planned action; files are created fresh for each case.
#[derive(Debug, Clone)]
enum Step {
    Trash,
    Rate { rejected: bool, rating: u8 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Trash),
        (any::<bool>(), 0u8..=Rating::MAX).prop_map(|(rejected, rating)| Step::Rate { rejected, rating }),
    ]
}

/// Groups of one to three steps.
fn history() -> impl Strategy<Value = Vec<Vec<Step>>> {
    prop::collection::vec(prop::collection::vec(step(), 1..4), 1..6)
}

fn build_group(dir: &TempDir, index: usize, steps: &[Step]) -> Vec<Action> {
    let group = GroupId::new();
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let path: PathBuf = dir.path().join(format!("photos/{index}-{i}.jpg"));
            fs::write(&path, format!("{index}-{i}")).expect("write photo");
            match step {
                Step::Trash => Action::trash(group.clone(), path),
                Step::Rate { rejected, rating } => Action::set_rating(
                    group.clone(),
                    path,
                    RatingMetadata::default(),
                    RatingMetadata::new(*rejected, Rating::new(*rating).expect("valid rating")),
                ),
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// n undos followed by n redos restore the done-stack exactly.
    #[test]
    fn undo_then_redo_restores_done_stack(groups in history(), undos in 0usize..8) {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("photos")).expect("create photo dir");
        let paths = RewindPaths::new(dir.path().join("data"), dir.path().join("Trash"));
        let mut engine = HistoryEngine::open(&paths).expect("open engine");

        for (index, steps) in groups.iter().enumerate() {
            let actions = build_group(&dir, index, steps);
            engine.apply(&mut NullTarget, actions).expect("apply");
        }
        let before = engine.done().to_vec();

        let n = undos.min(groups.len());
        for _ in 0..n {
            prop_assert!(engine.undo(&mut NullTarget).expect("undo").is_some());
        }
        for _ in 0..n {
            prop_assert!(engine.redo(&mut NullTarget).expect("redo").is_some());
        }

        prop_assert_eq!(engine.done(), before.as_slice());
        prop_assert!(engine.undone().is_empty());
    }

    /// Every record sits on exactly one stack after any number of undos.
    #[test]
    fn stacks_partition_the_records(groups in history(), undos in 0usize..8) {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("photos")).expect("create photo dir");
        let paths = RewindPaths::new(dir.path().join("data"), dir.path().join("Trash"));
        let mut engine = HistoryEngine::open(&paths).expect("open engine");

        let mut total = 0;
        for (index, steps) in groups.iter().enumerate() {
            total += steps.len();
            let actions = build_group(&dir, index, steps);
            engine.apply(&mut NullTarget, actions).expect("apply");
        }

        for _ in 0..undos {
            engine.undo(&mut NullTarget).expect("undo");
        }

        prop_assert_eq!(engine.done().len() + engine.undone().len(), total);
        for record in engine.undone() {
            prop_assert!(!engine.done().contains(record));
        }
    }

    /// Reopening a journal after appends and pops reproduces its records.
    #[test]
    fn journal_reload_matches_memory(
        ops in prop::collection::vec(prop::option::of(0u8..=Rating::MAX), 1..40),
    ) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("history.jsonl");
        let mut journal = Journal::open(&path).expect("open journal");

        // Some(rating) appends a record, None pops the last one.
        for (i, op) in ops.iter().enumerate() {
            match op {
                Some(rating) => {
                    let action = Action::set_rating(
                        GroupId::from_string(format!("g{}", i % 3)).expect("valid group id"),
                        format!("/photos/{i}.jpg"),
                        RatingMetadata::default(),
                        RatingMetadata::new(false, Rating::new(*rating).expect("valid rating")),
                    );
                    journal.append(action).expect("append");
                }
                None => {
                    journal.pop(None).expect("pop");
                }
            }
        }

        let expected = journal.records().to_vec();
        drop(journal);

        let reopened = Journal::open(&path).expect("reopen journal");
        prop_assert_eq!(reopened.records(), expected.as_slice());
    }
}
