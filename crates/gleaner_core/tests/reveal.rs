use std::sync::Once;

use gleaner_core::{RevealTracker, RoundVerdict};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(gleaner_logging::initialize_for_tests);
}

fn thumb(id: u32) -> String {
    format!("https://media.misskeyusercontent.jp/io/thumbnail-{id}.webp")
}

#[test]
fn non_thumbnail_sources_are_ignored() {
    init_logging();
    let mut tracker = RevealTracker::new(3);
    let outcome = tracker.observe_round(vec![
        "https://media.misskeyusercontent.jp/io/full-res.png".to_string(),
        "https://cdn.example/avatar.png".to_string(),
    ]);
    assert!(outcome.fresh.is_empty());
    assert_eq!(tracker.processed_count(), 0);
}

#[test]
fn reappearing_thumbnails_are_yielded_once() {
    init_logging();
    let mut tracker = RevealTracker::new(3);

    let first = tracker.observe_round(vec![thumb(1), thumb(2)]);
    assert_eq!(first.fresh.len(), 2);

    // The same sources show up again after another scroll, plus one new.
    let second = tracker.observe_round(vec![thumb(1), thumb(2), thumb(3)]);
    assert_eq!(second.fresh.len(), 1);
    assert_eq!(second.fresh[0].as_str(), thumb(3));
    assert_eq!(tracker.processed_count(), 3);
}

#[test]
fn duplicate_sources_within_one_round_collapse() {
    init_logging();
    let mut tracker = RevealTracker::new(3);
    let outcome = tracker.observe_round(vec![thumb(7), thumb(7), thumb(7)]);
    assert_eq!(outcome.fresh.len(), 1);
}

#[test]
fn exhausts_after_three_unproductive_rounds() {
    init_logging();
    let mut tracker = RevealTracker::new(3);
    assert_eq!(tracker.observe_round(vec![thumb(1)]).verdict, RoundVerdict::Continue);

    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![thumb(1)]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Exhausted);
}

#[test]
fn fresh_thumbnails_reset_the_stagnation_counter() {
    init_logging();
    let mut tracker = RevealTracker::new(3);

    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Continue);
    // One fresh thumbnail buys three more rounds.
    assert_eq!(tracker.observe_round(vec![thumb(9)]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Continue);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Exhausted);
}

#[test]
fn threshold_of_zero_is_clamped_to_one() {
    init_logging();
    let mut tracker = RevealTracker::new(0);
    assert_eq!(tracker.observe_round(vec![]).verdict, RoundVerdict::Exhausted);
}
