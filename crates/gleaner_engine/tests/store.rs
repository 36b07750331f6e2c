use std::fs;
use std::sync::{Arc, Once};
use std::thread;

use gleaner_engine::{Acceptance, ContentDigest, ContentStore, DedupIndex};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(gleaner_logging::initialize_for_tests);
}

fn open_store(temp: &TempDir) -> ContentStore {
    ContentStore::open(temp.path(), DedupIndex::new()).expect("open store")
}

#[test]
fn stores_then_rejects_same_digest() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    let blob = b"image-bytes-one";
    let digest = ContentDigest::of(blob);

    let first = store.accept(digest, blob, "pic.png", "alice").unwrap();
    let Acceptance::Stored(file) = first else {
        panic!("first accept should store");
    };
    assert_eq!(file.path, temp.path().join("alice").join("pic.png"));
    assert_eq!(fs::read(&file.path).unwrap(), blob);

    // Same digest offered from another target under a different name.
    let second = store.accept(digest, blob, "other.png", "bob").unwrap();
    assert_eq!(second, Acceptance::Duplicate);
    assert!(!temp.path().join("bob").join("other.png").exists());
}

#[test]
fn identical_existing_file_is_adopted_without_rewrite() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    let blob = b"already-on-disk";
    fs::create_dir_all(temp.path().join("alice")).unwrap();
    fs::write(temp.path().join("alice").join("pic.png"), blob).unwrap();

    let outcome = store
        .accept(ContentDigest::of(blob), blob, "pic.png", "alice")
        .unwrap();
    assert_eq!(outcome, Acceptance::Duplicate);

    // No suffixed copy appeared.
    assert!(!temp.path().join("alice").join("pic_1.png").exists());
    // The adopted file now blocks the digest for good.
    let again = store
        .accept(ContentDigest::of(blob), blob, "elsewhere.png", "alice")
        .unwrap();
    assert_eq!(again, Acceptance::Duplicate);
}

#[test]
fn different_content_with_same_candidate_gets_suffixed_path() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    let first = b"content-a";
    let second = b"content-b";

    let stored_first = store
        .accept(ContentDigest::of(first), first, "pic.png", "alice")
        .unwrap();
    let stored_second = store
        .accept(ContentDigest::of(second), second, "pic.png", "alice")
        .unwrap();

    let Acceptance::Stored(first_file) = stored_first else {
        panic!("first blob should store");
    };
    let Acceptance::Stored(second_file) = stored_second else {
        panic!("second blob should store");
    };
    assert_eq!(first_file.path, temp.path().join("alice").join("pic.png"));
    assert_eq!(second_file.path, temp.path().join("alice").join("pic_1.png"));
    // Neither file was overwritten.
    assert_eq!(fs::read(&first_file.path).unwrap(), first);
    assert_eq!(fs::read(&second_file.path).unwrap(), second);
}

#[test]
fn seeding_makes_dedup_survive_restarts() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let blob = b"downloaded-last-run";
    fs::create_dir_all(temp.path().join("alice")).unwrap();
    fs::write(temp.path().join("alice").join("old.png"), blob).unwrap();
    fs::write(temp.path().join("alice").join("notes.txt"), b"not an image").unwrap();

    let store = open_store(&temp);
    assert_eq!(store.seed_from_disk(), 1);

    let outcome = store
        .accept(ContentDigest::of(blob), blob, "new.png", "bob")
        .unwrap();
    assert_eq!(outcome, Acceptance::Duplicate);
    assert!(!temp.path().join("bob").join("new.png").exists());
}

#[test]
fn sweep_keeps_first_discovered_path_per_digest() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    let shared = b"same-bytes";
    let unique = b"other-bytes";
    fs::create_dir_all(temp.path().join("alice")).unwrap();
    fs::create_dir_all(temp.path().join("bob")).unwrap();
    fs::write(temp.path().join("alice").join("a.png"), shared).unwrap();
    fs::write(temp.path().join("alice").join("b.png"), shared).unwrap();
    fs::write(temp.path().join("alice").join("unique.png"), unique).unwrap();
    fs::write(temp.path().join("bob").join("c.png"), shared).unwrap();

    assert_eq!(store.sweep_duplicates(), 2);

    assert!(temp.path().join("alice").join("a.png").exists());
    assert!(!temp.path().join("alice").join("b.png").exists());
    assert!(!temp.path().join("bob").join("c.png").exists());
    assert!(temp.path().join("alice").join("unique.png").exists());
}

#[test]
fn racing_writers_store_exactly_one_copy() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&temp));

    let blob: Vec<u8> = vec![7; 4096];
    let digest = ContentDigest::of(&blob);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let store = Arc::clone(&store);
        let blob = blob.clone();
        handles.push(thread::spawn(move || {
            let candidate = format!("race-{worker}.png");
            store.accept(digest, &blob, &candidate, "alice").unwrap()
        }));
    }

    let outcomes: Vec<Acceptance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored = outcomes
        .iter()
        .filter(|o| matches!(o, Acceptance::Stored(_)))
        .count();
    assert_eq!(stored, 1);

    let files: Vec<_> = fs::read_dir(temp.path().join("alice"))
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn failed_write_releases_the_digest_claim() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);

    // A plain file squats on the per-target directory path.
    fs::write(temp.path().join("alice"), b"squatter").unwrap();

    let blob = b"payload";
    let digest = ContentDigest::of(blob);
    assert!(store.accept(digest, blob, "pic.png", "alice").is_err());

    // The digest is claimable again under a usable target.
    let retry = store.accept(digest, blob, "pic.png", "bob").unwrap();
    assert!(matches!(retry, Acceptance::Stored(_)));
}
