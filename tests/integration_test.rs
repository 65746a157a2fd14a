//! Integration tests for xv.
//!
//! These tests drive the import workflow end to end:
//! - Archive enumeration and bz2 decode through the pipeline
//! - Transactional import with completed-entry markers
//! - Idempotent re-import and resume after an interrupted run
//! - Entry-scoped failure handling
//! - The full-profile side table

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bzip2::Compression;
use bzip2::write::BzEncoder;
use tempfile::TempDir;

use xv::Archive;
use xv::codec::{self, KeyFamily, StatusFact};
use xv::importer::{EntryOutcome, Importer};
use xv::pipeline::{self, PipelineOptions};
use xv::profiles::ProfileImporter;
use xv::store::Store;

// Ids above the snowflake threshold so timestamps derive from the id.
const BASE: u64 = 1_000_000_000_000_000_000;

fn bz2(lines: &[String]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap()
}

/// Write a zip container with one bz2 entry per (path, lines) pair.
fn build_zip(dir: &Path, name: &str, entries: &[(&str, Vec<String>)]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (entry, lines) in entries {
        writer.start_file(*entry, options).unwrap();
        writer.write_all(&bz2(lines)).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn tweet(id: u64, user_id: u64, screen_name: &str) -> String {
    format!(
        r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"{screen_name}","name":"{screen_name}"}}}}"#
    )
}

fn tweet_with_mention(id: u64, user_id: u64, mentioned: u64) -> String {
    format!(
        r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"author","name":"Author"}},"entities":{{"user_mentions":[{{"id_str":"{mentioned}","screen_name":"friend","name":"Friend"}}]}}}}"#
    )
}

fn reply(id: u64, user_id: u64, screen_name: &str, to_status: u64, to_user: u64) -> String {
    format!(
        r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"{screen_name}","name":"{screen_name}"}},"in_reply_to_status_id_str":"{to_status}","in_reply_to_user_id_str":"{to_user}","in_reply_to_screen_name":"target"}}"#
    )
}

fn delete(status_id: u64, user_id: u64, timestamp_ms: u64) -> String {
    format!(
        r#"{{"delete":{{"status":{{"id_str":"{status_id}","user_id_str":"{user_id}"}},"timestamp_ms":"{timestamp_ms}"}}}}"#
    )
}

/// A profile-complete user object, as the live stream ships for authors.
fn full_user_tweet(status_id: u64, user_id: u64, screen_name: &str) -> String {
    format!(
        r#"{{"id_str":"{status_id}","user":{{"id_str":"{user_id}","screen_name":"{screen_name}","name":"{screen_name}","protected":false,"verified":false,"followers_count":5,"friends_count":2,"listed_count":0,"favourites_count":9,"statuses_count":100,"created_at":"Tue Feb 02 10:00:00 +0000 2016","profile_image_url_https":"https://example.invalid/a.png","default_profile":true,"default_profile_image":false}}}}"#
    )
}

fn options() -> PipelineOptions {
    PipelineOptions {
        workers: 2,
        queue_capacity: 4,
        deadline: Duration::from_secs(60),
    }
}

#[derive(Default)]
struct RunSummary {
    imported: usize,
    skipped: usize,
    failed: usize,
    written: u64,
    lines: usize,
    failed_lines: usize,
}

/// Import one archive the way the CLI does: skip completed entries up front,
/// keep going past entry-scoped failures, stop on anything else.
fn run_import(store: &Store, path: &Path) -> RunSummary {
    let archive = Archive::open(path).unwrap();
    let name = archive.name().to_string();
    let mut importer = Importer::new(store).unwrap();
    let completed = importer.completed_entries_for(&name);
    let mut summary = RunSummary::default();

    pipeline::run(
        &archive,
        &options(),
        |entry| completed.contains(entry.path()),
        |result| {
            summary.lines += result.line_count();
            summary.failed_lines += result.failed_lines();
            match importer.import(&name, &result) {
                Ok(EntryOutcome::Imported { written, .. }) => {
                    summary.imported += 1;
                    summary.written += written;
                }
                Ok(EntryOutcome::AlreadyComplete) => summary.skipped += 1,
                Err(error) if error.is_entry_scoped() => summary.failed += 1,
                Err(error) => return Err(error),
            }
            Ok(true)
        },
    )
    .unwrap();
    summary
}

fn fixture_entries() -> Vec<(&'static str, Vec<String>)> {
    vec![
        (
            "2021/01.json.bz2",
            vec![
                tweet(BASE + 1, 10, "alice"),
                tweet_with_mention(BASE + 2, 11, 12),
                reply(BASE + 3, 14, "carol", BASE + 900, 15),
            ],
        ),
        (
            "2021/02.json.bz2",
            vec![
                delete(BASE + 4, 16, 1_600_000_000_000),
                tweet(BASE + 5, 17, "dave"),
            ],
        ),
        (
            "2021/03.json.bz2",
            vec!["{\"broken\"".to_string(), tweet(BASE + 6, 18, "erin")],
        ),
    ]
}

#[test]
fn test_full_import_pipeline() {
    let dir = TempDir::new().unwrap();
    let zip = build_zip(dir.path(), "capture.zip", &fixture_entries());
    let store = Store::open(dir.path().join("store")).unwrap();

    let summary = run_import(&store, &zip);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert!(summary.written > 0);
    assert_eq!(summary.lines, 7);
    assert_eq!(summary.failed_lines, 1);

    // Five full facts plus the short row the reply points at.
    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 6);
    assert_eq!(store.count_family(KeyFamily::Delete).unwrap(), 1);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 3);
    // alice, author, friend, carol, target, dave, erin
    assert_eq!(store.count_family(KeyFamily::ScreenName).unwrap(), 7);
    assert_eq!(store.count_family(KeyFamily::UserAlias).unwrap(), 7);

    let short = store.get(&codec::status_key(BASE + 900)).unwrap().unwrap();
    assert!(matches!(
        StatusFact::decode(&short).unwrap(),
        StatusFact::Short(15)
    ));

    let deleted = store.get(&codec::delete_key(16, BASE + 4)).unwrap().unwrap();
    assert_eq!(
        codec::decode_delete_value(&deleted).unwrap(),
        Some(1_600_000_000_000)
    );

    // Marker value records the entry's full-fact count.
    let marker = store
        .get(&codec::completed_entry_key("capture.zip", "2021/01.json.bz2"))
        .unwrap()
        .unwrap();
    assert_eq!(marker.as_slice(), 3u64.to_be_bytes());
}

#[test]
fn test_bulk_archive_exact_counts() {
    let dir = TempDir::new().unwrap();

    // Relation-free tweets with unique authors, so every line maps to exactly
    // one status fact, one alias, and one screen-name row.
    let tweets: Vec<String> = (0..5378u64)
        .map(|i| tweet(BASE + 100_000 + i, 1_000 + i, &format!("u{i}")))
        .collect();
    let deletes: Vec<String> = (0..832u64)
        .map(|i| delete(BASE + 400_000 + i, 700_000 + i, 1_600_000_000_000 + i))
        .collect();
    let zip = build_zip(
        dir.path(),
        "bulk.zip",
        &[
            ("bulk/00.json.bz2", tweets[..2689].to_vec()),
            ("bulk/01.json.bz2", tweets[2689..].to_vec()),
            ("bulk/02.json.bz2", deletes),
        ],
    );
    let store = Store::open(dir.path().join("store")).unwrap();

    let summary = run_import(&store, &zip);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.lines, 6210);
    assert_eq!(summary.failed_lines, 0);

    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 5378);
    assert_eq!(store.count_family(KeyFamily::Delete).unwrap(), 832);
    assert_eq!(store.count_family(KeyFamily::UserAlias).unwrap(), 5378);
    assert_eq!(store.count_family(KeyFamily::ScreenName).unwrap(), 5378);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 3);
}

#[test]
fn test_reimport_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let zip = build_zip(dir.path(), "capture.zip", &fixture_entries());
    let store = Store::open(dir.path().join("store")).unwrap();

    let first = run_import(&store, &zip);
    assert_eq!(first.imported, 3);

    let second = run_import(&store, &zip);
    assert_eq!(second.imported, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(second.written, 0);
    // Completed entries are skipped before decode, so nothing reaches the
    // importer at all.
    assert_eq!(second.lines, 0);

    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 6);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 3);
}

#[test]
fn test_resume_after_interrupted_run() {
    let dir = TempDir::new().unwrap();
    let zip = build_zip(dir.path(), "capture.zip", &fixture_entries());
    let store = Store::open(dir.path().join("store")).unwrap();

    // First run dies after committing a single entry.
    let archive = Archive::open(&zip).unwrap();
    let name = archive.name().to_string();
    let mut importer = Importer::new(&store).unwrap();
    let single = PipelineOptions {
        workers: 1,
        queue_capacity: 1,
        deadline: Duration::from_secs(60),
    };
    let finished = pipeline::run(&archive, &single, |_| false, |result| {
        importer.import(&name, &result).unwrap();
        Ok(false)
    })
    .unwrap();
    assert!(!finished);
    drop(importer);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 1);

    // Second run picks up exactly the two unfinished entries.
    let resumed = run_import(&store, &zip);
    assert_eq!(resumed.imported, 2);
    assert_eq!(resumed.failed, 0);

    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 6);
    assert_eq!(store.count_family(KeyFamily::Delete).unwrap(), 1);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 3);
}

#[test]
fn test_failed_entry_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    // Middle entry claims the same status id for two different authors.
    let zip = build_zip(
        dir.path(),
        "capture.zip",
        &[
            ("00.json.bz2", vec![tweet(BASE + 1, 10, "alice")]),
            (
                "01.json.bz2",
                vec![tweet(BASE + 10, 10, "alice"), tweet(BASE + 10, 11, "mallory")],
            ),
            ("02.json.bz2", vec![tweet(BASE + 2, 20, "zoe")]),
        ],
    );
    let store = Store::open(dir.path().join("store")).unwrap();

    let summary = run_import(&store, &zip);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.failed, 1);

    // The failed entry committed nothing and stayed unmarked.
    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 2);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 2);
    assert!(store.get(&codec::status_key(BASE + 10)).unwrap().is_none());

    // A later run retries only the failed entry, and fails it again.
    let retry = run_import(&store, &zip);
    assert_eq!(retry.imported, 0);
    assert_eq!(retry.failed, 1);
    assert_eq!(retry.lines, 2);
}

#[test]
fn test_import_order_does_not_change_store() {
    let dir = TempDir::new().unwrap();
    let shared = BASE + 50;
    let one = build_zip(
        dir.path(),
        "one.zip",
        &[(
            "a.json.bz2",
            vec![tweet_with_mention(shared, 10, 12), tweet(BASE + 3, 20, "zoe")],
        )],
    );
    let two = build_zip(
        dir.path(),
        "two.zip",
        &[(
            "b.json.bz2",
            vec![
                tweet_with_mention(shared, 10, 13),
                reply(BASE + 4, 21, "yann", BASE + 3, 20),
            ],
        )],
    );

    let forward = Store::open(dir.path().join("forward")).unwrap();
    run_import(&forward, &one);
    run_import(&forward, &two);

    let reverse = Store::open(dir.path().join("reverse")).unwrap();
    run_import(&reverse, &two);
    run_import(&reverse, &one);

    for family in [
        KeyFamily::UserAlias,
        KeyFamily::ScreenName,
        KeyFamily::Status,
        KeyFamily::Delete,
        KeyFamily::CompletedEntry,
    ] {
        let lhs: Vec<_> = forward
            .family_iter(family)
            .collect::<Result<_, _>>()
            .unwrap();
        let rhs: Vec<_> = reverse
            .family_iter(family)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lhs, rhs, "family {family:?} diverged");
    }

    // Mentions from both entries ended up merged on the shared status.
    let stored = forward.get(&codec::status_key(shared)).unwrap().unwrap();
    match StatusFact::decode(&stored).unwrap() {
        StatusFact::Full(value) => assert_eq!(value.mentioned_ids(), &[12, 13]),
        StatusFact::Short(_) => panic!("expected a full fact"),
    }
    // The short row from the reply never downgraded the full fact.
    let stored = reverse.get(&codec::status_key(BASE + 3)).unwrap().unwrap();
    assert!(matches!(
        StatusFact::decode(&stored).unwrap(),
        StatusFact::Full(_)
    ));
}

#[test]
fn test_stale_completed_snapshot_converges() {
    let dir = TempDir::new().unwrap();
    let zip = build_zip(dir.path(), "capture.zip", &fixture_entries());
    let store = Store::open(dir.path().join("store")).unwrap();

    // Both importers snapshot an empty completed map up front, so the second
    // one re-processes every entry the first already committed.
    let archive = Archive::open(&zip).unwrap();
    let name = archive.name().to_string();
    let mut first = Importer::new(&store).unwrap();
    let mut second = Importer::new(&store).unwrap();

    let single = PipelineOptions {
        workers: 1,
        queue_capacity: 1,
        deadline: Duration::from_secs(60),
    };
    pipeline::run(&archive, &single, |_| false, |result| {
        first.import(&name, &result).unwrap();
        // The stale importer re-commits the marker but every data row is
        // already present and unchanged.
        let outcome = second.import(&name, &result).unwrap();
        assert!(matches!(outcome, EntryOutcome::Imported { written: 0, .. }));
        Ok(true)
    })
    .unwrap();

    // Double processing never duplicates a fact.
    assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 6);
    assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 3);
}

#[test]
fn test_profile_side_table() {
    let dir = TempDir::new().unwrap();
    let wrapper = format!(
        r#"{{"id_str":"{}","user":{{"id_str":"30","screen_name":"booster","name":"Booster","protected":false,"verified":true,"followers_count":1,"friends_count":1,"listed_count":0,"favourites_count":0,"statuses_count":7,"created_at":"Tue Feb 02 10:00:00 +0000 2016","profile_image_url_https":"https://example.invalid/b.png","default_profile":true,"default_profile_image":false}},"retweeted_status":{}}}"#,
        BASE + 9,
        full_user_tweet(BASE + 8, 10, "alice"),
    );
    let zip = build_zip(
        dir.path(),
        "capture.zip",
        &[(
            "00.json.bz2",
            vec![
                full_user_tweet(BASE + 1, 10, "alice"),
                full_user_tweet(BASE + 2, 11, "bob"),
                wrapper,
            ],
        )],
    );
    let store = Store::open(dir.path().join("profiles")).unwrap();

    let archive = Archive::open(&zip).unwrap();
    let mut importer = ProfileImporter::new(&store, None);
    pipeline::run(&archive, &options(), |_| false, |result| {
        importer.import(&result)?;
        Ok(true)
    })
    .unwrap();

    // alice at her own tweet's time, bob, booster, and the nested alice at
    // the wrapper's capture time.
    assert_eq!(importer.written(), 4);
    assert_eq!(importer.incomplete(), 0);

    // Re-running writes nothing new.
    let mut again = ProfileImporter::new(&store, None);
    pipeline::run(&archive, &options(), |_| false, |result| {
        again.import(&result)?;
        Ok(true)
    })
    .unwrap();
    assert_eq!(again.written(), 0);
    assert_eq!(again.already_present(), 4);
}
