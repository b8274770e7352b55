//! Legacy sidecar migration sweeps.

use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use songbook_core::{
    BookMetadata, ErrorSink, MigrateOptions, SongbookError, TocEntry, Volume, migrate_tree,
    parse_sidecar, verify_equivalent,
};

const LEGACY: &str = r#"<songbook>
  <pageoffset>1</pageoffset>
  <lastviewed>3</lastviewed>
  <notes>from the loft</notes>
  <volumes>
    <volume file="Suite.pdf" pages="6" rotation="0"/>
    <volume file="Suitea.pdf" pages="4" rotation="1"/>
  </volumes>
  <contents>
    <song title="Allemande" composer="Bach" page="1"/>
    <song title="Courante" page="4"/>
  </contents>
  <favorites>
    <favorite page="2" name="encore"/>
  </favorites>
  <annotations>
    <annotation page="2" width="640" height="480" format="ink">AQIDBA==</annotation>
  </annotations>
</songbook>
"#;

#[derive(Default)]
struct CollectSink(Mutex<Vec<String>>);

impl ErrorSink for CollectSink {
    fn report(&self, context: &str, error: &SongbookError) {
        self.0
            .lock()
            .expect("sink mutex")
            .push(format!("{context}: {error}"));
    }
}

impl CollectSink {
    fn reports(&self) -> Vec<String> {
        self.0.lock().expect("sink mutex").clone()
    }
}

#[test]
fn migration_round_trips_field_by_field() {
    let root = TempDir::new().expect("tmp");
    std::fs::write(root.path().join("Suite.sbx"), LEGACY).expect("legacy");

    let sink = CollectSink::default();
    let report = migrate_tree(root.path(), MigrateOptions::default(), &sink);

    assert_eq!(report.converted, 1);
    assert_eq!(report.parse_failures, 0);
    assert_eq!(report.verify_failures, 0);
    assert_eq!(report.deleted, 0);
    // Without an explicit delete request, the legacy original stays.
    assert!(root.path().join("Suite.sbx").is_file());

    // Reading the migrated compact sidecar equals reading the legacy one.
    let legacy_text = std::fs::read_to_string(root.path().join("Suite.sbx")).expect("read");
    let compact_text = std::fs::read_to_string(root.path().join("Suite.sbm")).expect("read");
    let from_legacy = parse_sidecar(&legacy_text, Path::new("Suite.sbx")).expect("parse");
    let from_compact = parse_sidecar(&compact_text, Path::new("Suite.sbm")).expect("parse");
    assert_eq!(verify_equivalent(&from_legacy, &from_compact), Ok(()));
    assert_eq!(from_legacy.notes, from_compact.notes);
    assert_eq!(from_legacy.last_viewed_page, from_compact.last_viewed_page);
    assert_eq!(
        from_legacy.annotations[0].payload,
        from_compact.annotations[0].payload
    );
    assert_eq!(
        from_legacy.volumes[1].rotation,
        from_compact.volumes[1].rotation
    );
}

#[test]
fn deletion_is_explicit_and_follows_a_verified_write() {
    let root = TempDir::new().expect("tmp");
    std::fs::write(root.path().join("Suite.sbx"), LEGACY).expect("legacy");

    let sink = CollectSink::default();
    let options = MigrateOptions {
        delete_legacy: true,
    };
    let report = migrate_tree(root.path(), options, &sink);

    assert_eq!(report.converted, 1);
    assert_eq!(report.deleted, 1);
    assert!(!root.path().join("Suite.sbx").exists());
    assert!(root.path().join("Suite.sbm").is_file());
}

#[test]
fn existing_compact_targets_are_never_overwritten() {
    let root = TempDir::new().expect("tmp");
    std::fs::write(root.path().join("Suite.sbx"), LEGACY).expect("legacy");
    std::fs::write(root.path().join("Suite.sbm"), "{\"v\":2}").expect("compact");

    let sink = CollectSink::default();
    let report = migrate_tree(root.path(), MigrateOptions::default(), &sink);

    assert_eq!(report.converted, 0);
    assert_eq!(report.skipped_existing, 1);
    let untouched = std::fs::read_to_string(root.path().join("Suite.sbm")).expect("read");
    assert_eq!(untouched, "{\"v\":2}");
}

#[test]
fn legacy_content_under_the_compact_extension_is_left_alone() {
    let root = TempDir::new().expect("tmp");
    std::fs::write(root.path().join("Tuba.sbm"), LEGACY).expect("mislabeled legacy");

    let sink = CollectSink::default();
    let report = migrate_tree(root.path(), MigrateOptions::default(), &sink);

    // The target path is occupied (by the file itself), so nothing is written.
    assert_eq!(report.converted, 0);
    assert_eq!(report.skipped_existing, 1);
    let untouched = std::fs::read_to_string(root.path().join("Tuba.sbm")).expect("read");
    assert_eq!(untouched, LEGACY);
}

#[test]
fn garbage_sidecars_count_as_parse_failures() {
    let root = TempDir::new().expect("tmp");
    std::fs::write(root.path().join("Junk.sbx"), "garbage").expect("junk");
    std::fs::write(root.path().join("Bad.sbx"), "<songbook><bogus/></songbook>")
        .expect("bad xml");

    let sink = CollectSink::default();
    let report = migrate_tree(root.path(), MigrateOptions::default(), &sink);

    assert_eq!(report.converted, 0);
    assert_eq!(report.parse_failures, 2);
    assert_eq!(sink.reports().len(), 2);
    assert!(root.path().join("Junk.sbx").is_file());
    assert!(root.path().join("Bad.sbx").is_file());
}

#[test]
fn hidden_directories_are_not_swept() {
    let root = TempDir::new().expect("tmp");
    std::fs::create_dir(root.path().join("hidden")).expect("mkdir");
    std::fs::write(root.path().join("hidden/Secret.sbx"), LEGACY).expect("legacy");

    let report = migrate_tree(root.path(), MigrateOptions::default(), &CollectSink::default());
    assert_eq!(report.converted, 0);
    assert!(!root.path().join("hidden/Secret.sbm").exists());
}

#[test]
fn verification_mismatches_are_named_per_entry() {
    // A re-parse that diverges on the second TOC entry's page is rejected
    // with one verification error naming that entry.
    let mut original = BookMetadata::default();
    original.volumes.push(Volume::new("Suite.pdf", 9));
    original.toc.push(TocEntry::titled("Allemande", 1));
    original.toc.push(TocEntry::titled("Courante", 4));

    let mut corrupted = original.clone();
    corrupted.toc[1].page = 5;

    assert_eq!(
        verify_equivalent(&original, &corrupted),
        Err("toc entry 2".to_string())
    );
}
