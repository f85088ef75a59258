use super::*;
use tempfile::TempDir;

fn test_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let storage = FileStorage::new(temp_dir.path().join("documents")).expect("should init storage");
    (storage, temp_dir)
}

#[test]
fn creates_root_directory() {
    let (storage, _temp_dir) = test_storage();
    assert!(storage.root().is_dir());
}

#[test]
fn saves_bytes_under_given_name() {
    let (storage, _temp_dir) = test_storage();

    let (path, name) = storage
        .save_bytes("notes.md", b"hello")
        .expect("should save file");

    assert_eq!(name, "notes.md");
    assert_eq!(std::fs::read(&path).expect("should read back"), b"hello");
}

#[test]
fn collisions_get_numeric_suffixes() {
    let (storage, _temp_dir) = test_storage();

    let (_, first) = storage
        .save_text("notes.md", "one")
        .expect("should save first");
    let (_, second) = storage
        .save_text("notes.md", "two")
        .expect("should save second");
    let (_, third) = storage
        .save_text("notes.md", "three")
        .expect("should save third");

    assert_eq!(first, "notes.md");
    assert_eq!(second, "notes_1.md");
    assert_eq!(third, "notes_2.md");

    // All three files exist with their own content
    assert_eq!(
        std::fs::read_to_string(storage.root().join("notes.md")).expect("should read"),
        "one"
    );
    assert_eq!(
        std::fs::read_to_string(storage.root().join("notes_1.md")).expect("should read"),
        "two"
    );
}

#[test]
fn collision_suffix_without_extension() {
    let (storage, _temp_dir) = test_storage();

    let (_, first) = storage.save_text("README", "a").expect("should save");
    let (_, second) = storage.save_text("README", "b").expect("should save");

    assert_eq!(first, "README");
    assert_eq!(second, "README_1");
}

#[test]
fn delete_reports_absent_files() {
    let (storage, _temp_dir) = test_storage();

    let (path, _) = storage
        .save_text("gone.md", "bye")
        .expect("should save file");

    assert!(storage.delete(&path).expect("should delete existing file"));
    assert!(!storage.delete(&path).expect("absent file is not an error"));
    assert!(!storage.exists(&path));
}
