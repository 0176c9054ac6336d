use tempfile::tempdir;

use crate::repository::{self, Repository, RepositoryError};
use crate::row::{Schema, SchemaError};

fn schema(names: &[&str]) -> Schema {
    Schema::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
}

#[test]
fn exists_is_false_until_both_files_are_written() {
    let dir = tempdir().unwrap();
    assert!(!repository::exists(dir.path(), "base"));
    Repository::open(dir.path(), "base", &schema(&["x"])).unwrap();
    assert!(repository::exists(dir.path(), "base"));
}

#[test]
fn open_creates_header_and_comment_line() {
    let dir = tempdir().unwrap();
    let repo = Repository::open(dir.path(), "base", &schema(&["x", "y"])).unwrap();
    let header = std::fs::read_to_string(repo.header_path()).unwrap();
    assert_eq!(header, "1\nx\ty\n");
    let data = std::fs::read_to_string(repo.data_path()).unwrap();
    assert!(data.starts_with("# opened "));
}

#[test]
fn reopen_with_same_schema_reuses_files() {
    let dir = tempdir().unwrap();
    {
        let mut repo = Repository::open(dir.path(), "base", &schema(&["x"])).unwrap();
        repo.append_line("-5\t1\t1").unwrap();
        repo.flush().unwrap();
    }
    let repo = Repository::open(dir.path(), "base", &schema(&["x"])).unwrap();
    let lines: Vec<_> = repo.reader().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(lines.len(), 2); // comment + one record
}

#[test]
fn reopen_with_grown_schema_rewrites_header() {
    let dir = tempdir().unwrap();
    Repository::open(dir.path(), "base", &schema(&["x"])).unwrap();
    let repo = Repository::open(dir.path(), "base", &schema(&["x", "y"])).unwrap();
    assert_eq!(repo.schema().columns(), &["x".to_string(), "y".to_string()]);
    let header = std::fs::read_to_string(repo.header_path()).unwrap();
    assert_eq!(header, "1\nx\ty\n");
}

#[test]
fn reopen_with_mismatched_prefix_fails() {
    let dir = tempdir().unwrap();
    Repository::open(dir.path(), "base", &schema(&["x", "y"])).unwrap();
    let err = Repository::open(dir.path(), "base", &schema(&["x", "z"])).unwrap_err();
    assert!(matches!(err, RepositoryError::Schema(SchemaError::NotAPrefix { .. })));
}

#[test]
fn reopen_with_fewer_columns_fails() {
    let dir = tempdir().unwrap();
    Repository::open(dir.path(), "base", &schema(&["x", "y"])).unwrap();
    let err = Repository::open(dir.path(), "base", &schema(&["x"])).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Schema(SchemaError::HeaderLongerThanSchema {
            on_disk_len: 2,
            schema_len: 1
        })
    ));
}

#[test]
fn data_without_header_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("base.pts.data"), "# opened 1\n").unwrap();
    let err = Repository::open(dir.path(), "base", &schema(&["x"])).unwrap_err();
    assert!(matches!(err, RepositoryError::DataWithoutHeader(_)));
}

#[test]
fn unsupported_version_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("base.pts.hdr"), "99\nx\n").unwrap();
    let err = Repository::open(dir.path(), "base", &schema(&["x"])).unwrap_err();
    assert!(matches!(err, RepositoryError::UnsupportedVersion { found: 99, .. }));
}
