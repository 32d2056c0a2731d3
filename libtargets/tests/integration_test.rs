use std::io::Write as _;

use libtargets::{Method, TargetError, TargetSet};

#[test]
fn it_reads_a_corpus_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "GET http://localhost:8080/health").unwrap();
    writeln!(file, "POST http://localhost:8080/orders").unwrap();
    writeln!(file, "$ {{\"qty\": 1}}").unwrap();

    let set = TargetSet::from_path(file.path(), false).unwrap();
    assert_eq!(set.len(), 2);

    let first = set.next();
    assert_eq!(first.method, Method::Get);
    assert_eq!(first.url, "http://localhost:8080/health");
    assert!(first.body.is_empty());

    let second = set.next();
    assert_eq!(second.method, Method::Post);
    assert_eq!(second.body, br#"{"qty": 1}"#);
}

#[test]
fn it_reports_a_missing_file_as_io() {
    let err = TargetSet::from_path("/definitely/not/here.txt", false).unwrap_err();
    assert!(matches!(err, TargetError::Io(_)));
}

#[test]
fn it_carries_fixed_headers_through() {
    let set = TargetSet::from_reader("GET http://localhost/a\n".as_bytes(), false)
        .unwrap()
        .with_headers(vec![("X-Token".to_string(), "abc".to_string())]);
    assert_eq!(set.headers(), [("X-Token".to_string(), "abc".to_string())]);
}
