//! Archive Codec Integration Tests

use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;

use locstage::core::archive::{extract, pack};
use locstage::core::layout::{list_file_paths, list_files};
use locstage::WorkspaceError;

fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    list_files(root)
        .unwrap()
        .into_iter()
        .map(|name| {
            let content = std::fs::read(root.join(&name)).unwrap();
            (name, content)
        })
        .collect()
}

#[test]
fn test_pack_then_extract_reproduces_tree() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    std::fs::create_dir_all(source.join("docs/deep")).unwrap();
    std::fs::write(source.join("index.html"), "<h1>hello</h1>").unwrap();
    std::fs::write(source.join("docs/guide.md"), "# guide\n").unwrap();
    std::fs::write(source.join("docs/deep/data.bin"), [0u8, 159, 146, 150, 255]).unwrap();
    std::fs::write(source.join("empty.txt"), "").unwrap();

    let files = list_file_paths(&source).unwrap();
    let bytes = pack(&files, &source).unwrap();

    let target = temp.path().join("target");
    std::fs::create_dir(&target).unwrap();
    let mut written = extract(&bytes, &target).unwrap();
    written.sort();

    assert_eq!(written, vec!["docs/deep/data.bin", "docs/guide.md", "empty.txt", "index.html"]);
    assert_eq!(snapshot(&source), snapshot(&target));
}

#[test]
fn test_pack_checks_containment_before_writing_anything() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("output");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(root.join("ok.txt"), "ok").unwrap();
    std::fs::write(temp.path().join("outside.txt"), "secret").unwrap();

    let result = pack(&[root.join("ok.txt"), temp.path().join("outside.txt")], &root);

    match result {
        Err(WorkspaceError::ContainmentViolation { path, root: r }) => {
            assert_eq!(path, temp.path().join("outside.txt"));
            assert_eq!(r, root);
        }
        other => panic!("expected ContainmentViolation, got {:?}", other.map(|b| b.len())),
    }
}
