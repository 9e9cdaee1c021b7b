//! End-to-end flush behaviour against recording and on-disk collaborators.

use async_trait::async_trait;
use castree_core::{
    Algorithm, ContentId, DirectoryObject, DirectoryRecord, Error, FileEntry, Link, MemoryStore,
    Persist, Persisted, Result, Store, TreeBuilder, flush_tree,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Persists in memory and remembers every call in order.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<(DirectoryObject, Persisted)>>,
    fail_on: Option<String>,
}

impl RecordingStore {
    fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(DirectoryObject, Persisted)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Persist for RecordingStore {
    async fn persist(&self, object: &DirectoryObject) -> Result<Persisted> {
        // Give siblings a chance to interleave.
        tokio::task::yield_now().await;

        if let Some(name) = &self.fail_on {
            if object.links().iter().any(|link| &link.name == name) {
                return Err(Error::Io {
                    source: std::io::Error::other("disk full"),
                });
            }
        }

        let persisted = self.inner.persist(object).await?;
        self.calls.lock().push((object.clone(), persisted));
        Ok(persisted)
    }
}

fn cid(s: &str) -> ContentId {
    ContentId::hash_bytes(s.as_bytes())
}

fn records(sink: Mutex<Vec<DirectoryRecord>>) -> Vec<DirectoryRecord> {
    sink.into_inner()
}

#[tokio::test]
async fn single_top_level_file_has_no_root() {
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());

    let root = flush_tree(&[FileEntry::new("a.txt", 5, cid("x"))], &store, &sink)
        .await
        .unwrap();

    assert_eq!(root, None);
    assert!(store.calls().is_empty());
    assert!(records(sink).is_empty());
}

#[tokio::test]
async fn single_directory_is_the_root() {
    let (x, y) = (cid("x"), cid("y"));
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());

    let root = flush_tree(
        &[
            FileEntry::new("foo/bar.txt", 10, x),
            FileEntry::new("foo/baz.txt", 20, y),
        ],
        &store,
        &sink,
    )
    .await
    .unwrap()
    .unwrap();

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0.links(),
        &[
            Link::new("bar.txt", 10, x).unwrap(),
            Link::new("baz.txt", 20, y).unwrap(),
        ]
    );
    assert_eq!(root, calls[0].1.cid);
    assert!(records(sink).is_empty());
}

#[tokio::test]
async fn nested_directories_flush_bottom_up() {
    let x = cid("x");
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());

    let root = flush_tree(&[FileEntry::new("a/b/c.txt", 1, x)], &store, &sink)
        .await
        .unwrap()
        .unwrap();

    let calls = store.calls();
    assert_eq!(calls.len(), 2);

    let (b_object, b) = &calls[0];
    assert_eq!(b_object.links(), &[Link::new("c.txt", 1, x).unwrap()]);

    let (a_object, a) = &calls[1];
    assert_eq!(a_object.links(), &[Link::new("b", b.size, b.cid).unwrap()]);
    assert_eq!(root, a.cid);

    assert_eq!(
        records(sink),
        vec![DirectoryRecord {
            path: "a/b".to_string(),
            size: b.size,
            cid: b.cid,
        }]
    );
}

#[tokio::test]
async fn multiple_roots_fail_before_persisting() {
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());

    let result = flush_tree(
        &[
            FileEntry::new("a/x.txt", 1, cid("x")),
            FileEntry::new("b/y.txt", 2, cid("y")),
        ],
        &store,
        &sink,
    )
    .await;

    match result {
        Err(Error::MultipleRoots { roots }) => assert_eq!(roots, vec!["a", "b"]),
        other => panic!("expected MultipleRoots, got {:?}", other),
    }
    assert!(store.calls().is_empty());
    assert!(records(sink).is_empty());
}

fn wide_tree() -> Vec<FileEntry> {
    [
        "proj/README",
        "proj/src/lib.rs",
        "proj/src/util/mod.rs",
        "proj/src/util/io.rs",
        "proj/src/util/deep/er/leaf.rs",
        "proj/docs/guide.md",
        "proj/docs/img/logo.png",
        "proj/tests/it.rs",
    ]
    .iter()
    .map(|p| FileEntry::new(*p, p.len() as u64 * 3, cid(p)))
    .collect()
}

#[tokio::test]
async fn every_directory_persisted_once_and_reported_once() {
    let entries = wide_tree();
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());

    let root = flush_tree(&entries, &store, &sink).await.unwrap().unwrap();

    let (_, tree) = TreeBuilder::build(&entries)
        .unwrap()
        .into_root()
        .unwrap()
        .unwrap();
    let calls = store.calls();
    assert_eq!(calls.len(), tree.directory_count());
    assert_eq!(calls.last().unwrap().1.cid, root);

    let mut paths: Vec<_> = records(sink).into_iter().map(|r| r.path).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "proj/docs",
            "proj/docs/img",
            "proj/src",
            "proj/src/util",
            "proj/src/util/deep",
            "proj/src/util/deep/er",
            "proj/tests",
        ]
    );
}

#[tokio::test]
async fn parents_persist_after_all_descendants() {
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());
    flush_tree(&wide_tree(), &store, &sink).await.unwrap();

    let calls = store.calls();
    let position: HashMap<ContentId, usize> = calls
        .iter()
        .enumerate()
        .map(|(i, (_, p))| (p.cid, i))
        .collect();

    for (i, (object, _)) in calls.iter().enumerate() {
        for link in object.links() {
            if let Some(&child) = position.get(&link.cid) {
                assert!(child < i, "{} persisted before its child", i);
            }
        }
    }
}

#[tokio::test]
async fn link_sizes_come_from_children() {
    let store = RecordingStore::default();
    let sink = Mutex::new(Vec::new());
    flush_tree(&wide_tree(), &store, &sink).await.unwrap();

    let sizes: HashMap<ContentId, u64> = wide_tree()
        .into_iter()
        .map(|e| (e.cid, e.size))
        .chain(store.calls().into_iter().map(|(_, p)| (p.cid, p.size)))
        .collect();

    for (object, _) in store.calls() {
        for link in object.links() {
            assert_eq!(Some(&link.size), sizes.get(&link.cid), "link {}", link.name);
        }
    }
}

#[tokio::test]
async fn persist_failure_aborts_the_whole_tree() {
    let mut entries = wide_tree();
    entries.push(FileEntry::new("proj/src/util/deep/poison", 1, cid("poison")));

    let store = RecordingStore::failing_on("poison");
    let sink = Mutex::new(Vec::new());

    match flush_tree(&entries, &store, &sink).await {
        Err(Error::Persist { path, source }) => {
            assert_eq!(path, "proj/src/util/deep");
            assert!(matches!(*source, Error::Io { .. }));
        }
        other => panic!("expected Persist error, got {:?}", other),
    }

    // No ancestor of the failed directory was persisted or reported.
    let persisted_names: HashSet<String> = store
        .calls()
        .iter()
        .flat_map(|(object, _)| object.links().iter().map(|l| l.name.clone()))
        .collect();
    assert!(!persisted_names.contains("deep"));
    assert!(!persisted_names.contains("util"));
    assert!(!persisted_names.contains("src"));

    let paths: Vec<_> = records(sink).into_iter().map(|r| r.path).collect();
    assert!(!paths.iter().any(|p| p == "proj/src" || p == "proj/src/util"));
}

#[tokio::test]
async fn oversized_directory_fails_instead_of_wrapping() {
    let half = u64::MAX / 2 + 1;
    let entries = vec![
        FileEntry::new("d/a", half, cid("a")),
        FileEntry::new("d/b", half, cid("b")),
    ];
    let store = MemoryStore::new();
    let sink = Mutex::new(Vec::new());

    match flush_tree(&entries, &store, &sink).await {
        Err(Error::Persist { path, source }) => {
            assert_eq!(path, "d");
            assert!(matches!(*source, Error::SizeOverflow { links: 2 }));
        }
        other => panic!("expected Persist error, got {:?}", other),
    }
    assert!(store.is_empty());
    assert!(records(sink).is_empty());
}

#[tokio::test]
async fn records_stream_through_a_channel() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let store = MemoryStore::new();

    let root = flush_tree(&wide_tree(), &store, &tx).await.unwrap().unwrap();
    drop(tx);

    let mut received = Vec::new();
    while let Some(record) = rx.recv().await {
        assert!(store.get(&record.cid).is_some());
        received.push(record);
    }
    assert_eq!(received.len(), 7);
    assert!(received.iter().all(|r| r.cid != root));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flushes_into_an_on_disk_store() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();

    let source = temp_dir.path().join("site");
    std::fs::create_dir_all(source.join("assets/css")).unwrap();
    std::fs::write(source.join("index.html"), b"<html></html>").unwrap();
    std::fs::write(source.join("assets/css/site.css"), b"body {}").unwrap();
    std::fs::write(source.join("assets/app.js"), b"main()").unwrap();

    let entries = store.collect_entries(&source).unwrap();
    let sink = Mutex::new(Vec::new());
    let root = flush_tree(&entries, &store, &sink).await.unwrap().unwrap();

    let root_dir = store.get_directory(&root).unwrap();
    let names: Vec<_> = root_dir.links().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["assets", "index.html"]);

    for record in records(sink) {
        assert!(store.contains(&record.cid), "{} missing", record.path);
    }

    // The same content flushed in memory yields the same root.
    let memory = MemoryStore::new();
    let dry = flush_tree(&entries, &memory, &Mutex::new(Vec::<DirectoryRecord>::new()))
        .await
        .unwrap();
    assert_eq!(dry, Some(root));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

        /// One persist per directory, one record per non-root directory, and
        /// the root is the last object persisted.
        #[test]
        fn prop_flush_is_complete(
            paths in prop::collection::btree_set(
                prop::collection::vec("[a-d]{1,2}", 0..4).prop_map(|p| {
                    let mut parts = p;
                    parts.push("file.bin".to_string());
                    parts.join("/")
                }),
                1..24,
            )
        ) {
            let entries: Vec<_> = paths
                .iter()
                .map(|p| FileEntry::new(format!("r/{}", p), p.len() as u64, cid(p)))
                .collect();
            let (_, tree) = TreeBuilder::build(&entries)?.into_root()?.expect("single root");

            let store = RecordingStore::default();
            let sink = Mutex::new(Vec::new());
            let root = run(flush_tree(&entries, &store, &sink))?.expect("root");

            let calls = store.calls();
            prop_assert_eq!(calls.len(), tree.directory_count());
            prop_assert_eq!(calls.last().map(|(_, p)| p.cid), Some(root));
            prop_assert_eq!(records(sink).len(), tree.directory_count() - 1);
        }

        /// Distinct top-level names always fail without persisting.
        #[test]
        fn prop_multiple_roots_never_persist(
            roots in prop::collection::btree_set("[a-z]{1,4}", 2..5)
        ) {
            let entries: Vec<_> = roots
                .iter()
                .map(|r| FileEntry::new(format!("{}/f", r), 1, cid(r)))
                .collect();
            let store = RecordingStore::default();
            let sink = Mutex::new(Vec::<DirectoryRecord>::new());
            let result = run(flush_tree(&entries, &store, &sink));
            prop_assert!(
                matches!(result, Err(Error::MultipleRoots { .. })),
                "expected MultipleRoots"
            );
            prop_assert!(store.calls().is_empty());
        }
    }
}
