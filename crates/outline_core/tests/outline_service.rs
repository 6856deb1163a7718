use outline_core::selectors::get_all_children;
use outline_core::{
    Context, ExportFormat, ExportOptions, Intent, MemoryThoughtStore, OutlineService,
    PathSegment, Rank, ServiceError, StoreError,
};

fn seeded_store(text: &str) -> MemoryThoughtStore {
    let mut service = OutlineService::open(MemoryThoughtStore::new()).unwrap();
    service.import_text(&Context::root(), text).unwrap();
    service.into_store()
}

fn create_under(context: &[&str], value: &str) -> Intent {
    Intent::CreateThought {
        context: Context::new(context.iter().copied()),
        value: value.to_string(),
        rank: Rank::from(5),
    }
}

#[test]
fn open_loads_only_root_records() {
    let store = seeded_store("- a\n  - b\n    - c");
    assert_eq!(store.parent_count(), 3);
    let loads_before = store.load_count();

    let service = OutlineService::open(store).unwrap();
    let a = service
        .state()
        .index()
        .parent(&Context::new(["a"]).hash())
        .unwrap();
    assert!(a.is_pending());
    assert_eq!(service.store().load_count(), loads_before + 1);
}

#[test]
fn apply_fetches_missing_ancestors_and_persists() {
    let store = seeded_store("- a\n  - b\n    - c");
    let mut service = OutlineService::open(store).unwrap();

    service.apply(&create_under(&["a", "b"], "d")).unwrap();

    let children = get_all_children(service.state(), &Context::new(["a", "b"]));
    let values: Vec<&str> = children.iter().map(|child| child.value.as_str()).collect();
    assert_eq!(values, vec!["c", "d"]);
    let stored = service.store().parent(&Context::new(["a", "b"])).unwrap();
    assert_eq!(stored.children.len(), 2);
    assert!(service.store().lexeme("d").is_some());
    assert!(service.check_integrity().unwrap().is_healthy());
}

#[test]
fn edit_after_reopen_moves_persisted_subtree() {
    let store = seeded_store("- a\n  - b\n    - c");
    let mut service = OutlineService::open(store).unwrap();

    service
        .apply(&Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "z".to_string(),
            path: vec![PathSegment::new("a", 0)],
        })
        .unwrap();

    let store = service.into_store();
    assert!(store.parent(&Context::new(["a"])).is_none());
    assert!(store.parent(&Context::new(["a", "b"])).is_none());
    assert!(store.lexeme("a").is_none());
    assert_eq!(
        store.lexeme("c").unwrap().contexts[0].context,
        Context::new(["z", "b"])
    );

    let mut service = OutlineService::open(store).unwrap();
    let exported = service
        .export(
            &Context::root(),
            ExportFormat::PlainText,
            &ExportOptions::default(),
        )
        .unwrap();
    assert_eq!(exported, "- __ROOT__\n  - z\n    - b\n      - c");
}

#[test]
fn unavailable_store_leaves_state_untouched() {
    let store = seeded_store("- a\n  - b");
    let mut service = OutlineService::open(store).unwrap();
    let version = service.version();

    service.store().set_unavailable(true);
    let err = service.apply(&create_under(&["a"], "x")).unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));
    assert_eq!(service.version(), version);

    service.store().set_unavailable(false);
    service.apply(&create_under(&["a"], "x")).unwrap();
    assert_eq!(
        get_all_children(service.state(), &Context::new(["a"])).len(),
        2
    );
}

#[test]
fn fetch_rounds_are_bounded() {
    let store = seeded_store("- a\n  - b\n    - c");
    let mut service = OutlineService::open(store)
        .unwrap()
        .with_max_fetch_rounds(1);

    let err = service.apply(&create_under(&["a", "b"], "d")).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::FetchLimitExceeded { rounds: 1, .. }
    ));
}

#[test]
fn reducer_errors_pass_through() {
    let mut service = OutlineService::open(MemoryThoughtStore::new()).unwrap();
    let err = service.apply(&create_under(&["missing"], "x")).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Reducer(outline_core::ReducerError::NotFound(_))
    ));
}

#[test]
fn partial_remote_record_is_refetched_until_complete() {
    let mut store = seeded_store("- a\n  - b");
    store.set_partial(&Context::new(["a"]), true);
    let mut service = OutlineService::open(store).unwrap().with_max_fetch_rounds(3);

    let err = service.apply(&create_under(&["a"], "x")).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::FetchLimitExceeded { rounds: 3, .. }
    ));
    let a = service
        .state()
        .index()
        .parent(&Context::new(["a"]).hash())
        .unwrap();
    assert!(a.is_pending());

    let mut store = service.into_store();
    store.set_partial(&Context::new(["a"]), false);
    let mut service = OutlineService::open(store).unwrap();
    service.apply(&create_under(&["a"], "x")).unwrap();
    let values: Vec<String> = get_all_children(service.state(), &Context::new(["a"]))
        .into_iter()
        .map(|child| child.value)
        .collect();
    assert_eq!(values, vec!["b".to_string(), "x".to_string()]);
}

fn stored_values(store: &MemoryThoughtStore, context: &[&str]) -> Vec<String> {
    let mut values: Vec<String> = store
        .parent(&Context::new(context.iter().copied()))
        .unwrap()
        .children
        .iter()
        .map(|child| child.value.clone())
        .collect();
    values.sort();
    values
}

fn export_all(service: &mut OutlineService<MemoryThoughtStore>) -> String {
    service
        .export(
            &Context::root(),
            ExportFormat::PlainText,
            &ExportOptions::default(),
        )
        .unwrap()
}

#[test]
fn rename_into_unloaded_sibling_keeps_stored_children() {
    let store = seeded_store("- a\n  - x\n- b\n  - y");
    let mut service = OutlineService::open(store).unwrap();

    service
        .apply(&Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "b".to_string(),
            path: vec![PathSegment::new("a", 0)],
        })
        .unwrap();

    let store = service.into_store();
    assert_eq!(stored_values(&store, &["b"]), vec!["x", "y"]);
    assert!(store.parent(&Context::new(["a"])).is_none());

    let mut service = OutlineService::open(store).unwrap();
    assert_eq!(
        export_all(&mut service),
        "- __ROOT__\n  - b\n    - y\n    - x\n  - b\n    - y\n    - x"
    );
    assert!(service.check_integrity().unwrap().is_healthy());
}

#[test]
fn move_into_unloaded_subtree_keeps_stored_children() {
    let store = seeded_store("- a\n  - x\n    - p\n- b\n  - x\n    - q");
    let mut service = OutlineService::open(store).unwrap();

    service
        .apply(&Intent::MoveThought {
            old_path: vec![PathSegment::new("a", 0), PathSegment::new("x", 0)],
            new_path: vec![PathSegment::new("b", 1), PathSegment::new("x", 5)],
        })
        .unwrap();

    let store = service.into_store();
    assert_eq!(stored_values(&store, &["b", "x"]), vec!["p", "q"]);
    assert!(store.parent(&Context::new(["a", "x"])).is_none());

    let mut service = OutlineService::open(store).unwrap();
    assert_eq!(
        export_all(&mut service),
        "- __ROOT__\n  - a\n  - b\n    - x\n      - q\n      - p\n    - x\n      - q\n      - p"
    );
    assert!(service.check_integrity().unwrap().is_healthy());
}
