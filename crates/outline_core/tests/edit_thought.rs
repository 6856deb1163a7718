use outline_core::selectors::{get_contexts, get_parent, get_thought};
use outline_core::{
    assert_integrity, export_context, hash_thought, import_text, reduce, Context, ExportFormat,
    ExportOptions, Intent, Path, PathSegment, ReducerError, State,
};

fn import(state: &State, text: &str) -> State {
    import_text(state, &Context::root(), text).unwrap().state
}

fn export(state: &State) -> String {
    export_context(
        state,
        &Context::root(),
        ExportFormat::PlainText,
        &ExportOptions::default(),
    )
    .unwrap()
}

fn seg(value: &str, rank: i32) -> PathSegment {
    PathSegment::new(value, rank)
}

fn edit(state: &State, context: &[&str], old_value: &str, new_value: &str, path: Path) -> State {
    let context = if context.is_empty() {
        Context::root()
    } else {
        Context::new(context.iter().copied())
    };
    let transition = reduce(
        state,
        &Intent::EditThought {
            context,
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            path,
        },
    )
    .unwrap();
    assert_integrity(&transition.state).unwrap();
    transition.state
}

#[test]
fn edit_top_level_thought() {
    let state = import(&State::new(), "- a\n- b");
    let state = edit(&state, &[], "a", "aa", vec![seg("a", 0)]);

    assert_eq!(export(&state), "- __ROOT__\n  - aa\n  - b");
    assert!(get_thought(&state, "a").is_none());
    let contexts = get_contexts(&state, "aa");
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].context, Context::root());
}

#[test]
fn edit_descendant() {
    let state = import(&State::new(), "- a\n  - b\n- c");
    let state = edit(&state, &["a"], "b", "aa", vec![seg("a", 0), seg("b", 0)]);

    assert_eq!(export(&state), "- __ROOT__\n  - a\n    - aa\n  - c");
    assert!(get_thought(&state, "b").is_none());
    assert_eq!(get_contexts(&state, "aa")[0].context, Context::new(["a"]));
}

#[test]
fn edit_carries_descendants_to_new_context() {
    let state = import(&State::new(), "- a\n  - b\n    - c");
    let state = edit(&state, &[], "a", "aa", vec![seg("a", 0)]);

    assert_eq!(export(&state), "- __ROOT__\n  - aa\n    - b\n      - c");
    assert!(get_parent(&state, &Context::new(["a"])).is_none());
    assert!(get_parent(&state, &Context::new(["a", "b"])).is_none());
    assert_eq!(get_contexts(&state, "b")[0].context, Context::new(["aa"]));
    assert_eq!(get_contexts(&state, "c")[0].context, Context::new(["aa", "b"]));
}

#[test]
fn edit_one_of_multiple_contexts() {
    let state = import(&State::new(), "- a\n  - ab\n- b\n  - ab");
    let state = edit(&state, &["a"], "ab", "abc", vec![seg("a", 0), seg("ab", 0)]);

    assert_eq!(
        export(&state),
        "- __ROOT__\n  - a\n    - abc\n  - b\n    - ab"
    );
    let remaining = get_contexts(&state, "ab");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].context, Context::new(["b"]));
    assert_eq!(get_contexts(&state, "abc")[0].context, Context::new(["a"]));
}

#[test]
fn edit_into_value_that_exists_elsewhere() {
    let state = import(&State::new(), "- a\n  - ab\n- b\n  - ac");
    let state = edit(&state, &["a"], "ab", "ac", vec![seg("a", 0), seg("ab", 0)]);

    assert!(get_thought(&state, "ab").is_none());
    let contexts = get_contexts(&state, "ac");
    assert_eq!(contexts.len(), 2);
}

#[test]
fn edit_child_to_parent_value() {
    let state = import(&State::new(), "- a\n  - b");
    let state = edit(&state, &["a"], "b", "a", vec![seg("a", 0), seg("b", 0)]);

    assert_eq!(export(&state), "- __ROOT__\n  - a\n    - a");
    assert_eq!(get_contexts(&state, "a").len(), 2);
}

#[test]
fn editing_back_does_not_duplicate() {
    let state = import(&State::new(), "- a\n  - b");
    let state = edit(&state, &[], "a", "ab", vec![seg("a", 0)]);
    let state = edit(&state, &[], "ab", "a", vec![seg("ab", 0)]);

    assert_eq!(export(&state), "- __ROOT__\n  - a\n    - b");
    assert_eq!(get_contexts(&state, "a").len(), 1);
    assert_eq!(get_contexts(&state, "b").len(), 1);
}

#[test]
fn edit_keeps_shared_leaf_consistent() {
    let state = import(&State::new(), "- a\n  - b\n    - d\n  - d");
    let state = edit(&state, &[], "a", "ac", vec![seg("a", 0)]);

    assert_eq!(
        export(&state),
        "- __ROOT__\n  - ac\n    - b\n      - d\n    - d"
    );
    let mut contexts: Vec<Context> = get_contexts(&state, "d")
        .into_iter()
        .map(|entry| entry.context)
        .collect();
    contexts.sort_by_key(Context::len);
    assert_eq!(contexts, vec![Context::new(["ac"]), Context::new(["ac", "b"])]);
}

#[test]
fn edit_empty_thought_with_repeated_grandchildren() {
    let state = import(&State::new(), "-\n  - a\n    - m\n  - b\n    - m");
    let state = edit(&state, &[], "", "x", vec![seg("", 0)]);

    assert_eq!(
        export(&state),
        "- __ROOT__\n  - x\n    - a\n      - m\n    - b\n      - m"
    );
    assert_eq!(get_contexts(&state, "m").len(), 2);
}

#[test]
fn edit_descendant_into_existing_sibling_value() {
    let state = import(&State::new(), "- a\n  - ac\n  - b\n    - ab");
    let state = edit(
        &state,
        &["a", "b"],
        "ab",
        "ac",
        vec![seg("a", 0), seg("b", 1), seg("ab", 0)],
    );

    assert!(get_thought(&state, "ab").is_none());
    assert_eq!(get_contexts(&state, "ac").len(), 2);
}

#[test]
fn edit_descendant_sharing_ancestor_value() {
    let state = import(&State::new(), "- a\n  - b\n    - a");
    let state = edit(
        &state,
        &["a", "b"],
        "a",
        "ac",
        vec![seg("a", 0), seg("b", 0), seg("a", 0)],
    );

    assert_eq!(export(&state), "- __ROOT__\n  - a\n    - b\n      - ac");
    assert_eq!(get_contexts(&state, "a").len(), 1);
}

#[test]
fn case_only_edit_keeps_keys() {
    let state = import(&State::new(), "- a\n  - b");
    let transition = reduce(
        &state,
        &Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "A".to_string(),
            path: vec![seg("a", 0)],
        },
    )
    .unwrap();

    let state = transition.state;
    assert!(transition.delta.parents.values().all(Option::is_some));
    assert_eq!(export(&state), "- __ROOT__\n  - A\n    - b");
    assert_eq!(get_thought(&state, "a").unwrap().value, "A");
    assert!(get_parent(&state, &Context::new(["A"])).is_some());
    assert_integrity(&state).unwrap();
}

#[test]
fn edit_with_duplicate_sibling_copies_subtree() {
    let state = import(&State::new(), "- a\n  - x\n- a");
    let state = edit(&state, &[], "a", "b", vec![seg("a", 0)]);

    assert_eq!(
        export(&state),
        "- __ROOT__\n  - b\n    - x\n  - a\n    - x"
    );
    let original = get_parent(&state, &Context::new(["a"])).unwrap();
    let copied = get_parent(&state, &Context::new(["b"])).unwrap();
    assert_ne!(original.children[0].id, copied.children[0].id);
}

#[test]
fn edit_rebases_cursor() {
    let state = import(&State::new(), "- a\n  - b");
    let state = reduce(
        &state,
        &Intent::SetCursor {
            path: Some(vec![seg("a", 0), seg("b", 0)]),
        },
    )
    .unwrap()
    .state;
    let state = edit(&state, &[], "a", "aa", vec![seg("a", 0)]);

    assert_eq!(state.cursor().unwrap(), &vec![seg("aa", 0), seg("b", 0)]);
}

#[test]
fn edit_path_must_address_old_value() {
    let state = import(&State::new(), "- a\n- b");
    let before = state.version();
    let err = reduce(
        &state,
        &Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "c".to_string(),
            path: vec![seg("b", 1)],
        },
    )
    .unwrap_err();

    assert!(matches!(err, ReducerError::Precondition(_)));
    assert_eq!(state.version(), before);
}

#[test]
fn edit_missing_thought_is_not_found() {
    let state = import(&State::new(), "- a");
    let err = reduce(
        &state,
        &Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "c".to_string(),
            path: vec![seg("a", 7)],
        },
    )
    .unwrap_err();
    assert!(matches!(err, ReducerError::NotFound(_)));
}

#[test]
fn rename_updates_every_descendant_once() {
    let state = import(&State::new(), "- a\n  - b\n    - c\n  - d");
    let transition = reduce(
        &state,
        &Intent::EditThought {
            context: Context::root(),
            old_value: "a".to_string(),
            new_value: "aa".to_string(),
            path: vec![seg("a", 0)],
        },
    )
    .unwrap();
    let delta = &transition.delta;

    // Three descendants plus the renamed thought; the old lexeme is dropped.
    let upserted: Vec<_> = delta
        .lexemes
        .iter()
        .filter(|(_, record)| record.is_some())
        .map(|(key, _)| *key)
        .collect();
    assert_eq!(upserted.len(), 4);
    for value in ["aa", "b", "c", "d"] {
        assert!(upserted.contains(&hash_thought(value)), "{value} not updated");
    }
    assert_eq!(delta.lexemes.get(&hash_thought("a")), Some(&None));

    assert_eq!(delta.parents.len(), 5);
    for removed in [Context::new(["a"]), Context::new(["a", "b"])] {
        assert_eq!(delta.parents.get(&removed.hash()), Some(&None));
    }
    for written in [Context::root(), Context::new(["aa"]), Context::new(["aa", "b"])] {
        assert!(matches!(delta.parents.get(&written.hash()), Some(Some(_))));
    }
    assert_integrity(&transition.state).unwrap();
}
