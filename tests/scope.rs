use steplisp::{
    diagnostics::EvalError,
    expr::{Function, Lambda},
    stdlib::SpecialForm,
    Expr, ScopeArena,
};

#[test]
fn lookup_walks_outward_to_the_root() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    let middle = scopes.child(root);
    let leaf = scopes.child(middle);

    scopes.define(root, "a", Expr::Number(1.0));
    scopes.define(middle, "b", Expr::Number(2.0));

    assert!(scopes.contains(leaf, "a"));
    assert!(scopes.contains(leaf, "b"));
    assert!(!scopes.contains(root, "b"));
    assert_eq!(scopes.lookup(leaf, "a"), Ok(Expr::Number(1.0)));
    assert_eq!(scopes.parent(leaf), Some(middle));
    assert_eq!(scopes.parent(root), None);
}

#[test]
fn child_bindings_shadow_and_vanish_with_the_child() {
    let mut scopes = ScopeArena::new();
    let parent = scopes.root();
    scopes.define(parent, "x", Expr::Number(1.0));

    let child = scopes.child(parent);
    scopes.define(child, "x", Expr::Number(2.0));
    assert_eq!(scopes.lookup(child, "x"), Ok(Expr::Number(2.0)));
    assert_eq!(scopes.lookup(parent, "x"), Ok(Expr::Number(1.0)));

    assert_eq!(scopes.release(child), 1);
    assert_eq!(scopes.lookup(parent, "x"), Ok(Expr::Number(1.0)));
}

#[test]
fn define_never_writes_into_an_ancestor() {
    let mut scopes = ScopeArena::new();
    let parent = scopes.root();
    let child = scopes.child(parent);
    scopes.define(parent, "x", Expr::Boolean(true));
    scopes.define(child, "x", Expr::Boolean(false));
    assert_eq!(scopes.lookup(parent, "x"), Ok(Expr::Boolean(true)));
}

#[test]
fn lookup_of_unbound_name_fails() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    assert_eq!(
        scopes.lookup(root, "ghost"),
        Err(EvalError::UndefinedSymbol {
            name: "ghost".to_string()
        })
    );
}

#[test]
fn lookup_hands_out_independent_copies() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    scopes.define(root, "n", Expr::Number(3.0));
    let copy = scopes.lookup(root, "n").expect("bound");
    drop(copy);
    assert_eq!(scopes.get(root, "n"), Some(&Expr::Number(3.0)));
}

#[test]
fn release_tears_down_the_whole_subtree() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    let a = scopes.child(root);
    let b = scopes.child(a);
    let c = scopes.child(b);
    let sibling = scopes.child(root);
    assert_eq!(scopes.live(), 5);

    assert_eq!(scopes.release(a), 3);
    assert_eq!(scopes.live(), 2);
    assert!(!scopes.is_live(c));
    assert!(scopes.is_live(sibling));
    assert_eq!(scopes.release(a), 0);
}

#[test]
fn stale_handles_do_not_alias_reused_slots() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    let old = scopes.child(root);
    scopes.define(old, "v", Expr::Number(1.0));
    scopes.release(old);

    let fresh = scopes.child(root);
    assert_eq!(fresh.index(), old.index());
    scopes.define(fresh, "v", Expr::Number(2.0));

    assert!(!scopes.contains(old, "v"));
    scopes.define(old, "w", Expr::Number(3.0));
    assert!(!scopes.contains(fresh, "w"));
    assert_eq!(scopes.lookup(fresh, "v"), Ok(Expr::Number(2.0)));
}

#[test]
fn collect_keeps_only_what_roots_and_bindings_reach() {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();
    let captured = scopes.child(root);
    let frame = scopes.child(captured);
    let orphan = scopes.child(root);
    let orphan_child = scopes.child(orphan);
    let held = scopes.child(root);

    scopes.define(
        root,
        "f",
        Expr::Function(Function::Lambda(Lambda {
            name: Some("f".to_string()),
            params: vec!["x".to_string()],
            body: "(g x)".to_string(),
            scope: frame,
        })),
    );
    let value = Expr::Tuple(vec![Expr::Function(Function::Form {
        form: SpecialForm::If,
        scope: held,
    })]);

    assert_eq!(scopes.collect(&[root], &[&value]), 2);
    assert!(scopes.is_live(frame));
    assert!(scopes.is_live(captured));
    assert!(scopes.is_live(held));
    assert!(!scopes.is_live(orphan));
    assert!(!scopes.is_live(orphan_child));

    assert_eq!(scopes.collect(&[root], &[]), 1);
    assert!(!scopes.is_live(held));
    assert_eq!(scopes.live(), 3);
}
