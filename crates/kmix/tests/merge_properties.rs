use kmix::tree::ValueTree;
use kmix::value::{Key, Mapping, Value};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn value() -> impl Strategy<Value = Value> {
    // NaN would break equality, so no decimals here
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        "[a-z]{0,4}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            mapping(inner).prop_map(Value::Object),
        ]
    })
}

/// few distinct keys, so trees overlap a lot
fn mapping(values: impl Strategy<Value = Value>) -> impl Strategy<Value = Mapping> {
    prop::collection::vec(("[a-d]", values), 0..5).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| (Key::String(key), value))
            .collect()
    })
}

fn tree() -> impl Strategy<Value = ValueTree> {
    mapping(value()).prop_map(ValueTree::from)
}

/// Trees where `a` and `b` always hold objects and `c` and `d` never do
///
/// An object replaced by a scalar and then merged with another object again loses its old
/// keys only when the scalar is merged first, so merge is associative on these trees only.
fn shaped_tree(depth: u32) -> BoxedStrategy<ValueTree> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        prop::collection::vec(any::<i64>().prop_map(Value::Integer), 0..3).prop_map(Value::Array),
    ];
    let object = if depth == 0 {
        Just(Value::Object(Mapping::new())).boxed()
    } else {
        shaped_tree(depth - 1).prop_map(Value::from).boxed()
    };

    (
        prop::option::of(object.clone()),
        prop::option::of(object),
        prop::option::of(leaf.clone()),
        prop::option::of(leaf),
    )
        .prop_map(|(a, b, c, d)| {
            let mut mapping = Mapping::new();
            for (key, value) in [("a", a), ("b", b), ("c", c), ("d", d)] {
                if let Some(value) = value {
                    mapping.insert(Key::from(key), value);
                }
            }
            ValueTree::from(mapping)
        })
        .boxed()
}

/// dotted paths of all values that are not objects
fn leaves(mapping: &Mapping, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in mapping {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(inner) => leaves(inner, &path, out),
            other => out.push((path, other.clone())),
        }
    }
}

/// `later` defines `path` itself, or replaces one of its parents with a non-object
fn shadows(later: &ValueTree, path: &str) -> bool {
    if later.lookup(path).is_some() {
        return true;
    }

    let segments: Vec<&str> = path.split('.').collect();
    (1..segments.len()).any(|len| {
        matches!(
            later.lookup(&segments[..len].join(".")),
            Some(value) if !matches!(value, Value::Object(_))
        )
    })
}

fn key_set(tree: &ValueTree) -> BTreeSet<String> {
    tree.keys().map(ToString::to_string).collect()
}

proptest! {
    #[test]
    fn empty_tree_is_identity(a in tree()) {
        prop_assert_eq!(a.merge(&ValueTree::new()), a.clone());
        prop_assert_eq!(ValueTree::new().merge(&a), a);
    }

    #[test]
    fn merging_twice_changes_nothing(a in tree(), b in tree()) {
        let once = a.merge(&b);
        prop_assert_eq!(once.merge(&b), once);
    }

    #[test]
    fn keys_are_the_union(a in tree(), b in tree(), c in tree()) {
        let merged = a.merge(&b.merge(&c));

        let mut expected = key_set(&a);
        expected.extend(key_set(&b));
        expected.extend(key_set(&c));

        prop_assert_eq!(key_set(&merged), expected);
    }

    #[test]
    fn merge_is_associative_for_consistent_shapes(
        a in shaped_tree(2),
        b in shaped_tree(2),
        c in shaped_tree(2),
    ) {
        prop_assert_eq!(a.merge(&b.merge(&c)), a.merge(&b).merge(&c));
    }

    #[test]
    fn right_most_leaf_wins(a in tree(), b in tree(), c in tree()) {
        let merged = a.merge(&b.merge(&c));
        let operands = [&a, &b, &c];

        for (position, operand) in operands.iter().enumerate() {
            let mut own = vec![];
            leaves(operand.as_mapping(), "", &mut own);

            for (path, value) in own {
                if operands[position + 1..].iter().any(|later| shadows(later, &path)) {
                    continue;
                }
                prop_assert_eq!(merged.lookup(&path), Some(&value), "path {}", path);
            }
        }
    }
}
