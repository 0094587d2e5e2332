//! Ancestor-chain computation and the least-upper-bound (`join` /
//! `join_case`) algorithms used to type `if`, `while`, and `case`.

use crate::ast::Type;
use crate::class_table::Hierarchy;

/// The chain from `Object` (inclusive) down to `class_name` (inclusive),
/// e.g. `ancestors(h, "C")` where `C < B < Object` returns
/// `["Object", "B", "C"]`.
pub fn ancestors(h: &Hierarchy, class_name: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(class_name.to_string());
    while let Some(name) = current {
        let is_object = name == "Object";
        chain.push(name.clone());
        if is_object {
            break;
        }
        current = h.parent_of(&name).map(str::to_string);
    }
    chain.reverse();
    chain
}

/// The least common ancestor of two types in the single-inheritance
/// tree. `SELF_TYPE` is resolved to its enclosing class before chain
/// construction; the two-`SELF_TYPE`-of-the-same-class case is kept as
/// `SELF_TYPE` rather than resolved away.
pub fn join(a: &Type, b: &Type, h: &Hierarchy) -> Type {
    if let (Type::SelfType { resolved: ra }, Type::SelfType { resolved: rb }) = (a, b) {
        if ra == rb {
            return Type::SelfType { resolved: ra.clone() };
        }
    }

    let na = a.lookup_name();
    let nb = b.lookup_name();

    if na == "Object" || nb == "Object" {
        return Type::named("Object");
    }
    if na == nb {
        return Type::named(na);
    }

    let mut chain_a = ancestors(h, na);
    let mut chain_b = ancestors(h, nb);
    while chain_a.len() > chain_b.len() {
        chain_a.pop();
    }
    while chain_b.len() > chain_a.len() {
        chain_b.pop();
    }

    loop {
        match (chain_a.last(), chain_b.last()) {
            (Some(x), Some(y)) if x == y => return Type::named(x.clone()),
            (Some(_), Some(_)) => {
                chain_a.pop();
                chain_b.pop();
            }
            _ => return Type::named("Object"),
        }
    }
}

/// The n-ary generalization of [`join`] used to type `case` branches.
/// If every branch's type was `SELF_TYPE`, the result is `SELF_TYPE`
/// resolved to the first branch's class; otherwise it is the matched
/// class name.
pub fn join_case(types: &[Type], h: &Hierarchy) -> Type {
    assert!(!types.is_empty(), "case must have at least one branch");

    if types.iter().any(|t| t.lookup_name() == "Object") {
        return Type::named("Object");
    }

    let all_self = types.iter().all(|t| matches!(t, Type::SelfType { .. }));

    let mut chains: Vec<Vec<String>> = types
        .iter()
        .map(|t| ancestors(h, t.lookup_name()))
        .collect();
    let min_len = chains.iter().map(Vec::len).min().unwrap();
    for chain in chains.iter_mut() {
        chain.truncate(min_len);
    }

    loop {
        let first_tip = chains[0].last().cloned().expect("chain never empties");
        if chains.iter().all(|c| c.last() == Some(&first_tip)) {
            return if all_self {
                types[0].clone()
            } else {
                Type::named(first_tip)
            };
        }
        for chain in chains.iter_mut() {
            chain.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::class_table::build_class_table;

    fn class(name: &str, parent: &str) -> crate::ast::Class {
        crate::ast::Class {
            line: 1,
            name: name.to_string(),
            parent: Some(parent.to_string()),
            features: vec![],
        }
    }

    fn table() -> Hierarchy {
        build_class_table(Program {
            classes: vec![
                class("A", "Object"),
                class("B", "A"),
                class("C", "A"),
                class("D", "B"),
            ],
        })
        .unwrap()
        .hierarchy()
    }

    #[test]
    fn ancestors_chain_is_root_first() {
        let t = table();
        assert_eq!(
            ancestors(&t, "D"),
            vec!["Object", "A", "B", "D"]
        );
    }

    #[test]
    fn join_of_siblings_is_common_parent() {
        let t = table();
        let result = join(&Type::named("B"), &Type::named("C"), &t);
        assert_eq!(result, Type::named("A"));
    }

    #[test]
    fn join_with_object_is_object() {
        let t = table();
        let result = join(&Type::named("D"), &Type::named("Object"), &t);
        assert_eq!(result, Type::named("Object"));
    }

    #[test]
    fn join_same_self_type_stays_self_type() {
        let t = table();
        let s = Type::SelfType {
            resolved: "D".to_string(),
        };
        assert_eq!(join(&s.clone(), &s, &t), s);
    }

    #[test]
    fn join_case_all_self_type_preserves_self_type() {
        let t = table();
        let s1 = Type::SelfType { resolved: "D".to_string() };
        let s2 = Type::SelfType { resolved: "D".to_string() };
        let result = join_case(&[s1.clone(), s2], &t);
        assert_eq!(result, s1);
    }

    #[test]
    fn join_case_mixed_falls_back_to_named() {
        let t = table();
        let result = join_case(&[Type::named("B"), Type::named("C"), Type::named("D")], &t);
        assert_eq!(result, Type::named("A"));
    }
}
