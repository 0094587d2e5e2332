//! The conformance relation `t1 <= t2`, used by assignment, dispatch
//! arguments, return types, and initializers.

use crate::ancestors::ancestors;
use crate::ast::Type;
use crate::class_table::{is_basic_type, Hierarchy};

pub fn conforms(t1: &Type, t2: &Type, h: &Hierarchy) -> bool {
    let n1 = t1.lookup_name();
    let n2 = t2.lookup_name();

    // Object only conforms to Object.
    if n1 == "Object" {
        return n2 == "Object";
    }

    // Nothing conforms to a basic type except itself.
    if is_basic_type(n2) {
        return n1 == n2;
    }

    if n1 == n2 {
        return true;
    }

    if n2 == "Object" {
        return true;
    }

    if let Type::SelfType { resolved } = t1 {
        if let Type::Named(target) = t2 {
            return resolved == target || ancestors(h, resolved).contains(target);
        }
    }

    if let Type::SelfType { resolved: r2 } = t2 {
        return matches!(t1, Type::SelfType { resolved } if resolved == r2);
    }

    ancestors(h, n1).contains(&n2.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::class_table::build_class_table;

    fn table() -> Hierarchy {
        build_class_table(Program {
            classes: vec![crate::ast::Class {
                line: 1,
                name: "A".to_string(),
                parent: Some("Object".to_string()),
                features: vec![],
            }],
        })
        .unwrap()
        .hierarchy()
    }

    #[test]
    fn reflexive() {
        let t = table();
        assert!(conforms(&Type::named("A"), &Type::named("A"), &t));
    }

    #[test]
    fn everything_conforms_to_object() {
        let t = table();
        assert!(conforms(&Type::named("A"), &Type::named("Object"), &t));
        assert!(conforms(&Type::named("Int"), &Type::named("Object"), &t));
    }

    #[test]
    fn nothing_but_self_conforms_to_a_basic_type() {
        let t = table();
        assert!(!conforms(&Type::named("A"), &Type::named("Int"), &t));
        assert!(conforms(&Type::named("Int"), &Type::named("Int"), &t));
    }

    #[test]
    fn self_type_conforms_to_own_ancestor() {
        let t = table();
        let self_a = Type::SelfType { resolved: "A".to_string() };
        assert!(conforms(&self_a, &Type::named("Object"), &t));
        assert!(conforms(&self_a, &Type::named("A"), &t));
    }

    #[test]
    fn named_type_never_conforms_to_self_type() {
        let t = table();
        let self_a = Type::SelfType { resolved: "A".to_string() };
        assert!(!conforms(&Type::named("A"), &self_a, &t));
    }

    #[test]
    fn object_conforms_only_to_object() {
        let t = table();
        assert!(!conforms(&Type::named("Object"), &Type::named("A"), &t));
    }
}
