//! Builds the class table: the declared classes plus the five built-in
//! classes, with implicit `Object` parents filled in. Iteration over a
//! [`ClassTable`] is lexicographic by class name, which is also the
//! order the emitter writes the class/implementation/parent maps in.

use std::collections::BTreeMap;

use crate::ast::{Class, DeclaredType, Expr, ExprKind, Feature, Formal, Ident, Program};
use crate::errors::SemanticError;

pub struct ClassTable {
    pub(crate) classes: BTreeMap<String, Class>,
}

impl ClassTable {
    pub fn get(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Class> {
        self.classes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Lexicographic-by-name iteration, as required for every emitted
    /// map section.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Class)> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// A read-only snapshot of name -> parent, independent of the class
    /// table itself. Ancestor/conformance/LUB computations take this
    /// instead of `&ClassTable` so they can run alongside mutable access
    /// to a class's own feature bodies during type-checking.
    pub fn hierarchy(&self) -> Hierarchy {
        Hierarchy {
            parents: self
                .classes
                .iter()
                .map(|(name, class)| (name.clone(), class.parent.clone()))
                .collect(),
        }
    }
}

pub struct Hierarchy {
    parents: BTreeMap<String, Option<String>>,
}

impl Hierarchy {
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.parents.get(name).and_then(|p| p.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }
}

fn internal_body(line: u32, static_type: &str, payload: &str) -> Expr {
    let mut expr = Expr::new(line, ExprKind::Internal(payload.to_string()));
    expr.static_type = Some(crate::ast::Type::named(static_type));
    expr
}

fn method(name: &str, formals: Vec<Formal>, return_type: &str, internal: &str) -> Feature {
    Feature::Method {
        name: Ident::new(0, name),
        formals,
        return_type: DeclaredType::new(0, return_type),
        body: internal_body(0, return_type, internal),
    }
}

fn formal(name: &str, type_name: &str) -> Formal {
    Formal {
        name: Ident::new(0, name),
        declared_type: DeclaredType::new(0, type_name),
    }
}

fn builtin_object() -> Class {
    Class {
        line: 0,
        name: "Object".to_string(),
        parent: None,
        features: vec![
            method("abort", vec![], "Object", "Object.abort"),
            method("copy", vec![], "SELF_TYPE", "Object.copy"),
            method("type_name", vec![], "String", "Object.type_name"),
        ],
    }
}

fn builtin_io() -> Class {
    Class {
        line: 0,
        name: "IO".to_string(),
        parent: Some("Object".to_string()),
        features: vec![
            method("in_int", vec![], "Int", "IO.in_int"),
            method("in_string", vec![], "String", "IO.in_string"),
            method(
                "out_int",
                vec![formal("x", "Int")],
                "SELF_TYPE",
                "IO.out_int",
            ),
            method(
                "out_string",
                vec![formal("x", "String")],
                "SELF_TYPE",
                "IO.out_string",
            ),
        ],
    }
}

fn builtin_string() -> Class {
    Class {
        line: 0,
        name: "String".to_string(),
        parent: Some("Object".to_string()),
        features: vec![
            method(
                "concat",
                vec![formal("s", "String")],
                "String",
                "String.concat",
            ),
            method("length", vec![], "Int", "String.length"),
            method(
                "substr",
                vec![formal("i", "Int"), formal("l", "Int")],
                "String",
                "String.substr",
            ),
        ],
    }
}

fn builtin_int() -> Class {
    Class {
        line: 0,
        name: "Int".to_string(),
        parent: Some("Object".to_string()),
        features: vec![],
    }
}

fn builtin_bool() -> Class {
    Class {
        line: 0,
        name: "Bool".to_string(),
        parent: Some("Object".to_string()),
        features: vec![],
    }
}

pub fn builtin_classes() -> Vec<Class> {
    vec![
        builtin_object(),
        builtin_io(),
        builtin_string(),
        builtin_int(),
        builtin_bool(),
    ]
}

pub fn is_builtin_class(name: &str) -> bool {
    matches!(name, "Object" | "IO" | "String" | "Int" | "Bool")
}

pub fn is_basic_type(name: &str) -> bool {
    matches!(name, "Int" | "String" | "Bool")
}

/// True for a method declared on `Object` or `IO`. Used by the emitter to
/// decide whether overriding this name replaces its ancestor's entry in
/// place (these) or removes it and appends the override at the end
/// (everything else, including `String`'s own `length`/`concat`/`substr`).
pub fn is_builtin_method(name: &str) -> bool {
    matches!(
        name,
        "abort" | "copy" | "type_name" | "in_int" | "in_string" | "out_int" | "out_string"
    )
}

/// Merges the user program with the built-ins (implicit `Object` parent
/// is *not* filled in here; [`crate::inheritance`] does that after
/// validating the raw parent references). Rejects a user class reusing
/// a reserved name (`SELF_TYPE` or one of the five built-in class
/// names) before it can overwrite or coexist with the real built-in
/// entry in the map.
pub fn build_class_table(program: Program) -> Result<ClassTable, SemanticError> {
    let mut classes = BTreeMap::new();
    for class in builtin_classes() {
        classes.insert(class.name.clone(), class);
    }
    for class in program.classes {
        if class.name == "SELF_TYPE" || is_builtin_class(&class.name) {
            return Err(SemanticError::ReservedClassName {
                line: class.line,
                name: class.name.clone(),
                reserved: class.name,
            });
        }
        classes.insert(class.name.clone(), class);
    }
    Ok(ClassTable { classes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_present_and_lexicographic() {
        let table = build_class_table(Program { classes: vec![] }).unwrap();
        let names: Vec<_> = table.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["Bool", "IO", "Int", "Object", "String"]);
    }

    #[test]
    fn object_has_three_methods() {
        let table = build_class_table(Program { classes: vec![] }).unwrap();
        let object = table.get("Object").unwrap();
        assert_eq!(object.features.len(), 3);
    }

    #[test]
    fn user_class_overrides_nothing_by_default() {
        let user = Class {
            line: 1,
            name: "Main".to_string(),
            parent: None,
            features: vec![],
        };
        let table = build_class_table(Program {
            classes: vec![user],
        })
        .unwrap();
        assert_eq!(table.len(), 6);
        assert!(table.get("Main").unwrap().parent.is_none());
    }

    #[test]
    fn rejects_user_class_named_after_builtin() {
        let user = Class {
            line: 1,
            name: "Object".to_string(),
            parent: None,
            features: vec![],
        };
        let err = build_class_table(Program {
            classes: vec![user],
        })
        .unwrap_err();
        assert!(matches!(err, SemanticError::ReservedClassName { .. }));
    }

    #[test]
    fn rejects_user_class_named_self_type() {
        let user = Class {
            line: 1,
            name: "SELF_TYPE".to_string(),
            parent: None,
            features: vec![],
        };
        let err = build_class_table(Program {
            classes: vec![user],
        })
        .unwrap_err();
        assert!(matches!(err, SemanticError::ReservedClassName { .. }));
    }
}
