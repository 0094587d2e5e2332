//! Normalizes implicit `Object` parents and validates the inheritance
//! graph: forbidden basic-type parents, unknown parents, cycles, and
//! the presence of `Main.main`. Reserved-name collisions (`SELF_TYPE`
//! or a built-in class name) are rejected earlier, while the class
//! table is still being built (see [`crate::class_table::build_class_table`]).

use crate::class_table::{is_basic_type, is_builtin_class, ClassTable};
use crate::errors::SemanticError;

/// Fills in `Object` for every user class without an explicit parent,
/// then validates the resulting graph. Built-in classes already carry
/// their correct parent and are left untouched.
pub fn normalize_and_validate(table: &mut ClassTable) -> Result<(), SemanticError> {
    let user_class_names: Vec<String> = table
        .classes
        .values()
        .filter(|c| !is_builtin_class(&c.name))
        .map(|c| c.name.clone())
        .collect();

    for name in &user_class_names {
        let class = table.get_mut(name).expect("just collected this name");
        if class.parent.is_none() {
            class.parent = Some("Object".to_string());
        }
    }

    for name in &user_class_names {
        let class = table.get(name).unwrap();
        let parent = class.parent.as_deref().unwrap();
        if is_basic_type(parent) {
            return Err(SemanticError::InheritsBasicType {
                line: class.line,
                class: class.name.clone(),
                parent: parent.to_string(),
            });
        }
        if !table.contains(parent) {
            return Err(SemanticError::UndefinedParent {
                line: class.line,
                class: class.name.clone(),
                parent: parent.to_string(),
            });
        }
    }

    for name in &user_class_names {
        check_no_cycle(table, name)?;
    }

    check_main(table)?;

    Ok(())
}

/// Floyd's tortoise-and-hare over the parent chain starting at `start`.
fn check_no_cycle(table: &ClassTable, start: &str) -> Result<(), SemanticError> {
    let parent_of = |name: &str| -> Option<String> {
        table.get(name).and_then(|c| c.parent.clone())
    };

    let mut slow = start.to_string();
    let mut fast = start.to_string();

    loop {
        slow = match parent_of(&slow) {
            Some(p) => p,
            None => return Ok(()),
        };

        fast = match parent_of(&fast).and_then(|p| parent_of(&p)) {
            Some(p) => p,
            None => return Ok(()),
        };

        if slow == fast {
            return Err(SemanticError::InheritanceCycle {
                class: start.to_string(),
            });
        }
    }
}

fn check_main(table: &ClassTable) -> Result<(), SemanticError> {
    let main_class = table.get("Main").ok_or(SemanticError::MissingMain)?;
    let has_main_method = main_class.features.iter().any(|f| {
        matches!(f, crate::ast::Feature::Method { name, formals, .. } if name.name == "main" && formals.is_empty())
    });
    if !has_main_method {
        return Err(SemanticError::MissingMainMethod);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Class, Program};
    use crate::class_table::build_class_table;

    fn class(name: &str, parent: Option<&str>) -> Class {
        Class {
            line: 1,
            name: name.to_string(),
            parent: parent.map(str::to_string),
            features: vec![],
        }
    }

    #[test]
    fn implicit_object_parent_filled_in() {
        let mut table = build_class_table(Program {
            classes: vec![class("Main", None)],
        })
        .unwrap();
        // Skip the Main-method check by adding `main`.
        let main = table.get_mut("Main").unwrap();
        main.features.push(crate::ast::Feature::Method {
            name: crate::ast::Ident::new(1, "main"),
            formals: vec![],
            return_type: crate::ast::DeclaredType::new(1, "Object"),
            body: crate::ast::Expr::new(1, crate::ast::ExprKind::IntConst(0)),
        });
        normalize_and_validate(&mut table).unwrap();
        assert_eq!(table.get("Main").unwrap().parent.as_deref(), Some("Object"));
    }

    #[test]
    fn rejects_inheritance_from_int() {
        let mut table = build_class_table(Program {
            classes: vec![class("C", Some("Int"))],
        })
        .unwrap();
        let err = normalize_and_validate(&mut table).unwrap_err();
        assert!(matches!(err, SemanticError::InheritsBasicType { .. }));
    }

    #[test]
    fn rejects_unknown_parent() {
        let mut table = build_class_table(Program {
            classes: vec![class("C", Some("Ghost"))],
        })
        .unwrap();
        let err = normalize_and_validate(&mut table).unwrap_err();
        assert!(matches!(err, SemanticError::UndefinedParent { .. }));
    }

    #[test]
    fn detects_cycle() {
        let mut table = build_class_table(Program {
            classes: vec![class("A", Some("B")), class("B", Some("A"))],
        })
        .unwrap();
        let err = normalize_and_validate(&mut table).unwrap_err();
        assert!(matches!(err, SemanticError::InheritanceCycle { .. }));
    }

    #[test]
    fn missing_main_is_reported() {
        let mut table = build_class_table(Program { classes: vec![] }).unwrap();
        let err = normalize_and_validate(&mut table).unwrap_err();
        assert!(matches!(err, SemanticError::MissingMain));
    }
}
