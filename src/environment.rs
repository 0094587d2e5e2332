//! The object environment O and method environment M derived from the
//! class table. O is rebuilt per class as an `im::HashMap` so that
//! scoping it further for `let`, `case`, and method formals is a cheap,
//! structure-sharing extension rather than a deep copy; each extension
//! lives only for the recursive call that created it.

use std::collections::HashMap;

use crate::ancestors::ancestors;
use crate::ast::{Feature, Type};
use crate::class_table::ClassTable;
use crate::errors::SemanticError;

pub type ObjectEnv = im::HashMap<String, Type>;

#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub formal_types: Vec<String>,
    pub return_type_name: String,
}

pub struct MethodEnv {
    signatures: HashMap<(String, String), MethodSignature>,
}

impl MethodEnv {
    pub fn lookup(&self, class: &str, method: &str) -> Option<&MethodSignature> {
        self.signatures.get(&(class.to_string(), method.to_string()))
    }
}

/// Attributes visible inside `class_name`: every ancestor's attributes
/// (root first) followed by the class's own, checking for `self` as a
/// name and for redefinition.
pub fn build_object_env(table: &ClassTable, class_name: &str) -> Result<ObjectEnv, SemanticError> {
    let hierarchy = table.hierarchy();
    let mut env = ObjectEnv::new();
    for anc in ancestors(&hierarchy, class_name) {
        let anc_class = table.get(&anc).expect("ancestor must exist in class table");
        for feature in &anc_class.features {
            let (name, declared_type) = match feature {
                Feature::AttributeNoInit { name, declared_type } => (name, declared_type),
                Feature::AttributeInit {
                    name, declared_type, ..
                } => (name, declared_type),
                Feature::Method { .. } => continue,
            };
            if name.name == "self" {
                return Err(SemanticError::SelfNamedAttribute {
                    line: name.line,
                    class: class_name.to_string(),
                });
            }
            if env.contains_key(&name.name) {
                return Err(SemanticError::AttributeRedefined {
                    line: name.line,
                    class: class_name.to_string(),
                    attr: name.name.clone(),
                });
            }
            if let crate::ast::DeclaredTypeKind::Named(type_name) = &declared_type.kind {
                if !table.contains(type_name) {
                    return Err(SemanticError::UnknownType {
                        line: name.line,
                        type_name: type_name.clone(),
                    });
                }
            }
            env.insert(name.name.clone(), declared_type.resolve(class_name));
        }
    }
    Ok(env)
}

/// Method signatures visible per class, including inherited ones.
/// Overriding a name already visible from an ancestor requires an exact
/// match on formal count, each formal's type, and the return type.
pub fn build_method_env(table: &ClassTable) -> Result<MethodEnv, SemanticError> {
    let hierarchy = table.hierarchy();
    let mut signatures = HashMap::new();

    for (class_name, _) in table.iter() {
        let mut local: HashMap<String, (Vec<String>, String, u32, String)> = HashMap::new();

        for anc in ancestors(&hierarchy, class_name) {
            let anc_class = table.get(&anc).expect("ancestor must exist");
            for feature in &anc_class.features {
                let Feature::Method {
                    name,
                    formals,
                    return_type,
                    ..
                } = feature
                else {
                    continue;
                };

                for formal in formals {
                    if formal.name.name == "self" {
                        return Err(SemanticError::SelfNamedFormal {
                            line: formal.name.line,
                            method: name.name.clone(),
                        });
                    }
                }
                let mut seen_formals = std::collections::HashSet::new();
                for formal in formals {
                    if !seen_formals.insert(&formal.name.name) {
                        return Err(SemanticError::DuplicateFormal {
                            line: formal.name.line,
                            method: name.name.clone(),
                            formal: formal.name.name.clone(),
                        });
                    }
                    match &formal.declared_type.kind {
                        crate::ast::DeclaredTypeKind::Named(type_name) => {
                            if !table.contains(type_name) {
                                return Err(SemanticError::UnknownType {
                                    line: formal.name.line,
                                    type_name: type_name.clone(),
                                });
                            }
                        }
                        crate::ast::DeclaredTypeKind::SelfType => {
                            return Err(SemanticError::UnknownType {
                                line: formal.name.line,
                                type_name: "SELF_TYPE".to_string(),
                            });
                        }
                    }
                }
                if let crate::ast::DeclaredTypeKind::Named(type_name) = &return_type.kind {
                    if !table.contains(type_name) {
                        return Err(SemanticError::UnknownType {
                            line: name.line,
                            type_name: type_name.clone(),
                        });
                    }
                }

                let formal_types: Vec<String> =
                    formals.iter().map(|f| f.declared_type.as_str().to_string()).collect();
                let return_name = return_type.as_str().to_string();

                if let Some((prev_formals, prev_return, _, prev_owner)) = local.get(&name.name) {
                    if prev_formals.len() != formal_types.len() {
                        return Err(SemanticError::OverrideFormalCountMismatch {
                            line: name.line,
                            class: class_name.clone(),
                            method: name.name.clone(),
                            parent: prev_owner.clone(),
                        });
                    }
                    for (i, (expected, found)) in
                        prev_formals.iter().zip(formal_types.iter()).enumerate()
                    {
                        if expected != found {
                            return Err(SemanticError::OverrideFormalTypeMismatch {
                                line: name.line,
                                class: class_name.clone(),
                                method: name.name.clone(),
                                index: i,
                                expected: expected.clone(),
                                found: found.clone(),
                            });
                        }
                    }
                    if prev_return != &return_name {
                        return Err(SemanticError::OverrideReturnTypeMismatch {
                            line: name.line,
                            class: class_name.clone(),
                            method: name.name.clone(),
                            expected: prev_return.clone(),
                            found: return_name.clone(),
                        });
                    }
                }

                local.insert(
                    name.name.clone(),
                    (formal_types, return_name, name.line, anc.clone()),
                );
            }
        }

        for (method_name, (formal_types, return_type_name, _, _)) in local {
            signatures.insert(
                (class_name.clone(), method_name),
                MethodSignature {
                    formal_types,
                    return_type_name,
                },
            );
        }
    }

    Ok(MethodEnv { signatures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Class, DeclaredType, Expr, ExprKind, Feature, Ident, Program};
    use crate::class_table::build_class_table;

    fn attr(name: &str, ty: &str) -> Feature {
        Feature::AttributeNoInit {
            name: Ident::new(1, name),
            declared_type: DeclaredType::new(1, ty),
        }
    }

    #[test]
    fn object_env_collects_ancestors_then_own() {
        let table = build_class_table(Program {
            classes: vec![
                Class {
                    line: 1,
                    name: "A".to_string(),
                    parent: Some("Object".to_string()),
                    features: vec![attr("x", "Int")],
                },
                Class {
                    line: 2,
                    name: "B".to_string(),
                    parent: Some("A".to_string()),
                    features: vec![attr("y", "String")],
                },
            ],
        })
        .unwrap();
        let env = build_object_env(&table, "B").unwrap();
        assert_eq!(env.get("x"), Some(&Type::named("Int")));
        assert_eq!(env.get("y"), Some(&Type::named("String")));
    }

    #[test]
    fn rejects_self_named_attribute() {
        let table = build_class_table(Program {
            classes: vec![Class {
                line: 1,
                name: "A".to_string(),
                parent: Some("Object".to_string()),
                features: vec![attr("self", "Int")],
            }],
        })
        .unwrap();
        let err = build_object_env(&table, "A").unwrap_err();
        assert!(matches!(err, SemanticError::SelfNamedAttribute { .. }));
    }

    #[test]
    fn rejects_attribute_redefinition_across_inheritance() {
        let table = build_class_table(Program {
            classes: vec![
                Class {
                    line: 1,
                    name: "A".to_string(),
                    parent: Some("Object".to_string()),
                    features: vec![attr("x", "Int")],
                },
                Class {
                    line: 2,
                    name: "B".to_string(),
                    parent: Some("A".to_string()),
                    features: vec![attr("x", "String")],
                },
            ],
        })
        .unwrap();
        let err = build_object_env(&table, "B").unwrap_err();
        assert!(matches!(err, SemanticError::AttributeRedefined { .. }));
    }

    #[test]
    fn method_env_inherits_signature() {
        let table = build_class_table(Program { classes: vec![] }).unwrap();
        let m = build_method_env(&table).unwrap();
        let sig = m.lookup("IO", "out_string").unwrap();
        assert_eq!(sig.formal_types, vec!["String".to_string()]);
        assert_eq!(sig.return_type_name, "SELF_TYPE");
    }

    #[test]
    fn rejects_override_with_different_return_type() {
        let table = build_class_table(Program {
            classes: vec![
                Class {
                    line: 1,
                    name: "A".to_string(),
                    parent: Some("Object".to_string()),
                    features: vec![Feature::Method {
                        name: Ident::new(1, "f"),
                        formals: vec![],
                        return_type: DeclaredType::new(1, "Object"),
                        body: Expr::new(1, ExprKind::SelfExpr),
                    }],
                },
                Class {
                    line: 2,
                    name: "B".to_string(),
                    parent: Some("A".to_string()),
                    features: vec![Feature::Method {
                        name: Ident::new(2, "f"),
                        formals: vec![],
                        return_type: DeclaredType::new(2, "Int"),
                        body: Expr::new(2, ExprKind::IntConst(0)),
                    }],
                },
            ],
        })
        .unwrap();
        let err = build_method_env(&table).unwrap_err();
        assert!(matches!(err, SemanticError::OverrideReturnTypeMismatch { .. }));
    }
}
