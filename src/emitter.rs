//! Writes the four `.cl-type` sections: class_map, implementation_map,
//! parent_map, and the annotated AST. Every map iterates the class
//! table in lexicographic order; only the annotated AST preserves the
//! program's original declaration order.

use std::fmt::Write as _;

use crate::ancestors::ancestors;
use crate::ast::{
    CaseBranch, Class, DeclaredTypeKind, Expr, ExprKind, Feature, LetBinding, Program,
};
use crate::class_table::{is_builtin_method, ClassTable, Hierarchy};

pub fn emit(table: &ClassTable, program: &Program) -> String {
    let hierarchy = table.hierarchy();
    let mut out = String::new();
    emit_class_map(table, &mut out);
    emit_implementation_map(table, &hierarchy, &mut out);
    emit_parent_map(table, &mut out);
    emit_annotated_program(program, &mut out);
    out
}

fn emit_class_map(table: &ClassTable, out: &mut String) {
    writeln!(out, "class_map").unwrap();
    writeln!(out, "{}", table.len()).unwrap();
    for (name, class) in table.iter() {
        writeln!(out, "{name}").unwrap();
        let attrs: Vec<&Feature> = class
            .features
            .iter()
            .filter(|f| !f.is_method())
            .collect();
        writeln!(out, "{}", attrs.len()).unwrap();
        for attr in attrs {
            match attr {
                Feature::AttributeNoInit { name, declared_type } => {
                    writeln!(out, "no_initializer").unwrap();
                    writeln!(out, "{}", name.name).unwrap();
                    writeln!(out, "{}", declared_type.as_str()).unwrap();
                }
                Feature::AttributeInit {
                    name,
                    declared_type,
                    init,
                } => {
                    writeln!(out, "initializer").unwrap();
                    writeln!(out, "{}", name.name).unwrap();
                    writeln!(out, "{}", declared_type.as_str()).unwrap();
                    emit_expr(init, out);
                }
                Feature::Method { .. } => unreachable!("filtered above"),
            }
        }
    }
}

/// The method set visible in `class_name`, ancestor-first. A class's
/// override of an `Object`/`IO` method name (`abort`, `copy`, ...)
/// replaces its ancestor's entry in place, so it prints where that
/// method originally appeared in the chain. An override of any other
/// name — including `String`'s own `length`/`concat`/`substr` — instead
/// removes the ancestor's entry and appends the override at the end of
/// the linearization.
fn linearized_methods<'a>(table: &'a ClassTable, hierarchy: &Hierarchy, class_name: &str) -> Vec<(String, &'a Feature, String)> {
    let mut ordered: Vec<(String, &Feature, String)> = Vec::new();
    let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for anc in ancestors(hierarchy, class_name) {
        let anc_class = table.get(&anc).expect("ancestor exists");
        for feature in &anc_class.features {
            if !feature.is_method() {
                continue;
            }
            let method_name = feature.name().name.clone();
            if let Some(&idx) = index_of.get(&method_name) {
                if is_builtin_method(&method_name) {
                    ordered[idx] = (method_name, feature, anc.clone());
                } else {
                    ordered.remove(idx);
                    for slot in index_of.values_mut() {
                        if *slot > idx {
                            *slot -= 1;
                        }
                    }
                    index_of.insert(method_name.clone(), ordered.len());
                    ordered.push((method_name, feature, anc.clone()));
                }
            } else {
                index_of.insert(method_name.clone(), ordered.len());
                ordered.push((method_name, feature, anc.clone()));
            }
        }
    }
    ordered
}

fn emit_implementation_map(table: &ClassTable, hierarchy: &Hierarchy, out: &mut String) {
    writeln!(out, "implementation_map").unwrap();
    writeln!(out, "{}", table.len()).unwrap();
    for (name, _) in table.iter() {
        writeln!(out, "{name}").unwrap();
        let methods = linearized_methods(table, hierarchy, name);
        writeln!(out, "{}", methods.len()).unwrap();
        for (method_name, feature, defining_class) in methods {
            let Feature::Method {
                formals,
                return_type,
                body,
                ..
            } = feature
            else {
                unreachable!("linearized_methods only yields methods")
            };
            writeln!(out, "{method_name}").unwrap();
            writeln!(out, "{}", formals.len()).unwrap();
            for formal in formals {
                writeln!(out, "{}", formal.name.name).unwrap();
            }
            writeln!(out, "{defining_class}").unwrap();
            let _ = return_type;
            emit_expr(body, out);
        }
    }
}

fn emit_parent_map(table: &ClassTable, out: &mut String) {
    let entries: Vec<(&String, &str)> = table
        .iter()
        .filter(|(name, _)| name.as_str() != "Object")
        .map(|(name, class)| {
            (
                name,
                class.parent.as_deref().expect("normalized before emission"),
            )
        })
        .collect();
    writeln!(out, "parent_map").unwrap();
    writeln!(out, "{}", entries.len()).unwrap();
    for (name, parent) in entries {
        writeln!(out, "{name}").unwrap();
        writeln!(out, "{parent}").unwrap();
    }
}

fn emit_annotated_program(program: &Program, out: &mut String) {
    writeln!(out, "{}", program.classes.len()).unwrap();
    for class in &program.classes {
        emit_class(class, out);
    }
}

fn emit_class(class: &Class, out: &mut String) {
    writeln!(out, "{}", class.line).unwrap();
    writeln!(out, "{}", class.name).unwrap();
    match &class.parent {
        Some(parent) => {
            writeln!(out, "inherits").unwrap();
            writeln!(out, "{parent}").unwrap();
        }
        None => {
            writeln!(out, "no_inherits").unwrap();
        }
    }
    writeln!(out, "{}", class.features.len()).unwrap();
    for feature in &class.features {
        emit_feature(feature, out);
    }
}

fn emit_feature(feature: &Feature, out: &mut String) {
    match feature {
        Feature::AttributeNoInit { name, declared_type } => {
            writeln!(out, "attribute_no_init").unwrap();
            writeln!(out, "{}", name.line).unwrap();
            writeln!(out, "{}", name.name).unwrap();
            writeln!(out, "{}", declared_type.as_str()).unwrap();
        }
        Feature::AttributeInit {
            name,
            declared_type,
            init,
        } => {
            writeln!(out, "attribute_init").unwrap();
            writeln!(out, "{}", name.line).unwrap();
            writeln!(out, "{}", name.name).unwrap();
            writeln!(out, "{}", declared_type.as_str()).unwrap();
            emit_expr(init, out);
        }
        Feature::Method {
            name,
            formals,
            return_type,
            body,
        } => {
            writeln!(out, "method").unwrap();
            writeln!(out, "{}", name.line).unwrap();
            writeln!(out, "{}", name.name).unwrap();
            writeln!(out, "{}", formals.len()).unwrap();
            for formal in formals {
                writeln!(out, "{}", formal.name.line).unwrap();
                writeln!(out, "{}", formal.name.name).unwrap();
                writeln!(out, "{}", formal.declared_type.as_str()).unwrap();
            }
            writeln!(out, "{}", return_type.as_str()).unwrap();
            emit_expr(body, out);
        }
    }
}

fn emit_expr(expr: &Expr, out: &mut String) {
    writeln!(out, "{}", expr.line).unwrap();
    let static_type = expr
        .static_type
        .as_ref()
        .expect("every node is annotated before emission");
    writeln!(out, "{}", static_type.display_name()).unwrap();

    match &expr.kind {
        ExprKind::IntConst(value) => {
            writeln!(out, "integer").unwrap();
            writeln!(out, "{value}").unwrap();
        }
        ExprKind::StringConst(value) => {
            writeln!(out, "string").unwrap();
            writeln!(out, "{value}").unwrap();
        }
        ExprKind::BoolConst(value) => {
            writeln!(out, "{}", if *value { "true" } else { "false" }).unwrap();
        }
        ExprKind::Identifier(ident) => {
            writeln!(out, "identifier").unwrap();
            writeln!(out, "{}", ident.name).unwrap();
        }
        ExprKind::SelfExpr => {
            writeln!(out, "identifier").unwrap();
            writeln!(out, "self").unwrap();
        }
        ExprKind::New(declared_type) => {
            writeln!(out, "new").unwrap();
            writeln!(out, "{}", declared_type.as_str()).unwrap();
        }
        ExprKind::IsVoid(inner) => {
            writeln!(out, "isvoid").unwrap();
            emit_expr(inner, out);
        }
        ExprKind::Add(lhs, rhs) => {
            writeln!(out, "plus").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Sub(lhs, rhs) => {
            writeln!(out, "minus").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Mul(lhs, rhs) => {
            writeln!(out, "times").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Div(lhs, rhs) => {
            writeln!(out, "divide").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Neg(inner) => {
            writeln!(out, "negate").unwrap();
            emit_expr(inner, out);
        }
        ExprKind::Lt(lhs, rhs) => {
            writeln!(out, "lt").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Le(lhs, rhs) => {
            writeln!(out, "le").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Eq(lhs, rhs) => {
            writeln!(out, "eq").unwrap();
            emit_expr(lhs, out);
            emit_expr(rhs, out);
        }
        ExprKind::Not(inner) => {
            writeln!(out, "not").unwrap();
            emit_expr(inner, out);
        }
        ExprKind::Block(exprs) => {
            writeln!(out, "block").unwrap();
            writeln!(out, "{}", exprs.len()).unwrap();
            for e in exprs {
                emit_expr(e, out);
            }
        }
        ExprKind::If {
            predicate,
            then_branch,
            else_branch,
        } => {
            writeln!(out, "if").unwrap();
            emit_expr(predicate, out);
            emit_expr(then_branch, out);
            emit_expr(else_branch, out);
        }
        ExprKind::While { predicate, body } => {
            writeln!(out, "while").unwrap();
            emit_expr(predicate, out);
            emit_expr(body, out);
        }
        ExprKind::Assign { name, value } => {
            writeln!(out, "assign").unwrap();
            writeln!(out, "{}", name.line).unwrap();
            writeln!(out, "{}", name.name).unwrap();
            emit_expr(value, out);
        }
        ExprKind::DynamicDispatch {
            receiver,
            method,
            args,
        } => {
            writeln!(out, "dynamic_dispatch").unwrap();
            emit_expr(receiver, out);
            writeln!(out, "{}", method.line).unwrap();
            writeln!(out, "{}", method.name).unwrap();
            emit_expr_list(args, out);
        }
        ExprKind::StaticDispatch {
            receiver,
            dispatch_type,
            method,
            args,
        } => {
            writeln!(out, "static_dispatch").unwrap();
            emit_expr(receiver, out);
            writeln!(out, "{}", dispatch_type.as_str()).unwrap();
            writeln!(out, "{}", method.line).unwrap();
            writeln!(out, "{}", method.name).unwrap();
            emit_expr_list(args, out);
        }
        ExprKind::SelfDispatch { method, args } => {
            writeln!(out, "self_dispatch").unwrap();
            writeln!(out, "{}", method.line).unwrap();
            writeln!(out, "{}", method.name).unwrap();
            emit_expr_list(args, out);
        }
        ExprKind::Let { bindings, body } => {
            writeln!(out, "let").unwrap();
            writeln!(out, "{}", bindings.len()).unwrap();
            for binding in bindings {
                emit_let_binding(binding, out);
            }
            emit_expr(body, out);
        }
        ExprKind::Case { scrutinee, branches } => {
            writeln!(out, "case").unwrap();
            emit_expr(scrutinee, out);
            writeln!(out, "{}", branches.len()).unwrap();
            for branch in branches {
                emit_case_branch(branch, out);
            }
        }
        ExprKind::Internal(payload) => {
            writeln!(out, "internal").unwrap();
            writeln!(out, "{payload}").unwrap();
        }
    }
}

fn emit_expr_list(exprs: &[Expr], out: &mut String) {
    writeln!(out, "{}", exprs.len()).unwrap();
    for e in exprs {
        emit_expr(e, out);
    }
}

fn emit_let_binding(binding: &LetBinding, out: &mut String) {
    match &binding.init {
        Some(init) => {
            writeln!(out, "let_binding_init").unwrap();
            writeln!(out, "{}", binding.name.line).unwrap();
            writeln!(out, "{}", binding.name.name).unwrap();
            writeln!(out, "{}", binding.declared_type.as_str()).unwrap();
            emit_expr(init, out);
        }
        None => {
            writeln!(out, "let_binding_no_init").unwrap();
            writeln!(out, "{}", binding.name.line).unwrap();
            writeln!(out, "{}", binding.name.name).unwrap();
            writeln!(out, "{}", binding.declared_type.as_str()).unwrap();
        }
    }
}

fn emit_case_branch(branch: &CaseBranch, out: &mut String) {
    writeln!(out, "{}", branch.name.line).unwrap();
    writeln!(out, "{}", branch.name.name).unwrap();
    let type_name = match &branch.declared_type.kind {
        DeclaredTypeKind::SelfType => "SELF_TYPE",
        DeclaredTypeKind::Named(name) => name.as_str(),
    };
    writeln!(out, "{type_name}").unwrap();
    emit_expr(&branch.body, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclaredType, Ident};
    use crate::class_table::build_class_table;
    use crate::inheritance::normalize_and_validate;
    use crate::typecheck::check_program;

    fn int_main() -> Program {
        Program {
            classes: vec![Class {
                line: 1,
                name: "Main".to_string(),
                parent: None,
                features: vec![Feature::Method {
                    name: Ident::new(1, "main"),
                    formals: vec![],
                    return_type: DeclaredType::new(1, "Object"),
                    body: Expr::new(2, ExprKind::IntConst(1)),
                }],
            }],
        }
    }

    #[test]
    fn emits_all_four_sections() {
        let program = int_main();
        let mut table = build_class_table(program.clone()).unwrap();
        normalize_and_validate(&mut table).unwrap();
        check_program(&mut table).unwrap();

        let annotated_program = Program {
            classes: vec![table.get("Main").unwrap().clone()],
        };
        let text = emit(&table, &annotated_program);
        assert!(text.starts_with("class_map\n"));
        assert!(text.contains("implementation_map\n"));
        assert!(text.contains("parent_map\n"));
        assert!(!text.contains("Object\nObject\n"));
    }

    #[test]
    fn parent_map_omits_object() {
        let program = int_main();
        let mut table = build_class_table(program.clone()).unwrap();
        normalize_and_validate(&mut table).unwrap();
        check_program(&mut table).unwrap();

        let mut out = String::new();
        emit_parent_map(&table, &mut out);
        let lines: Vec<&str> = out.lines().collect();
        assert!(!lines.contains(&"Object"));
        assert!(lines.contains(&"Main"));
    }

    #[test]
    fn implementation_map_replaces_builtin_override_in_place() {
        let mut table = build_class_table(Program {
            classes: vec![Class {
                line: 1,
                name: "A".to_string(),
                parent: Some("Object".to_string()),
                features: vec![Feature::Method {
                    name: Ident::new(1, "abort"),
                    formals: vec![],
                    return_type: DeclaredType::new(1, "Object"),
                    body: Expr::new(1, ExprKind::SelfExpr),
                }],
            }],
        })
        .unwrap();
        normalize_and_validate(&mut table).unwrap();
        let hierarchy = table.hierarchy();
        let methods = linearized_methods(&table, &hierarchy, "A");
        let abort_idx = methods.iter().position(|(name, ..)| name == "abort").unwrap();
        assert_eq!(methods[abort_idx].2, "A");
        assert_eq!(abort_idx, 0, "abort keeps Object's original position");
    }

    #[test]
    fn implementation_map_appends_non_builtin_override() {
        let mut table = build_class_table(Program {
            classes: vec![
                Class {
                    line: 1,
                    name: "A".to_string(),
                    parent: Some("Object".to_string()),
                    features: vec![
                        Feature::Method {
                            name: Ident::new(1, "f"),
                            formals: vec![],
                            return_type: DeclaredType::new(1, "Object"),
                            body: Expr::new(1, ExprKind::SelfExpr),
                        },
                        Feature::Method {
                            name: Ident::new(1, "g"),
                            formals: vec![],
                            return_type: DeclaredType::new(1, "Object"),
                            body: Expr::new(1, ExprKind::SelfExpr),
                        },
                    ],
                },
                Class {
                    line: 2,
                    name: "B".to_string(),
                    parent: Some("A".to_string()),
                    features: vec![Feature::Method {
                        name: Ident::new(2, "f"),
                        formals: vec![],
                        return_type: DeclaredType::new(2, "Object"),
                        body: Expr::new(2, ExprKind::SelfExpr),
                    }],
                },
            ],
        })
        .unwrap();
        normalize_and_validate(&mut table).unwrap();
        let hierarchy = table.hierarchy();
        let methods = linearized_methods(&table, &hierarchy, "B");
        let user_methods: Vec<&(String, &Feature, String)> = methods
            .iter()
            .filter(|(name, ..)| name == "f" || name == "g")
            .collect();
        let names: Vec<&str> = user_methods.iter().map(|(name, ..)| name.as_str()).collect();
        assert_eq!(names, vec!["g", "f"]);
        assert_eq!(user_methods[1].2, "B");
    }
}
