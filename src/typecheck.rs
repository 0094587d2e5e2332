//! The recursive type-checking judgment `tc(C, M, O, c, e)`. Every
//! expression node is visited exactly once, annotated with its static
//! type in place, and the analyzer bails out on the first violated
//! rule.

use std::collections::{HashMap, HashSet};

use crate::ancestors::{join, join_case};
use crate::ast::{CaseBranch, DeclaredTypeKind, Expr, ExprKind, Feature, LetBinding, Type};
use crate::class_table::{is_builtin_class, ClassTable, Hierarchy};
use crate::conformance::conforms;
use crate::environment::{build_method_env, build_object_env, MethodEnv, ObjectEnv};
use crate::errors::SemanticError;

/// Type-checks every non-built-in class in `table`, mutating every
/// expression node's `static_type` in place.
pub fn check_program(table: &mut ClassTable) -> Result<(), SemanticError> {
    let hierarchy = table.hierarchy();
    let method_env = build_method_env(table)?;

    let class_names: Vec<String> = table
        .iter()
        .map(|(name, _)| name.clone())
        .filter(|name| !is_builtin_class(name))
        .collect();

    let mut object_envs: HashMap<String, ObjectEnv> = HashMap::new();
    for name in &class_names {
        object_envs.insert(name.clone(), build_object_env(table, name)?);
    }

    for name in &class_names {
        let base_env = object_envs.remove(name).expect("computed above");
        let class = table.get_mut(name).expect("class must exist");
        check_class(class, name, &base_env, &hierarchy, &method_env)?;
    }

    Ok(())
}

fn check_class(
    class: &mut crate::ast::Class,
    class_name: &str,
    base_env: &ObjectEnv,
    hierarchy: &Hierarchy,
    menv: &MethodEnv,
) -> Result<(), SemanticError> {
    for feature in &mut class.features {
        match feature {
            Feature::AttributeNoInit { .. } => {}
            Feature::AttributeInit {
                name,
                declared_type,
                init,
            } => {
                let ty = tc(init, base_env, hierarchy, menv, class_name)?;
                let declared = declared_type.resolve(class_name);
                if !conforms(&ty, &declared, hierarchy) {
                    return Err(SemanticError::AttributeInitTypeMismatch {
                        line: name.line,
                        attr: name.name.clone(),
                        declared: declared.display_name().to_string(),
                        found: ty.display_name().to_string(),
                    });
                }
            }
            Feature::Method {
                name,
                formals,
                return_type,
                body,
            } => {
                let mut scope = base_env.clone();
                for formal in formals.iter() {
                    scope.insert(
                        formal.name.name.clone(),
                        formal.declared_type.resolve(class_name),
                    );
                }
                let ty = tc(body, &scope, hierarchy, menv, class_name)?;
                let declared = return_type.resolve(class_name);
                if !conforms(&ty, &declared, hierarchy) {
                    return Err(SemanticError::MethodBodyTypeMismatch {
                        line: name.line,
                        method: name.name.clone(),
                        declared: declared.display_name().to_string(),
                        found: ty.display_name().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn tc(
    expr: &mut Expr,
    env: &ObjectEnv,
    hierarchy: &Hierarchy,
    menv: &MethodEnv,
    class_name: &str,
) -> Result<Type, SemanticError> {
    let line = expr.line;
    let ty = match &mut expr.kind {
        ExprKind::IntConst(_) => Type::named("Int"),
        ExprKind::StringConst(_) => Type::named("String"),
        ExprKind::BoolConst(_) => Type::named("Bool"),
        ExprKind::SelfExpr => Type::SelfType {
            resolved: class_name.to_string(),
        },
        ExprKind::Identifier(ident) => env
            .get(&ident.name)
            .cloned()
            .ok_or_else(|| SemanticError::UnboundIdentifier {
                line: ident.line,
                name: ident.name.clone(),
            })?,
        ExprKind::Internal(_) => expr
            .static_type
            .clone()
            .unwrap_or_else(|| Type::named("Object")),

        ExprKind::Assign { name, value } => {
            let value_ty = tc(value, env, hierarchy, menv, class_name)?;
            let declared = env
                .get(&name.name)
                .cloned()
                .ok_or_else(|| SemanticError::UnboundIdentifier {
                    line: name.line,
                    name: name.name.clone(),
                })?;
            if !conforms(&value_ty, &declared, hierarchy) {
                return Err(SemanticError::AssignTypeMismatch {
                    line: name.line,
                    name: name.name.clone(),
                    declared: declared.display_name().to_string(),
                    found: value_ty.display_name().to_string(),
                });
            }
            value_ty
        }

        ExprKind::New(declared_type) => match &declared_type.kind {
            DeclaredTypeKind::SelfType => Type::SelfType {
                resolved: class_name.to_string(),
            },
            DeclaredTypeKind::Named(name) => {
                if !hierarchy.contains(name) {
                    return Err(SemanticError::UnknownType {
                        line: declared_type.line,
                        type_name: name.clone(),
                    });
                }
                Type::named(name.clone())
            }
        },

        ExprKind::IsVoid(inner) => {
            tc(inner, env, hierarchy, menv, class_name)?;
            Type::named("Bool")
        }

        ExprKind::Add(lhs, rhs) | ExprKind::Sub(lhs, rhs) | ExprKind::Mul(lhs, rhs) | ExprKind::Div(lhs, rhs) => {
            let lt = tc(lhs, env, hierarchy, menv, class_name)?;
            require_int(&lt, lhs.line)?;
            let rt = tc(rhs, env, hierarchy, menv, class_name)?;
            require_int(&rt, rhs.line)?;
            Type::named("Int")
        }

        ExprKind::Neg(inner) => {
            let t = tc(inner, env, hierarchy, menv, class_name)?;
            require_int(&t, inner.line)?;
            Type::named("Int")
        }

        ExprKind::Lt(lhs, rhs) | ExprKind::Le(lhs, rhs) => {
            let lt = tc(lhs, env, hierarchy, menv, class_name)?;
            require_int(&lt, lhs.line)?;
            let rt = tc(rhs, env, hierarchy, menv, class_name)?;
            require_int(&rt, rhs.line)?;
            Type::named("Bool")
        }

        ExprKind::Eq(lhs, rhs) => {
            let lt = tc(lhs, env, hierarchy, menv, class_name)?;
            let rt = tc(rhs, env, hierarchy, menv, class_name)?;
            let lt_basic = crate::class_table::is_basic_type(lt.lookup_name());
            let rt_basic = crate::class_table::is_basic_type(rt.lookup_name());
            if (lt_basic || rt_basic) && lt.lookup_name() != rt.lookup_name() {
                return Err(SemanticError::IncompatibleComparison {
                    line,
                    lhs: lt.display_name().to_string(),
                    rhs: rt.display_name().to_string(),
                });
            }
            Type::named("Bool")
        }

        ExprKind::Not(inner) => {
            let t = tc(inner, env, hierarchy, menv, class_name)?;
            if t.lookup_name() != "Bool" {
                return Err(SemanticError::NonBoolOperand {
                    line: inner.line,
                    found: t.display_name().to_string(),
                });
            }
            Type::named("Bool")
        }

        ExprKind::Block(exprs) => {
            if exprs.is_empty() {
                return Err(SemanticError::EmptyBlock { line });
            }
            let mut last = Type::named("Object");
            for e in exprs.iter_mut() {
                last = tc(e, env, hierarchy, menv, class_name)?;
            }
            last
        }

        ExprKind::If {
            predicate,
            then_branch,
            else_branch,
        } => {
            let pt = tc(predicate, env, hierarchy, menv, class_name)?;
            if pt.lookup_name() != "Bool" {
                return Err(SemanticError::NonBoolPredicate {
                    line: predicate.line,
                    found: pt.display_name().to_string(),
                });
            }
            let tt = tc(then_branch, env, hierarchy, menv, class_name)?;
            let et = tc(else_branch, env, hierarchy, menv, class_name)?;
            join(&tt, &et, hierarchy)
        }

        ExprKind::While { predicate, body } => {
            let pt = tc(predicate, env, hierarchy, menv, class_name)?;
            if pt.lookup_name() != "Bool" {
                return Err(SemanticError::NonBoolPredicate {
                    line: predicate.line,
                    found: pt.display_name().to_string(),
                });
            }
            tc(body, env, hierarchy, menv, class_name)?;
            Type::named("Object")
        }

        ExprKind::DynamicDispatch {
            receiver,
            method,
            args,
        } => {
            let recv_ty = tc(receiver, env, hierarchy, menv, class_name)?;
            let lookup_class = recv_ty.lookup_name().to_string();
            let sig = menv
                .lookup(&lookup_class, &method.name)
                .cloned()
                .ok_or_else(|| SemanticError::UndefinedMethod {
                    line: method.line,
                    class: lookup_class.clone(),
                    method: method.name.clone(),
                })?;
            check_args(args, &sig.formal_types, &method.name, method.line, env, hierarchy, menv, class_name)?;
            if sig.return_type_name == "SELF_TYPE" {
                recv_ty
            } else {
                Type::named(sig.return_type_name)
            }
        }

        ExprKind::StaticDispatch {
            receiver,
            dispatch_type,
            method,
            args,
        } => {
            let target = dispatch_type.as_str().to_string();
            if !hierarchy.contains(&target) {
                return Err(SemanticError::UnknownType {
                    line: dispatch_type.line,
                    type_name: target,
                });
            }
            let recv_ty = tc(receiver, env, hierarchy, menv, class_name)?;
            if !conforms(&recv_ty, &Type::named(target.clone()), hierarchy) {
                return Err(SemanticError::DispatchCallerMismatch {
                    line: dispatch_type.line,
                    expected: target,
                    found: recv_ty.display_name().to_string(),
                });
            }
            let sig = menv
                .lookup(&target, &method.name)
                .cloned()
                .ok_or_else(|| SemanticError::UndefinedMethod {
                    line: method.line,
                    class: target.clone(),
                    method: method.name.clone(),
                })?;
            check_args(args, &sig.formal_types, &method.name, method.line, env, hierarchy, menv, class_name)?;
            // Static dispatch never substitutes SELF_TYPE for the caller:
            // the declared return type is used as-is, unlike dynamic dispatch.
            Type::named(sig.return_type_name)
        }

        ExprKind::SelfDispatch { method, args } => {
            let sig = menv
                .lookup(class_name, &method.name)
                .cloned()
                .ok_or_else(|| SemanticError::UndefinedMethod {
                    line: method.line,
                    class: class_name.to_string(),
                    method: method.name.clone(),
                })?;
            check_args(args, &sig.formal_types, &method.name, method.line, env, hierarchy, menv, class_name)?;
            if sig.return_type_name == "SELF_TYPE" {
                Type::SelfType {
                    resolved: class_name.to_string(),
                }
            } else {
                Type::named(sig.return_type_name)
            }
        }

        ExprKind::Let { bindings, body } => {
            let mut scope = env.clone();
            for binding in bindings.iter_mut() {
                scope = tc_let_binding(binding, scope, hierarchy, menv, class_name)?;
            }
            tc(body, &scope, hierarchy, menv, class_name)?
        }

        ExprKind::Case { scrutinee, branches } => {
            tc(scrutinee, env, hierarchy, menv, class_name)?;
            let mut seen_types: HashSet<String> = HashSet::new();
            let mut branch_types = Vec::with_capacity(branches.len());
            for branch in branches.iter_mut() {
                branch_types.push(tc_case_branch(branch, env, hierarchy, menv, class_name, &mut seen_types)?);
            }
            join_case(&branch_types, hierarchy)
        }
    };

    expr.static_type = Some(ty.clone());
    Ok(ty)
}

fn require_int(t: &Type, line: u32) -> Result<(), SemanticError> {
    if t.lookup_name() != "Int" {
        return Err(SemanticError::NonIntOperand {
            line,
            found: t.display_name().to_string(),
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn check_args(
    args: &mut [Expr],
    formal_types: &[String],
    method_name: &str,
    line: u32,
    env: &ObjectEnv,
    hierarchy: &Hierarchy,
    menv: &MethodEnv,
    class_name: &str,
) -> Result<(), SemanticError> {
    if args.len() != formal_types.len() {
        return Err(SemanticError::ArgumentCountMismatch {
            line,
            method: method_name.to_string(),
            expected: formal_types.len(),
            found: args.len(),
        });
    }
    for (index, (arg, formal_type)) in args.iter_mut().zip(formal_types.iter()).enumerate() {
        let arg_ty = tc(arg, env, hierarchy, menv, class_name)?;
        if !conforms(&arg_ty, &Type::named(formal_type.clone()), hierarchy) {
            return Err(SemanticError::ArgumentTypeMismatch {
                line,
                method: method_name.to_string(),
                index,
                expected: formal_type.clone(),
                found: arg_ty.display_name().to_string(),
            });
        }
    }
    Ok(())
}

fn tc_let_binding(
    binding: &mut LetBinding,
    scope: ObjectEnv,
    hierarchy: &Hierarchy,
    menv: &MethodEnv,
    class_name: &str,
) -> Result<ObjectEnv, SemanticError> {
    if binding.name.name == "self" {
        return Err(SemanticError::SelfBoundInLet {
            line: binding.name.line,
        });
    }
    if let DeclaredTypeKind::Named(type_name) = &binding.declared_type.kind {
        if !hierarchy.contains(type_name) {
            return Err(SemanticError::UnknownType {
                line: binding.declared_type.line,
                type_name: type_name.clone(),
            });
        }
    }
    let declared = binding.declared_type.resolve(class_name);
    if let Some(init) = binding.init.as_mut() {
        let init_ty = tc(init, &scope, hierarchy, menv, class_name)?;
        if !conforms(&init_ty, &declared, hierarchy) {
            return Err(SemanticError::LetInitTypeMismatch {
                line: binding.name.line,
                name: binding.name.name.clone(),
                declared: declared.display_name().to_string(),
                found: init_ty.display_name().to_string(),
            });
        }
    }
    Ok(scope.update(binding.name.name.clone(), declared))
}

fn tc_case_branch(
    branch: &mut CaseBranch,
    env: &ObjectEnv,
    hierarchy: &Hierarchy,
    menv: &MethodEnv,
    class_name: &str,
    seen_types: &mut HashSet<String>,
) -> Result<Type, SemanticError> {
    if branch.name.name == "self" {
        return Err(SemanticError::SelfBoundInCase {
            line: branch.name.line,
        });
    }
    let type_name = match &branch.declared_type.kind {
        DeclaredTypeKind::SelfType => {
            return Err(SemanticError::SelfTypeInCaseBranch {
                line: branch.declared_type.line,
            })
        }
        DeclaredTypeKind::Named(name) => name.clone(),
    };
    if !hierarchy.contains(&type_name) {
        return Err(SemanticError::UnknownType {
            line: branch.declared_type.line,
            type_name: type_name.clone(),
        });
    }
    if !seen_types.insert(type_name.clone()) {
        return Err(SemanticError::DuplicateCaseBranchType {
            line: branch.declared_type.line,
            type_name,
        });
    }
    let branch_env = env.update(branch.name.name.clone(), Type::named(type_name));
    tc(&mut branch.body, &branch_env, hierarchy, menv, class_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Class, DeclaredType, Ident, Program};
    use crate::class_table::build_class_table;
    use crate::inheritance::normalize_and_validate;

    fn main_class_with_body(body: Expr) -> Class {
        Class {
            line: 1,
            name: "Main".to_string(),
            parent: None,
            features: vec![Feature::Method {
                name: Ident::new(1, "main"),
                formals: vec![],
                return_type: DeclaredType::new(1, "Object"),
                body,
            }],
        }
    }

    fn checked(body: Expr) -> Result<ClassTable, SemanticError> {
        let mut table = build_class_table(Program {
            classes: vec![main_class_with_body(body)],
        })
        .unwrap();
        normalize_and_validate(&mut table).unwrap();
        check_program(&mut table)?;
        Ok(table)
    }

    #[test]
    fn integer_literal_types_as_int() {
        let table = checked(Expr::new(2, ExprKind::IntConst(1))).unwrap();
        let main = table.get("Main").unwrap();
        let Feature::Method { body, .. } = &main.features[0] else { unreachable!() };
        assert_eq!(body.static_type, Some(Type::named("Int")));
    }

    #[test]
    fn if_branches_join_to_object() {
        let body = Expr::new(
            2,
            ExprKind::If {
                predicate: Expr::boxed(2, ExprKind::BoolConst(true)),
                then_branch: Expr::boxed(2, ExprKind::New(DeclaredType::new(2, "IO"))),
                else_branch: Expr::boxed(2, ExprKind::New(DeclaredType::new(2, "String"))),
            },
        );
        let table = checked(body).unwrap();
        let main = table.get("Main").unwrap();
        let Feature::Method { body, .. } = &main.features[0] else { unreachable!() };
        assert_eq!(body.static_type, Some(Type::named("Object")));
    }

    #[test]
    fn unbound_identifier_is_rejected() {
        let body = Expr::new(2, ExprKind::Identifier(Ident::new(2, "nope")));
        let err = checked(body).unwrap_err();
        assert!(matches!(err, SemanticError::UnboundIdentifier { .. }));
    }

    #[test]
    fn arithmetic_requires_int_operands() {
        let body = Expr::new(
            2,
            ExprKind::Add(
                Expr::boxed(2, ExprKind::StringConst("x".to_string())),
                Expr::boxed(2, ExprKind::IntConst(1)),
            ),
        );
        let err = checked(body).unwrap_err();
        assert!(matches!(err, SemanticError::NonIntOperand { .. }));
    }

    #[test]
    fn empty_block_is_rejected() {
        let body = Expr::new(2, ExprKind::Block(vec![]));
        let err = checked(body).unwrap_err();
        assert!(matches!(err, SemanticError::EmptyBlock { .. }));
    }

    #[test]
    fn let_rebinding_shadows_in_order() {
        let body = Expr::new(
            2,
            ExprKind::Let {
                bindings: vec![
                    LetBinding {
                        name: Ident::new(2, "x"),
                        declared_type: DeclaredType::new(2, "Int"),
                        init: Some(Box::new(Expr::new(2, ExprKind::IntConst(1)))),
                    },
                    LetBinding {
                        name: Ident::new(2, "x"),
                        declared_type: DeclaredType::new(2, "String"),
                        init: Some(Box::new(Expr::new(2, ExprKind::StringConst("a".to_string())))),
                    },
                ],
                body: Expr::boxed(2, ExprKind::Identifier(Ident::new(2, "x"))),
            },
        );
        let table = checked(body).unwrap();
        let main = table.get("Main").unwrap();
        let Feature::Method { body, .. } = &main.features[0] else { unreachable!() };
        assert_eq!(body.static_type, Some(Type::named("String")));
    }

    #[test]
    fn self_dispatch_with_self_type_return_resolves_to_enclosing_class() {
        let body = Expr::new(
            2,
            ExprKind::SelfDispatch {
                method: Ident::new(2, "copy"),
                args: vec![],
            },
        );
        let table = checked(body).unwrap();
        let main = table.get("Main").unwrap();
        let Feature::Method { body, .. } = &main.features[0] else { unreachable!() };
        assert_eq!(
            body.static_type,
            Some(Type::SelfType {
                resolved: "Main".to_string()
            })
        );
    }
}
