//! Reads the serialized, line-oriented AST format into [`crate::ast`]
//! types. One line is consumed per grammar token; the only backtracking
//! is the single-line pushback used to re-read a boolean literal's tag
//! as its value.

use std::collections::HashSet;

use crate::ast::{
    CaseBranch, Class, DeclaredType, Expr, ExprKind, Feature, Formal, Ident, LetBinding, Program,
};
use crate::errors::ReaderError;

pub struct Reader {
    lines: Vec<String>,
    idx: usize,
}

impl Reader {
    pub fn new(lines: Vec<String>) -> Self {
        Reader { lines, idx: 0 }
    }

    fn current(&self) -> Result<&str, ReaderError> {
        self.lines
            .get(self.idx)
            .map(String::as_str)
            .ok_or_else(|| ReaderError::UnexpectedEof {
                expected: "another token".to_string(),
            })
    }

    fn advance(&mut self) {
        self.idx += 1;
    }

    /// Consume the current line and move the cursor forward.
    fn next_raw(&mut self) -> Result<String, ReaderError> {
        let tok = self.current()?.to_string();
        self.advance();
        Ok(tok)
    }

    /// Step the cursor back one line, so the next `next_raw` re-reads it.
    fn push_back(&mut self) {
        self.idx = self.idx.saturating_sub(1);
    }

    fn next_u32(&mut self) -> Result<u32, ReaderError> {
        let tok = self.next_raw()?;
        tok.parse::<u32>().map_err(|_| ReaderError::InvalidInteger {
            line: 0,
            value: tok,
        })
    }

    fn next_i32(&mut self, line: u32) -> Result<i32, ReaderError> {
        let tok = self.next_raw()?;
        tok.parse::<i32>().map_err(|_| ReaderError::InvalidInteger { line, value: tok })
    }

    pub fn read_program(&mut self) -> Result<Program, ReaderError> {
        let count = self.next_u32()?;
        let mut classes = Vec::with_capacity(count as usize);
        let mut seen: HashSet<String> = HashSet::new();
        for _ in 0..count {
            let class = self.read_class()?;
            if !seen.insert(class.name.clone()) {
                return Err(ReaderError::DuplicateClass {
                    line: class.line,
                    name: class.name,
                });
            }
            classes.push(class);
        }
        Ok(Program { classes })
    }

    fn read_class(&mut self) -> Result<Class, ReaderError> {
        let (line, name) = self.read_class_ident()?;

        let tag = self.next_raw()?;
        let parent = match tag.as_str() {
            "inherits" => {
                let (_, parent_name) = self.read_class_ident()?;
                Some(parent_name)
            }
            "no_inherits" => None,
            other => {
                return Err(ReaderError::Malformed {
                    line,
                    expected: "inherits or no_inherits".to_string(),
                    found: other.to_string(),
                    previous: name.clone(),
                })
            }
        };

        let feature_count = self.next_u32()?;
        let mut features = Vec::with_capacity(feature_count as usize);
        let mut seen_methods: HashSet<String> = HashSet::new();
        for _ in 0..feature_count {
            let feature = self.read_feature()?;
            if feature.is_method() && !seen_methods.insert(feature.name().name.clone()) {
                return Err(ReaderError::DuplicateMethod {
                    line: feature.name().line,
                    class: name.clone(),
                    method: feature.name().name.clone(),
                });
            }
            features.push(feature);
        }

        Ok(Class {
            line,
            name,
            parent,
            features,
        })
    }

    fn read_feature(&mut self) -> Result<Feature, ReaderError> {
        let tag = self.next_raw()?;
        match tag.as_str() {
            "attribute_no_init" => {
                let name = self.read_var_ident()?;
                let declared_type = self.read_type_ident()?;
                Ok(Feature::AttributeNoInit { name, declared_type })
            }
            "attribute_init" => {
                let name = self.read_var_ident()?;
                let declared_type = self.read_type_ident()?;
                let init = self.read_expr()?;
                Ok(Feature::AttributeInit {
                    name,
                    declared_type,
                    init,
                })
            }
            "method" => {
                let name = self.read_method_ident()?;
                let formal_count = self.next_u32()?;
                let mut formals = Vec::with_capacity(formal_count as usize);
                for _ in 0..formal_count {
                    formals.push(self.read_formal()?);
                }
                let return_type = self.read_type_ident()?;
                let body = self.read_expr()?;
                Ok(Feature::Method {
                    name,
                    formals,
                    return_type,
                    body,
                })
            }
            other => Err(ReaderError::Malformed {
                line: 0,
                expected: "attribute_no_init, attribute_init or method".to_string(),
                found: other.to_string(),
                previous: String::new(),
            }),
        }
    }

    fn read_formal(&mut self) -> Result<Formal, ReaderError> {
        let name = self.read_var_ident()?;
        let declared_type = self.read_type_ident()?;
        Ok(Formal { name, declared_type })
    }

    fn read_expr(&mut self) -> Result<Expr, ReaderError> {
        let line = self.next_u32()?;
        let tag = self.next_raw()?;

        let kind = match tag.as_str() {
            "true" | "false" => {
                self.push_back();
                ExprKind::BoolConst(self.read_bool_constant()?)
            }
            "integer" => ExprKind::IntConst(self.next_i32(line)?),
            "string" => ExprKind::StringConst(self.next_raw()?),
            "identifier" => {
                let (ident_line, name) = self.read_ident_pair()?;
                if name == "self" {
                    ExprKind::SelfExpr
                } else {
                    ExprKind::Identifier(Ident::new(ident_line, name))
                }
            }
            "assign" => {
                let name = self.read_var_ident()?;
                let value = Box::new(self.read_expr()?);
                ExprKind::Assign { name, value }
            }
            "new" => ExprKind::New(self.read_type_ident()?),
            "isvoid" => ExprKind::IsVoid(Box::new(self.read_expr()?)),
            "not" => ExprKind::Not(Box::new(self.read_expr()?)),
            "negate" => ExprKind::Neg(Box::new(self.read_expr()?)),
            "plus" => ExprKind::Add(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "minus" => ExprKind::Sub(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "times" => ExprKind::Mul(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "divide" => ExprKind::Div(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "lt" => ExprKind::Lt(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "le" => ExprKind::Le(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "eq" => ExprKind::Eq(Box::new(self.read_expr()?), Box::new(self.read_expr()?)),
            "dynamic_dispatch" => {
                let receiver = Box::new(self.read_expr()?);
                let method = self.read_method_ident()?;
                let args = self.read_expr_list()?;
                ExprKind::DynamicDispatch {
                    receiver,
                    method,
                    args,
                }
            }
            "static_dispatch" => {
                let receiver = Box::new(self.read_expr()?);
                let dispatch_type = self.read_type_ident()?;
                let method = self.read_method_ident()?;
                let args = self.read_expr_list()?;
                ExprKind::StaticDispatch {
                    receiver,
                    dispatch_type,
                    method,
                    args,
                }
            }
            "self_dispatch" => {
                let method = self.read_method_ident()?;
                let args = self.read_expr_list()?;
                ExprKind::SelfDispatch { method, args }
            }
            "if" => {
                let predicate = Box::new(self.read_expr()?);
                let then_branch = Box::new(self.read_expr()?);
                let else_branch = Box::new(self.read_expr()?);
                ExprKind::If {
                    predicate,
                    then_branch,
                    else_branch,
                }
            }
            "while" => {
                let predicate = Box::new(self.read_expr()?);
                let body = Box::new(self.read_expr()?);
                ExprKind::While { predicate, body }
            }
            "block" => ExprKind::Block(self.read_expr_list()?),
            "let" => {
                let bind_count = self.next_u32()?;
                let mut bindings = Vec::with_capacity(bind_count as usize);
                for _ in 0..bind_count {
                    let bind_tag = self.next_raw()?;
                    let name = self.read_var_ident()?;
                    let declared_type = self.read_type_ident()?;
                    let init = match bind_tag.as_str() {
                        "let_binding_no_init" => None,
                        "let_binding_init" => Some(Box::new(self.read_expr()?)),
                        other => {
                            return Err(ReaderError::Malformed {
                                line,
                                expected: "let_binding_no_init or let_binding_init".to_string(),
                                found: other.to_string(),
                                previous: name.name,
                            })
                        }
                    };
                    bindings.push(LetBinding {
                        name,
                        declared_type,
                        init,
                    });
                }
                let body = Box::new(self.read_expr()?);
                ExprKind::Let { bindings, body }
            }
            "case" => {
                let scrutinee = Box::new(self.read_expr()?);
                let branch_count = self.next_u32()?;
                let mut branches = Vec::with_capacity(branch_count as usize);
                for _ in 0..branch_count {
                    let name = self.read_var_ident()?;
                    let declared_type = self.read_type_ident()?;
                    let body = Box::new(self.read_expr()?);
                    branches.push(CaseBranch {
                        name,
                        declared_type,
                        body,
                    });
                }
                ExprKind::Case { scrutinee, branches }
            }
            other => {
                return Err(ReaderError::Malformed {
                    line,
                    expected: "expression tag".to_string(),
                    found: other.to_string(),
                    previous: String::new(),
                })
            }
        };

        Ok(Expr::new(line, kind))
    }

    fn read_expr_list(&mut self) -> Result<Vec<Expr>, ReaderError> {
        let count = self.next_u32()?;
        let mut exprs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            exprs.push(self.read_expr()?);
        }
        Ok(exprs)
    }

    fn read_bool_constant(&mut self) -> Result<bool, ReaderError> {
        let tok = self.next_raw()?;
        match tok.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ReaderError::Malformed {
                line: 0,
                expected: "true or false".to_string(),
                found: other.to_string(),
                previous: String::new(),
            }),
        }
    }

    fn read_ident_pair(&mut self) -> Result<(u32, String), ReaderError> {
        let line = self.next_u32()?;
        let name = self.next_raw()?;
        Ok((line, name))
    }

    fn read_class_ident(&mut self) -> Result<(u32, String), ReaderError> {
        self.read_ident_pair()
    }

    fn read_var_ident(&mut self) -> Result<Ident, ReaderError> {
        let (line, name) = self.read_ident_pair()?;
        Ok(Ident::new(line, name))
    }

    fn read_method_ident(&mut self) -> Result<Ident, ReaderError> {
        let (line, name) = self.read_ident_pair()?;
        Ok(Ident::new(line, name))
    }

    fn read_type_ident(&mut self) -> Result<DeclaredType, ReaderError> {
        let (line, name) = self.read_ident_pair()?;
        Ok(DeclaredType::new(line, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(|l| l.trim().to_string()).collect()
    }

    #[test]
    fn reads_empty_program() {
        let mut r = Reader::new(lines("0"));
        let prog = r.read_program().unwrap();
        assert!(prog.classes.is_empty());
    }

    #[test]
    fn reads_single_empty_class() {
        let input = "1\n1\nObject\nno_inherits\n0\n";
        let mut r = Reader::new(lines(input));
        let prog = r.read_program().unwrap();
        assert_eq!(prog.classes.len(), 1);
        assert_eq!(prog.classes[0].name, "Object");
        assert!(prog.classes[0].parent.is_none());
    }

    #[test]
    fn reads_bool_literal_via_pushback() {
        let input = "5\ntrue\n";
        let mut r = Reader::new(lines(input));
        let expr = r.read_expr().unwrap();
        assert_eq!(expr.line, 5);
        assert_eq!(expr.kind, ExprKind::BoolConst(true));
    }

    #[test]
    fn reads_integer_literal() {
        let input = "2\ninteger\n42\n";
        let mut r = Reader::new(lines(input));
        let expr = r.read_expr().unwrap();
        assert_eq!(expr.kind, ExprKind::IntConst(42));
    }

    #[test]
    fn rejects_duplicate_class() {
        let input = "2\n1\nMain\nno_inherits\n0\n1\nMain\nno_inherits\n0\n";
        let mut r = Reader::new(lines(input));
        let err = r.read_program().unwrap_err();
        assert!(matches!(err, ReaderError::DuplicateClass { .. }));
    }

    #[test]
    fn self_identifier_becomes_self_expr() {
        let input = "3\nidentifier\n3\nself\n";
        let mut r = Reader::new(lines(input));
        let expr = r.read_expr().unwrap();
        assert_eq!(expr.kind, ExprKind::SelfExpr);
    }
}
