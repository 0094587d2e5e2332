//! Abstract syntax tree for the annotated program: classes, features, and
//! the expression forms produced by the reader and decorated by the type
//! checker.

/// A source identifier: its line number and the text it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub line: u32,
    pub name: String,
}

impl Ident {
    pub fn new(line: u32, name: impl Into<String>) -> Self {
        Ident {
            line,
            name: name.into(),
        }
    }
}

/// A type name as it appears in a declaration: either `SELF_TYPE` or a
/// concrete class name, tagged with the line it was declared on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub line: u32,
    pub kind: DeclaredTypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredTypeKind {
    SelfType,
    Named(String),
}

impl DeclaredType {
    pub fn new(line: u32, text: &str) -> Self {
        let kind = if text == "SELF_TYPE" {
            DeclaredTypeKind::SelfType
        } else {
            DeclaredTypeKind::Named(text.to_string())
        };
        DeclaredType { line, kind }
    }

    pub fn as_str(&self) -> &str {
        match &self.kind {
            DeclaredTypeKind::SelfType => "SELF_TYPE",
            DeclaredTypeKind::Named(name) => name,
        }
    }

    /// Resolves this declaration to a concrete [`Type`] given the class
    /// it is being interpreted in: `SELF_TYPE` always means "the class
    /// of `self`" at the point of use, regardless of which ancestor
    /// originally wrote the declaration.
    pub fn resolve(&self, enclosing: &str) -> Type {
        match &self.kind {
            DeclaredTypeKind::SelfType => Type::SelfType {
                resolved: enclosing.to_string(),
            },
            DeclaredTypeKind::Named(name) => Type::Named(name.clone()),
        }
    }
}

/// A resolved static type attached to an expression node. Unlike a
/// declared type, `SelfType` here always carries the enclosing class it
/// resolved to at this particular occurrence -- no two nodes share the
/// resolution, even if they both say "SELF_TYPE".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    SelfType { resolved: String },
    Named(String),
}

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named(name.into())
    }

    /// The class name this type denotes when used as a lookup key into
    /// the class table: SELF_TYPE is replaced by its resolution.
    pub fn lookup_name(&self) -> &str {
        match self {
            Type::SelfType { resolved } => resolved,
            Type::Named(name) => name,
        }
    }

    /// The text this type prints as in emitted output.
    pub fn display_name(&self) -> &str {
        match self {
            Type::SelfType { .. } => "SELF_TYPE",
            Type::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formal {
    pub name: Ident,
    pub declared_type: DeclaredType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    AttributeNoInit {
        name: Ident,
        declared_type: DeclaredType,
    },
    AttributeInit {
        name: Ident,
        declared_type: DeclaredType,
        init: Expr,
    },
    Method {
        name: Ident,
        formals: Vec<Formal>,
        return_type: DeclaredType,
        body: Expr,
    },
}

impl Feature {
    pub fn name(&self) -> &Ident {
        match self {
            Feature::AttributeNoInit { name, .. } => name,
            Feature::AttributeInit { name, .. } => name,
            Feature::Method { name, .. } => name,
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self, Feature::Method { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub line: u32,
    pub name: String,
    /// `None` means "no explicit `inherits` clause"; the class table
    /// builder normalizes this to `Object`. Built-in classes already
    /// carry their parent here.
    pub parent: Option<String>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub name: Ident,
    pub declared_type: DeclaredType,
    pub init: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub name: Ident,
    pub declared_type: DeclaredType,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntConst(i32),
    StringConst(String),
    BoolConst(bool),
    Identifier(Ident),
    SelfExpr,
    New(DeclaredType),
    IsVoid(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Block(Vec<Expr>),
    If {
        predicate: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    While {
        predicate: Box<Expr>,
        body: Box<Expr>,
    },
    Assign {
        name: Ident,
        value: Box<Expr>,
    },
    DynamicDispatch {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    StaticDispatch {
        receiver: Box<Expr>,
        dispatch_type: DeclaredType,
        method: Ident,
        args: Vec<Expr>,
    },
    SelfDispatch {
        method: Ident,
        args: Vec<Expr>,
    },
    Let {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
    },
    Case {
        scrutinee: Box<Expr>,
        branches: Vec<CaseBranch>,
    },
    /// A built-in method body, injected by the class table builder. The
    /// payload is `ClassName.methodName`.
    Internal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub line: u32,
    pub kind: ExprKind,
    pub static_type: Option<Type>,
}

impl Expr {
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Expr {
            line,
            kind,
            static_type: None,
        }
    }

    pub fn boxed(line: u32, kind: ExprKind) -> Box<Self> {
        Box::new(Self::new(line, kind))
    }
}
