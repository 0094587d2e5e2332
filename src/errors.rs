//! Diagnostic types. `ReaderError` covers malformed serialized-AST input;
//! `SemanticError` covers every fatal condition raised by the analysis
//! passes. Both carry the line number the mandated `ERROR: <line>:
//! Type-Check: <message>` line is built from.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("unexpected end of input while expecting {expected}")]
    UnexpectedEof { expected: String },

    #[error("expected {expected}, found '{found}' (previous token '{previous}')")]
    Malformed {
        line: u32,
        expected: String,
        found: String,
        previous: String,
    },

    #[error("invalid integer literal '{value}'")]
    InvalidInteger { line: u32, value: String },

    #[error("duplicate class {name}")]
    DuplicateClass { line: u32, name: String },

    #[error("duplicate method {method} in class {class}")]
    DuplicateMethod {
        line: u32,
        class: String,
        method: String,
    },
}

impl ReaderError {
    pub fn line(&self) -> u32 {
        match self {
            ReaderError::UnexpectedEof { .. } => 0,
            ReaderError::Malformed { line, .. } => *line,
            ReaderError::InvalidInteger { line, .. } => *line,
            ReaderError::DuplicateClass { line, .. } => *line,
            ReaderError::DuplicateMethod { line, .. } => *line,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("class {name} cannot use reserved name {reserved}")]
    ReservedClassName {
        line: u32,
        name: String,
        reserved: String,
    },

    #[error("class {class} inherits from {parent}")]
    InheritsBasicType {
        line: u32,
        class: String,
        parent: String,
    },

    #[error("class {class} inherits from undefined class {parent}")]
    UndefinedParent {
        line: u32,
        class: String,
        parent: String,
    },

    #[error("inheritance cycle detected involving class {class}")]
    InheritanceCycle { class: String },

    #[error("class Main not found")]
    MissingMain,

    #[error("class Main method main with 0 parameters not found")]
    MissingMainMethod,

    #[error("attribute {attr} is redefined in class {class}")]
    AttributeRedefined {
        line: u32,
        class: String,
        attr: String,
    },

    #[error("attribute named self in class {class}")]
    SelfNamedAttribute { line: u32, class: String },

    #[error("formal parameter named self in method {method}")]
    SelfNamedFormal { line: u32, method: String },

    #[error("duplicate formal parameter {formal} in method {method}")]
    DuplicateFormal {
        line: u32,
        method: String,
        formal: String,
    },

    #[error("let binds name self")]
    SelfBoundInLet { line: u32 },

    #[error("case branch binds name self")]
    SelfBoundInCase { line: u32 },

    #[error("unbound identifier {name}")]
    UnboundIdentifier { line: u32, name: String },

    #[error("undefined type {type_name}")]
    UnknownType { line: u32, type_name: String },

    #[error("case branch cannot declare type SELF_TYPE")]
    SelfTypeInCaseBranch { line: u32 },

    #[error("duplicate branch type {type_name} in case")]
    DuplicateCaseBranchType { line: u32, type_name: String },

    #[error("predicate does not have type Bool (found {found})")]
    NonBoolPredicate { line: u32, found: String },

    #[error("operand does not have type Int (found {found})")]
    NonIntOperand { line: u32, found: String },

    #[error("operand of not does not have type Bool (found {found})")]
    NonBoolOperand { line: u32, found: String },

    #[error("illegal comparison between {lhs} and {rhs}")]
    IncompatibleComparison {
        line: u32,
        lhs: String,
        rhs: String,
    },

    #[error("block body is empty")]
    EmptyBlock { line: u32 },

    #[error("method {method} called with wrong number of arguments (expected {expected}, found {found})")]
    ArgumentCountMismatch {
        line: u32,
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of {method} has type {found}, expected {expected}")]
    ArgumentTypeMismatch {
        line: u32,
        method: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("dispatch on undefined method {method} in class {class}")]
    UndefinedMethod {
        line: u32,
        class: String,
        method: String,
    },

    #[error("expression type {found} does not conform to declared static dispatch type {expected}")]
    DispatchCallerMismatch {
        line: u32,
        expected: String,
        found: String,
    },

    #[error("body of method {method} has type {found}, which does not conform to declared return type {declared}")]
    MethodBodyTypeMismatch {
        line: u32,
        method: String,
        declared: String,
        found: String,
    },

    #[error("initializer of attribute {attr} has type {found}, which does not conform to declared type {declared}")]
    AttributeInitTypeMismatch {
        line: u32,
        attr: String,
        declared: String,
        found: String,
    },

    #[error("initializer of let-bound {name} has type {found}, which does not conform to declared type {declared}")]
    LetInitTypeMismatch {
        line: u32,
        name: String,
        declared: String,
        found: String,
    },

    #[error("assignment to {name} has type {found}, which does not conform to declared type {declared}")]
    AssignTypeMismatch {
        line: u32,
        name: String,
        declared: String,
        found: String,
    },

    #[error("class {class} overrides method {method} from {parent} with a different number of formals")]
    OverrideFormalCountMismatch {
        line: u32,
        class: String,
        method: String,
        parent: String,
    },

    #[error("class {class} overrides method {method} changing the type of formal {index} from {expected} to {found}")]
    OverrideFormalTypeMismatch {
        line: u32,
        class: String,
        method: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("class {class} overrides method {method} changing the return type from {expected} to {found}")]
    OverrideReturnTypeMismatch {
        line: u32,
        class: String,
        method: String,
        expected: String,
        found: String,
    },
}

impl SemanticError {
    pub fn line(&self) -> u32 {
        use SemanticError::*;
        match self {
            ReservedClassName { line, .. }
            | InheritsBasicType { line, .. }
            | UndefinedParent { line, .. }
            | AttributeRedefined { line, .. }
            | SelfNamedAttribute { line, .. }
            | SelfNamedFormal { line, .. }
            | DuplicateFormal { line, .. }
            | SelfBoundInLet { line }
            | SelfBoundInCase { line }
            | UnboundIdentifier { line, .. }
            | UnknownType { line, .. }
            | SelfTypeInCaseBranch { line }
            | DuplicateCaseBranchType { line, .. }
            | NonBoolPredicate { line, .. }
            | NonIntOperand { line, .. }
            | NonBoolOperand { line, .. }
            | IncompatibleComparison { line, .. }
            | EmptyBlock { line }
            | ArgumentCountMismatch { line, .. }
            | ArgumentTypeMismatch { line, .. }
            | UndefinedMethod { line, .. }
            | DispatchCallerMismatch { line, .. }
            | MethodBodyTypeMismatch { line, .. }
            | AttributeInitTypeMismatch { line, .. }
            | LetInitTypeMismatch { line, .. }
            | AssignTypeMismatch { line, .. }
            | OverrideFormalCountMismatch { line, .. }
            | OverrideFormalTypeMismatch { line, .. }
            | OverrideReturnTypeMismatch { line, .. } => *line,
            // Whole-program properties with no single offending line.
            InheritanceCycle { .. } | MissingMain | MissingMainMethod => 0,
        }
    }
}

/// The two fatal error families the pipeline can produce, unified so
/// `main` has one place to turn a failure into the mandated diagnostic
/// line.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl AnalyzerError {
    pub fn line(&self) -> u32 {
        match self {
            AnalyzerError::Reader(e) => e.line(),
            AnalyzerError::Semantic(e) => e.line(),
        }
    }
}
