//! Core data structures for the symbol and call graph

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // ── Callables ───────────────────────────────────────────
    Function,
    Method,
    Constructor,
    Property,
    SpecialMethod,

    // ── Type definitions ────────────────────────────────────
    Class,
    Interface,
    Enum,
    Dataclass,

    // ── Values ──────────────────────────────────────────────
    ModuleVariable,
    Constant,
    ClassField,

    // ── Container / infrastructure entities ─────────────────
    DockerInstruction,
    ComposeService,

    // ── Statement-level entities ────────────────────────────
    BreakStmt,
    ContinueStmt,
    YieldStmt,
    AssertStmt,
    ReturnStmt,
    BlockStmt,
}

impl NodeKind {
    /// Every kind, in declaration order. Used for filter validation.
    pub const ALL: &'static [NodeKind] = &[
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Constructor,
        NodeKind::Property,
        NodeKind::SpecialMethod,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Enum,
        NodeKind::Dataclass,
        NodeKind::ModuleVariable,
        NodeKind::Constant,
        NodeKind::ClassField,
        NodeKind::DockerInstruction,
        NodeKind::ComposeService,
        NodeKind::BreakStmt,
        NodeKind::ContinueStmt,
        NodeKind::YieldStmt,
        NodeKind::AssertStmt,
        NodeKind::ReturnStmt,
        NodeKind::BlockStmt,
    ];

    /// Canonical lower_snake name, as accepted by tool filters.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Constructor => "constructor",
            NodeKind::Property => "property",
            NodeKind::SpecialMethod => "special_method",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Enum => "enum",
            NodeKind::Dataclass => "dataclass",
            NodeKind::ModuleVariable => "module_variable",
            NodeKind::Constant => "constant",
            NodeKind::ClassField => "class_field",
            NodeKind::DockerInstruction => "docker_instruction",
            NodeKind::ComposeService => "compose_service",
            NodeKind::BreakStmt => "break_stmt",
            NodeKind::ContinueStmt => "continue_stmt",
            NodeKind::YieldStmt => "yield_stmt",
            NodeKind::AssertStmt => "assert_stmt",
            NodeKind::ReturnStmt => "return_stmt",
            NodeKind::BlockStmt => "block_stmt",
        }
    }

    /// Parse a filter value back into a kind.
    pub fn parse(s: &str) -> Option<NodeKind> {
        NodeKind::ALL.iter().copied().find(|k| k.name() == s)
    }

    /// True for kinds that participate in the call graph.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::Function
                | NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Property
                | NodeKind::SpecialMethod
        )
    }
}

/// Lexical scope a symbol was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Module,
    Class,
    Function,
}

/// Source-level visibility, following Python underscore conventions and
/// Java modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Infer visibility from a Python identifier.
    pub fn from_python_name(name: &str) -> Visibility {
        if name.starts_with("__") && !name.ends_with("__") {
            Visibility::Private
        } else if name.starts_with('_') {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }
}

/// A single symbol in the index.
///
/// Nodes are constructed during indexing and immutable afterwards. Everything
/// that refers to another node does so by FQN string, never by pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable fully-qualified name, e.g. `myapp.models.User.save`.
    pub fqn: String,
    pub kind: NodeKind,
    pub name: String,
    pub file: PathBuf,
    /// 1-indexed line of the defining occurrence.
    pub line: u32,
    /// Half-open byte range of the definition, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_range: Option<(usize, usize)>,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Free-form payload; Docker instructions and Compose services keep
    /// their structured fields here (`depends_on`, `stage_index`, ...).
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, String>,
}

impl Node {
    /// A bare node with the fields every symbol has; the extractors fill in
    /// the rest.
    pub fn new(
        fqn: impl Into<String>,
        kind: NodeKind,
        name: impl Into<String>,
        file: impl Into<PathBuf>,
        line: u32,
        scope: Scope,
    ) -> Self {
        Node {
            fqn: fqn.into(),
            kind,
            name: name.into(),
            file: file.into(),
            line,
            byte_range: None,
            scope,
            return_type: None,
            params: Vec::new(),
            decorators: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            visibility: Visibility::Public,
            metadata: HashMap::new(),
        }
    }
}

/// An absolute byte span within one file. Half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, start_byte: usize, end_byte: usize) -> Self {
        SourceLocation {
            file: file.into(),
            start_byte,
            end_byte,
        }
    }

    /// Whether this span fully encloses `[start, end)`.
    pub fn encloses(&self, start: usize, end: usize) -> bool {
        self.start_byte <= start && end <= self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an inferred type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSource {
    Annotation,
    Assignment,
    Parameter,
    Return,
    Literal,
    #[serde(rename = "self")]
    SelfType,
    Chain,
}

impl TypeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeSource::Annotation => "annotation",
            TypeSource::Assignment => "assignment",
            TypeSource::Parameter => "parameter",
            TypeSource::Return => "return",
            TypeSource::Literal => "literal",
            TypeSource::SelfType => "self",
            TypeSource::Chain => "chain",
        }
    }
}

/// A concrete resolved type with the confidence of its inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteType {
    pub fqn: String,
    pub confidence: f32,
}

impl ConcreteType {
    pub fn new(fqn: impl Into<String>, confidence: f32) -> Self {
        ConcreteType {
            fqn: fqn.into(),
            confidence,
        }
    }
}

/// Best-effort type of an expression or variable.
///
/// `Any` signals "unknown"; callers treat it as non-resolvable. Confidence is
/// advisory and never gates resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Type {
    Any,
    Concrete(ConcreteType),
    Union(Vec<ConcreteType>),
}

impl Type {
    pub fn concrete(fqn: impl Into<String>, confidence: f32) -> Self {
        Type::Concrete(ConcreteType::new(fqn, confidence))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// FQN of the single concrete type, or of the strongest union member.
    pub fn fqn(&self) -> Option<&str> {
        match self {
            Type::Any => None,
            Type::Concrete(c) => Some(&c.fqn),
            Type::Union(members) => members
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .map(|c| c.fqn.as_str()),
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Type::Any => 0.0,
            Type::Concrete(c) => c.confidence,
            Type::Union(members) => members
                .iter()
                .map(|c| c.confidence)
                .fold(0.0, f32::max),
        }
    }
}

/// One positional argument at a call site, stringified as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub position: usize,
    pub value: String,
}

/// A single call expression in source, with resolution metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// FQN of the enclosing function.
    pub caller: String,
    /// Callee short name exactly as written.
    pub target_name: String,
    /// Resolved callee FQN; empty when unresolved.
    #[serde(default)]
    pub target_fqn: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub arguments: Vec<Argument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_source: Option<TypeSource>,
}

impl CallSite {
    /// An unresolved site carrying the reason resolution failed.
    pub fn unresolved(
        caller: impl Into<String>,
        target_name: impl Into<String>,
        file: impl Into<PathBuf>,
        line: u32,
        column: u32,
        reason: impl Into<String>,
    ) -> Self {
        CallSite {
            caller: caller.into(),
            target_name: target_name.into(),
            target_fqn: String::new(),
            file: file.into(),
            line,
            column,
            resolved: false,
            failure_reason: Some(reason.into()),
            arguments: Vec::new(),
            inferred_type: None,
            type_confidence: None,
            type_source: None,
        }
    }
}

/// One attribute of a class, with the best type inference we have for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    /// Name of the method the assignment was seen in, usually `__init__`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub confidence: f32,
}

impl ClassAttribute {
    /// Builds an attribute record, keeping `confidence` equal to the type's
    /// own confidence when a type is present.
    pub fn new(name: impl Into<String>, ty: Option<Type>) -> Self {
        let confidence = ty.as_ref().map(|t| t.confidence()).unwrap_or(0.0);
        ClassAttribute {
            name: name.into(),
            ty,
            assigned_in: None,
            location: None,
            confidence,
        }
    }
}

/// All attributes of one class, plus its method FQNs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassAttributes {
    pub class_fqn: String,
    pub file: PathBuf,
    pub attributes: HashMap<String, ClassAttribute>,
    pub methods: Vec<String>,
}

impl ClassAttributes {
    pub fn new(class_fqn: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        ClassAttributes {
            class_fqn: class_fqn.into(),
            file: file.into(),
            attributes: HashMap::new(),
            methods: Vec::new(),
        }
    }
}
