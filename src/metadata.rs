//! Structural metadata for selected elements of an inspected assembly.
//!
//! The metadata is produced by the host (a decompiler or metadata reader)
//! and handed to us already decoded. Owned definitions deserialize from a
//! JSON selection export; the describer only ever sees the borrowed
//! [`SelectionNode`] view over them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors loading a selection export.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("cannot read selection file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid selection document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single IL instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: String,
    #[serde(default)]
    pub operand: Option<String>,
}

impl Instruction {
    pub fn new(offset: u32, opcode: &str, operand: Option<&str>) -> Self {
        Self {
            offset,
            opcode: opcode.to_string(),
            operand: operand.map(str::to_string),
        }
    }
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Local {
    pub type_name: String,
}

/// Kind of exception handler region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Catch,
    Filter,
    Finally,
    Fault,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKind::Catch => write!(f, "Catch"),
            HandlerKind::Filter => write!(f, "Filter"),
            HandlerKind::Finally => write!(f, "Finally"),
            HandlerKind::Fault => write!(f, "Fault"),
        }
    }
}

/// A protected region and its handler.
///
/// An end offset of `None` means the region runs to the end of the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: u32,
    #[serde(default)]
    pub try_end: Option<u32>,
    pub handler_start: u32,
    #[serde(default)]
    pub handler_end: Option<u32>,
}

/// Executable body of a method or accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodBody {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub locals: Vec<Local>,
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    pub type_name: String,
    pub name: String,
}

impl Parameter {
    pub fn new(type_name: &str, name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodDef {
    pub name: String,
    pub full_name: String,
    pub access: String,
    #[serde(default)]
    pub attributes: String,
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// `None` for abstract, extern and runtime-implemented methods.
    #[serde(default)]
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Parameter list rendered as `type name, type name`.
    pub fn parameter_list(&self) -> String {
        self.parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name, p.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub access: String,
    #[serde(default)]
    pub attributes: String,
    /// Literal value for constants, already rendered by the host.
    #[serde(default)]
    pub constant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PropertyDef {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub getter: Option<MethodDef>,
    #[serde(default)]
    pub setter: Option<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypeDef {
    pub full_name: String,
    pub visibility: String,
    #[serde(default)]
    pub attributes: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssemblyDef {
    pub full_name: String,
    pub version: String,
    /// Full type names of the assembly-level custom attributes.
    #[serde(default)]
    pub custom_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModuleDef {
    pub name: String,
    pub runtime_version: String,
    pub type_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespaceDef {
    pub name: String,
}

/// Any other tree element the host lets the user select (resources,
/// references, folders). Only its kind and label are known.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OtherNode {
    /// Host-side element type, e.g. `ResourceNode`.
    pub element: String,
    pub label: String,
}

/// Owned metadata for one selected element, as exported by the host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetadataItem {
    Method(MethodDef),
    Type(TypeDef),
    Property(PropertyDef),
    Field(FieldDef),
    Assembly(AssemblyDef),
    Module(ModuleDef),
    Namespace(NamespaceDef),
    Other(OtherNode),
}

impl MetadataItem {
    /// Borrowed view for describing.
    pub fn as_node(&self) -> SelectionNode<'_> {
        match self {
            MetadataItem::Method(m) => SelectionNode::Method(m),
            MetadataItem::Type(t) => SelectionNode::Type(t),
            MetadataItem::Property(p) => SelectionNode::Property(p),
            MetadataItem::Field(f) => SelectionNode::Field(f),
            MetadataItem::Assembly(a) => SelectionNode::Assembly(a),
            MetadataItem::Module(m) => SelectionNode::Module(m),
            MetadataItem::Namespace(n) => SelectionNode::Namespace(n),
            MetadataItem::Other(o) => SelectionNode::Other(o),
        }
    }
}

/// One selected element, borrowed from host-owned metadata.
#[derive(Debug, Clone, Copy)]
pub enum SelectionNode<'a> {
    Method(&'a MethodDef),
    Type(&'a TypeDef),
    Property(&'a PropertyDef),
    Field(&'a FieldDef),
    Assembly(&'a AssemblyDef),
    Module(&'a ModuleDef),
    Namespace(&'a NamespaceDef),
    Other(&'a OtherNode),
}

impl<'a> SelectionNode<'a> {
    /// Short tag naming the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SelectionNode::Method(_) => "MethodNode",
            SelectionNode::Type(_) => "TypeNode",
            SelectionNode::Property(_) => "PropertyNode",
            SelectionNode::Field(_) => "FieldNode",
            SelectionNode::Assembly(_) => "AssemblyNode",
            SelectionNode::Module(_) => "ModuleNode",
            SelectionNode::Namespace(_) => "NamespaceNode",
            SelectionNode::Other(_) => "OtherNode",
        }
    }

    /// Label as shown in the host's tree view.
    pub fn display_name(&self) -> &'a str {
        match self {
            SelectionNode::Method(m) => &m.full_name,
            SelectionNode::Type(t) => &t.full_name,
            SelectionNode::Property(p) => &p.name,
            SelectionNode::Field(f) => &f.name,
            SelectionNode::Assembly(a) => &a.full_name,
            SelectionNode::Module(m) => &m.name,
            SelectionNode::Namespace(n) => &n.name,
            SelectionNode::Other(o) => &o.label,
        }
    }
}

/// Supplies the user's current selection.
///
/// Implementations must return an empty sequence rather than fail when no
/// selection exists or the host integration is unavailable.
pub trait SelectionSource {
    fn current_selection(&self) -> Vec<SelectionNode<'_>>;
}

/// A selection exported by the host as a JSON document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SelectionFile {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

impl SelectionFile {
    /// An unavailable selection.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self, SelectionError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SelectionError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl SelectionSource for SelectionFile {
    fn current_selection(&self) -> Vec<SelectionNode<'_>> {
        self.items.iter().map(MetadataItem::as_node).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_items() {
        let doc = r#"{
            "items": [
                {"kind": "namespace", "name": "Game.Net"},
                {"kind": "field", "name": "health", "type_name": "System.Int32", "access": "Private"},
                {"kind": "module", "name": "Game.dll", "runtime_version": "v4.0.30319", "type_count": 12}
            ]
        }"#;
        let selection = SelectionFile::parse(doc).unwrap();
        assert_eq!(selection.len(), 3);

        let nodes = selection.current_selection();
        assert_eq!(nodes[0].kind(), "NamespaceNode");
        assert_eq!(nodes[1].display_name(), "health");
        assert!(matches!(nodes[2], SelectionNode::Module(m) if m.type_count == 12));
    }

    #[test]
    fn test_method_defaults() {
        let doc = r#"{"items": [{
            "kind": "method",
            "name": "Tick",
            "full_name": "System.Void Game.Player::Tick()",
            "access": "Public",
            "return_type": "System.Void"
        }]}"#;
        let selection = SelectionFile::parse(doc).unwrap();
        match &selection.items[0] {
            MetadataItem::Method(m) => {
                assert!(m.body.is_none());
                assert!(m.parameters.is_empty());
                assert_eq!(m.attributes, "");
            }
            other => panic!("expected method, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_selection_source() {
        let selection = SelectionFile::empty();
        assert!(selection.current_selection().is_empty());
        assert!(SelectionFile::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            SelectionFile::parse("{\"items\": [{\"kind\": \"bogus\"}]}"),
            Err(SelectionError::Json(_))
        ));
    }

    #[test]
    fn test_parameter_list() {
        let method = MethodDef {
            name: "Add".into(),
            full_name: "System.Int32 Calc::Add(System.Int32,System.Int32)".into(),
            access: "Public".into(),
            attributes: String::new(),
            return_type: "System.Int32".into(),
            parameters: vec![
                Parameter::new("System.Int32", "a"),
                Parameter::new("System.Int32", "b"),
            ],
            body: None,
        };
        assert_eq!(method.parameter_list(), "System.Int32 a, System.Int32 b");
    }
}
