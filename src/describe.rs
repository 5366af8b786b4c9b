//! Textual description of selected metadata nodes.
//!
//! The description is what the remote model actually reads, so method
//! bodies are rendered in full: every instruction, every local slot, every
//! exception handler region. Only the type-level overviews are capped
//! (interfaces, fields, method signatures) to keep huge types readable.
//! Size enforcement happens later, at dispatch.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::metadata::{
    AssemblyDef, FieldDef, MethodBody, MethodDef, ModuleDef, PropertyDef, SelectionNode, TypeDef,
};

/// Caps for type-level overviews.
pub mod limits {
    pub const MAX_INTERFACES: usize = 5;
    pub const MAX_FIELDS: usize = 10;
    pub const MAX_METHODS: usize = 10;
    pub const MAX_SECURITY_ATTRIBUTES: usize = 5;
}

const INDENT: &str = "   ";
const NESTED: &str = "      ";

lazy_static! {
    /// Assembly attributes worth surfacing for a security review.
    static ref SECURITY_ATTRIBUTE: Regex =
        Regex::new(r"Security|Permission|Unsafe|Unmanaged|DllImport|Marshal").unwrap();
}

/// Failure describing a single node. Never aborts the whole pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("exception handler boundary IL_{offset:04X} does not match any instruction")]
    UnknownHandlerOffset { offset: u32 },
    #[error("instruction offset IL_{offset:04X} does not follow IL_{previous:04X}")]
    UnorderedInstructions { previous: u32, offset: u32 },
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Extraction
    }
}

/// Rendered description of a selection. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDescription(String);

impl CodeDescription {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CodeDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only line buffer.
#[derive(Default)]
struct Lines {
    buf: String,
}

impl Lines {
    fn line(&mut self, text: impl AsRef<str>) {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    fn append(&mut self, other: Lines) {
        self.buf.push_str(&other.buf);
    }
}

/// Describe a selection.
///
/// An empty selection yields a diagnostic text instead of an error, since
/// the same pipeline also serves free-form questions with no code attached.
pub fn describe(nodes: &[SelectionNode<'_>]) -> CodeDescription {
    if nodes.is_empty() {
        debug!("no selection; emitting diagnostic description");
        return no_selection();
    }

    let mut out = Lines::default();
    out.line(format!(
        "=== SELECTED CODE ANALYSIS ({} items) ===",
        nodes.len()
    ));
    out.blank();

    for node in nodes {
        out.line(format!("📁 **{}**: {}", node.kind(), node.display_name()));
        match describe_node(node) {
            Ok(detail) => out.append(detail),
            Err(e) => {
                warn!(
                    node = node.display_name(),
                    kind = %e.kind(),
                    error = %e,
                    "extraction failed"
                );
                out.line(format!(
                    "❌ Error extracting info from {}: {}",
                    node.kind(),
                    e
                ));
            }
        }
        out.blank();
    }

    debug!(
        nodes = nodes.len(),
        chars = out.buf.len(),
        "described selection"
    );
    CodeDescription(out.buf)
}

fn no_selection() -> CodeDescription {
    let mut out = Lines::default();
    out.line("**NO SELECTION**: No specific code was provided. This could mean:");
    out.line("1. Nothing is selected in the host's tree view");
    out.line("2. The host integration is not connected");
    out.line("3. The selection could not be read from the host");
    out.blank();
    out.line(
        "**Instructions**: Select a method, type, or assembly before requesting a selection analysis.",
    );
    out.blank();
    out.line("This is a general analysis request.");
    CodeDescription(out.buf)
}

fn describe_node(node: &SelectionNode<'_>) -> Result<Lines, ExtractionError> {
    let mut out = Lines::default();
    match *node {
        SelectionNode::Method(m) => describe_method(&mut out, m)?,
        SelectionNode::Type(t) => describe_type(&mut out, t),
        SelectionNode::Property(p) => describe_property(&mut out, p)?,
        SelectionNode::Field(f) => describe_field(&mut out, f),
        SelectionNode::Assembly(a) => describe_assembly(&mut out, a),
        SelectionNode::Module(m) => describe_module(&mut out, m),
        SelectionNode::Namespace(n) => out.line(format!("{INDENT}**Namespace**: {}", n.name)),
        SelectionNode::Other(o) => {
            out.line(format!("{INDENT}Type: {}", o.element));
            out.line(format!("{INDENT}Info: {}", o.label));
        }
    }
    Ok(out)
}

fn describe_method(out: &mut Lines, method: &MethodDef) -> Result<(), ExtractionError> {
    out.line(format!("{INDENT}**Method**: {}", method.full_name));
    out.line(format!("{INDENT}**Access**: {}", method.access));
    out.line(format!("{INDENT}**Attributes**: {}", method.attributes));
    out.line(format!("{INDENT}**Return Type**: {}", method.return_type));

    if !method.parameters.is_empty() {
        out.line(format!("{INDENT}**Parameters**:"));
        for param in &method.parameters {
            out.line(format!("{NESTED}- {} {}", param.type_name, param.name));
        }
    }

    let body = match &method.body {
        Some(body) if !body.instructions.is_empty() => body,
        _ => return Ok(()),
    };
    validate_body(body)?;

    out.line(format!(
        "{INDENT}**Complete IL Method Body** ({} instructions):",
        body.instructions.len()
    ));
    write_listing(out, body);

    if !body.locals.is_empty() {
        out.line(format!("{INDENT}**Local Variables**:"));
        for (i, local) in body.locals.iter().enumerate() {
            out.line(format!("{NESTED}V_{}: {}", i, local.type_name));
        }
    }

    if !body.exception_handlers.is_empty() {
        out.line(format!("{INDENT}**Exception Handlers**:"));
        for eh in &body.exception_handlers {
            out.line(format!(
                "{NESTED}{}: {} - {} -> {} - {}",
                eh.kind,
                il_label(eh.try_start),
                end_label(eh.try_end),
                il_label(eh.handler_start),
                end_label(eh.handler_end),
            ));
        }
    }

    Ok(())
}

fn describe_type(out: &mut Lines, ty: &TypeDef) {
    use limits::*;

    out.line(format!("{INDENT}**Type**: {}", ty.full_name));
    out.line(format!("{INDENT}**Access**: {}", ty.visibility));
    out.line(format!("{INDENT}**Attributes**: {}", ty.attributes));

    if let Some(base) = &ty.base_type {
        out.line(format!("{INDENT}**Base Type**: {}", base));
    }

    if !ty.interfaces.is_empty() {
        out.line(format!("{INDENT}**Interfaces**:"));
        for iface in ty.interfaces.iter().take(MAX_INTERFACES) {
            out.line(format!("{NESTED}- {}", iface));
        }
    }

    out.line(format!(
        "{INDENT}**Members**: {} methods, {} fields, {} properties",
        ty.methods.len(),
        ty.fields.len(),
        ty.properties.len()
    ));

    if !ty.fields.is_empty() {
        out.line(format!("{INDENT}**Fields**:"));
        for field in ty.fields.iter().take(MAX_FIELDS) {
            let value = field
                .constant
                .as_ref()
                .map(|c| format!(" = {}", c))
                .unwrap_or_default();
            out.line(format!(
                "{NESTED}{} {} {}{}",
                field.access, field.type_name, field.name, value
            ));
        }
    }

    if !ty.methods.is_empty() {
        out.line(format!(
            "{INDENT}**Methods** (signatures only, full IL shown when a method is selected):"
        ));
        for method in ty.methods.iter().take(MAX_METHODS) {
            out.line(format!(
                "{NESTED}{} {} {}({})",
                method.access,
                method.return_type,
                method.name,
                method.parameter_list()
            ));
        }
    }
}

fn describe_property(out: &mut Lines, property: &PropertyDef) -> Result<(), ExtractionError> {
    out.line(format!("{INDENT}**Property**: {}", property.name));
    out.line(format!("{INDENT}**Type**: {}", property.type_name));
    out.line(format!("{INDENT}**Getter**: {}", yes_no(property.getter.is_some())));
    out.line(format!("{INDENT}**Setter**: {}", yes_no(property.setter.is_some())));

    for (label, accessor) in [("Getter", &property.getter), ("Setter", &property.setter)] {
        if let Some(body) = accessor.as_ref().and_then(|m| m.body.as_ref()) {
            validate_body(body)?;
            out.line(format!("{INDENT}**{} IL Code**:", label));
            write_listing(out, body);
        }
    }

    Ok(())
}

fn describe_field(out: &mut Lines, field: &FieldDef) {
    out.line(format!("{INDENT}**Field**: {}", field.name));
    out.line(format!("{INDENT}**Type**: {}", field.type_name));
    out.line(format!("{INDENT}**Access**: {}", field.access));
    out.line(format!("{INDENT}**Attributes**: {}", field.attributes));
    if let Some(constant) = &field.constant {
        out.line(format!("{INDENT}**Constant Value**: {}", constant));
    }
}

fn describe_assembly(out: &mut Lines, asm: &AssemblyDef) {
    out.line(format!("{INDENT}**Assembly**: {}", asm.full_name));
    out.line(format!("{INDENT}**Version**: {}", asm.version));

    let security: Vec<&String> = asm
        .custom_attributes
        .iter()
        .filter(|name| is_security_relevant_attribute(name))
        .take(limits::MAX_SECURITY_ATTRIBUTES)
        .collect();

    if !security.is_empty() {
        out.line(format!("{INDENT}**Security Attributes**:"));
        for attr in security {
            out.line(format!("{NESTED}- {}", attr));
        }
    }
}

fn describe_module(out: &mut Lines, module: &ModuleDef) {
    out.line(format!("{INDENT}**Module**: {}", module.name));
    out.line(format!("{INDENT}**Runtime**: {}", module.runtime_version));
    out.line(format!("{INDENT}**Types**: {}", module.type_count));
}

/// Whether an attribute type name hints at security-sensitive behaviour.
pub fn is_security_relevant_attribute(name: &str) -> bool {
    SECURITY_ATTRIBUTE.is_match(name)
}

/// Render one instruction as `IL_XXXX: opcode operand`.
pub fn format_instruction(offset: u32, opcode: &str, operand: Option<&str>) -> String {
    let line = format!("{}: {:<12} {}", il_label(offset), opcode, operand.unwrap_or(""));
    line.trim_end().to_string()
}

fn write_listing(out: &mut Lines, body: &MethodBody) {
    out.line(format!("{INDENT}```il"));
    for instr in &body.instructions {
        out.line(format!(
            "{INDENT}{}",
            format_instruction(instr.offset, &instr.opcode, instr.operand.as_deref())
        ));
    }
    out.line(format!("{INDENT}```"));
}

/// Offsets must be strictly increasing and every handler boundary must
/// land on an instruction.
fn validate_body(body: &MethodBody) -> Result<(), ExtractionError> {
    for pair in body.instructions.windows(2) {
        if pair[1].offset <= pair[0].offset {
            return Err(ExtractionError::UnorderedInstructions {
                previous: pair[0].offset,
                offset: pair[1].offset,
            });
        }
    }

    let offsets: HashSet<u32> = body.instructions.iter().map(|i| i.offset).collect();
    for eh in &body.exception_handlers {
        let boundaries = [
            Some(eh.try_start),
            eh.try_end,
            Some(eh.handler_start),
            eh.handler_end,
        ];
        for offset in boundaries.into_iter().flatten() {
            if !offsets.contains(&offset) {
                return Err(ExtractionError::UnknownHandlerOffset { offset });
            }
        }
    }

    Ok(())
}

fn il_label(offset: u32) -> String {
    format!("IL_{:04X}", offset)
}

fn end_label(offset: Option<u32>) -> String {
    offset.map(il_label).unwrap_or_else(|| "end".to_string())
}

fn yes_no(present: bool) -> &'static str {
    if present {
        "Yes"
    } else {
        "No"
    }
}
