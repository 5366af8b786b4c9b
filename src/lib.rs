//! ilprobe - ask a remote model about decompiled .NET code.
//!
//! ilprobe takes a selection of .NET metadata nodes (methods with their IL
//! bodies, types, fields, properties, assemblies, modules, namespaces),
//! renders a complete textual description of them, wraps it in an analysis
//! prompt, and sends it to an OpenAI-compatible completion endpoint.
//!
//! # Architecture
//!
//! - `metadata`: Selection model and the JSON selection export
//! - `describe`: Textual description of selected nodes, IL listings included
//! - `prompt`: Analysis modes and prompt templates
//! - `tokens`: Token estimate and the request ceiling
//! - `wire`: Request/response shapes for the two endpoint formats
//! - `dispatch`: HTTP dispatch with timeout and cancellation
//! - `response`: Answer text extraction
//! - `analyzer`: The end-to-end pipeline, returning display strings
//! - `settings`: Persisted user settings
//! - `error`: Failure classification and rendering
//! - `report`: Terminal output

pub mod analyzer;
pub mod cli;
pub mod describe;
pub mod dispatch;
pub mod error;
pub mod metadata;
pub mod prompt;
pub mod report;
pub mod response;
pub mod settings;
pub mod tokens;
pub mod wire;

pub use analyzer::{is_failure, AnalysisResult, Analyzer};
pub use describe::{describe, CodeDescription};
pub use dispatch::{DispatchError, Dispatcher, Transport};
pub use error::{AnalysisError, ErrorKind};
pub use metadata::{MetadataItem, SelectionFile, SelectionNode, SelectionSource};
pub use prompt::AnalysisMode;
pub use settings::{PromptConfiguration, Settings, SettingsStore};
pub use wire::WireFormat;
