//! The "analyze this selection" pipeline.
//!
//! describe -> build prompt -> dispatch -> parse, with every failure
//! rendered into a marked string. The analyzer holds no per-call state, so
//! one instance can serve concurrent calls.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::describe;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::error::{AnalysisError, FAILURE_MARKER};
use crate::metadata::SelectionNode;
use crate::prompt::{self, AnalysisMode};
use crate::response;
use crate::settings::Settings;
use crate::tokens;

/// Returned without doing any work when no API key is configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "❌ **API not configured**\n\n\
     Set your API key with `ilprobe config set api_key <KEY>` or the OPENAI_API_KEY environment variable.";

/// Shown as the preview when nothing is selected.
pub const NO_SELECTION_PREVIEW: &str = "(no code selected)";

/// Result of one analysis: the answer or a classified failure.
pub type AnalysisResult = Result<String, AnalysisError>;

/// Analysis pipeline bound to one mode.
pub struct Analyzer {
    mode: AnalysisMode,
    dispatcher: Dispatcher,
}

impl Analyzer {
    pub fn new(mode: AnalysisMode) -> Self {
        Self::with_dispatcher(mode, Dispatcher::new())
    }

    pub fn with_dispatcher(mode: AnalysisMode, dispatcher: Dispatcher) -> Self {
        Self { mode, dispatcher }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    /// Message sent for an "analyze current selection" trigger.
    pub fn selection_request(&self) -> String {
        format!("Analyze the selected code for {}", self.mode.subject())
    }

    /// Run the pipeline and return a display-ready string.
    ///
    /// Never fails: errors come back rendered with the failure marker.
    pub async fn analyze(
        &self,
        user_message: &str,
        nodes: &[SelectionNode<'_>],
        settings: &Settings,
        cancel: Option<CancellationToken>,
    ) -> String {
        if !settings.is_configured() {
            info!("analysis requested without an API key");
            return NOT_CONFIGURED_MESSAGE.to_string();
        }

        let prompt = self.build_prompt(user_message, nodes);
        let cancel = cancel.unwrap_or_default();

        match self.run(&prompt, settings, &cancel).await {
            Ok(text) => text,
            Err(e) => {
                info!(kind = %e.kind(), "analysis failed");
                e.render(tokens::estimate(&prompt))
            }
        }
    }

    /// Like [`Analyzer::analyze`] but keeps the failure classified.
    pub async fn try_analyze(
        &self,
        user_message: &str,
        nodes: &[SelectionNode<'_>],
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        if !settings.is_configured() {
            return Err(DispatchError::MissingCredential.into());
        }
        let prompt = self.build_prompt(user_message, nodes);
        self.run(&prompt, settings, cancel).await
    }

    fn build_prompt(&self, user_message: &str, nodes: &[SelectionNode<'_>]) -> String {
        let description = describe::describe(nodes);
        let prompt = prompt::build(self.mode, user_message, description.as_str());
        debug!(
            mode = %self.mode,
            nodes = nodes.len(),
            description_chars = description.len(),
            prompt_chars = prompt.len(),
            "built prompt"
        );
        prompt
    }

    async fn run(
        &self,
        prompt: &str,
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        let config = settings.prompt_configuration();
        let outcome = self
            .dispatcher
            .dispatch(prompt, self.mode, &config, cancel)
            .await?;
        let text = response::parse(&outcome.body, outcome.format)?;
        info!(
            format = %outcome.format,
            estimated_tokens = outcome.estimated_tokens,
            chars = text.len(),
            "analysis complete"
        );
        Ok(text)
    }
}

/// Short preview of what will be analyzed.
///
/// Mode-independent and offline, so callers need no [`Analyzer`].
pub fn preview(nodes: &[SelectionNode<'_>]) -> String {
    if nodes.is_empty() {
        return NO_SELECTION_PREVIEW.to_string();
    }
    describe::describe(nodes).into_string()
}

/// Whether a display string is a rendered failure.
pub fn is_failure(output: &str) -> bool {
    output.starts_with(FAILURE_MARKER)
}
