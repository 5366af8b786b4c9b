//! Token count estimation for outgoing prompts.
//!
//! The remote service bills and limits by tokens, which we cannot count
//! exactly without its tokenizer. IL listings are dense and symbol-heavy,
//! so we assume 3.5 characters per token (prose is closer to 4), pad the
//! result by 10%, and add a fixed allowance for the system instruction and
//! protocol overhead.

/// 3.5 characters per token padded by 10% is 11 tokens per 35 characters.
/// Kept as integers so the rounding is exact.
const TOKENS_PER_SPAN: usize = 11;
const CHARS_PER_SPAN: usize = 35;

/// Fixed allowance for system instruction and request framing.
pub const OVERHEAD_TOKENS: usize = 1000;

/// Requests estimated above this are rejected before any network call.
pub const REQUEST_TOKEN_CEILING: usize = 120_000;

/// Estimate the token count of `text`.
pub fn estimate(text: &str) -> usize {
    let chars = text.chars().count();
    (chars * TOKENS_PER_SPAN).div_ceil(CHARS_PER_SPAN) + OVERHEAD_TOKENS
}

/// Whether a prompt of this size may be sent.
pub fn within_ceiling(text: &str) -> bool {
    estimate(text) <= REQUEST_TOKEN_CEILING
}
