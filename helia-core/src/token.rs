/// Approximate number of characters per model token
pub const CHARS_PER_TOKEN: u64 = 4;

/// Estimates the token count of a piece of text as `ceil(chars / 4)`
///
/// This is the only tokenizer the metering uses; it is crude and provider
/// independent. Characters are Unicode scalar values.
///
/// # Examples
///
/// ```
/// use helia_core::token::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(CHARS_PER_TOKEN)
}

/// Running total of estimated tokens over a chat session
///
/// # Examples
///
/// ```
/// use helia_core::TokenCounter;
///
/// let mut counter = TokenCounter::default();
/// counter.observe("Hello, world!");
/// assert_eq!(counter.total(), 4);
/// ```
#[derive(Default, Clone, Debug)]
pub struct TokenCounter {
    total: u64,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self { total: 0 }
    }

    /// Adds the estimate for `text` to the total
    pub fn observe(&mut self, text: &str) {
        self.total += estimate_tokens(text);
    }

    /// Adds an already computed token count
    pub fn add(&mut self, tokens: u64) {
        self.total += tokens;
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
