//! Locating the tokens that open a component's source.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords that can begin the first statement of a component module.
pub const CODE_OPENING_TOKENS: [&str; 4] = ["import", "function", "const", "export"];

static ANY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:import|function|const|export)\b").expect("static regex")
});

/// Byte offset of the first code-opening keyword appearing as a whole word.
pub fn first_code_token(text: &str) -> Option<usize> {
    ANY_TOKEN.find(text).map(|m| m.start())
}

/// Byte offset of the first code-opening keyword anywhere, even inside a
/// longer word.
pub fn first_token_substring(text: &str) -> Option<usize> {
    CODE_OPENING_TOKENS
        .iter()
        .filter_map(|token| text.find(token))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_words_only() {
        assert_eq!(first_code_token("constant functionality"), None);
        assert_eq!(first_code_token("use const x"), Some(4));
        assert_eq!(first_code_token("export default App;"), Some(0));
    }

    #[test]
    fn earliest_keyword_wins_even_mid_line() {
        let text = "Sure! Here it is: import React from 'react';\nexport default App;";
        assert_eq!(first_code_token(text), text.find("import"));
        assert_eq!(first_code_token("no code here"), None);
    }

    #[test]
    fn substring_search_finds_embedded_keywords() {
        assert_eq!(first_token_substring("the constant"), Some(4));
        assert_eq!(first_token_substring("nothing"), None);
    }
}
