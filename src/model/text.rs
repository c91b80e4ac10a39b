//! Tokenisation helpers for the description full-text index

use std::collections::BTreeSet;

/// Longest token kept in the index
const MAX_TOKEN_LEN: usize = 40;

/// Split a text into lowercase alphanumeric tokens, deduplicated
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase()
		.split(|c: char| !c.is_alphanumeric())
		.filter(|t| !t.is_empty())
		.map(|t| t.chars().take(MAX_TOKEN_LEN).collect::<String>())
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

/// Render a description as the token document stored in `desc_fts`
pub fn fts_document(description: &str) -> String {
	tokenize(description).join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tokenize() {
		assert_eq!(
			tokenize("Hello, hello WORLD! 42"),
			vec!["42".to_string(), "hello".to_string(), "world".to_string()]
		);
		assert!(tokenize("...").is_empty());
	}

	#[test]
	fn test_fts_document() {
		assert_eq!(fts_document("The quick; the slow"), "quick slow the");
	}
}
