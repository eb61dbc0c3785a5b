const MAX_CONTENT_BYTES: usize = 2000;
const MAX_REPEATED_CHARS: usize = 10;

const SPAM_PHRASES: [&str; 9] = [
    "airdrop",
    "giveaway",
    "free btc",
    "free bitcoin",
    "claim now",
    "limited time",
    "act fast",
    "100% profit",
    "guaranteed return",
];

/// Heuristic check for bot or scam content
pub fn is_spam(content: &str) -> bool {
    if content.trim().is_empty() || content.len() > MAX_CONTENT_BYTES {
        return true;
    }

    let lower = content.to_lowercase();
    if SPAM_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return true;
    }

    has_long_run(content)
}

fn has_long_run(content: &str) -> bool {
    let mut previous = None;
    let mut run = 0;
    for c in content.chars() {
        if previous == Some(c) {
            run += 1;
            if run > MAX_REPEATED_CHARS {
                return true;
            }
        } else {
            previous = Some(c);
            run = 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("   \n\t")]
    #[case("Huge AIRDROP today")]
    #[case("claim now: free bitcoin")]
    #[case("aaaaaaaaaaa")]
    #[case("wowwwwwwwwwwwww")]
    fn test_is_spam(#[case] content: &str) {
        assert!(is_spam(content), "expected spam: {content:?}");
    }

    #[rstest]
    #[case("gm")]
    #[case("こんにちは！")]
    #[case("aaaaaaaaaa")]
    #[case("see https://example.com/x now")]
    fn test_is_not_spam(#[case] content: &str) {
        assert!(!is_spam(content), "expected ham: {content:?}");
    }

    #[test]
    fn test_is_spam_too_long() {
        assert!(!is_spam(&"ab".repeat(1000)));
        assert!(is_spam(&"ab".repeat(1001)));
    }
}
