// ── Wildcard identifier filter ──
//
// Glob-style matching for change ids: `*` matches any run of characters,
// `?` exactly one, everything else itself. Anchored at both ends.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Star,
    AnyChar,
    Literal(char),
}

/// A compiled wildcard pattern. An empty pattern matches every identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct WildcardMatcher {
    pattern: String,
    tokens: Vec<Token>,
}

impl WildcardMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let mut tokens = Vec::with_capacity(pattern.len());
        for c in pattern.chars() {
            let token = match c {
                '*' => Token::Star,
                '?' => Token::AnyChar,
                other => Token::Literal(other),
            };
            // Runs of `*` are equivalent to one.
            if token == Token::Star && tokens.last() == Some(&Token::Star) {
                continue;
            }
            tokens.push(token);
        }
        Self { pattern, tokens }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether this pattern accepts everything.
    pub fn is_match_all(&self) -> bool {
        self.tokens.is_empty() || self.tokens == [Token::Star]
    }

    pub fn matches(&self, id: &str) -> bool {
        if self.tokens.is_empty() {
            return true;
        }

        let text: Vec<char> = id.chars().collect();
        let (mut t, mut p) = (0usize, 0usize);
        // Position of the last `*` seen and the text index it was tried at.
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::Star) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(Token::AnyChar) => {
                    t += 1;
                    p += 1;
                }
                Some(Token::Literal(c)) if text.get(t) == Some(c) => {
                    t += 1;
                    p += 1;
                }
                _ => match backtrack {
                    Some((star, from)) => {
                        p = star + 1;
                        t = from + 1;
                        backtrack = Some((star, from + 1));
                    }
                    None => return false,
                },
            }
        }

        self.tokens
            .get(p..)
            .is_some_and(|rest| rest.iter().all(|tok| *tok == Token::Star))
    }
}

impl fmt::Debug for WildcardMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WildcardMatcher").field(&self.pattern).finish()
    }
}
