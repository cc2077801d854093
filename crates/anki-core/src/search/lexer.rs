//! Splits a raw search string into whitespace-delimited terms, honouring
//! double-quoted phrases the way the teacher's lexer honours quoted
//! literals (`examples/shivangp76-spares/spares/src/search/lexer.rs`).
//!
//! A quote may open anywhere inside a term (`deck:"Spanish Verbs"`), not
//! just at its start — everything up to the matching close quote,
//! including interior spaces, becomes part of that one term.

/// One raw term lifted off the query string, quotes already stripped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub text: String,
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }

    while chars.peek().is_some() {
        let mut term = String::new();
        let mut in_quotes = false;
        loop {
            match chars.peek() {
                None => break,
                Some(&c) if c == '"' => {
                    in_quotes = !in_quotes;
                    chars.next();
                }
                Some(&c) if c.is_whitespace() && !in_quotes => break,
                Some(&c) => {
                    term.push(c);
                    chars.next();
                }
            }
        }
        if !term.is_empty() {
            tokens.push(Token { text: term });
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        let tokens = tokenize("deck:Spanish tag:verb is:due");
        assert_eq!(
            tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
            vec!["deck:Spanish", "tag:verb", "is:due"]
        );
    }

    #[test]
    fn quoted_phrase_preserves_internal_spaces() {
        let tokens = tokenize(r#"deck:"Spanish Verbs" foo"#);
        assert_eq!(tokens[0].text, "deck:Spanish Verbs");
        assert_eq!(tokens[1].text, "foo");
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn bare_quoted_phrase() {
        let tokens = tokenize(r#""hello world""#);
        assert_eq!(tokens[0].text, "hello world");
    }
}
