//! Line tokenizer.
//!
//! Splits one source line into tokens with 1-based column positions. A `#` or
//! `//` at the start of a token begins a comment that runs to end of line.

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word(String),
    /// `@name` or `@name:persist`, text after the `@`.
    Dest(String),
    /// `$name`
    Reference(String),
    /// `?name`
    Hole(String),
    Str(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

/// Tokens of one line plus its trailing comment, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexedLine {
    pub tokens: Vec<Token>,
    pub comment: Option<String>,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ',' | '"')
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.chars().next().is_some_and(|c| c.is_ascii_digit()) && word.parse::<f64>().is_ok()
}

/// Tokenize a single line.
pub fn tokenize_line(text: &str, line: usize) -> Result<LexedLine, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = LexedLine::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/')) {
            let skip = if c == '#' { 1 } else { 2 };
            let comment: String = chars[i + skip..].iter().collect();
            let comment = comment.trim();
            if !comment.is_empty() {
                out.comment = Some(comment.to_string());
            }
            break;
        }

        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            out.tokens.push(Token { kind, column });
            i += 1;
            continue;
        }

        if c == '"' {
            let mut value = String::new();
            let mut j = i + 1;
            let mut closed = false;
            while j < chars.len() {
                match chars[j] {
                    '\\' if j + 1 < chars.len() => {
                        value.push(chars[j + 1]);
                        j += 2;
                    }
                    '"' => {
                        closed = true;
                        j += 1;
                        break;
                    }
                    other => {
                        value.push(other);
                        j += 1;
                    }
                }
            }
            if !closed {
                return Err(ParseError::UnterminatedString { line, column });
            }
            out.tokens.push(Token {
                kind: TokenKind::Str(value),
                column,
            });
            i = j;
            continue;
        }

        let start = i;
        while i < chars.len() && !is_delimiter(chars[i]) {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        let kind = if let Some(rest) = word.strip_prefix('@') {
            TokenKind::Dest(rest.to_string())
        } else if let Some(rest) = word.strip_prefix('$') {
            TokenKind::Reference(rest.to_string())
        } else if let Some(rest) = word.strip_prefix('?') {
            TokenKind::Hole(rest.to_string())
        } else if looks_numeric(&word) {
            TokenKind::Number(word)
        } else {
            TokenKind::Word(word)
        };
        out.tokens.push(Token { kind, column });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize_line(text, 1)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_statement_with_destination() {
        assert_eq!(
            kinds("@f:fact isA $x ?y"),
            vec![
                TokenKind::Dest("f:fact".into()),
                TokenKind::Word("isA".into()),
                TokenKind::Reference("x".into()),
                TokenKind::Hole("y".into()),
            ]
        );
    }

    #[test]
    fn strings_numbers_and_delimiters() {
        assert_eq!(
            kinds("set \"a \\\"b\\\"\" -3.5 (f [a, b])"),
            vec![
                TokenKind::Word("set".into()),
                TokenKind::Str("a \"b\"".into()),
                TokenKind::Number("-3.5".into()),
                TokenKind::LParen,
                TokenKind::Word("f".into()),
                TokenKind::LBracket,
                TokenKind::Word("a".into()),
                TokenKind::Comma,
                TokenKind::Word("b".into()),
                TokenKind::RBracket,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn comments_are_captured() {
        let lexed = tokenize_line("isA Rex Dog # a good boy", 1).unwrap();
        assert_eq!(lexed.tokens.len(), 3);
        assert_eq!(lexed.comment.as_deref(), Some("a good boy"));

        let lexed = tokenize_line("// only a comment", 1).unwrap();
        assert!(lexed.tokens.is_empty());
    }

    #[test]
    fn hyphenated_words_are_not_numbers() {
        assert_eq!(kinds("part-of -x"), vec![
            TokenKind::Word("part-of".into()),
            TokenKind::Word("-x".into()),
        ]);
    }

    #[test]
    fn unterminated_string_reports_column() {
        let err = tokenize_line("Load \"core", 4).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedString { line: 4, column: 6 }));
    }
}
