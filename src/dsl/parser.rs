//! Minimal line-oriented parser.
//!
//! One statement per line. `graph` and `solve` statements open a block that
//! runs until a line holding only `end`.

use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize_line};
use super::{Block, Expr, Program, SourceLoc, Statement};

/// Parse a whole program. `file` is recorded in every statement's source.
pub fn parse_program(text: &str, file: Option<&str>) -> Result<Program, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0;
    let statements = parse_lines(&lines, &mut cursor, file, None)?;
    Ok(Program { statements })
}

/// Parse exactly one statement from a single line of text.
pub fn parse_statement(text: &str) -> Result<Option<Statement>, ParseError> {
    let lexed = tokenize_line(text, 1)?;
    if lexed.tokens.is_empty() {
        return Ok(None);
    }
    statement_from_tokens(&lexed.tokens, lexed.comment, None, 1).map(Some)
}

struct OpenBlock<'a> {
    kind: &'a str,
    name: String,
    line: usize,
}

fn parse_lines(
    lines: &[&str],
    cursor: &mut usize,
    file: Option<&str>,
    open: Option<OpenBlock<'_>>,
) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();

    while *cursor < lines.len() {
        let line_no = *cursor + 1;
        let lexed = tokenize_line(lines[*cursor], line_no)?;
        *cursor += 1;

        if lexed.tokens.is_empty() {
            continue;
        }
        if lexed.tokens.len() == 1 && lexed.tokens[0].kind == TokenKind::Word("end".into()) {
            if open.is_some() {
                return Ok(statements);
            }
            return Err(ParseError::StrayEnd { line: line_no });
        }

        let mut statement = statement_from_tokens(&lexed.tokens, lexed.comment, file, line_no)?;

        if matches!(statement.operator.as_str(), "graph" | "solve") {
            let kind = statement.operator.clone();
            let name = statement
                .destination
                .clone()
                .ok_or_else(|| ParseError::AnonymousBlock {
                    kind: kind.clone(),
                    line: line_no,
                })?;
            let body = parse_lines(
                lines,
                cursor,
                file,
                Some(OpenBlock {
                    kind: if kind == "graph" { "graph" } else { "solve" },
                    name,
                    line: line_no,
                }),
            )?;
            statement.block = Some(if kind == "graph" {
                Block::Graph {
                    params: statement.args.iter().map(Expr::atom_text).collect(),
                    body,
                }
            } else {
                let solve_kind = statement
                    .args
                    .first()
                    .map(Expr::atom_text)
                    .unwrap_or_else(|| "csp".to_string());
                Block::Solve {
                    kind: solve_kind,
                    body,
                }
            });
        }

        statements.push(statement);
    }

    match open {
        Some(block) => Err(ParseError::UnterminatedBlock {
            kind: block.kind.to_string(),
            name: block.name,
            line: block.line,
        }),
        None => Ok(statements),
    }
}

fn statement_from_tokens(
    tokens: &[Token],
    comment: Option<String>,
    file: Option<&str>,
    line: usize,
) -> Result<Statement, ParseError> {
    let column = tokens[0].column;
    let mut pos = 0;

    let (destination, persist_name) = match &tokens[0].kind {
        TokenKind::Dest(text) => {
            pos = 1;
            parse_destination(text, line)?
        }
        _ => (None, None),
    };

    let operator = match tokens.get(pos).map(|t| &t.kind) {
        Some(TokenKind::Word(w)) => w.clone(),
        Some(other) => {
            return Err(ParseError::UnexpectedToken {
                found: describe(other),
                line,
                column: tokens[pos].column,
            });
        }
        None => return Err(ParseError::MissingOperator { line }),
    };
    pos += 1;

    let mut args = Vec::new();
    while pos < tokens.len() {
        args.push(parse_expr(tokens, &mut pos, line)?);
    }

    Ok(Statement {
        is_persistent: persist_name.is_some(),
        destination,
        persist_name,
        operator,
        args,
        source: SourceLoc::new(file, line, column),
        comment,
        block: None,
    })
}

fn parse_destination(text: &str, line: usize) -> Result<(Option<String>, Option<String>), ParseError> {
    let invalid = || ParseError::InvalidDestination {
        text: format!("@{text}"),
        line,
    };
    match text.split_once(':') {
        Some((dest, persist)) => {
            if dest.is_empty() || persist.is_empty() || persist.contains(':') {
                return Err(invalid());
            }
            Ok((Some(dest.to_string()), Some(persist.to_string())))
        }
        None if text.is_empty() => Err(invalid()),
        None => Ok((Some(text.to_string()), None)),
    }
}

fn parse_expr(tokens: &[Token], pos: &mut usize, line: usize) -> Result<Expr, ParseError> {
    let token = &tokens[*pos];
    *pos += 1;
    match &token.kind {
        TokenKind::Word(name) => Ok(Expr::Identifier { name: name.clone() }),
        TokenKind::Reference(name) => Ok(Expr::Reference { name: name.clone() }),
        TokenKind::Hole(name) => Ok(Expr::Hole { name: name.clone() }),
        TokenKind::Str(value) | TokenKind::Number(value) => Ok(Expr::Literal {
            value: value.clone(),
        }),
        TokenKind::LParen => {
            let operator = match tokens.get(*pos).map(|t| &t.kind) {
                Some(TokenKind::Word(w)) => w.clone(),
                Some(other) => {
                    return Err(ParseError::UnexpectedToken {
                        found: describe(other),
                        line,
                        column: tokens[*pos].column,
                    });
                }
                None => return Err(unbalanced('(', token, line)),
            };
            *pos += 1;
            let mut args = Vec::new();
            loop {
                match tokens.get(*pos).map(|t| &t.kind) {
                    None => return Err(unbalanced('(', token, line)),
                    Some(TokenKind::RParen) => {
                        *pos += 1;
                        break;
                    }
                    Some(_) => args.push(parse_expr(tokens, pos, line)?),
                }
            }
            Ok(Expr::Compound { operator, args })
        }
        TokenKind::LBracket => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos).map(|t| &t.kind) {
                    None => return Err(unbalanced('[', token, line)),
                    Some(TokenKind::RBracket) => {
                        *pos += 1;
                        break;
                    }
                    Some(TokenKind::Comma) => *pos += 1,
                    Some(_) => items.push(parse_expr(tokens, pos, line)?),
                }
            }
            Ok(Expr::List { items })
        }
        other => Err(ParseError::UnexpectedToken {
            found: describe(other),
            line,
            column: token.column,
        }),
    }
}

fn unbalanced(delimiter: char, token: &Token, line: usize) -> ParseError {
    ParseError::Unbalanced {
        delimiter,
        line,
        column: token.column,
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Word(w) => w.clone(),
        TokenKind::Dest(d) => format!("@{d}"),
        TokenKind::Reference(r) => format!("${r}"),
        TokenKind::Hole(h) => format!("?{h}"),
        TokenKind::Str(s) => format!("\"{s}\""),
        TokenKind::Number(n) => n.clone(),
        TokenKind::LParen => "(".into(),
        TokenKind::RParen => ")".into(),
        TokenKind::LBracket => "[".into(),
        TokenKind::RBracket => "]".into(),
        TokenKind::Comma => ",".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_persistence_forms() {
        let program = parse_program("@a:stored isA Rex Dog\n@b isA Rex Pet\nisA Rex Animal\n", Some("t.sys2")).unwrap();
        assert_eq!(program.len(), 3);

        let a = &program.statements[0];
        assert_eq!(a.destination.as_deref(), Some("a"));
        assert_eq!(a.persist_name.as_deref(), Some("stored"));
        assert!(a.should_persist());

        let b = &program.statements[1];
        assert!(!b.is_persistent);
        assert!(!b.should_persist());

        let c = &program.statements[2];
        assert!(c.destination.is_none());
        assert!(c.should_persist());
        assert_eq!(c.source.line, 3);
        assert_eq!(c.source.file.as_deref(), Some("t.sys2"));
    }

    #[test]
    fn parses_nested_compound_and_list() {
        let program = parse_program("Implies (And (isA ?x Dog) (has ?x [tail, fur])) (isA ?x Animal)", None).unwrap();
        let st = &program.statements[0];
        assert_eq!(st.operator, "Implies");
        assert_eq!(st.args.len(), 2);
        assert_eq!(
            st.args[0].to_string(),
            "(And (isA ?x Dog) (has ?x [tail, fur]))"
        );
    }

    #[test]
    fn parses_graph_block() {
        let text = "@Pair graph a b\n  @p __Bundle $a $b\n  return $p\nend\n@x Pair Rex Dog\n";
        let program = parse_program(text, None).unwrap();
        assert_eq!(program.len(), 2);
        match &program.statements[0].block {
            Some(Block::Graph { params, body }) => {
                assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(body.len(), 2);
                assert_eq!(body[1].operator, "return");
            }
            other => panic!("expected graph block, got {other:?}"),
        }
    }

    #[test]
    fn parses_solve_block() {
        let text = "@seating solve csp\n  variables from Guest\n  domain from Table\n  noConflict conflictsWith\nend";
        let program = parse_program(text, None).unwrap();
        match &program.statements[0].block {
            Some(Block::Solve { kind, body }) => {
                assert_eq!(kind, "csp");
                assert_eq!(body.len(), 3);
            }
            other => panic!("expected solve block, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_block_is_error() {
        let err = parse_program("@G graph a\n return $a\n", None).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedBlock { line: 1, .. }));
    }

    #[test]
    fn stray_end_is_error() {
        assert!(matches!(
            parse_program("end", None).unwrap_err(),
            ParseError::StrayEnd { line: 1 }
        ));
    }

    #[test]
    fn unbalanced_paren_is_error() {
        let err = parse_program("Not (isA Rex Cat", None).unwrap_err();
        assert!(matches!(err, ParseError::Unbalanced { delimiter: '(', .. }));
    }

    #[test]
    fn destination_without_operator_is_error() {
        assert!(matches!(
            parse_program("@x", None).unwrap_err(),
            ParseError::MissingOperator { line: 1 }
        ));
        assert!(matches!(
            parse_program("@:x isA a b", None).unwrap_err(),
            ParseError::InvalidDestination { .. }
        ));
    }

    #[test]
    fn single_statement_helper() {
        let st = parse_statement("isA Poodle Animal").unwrap().unwrap();
        assert_eq!(st.fact_text(), "isA Poodle Animal");
        assert!(parse_statement("   # nothing").unwrap().is_none());
    }
}
