//! `grvrc` parser (spec.md §4.4): recognises commands by keyword and a
//! fixed token-type sequence. An invalid command discards tokens up to the
//! next terminator so later valid commands still parse (spec.md §8).

use crate::scanner::{self, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Set {
        var: String,
        value: String,
    },
    Theme {
        name: String,
        component: String,
        bgcolor: String,
        fgcolor: String,
    },
    Map {
        view: String,
        from: String,
        to: String,
    },
    Quit,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{line}:{col} {message}")]
pub struct ConfigError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

struct Cursor {
    tokens: Vec<Token>,
    idx: usize,
}

impl Cursor {
    fn significant(&self) -> &Token {
        &self.tokens[self.idx]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        t
    }

    fn skip_to_terminator(&mut self) {
        while !matches!(
            self.significant().kind,
            TokenKind::Terminator | TokenKind::Eof
        ) {
            self.advance();
        }
        if self.significant().kind == TokenKind::Terminator {
            self.advance();
        }
    }

    fn expect_word(&mut self) -> Result<String, ConfigError> {
        let t = self.significant().clone();
        if t.kind == TokenKind::Word {
            self.advance();
            Ok(t.value)
        } else {
            Err(ConfigError {
                line: t.line,
                col: t.col,
                message: format!("Expected word but found: {:?} \"{}\"", t.kind, t.value),
            })
        }
    }
}

/// Parse the whole `grvrc` source into validated-syntax directives plus
/// every syntax error found; a bad line never silences subsequent ones.
pub fn parse(input: &str) -> (Vec<Directive>, Vec<ConfigError>) {
    let tokens: Vec<Token> = scanner::tokenize(input)
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::WhiteSpace | TokenKind::Comment))
        .collect();
    let mut cursor = Cursor { tokens, idx: 0 };
    let mut directives = Vec::new();
    let mut errors = Vec::new();

    loop {
        if cursor.significant().kind == TokenKind::Eof {
            break;
        }
        if cursor.significant().kind == TokenKind::Terminator {
            cursor.advance();
            continue;
        }
        match parse_line(&mut cursor) {
            Ok(Some(directive)) => directives.push(directive),
            Ok(None) => {}
            Err(e) => {
                errors.push(e);
                cursor.skip_to_terminator();
            }
        }
    }

    (directives, errors)
}

fn parse_line(cursor: &mut Cursor) -> Result<Option<Directive>, ConfigError> {
    let head = cursor.significant().clone();
    if head.kind == TokenKind::Option {
        return Err(ConfigError {
            line: head.line,
            col: head.col,
            message: format!("Unexpected Option \"{}\"", head.value),
        });
    }
    if head.kind == TokenKind::Invalid {
        return Err(ConfigError {
            line: head.line,
            col: head.col,
            message: head
                .message
                .clone()
                .unwrap_or_else(|| "Syntax Error".to_string()),
        });
    }
    if head.kind != TokenKind::Word {
        return Err(ConfigError {
            line: head.line,
            col: head.col,
            message: format!("Unexpected token: \"{}\"", head.value),
        });
    }

    let directive = match head.value.as_str() {
        "set" => {
            cursor.advance();
            let var = cursor.expect_word()?;
            let value = cursor.expect_word()?;
            Some(Directive::Set { var, value })
        }
        "theme" => {
            cursor.advance();
            parse_theme(cursor)?
        }
        "map" => {
            cursor.advance();
            let view = cursor.expect_word()?;
            let from = cursor.expect_word()?;
            let to = cursor.expect_word()?;
            Some(Directive::Map { view, from, to })
        }
        "q" => {
            cursor.advance();
            Some(Directive::Quit)
        }
        other => {
            return Err(ConfigError {
                line: head.line,
                col: head.col,
                message: format!("Unknown command \"{other}\""),
            });
        }
    };

    let trailing = cursor.significant().clone();
    if !matches!(trailing.kind, TokenKind::Terminator | TokenKind::Eof) {
        return Err(ConfigError {
            line: trailing.line,
            col: trailing.col,
            message: format!("Unexpected token: \"{}\"", trailing.value),
        });
    }
    if trailing.kind == TokenKind::Terminator {
        cursor.advance();
    }
    Ok(directive)
}

fn parse_theme(cursor: &mut Cursor) -> Result<Option<Directive>, ConfigError> {
    let mut name = None;
    let mut component = None;
    let mut bgcolor = None;
    let mut fgcolor = None;

    for _ in 0..4 {
        let opt = cursor.significant().clone();
        if opt.kind != TokenKind::Option {
            return Err(ConfigError {
                line: opt.line,
                col: opt.col,
                message: format!("Expected option but found: \"{}\"", opt.value),
            });
        }
        cursor.advance();
        let value = cursor.expect_word()?;
        let slot = match opt.value.as_str() {
            "--name" => &mut name,
            "--component" => &mut component,
            "--bgcolor" => &mut bgcolor,
            "--fgcolor" => &mut fgcolor,
            other => {
                return Err(ConfigError {
                    line: opt.line,
                    col: opt.col,
                    message: format!("Unexpected Option \"{other}\""),
                });
            }
        };
        if slot.is_some() {
            return Err(ConfigError {
                line: opt.line,
                col: opt.col,
                message: format!("Option \"{}\" specified more than once", opt.value),
            });
        }
        *slot = Some(value);
    }

    match (name, component, bgcolor, fgcolor) {
        (Some(name), Some(component), Some(bgcolor), Some(fgcolor)) => {
            Ok(Some(Directive::Theme {
                name,
                component,
                bgcolor,
                fgcolor,
            }))
        }
        _ => {
            let t = cursor.significant().clone();
            Err(ConfigError {
                line: t.line,
                col: t.col,
                message: "theme command requires --name, --component, --bgcolor and --fgcolor"
                    .to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_command_parses() {
        let (directives, errors) = parse("set tabWidth 4\n");
        assert!(errors.is_empty());
        assert_eq!(
            directives,
            vec![Directive::Set {
                var: "tabWidth".to_string(),
                value: "4".to_string()
            }]
        );
    }

    #[test]
    fn theme_command_allows_any_option_order() {
        let (directives, errors) = parse(
            "theme --component CommitView.Author --name dark --fgcolor MAGENTA --bgcolor NONE\n",
        );
        assert!(errors.is_empty());
        assert_eq!(directives.len(), 1);
    }

    #[test]
    fn bare_option_is_an_error_and_next_line_still_parses() {
        let (directives, errors) = parse("--name\nset mouse false\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unexpected Option \"--name\""));
        assert_eq!(
            directives,
            vec![Directive::Set {
                var: "mouse".to_string(),
                value: "false".to_string()
            }]
        );
    }

    #[test]
    fn invalid_command_discards_to_next_terminator() {
        // Two bad lines ("set theme" is missing its value, then "mytheme" is
        // an unknown command in its own right) each discard to their own
        // terminator and each report their own error; neither silences the
        // valid line that follows (spec.md §8).
        let (directives, errors) = parse("set theme\nmytheme\nset mouse false\n");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("Expected word"));
        assert!(errors[1].message.contains("Unknown command \"mytheme\""));
        assert_eq!(
            directives,
            vec![Directive::Set {
                var: "mouse".to_string(),
                value: "false".to_string()
            }]
        );
    }

    #[test]
    fn quit_command_parses() {
        let (directives, errors) = parse("q\n");
        assert!(errors.is_empty());
        assert_eq!(directives, vec![Directive::Quit]);
    }
}
