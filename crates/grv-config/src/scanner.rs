//! `grvrc` config scanner (spec.md §4.4).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Option,
    WhiteSpace,
    Comment,
    Terminator,
    Eof,
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The token's literal text, unescaped for quoted words (what the
    /// parser consumes as a command/variable/option value).
    pub value: String,
    /// The token's exact source text, quotes and escapes included.
    /// Concatenating `raw` across every token reproduces the input
    /// verbatim (spec.md §8); `value` alone does not for quoted strings.
    pub raw: String,
    pub line: usize,
    pub col: usize,
    pub message: Option<String>,
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;
    let mut tokens = Vec::new();

    let advance = |i: &mut usize, line: &mut usize, col: &mut usize, chars: &[char]| {
        if chars[*i] == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let (start_line, start_col) = (line, col);
        let c = chars[i];

        if c == '\\' && chars.get(i + 1) == Some(&'\n') {
            let mut text = String::new();
            while i < chars.len()
                && (chars[i].is_whitespace() || (chars[i] == '\\' && chars.get(i + 1) == Some(&'\n')))
            {
                if chars[i] == '\\' {
                    text.push(chars[i]);
                    advance(&mut i, &mut line, &mut col, &chars);
                }
                if i < chars.len() {
                    text.push(chars[i]);
                    advance(&mut i, &mut line, &mut col, &chars);
                }
            }
            tokens.push(Token {
                kind: TokenKind::WhiteSpace,
                raw: text.clone(),
                value: text,
                line: start_line,
                col: start_col,
                message: None,
            });
            continue;
        }

        if c == '\n' {
            advance(&mut i, &mut line, &mut col, &chars);
            tokens.push(Token {
                kind: TokenKind::Terminator,
                raw: "\n".to_string(),
                value: "\n".to_string(),
                line: start_line,
                col: start_col,
                message: None,
            });
            continue;
        }

        if c.is_whitespace() {
            let mut text = String::new();
            while i < chars.len() && chars[i].is_whitespace() && chars[i] != '\n' {
                text.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            tokens.push(Token {
                kind: TokenKind::WhiteSpace,
                raw: text.clone(),
                value: text,
                line: start_line,
                col: start_col,
                message: None,
            });
            continue;
        }

        if c == '#' {
            let mut text = String::new();
            while i < chars.len() && chars[i] != '\n' {
                text.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            tokens.push(Token {
                kind: TokenKind::Comment,
                raw: text.clone(),
                value: text,
                line: start_line,
                col: start_col,
                message: None,
            });
            continue;
        }

        if c == '"' {
            let start_i = i;
            advance(&mut i, &mut line, &mut col, &chars);
            let mut value = String::new();
            let mut terminated = false;
            while i < chars.len() {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    let escaped = chars[i + 1];
                    advance(&mut i, &mut line, &mut col, &chars);
                    advance(&mut i, &mut line, &mut col, &chars);
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        other => other,
                    });
                    continue;
                }
                if chars[i] == '"' {
                    advance(&mut i, &mut line, &mut col, &chars);
                    terminated = true;
                    break;
                }
                value.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            // `raw` keeps the quotes and escapes exactly as written so
            // token concatenation round-trips the input even though
            // `value` has them stripped/unescaped for the parser.
            let raw: String = chars[start_i..i].iter().collect();
            if terminated {
                tokens.push(Token {
                    kind: TokenKind::Word,
                    value,
                    raw,
                    line: start_line,
                    col: start_col,
                    message: None,
                });
            } else {
                tokens.push(Token {
                    kind: TokenKind::Invalid,
                    value,
                    raw,
                    line: start_line,
                    col: start_col,
                    message: Some("Syntax Error: Unterminated string".to_string()),
                });
            }
            continue;
        }

        if c == '-' && chars.get(i + 1) == Some(&'-') {
            let mut text = String::new();
            while i < chars.len() && !chars[i].is_whitespace() {
                text.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            tokens.push(Token {
                kind: TokenKind::Option,
                raw: text.clone(),
                value: text,
                line: start_line,
                col: start_col,
                message: None,
            });
            continue;
        }

        // Plain word: any run of non-whitespace, non-'#' characters.
        let mut text = String::new();
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '#' {
            text.push(chars[i]);
            advance(&mut i, &mut line, &mut col, &chars);
        }
        tokens.push(Token {
            kind: TokenKind::Word,
            raw: text.clone(),
            value: text,
            line: start_line,
            col: start_col,
            message: None,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        value: String::new(),
        raw: String::new(),
        line,
        col,
        message: None,
    });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_concatenation_reproduces_input() {
        let input = "set theme dark\n# a comment\nmap RefView j NextLine\n";
        let tokens = tokenize(input);
        let joined: String = tokens.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn round_trip_concatenation_reproduces_input_containing_a_quoted_string() {
        let input = "map RefView <C-a> \"say \\\"hi\\\"\\n\"\n";
        let tokens = tokenize(input);
        let joined: String = tokens.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn quoted_string_value_is_unescaped_but_raw_keeps_the_source_text() {
        let tokens = tokenize("\"say \\\"hi\\\"\"");
        assert_eq!(tokens[0].value, "say \"hi\"");
        assert_eq!(tokens[0].raw, "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn option_tokens_start_with_double_dash() {
        let tokens = tokenize("--name");
        assert_eq!(tokens[0].kind, TokenKind::Option);
        assert_eq!(tokens[0].value, "--name");
    }

    #[test]
    fn unterminated_string_is_invalid() {
        let tokens = tokenize("\"theme");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn line_continuation_is_whitespace_spanning_newline() {
        let tokens = tokenize("set theme \\\ndark\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::WhiteSpace && t.value.contains('\n')));
    }
}
