//! Tokenizer for filter expressions.

use super::FilterError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*`, keywords excluded
    Name(String),
    /// Unsigned decimal number, kept as written
    Number(String),
    /// Double-quoted string with the quotes removed
    Str(String),
    Colon,
    Comma,
    LParen,
    RParen,
    And,
    Or,
    Not,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Name(n) => format!("name '{}'", n),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::And => "'and'".to_string(),
            TokenKind::Or => "'or'".to_string(),
            TokenKind::Not => "'not'".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source expression
    pub pos: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            b':' => {
                i += 1;
                TokenKind::Colon
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'"' => {
                let (text, end) = read_string(input, i)?;
                i = end;
                TokenKind::Str(text)
            }
            b'0'..=b'9' | b'.' => {
                let end = read_number(bytes, i)
                    .ok_or(FilterError::UnexpectedChar { ch: c as char, pos: i })?;
                i = end;
                TokenKind::Number(input[start..end].to_string())
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                match &input[start..i] {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    name => TokenKind::Name(name.to_string()),
                }
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(FilterError::UnexpectedChar { ch, pos: i });
            }
        };

        tokens.push(Token { kind, pos: start });
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start` (the opening quote).
fn read_string(input: &str, start: usize) -> Result<(String, usize), FilterError> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '"' => return Ok((out, start + 1 + offset + 1)),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            _ => out.push(ch),
        }
    }

    Err(FilterError::UnterminatedString { pos: start })
}

/// Scan `digits [. digits] [e [+-] digits]` or `. digits ...`; returns the end offset.
fn read_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut has_digits = i > int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        has_digits |= i > frac_start;
    }
    if !has_digits {
        return None;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_condition() {
        assert_eq!(
            kinds("active:eq:Y"),
            vec![
                TokenKind::Name("active".into()),
                TokenKind::Colon,
                TokenKind::Name("eq".into()),
                TokenKind::Colon,
                TokenKind::Name("Y".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_numbers() {
        assert_eq!(
            kinds("not id:gt:1.5e3 or x:in:1,2"),
            vec![
                TokenKind::Not,
                TokenKind::Name("id".into()),
                TokenKind::Colon,
                TokenKind::Name("gt".into()),
                TokenKind::Colon,
                TokenKind::Number("1.5e3".into()),
                TokenKind::Or,
                TokenKind::Name("x".into()),
                TokenKind::Colon,
                TokenKind::Name("in".into()),
                TokenKind::Colon,
                TokenKind::Number("1".into()),
                TokenKind::Comma,
                TokenKind::Number("2".into()),
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_a_name() {
        assert_eq!(kinds("android"), vec![TokenKind::Name("android".into())]);
        assert_eq!(kinds("not_in"), vec![TokenKind::Name("not_in".into())]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\" \\ now""#),
            vec![TokenKind::Str(r#"say "hi" \ now"#.into())]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("city:eq:\"Lon").unwrap_err(),
            FilterError::UnterminatedString { pos: 8 }
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokenize("a:eq:1 & b:eq:2").unwrap_err(),
            FilterError::UnexpectedChar { ch: '&', pos: 7 }
        );
    }

    #[test]
    fn test_token_positions() {
        let tokens = tokenize("a : eq").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 2, 4]);
    }
}
