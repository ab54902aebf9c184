use crate::ast::{Span, Token, TokenKind};

/// Malformed source text. Carries the character offset of the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {position})")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        SyntaxError {
            message: message.into(),
            position,
        }
    }

    /// 1-based line and column of the error in `source`.
    pub fn line_column(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut column = 1;
        for (i, ch) in source.chars().enumerate() {
            if i == self.position {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

/// Tokenize Lua source into a token stream ending in [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Extent of a long bracket (`[=*[ ... ]=*]`) starting at `pos` in `chars`.
struct LongBracket {
    level: usize,
    content_start: usize,
    content_end: usize,
    /// Index just past the closing bracket, or `chars.len()` if unterminated.
    end: usize,
    terminated: bool,
}

/// Scan a long bracket opener at `pos`. Returns `None` if `chars[pos]` does
/// not start one.
fn scan_long_bracket(chars: &[char], pos: usize) -> Option<LongBracket> {
    if chars.get(pos) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    let mut i = pos + 1;
    while chars.get(i) == Some(&'=') {
        level += 1;
        i += 1;
    }
    if chars.get(i) != Some(&'[') {
        return None;
    }
    let content_start = i + 1;
    let mut i = content_start;
    while i < chars.len() {
        if chars[i] == ']' {
            let mut j = i + 1;
            let mut eq = 0;
            while chars.get(j) == Some(&'=') {
                eq += 1;
                j += 1;
            }
            if eq == level && chars.get(j) == Some(&']') {
                return Some(LongBracket {
                    level,
                    content_start,
                    content_end: i,
                    end: j + 1,
                    terminated: true,
                });
            }
        }
        i += 1;
    }
    Some(LongBracket {
        level,
        content_start,
        content_end: chars.len(),
        end: chars.len(),
        terminated: false,
    })
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.position)
    }

    /// Skip whitespace and both comment forms.
    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('-') if self.peek_char(1) == Some('-') => {
                    let comment_start = self.position;
                    self.position += 2;
                    if let Some(lb) = scan_long_bracket(&self.input, self.position) {
                        if !lb.terminated {
                            return Err(SyntaxError::new(
                                "unterminated long comment",
                                comment_start,
                            ));
                        }
                        self.position = lb.end;
                    } else {
                        while let Some(ch) = self.current_char() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\n' => {
                    return Err(self.error("unterminated string (newline in quoted string)"));
                }
                '\\' => {
                    self.advance();
                    self.read_escape(&mut result)?;
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(SyntaxError::new(
            "unterminated string (missing closing quote)",
            start,
        ))
    }

    fn read_escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => return Err(self.error("unexpected end of input after backslash")),
        };
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\n' => out.push('\n'),
            'x' => {
                self.advance();
                let mut value = 0u32;
                for _ in 0..2 {
                    let digit = self
                        .current_char()
                        .and_then(|c| c.to_digit(16))
                        .ok_or_else(|| self.error("expected two hex digits after \\x"))?;
                    value = value * 16 + digit;
                    self.advance();
                }
                // char::from_u32 always succeeds for values <= 0xff
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                return Ok(());
            }
            'u' => {
                self.advance();
                if self.current_char() != Some('{') {
                    return Err(self.error("expected '{' after \\u"));
                }
                self.advance();
                let mut value = 0u32;
                let mut digits = 0;
                while let Some(digit) = self.current_char().and_then(|c| c.to_digit(16)) {
                    value = value
                        .checked_mul(16)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or_else(|| self.error("\\u escape is not a valid codepoint"))?;
                    digits += 1;
                    self.advance();
                }
                if digits == 0 || self.current_char() != Some('}') {
                    return Err(self.error("malformed \\u{XXXX} escape"));
                }
                self.advance();
                let decoded = char::from_u32(value)
                    .ok_or_else(|| self.error("\\u escape is not a valid codepoint"))?;
                out.push(decoded);
                return Ok(());
            }
            'z' => {
                self.advance();
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() {
                        self.advance();
                    } else {
                        break;
                    }
                }
                return Ok(());
            }
            d if d.is_ascii_digit() => {
                let mut value = 0u32;
                let mut count = 0;
                while count < 3 {
                    match self.current_char().and_then(|c| c.to_digit(10)) {
                        Some(digit) => {
                            value = value * 10 + digit;
                            count += 1;
                            self.advance();
                        }
                        None => break,
                    }
                }
                if value > 255 {
                    return Err(self.error("decimal escape out of range"));
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                return Ok(());
            }
            other => {
                return Err(self.error(format!("invalid escape sequence: \\{}", other)));
            }
        }
        self.advance();
        Ok(())
    }

    fn read_long_string(&mut self) -> Result<String, SyntaxError> {
        let start = self.position;
        let lb = match scan_long_bracket(&self.input, self.position) {
            Some(lb) => lb,
            None => return Err(self.error("malformed long bracket")),
        };
        if !lb.terminated {
            return Err(SyntaxError::new("unterminated long string", start));
        }
        let mut content_start = lb.content_start;
        // A newline immediately after the opening bracket is dropped.
        if self.input.get(content_start) == Some(&'\r') {
            content_start += 1;
        }
        if self.input.get(content_start) == Some(&'\n') {
            content_start += 1;
        }
        let content: String = self.input[content_start..lb.content_end].iter().collect();
        self.position = lb.end;
        Ok(content)
    }

    fn read_number(&mut self) -> Result<TokenKind, SyntaxError> {
        if self.current_char() == Some('0')
            && matches!(self.peek_char(1), Some('x') | Some('X'))
        {
            return self.read_hex_number();
        }

        let mut text = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && !is_float {
                is_float = true;
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current_char(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char() {
                text.push(sign);
                self.advance();
            }
            let mut exp_digits = 0;
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    exp_digits += 1;
                    self.advance();
                } else {
                    break;
                }
            }
            if exp_digits == 0 {
                return Err(self.error("malformed number (missing exponent digits)"));
            }
        }

        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("malformed number '{}'", text)))?;
            Ok(TokenKind::Float(value))
        } else if let Ok(value) = text.parse::<i64>() {
            Ok(TokenKind::Int(value))
        } else {
            // Integer literals beyond i64 spill into the float subtype
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("malformed number '{}'", text)))?;
            Ok(TokenKind::Float(value))
        }
    }

    fn read_hex_number(&mut self) -> Result<TokenKind, SyntaxError> {
        self.advance(); // 0
        self.advance(); // x
        let mut value: u64 = 0;
        let mut digits = 0;
        while let Some(digit) = self.current_char().and_then(|c| c.to_digit(16)) {
            value = value.wrapping_mul(16).wrapping_add(u64::from(digit));
            digits += 1;
            self.advance();
        }
        if digits == 0 {
            return Err(self.error("malformed hexadecimal number"));
        }
        // Binary exponent makes it a float: 0x10p2 == 64.0
        if matches!(self.current_char(), Some('p') | Some('P')) {
            self.advance();
            let mut negative = false;
            if matches!(self.current_char(), Some('+') | Some('-')) {
                negative = self.current_char() == Some('-');
                self.advance();
            }
            let mut exp: i32 = 0;
            let mut exp_digits = 0;
            while let Some(digit) = self.current_char().and_then(|c| c.to_digit(10)) {
                exp = exp.saturating_mul(10).saturating_add(digit as i32);
                exp_digits += 1;
                self.advance();
            }
            if exp_digits == 0 {
                return Err(self.error("malformed number (missing exponent digits)"));
            }
            if negative {
                exp = -exp;
            }
            return Ok(TokenKind::Float((value as f64) * 2f64.powi(exp)));
        }
        Ok(TokenKind::Int(value as i64))
    }

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia()?;
        let start = self.position;

        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some('+') => {
                self.advance();
                TokenKind::Plus
            }
            Some('-') => {
                self.advance();
                TokenKind::Minus
            }
            Some('*') => {
                self.advance();
                TokenKind::Star
            }
            Some('/') => {
                if self.peek_char(1) == Some('/') {
                    self.advance();
                    self.advance();
                    TokenKind::SlashSlash
                } else {
                    self.advance();
                    TokenKind::Slash
                }
            }
            Some('%') => {
                self.advance();
                TokenKind::Percent
            }
            Some('^') => {
                self.advance();
                TokenKind::Caret
            }
            Some('#') => {
                self.advance();
                TokenKind::Hash
            }
            Some('&') => {
                self.advance();
                TokenKind::Amp
            }
            Some('|') => {
                self.advance();
                TokenKind::Pipe
            }
            Some('~') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Ne
                } else {
                    self.advance();
                    TokenKind::Tilde
                }
            }
            Some('<') => match self.peek_char(1) {
                Some('<') => {
                    self.advance();
                    self.advance();
                    TokenKind::Shl
                }
                Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::Le
                }
                _ => {
                    self.advance();
                    TokenKind::Lt
                }
            },
            Some('>') => match self.peek_char(1) {
                Some('>') => {
                    self.advance();
                    self.advance();
                    TokenKind::Shr
                }
                Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::Ge
                }
                _ => {
                    self.advance();
                    TokenKind::Gt
                }
            },
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::Eq
                } else {
                    self.advance();
                    TokenKind::Assign
                }
            }
            Some('(') => {
                self.advance();
                TokenKind::LParen
            }
            Some(')') => {
                self.advance();
                TokenKind::RParen
            }
            Some('{') => {
                self.advance();
                TokenKind::LBrace
            }
            Some('}') => {
                self.advance();
                TokenKind::RBrace
            }
            Some('[') => {
                // `[[` and `[=...=[` open a long string; a lone `[` indexes.
                if self.peek_char(1) == Some('[')
                    || (self.peek_char(1) == Some('=')
                        && scan_long_bracket(&self.input, self.position).is_some())
                {
                    TokenKind::LongStr(self.read_long_string()?)
                } else {
                    self.advance();
                    TokenKind::LBracket
                }
            }
            Some(']') => {
                self.advance();
                TokenKind::RBracket
            }
            Some(';') => {
                self.advance();
                TokenKind::Semi
            }
            Some(':') => {
                if self.peek_char(1) == Some(':') {
                    self.advance();
                    self.advance();
                    TokenKind::DoubleColon
                } else {
                    self.advance();
                    TokenKind::Colon
                }
            }
            Some(',') => {
                self.advance();
                TokenKind::Comma
            }
            Some('.') => {
                if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number()?
                } else if self.peek_char(1) == Some('.') {
                    if self.peek_char(2) == Some('.') {
                        self.position += 3;
                        TokenKind::Ellipsis
                    } else {
                        self.position += 2;
                        TokenKind::DotDot
                    }
                } else {
                    self.advance();
                    TokenKind::Dot
                }
            }
            Some('"') => TokenKind::Str(self.read_string('"')?),
            Some('\'') => TokenKind::Str(self.read_string('\'')?),
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let name = self.read_name();
                match TokenKind::keyword(&name) {
                    Some(kw) => kw,
                    None => TokenKind::Name(name),
                }
            }
            Some(ch) => return Err(self.error(format!("unexpected character '{}'", ch))),
        };

        Ok(Token::new(kind, Span::new(start, self.position)))
    }
}

/// Replace comments with whitespace, preserving the character count and all
/// newlines so downstream positions keep their line/column meaning.
///
/// Comments inside string literals (quoted or long-bracket) are left alone.
/// The scan is best-effort on malformed input: unterminated constructs run
/// to end of input without failing.
pub fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '-' && chars.get(i + 1) == Some(&'-') {
            let end = match scan_long_bracket(&chars, i + 2) {
                Some(lb) => lb.end,
                None => {
                    let mut j = i + 2;
                    while j < chars.len() && chars[j] != '\n' {
                        j += 1;
                    }
                    j
                }
            };
            for k in i..end {
                out.push(if chars[k] == '\n' { '\n' } else { ' ' });
            }
            i = end;
        } else if ch == '"' || ch == '\'' {
            out.push(ch);
            i += 1;
            while i < chars.len() {
                let c = chars[i];
                out.push(c);
                i += 1;
                if c == '\\' && i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                } else if c == ch || c == '\n' {
                    break;
                }
            }
        } else if ch == '[' {
            match scan_long_bracket(&chars, i) {
                Some(lb) => {
                    for k in i..lb.end {
                        out.push(chars[k]);
                    }
                    i = lb.end;
                }
                None => {
                    out.push(ch);
                    i += 1;
                }
            }
        } else {
            out.push(ch);
            i += 1;
        }
    }

    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_names() {
        assert_eq!(
            kinds("and or not while order limit where"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::While,
                TokenKind::Name("order".to_string()),
                TokenKind::Name("limit".to_string()),
                TokenKind::Name("where".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_long_string_closing_scan() {
        // A `]` not followed by the matching close stays part of the content.
        assert_eq!(
            kinds("[[hel]lo]]"),
            vec![TokenKind::LongStr("hel]lo".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("[=[Hello page [[index]] end scene]=]"),
            vec![
                TokenKind::LongStr("Hello page [[index]] end scene".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("ab + 1").unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(3, 4));
        assert_eq!(tokens[2].span, Span::new(5, 6));
    }
}
