//! Splitting of an interactive command line into tokens.

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

/// One word of a command line and the byte offset where it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Offset of the first raw character, quotes and escapes included.
    pub start: usize,
    /// The word with quotes and escapes removed.
    pub text: String,
}

impl Token {
    fn new(start: usize, text: impl Into<String>) -> Self {
        Token {
            start,
            text: text.into(),
        }
    }
}

struct LexingFSM {
    input: Vec<(usize, char)>,
    pos: usize,
    state: LexingState,
    buffer: String,
    start: usize,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.char_indices().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            start: 0,
        }
    }

    /// Runs the state machine over the whole line and returns the state it
    /// stopped in. The word being read at the end is left in the buffer.
    ///
    /// A quoted empty string (`""` or `''`) still yields an empty token.
    fn make_tokens(&mut self, out: &mut Vec<Token>) -> Result<LexingState, LexError> {
        while let Some((offset, ch)) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(offset, ch)?,
                LexingState::ReadingWord => self.handle_word(ch, out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }
        Ok(self.state)
    }

    fn flush(&mut self, out: &mut Vec<Token>) {
        out.push(Token::new(self.start, std::mem::take(&mut self.buffer)));
    }

    fn read_char(&mut self) -> Option<(usize, char)> {
        let next = self.input.get(self.pos).copied();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn read_escaped(&mut self) -> Result<char, LexError> {
        self.read_char()
            .map(|(_, ch)| ch)
            .ok_or(LexError::DanglingEscape)
    }

    fn handle_start(&mut self, offset: usize, ch: char) -> Result<(), LexError> {
        if ch.is_whitespace() {
            return Ok(());
        }
        self.start = offset;
        match ch {
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                let escaped = self.read_escaped()?;
                self.buffer.push(escaped);
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexError> {
        match ch {
            c if c.is_whitespace() => {
                self.flush(out);
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                let escaped = self.read_escaped()?;
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => {
                let escaped = self.read_escaped()?;
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }
}

/// Split a line into tokens, honoring quotes and backslash escapes.
pub fn split_command_line(line: &str) -> Result<Vec<String>, LexError> {
    let tokens = split_with_offsets(line)?;
    Ok(tokens.into_iter().map(|t| t.text).collect())
}

/// Like [`split_command_line`], keeping where each token starts in `line`.
pub fn split_with_offsets(line: &str) -> Result<Vec<Token>, LexError> {
    let mut fsm = LexingFSM::new(line);
    let mut out = Vec::new();
    match fsm.make_tokens(&mut out)? {
        LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
            return Err(LexError::UnfinishedQuote);
        }
        LexingState::ReadingWord => fsm.flush(&mut out),
        LexingState::Start => {}
    }
    Ok(out)
}

/// Tokens of a line that is still being typed.
///
/// An open quote ends the last token instead of failing. When the line ends
/// outside any word, an empty token starting at the end of the line is
/// appended, so the result is never empty.
pub fn split_partial(line: &str) -> Result<Vec<Token>, LexError> {
    let mut fsm = LexingFSM::new(line);
    let mut out = Vec::new();
    match fsm.make_tokens(&mut out)? {
        LexingState::Start => out.push(Token::new(line.len(), "")),
        _ => fsm.flush(&mut out),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_words() {
        assert_eq!(
            split_command_line("  greet   Bob\tSmith ").unwrap(),
            vec!["greet", "Bob", "Smith"]
        );
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_quotes_and_escapes() {
        assert_eq!(
            split_command_line(r#"echo "hello world" 'it''s' a\ b "q\"x""#).unwrap(),
            vec!["echo", "hello world", "its", "a b", "q\"x"]
        );
        assert_eq!(split_command_line(r#"say """#).unwrap(), vec!["say", ""]);
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(split_command_line("echo \"open"), Err(LexError::UnfinishedQuote));
        assert_eq!(split_command_line("echo 'open"), Err(LexError::UnfinishedQuote));
        assert_eq!(split_command_line("echo \\"), Err(LexError::DanglingEscape));
    }

    #[test]
    fn test_offsets_point_at_raw_token_starts() {
        let tokens = split_with_offsets(r#"echo "hi there" a\ b"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new(0, "echo"),
                Token::new(5, "hi there"),
                Token::new(16, "a b"),
            ]
        );
        let tokens = split_with_offsets("é  x").unwrap();
        assert_eq!(tokens[1], Token::new(4, "x"));
    }

    #[test]
    fn test_split_partial_keeps_the_word_being_typed() {
        assert_eq!(
            split_partial("greet 'Bo").unwrap(),
            vec![Token::new(0, "greet"), Token::new(6, "Bo")]
        );
        assert_eq!(
            split_partial("greet ").unwrap(),
            vec![Token::new(0, "greet"), Token::new(6, "")]
        );
        assert_eq!(split_partial(r"a\ ").unwrap(), vec![Token::new(0, "a ")]);
        assert_eq!(split_partial("").unwrap(), vec![Token::new(0, "")]);
        assert_eq!(split_partial("x \\"), Err(LexError::DanglingEscape));
    }
}
