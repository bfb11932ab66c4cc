//! Incremental validating tokenizer for a single JSON document.
//!
//! Checks the full JSON grammar (scalars, key/colon/comma placement and
//! container nesting) byte by byte, so a stream can be cut at the exact
//! byte where the top-level value closes and any syntax error surfaces on
//! the chunk that contains it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    NeedMore,
    /// Offset one past the closing byte, counted from the start of the stream.
    Complete(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// What the next non-whitespace byte may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Expect {
    #[default]
    Document,
    Value,
    ValueOrClose,
    Key,
    KeyOrClose,
    Colon,
    CommaOrClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Pending,
    /// Hex digits still owed by a `\u` escape.
    Unicode(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Number {
    Minus,
    Zero,
    Int,
    FracStart,
    Frac,
    ExpStart,
    ExpSign,
    Exp,
}

impl Number {
    fn is_terminal(self) -> bool {
        matches!(self, Number::Zero | Number::Int | Number::Frac | Number::Exp)
    }

    /// Next state for `byte`, or `None` when the byte does not extend the number.
    fn advance(self, byte: u8) -> Option<Number> {
        match (self, byte) {
            (Number::Minus, b'0') => Some(Number::Zero),
            (Number::Minus, b'1'..=b'9') => Some(Number::Int),
            (Number::Int, b'0'..=b'9') => Some(Number::Int),
            (Number::Zero | Number::Int, b'.') => Some(Number::FracStart),
            (Number::FracStart | Number::Frac, b'0'..=b'9') => Some(Number::Frac),
            (Number::Zero | Number::Int | Number::Frac, b'e' | b'E') => Some(Number::ExpStart),
            (Number::ExpStart, b'+' | b'-') => Some(Number::ExpSign),
            (Number::ExpStart | Number::ExpSign | Number::Exp, b'0'..=b'9') => Some(Number::Exp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    String { key: bool, escape: Escape },
    Number(Number),
    Literal { text: &'static [u8], matched: usize },
}

#[derive(Debug, Default)]
pub struct FrameScanner {
    stack: Vec<Container>,
    expect: Expect,
    token: Option<Token>,
    consumed: usize,
}

fn describe(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", byte as char)
    } else {
        format!("byte 0x{byte:02x}")
    }
}

fn error(offset: usize, reason: impl Into<String>) -> ScanError {
    ScanError {
        offset,
        reason: reason.into(),
    }
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<ScanOutcome, ScanError> {
        for (i, &byte) in chunk.iter().enumerate() {
            let offset = self.consumed + i;
            if self.step(byte, offset)? {
                self.consumed = offset + 1;
                return Ok(ScanOutcome::Complete(offset + 1));
            }
        }

        self.consumed += chunk.len();
        Ok(ScanOutcome::NeedMore)
    }

    /// Consumes one byte. Returns `true` when it closed the top-level value.
    fn step(&mut self, byte: u8, offset: usize) -> Result<bool, ScanError> {
        match self.token {
            Some(Token::String { key, escape }) => {
                self.string_byte(key, escape, byte, offset)?;
                return Ok(false);
            }
            Some(Token::Literal { text, matched }) => {
                if text.get(matched) != Some(&byte) {
                    return Err(error(
                        offset,
                        format!("invalid literal, found {}", describe(byte)),
                    ));
                }
                self.token = if matched + 1 == text.len() {
                    self.expect = Expect::CommaOrClose;
                    None
                } else {
                    Some(Token::Literal {
                        text,
                        matched: matched + 1,
                    })
                };
                return Ok(false);
            }
            Some(Token::Number(state)) => {
                if let Some(next) = state.advance(byte) {
                    self.token = Some(Token::Number(next));
                    return Ok(false);
                }
                if !state.is_terminal() {
                    return Err(error(
                        offset,
                        format!("incomplete number, found {}", describe(byte)),
                    ));
                }
                self.token = None;
                self.expect = Expect::CommaOrClose;
                // the delimiter is structural, fall through
            }
            None => {}
        }

        if matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
            return Ok(false);
        }

        match self.expect {
            Expect::Document => match byte {
                b'{' | b'[' => self.open(byte),
                other => Err(error(
                    offset,
                    format!("expected a JSON object, found {}", describe(other)),
                )),
            },
            Expect::Value => self.value_start(byte, offset),
            Expect::ValueOrClose => {
                if byte == b']' {
                    self.close(byte, offset)
                } else {
                    self.value_start(byte, offset)
                }
            }
            Expect::Key | Expect::KeyOrClose => match byte {
                b'"' => {
                    self.token = Some(Token::String {
                        key: true,
                        escape: Escape::None,
                    });
                    Ok(false)
                }
                b'}' if self.expect == Expect::KeyOrClose => self.close(byte, offset),
                other => Err(error(
                    offset,
                    format!("expected an object key, found {}", describe(other)),
                )),
            },
            Expect::Colon => {
                if byte != b':' {
                    return Err(error(
                        offset,
                        format!("expected ':', found {}", describe(byte)),
                    ));
                }
                self.expect = Expect::Value;
                Ok(false)
            }
            Expect::CommaOrClose => match (byte, self.stack.last()) {
                (b',', Some(Container::Object)) => {
                    self.expect = Expect::Key;
                    Ok(false)
                }
                (b',', Some(Container::Array)) => {
                    self.expect = Expect::Value;
                    Ok(false)
                }
                (b'}' | b']', _) => self.close(byte, offset),
                (other, Some(Container::Object)) => Err(error(
                    offset,
                    format!("expected ',' or '}}', found {}", describe(other)),
                )),
                (other, _) => Err(error(
                    offset,
                    format!("expected ',' or ']', found {}", describe(other)),
                )),
            },
        }
    }

    fn string_byte(
        &mut self,
        key: bool,
        escape: Escape,
        byte: u8,
        offset: usize,
    ) -> Result<(), ScanError> {
        let escape = match escape {
            Escape::Pending => match byte {
                b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Escape::None,
                b'u' => Escape::Unicode(4),
                other => {
                    return Err(error(
                        offset,
                        format!("invalid escape {}", describe(other)),
                    ))
                }
            },
            Escape::Unicode(owed) => {
                if !byte.is_ascii_hexdigit() {
                    return Err(error(
                        offset,
                        format!("invalid \\u escape, found {}", describe(byte)),
                    ));
                }
                if owed == 1 {
                    Escape::None
                } else {
                    Escape::Unicode(owed - 1)
                }
            }
            Escape::None => match byte {
                b'\\' => Escape::Pending,
                b'"' => {
                    self.token = None;
                    self.expect = if key {
                        Expect::Colon
                    } else {
                        Expect::CommaOrClose
                    };
                    return Ok(());
                }
                0x00..=0x1f => {
                    return Err(error(
                        offset,
                        format!("control character {} in string", describe(byte)),
                    ))
                }
                _ => Escape::None,
            },
        };
        self.token = Some(Token::String { key, escape });
        Ok(())
    }

    fn value_start(&mut self, byte: u8, offset: usize) -> Result<bool, ScanError> {
        self.token = match byte {
            b'{' | b'[' => return self.open(byte),
            b'"' => Some(Token::String {
                key: false,
                escape: Escape::None,
            }),
            b'-' => Some(Token::Number(Number::Minus)),
            b'0' => Some(Token::Number(Number::Zero)),
            b'1'..=b'9' => Some(Token::Number(Number::Int)),
            b't' => Some(Token::Literal {
                text: b"true",
                matched: 1,
            }),
            b'f' => Some(Token::Literal {
                text: b"false",
                matched: 1,
            }),
            b'n' => Some(Token::Literal {
                text: b"null",
                matched: 1,
            }),
            other => {
                return Err(error(
                    offset,
                    format!("expected a value, found {}", describe(other)),
                ))
            }
        };
        Ok(false)
    }

    fn open(&mut self, byte: u8) -> Result<bool, ScanError> {
        if byte == b'{' {
            self.stack.push(Container::Object);
            self.expect = Expect::KeyOrClose;
        } else {
            self.stack.push(Container::Array);
            self.expect = Expect::ValueOrClose;
        }
        Ok(false)
    }

    fn close(&mut self, byte: u8, offset: usize) -> Result<bool, ScanError> {
        let expected = match self.stack.pop() {
            Some(Container::Object) => b'}',
            Some(Container::Array) => b']',
            None => return Err(error(offset, format!("unexpected {}", describe(byte)))),
        };
        if expected != byte {
            return Err(error(offset, format!("unexpected {}", describe(byte))));
        }
        self.expect = Expect::CommaOrClose;
        Ok(self.stack.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(doc: &[u8]) -> Result<ScanOutcome, ScanError> {
        FrameScanner::new().feed(doc)
    }

    #[test]
    fn test_complete_in_one_chunk() {
        let mut scanner = FrameScanner::new();
        let doc = br#"  {"a": [1, 2], "b": "x"} trailing"#;
        assert_eq!(scanner.feed(doc).unwrap(), ScanOutcome::Complete(25));
    }

    #[test]
    fn test_split_across_chunks_inside_string() {
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.feed(br#"{"strings": ["a}"#).unwrap(), ScanOutcome::NeedMore);
        assert_eq!(scanner.depth(), 2);
        assert_eq!(scanner.feed(br#"\"]"#).unwrap(), ScanOutcome::NeedMore);
        assert_eq!(scanner.feed(br#"", "]"]}"#).unwrap(), ScanOutcome::Complete(27));
    }

    #[test]
    fn test_escape_split_at_chunk_boundary() {
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.feed(br#"{"k": "\"#).unwrap(), ScanOutcome::NeedMore);
        // the quote is escaped, the string is still open
        assert_eq!(scanner.feed(br#""}"#).unwrap(), ScanOutcome::NeedMore);
        assert!(matches!(scanner.feed(br#""}"#).unwrap(), ScanOutcome::Complete(_)));
    }

    #[test]
    fn test_mismatched_closer_fails_at_offset() {
        let mut scanner = FrameScanner::new();
        let err = scanner.feed(b"{\"nodes\": [1, 2}").unwrap_err();
        assert_eq!(err.offset, 15);
    }

    #[test]
    fn test_leading_garbage_fails() {
        let mut scanner = FrameScanner::new();
        let err = scanner.feed(b"  nope").unwrap_err();
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_accepts_every_scalar_form() {
        let doc = br#"{"a": [0, -1, 12.5e+3, 3E-2, -0.0, true, false, null, "\u00e9\n\/"], "b": {}, "c": []}"#;
        assert_eq!(scan_all(doc).unwrap(), ScanOutcome::Complete(doc.len()));
    }

    #[test]
    fn test_garbage_token_fails_before_the_frame_closes() {
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.feed(b"{\"nodes\": [1 ").unwrap(), ScanOutcome::NeedMore);
        let err = scanner.feed(b"x").unwrap_err();
        assert_eq!(err.offset, 13);
        assert!(err.reason.contains("expected ',' or ']'"), "{}", err.reason);
    }

    #[test]
    fn test_token_level_errors_report_their_offset() {
        let cases: [(&[u8], usize); 10] = [
            (b"{\"a\" 1}", 5),
            (b"{\"a\": 1 \"b\": 2}", 8),
            (b"{1: 2}", 1),
            (b"{\"a\": tru}", 9),
            (b"{\"a\": 01}", 7),
            (b"{\"a\": -}", 7),
            (b"{\"a\": 1.}", 8),
            (b"{\"a\": [1,]}", 9),
            (b"{\"a\": \"\\x\"}", 8),
            (b"{\"a\": \"\\u12g4\"}", 11),
        ];
        for (doc, offset) in cases {
            let err = scan_all(doc).unwrap_err();
            assert_eq!(err.offset, offset, "{}", String::from_utf8_lossy(doc));
        }
    }

    #[test]
    fn test_control_character_in_string_fails() {
        let err = scan_all(b"{\"a\": \"x\ny\"}").unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn test_number_split_across_chunks() {
        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.feed(b"{\"n\": [12").unwrap(), ScanOutcome::NeedMore);
        assert_eq!(scanner.feed(b"34e").unwrap(), ScanOutcome::NeedMore);
        assert_eq!(scanner.feed(b"-2]}").unwrap(), ScanOutcome::Complete(16));
    }
}
