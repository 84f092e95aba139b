//! FITS header model: ordered 80-column cards with typed values.
//!
//! Cards are parsed either from the fixed 80-column layout used inside FITS
//! files or from free-form `KEY = value / comment` lines such as the ones in
//! hand-edited header text files. Both end up as the same [`Card`].

use crate::error::HeaderError;
use std::fmt;

/// Length of one header card in bytes
pub const CARD_LEN: usize = 80;

const HIERARCH: &str = "HIERARCH";

/// Value carried by a keyword card
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Logical(bool),
    Int(i64),
    Float(f64),
    /// Any other token (complex numbers, malformed values), kept verbatim
    Raw(String),
    /// Value indicator present but no value given
    Undefined,
}

impl Value {
    /// Parse a non-string value token (the text between `=` and `/`)
    pub fn parse(token: &str) -> Value {
        let token = token.trim();
        match token {
            "" => return Value::Undefined,
            "T" => return Value::Logical(true),
            "F" => return Value::Logical(false),
            _ => {}
        }

        if let Ok(n) = token.parse::<i64>() {
            return Value::Int(n);
        }

        if token.chars().any(|c| c.is_ascii_digit()) {
            // FITS allows a D exponent for double precision values
            if let Ok(f) = token.replace(['D', 'd'], "E").parse::<f64>() {
                return Value::Float(f);
            }
        }

        Value::Raw(token.to_string())
    }

    /// Render the value the way it appears inside a card
    pub fn to_card_text(&self) -> String {
        match self {
            Value::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
            Value::Logical(b) => String::from(if *b { "T" } else { "F" }),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_real(*f),
            Value::Raw(s) => s.clone(),
            Value::Undefined => String::new(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Raw(s) => write!(f, "{}", s),
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_real(*x)),
            Value::Undefined => Ok(()),
        }
    }
}

/// Format a real number so that it always reads back as a real
pub fn format_real(f: f64) -> String {
    if !f.is_finite() {
        return f.to_string();
    }

    let abs = f.abs();
    let text = if abs == 0.0 || (1e-4..1e15).contains(&abs) {
        format!("{}", f)
    } else {
        format!("{:E}", f)
    };

    if text.contains('.') {
        text
    } else if let Some(pos) = text.find('E') {
        format!("{}.0{}", &text[..pos], &text[pos..])
    } else {
        format!("{}.0", text)
    }
}

/// Upper-case a keyword and collapse internal whitespace (for HIERARCH names)
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Split a quoted FITS string off the front of `field`, which must start
/// with a quote. Returns the unescaped text and whatever follows the closing
/// quote.
fn parse_quoted(field: &str) -> Option<(String, &str)> {
    let quoted = field.strip_prefix('\'')?;
    let mut text = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            text.push(c);
            continue;
        }
        // '' is an escaped quote inside the string
        if let Some(&(_, '\'')) = chars.peek() {
            text.push('\'');
            chars.next();
        } else {
            return Some((text, &quoted[i + 1..]));
        }
    }
    None
}

/// One header card
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    /// `None` for commentary cards (COMMENT, HISTORY, blank, CONTINUE...)
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: Value, comment: Option<&str>) -> Self {
        Self {
            keyword: normalize_keyword(keyword),
            value: Some(value),
            comment: comment.map(str::to_string),
        }
    }

    pub fn commentary(keyword: &str, text: &str) -> Self {
        Self {
            keyword: normalize_keyword(keyword),
            value: None,
            comment: Some(text.to_string()),
        }
    }

    pub fn is_commentary(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_hierarch(&self) -> bool {
        self.keyword.starts_with("HIERARCH ")
    }

    /// Parse one card, either a fixed 80-column card or a free-form line.
    /// `line_no` is only used for error messages.
    pub fn parse(line: &str, line_no: usize) -> Result<Card, HeaderError> {
        let line = line.trim_end_matches(['\r', '\n']);

        // HIERARCH ESO DET DIT = 10.0 / comment
        let is_hierarch = line
            .get(..HIERARCH.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(HIERARCH));
        if is_hierarch {
            if let Some(eq) = line.find('=') {
                let keyword = normalize_keyword(&line[..eq]);
                return Self::with_value_field(keyword, &line[eq + 1..], line, line_no);
            }
        }

        let head = line.get(..8).unwrap_or(line);
        if line.get(8..10) == Some("= ") {
            let keyword = normalize_keyword(head);
            return Self::with_value_field(keyword, &line[10..], line, line_no);
        }

        // Free-form "KEY = value" lines, as written by hand in text headers.
        // A leading blank keyword field means a blank commentary card.
        if !head.trim().is_empty() {
            if let Some(eq) = line.find('=') {
                let keyword = line[..eq].trim();
                let upper = keyword.to_uppercase();
                if !keyword.is_empty()
                    && keyword.chars().all(is_keyword_char)
                    && upper != "COMMENT"
                    && upper != "HISTORY"
                {
                    return Self::with_value_field(upper, &line[eq + 1..], line, line_no);
                }
            }
        }

        let text = line.get(8..).unwrap_or("").trim_end();
        Ok(Card {
            keyword: normalize_keyword(head),
            value: None,
            comment: Some(text.to_string()),
        })
    }

    fn with_value_field(
        keyword: String,
        field: &str,
        line: &str,
        line_no: usize,
    ) -> Result<Card, HeaderError> {
        let field = field.trim_start();

        let (value, remainder) = if field.starts_with('\'') {
            let (text, rest) =
                parse_quoted(field).ok_or_else(|| HeaderError::UnterminatedString {
                    line: line_no,
                    card: line.trim_end().to_string(),
                })?;
            // trailing blanks in FITS strings are not significant
            (Value::Str(text.trim_end().to_string()), rest)
        } else {
            match field.find('/') {
                Some(slash) => (Value::parse(&field[..slash]), &field[slash..]),
                None => (Value::parse(field), ""),
            }
        };

        let comment = remainder
            .trim_start()
            .strip_prefix('/')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Card {
            keyword,
            value: Some(value),
            comment,
        })
    }

    /// Card text padded to [`CARD_LEN`]; longer when the card does not fit
    fn render(&self) -> String {
        let card = match &self.value {
            None => format!(
                "{:<8}{}",
                self.keyword,
                self.comment.as_deref().unwrap_or("")
            ),
            Some(value) => {
                let text = value.to_card_text();
                let mut card = if self.is_hierarch() {
                    format!("{} = {}", self.keyword, text)
                } else if matches!(value, Value::Str(_)) {
                    format!("{:<8}= {:<20}", self.keyword, text)
                } else {
                    format!("{:<8}= {:>20}", self.keyword, text)
                };
                if let Some(comment) = &self.comment {
                    card.push_str(" / ");
                    card.push_str(comment);
                }
                card
            }
        };

        let card: String = card
            .chars()
            .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
            .collect();
        format!("{:<width$}", card, width = CARD_LEN)
    }

    /// Render as exactly [`CARD_LEN`] ASCII characters
    pub fn to_card_string(&self) -> Result<String, HeaderError> {
        let card = self.render();
        if card.len() > CARD_LEN {
            return Err(HeaderError::CardTooLong {
                keyword: self.keyword.clone(),
                width: card.len(),
            });
        }
        Ok(card)
    }

    /// Check that the card can be written to a FITS header. String values
    /// of any length can be continued over CONTINUE cards, and COMMENT and
    /// HISTORY text is split over several cards. Everything else has to fit
    /// in one.
    pub fn check_width(&self) -> Result<(), HeaderError> {
        match &self.value {
            None if matches!(self.keyword.as_str(), "COMMENT" | "HISTORY") => Ok(()),
            Some(Value::Str(_)) => {
                let head = Card {
                    keyword: self.keyword.clone(),
                    value: Some(Value::Str("&".to_string())),
                    comment: None,
                };
                head.to_card_string().map(|_| ())
            }
            _ => self.to_card_string().map(|_| ()),
        }
    }
}

/// Ordered list of cards. The END card is implicit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Case-insensitive keyword lookup; returns the first matching card
    pub fn get(&self, keyword: &str) -> Option<&Card> {
        let keyword = normalize_keyword(keyword);
        self.cards.iter().find(|c| c.keyword == keyword)
    }

    pub fn value(&self, keyword: &str) -> Option<&Value> {
        self.get(keyword).and_then(|c| c.value.as_ref())
    }

    pub fn int(&self, keyword: &str) -> Option<i64> {
        self.value(keyword).and_then(Value::as_i64)
    }

    pub fn string(&self, keyword: &str) -> Option<&str> {
        self.value(keyword).and_then(Value::as_str)
    }

    pub fn logical(&self, keyword: &str) -> Option<bool> {
        self.value(keyword).and_then(Value::as_bool)
    }

    /// String value of `keyword`, following the `&` / CONTINUE long-string
    /// convention across cards
    pub fn long_string(&self, keyword: &str) -> Option<String> {
        let keyword = normalize_keyword(keyword);
        let start = self.cards.iter().position(|c| c.keyword == keyword)?;
        let mut text = self.cards[start].value.as_ref()?.as_str()?.to_string();

        for card in &self.cards[start + 1..] {
            let Some(head) = text.strip_suffix('&') else {
                break;
            };
            if card.keyword != "CONTINUE" {
                break;
            }
            let Some((part, _)) = card
                .comment
                .as_deref()
                .and_then(|c| parse_quoted(c.trim_start()))
            else {
                break;
            };
            text = format!("{}{}", head, part);
        }
        Some(text.trim_end().to_string())
    }

    /// Append a card without checking for an existing one
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Insert or overwrite.
    ///
    /// A keyword card replaces the first card with the same keyword in place,
    /// or is appended. A commentary card is appended unless an identical
    /// card is already present.
    pub fn set(&mut self, card: Card) {
        if card.is_commentary() {
            if !self.cards.contains(&card) {
                self.cards.push(card);
            }
            return;
        }

        match self
            .cards
            .iter_mut()
            .find(|c| !c.is_commentary() && c.keyword == card.keyword)
        {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    /// One card per line, trailing blanks trimmed, followed by END
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for card in &self.cards {
            text.push_str(card.render().trim_end());
            text.push('\n');
        }
        text.push_str("END\n");
        text
    }

    /// Parse a plain-text header: one card per line, stopping at an `END`
    /// line. Blank lines are skipped. Keywords longer than eight characters
    /// are converted to HIERARCH form, and unquoted words are read as
    /// strings.
    pub fn parse_text(text: &str) -> Result<Header, HeaderError> {
        let mut header = Header::new();
        let mut saw_end = false;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case("END") {
                saw_end = true;
                break;
            }
            if trimmed.is_empty() {
                continue;
            }

            let mut card = Card::parse(line, line_no)?;
            if !card.is_hierarch() {
                if !card.keyword.chars().all(is_keyword_char) {
                    return Err(HeaderError::InvalidKeyword {
                        line: line_no,
                        keyword: card.keyword,
                    });
                }
                if card.keyword.len() > 8 {
                    tracing::warn!(
                        "Line {}: keyword {} is longer than 8 characters, using HIERARCH form",
                        line_no,
                        card.keyword
                    );
                    card.keyword = format!("{} {}", HIERARCH, card.keyword);
                }
            }
            // complex numbers are the only unquoted values that are not numbers
            if let Some(Value::Raw(token)) = &card.value {
                if !token.starts_with('(') {
                    tracing::warn!(
                        "Line {}: value of {} is not quoted, writing it as the string '{}'",
                        line_no,
                        card.keyword,
                        token
                    );
                    card.value = Some(Value::Str(token.clone()));
                }
            }
            header.push(card);
        }

        if !saw_end {
            tracing::warn!("Header text has no END line, using all {} cards", header.len());
        }

        Ok(header)
    }
}
