//! # Lexer de Palavras, Pontuação e Marcação
//!
//! Divide o texto bruto em spans `[start, end)` de bytes. O token não guarda
//! texto: quem precisa do conteúdo fatia a fonte com [`Token::text`].
//!
//! ## Regras
//!
//! - Espaços e caracteres de controle separam tokens e são descartados.
//! - Uma sequência máxima de caracteres alfanuméricos forma uma **palavra**.
//! - Uma sequência máxima de pontuação ASCII (exceto `<`) forma uma **pontuação**.
//! - `<...>` é um token de **marcação**; sem `>` ele vai até o fim do texto.
//!   Em [`LexMode::SkipMarkup`] a marcação é descartada.
//! - Qualquer outro símbolo vira um token de um caractere.
//!
//! ## Exemplo
//!
//! ```rust
//! use afner_core::tokenizer::{tokenize, LexMode};
//!
//! let text = "<ENAMEX TYPE=\"ORGANIZATION\">IBM</ENAMEX> cresceu.";
//! let tokens = tokenize(text, LexMode::SkipMarkup);
//! let words: Vec<&str> = tokens.iter().map(|t| t.text(text)).collect();
//! assert_eq!(words, vec!["IBM", "cresceu", "."]);
//! ```

use serde::{Deserialize, Serialize};

/// Categoria léxica de um token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Punct,
    Markup,
}

/// Span imutável sobre o texto original.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
    pub kind: TokenKind,
}

impl Token {
    /// Fatia do texto original coberta pelo token.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Tratamento das marcações `<...>` embutidas no texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexMode {
    /// Descarta marcações (texto a reconhecer).
    SkipMarkup,
    /// Emite marcações como tokens [`TokenKind::Markup`] (texto de treino anotado).
    KeepMarkup,
}

impl Default for LexMode {
    fn default() -> Self {
        LexMode::SkipMarkup
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_punct_char(c: char) -> bool {
    c.is_ascii_punctuation() && c != '<'
}

/// Tokeniza `text` segundo as regras do módulo.
pub fn tokenize(text: &str, mode: LexMode) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() || c.is_control() {
            continue;
        }

        let (end, kind) = if c == '<' {
            let mut end = text.len();
            for (i, ch) in chars.by_ref() {
                if ch == '>' {
                    end = i + 1;
                    break;
                }
            }
            (end, TokenKind::Markup)
        } else if is_word_char(c) {
            (scan_run(&mut chars, start + c.len_utf8(), is_word_char), TokenKind::Word)
        } else if is_punct_char(c) {
            (scan_run(&mut chars, start + c.len_utf8(), is_punct_char), TokenKind::Punct)
        } else {
            (start + c.len_utf8(), TokenKind::Punct)
        };

        if kind == TokenKind::Markup && mode == LexMode::SkipMarkup {
            continue;
        }
        push_token(&mut tokens, start, end, kind);
    }
    tokens
}

/// Consome enquanto `pred` vale e devolve o fim (exclusivo) da sequência.
fn scan_run<I>(chars: &mut std::iter::Peekable<I>, mut end: usize, pred: fn(char) -> bool) -> usize
where
    I: Iterator<Item = (usize, char)>,
{
    while let Some(&(i, ch)) = chars.peek() {
        if !pred(ch) {
            break;
        }
        end = i + ch.len_utf8();
        chars.next();
    }
    end
}

fn push_token(tokens: &mut Vec<Token>, start: usize, end: usize, kind: TokenKind) {
    let index = tokens.len();
    tokens.push(Token { start, end, index, kind });
}
