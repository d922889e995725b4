//! # Decoração de Tokens
//!
//! Um [`TokenDecoration`] é um token mais um cache `nome → valor` preenchido
//! durante uma única passada de classificação. Os extratores de features
//! escrevem ali subcálculos (ex: `initCaps`), os casadores de listas e regex
//! marcam `list<k>`/`regex<j>` e o classificador grava `prob<c>` e `maxProb`.
//! Cada documento tem suas próprias decorações; elas nunca são compartilhadas.

use std::collections::HashMap;

use crate::tokenizer::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenDecoration {
    pub token: Token,
    info: HashMap<String, f64>,
}

impl TokenDecoration {
    pub fn new(token: Token) -> Self {
        Self { token, info: HashMap::new() }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.token.text(source)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.info.get(key).copied()
    }

    /// Valor memoizado, ou `0.0` quando a chave nunca foi escrita.
    pub fn value(&self, key: &str) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.info.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.info.insert(key.into(), value);
    }

    /// Número de campos já memoizados.
    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

pub fn decorate(tokens: &[Token]) -> Vec<TokenDecoration> {
    tokens.iter().copied().map(TokenDecoration::new).collect()
}
