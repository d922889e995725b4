//! # Texto Anotado para Treino
//!
//! O treino parte de texto com marcação inline:
//!
//! ```text
//! A <ENAMEX TYPE="ORGANIZATION">Microsoft Research</ENAMEX> abriu.
//! ```
//!
//! [`annotate`] tokeniza mantendo a marcação e atribui a cada token de texto
//! sua classe verdadeira: o token logo após uma tag de abertura conhecida recebe
//! a classe begin (`2i+1`), os seguintes até o fechamento recebem inside
//! (`2i+2`) e o resto recebe 0. Tags fora do tagset contam como 0.
//!
//! [`gold_decorations`] grava essas classes como se fossem a saída do
//! classificador (`maxProb` e `prob<c>` em 0/1), alimentando as features
//! sequenciais na geração de eventos.

use serde::Serialize;

use crate::decoration::TokenDecoration;
use crate::frequency::FrequencyCounter;
use crate::tagset::{Classification, EntityTag, EntityTagset};
use crate::tokenizer::{tokenize, LexMode, Token, TokenKind};

/// Tokens de texto (sem marcação) e suas classes verdadeiras.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotatedDocument {
    pub tokens: Vec<Token>,
    pub classes: Vec<usize>,
}

pub fn annotate(text: &str, tagset: &EntityTagset) -> AnnotatedDocument {
    let mut doc = AnnotatedDocument::default();
    let mut open: Option<usize> = None;
    let mut at_begin = false;

    for token in tokenize(text, LexMode::KeepMarkup) {
        let raw = token.text(text);
        if token.kind == TokenKind::Markup {
            if raw.starts_with("</") {
                open = None;
            } else {
                open = EntityTag::parse(raw).ok().and_then(|t| tagset.index_of(&t));
                if open.is_none() {
                    tracing::debug!(markup = raw, "tag fora do tagset tratada como outside");
                }
                at_begin = true;
            }
            continue;
        }

        let class = match open {
            Some(i) if at_begin => Classification::Begin(i).class(),
            Some(i) => Classification::Inside(i).class(),
            None => tagset.out_class(),
        };
        at_begin = false;
        doc.tokens.push(Token { index: doc.tokens.len(), ..token });
        doc.classes.push(class);
    }
    doc
}

/// Decorações com a classe verdadeira no lugar da posterior.
pub fn gold_decorations(doc: &AnnotatedDocument, class_count: usize) -> Vec<TokenDecoration> {
    doc.tokens
        .iter()
        .zip(&doc.classes)
        .map(|(&token, &class)| {
            let mut deco = TokenDecoration::new(token);
            deco.set("maxProb", class as f64);
            for c in 0..class_count {
                deco.set(format!("prob{c}"), if c == class { 1.0 } else { 0.0 });
            }
            deco
        })
        .collect()
}

/// Conta as frequências de um documento anotado.
pub fn count_frequencies(text: &str, tagset: &EntityTagset, counter: &mut FrequencyCounter) {
    let doc = annotate(text, tagset);
    counter.observe(text, &doc.tokens, &doc.classes, tagset);
}
