//! # Frequências de Tokens por Classe
//!
//! Durante o treino conta-se quantas vezes cada token apareceu dentro de cada
//! tag (e quantas vezes cada token *precedeu* um token da tag). Na inferência
//! as features `TF`/`PTF` usam a proporção normalizada:
//!
//! $$ TF_c(w) = \frac{count_c(w)}{\max_{w'} count_c(w')} $$
//!
//! ## Formato do arquivo
//!
//! ```text
//! #### Tag 0 --------------------
//! Paris 10
//! Londres 4
//!
//! #### Tag 1 --------------------
//! Silva 7
//! ```
//!
//! O primeiro inteiro após `####` é o índice da tag. Os blocos são acessados
//! pela posição em que aparecem.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{read_to_string, NerError, Result};
use crate::tagset::EntityTagset;
use crate::tokenizer::Token;

#[derive(Debug, Clone, Default)]
pub struct FrequencyBlock {
    pub tag_index: usize,
    counts: HashMap<String, u64>,
    /// Maior contagem do bloco; nunca menor que 1.
    max_count: u64,
}

impl FrequencyBlock {
    fn new(tag_index: usize) -> Self {
        Self { tag_index, counts: HashMap::new(), max_count: 1 }
    }

    pub fn count(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }
}

/// Tabela de frequências carregada de um arquivo.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    blocks: Vec<FrequencyBlock>,
}

impl FrequencyTable {
    pub fn parse(content: &str) -> Result<Self> {
        let mut blocks: Vec<FrequencyBlock> = Vec::new();

        for (n, line) in content.lines().enumerate() {
            let mut words = line.split_whitespace();
            let Some(first) = words.next() else { continue };

            if first == "####" {
                let tag_index = words
                    .find_map(|w| w.parse::<usize>().ok())
                    .ok_or_else(|| NerError::Frequency {
                        line: n + 1,
                        message: "cabeçalho sem índice de tag".to_string(),
                    })?;
                blocks.push(FrequencyBlock::new(tag_index));
                continue;
            }

            let count = words
                .next()
                .and_then(|w| w.parse::<u64>().ok())
                .ok_or_else(|| NerError::Frequency {
                    line: n + 1,
                    message: format!("contagem ausente ou inválida para {first:?}"),
                })?;
            match blocks.last_mut() {
                Some(block) => {
                    block.counts.insert(first.to_string(), count);
                    block.max_count = block.max_count.max(count);
                }
                None => tracing::warn!(line = n + 1, "contagem antes do primeiro cabeçalho ignorada"),
            }
        }
        Ok(Self { blocks })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::parse(&read_to_string(path)?)?;
        tracing::info!(path = %path.display(), blocks = table.class_count(), "frequências carregadas");
        Ok(table)
    }

    /// Número de blocos (classes) registrados.
    pub fn class_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, class: usize) -> Option<&FrequencyBlock> {
        self.blocks.get(class)
    }

    pub fn frequency(&self, token: &str, class: usize) -> u64 {
        self.block(class).map_or(0, |b| b.count(token))
    }

    /// Contagem normalizada pela maior contagem do bloco.
    pub fn proportion(&self, token: &str, class: usize) -> f64 {
        self.block(class)
            .map_or(0.0, |b| b.count(token) as f64 / b.max_count as f64)
    }

    /// Tabela vazia; usada quando não há arquivo de frequências.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Acumula frequências a partir de texto anotado.
#[derive(Debug, Clone)]
pub struct FrequencyCounter {
    tokens: Vec<BTreeMap<String, u64>>,
    previous: Vec<BTreeMap<String, u64>>,
}

impl FrequencyCounter {
    pub fn new(tag_count: usize) -> Self {
        Self {
            tokens: vec![BTreeMap::new(); tag_count],
            previous: vec![BTreeMap::new(); tag_count],
        }
    }

    /// Conta os tokens de um documento dadas suas classes verdadeiras.
    pub fn observe(&mut self, text: &str, tokens: &[Token], classes: &[usize], tagset: &EntityTagset) {
        for (i, (token, &class)) in tokens.iter().zip(classes).enumerate() {
            let Some(tag_index) = tagset.index_of_class(class) else { continue };
            if tag_index >= self.tokens.len() {
                continue;
            }
            *self.tokens[tag_index].entry(token.text(text).to_string()).or_insert(0) += 1;
            if i > 0 {
                let prev = tokens[i - 1].text(text).to_string();
                *self.previous[tag_index].entry(prev).or_insert(0) += 1;
            }
        }
    }

    fn write_blocks<W: Write>(blocks: &[BTreeMap<String, u64>], out: &mut W) -> io::Result<()> {
        for (j, block) in blocks.iter().enumerate() {
            writeln!(out, "#### Tag {j} --------------------")?;
            for (token, count) in block {
                writeln!(out, "{token} {count}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn write_tokens<W: Write>(&self, out: &mut W) -> io::Result<()> {
        Self::write_blocks(&self.tokens, out)
    }

    pub fn write_previous<W: Write>(&self, out: &mut W) -> io::Result<()> {
        Self::write_blocks(&self.previous, out)
    }

    fn to_table(blocks: &[BTreeMap<String, u64>]) -> FrequencyTable {
        let blocks = blocks
            .iter()
            .enumerate()
            .map(|(j, counts)| {
                let mut block = FrequencyBlock::new(j);
                for (token, &count) in counts {
                    block.counts.insert(token.clone(), count);
                    block.max_count = block.max_count.max(count);
                }
                block
            })
            .collect();
        FrequencyTable { blocks }
    }

    /// Tabelas (tokens, tokens anteriores) prontas para inferência.
    pub fn tables(&self) -> (FrequencyTable, FrequencyTable) {
        (Self::to_table(&self.tokens), Self::to_table(&self.previous))
    }
}
