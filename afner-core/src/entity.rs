//! # Entidades, Buffers e Refinamento
//!
//! Estruturas de saída do reconhecedor e a máquina de estados que as monta.
//!
//! ## Buffers multi-token
//!
//! Um [`EntBuffer`] é uma entidade em construção: abre num token classificado
//! como *begin*, cresce com tokens *inside* da mesma tag e é finalizado quando a
//! cadeia termina. A confiança da entidade final é a média geométrica das
//! probabilidades dos tokens:
//!
//! $$ conf = \exp\Big(\frac{1}{n}\sum_{t=1}^{n} \ln p_t\Big) $$
//!
//! [`BufferGenerations`] guarda duas gerações (anterior e atual), chaveadas por
//! `(início, tag)`, e avança uma vez por token.
//!
//! ## Refinamento de rótulo único
//!
//! [`refine_entities`] remove sobreposições de forma gulosa: entre candidatos com
//! o mesmo início vence o que termina mais à direita (empate: maior confiança) e
//! um candidato só entra se começar depois do fim da última entidade aceita.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tagset::EntityTag;

/// Limite absoluto para um candidato ser aceito.
const CANDIDATE_FLOOR: f64 = 0.1;
/// Fração da probabilidade do candidato anterior que o próximo precisa superar.
const CANDIDATE_DECAY: f64 = 0.5;

/// Origem de uma entidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Classify,
    Regex,
    List,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Classify => "classify",
            Provenance::Regex => "regex",
            Provenance::List => "list",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entidade finalizada sobre `[left, right)` em bytes do texto.
///
/// Ordem e igualdade consideram apenas `(left, right, tag)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEntity {
    pub left: usize,
    pub right: usize,
    pub tag: EntityTag,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl NamedEntity {
    pub fn new(left: usize, right: usize, tag: EntityTag, confidence: f64, provenance: Provenance) -> Self {
        Self { left, right, tag, confidence, provenance }
    }

    pub fn len(&self) -> usize {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.left..self.right).unwrap_or("")
    }

    /// `Offset: l-r; Word: w; Entity Type: <tag>; Probability: p Method: m`
    pub fn details(&self, source: &str) -> String {
        format!(
            "Offset: {}-{}; Word: {}; Entity Type: {}; Probability: {} Method: {}",
            self.left,
            self.right,
            self.text(source),
            self.tag.opening_tag(),
            self.confidence,
            self.provenance,
        )
    }

    /// Linha no formato TREC: `<tag>  l  r`.
    pub fn trec_details(&self) -> String {
        format!("{}  {}  {}", self.tag.opening_tag(), self.left, self.right)
    }

    fn key(&self) -> (usize, usize, &EntityTag) {
        (self.left, self.right, &self.tag)
    }
}

impl PartialEq for NamedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NamedEntity {}

impl PartialOrd for NamedEntity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NamedEntity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Conjunto ordenado de entidades. A primeira inserção de uma chave vence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    entities: BTreeSet<NamedEntity>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devolve `false` se já havia entidade com os mesmos offsets e tag.
    pub fn insert(&mut self, entity: NamedEntity) -> bool {
        self.entities.insert(entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn first(&self) -> Option<&NamedEntity> {
        self.entities.first()
    }

    /// Entidades com confiança `>= threshold`, em ordem.
    pub fn above(&self, threshold: f64) -> impl Iterator<Item = &NamedEntity> {
        self.entities.iter().filter(move |e| e.confidence >= threshold)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entities.iter().collect::<Vec<_>>())
    }
}

impl FromIterator<NamedEntity> for EntitySet {
    fn from_iter<I: IntoIterator<Item = NamedEntity>>(iter: I) -> Self {
        let mut set = Self::new();
        for e in iter {
            set.insert(e);
        }
        set
    }
}

impl IntoIterator for EntitySet {
    type Item = NamedEntity;
    type IntoIter = std::collections::btree_set::IntoIter<NamedEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a NamedEntity;
    type IntoIter = std::collections::btree_set::Iter<'a, NamedEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

/// Entidade em construção.
#[derive(Debug, Clone, PartialEq)]
pub struct EntBuffer {
    pub start: usize,
    pub end: usize,
    pub tag_index: usize,
    probs: Vec<f64>,
}

impl EntBuffer {
    pub fn new(start: usize, end: usize, tag_index: usize, prob: f64) -> Self {
        Self { start, end, tag_index, probs: vec![prob] }
    }

    pub fn add_token(&mut self, end: usize, prob: f64) {
        self.end = end;
        self.probs.push(prob);
    }

    /// Cópia estendida até `end`; o buffer original fica intacto.
    pub fn extended(&self, end: usize, prob: f64) -> Self {
        let mut next = self.clone();
        next.add_token(end, prob);
        next
    }

    pub fn token_count(&self) -> usize {
        self.probs.len()
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Média geométrica das probabilidades dos tokens.
    pub fn geometric_mean(&self) -> f64 {
        if self.probs.is_empty() {
            return 0.0;
        }
        let log_sum: f64 = self.probs.iter().map(|p| p.ln()).sum();
        (log_sum / self.probs.len() as f64).exp()
    }
}

/// Classe candidata de um token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class: usize,
    pub prob: f64,
}

/// Até `max_labels` classes, em ordem decrescente de probabilidade.
///
/// Uma classe só entra se `p > 0.1` e `p > 0.5 * p_anterior`; a primeira
/// que falhar encerra a seleção.
pub fn select_candidates(probs: &[f64], max_labels: usize) -> Vec<Candidate> {
    let mut remaining = probs.to_vec();
    let mut out = Vec::new();
    let mut prev = 0.0;

    for _ in 0..max_labels {
        let Some((class, &max)) = remaining
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &f64)>, (c, p)| match best {
                Some((_, b)) if *b >= *p => best,
                _ => Some((c, p)),
            })
        else {
            break;
        };
        if !(max > CANDIDATE_DECAY * prev && max > CANDIDATE_FLOOR) {
            break;
        }
        out.push(Candidate { class, prob: max });
        prev = max;
        remaining[class] = 0.0;
    }
    out
}

type BufferKey = (usize, usize);

/// Duas gerações de buffers avançadas token a token.
#[derive(Debug, Clone, Default)]
pub struct BufferGenerations {
    previous: BTreeMap<BufferKey, EntBuffer>,
    current: BTreeMap<BufferKey, EntBuffer>,
    /// Buffers da geração anterior que continuam na atual.
    carried: BTreeSet<BufferKey>,
}

impl BufferGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_current(&mut self, buffer: EntBuffer) {
        self.current.entry((buffer.start, buffer.tag_index)).or_insert(buffer);
    }

    /// Buffers anteriores da tag dada.
    fn previous_of(&self, tag_index: usize) -> Vec<(BufferKey, EntBuffer)> {
        self.previous
            .iter()
            .filter(|(_, b)| b.tag_index == tag_index)
            .map(|(k, b)| (*k, b.clone()))
            .collect()
    }

    /// Finaliza todos os buffers da geração anterior.
    pub fn flush_previous(&mut self) -> Vec<EntBuffer> {
        self.carried.extend(self.previous.keys().copied());
        self.previous.values().cloned().collect()
    }

    /// Candidato begin: abre um buffer novo e, para cada buffer anterior da
    /// mesma tag, finaliza-o e carrega uma cópia estendida.
    pub fn begin(&mut self, start: usize, end: usize, tag_index: usize, prob: f64) -> Vec<EntBuffer> {
        self.push_current(EntBuffer::new(start, end, tag_index, prob));
        let mut finished = Vec::new();
        for (key, buffer) in self.previous_of(tag_index) {
            self.push_current(buffer.extended(end, prob));
            self.carried.insert(key);
            finished.push(buffer);
        }
        finished
    }

    /// Candidato inside: estende os buffers anteriores da mesma tag ou, se não
    /// houver nenhum, abre um novo.
    pub fn inside(&mut self, start: usize, end: usize, tag_index: usize, prob: f64) {
        let open = self.previous_of(tag_index);
        if open.is_empty() {
            self.push_current(EntBuffer::new(start, end, tag_index, prob));
            return;
        }
        for (key, buffer) in open {
            self.push_current(buffer.extended(end, prob));
            self.carried.insert(key);
        }
    }

    /// Troca de geração. Devolve os buffers anteriores que não continuaram.
    pub fn advance(&mut self) -> Vec<EntBuffer> {
        let previous = std::mem::take(&mut self.previous);
        let dropped = previous
            .into_iter()
            .filter(|(k, _)| !self.carried.contains(k))
            .map(|(_, b)| b)
            .collect();
        self.previous = std::mem::take(&mut self.current);
        self.carried.clear();
        dropped
    }

    /// Fim do texto: tudo o que ainda está aberto.
    pub fn finish(&mut self) -> Vec<EntBuffer> {
        let mut rest = self.advance();
        rest.extend(std::mem::take(&mut self.previous).into_values());
        rest
    }

    pub fn open_count(&self) -> usize {
        self.previous.len()
    }
}

/// Remoção gulosa de sobreposições (modo de rótulo único).
pub fn refine_entities(entities: &EntitySet) -> EntitySet {
    let sorted: Vec<&NamedEntity> = entities.iter().collect();
    let mut refined = EntitySet::new();
    let mut last_right: Option<usize> = None;
    let mut i = 0;

    while i < sorted.len() {
        let accept = last_right.map_or(true, |right| sorted[i].left >= right);
        if accept {
            let mut k = i + 1;
            while k < sorted.len() && sorted[k].left == sorted[i].left {
                let (cand, best) = (sorted[k], sorted[i]);
                if cand.right > best.right
                    || (cand.right == best.right && cand.confidence >= best.confidence)
                {
                    i = k;
                }
                k += 1;
            }
            refined.insert(sorted[i].clone());
            last_right = Some(sorted[i].right);
        }
        i += 1;
    }
    refined
}
