//! # Engenharia de Features para NER
//!
//! Para cada token, extrai um vetor de features numéricas que o classificador
//! MaxEnt combina com os pesos treinados. Cada extrator olha para um token
//! deslocado pelo seu **contexto** (`-k..=k`) em relação ao token avaliado.
//!
//! ## Features Implementadas
//!
//! ### Ortográficas e numéricas (por contexto)
//! | Alias | Feature          | Vale 1 quando                                  |
//! |-------|------------------|------------------------------------------------|
//! | IC    | InitCaps         | primeira letra maiúscula                       |
//! | AC    | AllCaps          | nenhuma letra minúscula                        |
//! | MC    | MixedCaps        | minúscula após maiúscula ou vice-versa         |
//! | ISE   | IsSentEnd        | token é `.`, `!` ou `?`                        |
//! | ICP   | InitCapPeriod    | inicial maiúscula seguida do token `.`         |
//! | OC    | OneCap           | uma única letra maiúscula                      |
//! | CD    | ContainDigit     | contém dígito                                  |
//! | TD    | TwoDigits        | exatamente dois dígitos                        |
//! | FD    | FourDigits       | exatamente quatro dígitos                      |
//! | MN    | MonthName        | nome de mês (inicial normalizada)              |
//! | DW    | DayOfTheWeek     | dia da semana                                  |
//! | NS    | NumberString     | número por extenso                             |
//! | PP    | PrepPreceded     | um dos 4 tokens anteriores é In/On/At          |
//! | AWC   | AlwaysCapped     | toda ocorrência do token no documento é capitalizada |
//!
//! ### Casamentos externos
//! - `PMlist<j>` / `PMregex<j>`: o token foi marcado por um casamento de lista/regex.
//! - `LS<j>`: o texto do token sozinho é uma entrada completa da lista `j`.
//! - `MRX<j>`: o token inteiro casa a regex de feature `j`.
//!
//! ### Sequenciais
//! - `TF<c>` / `PTF<c>`: frequência normalizada do token (ou do anterior) na classe `c`.
//! - `PC<c>`: probabilidade de `c` no token anterior, se `c` foi a classe máxima.
//! - `PRC<c>`: probabilidade de `c` no token anterior.
//!
//! ## Memoização
//!
//! Os subcálculos ficam no cache do [`TokenDecoration`] deslocado (`initCaps`,
//! `allCaps`, `FoundList0`...). Janelas de contexto diferentes que caem no mesmo
//! token reaproveitam o valor.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::decoration::TokenDecoration;
use crate::error::{read_to_string, Result};
use crate::frequency::FrequencyTable;
use crate::gazetteer::GazetteerMatcher;

const MONTHS: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December",
];

const WEEKDAYS: &[&str] = &[
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

const NUMBER_WORDS: &[&str] = &[
    "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen",
    "Eighteen", "Nineteen", "Twenty", "Thirty", "Fourty", "Fifty", "Sixty", "Seventy",
    "Eighty", "Ninety", "Hundred", "Thousand", "Million", "Billion", "Trillion",
    "Quadrillion", "Quintillion",
];

const PREPOSITIONS: &[&str] = &["In", "On", "At"];

/// Quantos tokens anteriores `PrepPreceded` examina.
const PREP_WINDOW: usize = 4;

/// Vetor de features de um token, na ordem dos extratores.
///
/// Nomes repetidos não ocorrem: cada extrator tem um nome único.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<(String, f64)>,
    /// Referência ao índice do token original na sentença.
    pub token_index: usize,
}

impl FeatureVector {
    pub fn new(token_index: usize) -> Self {
        Self { features: Vec::new(), token_index }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.features.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.features.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.features.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Apenas as features com valor diferente de zero.
    pub fn active(&self) -> impl Iterator<Item = (&str, f64)> {
        self.iter().filter(|(_, v)| *v != 0.0)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Tipo de feature. O conjunto é fechado: toda avaliação passa por
/// [`FeaturePipeline::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    InitCaps,
    AllCaps,
    MixedCaps,
    IsSentEnd,
    InitCapPeriod,
    OneCap,
    ContainDigit,
    TwoDigits,
    FourDigits,
    MonthName,
    DayOfTheWeek,
    NumberString,
    PrepPreceded,
    AlwaysCapped,
    /// Lê um campo já escrito por outro componente (`list3`, `regex0`).
    PartMatch { field: String },
    FoundInList { list: usize },
    MatchRegex { regex: usize },
    TokenFrequency { class: usize },
    PrevTokenFrequency { class: usize },
    PrevClass { class: usize },
    ProbClass { class: usize },
}

impl FeatureKind {
    /// Nome do tipo, aceito por [`FeaturePipeline::set_feature_weight`].
    pub fn type_name(&self) -> String {
        match self {
            FeatureKind::InitCaps => "InitCaps".into(),
            FeatureKind::AllCaps => "AllCaps".into(),
            FeatureKind::MixedCaps => "MixedCaps".into(),
            FeatureKind::IsSentEnd => "IsSentEnd".into(),
            FeatureKind::InitCapPeriod => "InitCapPeriod".into(),
            FeatureKind::OneCap => "OneCap".into(),
            FeatureKind::ContainDigit => "ContainDigit".into(),
            FeatureKind::TwoDigits => "TwoDigits".into(),
            FeatureKind::FourDigits => "FourDigits".into(),
            FeatureKind::MonthName => "MonthName".into(),
            FeatureKind::DayOfTheWeek => "DayOfTheWeek".into(),
            FeatureKind::NumberString => "NumberString".into(),
            FeatureKind::PrepPreceded => "PrepPreceded".into(),
            FeatureKind::AlwaysCapped => "AlwaysCapped".into(),
            FeatureKind::PartMatch { .. } => "PartMatch".into(),
            FeatureKind::FoundInList { list } => format!("FoundInList{list}"),
            FeatureKind::MatchRegex { .. } => "MatchRegex".into(),
            FeatureKind::TokenFrequency { .. } => "TokenFrequency".into(),
            FeatureKind::PrevTokenFrequency { .. } => "PrevTokenFrequency".into(),
            FeatureKind::PrevClass { .. } => "PrevClass".into(),
            FeatureKind::ProbClass { .. } => "ProbClass".into(),
        }
    }

    /// Nome emitido no vetor para um dado contexto (ex: `IC-1`, `PMlist0_2`).
    fn emitted_name(&self, context: isize) -> String {
        match self {
            FeatureKind::InitCaps => format!("IC{context}"),
            FeatureKind::AllCaps => format!("AC{context}"),
            FeatureKind::MixedCaps => format!("MC{context}"),
            FeatureKind::IsSentEnd => format!("ISE{context}"),
            FeatureKind::InitCapPeriod => format!("ICP{context}"),
            FeatureKind::OneCap => format!("OC{context}"),
            FeatureKind::ContainDigit => format!("CD{context}"),
            FeatureKind::TwoDigits => format!("TD{context}"),
            FeatureKind::FourDigits => format!("FD{context}"),
            FeatureKind::MonthName => format!("MN{context}"),
            FeatureKind::DayOfTheWeek => format!("DW{context}"),
            FeatureKind::NumberString => format!("NS{context}"),
            FeatureKind::PrepPreceded => format!("PP{context}"),
            FeatureKind::AlwaysCapped => format!("AWC{context}"),
            FeatureKind::PartMatch { field } => format!("PM{field}_{context}"),
            FeatureKind::FoundInList { list } => format!("LS{list}{context}"),
            FeatureKind::MatchRegex { regex } => format!("MRX{regex}_{context}"),
            FeatureKind::TokenFrequency { class } => format!("TF{class}_{context}"),
            FeatureKind::PrevTokenFrequency { class } => format!("PTF{class}_{context}"),
            FeatureKind::PrevClass { class } => format!("PC{class}_{context}"),
            FeatureKind::ProbClass { class } => format!("PRC{class}_{context}"),
        }
    }
}

/// Um extrator configurado: tipo, deslocamento, nome emitido e peso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    pub kind: FeatureKind,
    pub context: isize,
    pub name: String,
    /// Peso ≤ 0 desliga o extrator, salvo quando os pesos são ignorados.
    pub weight: f64,
}

impl FeatureExtractor {
    pub fn new(kind: FeatureKind, context: isize) -> Self {
        let name = kind.emitted_name(context);
        Self { kind, context, name, weight: 1.0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.weight > 0.0
    }
}

/// Recursos consultados pelos extratores e mantidos pelo pipeline.
#[derive(Debug, Clone, Default)]
pub struct FeatureResources {
    /// Regexes de feature, já ancoradas no token inteiro.
    pub feature_regexes: Vec<Regex>,
    pub frequencies: FrequencyTable,
    pub prev_frequencies: FrequencyTable,
}

/// Forma do catálogo de extratores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    /// Janela de contexto: extratores para `-context..=context`.
    pub context: usize,
    pub list_count: usize,
    pub pattern_count: usize,
    pub class_count: usize,
}

/// Interpreta um arquivo de regexes de feature (uma por linha, `#` comenta).
///
/// As regexes não diferenciam maiúsculas e precisam casar o token inteiro.
/// Uma linha que não compila é descartada com um aviso.
pub fn parse_feature_regexes(content: &str) -> Vec<Regex> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|(n, line)| {
            match RegexBuilder::new(&format!("^(?:{line})$")).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(line = n + 1, error = %e, "regex de feature ignorada");
                    None
                }
            }
        })
        .collect()
}

pub fn load_feature_regexes(path: impl AsRef<Path>) -> Result<Vec<Regex>> {
    let path = path.as_ref();
    let regexes = parse_feature_regexes(&read_to_string(path)?);
    tracing::info!(path = %path.display(), regexes = regexes.len(), "regexes de feature carregadas");
    Ok(regexes)
}

/// Pipeline de extração: a lista ordenada de extratores e seus recursos.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    extractors: Vec<FeatureExtractor>,
    resources: FeatureResources,
    list_count: usize,
}

impl FeaturePipeline {
    /// Monta o catálogo completo na ordem canônica.
    pub fn new(layout: FeatureLayout, resources: FeatureResources) -> Self {
        let mut extractors = Vec::new();
        let k = layout.context as isize;

        for ctx in -k..=k {
            for kind in [
                FeatureKind::InitCaps,
                FeatureKind::AllCaps,
                FeatureKind::MixedCaps,
                FeatureKind::IsSentEnd,
                FeatureKind::InitCapPeriod,
                FeatureKind::OneCap,
                FeatureKind::ContainDigit,
                FeatureKind::TwoDigits,
                FeatureKind::FourDigits,
                FeatureKind::MonthName,
                FeatureKind::DayOfTheWeek,
                FeatureKind::NumberString,
                FeatureKind::PrepPreceded,
                FeatureKind::AlwaysCapped,
            ] {
                extractors.push(FeatureExtractor::new(kind, ctx));
            }
            for list in 0..layout.list_count {
                extractors.push(FeatureExtractor::new(
                    FeatureKind::PartMatch { field: format!("list{list}") },
                    ctx,
                ));
                extractors.push(FeatureExtractor::new(FeatureKind::FoundInList { list }, ctx));
            }
            for regex in 0..resources.feature_regexes.len() {
                extractors.push(FeatureExtractor::new(FeatureKind::MatchRegex { regex }, ctx));
            }
            for pattern in 0..layout.pattern_count {
                extractors.push(FeatureExtractor::new(
                    FeatureKind::PartMatch { field: format!("regex{pattern}") },
                    ctx,
                ));
            }
            for class in 0..resources.frequencies.class_count() {
                extractors.push(FeatureExtractor::new(FeatureKind::TokenFrequency { class }, ctx));
            }
            for class in 0..resources.prev_frequencies.class_count() {
                extractors.push(FeatureExtractor::new(FeatureKind::PrevTokenFrequency { class }, ctx));
            }
        }
        for class in 0..layout.class_count {
            extractors.push(FeatureExtractor::new(FeatureKind::PrevClass { class }, 0));
            extractors.push(FeatureExtractor::new(FeatureKind::ProbClass { class }, 0));
        }

        tracing::debug!(extractors = extractors.len(), context = layout.context, "pipeline de features montado");
        Self { extractors, resources, list_count: layout.list_count }
    }

    pub fn extractors(&self) -> &[FeatureExtractor] {
        &self.extractors
    }

    pub fn resources(&self) -> &FeatureResources {
        &self.resources
    }

    /// Aplica o mesmo peso a todos os extratores.
    pub fn set_default_weight(&mut self, weight: f64) {
        for ex in &mut self.extractors {
            ex.weight = weight;
        }
    }

    /// Ajusta o peso dos extratores cujo tipo (`InitCaps`) ou nome emitido
    /// (`IC-1`) seja `name`. Devolve `false` se nenhum foi encontrado.
    pub fn set_feature_weight(&mut self, name: &str, weight: f64) -> bool {
        let mut found = false;
        for ex in &mut self.extractors {
            if ex.name == name || ex.kind.type_name() == name {
                ex.weight = weight;
                found = true;
            }
        }
        found
    }

    /// Vetor de features do token `index`.
    ///
    /// Extratores desligados contribuem com `0.0`, exceto com `ignore_weights`.
    pub fn extract(
        &self,
        tokens: &mut [TokenDecoration],
        index: usize,
        text: &str,
        lists: &GazetteerMatcher,
        ignore_weights: bool,
    ) -> FeatureVector {
        let mut fv = FeatureVector::new(index);
        fv.features.reserve(self.extractors.len());
        for ex in &self.extractors {
            let value = if ignore_weights || ex.is_enabled() {
                self.evaluate(ex, tokens, index, text, lists)
            } else {
                0.0
            };
            fv.insert(ex.name.as_str(), value);
        }
        fv
    }

    /// Vetores de todos os tokens, da esquerda para a direita.
    pub fn extract_all(
        &self,
        tokens: &mut [TokenDecoration],
        text: &str,
        lists: &GazetteerMatcher,
        ignore_weights: bool,
    ) -> Vec<FeatureVector> {
        (0..tokens.len())
            .map(|i| self.extract(tokens, i, text, lists, ignore_weights))
            .collect()
    }

    /// Avalia um extrator sobre o token deslocado; fora da sequência vale 0.
    pub fn evaluate(
        &self,
        ex: &FeatureExtractor,
        tokens: &mut [TokenDecoration],
        index: usize,
        text: &str,
        lists: &GazetteerMatcher,
    ) -> f64 {
        let Some(i) = shift(index, ex.context, tokens.len()) else {
            return 0.0;
        };
        let word = tokens[i].text(text);

        match &ex.kind {
            FeatureKind::InitCaps => init_caps_cached(tokens, i, text),
            FeatureKind::AllCaps => cached(tokens, i, "allCaps", |_| flag(!word.chars().any(char::is_lowercase))),
            FeatureKind::MixedCaps => cached(tokens, i, "mixedCaps", |_| flag(is_mixed_case(word))),
            FeatureKind::IsSentEnd => cached(tokens, i, "isSentEnd", |_| flag(matches!(word, "." | "!" | "?"))),
            FeatureKind::InitCapPeriod => cached(tokens, i, "initCapPeriod", |toks| {
                let next_is_period = toks.get(i + 1).is_some_and(|t| t.text(text) == ".");
                flag(starts_upper(word) && next_is_period)
            }),
            FeatureKind::OneCap => cached(tokens, i, "oneCap", |_| {
                flag(word.chars().count() == 1 && starts_upper(word))
            }),
            FeatureKind::ContainDigit => cached(tokens, i, "containDigit", |_| flag(word.chars().any(|c| c.is_ascii_digit()))),
            FeatureKind::TwoDigits => cached(tokens, i, "twoDigits", |_| flag(is_digits(word, 2))),
            FeatureKind::FourDigits => cached(tokens, i, "fourDigits", |_| flag(is_digits(word, 4))),
            FeatureKind::MonthName => cached(tokens, i, "monthName", |_| flag(MONTHS.contains(&capitalize(word).as_str()))),
            FeatureKind::DayOfTheWeek => cached(tokens, i, "dayOfTheWeek", |_| flag(WEEKDAYS.contains(&capitalize(word).as_str()))),
            FeatureKind::NumberString => cached(tokens, i, "numberString", |_| flag(NUMBER_WORDS.contains(&capitalize(word).as_str()))),
            FeatureKind::PrepPreceded => cached(tokens, i, "prepPreceded", |toks| {
                let found = toks[i.saturating_sub(PREP_WINDOW)..i]
                    .iter()
                    .any(|t| PREPOSITIONS.contains(&capitalize(t.text(text)).as_str()));
                flag(found)
            }),
            FeatureKind::AlwaysCapped => always_capped(tokens, i, text),
            FeatureKind::PartMatch { field } => flag(tokens[i].contains(field)),
            FeatureKind::FoundInList { list } => self.found_in_list(tokens, i, *list, text, lists),
            FeatureKind::MatchRegex { regex } => {
                let Some(re) = self.resources.feature_regexes.get(*regex) else {
                    return 0.0;
                };
                cached(tokens, i, &format!("mRX{regex}"), |_| flag(re.is_match(word)))
            }
            FeatureKind::TokenFrequency { class } => self.resources.frequencies.proportion(word, *class),
            FeatureKind::PrevTokenFrequency { class } => match i.checked_sub(1) {
                Some(p) => self.resources.prev_frequencies.proportion(tokens[p].text(text), *class),
                None => 0.0,
            },
            FeatureKind::PrevClass { class } => match i.checked_sub(1) {
                Some(p) => match tokens[p].get("maxProb") {
                    Some(max) if max as usize == *class => tokens[p].value(&format!("prob{class}")),
                    _ => 0.0,
                },
                None => 0.0,
            },
            FeatureKind::ProbClass { class } => match i.checked_sub(1) {
                Some(p) => tokens[p].value(&format!("prob{class}")),
                None => 0.0,
            },
        }
    }

    /// Marca `FoundList<k>` para todas as listas de uma vez, na primeira consulta.
    fn found_in_list(
        &self,
        tokens: &mut [TokenDecoration],
        i: usize,
        list: usize,
        text: &str,
        lists: &GazetteerMatcher,
    ) -> f64 {
        let key = format!("FoundList{list}");
        if let Some(v) = tokens[i].get(&key) {
            return v;
        }
        let hits = lists.find_string(tokens[i].text(text), true, false);
        let deco = &mut tokens[i];
        for k in 0..self.list_count.max(lists.list_count()) {
            deco.set(format!("FoundList{k}"), 0.0);
        }
        for k in &hits {
            deco.set(format!("FoundList{k}"), 1.0);
        }
        deco.set("foundList", flag(!hits.is_empty()));
        deco.value(&key)
    }
}

/// Índice do token deslocado, se ainda dentro da sequência.
fn shift(index: usize, context: isize, len: usize) -> Option<usize> {
    let target = index.checked_add_signed(context)?;
    (target < len).then_some(target)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Lê `key` do cache ou calcula e memoiza.
fn cached(
    tokens: &mut [TokenDecoration],
    i: usize,
    key: &str,
    compute: impl FnOnce(&[TokenDecoration]) -> f64,
) -> f64 {
    if let Some(v) = tokens[i].get(key) {
        return v;
    }
    let v = compute(tokens);
    tokens[i].set(key, v);
    v
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn init_caps_cached(tokens: &mut [TokenDecoration], i: usize, text: &str) -> f64 {
    let word = tokens[i].text(text);
    cached(tokens, i, "initCaps", |_| flag(starts_upper(word)))
}

fn is_mixed_case(word: &str) -> bool {
    let (mut upper, mut lower) = (false, false);
    for c in word.chars() {
        if c.is_lowercase() {
            if upper {
                return true;
            }
            lower = true;
        } else if c.is_uppercase() {
            if lower {
                return true;
            }
            upper = true;
        }
    }
    false
}

fn is_digits(word: &str, n: usize) -> bool {
    word.len() == n && word.bytes().all(|b| b.is_ascii_digit())
}

/// Primeira letra em maiúscula, resto intacto.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Um valor para toda a classe de tokens iguais (sem diferenciar maiúsculas):
/// 1 se todas as ocorrências começam com maiúscula, 0 caso contrário.
/// Um valor já memoizado em qualquer ocorrência é reaproveitado.
fn always_capped(tokens: &mut [TokenDecoration], i: usize, text: &str) -> f64 {
    const KEY: &str = "alwaysCapped";
    if let Some(v) = tokens[i].get(KEY) {
        return v;
    }
    let target = tokens[i].text(text).to_lowercase();
    let same: Vec<usize> = (0..tokens.len())
        .filter(|&j| tokens[j].text(text).to_lowercase() == target)
        .collect();

    let value = match same.iter().find_map(|&j| tokens[j].get(KEY)) {
        Some(v) => v,
        None => {
            let mut all_capped = true;
            for &j in &same {
                if init_caps_cached(tokens, j, text) == 0.0 {
                    all_capped = false;
                }
            }
            flag(all_capped)
        }
    };
    for &j in &same {
        tokens[j].set(KEY, value);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::decorate;
    use crate::gazetteer::GazetteerSource;
    use crate::tagset::EntityTag;
    use crate::tokenizer::{tokenize, LexMode};

    fn layout(context: usize) -> FeatureLayout {
        FeatureLayout { context, list_count: 0, pattern_count: 0, class_count: 3 }
    }

    fn run(text: &str, pipeline: &FeaturePipeline, lists: &GazetteerMatcher) -> Vec<FeatureVector> {
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        pipeline.extract_all(&mut decos, text, lists, false)
    }

    #[test]
    fn test_canonical_order_and_names() {
        let p = FeaturePipeline::new(
            FeatureLayout { context: 1, list_count: 1, pattern_count: 1, class_count: 3 },
            FeatureResources::default(),
        );
        let names: Vec<&str> = p.extractors().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names[0], "IC-1");
        assert_eq!(names[13], "AWC-1");
        assert_eq!(names[14], "PMlist0_-1");
        assert_eq!(names[15], "LS0-1");
        assert_eq!(names[16], "PMregex0_-1");
        assert_eq!(names[17], "IC0");
        // 3 contextos x 17 + 3 classes x 2
        assert_eq!(names.len(), 3 * 17 + 6);
        assert_eq!(names[names.len() - 2], "PC2_0");
        assert_eq!(names[names.len() - 1], "PRC2_0");
    }

    #[test]
    fn test_orthographic_features() {
        let p = FeaturePipeline::new(layout(0), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        let fvs = run("IBM eBay Dr . X 42 1999 march monday twenty", &p, &lists);

        assert_eq!(fvs[0].get("AC0"), Some(1.0));
        assert_eq!(fvs[0].get("IC0"), Some(1.0));
        assert_eq!(fvs[1].get("MC0"), Some(1.0));
        assert_eq!(fvs[1].get("IC0"), Some(0.0));
        assert_eq!(fvs[2].get("ICP0"), Some(1.0));
        assert_eq!(fvs[3].get("ISE0"), Some(1.0));
        assert_eq!(fvs[4].get("OC0"), Some(1.0));
        assert_eq!(fvs[5].get("TD0"), Some(1.0));
        assert_eq!(fvs[5].get("CD0"), Some(1.0));
        assert_eq!(fvs[6].get("FD0"), Some(1.0));
        assert_eq!(fvs[6].get("TD0"), Some(0.0));
        assert_eq!(fvs[7].get("MN0"), Some(1.0));
        assert_eq!(fvs[8].get("DW0"), Some(1.0));
        assert_eq!(fvs[9].get("NS0"), Some(1.0));
    }

    #[test]
    fn test_context_shift_off_the_ends_is_zero() {
        let p = FeaturePipeline::new(layout(2), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        let fvs = run("Ana viu", &p, &lists);
        assert_eq!(fvs[0].get("IC-1"), Some(0.0));
        assert_eq!(fvs[0].get("AC-2"), Some(0.0));
        assert_eq!(fvs[0].get("IC0"), Some(1.0));
        assert_eq!(fvs[1].get("IC-1"), Some(1.0));
        assert_eq!(fvs[1].get("AC2"), Some(0.0));
    }

    #[test]
    fn test_prep_preceded_window() {
        let p = FeaturePipeline::new(layout(0), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        let fvs = run("in the big old Paris and far away from London", &p, &lists);
        assert_eq!(fvs[4].get("PP0"), Some(1.0));
        assert_eq!(fvs[5].get("PP0"), Some(0.0));
        assert_eq!(fvs[9].get("PP0"), Some(0.0));
    }

    #[test]
    fn test_always_capped_equivalence_class() {
        let p = FeaturePipeline::new(layout(0), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        let text = "Apple sells apple juice . Apple again . Google Google";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        let fv = p.extract(&mut decos, 0, text, &lists, false);
        assert_eq!(fv.get("AWC0"), Some(0.0));
        // carimbado em todas as ocorrências de uma vez
        assert_eq!(decos[2].get("alwaysCapped"), Some(0.0));
        assert_eq!(decos[5].get("alwaysCapped"), Some(0.0));

        let fv = p.extract(&mut decos, 8, text, &lists, false);
        assert_eq!(fv.get("AWC0"), Some(1.0));
        assert_eq!(decos[9].get("alwaysCapped"), Some(1.0));
    }

    #[test]
    fn test_list_features() {
        let lists = GazetteerMatcher::new(vec![GazetteerSource {
            name: "orgs".into(),
            tag: EntityTag::parse("<ENAMEX TYPE=\"ORGANIZATION\">").unwrap(),
            contents: "Microsoft\nMicrosoft Research\n".into(),
        }]);
        let p = FeaturePipeline::new(
            FeatureLayout { context: 0, list_count: 1, pattern_count: 0, class_count: 3 },
            FeatureResources::default(),
        );
        let text = "Microsoft Research";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        lists.find_matches(text, &mut decos);
        let fvs = p.extract_all(&mut decos, text, &lists, false);
        assert_eq!(fvs[0].get("LS00"), Some(1.0));
        assert_eq!(fvs[0].get("PMlist0_0"), Some(1.0));
        assert_eq!(fvs[1].get("LS00"), Some(0.0));
        assert_eq!(fvs[1].get("PMlist0_0"), Some(1.0));
        assert_eq!(decos[0].get("foundList"), Some(1.0));
    }

    #[test]
    fn test_feature_regex_matches_whole_token() {
        let resources = FeatureResources {
            feature_regexes: parse_feature_regexes("# siglas\n[a-z]{2}\n(broken\n"),
            ..FeatureResources::default()
        };
        assert_eq!(resources.feature_regexes.len(), 1);
        let p = FeaturePipeline::new(layout(0), resources);
        let lists = GazetteerMatcher::empty();
        let fvs = run("UK USA", &p, &lists);
        assert_eq!(fvs[0].get("MRX0_0"), Some(1.0));
        assert_eq!(fvs[1].get("MRX0_0"), Some(0.0));
    }

    #[test]
    fn test_token_frequency_feature() {
        let resources = FeatureResources {
            frequencies: FrequencyTable::parse("#### Tag 0\nParis 10\n").unwrap(),
            prev_frequencies: FrequencyTable::parse("#### Tag 0\nin 4\n").unwrap(),
            ..FeatureResources::default()
        };
        let p = FeaturePipeline::new(layout(0), resources);
        let lists = GazetteerMatcher::empty();
        let fvs = run("Paris in Paris", &p, &lists);
        assert_eq!(fvs[0].get("TF0_0"), Some(1.0));
        assert_eq!(fvs[0].get("PTF0_0"), Some(0.0));
        assert_eq!(fvs[2].get("PTF0_0"), Some(1.0));
        assert_eq!(fvs[1].get("TF0_0"), Some(0.0));
    }

    #[test]
    fn test_previous_class_features() {
        let p = FeaturePipeline::new(layout(0), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        let text = "Ana Silva";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        decos[0].set("maxProb", 1.0);
        decos[0].set("prob0", 0.2);
        decos[0].set("prob1", 0.7);
        decos[0].set("prob2", 0.1);
        let fv = p.extract(&mut decos, 1, text, &lists, false);
        assert_eq!(fv.get("PC1_0"), Some(0.7));
        assert_eq!(fv.get("PC2_0"), Some(0.0));
        assert_eq!(fv.get("PRC2_0"), Some(0.1));
        let fv = p.extract(&mut decos, 0, text, &lists, false);
        assert_eq!(fv.get("PRC1_0"), Some(0.0));
    }

    #[test]
    fn test_weights_gate_evaluation() {
        let mut p = FeaturePipeline::new(layout(1), FeatureResources::default());
        let lists = GazetteerMatcher::empty();
        assert!(p.set_feature_weight("InitCaps", 0.0));
        assert!(p.set_feature_weight("AC0", -1.0));
        assert!(!p.set_feature_weight("Inexistente", 1.0));

        let text = "ONU";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        let fv = p.extract(&mut decos, 0, text, &lists, false);
        assert_eq!(fv.get("IC0"), Some(0.0));
        assert_eq!(fv.get("AC0"), Some(0.0));
        assert!(!decos[0].contains("allCaps"));

        let fv = p.extract(&mut decos, 0, text, &lists, true);
        assert_eq!(fv.get("IC0"), Some(1.0));
        assert_eq!(fv.get("AC0"), Some(1.0));
    }
}
