//! # Configuração do Reconhecedor
//!
//! Um documento TOML descreve onde estão os recursos e como o reconhecedor
//! deve se comportar:
//!
//! ```toml
//! tagset = "tagset.txt"
//! lists = "lists.spec"
//! regex = "regex.spec"
//! model = "ner.model"
//! frequency = "tokens.freq"
//! context = 2
//! max_labels = 3
//! single_label = true
//!
//! [feature_weights]
//! AlwaysCapped = 0.0
//! "IC-2" = 0.0
//! ```
//!
//! Só `tagset` é obrigatório. Caminhos relativos lidos com
//! [`NerConfig::from_file`] partem do diretório do próprio arquivo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{read_to_string, NerError, Result};
use crate::features::load_feature_regexes;
use crate::frequency::FrequencyTable;
use crate::gazetteer::GazetteerMatcher;
use crate::maxent::MaxEntModel;
use crate::patterns::PatternMatcher;
use crate::tagset::EntityTagset;
use crate::tokenizer::LexMode;

fn default_context() -> usize {
    2
}

fn default_max_labels() -> usize {
    3
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerConfig {
    pub tagset: PathBuf,
    #[serde(default)]
    pub lists: Option<PathBuf>,
    #[serde(default)]
    pub regex: Option<PathBuf>,
    #[serde(default)]
    pub feature_regex: Option<PathBuf>,
    #[serde(default)]
    pub model: Option<PathBuf>,
    #[serde(default)]
    pub frequency: Option<PathBuf>,
    #[serde(default)]
    pub prev_frequency: Option<PathBuf>,

    /// Janela de contexto das features (`-context..=context`).
    #[serde(default = "default_context")]
    pub context: usize,
    /// Máximo de classes candidatas por token.
    #[serde(default = "default_max_labels")]
    pub max_labels: usize,
    /// Remove sobreposições da saída.
    #[serde(default)]
    pub single_label: bool,
    /// Confiança mínima na renderização da saída.
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    /// Pesos por tipo (`InitCaps`) ou nome emitido (`IC-1`), aplicados em ordem.
    #[serde(default)]
    pub feature_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub length_normalize: bool,
    #[serde(default = "default_true")]
    pub skip_markup: bool,
}

impl NerConfig {
    /// Configuração com valores padrão para um tagset.
    pub fn new(tagset: impl Into<PathBuf>) -> Self {
        Self {
            tagset: tagset.into(),
            lists: None,
            regex: None,
            feature_regex: None,
            model: None,
            frequency: None,
            prev_frequency: None,
            context: default_context(),
            max_labels: default_max_labels(),
            single_label: false,
            threshold: 0.0,
            default_weight: default_weight(),
            feature_weights: BTreeMap::new(),
            length_normalize: false,
            skip_markup: true,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NerError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_toml_str(&read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Reescreve caminhos relativos a partir de `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.tagset);
        for p in [
            &mut self.lists,
            &mut self.regex,
            &mut self.feature_regex,
            &mut self.model,
            &mut self.frequency,
            &mut self.prev_frequency,
        ]
        .into_iter()
        .flatten()
        {
            join(p);
        }
    }

    pub fn lex_mode(&self) -> LexMode {
        if self.skip_markup {
            LexMode::SkipMarkup
        } else {
            LexMode::KeepMarkup
        }
    }
}

/// Todos os colaboradores carregados, imutáveis a partir daqui.
#[derive(Debug, Clone)]
pub struct NerResources {
    pub tagset: EntityTagset,
    pub lists: GazetteerMatcher,
    pub patterns: PatternMatcher,
    pub feature_regexes: Vec<Regex>,
    pub model: MaxEntModel,
    pub frequencies: FrequencyTable,
    pub prev_frequencies: FrequencyTable,
}

impl NerResources {
    /// Recursos vazios em torno de um tagset: sem listas, sem padrões e com
    /// um modelo sem pesos.
    pub fn new(tagset: EntityTagset) -> Self {
        let model = MaxEntModel::empty(tagset.class_count());
        Self {
            tagset,
            lists: GazetteerMatcher::empty(),
            patterns: PatternMatcher::new(),
            feature_regexes: Vec::new(),
            model,
            frequencies: FrequencyTable::default(),
            prev_frequencies: FrequencyTable::default(),
        }
    }

    /// Carrega cada recurso configurado. Qualquer falha aborta o carregamento.
    pub fn load(config: &NerConfig) -> Result<Self> {
        let tagset = EntityTagset::load(&config.tagset)?;
        let class_count = tagset.class_count();

        let lists = match &config.lists {
            Some(p) => GazetteerMatcher::load_spec(p)?,
            None => GazetteerMatcher::empty(),
        };
        let patterns = match &config.regex {
            Some(p) => PatternMatcher::load(p)?,
            None => PatternMatcher::new(),
        };
        let feature_regexes = match &config.feature_regex {
            Some(p) => load_feature_regexes(p)?,
            None => Vec::new(),
        };
        let model = match &config.model {
            Some(p) => MaxEntModel::load(p, class_count)?,
            None => {
                tracing::warn!("nenhum modelo configurado; todo token será outside");
                MaxEntModel::empty(class_count)
            }
        }
        .with_length_normalization(config.length_normalize);
        let frequencies = match &config.frequency {
            Some(p) => FrequencyTable::load(p)?,
            None => FrequencyTable::default(),
        };
        let prev_frequencies = match &config.prev_frequency {
            Some(p) => FrequencyTable::load(p)?,
            None => FrequencyTable::default(),
        };

        Ok(Self { tagset, lists, patterns, feature_regexes, model, frequencies, prev_frequencies })
    }
}
