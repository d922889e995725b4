//! # afner-core: Reconhecimento de Entidades Nomeadas (NER)
//!
//! Motor de NER clássico: dado um texto bruto, identifica spans que denotam
//! entidades (organizações, pessoas, locais...) e atribui a cada um uma tag e
//! uma confiança.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui por um pipeline linear:
//!
//! 1.  **Tokenização** ([`tokenizer`]): spans `[start, end)` de palavras, pontuação e marcação.
//! 2.  **Decoração** ([`decoration`]): cada token ganha um cache de valores memoizados.
//! 3.  **Casamentos determinísticos**:
//!     *   **Listas** ([`gazetteer`]): entradas conhecidas indexadas numa árvore de sufixos ([`suffix_tree`]).
//!     *   **Padrões** ([`patterns`]): expressões regulares com variáveis.
//! 4.  **Features** ([`features`]): vetor numérico por token, com janela de contexto.
//! 5.  **Classificação** ([`maxent`]): distribuição sobre as classes BIO do [`tagset`].
//! 6.  **Montagem** ([`entity`], [`pipeline`]): buffers multi-token, seleção de
//!     candidatos e refinamento sem sobreposição.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use afner_core::{EntityTag, EntityTagset, GazetteerMatcher, GazetteerSource};
//! use afner_core::{NerConfig, NerResources, Provenance, Recognizer};
//!
//! let org = EntityTag::parse("<ENAMEX TYPE=\"ORGANIZATION\">").unwrap();
//! let mut tagset = EntityTagset::new();
//! tagset.add_tag(org.clone());
//!
//! let mut resources = NerResources::new(tagset);
//! resources.lists = GazetteerMatcher::new(vec![GazetteerSource {
//!     name: "orgs".into(),
//!     tag: org,
//!     contents: "Microsoft\n".into(),
//! }]);
//!
//! let recognizer = Recognizer::new(resources, &NerConfig::new("tagset.txt"));
//!
//! let text = "Microsoft released a product.";
//! let entities = recognizer.recognize(text);
//! assert_eq!(entities.len(), 1);
//! for entity in entities.iter() {
//!     assert_eq!(entity.text(text), "Microsoft");
//!     assert_eq!(entity.provenance, Provenance::List);
//! }
//! ```
//!
//! ## Treino
//!
//! [`Recognizer::write_training_events`] gera eventos no formato do YASMET a
//! partir de texto anotado e [`FrequencyCounter`] produz as tabelas de
//! frequência usadas pelas features `TF`/`PTF`.

pub mod config;
pub mod decoration;
pub mod entity;
pub mod error;
pub mod features;
pub mod frequency;
pub mod gazetteer;
pub mod maxent;
pub mod patterns;
pub mod pipeline;
pub mod suffix_tree;
pub mod tagset;
pub mod tokenizer;
pub mod training;

pub use config::{NerConfig, NerResources};
pub use entity::{EntitySet, NamedEntity, Provenance};
pub use error::{NerError, Result};
pub use features::{FeatureKind, FeaturePipeline, FeatureVector};
pub use frequency::{FrequencyCounter, FrequencyTable};
pub use gazetteer::{GazetteerMatcher, GazetteerSource};
pub use maxent::MaxEntModel;
pub use patterns::PatternMatcher;
pub use pipeline::{PipelineEvent, Recognizer, RecognizerOptions};
pub use suffix_tree::SuffixTree;
pub use tagset::{Classification, EntityTag, EntityTagset};
pub use tokenizer::{tokenize, LexMode, Token, TokenKind};
