//! # Pipeline NER: Orquestrador com Eventos Observáveis
//!
//! O [`Recognizer`] junta todos os colaboradores carregados e processa um
//! documento da esquerda para a direita:
//!
//! 1. Tokenização e decoração dos tokens.
//! 2. Casamento de padrões regex e de listas (entidades de confiança 1.0 e
//!    marcação `regex<j>`/`list<k>` nos tokens).
//! 3. Para cada token: features → MaxEnt → `prob<c>`/`maxProb` no token →
//!    classes candidatas → máquina de buffers.
//! 4. Finalização dos buffers restantes e, no modo de rótulo único, refinamento
//!    sem sobreposições.
//!
//! Cada passo emite um [`PipelineEvent`] por um canal `mpsc`, de modo que quem
//! chama pode acompanhar o raciocínio do modelo token a token.
//! [`Recognizer::recognize`] apenas consome o canal e devolve o resultado final.
//!
//! Os colaboradores são somente leitura após a construção: o mesmo
//! reconhecedor atende vários documentos em paralelo
//! ([`Recognizer::recognize_batch`]).

use std::io::{self, Write};
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{NerConfig, NerResources};
use crate::decoration::{decorate, TokenDecoration};
use crate::entity::{
    refine_entities, select_candidates, BufferGenerations, EntBuffer, EntitySet, NamedEntity, Provenance,
};
use crate::error::Result;
use crate::features::{FeatureLayout, FeaturePipeline, FeatureResources};
use crate::gazetteer::GazetteerMatcher;
use crate::maxent::{argmax, MaxEntModel};
use crate::patterns::PatternMatcher;
use crate::tagset::{Classification, EntityTagset};
use crate::tokenizer::{tokenize, LexMode, Token};
use crate::training::{annotate, gold_decorations};

/// Eventos emitidos pelo pipeline durante o processamento.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: Tokenização concluída.
    TokenizationDone { tokens: Vec<Token>, total: usize },
    /// **Passo 2**: Entidades determinísticas de regex e listas.
    MatchesFound { entities: Vec<NamedEntity> },
    /// **Passo 3**: Distribuição do classificador para um token e as classes
    /// que passaram o limiar relativo.
    TokenClassified {
        token_index: usize,
        token_text: String,
        probabilities: Vec<f64>,
        candidates: Vec<usize>,
    },
    /// Um buffer terminou e virou entidade.
    EntityFinalized { entity: NamedEntity },
    /// **Conclusão**: conjunto final, já refinado se for o caso.
    Done {
        entities: Vec<NamedEntity>,
        total_tokens: usize,
        processing_ms: u64,
    },
}

/// Parâmetros de execução fixados na construção.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizerOptions {
    pub max_labels: usize,
    pub single_label: bool,
    pub threshold: f64,
    pub lex_mode: LexMode,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self { max_labels: 3, single_label: false, threshold: 0.0, lex_mode: LexMode::SkipMarkup }
    }
}

/// O reconhecedor de entidades.
#[derive(Debug, Clone)]
pub struct Recognizer {
    tagset: EntityTagset,
    lists: GazetteerMatcher,
    patterns: PatternMatcher,
    features: FeaturePipeline,
    model: MaxEntModel,
    options: RecognizerOptions,
}

impl Recognizer {
    /// Monta o reconhecedor a partir de recursos já carregados.
    ///
    /// Pesos de `feature_weights` que não correspondem a nenhum extrator
    /// geram um aviso e são ignorados.
    pub fn new(resources: NerResources, config: &NerConfig) -> Self {
        let NerResources { tagset, lists, patterns, feature_regexes, model, frequencies, prev_frequencies } =
            resources;

        let layout = FeatureLayout {
            context: config.context,
            list_count: lists.list_count(),
            pattern_count: patterns.len(),
            class_count: tagset.class_count(),
        };
        let mut features = FeaturePipeline::new(
            layout,
            FeatureResources { feature_regexes, frequencies, prev_frequencies },
        );
        features.set_default_weight(config.default_weight);
        for (name, &weight) in &config.feature_weights {
            if !features.set_feature_weight(name, weight) {
                tracing::warn!(feature = %name, "peso para feature inexistente ignorado");
            }
        }

        let options = RecognizerOptions {
            max_labels: config.max_labels,
            single_label: config.single_label,
            threshold: config.threshold,
            lex_mode: config.lex_mode(),
        };
        tracing::info!(
            tags = tagset.tag_count(),
            lists = lists.list_count(),
            patterns = patterns.len(),
            features = features.extractors().len(),
            "reconhecedor pronto"
        );
        Self { tagset, lists, patterns, features, model, options }
    }

    /// Carrega todos os recursos descritos na configuração.
    pub fn from_config(config: &NerConfig) -> Result<Self> {
        Ok(Self::new(NerResources::load(config)?, config))
    }

    pub fn tagset(&self) -> &EntityTagset {
        &self.tagset
    }

    pub fn features(&self) -> &FeaturePipeline {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeaturePipeline {
        &mut self.features
    }

    pub fn options(&self) -> RecognizerOptions {
        self.options
    }

    /// Casa regex e depois listas, marcando os tokens. Com `create_entities`,
    /// cada casamento vira uma entidade de confiança 1.0.
    pub fn find_matches(&self, text: &str, tokens: &mut [TokenDecoration], create_entities: bool) -> EntitySet {
        let mut entities = EntitySet::new();
        let regex_matches = self.patterns.find_matches(text, tokens);
        let list_matches = self.lists.find_matches(text, tokens);
        if !create_entities {
            return entities;
        }

        for m in regex_matches {
            if let Some(tag) = self.patterns.tag(m.rule_index) {
                entities.insert(NamedEntity::new(m.start, m.end, tag.clone(), 1.0, Provenance::Regex));
            }
        }
        for m in list_matches {
            if let Some(tag) = self.lists.tag(m.list_index) {
                entities.insert(NamedEntity::new(m.start, m.end, tag.clone(), 1.0, Provenance::List));
            }
        }
        entities
    }

    /// Processa o texto de forma síncrona e devolve o conjunto final.
    pub fn recognize(&self, text: &str) -> EntitySet {
        let (tx, rx) = mpsc::channel();
        self.recognize_streaming(text, tx);
        let mut entities = EntitySet::new();
        while let Ok(event) = rx.recv() {
            if let PipelineEvent::Done { entities: ents, .. } = event {
                entities = ents.into_iter().collect();
            }
        }
        entities
    }

    /// Vários documentos em paralelo; a ordem da saída acompanha a entrada.
    pub fn recognize_batch(&self, texts: &[&str]) -> Vec<EntitySet> {
        texts.par_iter().map(|text| self.recognize(text)).collect()
    }

    /// Executa o pipeline enviando eventos de progresso pelo canal `tx`.
    ///
    /// # Fluxo de Eventos
    /// 1. `TokenizationDone`
    /// 2. `MatchesFound`
    /// 3. `TokenClassified` (um por token), intercalado com `EntityFinalized`
    /// 4. `Done`
    pub fn recognize_streaming(&self, text: &str, tx: mpsc::Sender<PipelineEvent>) {
        let start = Instant::now();

        // === Passo 1: Tokenização ===
        let tokens = tokenize(text, self.options.lex_mode);
        let total = tokens.len();
        let _ = tx.send(PipelineEvent::TokenizationDone { tokens: tokens.clone(), total });
        let mut decos = decorate(&tokens);

        // === Passo 2: Regex e listas ===
        let mut entities = self.find_matches(text, &mut decos, true);
        let _ = tx.send(PipelineEvent::MatchesFound { entities: entities.iter().cloned().collect() });

        // === Passo 3: Classificação token a token ===
        let mut buffers = BufferGenerations::new();
        for i in 0..decos.len() {
            let fv = self.features.extract(&mut decos, i, text, &self.lists, false);
            let event = self.model.event(&fv);
            let probs = if event.is_empty() {
                outside_distribution(self.tagset.class_count(), self.tagset.out_class())
            } else {
                self.model.classify_event(event)
            };
            for (c, p) in probs.iter().enumerate() {
                decos[i].set(format!("prob{c}"), *p);
            }
            decos[i].set("maxProb", argmax(&probs) as f64);

            let candidates = select_candidates(&probs, self.options.max_labels);
            let _ = tx.send(PipelineEvent::TokenClassified {
                token_index: i,
                token_text: decos[i].text(text).to_string(),
                probabilities: probs.clone(),
                candidates: candidates.iter().map(|c| c.class).collect(),
            });

            let token = decos[i].token;
            let mut finished = Vec::new();
            if candidates.is_empty() {
                finished.extend(buffers.flush_previous());
            }
            for cand in &candidates {
                match self.tagset.decode(cand.class) {
                    Some(Classification::Begin(t)) => {
                        finished.extend(buffers.begin(token.start, token.end, t, cand.prob));
                    }
                    Some(Classification::Inside(t)) => buffers.inside(token.start, token.end, t, cand.prob),
                    Some(Classification::Outside) | None => finished.extend(buffers.flush_previous()),
                }
            }
            finished.extend(buffers.advance());
            self.finalize(finished, &mut entities, &tx);
        }

        // === Passo 4: Finalização ===
        let remaining = buffers.finish();
        self.finalize(remaining, &mut entities, &tx);

        if self.options.single_label {
            entities = refine_entities(&entities);
        }
        tracing::debug!(tokens = total, entities = entities.len(), "documento processado");
        let _ = tx.send(PipelineEvent::Done {
            entities: entities.into_iter().collect(),
            total_tokens: total,
            processing_ms: start.elapsed().as_millis() as u64,
        });
    }

    fn finalize(&self, buffers: Vec<EntBuffer>, entities: &mut EntitySet, tx: &mpsc::Sender<PipelineEvent>) {
        for buffer in buffers {
            if buffer.end <= buffer.start {
                continue;
            }
            let Some(tag) = self.tagset.tag(buffer.tag_index) else { continue };
            let entity = NamedEntity::new(
                buffer.start,
                buffer.end,
                tag.clone(),
                buffer.geometric_mean(),
                Provenance::Classify,
            );
            if entities.insert(entity.clone()) {
                let _ = tx.send(PipelineEvent::EntityFinalized { entity });
            }
        }
    }

    /// Uma linha por entidade acima do limiar configurado, no formato
    /// detalhado ou TREC.
    pub fn render(&self, text: &str, entities: &EntitySet, trec: bool) -> String {
        let mut out = String::new();
        for e in entities.above(self.options.threshold) {
            if trec {
                out.push_str(&e.trec_details());
            } else {
                out.push_str(&e.details(text));
            }
            out.push('\n');
        }
        out
    }

    /// Escreve os eventos de treino (formato YASMET) de um texto anotado.
    ///
    /// As features são avaliadas ignorando pesos e veem a classe verdadeira
    /// como saída do classificador nos tokens anteriores.
    pub fn write_training_events<W: Write>(&self, text: &str, out: &mut W, print_class_count: bool) -> io::Result<()> {
        let class_count = self.tagset.class_count();
        if print_class_count {
            writeln!(out, "{class_count}")?;
        }
        let doc = annotate(text, &self.tagset);
        let mut decos = gold_decorations(&doc, class_count);
        self.find_matches(text, &mut decos, false);
        let vectors = self.features.extract_all(&mut decos, text, &self.lists, true);

        for (fv, &gold) in vectors.iter().zip(&doc.classes) {
            write!(out, "{gold} @ ")?;
            for c in 0..class_count {
                write!(out, "@ {} ", u8::from(c == gold))?;
                for (name, value) in fv.active() {
                    write!(out, "cat{c}_{name} {value} ")?;
                }
                write!(out, "# ")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Distribuição de um token sem features do modelo: toda a massa em outside.
fn outside_distribution(class_count: usize, out_class: usize) -> Vec<f64> {
    let mut probs = vec![0.0; class_count];
    if let Some(p) = probs.get_mut(out_class) {
        *p = 1.0;
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::GazetteerSource;
    use crate::tagset::EntityTag;

    fn org() -> EntityTag {
        EntityTag::parse("<ENAMEX TYPE=\"ORGANIZATION\">").unwrap()
    }

    fn resources() -> NerResources {
        let mut tagset = EntityTagset::new();
        tagset.add_tag(org());
        let mut res = NerResources::new(tagset);
        res.lists = GazetteerMatcher::new(vec![GazetteerSource {
            name: "orgs".into(),
            tag: org(),
            contents: "Microsoft\n".into(),
        }]);
        res
    }

    fn config(max_labels: usize) -> NerConfig {
        let mut config = NerConfig::new("tags.txt");
        config.max_labels = max_labels;
        config
    }

    #[test]
    fn test_list_entity_end_to_end() {
        let recognizer = Recognizer::new(resources(), &config(1));
        let text = "Microsoft released a product.";
        let entities = recognizer.recognize(text);
        assert_eq!(entities.len(), 1);
        let e = entities.first().unwrap();
        assert_eq!(e.text(text), "Microsoft");
        assert_eq!(e.tag, org());
        assert_eq!(e.confidence, 1.0);
        assert_eq!(e.provenance, Provenance::List);
    }

    #[test]
    fn test_list_entity_with_default_options() {
        let recognizer = Recognizer::new(resources(), &NerConfig::new("tags.txt"));
        assert_eq!(recognizer.options().max_labels, 3);
        let text = "Microsoft released a product.";
        let entities = recognizer.recognize(text);
        assert_eq!(entities.len(), 1);
        let e = entities.first().unwrap();
        assert_eq!(e.text(text), "Microsoft");
        assert_eq!(e.provenance, Provenance::List);
    }

    #[test]
    fn test_unclassifiable_token_is_outside() {
        let recognizer = Recognizer::new(resources(), &NerConfig::new("tags.txt"));
        let (tx, rx) = mpsc::channel();
        recognizer.recognize_streaming("Microsoft cresceu", tx);
        for event in rx.iter() {
            if let PipelineEvent::TokenClassified { probabilities, candidates, .. } = event {
                assert_eq!(probabilities, vec![1.0, 0.0, 0.0]);
                assert_eq!(candidates, vec![0]);
            }
        }
    }

    #[test]
    fn test_classifier_builds_multi_token_entity() {
        // cat1 favorece begin na inicial maiúscula; cat2 favorece inside
        // quando o token anterior também é capitalizado.
        let model = "cat1_IC0 50.0\ncat2_IC0 20.0\ncat2_IC-1 60.0\ncat1_IC-1 0.5\ncat0_ISE0 80.0\n";
        let mut res = resources();
        res.model = MaxEntModel::from_model_str(model, 3).unwrap();
        let mut cfg = config(1);
        cfg.context = 1;
        let recognizer = Recognizer::new(res, &cfg);

        let text = "Ana Silva .";
        let entities = recognizer.recognize(text);
        let spans: Vec<&str> = entities.iter().map(|e| e.text(text)).collect();
        assert_eq!(spans, vec!["Ana Silva"]);
        let e = entities.first().unwrap();
        assert_eq!(e.provenance, Provenance::Classify);
        assert!(e.confidence > 0.1 && e.confidence < 1.0);
    }

    #[test]
    fn test_streaming_event_order() {
        let recognizer = Recognizer::new(resources(), &config(1));
        let (tx, rx) = mpsc::channel();
        recognizer.recognize_streaming("Microsoft cresceu", tx);
        let events: Vec<PipelineEvent> = rx.iter().collect();

        assert!(matches!(events.first(), Some(PipelineEvent::TokenizationDone { total: 2, .. })));
        assert!(matches!(&events[1], PipelineEvent::MatchesFound { entities } if entities.len() == 1));
        let classified = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::TokenClassified { .. }))
            .count();
        assert_eq!(classified, 2);
        assert!(matches!(events.last(), Some(PipelineEvent::Done { total_tokens: 2, .. })));
    }

    #[test]
    fn test_empty_text() {
        let recognizer = Recognizer::new(resources(), &config(3));
        assert!(recognizer.recognize("").is_empty());
    }

    #[test]
    fn test_single_label_refines_output() {
        let mut res = resources();
        res.lists = GazetteerMatcher::new(vec![GazetteerSource {
            name: "orgs".into(),
            tag: org(),
            contents: "Microsoft\nMicrosoft Research\n".into(),
        }]);
        let mut cfg = config(1);
        let text = "Microsoft Research";
        let both = Recognizer::new(res.clone(), &cfg).recognize(text);
        assert_eq!(both.len(), 2);

        cfg.single_label = true;
        let refined = Recognizer::new(res, &cfg).recognize(text);
        assert_eq!(refined.len(), 1);
        assert_eq!(refined.first().map(|e| e.text(text)), Some("Microsoft Research"));
    }

    #[test]
    fn test_batch_matches_sequential() {
        let recognizer = Recognizer::new(resources(), &config(1));
        let texts = ["Microsoft", "nada aqui", "a Microsoft e a Microsoft"];
        let batch = recognizer.recognize_batch(&texts);
        assert_eq!(batch.len(), 3);
        for (text, set) in texts.iter().zip(&batch) {
            assert_eq!(set, &recognizer.recognize(text));
        }
        assert_eq!(batch[2].len(), 2);
    }

    #[test]
    fn test_render_applies_threshold() {
        let mut cfg = config(1);
        cfg.threshold = 0.5;
        let recognizer = Recognizer::new(resources(), &cfg);
        let text = "Microsoft";
        let entities = recognizer.recognize(text);
        assert_eq!(recognizer.render(text, &entities, true), "<ENAMEX TYPE=\"ORGANIZATION\">  0  9\n");
        assert!(recognizer.render(text, &entities, false).starts_with("Offset: 0-9; Word: Microsoft;"));
    }

    #[test]
    fn test_training_events_format() {
        let recognizer = Recognizer::new(resources(), &config(1));
        let text = "<ENAMEX TYPE=\"ORGANIZATION\">Microsoft</ENAMEX> cresceu";
        let mut out = Vec::new();
        recognizer.write_training_events(text, &mut out, true).unwrap();
        let dump = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines[0], "3");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1 @ @ 0 "));
        assert!(lines[1].contains("# @ 1 cat1_IC0 1 "));
        assert!(lines[1].contains("cat1_LS00 1 "));
        assert!(lines[1].contains("cat2_PMlist0_0 1 "));
        assert!(lines[1].ends_with("# "));
        assert_eq!(lines[1].matches("# ").count(), 3);
        // a classe verdadeira do token anterior alimenta PC
        assert!(lines[2].starts_with("0 @ @ 1 "));
        assert!(lines[2].contains("cat0_PC1_0 1 "));
    }
}
