//! # Maximum Entropy (Logistic Regression) para NER
//!
//! Classificador log-linear que aplica um modelo já treinado (formato de
//! pesos do YASMET) a um evento de features de um token.
//!
//! ## Formato do modelo
//!
//! Um par `nome peso` por linha. Os nomes seguem `cat<c>_<feature>`, um peso
//! por classe e por feature. O índice 0 é reservado à **feature corretiva**,
//! que completa cada classe até a soma máxima das features ativas:
//!
//! $$ f^{corr}_c = F - \sum_k f_{c,k}, \qquad F = \max_c \sum_k f_{c,k} $$
//!
//! ## Probabilidade
//!
//! Com $\lambda_i = \ln w_i$ (ou 1 para pesos negativos):
//!
//! $$ P(c|x) = \frac{\exp(\sum_k \lambda_k f_{c,k})}{\sum_{c'} \exp(\sum_k \lambda_k f_{c',k})} $$
//!
//! Com normalização por comprimento, os valores de cada classe são divididos
//! pela soma da classe e a feature corretiva não é adicionada.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{read_to_string, NerError, Result};
use crate::features::FeatureVector;

/// Nome reservado da feature de índice 0.
pub const CORRECTIVE_FEATURE: &str = "@@@CORRECTIVE-FEATURE@@@";

/// Peso lógico de uma feature que não aparece no arquivo.
const ABSENT_LAMBDA: f64 = 1.0;

fn lambda_of(weight: f64) -> f64 {
    if weight < 0.0 {
        1.0
    } else {
        weight.ln()
    }
}

/// Evento de um token: para cada classe, as features do modelo presentes
/// com seus valores.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaxEntEvent {
    /// `(índice no modelo, valor)` por classe.
    pub features: Vec<Vec<(usize, f64)>>,
    /// Soma dos valores de cada classe.
    pub sums: Vec<f64>,
    /// Maior soma entre as classes.
    pub max_sum: f64,
}

impl MaxEntEvent {
    /// Nenhuma feature do modelo ativa em nenhuma classe: o token não pode
    /// ser classificado.
    pub fn is_empty(&self) -> bool {
        self.features.iter().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct MaxEntModel {
    index: HashMap<String, usize>,
    lambdas: Vec<f64>,
    class_count: usize,
    length_normalize: bool,
}

impl MaxEntModel {
    /// Modelo sem pesos: toda classe recebe a mesma probabilidade.
    pub fn empty(class_count: usize) -> Self {
        let mut index = HashMap::new();
        index.insert(CORRECTIVE_FEATURE.to_string(), 0);
        Self { index, lambdas: vec![ABSENT_LAMBDA], class_count, length_normalize: false }
    }

    /// Interpreta o conteúdo de um arquivo de modelo.
    ///
    /// Um nome repetido sobrescreve o peso anterior.
    pub fn from_model_str(content: &str, class_count: usize) -> Result<Self> {
        let mut model = Self::empty(class_count);
        let mut corrective_seen = false;

        for (n, line) in content.lines().enumerate() {
            let mut words = line.split_whitespace();
            let Some(name) = words.next() else { continue };
            let weight = words
                .next()
                .and_then(|w| w.parse::<f64>().ok())
                .ok_or_else(|| NerError::Model {
                    line: n + 1,
                    message: format!("peso ausente ou inválido para {name:?}"),
                })?;

            let lambda = lambda_of(weight);
            match model.index.get(name) {
                Some(&i) => model.lambdas[i] = lambda,
                None => {
                    model.index.insert(name.to_string(), model.lambdas.len());
                    model.lambdas.push(lambda);
                }
            }
            corrective_seen |= name == CORRECTIVE_FEATURE;
        }
        if !corrective_seen {
            tracing::debug!("modelo sem peso corretivo; usando o padrão");
        }
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>, class_count: usize) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::from_model_str(&read_to_string(path)?, class_count)?;
        tracing::info!(path = %path.display(), weights = model.weight_count(), classes = class_count, "modelo MaxEnt carregado");
        Ok(model)
    }

    pub fn with_length_normalization(mut self, enabled: bool) -> Self {
        self.length_normalize = enabled;
        self
    }

    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Número de pesos, incluindo o corretivo.
    pub fn weight_count(&self) -> usize {
        self.lambdas.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Monta o evento do token: só entram features com valor não nulo e
    /// cujo nome `cat<c>_<feature>` exista no modelo.
    pub fn event(&self, fv: &FeatureVector) -> MaxEntEvent {
        let mut event = MaxEntEvent {
            features: vec![Vec::new(); self.class_count],
            sums: vec![0.0; self.class_count],
            max_sum: 0.0,
        };
        for (name, value) in fv.active() {
            for c in 0..self.class_count {
                if let Some(&i) = self.index.get(&format!("cat{c}_{name}")) {
                    event.features[c].push((i, value));
                    event.sums[c] += value;
                    event.max_sum = event.max_sum.max(event.sums[c]);
                }
            }
        }
        event
    }

    /// Distribuição de probabilidade sobre as classes.
    pub fn classify(&self, fv: &FeatureVector) -> Vec<f64> {
        self.classify_event(self.event(fv))
    }

    /// Distribuição de um evento já montado por [`MaxEntModel::event`].
    pub fn classify_event(&self, mut event: MaxEntEvent) -> Vec<f64> {
        if self.class_count == 0 {
            return Vec::new();
        }
        for c in 0..self.class_count {
            if self.length_normalize {
                let sum = event.sums[c];
                if sum != 0.0 {
                    for (_, v) in &mut event.features[c] {
                        *v /= sum;
                    }
                }
            } else {
                event.features[c].push((0, event.max_sum - event.sums[c]));
            }
        }

        let scores: Vec<f64> = event
            .features
            .iter()
            .map(|fs| fs.iter().map(|&(i, v)| self.lambdas[i] * v).sum())
            .collect();
        softmax(&scores)
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let uniform = || vec![1.0 / scores.len() as f64; scores.len()];
    if !max.is_finite() {
        return uniform();
    }
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return uniform();
    }
    exps.iter().map(|e| e / sum).collect()
}

/// Índice da maior probabilidade; empates ficam com a menor classe.
pub fn argmax(probs: &[f64]) -> usize {
    let mut best = 0;
    for (c, &p) in probs.iter().enumerate() {
        if p > probs[best] {
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(pairs: &[(&str, f64)]) -> FeatureVector {
        let mut fv = FeatureVector::new(0);
        for (k, v) in pairs {
            fv.insert(*k, *v);
        }
        fv
    }

    #[test]
    fn test_empty_model_is_uniform() {
        let model = MaxEntModel::empty(3);
        let p = model.classify(&fv(&[("IC0", 1.0)]));
        assert_eq!(p.len(), 3);
        for q in p {
            assert!((q - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_weights_shift_probability() {
        let model = MaxEntModel::from_model_str(
            "@@@CORRECTIVE-FEATURE@@@ 1.0\ncat1_IC0 20.0\ncat0_IC0 2.0\n",
            3,
        )
        .unwrap();
        let p = model.classify(&fv(&[("IC0", 1.0), ("AC0", 0.0)]));
        let sum: f64 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(p.iter().all(|&q| q >= 0.0));
        assert_eq!(argmax(&p), 1);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }

    #[test]
    fn test_unknown_and_zero_features_are_ignored() {
        let model = MaxEntModel::from_model_str("cat0_IC0 5.0\n", 2).unwrap();
        let event = model.event(&fv(&[("ZZ0", 1.0), ("IC0", 0.0)]));
        assert!(event.features.iter().all(Vec::is_empty));
        assert_eq!(event.max_sum, 0.0);
    }

    #[test]
    fn test_event_emptiness() {
        let model = MaxEntModel::from_model_str("cat1_IC0 5.0\n", 3).unwrap();
        assert!(model.event(&fv(&[("AC0", 1.0)])).is_empty());
        assert!(!model.event(&fv(&[("IC0", 1.0)])).is_empty());
        assert!(MaxEntModel::empty(3).event(&fv(&[("IC0", 1.0)])).is_empty());
    }

    #[test]
    fn test_corrective_feature_balances_classes() {
        let model = MaxEntModel::from_model_str("cat0_A 3.0\ncat0_B 3.0\ncat1_A 3.0\n", 2).unwrap();
        let event = model.event(&fv(&[("A", 1.0), ("B", 1.0)]));
        assert_eq!(event.sums, vec![2.0, 1.0]);
        assert_eq!(event.max_sum, 2.0);
    }

    #[test]
    fn test_repeated_name_overwrites() {
        let model = MaxEntModel::from_model_str("cat0_A 3.0\ncat0_A 1.0\n", 2).unwrap();
        assert_eq!(model.weight_count(), 2);
        // ln 1 = 0: sem efeito na classe 0
        let p = model.classify(&fv(&[("A", 1.0)]));
        assert!(p[0] < p[1]);
    }

    #[test]
    fn test_length_normalization() {
        let model = MaxEntModel::from_model_str("cat0_A 10.0\ncat0_B 10.0\n", 2)
            .unwrap()
            .with_length_normalization(true);
        let p = model.classify(&fv(&[("A", 1.0), ("B", 1.0)]));
        let expected = 10f64.ln().exp() / (10f64.ln().exp() + 1.0);
        assert!((p[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_weight_is_an_error() {
        let err = MaxEntModel::from_model_str("cat0_A dez\n", 2).unwrap_err();
        assert!(matches!(err, NerError::Model { line: 1, .. }));
    }

    #[test]
    fn test_argmax_prefers_lowest_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), 2);
    }
}
