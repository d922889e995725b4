//! # Padrões Regex com Tags
//!
//! Carrega uma lista ordenada de pares (regex, tag) de um arquivo de
//! especificação com variáveis:
//!
//! ```text
//! # dígitos e separadores
//! SET digit [0-9]
//! SET year \b $digit {4} \b
//! MAP $year <TIMEX TYPE="DATE">
//! MAP (US\$|\$)\s?[0-9]+ <NUMEX TYPE="MONEY">
//! ```
//!
//! `SET nome v1 v2 ...` concatena os valores; um valor que seja inteiro uma
//! `$var` é substituído pelo conteúdo já definido. `MAP padrão tag...` registra um padrão, que pode ser
//! literal ou uma `$var`; a tag é o restante da linha. Os padrões são
//! compilados sem diferenciar maiúsculas.
//!
//! ## Casamento
//!
//! Cada padrão varre o texto da esquerda para a direita sem sobreposição.
//! A entidade vai do início do casamento até o fim dele, ou até o início do
//! grupo 5 quando esse grupo existe e participou (contexto à direita que não
//! faz parte da entidade). Todo token que intersecta o casamento recebe
//! `regex<j> = 1.0`, onde `j` é a posição do padrão no arquivo.

use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::decoration::TokenDecoration;
use crate::error::{read_to_string, Result};
use crate::tagset::EntityTag;

/// Grupo que, quando presente, marca o fim da entidade.
const ENTITY_END_GROUP: usize = 5;

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub regex: Regex,
    pub tag: EntityTag,
}

/// Um casamento de um padrão sobre o texto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    /// Início da entidade.
    pub start: usize,
    /// Fim da entidade (início do grupo 5, se houver).
    pub end: usize,
    pub rule_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

/// Substitui `$var` pelo valor definido; variável desconhecida fica literal.
fn evaluate(token: &str, vars: &HashMap<String, String>) -> String {
    if let Some(name) = token.strip_prefix('$').filter(|n| !n.is_empty()) {
        match vars.get(name) {
            Some(value) => return value.clone(),
            None => tracing::warn!(variable = name, "variável não definida"),
        }
    }
    token.to_string()
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Interpreta o conteúdo de um arquivo de especificação.
    ///
    /// Linhas malformadas (tag ilegível, regex que não compila, comando
    /// desconhecido) são descartadas com um aviso.
    pub fn from_spec_str(content: &str) -> Self {
        let mut vars: HashMap<String, String> = HashMap::new();
        let mut rules = Vec::new();

        for (n, line) in content.lines().enumerate() {
            let line_no = n + 1;
            let mut words = line.split_whitespace();
            let Some(command) = words.next() else { continue };
            if command.starts_with('#') {
                continue;
            }
            match command {
                "SET" => {
                    let Some(name) = words.next() else {
                        tracing::warn!(line = line_no, "SET sem nome");
                        continue;
                    };
                    let value: String = words.map(|w| evaluate(w, &vars)).collect();
                    vars.insert(name.to_string(), value);
                }
                "MAP" => {
                    let Some(pattern) = words.next() else {
                        tracing::warn!(line = line_no, "MAP sem padrão");
                        continue;
                    };
                    let pattern = evaluate(pattern, &vars);
                    let tag_text = words.collect::<Vec<_>>().join(" ");
                    let tag = match EntityTag::parse(&tag_text) {
                        Ok(tag) => tag,
                        Err(e) => {
                            tracing::warn!(line = line_no, error = %e, "padrão ignorado");
                            continue;
                        }
                    };
                    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                        Ok(regex) => rules.push(PatternRule { regex, tag }),
                        Err(e) => tracing::warn!(line = line_no, error = %e, "padrão ignorado"),
                    }
                }
                other => tracing::warn!(line = line_no, command = other, "comando desconhecido"),
            }
        }
        Self { rules }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let matcher = Self::from_spec_str(&read_to_string(path)?);
        tracing::info!(path = %path.display(), patterns = matcher.len(), "padrões carregados");
        Ok(matcher)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn tag(&self, rule_index: usize) -> Option<&EntityTag> {
        self.rules.get(rule_index).map(|r| &r.tag)
    }

    /// Aplica todos os padrões, na ordem do arquivo, e marca os tokens tocados.
    pub fn find_matches(&self, text: &str, tokens: &mut [TokenDecoration]) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        for (rule_index, rule) in self.rules.iter().enumerate() {
            let key = format!("regex{rule_index}");
            for caps in rule.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let end = caps
                    .get(ENTITY_END_GROUP)
                    .map(|g| g.start())
                    .unwrap_or_else(|| whole.end());

                // o span da entidade conta fechado: o token que começa em `end` também é marcado
                for deco in tokens.iter_mut() {
                    let t = deco.token;
                    if t.start <= end && t.end > whole.start() {
                        deco.set(key.as_str(), 1.0);
                    }
                }
                if end > whole.start() {
                    matches.push(PatternMatch {
                        start: whole.start(),
                        end,
                        rule_index,
                    });
                }
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::decorate;
    use crate::tokenizer::{tokenize, LexMode};

    const SPEC: &str = r#"
# datas
SET digit [0-9]
SET year \b $digit {4} \b
MAP $year <TIMEX TYPE="DATE">
MAP (ibm|oracle) <ENAMEX TYPE="ORGANIZATION">
MAP (x)(x)(x)(x)(\s+corp) <ENAMEX TYPE="ORGANIZATION">
MAP ([a-z <ENAMEX TYPE="ORGANIZATION">
MAP abc sem tag
FOO bar
"#;

    #[test]
    fn test_set_and_map_parsing() {
        let m = PatternMatcher::from_spec_str(SPEC);
        assert_eq!(m.len(), 3);
        assert_eq!(m.rules()[0].regex.as_str(), r"\b[0-9]{4}\b");
        assert_eq!(m.tag(0).unwrap().levels(), &["TIMEX", "DATE"]);
    }

    #[test]
    fn test_matches_are_case_insensitive_and_non_overlapping() {
        let m = PatternMatcher::from_spec_str(SPEC);
        let text = "Ibm e ORACLE, desde 1999 e 2004.";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        let found = m.find_matches(text, &mut decos);
        let spans: Vec<(&str, usize)> = found.iter().map(|p| (&text[p.start..p.end], p.rule_index)).collect();
        assert_eq!(spans, vec![("1999", 0), ("2004", 0), ("Ibm", 1), ("ORACLE", 1)]);
        assert_eq!(decos[0].value("regex1"), 1.0);
        assert_eq!(decos[5].value("regex0"), 1.0);
        assert!(!decos[1].contains("regex1"));
        // pontuação colada ao fim do casamento
        assert_eq!(decos[3].value("regex1"), 1.0);
        assert_eq!(decos[8].value("regex0"), 1.0);
        assert!(!decos[6].contains("regex0"));
    }

    #[test]
    fn test_group_five_ends_entity() {
        let m = PatternMatcher::from_spec_str(SPEC);
        let text = "a xxxx corp b";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        let found: Vec<_> = m.find_matches(text, &mut decos).into_iter().filter(|p| p.rule_index == 2).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].start..found[0].end], "xxxx");
        // só o span da entidade marca tokens; o contexto do grupo 5 fica de fora
        assert_eq!(decos[1].value("regex2"), 1.0);
        assert!(!decos[2].contains("regex2"));
        assert!(!decos[0].contains("regex2"));
    }

    #[test]
    fn test_unknown_variable_stays_literal() {
        let m = PatternMatcher::from_spec_str("SET v abc\nMAP x$v <X>\nMAP $nada <Y>\nMAP $v <Z>\n");
        assert_eq!(m.len(), 3);
        assert_eq!(m.rules()[0].regex.as_str(), "x$v");
        assert_eq!(m.rules()[1].regex.as_str(), "$nada");
        assert_eq!(m.rules()[2].regex.as_str(), "abc");
    }
}
