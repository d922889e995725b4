//! # Gazetteers sobre a Árvore de Sufixos
//!
//! Todas as listas de entidades conhecidas são concatenadas num único texto,
//! cada entrada delimitada por sentinelas:
//!
//! ```text
//! lista 0: ^Microsoft|^IBM|      lista 1: ^Lisboa|^Porto|
//! └──────── boundary 0 ────────┘└──────── boundary 1 ──────┘
//! ```
//!
//! Uma única [`SuffixTree`] indexa esse texto. Procurar `^Microsoft|` acha
//! entradas completas; `^Micro` acha prefixos de entradas (casamento parcial,
//! usado para estender candidatos token a token). Cada posição encontrada é
//! mapeada de volta à sua lista pela tabela de [`ListBoundary`].

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::decoration::TokenDecoration;
use crate::error::{read_to_string, Result};
use crate::suffix_tree::SuffixTree;
use crate::tagset::EntityTag;

/// Palavras de marcação removidas das entradas antes da indexação.
const RESERVED_WORDS: &[&str] = &["LOC", "PER", "MISC", "ORG", "LANG"];

/// Intervalo `[begin, end)` do texto concatenado ocupado por uma lista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListBoundary {
    pub begin: usize,
    pub end: usize,
    pub list_index: usize,
}

impl ListBoundary {
    pub fn contains(&self, offset: usize) -> bool {
        self.begin <= offset && offset < self.end
    }
}

/// Uma lista de origem: nome (geralmente o caminho), conteúdo e tag de saída.
#[derive(Debug, Clone)]
pub struct GazetteerSource {
    pub name: String,
    pub tag: EntityTag,
    pub contents: String,
}

/// Casamento de uma sequência de tokens com uma entrada completa de uma lista.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMatch {
    pub start: usize,
    pub end: usize,
    pub first_token: usize,
    pub last_token: usize,
    pub list_index: usize,
}

#[derive(Debug, Clone)]
pub struct GazetteerMatcher {
    tree: SuffixTree,
    boundaries: Vec<ListBoundary>,
    tags: Vec<EntityTag>,
    names: Vec<String>,
}

/// Normaliza uma linha de lista: remove palavras reservadas e colapsa espaços.
fn normalize_entry(line: &str) -> String {
    line.split_whitespace()
        .filter(|w| !RESERVED_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

impl GazetteerMatcher {
    /// Indexa as listas na ordem dada; o índice de cada lista é sua posição.
    pub fn new(sources: Vec<GazetteerSource>) -> Self {
        let mut text = String::new();
        let mut boundaries = Vec::with_capacity(sources.len());
        let mut tags = Vec::with_capacity(sources.len());
        let mut names = Vec::with_capacity(sources.len());

        for (list_index, source) in sources.into_iter().enumerate() {
            let begin = text.len();
            let mut entries = 0usize;
            for line in source.contents.lines() {
                let entry = normalize_entry(line);
                if entry.is_empty() {
                    continue;
                }
                text.push('^');
                text.push_str(&entry);
                text.push('|');
                entries += 1;
            }
            boundaries.push(ListBoundary { begin, end: text.len(), list_index });
            tracing::debug!(list = %source.name, entries, "lista indexada");
            tags.push(source.tag);
            names.push(source.name);
        }

        let tree = SuffixTree::new(text);
        tracing::info!(lists = names.len(), bytes = tree.len(), nodes = tree.node_count(), "gazetteer construído");
        Self { tree, boundaries, tags, names }
    }

    /// Matcher sem listas: nunca encontra nada.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Carrega um arquivo de especificação: linhas alternadas de caminho da
    /// lista e marcação da tag. Comentários `#` e linhas vazias são ignorados.
    ///
    /// Caminhos relativos são resolvidos a partir do diretório da especificação.
    /// Uma tag ilegível descarta só aquela lista.
    pub fn load_spec(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let spec = read_to_string(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut sources = Vec::new();
        let mut pending: Option<&str> = None;
        for line in spec.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(list_path) = pending.take() else {
                pending = Some(line);
                continue;
            };
            let tag = match EntityTag::parse(line) {
                Ok(tag) => tag,
                Err(e) => {
                    tracing::warn!(list = list_path, error = %e, "lista ignorada: tag inválida");
                    continue;
                }
            };
            let full: PathBuf = if Path::new(list_path).is_absolute() {
                PathBuf::from(list_path)
            } else {
                base.join(list_path)
            };
            let contents = read_to_string(&full)?;
            tracing::info!(list = %full.display(), tag = %tag, "usando lista");
            sources.push(GazetteerSource {
                name: list_path.to_string(),
                tag,
                contents,
            });
        }
        if let Some(list_path) = pending {
            tracing::warn!(list = list_path, "lista sem tag no fim da especificação");
        }
        Ok(Self::new(sources))
    }

    pub fn list_count(&self) -> usize {
        self.tags.len()
    }

    pub fn tag(&self, list_index: usize) -> Option<&EntityTag> {
        self.tags.get(list_index)
    }

    pub fn name(&self, list_index: usize) -> Option<&str> {
        self.names.get(list_index).map(String::as_str)
    }

    pub fn boundaries(&self) -> &[ListBoundary] {
        &self.boundaries
    }

    /// Lista dona de uma posição do texto concatenado.
    pub fn list_of(&self, offset: usize) -> Option<usize> {
        let i = self.boundaries.partition_point(|b| b.end <= offset);
        self.boundaries
            .get(i)
            .filter(|b| b.contains(offset))
            .map(|b| b.list_index)
    }

    /// Procura `^input` nas listas.
    ///
    /// - `complete`: exige a entrada inteira (`^input|`).
    /// - `extra`: sem `complete`, exige que a entrada continue com um espaço.
    ///
    /// Devolve os índices das listas com ocorrência, sem repetição, na ordem
    /// em que aparecem no texto indexado.
    pub fn find_string(&self, input: &str, complete: bool, extra: bool) -> Vec<usize> {
        if input.is_empty() {
            return Vec::new();
        }
        let mut pattern = String::with_capacity(input.len() + 2);
        pattern.push('^');
        pattern.push_str(input);
        if complete {
            pattern.push('|');
        } else if extra {
            pattern.push(' ');
        }

        let mut lists: Vec<usize> = Vec::new();
        for offset in self.tree.find_all_positions(pattern.as_bytes()) {
            if let Some(list) = self.list_of(offset) {
                if !lists.contains(&list) {
                    lists.push(list);
                }
            }
        }
        lists
    }

    /// Alguma entrada de lista começa com `input`.
    pub fn has_prefix(&self, input: &str) -> bool {
        if input.is_empty() {
            return false;
        }
        let mut pattern = String::with_capacity(input.len() + 1);
        pattern.push('^');
        pattern.push_str(input);
        self.tree.contains(pattern.as_bytes())
    }

    /// Casa sequências de tokens com entradas completas das listas.
    ///
    /// A partir de cada token, o candidato cresce enquanto o texto bruto do
    /// primeiro token até o atual for prefixo de alguma entrada. Cada entrada
    /// completa encontrada gera um [`ListMatch`] e marca `list<k> = 1.0` em todos
    /// os tokens cobertos.
    pub fn find_matches(&self, text: &str, tokens: &mut [TokenDecoration]) -> Vec<ListMatch> {
        let mut matches = Vec::new();
        if self.list_count() == 0 {
            return matches;
        }

        for first in 0..tokens.len() {
            let start = tokens[first].token.start;
            let mut last = first;
            let mut candidate = tokens[first].text(text);

            while self.has_prefix(candidate) {
                for list_index in self.find_string(candidate, true, false) {
                    let key = format!("list{list_index}");
                    for deco in &mut tokens[first..=last] {
                        deco.set(key.as_str(), 1.0);
                    }
                    matches.push(ListMatch {
                        start,
                        end: tokens[last].token.end,
                        first_token: first,
                        last_token: last,
                        list_index,
                    });
                }

                if last + 1 >= tokens.len() {
                    break;
                }
                last += 1;
                candidate = text.get(start..tokens[last].token.end).unwrap_or("");
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

    fn tag(markup: &str) -> EntityTag {
        EntityTag::parse(markup).unwrap()
    }

    fn matcher() -> GazetteerMatcher {
        GazetteerMatcher::new(vec![
            GazetteerSource {
                name: "orgs".into(),
                tag: tag("<ENAMEX TYPE=\"ORGANIZATION\">"),
                contents: "Microsoft\nMicrosoft Research ORG\n\nIBM\n".into(),
            },
            GazetteerSource {
                name: "places".into(),
                tag: tag("<ENAMEX TYPE=\"LOCATION\">"),
                contents: "LOC New   York\nParis\n".into(),
            },
        ])
    }

    #[test]
    fn test_boundaries_partition_text() {
        let g = matcher();
        let b = g.boundaries();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].begin, 0);
        assert_eq!(b[0].end, b[1].begin);
        assert_eq!(g.list_of(0), Some(0));
        assert_eq!(g.list_of(b[1].begin), Some(1));
        assert_eq!(g.list_of(b[1].end), None);
    }

    #[test]
    fn test_find_string_modes() {
        let g = matcher();
        assert_eq!(g.find_string("Microsoft", true, false), vec![0]);
        assert_eq!(g.find_string("Micro", true, false), Vec::<usize>::new());
        assert_eq!(g.find_string("Micro", false, false), vec![0]);
        assert_eq!(g.find_string("Microsoft", false, true), vec![0]);
        assert_eq!(g.find_string("Paris", false, true), Vec::<usize>::new());
        // palavras reservadas e espaços extras foram normalizados
        assert_eq!(g.find_string("New York", true, false), vec![1]);
        assert_eq!(g.find_string("Microsoft Research", true, false), vec![0]);
        assert!(g.find_string("", false, false).is_empty());
    }

    #[test]
    fn test_prefix_check_agrees_with_partial_lookup() {
        let g = matcher();
        for input in ["M", "Micro", "Microsoft R", "New Y", "Par", "Mx", "York", "ORG", ""] {
            assert_eq!(g.has_prefix(input), !g.find_string(input, false, false).is_empty(), "{input:?}");
        }
        assert!(g.has_prefix("Microsoft Research"));
        assert!(!g.has_prefix("Microsoft Research ORG"));
        assert!(!GazetteerMatcher::empty().has_prefix("x"));
    }

    #[test]
    fn test_find_matches_multi_token() {
        let g = matcher();
        let text = "Microsoft Research fica em New York.";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        let matches = g.find_matches(text, &mut decos);

        let spans: Vec<&str> = matches.iter().map(|m| &text[m.start..m.end]).collect();
        assert_eq!(spans, vec!["Microsoft", "Microsoft Research", "New York"]);
        assert_eq!(matches[2].list_index, 1);
        assert_eq!(decos[1].value("list0"), 1.0);
        assert_eq!(decos[5].value("list1"), 1.0);
        assert!(!decos[2].contains("list0"));
    }

    #[test]
    fn test_load_spec_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("orgs.txt"), "Microsoft\n").unwrap();
        std::fs::write(
            dir.path().join("lists.spec"),
            "# listas\norgs.txt\n<ENAMEX TYPE=\"ORGANIZATION\">\n\nbroken.txt\nsem marcação\n",
        )
        .unwrap();
        let g = GazetteerMatcher::load_spec(dir.path().join("lists.spec")).unwrap();
        assert_eq!(g.list_count(), 1);
        assert_eq!(g.name(0), Some("orgs.txt"));
        assert_eq!(g.tag(0).unwrap().levels()[1], "ORGANIZATION");
    }

    #[test]
    fn test_missing_list_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lists.spec"), "nope.txt\n<ENAMEX TYPE=\"ORG\">\n").unwrap();
        assert!(GazetteerMatcher::load_spec(dir.path().join("lists.spec")).is_err());
    }

    #[test]
    fn test_empty_matcher() {
        let g = GazetteerMatcher::empty();
        assert!(g.find_string("x", false, false).is_empty());
        let text = "Microsoft";
        let mut decos = decorate(&tokenize(text, LexMode::SkipMarkup));
        assert!(g.find_matches(text, &mut decos).is_empty());
    }
}
