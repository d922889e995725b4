//! # Árvore de Sufixos (Ukkonen)
//!
//! Índice de substrings construído *online*, em uma única passada sobre o texto,
//! em tempo linear amortizado. É a base do casamento com gazetteers: o texto
//! indexado é a concatenação de todas as listas delimitadas por `^...|`.
//!
//! ## Algoritmo
//!
//! Cada fase `pos` estende todos os sufixos pendentes com o símbolo `text[pos]`:
//!
//! 1. **Folha aberta**: folhas guardam um fim global implícito, então crescem sozinhas.
//! 2. **Ramificação**: se o símbolo não continua o caminho ativo, cria-se uma folha
//!    (dividindo a aresta quando o ponto ativo está no meio dela).
//! 3. **Parada**: se o símbolo já existe no caminho, nenhum sufixo menor precisa
//!    ser estendido nesta fase.
//!
//! Os *suffix links* levam do nó de `αx` ao nó de `x`; junto com o truque
//! *skip/count* (descer arestas inteiras comparando só o comprimento) garantem
//! a complexidade $O(n)$.
//!
//! ## Representação
//!
//! Os nós vivem numa arena (`Vec<Node>`) e se referenciam por índice. Arestas
//! são intervalos `[start, end)` sobre o buffer de texto. Um terminador virtual
//! (símbolo 256, fora do alfabeto de bytes) é acrescentado ao final para que
//! todo sufixo termine numa folha, inclusive os que são prefixos de outros.

use std::collections::HashMap;

/// Símbolo terminador, distinto de qualquer byte.
const TERMINATOR: u16 = 256;
const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    start: usize,
    /// `None` para folhas: o fim acompanha o fim global.
    end: Option<usize>,
    suffix_link: usize,
    children: HashMap<u16, usize>,
    /// Posição inicial do sufixo representado (somente folhas).
    suffix_start: Option<usize>,
}

impl Node {
    fn new(start: usize, end: Option<usize>) -> Self {
        Self {
            start,
            end,
            suffix_link: ROOT,
            children: HashMap::new(),
            suffix_start: None,
        }
    }
}

/// Índice imutável de substrings sobre um buffer de bytes.
#[derive(Debug, Clone)]
pub struct SuffixTree {
    text: Vec<u8>,
    nodes: Vec<Node>,
}

impl SuffixTree {
    /// Constrói a árvore em uma passada.
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        let mut tree = Self {
            text: text.into(),
            nodes: vec![Node::new(0, Some(0))],
        };
        tree.build();
        tree
    }

    /// Texto indexado (sem o terminador).
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn symbol(&self, i: usize) -> u16 {
        match self.text.get(i) {
            Some(&b) => u16::from(b),
            None => TERMINATOR,
        }
    }

    /// Comprimento da aresta que entra no nó, com o fim global `leaf_end`.
    fn edge_len(&self, node: usize, leaf_end: usize) -> usize {
        let n = &self.nodes[node];
        n.end.unwrap_or(leaf_end) - n.start
    }

    fn push_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn build(&mut self) {
        let total = self.text.len() + 1;

        let mut active_node = ROOT;
        let mut active_edge = 0usize;
        let mut active_length = 0usize;
        let mut remainder = 0usize;

        for pos in 0..total {
            remainder += 1;
            let mut last_internal: Option<usize> = None;
            let current = self.symbol(pos);

            while remainder > 0 {
                if active_length == 0 {
                    active_edge = pos;
                }
                let edge_symbol = self.symbol(active_edge);

                match self.nodes[active_node].children.get(&edge_symbol).copied() {
                    None => {
                        // regra 2 a partir de um nó existente
                        let mut leaf = Node::new(pos, None);
                        leaf.suffix_start = Some(pos + 1 - remainder);
                        let leaf = self.push_node(leaf);
                        self.nodes[active_node].children.insert(edge_symbol, leaf);
                        if let Some(internal) = last_internal.take() {
                            self.nodes[internal].suffix_link = active_node;
                        }
                    }
                    Some(next) => {
                        let len = self.edge_len(next, pos + 1);
                        if active_length >= len {
                            // skip/count
                            active_edge += len;
                            active_length -= len;
                            active_node = next;
                            continue;
                        }

                        if self.symbol(self.nodes[next].start + active_length) == current {
                            // regra 3: o símbolo já está no caminho
                            if let Some(internal) = last_internal.take() {
                                if active_node != ROOT {
                                    self.nodes[internal].suffix_link = active_node;
                                }
                            }
                            active_length += 1;
                            break;
                        }

                        // regra 2 no meio de uma aresta: divide
                        let split_start = self.nodes[next].start;
                        let split = self.push_node(Node::new(split_start, Some(split_start + active_length)));
                        self.nodes[active_node].children.insert(edge_symbol, split);

                        let mut leaf = Node::new(pos, None);
                        leaf.suffix_start = Some(pos + 1 - remainder);
                        let leaf = self.push_node(leaf);
                        self.nodes[split].children.insert(current, leaf);

                        self.nodes[next].start += active_length;
                        let next_symbol = self.symbol(self.nodes[next].start);
                        self.nodes[split].children.insert(next_symbol, next);

                        if let Some(internal) = last_internal.replace(split) {
                            self.nodes[internal].suffix_link = split;
                        }
                    }
                }

                remainder -= 1;
                if active_node == ROOT && active_length > 0 {
                    active_length -= 1;
                    active_edge = pos + 1 - remainder;
                } else if active_node != ROOT {
                    active_node = self.nodes[active_node].suffix_link;
                }
            }
        }

        // fixa o fim global das folhas
        for node in self.nodes.iter_mut().skip(1) {
            if node.end.is_none() {
                node.end = Some(total);
            }
        }
    }

    /// Nó cuja subárvore contém exatamente as ocorrências de `pattern`.
    fn locate(&self, pattern: &[u8]) -> Option<usize> {
        if pattern.is_empty() {
            return None;
        }
        let total = self.text.len() + 1;
        let mut node = ROOT;
        let mut i = 0;
        while i < pattern.len() {
            let child = *self.nodes[node].children.get(&u16::from(pattern[i]))?;
            let start = self.nodes[child].start;
            let len = self.edge_len(child, total);
            let mut k = 0;
            while k < len && i < pattern.len() {
                if self.symbol(start + k) != u16::from(pattern[i]) {
                    return None;
                }
                k += 1;
                i += 1;
            }
            node = child;
        }
        Some(node)
    }

    /// Verdadeiro se `pattern` ocorre no texto. O padrão vazio não ocorre.
    pub fn contains(&self, pattern: impl AsRef<[u8]>) -> bool {
        self.locate(pattern.as_ref()).is_some()
    }

    /// Todas as posições iniciais de `pattern`, em ordem crescente.
    ///
    /// Um padrão ausente (ou vazio) resulta em um vetor vazio.
    pub fn find_all_positions(&self, pattern: impl AsRef<[u8]>) -> Vec<usize> {
        let Some(start) = self.locate(pattern.as_ref()) else {
            return Vec::new();
        };
        let mut positions = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            match n.suffix_start {
                Some(s) if s < self.text.len() => positions.push(s),
                Some(_) => {}
                None => stack.extend(n.children.values().copied()),
            }
        }
        positions.sort_unstable();
        positions
    }

    /// Uma posição de `pattern` (a menor), ou `None`.
    pub fn find_position(&self, pattern: impl AsRef<[u8]>) -> Option<usize> {
        self.find_all_positions(pattern).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive(text: &[u8], pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || pattern.len() > text.len() {
            return Vec::new();
        }
        (0..=text.len() - pattern.len())
            .filter(|&i| &text[i..i + pattern.len()] == pattern)
            .collect()
    }

    #[test]
    fn test_banana() {
        let tree = SuffixTree::new("banana");
        assert_eq!(tree.find_all_positions("ana"), vec![1, 3]);
        assert_eq!(tree.find_all_positions("a"), vec![1, 3, 5]);
        assert_eq!(tree.find_all_positions("banana"), vec![0]);
        assert_eq!(tree.find_all_positions("nab"), Vec::<usize>::new());
        assert_eq!(tree.find_position("na"), Some(2));
    }

    #[test]
    fn test_suffix_that_is_prefix_is_found() {
        // "a" no fim de "aa" só vira folha graças ao terminador
        let tree = SuffixTree::new("aa");
        assert_eq!(tree.find_all_positions("a"), vec![0, 1]);
        let tree = SuffixTree::new("mississippi");
        assert_eq!(tree.find_all_positions("issi"), vec![1, 4]);
        assert_eq!(tree.find_all_positions("i"), vec![1, 4, 7, 10]);
        assert_eq!(tree.find_all_positions("p"), vec![8, 9]);
    }

    #[test]
    fn test_empty_cases() {
        let tree = SuffixTree::new("");
        assert!(tree.is_empty());
        assert!(tree.find_all_positions("a").is_empty());
        assert_eq!(tree.find_position("a"), None);

        let tree = SuffixTree::new("abc");
        assert!(tree.find_all_positions("").is_empty());
        assert!(!tree.contains(""));
    }

    #[test]
    fn test_gazetteer_layout() {
        let tree = SuffixTree::new("^Microsoft|^Apple|^Microsoft Research|");
        assert_eq!(tree.find_all_positions("^Microsoft|"), vec![0]);
        assert_eq!(tree.find_all_positions("^Microsoft"), vec![0, 18]);
        assert_eq!(tree.find_all_positions("^Microsoft "), vec![18]);
        assert!(tree.find_all_positions("^Micro|").is_empty());
    }

    #[test]
    fn test_internal_nodes_branch() {
        let tree = SuffixTree::new("abcabxabcd");
        for node in tree.nodes.iter().skip(1) {
            if node.suffix_start.is_none() {
                assert!(node.children.len() >= 2);
            }
        }
    }

    #[test]
    fn test_non_ascii_bytes() {
        let text = "São Paulo|Goiânia";
        let tree = SuffixTree::new(text);
        let hits = tree.find_all_positions("ã");
        assert_eq!(hits, naive(text.as_bytes(), "ã".as_bytes()));
        assert_eq!(hits.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_every_substring_is_found(text in "[ab^| ]{0,40}") {
            let tree = SuffixTree::new(text.as_str());
            let bytes = text.as_bytes();
            for i in 0..bytes.len() {
                for j in i + 1..=bytes.len() {
                    let w = &bytes[i..j];
                    let hits = tree.find_all_positions(w);
                    prop_assert!(!hits.is_empty());
                    for &o in &hits {
                        prop_assert_eq!(&bytes[o..o + w.len()], w);
                    }
                    prop_assert_eq!(hits, naive(bytes, w));
                }
            }
        }

        #[test]
        fn prop_non_substrings_are_absent(text in "[abc]{0,30}", query in "[abcd]{1,6}") {
            let tree = SuffixTree::new(text.as_str());
            let expected = naive(text.as_bytes(), query.as_bytes());
            prop_assert_eq!(tree.find_all_positions(query.as_str()), expected);
        }
    }
}
