//! # Tags de Entidade e Numeração de Classes BIO
//!
//! Uma [`EntityTag`] é uma sequência hierárquica de níveis: o nível 0 é a
//! categoria raiz (ex: `ENAMEX`) e os demais formam a cadeia de subtipos
//! separada por `:` na marcação:
//!
//! ```text
//! <ENAMEX TYPE="PERSON:FIRST">   →   ["ENAMEX", "PERSON", "FIRST"]
//! ```
//!
//! O [`EntityTagset`] atribui a cada tag um índice denso `i` (ordem de inserção)
//! e deriva dele a numeração de classes usada pelo classificador:
//!
//! | Classe   | Significado                     |
//! |----------|---------------------------------|
//! | `0`      | Outside: fora de entidade       |
//! | `2i + 1` | Begin: primeiro token da tag i  |
//! | `2i + 2` | Inside: continuação da tag i    |
//!
//! Logo `class_count = 2 * tag_count + 1` sempre.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_to_string, NerError, Result};

/// Tag hierárquica de entidade. Igualdade e ordem são lexicográficas sobre os níveis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntityTag")]
pub struct EntityTag {
    levels: Vec<String>,
}

/// Forma serializada da tag, validada por [`EntityTag::new`] na leitura.
#[derive(Deserialize)]
struct RawEntityTag {
    levels: Vec<String>,
}

impl TryFrom<RawEntityTag> for EntityTag {
    type Error = NerError;

    fn try_from(raw: RawEntityTag) -> Result<Self> {
        Self::new(raw.levels)
    }
}

impl EntityTag {
    /// Constrói a tag a partir dos níveis já separados. Níveis vazios são descartados.
    pub fn new<I, S>(levels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: Vec<String> = levels
            .into_iter()
            .map(Into::into)
            .filter(|l| !l.is_empty())
            .collect();
        if levels.is_empty() {
            return Err(NerError::Tagset("tag sem categoria raiz".to_string()));
        }
        Ok(Self { levels })
    }

    /// Interpreta uma marcação de abertura como `<ENAMEX TYPE="ORGANIZATION">`.
    ///
    /// O atributo `TYPE` é opcional e aceita aspas simples ou duplas; o nome do
    /// atributo não diferencia maiúsculas. Espaços ao redor são ignorados.
    pub fn parse(markup: &str) -> Result<Self> {
        let invalid = || NerError::Tagset(format!("marcação de tag ilegível: {markup:?}"));

        let inner = markup
            .trim()
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .ok_or_else(invalid)?
            .trim()
            .trim_end_matches('/')
            .trim();

        let (root, rest) = match inner.find(char::is_whitespace) {
            Some(pos) => (&inner[..pos], inner[pos..].trim()),
            None => (inner, ""),
        };
        if root.is_empty() || root.starts_with('/') {
            return Err(invalid());
        }

        let mut levels = vec![root.to_string()];
        if !rest.is_empty() {
            let (name, value) = rest.split_once('=').ok_or_else(invalid)?;
            if !name.trim().eq_ignore_ascii_case("TYPE") {
                return Err(invalid());
            }
            let value = value.trim();
            let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'').ok_or_else(invalid)?;
            let body = value[1..].strip_suffix(quote).ok_or_else(invalid)?;
            levels.extend(body.split(':').filter(|s| !s.is_empty()).map(str::to_string));
        }
        Ok(Self { levels })
    }

    /// Categoria raiz (nível 0).
    pub fn root(&self) -> &str {
        &self.levels[0]
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// `<ROOT TYPE="l1:l2">`, ou `<ROOT>` quando não há subtipos.
    pub fn opening_tag(&self) -> String {
        if self.levels.len() == 1 {
            format!("<{}>", self.root())
        } else {
            format!("<{} TYPE=\"{}\">", self.root(), self.levels[1..].join(":"))
        }
    }

    /// `</ROOT>`
    pub fn closing_tag(&self) -> String {
        format!("</{}>", self.root())
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.opening_tag())
    }
}

/// Classe do classificador decodificada no esquema BIO.
///
/// É a forma tipada do inteiro `c` que o modelo MaxEnt prevê.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Outside,
    /// Primeiro token de uma entidade com a tag de índice dado.
    Begin(usize),
    /// Token de continuação.
    Inside(usize),
}

impl Classification {
    /// Decodifica um número de classe. Não valida contra um tagset.
    pub fn from_class(class: usize) -> Self {
        match class {
            0 => Classification::Outside,
            c if c % 2 == 1 => Classification::Begin((c + 1) / 2 - 1),
            c => Classification::Inside(c / 2 - 1),
        }
    }

    /// Número de classe correspondente (inverso de [`Classification::from_class`]).
    pub fn class(&self) -> usize {
        match self {
            Classification::Outside => 0,
            Classification::Begin(i) => 2 * i + 1,
            Classification::Inside(i) => 2 * i + 2,
        }
    }

    /// Índice da tag, ou `None` para Outside.
    pub fn tag_index(&self) -> Option<usize> {
        match self {
            Classification::Outside => None,
            Classification::Begin(i) | Classification::Inside(i) => Some(*i),
        }
    }
}

/// Vocabulário de tags com índices densos na ordem de inserção.
#[derive(Debug, Clone, Default)]
pub struct EntityTagset {
    tags: Vec<EntityTag>,
    index: HashMap<EntityTag, usize>,
}

impl EntityTagset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra uma tag e devolve seu índice. Uma tag repetida mantém o índice original.
    pub fn add_tag(&mut self, tag: EntityTag) -> usize {
        if let Some(&i) = self.index.get(&tag) {
            return i;
        }
        let i = self.tags.len();
        self.index.insert(tag.clone(), i);
        self.tags.push(tag);
        i
    }

    /// Uma marcação de tag por linha; linhas vazias e comentários `#` são ignorados.
    pub fn from_markup_lines(content: &str) -> Result<Self> {
        let mut tagset = Self::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tag = EntityTag::parse(line)
                .map_err(|e| NerError::Tagset(format!("linha {}: {e}", n + 1)))?;
            tagset.add_tag(tag);
        }
        Ok(tagset)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let tagset = Self::from_markup_lines(&read_to_string(path.as_ref())?)?;
        tracing::info!(path = %path.as_ref().display(), tags = tagset.tag_count(), "tagset carregado");
        Ok(tagset)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Sempre `2 * tag_count + 1`.
    pub fn class_count(&self) -> usize {
        2 * self.tags.len() + 1
    }

    /// Classe "fora de entidade".
    pub const fn out_class(&self) -> usize {
        0
    }

    pub fn index_of(&self, tag: &EntityTag) -> Option<usize> {
        self.index.get(tag).copied()
    }

    pub fn tag(&self, index: usize) -> Option<&EntityTag> {
        self.tags.get(index)
    }

    pub fn tags(&self) -> &[EntityTag] {
        &self.tags
    }

    /// `2i+1` para begin, `2i+2` para inside. Uma tag desconhecida cai em Outside (0).
    pub fn classification(&self, tag: &EntityTag, begin: bool) -> usize {
        match self.index_of(tag) {
            Some(i) if begin => Classification::Begin(i).class(),
            Some(i) => Classification::Inside(i).class(),
            None => self.out_class(),
        }
    }

    /// Índice da tag de uma classe; `None` para Outside ou classe fora do intervalo.
    pub fn index_of_class(&self, class: usize) -> Option<usize> {
        if class >= self.class_count() {
            return None;
        }
        Classification::from_class(class).tag_index()
    }

    /// Tag de uma classe e se ela é uma classe begin.
    pub fn tag_of_class(&self, class: usize) -> Option<(&EntityTag, bool)> {
        let begin = matches!(Classification::from_class(class), Classification::Begin(_));
        self.index_of_class(class)
            .and_then(|i| self.tags.get(i))
            .map(|t| (t, begin))
    }

    /// Decodifica uma classe, validando o intervalo.
    pub fn decode(&self, class: usize) -> Option<Classification> {
        (class < self.class_count()).then(|| Classification::from_class(class))
    }
}
