//! # Erros do Motor NER
//!
//! Todos os erros aqui são de **configuração**: surgem ao carregar tagset,
//! listas, expressões regulares, modelo ou tabelas de frequência. Durante o
//! processamento de um documento nada falha: buscas sem resultado viram
//! conjuntos vazios e features inexistentes valem `0.0`.

use std::path::PathBuf;

use thiserror::Error;

/// Erro de carregamento de algum colaborador do reconhecedor.
#[derive(Debug, Error)]
pub enum NerError {
    /// Arquivo ausente ou ilegível.
    #[error("não foi possível ler {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Documento de configuração (TOML) malformado.
    #[error("configuração inválida: {0}")]
    Config(String),

    /// Marcação de tag ilegível ou tagset inconsistente.
    #[error("tagset inválido: {0}")]
    Tagset(String),

    /// Linha inválida no arquivo de modelo treinado.
    #[error("modelo inválido (linha {line}): {message}")]
    Model { line: usize, message: String },

    /// Linha inválida no arquivo de frequências.
    #[error("arquivo de frequências inválido (linha {line}): {message}")]
    Frequency { line: usize, message: String },

    /// Expressão regular obrigatória que não compila.
    #[error("expressão regular inválida: {0}")]
    Regex(#[from] regex::Error),
}

impl NerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NerError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, NerError>;

/// Lê um arquivo texto inteiro, anexando o caminho ao erro.
pub(crate) fn read_to_string(path: impl AsRef<std::path::Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| NerError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_to_string("/nao/existe/tagset.txt").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nao/existe/tagset.txt"));
        assert!(matches!(err, NerError::Io { .. }));
    }

    #[test]
    fn test_regex_error_converts() {
        let err: NerError = regex::Regex::new("(abc").unwrap_err().into();
        assert!(matches!(err, NerError::Regex(_)));
    }
}
