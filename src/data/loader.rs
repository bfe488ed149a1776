// ============================================================
// Layer 4: Parallel Corpus Loader
// ============================================================
// Reads an aligned parallel corpus from two UTF-8 text files:
//
//   train.nl            train.en
//   ─────────────       ─────────────
//   Hallo , hoe …       Hello , how …     ← line 1 pairs with line 1
//   Waar is het …       Where is the …    ← line 2 pairs with line 2
//
// One sentence per line, already segmented into space-separated
// tokens. Files with different line counts are rejected because
// every later line pairing would be silently wrong.
//
// When no files are given the built-in DefaultCorpus is used.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::preprocessor::Preprocessor;
use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::CorpusSource;
use crate::error::{NmtError, Result};

/// Loads sentence pairs from a source-language file and a target-language file.
pub struct ParallelCorpusLoader {
    source_path: PathBuf,
    target_path: PathBuf,
}

impl ParallelCorpusLoader {
    pub fn new(source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
        }
    }
}

impl CorpusSource for ParallelCorpusLoader {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let source = read_corpus_file(&self.source_path)?;
        let target = read_corpus_file(&self.target_path)?;

        let src_lines: Vec<&str> = source.lines().collect();
        let tgt_lines: Vec<&str> = target.lines().collect();
        if src_lines.len() != tgt_lines.len() {
            return Err(NmtError::data(format!(
                "corpus files are not aligned: '{}' has {} lines, '{}' has {}",
                self.source_path.display(),
                src_lines.len(),
                self.target_path.display(),
                tgt_lines.len()
            )));
        }

        let prep = Preprocessor::new();
        let mut pairs = Vec::with_capacity(src_lines.len());
        let mut blank = 0usize;
        for (s, t) in src_lines.iter().zip(&tgt_lines) {
            let pair = SentencePair::new(prep.tokenize(s), prep.tokenize(t));
            if pair.is_blank() {
                blank += 1;
                continue;
            }
            pairs.push(pair);
        }

        if blank > 0 {
            tracing::warn!("Skipped {} pairs with an empty side", blank);
        }
        tracing::info!(
            "Loaded {} sentence pairs from '{}' / '{}'",
            pairs.len(),
            self.source_path.display(),
            self.target_path.display()
        );
        Ok(pairs)
    }
}

fn read_corpus_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| NmtError::data(format!("cannot read '{}': {e}", path.display())))
}

// ─── Built-in Sample ─────────────────────────────────────────────────────────
/// Ten short Dutch → English pairs, handy for smoke tests and demos.
const DEFAULT_PAIRS: [(&str, &str); 10] = [
    ("Hallo , hoe gaat het ?", "Hello , how are you ?"),
    ("Waar is het station ?", "Where is the station ?"),
    ("Ik heb honger .", "I am hungry ."),
    ("Dank je wel !", "Thank you very much !"),
    ("Hoe laat is het ?", "What time is it ?"),
    ("Ik spreek een beetje Nederlands .", "I speak a little Dutch ."),
    ("Waar is het toilet ?", "Where is the toilet ?"),
    ("Het weer is mooi vandaag .", "The weather is nice today ."),
    ("Ik wil graag koffie .", "I would like coffee ."),
    ("Tot ziens !", "Goodbye !"),
];

/// The built-in Dutch/English corpus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCorpus;

impl CorpusSource for DefaultCorpus {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        Ok(DEFAULT_PAIRS
            .iter()
            .map(|(s, t)| SentencePair::from_text(s, t))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_default_corpus_has_ten_pairs() {
        let pairs = DefaultCorpus.load_pairs().unwrap();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0].source, vec!["Hallo", ",", "hoe", "gaat", "het", "?"]);
    }

    #[test]
    fn test_loads_aligned_files_and_skips_blank_pairs() {
        let dir = TempDir::new("corpus_test").unwrap();
        let src = dir.path().join("train.nl");
        let tgt = dir.path().join("train.en");
        fs::write(&src, "Hallo  wereld\n\nTot ziens !\n").unwrap();
        fs::write(&tgt, "Hello world\n\nGoodbye !\n").unwrap();

        let pairs = ParallelCorpusLoader::new(&src, &tgt).load_pairs().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], SentencePair::from_text("Hallo wereld", "Hello world"));
    }

    #[test]
    fn test_rejects_misaligned_files() {
        let dir = TempDir::new("corpus_test").unwrap();
        let src = dir.path().join("a");
        let tgt = dir.path().join("b");
        fs::write(&src, "een\ntwee\n").unwrap();
        fs::write(&tgt, "one\n").unwrap();

        let err = ParallelCorpusLoader::new(&src, &tgt).load_pairs().unwrap_err();
        assert!(matches!(err, NmtError::Data(_)));
    }

    #[test]
    fn test_missing_file_is_a_data_error() {
        let dir = TempDir::new("corpus_test").unwrap();
        let err = ParallelCorpusLoader::new(dir.path().join("nope.nl"), dir.path().join("nope.en"))
            .load_pairs()
            .unwrap_err();
        assert!(matches!(err, NmtError::Data(_)));
        assert!(err.to_string().contains("nope.nl"));
    }
}
