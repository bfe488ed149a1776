// ============================================================
// Layer 6: Model Store
// ============================================================
// One trained model = one directory:
//
//   <model_dir>/
//     manifest.json   ← format tag, Seq2SeqConfig, both vocabularies,
//                       max source/target lengths
//     weights.mpk.gz  ← every parameter tensor (NamedMpkGzFileRecorder)
//
// Weights are written at full precision so a reloaded model gives
// bit-identical outputs.
//
// Loading never guesses. Every one of these fails with
// NmtError::IncompatibleModel:
//   - missing or unparsable manifest, unknown format tag
//   - vocabulary without the reserved symbols, or with a size that
//     does not match the architecture
//   - architecture different from the caller's expected config
//   - unreadable weights, or weights whose tensors do not add up
//     to the architecture's parameter count

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::Vocabulary;
use crate::error::{NmtError, Result};
use crate::ml::model::{Seq2Seq, Seq2SeqConfig};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_TAG: &str = "nmt-seq2seq/1";

const MANIFEST_FILE: &str = "manifest.json";
// the recorder appends ".mpk.gz"
const WEIGHTS_STEM: &str = "weights";

type WeightsRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub format:         String,
    pub model:          Seq2SeqConfig,
    pub source_vocab:   Vocabulary,
    pub target_vocab:   Vocabulary,
    pub max_source_len: usize,
    pub max_target_len: usize,
}

impl ArtifactManifest {
    pub fn new(
        model:          Seq2SeqConfig,
        source_vocab:   Vocabulary,
        target_vocab:   Vocabulary,
        max_source_len: usize,
        max_target_len: usize,
    ) -> Self {
        Self {
            format: FORMAT_TAG.to_string(),
            model,
            source_vocab,
            target_vocab,
            max_source_len,
            max_target_len,
        }
    }

    /// Check internal consistency and, if given, agreement with `expected`.
    pub fn check(&self, expected: Option<&Seq2SeqConfig>) -> Result<()> {
        if self.format != FORMAT_TAG {
            return Err(NmtError::incompatible(format!(
                "unknown artifact format '{}', expected '{FORMAT_TAG}'",
                self.format
            )));
        }
        self.model
            .validate()
            .map_err(|e| NmtError::incompatible(format!("stored architecture is invalid: {e}")))?;
        if self.source_vocab.len() != self.model.source_vocab_size {
            return Err(NmtError::incompatible(format!(
                "source vocabulary has {} entries but the model expects {}",
                self.source_vocab.len(),
                self.model.source_vocab_size
            )));
        }
        if self.target_vocab.len() != self.model.target_vocab_size {
            return Err(NmtError::incompatible(format!(
                "target vocabulary has {} entries but the model expects {}",
                self.target_vocab.len(),
                self.model.target_vocab_size
            )));
        }
        if self.max_source_len == 0 || self.max_target_len == 0 {
            return Err(NmtError::incompatible("stored max lengths must be > 0"));
        }
        if let Some(expected) = expected {
            if !self.model.same_architecture(expected) {
                return Err(NmtError::incompatible(format!(
                    "stored architecture {:?} does not match the configured {:?}",
                    self.model, expected
                )));
            }
        }
        Ok(())
    }
}

/// A model restored from disk together with its manifest.
pub struct LoadedModel<B: Backend> {
    pub model:    Seq2Seq<B>,
    pub manifest: ArtifactManifest,
}

/// Reads and writes model artifacts under one directory.
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_STEM)
    }

    /// Write the weights first and the manifest last, so a directory with
    /// a manifest always has the matching weights next to it.
    pub fn save<B: Backend>(&self, model: &Seq2Seq<B>, manifest: &ArtifactManifest) -> Result<()> {
        manifest.check(None)?;
        fs::create_dir_all(&self.dir)?;

        WeightsRecorder::new()
            .record(model.clone().into_record(), self.weights_path())
            .map_err(|e| NmtError::Recorder(format!(
                "cannot write weights to '{}': {e}",
                self.dir.display()
            )))?;

        fs::write(self.manifest_path(), serde_json::to_string_pretty(manifest)?)?;

        tracing::info!(
            "Saved model ({} parameters) to '{}'",
            model.num_params(),
            self.dir.display()
        );
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ArtifactManifest> {
        let path = self.manifest_path();
        let json = fs::read_to_string(&path).map_err(|e| {
            NmtError::incompatible(format!(
                "cannot read '{}': {e}. Has a model been trained into this directory?",
                path.display()
            ))
        })?;
        serde_json::from_str(&json)
            .map_err(|e| NmtError::incompatible(format!("corrupt manifest '{}': {e}", path.display())))
    }

    /// Restore a model. `expected`, when given, must describe the same architecture.
    pub fn load<B: Backend>(
        &self,
        device:   &B::Device,
        expected: Option<&Seq2SeqConfig>,
    ) -> Result<LoadedModel<B>> {
        let manifest = self.load_manifest()?;
        manifest.check(expected)?;

        let fresh: Seq2Seq<B> = manifest.model.init(device);
        let expected_params   = fresh.num_params();

        let record = WeightsRecorder::new()
            .load(self.weights_path(), device)
            .map_err(|e| NmtError::incompatible(format!(
                "cannot read weights from '{}': {e}",
                self.dir.display()
            )))?;
        let model = fresh.load_record(record);

        if model.num_params() != expected_params {
            return Err(NmtError::incompatible(format!(
                "weights hold {} parameters but the architecture needs {}",
                model.num_params(),
                expected_params
            )));
        }

        tracing::info!("Loaded model from '{}'", self.dir.display());
        Ok(LoadedModel { model, manifest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::PaddedBatch;
    use crate::domain::sentence_pair::EncodedPair;
    use crate::ml::traits::TranslationModel;
    use burn::backend::NdArray;
    use tempdir::TempDir;

    type TestBackend = NdArray;

    fn vocab(words: &[&str]) -> Vocabulary {
        let tokens = ["<pad>", "<unk>", "<s>", "</s>"]
            .iter()
            .chain(words)
            .map(|s| s.to_string())
            .collect();
        Vocabulary::from_tokens(tokens).unwrap()
    }

    fn manifest() -> ArtifactManifest {
        let source = vocab(&["hallo", "wereld"]);
        let target = vocab(&["hello", "world", "!"]);
        let config = Seq2SeqConfig::new(source.len(), target.len(), 6).with_seed(4);
        ArtifactManifest::new(config, source, target, 8, 8)
    }

    fn logits(model: &Seq2Seq<TestBackend>) -> Vec<f32> {
        let pairs = [EncodedPair::new(vec![4, 5], vec![4, 5, 6])];
        let refs: Vec<&EncodedPair> = pairs.iter().collect();
        let tensors = PaddedBatch::from_pairs(&refs).to_tensors::<TestBackend>(&Default::default());
        model
            .forward_teacher_forced(&tensors)
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let dir   = TempDir::new("model_store").unwrap();
        let store = ModelStore::new(dir.path().join("model"));
        let m     = manifest();
        // different seed from the stored config, so a silent re-init would show
        let model: Seq2Seq<TestBackend> = m.model.clone().with_seed(99).init(&Default::default());

        store.save(&model, &m).unwrap();
        assert!(store.exists());

        let loaded = store.load::<TestBackend>(&Default::default(), Some(&m.model)).unwrap();
        assert_eq!(logits(&model), logits(&loaded.model));
        assert_eq!(loaded.manifest.source_vocab, m.source_vocab);
        assert_eq!(loaded.manifest.target_vocab, m.target_vocab);
    }

    #[test]
    fn test_missing_artifact_is_incompatible() {
        let dir = TempDir::new("model_store").unwrap();
        let err = ModelStore::new(dir.path())
            .load::<TestBackend>(&Default::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, NmtError::IncompatibleModel(_)));
    }

    #[test]
    fn test_corrupt_weights_are_incompatible() {
        let dir   = TempDir::new("model_store").unwrap();
        let store = ModelStore::new(dir.path());
        let m     = manifest();
        let model: Seq2Seq<TestBackend> = m.model.init(&Default::default());
        store.save(&model, &m).unwrap();

        fs::write(dir.path().join("weights.mpk.gz"), b"not a model").unwrap();
        let err = store.load::<TestBackend>(&Default::default(), None).err().unwrap();
        assert!(matches!(err, NmtError::IncompatibleModel(_)));
    }

    #[test]
    fn test_architecture_mismatch_is_incompatible() {
        let dir   = TempDir::new("model_store").unwrap();
        let store = ModelStore::new(dir.path());
        let m     = manifest();
        let model: Seq2Seq<TestBackend> = m.model.init(&Default::default());
        store.save(&model, &m).unwrap();

        let wider = m.model.clone().with_decoder_layers(2);
        let err = store.load::<TestBackend>(&Default::default(), Some(&wider)).err().unwrap();
        assert!(matches!(err, NmtError::IncompatibleModel(_)));
    }

    #[test]
    fn test_vocabulary_size_mismatch_is_incompatible() {
        let dir   = TempDir::new("model_store").unwrap();
        let store = ModelStore::new(dir.path());
        let m     = manifest();
        let model: Seq2Seq<TestBackend> = m.model.init(&Default::default());
        store.save(&model, &m).unwrap();

        let mut edited = m.clone();
        edited.target_vocab = vocab(&["hello"]);
        fs::write(
            dir.path().join("manifest.json"),
            serde_json::to_string(&edited).unwrap(),
        )
        .unwrap();

        let err = store.load::<TestBackend>(&Default::default(), None).err().unwrap();
        assert!(matches!(err, NmtError::IncompatibleModel(_)));
    }

    #[test]
    fn test_unknown_format_is_incompatible() {
        let mut m = manifest();
        m.format = "something-else/9".to_string();
        assert!(matches!(m.check(None), Err(NmtError::IncompatibleModel(_))));
    }
}
