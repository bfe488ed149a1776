// ============================================================
// Layer 2: TranslateUseCase
// ============================================================
// Loads a trained model artifact once and translates sentences:
//
//   Step 1: Load manifest + weights        (Layer 6 - infra)
//   Step 2: Resolve search options         (beam width, length bound)
//   Step 3: Clean, tokenise and translate  (Layer 4 + Layer 5)
//
// The length bound defaults to the max target length the model
// was trained with.

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Wgpu},
    prelude::*,
};

use crate::domain::traits::SentenceTranslator;
use crate::infra::model_store::{LoadedModel, ModelStore};
use crate::ml::{
    inferencer::{Translation, Translator},
    search::SearchConfig,
};

/// Search options chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    pub beam_width:     usize,
    /// None uses the trained max target length.
    pub max_target_len: Option<usize>,
    pub with_scores:    bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self { beam_width: 3, max_target_len: None, with_scores: false }
    }
}

pub struct TranslateUseCase<B: Backend> {
    translator: Translator<B>,
    search:     SearchConfig,
}

impl TranslateUseCase<Wgpu> {
    /// Load `model_dir` onto the default WGPU device.
    pub fn new(model_dir: &str, options: TranslateOptions) -> Result<Self> {
        Self::with_device(model_dir, options, WgpuDevice::default())
    }
}

impl<B: Backend> TranslateUseCase<B> {
    pub fn with_device(model_dir: &str, options: TranslateOptions, device: B::Device) -> Result<Self> {
        let LoadedModel { model, manifest } = ModelStore::new(model_dir)
            .load::<B>(&device, None)
            .with_context(|| format!("Cannot load model from '{model_dir}'. Have you run 'train' first?"))?;

        let search = SearchConfig {
            beam_width:     options.beam_width,
            max_target_len: options.max_target_len.unwrap_or(manifest.max_target_len),
            with_scores:    options.with_scores,
        };
        search.validate()?;

        let translator = Translator::new(
            model,
            manifest.source_vocab,
            manifest.target_vocab,
            manifest.max_source_len,
            device,
        );
        Ok(Self { translator, search })
    }

    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    pub fn translate(&self, sentence: &str) -> Result<Translation> {
        Ok(self.translator.translate_text(sentence, &self.search)?)
    }
}

impl<B: Backend> SentenceTranslator for TranslateUseCase<B> {
    fn translate_tokens(&self, tokens: &[String]) -> crate::error::Result<Vec<String>> {
        Ok(self.translator.translate(tokens, &self.search)?.tokens)
    }
}
