//! # Text Classifier
//!
//! Ties the tokenizer, the embedding matrix and [`CommentNet`] together:
//! fitting, probability prediction and persistence of a trained model.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use glossa_core::dataset::shuffle_with;
use glossa_core::{
    Dataset, EmbeddingMatrix, GloveTable, PaddedSequences, Padding, StopWords, Truncating,
    WordTokenizer, pad_sequences,
};
use oorandom::Rand32;
use tracing::{debug, info};

use crate::callbacks::{Action, Callback, EarlyStopping, ReduceLrOnPlateau};
use crate::config::{CONFIG_FILE, TrainConfig};
use crate::history::{EpochLogs, History};
use crate::model::{CommentNet, binary_cross_entropy_with_logits};

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const EMBEDDING_FILE: &str = "embedding.safetensors";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const HISTORY_JSON_FILE: &str = "history.json";
pub const HISTORY_CSV_FILE: &str = "history.csv";
pub const SUMMARY_FILE: &str = "summary.txt";

/// Loss and accuracy over a whole split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
}

/// Binary comment classifier.
pub struct TextClassifier {
    config: TrainConfig,
    device: Device,
    varmap: VarMap,
    tokenizer: Option<WordTokenizer>,
    embedding: Option<EmbeddingMatrix>,
    net: Option<CommentNet>,
    history: Option<History>,
}

impl TextClassifier {
    /// Create an untrained classifier.
    pub fn new(config: TrainConfig, device: Device) -> Self {
        Self {
            config,
            device,
            varmap: VarMap::new(),
            tokenizer: None,
            embedding: None,
            net: None,
            history: None,
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> Option<&WordTokenizer> {
        self.tokenizer.as_ref()
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    fn vectorize(&self, tokenizer: &WordTokenizer, texts: &[&str]) -> anyhow::Result<PaddedSequences> {
        let sequences = tokenizer.texts_to_sequences(texts);
        Ok(pad_sequences(
            &sequences,
            self.config.sequence_length,
            Padding::Pre,
            Truncating::Pre,
            0,
        )?)
    }

    fn build_embedding(&self, tokenizer: &WordTokenizer) -> anyhow::Result<EmbeddingMatrix> {
        let cfg = &self.config;
        match &cfg.glove_path {
            Some(path) => {
                let table = GloveTable::load_cached(path, cfg.embedding_dim, &cfg.cache_path)
                    .with_context(|| format!("loading embeddings from {}", path.display()))?;
                let (matrix, _coverage) =
                    EmbeddingMatrix::from_glove(tokenizer, &table, cfg.num_words, cfg.seed);
                Ok(matrix)
            }
            None => {
                info!("No pretrained embeddings configured, using a random frozen embedding");
                Ok(EmbeddingMatrix::random_uniform(
                    cfg.num_words,
                    cfg.embedding_dim,
                    cfg.seed,
                ))
            }
        }
    }

    fn build_net(&self, embedding: &EmbeddingMatrix) -> anyhow::Result<CommentNet> {
        let vb = VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device);
        let net = CommentNet::new(
            self.config.net_config(),
            embedding.to_tensor(&self.device)?,
            vb,
        )?;
        Ok(net)
    }

    fn batch_tensors(
        &self,
        padded: &PaddedSequences,
        labels: &[f32],
        indices: &[usize],
    ) -> anyhow::Result<(Tensor, Tensor)> {
        let ids = Tensor::from_vec(
            padded.gather(indices),
            (indices.len(), padded.maxlen()),
            &self.device,
        )?;
        let targets: Vec<f32> = indices.iter().map(|&i| labels[i]).collect();
        let targets = Tensor::from_vec(targets, indices.len(), &self.device)?;
        Ok((ids, targets))
    }

    /// Fit the tokenizer and the network on `train`, reporting metrics on
    /// `validation` after every epoch.
    pub fn fit(
        &mut self,
        train: &Dataset,
        validation: &Dataset,
        stop_words: StopWords,
    ) -> anyhow::Result<&History> {
        self.config.validate()?;
        if train.is_empty() {
            bail!("training set is empty");
        }
        let cfg = self.config.clone();

        let mut tokenizer = WordTokenizer::new(cfg.tokenizer_config())?.with_stop_words(stop_words);
        tokenizer.fit_on_texts(train.texts());

        let x_train = self.vectorize(&tokenizer, &train.texts())?;
        let y_train = train.labels();
        let x_val = self.vectorize(&tokenizer, &validation.texts())?;
        let y_val = validation.labels();

        let embedding = self.build_embedding(&tokenizer)?;
        self.varmap = VarMap::new();
        let net = self.build_net(&embedding)?;
        info!("Training model\n{}", self.summary());

        let params = ParamsAdamW {
            lr: cfg.learning_rate,
            eps: 1e-7,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(self.varmap.all_vars(), params)?;

        let mut callbacks: Vec<Box<dyn Callback>> = vec![
            Box::new(EarlyStopping::new(cfg.early_stopping_patience, 0.0)),
            Box::new(ReduceLrOnPlateau::new(
                cfg.reduce_lr_factor,
                cfg.reduce_lr_patience,
                cfg.min_learning_rate,
            )),
        ];

        let mut rng = Rand32::new(cfg.seed);
        let mut order: Vec<usize> = (0..x_train.rows()).collect();
        let mut history = History::new();

        for epoch in 1..=cfg.epochs {
            shuffle_with(&mut order, &mut rng);
            let lr = optimizer.learning_rate();

            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;
            for (step, batch) in order.chunks(cfg.batch_size).enumerate() {
                let (ids, targets) = self.batch_tensors(&x_train, &y_train, batch)?;
                let logits = net.forward_t(&ids, true)?;
                let loss = binary_cross_entropy_with_logits(&logits, &targets)?;
                optimizer.backward_step(&loss)?;

                let batch_loss = loss.to_scalar::<f32>()?;
                loss_sum += f64::from(batch_loss) * batch.len() as f64;
                correct += count_correct(&logits.to_vec1::<f32>()?, &targets.to_vec1::<f32>()?);
                debug!(
                    "Epoch {}/{}, step {}, loss {:.4}",
                    epoch,
                    cfg.epochs,
                    step + 1,
                    batch_loss
                );
            }

            let n = x_train.rows() as f64;
            let val = if x_val.is_empty() {
                None
            } else {
                Some(self.evaluate_padded(&net, &x_val, &y_val)?)
            };
            let logs = EpochLogs {
                epoch,
                loss: (loss_sum / n) as f32,
                binary_accuracy: (correct as f64 / n) as f32,
                val_loss: val.map(|v| v.loss),
                val_binary_accuracy: val.map(|v| v.accuracy),
                lr,
            };
            match (logs.val_loss, logs.val_binary_accuracy) {
                (Some(val_loss), Some(val_acc)) => info!(
                    "Epoch {}/{} - loss: {:.4} - binary_accuracy: {:.4} - val_loss: {:.4} - val_binary_accuracy: {:.4}",
                    epoch, cfg.epochs, logs.loss, logs.binary_accuracy, val_loss, val_acc
                ),
                _ => info!(
                    "Epoch {}/{} - loss: {:.4} - binary_accuracy: {:.4}",
                    epoch, cfg.epochs, logs.loss, logs.binary_accuracy
                ),
            }

            let mut stop = false;
            for callback in callbacks.iter_mut() {
                match callback.on_epoch_end(&logs, optimizer.learning_rate()) {
                    Action::Continue => {}
                    Action::Stop => {
                        info!("Epoch {}: {} stopped training", epoch, callback.name());
                        stop = true;
                    }
                    Action::SetLearningRate(new_lr) => {
                        info!(
                            "Epoch {}: {} set learning rate to {:e}",
                            epoch,
                            callback.name(),
                            new_lr
                        );
                        optimizer.set_learning_rate(new_lr);
                    }
                }
            }
            history.push(logs);
            if stop {
                break;
            }
        }

        self.tokenizer = Some(tokenizer);
        self.embedding = Some(embedding);
        self.net = Some(net);
        Ok(self.history.insert(history))
    }

    fn evaluate_padded(
        &self,
        net: &CommentNet,
        padded: &PaddedSequences,
        labels: &[f32],
    ) -> anyhow::Result<Evaluation> {
        let indices: Vec<usize> = (0..padded.rows()).collect();
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        for batch in indices.chunks(self.config.batch_size) {
            let (ids, targets) = self.batch_tensors(padded, labels, batch)?;
            let logits = net.forward_t(&ids, false)?;
            let loss = binary_cross_entropy_with_logits(&logits, &targets)?.to_scalar::<f32>()?;
            loss_sum += f64::from(loss) * batch.len() as f64;
            correct += count_correct(&logits.to_vec1::<f32>()?, &targets.to_vec1::<f32>()?);
        }
        let n = padded.rows().max(1) as f64;
        Ok(Evaluation {
            loss: (loss_sum / n) as f32,
            accuracy: (correct as f64 / n) as f32,
        })
    }

    /// Loss and accuracy of the trained model on `dataset`.
    pub fn evaluate(&self, dataset: &Dataset) -> anyhow::Result<Evaluation> {
        let (tokenizer, net) = self.parts()?;
        let padded = self.vectorize(tokenizer, &dataset.texts())?;
        self.evaluate_padded(net, &padded, &dataset.labels())
    }

    fn parts(&self) -> anyhow::Result<(&WordTokenizer, &CommentNet)> {
        match (&self.tokenizer, &self.net) {
            (Some(tokenizer), Some(net)) => Ok((tokenizer, net)),
            _ => Err(glossa_core::GlossaError::NotFitted("classifier").into()),
        }
    }

    /// Probability of the positive class for every text.
    pub fn predict_proba<S: AsRef<str>>(
        &self,
        texts: &[S],
        batch_size: Option<usize>,
    ) -> anyhow::Result<Vec<f32>> {
        let (tokenizer, net) = self.parts()?;
        let texts: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
        let padded = self.vectorize(tokenizer, &texts)?;
        let batch_size = batch_size.unwrap_or(self.config.batch_size).max(1);

        let mut probs = Vec::with_capacity(padded.rows());
        let indices: Vec<usize> = (0..padded.rows()).collect();
        for batch in indices.chunks(batch_size) {
            let ids = Tensor::from_vec(
                padded.gather(batch),
                (batch.len(), padded.maxlen()),
                &self.device,
            )?;
            probs.extend(net.predict_proba(&ids)?.to_vec1::<f32>()?);
        }
        Ok(probs)
    }

    /// Layer parameter listing.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let mut total = 0usize;
        if let Ok(data) = self.varmap.data().lock() {
            let mut vars: Vec<_> = data.iter().collect();
            vars.sort_by(|a, b| a.0.cmp(b.0));
            for (name, var) in vars {
                let count = var.elem_count();
                total += count;
                lines.push(format!("{:<32} {:<16} {}", name, format!("{:?}", var.dims()), count));
            }
        }
        let frozen = self
            .embedding
            .as_ref()
            .map(|e| e.rows() * e.dim())
            .unwrap_or(self.config.num_words * self.config.embedding_dim);
        lines.push(format!(
            "{:<32} {:<16} {}",
            "embedding (frozen)",
            format!("[{}, {}]", self.config.num_words, self.config.embedding_dim),
            frozen
        ));
        lines.push(format!("Trainable params: {total}"));
        lines.push(format!("Non-trainable params: {frozen}"));
        lines.join("\n")
    }

    /// Write the trained model to `models_root/lstm_{loss}_{acc}`.
    ///
    /// Returns `None` without touching the filesystem when nothing has been
    /// trained yet.
    pub fn save<P: AsRef<Path>>(&self, models_root: P) -> anyhow::Result<Option<PathBuf>> {
        let Some(history) = self.history.as_ref() else {
            return Ok(None);
        };
        let Some(name) = history.model_dir_name() else {
            return Ok(None);
        };
        let dir = models_root.as_ref().join(name);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        info!("Saving model statistics");
        history.write_json(dir.join(HISTORY_JSON_FILE))?;
        history.write_csv(dir.join(HISTORY_CSV_FILE))?;
        fs::write(dir.join(SUMMARY_FILE), self.summary())?;

        if self.net.is_some() {
            info!("Saving model");
            self.varmap.save(dir.join(WEIGHTS_FILE))?;
            if let Some(embedding) = &self.embedding {
                embedding.save(dir.join(EMBEDDING_FILE))?;
            }
            self.config.save(dir.join(CONFIG_FILE))?;
        }
        if let Some(tokenizer) = &self.tokenizer {
            info!("Saving tokenizer");
            tokenizer.save(dir.join(TOKENIZER_FILE))?;
        }

        info!("Model saved to {}", dir.display());
        Ok(Some(dir))
    }

    /// Restore a classifier written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(model_dir: P, device: Device) -> anyhow::Result<Self> {
        let dir = model_dir.as_ref();
        if !dir.is_dir() {
            bail!("model directory not found: {}", dir.display());
        }

        let config = TrainConfig::load(dir.join(CONFIG_FILE))?;
        let tokenizer = WordTokenizer::load(dir.join(TOKENIZER_FILE))
            .with_context(|| format!("loading tokenizer from {}", dir.display()))?;
        let embedding = EmbeddingMatrix::load(dir.join(EMBEDDING_FILE))?;
        if embedding.rows() != config.num_words || embedding.dim() != config.embedding_dim {
            return Err(anyhow!(
                "embedding is {}x{} but the configuration expects {}x{}",
                embedding.rows(),
                embedding.dim(),
                config.num_words,
                config.embedding_dim
            ));
        }

        let mut classifier = Self::new(config, device);
        let net = classifier.build_net(&embedding)?;
        classifier
            .varmap
            .load(dir.join(WEIGHTS_FILE))
            .with_context(|| format!("loading weights from {}", dir.display()))?;

        let history_path = dir.join(HISTORY_JSON_FILE);
        if history_path.exists() {
            classifier.history = Some(History::read_json(history_path)?);
        }
        classifier.tokenizer = Some(tokenizer);
        classifier.embedding = Some(embedding);
        classifier.net = Some(net);
        info!("Loaded model from {}", dir.display());
        Ok(classifier)
    }
}

/// Predictions `logit > 0` (probability above 0.5) matching the target class.
fn count_correct(logits: &[f32], targets: &[f32]) -> usize {
    logits
        .iter()
        .zip(targets)
        .filter(|&(&logit, &target)| (logit > 0.0) == (target >= 0.5))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_correct() {
        assert_eq!(count_correct(&[1.0, -1.0, 0.0, 2.0], &[1.0, 0.0, 1.0, 0.0]), 2);
    }

    #[test]
    fn test_untrained_classifier() {
        let classifier = TextClassifier::new(TrainConfig::default(), Device::Cpu);
        assert!(classifier.predict_proba(&["hello"], None).is_err());

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(classifier.save(dir.path()).unwrap(), None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_load_missing_directory() {
        assert!(TextClassifier::load("/nonexistent/lstm_0.1_0.9", Device::Cpu).is_err());
    }
}
