//! Recurrent comment classifier.
//!
//! Frozen pretrained embedding, spatial dropout, a bidirectional GRU and a
//! bidirectional LSTM over the whole sequence, global max and average
//! pooling, two residual ReLU blocks and a single-logit output.

use candle_core::{DType, Module, Result, Tensor};
use candle_nn::rnn::{GRU, GRUConfig, LSTM, LSTMConfig, RNN, gru, lstm};
use candle_nn::{Embedding, Linear, VarBuilder, linear};
use serde::{Deserialize, Serialize};

/// Shape of the network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    pub num_words: usize,
    pub embedding_dim: usize,
    pub units: usize,
    pub spatial_dropout: f32,
}

impl NetConfig {
    /// Width of the pooled representation: max and mean of `2 * units`.
    pub fn hidden_size(&self) -> usize {
        4 * self.units
    }
}

/// Reverse a `(batch, time, features)` tensor along the time axis.
fn reverse_time(xs: &Tensor) -> Result<Tensor> {
    let len = xs.dim(1)?;
    let idx: Vec<u32> = (0..len as u32).rev().collect();
    let idx = Tensor::new(idx.as_slice(), xs.device())?;
    xs.index_select(&idx, 1)
}

/// Two recurrent layers reading the sequence in opposite directions; their
/// per-step outputs are concatenated.
#[derive(Debug, Clone)]
pub struct Bidirectional<R: RNN> {
    forward: R,
    backward: R,
}

impl<R: RNN> Bidirectional<R> {
    pub fn new(forward: R, backward: R) -> Self {
        Self { forward, backward }
    }

    /// `(batch, time, in)` -> `(batch, time, 2 * hidden)`
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, time, _) = xs.dims3()?;
        // states_to_tensor concatenates the per-step states into (batch, time * hidden)
        let fwd = self
            .forward
            .states_to_tensor(&self.forward.seq(xs)?)?
            .reshape((batch, time, ()))?;
        let reversed = reverse_time(xs)?;
        let bwd = self
            .backward
            .states_to_tensor(&self.backward.seq(&reversed)?)?
            .reshape((batch, time, ()))?;
        let bwd = reverse_time(&bwd)?;
        Tensor::cat(&[&fwd, &bwd], 2)
    }
}

/// Zero whole embedding channels per sample during training.
pub fn spatial_dropout(xs: &Tensor, p: f32) -> Result<Tensor> {
    if p <= 0.0 {
        return Ok(xs.clone());
    }
    let (batch, _, channels) = xs.dims3()?;
    let keep = Tensor::rand(0f32, 1f32, (batch, 1, channels), xs.device())?
        .ge(p)?
        .to_dtype(xs.dtype())?
        .affine(1.0 / (1.0 - p as f64), 0.0)?;
    xs.broadcast_mul(&keep)
}

/// The BiGRU/BiLSTM classifier.
#[derive(Debug, Clone)]
pub struct CommentNet {
    config: NetConfig,
    embedding: Embedding,
    gru: Bidirectional<GRU>,
    lstm: Bidirectional<LSTM>,
    dense1: Linear,
    dense2: Linear,
    output: Linear,
}

impl CommentNet {
    /// Build the network around a frozen `(num_words, embedding_dim)` matrix.
    /// Trainable weights are created through `vb`.
    pub fn new(config: NetConfig, embeddings: Tensor, vb: VarBuilder) -> Result<Self> {
        let (rows, dim) = embeddings.dims2()?;
        if rows != config.num_words || dim != config.embedding_dim {
            candle_core::bail!(
                "embedding matrix is {}x{}, expected {}x{}",
                rows,
                dim,
                config.num_words,
                config.embedding_dim
            );
        }
        let embedding = Embedding::new(embeddings.to_dtype(DType::F32)?, dim);
        let units = config.units;

        let gru = Bidirectional::new(
            gru(dim, units, GRUConfig::default(), vb.pp("gru").pp("forward"))?,
            gru(dim, units, GRUConfig::default(), vb.pp("gru").pp("backward"))?,
        );
        let lstm = Bidirectional::new(
            lstm(2 * units, units, LSTMConfig::default(), vb.pp("lstm").pp("forward"))?,
            lstm(2 * units, units, LSTMConfig::default(), vb.pp("lstm").pp("backward"))?,
        );

        let hidden = config.hidden_size();
        Ok(Self {
            config,
            embedding,
            gru,
            lstm,
            dense1: linear(hidden, hidden, vb.pp("dense1"))?,
            dense2: linear(hidden, hidden, vb.pp("dense2"))?,
            output: linear(hidden, 1, vb.pp("output"))?,
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Logits of shape `(batch,)` for `(batch, time)` u32 word indices.
    pub fn forward_t(&self, ids: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = self.embedding.forward(ids)?;
        if train {
            xs = spatial_dropout(&xs, self.config.spatial_dropout)?;
        }
        let xs = self.gru.forward(&xs)?;
        let xs = self.lstm.forward(&xs)?;

        let pooled = Tensor::cat(&[&xs.max(1)?, &xs.mean(1)?], 1)?;
        let hidden = pooled.add(&self.dense1.forward(&pooled)?.relu()?)?;
        let hidden = hidden.add(&self.dense2.forward(&hidden)?.relu()?)?;
        self.output.forward(&hidden)?.squeeze(1)
    }

    /// Positive-class probabilities of shape `(batch,)`.
    pub fn predict_proba(&self, ids: &Tensor) -> Result<Tensor> {
        candle_nn::ops::sigmoid(&self.forward_t(ids, false)?)
    }
}

/// Mean binary cross-entropy computed from logits:
/// `max(x, 0) - x * y + log(1 + exp(-|x|))`.
pub fn binary_cross_entropy_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    logits
        .relu()?
        .sub(&logits.mul(targets)?)?
        .add(&softplus)?
        .mean_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    fn tiny_net(varmap: &VarMap) -> CommentNet {
        let device = Device::Cpu;
        let config = NetConfig {
            num_words: 10,
            embedding_dim: 4,
            units: 3,
            spatial_dropout: 0.2,
        };
        let embeddings = Tensor::randn(0f32, 1f32, (10, 4), &device).unwrap();
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &device);
        CommentNet::new(config, embeddings, vb).unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let varmap = VarMap::new();
        let net = tiny_net(&varmap);
        let ids = Tensor::new(&[[0u32, 0, 1, 2, 3], [4, 5, 6, 7, 9]], &Device::Cpu).unwrap();

        let logits = net.forward_t(&ids, true).unwrap();
        assert_eq!(logits.dims(), &[2]);

        let probs = net.predict_proba(&ids).unwrap().to_vec1::<f32>().unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_bidirectional_output_shapes() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let xs = Tensor::randn(0f32, 1f32, (2, 5, 4), &device).unwrap();

        let bigru = Bidirectional::new(
            gru(4, 3, GRUConfig::default(), vb.pp("gf")).unwrap(),
            gru(4, 3, GRUConfig::default(), vb.pp("gb")).unwrap(),
        );
        let hs = bigru.forward(&xs).unwrap();
        assert_eq!(hs.dims(), &[2, 5, 6]);

        let bilstm = Bidirectional::new(
            lstm(6, 3, LSTMConfig::default(), vb.pp("lf")).unwrap(),
            lstm(6, 3, LSTMConfig::default(), vb.pp("lb")).unwrap(),
        );
        assert_eq!(bilstm.forward(&hs).unwrap().dims(), &[2, 5, 6]);
    }

    #[test]
    fn test_embedding_is_not_trainable() {
        let varmap = VarMap::new();
        let _net = tiny_net(&varmap);
        let names: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        assert!(names.iter().any(|n| n.starts_with("gru.forward")));
        assert!(names.iter().any(|n| n.starts_with("lstm.backward")));
        assert!(names.iter().all(|n| !n.contains("embedding")));
    }

    #[test]
    fn test_wrong_embedding_shape_rejected() {
        let varmap = VarMap::new();
        let device = Device::Cpu;
        let config = NetConfig {
            num_words: 10,
            embedding_dim: 4,
            units: 2,
            spatial_dropout: 0.0,
        };
        let embeddings = Tensor::zeros((9, 4), DType::F32, &device).unwrap();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        assert!(CommentNet::new(config, embeddings, vb).is_err());
    }

    #[test]
    fn test_reverse_time() {
        let xs = Tensor::new(&[[[1f32], [2.], [3.]]], &Device::Cpu).unwrap();
        let rev = reverse_time(&xs).unwrap();
        assert_eq!(rev.flatten_all().unwrap().to_vec1::<f32>().unwrap(), vec![3., 2., 1.]);
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[0f32, 2.0, -3.0], &device).unwrap();
        let targets = Tensor::new(&[1f32, 0.0, 0.0], &device).unwrap();
        let loss = binary_cross_entropy_with_logits(&logits, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();

        let expected = [(0f32, 1f32), (2.0, 0.0), (-3.0, 0.0)]
            .iter()
            .map(|&(x, y)| {
                let p = 1.0 / (1.0 + (-x).exp());
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f32>()
            / 3.0;
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_spatial_dropout_zeroes_channels() {
        let xs = Tensor::ones((2, 5, 8), DType::F32, &Device::Cpu).unwrap();
        let out = spatial_dropout(&xs, 0.5).unwrap();
        let values = out.to_vec3::<f32>().unwrap();
        for sample in &values {
            for channel in 0..8 {
                // a channel is dropped or kept for every time step
                let first = sample[0][channel];
                assert!(first == 0.0 || (first - 2.0).abs() < 1e-6);
                assert!(sample.iter().all(|step| step[channel] == first));
            }
        }
    }
}
