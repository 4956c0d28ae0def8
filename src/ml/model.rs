// ============================================================
// Layer 5 — Sequence-Classification Network
// ============================================================
// BERT-shaped encoder with a pooled classification head:
//
//   token + position embeddings → LayerNorm → dropout
//       │
//       ▼
//   N × EncoderBlock (post-LN self-attention + GELU FFN)
//       │
//       ▼
//   first token → pooler (tanh, or ReLU for DistilBERT) → dropout
//       │
//       ▼
//   classifier → logits [batch, num_labels]
//
// The parameter names line up with Hugging Face BERT-family
// checkpoints so infra::hf_weights can copy tensors across.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, relu},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TextClassifierConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
    pub num_labels:  usize,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    /// tanh pooler (BERT, RoBERTa); ReLU otherwise (DistilBERT pre-classifier)
    #[config(default = true)]
    pub pooler_tanh: bool,
}

impl TextClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextClassifier<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let embedding_norm     = self.layer_norm(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let pooler     = LinearConfig::new(self.d_model, self.d_model).init(device);
        let classifier = LinearConfig::new(self.d_model, self.num_labels).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TextClassifier {
            token_embedding, position_embedding, embedding_norm, layers,
            pooler, classifier, dropout,
            max_seq_len: self.max_seq_len,
            pooler_tanh: self.pooler_tanh,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.d_model)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = self.layer_norm(device);
        let norm2   = self.layer_norm(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true at padding positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input = MhaInput::self_attn(x.clone()).mask_pad(pad_mask);
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TextClassifier<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub pooler:             Linear<B>,
    pub classifier:         Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
    pub pooler_tanh:        bool,
}

pub struct ClassificationOutput<B: Backend> {
    /// Mean cross-entropy over the batch
    pub loss:   Tensor<B, 1>,
    /// Raw class scores, shape [batch, num_labels]
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> TextClassifier<B> {
    /// input_ids, attention_mask: [batch, seq_len] → logits: [batch, num_labels]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();
        // Positions past the embedding table are dropped.
        let seq_len = seq_len.min(self.max_seq_len);
        let input_ids      = input_ids.slice([0..batch_size, 0..seq_len]);
        let attention_mask = attention_mask.slice([0..batch_size, 0..seq_len]);
        let pad_mask = attention_mask.equal_elem(0);

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + pos_emb));
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }

        // First-token pooling.
        let [_, _, d_model] = x.dims();
        let first = x
            .slice([0..batch_size, 0..1, 0..d_model])
            .reshape([batch_size, d_model]);
        let pooled = self.pooler.forward(first);
        let pooled = if self.pooler_tanh { pooled.tanh() } else { relu(pooled) };

        self.classifier.forward(self.dropout.forward(pooled))
    }

    pub fn forward_classification(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let logits = self.forward(input_ids, attention_mask);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels);
        ClassificationOutput { loss, logits }
    }

    /// Stop gradients for everything except the pooler and classifier.
    pub fn freeze_encoder(self) -> Self {
        Self {
            token_embedding:    self.token_embedding.no_grad(),
            position_embedding: self.position_embedding.no_grad(),
            embedding_norm:     self.embedding_norm.no_grad(),
            layers:             self.layers.no_grad(),
            pooler:             self.pooler,
            classifier:         self.classifier,
            dropout:            self.dropout,
            max_seq_len:        self.max_seq_len,
            pooler_tanh:        self.pooler_tanh,
        }
    }
}
