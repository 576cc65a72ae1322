// Sentence embeddings for article texts using all-MiniLM-L6-v2.
//
// Each article's representative text is embedded into a 384-dimensional
// vector. Articles about the same story land close together even when the
// outlets word their headlines differently, which is what the clusterer
// and the topic map rely on.
//
// The model runs locally via ONNX. Token embeddings are mean-pooled over
// the attention mask and then L2-normalized, matching the
// sentence-transformers pipeline the model was published with.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::error::{check_dimensions, TopicError};
use super::traits::{ensure_non_blank, Embedder};

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Texts per inference call. Pooling is per-row, so the chunk size never
/// changes the resulting vectors.
const BATCH_SIZE: usize = 32;

/// all-MiniLM-L6-v2 was trained with a 256 word-piece window.
const MAX_TOKENS: usize = 256;

static SHARED: OnceCell<Arc<SentenceEmbedder>> = OnceCell::new();

/// Process-wide embedder, loaded on first use and shared read-only after.
///
/// The directory passed on the first successful call wins; later calls get
/// the already-loaded model. A failed load is not cached, so a caller can
/// run `download-model` and try again in the same process.
pub fn shared_embedder(model_dir: &Path) -> Result<Arc<SentenceEmbedder>, TopicError> {
    SHARED
        .get_or_try_init(|| {
            SentenceEmbedder::load(model_dir)
                .map(Arc::new)
                .map_err(|e| TopicError::EmbeddingUnavailable(format!("{e:#}")))
        })
        .cloned()
}

/// Local ONNX sentence embedder.
///
/// `ort::Session::run` takes `&mut self`, hence the Mutex; the Arcs let the
/// blocking inference task own handles to both halves.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load the model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Call `download_model()` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `newsprism download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `newsprism download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        info!(
            model_dir = %model_dir.display(),
            "Loaded sentence embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl Embedder for SentenceEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        ensure_non_blank(texts)?;

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f64>>> {
            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(BATCH_SIZE) {
                out.extend(embed_sync(&session, &tokenizer, chunk)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| TopicError::EmbeddingUnavailable(format!("inference task failed: {e}")))?
        .map_err(|e| TopicError::EmbeddingUnavailable(format!("{e:#}")))?;

        check_model_output(&vectors)?;
        Ok(vectors)
    }
}

/// Every vector must have the model's fixed width; a different width means
/// the model directory holds some other network.
fn check_model_output(vectors: &[Vec<f64>]) -> Result<(), TopicError> {
    let dim = check_dimensions(vectors)?;
    if !vectors.is_empty() && dim != EMBEDDING_DIM {
        return Err(TopicError::DimensionMismatch {
            index: 0,
            expected: EMBEDDING_DIM,
            got: dim,
        });
    }
    Ok(())
}

/// Tokenize, run the model, and pool one chunk of texts.
fn embed_sync(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Arc<Tokenizer>,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings: Vec<_> = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        anyhow::bail!("Tokenizer produced no tokens for a batch of {batch_size} texts");
    }

    // input_ids pad with 0, attention_mask is 0 on padding, token_type_ids
    // are all zero for single-sentence input.
    let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);

    for enc in &encodings {
        let ids = enc.get_ids();
        let pad_len = max_len - ids.len();

        input_ids.extend(ids.iter().map(|&id| id as i64));
        input_ids.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
        attention_mask.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids.extend(std::iter::repeat_n(0i64, max_len));
    }

    let shape = [batch_size as i64, max_len as i64];
    let ids_tensor =
        Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
    let mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
        .context("Failed to create attention_mask tensor")?;
    let type_tensor = Tensor::from_array((shape, token_type_ids))
        .context("Failed to create token_type_ids tensor")?;

    // last_hidden_state: [batch, seq_len, dim]
    let hidden = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let dim = hidden.len() / (batch_size * max_len);
    if dim == 0 || dim * batch_size * max_len != hidden.len() {
        anyhow::bail!(
            "Unexpected embedding output size {} for batch {}x{}",
            hidden.len(),
            batch_size,
            max_len
        );
    }

    let vectors: Vec<Vec<f64>> = (0..batch_size)
        .map(|row| {
            let row_hidden = &hidden[row * max_len * dim..(row + 1) * max_len * dim];
            let row_mask = &attention_mask[row * max_len..(row + 1) * max_len];
            let mut pooled = mean_pool(row_hidden, row_mask, dim);
            l2_normalize(&mut pooled);
            pooled
        })
        .collect();

    debug!(batch_size, dim, "Computed sentence embeddings");

    Ok(vectors)
}

/// Average the token vectors of one row, counting only unmasked tokens.
pub fn mean_pool(hidden: &[f32], mask: &[i64], dim: usize) -> Vec<f64> {
    let mut sum = vec![0.0_f64; dim];
    let mut count = 0.0_f64;

    for (token, &m) in hidden.chunks(dim).zip(mask) {
        if m > 0 {
            count += 1.0;
            for (acc, &v) in sum.iter_mut().zip(token) {
                *acc += v as f64;
            }
        }
    }

    if count > 0.0 {
        for v in &mut sum {
            *v /= count;
        }
    }
    sum
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
