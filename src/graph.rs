//! Local disease classifier backed by a frozen TensorFlow graph.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb};
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

use crate::error::{Result, ServiceError};
use crate::model::{ClassificationResult, Classifier};

// ViT input resolution.
const INPUT_SIZE: u32 = 224;
const INPUT_OP: &str = "x";
const OUTPUT_OP: &str = "Identity";

struct GraphSession {
    session: Session,
    graph: Graph,
}

pub struct GraphClassifier {
    inner: Arc<Mutex<GraphSession>>,
    labels: Arc<Vec<String>>,
}

impl GraphClassifier {
    pub async fn load(model_path: &Path, labels_path: &Path) -> Result<Self> {
        let model_bytes = tokio::fs::read(model_path).await?;
        let labels: Vec<String> = tokio::fs::read_to_string(labels_path)
            .await?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if labels.is_empty() {
            return Err(ServiceError::Config(format!(
                "class list {} is empty",
                labels_path.display()
            )));
        }

        let mut graph = Graph::new();
        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(|e| ServiceError::Config(format!("failed to import graph: {e}")))?;
        let session = Session::new(&SessionOptions::new(), &graph)
            .map_err(|e| ServiceError::Config(format!("failed to create session: {e}")))?;

        tracing::info!(
            model = %model_path.display(),
            classes = labels.len(),
            "loaded frozen graph"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(GraphSession { session, graph })),
            labels: Arc::new(labels),
        })
    }
}

#[async_trait]
impl Classifier for GraphClassifier {
    async fn classify(&self, image: DynamicImage) -> Result<ClassificationResult> {
        let inner = Arc::clone(&self.inner);
        let labels = Arc::clone(&self.labels);

        tokio::task::spawn_blocking(move || {
            let input = preprocess_image(&image);
            let guard = inner
                .lock()
                .map_err(|_| ServiceError::Internal("graph session poisoned".into()))?;
            let outputs = run_graph(&guard, &input)?;
            drop(guard);

            let probabilities = to_probabilities(outputs);
            let (index, confidence) = argmax(&probabilities)
                .ok_or_else(|| ServiceError::Inference("graph produced no output".into()))?;
            let label = labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            Ok(ClassificationResult::new(label, confidence))
        })
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
    }
}

fn run_graph(inner: &GraphSession, input: &Tensor<f32>) -> Result<Vec<f32>> {
    let inference = |e: tensorflow::Status| ServiceError::Inference(e.to_string());

    let input_op = inner
        .graph
        .operation_by_name_required(INPUT_OP)
        .map_err(inference)?;
    let output_op = inner
        .graph
        .operation_by_name_required(OUTPUT_OP)
        .map_err(inference)?;

    let mut args = SessionRunArgs::new();
    args.add_feed(&input_op, 0, input);
    let token = args.request_fetch(&output_op, 0);
    inner.session.run(&mut args).map_err(inference)?;
    let output: Tensor<f32> = args.fetch(token).map_err(inference)?;
    Ok(output.to_vec())
}

/// Letterboxes the image into an `INPUT_SIZE` square and scales pixels to [-1, 1].
fn preprocess_image(image: &DynamicImage) -> Tensor<f32> {
    let padded = pad_to_square(&image.resize(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3));

    let mut flat = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
    for pixel in padded.pixels() {
        for channel in pixel.0 {
            flat.push(channel as f32 / 127.5 - 1.0);
        }
    }

    let mut tensor = Tensor::new(&[1, INPUT_SIZE as u64, INPUT_SIZE as u64, 3]);
    tensor.copy_from_slice(&flat);
    tensor
}

fn pad_to_square(image: &DynamicImage) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    let (width, height) = image.dimensions();
    // Black background.
    let mut output = ImageBuffer::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([0, 0, 0]));

    let x_offset = INPUT_SIZE.saturating_sub(width) / 2;
    let y_offset = INPUT_SIZE.saturating_sub(height) / 2;
    image::imageops::overlay(&mut output, &image.to_rgb8(), x_offset as i64, y_offset as i64);

    output
}

/// Graphs exported with a softmax head already emit probabilities; anything
/// else is treated as logits.
fn to_probabilities(outputs: Vec<f32>) -> Vec<f32> {
    let sum: f32 = outputs.iter().sum();
    let is_distribution =
        outputs.iter().all(|p| (0.0..=1.0).contains(p)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        outputs
    } else {
        softmax(&outputs)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn probabilities_pass_through_unchanged() {
        let probs = vec![0.1, 0.85, 0.05];
        assert_eq!(to_probabilities(probs.clone()), probs);
    }

    #[test]
    fn logits_are_normalized() {
        let probs = to_probabilities(vec![4.0, -1.0, 0.5]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[0] > 0.9);
    }

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn pads_wide_images() {
        let wide = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            INPUT_SIZE,
            INPUT_SIZE / 2,
            Rgb([255, 255, 255]),
        ));
        let padded = pad_to_square(&wide);
        assert_eq!(padded.dimensions(), (INPUT_SIZE, INPUT_SIZE));
        assert_eq!(padded.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(padded.get_pixel(0, INPUT_SIZE / 2), &Rgb([255, 255, 255]));
    }
}
