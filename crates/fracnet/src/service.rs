//! Lazily built, shared classifier.

use std::sync::OnceLock;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use fracnet_models::{Classifier, ClassifierConfig, WeightsConfig};

use crate::error::Result;

/// A classifier built on first use and handed out by reference afterwards.
///
/// Construction happens at most once per handle: the first successful
/// [`get`](Self::get) loads the weights, later calls return the same
/// instance. A failed build leaves the handle empty, so the next call
/// retries and reports the error again.
#[derive(Debug)]
pub struct SharedClassifier<B: AutodiffBackend> {
    config: ClassifierConfig,
    weights: WeightsConfig,
    device: B::Device,
    cell: OnceLock<Classifier<B>>,
}

impl<B: AutodiffBackend> SharedClassifier<B> {
    /// Create an empty handle. Nothing is built until [`get`](Self::get).
    pub fn new(config: ClassifierConfig, weights: WeightsConfig, device: B::Device) -> Self {
        Self {
            config,
            weights,
            device,
            cell: OnceLock::new(),
        }
    }

    /// Return the classifier, building it on first use.
    pub fn get(&self) -> Result<&Classifier<B>> {
        if let Some(classifier) = self.cell.get() {
            return Ok(classifier);
        }

        let start = Instant::now();
        let classifier = Classifier::build(&self.config, &self.weights, &self.device)?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            source = ?classifier.weight_source(),
            "Classifier ready"
        );

        Ok(self.cell.get_or_init(|| classifier))
    }

    /// Whether the classifier has been built.
    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The device the classifier runs on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The configured topology.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}
