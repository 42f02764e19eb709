//! Classifier interface and prediction reporting
//!
//! The network itself lives outside this workspace. Anything that maps a
//! [`Batch`] to per-grid class probabilities can be plugged in through the
//! [`Classifier`] trait.

use crate::batch::Batch;
use std::cmp::Ordering;
use voxcrate_core::{Error, LabelDictionary, Result, SampleRecord};

/// An external voxel classifier
pub trait Classifier {
    /// Number of classes the probabilities range over
    fn num_classes(&self) -> usize;

    /// One prediction per grid in the batch, in batch order
    fn predict(&self, batch: &Batch) -> Result<Vec<Prediction>>;
}

/// Classifier output for one grid
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Most probable class id
    pub class: u32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from a probability vector indexed by class id
    ///
    /// Ties resolve to the lowest class id.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(Error::InvalidData("empty probability vector".to_string()));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(Error::InvalidData("non-finite class probability".to_string()));
        }

        let mut class = 0;
        for (id, &p) in probabilities.iter().enumerate() {
            if p > probabilities[class] {
                class = id;
            }
        }

        Ok(Self {
            class: class as u32,
            probabilities,
        })
    }

    /// Probability assigned to the predicted class
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.class as usize).copied().unwrap_or(0.0)
    }

    /// The `k` most probable `(class, probability)` pairs, best first
    pub fn top_k(&self, k: usize) -> Vec<(u32, f32)> {
        let mut ranked: Vec<(u32, f32)> = self
            .probabilities
            .iter()
            .enumerate()
            .map(|(id, &p)| (id as u32, p))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}

/// `predicted class: <id>-<name>, ground truth: <id>-<name>`
pub fn report_line(prediction: &Prediction, truth: u32, labels: &LabelDictionary) -> Result<String> {
    Ok(format!(
        "predicted class: {}, ground truth: {}",
        labels.label_for_id(prediction.class)?,
        labels.label_for_id(truth)?
    ))
}

/// Run a classifier over batches, pairing each prediction with its record
pub fn predict_all<C, I>(classifier: &C, batches: I) -> Result<Vec<(SampleRecord, Prediction)>>
where
    C: Classifier + ?Sized,
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut results = Vec::new();
    for batch in batches {
        let batch = batch?;
        let predictions = classifier.predict(&batch)?;
        if predictions.len() != batch.len() {
            return Err(Error::InvalidData(format!(
                "classifier returned {} predictions for a batch of {}",
                predictions.len(),
                batch.len()
            )));
        }
        results.extend(batch.records.into_iter().zip(predictions));
    }
    Ok(results)
}

/// Baseline that always predicts the class frequencies of its training labels
///
/// Useful as a stand-in when exercising the batching and reporting path
/// without a trained network.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorClassifier {
    prior: Vec<f32>,
}

impl PriorClassifier {
    pub fn fit(labels: &[u32], num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(Error::InvalidConfig("classifier needs at least one class".to_string()));
        }
        let mut counts = vec![0usize; num_classes];
        for &label in labels {
            let slot = counts
                .get_mut(label as usize)
                .ok_or_else(|| Error::UnknownLabel(format!("class id {} outside 0..{}", label, num_classes)))?;
            *slot += 1;
        }

        let prior = if labels.is_empty() {
            vec![1.0 / num_classes as f32; num_classes]
        } else {
            counts.iter().map(|&c| c as f32 / labels.len() as f32).collect()
        };
        Ok(Self { prior })
    }

    pub fn prior(&self) -> &[f32] {
        &self.prior
    }
}

impl Classifier for PriorClassifier {
    fn num_classes(&self) -> usize {
        self.prior.len()
    }

    fn predict(&self, batch: &Batch) -> Result<Vec<Prediction>> {
        (0..batch.len())
            .map(|_| Prediction::from_probabilities(self.prior.clone()))
            .collect()
    }
}
