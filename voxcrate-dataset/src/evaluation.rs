//! Classification metrics

use ndarray::Array2;
use std::fmt::Write;
use voxcrate_core::{Error, LabelDictionary, Result};

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub class: u32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of ground-truth samples of this class
    pub support: usize,
}

/// Metrics over a set of predictions
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    /// Per-class F1 averaged with support weights
    pub weighted_f1: f64,
    /// `confusion[[truth, predicted]]`
    pub confusion: Array2<usize>,
}

/// Compare predicted class ids against ground truth
///
/// Precision, recall and F1 are 0 where their denominator is 0.
pub fn evaluate(predicted: &[u32], truth: &[u32], num_classes: usize) -> Result<Evaluation> {
    if predicted.len() != truth.len() {
        return Err(Error::InvalidData(format!(
            "{} predictions for {} ground-truth labels",
            predicted.len(),
            truth.len()
        )));
    }
    if truth.is_empty() {
        return Err(Error::InvalidData("nothing to evaluate".to_string()));
    }

    let mut confusion = Array2::<usize>::zeros((num_classes, num_classes));
    for (&p, &t) in predicted.iter().zip(truth) {
        let (p, t) = (p as usize, t as usize);
        if p >= num_classes || t >= num_classes {
            return Err(Error::UnknownLabel(format!(
                "class id {} outside 0..{}",
                p.max(t),
                num_classes
            )));
        }
        confusion[[t, p]] += 1;
    }

    let total = truth.len();
    let correct: usize = (0..num_classes).map(|c| confusion[[c, c]]).sum();

    let per_class: Vec<ClassMetrics> = (0..num_classes)
        .map(|c| {
            let true_positive = confusion[[c, c]] as f64;
            let predicted_as = confusion.column(c).sum() as f64;
            let support = confusion.row(c).sum();
            let precision = ratio(true_positive, predicted_as);
            let recall = ratio(true_positive, support as f64);
            ClassMetrics {
                class: c as u32,
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        })
        .collect();

    let weighted_f1 = per_class.iter().map(|m| m.f1 * m.support as f64).sum::<f64>() / total as f64;

    Ok(Evaluation {
        accuracy: correct as f64 / total as f64,
        per_class,
        weighted_f1,
        confusion,
    })
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl Evaluation {
    /// Per-class table followed by the summary scores
    ///
    /// Classes without support or predictions are left out of the table.
    pub fn report(&self, labels: &LabelDictionary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<20} {:>9} {:>9} {:>9} {:>8}", "class", "precision", "recall", "f1", "support");
        for metrics in &self.per_class {
            let predicted_as = self.confusion.column(metrics.class as usize).sum();
            if metrics.support == 0 && predicted_as == 0 {
                continue;
            }
            let name = labels
                .name_of(metrics.class)
                .map(|name| format!("{}-{}", metrics.class, name))
                .unwrap_or_else(|| metrics.class.to_string());
            let _ = writeln!(
                out,
                "{:<20} {:>9.3} {:>9.3} {:>9.3} {:>8}",
                name, metrics.precision, metrics.recall, metrics.f1, metrics.support
            );
        }
        let _ = writeln!(out, "accuracy: {:.4}", self.accuracy);
        let _ = writeln!(out, "weighted f1: {:.4}", self.weighted_f1);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_metrics() {
        let truth = [0, 0, 1, 1, 2];
        let predicted = [0, 1, 1, 1, 0];
        let eval = evaluate(&predicted, &truth, 3).unwrap();

        assert_relative_eq!(eval.accuracy, 0.6);
        assert_eq!(eval.confusion[[0, 1]], 1);

        let class0 = eval.per_class[0];
        assert_relative_eq!(class0.precision, 0.5);
        assert_relative_eq!(class0.recall, 0.5);
        assert_eq!(class0.support, 2);

        let class1 = eval.per_class[1];
        assert_relative_eq!(class1.precision, 2.0 / 3.0);
        assert_relative_eq!(class1.recall, 1.0);
        assert_relative_eq!(class1.f1, 0.8);

        let class2 = eval.per_class[2];
        assert_eq!(class2.f1, 0.0);

        assert_relative_eq!(eval.weighted_f1, (0.5 * 2.0 + 0.8 * 2.0) / 5.0);
    }

    #[test]
    fn test_perfect_predictions() {
        let labels = [3, 9, 9, 13];
        let eval = evaluate(&labels, &labels, 14).unwrap();
        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.weighted_f1, 1.0);

        let report = eval.report(&LabelDictionary::sydney_urban_objects());
        assert!(report.contains("9-tree"));
        assert!(!report.contains("0-4wd"));
        assert!(report.contains("accuracy: 1.0000"));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(evaluate(&[0], &[0, 1], 2).is_err());
        assert!(evaluate(&[], &[], 2).is_err());
        assert_eq!(evaluate(&[5], &[0], 2).unwrap_err().kind(), voxcrate_core::ErrorKind::UnknownLabel);
    }
}
