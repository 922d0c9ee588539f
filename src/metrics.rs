//! Binary classification metrics for the held-out evaluation split.
//!
//! Positive class is "delayed". Ratios with a zero denominator are reported
//! as 0.0.

use std::fmt;

/// Confusion counts, positive = delayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_predictions(predicted: &[bool], actual: &[bool]) -> Self {
        debug_assert_eq!(predicted.len(), actual.len());
        let mut c = Confusion::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (true, true) => c.tp += 1,
                (true, false) => c.fp += 1,
                (false, false) => c.tn += 1,
                (false, true) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub confusion: Confusion,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl EvaluationReport {
    pub fn new(predicted: &[bool], actual: &[bool]) -> Self {
        let c = Confusion::from_predictions(predicted, actual);
        let precision = ratio(c.tp, c.tp + c.fp);
        let recall = ratio(c.tp, c.tp + c.fn_);
        Self {
            confusion: c,
            accuracy: ratio(c.tp + c.tn, c.total()),
            precision,
            recall,
            f1: f1(precision, recall),
        }
    }

    pub fn delayed(&self) -> ClassStats {
        let c = &self.confusion;
        ClassStats {
            precision: self.precision,
            recall: self.recall,
            f1: self.f1,
            support: c.tp + c.fn_,
        }
    }

    pub fn on_time(&self) -> ClassStats {
        let c = &self.confusion;
        let precision = ratio(c.tn, c.tn + c.fn_);
        let recall = ratio(c.tn, c.tn + c.fp);
        ClassStats {
            precision,
            recall,
            f1: f1(precision, recall),
            support: c.tn + c.fp,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy:  {:.4}", self.accuracy)?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        writeln!(f, "Recall:    {:.4}", self.recall)?;
        writeln!(f, "F1 Score:  {:.4}", self.f1)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, s) in [("On-time", self.on_time()), ("Delayed", self.delayed())] {
            writeln!(
                f,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, s.precision, s.recall, s.f1, s.support
            )?;
        }
        Ok(())
    }
}
