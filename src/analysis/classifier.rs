// Classifier boundary - streaming keyword model interface
//
// The model itself is external. It pulls exactly the samples it needs
// through a `SignalSource` and returns one confidence per label. Labels and
// their order are fixed by the model; the detection loop looks up the few
// it cares about by index.

use std::fmt::Write;

use crate::audio::SignalSource;
use crate::error::ClassifierError;

/// One labelled confidence value
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    pub label: String,
    /// Confidence in 0.0-1.0
    pub value: f32,
}

/// Output of one classification cycle
///
/// Entries are in the model's label order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassificationResult {
    pub classification: Vec<Classification>,
}

impl ClassificationResult {
    /// Build a result from the model labels and a confidence vector
    ///
    /// Extra values without a label are discarded.
    pub fn from_values(labels: &[String], values: &[f32]) -> Self {
        Self {
            classification: labels
                .iter()
                .zip(values)
                .map(|(label, &value)| Classification {
                    label: label.clone(),
                    value,
                })
                .collect(),
        }
    }

    /// Confidence at `index`, if the model produced one
    pub fn confidence(&self, index: usize) -> Option<f32> {
        self.classification.get(index).map(|c| c.value)
    }

    /// Human-readable `label: value` listing of every class
    pub fn predictions_line(&self) -> String {
        let mut line = String::new();
        for (i, entry) in self.classification.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            let _ = write!(line, "{}: {:.5}", entry.label, entry.value);
        }
        line
    }
}

/// Streaming classifier driven by the detection loop
pub trait StreamingClassifier {
    /// Prime the model; called once before the first cycle
    fn init(&mut self) -> Result<(), ClassifierError>;

    /// Run one cycle, pulling the input window through `source`
    ///
    /// A signal failure aborts the cycle as `ClassifierError::Signal`.
    fn run_continuous(
        &mut self,
        source: &mut dyn SignalSource,
    ) -> Result<ClassificationResult, ClassifierError>;

    /// Label set in model order
    fn labels(&self) -> &[String];
}

impl<C: StreamingClassifier + ?Sized> StreamingClassifier for Box<C> {
    fn init(&mut self) -> Result<(), ClassifierError> {
        (**self).init()
    }

    fn run_continuous(
        &mut self,
        source: &mut dyn SignalSource,
    ) -> Result<ClassificationResult, ClassifierError> {
        (**self).run_continuous(source)
    }

    fn labels(&self) -> &[String] {
        (**self).labels()
    }
}
