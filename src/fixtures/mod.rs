//! Fixture utilities for the deterministic CLI harness.
//!
//! A fixture script stands in for the external keyword model: it lists the
//! model labels and a sequence of confidence vectors (or engine status
//! failures) that the [`ScriptedClassifier`] replays in a loop. The
//! classifier still pulls a full window through the signal source each
//! cycle, so gain control and acquisition behave exactly as they would in
//! front of a real model.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{ClassificationResult, StreamingClassifier};
use crate::audio::SignalSource;
use crate::error::ClassifierError;

/// Default location for fixture JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Script shipped with the crate, used when none is given.
pub fn default_script_path() -> PathBuf {
    Path::new(DEFAULT_FIXTURE_ROOT).join("keyword_burst.json")
}

/// One scripted classifier cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptFrame {
    /// Engine failure with the given status code
    Status { status: i32 },
    /// Confidence per label, in label order
    Confidences(Vec<f32>),
}

/// JSON fixture schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureScript {
    pub labels: Vec<String>,
    pub frames: Vec<ScriptFrame>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FixtureScript {
    /// Load and validate a script from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading fixture script {}", path.display()))?;
        let script: FixtureScript = serde_json::from_str(&contents)
            .with_context(|| format!("parsing fixture script {}", path.display()))?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            return Err(anyhow!("fixture script has no labels"));
        }
        if self.frames.is_empty() {
            return Err(anyhow!("fixture script has no frames"));
        }
        for (idx, frame) in self.frames.iter().enumerate() {
            if let ScriptFrame::Confidences(values) = frame {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(anyhow!("frame {} contains a non-finite confidence", idx));
                }
            }
        }
        Ok(())
    }
}

/// Classifier that replays a fixture script.
pub struct ScriptedClassifier {
    script: FixtureScript,
    cursor: usize,
    window: Vec<f32>,
}

impl ScriptedClassifier {
    pub fn new(script: FixtureScript) -> Self {
        Self {
            script,
            cursor: 0,
            window: Vec::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        FixtureScript::load(path).map(Self::new)
    }

    /// Most recent input window pulled from the signal source
    pub fn last_window(&self) -> &[f32] {
        &self.window
    }
}

impl StreamingClassifier for ScriptedClassifier {
    fn init(&mut self) -> Result<(), ClassifierError> {
        self.script
            .validate()
            .map_err(|err| ClassifierError::InitFailed {
                reason: err.to_string(),
            })?;
        self.cursor = 0;
        Ok(())
    }

    fn run_continuous(
        &mut self,
        source: &mut dyn SignalSource,
    ) -> Result<ClassificationResult, ClassifierError> {
        self.window.resize(source.total_length(), 0.0);
        source.get_data(0, &mut self.window)?;

        let frame = self
            .script
            .frames
            .get(self.cursor)
            .ok_or_else(|| ClassifierError::InitFailed {
                reason: "fixture script has no frames".to_string(),
            })?;
        self.cursor = (self.cursor + 1) % self.script.frames.len();

        match frame {
            ScriptFrame::Confidences(values) => Ok(ClassificationResult::from_values(
                &self.script.labels,
                values,
            )),
            ScriptFrame::Status { status } => Err(ClassifierError::EngineStatus { status: *status }),
        }
    }

    fn labels(&self) -> &[String] {
        &self.script.labels
    }
}
