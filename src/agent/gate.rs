//! Confidence-gated intent short-circuit.
//!
//! The gate only applies policy to the classifier's answer: out-of-scope
//! and greeting messages classified with enough confidence get a canned
//! reply, everything else proceeds to planning untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::finding::{ClassificationResult, IntentLabel};
use super::provider::with_timeout;
use crate::capability::IntentClassifier;

/// Reply to confidently out-of-scope messages.
pub const OUT_OF_SCOPE_REPLY: &str = "Sorry, I can only help with questions about the university.";
/// Reply to confidently classified greetings.
pub const GREETING_REPLY: &str =
    "Hello! I'm the university's virtual assistant. How can I help you?";

/// What the gate decided for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Answer immediately with the canned reply.
    ShortCircuit {
        /// The canned reply.
        reply: &'static str,
        /// The classification that triggered it.
        classification: ClassificationResult,
    },
    /// Continue to planning.
    Proceed {
        /// The classification, when the classifier answered.
        classification: Option<ClassificationResult>,
    },
}

/// Intent gate over a short-text classifier.
pub struct IntentGate {
    classifier: Arc<dyn IntentClassifier>,
    threshold: f32,
    timeout: Duration,
}

impl IntentGate {
    /// Creates a gate that short-circuits above `threshold` (0–100).
    #[must_use]
    pub fn new(classifier: Arc<dyn IntentClassifier>, threshold: f32, timeout: Duration) -> Self {
        Self {
            classifier,
            threshold,
            timeout,
        }
    }

    /// Canned reply for a classification, if it is gated.
    #[must_use]
    pub fn canned_reply(&self, classification: &ClassificationResult) -> Option<&'static str> {
        if classification.confidence <= self.threshold {
            return None;
        }
        match classification.label {
            IntentLabel::OutOfScope => Some(OUT_OF_SCOPE_REPLY),
            IntentLabel::Greeting => Some(GREETING_REPLY),
            IntentLabel::Domain(_) => None,
        }
    }

    /// Classifies `query` and applies the gate policy.
    ///
    /// A failing or slow classifier lets the query through to planning.
    pub async fn evaluate(&self, query: &str) -> GateDecision {
        let classification = match with_timeout(
            "intent classification",
            self.timeout,
            self.classifier.classify(query),
        )
        .await
        {
            Ok(classification) => classification,
            Err(e) => {
                warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "classifier failed, proceeding to planning"
                );
                return GateDecision::Proceed {
                    classification: None,
                };
            }
        };

        let reply = self.canned_reply(&classification);
        debug!(
            label = %classification.label,
            confidence = classification.confidence,
            short_circuit = reply.is_some(),
            "gate decision"
        );

        match reply {
            Some(reply) => GateDecision::ShortCircuit {
                reply,
                classification,
            },
            None => GateDecision::Proceed {
                classification: Some(classification),
            },
        }
    }
}

impl std::fmt::Debug for IntentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentGate")
            .field("classifier", &self.classifier.name())
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
