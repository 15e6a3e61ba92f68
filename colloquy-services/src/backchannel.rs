use async_trait::async_trait;
use colloquy_core::{Envelope, Publications, Service, ServiceDescriptor, ServiceError, ServiceId};

use crate::read_text;
use crate::topics::{GEN_USER_UTTERANCE, PREDICTED_BC};

/// Value published when no backchannel fits.
pub(crate) const NO_BACKCHANNEL: &str = "no_bc";

/// Text-only backchannel predictor.
///
/// Long statements earn an acknowledgement (`okay`), medium ones an
/// `uh-huh`; questions and short turns get none. The prediction is
/// consumed by the NLG as feedback.
pub struct BackchannelPredictor {
    id: ServiceId,
    long_turn: usize,
    medium_turn: usize,
}

impl BackchannelPredictor {
    /// Predictor with thresholds of 12 and 6 words.
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            long_turn: 12,
            medium_turn: 6,
        }
    }

    /// Word counts from which `uh-huh` and `okay` are predicted.
    pub fn with_thresholds(mut self, medium_turn: usize, long_turn: usize) -> Self {
        self.medium_turn = medium_turn;
        self.long_turn = long_turn.max(medium_turn);
        self
    }

    fn predict(&self, text: &str) -> &'static str {
        let words = text.split_whitespace().count();
        if text.trim_end().ends_with('?') {
            NO_BACKCHANNEL
        } else if words >= self.long_turn {
            "okay"
        } else if words >= self.medium_turn {
            "uh-huh"
        } else {
            NO_BACKCHANNEL
        }
    }
}

#[async_trait]
impl Service for BackchannelPredictor {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone())
            .subscribes([GEN_USER_UTTERANCE])
            .publishes([PREDICTED_BC])
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let text = read_text(envelope, GEN_USER_UTTERANCE)?;
        Ok(Publications::none().with(PREDICTED_BC, self.predict(text)))
    }
}
