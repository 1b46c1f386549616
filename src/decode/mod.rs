//! Decode step between a captured raw frame and a structured payload.
//!
//! The decoder itself is an opaque capability behind [`SymbolDecoder`];
//! whatever goes wrong inside it, the pipeline's caller only ever sees a
//! terminal [`DecodeOutcome`].

use crate::ports::{RawFrame, SymbolDecoder};

/// Terminal result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Payload(String),
    NotFound,
}

impl DecodeOutcome {
    pub fn found_payload(&self) -> bool {
        matches!(self, DecodeOutcome::Payload(_))
    }
}

/// Wraps the opaque decode capability. Decoder faults are absorbed here and
/// reported as [`DecodeOutcome::NotFound`]; nothing propagates past this
/// boundary.
pub struct DecodePipeline {
    decoder: Box<dyn SymbolDecoder>,
}

impl DecodePipeline {
    pub fn new(decoder: impl SymbolDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
        }
    }

    pub fn decode(&mut self, frame: &RawFrame) -> DecodeOutcome {
        match self
            .decoder
            .decode(&frame.bytes, frame.width, frame.height)
        {
            Ok(Some(text)) => DecodeOutcome::Payload(text),
            Ok(None) | Err(_) => DecodeOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::scripted::ScriptedDecoder;

    fn frame() -> RawFrame {
        RawFrame {
            bytes: vec![0u8; 16],
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn payload_passes_through() {
        let mut pipeline = DecodePipeline::new(ScriptedDecoder::new().with_payload("hello"));
        assert_eq!(
            pipeline.decode(&frame()),
            DecodeOutcome::Payload("hello".to_string())
        );
    }

    #[test]
    fn missing_payload_reports_not_found() {
        let mut pipeline = DecodePipeline::new(ScriptedDecoder::new());
        assert_eq!(pipeline.decode(&frame()), DecodeOutcome::NotFound);
    }

    #[test]
    fn decoder_fault_maps_to_not_found() {
        let mut pipeline = DecodePipeline::new(ScriptedDecoder::new().with_fault("boom"));
        assert_eq!(pipeline.decode(&frame()), DecodeOutcome::NotFound);
    }
}
