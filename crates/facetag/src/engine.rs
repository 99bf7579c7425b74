use crate::display::{DisplayError, DisplaySink};
use facetag_core::{
    accepts, classify, ClassificationResult, ConfidenceGate, FaceRegion, FaceRegistry,
    OverlayRenderer, RegionDetector,
};
use facetag_hw::{CaptureError, Frame, FrameSource};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source error: {0}")]
    Capture(#[from] CaptureError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
}

/// Why the control loop left the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The display sink reported the termination key.
    TerminationKey,
    /// The frame source ran out of data.
    EndOfStream,
}

/// What happened to one detected region in one frame.
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutcome {
    /// Region clamped to the frame.
    pub region: FaceRegion,
    /// Gate confidence; `None` if the gate failed on this region.
    pub confidence: Option<f32>,
    /// Set only when the gate accepted the region.
    pub classification: Option<ClassificationResult>,
}

impl RegionOutcome {
    /// Text to draw above the region, if any.
    pub fn label(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.label.as_str())
    }
}

/// Totals for one run of the control loop.
#[derive(Debug, Clone, Serialize)]
pub struct LoopSummary {
    pub frames: u64,
    pub regions: u64,
    pub labelled: u64,
    pub stop_reason: StopReason,
}

/// Per-frame detect → gate → classify → render pipeline.
///
/// Detector, gate, registry and renderer are built once by the caller and
/// injected here; the registry is only ever read.
pub struct Engine<'r, D, G> {
    detector: D,
    gate: G,
    registry: &'r FaceRegistry,
    renderer: OverlayRenderer,
    confidence_threshold: f32,
}

impl<'r, D: RegionDetector, G: ConfidenceGate> Engine<'r, D, G> {
    pub fn new(
        detector: D,
        gate: G,
        registry: &'r FaceRegistry,
        renderer: OverlayRenderer,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            detector,
            gate,
            registry,
            renderer,
            confidence_threshold,
        }
    }

    /// Run until the sink reports the termination key or the source ends.
    ///
    /// `observe` sees each annotated frame and its outcomes before display.
    /// Per-frame and per-region failures are logged and skipped; only frame
    /// source and display errors end the loop early.
    pub fn run<S, K, F>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        mut observe: F,
    ) -> Result<LoopSummary, EngineError>
    where
        S: FrameSource,
        K: DisplaySink,
        F: FnMut(&Frame, &[RegionOutcome]),
    {
        let mut frames = 0u64;
        let mut regions = 0u64;
        let mut labelled = 0u64;

        tracing::info!(
            registry = self.registry.len(),
            threshold = self.confidence_threshold,
            "control loop running"
        );

        let stop_reason = loop {
            let Some(mut frame) = source.next_frame()? else {
                break StopReason::EndOfStream;
            };

            let outcomes = self.process_frame(&mut frame);
            frames += 1;
            regions += outcomes.len() as u64;
            labelled += outcomes.iter().filter(|o| o.classification.is_some()).count() as u64;

            observe(&frame, &outcomes);
            sink.show(&frame)?;
            tracing::debug!(
                seq = frame.sequence,
                regions = outcomes.len(),
                latency_ms = frame.timestamp.elapsed().as_secs_f64() * 1000.0,
                "frame shown"
            );

            if sink.termination_requested() {
                break StopReason::TerminationKey;
            }
        };

        tracing::info!(frames, regions, labelled, ?stop_reason, "control loop terminated");

        Ok(LoopSummary {
            frames,
            regions,
            labelled,
            stop_reason,
        })
    }

    /// Detect, gate and classify every region of `frame`, then draw the
    /// overlays onto it.
    ///
    /// All decisions are made on the unannotated frame so one region's box
    /// never leaks into another region's crop.
    pub fn process_frame(&mut self, frame: &mut Frame) -> Vec<RegionOutcome> {
        let detected = match self.detector.detect(&frame.image) {
            Ok(regions) => regions,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face detection failed; frame shown unannotated");
                return Vec::new();
            }
        };

        let (width, height) = (frame.width(), frame.height());
        let mut outcomes = Vec::with_capacity(detected.len());

        for region in &detected {
            let Some(clamped) = region.clamp(width, height) else {
                tracing::debug!(seq = frame.sequence, ?region, "face region crops to nothing; skipping");
                continue;
            };
            let crop = clamped.crop(&frame.image);

            let confidence = match self.gate.confidence(&crop) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(seq = frame.sequence, region = ?clamped, error = %e, "confidence gate failed; region left unlabelled");
                    None
                }
            };

            let classification = match confidence {
                Some(c) if accepts(c, self.confidence_threshold) => Some(classify(&crop, self.registry)),
                _ => None,
            };

            tracing::debug!(
                seq = frame.sequence,
                x = clamped.x,
                y = clamped.y,
                width = clamped.width,
                height = clamped.height,
                confidence,
                label = classification.as_ref().map(|c| c.label.as_str()),
                score = classification.as_ref().and_then(|c| c.score),
                "region processed"
            );

            outcomes.push(RegionOutcome {
                region: clamped,
                confidence,
                classification,
            });
        }

        for outcome in &outcomes {
            self.renderer.render(&mut frame.image, &outcome.region, outcome.label());
        }

        outcomes
    }
}
