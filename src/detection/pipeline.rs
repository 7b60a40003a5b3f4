// Detection drivers - frame source to expiring vote bands
//
// `run_sequential` extracts and votes on the calling thread.
// `run_pipelined` moves extraction to a worker thread and keeps forest
// routing and voting on the caller, connected by a bounded channel so the
// extractor can run at most `channel_capacity` windows ahead. Both build the
// detector from the first window, which is when the frame size is known.

use crossbeam_channel::{bounded, Receiver};

use crate::config::{ExtractorConfig, PipelineConfig, VotingConfig};
use crate::error::{
    log_detection_error, log_frame_source_error, DetectionError, FrameSourceError,
};
use crate::features::{Extraction, ExtractionWindow, FrameSource, LocalFeatureExtractor};
use crate::forest::DecisionForest;

use super::{Detector, VoteBand};

/// Counters reported when a run completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub windows: usize,
    pub descriptors: usize,
    pub votes: usize,
    pub bands: usize,
}

/// Lazily built detector plus run counters
struct VotingStage<'a> {
    forest: Option<DecisionForest>,
    extractor: &'a ExtractorConfig,
    voting: &'a VotingConfig,
    detector: Option<Detector>,
    stats: PipelineStats,
}

impl<'a> VotingStage<'a> {
    fn new(
        forest: DecisionForest,
        extractor: &'a ExtractorConfig,
        voting: &'a VotingConfig,
    ) -> Self {
        Self {
            forest: Some(forest),
            extractor,
            voting,
            detector: None,
            stats: PipelineStats::default(),
        }
    }

    fn handle<F: FnMut(VoteBand)>(
        &mut self,
        window: &ExtractionWindow,
        on_band: &mut F,
    ) -> Result<(), DetectionError> {
        if self.detector.is_none() {
            if let Some(forest) = self.forest.take() {
                self.detector = Some(Detector::new(
                    forest,
                    self.extractor,
                    window.frame_size,
                    self.voting,
                )?);
            }
        }
        let Some(detector) = self.detector.as_mut() else {
            return Ok(());
        };

        self.stats.windows += 1;
        self.stats.descriptors += window.descriptor_count();
        for band in detector.process_window(window) {
            self.stats.bands += 1;
            on_band(band);
        }
        Ok(())
    }

    fn finish<F: FnMut(VoteBand)>(mut self, on_band: &mut F) -> PipelineStats {
        if let Some(detector) = self.detector.as_mut() {
            for band in detector.finish() {
                self.stats.bands += 1;
                on_band(band);
            }
            self.stats.votes = detector.votes_cast();
        }
        self.stats
    }
}

/// Run extraction and voting on the calling thread
///
/// # Arguments
/// * `source` - Frames to process
/// * `extractor` - Freshly constructed extractor
/// * `forest` - Trained forest, moved into the detector
/// * `voting` - Voting space settings
/// * `on_band` - Receives every expiring band, in stream order per class
pub fn run_sequential<S, F>(
    source: &mut S,
    extractor: &mut LocalFeatureExtractor,
    forest: DecisionForest,
    voting: &VotingConfig,
    mut on_band: F,
) -> Result<PipelineStats, DetectionError>
where
    S: FrameSource + ?Sized,
    F: FnMut(VoteBand),
{
    let extractor_config = extractor.config().clone();
    let mut stage = VotingStage::new(forest, &extractor_config, voting);
    while let Extraction::Window(window) = extractor.extract(source)? {
        stage.handle(&window, &mut on_band)?;
    }
    Ok(stage.finish(&mut on_band))
}

/// Run extraction on a worker thread and voting on the calling thread
///
/// Produces the same bands as [`run_sequential`].
pub fn run_pipelined<S, F>(
    source: &mut S,
    extractor: &mut LocalFeatureExtractor,
    forest: DecisionForest,
    voting: &VotingConfig,
    pipeline: &PipelineConfig,
    mut on_band: F,
) -> Result<PipelineStats, DetectionError>
where
    S: FrameSource + Send + ?Sized,
    F: FnMut(VoteBand),
{
    let extractor_config = extractor.config().clone();
    let (sender, receiver) = bounded::<ExtractionWindow>(pipeline.channel_capacity.max(1));

    std::thread::scope(|scope| {
        let producer = scope.spawn(move || -> Result<usize, FrameSourceError> {
            let mut sent = 0;
            loop {
                let window = match extractor.extract(source) {
                    Ok(Extraction::Window(window)) => window,
                    Ok(_) => break,
                    Err(err) => {
                        log_frame_source_error(&err, "ExtractionThread");
                        return Err(err);
                    }
                };
                if sender.send(window).is_err() {
                    tracing::debug!("[ExtractionThread] Voting side hung up");
                    break;
                }
                sent += 1;
            }
            tracing::info!("[ExtractionThread] Finished after {} windows", sent);
            Ok(sent)
        });

        let stage = VotingStage::new(forest, &extractor_config, voting);
        let consumed = consume(receiver, stage, &mut on_band);

        let produced = match producer.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        produced?;
        consumed
    })
}

/// Drain the channel into the voting stage; dropping `receiver` on return
/// unblocks the producer if voting fails early
fn consume<F: FnMut(VoteBand)>(
    receiver: Receiver<ExtractionWindow>,
    mut stage: VotingStage<'_>,
    on_band: &mut F,
) -> Result<PipelineStats, DetectionError> {
    for window in receiver.iter() {
        tracing::debug!(
            "[VotingThread] Window begin_t={} ({} descriptors)",
            window.begin_t,
            window.descriptor_count()
        );
        if let Err(err) = stage.handle(&window, on_band) {
            log_detection_error(&err, "VotingThread");
            return Err(err);
        }
    }
    let stats = stage.finish(on_band);
    tracing::info!(
        "[VotingThread] {} windows, {} votes, {} bands",
        stats.windows,
        stats.votes,
        stats.bands
    );
    Ok(stats)
}
