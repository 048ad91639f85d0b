use crate::error::SinkError;

/// Where finished frames go. Called from the transmission thread only.
pub trait LightSink: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), SinkError>;

    /// Turns all `channels` off.
    fn blackout(&mut self, channels: usize) -> Result<(), SinkError> {
        self.send(&vec![0; channels])
    }
}

/// Swallows frames, logging a summary now and then. For running without
/// lighting hardware.
pub struct DryRunSink {
    frames: u64,
    report_every: u64,
}

impl DryRunSink {
    pub fn new(report_every: u64) -> DryRunSink {
        DryRunSink {
            frames: 0,
            report_every: report_every.max(1),
        }
    }
}

impl LightSink for DryRunSink {
    fn send(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        self.frames += 1;
        log::trace!("Frame {}: {:?}", self.frames, frame);

        if self.frames % self.report_every == 0 {
            let peak = frame.iter().copied().max().unwrap_or(0);
            log::info!(
                "Dry run: {} frames sent, last one {} bytes with peak {}",
                self.frames,
                frame.len(),
                peak
            );
        }
        Ok(())
    }
}
