//! Ready-made compositions of the pipeline.
//!
//! [`LiveVisualizer`] drives the live path (session, analyser, sampler,
//! renderer) from a single `tick`. [`StaticWaveform`] drives the static path
//! (decode, peaks, renderer) plus seeking. Both tear everything down in one
//! synchronous `dispose`.

use crate::analyser::{AnalyserBridge, AnalyserOptions};
use crate::capture::{CaptureDevice, CaptureSession, SessionId, SessionState};
use crate::decode::{AudioBlob, DecodePath};
use crate::error::Result;
use crate::peaks::{PeakCache, SourcePeaks};
use crate::render::geometry::bar_count;
use crate::render::{
    FrameData, FrameReport, Playhead, PointerEvent, Renderer, RendererOptions, SeekController, SeekKey,
    SeekOptions, Surface, Viewport,
};
use crate::sampler::{AmplitudeSampler, AmplitudeTimeline, SamplerOptions, SubscriptionId};
use std::sync::Arc;
use std::time::Instant;

/// Live recording waveform.
pub struct LiveVisualizer {
    analyser: AnalyserBridge,
    sampler: AmplitudeSampler,
    renderer: Renderer,
    subscription: Option<SubscriptionId>,
    session: Option<SessionId>,
    disposed: bool,
}

impl LiveVisualizer {
    /// # Errors
    /// `InvalidConfig` if any of the options fail validation.
    pub fn new(analyser: AnalyserOptions, sampler: SamplerOptions, renderer: RendererOptions) -> Result<Self> {
        let analyser = AnalyserBridge::new(analyser)?;
        let sampler = AmplitudeSampler::new(sampler)?;
        let renderer = Renderer::new(renderer)?;

        let invalidator = renderer.invalidator();
        let subscription = sampler.timeline().subscribe(move |_| invalidator.invalidate());

        Ok(Self {
            analyser,
            sampler,
            renderer,
            subscription: Some(subscription),
            session: None,
            disposed: false,
        })
    }

    pub fn timeline(&self) -> &AmplitudeTimeline {
        self.sampler.timeline()
    }

    pub fn analyser_mut(&mut self) -> &mut AnalyserBridge {
        &mut self.analyser
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.renderer.set_viewport(viewport);
    }

    /// Advances analysis, sampling and drawing by one step.
    ///
    /// Returns a report when a frame was painted onto `surface`.
    pub fn tick<D, S>(&mut self, now: Instant, session: Option<&CaptureSession<D>>, surface: &mut S) -> Option<FrameReport>
    where
        D: CaptureDevice,
        S: Surface,
    {
        if self.disposed {
            return None;
        }

        let binding = session.map(|s| s.binding());
        if binding.map(|b| b.id) != self.session {
            self.session = binding.map(|b| b.id);
            self.renderer.reset_growth();
            self.renderer.request_redraw();
        }

        self.analyser.sync(session);
        self.sampler.poll(now, binding, &mut self.analyser);

        let recording = binding.is_some_and(|b| b.state == SessionState::Recording);
        let terminal = binding.is_some_and(|b| b.state.is_terminal());
        if !self.renderer.is_running() && !terminal {
            self.renderer.start(now);
        }
        self.renderer.set_continuous(recording);

        let painted = self.renderer.poll_frame(now).map(|_| {
            let values = self.sampler.timeline().read();
            self.renderer
                .render_frame(surface, FrameData::Live { amplitudes: &values, recording })
        });

        // The final frame is painted above; nothing stays scheduled afterwards.
        if terminal {
            self.renderer.stop();
        }
        painted
    }

    /// Stops drawing and sampling and releases analysis resources. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.renderer.stop();
        self.sampler.stop();
        self.analyser.detach();
        if let Some(id) = self.subscription.take() {
            self.sampler.timeline().unsubscribe(id);
        }
        self.disposed = true;
        tracing::debug!("Live visualizer disposed");
    }
}

impl Drop for LiveVisualizer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Waveform of a complete clip with a playhead and seek handling.
pub struct StaticWaveform {
    renderer: Renderer,
    seek: SeekController,
    peaks: Option<Arc<SourcePeaks>>,
    current_time: f64,
    disposed: bool,
}

impl StaticWaveform {
    /// # Errors
    /// `InvalidConfig` if the renderer options fail validation.
    pub fn new(renderer: RendererOptions, seek: SeekOptions) -> Result<Self> {
        Ok(Self {
            renderer: Renderer::new(renderer)?,
            seek: SeekController::new(seek),
            peaks: None,
            current_time: 0.0,
            disposed: false,
        })
    }

    /// Decodes `blob` through `cache` and shows its peaks.
    ///
    /// A `sample_count` of 0 uses one peak per bar that fits the viewport.
    ///
    /// # Errors
    /// `EmptySource` or `DecodeFailed`; the previous peaks stay visible.
    pub async fn load<P, F>(&mut self, cache: &PeakCache<P, F>, blob: &AudioBlob, sample_count: usize) -> Result<()>
    where
        P: DecodePath + 'static,
        F: DecodePath + 'static,
    {
        let count = match sample_count {
            0 => bar_count(self.renderer.viewport().width, &self.renderer.options().style).max(1),
            n => n,
        };
        let peaks = cache.get_or_compute(blob, count).await?;
        tracing::info!(
            "Loaded waveform: {} peaks, {:.2}s",
            peaks.peaks.len(),
            peaks.duration_secs
        );
        self.seek.set_duration(peaks.duration_secs);
        self.peaks = Some(peaks);
        self.renderer.request_redraw();
        Ok(())
    }

    pub fn peaks(&self) -> Option<&SourcePeaks> {
        self.peaks.as_deref()
    }

    pub fn duration(&self) -> f64 {
        self.peaks.as_ref().map_or(0.0, |p| p.duration_secs)
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Moves the playhead to the caller's playback position.
    pub fn set_current_time(&mut self, current_time: f64) {
        self.current_time = current_time;
        self.seek.set_current_time(current_time);
        self.renderer.request_redraw();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.renderer.set_viewport(viewport);
        self.seek.set_width(viewport.width);
    }

    pub fn seek_mut(&mut self) -> &mut SeekController {
        &mut self.seek
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<f64> {
        if self.disposed {
            return None;
        }
        self.seek.handle_pointer(event)
    }

    pub fn handle_key(&mut self, key: SeekKey) -> Option<f64> {
        if self.disposed {
            return None;
        }
        self.seek.handle_key(key)
    }

    pub fn start(&mut self, now: Instant) {
        if !self.disposed {
            self.renderer.start(now);
        }
    }

    /// Paints a frame if one is due.
    pub fn tick<S: Surface>(&mut self, now: Instant, surface: &mut S) -> Option<FrameReport> {
        self.renderer.poll_frame(now)?;
        let peaks = self.peaks.as_ref().map_or(&[][..], |p| p.peaks.as_slice());
        let playhead = self.peaks.as_ref().map(|p| Playhead {
            current_time: self.current_time,
            duration: p.duration_secs,
        });
        Some(self.renderer.render_frame(surface, FrameData::Static { peaks, playhead }))
    }

    pub fn dispose(&mut self) {
        if !self.disposed {
            self.renderer.stop();
            self.disposed = true;
        }
    }
}

impl Drop for StaticWaveform {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::FakeDevice;
    use crate::decode::{AudioDecoder, DecodedAudio};
    use crate::render::DisplayList;
    use std::time::Duration;

    fn live() -> LiveVisualizer {
        let mut vis = LiveVisualizer::new(
            AnalyserOptions {
                fft_size: 32,
                smoothing: 0.0,
            },
            SamplerOptions {
                interval: Duration::from_millis(50),
                amplitude_scale: 1.0,
            },
            RendererOptions::default(),
        )
        .unwrap();
        vis.set_viewport(Viewport::new(30.0, 10.0));
        vis
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_live_tick_samples_and_paints() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let mut vis = live();
        let mut surface = DisplayList::new();
        let t0 = Instant::now();

        session.start(t0).unwrap();
        device.feed(&[0.5; 64]);
        vis.tick(t0, Some(&session), &mut surface);
        let report = vis.tick(ms(t0, 50), Some(&session), &mut surface).unwrap();

        assert_eq!(vis.timeline().len(), 1);
        assert_eq!(report.bars_drawn, 1);
        assert!(vis.analyser_mut().is_attached());
    }

    #[test]
    fn test_live_stops_drawing_after_session_stops() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let mut vis = live();
        let mut surface = DisplayList::new();
        let t0 = Instant::now();

        session.start(t0).unwrap();
        vis.tick(t0, Some(&session), &mut surface);
        session.stop(ms(t0, 10));
        vis.tick(ms(t0, 20), Some(&session), &mut surface);

        assert!(!vis.renderer().has_pending_frame());
        assert!(!vis.analyser_mut().is_attached());
        assert!(vis.tick(ms(t0, 100), Some(&session), &mut surface).is_none());
    }

    #[test]
    fn test_dispose_is_synchronous_and_idempotent() {
        let device = FakeDevice::default();
        let mut session = CaptureSession::new(device.clone());
        let mut vis = live();
        let mut surface = DisplayList::new();
        let t0 = Instant::now();

        session.start(t0).unwrap();
        vis.tick(t0, Some(&session), &mut surface);
        let timeline = vis.timeline().clone();
        assert_eq!(timeline.subscriber_count(), 1);

        vis.dispose();
        vis.dispose();
        assert!(vis.is_disposed());
        assert!(!vis.renderer().has_pending_frame());
        assert_eq!(timeline.subscriber_count(), 0);

        device.feed(&[0.5; 64]);
        assert!(vis.tick(ms(t0, 100), Some(&session), &mut surface).is_none());
        assert!(timeline.is_empty());
    }

    struct RampPath;

    impl DecodePath for RampPath {
        fn name(&self) -> &'static str {
            "ramp"
        }

        fn decode(&self, _blob: &AudioBlob) -> anyhow::Result<DecodedAudio> {
            Ok(DecodedAudio {
                samples: (0..100).map(|i| i as f32 / 100.0).collect(),
                sample_rate: 10,
                channels: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_static_waveform_loads_and_seeks() {
        let cache = PeakCache::with_decoder(AudioDecoder::with_paths(RampPath, RampPath));
        let mut waveform = StaticWaveform::new(RendererOptions::default(), SeekOptions::default()).unwrap();
        waveform.set_viewport(Viewport::new(30.0, 10.0));

        let blob = AudioBlob::new(vec![1u8, 2, 3], "audio/wav");
        waveform.load(&cache, &blob, 0).await.unwrap();
        assert_eq!(waveform.peaks().unwrap().peaks.len(), 10);
        assert_eq!(waveform.duration(), 10.0);

        let t0 = Instant::now();
        waveform.start(t0);
        let mut surface = DisplayList::new();
        let report = waveform.tick(t0, &mut surface).unwrap();
        assert_eq!(report.bars_drawn, 10);

        waveform.handle_pointer(PointerEvent::Down(15.0));
        let target = waveform.handle_pointer(PointerEvent::Up(15.0));
        assert_eq!(target, Some(5.0));

        waveform.set_current_time(5.0);
        assert_eq!(waveform.handle_key(SeekKey::Right), Some(10.0));

        waveform.dispose();
        assert!(waveform.handle_key(SeekKey::Home).is_none());
        assert!(waveform.tick(ms(t0, 100), &mut surface).is_none());
    }

    #[tokio::test]
    async fn test_static_load_failure_surfaces() {
        let cache = PeakCache::new();
        let mut waveform = StaticWaveform::new(RendererOptions::default(), SeekOptions::default()).unwrap();
        let err = waveform
            .load(&cache, &AudioBlob::new(Vec::new(), "audio/wav"), 8)
            .await
            .unwrap_err();
        assert_eq!(err, crate::error::WavebarsError::EmptySource);
        assert!(waveform.peaks().is_none());
    }
}
