use rodio::Source;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// dB window mapped onto 0..=255, same range a browser AnalyserNode uses by default
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Shared ring of the most recent interleaved samples that reached the sink.
#[derive(Clone)]
pub struct AnalysisTap {
    samples: Arc<Mutex<VecDeque<f32>>>,
    channels: u16,
    capacity: usize,
}

impl AnalysisTap {
    /// `frames` is how many frames per channel are retained.
    pub fn new(channels: u16, frames: usize) -> Self {
        let channels = channels.max(1);
        let capacity = frames.max(1) * channels as usize;
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            channels,
            capacity,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Append one interleaved frame. The audio thread never waits on the
    /// visualizer: a contended lock drops the whole frame, so the ring stays
    /// channel aligned.
    fn push_frame(&self, frame: &[f32]) {
        if let Ok(mut buf) = self.samples.try_lock() {
            let excess = (buf.len() + frame.len()).saturating_sub(self.capacity);
            let len = buf.len();
            buf.drain(..excess.min(len));
            buf.extend(frame.iter().copied());
        }
    }

    /// Latest `frames` frames mixed down to mono, oldest first, zero padded
    /// at the front when not enough audio has played yet.
    fn mono_window(&self, frames: usize) -> Vec<f32> {
        let buf = match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let ch = self.channels as usize;
        let available = buf.len() / ch;
        let take = available.min(frames);
        let start = buf.len() - take * ch;

        let mut mono = vec![0.0f32; frames - take];
        mono.extend((0..take).map(|frame| {
            let base = start + frame * ch;
            let sum: f32 = (0..ch).map(|c| buf[base + c]).sum();
            sum / ch as f32
        }));
        mono
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::sync::Weak<Mutex<VecDeque<f32>>> {
        Arc::downgrade(&self.samples)
    }
}

/// Pass-through source that copies every sample into an [`AnalysisTap`].
pub struct TapSource<S> {
    inner: S,
    tap: AnalysisTap,
    frame: Vec<f32>,
}

impl<S> TapSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, tap: AnalysisTap) -> Self {
        let frame = Vec::with_capacity(tap.channels as usize);
        Self { inner, tap, frame }
    }
}

impl<S> Iterator for TapSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;
        self.frame.push(sample);
        if self.frame.len() == self.tap.channels as usize {
            self.tap.push_frame(&self.frame);
            self.frame.clear();
        }
        Some(sample)
    }
}

impl<S> Source for TapSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), rodio::source::SeekError> {
        // stale samples from before the jump would smear the first frames
        if let Ok(mut buf) = self.tap.samples.lock() {
            buf.clear();
        }
        self.frame.clear();
        self.inner.try_seek(pos)
    }
}

/// Frequency analysis over a tap: Hann windowed FFT, magnitudes in dB
/// scaled to bytes.
pub struct Analyser {
    tap: AnalysisTap,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothing: f32,
    previous: Vec<f32>,
}

impl Analyser {
    /// `fft_size` must be a power of two; see `VisualizerConfig::effective_fft_size`.
    pub fn new(tap: AnalysisTap, fft_size: usize, smoothing: f32) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        Self {
            tap,
            fft,
            fft_size,
            window,
            smoothing: smoothing.clamp(0.0, 0.99),
            previous: vec![0.0; fft_size / 2],
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// One byte per bin, 0 for silence.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let mono = self.tap.mono_window(self.fft_size);
        let mut buffer: Vec<Complex<f32>> = mono
            .iter()
            .zip(&self.window)
            .map(|(sample, w)| Complex::new(sample * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let n = self.fft_size as f32;
        let s = self.smoothing;
        buffer[..self.bin_count()]
            .iter()
            .zip(self.previous.iter_mut())
            .map(|(bin, prev)| {
                let magnitude = s * *prev + (1.0 - s) * (bin.norm() / n);
                *prev = magnitude;
                to_byte(magnitude)
            })
            .collect()
    }
}

fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    (scaled.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tap: &AnalysisTap, samples: impl IntoIterator<Item = f32>) {
        let samples: Vec<f32> = samples.into_iter().collect();
        for frame in samples.chunks(tap.channels() as usize) {
            tap.push_frame(frame);
        }
    }

    #[test]
    fn test_silence_is_all_zero() {
        let tap = AnalysisTap::new(2, 256);
        feed(&tap, std::iter::repeat(0.0).take(512));
        let mut analyser = Analyser::new(tap, 256, 0.0);

        let data = analyser.byte_frequency_data();
        assert_eq!(data.len(), 128);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_tap_reads_as_silence() {
        let mut analyser = Analyser::new(AnalysisTap::new(1, 64), 64, 0.0);
        assert_eq!(analyser.byte_frequency_data(), vec![0; 32]);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let n = 256;
        let k = 16;
        let tap = AnalysisTap::new(1, n);
        feed(
            &tap,
            (0..n).map(|i| (2.0 * std::f32::consts::PI * k as f32 * i as f32 / n as f32).sin()),
        );
        let mut analyser = Analyser::new(tap, n, 0.0);
        let data = analyser.byte_frequency_data();

        assert_eq!(data[k], 255);
        assert!(data[100] < 64);
        assert!(data[k + 40] < 64);
    }

    #[test]
    fn test_ring_keeps_latest_frames() {
        let tap = AnalysisTap::new(2, 2);
        feed(&tap, [1.0, 1.0, 0.5, 0.0, -1.0, -0.5]);
        // oldest frame evicted, remaining frames averaged across channels
        assert_eq!(tap.mono_window(2), vec![0.25, -0.75]);
        assert_eq!(tap.mono_window(3), vec![0.0, 0.25, -0.75]);
    }

    #[test]
    fn test_tap_source_passes_samples_through() {
        let tap = AnalysisTap::new(1, 8);
        let inner = rodio::source::SineWave::new(440.0);
        let source = TapSource::new(inner, tap.clone());
        assert_eq!(source.channels(), 1);

        let played: Vec<f32> = source.take(4).collect();
        assert_eq!(tap.mono_window(4), played);
    }

    #[test]
    fn test_contended_frame_is_dropped_whole() {
        let tap = AnalysisTap::new(2, 8);
        let inner = rodio::buffer::SamplesBuffer::new(2, 44_100, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut source = TapSource::new(inner, tap.clone());

        source.next();
        source.next();
        {
            // visualizer holding the lock while the second frame completes
            let _busy = tap.samples.lock().unwrap();
            source.next();
            source.next();
        }
        source.next();
        source.next();

        let ring: Vec<f32> = tap.samples.lock().unwrap().iter().copied().collect();
        assert_eq!(ring, vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_smoothing_blends_frames() {
        let n = 64;
        let tap = AnalysisTap::new(1, n);
        feed(
            &tap,
            (0..n).map(|i| 0.001 * (2.0 * std::f32::consts::PI * 8.0 * i as f32 / n as f32).sin()),
        );
        let mut smoothed = Analyser::new(tap.clone(), n, 0.8);
        let mut raw = Analyser::new(tap, n, 0.0);

        let first = smoothed.byte_frequency_data()[8];
        let second = smoothed.byte_frequency_data()[8];
        assert!(first < second);
        assert!(second <= raw.byte_frequency_data()[8]);
    }
}
