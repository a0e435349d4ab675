//! Microphone capture through cpal.
//!
//! Audio is captured from the configured input device at its native rate,
//! mixed down to mono, and delivered as PCM16 chunks. The chunks are wrapped
//! into a WAV container when the session stops.

use super::device::{CaptureDevice, CaptureStream, LiveSignal};
use crate::error::{Result, WavebarsError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

const WAV_MIME_TYPE: &str = "audio/wav";

/// An input device chosen by name, index, or `"default"`.
#[derive(Debug, Clone)]
pub struct CpalCaptureDevice {
    device_name: String,
    requested_sample_rate: u32,
}

impl CpalCaptureDevice {
    /// # Arguments
    /// * `device_name` - `"default"`, a device name, or a numeric index from `list-devices`
    /// * `requested_sample_rate` - Preferred rate in Hz; the device's native rate wins
    pub fn new(device_name: impl Into<String>, requested_sample_rate: u32) -> Self {
        Self {
            device_name: device_name.into(),
            requested_sample_rate,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[derive(Debug, Default)]
struct StreamShared {
    chunks: Vec<Vec<u8>>,
    fault: Option<String>,
}

fn lock_shared(shared: &Mutex<StreamShared>) -> MutexGuard<'_, StreamShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A running cpal input stream.
pub struct CpalCaptureStream {
    stream: Option<cpal::Stream>,
    shared: Arc<Mutex<StreamShared>>,
    paused: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CpalCaptureStream {
    /// Actual capture rate reported by the device.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl CaptureDevice for CpalCaptureDevice {
    type Stream = CpalCaptureStream;

    fn supported_mime_type(&self) -> Option<String> {
        Some(WAV_MIME_TYPE.to_string())
    }

    fn open(&mut self, signal: LiveSignal) -> Result<CpalCaptureStream> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| WavebarsError::DeviceUnavailable("no audio input device available".into()))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_name);

        let device_config = device.default_input_config().map_err(classify_device_error)?;
        let sample_rate = device_config.sample_rate().0;
        let sample_format = device_config.sample_format();

        if sample_rate != self.requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.requested_sample_rate,
                sample_rate
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            device_config.channels(),
            sample_format
        );

        let config: cpal::StreamConfig = device_config.into();
        let shared = Arc::new(Mutex::new(StreamShared::default()));
        let paused = Arc::new(AtomicBool::new(false));
        let sink = CallbackSink {
            shared: Arc::clone(&shared),
            paused: Arc::clone(&paused),
            signal,
            channels: config.channels as usize,
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, sink),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, sink),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, sink),
            other => {
                return Err(WavebarsError::DeviceUnavailable(format!(
                    "unsupported input sample format {other:?}"
                )))
            }
        }
        .map_err(classify_device_error)?;

        stream.play().map_err(classify_device_error)?;
        tracing::debug!("Audio stream started");

        Ok(CpalCaptureStream {
            stream: Some(stream),
            shared,
            paused,
            sample_rate,
        })
    }
}

impl CaptureStream for CpalCaptureStream {
    // The stream keeps running while paused; the callback just drops input.
    fn pause(&mut self) -> Result<()> {
        self.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.paused.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn drain_chunks(&mut self, out: &mut Vec<Vec<u8>>) {
        out.append(&mut lock_shared(&self.shared).chunks);
    }

    fn take_fault(&mut self) -> Option<String> {
        lock_shared(&self.shared).fault.take()
    }

    fn finalize(&mut self, payload: Vec<u8>) -> Result<Vec<u8>> {
        wrap_pcm16_wav(&payload, self.sample_rate)
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Audio stream closed");
        }
    }
}

/// State moved into the realtime callback.
struct CallbackSink {
    shared: Arc<Mutex<StreamShared>>,
    paused: Arc<AtomicBool>,
    signal: LiveSignal,
    channels: usize,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: CallbackSink,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let fault_shared = Arc::clone(&sink.shared);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if sink.paused.load(Ordering::Relaxed) {
                return;
            }
            let mono = downmix(data, sink.channels);
            sink.signal.push_samples(&mono);
            lock_shared(&sink.shared).chunks.push(encode_pcm16(&mono));
        },
        move |err| {
            tracing::error!("Audio stream error: {}", err);
            lock_shared(&fault_shared).fault.get_or_insert_with(|| err.to_string());
        },
        None,
    )
}

/// Averages interleaved frames into mono `f32` samples.
fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: cpal::FromSample<T>,
{
    match channels {
        0 | 1 => data.iter().map(|&s| s.to_sample::<f32>()).collect(),
        n => data
            .chunks_exact(n)
            .map(|frame| frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / n as f32)
            .collect(),
    }
}

fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&pcm.to_le_bytes());
    }
    bytes
}

/// Wraps little-endian mono PCM16 into an in-memory WAV file.
fn wrap_pcm16_wav(payload: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_err = |e: hound::Error| WavebarsError::RecorderFault(format!("WAV encoding failed: {e}"));

    let mut cursor = Cursor::new(Vec::with_capacity(payload.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        for pair in payload.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

/// Maps a cpal failure onto the capture error kinds.
fn classify_device_error(err: impl std::fmt::Display) -> WavebarsError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("not allowed") || lowered.contains("denied") {
        WavebarsError::PermissionDenied(message)
    } else {
        WavebarsError::DeviceUnavailable(message)
    }
}

/// Finds an audio input device by name or numeric index.
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| WavebarsError::DeviceUnavailable(format!("failed to enumerate devices: {e}")))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            WavebarsError::DeviceUnavailable(format!(
                "device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            ))
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().is_ok_and(|name| name == device_spec))
        .ok_or_else(|| {
            WavebarsError::DeviceUnavailable(format!(
                "audio input device '{device_spec}' not found. Use 'wavebars list-devices' to see available devices."
            ))
        })
}

/// Summary of one input device for listing.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// Native `(sample_rate, channels)`, if the device reports one.
    pub native_config: Option<(u32, u16)>,
}

/// Enumerates input devices, skipping any whose name cannot be queried.
///
/// # Errors
/// - `DeviceUnavailable` if the audio host cannot enumerate devices
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| WavebarsError::DeviceUnavailable(format!("failed to enumerate audio devices: {e}")))?;

        Ok(devices
            .filter_map(|d| d.name().ok().map(|name| (d, name)))
            .enumerate()
            .map(|(index, (device, name))| InputDeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                native_config: device
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels())),
                name,
            })
            .collect())
    })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
///
/// If the redirect cannot be set up, `f` runs with stderr untouched.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
