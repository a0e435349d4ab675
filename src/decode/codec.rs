//! Symphonia-backed decode paths.

use super::{AudioBlob, DecodePath, DecodedAudio};
use anyhow::{anyhow, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::codecs::MpaDecoder;
use symphonia::default::formats::MpaReader;
use symphonia::default::{get_codecs, get_probe};

/// Primary path: probes the container, then decodes the first audio track.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeDecoder;

/// Fallback path: reads raw MPEG-audio frames without probing.
///
/// Slower to fail and restricted to MP3-family data, but it accepts streams
/// whose headers confuse the prober (leading junk, truncated ID3 tags).
#[derive(Debug, Default, Clone, Copy)]
pub struct MpaFallbackDecoder;

fn media_stream(blob: &AudioBlob) -> MediaSourceStream {
    let cursor = Cursor::new(blob.shared_bytes());
    MediaSourceStream::new(Box::new(cursor), Default::default())
}

impl DecodePath for ProbeDecoder {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn decode(&self, blob: &AudioBlob) -> Result<DecodedAudio> {
        let mut hint = Hint::new();
        hint.mime_type(blob.mime_type());
        if let Some(ext) = blob.extension_hint() {
            hint.with_extension(ext);
        }

        let probed = get_probe().format(
            &hint,
            media_stream(blob),
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("no supported audio track"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = get_codecs().make(&codec_params, &DecoderOptions::default())?;
        let audio = drain_channel_zero(format.as_mut(), decoder.as_mut(), track_id, false)?;

        match audio {
            Some(mut audio) => {
                if audio.sample_rate == 0 {
                    audio.sample_rate = codec_params.sample_rate.unwrap_or(0);
                }
                Ok(audio)
            }
            None => Err(anyhow!("stream contained no decodable audio")),
        }
    }
}

impl DecodePath for MpaFallbackDecoder {
    fn name(&self) -> &'static str {
        "mpeg-audio"
    }

    fn decode(&self, blob: &AudioBlob) -> Result<DecodedAudio> {
        let mut reader = MpaReader::try_new(media_stream(blob), &FormatOptions::default())?;

        let track = reader
            .default_track()
            .ok_or_else(|| anyhow!("no MPEG audio frames found"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = MpaDecoder::try_new(&codec_params, &DecoderOptions::default())?;
        drain_channel_zero(&mut reader, &mut decoder, track_id, true)?
            .ok_or_else(|| anyhow!("no MPEG audio frames decoded"))
    }
}

/// Decodes every packet of `track_id`, keeping channel 0.
///
/// Corrupt packets are skipped. With `tolerant` set, a read error after some
/// audio was recovered ends the stream instead of failing it.
fn drain_channel_zero(
    format: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
    tolerant: bool,
) -> Result<Option<DecodedAudio>> {
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if tolerant && !samples.is_empty() => {
                tracing::debug!("Stopping at unreadable packet after {} samples: {}", samples.len(), e);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) | Err(SymphoniaError::IoError(_)) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        channels = spec.channels.count().max(1);
        sample_rate = spec.rate;

        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend(buf.samples().iter().step_by(channels).copied());
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} undecodable packets", skipped);
    }

    if samples.is_empty() {
        return Ok(None);
    }

    Ok(Some(DecodedAudio {
        samples,
        sample_rate,
        channels,
    }))
}
