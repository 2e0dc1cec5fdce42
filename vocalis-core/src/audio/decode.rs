//! Encoded-audio decoding.
//!
//! The engine accepts WAV uploads (the recorder in front of it always
//! produces WAV). MIME routing happens here so additional codecs can be
//! added without touching the ingest pipeline.

use std::io::Cursor;

use crate::error::{Result, VocalisError};

/// Decoded PCM prior to resampling.
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono f32 samples in [-1.0, 1.0] (multichannel sources are averaged).
    pub samples: Vec<f32>,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count before mixdown.
    pub channels: u16,
}

/// MIME types decoded as RIFF/WAV.
const WAV_MIMES: &[&str] = &["audio/wav", "audio/x-wav", "audio/wave", "audio/vnd.wave"];

/// Decode encoded bytes according to the declared MIME type.
///
/// # Errors
/// `VocalisError::UnsupportedFormat` when the MIME type is unknown, the
/// payload does not parse, or the file contains zero frames.
pub fn decode(bytes: &[u8], mime: &str) -> Result<DecodedAudio> {
    let normalized = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase();

    if !WAV_MIMES.contains(&normalized.as_str()) {
        return Err(VocalisError::UnsupportedFormat {
            detail: format!("unrecognized MIME type '{mime}'"),
        });
    }

    decode_wav(bytes)
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| VocalisError::UnsupportedFormat {
            detail: format!("WAV parse failed: {e}"),
        })?;
    let spec = reader.spec();
    let channels = spec.channels;

    if channels == 0 {
        return Err(VocalisError::UnsupportedFormat {
            detail: "WAV declares zero channels".into(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VocalisError::UnsupportedFormat {
                detail: format!("WAV float payload: {e}"),
            })?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VocalisError::UnsupportedFormat {
                    detail: format!("WAV int payload: {e}"),
                })?
        }
    };

    if interleaved.is_empty() {
        return Err(VocalisError::UnsupportedFormat {
            detail: "WAV contains zero frames".into(),
        });
    }

    let samples = if channels == 1 {
        interleaved
    } else {
        let ch = channels as usize;
        interleaved
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels,
    })
}

/// Encode mono f32 samples as 16-bit PCM WAV. Test fixture helper, also used
/// by the CLI to round-trip synthetic audio.
pub fn encode_wav_i16_mono(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("in-memory WAV writer");
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(v).expect("in-memory WAV write");
        }
        writer.finalize().expect("in-memory WAV finalize");
    }
    cursor.into_inner()
}
