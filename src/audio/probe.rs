use anyhow::Result;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Duration from container headers, for streams the decoder can't size
/// (mp3 without a Xing header, some m4a layouts).
pub fn probe_duration(media: Arc<[u8]>, mime_type: Option<&str>) -> Result<Duration> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(media)), Default::default());

    let mut hint = Hint::new();
    if let Some(mime) = mime_type {
        hint.mime_type(mime);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No supported audio tracks found"))?;

    match (track.codec_params.time_base, track.codec_params.n_frames) {
        (Some(time_base), Some(n_frames)) => {
            let time = time_base.calc_time(n_frames);
            Ok(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        }
        _ => Err(anyhow::anyhow!("Stream does not declare a frame count")),
    }
}
