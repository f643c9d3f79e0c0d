//! Symphonia probing helpers: titles and durations for audio files.

use std::{fs::File, path::Path};

use log::debug;
use symphonia::core::{
    codecs::CodecParameters,
    errors::Error,
    formats::FormatOptions,
    io::{MediaSource, MediaSourceStream},
    meta::{MetadataOptions, MetadataRevision, StandardTagKey},
    probe::{Hint, ProbeResult},
};

/// Convert Symphonia codec parameters to seconds using time base and frames.
pub fn get_time_from_frames(codec_params: &CodecParameters) -> Option<f64> {
    let tb = codec_params.time_base?;
    let frames = codec_params.n_frames?;
    let time = tb.calc_time(codec_params.start_ts + frames);

    Some(time.seconds as f64 + time.frac)
}

/// Probe a media file, hinting with its extension.
pub fn probe_path(path: &Path) -> Result<ProbeResult, Error> {
    let file = File::open(path)?;
    let source = Box::new(file) as Box<dyn MediaSource>;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(&ext.to_lowercase());
    }

    let mss = MediaSourceStream::new(source, Default::default());
    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)
}

fn title_from_revision(revision: &MetadataRevision) -> Option<String> {
    revision
        .tags()
        .iter()
        .find(|tag| matches!(tag.std_key, Some(StandardTagKey::TrackTitle)))
        .map(|tag| tag.value.to_string().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Read the embedded title tag, if any.
///
/// Tags found ahead of the container (ID3v2 on mp3) are preferred over tags
/// inside it.
pub fn read_title(path: &Path) -> Option<String> {
    let mut probed = match probe_path(path) {
        Ok(probed) => probed,
        Err(err) => {
            debug!("no metadata for {}: {}", path.display(), err);
            return None;
        }
    };

    if let Some(metadata) = probed.metadata.get() {
        if let Some(title) = metadata.current().and_then(title_from_revision) {
            return Some(title);
        }
    }

    probed
        .format
        .metadata()
        .current()
        .and_then(title_from_revision)
}

/// Best-effort duration of the default track in seconds.
pub fn read_duration(path: &Path) -> Option<f64> {
    let probed = probe_path(path).ok()?;
    let track = probed.format.default_track()?;
    get_time_from_frames(&track.codec_params).filter(|seconds| *seconds > 0.0)
}
