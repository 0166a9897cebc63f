use std::path::PathBuf;

use super::*;

/// Decoder that serves one solid frame, optionally timing out or failing at a step.
#[derive(Default)]
struct FakeDecoder {
    width: u32,
    height: u32,
    duration: f64,
    time_out_on_probe: bool,
    fail_first_frame: bool,
    probe_calls: u32,
    seen_paths: Vec<PathBuf>,
}

impl FakeDecoder {
    fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            duration: 5.0,
            ..Default::default()
        }
    }
}

impl FrameDecoder for FakeDecoder {
    fn probe(&mut self, path: &Path, _deadline: Instant) -> Result<VideoInfo, MediaError> {
        self.probe_calls += 1;
        self.seen_paths.push(path.to_path_buf());
        assert!(path.exists(), "decoder must see the staged file");
        if self.time_out_on_probe {
            return Err(MediaError::TimedOut { program: "ffprobe" });
        }
        Ok(VideoInfo {
            width: self.width,
            height: self.height,
            duration_secs: self.duration,
            frame_rate: Some(30.0),
        })
    }

    fn first_frame(
        &mut self,
        _path: &Path,
        info: &VideoInfo,
        _deadline: Instant,
    ) -> Result<Vec<u8>, MediaError> {
        if self.fail_first_frame {
            return Err(MediaError::ExecutionFailed {
                program: "ffmpeg",
                exit_code: Some(1),
                stderr: "moov atom not found".into(),
            });
        }
        Ok([40u8, 80, 120, 255].repeat((info.width * info.height) as usize))
    }
}

fn mp4_asset() -> VideoAsset {
    VideoAsset::new(vec![0u8; 64], "video/mp4", "clip.mp4")
}

fn extract_with(
    decoder: FakeDecoder,
    asset: &VideoAsset,
) -> (DoodleResult<ExtractedFrame>, Vec<ExtractState>, FakeDecoder) {
    let mut extractor = FrameExtractor::with_decoder(ExtractorOpts::default(), decoder);
    let mut states = Vec::new();
    let result = extractor.extract_observed(asset, &mut |s| states.push(s));
    (result, states, extractor.decoder)
}

#[test]
fn reference_resolutions_yield_expected_aspect_ratios() {
    for ((w, h), expected) in [
        ((1920, 1080), "16:9"),
        ((1080, 1080), "1:1"),
        ((1080, 1920), "9:16"),
        ((640, 480), "4:3"),
    ] {
        let (result, states, _) = extract_with(FakeDecoder::sized(w, h), &mp4_asset());
        let frame = result.unwrap();
        assert_eq!(frame.metadata.aspect_ratio.to_string(), expected);
        assert_eq!((frame.metadata.width, frame.metadata.height), (w, h));
        assert_eq!(frame.metadata.duration_seconds, 5.0);
        assert_eq!(
            states,
            vec![
                ExtractState::Loading,
                ExtractState::Seeking,
                ExtractState::Captured
            ]
        );
    }
}

#[test]
fn captured_still_is_a_jpeg_at_native_resolution() {
    let (result, _, _) = extract_with(FakeDecoder::sized(32, 18), &mp4_asset());
    let frame = result.unwrap();
    assert_eq!(frame.mime_type, "image/jpeg");
    assert_eq!(&frame.image[..3], &[0xff, 0xd8, 0xff]);
    let decoded = image::load_from_memory(&frame.image).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 18));
}

#[test]
fn heif_is_rejected_before_any_decode() {
    for asset in [
        VideoAsset::new(vec![0u8; 16], "image/heic", "IMG_0001.HEIC"),
        VideoAsset::new(vec![0u8; 16], "application/octet-stream", "photo.heif"),
    ] {
        let (result, states, decoder) = extract_with(FakeDecoder::sized(10, 10), &asset);
        assert!(matches!(result, Err(DoodleError::UnsupportedFormat(_))));
        assert_eq!(states, vec![ExtractState::Failed]);
        assert_eq!(decoder.probe_calls, 0);
    }
}

#[test]
fn probe_timeout_is_a_load_timeout_and_releases_the_staged_file() {
    let decoder = FakeDecoder {
        time_out_on_probe: true,
        ..FakeDecoder::sized(10, 10)
    };
    let (result, states, decoder) = extract_with(decoder, &mp4_asset());
    let err = result.unwrap_err();
    assert!(matches!(err, DoodleError::LoadTimeout(_)));
    assert!(err.is_timeout());
    assert_eq!(states, vec![ExtractState::Loading, ExtractState::Failed]);
    assert!(decoder.seen_paths.iter().all(|p| !p.exists()));
}

#[test]
fn decode_failure_is_not_a_timeout() {
    let decoder = FakeDecoder {
        fail_first_frame: true,
        ..FakeDecoder::sized(10, 10)
    };
    let (result, states, decoder) = extract_with(decoder, &mp4_asset());
    let err = result.unwrap_err();
    assert!(matches!(err, DoodleError::Decode(_)));
    assert!(!err.is_timeout());
    assert_eq!(
        states,
        vec![
            ExtractState::Loading,
            ExtractState::Seeking,
            ExtractState::Failed
        ]
    );
    assert!(decoder.seen_paths.iter().all(|p| !p.exists()));
}

#[test]
fn successful_extraction_also_releases_the_staged_file() {
    let (result, _, decoder) = extract_with(FakeDecoder::sized(4, 4), &mp4_asset());
    result.unwrap();
    assert_eq!(decoder.seen_paths.len(), 1);
    assert!(!decoder.seen_paths[0].exists());
}

#[test]
fn zero_sized_probe_results_are_decode_errors() {
    let (result, _, _) = extract_with(FakeDecoder::sized(0, 10), &mp4_asset());
    assert!(matches!(result, Err(DoodleError::Decode(_))));
}
