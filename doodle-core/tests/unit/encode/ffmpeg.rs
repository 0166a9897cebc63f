use super::*;

const ENCODERS: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
";

#[test]
fn parse_encoder_list_keeps_video_encoders_only() {
    let names = parse_encoder_list(ENCODERS);
    assert_eq!(names, vec!["libvpx", "mpeg4", "libvpx-vp9"]);
}

#[test]
fn choose_prefers_most_compatible_profile() {
    let p = EncoderProfile::choose(&parse_encoder_list(ENCODERS)).unwrap();
    assert_eq!(p.encoder, "libvpx");
    assert_eq!(p.container.extension(), "webm");

    let p = EncoderProfile::choose(&["mpeg4", "libx264"]).unwrap();
    assert_eq!(p.encoder, "libx264");
    assert_eq!(p.container, Container::Mp4);

    assert!(EncoderProfile::choose(&["aac"]).is_none());
}

#[test]
fn flatten_premul_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_premul_alpha_255_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn push_before_begin_is_an_encoding_error() {
    let profile = EncoderProfile::choose(&["mpeg4"]).unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(profile));
    let frame = FrameRGBA::new(2, 2);
    assert!(matches!(
        sink.push_frame(FrameIndex(0), &frame),
        Err(DoodleError::Encoding(_))
    ));
    assert!(matches!(sink.end(), Err(DoodleError::Encoding(_))));
    assert!(sink.take_output().is_none());
}
