use super::*;

fn heif_header() -> Vec<u8> {
    // ISO-BMFF `ftyp` box with the `heic` major brand.
    let mut b = vec![0x00, 0x00, 0x00, 0x18];
    b.extend_from_slice(b"ftypheic");
    b.extend_from_slice(&[0, 0, 0, 0]);
    b.extend_from_slice(b"mif1heic");
    b
}

#[test]
fn sniff_prefers_declared_type() {
    assert_eq!(MediaFormat::sniff("video/webm", "clip.mp4", &[]), MediaFormat::WebM);
    assert_eq!(MediaFormat::sniff("", "clip.MOV", &[]), MediaFormat::QuickTime);
    assert_eq!(
        MediaFormat::sniff("application/octet-stream", "clip", &[]),
        MediaFormat::Unknown
    );
}

#[test]
fn any_heif_signal_requires_transcoding() {
    assert!(MediaFormat::sniff("video/mp4", "IMG_0001.HEIC", &[]).requires_transcoding());
    assert!(MediaFormat::sniff("image/heif", "clip.mp4", &[]).requires_transcoding());
    assert!(MediaFormat::sniff("video/mp4", "clip.mp4", &heif_header()).requires_transcoding());
    assert!(!MediaFormat::sniff("video/mp4", "clip.mp4", &[]).requires_transcoding());
}

#[test]
fn validate_upload_accepts_known_types() {
    let max = DEFAULT_MAX_UPLOAD_BYTES;
    assert_eq!(validate_upload("video/mp4", "a.mp4", 10, max).unwrap(), MediaFormat::Mp4);
    assert_eq!(
        validate_upload("video/quicktime", "a.mov", 10, max).unwrap(),
        MediaFormat::QuickTime
    );
    assert_eq!(
        validate_upload("application/octet-stream", "a.heic", 10, max).unwrap(),
        MediaFormat::Heif
    );
}

#[test]
fn validate_upload_rejects_bad_requests() {
    let max = 100;
    assert!(matches!(
        validate_upload("video/mp4", "a.mp4", 0, max),
        Err(DoodleError::Validation(_))
    ));
    assert!(matches!(
        validate_upload("video/mp4", "a.mp4", 101, max),
        Err(DoodleError::Validation(_))
    ));
    assert!(matches!(
        validate_upload("image/png", "a.png", 10, max),
        Err(DoodleError::Validation(_))
    ));
    assert!(matches!(
        validate_upload("application/octet-stream", "a.mp4", 10, max),
        Err(DoodleError::Validation(_))
    ));
}

#[test]
fn data_url_decodes_payload() {
    let url = to_data_url("image/jpeg", b"hello");
    let (mime, bytes) = parse_data_url(&url).unwrap();
    assert_eq!(mime, "image/jpeg");
    assert_eq!(bytes, b"hello");
}

#[test]
fn malformed_data_urls_are_validation_errors() {
    for bad in [
        "image/jpeg;base64,aGVsbG8=",
        "data:image/jpeg;base64",
        "data:image/jpeg,aGVsbG8=",
        "data:;base64,aGVsbG8=",
        "data:image/jpeg;base64,@@@",
        "data:image/jpeg;base64,",
    ] {
        assert!(
            matches!(parse_data_url(bad), Err(DoodleError::Validation(_))),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn staged_asset_is_removed_on_drop() {
    let asset = VideoAsset::new(vec![1, 2, 3], "video/mp4", "clip.mp4");
    let staged = asset.stage().unwrap();
    let path = staged.path().to_path_buf();
    assert!(path.exists());
    assert_eq!(path.extension().unwrap(), "mp4");
    drop(staged);
    assert!(!path.exists());
}
