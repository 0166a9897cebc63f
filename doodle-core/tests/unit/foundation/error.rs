use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        DoodleError::unsupported_format("x")
            .to_string()
            .contains("unsupported format:")
    );
    assert!(
        DoodleError::load_timeout("x")
            .to_string()
            .contains("load timeout:")
    );
    assert!(DoodleError::provider("x").to_string().contains("provider error:"));
    assert!(DoodleError::encoding("x").to_string().contains("encoding error:"));
    assert!(
        DoodleError::PollTimeoutExceeded { attempts: 3 }
            .to_string()
            .contains("after 3 attempts")
    );
}

#[test]
fn timeouts_are_distinguished_from_failures() {
    assert!(DoodleError::load_timeout("x").is_timeout());
    assert!(DoodleError::PollTimeoutExceeded { attempts: 60 }.is_timeout());
    assert!(!DoodleError::decode("x").is_timeout());
    assert!(!DoodleError::provider("x").is_timeout());
}

#[test]
fn every_kind_has_a_distinct_user_message() {
    let all = [
        DoodleError::unsupported_format("x"),
        DoodleError::load_timeout("x"),
        DoodleError::decode("x"),
        DoodleError::provider("x"),
        DoodleError::PollTimeoutExceeded { attempts: 1 },
        DoodleError::cover_load("x"),
        DoodleError::encoding("x"),
        DoodleError::source_load("x"),
        DoodleError::validation("x"),
        DoodleError::cancelled("x"),
    ];
    let mut messages: Vec<_> = all.iter().map(DoodleError::user_message).collect();
    let mut kinds: Vec<_> = all.iter().map(DoodleError::kind).collect();
    messages.sort_unstable();
    messages.dedup();
    kinds.sort_unstable();
    kinds.dedup();
    assert_eq!(messages.len(), all.len());
    assert_eq!(kinds.len(), all.len());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = DoodleError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), "INTERNAL_ERROR");
}
