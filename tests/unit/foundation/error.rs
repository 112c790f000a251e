use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        StoryError::decode("x")
            .to_string()
            .contains("decode failure:")
    );
    assert!(
        StoryError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        StoryError::context_unavailable("x")
            .to_string()
            .contains("context unavailable:")
    );
    assert_eq!(
        StoryError::InvalidImageDimensions {
            width: 0,
            height: 3
        }
        .to_string(),
        "invalid image dimensions: 0x3"
    );
}

#[test]
fn kind_survives_the_wire() {
    for err in [
        StoryError::decode("bad bytes"),
        StoryError::missing_data("img-1"),
        StoryError::validation("scale"),
        StoryError::encode("jpeg"),
        StoryError::unknown("panic"),
    ] {
        let kind = err.kind();
        let rebuilt = StoryError::from_kind(kind, err.to_string());
        assert_eq!(rebuilt.kind(), kind);
    }
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = StoryError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), ErrorKind::Unknown);
}
