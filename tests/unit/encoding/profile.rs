use super::*;

#[test]
fn containers_collect_stream_profiles() {
    let mut webm = EncodingProfile::container("webm", "video/webm").description("web");
    webm.add_profile(EncodingProfile::video("video/x-vp8").presence(1))
        .unwrap();
    webm.add_profile(EncodingProfile::audio("audio/x-vorbis"))
        .unwrap();
    assert_eq!(webm.sub_profiles().len(), 2);
    assert!(webm.validate().is_ok());

    let err = webm
        .add_profile(EncodingProfile::audio("audio/x-vorbis"))
        .unwrap_err();
    assert!(matches!(err, EditError::Duplicate(_)));
}

#[test]
fn nesting_and_stream_parents_are_rejected() {
    let mut outer = EncodingProfile::container("a", "video/webm");
    assert!(
        outer
            .add_profile(EncodingProfile::container("b", "video/webm"))
            .is_err()
    );
    let mut stream = EncodingProfile::video("video/x-vp8");
    assert!(stream.add_profile(EncodingProfile::audio("audio/x-raw")).is_err());
}

#[test]
fn validation_requires_format_and_container_name() {
    assert!(EncodingProfile::video(" ").validate().is_err());
    assert!(EncodingProfile::container("", "video/webm").validate().is_err());
    assert!(EncodingProfile::default_proxy().validate().is_ok());
}

#[test]
fn default_proxy_carries_video_and_audio_streams() {
    let proxy = EncodingProfile::default_proxy();
    assert_eq!(proxy.name, "proxy");
    assert!(proxy.is_container());
    let kinds: Vec<&ProfileKind> = proxy.sub_profiles().iter().map(|p| &p.kind).collect();
    assert_eq!(kinds, vec![&ProfileKind::Video, &ProfileKind::Audio]);
    assert_eq!(proxy.sub_profiles()[0].format, "video/x-vp8");
}

#[test]
fn json_shape_is_tagged() {
    let profile = EncodingProfile::default_proxy();
    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["type"], "container");
    assert_eq!(value["profiles"][0]["type"], "video");
    let back: EncodingProfile = serde_json::from_value(value).unwrap();
    assert_eq!(back, profile);
}
