use super::*;

#[test]
fn typed_getters_match_stored_type() {
    let mut meta = MetaContainer::new();
    meta.set("name", "Example project").unwrap();
    meta.set("a", 3u32).unwrap();

    assert_eq!(meta.get_string("name"), Some("Example project"));
    assert_eq!(meta.get_uint("a"), Some(3));
    assert_eq!(meta.get_string("a"), None);
    assert_eq!(meta.get_uint("missing"), None);
}

#[test]
fn type_change_is_rejected() {
    let mut meta = MetaContainer::new();
    meta.set("a", 3u32).unwrap();
    let err = meta.set("a", "three").unwrap_err();
    assert!(matches!(err, EditError::Consistency(_)));

    meta.set("a", 4u64).unwrap();
    assert_eq!(meta.get_uint("a"), Some(4));
}

#[test]
fn json_keeps_value_types() {
    let mut meta = MetaContainer::new();
    meta.set("volume", 0.5).unwrap();
    meta.set("muted", false).unwrap();
    meta.set("offset", -4i64).unwrap();

    let json = serde_json::to_string(&meta).unwrap();
    let back: MetaContainer = serde_json::from_str(&json).unwrap();
    assert_eq!(back, meta);
    assert_eq!(back.get_int("offset"), Some(-4));
}
