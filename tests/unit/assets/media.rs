use super::*;
use crate::{assets::asset::VideoStreamInfo, foundation::core::ClockTime};

fn video_only(secs: u64) -> StreamInfo {
    StreamInfo {
        duration: ClockTime::from_secs(secs),
        video: Some(VideoStreamInfo {
            width: 320,
            height: 240,
            fps_num: 25,
            fps_den: 1,
        }),
        audio: None,
    }
}

#[test]
fn static_table_answers_known_uris_only() {
    let media = StaticMediaInfo::new().with("file:///clip.ogv", video_only(3));
    assert_eq!(
        media.discover("file:///clip.ogv").unwrap().duration,
        ClockTime::from_secs(3)
    );
    let err = media.discover("file:///other.ogv").unwrap_err();
    assert!(matches!(err, EditError::Resolution(_)));

    media.remove("file:///clip.ogv");
    assert!(media.discover("file:///clip.ogv").is_err());
}

#[test]
fn manifest_loads_from_disk() {
    let dir = std::env::temp_dir().join(format!("cutlist_manifest_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("media.json");
    let manifest = serde_json::json!({ "file:///a.ogv": video_only(1) });
    std::fs::write(&path, serde_json::to_vec(&manifest).unwrap()).unwrap();

    let media = StaticMediaInfo::from_manifest(&path).unwrap();
    assert!(media.discover("file:///a.ogv").is_ok());

    std::fs::write(&path, b"[1, 2").unwrap();
    assert!(matches!(
        StaticMediaInfo::from_manifest(&path),
        Err(EditError::Validation(_))
    ));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn uri_path_conversions() {
    assert_eq!(uri_to_path("file:///tmp/a.ogv"), PathBuf::from("/tmp/a.ogv"));
    assert_eq!(uri_to_path("/tmp/b.ogv"), PathBuf::from("/tmp/b.ogv"));
    assert_eq!(path_to_uri(Path::new("/tmp/c.ogv")), "file:///tmp/c.ogv");
}

#[test]
fn ff_ratio_rejects_zero_denominator() {
    assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
    assert_eq!(parse_ff_ratio("25/0"), None);
}
