use super::*;

fn secs(v: u64) -> ClockTime {
    ClockTime::from_secs(v)
}

fn av_clip(start: u64, duration: u64) -> ClipBuilder {
    ClipBuilder::new(
        "test-pattern",
        AssetKind::TestClip,
        vec![TrackType::Audio, TrackType::Video],
    )
    .start(secs(start))
    .duration(secs(duration))
}

fn source_priority(tl: &Timeline, clip: ClipId, track_type: TrackType) -> u32 {
    tl.clip(clip)
        .unwrap()
        .source_elements()
        .iter()
        .filter_map(|e| tl.element(*e))
        .find(|e| e.track_type() == track_type)
        .unwrap()
        .priority()
}

#[test]
fn clips_flatten_into_compatible_tracks() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let clip = tl.add_clip(layer, av_clip(0, 10)).unwrap();

    let c = tl.clip(clip).unwrap();
    assert_eq!(c.source_elements().len(), 2);
    for el in c.source_elements() {
        let el = tl.element(*el).unwrap();
        assert_eq!(el.span(), c.span());
        assert_eq!(el.priority(), clip_band_base(0, 0));
    }

    let video_only = ClipBuilder::new("v", AssetKind::UriClip, vec![TrackType::Video])
        .start(secs(20))
        .duration(secs(1));
    let v = tl.add_clip(layer, video_only).unwrap();
    assert_eq!(tl.clip(v).unwrap().source_elements().len(), 1);
}

#[test]
fn overlap_creates_one_transition_per_track_and_move_removes_it() {
    let tl = Timeline::new_audio_video();
    tl.set_auto_transition(true).unwrap();
    let layer = tl.append_layer().unwrap();
    let a = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let b = tl.add_clip(layer, av_clip(5, 10)).unwrap();

    let transitions = tl.transitions(layer).unwrap();
    assert_eq!(transitions.len(), 1);
    let t = &transitions[0];
    assert_eq!((t.start(), t.duration()), (secs(5), secs(5)));
    assert_eq!(t.transition_pair(), Some((a, b)));
    assert_eq!(t.source_elements().len(), 2);
    for el in t.source_elements() {
        let el = tl.element(*el).unwrap();
        assert_eq!(el.kind(), ElementKind::Transition);
        assert_eq!(el.span(), t.span());
        let pa = source_priority(&tl, a, el.track_type());
        let pb = source_priority(&tl, b, el.track_type());
        assert!(pa.min(pb) < el.priority() && el.priority() < pa.max(pb));
    }

    tl.move_clip(b, secs(10)).unwrap();
    assert!(tl.transitions(layer).unwrap().is_empty());
    let on_tracks: usize = tl.tracks().iter().map(|t| t.len()).sum();
    assert_eq!(on_tracks, 4);
}

#[test]
fn resizing_updates_the_overlap() {
    let tl = Timeline::new_audio_video();
    tl.set_auto_transition(true).unwrap();
    let layer = tl.append_layer().unwrap();
    let a = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    tl.add_clip(layer, av_clip(5, 10)).unwrap();

    tl.set_clip_duration(a, secs(7)).unwrap();
    let transitions = tl.transitions(layer).unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].span().end(), secs(7));

    tl.remove_clip(a).unwrap();
    assert!(tl.transitions(layer).unwrap().is_empty());
}

#[test]
fn toggling_layer_auto_transition_recomputes_pairs() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    tl.add_clip(layer, av_clip(0, 10)).unwrap();
    tl.add_clip(layer, av_clip(5, 10)).unwrap();
    tl.add_clip(layer, av_clip(12, 10)).unwrap();
    assert!(tl.transitions(layer).unwrap().is_empty());

    tl.set_layer_auto_transition(layer, true).unwrap();
    assert_eq!(tl.transitions(layer).unwrap().len(), 2);
    tl.set_layer_auto_transition(layer, false).unwrap();
    assert!(tl.transitions(layer).unwrap().is_empty());

    tl.set_auto_transition(true).unwrap();
    let later = tl.append_layer().unwrap();
    assert!(tl.layer(later).unwrap().auto_transition());
}

#[test]
fn overlapping_clips_get_distinct_priorities() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let a = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let b = tl.add_clip(layer, av_clip(5, 10)).unwrap();
    let c = tl.add_clip(layer, av_clip(20, 1)).unwrap();
    assert_eq!(tl.clip(a).unwrap().priority(), 0);
    assert_eq!(tl.clip(b).unwrap().priority(), 1);
    assert_eq!(tl.clip(c).unwrap().priority(), 0);

    let err = tl.add_clip(layer, av_clip(2, 2).priority(1)).unwrap_err();
    assert!(matches!(err, EditError::Consistency(_)));
    assert_eq!(tl.clips().len(), 3);

    assert!(tl.set_clip_priority(c, MAX_CLIP_PRIORITY).is_err());
}

#[test]
fn moving_an_auto_priority_clip_onto_a_peer_reassigns_it() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let b = tl.add_clip(layer, av_clip(20, 10)).unwrap();
    assert_eq!(tl.clip(b).unwrap().priority(), 0);

    tl.move_clip(b, secs(5)).unwrap();
    assert_eq!(tl.clip(b).unwrap().priority(), 1);

    tl.set_clip_priority(b, 1).unwrap();
    tl.move_clip(b, secs(40)).unwrap();
    assert_eq!(tl.clip(b).unwrap().priority(), 1);
}

#[test]
fn effects_stack_above_their_source() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let clip = tl.add_clip(layer, av_clip(0, 10)).unwrap();

    assert_eq!(tl.add_effect(clip, "agingtv").unwrap(), 0);
    assert_eq!(tl.add_effect(clip, "volume").unwrap(), 1);

    let c = tl.clip(clip).unwrap();
    let fx = tl.element(c.effects()[0].elements()[0]).unwrap();
    assert_eq!(fx.track_type(), TrackType::Video);
    assert!(fx.priority() < source_priority(&tl, clip, TrackType::Video));
    assert_eq!(
        source_priority(&tl, clip, TrackType::Audio),
        clip_band_base(0, 0) + 1
    );

    let err = tl.add_effect(clip, "nowaythiselementexists").unwrap_err();
    assert!(matches!(err, EditError::Resolution(_)));
}

#[test]
fn track_added_later_is_flattened() {
    let tl = Timeline::new();
    tl.set_auto_transition(true).unwrap();
    let layer = tl.append_layer().unwrap();
    tl.add_clip(layer, av_clip(0, 10)).unwrap();
    tl.add_clip(layer, av_clip(5, 10)).unwrap();
    let t = &tl.transitions(layer).unwrap()[0];
    assert!(t.source_elements().is_empty());

    let video = tl.add_track(Track::new(TrackType::Video)).unwrap();
    assert_eq!(tl.track_elements(video).unwrap().len(), 3);
    assert_eq!(tl.transitions(layer).unwrap()[0].source_elements().len(), 1);

    let removed = tl.remove_track(video).unwrap();
    assert_eq!(removed.len(), 3);
    assert!(tl.clips().iter().all(|c| c.source_elements().is_empty()));
}

#[test]
fn inserting_a_layer_shifts_lower_layers() {
    let tl = Timeline::new_audio_video();
    let first = tl.append_layer().unwrap();
    let second = tl.append_layer().unwrap();
    let a = tl.add_clip(first, av_clip(0, 10)).unwrap();
    let b = tl.add_clip(second, av_clip(0, 10)).unwrap();

    let top = tl.insert_layer(0).unwrap();
    let priorities: Vec<_> = tl.layers().iter().map(|l| (l.id(), l.priority())).collect();
    assert_eq!(priorities, vec![(top, 0), (first, 1), (second, 2)]);
    assert_eq!(
        source_priority(&tl, a, TrackType::Video),
        clip_band_base(1, 0)
    );
    assert_eq!(
        source_priority(&tl, b, TrackType::Video),
        clip_band_base(2, 0)
    );

    tl.remove_layer(first).unwrap();
    assert!(tl.clip(a).is_none());
    assert_eq!(tl.layers().len(), 2);
}

#[test]
fn rebinding_yields_distinct_bindings() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let clip = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let el = tl.clip(clip).unwrap().source_elements()[0];

    let source = ControlSource::new();
    source.set(ClockTime::ZERO, 1.0).unwrap();
    let first = tl.set_control_source(el, &source, "alpha", "direct").unwrap();
    let second = tl.set_control_source(el, &source, "alpha", "direct").unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert!(Rc::ptr_eq(&tl.control_binding(el, "alpha").unwrap(), &second));

    assert!(tl.remove_control_binding(el, "alpha").unwrap());
    assert!(tl.control_binding(el, "alpha").is_none());
}

#[test]
fn trimmed_elements_stop_following_their_clip() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let clip = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let els = tl.clip(clip).unwrap().source_elements().to_vec();

    tl.trim_element(els[0], secs(1), secs(3)).unwrap();
    tl.move_clip(clip, secs(20)).unwrap();

    let trimmed = tl.element(els[0]).unwrap();
    assert!(!trimmed.is_locked());
    assert_eq!(trimmed.start(), secs(1));
    assert_eq!(tl.element(els[1]).unwrap().start(), secs(20));
}

#[test]
fn failed_edits_leave_the_timeline_untouched() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let a = tl.add_clip(layer, av_clip(0, 10).priority(0)).unwrap();
    let b = tl.add_clip(layer, av_clip(20, 10).priority(0)).unwrap();

    let err = tl.move_clip(b, secs(5)).unwrap_err();
    assert!(matches!(err, EditError::Consistency(_)));
    assert_eq!(tl.clip(b).unwrap().start(), secs(20));
    assert_eq!(tl.clip(a).unwrap().start(), secs(0));

    let el = tl.clip(b).unwrap().source_elements()[0];
    assert_eq!(tl.element(el).unwrap().start(), secs(20));
    assert!(tl.set_clip_duration(b, ClockTime::ZERO).is_err());
}

#[test]
fn disabled_elements_may_overlap_until_reenabled() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let clip = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let el = tl.clip(clip).unwrap().source_elements()[0];
    tl.set_element_active(el, false).unwrap();
    assert!(!tl.element(el).unwrap().is_active());
    tl.set_element_active(el, true).unwrap();

    tl.set_child_property(el, "pattern", "smpte").unwrap();
    assert_eq!(
        tl.element(el).unwrap().child_property("pattern"),
        Some(&MetaValue::String("smpte".to_string()))
    );
}

#[test]
fn layers_stop_at_the_highest_priority() {
    let tl = Timeline::new_audio_video();
    let last = tl.insert_layer(MAX_LAYER_PRIORITY).unwrap();
    assert!(matches!(tl.append_layer(), Err(EditError::Validation(_))));
    assert_eq!(tl.layers().len(), 1);

    let clip = tl
        .add_clip(last, av_clip(0, 10).priority(MAX_CLIP_PRIORITY - 1))
        .unwrap();
    let top = source_priority(&tl, clip, TrackType::Video);
    assert_eq!(
        top,
        clip_band_base(MAX_LAYER_PRIORITY, MAX_CLIP_PRIORITY - 1)
    );
}

#[test]
fn track_snapshots_are_isolated_from_later_edits() {
    let tl = Timeline::new_audio_video();
    let layer = tl.append_layer().unwrap();
    let a = tl.add_clip(layer, av_clip(0, 10)).unwrap();
    let b = tl.add_clip(layer, av_clip(20, 10)).unwrap();
    let el_a = tl.clip(a).unwrap().source_elements()[0];
    let el_b = tl.clip(b).unwrap().source_elements()[0];
    let before = tl.tracks();

    tl.set_child_property(el_a, "pattern", "smpte").unwrap();
    tl.move_clip(b, secs(40)).unwrap();
    assert!(tl.set_clip_duration(b, ClockTime::ZERO).is_err());

    let old = |id| before.iter().find_map(|t| t.element(id).cloned()).unwrap();
    assert_eq!(old(el_a).child_property("pattern"), None);
    assert_eq!(old(el_b).start(), secs(20));
    assert_eq!(
        tl.element(el_a).unwrap().child_property("pattern"),
        Some(&MetaValue::String("smpte".to_string()))
    );
    assert_eq!(tl.element(el_b).unwrap().start(), secs(40));
    assert_eq!(tl.clip(b).unwrap().start(), secs(40));
}
