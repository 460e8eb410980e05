use super::*;

fn span(start: u64, duration: u64) -> TimeSpan {
    TimeSpan::new(ClockTime::from_secs(start), ClockTime::from_secs(duration)).unwrap()
}

#[test]
fn span_contains_boundaries() {
    let s = span(2, 3);
    assert!(!s.contains(ClockTime::from_secs(1)));
    assert!(s.contains(ClockTime::from_secs(2)));
    assert!(s.contains(ClockTime::from_secs(4)));
    assert!(!s.contains(ClockTime::from_secs(5)));
}

#[test]
fn overlap_is_max_start_min_end() {
    let a = span(0, 10);
    let b = span(5, 10);
    assert_eq!(a.overlap(b), Some(span(5, 5)));
    assert_eq!(b.overlap(a), Some(span(5, 5)));

    // Touching intervals do not overlap.
    let c = span(10, 5);
    assert_eq!(a.overlap(c), None);
    assert!(!a.overlaps(c));
}

#[test]
fn span_rejects_overflow() {
    assert!(TimeSpan::new(ClockTime(u64::MAX), ClockTime(1)).is_err());
}

#[test]
fn clip_bands_order_layers_before_clips() {
    assert_eq!(clip_band_base(0, 0), MIN_ELEMENT_PRIORITY);
    assert!(clip_band_base(0, MAX_CLIP_PRIORITY) + CLIP_STRIDE <= clip_band_base(1, 0));
    assert!(clip_band_base(0, 1) < clip_band_base(1, 0));
}

#[test]
fn clock_time_display() {
    let t = ClockTime::from_millis(3_723_004);
    assert_eq!(t.to_string(), "1:02:03.004");
}
