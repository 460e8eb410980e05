use super::*;

fn ms(v: u64) -> ClockTime {
    ClockTime::from_millis(v)
}

#[test]
fn linear_interpolates_and_clamps() {
    let source = ControlSource::new();
    source.set(ms(0), 0.0).unwrap();
    source.set(ms(10), 10.0).unwrap();

    assert_eq!(source.value_at(ms(5)), Some(5.0));
    assert_eq!(source.value_at(ms(10)), Some(10.0));
    assert_eq!(source.value_at(ms(50)), Some(10.0));
}

#[test]
fn hold_keeps_previous_value() {
    let source = ControlSource::with_mode(InterpolationMode::Hold);
    source.set(ms(10), 1.0).unwrap();
    source.set(ms(20), 2.0).unwrap();

    assert_eq!(source.value_at(ms(0)), Some(1.0));
    assert_eq!(source.value_at(ms(15)), Some(1.0));
    assert_eq!(source.value_at(ms(20)), Some(2.0));
    assert_eq!(ControlSource::new().value_at(ms(0)), None);
}

#[test]
fn keyframes_stay_sorted_and_unique() {
    let source = ControlSource::new();
    source
        .set_from_list(&[
            TimedValue {
                timestamp: ms(20),
                value: 2.0,
            },
            TimedValue {
                timestamp: ms(0),
                value: 0.0,
            },
        ])
        .unwrap();
    source.set(ms(20), 3.0).unwrap();

    let values: Vec<_> = source.values().iter().map(|v| (v.timestamp, v.value)).collect();
    assert_eq!(values, vec![(ms(0), 0.0), (ms(20), 3.0)]);
    assert!(source.unset(ms(0)));
    assert!(!source.unset(ms(0)));
    source.unset_all();
    assert!(source.is_empty());
}

#[test]
fn non_finite_values_are_rejected() {
    let source = ControlSource::new();
    assert!(source.set(ms(0), f64::NAN).is_err());
    assert!(source.is_empty());
}

#[test]
fn binding_modes_parse() {
    assert_eq!("direct".parse::<BindingMode>().unwrap(), BindingMode::Direct);
    assert_eq!(
        "direct-absolute".parse::<BindingMode>().unwrap(),
        BindingMode::DirectAbsolute
    );
    assert!("relative".parse::<BindingMode>().is_err());
}

#[test]
fn clones_share_the_curve() {
    let a = ControlSource::new();
    let b = a.clone();
    b.set(ms(1), 1.0).unwrap();
    assert_eq!(a.len(), 1);
    assert!(a.same_source(&b));
    assert!(!a.same_source(&ControlSource::new()));
}
