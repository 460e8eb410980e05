use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use super::*;
use crate::{
    assets::asset::{AssetKind, StreamInfo},
    foundation::core::ClockTime,
};

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
    fail_first: bool,
}

impl MediaInfoProvider for Counting {
    fn discover(&self, uri: &str) -> EditResult<StreamInfo> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if uri.contains("missing") || (self.fail_first && n == 0) {
            return Err(EditError::resolution(format!("cannot open {uri}")));
        }
        Ok(StreamInfo {
            duration: ClockTime::from_secs(1),
            video: None,
            audio: None,
        })
    }
}

fn job(id: &str) -> ResolveJob {
    ResolveJob {
        key: AssetKey::new(id, AssetKind::UriClip),
        target_id: id.to_string(),
        generation: 1,
    }
}

#[test]
fn zero_threads_is_rejected() {
    let media: Arc<dyn MediaInfoProvider> = Arc::new(Counting::default());
    assert!(matches!(
        Loader::new(Some(0), media),
        Err(EditError::Validation(_))
    ));
}

#[test]
fn success_is_reported_after_one_attempt() {
    let media = Arc::new(Counting::default());
    let loader = Loader::new(Some(1), media.clone()).unwrap();
    let (tx, rx) = std::sync::mpsc::channel::<LoaderMsg>();
    loader.dispatch(job("file:///ok.ogv"), tx);

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        LoaderMsg::Resolved {
            attempts, outcome, ..
        } => {
            assert_eq!(attempts, 1);
            assert!(outcome.is_ok());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(media.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failure_retries_exactly_once() {
    let media = Arc::new(Counting::default());
    let loader = Loader::new(Some(1), media.clone()).unwrap();
    let (tx, rx) = std::sync::mpsc::channel::<LoaderMsg>();
    loader.dispatch(job("file:///missing.ogv"), tx);

    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        LoaderMsg::Retrying { .. }
    ));
    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        LoaderMsg::Resolved {
            attempts, outcome, ..
        } => {
            assert_eq!(attempts, MAX_ATTEMPTS);
            assert!(matches!(outcome, Err(EditError::Resolution(_))));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(media.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn transient_failure_recovers_on_retry() {
    let media = Arc::new(Counting {
        fail_first: true,
        ..Counting::default()
    });
    let loader = Loader::new(Some(1), media).unwrap();
    let (tx, rx) = std::sync::mpsc::channel::<LoaderMsg>();
    loader.dispatch(job("file:///flaky.ogv"), tx);

    let mut last = None;
    while let Ok(msg) = rx.recv_timeout(Duration::from_secs(5)) {
        if let LoaderMsg::Resolved { outcome, .. } = msg {
            last = Some(outcome);
            break;
        }
    }
    assert!(last.unwrap().is_ok());
}
