use std::{sync::mpsc, time::Instant};

use super::*;
use crate::assets::asset::AssetKind;

struct Suffix;

impl ProxyTranscoder for Suffix {
    fn transcode(
        &self,
        source_uri: &str,
        _profile: &EncodingProfile,
        checkpoint: &ProxyCheckpoint,
    ) -> EditResult<String> {
        checkpoint.check()?;
        if source_uri.contains("broken") {
            return Err(EditError::resolution("cannot decode"));
        }
        Ok(format!("{source_uri}.proxy"))
    }
}

/// Spins on the checkpoint until cancelled.
struct Endless;

impl ProxyTranscoder for Endless {
    fn transcode(
        &self,
        _source_uri: &str,
        _profile: &EncodingProfile,
        checkpoint: &ProxyCheckpoint,
    ) -> EditResult<String> {
        loop {
            checkpoint.check()?;
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Finishes after a fixed delay without looking at the checkpoint.
struct Oblivious(Duration);

impl ProxyTranscoder for Oblivious {
    fn transcode(
        &self,
        source_uri: &str,
        _profile: &EncodingProfile,
        _checkpoint: &ProxyCheckpoint,
    ) -> EditResult<String> {
        thread::sleep(self.0);
        Ok(format!("{source_uri}.proxy"))
    }
}

fn items(ids: &[&str]) -> Vec<ProxyItem> {
    ids.iter()
        .map(|id| ProxyItem {
            key: AssetKey::new(*id, AssetKind::UriClip),
            source_uri: id.to_string(),
        })
        .collect()
}

fn drain(rx: &mpsc::Receiver<ProxyMsg>) -> Vec<ProxyMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.recv_timeout(Duration::from_secs(5)) {
        let done = matches!(msg, ProxyMsg::Finished { .. });
        out.push(msg);
        if done {
            break;
        }
    }
    out
}

#[test]
fn failures_do_not_abort_the_batch() {
    let (tx, rx) = mpsc::channel::<ProxyMsg>();
    spawn_batch(
        1,
        items(&["a", "broken", "c"]),
        EncodingProfile::default_proxy(),
        Arc::new(Suffix),
        CancellationToken::new(),
        Duration::from_millis(1),
        tx,
    )
    .unwrap();

    let msgs = drain(&rx);
    assert_eq!(msgs.len(), 4);
    let oks = msgs
        .iter()
        .filter(|m| matches!(m, ProxyMsg::ItemDone { result: Ok(_), .. }))
        .count();
    assert_eq!(oks, 2);
    assert!(matches!(
        msgs.last(),
        Some(ProxyMsg::Finished {
            batch: 1,
            cancelled: false
        })
    ));
}

#[test]
fn cancel_stops_in_flight_and_queued_items() {
    let (tx, rx) = mpsc::channel::<ProxyMsg>();
    let token = CancellationToken::new();
    spawn_batch(
        2,
        items(&["a", "b", "c"]),
        EncodingProfile::default_proxy(),
        Arc::new(Endless),
        token.clone(),
        Duration::from_millis(1),
        tx,
    )
    .unwrap();

    thread::sleep(Duration::from_millis(20));
    let started = Instant::now();
    token.cancel();
    let msgs = drain(&rx);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(msgs.len(), 1);
    assert!(matches!(
        msgs[0],
        ProxyMsg::Finished {
            batch: 2,
            cancelled: true
        }
    ));
}

#[test]
fn result_finished_after_cancel_is_not_reported() {
    let (tx, rx) = mpsc::channel::<ProxyMsg>();
    let token = CancellationToken::new();
    spawn_batch(
        3,
        items(&["a", "b"]),
        EncodingProfile::default_proxy(),
        Arc::new(Oblivious(Duration::from_millis(150))),
        token.clone(),
        Duration::from_millis(1),
        tx,
    )
    .unwrap();

    thread::sleep(Duration::from_millis(30));
    token.cancel();
    let msgs = drain(&rx);
    assert_eq!(msgs.len(), 1);
    assert!(matches!(
        msgs[0],
        ProxyMsg::Finished {
            batch: 3,
            cancelled: true
        }
    ));
}

#[test]
fn checkpoint_blocks_while_paused() {
    let token = CancellationToken::new();
    let paused = Arc::new(AtomicBool::new(true));
    let checkpoint = ProxyCheckpoint::new(token.clone(), paused.clone(), Duration::from_millis(1));

    let waiter = thread::spawn(move || checkpoint.check());
    thread::sleep(Duration::from_millis(20));
    assert!(!waiter.is_finished());
    paused.store(false, Ordering::SeqCst);
    assert!(waiter.join().unwrap().is_ok());

    token.cancel();
    let checkpoint = ProxyCheckpoint::new(token, Arc::new(AtomicBool::new(true)), Duration::from_millis(1));
    assert!(matches!(checkpoint.check(), Err(EditError::Cancelled(_))));
}
