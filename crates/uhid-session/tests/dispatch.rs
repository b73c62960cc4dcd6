//! Inbound dispatch through a real socket pair.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::net::UnixDatagram;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use uhid_protocol::{DATA_MAX, EVENT_SIZE, EventType, GetReportRequest, UhidEvent};
use uhid_session::{SessionBackend, UhidBackend};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn output_event_reaches_output_handler_only() -> TestResult {
    LocalSet::new()
        .run_until(async {
            let (local, peer) = UnixDatagram::pair()?;
            let mut session = UhidBackend::new().attach(local)?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            let seen = Rc::new(RefCell::new(Vec::new()));
            for kind in [EventType::Output, EventType::FEATURE] {
                let tx = tx.clone();
                let seen = Rc::clone(&seen);
                session.register(
                    kind,
                    Box::new(move |event| {
                        seen.borrow_mut().push(event.event_type());
                        let _ = tx.send(kind);
                    }),
                );
            }

            peer.send(&UhidEvent::zeroed(EventType::Output).encode()?)
                .await?;

            assert_eq!(rx.recv().await, Some(EventType::Output));
            assert_eq!(*seen.borrow(), vec![EventType::Output]);
            session.release();
            Ok(())
        })
        .await
}

#[tokio::test]
async fn feature_request_is_decoded() -> TestResult {
    LocalSet::new()
        .run_until(async {
            let (local, peer) = UnixDatagram::pair()?;
            let mut session = UhidBackend::new().attach(local)?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            session.register(
                EventType::FEATURE,
                Box::new(move |event| {
                    let _ = tx.send(event.clone());
                }),
            );

            let request = UhidEvent::GetReport(GetReportRequest {
                id: 42,
                rnum: 1,
                rtype: uhid_protocol::report_type::FEATURE,
            });
            peer.send(&request.encode()?).await?;

            assert_eq!(rx.recv().await, Some(request));
            Ok(())
        })
        .await
}

#[tokio::test]
async fn garbage_frames_are_dropped_without_dispatch() -> TestResult {
    LocalSet::new()
        .run_until(async {
            let (local, peer) = UnixDatagram::pair()?;
            let mut session = UhidBackend::new().attach(local)?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            session.register(
                EventType::Output,
                Box::new(move |event| {
                    let _ = tx.send(event.event_type());
                }),
            );

            peer.send(&[0xEE, 0, 0, 0]).await?;
            peer.send(&UhidEvent::zeroed(EventType::Output).encode()?)
                .await?;

            assert_eq!(rx.recv().await, Some(EventType::Output));
            assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty)));
            Ok(())
        })
        .await
}

#[tokio::test]
async fn oversized_frames_are_dropped_without_dispatch() -> TestResult {
    LocalSet::new()
        .run_until(async {
            let (local, peer) = UnixDatagram::pair()?;
            let mut session = UhidBackend::new().attach(local)?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            session.register(
                EventType::Output,
                Box::new(move |event| {
                    let _ = tx.send(event.clone());
                }),
            );

            let mut oversized = UhidEvent::zeroed(EventType::Output).encode()?;
            // data[0] = 0x5A, size = 1: decodes differently from the zeroed event.
            oversized[4] = 0x5A;
            oversized[4 + DATA_MAX] = 1;
            oversized.resize(EVENT_SIZE + 600, 0);
            peer.send(&oversized).await?;
            peer.send(&UhidEvent::zeroed(EventType::Output).encode()?)
                .await?;

            assert_eq!(rx.recv().await, Some(UhidEvent::zeroed(EventType::Output)));
            assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty)));
            Ok(())
        })
        .await
}
