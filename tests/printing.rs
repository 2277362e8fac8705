//! # Printing Tests
//!
//! End-to-end runs of the command set and print sequence against a
//! [`ScriptedTransport`] standing in for the printer.
//!
//! ## Test Coverage
//!
//! - **Settings**: `OK` is the only success; other replies are `false`
//! - **Stop print**: `AA…` and `OK…` acknowledge, anything else does not
//! - **Correlation**: concurrent queries with fragmented replies stay apart
//! - **Sequence**: exact byte order of a two-copy job, and the not-ready abort

use std::time::Duration;

use fichero::error::{FicheroError, PrintStep};
use fichero::printer::{PrintJob, PrintProgress, Printer, Timing};
use fichero::protocol::graphics::{Density, PaperType};
use fichero::render::Raster;
use fichero::transport::{ScriptHandle, ScriptedTransport, TransportKind};
use pretty_assertions::assert_eq;

const SET_DENSITY: &[u8] = &[0x10, 0xFF, 0x10, 0x00];
const GET_STATUS: &[u8] = &[0x10, 0xFF, 0x40];
const SET_PAPER: &[u8] = &[0x10, 0xFF, 0x84];
const STOP_PRINT: &[u8] = &[0x10, 0xFF, 0xFE, 0x45];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

async fn connect(transport: ScriptedTransport, timing: Timing) -> (Printer, ScriptHandle) {
    let handle = transport.handle();
    let printer = Printer::with_transport(Box::new(transport), timing)
        .await
        .expect("scripted transport subscribes");
    (printer, handle)
}

/// A printer that acknowledges everything and reports ready.
fn happy_printer(kind: TransportKind) -> ScriptedTransport {
    ScriptedTransport::new(kind)
        .respond(SET_DENSITY, b"OK")
        .respond(GET_STATUS, &[0x00])
        .respond(SET_PAPER, b"OK")
        .respond(STOP_PRINT, &[0xAA, 0x00])
}

fn black_raster(rows: u16) -> Raster {
    Raster {
        width: 96,
        rows,
        data: vec![0xFF; 12 * rows as usize],
    }
}

fn is_raster_write(write: &[u8]) -> bool {
    write.starts_with(&[0x1D, 0x76, 0x30]) || (!write.is_empty() && write.iter().all(|&b| b == 0xFF))
}

// ============================================================================
// SETTINGS
// ============================================================================

#[tokio::test]
async fn test_set_paper_type_ok() {
    let (printer, handle) = connect(
        ScriptedTransport::new(TransportKind::Ble).respond(SET_PAPER, b"OK"),
        Timing::ZERO,
    )
    .await;
    assert!(printer.set_paper_type(PaperType::Continuous).await.unwrap());
    assert_eq!(handle.writes(), vec![vec![0x10, 0xFF, 0x84, 0x02]]);
}

#[tokio::test]
async fn test_set_paper_type_error_reply() {
    let (printer, _) = connect(
        ScriptedTransport::new(TransportKind::Ble).respond(SET_PAPER, b"ER"),
        Timing::ZERO,
    )
    .await;
    assert!(!printer.set_paper_type(PaperType::Gap).await.unwrap());
}

#[tokio::test]
async fn test_set_paper_type_empty_reply() {
    let (printer, _) = connect(
        ScriptedTransport::new(TransportKind::Ble).respond(SET_PAPER, b""),
        Timing::ZERO,
    )
    .await;
    assert!(!printer.set_paper_type(PaperType::Gap).await.unwrap());
}

#[tokio::test]
async fn test_set_shutdown_time_big_endian() {
    let (printer, handle) = connect(
        ScriptedTransport::new(TransportKind::Rfcomm).respond(&[0x10, 0xFF, 0x12], b"OK"),
        Timing::ZERO,
    )
    .await;
    assert!(printer.set_shutdown_time(300).await.unwrap());
    assert_eq!(handle.writes(), vec![vec![0x10, 0xFF, 0x12, 0x01, 0x2C]]);
}

// ============================================================================
// STOP PRINT
// ============================================================================

async fn stop_with(reply: &[u8]) -> bool {
    let (printer, _) = connect(
        ScriptedTransport::new(TransportKind::Ble).respond(STOP_PRINT, reply),
        Timing::ZERO,
    )
    .await;
    printer.stop_print().await.unwrap()
}

#[tokio::test]
async fn test_stop_print_acknowledgements() {
    assert!(stop_with(&[0xAA, 0x00]).await);
    assert!(stop_with(b"OK").await);
    assert!(stop_with(b"OK\r\n").await);
    assert!(!stop_with(b"NO").await);
    assert!(!stop_with(b"").await);
}

// ============================================================================
// CORRELATION
// ============================================================================

#[tokio::test]
async fn test_concurrent_queries_get_their_own_replies() {
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .reply(
            &[0x10, 0xFF, 0x20, 0xF0],
            vec![
                (Duration::ZERO, b"D1".to_vec()),
                (Duration::from_millis(10), b"1s".to_vec()),
            ],
        )
        .reply(
            &[0x10, 0xFF, 0x20, 0xF1],
            vec![
                (Duration::ZERO, b"2.4".to_vec()),
                (Duration::from_millis(15), b".6".to_vec()),
            ],
        );
    let timing = Timing {
        notify_settle: Duration::from_millis(60),
        ..Timing::ZERO
    };
    let (printer, handle) = connect(transport, timing).await;

    let (model, firmware) = tokio::join!(printer.get_model(), printer.get_firmware());
    assert_eq!(model.unwrap(), "D11s");
    assert_eq!(firmware.unwrap(), "2.4.6");
    assert_eq!(handle.writes().len(), 2);
}

#[tokio::test]
async fn test_timeout_names_the_failing_step() {
    // Status never answers.
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .respond(SET_DENSITY, b"OK")
        .respond(SET_PAPER, b"OK");
    let (printer, _) = connect(transport, Timing::ZERO).await;
    let job = PrintJob::new(black_raster(4), Density::Thick, PaperType::Gap, 1).unwrap();

    let err = printer.print(&job).await.unwrap_err();
    match &err {
        FicheroError::Job { step, copy, .. } => {
            assert_eq!(*step, PrintStep::Status);
            assert_eq!(*copy, 1);
        }
        other => panic!("expected job error, got {:?}", other),
    }
    assert!(matches!(err.root(), FicheroError::Timeout(_)));
}

#[tokio::test]
async fn test_silent_density_aborts_job() {
    // Density never answers; everything else would.
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .respond(GET_STATUS, &[0x00])
        .respond(SET_PAPER, b"OK")
        .respond(STOP_PRINT, &[0xAA]);
    let (printer, handle) = connect(transport, Timing::ZERO).await;
    let job = PrintJob::new(black_raster(4), Density::Thick, PaperType::Gap, 1).unwrap();

    let err = printer.print(&job).await.unwrap_err();
    assert!(matches!(
        err,
        FicheroError::Job {
            step: PrintStep::Density,
            copy: 1,
            ..
        }
    ));
    assert!(matches!(err.root(), FicheroError::Timeout(_)));
    assert_eq!(handle.writes(), vec![vec![0x10, 0xFF, 0x10, 0x00, 0x02]]);
}

// ============================================================================
// PRINT SEQUENCE
// ============================================================================

#[tokio::test]
async fn test_two_copy_job_byte_order() {
    let (printer, handle) = connect(happy_printer(TransportKind::Ble), Timing::ZERO).await;
    let raster = black_raster(20);
    let job = PrintJob::new(raster.clone(), Density::Medium, PaperType::Gap, 2).unwrap();

    let report = printer.print(&job).await.unwrap();
    assert_eq!(report.copies, 2);
    assert_eq!(report.acknowledged, vec![true, true]);

    let mut payload = vec![0x1D, 0x76, 0x30, 0x00, 12, 0x00, 20, 0x00];
    payload.extend(&raster.data);
    assert_eq!(payload.len(), 248);

    let mut expected = vec![vec![0x10, 0xFF, 0x10, 0x00, 0x01]];
    for _ in 0..2 {
        expected.push(vec![0x10, 0xFF, 0x40]);
        expected.push(vec![0x10, 0xFF, 0x84, 0x00]);
        expected.push(vec![0x00; 12]);
        expected.push(vec![0x10, 0xFF, 0xFE, 0x01]);
        expected.push(payload[..200].to_vec());
        expected.push(payload[200..].to_vec());
        expected.push(vec![0x1D, 0x0C]);
        expected.push(vec![0x10, 0xFF, 0xFE, 0x45]);
    }
    assert_eq!(handle.writes(), expected);
}

#[tokio::test]
async fn test_stream_link_sends_raster_in_one_write() {
    let (printer, handle) = connect(happy_printer(TransportKind::Rfcomm), Timing::ZERO).await;
    let job = PrintJob::new(black_raster(240), Density::Thick, PaperType::Gap, 1).unwrap();

    printer.print(&job).await.unwrap();

    let rasters: Vec<usize> = handle
        .writes()
        .iter()
        .filter(|w| is_raster_write(w))
        .map(Vec::len)
        .collect();
    assert_eq!(rasters, vec![8 + 12 * 240]);
}

#[tokio::test]
async fn test_not_ready_aborts_before_raster() {
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .respond(SET_DENSITY, b"OK")
        .respond(GET_STATUS, &[0x02]); // cover open
    let (printer, handle) = connect(transport, Timing::ZERO).await;
    let job = PrintJob::new(black_raster(8), Density::Thick, PaperType::Gap, 3).unwrap();

    let err = printer.print(&job).await.unwrap_err();
    match err {
        FicheroError::NotReady { status } => {
            assert!(status.cover_open);
            assert_eq!(status.raw, 0x02);
        }
        other => panic!("expected NotReady, got {:?}", other),
    }

    let writes = handle.writes();
    assert_eq!(
        writes,
        vec![vec![0x10, 0xFF, 0x10, 0x00, 0x02], vec![0x10, 0xFF, 0x40]]
    );
}

#[tokio::test]
async fn test_second_copy_stops_when_paper_runs_out() {
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .respond(SET_DENSITY, b"OK")
        .reply_once(GET_STATUS, vec![(Duration::ZERO, vec![0x00])])
        .respond(GET_STATUS, &[0x04]) // no paper
        .respond(SET_PAPER, b"OK")
        .respond(STOP_PRINT, b"OK");
    let (printer, handle) = connect(transport, Timing::ZERO).await;
    let job = PrintJob::new(black_raster(8), Density::Thick, PaperType::Gap, 2).unwrap();

    let err = printer.print(&job).await.unwrap_err();
    assert!(matches!(err, FicheroError::NotReady { status } if status.no_paper));

    // The first copy went out in full.
    let raster_writes = handle.writes().iter().filter(|w| is_raster_write(w)).count();
    assert_eq!(raster_writes, 1);
}

#[tokio::test]
async fn test_missing_stop_ack_is_not_fatal() {
    let transport = ScriptedTransport::new(TransportKind::Ble)
        .respond(SET_DENSITY, b"OK")
        .respond(GET_STATUS, &[0x00])
        .respond(SET_PAPER, b"OK")
        .respond(STOP_PRINT, b"NO");
    let (printer, _) = connect(transport, Timing::ZERO).await;
    let job = PrintJob::new(black_raster(8), Density::Thick, PaperType::Gap, 1).unwrap();

    let report = printer.print(&job).await.unwrap();
    assert_eq!(report.acknowledged, vec![false]);
    assert!(!report.all_acknowledged());
}

#[tokio::test]
async fn test_progress_follows_sequence() {
    let (printer, _) = connect(happy_printer(TransportKind::Ble), Timing::ZERO).await;
    let job = PrintJob::new(black_raster(8), Density::Thick, PaperType::Gap, 1).unwrap();

    let mut seen: Vec<PrintProgress> = Vec::new();
    printer
        .print_with_progress(&job, |p| seen.push(p))
        .await
        .unwrap();

    let stages: Vec<PrintStep> = seen.iter().map(|p| p.stage).collect();
    assert_eq!(
        stages,
        vec![
            PrintStep::Density,
            PrintStep::Status,
            PrintStep::PaperType,
            PrintStep::Wakeup,
            PrintStep::Enable,
            PrintStep::Raster,
            PrintStep::FormFeed,
            PrintStep::StopPrint,
        ]
    );
    assert!(seen.iter().all(|p| p.copy == 1 && p.total == 1));
}
