use std::{
    io::Write,
    net::{TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use nbs_blend::{BlendBuffer, FanoutReader, SocketSlot};
use nbs_wire::{Frame, FrameCommand, FrameHeader, Pdh, SYNC_BYTE};

fn data_frame(source: u8, fh_seq: u32, product_seq: u32, block: u16) -> Frame {
    let header = FrameHeader {
        version: 1,
        size: 16,
        command: FrameCommand::Data,
        datastream: 5,
        source,
        sequence_number: fh_seq,
        run_number: 1,
    };
    let pdh = Pdh {
        version: 1,
        size: 16,
        total_size: 16,
        block_number: block,
        data_block_size: 8,
        product_sequence_number: product_seq,
        ..Pdh::default()
    };
    Frame::assemble(header, pdh, &[], b"weather!")
}

struct RunningReader {
    slot: SocketSlot,
    stats: Arc<nbs_blend::ReaderStats>,
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl RunningReader {
    fn spawn(buffer: &Arc<BlendBuffer>) -> (Self, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader = FanoutReader::new(addr, Arc::clone(buffer), Arc::clone(&stop));
        let slot = reader.socket_slot();
        let stats = reader.stats();
        let handle = thread::spawn(move || reader.run());

        let (conn, _) = listener.accept().unwrap();
        (Self { slot, stats, stop, handle }, conn)
    }

    fn stop(self) -> Arc<nbs_blend::ReaderStats> {
        self.stop.store(true, Ordering::Relaxed);
        self.slot.shutdown();
        self.handle.join().unwrap();
        self.stats
    }
}

/// Garbage injected mid-stream costs exactly one resync episode; the next
/// well-formed frame and everything after it still come through.
#[test]
fn reader_resyncs_over_injected_garbage() {
    let buffer = Arc::new(BlendBuffer::new(Duration::from_millis(200)));
    let (reader, mut conn) = RunningReader::spawn(&buffer);

    conn.write_all(data_frame(7, 300, 1, 0).bytes()).unwrap();
    let junk: Vec<u8> =
        (0..50u8).map(|i| if i % 7 == 0 { SYNC_BYTE } else { i.wrapping_mul(3) }).collect();
    conn.write_all(&junk).unwrap();
    conn.write_all(data_frame(7, 301, 1, 1).bytes()).unwrap();
    conn.flush().unwrap();

    assert_eq!(buffer.next_frame().unwrap().header().sequence_number, 300);
    assert_eq!(buffer.next_frame().unwrap().header().sequence_number, 301);

    let stats = reader.stop();
    assert_eq!(stats.frames.load(Ordering::Relaxed), 2);
    assert_eq!(stats.resync_episodes.load(Ordering::Relaxed), 1);
}

/// Two fanout servers feeding the same ten frames produce exactly ten
/// emissions in stream order; the redundant copies are all dropped.
#[test]
fn redundant_fanouts_blend_to_one_ordered_stream() {
    let buffer = Arc::new(BlendBuffer::new(Duration::from_millis(100)));
    let (reader_a, mut conn_a) = RunningReader::spawn(&buffer);
    let (reader_b, mut conn_b) = RunningReader::spawn(&buffer);

    for conn in [&mut conn_a, &mut conn_b] {
        for block in 0..10u16 {
            conn.write_all(data_frame(7, 200 + u32::from(block), 1, block).bytes()).unwrap();
        }
        conn.flush().unwrap();
    }

    for block in 0..10u16 {
        assert_eq!(buffer.next_frame().unwrap().pdh().block_number, block);
    }

    // Wait for both feeds to be fully classified before checking counters.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stats = buffer.stats();
        if stats.accepted + stats.duplicate + stats.late == 20 {
            assert_eq!(stats.accepted, 10);
            assert_eq!(stats.emitted, 10);
            assert_eq!(stats.duplicate + stats.late, 10);
            break;
        }
        assert!(Instant::now() < deadline, "readers never delivered all 20 frames");
        thread::sleep(Duration::from_millis(5));
    }

    reader_a.stop();
    reader_b.stop();
}

/// A stopped reader leaves its blocking read promptly once its socket is
/// shut down, without waiting out the reconnect backoff.
#[test]
fn reader_stops_from_a_blocking_read() {
    let buffer = Arc::new(BlendBuffer::new(Duration::from_millis(100)));
    let (reader, mut conn) = RunningReader::spawn(&buffer);

    conn.write_all(data_frame(7, 400, 1, 0).bytes()).unwrap();
    conn.flush().unwrap();
    assert_eq!(buffer.next_frame().unwrap().header().sequence_number, 400);

    let start = Instant::now();
    let stats = reader.stop();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.frames.load(Ordering::Relaxed), 1);
}
