use packstream::*;
use std::io::{self, Cursor, Write};

struct FailingWriter {
    written: usize,
    fail_after: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.fail_after {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Simulated I/O error",
            ));
        }
        let remaining = self.fail_after - self.written;
        let n = remaining.min(buf.len());
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn framer_with(policy: MalformedPolicy) -> StreamFramer<io::Empty> {
    let config = FramerConfig::default().with_malformed_policy(policy);
    StreamFramer::with_config(io::empty(), MsgPackCodec::new(), config)
}

#[test]
fn io_error_propagates_from_send() {
    // Purpose: A write error from the wrapped transport must surface as Error::Io.
    let failing_writer = FailingWriter {
        written: 0,
        fail_after: 10,
    };
    let mut framer = StreamFramer::new(failing_writer);
    let msg = Value::from("This message will fail to write completely");
    match framer.send(&msg) {
        Ok(_) => panic!("expected I/O error"),
        Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        Err(e) => panic!("wrong error type: {e:?}"),
    }
}

#[test]
fn fault_policy_refuses_later_chunks_and_keeps_bytes() {
    let mut framer = framer_with(MalformedPolicy::Fault);
    let mut values: Vec<Value> = Vec::new();

    assert!(matches!(
        framer.feed(vec![0xc1, 0x01], &mut values),
        Err(Error::Malformed { .. })
    ));
    assert_eq!(framer.state(), FramerState::Faulted);
    assert_eq!(framer.pending(), Some(&[0xc1, 0x01][..]));

    // Valid traffic is no longer processed.
    assert!(matches!(
        framer.feed(vec![0x02], &mut values),
        Err(Error::Faulted)
    ));
    assert!(values.is_empty());
    assert_eq!(framer.buffered(), 2);
}

#[test]
fn clear_policy_discards_and_resumes() {
    let mut framer = framer_with(MalformedPolicy::Clear);
    let mut values: Vec<Value> = Vec::new();

    assert!(matches!(
        framer.feed(vec![0x07, 0xc1, 0x01], &mut values),
        Err(Error::Malformed { offset: 0, .. })
    ));
    // The value ahead of the bad byte was delivered; everything after it is gone.
    assert_eq!(values, vec![Value::UInt(7)]);
    assert_eq!(framer.state(), FramerState::Idle);
    assert_eq!(framer.buffered(), 0);

    assert_eq!(framer.feed(vec![0x02], &mut values).unwrap(), 1);
    assert_eq!(values, vec![Value::UInt(7), Value::UInt(2)]);
}

#[test]
fn reset_clears_a_fault() {
    let mut framer = framer_with(MalformedPolicy::Fault);
    let mut values: Vec<Value> = Vec::new();
    let _ = framer.feed(vec![0xc1], &mut values);
    assert_eq!(framer.state(), FramerState::Faulted);

    framer.reset();
    assert_eq!(framer.state(), FramerState::Idle);
    assert_eq!(framer.feed(vec![0xc0], &mut values).unwrap(), 1);
    assert_eq!(values, vec![Value::Nil]);
}

#[test]
fn invalid_utf8_string_is_malformed() {
    let mut framer = framer_with(MalformedPolicy::Fault);
    let mut values: Vec<Value> = Vec::new();
    let result = framer.feed(vec![0xa2, 0xc3, 0x28], &mut values);
    assert!(matches!(result, Err(Error::Malformed { offset: 0, .. })));
}

#[test]
fn buffer_limit_is_enforced_after_draining() {
    let config = FramerConfig::default().with_max_buffered(4);
    let mut framer = StreamFramer::with_config(io::empty(), MsgPackCodec::new(), config);
    let mut values: Vec<Value> = Vec::new();

    // Complete values never count against the limit.
    let many = pack(&vec![Value::from(1u8); 32]).unwrap();
    assert_eq!(framer.feed(many, &mut values).unwrap(), 32);

    // A 10-byte string header with only 4 payload bytes fits...
    framer.feed(vec![0xaa, b'a', b'b', b'c'], &mut values).unwrap();
    // ...one more byte does not.
    match framer.feed(vec![b'd'], &mut values) {
        Err(e @ Error::BufferLimitExceeded { .. }) => {
            assert!(e.is_decode_failure());
            assert!(matches!(
                e,
                Error::BufferLimitExceeded {
                    buffered: 5,
                    limit: 4
                }
            ));
        }
        other => panic!("expected BufferLimitExceeded, got {other:?}"),
    }
    assert_eq!(framer.state(), FramerState::Faulted);
}

#[test]
fn buffer_limit_with_clear_policy_drops_the_backlog() {
    let config = FramerConfig::default()
        .with_max_buffered(2)
        .with_malformed_policy(MalformedPolicy::Clear);
    let mut framer = StreamFramer::with_config(io::empty(), MsgPackCodec::new(), config);
    let mut values: Vec<Value> = Vec::new();

    assert!(framer.feed(vec![0xa5, 1, 2], &mut values).is_err());
    assert_eq!(framer.buffered(), 0);
    assert_eq!(framer.feed(vec![0xc3], &mut values).unwrap(), 1);
}

#[test]
fn transport_error_stops_progress_without_losing_buffer() {
    struct BrokenTransport;

    impl io::Read for BrokenTransport {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"))
        }
    }

    let mut framer = StreamFramer::new(BrokenTransport);
    let mut values: Vec<Value> = Vec::new();
    framer.feed(vec![0xa2, b'h'], &mut values).unwrap();

    match framer.pump(&mut values) {
        Err(e @ Error::Io(_)) => assert!(!e.is_decode_failure()),
        other => panic!("expected Io error, got {other:?}"),
    }
    // Transport errors are not decode failures.
    assert_eq!(framer.state(), FramerState::Buffering);
    assert_eq!(framer.buffered(), 2);
}

#[test]
fn process_all_stops_on_processor_error() {
    let values: Vec<Value> = (1u8..=4).map(Value::from).collect();
    let bytes = pack(&values).unwrap();
    let mut framer = StreamFramer::new(Cursor::new(bytes));

    let mut count = 0;
    let result = framer.process_all(|_value| {
        count += 1;
        if count == 3 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "Simulated processing error",
            )));
        }
        Ok(())
    });

    match result {
        Err(Error::Io(e)) => assert_eq!(e.to_string(), "Simulated processing error"),
        other => panic!("expected Io error, got {other:?}"),
    }
    assert_eq!(count, 3);
}

#[test]
fn process_all_delivers_values_ahead_of_malformed_input() {
    let mut framer = StreamFramer::new(Cursor::new(vec![0x01, 0x02, 0xc1]));
    let mut seen = Vec::new();
    let result = framer.process_all(|value| {
        seen.push(value);
        Ok(())
    });
    assert!(matches!(result, Err(Error::Malformed { .. })));
    assert_eq!(seen, vec![Value::UInt(1), Value::UInt(2)]);
}

#[test]
fn values_iterator_yields_error_after_pending_values() {
    let mut framer = StreamFramer::new(Cursor::new(vec![0x05, 0xc1]));
    let items: Vec<_> = framer.values().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), &Value::UInt(5));
    assert!(matches!(items[1], Err(Error::Malformed { offset: 0, .. })));
}

#[test]
fn encode_error_writes_nothing() {
    struct RejectingCodec;

    impl Codec for RejectingCodec {
        type Item = u32;

        fn encode(&self, item: &u32, out: &mut Vec<u8>) -> Result<()> {
            if *item > 9 {
                return Err(Error::encode("digit out of range"));
            }
            out.push(b'0' + *item as u8);
            Ok(())
        }

        fn decode(&self, _buf: &[u8]) -> DecodeOutcome<u32> {
            DecodeOutcome::Incomplete
        }
    }

    let mut framer = StreamFramer::with_codec(Vec::<u8>::new(), RejectingCodec);
    assert!(matches!(
        framer.send_all(&[1, 2, 42]),
        Err(Error::Encode { .. })
    ));
    assert!(framer.get_ref().is_empty());
}
