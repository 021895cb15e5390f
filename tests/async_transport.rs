#![cfg(feature = "tokio")]

use packstream::*;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn duplex_roundtrip_through_async_framers() {
    let (client, server) = tokio::io::duplex(7);

    let mut sender = StreamFramer::new(client);
    let mut receiver = StreamFramer::new(server);

    let values = vec![
        Value::from("over a tiny pipe"),
        Value::from(u64::MAX),
        Value::Map(vec![(Value::from("n"), Value::from(-3i8))]),
    ];

    let to_send = values.clone();
    let writer = async move {
        for v in &to_send {
            sender.send_async(v).await.unwrap();
        }
        sender.flush_async().await.unwrap();
        // Closing the write half ends the receiver's stream.
        sender.into_inner().shutdown().await.unwrap();
    };

    let reader = async {
        let mut received: Vec<Value> = Vec::new();
        receiver.run_async(&mut received).await.unwrap();
        received
    };

    let ((), received) = tokio::join!(writer, reader);
    assert_eq!(received, values);
}

#[tokio::test]
async fn async_pump_reports_malformed_input() {
    let (mut client, server) = tokio::io::duplex(64);
    client.write_all(&[0x01, 0xc1]).await.unwrap();
    drop(client);

    let mut framer = StreamFramer::new(server);
    let mut values: Vec<Value> = Vec::new();
    let result = framer.run_async(&mut values).await;
    assert!(matches!(result, Err(Error::Malformed { offset: 0, .. })));
    assert_eq!(values, vec![Value::UInt(1)]);
    assert_eq!(framer.state(), FramerState::Faulted);
}

#[tokio::test]
async fn encoded_bytes_pass_through_unchanged() {
    let (client, mut server) = tokio::io::duplex(64);
    let mut framer = StreamFramer::new(client);
    framer.send_encoded_async(&[0xa1, 0x61]).await.unwrap();
    drop(framer);

    let mut out = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut server, &mut out)
        .await
        .unwrap();
    assert_eq!(out, vec![0xa1, 0x61]);
}
