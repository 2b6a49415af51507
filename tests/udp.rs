mod support;

use std::time::Duration;

use hawser::net::{Endpoint, SocketFactory, UdpSocketConfig};

use support::{next_event, stays_quiet, RecordingUdpHandler, UdpEvent};

#[tokio::test]
async fn datagrams_round_trip_between_two_sockets() {
    let factory = SocketFactory::new();

    let (handler_a, mut events_a) = RecordingUdpHandler::new();
    let socket_a = factory.create_udp(UdpSocketConfig::default(), handler_a);
    socket_a.open().unwrap();
    socket_a.bind(Endpoint::localhost(0)).unwrap();
    let addr_a = socket_a.local_endpoint().unwrap();

    let (handler_b, mut events_b) = RecordingUdpHandler::new();
    let socket_b = factory.create_udp(UdpSocketConfig::default(), handler_b);
    socket_b.open().unwrap();
    socket_b.bind(Endpoint::localhost(0)).unwrap();
    let addr_b = socket_b.local_endpoint().unwrap();

    socket_a.send(addr_b, b"ping").unwrap();

    match next_event(&mut events_a).await {
        UdpEvent::Sent(peer, data) => {
            assert_eq!(peer, addr_b);
            assert_eq!(data, b"ping");
        }
        other => panic!("expected Sent, got {:?}", other),
    }
    match next_event(&mut events_b).await {
        UdpEvent::Read(peer, data) => {
            assert_eq!(peer, addr_a);
            assert_eq!(data, b"ping");
        }
        other => panic!("expected Read, got {:?}", other),
    }
}

#[tokio::test]
async fn queued_sends_arrive_in_order() {
    let factory = SocketFactory::new();

    let (handler_tx, mut events_tx) = RecordingUdpHandler::new();
    let sender = factory.create_udp(UdpSocketConfig::default(), handler_tx);
    sender.open().unwrap();

    let (handler_rx, mut events_rx) = RecordingUdpHandler::new();
    let receiver = factory.create_udp(UdpSocketConfig::default(), handler_rx);
    receiver.open().unwrap();
    receiver.bind(Endpoint::localhost(0)).unwrap();
    let target = receiver.local_endpoint().unwrap();

    for i in 0..5u8 {
        sender.send(target, &[i; 8]).unwrap();
    }
    for i in 0..5u8 {
        match next_event(&mut events_tx).await {
            UdpEvent::Sent(_, data) => assert_eq!(data, vec![i; 8]),
            other => panic!("expected Sent, got {:?}", other),
        }
    }
    // Loopback keeps ordering in practice.
    for i in 0..5u8 {
        match next_event(&mut events_rx).await {
            UdpEvent::Read(_, data) => assert_eq!(data, vec![i; 8]),
            other => panic!("expected Read, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn close_with_drain_flushes_the_queue() {
    let factory = SocketFactory::new();

    let (handler_tx, mut events_tx) = RecordingUdpHandler::new();
    let sender = factory.create_udp(UdpSocketConfig::default(), handler_tx);
    sender.open().unwrap();

    let (handler_rx, mut events_rx) = RecordingUdpHandler::new();
    let receiver = factory.create_udp(UdpSocketConfig::default(), handler_rx);
    receiver.open().unwrap();
    receiver.bind(Endpoint::localhost(0)).unwrap();
    let target = receiver.local_endpoint().unwrap();

    for _ in 0..3 {
        sender.send(target, b"bye").unwrap();
    }
    sender.close(true).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            next_event(&mut events_tx).await,
            UdpEvent::Sent(_, _)
        ));
        assert!(matches!(
            next_event(&mut events_rx).await,
            UdpEvent::Read(_, _)
        ));
    }

    // Fully closed now: further sends are refused.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!sender.is_open());
    assert!(sender.send(target, b"late").is_err());
}

#[tokio::test]
async fn immediate_close_drops_the_queue() {
    let factory = SocketFactory::new();

    let (handler, mut events) = RecordingUdpHandler::new();
    let socket = factory.create_udp(UdpSocketConfig::default(), handler);
    socket.open().unwrap();
    socket.close(false).unwrap();

    assert!(!socket.is_open());
    assert!(socket.send(Endpoint::localhost(9), b"x").is_err());
    assert!(stays_quiet(&mut events, Duration::from_millis(100)).await);
}
