use serde::{Deserialize, Serialize};
use tether_core::{ChannelAddress, ClientId, ServiceTags};
use tether_fabric::{
    channel::{TypedPublisher, TypedSubscriber},
    error::Error,
    transport::{MemoryTransport, Publisher, Subscriber, Transport},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TestMessage {
    id: u32,
    value: u64,
}

const APP: &str = "fabric-tests";

/// Helper to get a registered transport and a request address
fn setup(transport: MemoryTransport) -> (MemoryTransport, ChannelAddress) {
    transport.register(APP).unwrap();
    let address = ServiceTags::new("TestRequest", "TestResponse")
        .unwrap()
        .request_channel();
    (transport, address)
}

#[test]
fn send_receive_single_message() {
    let (transport, address) = setup(MemoryTransport::new());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    let mut sample = publisher.loan().unwrap();
    sample.write(b"hello world").unwrap();
    publisher.publish(sample).unwrap();

    let received = subscriber.take().unwrap().unwrap();
    assert_eq!(&*received, b"hello world");
    assert!(subscriber.take().unwrap().is_none());
}

#[test]
fn multiple_messages_preserve_order() {
    let (transport, address) = setup(MemoryTransport::new());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    let messages = vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()];
    for msg in &messages {
        let mut sample = publisher.loan().unwrap();
        sample.write(msg).unwrap();
        publisher.publish(sample).unwrap();
    }

    for msg in &messages {
        let received = subscriber.take().unwrap().unwrap();
        assert_eq!(&*received, msg.as_slice());
    }
}

#[test]
fn every_subscriber_sees_each_sample() {
    let (transport, address) = setup(MemoryTransport::new());
    let first = transport.create_subscriber(APP, &address).unwrap();
    let second = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    let mut sample = publisher.loan().unwrap();
    sample.write(b"fan-out").unwrap();
    publisher.publish(sample).unwrap();

    assert_eq!(&*first.take().unwrap().unwrap(), b"fan-out");
    assert_eq!(&*second.take().unwrap().unwrap(), b"fan-out");
}

#[test]
fn channels_are_isolated_by_instance_tag() {
    let (transport, _) = setup(MemoryTransport::new());
    let tags = ServiceTags::new("TestRequest", "TestResponse").unwrap();
    let mine = transport
        .create_subscriber(APP, &tags.response_channel(ClientId::new(1)))
        .unwrap();
    let theirs = transport
        .create_subscriber(APP, &tags.response_channel(ClientId::new(2)))
        .unwrap();
    let publisher = transport
        .create_publisher(APP, &tags.response_channel(ClientId::new(1)))
        .unwrap();

    let mut sample = publisher.loan().unwrap();
    sample.write(b"for 1").unwrap();
    publisher.publish(sample).unwrap();

    assert!(mine.take().unwrap().is_some());
    assert!(theirs.take().unwrap().is_none());
}

#[test]
fn publish_without_subscriber_releases_slot() {
    let (transport, address) = setup(MemoryTransport::builder().slot_count(1).build().unwrap());
    let publisher = transport.create_publisher(APP, &address).unwrap();

    for _ in 0..3 {
        let sample = publisher.loan().unwrap();
        publisher.publish(sample).unwrap();
    }
    assert_eq!(transport.free_slots(), 1);
}

#[test]
fn loan_fails_when_pool_is_exhausted() {
    let (transport, address) = setup(MemoryTransport::builder().slot_count(2).build().unwrap());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    // Two samples parked in the subscriber queue hold both slots
    for _ in 0..2 {
        let sample = publisher.loan().unwrap();
        publisher.publish(sample).unwrap();
    }
    assert_eq!(publisher.loan().unwrap_err(), Error::PoolExhausted { capacity: 2 });

    // Taking and dropping a sample frees its slot
    drop(subscriber.take().unwrap());
    assert!(publisher.loan().is_ok());
}

#[test]
fn full_queue_drops_oldest() {
    let (transport, address) = setup(MemoryTransport::builder().queue_capacity(2).build().unwrap());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = TypedPublisher::<u32, _>::new(transport.create_publisher(APP, &address).unwrap());

    for n in 0..3u32 {
        publisher.send(&n).unwrap();
    }

    assert_eq!(subscriber.pending(), 2);
    assert_eq!(subscriber.dropped(), 1);

    let typed = TypedSubscriber::<u32, _>::new(subscriber);
    assert_eq!(typed.take().unwrap(), Some(1));
    assert_eq!(typed.take().unwrap(), Some(2));
}

#[test]
fn dropped_subscriber_releases_queued_samples() {
    let (transport, address) = setup(MemoryTransport::builder().slot_count(4).build().unwrap());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    for _ in 0..4 {
        let sample = publisher.loan().unwrap();
        publisher.publish(sample).unwrap();
    }
    assert_eq!(transport.free_slots(), 0);

    drop(subscriber);
    assert_eq!(transport.free_slots(), 4);
    assert_eq!(transport.subscriber_count(&address), 0);
}

#[test]
fn idle_topic_is_forgotten() {
    let (transport, address) = setup(MemoryTransport::new());
    let reply_address = ServiceTags::new("TestRequest", "TestResponse")
        .unwrap()
        .response_channel(ClientId::new(7));

    let subscriber = transport.create_subscriber(APP, &reply_address).unwrap();
    let publisher = transport.create_publisher(APP, &reply_address).unwrap();
    let _other = transport.create_subscriber(APP, &address).unwrap();
    assert_eq!(transport.topic_count(), 2);

    drop(publisher);
    assert_eq!(transport.topic_count(), 2);
    drop(subscriber);
    assert_eq!(transport.topic_count(), 1);

    // Reopening the address starts a fresh topic that still delivers
    let subscriber = transport.create_subscriber(APP, &reply_address).unwrap();
    let publisher = transport.create_publisher(APP, &reply_address).unwrap();
    let mut sample = publisher.loan().unwrap();
    sample.write(b"again").unwrap();
    publisher.publish(sample).unwrap();
    assert_eq!(&*subscriber.take().unwrap().unwrap(), b"again");
}

#[test]
fn unregistered_runtime_cannot_open_ports() {
    let transport = MemoryTransport::new();
    let address = ServiceTags::new("A", "B").unwrap().request_channel();

    let err = transport.create_publisher("nobody", &address).err().unwrap();
    assert_eq!(err, Error::NotRegistered("nobody".to_string()));
    assert_eq!(
        tether_core::Error::from(err),
        tether_core::Error::Uninitialized("Runtime not registered: nobody".to_string())
    );
}

#[test]
fn channel_limit_is_enforced() {
    let (transport, address) = setup(MemoryTransport::builder().max_channels(2).build().unwrap());
    let _publisher = transport.create_publisher(APP, &address).unwrap();
    let subscriber = transport.create_subscriber(APP, &address).unwrap();

    let err = transport.create_publisher(APP, &address).err().unwrap();
    assert_eq!(err, Error::ChannelLimit { max: 2 });
    assert!(matches!(
        tether_core::Error::from(err),
        tether_core::Error::ChannelCreationFailed(_)
    ));

    // Dropping a port frees its place
    drop(subscriber);
    let _second = transport.create_publisher(APP, &address).unwrap();
    assert_eq!(transport.publisher_count(&address), 2);
}

#[test]
fn shutdown_takes_every_port_offline() {
    let (transport, address) = setup(MemoryTransport::new());
    let subscriber = transport.create_subscriber(APP, &address).unwrap();
    let publisher = transport.create_publisher(APP, &address).unwrap();

    transport.shutdown();

    assert!(!transport.is_online());
    assert_eq!(publisher.loan().unwrap_err(), Error::Offline);
    assert_eq!(subscriber.take().unwrap_err(), Error::Offline);
    assert_eq!(transport.register("late").unwrap_err(), Error::Offline);
}

#[test]
fn typed_channel_roundtrip() {
    let (transport, address) = setup(MemoryTransport::new());
    let subscriber = TypedSubscriber::<TestMessage, _>::new(transport.create_subscriber(APP, &address).unwrap());
    let publisher = TypedPublisher::<TestMessage, _>::new(transport.create_publisher(APP, &address).unwrap());

    let expected = TestMessage { id: 42, value: 7 };
    publisher.send(&expected).unwrap();

    assert_eq!(subscriber.take().unwrap(), Some(expected));
}

#[test]
fn typed_send_rejects_record_larger_than_slot() {
    let (transport, address) = setup(MemoryTransport::builder().slot_size(8).slot_count(1).build().unwrap());
    let publisher = TypedPublisher::<TestMessage, _>::new(transport.create_publisher(APP, &address).unwrap());

    let err = publisher.send(&TestMessage { id: 1, value: 2 }).unwrap_err();
    assert_eq!(err, Error::PayloadTooLarge { size: 12, capacity: 8 });
    assert_eq!(transport.free_slots(), 1);
}

#[test]
fn builder_rejects_zero_sizes() {
    assert!(matches!(
        MemoryTransport::builder().slot_count(0).build(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        MemoryTransport::builder().queue_capacity(0).build(),
        Err(Error::InvalidConfig(_))
    ));
}
