//! End-to-end DHCP exchanges against a scripted host

mod common;

use std::sync::Arc;

use common::{ack, addr, nak, offer, reply, ManualClock, ScriptedHost, ACK, MAC};
use hostconf_net::dhcp::host::DeviceInfo;
use hostconf_net::dhcp::packet::{
    find_option, CIADDR_OFFSET, MESSAGE_TYPE_OFFSET, OPTION_REQUESTED_IP, OPTION_SERVER_ID,
};
use hostconf_net::dhcp::{
    DhcpClient, DhcpConfig, DhcpOutcome, DhcpState, Delivery, Lease, PacketKind, SessionSlot,
    WaitOutcome, RECEIVE_QUEUE_CAPACITY,
};
use hostconf_net::IpConfig;

type Client = DhcpClient<ScriptedHost, ManualClock, Vec<String>>;

fn client_with(devices: Vec<DeviceInfo>, replies: Vec<Vec<u8>>) -> Client {
    let sessions = Arc::new(SessionSlot::new());
    let clock = ManualClock::default();
    let host = ScriptedHost::new(devices, Arc::clone(&sessions), clock.clone()).script(replies);
    DhcpClient::new(host, clock, Vec::new(), sessions)
}

fn eth0() -> DeviceInfo {
    DeviceInfo::new(0, "eth0", MAC)
}

fn expected_lease() -> Lease {
    Lease {
        client: addr(10, 0, 0, 5),
        subnet: addr(255, 255, 255, 0),
        gateway: addr(10, 0, 0, 1),
        dns: addr(10, 0, 0, 2),
    }
}

#[test]
fn test_happy_path_binds_device() {
    let mut client = client_with(vec![eth0()], vec![offer(), ack()]);

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::Bound(expected_lease()));
    assert_eq!(client.state(), DhcpState::Bound);

    let host = client.host();
    assert_eq!(host.sent.len(), 2);
    assert_eq!(host.sent[0][MESSAGE_TYPE_OFFSET], 1);
    assert_eq!(host.sent[1][MESSAGE_TYPE_OFFSET], 3);
    assert_eq!(
        find_option(&host.sent[1], OPTION_REQUESTED_IP),
        Some(addr(10, 0, 0, 5).as_bytes())
    );
    assert_eq!(
        find_option(&host.sent[1], OPTION_SERVER_ID),
        Some(addr(10, 0, 0, 1).as_bytes())
    );

    assert_eq!(
        host.store.get(0),
        Some(&IpConfig::new(addr(10, 0, 0, 5), addr(255, 255, 255, 0), addr(10, 0, 0, 1)))
    );
    assert_eq!(host.store.dns_servers(), &[addr(10, 0, 0, 2)]);

    assert_eq!(client.session_id(), None);
    assert_eq!(client.sessions().current(), None);
}

#[test]
fn test_first_ack_is_reported() {
    let mut client = client_with(vec![eth0()], vec![offer(), ack()]);
    client.start_discovery().unwrap();

    let log = client.diagnostics();
    assert_eq!(log.first().map(String::as_str), Some("[DHCP ACK][eth0] Packet received, applying IP configuration..."));
    assert_eq!(log.last().map(String::as_str), Some("[DHCP CONFIG][eth0] IP configuration applied."));
}

#[test]
fn test_nak_leaves_configuration_cleared() {
    let mut client = client_with(vec![eth0()], vec![offer(), nak()]);

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::ConfigFailed);
    assert_eq!(client.state(), DhcpState::Idle);
    assert!(client.host().store.is_empty());
    assert!(client.host().store.dns_servers().is_empty());
    assert!(client.diagnostics().iter().any(|line| line.contains("failed")));
    assert_eq!(client.sessions().current(), None);
}

#[test]
fn test_release_after_bind() {
    let mut client = client_with(vec![eth0()], vec![offer(), ack()]);
    client.start_discovery().unwrap();

    client.release().unwrap();

    let host = client.host();
    assert_eq!(host.sent.len(), 3);
    let release = &host.sent[2];
    assert_eq!(release[MESSAGE_TYPE_OFFSET], 7);
    assert_eq!(&release[CIADDR_OFFSET..CIADDR_OFFSET + 4], addr(10, 0, 0, 5).as_bytes());
    assert_eq!(find_option(release, OPTION_SERVER_ID), Some(addr(10, 0, 0, 1).as_bytes()));

    assert_eq!(host.store.get(0), Some(&IpConfig::UNCONFIGURED));
    assert_eq!(client.state(), DhcpState::Released);
    assert_eq!(client.sessions().current(), None);
}

#[test]
fn test_release_from_new_client_clears_stale_session() {
    let sessions = Arc::new(SessionSlot::new());
    let clock = ManualClock::default();
    let host = ScriptedHost::new(vec![eth0()], Arc::clone(&sessions), clock.clone());
    let mut discovering = DhcpClient::new(host, clock, Vec::<String>::new(), Arc::clone(&sessions))
        .with_config(DhcpConfig::new().with_timeout_ms(1000));

    assert_eq!(discovering.start_discovery().unwrap(), DhcpOutcome::TimedOut);
    assert!(sessions.is_active());

    let clock = ManualClock::default();
    let host = ScriptedHost::new(vec![eth0()], Arc::clone(&sessions), clock.clone());
    let mut releasing = DhcpClient::new(host, clock, Vec::<String>::new(), Arc::clone(&sessions));
    releasing.release().unwrap();

    assert!(!sessions.is_active());
    assert_eq!(sessions.deliver(ack()), Delivery::NoSession);
    assert_eq!(releasing.state(), DhcpState::Released);
}

#[test]
fn test_release_without_lease_sends_nothing() {
    let mut client = client_with(vec![eth0()], Vec::new());

    client.release().unwrap();

    assert!(client.host().sent.is_empty());
    assert_eq!(client.host().store.get(0), Some(&IpConfig::UNCONFIGURED));
}

#[test]
fn test_timeout_without_replies() {
    let mut client = client_with(vec![eth0()], Vec::new())
        .with_config(DhcpConfig::new().with_timeout_ms(2000));

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::TimedOut);
    assert_eq!(client.state(), DhcpState::TimedOut);
    // Gives up on the third observed second change
    assert_eq!(client.host().relax_calls, 3);
    // The session stays registered until replaced or closed
    assert!(client.sessions().is_active());
    assert!(client.is_awaiting_first_ack());
    assert_eq!(client.host().store.get(0), Some(&IpConfig::UNCONFIGURED));
}

#[test]
fn test_default_timeout_is_bounded() {
    let mut client = client_with(vec![eth0()], Vec::new());

    assert_eq!(client.start_discovery().unwrap(), DhcpOutcome::TimedOut);
    assert_eq!(client.host().relax_calls, 6);
}

#[test]
fn test_zero_timeout_never_dequeues() {
    let mut client = client_with(vec![eth0()], Vec::new())
        .with_config(DhcpConfig::new().with_timeout_ms(1000));
    client.start_discovery().unwrap();

    assert_eq!(client.sessions().deliver(ack()), Delivery::Queued);
    assert_eq!(client.receive_wait(0), WaitOutcome::TimedOut);

    match client.receive_wait(1000) {
        WaitOutcome::Received { packet, elapsed_secs } => {
            assert_eq!(packet.kind(), PacketKind::Ack);
            assert_eq!(elapsed_secs, 0);
        }
        WaitOutcome::TimedOut => panic!("queued ack was lost"),
    }
}

#[test]
fn test_wait_without_session_times_out() {
    let mut client = client_with(vec![eth0()], Vec::new());
    assert_eq!(client.receive_wait(5000), WaitOutcome::TimedOut);
    assert_eq!(client.host().relax_calls, 0);
}

#[test]
fn test_restart_replaces_session() {
    let mut client = client_with(vec![eth0()], Vec::new())
        .with_config(DhcpConfig::new().with_timeout_ms(1000));

    client.start_discovery().unwrap();
    let first = client.session_id().unwrap();
    client.start_discovery().unwrap();
    let second = client.session_id().unwrap();

    assert_ne!(first, second);
    assert_eq!(client.sessions().current(), Some(second));
}

#[test]
fn test_non_reply_ends_attempt() {
    let mut request = ack();
    request[hostconf_net::dhcp::packet::OP_OFFSET] = 1;
    let mut client = client_with(vec![eth0()], vec![request]);

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::Ignored(PacketKind::Request));
    assert_eq!(client.host().sent.len(), 1);
    assert_eq!(client.host().store.get(0), Some(&IpConfig::UNCONFIGURED));
}

#[test]
fn test_unknown_reply_code_ends_attempt() {
    let inform = reply(8, addr(10, 0, 0, 5), addr(10, 0, 0, 1), None, None);
    let mut client = client_with(vec![eth0()], vec![inform]);

    assert_eq!(
        client.start_discovery().unwrap(),
        DhcpOutcome::Ignored(PacketKind::Reply(8))
    );
}

#[test]
fn test_second_offer_ends_attempt() {
    let mut client = client_with(vec![eth0()], vec![offer(), offer()]);

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::Ignored(PacketKind::Offer));
    assert_eq!(client.state(), DhcpState::OfferPending);
    assert_eq!(client.host().sent.len(), 2);
}

#[test]
fn test_ack_without_offer_is_applied() {
    let mut client = client_with(vec![eth0()], vec![ack()]);

    assert_eq!(
        client.start_discovery().unwrap(),
        DhcpOutcome::Bound(expected_lease())
    );
    assert_eq!(client.host().sent.len(), 1);
}

#[test]
fn test_every_device_is_configured() {
    let devices = vec![eth0(), DeviceInfo::new(1, "eth1", [2, 0, 0, 0, 0, 2])];
    // One reply per flush: two discovers, then two requests
    let replies = vec![offer(), Vec::new(), ack(), Vec::new()];
    let mut client = client_with(devices, replies);

    let outcome = client.start_discovery().unwrap();

    assert_eq!(outcome, DhcpOutcome::Bound(expected_lease()));
    let host = client.host();
    assert_eq!(host.sent.len(), 4);
    let expected = IpConfig::new(addr(10, 0, 0, 5), addr(255, 255, 255, 0), addr(10, 0, 0, 1));
    assert_eq!(host.store.get(0), Some(&expected));
    assert_eq!(host.store.get(1), Some(&expected));
}

#[test]
fn test_repeated_ack_is_idempotent() {
    let mut once = client_with(vec![eth0()], vec![ack()]);
    once.start_discovery().unwrap();

    let mut twice = client_with(vec![eth0()], vec![ack()]);
    twice.start_discovery().unwrap();
    twice.host_mut().replies.push_back(ack());
    twice.start_discovery().unwrap();

    assert_eq!(once.host().store, twice.host().store);
}

#[test]
fn test_queue_overflow_drops_newest() {
    let mut client = client_with(vec![eth0()], Vec::new())
        .with_config(DhcpConfig::new().with_timeout_ms(1000));
    client.start_discovery().unwrap();

    for i in 0..RECEIVE_QUEUE_CAPACITY {
        let frame = reply(ACK, addr(10, 0, 0, 10 + i as u8), addr(10, 0, 0, 1), None, None);
        assert_eq!(client.sessions().deliver(frame), Delivery::Queued);
    }
    assert_eq!(client.sessions().deliver(ack()), Delivery::Dropped);

    for i in 0..RECEIVE_QUEUE_CAPACITY {
        match client.receive_wait(1000) {
            WaitOutcome::Received { packet, .. } => {
                assert_eq!(packet.client(), Some(addr(10, 0, 0, 10 + i as u8)));
            }
            WaitOutcome::TimedOut => panic!("queued frame {} missing", i),
        }
    }
    assert_eq!(client.receive_wait(1000), WaitOutcome::TimedOut);
}
