//! Scripted host and reply builders shared by the scenario tests

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use hostconf_net::dhcp::host::{Clock, ConfigStore, DeviceInfo, NetworkHost};
use hostconf_net::dhcp::packet::{
    BOOT_REPLY, FRAME_LEN, MAGIC_COOKIE, MAGIC_OFFSET, OPTIONS_OFFSET, OPTION_DNS, OPTION_END,
    OPTION_MESSAGE_TYPE, OPTION_SUBNET_MASK, OP_OFFSET, SIADDR_OFFSET, YIADDR_OFFSET,
};
use hostconf_net::dhcp::SessionSlot;
use hostconf_net::{IpConfigStore, NetError};
use smoltcp::wire::Ipv4Address;

pub const OFFER: u8 = 2;
pub const ACK: u8 = 5;
pub const NAK: u8 = 6;

pub const MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Clock advanced by the host on every `relax`
#[derive(Clone, Default)]
pub struct ManualClock(pub Rc<Cell<u64>>);

impl ManualClock {
    pub fn advance(&self, secs: u64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.0.get()
    }
}

/// In-memory host that answers each flush with the next scripted reply
pub struct ScriptedHost {
    pub devices: Vec<DeviceInfo>,
    pub store: IpConfigStore,
    pub sent: Vec<Vec<u8>>,
    pub replies: VecDeque<Vec<u8>>,
    pub sessions: Arc<SessionSlot>,
    pub clock: ManualClock,
    pub relax_calls: usize,
}

impl ScriptedHost {
    pub fn new(devices: Vec<DeviceInfo>, sessions: Arc<SessionSlot>, clock: ManualClock) -> Self {
        Self {
            devices,
            store: IpConfigStore::new(),
            sent: Vec::new(),
            replies: VecDeque::new(),
            sessions,
            clock,
            relax_calls: 0,
        }
    }

    pub fn script(mut self, replies: Vec<Vec<u8>>) -> Self {
        self.replies = replies.into();
        self
    }
}

impl ConfigStore for ScriptedHost {
    fn set_addresses(
        &mut self,
        device: &DeviceInfo,
        client: Ipv4Address,
        subnet: Ipv4Address,
        gateway: Ipv4Address,
    ) {
        self.store.set_addresses(device, client, subnet, gateway);
    }

    fn clear_all(&mut self) {
        self.store.clear_all();
    }

    fn add_dns_server(&mut self, address: Ipv4Address) {
        self.store.add_dns_server(address);
    }

    fn network_containing(&self, address: Ipv4Address) -> Option<Ipv4Address> {
        self.store.network_containing(address)
    }

    fn gateway(&self, device: &DeviceInfo) -> Option<Ipv4Address> {
        self.store.gateway(device)
    }
}

impl NetworkHost for ScriptedHost {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn enqueue_outbound(&mut self, frame: Vec<u8>) {
        self.sent.push(frame);
    }

    fn flush(&mut self) -> Result<(), NetError> {
        // An empty entry answers that flush with silence
        match self.replies.pop_front() {
            Some(reply) if !reply.is_empty() => {
                self.sessions.deliver(reply);
            }
            _ => {}
        }
        Ok(())
    }

    fn relax(&mut self) {
        self.relax_calls += 1;
        self.clock.advance(1);
    }
}

pub fn addr(a: u8, b: u8, c: u8, d: u8) -> Ipv4Address {
    Ipv4Address::new(a, b, c, d)
}

/// Hand-built BOOTREPLY with the fields at their fixed offsets
pub fn reply(
    code: u8,
    client: Ipv4Address,
    server: Ipv4Address,
    subnet: Option<Ipv4Address>,
    dns: Option<Ipv4Address>,
) -> Vec<u8> {
    let mut raw = vec![0u8; FRAME_LEN];
    raw[OP_OFFSET] = BOOT_REPLY;
    raw[YIADDR_OFFSET..YIADDR_OFFSET + 4].copy_from_slice(client.as_bytes());
    raw[SIADDR_OFFSET..SIADDR_OFFSET + 4].copy_from_slice(server.as_bytes());
    raw[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&MAGIC_COOKIE);

    let mut options = vec![OPTION_MESSAGE_TYPE, 1, code];
    if let Some(subnet) = subnet {
        options.extend_from_slice(&[OPTION_SUBNET_MASK, 4]);
        options.extend_from_slice(subnet.as_bytes());
    }
    if let Some(dns) = dns {
        options.extend_from_slice(&[OPTION_DNS, 4]);
        options.extend_from_slice(dns.as_bytes());
    }
    options.push(OPTION_END);
    raw[OPTIONS_OFFSET..OPTIONS_OFFSET + options.len()].copy_from_slice(&options);
    raw
}

pub fn offer() -> Vec<u8> {
    reply(OFFER, addr(10, 0, 0, 5), addr(10, 0, 0, 1), None, None)
}

pub fn ack() -> Vec<u8> {
    reply(
        ACK,
        addr(10, 0, 0, 5),
        addr(10, 0, 0, 1),
        Some(addr(255, 255, 255, 0)),
        Some(addr(10, 0, 0, 2)),
    )
}

pub fn nak() -> Vec<u8> {
    reply(NAK, Ipv4Address::UNSPECIFIED, Ipv4Address::UNSPECIFIED, None, None)
}
