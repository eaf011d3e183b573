//! DHCP frame layout, inbound parsing and outbound frame construction
//!
//! Every frame handled here is a complete Ethernet II + IPv4 + UDP + BOOTP
//! frame. The BOOTP body always starts at byte 42, and the fields the client
//! reads sit at fixed offsets from the start of the frame:
//!
//! ```text
//!  0..14   Ethernet header
//! 14..34   IPv4 header (no options)
//! 34..42   UDP header
//! 42       op (1 = BOOTREQUEST, 2 = BOOTREPLY)
//! 58..62   yiaddr (client address)
//! 62..66   siaddr (server address)
//! 70..76   chaddr (hardware address)
//! 278..282 magic cookie
//! 282..    options, message type (53) first, so its code sits at 284
//! ```

use alloc::vec::Vec;
use smoltcp::wire::{
    DhcpMessageType, EthernetAddress, EthernetFrame, EthernetProtocol, IpAddress, IpProtocol,
    Ipv4Address, Ipv4Packet, UdpPacket,
};

use super::apply::LeaseCandidate;

/// UDP port the client listens on
pub const CLIENT_PORT: u16 = 68;
/// UDP port servers listen on
pub const SERVER_PORT: u16 = 67;

/// BOOTP op code of client messages
pub const BOOT_REQUEST: u8 = 1;
/// BOOTP op code of server messages
pub const BOOT_REPLY: u8 = 2;

const ETHERNET_HEADER_LEN: usize = 14;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// Offset of the BOOTP body within a frame
pub const BOOTP_OFFSET: usize = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN;

// Offsets relative to the start of the BOOTP body
const OP: usize = 0;
const HTYPE: usize = 1;
const HLEN: usize = 2;
const XID: usize = 4;
const FLAGS: usize = 10;
const CIADDR: usize = 12;
const YIADDR: usize = 16;
const SIADDR: usize = 20;
const CHADDR: usize = 28;
const MAGIC: usize = 236;
const OPTIONS: usize = 240;

/// Offset of the op byte within a frame
pub const OP_OFFSET: usize = BOOTP_OFFSET + OP;
/// Offset of the transaction id within a frame
pub const XID_OFFSET: usize = BOOTP_OFFSET + XID;
/// Offset of ciaddr within a frame
pub const CIADDR_OFFSET: usize = BOOTP_OFFSET + CIADDR;
/// Offset of yiaddr (the address handed to the client) within a frame
pub const YIADDR_OFFSET: usize = BOOTP_OFFSET + YIADDR;
/// Offset of siaddr (the server address) within a frame
pub const SIADDR_OFFSET: usize = BOOTP_OFFSET + SIADDR;
/// Offset of the client hardware address within a frame
pub const CHADDR_OFFSET: usize = BOOTP_OFFSET + CHADDR;
/// Offset of the magic cookie within a frame
pub const MAGIC_OFFSET: usize = BOOTP_OFFSET + MAGIC;
/// Offset of the first option within a frame
pub const OPTIONS_OFFSET: usize = BOOTP_OFFSET + OPTIONS;
/// Offset of the DHCP message type code (value byte of option 53)
pub const MESSAGE_TYPE_OFFSET: usize = OPTIONS_OFFSET + 2;

/// Minimum BOOTP body size; shorter bodies are padded
pub const BOOTP_MIN_LEN: usize = 300;
/// Length of every frame built by this module
pub const FRAME_LEN: usize = BOOTP_OFFSET + BOOTP_MIN_LEN;

pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

pub const OPTION_PAD: u8 = 0;
pub const OPTION_SUBNET_MASK: u8 = 1;
pub const OPTION_ROUTER: u8 = 3;
pub const OPTION_DNS: u8 = 6;
pub const OPTION_REQUESTED_IP: u8 = 50;
pub const OPTION_MESSAGE_TYPE: u8 = 53;
pub const OPTION_SERVER_ID: u8 = 54;
pub const OPTION_PARAM_REQUEST_LIST: u8 = 55;
pub const OPTION_END: u8 = 255;

const HTYPE_ETHERNET: u8 = 1;
const FLAGS_BROADCAST: u16 = 0x8000;
const DEFAULT_HOP_LIMIT: u8 = 64;
const REQUESTED_PARAMS: [u8; 3] = [OPTION_SUBNET_MASK, OPTION_ROUTER, OPTION_DNS];

/// Classification of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// A BOOTREQUEST (another client's traffic)
    Request,
    /// BOOTREPLY carrying DHCPOFFER
    Offer,
    /// BOOTREPLY carrying DHCPACK
    Ack,
    /// BOOTREPLY carrying DHCPNAK
    Nak,
    /// BOOTREPLY with any other message type code
    Reply(u8),
    /// Unknown op code
    Unknown(u8),
}

/// A frame delivered by the stack, decoded once on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    raw: Vec<u8>,
    op: u8,
    message_type: u8,
    client: Option<Ipv4Address>,
    server: Option<Ipv4Address>,
    subnet: Option<Ipv4Address>,
    dns: Option<Ipv4Address>,
}

impl InboundPacket {
    /// Decode a raw frame
    ///
    /// Only bounds are checked. Fields beyond the end of the buffer, or
    /// holding 0.0.0.0, decode as `None`.
    pub fn parse(raw: Vec<u8>) -> Self {
        let op = raw.get(OP_OFFSET).copied().unwrap_or(0);
        let message_type = raw.get(MESSAGE_TYPE_OFFSET).copied().unwrap_or(0);
        let client = address_at(&raw, YIADDR_OFFSET);
        let server =
            address_at(&raw, SIADDR_OFFSET).or_else(|| option_address(&raw, OPTION_SERVER_ID));
        let subnet = option_address(&raw, OPTION_SUBNET_MASK);
        let dns = option_address(&raw, OPTION_DNS);

        Self {
            raw,
            op,
            message_type,
            client,
            server,
            subnet,
            dns,
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn op(&self) -> u8 {
        self.op
    }

    /// Secondary message type code (byte 284)
    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    pub fn kind(&self) -> PacketKind {
        match self.op {
            BOOT_REQUEST => PacketKind::Request,
            BOOT_REPLY => match DhcpMessageType::from(self.message_type) {
                DhcpMessageType::Offer => PacketKind::Offer,
                DhcpMessageType::Ack => PacketKind::Ack,
                DhcpMessageType::Nak => PacketKind::Nak,
                _ => PacketKind::Reply(self.message_type),
            },
            other => PacketKind::Unknown(other),
        }
    }

    pub fn client(&self) -> Option<Ipv4Address> {
        self.client
    }

    pub fn server(&self) -> Option<Ipv4Address> {
        self.server
    }

    pub fn subnet(&self) -> Option<Ipv4Address> {
        self.subnet
    }

    pub fn dns(&self) -> Option<Ipv4Address> {
        self.dns
    }

    /// The configuration this reply would install; the server doubles as gateway
    pub fn lease_candidate(&self) -> LeaseCandidate {
        LeaseCandidate {
            client: self.client,
            subnet: self.subnet,
            gateway: self.server,
            dns: self.dns,
        }
    }
}

fn usable(bytes: &[u8]) -> Option<Ipv4Address> {
    let address = Ipv4Address::from_bytes(bytes);
    if address.is_unspecified() {
        None
    } else {
        Some(address)
    }
}

fn address_at(raw: &[u8], offset: usize) -> Option<Ipv4Address> {
    usable(raw.get(offset..offset + 4)?)
}

/// Find the value of an option by scanning the option area
pub fn find_option(raw: &[u8], code: u8) -> Option<&[u8]> {
    let mut pos = OPTIONS_OFFSET;
    while let Some(&tag) = raw.get(pos) {
        match tag {
            OPTION_END => return None,
            OPTION_PAD => {
                pos += 1;
                continue;
            }
            _ => {}
        }
        let len = *raw.get(pos + 1)? as usize;
        let data = raw.get(pos + 2..pos + 2 + len)?;
        if tag == code {
            return Some(data);
        }
        pos += 2 + len;
    }
    None
}

fn option_address(raw: &[u8], code: u8) -> Option<Ipv4Address> {
    usable(find_option(raw, code)?.get(..4)?)
}

/// Writes options sequentially into a BOOTP body
struct OptionWriter<'a> {
    body: &'a mut [u8; BOOTP_MIN_LEN],
    pos: usize,
}

impl<'a> OptionWriter<'a> {
    fn new(body: &'a mut [u8; BOOTP_MIN_LEN]) -> Self {
        Self { body, pos: OPTIONS }
    }

    fn push(&mut self, code: u8, data: &[u8]) {
        self.body[self.pos] = code;
        self.body[self.pos + 1] = data.len() as u8;
        self.body[self.pos + 2..self.pos + 2 + data.len()].copy_from_slice(data);
        self.pos += 2 + data.len();
    }

    fn finish(self) {
        self.body[self.pos] = OPTION_END;
    }
}

/// Fixed BOOTREQUEST header shared by every outbound message
fn request_body(
    mac: EthernetAddress,
    xid: u32,
    ciaddr: Ipv4Address,
    broadcast: bool,
) -> [u8; BOOTP_MIN_LEN] {
    let mut body = [0u8; BOOTP_MIN_LEN];
    body[OP] = BOOT_REQUEST;
    body[HTYPE] = HTYPE_ETHERNET;
    body[HLEN] = 6;
    body[XID..XID + 4].copy_from_slice(&xid.to_be_bytes());
    if broadcast {
        body[FLAGS..FLAGS + 2].copy_from_slice(&FLAGS_BROADCAST.to_be_bytes());
    }
    body[CIADDR..CIADDR + 4].copy_from_slice(ciaddr.as_bytes());
    body[CHADDR..CHADDR + 6].copy_from_slice(mac.as_bytes());
    body[MAGIC..MAGIC + 4].copy_from_slice(&MAGIC_COOKIE);
    body
}

/// Wrap a BOOTP body in UDP, IPv4 and Ethernet headers
///
/// The Ethernet destination is always broadcast; the client never learns the
/// server's hardware address.
pub(crate) fn encapsulate(
    src_mac: EthernetAddress,
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    src_port: u16,
    dst_port: u16,
    body: &[u8],
) -> Vec<u8> {
    let udp_len = UDP_HEADER_LEN + body.len();
    let ip_len = IPV4_HEADER_LEN + udp_len;
    let mut frame = vec![0u8; ETHERNET_HEADER_LEN + ip_len];

    let mut eth = EthernetFrame::new_unchecked(&mut frame[..]);
    eth.set_dst_addr(EthernetAddress::BROADCAST);
    eth.set_src_addr(src_mac);
    eth.set_ethertype(EthernetProtocol::Ipv4);

    let mut ip = Ipv4Packet::new_unchecked(eth.payload_mut());
    ip.set_version(4);
    ip.set_header_len(IPV4_HEADER_LEN as u8);
    ip.set_total_len(ip_len as u16);
    ip.clear_flags();
    ip.set_hop_limit(DEFAULT_HOP_LIMIT);
    ip.set_next_header(IpProtocol::Udp);
    ip.set_src_addr(src_addr);
    ip.set_dst_addr(dst_addr);
    ip.fill_checksum();

    let mut udp = UdpPacket::new_unchecked(ip.payload_mut());
    udp.set_src_port(src_port);
    udp.set_dst_port(dst_port);
    udp.set_len(udp_len as u16);
    udp.payload_mut().copy_from_slice(body);
    udp.fill_checksum(&IpAddress::Ipv4(src_addr), &IpAddress::Ipv4(dst_addr));

    frame
}

fn broadcast_frame(mac: EthernetAddress, body: &[u8]) -> Vec<u8> {
    encapsulate(
        mac,
        Ipv4Address::UNSPECIFIED,
        Ipv4Address::BROADCAST,
        CLIENT_PORT,
        SERVER_PORT,
        body,
    )
}

/// Build a DHCPDISCOVER frame
pub fn build_discover(mac: EthernetAddress, xid: u32) -> Vec<u8> {
    let mut body = request_body(mac, xid, Ipv4Address::UNSPECIFIED, true);
    let mut options = OptionWriter::new(&mut body);
    options.push(OPTION_MESSAGE_TYPE, &[u8::from(DhcpMessageType::Discover)]);
    options.push(OPTION_PARAM_REQUEST_LIST, &REQUESTED_PARAMS);
    options.finish();
    broadcast_frame(mac, &body)
}

/// Build a DHCPREQUEST frame asking `server` for the `offered` address
pub fn build_request(
    mac: EthernetAddress,
    offered: Ipv4Address,
    server: Ipv4Address,
    xid: u32,
) -> Vec<u8> {
    let mut body = request_body(mac, xid, Ipv4Address::UNSPECIFIED, true);
    let mut options = OptionWriter::new(&mut body);
    options.push(OPTION_MESSAGE_TYPE, &[u8::from(DhcpMessageType::Request)]);
    options.push(OPTION_REQUESTED_IP, offered.as_bytes());
    options.push(OPTION_SERVER_ID, server.as_bytes());
    options.push(OPTION_PARAM_REQUEST_LIST, &REQUESTED_PARAMS);
    options.finish();
    broadcast_frame(mac, &body)
}

/// Build a DHCPRELEASE frame handing `client` back to `server`
///
/// Unlike discovery and request, release is unicast at the IP layer.
pub fn build_release(
    mac: EthernetAddress,
    client: Ipv4Address,
    server: Ipv4Address,
    xid: u32,
) -> Vec<u8> {
    let mut body = request_body(mac, xid, client, false);
    let mut options = OptionWriter::new(&mut body);
    options.push(OPTION_MESSAGE_TYPE, &[u8::from(DhcpMessageType::Release)]);
    options.push(OPTION_SERVER_ID, server.as_bytes());
    options.finish();
    encapsulate(mac, client, server, CLIENT_PORT, SERVER_PORT, &body)
}
