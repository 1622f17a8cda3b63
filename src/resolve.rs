use anyhow::Result;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;

const SNMP_PORT: u16 = 161;
const NETBIOS_PORT: u16 = 137;

/// Best-effort lookup of a human-readable name for a live host.
///
/// Implementations absorb their own I/O errors; `None` simply means no name
/// was found and the caller should fall back to the address text.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String>;
}

/// Queries sysName.0 (1.3.6.1.2.1.1.5.0) over SNMPv2c.
pub struct SnmpResolver {
    community: String,
    timeout: Duration,
}

impl SnmpResolver {
    pub fn new(community: impl Into<String>, timeout: Duration) -> Self {
        Self {
            community: community.into(),
            timeout,
        }
    }

    async fn query(&self, addr: Ipv4Addr) -> Result<Option<String>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let request = encode_snmp_get(&self.community, rand::random::<u16>() as u32);
        socket
            .send_to(&request, (IpAddr::V4(addr), SNMP_PORT))
            .await?;
        let mut buf = [0u8; 1500];
        let (n, _peer) = time::timeout(self.timeout, socket.recv_from(&mut buf)).await??;
        Ok(parse_snmp_sysname(&buf[..n]))
    }
}

#[async_trait]
impl NameResolver for SnmpResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        self.query(addr).await.ok().flatten()
    }
}

/// Sends a unicast NetBIOS node-status (NBSTAT) query and picks the first
/// unique name from the response table.
pub struct NetbiosResolver {
    timeout: Duration,
}

impl NetbiosResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn query(&self, addr: Ipv4Addr) -> Result<Option<String>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let request = encode_nbstat_query(rand::random::<u16>());
        socket
            .send_to(&request, (IpAddr::V4(addr), NETBIOS_PORT))
            .await?;
        let mut buf = [0u8; 1500];
        let (n, _peer) = time::timeout(self.timeout, socket.recv_from(&mut buf)).await??;
        Ok(parse_node_status(&buf[..n]))
    }
}

#[async_trait]
impl NameResolver for NetbiosResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        self.query(addr).await.ok().flatten()
    }
}

/// Two-strategy chain: SNMP first, then NetBIOS; first non-empty name wins.
pub struct FallbackResolver {
    snmp: SnmpResolver,
    netbios: NetbiosResolver,
}

impl FallbackResolver {
    pub fn new(community: impl Into<String>, timeout: Duration) -> Self {
        Self {
            snmp: SnmpResolver::new(community, timeout),
            netbios: NetbiosResolver::new(timeout),
        }
    }
}

#[async_trait]
impl NameResolver for FallbackResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        if let Some(name) = self.snmp.resolve(addr).await {
            return Some(name);
        }
        self.netbios.resolve(addr).await
    }
}

// --- SNMP wire encoding (BER) ---

fn push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(content);
}

fn push_uint(out: &mut Vec<u8>, value: u32) {
    let b = value.to_be_bytes();
    let mut start = 0;
    while start < 3 && b[start] == 0 {
        start += 1;
    }
    let mut content = b[start..].to_vec();
    // High bit set would flip the sign under BER; prepend a zero octet.
    if content[0] & 0x80 != 0 {
        content.insert(0, 0);
    }
    push_tlv(out, 0x02, &content);
}

/// Build an SNMPv2c get-request for sysName.0.
fn encode_snmp_get(community: &str, request_id: u32) -> Vec<u8> {
    // 1.3.6.1.2.1.1.5.0 with the leading 1.3 collapsed into 0x2b
    const SYSNAME_OID: [u8; 8] = [0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x05, 0x00];

    let mut varbind = Vec::new();
    push_tlv(&mut varbind, 0x06, &SYSNAME_OID);
    push_tlv(&mut varbind, 0x05, &[]); // NULL value placeholder

    let mut varbind_list = Vec::new();
    push_tlv(&mut varbind_list, 0x30, &varbind);

    let mut pdu = Vec::new();
    push_uint(&mut pdu, request_id);
    push_uint(&mut pdu, 0); // error-status
    push_uint(&mut pdu, 0); // error-index
    push_tlv(&mut pdu, 0x30, &varbind_list);

    let mut msg = Vec::new();
    push_uint(&mut msg, 1); // version 2c
    push_tlv(&mut msg, 0x04, community.as_bytes());
    push_tlv(&mut msg, 0xa0, &pdu); // get-request

    let mut out = Vec::new();
    push_tlv(&mut out, 0x30, &msg);
    out
}

struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_header(&mut self) -> Option<(u8, usize)> {
        let tag = *self.data.get(self.pos)?;
        let first = *self.data.get(self.pos + 1)?;
        self.pos += 2;
        let len = if first < 0x80 {
            first as usize
        } else {
            let n = (first & 0x7f) as usize;
            if n == 0 || n > 2 {
                return None;
            }
            let mut v = 0usize;
            for _ in 0..n {
                v = (v << 8) | *self.data.get(self.pos)? as usize;
                self.pos += 1;
            }
            v
        };
        Some((tag, len))
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn skip_field(&mut self) -> Option<()> {
        let (_tag, len) = self.read_header()?;
        self.read_bytes(len)?;
        Some(())
    }
}

/// Walk a get-response and pull the first OCTET STRING varbind value.
fn parse_snmp_sysname(data: &[u8]) -> Option<String> {
    let mut r = BerReader::new(data);
    let (tag, _) = r.read_header()?;
    if tag != 0x30 {
        return None;
    }
    r.skip_field()?; // version
    r.skip_field()?; // community
    let (tag, _) = r.read_header()?;
    if tag != 0xa2 {
        return None; // not a get-response
    }
    r.skip_field()?; // request-id
    let (tag, len) = r.read_header()?;
    if tag != 0x02 {
        return None;
    }
    let status = r.read_bytes(len)?;
    if status.iter().any(|&b| b != 0) {
        return None; // agent reported an error
    }
    r.skip_field()?; // error-index
    let (tag, _) = r.read_header()?;
    if tag != 0x30 {
        return None; // varbind list
    }
    let (tag, _) = r.read_header()?;
    if tag != 0x30 {
        return None; // varbind
    }
    r.skip_field()?; // oid
    let (tag, len) = r.read_header()?;
    if tag != 0x04 {
        return None; // noSuchObject etc. arrive with other tags
    }
    let raw = r.read_bytes(len)?;
    let name = String::from_utf8_lossy(raw).trim().to_string();
    (!name.is_empty()).then_some(name)
}

// --- NetBIOS wire encoding ---

/// RFC 1001 first-level encoding; the wildcard name pads with NULs.
fn encode_netbios_name(name: &str) -> [u8; 32] {
    let pad = if name == "*" { 0u8 } else { b' ' };
    let mut raw = [pad; 16];
    for (i, b) in name.bytes().take(15).enumerate() {
        raw[i] = b.to_ascii_uppercase();
    }
    raw[15] = 0; // suffix
    let mut out = [0u8; 32];
    for (i, b) in raw.iter().enumerate() {
        out[2 * i] = (b >> 4) + b'A';
        out[2 * i + 1] = (b & 0x0f) + b'A';
    }
    out
}

fn encode_nbstat_query(txn_id: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(50);
    packet.extend_from_slice(&txn_id.to_be_bytes());
    packet.extend_from_slice(&0x0000u16.to_be_bytes()); // flags: plain unicast query
    packet.extend_from_slice(&0x0001u16.to_be_bytes()); // QDCOUNT
    packet.extend_from_slice(&[0u8; 6]); // ANCOUNT, NSCOUNT, ARCOUNT
    packet.push(32); // label length
    packet.extend_from_slice(&encode_netbios_name("*"));
    packet.push(0); // terminator
    packet.extend_from_slice(&0x0021u16.to_be_bytes()); // NBSTAT
    packet.extend_from_slice(&0x0001u16.to_be_bytes()); // IN
    packet
}

/// Find the NBSTAT answer (type 0x0021) and return the first unique name
/// from its node name table.
fn parse_node_status(data: &[u8]) -> Option<String> {
    if data.len() < 12 {
        return None;
    }
    let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;
    let ancount = u16::from_be_bytes([data[6], data[7]]) as usize;
    let mut offset = 12usize;

    for _ in 0..qdcount {
        while *data.get(offset)? != 0 {
            offset += 1;
        }
        offset += 1 + 4; // null + type/class
    }

    for _ in 0..ancount {
        while *data.get(offset)? != 0 {
            offset += 1;
        }
        offset += 1;
        if offset + 10 > data.len() {
            return None;
        }
        let rtype = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let rdlen = u16::from_be_bytes([data[offset + 8], data[offset + 9]]) as usize;
        offset += 10;
        if offset + rdlen > data.len() {
            return None;
        }
        if rtype == 0x0021 && rdlen > 0 {
            let count = data[offset] as usize;
            let mut pos = offset + 1;
            for _ in 0..count {
                if pos + 18 > offset + rdlen {
                    break;
                }
                // Entry: 15 name bytes, 1 suffix byte, 2 flag bytes.
                let flags = u16::from_be_bytes([data[pos + 16], data[pos + 17]]);
                let unique = flags & 0x8000 == 0;
                let name = String::from_utf8_lossy(&data[pos..pos + 15])
                    .trim_end_matches([' ', '\0'])
                    .to_string();
                if unique && !name.is_empty() && name != "*" {
                    return Some(name);
                }
                pos += 18;
            }
            return None;
        }
        offset += rdlen;
    }
    None
}
