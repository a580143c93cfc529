use crate::wire::fqdn;
use anyhow::Result;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{RData, RecordType};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);
pub const UPSTREAM_SUFFIX: &str = ".upstream";
const UPSTREAM_PORT: u16 = 53;

/// Source of authoritative PTR names for networks that delegate upstream.
///
/// Implementations never fail: every transport, timeout or decode problem is
/// reported as `None`, and so is an answer without PTR records.
#[async_trait::async_trait]
pub trait UpstreamResolver: Send + Sync {
    async fn query_ptr(&self, resolver: &str, qname: &str, timeout: Duration) -> Option<Vec<String>>;
}

/// Plain UDP client, one transient socket per query.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpUpstream;

#[async_trait::async_trait]
impl UpstreamResolver for UdpUpstream {
    async fn query_ptr(&self, resolver: &str, qname: &str, limit: Duration) -> Option<Vec<String>> {
        let server = match resolver_addr(resolver) {
            Some(addr) => addr,
            None => {
                tracing::debug!("Upstream '{}' is not a usable address", resolver);
                return None;
            }
        };
        let start = std::time::Instant::now();
        match self.exchange(server, qname, limit).await {
            Ok(values) => {
                tracing::debug!("Upstream {} answered '{}' with {} PTR(s) in {:.4}s", server, qname, values.len(), start.elapsed().as_secs_f64());
                (!values.is_empty()).then_some(values)
            }
            Err(e) => {
                tracing::debug!("Upstream {} failed for '{}' in {:.4}s: {}", server, qname, start.elapsed().as_secs_f64(), e);
                None
            }
        }
    }
}

impl UdpUpstream {
    async fn exchange(&self, server: SocketAddr, qname: &str, limit: Duration) -> Result<Vec<String>> {
        let id: u16 = rand::random();
        let query = build_ptr_query(id, qname)?;

        let bind = if server.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(server).await?;
        socket.send(&query).await?;

        let mut buf = vec![0u8; 4096];
        let len = timeout(limit, socket.recv(&mut buf)).await??;
        buf.truncate(len);
        parse_ptr_response(&buf, id)
    }
}

/// Accepts `ip`, `ip:port` and `[v6]:port`; a bare address gets port 53.
pub fn resolver_addr(resolver: &str) -> Option<SocketAddr> {
    let resolver = resolver.trim();
    if let Ok(addr) = resolver.parse::<SocketAddr>() {
        return Some(addr);
    }
    resolver.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, UPSTREAM_PORT))
}

pub fn build_ptr_query(id: u16, qname: &str) -> Result<Vec<u8>> {
    let name = fqdn(qname).map_err(|e| anyhow::anyhow!("Invalid upstream query name '{}': {}", qname, e))?;
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(name, RecordType::PTR));
    Ok(message.to_vec()?)
}

/// PTR targets of a NOERROR response, trailing dots stripped; other record types are ignored.
pub fn parse_ptr_response(bytes: &[u8], expected_id: u16) -> Result<Vec<String>> {
    let message = Message::from_vec(bytes)?;
    if message.id() != expected_id {
        anyhow::bail!("response id {:#06x} does not match query id {:#06x}", message.id(), expected_id);
    }
    if message.response_code() != ResponseCode::NoError {
        anyhow::bail!("upstream returned {:?}", message.response_code());
    }
    let values = message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::PTR(ptr)) => Some(ptr.0.to_ascii().trim_end_matches('.').to_string()),
            _ => None,
        })
        .collect();
    Ok(values)
}

pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") { Ok(Duration::from_millis(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('s') { Ok(Duration::from_secs(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('m') { Ok(Duration::from_secs(stripped.parse::<u64>()? * 60)) }
    else { anyhow::bail!("invalid duration '{}'", s) }
}
