//! Per-query decision procedure

use crate::synth::codec;
use crate::synth::SynthesisEngine;
use crate::types::{Outcome, QType, Query, Record};
use crate::upstream::{UpstreamResolver, UPSTREAM_SUFFIX};
use crate::wire::{self, WireError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;

/// Stateless handler shared by every listener.
pub struct RequestHandler {
    engine: SynthesisEngine,
    upstream: Arc<dyn UpstreamResolver>,
    upstream_timeout: Duration,
    query_log: bool,
}

impl RequestHandler {
    pub fn new(engine: SynthesisEngine, upstream: Arc<dyn UpstreamResolver>, upstream_timeout: Duration, query_log: bool) -> Self {
        Self { engine, upstream, upstream_timeout, query_log }
    }

    /// Decode, answer and encode one datagram. Undecodable input gets FORMERR.
    pub async fn handle_datagram(&self, bytes: &[u8], src: SocketAddr) -> Result<Vec<u8>, WireError> {
        let query = match wire::decode(bytes) {
            Ok(q) => q,
            Err(e) => {
                tracing::debug!("Malformed query from {}: {}", src, e);
                return wire::encode_formerr(bytes);
            }
        };

        if self.query_log {
            tracing::info!(src = %src.ip(), qname = %query.qname, qtype = %query.qtype, "query");
        }

        let outcome = self.handle(&query).await;
        wire::encode(&query, &outcome)
    }

    pub async fn handle(&self, query: &Query) -> Outcome {
        let name = query.qname.strip_suffix('.').unwrap_or(&query.qname);
        match query.qtype {
            QType::PTR => self.handle_ptr(name).await,
            QType::AAAA => self.handle_aaaa(name),
            QType::Other(_) => Outcome::nxdomain(),
        }
    }

    async fn handle_ptr(&self, name: &str) -> Outcome {
        let addr = match codec::from_reverse_label(name) {
            Some(addr) => addr,
            None => return Outcome::nxdomain(),
        };
        let rule = match self.engine.rules().find_by_address(addr) {
            Some(rule) => rule,
            None => return Outcome::nxdomain(),
        };

        if let Some(resolver) = &rule.upstream {
            let upstream_qname = format!("{}{}", name, UPSTREAM_SUFFIX);
            if let Some(values) = self.upstream.query_ptr(resolver, &upstream_qname, self.upstream_timeout).await {
                if !values.is_empty() {
                    let answers = values
                        .into_iter()
                        .map(|v| Record::PTR { ptrdname: v.trim_end_matches('.').to_string() })
                        .collect();
                    return Outcome::answered(answers);
                }
            }
            tracing::debug!("No upstream answer from {} for '{}', synthesizing", resolver, name);
        }

        match SynthesisEngine::hostname_in_rule(addr, rule) {
            Some(ptrdname) => Outcome::answered(vec![Record::PTR { ptrdname }]),
            None => Outcome::nxdomain(),
        }
    }

    fn handle_aaaa(&self, name: &str) -> Outcome {
        match self.engine.address_for_hostname(name) {
            Some(addr) => Outcome::answered(vec![Record::AAAA { addr }]),
            None => Outcome::nxdomain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::rules::{NetworkRule, RuleSet};
    use crate::types::Rcode;
    use std::sync::Mutex;

    struct ScriptedUpstream {
        answer: Option<Vec<String>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedUpstream {
        fn new(answer: Option<Vec<&str>>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(|v| v.into_iter().map(String::from).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl UpstreamResolver for ScriptedUpstream {
        async fn query_ptr(&self, resolver: &str, qname: &str, _timeout: Duration) -> Option<Vec<String>> {
            self.calls.lock().unwrap().push((resolver.to_string(), qname.to_string()));
            self.answer.clone()
        }
    }

    const UPSTREAM_NET_PTR: &str = "6.2.8.0.b.c.e.f.f.f.a.e.6.1.2.0.0.c.c.c.e.0.0.1.8.8.d.4.1.0.0.2.ip6.arpa.";
    const LOCAL_NET_PTR: &str = "0.f.e.d.c.b.a.9.8.7.6.5.4.3.2.1.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa.";

    fn handler(upstream: Arc<ScriptedUpstream>) -> RequestHandler {
        let rules = RuleSet::new(vec![
            NetworkRule::new(
                "2001:4d88:100e:ccc0::/64".parse().unwrap(),
                "ipv6-%DIGITS%.example.com",
                Some("2001:4860:4860::8888".into()),
            )
            .unwrap(),
            NetworkRule::new("2001:db8::/64".parse().unwrap(), "host-%DIGITS%.example.com", None).unwrap(),
        ]);
        RequestHandler::new(SynthesisEngine::new(Arc::new(rules)), upstream, Duration::from_secs(2), false)
    }

    fn query(qname: &str, qtype: QType) -> Query {
        Query { id: 1, qname: qname.to_string(), qtype, recursion_desired: true }
    }

    fn ptr(name: &str) -> Record {
        Record::PTR { ptrdname: name.to_string() }
    }

    #[tokio::test]
    async fn test_ptr_synthesis_without_upstream() {
        let upstream = ScriptedUpstream::new(None);
        let out = handler(upstream.clone()).handle(&query(LOCAL_NET_PTR, QType::PTR)).await;
        assert_eq!(out, Outcome::answered(vec![ptr("host-123456789abcdef0.example.com")]));
        assert!(upstream.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ptr_upstream_overrides_synthesis() {
        let upstream = ScriptedUpstream::new(Some(vec!["actual-host.example.com."]));
        let out = handler(upstream.clone()).handle(&query(UPSTREAM_NET_PTR, QType::PTR)).await;
        assert_eq!(out, Outcome::answered(vec![ptr("actual-host.example.com")]));

        let calls = upstream.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "2001:4860:4860::8888");
        assert_eq!(calls[0].1, format!("{}upstream", UPSTREAM_NET_PTR));
    }

    #[tokio::test]
    async fn test_ptr_upstream_multiple_values_kept_in_order() {
        let upstream = ScriptedUpstream::new(Some(vec!["a.example.com", "b.example.com."]));
        let out = handler(upstream).handle(&query(UPSTREAM_NET_PTR, QType::PTR)).await;
        assert_eq!(out.answers, vec![ptr("a.example.com"), ptr("b.example.com")]);
    }

    #[tokio::test]
    async fn test_ptr_upstream_failure_falls_back() {
        for answer in [None, Some(vec![])] {
            let out = handler(ScriptedUpstream::new(answer)).handle(&query(UPSTREAM_NET_PTR, QType::PTR)).await;
            assert_eq!(out, Outcome::answered(vec![ptr("ipv6-0216eafffecb0826.example.com")]));
        }
    }

    #[tokio::test]
    async fn test_ptr_outside_networks() {
        let qname = "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.9.b.d.1.0.0.2.ip6.arpa.";
        let out = handler(ScriptedUpstream::new(None)).handle(&query(qname, QType::PTR)).await;
        assert_eq!(out, Outcome::nxdomain());
    }

    #[tokio::test]
    async fn test_ptr_malformed_reverse_name() {
        let h = handler(ScriptedUpstream::new(None));
        for qname in ["example.com.", "1.2.3.ip6.arpa.", "x.f.e.d.c.b.a.9.8.7.6.5.4.3.2.1.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa."] {
            assert_eq!(h.handle(&query(qname, QType::PTR)).await.rcode, Rcode::NXDomain, "{}", qname);
        }
    }

    #[tokio::test]
    async fn test_aaaa_synthesis() {
        let out = handler(ScriptedUpstream::new(None)).handle(&query("host-123456789abcdef0.example.com.", QType::AAAA)).await;
        assert_eq!(out, Outcome::answered(vec![Record::AAAA { addr: "2001:db8::1234:5678:9abc:def0".parse().unwrap() }]));
    }

    #[tokio::test]
    async fn test_aaaa_not_found_cases() {
        let h = handler(ScriptedUpstream::new(None));
        for qname in ["other-host.example.org.", "host-gggggggggggggggg.example.com.", "host-abc.example.com."] {
            assert_eq!(h.handle(&query(qname, QType::AAAA)).await, Outcome::nxdomain(), "{}", qname);
        }
    }

    #[tokio::test]
    async fn test_unsupported_type() {
        let h = handler(ScriptedUpstream::new(None));
        let out = h.handle(&query("host-123456789abcdef0.example.com.", QType::Other(1))).await;
        assert_eq!(out, Outcome::nxdomain());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_query_log_fields() {
        use hickory_proto::op::{Message, Query as Question};
        use hickory_proto::rr::{Name, RecordType};
        use std::str::FromStr;

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let rules = RuleSet::new(vec![NetworkRule::new("2001:db8::/64".parse().unwrap(), "host-%DIGITS%.example.com", None).unwrap()]);
        let h = RequestHandler::new(SynthesisEngine::new(Arc::new(rules)), ScriptedUpstream::new(None), Duration::from_secs(2), true);

        let mut message = Message::new();
        message.set_id(9);
        message.add_query(Question::query(Name::from_str(LOCAL_NET_PTR).unwrap(), RecordType::PTR));
        let src: SocketAddr = "[2001:db8::53]:5353".parse().unwrap();
        h.handle_datagram(&message.to_vec().unwrap(), src).await.unwrap();

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("query"), "{}", output);
        assert!(output.contains("src=2001:db8::53"), "{}", output);
        assert!(output.contains(&format!("qname={}", LOCAL_NET_PTR)), "{}", output);
        assert!(output.contains("qtype=PTR"), "{}", output);
    }
}
