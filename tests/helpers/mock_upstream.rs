use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, PTR};
use hickory_proto::rr::{Name, RData, Record};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// What the mock resolver sends back for every query.
#[derive(Clone, Debug)]
pub enum Reply {
    Ptr(Vec<String>),
    A,
    Rcode(ResponseCode),
    WrongId,
    Garbage,
    Silent,
}

/// Minimal UDP DNS server answering PTR queries with a scripted reply.
pub struct MockUpstream {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start(reply: Reply) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let seen_task = seen.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        let Ok(query) = Message::from_vec(&buf[..len]) else { continue };
                        if let Some(q) = query.queries().first() {
                            seen_task.lock().unwrap().push(q.name().to_ascii());
                        }
                        if let Some(bytes) = Self::build_reply(&query, &reply) {
                            let _ = socket.send_to(&bytes, peer).await;
                        }
                    }
                }
            }
        });

        Ok(Self { addr, seen, shutdown_tx: Some(shutdown_tx) })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn build_reply(query: &Message, reply: &Reply) -> Option<Vec<u8>> {
        let mut resp = Message::new();
        resp.set_id(query.id()).set_message_type(MessageType::Response);
        for q in query.queries() {
            resp.add_query(q.clone());
        }
        let owner = query.queries().first().map(|q| q.name().clone()).unwrap_or_else(Name::root);

        match reply {
            Reply::Silent => return None,
            Reply::Garbage => return Some(b"\xde\xad".to_vec()),
            Reply::WrongId => {
                resp.set_id(query.id().wrapping_add(1));
                let target = Name::from_str("spoofed.example.com.").unwrap();
                resp.add_answer(Record::from_rdata(owner, 60, RData::PTR(PTR(target))));
            }
            Reply::Rcode(rcode) => {
                resp.set_response_code(*rcode);
            }
            Reply::A => {
                resp.add_answer(Record::from_rdata(owner, 60, RData::A(A("192.0.2.1".parse().unwrap()))));
            }
            Reply::Ptr(targets) => {
                for target in targets {
                    let name = Name::from_str(target).unwrap();
                    resp.add_answer(Record::from_rdata(owner.clone(), 60, RData::PTR(PTR(name))));
                }
            }
        }
        resp.to_vec().ok()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
