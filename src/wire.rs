//! DNS wire format for inbound queries and outbound responses.
//!
//! Thin layer over `hickory-proto`; the handler only ever sees [`Query`] and
//! [`Outcome`].

use crate::types::{Outcome, QType, Query, Rcode, Record, ANSWER_TTL};
use hickory_proto::error::ProtoError;
use hickory_proto::op::{Message, MessageType, OpCode, Query as Question, ResponseCode};
use hickory_proto::rr::rdata::{AAAA, PTR};
use hickory_proto::rr::{DNSClass, Name, RData, Record as ResourceRecord, RecordType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(#[from] ProtoError),

    #[error("message is not a query")]
    NotQuery,

    #[error("message carries no question")]
    NoQuestion,
}

/// Decode the first question of a query datagram.
pub fn decode(bytes: &[u8]) -> Result<Query, WireError> {
    let message = Message::from_vec(bytes)?;
    if message.message_type() != MessageType::Query {
        return Err(WireError::NotQuery);
    }
    let question = message.queries().first().ok_or(WireError::NoQuestion)?;
    Ok(Query {
        id: message.id(),
        qname: question.name().to_ascii(),
        qtype: QType::from_code(u16::from(question.query_type())),
        recursion_desired: message.recursion_desired(),
    })
}

fn response_code(rcode: Rcode) -> ResponseCode {
    match rcode {
        Rcode::NoError => ResponseCode::NoError,
        Rcode::FormErr => ResponseCode::FormErr,
        Rcode::NXDomain => ResponseCode::NXDomain,
    }
}

/// Fully qualified name from a dotted string that may lack the trailing dot.
pub fn fqdn(name: &str) -> Result<Name, ProtoError> {
    if name.ends_with('.') {
        Name::from_ascii(name)
    } else {
        Name::from_ascii(format!("{}.", name))
    }
}

/// Build an authoritative response echoing the question of `query`.
pub fn encode(query: &Query, outcome: &Outcome) -> Result<Vec<u8>, WireError> {
    let name = fqdn(&query.qname)?;

    let mut message = Message::new();
    message
        .set_id(query.id)
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_recursion_desired(query.recursion_desired)
        .set_response_code(response_code(outcome.rcode));

    let mut question = Question::query(name.clone(), RecordType::from(query.qtype.code()));
    question.set_query_class(DNSClass::IN);
    message.add_query(question);

    for record in &outcome.answers {
        let rdata = match record {
            Record::PTR { ptrdname } => match fqdn(ptrdname) {
                Ok(target) => RData::PTR(PTR(target)),
                Err(e) => {
                    tracing::warn!("Dropping unencodable PTR target '{}': {}", ptrdname, e);
                    continue;
                }
            },
            Record::AAAA { addr } => RData::AAAA(AAAA(*addr)),
        };
        message.add_answer(ResourceRecord::from_rdata(name.clone(), ANSWER_TTL, rdata));
    }

    Ok(message.to_vec()?)
}

/// FORMERR reply to a datagram that could not be decoded.
pub fn encode_formerr(request: &[u8]) -> Result<Vec<u8>, WireError> {
    let id = if request.len() >= 2 { u16::from_be_bytes([request[0], request[1]]) } else { 0 };
    let mut message = Message::error_msg(id, OpCode::Query, response_code(Rcode::FormErr));
    message.set_authoritative(true);
    Ok(message.to_vec()?)
}
