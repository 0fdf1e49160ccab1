use crate::{
    proto,
    types::{AuthContext, ProtoDeserializable, QuerySpec},
};

#[derive(Debug)]
pub enum ClientMessagePayload {
    Query { auth: AuthContext, spec: QuerySpec },
    Cancel { request_id: u32 },
}

#[derive(Debug)]
pub struct ClientMessage {
    pub request_id: u32,
    pub payload: ClientMessagePayload,
}

impl ProtoDeserializable<proto::ClientMessage> for ClientMessage {
    fn from_proto(proto_message: proto::ClientMessage) -> Result<Self, String> {
        let Some(request_id) = proto_message.request_id else {
            return Err("client message must have a request_id".to_owned());
        };
        let payload = match proto_message.payload {
            Some(proto::client_message::Payload::Query(request)) => {
                let auth = request
                    .auth
                    .ok_or_else(|| "query request must have an auth context".to_owned())?;
                let spec = request
                    .query
                    .ok_or_else(|| "query request must have a query spec".to_owned())?;
                ClientMessagePayload::Query {
                    auth: AuthContext::from_proto(auth)?,
                    spec: QuerySpec::from_proto(spec)?,
                }
            }
            Some(proto::client_message::Payload::Cancel(request)) => ClientMessagePayload::Cancel {
                request_id: request.request_id,
            },
            None => return Err("client message must have a payload".to_owned()),
        };
        Ok(Self {
            request_id,
            payload,
        })
    }
}
