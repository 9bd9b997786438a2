use crate::error::Result as NodeResult;
use crate::handler::status;
use crate::http::{HttpRequest, HttpResponse, ServerHandler};
use crate::identifier::Identifier;
use crate::node::Node;
use crate::rpc::{RpcRequest, RpcResponse};
use log::error;
use serde::Serialize;
use std::sync::Arc;

/// Handles every inbound HTTP request on the node's single listener:
/// `POST /rpc` for the JSON-RPC surface, `GET /` and `GET /db-dump` for
/// the status page.
pub struct DhtHandler {
    node: Arc<Node>,
}

impl DhtHandler {
    pub fn new(node: Arc<Node>) -> Self {
        DhtHandler { node }
    }

    fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let node = &self.node;

        match request {
            RpcRequest::Ping => RpcResponse::ok(()),

            RpcRequest::FindSuccessor { id, hops_remaining } => {
                match parse_id(node, &id) {
                    Ok(id) => to_response(node.find_successor_bounded(&id, hops_remaining)),
                    Err(response) => response,
                }
            }

            RpcRequest::CurrentPredecessor => RpcResponse::ok(node.current_predecessor()),

            RpcRequest::Notify { addr } => {
                node.notify(&addr);
                RpcResponse::ok(())
            }

            RpcRequest::ClosestPrecedingNode { id } => match parse_id(node, &id) {
                Ok(id) => RpcResponse::ok(node.closest_preceding_node(&id)),
                Err(response) => response,
            },

            RpcRequest::HasLocalKey { key } => to_response(node.has_local_key(&key)),
            RpcRequest::GetLocal { key, default } => to_response(node.get_local(&key, default)),
            RpcRequest::SetLocal { key, value } => to_response(node.set_local(&key, value)),
            RpcRequest::RemoveLocal { key } => to_response(node.remove_local(&key)),
            RpcRequest::SetLocalBulk { pairs } => to_response(node.set_local_bulk(pairs)),

            RpcRequest::Get { key } => to_response(node.get(&key)),
            RpcRequest::Set { key, value } => to_response(node.set(&key, value)),
            RpcRequest::Remove { key } => to_response(node.remove(&key)),

            RpcRequest::DumpState => RpcResponse::ok(node.dump_state()),
            RpcRequest::DumpDb => to_response(node.dump_db()),
        }
    }
}

fn parse_id(node: &Node, raw: &str) -> Result<Identifier, RpcResponse> {
    Identifier::parse(raw, node.ring_bits())
        .ok_or_else(|| RpcResponse::err(format!("invalid identifier: {:?}", raw)))
}

fn to_response<T: Serialize>(result: NodeResult<T>) -> RpcResponse {
    match result {
        Ok(value) => RpcResponse::ok(value),
        Err(err) => RpcResponse::err(err.to_string()),
    }
}

impl ServerHandler for DhtHandler {
    fn handle(&self, request: HttpRequest) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/rpc") => match serde_json::from_slice::<RpcRequest>(&request.body) {
                Ok(rpc_request) => HttpResponse::json(&self.dispatch(rpc_request)),
                Err(err) => {
                    HttpResponse::json(&RpcResponse::err(format!("malformed request: {}", err)))
                }
            },

            ("GET", "/") => HttpResponse::html(status::render(&self.node)),

            ("GET", "/db-dump") => match self.node.dump_db() {
                Ok(value) => HttpResponse::json(&value),
                Err(err) => {
                    error!("db-dump failed: {}", err);
                    HttpResponse::server_error("failed to dump local store")
                }
            },

            _ => HttpResponse::not_found(),
        }
    }
}
