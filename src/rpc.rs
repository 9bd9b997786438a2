//! The JSON request/response envelope carried over the wire (§4.5, §6).
//!
//! Method names and argument lists here are normative: two nodes built
//! from different versions of this crate still have to agree on them to
//! interoperate. Every RPC is one `RpcRequest` in, one `RpcResponse` out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RpcRequest {
    Ping,
    FindSuccessor { id: String, hops_remaining: u32 },
    CurrentPredecessor,
    Notify { addr: String },
    ClosestPrecedingNode { id: String },
    HasLocalKey { key: String },
    GetLocal { key: String, default: Option<Value> },
    SetLocal { key: String, value: Value },
    RemoveLocal { key: String },
    SetLocalBulk { pairs: BTreeMap<String, Value> },
    Get { key: String },
    Set { key: String, value: Value },
    Remove { key: String },
    DumpState,
    DumpDb,
}

impl RpcRequest {
    /// The bare method name, used for logging and in `ProtocolError`.
    pub fn method_name(&self) -> &'static str {
        match self {
            RpcRequest::Ping => "ping",
            RpcRequest::FindSuccessor { .. } => "find_successor",
            RpcRequest::CurrentPredecessor => "current_predecessor",
            RpcRequest::Notify { .. } => "notify",
            RpcRequest::ClosestPrecedingNode { .. } => "closest_preceding_node",
            RpcRequest::HasLocalKey { .. } => "has_local_key",
            RpcRequest::GetLocal { .. } => "get_local",
            RpcRequest::SetLocal { .. } => "set_local",
            RpcRequest::RemoveLocal { .. } => "remove_local",
            RpcRequest::SetLocalBulk { .. } => "set_local_bulk",
            RpcRequest::Get { .. } => "get",
            RpcRequest::Set { .. } => "set",
            RpcRequest::Remove { .. } => "remove",
            RpcRequest::DumpState => "dump_state",
            RpcRequest::DumpDb => "dump_db",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Ok { result: Value },
    Err { error: String },
}

impl RpcResponse {
    pub fn ok(result: impl Serialize) -> Self {
        RpcResponse::Ok {
            result: serde_json::to_value(result).unwrap_or(Value::Null),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        RpcResponse::Err {
            error: message.into(),
        }
    }
}
