//! The transport adapter (C5): a proxy presenting the same method surface
//! as a local node, backed by a synchronous JSON-over-HTTP RPC call.
//!
//! The original implementation builds this proxy dynamically at runtime;
//! here it is a concrete struct with one inherent method per remote
//! operation, all funnelling through [`RemoteNode::call`].

use crate::error::TransportError;
use crate::http;
use crate::rpc::{RpcRequest, RpcResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const RPC_PATH: &str = "/rpc";

/// A handle to a peer, identified only by its advertised address. New
/// instances are created on demand (`remote(addr)`) and are never cached
/// across calls -- see the design notes on cyclic peer references.
#[derive(Clone)]
pub struct RemoteNode {
    addr: String,
    timeout: Duration,
}

impl RemoteNode {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        RemoteNode {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn call<T: DeserializeOwned>(&self, request: RpcRequest) -> Result<T, TransportError> {
        let method = request.method_name();
        let body = serde_json::to_vec(&request).map_err(|e| TransportError::MalformedResponse {
            addr: self.addr.clone(),
            reason: format!("failed to encode request for {}: {}", method, e),
        })?;

        let (status, response_body) =
            http::post(&self.addr, RPC_PATH, &body, self.timeout).map_err(|source| {
                if source.kind() == std::io::ErrorKind::TimedOut {
                    TransportError::Timeout {
                        addr: self.addr.clone(),
                    }
                } else if source.kind() == std::io::ErrorKind::ConnectionRefused {
                    TransportError::Connect {
                        addr: self.addr.clone(),
                        source,
                    }
                } else {
                    TransportError::Io {
                        addr: self.addr.clone(),
                        source,
                    }
                }
            })?;

        if status != 200 {
            return Err(TransportError::MalformedResponse {
                addr: self.addr.clone(),
                reason: format!("HTTP status {} for method {}", status, method),
            });
        }

        let response: RpcResponse =
            serde_json::from_slice(&response_body).map_err(|e| TransportError::MalformedResponse {
                addr: self.addr.clone(),
                reason: format!("invalid JSON response to {}: {}", method, e),
            })?;

        match response {
            RpcResponse::Ok { result } => {
                serde_json::from_value(result).map_err(|e| TransportError::MalformedResponse {
                    addr: self.addr.clone(),
                    reason: format!("unexpected result shape for {}: {}", method, e),
                })
            }
            RpcResponse::Err { error } => Err(TransportError::Remote {
                addr: self.addr.clone(),
                message: error,
            }),
        }
    }

    pub fn ping(&self) -> Result<(), TransportError> {
        self.call(RpcRequest::Ping)
    }

    pub fn find_successor(&self, id: &str, hops_remaining: u32) -> Result<String, TransportError> {
        self.call(RpcRequest::FindSuccessor {
            id: id.to_string(),
            hops_remaining,
        })
    }

    pub fn current_predecessor(&self) -> Result<Option<String>, TransportError> {
        self.call(RpcRequest::CurrentPredecessor)
    }

    pub fn notify(&self, addr: &str) -> Result<(), TransportError> {
        self.call(RpcRequest::Notify {
            addr: addr.to_string(),
        })
    }

    pub fn closest_preceding_node(&self, id: &str) -> Result<String, TransportError> {
        self.call(RpcRequest::ClosestPrecedingNode { id: id.to_string() })
    }

    pub fn has_local_key(&self, key: &str) -> Result<bool, TransportError> {
        self.call(RpcRequest::HasLocalKey {
            key: key.to_string(),
        })
    }

    pub fn get_local(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, TransportError> {
        self.call(RpcRequest::GetLocal {
            key: key.to_string(),
            default,
        })
    }

    pub fn set_local(&self, key: &str, value: Value) -> Result<(), TransportError> {
        self.call(RpcRequest::SetLocal {
            key: key.to_string(),
            value,
        })
    }

    pub fn remove_local(&self, key: &str) -> Result<(), TransportError> {
        self.call(RpcRequest::RemoveLocal {
            key: key.to_string(),
        })
    }

    pub fn set_local_bulk(&self, pairs: BTreeMap<String, Value>) -> Result<(), TransportError> {
        self.call(RpcRequest::SetLocalBulk { pairs })
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, TransportError> {
        self.call(RpcRequest::Get {
            key: key.to_string(),
        })
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), TransportError> {
        self.call(RpcRequest::Set {
            key: key.to_string(),
            value,
        })
    }

    pub fn remove(&self, key: &str) -> Result<(), TransportError> {
        self.call(RpcRequest::Remove {
            key: key.to_string(),
        })
    }

    pub fn dump_state(&self) -> Result<Value, TransportError> {
        self.call(RpcRequest::DumpState)
    }

    pub fn dump_db(&self) -> Result<Value, TransportError> {
        self.call(RpcRequest::DumpDb)
    }
}
