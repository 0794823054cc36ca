//! Scripted in-memory transport for controller and session tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use graphrag_shared::StageError;
use graphrag_transport::{Method, StageResult, Transport};

/// What the next call returns.
pub(crate) enum Reply {
    Json(Value),
    Fail(StageError),
    /// Never resolves.
    Hang,
    /// Resolves with the value once the gate is notified.
    Gated(Arc<Notify>, Value),
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub endpoint: String,
    pub body: Option<Value>,
}

/// Pops one scripted reply per call and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        _method: Method,
        endpoint: &str,
        body: Option<&Value>,
        _timeout: Option<Duration>,
    ) -> impl Future<Output = StageResult> + Send {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.to_string(),
            body: body.cloned(),
        });
        let reply = self.replies.lock().unwrap().pop_front();
        let endpoint = endpoint.to_string();

        async move {
            match reply {
                Some(Reply::Json(value)) => Ok(value),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                Some(Reply::Gated(gate, value)) => {
                    gate.notified().await;
                    Ok(value)
                }
                None => Err(StageError::Network {
                    endpoint,
                    detail: "no scripted reply left".into(),
                }),
            }
        }
    }
}
