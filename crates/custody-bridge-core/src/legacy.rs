//! Deprecated `send` / `sendAsync` calling conventions still used by web3 v1.x,
//! including its batched request arrays.

use std::collections::HashMap;

use futures::future::join_all;
use serde_json::Value;

use crate::broker::{Provider, ETH_SEND_TRANSACTION, SEND_BATCH_TRANSACTION};
use crate::domain::{BatchResponse, RequestEnvelope, RequestPayload, JSONRPC_VERSION};
use crate::error::ProviderError;
use crate::ports::{ClockPort, NodePort, PortError, ServicePort, SurfaceHost};

pub type LegacyCallback = Box<dyn FnOnce(Result<Value, ProviderError>)>;

/// The three legacy call shapes, resolved by the caller.
pub enum LegacyCall {
    /// `send(payload, callback)`: the outcome goes to the callback.
    WithCallback(RequestEnvelope, LegacyCallback),
    /// `send(method, params)`.
    MethodParams(String, Vec<Value>),
    /// `send(payload)`, single or batch.
    Envelope(RequestEnvelope),
}

impl<N, S, H, C> Provider<N, S, H, C>
where
    N: NodePort,
    S: ServicePort,
    H: SurfaceHost,
    C: ClockPort,
{
    /// Returns `Ok(None)` when the outcome was handed to a callback.
    pub async fn send(&self, call: LegacyCall) -> Result<Option<Value>, ProviderError> {
        match call {
            LegacyCall::WithCallback(envelope, callback) => {
                let outcome = self.send_async(envelope).await;
                callback(outcome);
                Ok(None)
            }
            LegacyCall::MethodParams(method, params) => self
                .send_async(RequestPayload::with_params(method, params).into())
                .await
                .map(Some),
            LegacyCall::Envelope(envelope) => self.send_async(envelope).await.map(Some),
        }
    }

    pub async fn send_async(&self, envelope: RequestEnvelope) -> Result<Value, ProviderError> {
        match envelope {
            RequestEnvelope::Single(payload) => self.request(&payload).await,
            RequestEnvelope::Batch(batch) => {
                let responses = self.send_batch(&batch).await;
                serde_json::to_value(responses).map_err(|e| {
                    PortError::Validation(format!("encode batch response: {e}")).into()
                })
            }
        }
    }

    /// Runs a batch with per-entry isolation. Every `eth_sendTransaction`
    /// entry is folded into one batch submission and shares its outcome.
    pub async fn send_batch(&self, batch: &[RequestPayload]) -> Vec<BatchResponse> {
        let base = self.reserve_ids(batch.len() as u64);
        let id_for = |index: usize| base + index as u64 + 1;

        if !self.has_host_provider() && !self.is_connected() {
            if let Err(e) = self.enable().await {
                tracing::warn!(error = %e, entries = batch.len(), "batch aborted before dispatch");
                let error = e.to_rpc_error();
                return (0..batch.len())
                    .map(|i| response(id_for(i), Err(error.clone())))
                    .collect();
            }
        }

        let transactions: Vec<Value> = batch
            .iter()
            .filter(|r| is_transaction(r))
            .map(|r| r.param(0).cloned().unwrap_or(Value::Null))
            .collect();
        tracing::debug!(
            entries = batch.len(),
            transactions = transactions.len(),
            "dispatching batch"
        );

        let shared = async {
            if transactions.is_empty() {
                return None;
            }
            let payload = RequestPayload::with_params(SEND_BATCH_TRANSACTION, transactions);
            Some(self.request(&payload).await.map_err(|e| e.to_rpc_error()))
        };
        let singles = join_all(
            batch
                .iter()
                .enumerate()
                .filter(|(_, r)| !is_transaction(r))
                .map(|(i, r)| async move {
                    let payload = RequestPayload {
                        id: Some(id_for(i)),
                        jsonrpc: Some(JSONRPC_VERSION.to_owned()),
                        method: r.method.clone(),
                        params: r.params.clone(),
                    };
                    (i, self.request(&payload).await.map_err(|e| e.to_rpc_error()))
                }),
        );
        let (shared, singles) = futures::join!(shared, singles);
        let mut singles: HashMap<usize, Result<Value, Value>> = singles.into_iter().collect();

        batch
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let outcome = if is_transaction(r) {
                    shared.clone()
                } else {
                    singles.remove(&i)
                };
                let outcome = outcome.unwrap_or_else(|| {
                    Err(ProviderError::from(PortError::NotFound(format!(
                        "no outcome for batch entry {i}"
                    )))
                    .to_rpc_error())
                });
                response(id_for(i), outcome)
            })
            .collect()
    }
}

fn is_transaction(payload: &RequestPayload) -> bool {
    payload.method == ETH_SEND_TRANSACTION
}

fn response(id: u64, outcome: Result<Value, Value>) -> BatchResponse {
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(error) => (None, Some(error)),
    };
    BatchResponse {
        id,
        jsonrpc: JSONRPC_VERSION.to_owned(),
        result,
        error,
    }
}
