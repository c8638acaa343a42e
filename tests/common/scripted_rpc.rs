//! Fake RPC endpoint that replays a scripted sequence of results.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use trade_resilience::{CallParameters, RpcError};

pub struct ScriptedRpc {
    script: Mutex<VecDeque<Result<String, RpcError>>>,
    /// Returned once the script runs out
    fallback: Result<String, RpcError>,
    calls: AtomicU32,
    seen_params: Mutex<Vec<CallParameters>>,
}

impl ScriptedRpc {
    pub fn new(
        script: Vec<Result<String, RpcError>>,
        fallback: Result<String, RpcError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            seen_params: Mutex::new(Vec::new()),
        })
    }

    /// Fails `failures` times with `error`, then returns `value` forever
    pub fn failing_then_ok(failures: usize, error: RpcError, value: &str) -> Arc<Self> {
        Self::new(vec![Err(error); failures], Ok(value.to_string()))
    }

    pub fn always_failing(error: RpcError) -> Arc<Self> {
        Self::new(Vec::new(), Err(error))
    }

    pub async fn call(&self, params: CallParameters) -> Result<String, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_params.lock().push(params);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn params_at(&self, attempt: usize) -> CallParameters {
        self.seen_params.lock()[attempt].clone()
    }
}
