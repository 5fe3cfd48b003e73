//! Bypass to a provider the host page already injected as `window.ethereum`
//! (an in-app browser shipping the custody wallet natively).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use wasm_bindgen::{JsCast, JsValue};

use custody_bridge_core::{HostProviderPort, PortError, RequestPayload};

#[derive(Debug, Clone)]
pub struct InjectedProviderAdapter {
    provider: JsValue,
}

impl InjectedProviderAdapter {
    /// Returns the injected provider when it carries a truthy `marker`
    /// property.
    pub fn detect(marker: &str) -> Option<Self> {
        let provider = browser_provider().ok()?;
        let flagged = get_prop(&provider, marker).ok()?.is_truthy();
        if !flagged {
            return None;
        }
        tracing::info!(marker, "using injected custody provider");
        Some(Self { provider })
    }

    async fn call_method(&self, name: &str, arg: Option<&JsValue>) -> Result<Value, PortError> {
        let function = get_prop(&self.provider, name)
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| PortError::NotFound(format!("window.ethereum.{name} is unavailable")))?;
        let returned = match arg {
            Some(arg) => function.call1(&self.provider, arg),
            None => function.call0(&self.provider),
        }
        .map_err(|e| PortError::Transport(format!("provider {name} dispatch failed: {e:?}")))?;
        let promise = returned.dyn_into::<js_sys::Promise>().map_err(|_| {
            PortError::Transport(format!("provider {name} did not return Promise"))
        })?;
        let result = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| PortError::Transport(format!("provider {name} rejected: {e:?}")))?;
        if result.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|e| PortError::Transport(format!("failed to decode provider result: {e}")))
    }
}

#[async_trait(?Send)]
impl HostProviderPort for InjectedProviderAdapter {
    async fn request(&self, payload: &RequestPayload) -> Result<Value, PortError> {
        let request = json!({
            "method": payload.method,
            "params": payload.params_value(),
        });
        let request_js = request
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| PortError::Transport(format!("failed to encode request: {e}")))?;
        self.call_method("request", Some(&request_js)).await
    }

    async fn enable(&self) -> Result<Value, PortError> {
        self.call_method("enable", None).await
    }
}

fn browser_provider() -> Result<JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

fn get_prop(target: &JsValue, key: &str) -> Result<JsValue, PortError> {
    js_sys::Reflect::get(target, &JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}
