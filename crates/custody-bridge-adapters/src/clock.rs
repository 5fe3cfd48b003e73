use std::time::Duration;

use async_trait::async_trait;

use custody_bridge_core::ClockPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClockAdapter;

#[async_trait(?Send)]
impl ClockPort for SystemClockAdapter {
    async fn sleep(&self, duration: Duration) {
        #[cfg(target_arch = "wasm32")]
        {
            browser_sleep(duration).await;
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(target_arch = "wasm32")]
async fn browser_sleep(duration: Duration) {
    let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().and_then(|window| {
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                .ok()
        });
        // Without a window there is nothing to wait on.
        if scheduled.is_none() {
            let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
