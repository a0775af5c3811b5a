/// Re-delivers a request to the running function without waiting for it.
pub trait SelfInvoker {
    fn invoke_self_async(&self, payload: &[u8]) -> Result<(), String>;
}
