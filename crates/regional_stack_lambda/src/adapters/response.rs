/// Delivers a custom resource response body to the engine's presigned URL.
pub trait ResponseChannel {
    fn put_response(&self, response_url: &str, body: &[u8]) -> Result<(), String>;
}
