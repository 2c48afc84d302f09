use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future;
use reqwest::Client;
use tracing::{debug, error, info, trace};

use super::{FragmentStream, TextGenerator};
use crate::error::GenerationError;
use crate::provider::HTTPProvider;
use crate::sse;

/// A generator that streams completions over HTTP.
///
/// The provider owns the wire format; this type owns the transport. One
/// `reqwest::Client` is reused across calls, but every call opens exactly one
/// request.
///
/// # Examples
///
/// ```no_run
/// use helia_core::generation::{GenerationClient, HttpGenerator};
/// use helia_core::provider::gemini::GeminiProvider;
///
/// #[tokio::main]
/// async fn main() -> Result<(), helia_core::GenerationError> {
///     let client = GenerationClient::new(HttpGenerator::new(GeminiProvider::new()));
///     let generation = client
///         .generate("User: Hello\nAssistant:", |fragment| print!("{fragment}"))
///         .await?;
///     println!("\n({} tokens)", generation.tokens);
///     Ok(())
/// }
/// ```
pub struct HttpGenerator<P: HTTPProvider> {
    provider: Arc<P>,
    client: Client,
}

impl<P: HTTPProvider> HttpGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self::with_client(provider, Client::new())
    }

    pub fn with_client(provider: P, client: Client) -> Self {
        Self {
            provider: Arc::new(provider),
            client,
        }
    }
}

#[async_trait]
impl<P: HTTPProvider + 'static> TextGenerator for HttpGenerator<P> {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        let request = match self.provider.accept(prompt) {
            Ok(req) => {
                debug!(
                    "Request created successfully: {} {}",
                    req.method(),
                    req.url()
                );
                req
            }
            Err(e) => {
                error!("Failed to create request: {}", e);
                return Err(e);
            }
        };

        debug!("Sending HTTP request");
        let response = match self.client.execute(request).await {
            Ok(resp) => {
                info!("Received response with status: {}", resp.status());
                trace!("Response headers: {:#?}", resp.headers());
                resp
            }
            Err(e) => {
                error!("HTTP request failed: {}", e);
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            trace!("Error body: {}", body);
            return Err(self.provider.classify_failure(status, &body));
        }

        let provider = Arc::clone(&self.provider);
        let fragments = sse::data_events(Box::pin(response.bytes_stream()))
            .map(move |event| event.and_then(|data| provider.parse_event(&data)))
            .filter_map(|parsed| future::ready(parsed.transpose()));

        Ok(Box::pin(fragments))
    }
}
