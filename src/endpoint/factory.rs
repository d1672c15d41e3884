//! Turning an established proxied stream into the caller's protocol handler

use async_trait::async_trait;
use std::future::Future;

use super::socks::ProxiedStream;
use crate::error::Result;

/// Builds the caller's handler for a freshly connected stream
///
/// Called at most once per successful connection. An error returned here is
/// handed to the caller of `connect` unchanged and is never retried.
#[async_trait]
pub trait ProtocolFactory<S>: Send + Sync
where
    S: Send + 'static,
{
    type Protocol: Send;

    async fn build_protocol(&self, stream: ProxiedStream<S>) -> Result<Self::Protocol>;
}

/// Factory that hands back the raw proxied stream
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamFactory;

#[async_trait]
impl<S> ProtocolFactory<S> for StreamFactory
where
    S: Send + 'static,
{
    type Protocol = ProxiedStream<S>;

    async fn build_protocol(&self, stream: ProxiedStream<S>) -> Result<ProxiedStream<S>> {
        Ok(stream)
    }
}

/// Adapts an async closure into a [`ProtocolFactory`]
pub struct FnFactory<F>(pub F);

#[async_trait]
impl<S, F, Fut, P> ProtocolFactory<S> for FnFactory<F>
where
    S: Send + 'static,
    F: Fn(ProxiedStream<S>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<P>> + Send,
    P: Send,
{
    type Protocol = P;

    async fn build_protocol(&self, stream: ProxiedStream<S>) -> Result<P> {
        (self.0)(stream).await
    }
}
