// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The core's only hard dependency on a language model.
///
/// A provider materializes one assistant turn as a stream of
/// [`ResponseEvent`]s: text deltas, tool-call fragments, usage, and a final
/// `Done`.  Transient transport failures are retried inside the provider;
/// an error returned from `complete` (or yielded by the stream) means the
/// attempt budget is exhausted and the caller should abort the turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
