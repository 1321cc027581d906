// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Request-body factory.
//!
//! One [`BodyFactory`] exists per run. It owns a lazily built buffer of
//! `size` bytes and its decoded string, and hands out one of seven body
//! representations on demand. The caching policy per kind decides which
//! allocation path is exercised:
//!
//! | kind                | what is fresh per call           | what is shared       |
//! |---------------------|----------------------------------|----------------------|
//! | `blob`              | the [`Blob`] wrapper             | buffer bytes         |
//! | `buffer`            | nothing                          | the buffer itself    |
//! | `string`            | nothing                          | the decoded string   |
//! | `form-data`         | [`FormData`] and its blob field  | buffer bytes         |
//! | `url-search-params` | [`UrlSearchParams`]              | the decoded string   |
//! | `async-iterator`    | [`AsyncProducer`]                | the decoded string   |
//! | `stream`            | [`ByteSource`]                   | buffer bytes         |
//!
//! Wrappers hand their allocation to the HTTP client through
//! [`Bytes::from_owner`], so each wrapper stays counted in [`LiveObjects`]
//! until the client releases the body. [`BodyPayload::attach`] also moves the
//! request's pending guard into the body, so a request counts as pending for
//! as long as the client holds what it was sent with.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{multipart, Body, RequestBuilder};

use crate::heap::{LiveGuard, LiveObjects, ObjectKind};
use crate::types::{BodyKind, BodySize};

/// Byte the shared buffer is filled with.
const FILL_BYTE: u8 = b'x';

const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";
const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Field name used by form-data and url-search-params bodies.
const FIELD_NAME: &str = "body";
/// File name given to blob parts, as browsers do for anonymous blobs.
const BLOB_FILE_NAME: &str = "blob";

/// Buffer and decoded string shared by every construction in a run.
#[derive(Debug)]
struct CachedPayload {
    buffer: Bytes,
    text: Arc<str>,
}

/// Builds request bodies for one run.
#[derive(Debug)]
pub struct BodyFactory {
    size: BodySize,
    stream_delay: Duration,
    live: Arc<LiveObjects>,
    cache: OnceLock<CachedPayload>,
    next_blob_id: AtomicU64,
}

impl BodyFactory {
    /// Create a factory; nothing is allocated until the first construction.
    pub fn new(size: BodySize, stream_delay: Duration, live: Arc<LiveObjects>) -> Self {
        Self {
            size,
            stream_delay,
            live,
            cache: OnceLock::new(),
            next_blob_id: AtomicU64::new(0),
        }
    }

    /// Configured byte length of every body.
    pub fn size(&self) -> BodySize {
        self.size
    }

    /// Whether the shared buffer has been built yet.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Construct one body of `kind`.
    pub fn construct(&self, kind: BodyKind) -> BodyPayload {
        let cache = self.cache();
        match kind {
            BodyKind::Blob => BodyPayload::Blob(self.blob(cache)),
            BodyKind::Buffer => BodyPayload::Buffer(cache.buffer.clone()),
            BodyKind::String => BodyPayload::Text(Arc::clone(&cache.text)),
            BodyKind::FormData => BodyPayload::FormData(FormData {
                fields: vec![(FIELD_NAME, self.blob(cache))],
                live: Arc::new(self.live.track(ObjectKind::FormData)),
            }),
            BodyKind::UrlSearchParams => BodyPayload::UrlSearchParams(UrlSearchParams {
                pairs: vec![(FIELD_NAME, Arc::clone(&cache.text))],
                live: self.live.track(ObjectKind::UrlSearchParams),
            }),
            BodyKind::AsyncIterator => BodyPayload::AsyncIterator(AsyncProducer {
                text: Arc::clone(&cache.text),
                live: self.live.track(ObjectKind::AsyncIterator),
            }),
            BodyKind::Stream => BodyPayload::Stream(ByteSource {
                buffer: cache.buffer.clone(),
                delay: self.stream_delay,
                live: self.live.track(ObjectKind::ReadableStream),
            }),
        }
    }

    fn cache(&self) -> &CachedPayload {
        self.cache.get_or_init(|| {
            let buffer = Bytes::from(vec![FILL_BYTE; self.size.bytes()]);
            let text: Arc<str> = Arc::from(String::from_utf8_lossy(&buffer).into_owned());
            tracing::debug!(bytes = buffer.len(), "Built shared body payload");
            CachedPayload { buffer, text }
        })
    }

    fn blob(&self, cache: &CachedPayload) -> Blob {
        Blob {
            id: self.next_blob_id.fetch_add(1, Ordering::Relaxed),
            data: cache.buffer.clone(),
            _live: self.live.track(ObjectKind::Blob),
        }
    }
}

/// One constructed request body.
#[derive(Debug)]
pub enum BodyPayload {
    Blob(Blob),
    Buffer(Bytes),
    Text(Arc<str>),
    FormData(FormData),
    UrlSearchParams(UrlSearchParams),
    AsyncIterator(AsyncProducer),
    Stream(ByteSource),
}

impl BodyPayload {
    pub fn kind(&self) -> BodyKind {
        match self {
            Self::Blob(_) => BodyKind::Blob,
            Self::Buffer(_) => BodyKind::Buffer,
            Self::Text(_) => BodyKind::String,
            Self::FormData(_) => BodyKind::FormData,
            Self::UrlSearchParams(_) => BodyKind::UrlSearchParams,
            Self::AsyncIterator(_) => BodyKind::AsyncIterator,
            Self::Stream(_) => BodyKind::Stream,
        }
    }

    /// Move the body into a request. `pending` is released together with
    /// the body, whenever the client drops it.
    pub fn attach(self, request: RequestBuilder, pending: LiveGuard) -> RequestBuilder {
        match self {
            Self::Blob(blob) => request.body(Pending::body(blob, pending)),
            Self::Buffer(buffer) => request.body(Pending::body(buffer, pending)),
            Self::Text(text) => request
                .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
                .body(Pending::body(SharedText(text), pending)),
            Self::FormData(form) => request.multipart(form.into_form(pending)),
            Self::UrlSearchParams(params) => request
                .header(CONTENT_TYPE, URLENCODED_CONTENT_TYPE)
                .body(Pending::body(params.into_encoded(), pending)),
            Self::AsyncIterator(producer) => {
                request.body(Body::wrap_stream(producer.into_stream().hold(pending)))
            }
            Self::Stream(source) => {
                request.body(Body::wrap_stream(source.into_stream().hold(pending)))
            }
        }
    }
}

/// Body bytes that keep the request's pending guard alive.
struct Pending<T> {
    inner: T,
    _pending: LiveGuard,
}

impl<T: AsRef<[u8]> + Send + 'static> Pending<T> {
    fn body(inner: T, pending: LiveGuard) -> Body {
        Body::from(Bytes::from_owner(Self {
            inner,
            _pending: pending,
        }))
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Pending<T> {
    fn as_ref(&self) -> &[u8] {
        self.inner.as_ref()
    }
}

/// Immutable byte wrapper, fresh per construction.
#[derive(Debug)]
pub struct Blob {
    id: u64,
    data: Bytes,
    _live: LiveGuard,
}

impl Blob {
    /// Identity of this wrapper; distinct for every blob a factory builds.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

struct SharedText(Arc<str>);

impl AsRef<[u8]> for SharedText {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Keyed-field container holding blob fields.
#[derive(Debug)]
pub struct FormData {
    fields: Vec<(&'static str, Blob)>,
    live: Arc<LiveGuard>,
}

impl FormData {
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Blob)> {
        self.fields.iter().map(|(name, blob)| (*name, blob))
    }

    fn into_form(self, pending: LiveGuard) -> multipart::Form {
        let FormData { fields, live } = self;
        let pending = Arc::new(pending);
        fields
            .into_iter()
            .fold(multipart::Form::new(), |form, (name, blob)| {
                let length = blob.data.len() as u64;
                let field = FormField {
                    blob,
                    _form: Arc::clone(&live),
                    _pending: Arc::clone(&pending),
                };
                let part = multipart::Part::stream_with_length(
                    Body::from(Bytes::from_owner(field)),
                    length,
                )
                .file_name(BLOB_FILE_NAME);
                form.part(name, part)
            })
    }
}

/// A blob part that keeps its parent container and request counted while
/// the client holds it.
struct FormField {
    blob: Blob,
    _form: Arc<LiveGuard>,
    _pending: Arc<LiveGuard>,
}

impl AsRef<[u8]> for FormField {
    fn as_ref(&self) -> &[u8] {
        self.blob.as_ref()
    }
}

/// Key/value container encoded as `application/x-www-form-urlencoded`.
#[derive(Debug)]
pub struct UrlSearchParams {
    pairs: Vec<(&'static str, Arc<str>)>,
    live: LiveGuard,
}

impl UrlSearchParams {
    pub fn get(&self, key: &str) -> Option<&Arc<str>> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_ref())))
            .finish()
    }

    fn into_encoded(self) -> EncodedParams {
        EncodedParams {
            encoded: self.encode(),
            _live: self.live,
        }
    }
}

struct EncodedParams {
    encoded: String,
    _live: LiveGuard,
}

impl AsRef<[u8]> for EncodedParams {
    fn as_ref(&self) -> &[u8] {
        self.encoded.as_bytes()
    }
}

/// Single-shot producer: yields the shared string once, then ends.
#[derive(Debug)]
pub struct AsyncProducer {
    text: Arc<str>,
    live: LiveGuard,
}

impl AsyncProducer {
    /// Drive the producer. The element is produced lazily on first poll.
    pub fn into_stream(self) -> GuardedStream {
        let AsyncProducer { text, live } = self;
        let inner = stream::once(async move { Ok(Bytes::from_owner(SharedText(text))) }).boxed();
        GuardedStream::new(inner, live)
    }
}

/// Push source: waits `delay`, emits the shared buffer once, then ends.
#[derive(Debug)]
pub struct ByteSource {
    buffer: Bytes,
    delay: Duration,
    live: LiveGuard,
}

impl ByteSource {
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn into_stream(self) -> GuardedStream {
        let ByteSource {
            buffer,
            delay,
            live,
        } = self;
        let inner = stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok(buffer)
        })
        .boxed();
        GuardedStream::new(inner, live)
    }
}

/// Body stream that keeps its source counted until the client drops it.
pub struct GuardedStream {
    inner: BoxStream<'static, Result<Bytes, Infallible>>,
    guards: Vec<LiveGuard>,
}

impl GuardedStream {
    fn new(inner: BoxStream<'static, Result<Bytes, Infallible>>, live: LiveGuard) -> Self {
        Self {
            inner,
            guards: vec![live],
        }
    }

    /// Keep one more guard alive for as long as the stream.
    pub fn hold(mut self, guard: LiveGuard) -> Self {
        self.guards.push(guard);
        self
    }
}

impl Stream for GuardedStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
