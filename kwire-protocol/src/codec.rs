//! Request encoder and response decoder.
//!
//! [`Codec`] ties the frame layer to struct dispatch. It holds no session
//! state, so one instance can serve any number of connections.

use crate::api::ApiKey;
use crate::config::CodecConfig;
use crate::dispatch::Dispatch;
use crate::error::ProtocolError;
use crate::frame::{
    pack_correlation_id, split_frame, unpack_correlation_id, write_frame, FrameSplit,
};
use crate::primitive::{get_i32, put_string};
use crate::schema::{SchemaRegistry, StructCodec};
use crate::translate::{ErrorCodeTranslator, FieldTranslator};
use crate::value::Struct;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Falls back to [`CodecConfig::default_api_version`] when unset.
    pub api_version: Option<i16>,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    /// Request body; its struct name selects the api key.
    pub message: Struct,
}

impl Request {
    pub fn new(correlation_id: i32, message: Struct) -> Self {
        Self {
            api_version: None,
            correlation_id,
            client_id: None,
            message,
        }
    }

    pub fn with_api_version(mut self, version: i16) -> Self {
        self.api_version = Some(version);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub api_key: i16,
    pub correlation_id: i32,
    pub message: Struct,
}

impl Response {
    pub fn new(api_key: i16, correlation_id: i32, message: Struct) -> Self {
        Self {
            api_key,
            correlation_id,
            message,
        }
    }
}

/// Outcome of decoding from a receive buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// A full frame decoded; the bytes after it are returned for the next call.
    Complete(T, Bytes),
    /// The buffer does not hold a full frame yet. Holds the input unchanged.
    IncompleteFrame(Bytes),
}

impl<T> Decoded<T> {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Decoded::IncompleteFrame(_))
    }

    /// Returns the decoded value, if a full frame was available.
    pub fn complete(self) -> Option<(T, Bytes)> {
        match self {
            Decoded::Complete(value, rest) => Some((value, rest)),
            Decoded::IncompleteFrame(_) => None,
        }
    }
}

/// Encodes requests and decodes responses.
#[derive(Debug, Clone, Default)]
pub struct Codec<S = SchemaRegistry, T = ErrorCodeTranslator> {
    config: CodecConfig,
    structs: S,
    translator: T,
}

impl Codec {
    /// Creates a codec over the v0 schemas with error-code translation.
    pub fn new(config: CodecConfig) -> Self {
        Self::with_parts(config, SchemaRegistry::new(), ErrorCodeTranslator)
    }
}

impl<S, T> Codec<S, T>
where
    S: StructCodec,
    T: FieldTranslator,
{
    pub fn with_parts(config: CodecConfig, structs: S, translator: T) -> Self {
        Self {
            config,
            structs,
            translator,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn dispatch(&self) -> Dispatch<'_> {
        Dispatch::new(&self.structs, &self.translator, self.config.verify_crc)
    }

    /// Encodes `request` into one size-prefixed frame.
    ///
    /// Nothing is returned unless the whole frame encoded, so a correlation
    /// id overflow or a body that does not match its schema yields only an
    /// error.
    pub fn encode_request(&self, request: &Request) -> Result<BytesMut, ProtocolError> {
        let api = ApiKey::from_request_name(request.message.name)?;
        let combined = pack_correlation_id(api.code(), request.correlation_id)?;
        let api_version = request.api_version.unwrap_or(self.config.default_api_version);
        let dispatch = self.dispatch();

        let mut buf = BytesMut::new();
        write_frame(&mut buf, self.config.max_frame_size, |body| {
            body.put_i16(api.code());
            body.put_i16(api_version);
            body.put_i32(combined);
            put_string(body, request.client_id.as_deref())?;
            self.structs.encode(&request.message, &dispatch, body)
        })?;
        Ok(buf)
    }

    /// Decodes the first response frame in `input`.
    ///
    /// Failures after the correlation id was read are wrapped in
    /// [`ProtocolError::Response`] with a copy of the bytes that were not
    /// consumed.
    pub fn decode_response(&self, input: Bytes) -> Result<Decoded<Response>, ProtocolError> {
        let (mut body, rest) = match split_frame(input, self.config.max_frame_size)? {
            FrameSplit::Incomplete(original) => return Ok(Decoded::IncompleteFrame(original)),
            FrameSplit::Complete { body, rest } => (body, rest),
        };

        let combined = get_i32(&mut body)?;
        let (api_key, correlation_id) = unpack_correlation_id(combined);
        tracing::trace!(
            "Decoding response: api_key={} correlation_id={} body={} bytes",
            api_key,
            correlation_id,
            body.len()
        );

        let message = self
            .decode_body(api_key, &mut body)
            .map_err(|source| ProtocolError::Response {
                api_key,
                correlation_id,
                remaining: Bytes::copy_from_slice(&body),
                source: Box::new(source),
            })?;

        if !body.is_empty() {
            tracing::debug!(
                "Ignoring {} trailing bytes in response {} (api_key={})",
                body.len(),
                correlation_id,
                api_key
            );
        }

        Ok(Decoded::Complete(
            Response {
                api_key,
                correlation_id,
                message,
            },
            rest,
        ))
    }

    fn decode_body(&self, api_key: i16, body: &mut Bytes) -> Result<Struct, ProtocolError> {
        let api = ApiKey::from_code(api_key)?;
        self.structs.decode(api.response_name(), &self.dispatch(), body)
    }

    /// Encodes `response` the way a broker would send it.
    pub fn encode_response(&self, response: &Response) -> Result<BytesMut, ProtocolError> {
        let api = ApiKey::from_code(response.api_key)?;
        if response.message.name != api.response_name() {
            return Err(ProtocolError::TypeMismatch {
                expected: api.response_name(),
                actual: response.message.name,
            });
        }
        let combined = pack_correlation_id(api.code(), response.correlation_id)?;
        let dispatch = self.dispatch();

        let mut buf = BytesMut::new();
        write_frame(&mut buf, self.config.max_frame_size, |body| {
            body.put_i32(combined);
            self.structs.encode(&response.message, &dispatch, body)
        })?;
        Ok(buf)
    }
}
