//! Incremental HTTP/1.x response parser.
//!
//! Input arrives in arbitrary chunks straight off the endpoint; the parser
//! keeps whatever partial line it has seen between calls. Bodies are either
//! delimited by `Content-Length`, chunked, or run until the connection
//! closes.

use bytes::BytesMut;
use thiserror::Error;

use crate::http::response::Response;

/// Longest status, header, chunk-size or trailer line accepted.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Upper bound on the up-front allocation made from a declared length.
const MAX_BODY_RESERVE: usize = 64 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid status line")]
    InvalidStatusLine,

    #[error("invalid header line")]
    InvalidHeader,

    #[error("invalid Content-Length")]
    InvalidContentLength,

    #[error("invalid chunk size")]
    InvalidChunkSize,

    #[error("unsupported transfer encoding {0:?}")]
    UnsupportedTransferEncoding(String),

    #[error("line longer than {MAX_LINE_LENGTH} bytes")]
    LineTooLong,

    #[error("body longer than Content-Length")]
    BodyTooLong,

    #[error("data after end of response")]
    TrailingData,

    #[error("response incomplete")]
    Incomplete,

    #[error("parser already failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StatusLine,
    Headers,
    Body,
    ChunkSize,
    ChunkData { remaining: usize },
    ChunkEnd,
    Trailers,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    line: Vec<u8>,
    response: Response,
    body: BytesMut,
    content_length: Option<usize>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            line: Vec::new(),
            response: Response::default(),
            body: BytesMut::new(),
            content_length: None,
        }
    }

    /// Consumes one buffer. An error is terminal: every later call fails too.
    pub fn parse(&mut self, buf: &[u8]) -> Result<(), ParseError> {
        if self.state == ParseState::Failed {
            return Err(ParseError::Failed);
        }
        let result = self.parse_inner(buf);
        if result.is_err() {
            self.state = ParseState::Failed;
        }
        result
    }

    /// Whether the bytes consumed so far form a complete response, if the
    /// stream were to end right now.
    pub fn is_end_of_stream_valid(&self) -> bool {
        match self.state {
            ParseState::Body => self
                .content_length
                .is_none_or(|len| self.body.len() == len),
            ParseState::Done => true,
            _ => false,
        }
    }

    /// Status code, once the status line has been parsed.
    pub fn status(&self) -> Option<u16> {
        match self.state {
            ParseState::StatusLine | ParseState::Failed => None,
            _ => Some(self.response.status),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = self.response;
        response.body = self.body.freeze();
        response
    }

    fn parse_inner(&mut self, buf: &[u8]) -> Result<(), ParseError> {
        let mut rest = buf;
        while !rest.is_empty() {
            match self.state {
                ParseState::Body => {
                    if let Some(len) = self.content_length {
                        if self.body.len() + rest.len() > len {
                            return Err(ParseError::BodyTooLong);
                        }
                    }
                    self.body.extend_from_slice(rest);
                    rest = &[];
                }
                ParseState::ChunkData { remaining } => {
                    let n = remaining.min(rest.len());
                    self.body.extend_from_slice(&rest[..n]);
                    rest = &rest[n..];
                    self.state = if n == remaining {
                        ParseState::ChunkEnd
                    } else {
                        ParseState::ChunkData {
                            remaining: remaining - n,
                        }
                    };
                }
                ParseState::Done => return Err(ParseError::TrailingData),
                ParseState::Failed => return Err(ParseError::Failed),
                _ => {
                    let (taken, complete) = match rest.iter().position(|&b| b == b'\n') {
                        Some(pos) => (pos + 1, true),
                        None => (rest.len(), false),
                    };
                    self.line.extend_from_slice(&rest[..taken]);
                    rest = &rest[taken..];
                    if self.line.len() > MAX_LINE_LENGTH + 2 {
                        return Err(ParseError::LineTooLong);
                    }
                    if complete {
                        let line = std::mem::take(&mut self.line);
                        self.handle_line(trim_line_end(&line))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        match self.state {
            ParseState::StatusLine => self.handle_status_line(line),
            ParseState::Headers => {
                if line.is_empty() {
                    self.end_of_head()
                } else {
                    let (key, value) = parse_header(line)?;
                    self.response.headers.push((key, value));
                    Ok(())
                }
            }
            ParseState::ChunkSize => {
                let size = parse_chunk_size(line)?;
                self.state = if size == 0 {
                    ParseState::Trailers
                } else {
                    ParseState::ChunkData { remaining: size }
                };
                Ok(())
            }
            ParseState::ChunkEnd => {
                if !line.is_empty() {
                    return Err(ParseError::InvalidChunkSize);
                }
                self.state = ParseState::ChunkSize;
                Ok(())
            }
            ParseState::Trailers => {
                if line.is_empty() {
                    self.state = ParseState::Done;
                } else {
                    parse_header(line)?;
                }
                Ok(())
            }
            _ => Err(ParseError::Failed),
        }
    }

    fn handle_status_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidStatusLine)?;
        let mut parts = line.splitn(3, ' ');

        let version = parts.next().ok_or(ParseError::InvalidStatusLine)?;
        if !version.starts_with("HTTP/1.") {
            return Err(ParseError::InvalidStatusLine);
        }

        let code = parts.next().ok_or(ParseError::InvalidStatusLine)?;
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidStatusLine);
        }
        let status = code.parse().map_err(|_| ParseError::InvalidStatusLine)?;

        self.response.version = version.to_string();
        self.response.status = status;
        self.response.reason = parts.next().unwrap_or("").to_string();
        self.state = ParseState::Headers;
        Ok(())
    }

    fn end_of_head(&mut self) -> Result<(), ParseError> {
        if let Some(encoding) = self.response.header("Transfer-Encoding") {
            let encoding = encoding.trim();
            if encoding.eq_ignore_ascii_case("chunked") {
                self.state = ParseState::ChunkSize;
                return Ok(());
            }
            if !encoding.eq_ignore_ascii_case("identity") {
                return Err(ParseError::UnsupportedTransferEncoding(encoding.to_string()));
            }
        }

        let mut content_length = None;
        for (key, value) in &self.response.headers {
            if !key.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            let len: usize = value
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidContentLength)?;
            if content_length.is_some_and(|prev| prev != len) {
                return Err(ParseError::InvalidContentLength);
            }
            content_length = Some(len);
        }

        self.content_length = content_length;
        if let Some(len) = content_length {
            self.body.reserve(len.min(MAX_BODY_RESERVE));
        }
        self.state = ParseState::Body;
        Ok(())
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_header(line: &[u8]) -> Result<(String, String), ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidHeader)?;
    let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
    if key.is_empty() || key.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::InvalidHeader);
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidChunkSize)?;
    let size = line.split(';').next().unwrap_or("").trim();
    if size.is_empty() {
        return Err(ParseError::InvalidChunkSize);
    }
    usize::from_str_radix(size, 16).map_err(|_| ParseError::InvalidChunkSize)
}

/// Convenience for one-shot parsing of a complete response.
pub fn parse_complete_response(buf: &[u8]) -> Result<Response, ParseError> {
    let mut parser = ResponseParser::new();
    parser.parse(buf)?;
    if parser.is_end_of_stream_valid() {
        Ok(parser.into_response())
    } else {
        Err(ParseError::Incomplete)
    }
}
