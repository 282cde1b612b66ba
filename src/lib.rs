//! HTTP/1.1 body transfer layer for a document database client.
//!
//! Request and response bodies (JSON documents, attachments, change feeds)
//! move through stacked byte-stream decorators: a buffering layer in front of
//! the transport, a length limiter for `Content-Length` bodies, and a chunked
//! transfer-encoding codec for bodies of unknown length.
//!
//! ```
//! use docbody::streaming::{copy, ByteSink, ChunkedReader, ChunkedWriter, SliceSource};
//! use docbody::streaming::BufferedReader;
//!
//! let mut wire = Vec::new();
//! let mut writer = ChunkedWriter::new(&mut wire);
//! writer.write(b"{\"_id\":\"doc\"}").unwrap();
//! writer.close().unwrap();
//! drop(writer);
//!
//! let mut reader = ChunkedReader::new(BufferedReader::new(SliceSource::new(&wire)));
//! let mut body = Vec::new();
//! copy(&mut reader, &mut body).unwrap();
//! assert_eq!(body, b"{\"_id\":\"doc\"}");
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod streaming;

pub use body::{BodyReader, BodyWriter, Framing};
pub use config::StreamConfig;
pub use error::{ChunkError, ChunkLocation, HeaderState, Result, StreamError};
pub use streaming::{BodyRead, ByteSink, ByteSource, ChunkFraming};
