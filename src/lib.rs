//! Templight Tools
//!
//! Capture, encode and convert template instantiation traces.
//!
//! A compiler hook feeds begin/end events into a [`tracer::Tracer`], which
//! filters them and hands the survivors to a [`output::TraceWriter`]. The
//! compact binary trace format is written by [`protobuf::ProtobufWriter`]
//! and read back by [`protobuf::TraceReader`], so a trace captured once can
//! be converted into any of the text formats later.
//!
//! ## Getting Started
//!
//! ```bash
//! cargo install templight-tools
//! templight-convert trace.pbf -f graphml -o trace.graphml
//! ```

pub mod aggregator;
pub mod commands;
pub mod entries;
pub mod output;
pub mod protobuf;
pub mod tracer;
pub mod utils;
