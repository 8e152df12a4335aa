//! Handwire - hand-tracking pose ingestion over TCP.
//!
//! This crate turns the JSON landmark stream of an external hand tracker
//! into smoothed skeletal bone updates, without owning any rendering,
//! input, or actor machinery: the host supplies a [`pose::PoseSink`]
//! and drives [`service::IngestService::tick`] once per frame.
//!
//! # Architecture
//!
//! The pipeline is a straight line, leaves first:
//!
//! - **Transport** - persistent TCP client, non-blocking receive
//! - **Assembler** - byte stream → discrete JSON frames
//! - **Decoder** - JSON frame → typed landmark records
//! - **Mapper** - tracker space → target space, per profile
//! - **Applier** - landmarks → smoothed per-bone updates
//! - **Service** - tick-driven orchestrator and reconnect policy
//!
//! # Modules
//!
//! - [`transport`] - socket lifecycle and polling
//! - [`assembler`] - frame boundary recovery
//! - [`decode`] - message types and decoding
//! - [`mapping`] - coordinate conversion and the calibration profile
//! - [`pose`] - bone resolution, smoothing, and the sink boundary
//! - [`service`] - the ingestion service itself
//! - [`config`] - configuration loading/saving

// Library modules
pub mod assembler;
pub mod config;
pub mod constants;
pub mod decode;
pub mod mapping;
pub mod pose;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use assembler::{FrameAssembler, FrameError};
pub use config::Config;
pub use decode::{decode, DecodeError, Hand, HandSide, Landmark, TrackingMessage};
pub use mapping::{to_target_space, AxisMap, MappingProfile, TrackerAxis};
pub use pose::{resolve_bone, BoneId, BoneTable, BoneUpdate, PoseApplier, PoseSink};
pub use service::{IngestService, ReconnectBackoff, SessionStats};
pub use transport::{ConnectError, ConnectionState, RecvError, SendError, TransportClient};
