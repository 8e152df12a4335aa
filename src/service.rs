//! Tick-driven pose ingestion service.
//!
//! [`IngestService`] owns the whole pipeline (transport, assembler,
//! decoder, applier) and advances it one bounded step per host frame:
//!
//! ```text
//! tick(dt, sink)
//!   ├─ not connected?  count down the backoff timer, attempt a reconnect
//!   └─ connected:      drain ONE receive, then for every complete frame
//!                      assembled from it: decode → map → apply to sink
//! ```
//!
//! One receive per tick bounds the work done inside a host frame. All
//! per-message failures (oversized buffers, bad JSON) are contained to
//! the message and counted; only connection-level errors change session
//! state. Nothing here is fatal to the host; the worst outcome is that
//! hand tracking stalls until the next successful reconnect.
//!
//! The reconnect schedule lives here, not in the transport: exponential
//! backoff doubling from the initial delay up to a cap, reset on success.

use std::time::Duration;

use crate::assembler::FrameAssembler;
use crate::config::Config;
use crate::constants::{INITIAL_BACKOFF, MAX_BACKOFF};
use crate::decode::decode;
use crate::pose::{PoseApplier, PoseSink};
use crate::transport::{ConnectionState, TransportClient};

/// Exponential reconnect backoff: doubles per consecutive failure,
/// capped, reset on success. Delays are non-decreasing between resets.
#[derive(Debug)]
pub struct ReconnectBackoff {
    next: Duration,
}

impl ReconnectBackoff {
    /// Backoff starting at the initial delay.
    pub fn new() -> Self {
        Self { next: INITIAL_BACKOFF }
    }

    /// The delay to wait before the next attempt; doubles the stored
    /// delay up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }

    /// Reset to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.next = INITIAL_BACKOFF;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Session counters, logged at close and exposed for probes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Raw chunks drained from the socket.
    pub chunks: u64,
    /// Complete frames assembled.
    pub frames: u64,
    /// Frames that decoded into a tracking message.
    pub messages: u64,
    /// Frames discarded by the decoder.
    pub decode_errors: u64,
    /// Assembly failures (oversize, bad UTF-8).
    pub frame_errors: u64,
    /// Bone updates delivered to the sink.
    pub bone_updates: u64,
    /// Successful connects after the first.
    pub reconnects: u64,
}

/// The hand-pose ingestion service.
///
/// Single-threaded and cooperative: the host calls [`IngestService::tick`]
/// once per frame with the frame delta and a pose sink; everything runs
/// synchronously inside the call.
#[derive(Debug)]
pub struct IngestService {
    transport: TransportClient,
    assembler: FrameAssembler,
    applier: PoseApplier,
    backoff: ReconnectBackoff,
    /// Seconds until the next connect attempt; <= 0 means "try now".
    retry_timer: f32,
    ever_connected: bool,
    stats: SessionStats,
    closed: bool,
}

impl IngestService {
    /// Build the pipeline from configuration. No connection is attempted
    /// until the first tick.
    pub fn new(config: &Config) -> Self {
        Self {
            transport: TransportClient::new(config.address.clone(), config.port),
            assembler: FrameAssembler::new(config.max_frame_bytes),
            applier: PoseApplier::new(config.profile.clone()),
            backoff: ReconnectBackoff::new(),
            retry_timer: 0.0,
            ever_connected: false,
            stats: SessionStats::default(),
            closed: false,
        }
    }

    /// Advance the pipeline by one host frame.
    ///
    /// Drains at most one receive; assembles, decodes, and applies every
    /// complete message from it. When disconnected, counts down the
    /// backoff timer and retries the connection when it expires.
    pub fn tick(&mut self, dt: f32, sink: &mut dyn PoseSink) {
        if self.closed {
            return;
        }

        if !self.transport.is_connected() {
            self.tick_reconnect(dt);
            return;
        }

        match self.transport.try_receive() {
            Ok(None) => {}
            Ok(Some(chunk)) => {
                self.stats.chunks += 1;
                self.assembler.feed(chunk);
                self.drain_frames(dt, sink);
            }
            Err(e) => {
                log::warn!("[service] receive failed: {e}; reconnecting");
                self.transport.close();
                self.schedule_retry();
            }
        }
    }

    /// Close the session: release the socket and log the counters.
    /// Idempotent and safe to call at any time.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.transport.close();
        self.closed = true;
        let s = &self.stats;
        log::info!(
            "[service] session closed: {} chunks, {} frames, {} messages, {} bone updates, \
             {} decode errors, {} frame errors, {} reconnects",
            s.chunks, s.frames, s.messages, s.bone_updates,
            s.decode_errors, s.frame_errors, s.reconnects,
        );
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Session counters so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Swap the calibration profile wholesale (recalibration).
    pub fn set_profile(&mut self, profile: crate::mapping::MappingProfile) {
        self.applier.set_profile(profile);
    }

    // ─── Internal ──────────────────────────────────────────────────────────

    fn tick_reconnect(&mut self, dt: f32) {
        self.retry_timer -= dt;
        if self.retry_timer > 0.0 {
            return;
        }

        match self.transport.connect() {
            Ok(()) => {
                if self.ever_connected {
                    self.stats.reconnects += 1;
                }
                self.ever_connected = true;
                self.backoff.reset();
                // New tracker session: drop stale partial frames and the
                // old reference latch.
                self.assembler.clear();
                self.applier.reset();
            }
            Err(e) => {
                log::warn!("[service] connect failed: {e}");
                self.schedule_retry();
            }
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.next_delay();
        log::info!("[service] next connect attempt in {delay:?}");
        self.retry_timer = delay.as_secs_f32();
    }

    /// Apply every complete message the assembler can yield.
    fn drain_frames(&mut self, dt: f32, sink: &mut dyn PoseSink) {
        loop {
            match self.assembler.next_frame() {
                Ok(Some(frame)) => {
                    self.stats.frames += 1;
                    match decode(&frame) {
                        Ok(message) => {
                            self.stats.messages += 1;
                            let applied = self.applier.apply_message(&message, dt, sink);
                            self.stats.bone_updates += applied as u64;
                        }
                        Err(e) => {
                            self.stats.decode_errors += 1;
                            log::warn!("[service] discarding frame: {e}");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.stats.frame_errors += 1;
                    log::warn!("[service] {e}");
                }
            }
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────
