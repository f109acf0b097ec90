//! Snowflake unique id generation.
//!
//! Ids are 63-bit: 41 bits of milliseconds since a configurable epoch,
//! 10 bits of worker id, 12 bits of per-millisecond sequence. They sort
//! roughly by creation time, which keeps primary-key indexes append-only.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SnowflakeError {
    #[error("Worker ID {worker_id} is out of the valid range (0-{MAX_WORKER_ID})")]
    WorkerIdOutOfRange { worker_id: u16 },

    #[error("System clock moved backwards. Cannot generate new IDs.")]
    ClockMovedBackwards,

    #[error("Generated ID has exceeded the maximum value for a signed 64-bit integer.")]
    IdOverflow,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Generator: Send + Sync {
    fn generate(&self) -> Result<i64, SnowflakeError>;
}

// 2025-01-01 00:00:00 UTC
const DEFAULT_EPOCH: u64 = 1735689600000;
const WORKER_ID_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;

const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

const WORKER_ID_SHIFT: u8 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u8 = SEQUENCE_BITS + WORKER_ID_BITS;

struct SnowflakeState {
    last_timestamp: u64,
    sequence: u16,
}

pub struct Snowflake {
    worker_id: u16,
    epoch: u64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake {
    pub fn builder(worker_id: u16) -> SnowflakeBuilder {
        SnowflakeBuilder::new(worker_id)
    }

    fn wait_for_next_millis(&self, current: u64) -> u64 {
        let mut timestamp = self.elapsed_millis();
        while timestamp <= current {
            std::thread::yield_now();
            timestamp = self.elapsed_millis();
        }
        timestamp
    }

    fn elapsed_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("BUG: system time is before the UNIX epoch")
            .as_millis() as u64
            - self.epoch
    }
}

impl Generator for Snowflake {
    fn generate(&self) -> Result<i64, SnowflakeError> {
        let mut state = self.state.lock().expect("BUG: snowflake mutex was poisoned");
        let mut timestamp = self.elapsed_millis();

        if timestamp < state.last_timestamp {
            return Err(SnowflakeError::ClockMovedBackwards);
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                timestamp = self.wait_for_next_millis(state.last_timestamp);
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        let id =
            (timestamp << TIMESTAMP_SHIFT) | ((self.worker_id as u64) << WORKER_ID_SHIFT) | (state.sequence as u64);

        if id > i64::MAX as u64 {
            return Err(SnowflakeError::IdOverflow);
        }

        Ok(id as i64)
    }
}

pub struct SnowflakeBuilder {
    worker_id: u16,
    epoch: u64,
}

impl SnowflakeBuilder {
    pub fn new(worker_id: u16) -> Self {
        Self { worker_id, epoch: DEFAULT_EPOCH }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn build(self) -> Result<Snowflake, SnowflakeError> {
        if self.worker_id > MAX_WORKER_ID {
            return Err(SnowflakeError::WorkerIdOutOfRange { worker_id: self.worker_id });
        }

        Ok(Snowflake {
            worker_id: self.worker_id,
            epoch: self.epoch,
            state: Mutex::new(SnowflakeState { last_timestamp: 0, sequence: 0 }),
        })
    }
}
