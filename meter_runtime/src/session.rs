//! Session manager — one persisted run with apply-then-persist semantics.
//!
//! Each run gets its own directory with a step log and snapshots.
//! Concurrency: Mutex for write serialization, no global mutable state.
//!
//! Apply-then-persist order:
//!   1. engine.apply_step(input): rejected steps never reach the log
//!   2. store.append(frame): only if step 1 succeeded
//!   3. stamp the end time once step 5 is played
//!   4. snapshot at the interval, and always at the end of the run

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{info, warn};

use meter_engine::config::MeterConfig;
use meter_engine::engine::{RunEngine, StepOutcome};
use meter_engine::hashing::canonical_hash;
use meter_engine::run::{RunState, StepInput};
use meter_engine::{EngineError, ENGINE_VERSION};

use crate::proto_bridge::{
    frame_to_input, frame_to_run_started, input_to_frame, run_started_frame, BridgeError,
};
use crate::replay;
use crate::snapshot::{self, Snapshot};
use crate::snapshot_codec::SnapshotError;
use crate::step_store::{StepStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("run log was started with seed {logged}, session opened with {requested}")]
    SeedMismatch { logged: i64, requested: i64 },
    #[error("run log written by engine version {logged}, this is {current}")]
    EngineVersion { logged: u32, current: u32 },
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A persisted run with its own step log and snapshots.
pub struct Session {
    run_id: String,
    dir: PathBuf,
    engine: RunEngine,
    store: StepStore,
    snapshot_interval: u8,
}

impl Session {
    /// Open or create the run `run_id` under `base_dir`.
    ///
    /// Directory structure:
    ///   <base_dir>/<run_id>/steps.log
    ///   <base_dir>/<run_id>/snapshots/
    ///
    /// An existing run resumes from its latest snapshot when that snapshot
    /// matches a replay of the logged steps it covers; otherwise the whole
    /// log is replayed. `snapshot_interval` 0 disables interval snapshots.
    pub fn new(
        base_dir: &Path,
        run_id: &str,
        seed: i64,
        config: MeterConfig,
        snapshot_interval: u8,
    ) -> Result<Self, SessionError> {
        let dir = base_dir.join(run_id);
        let mut store = StepStore::open(&dir.join("steps.log"))?;
        let frames = store.load_all()?;

        let engine = match frames.split_first() {
            None => {
                let start_time = now_millis();
                store.append(&run_started_frame(seed, start_time))?;
                let mut engine = RunEngine::new(seed, config);
                engine.set_start_time(start_time);
                info!(target: "meter.session", run_id, seed, "run created");
                engine
            }
            Some((header_frame, step_frames)) => {
                let header = frame_to_run_started(header_frame)?;
                if header.seed != seed {
                    return Err(SessionError::SeedMismatch {
                        logged: header.seed,
                        requested: seed,
                    });
                }
                if header.engine_version != ENGINE_VERSION {
                    return Err(SessionError::EngineVersion {
                        logged: header.engine_version,
                        current: ENGINE_VERSION,
                    });
                }
                let inputs = step_frames
                    .iter()
                    .map(frame_to_input)
                    .collect::<Result<Vec<_>, _>>()?;
                Self::restore_engine(&dir, run_id, seed, header.start_time, config, &inputs)?
            }
        };

        Ok(Self {
            run_id: run_id.to_string(),
            dir,
            engine,
            store,
            snapshot_interval,
        })
    }

    fn restore_engine(
        dir: &Path,
        run_id: &str,
        seed: i64,
        start_time: u64,
        config: MeterConfig,
        inputs: &[StepInput],
    ) -> Result<RunEngine, SessionError> {
        let snapshot = match snapshot::load_latest_snapshot(&dir.join("snapshots")) {
            Ok(snap) => snap,
            Err(e) => {
                warn!(target: "meter.session", run_id, error = %e, "unreadable snapshot");
                None
            }
        };

        let mut carried_end_time = None;
        if let Some(snap) = snapshot {
            carried_end_time = snap.run().ok().and_then(|run| run.end_time);
            match Self::resume_from_snapshot(&snap, seed, &config, inputs) {
                Some(run) => {
                    let covered = run.step_history.len();
                    let mut engine = RunEngine::resume(run, config);
                    engine.apply_sequence(&inputs[covered..])?;
                    info!(
                        target: "meter.session",
                        run_id,
                        snapshot_step = snap.step,
                        replayed = inputs.len() - covered,
                        "run resumed from snapshot"
                    );
                    return Ok(engine);
                }
                None => warn!(
                    target: "meter.session",
                    run_id,
                    snapshot_step = snap.step,
                    "snapshot does not match step log, replaying in full"
                ),
            }
        }

        let mut engine = RunEngine::new(seed, config);
        engine.set_start_time(start_time);
        engine.apply_sequence(inputs)?;
        if engine.is_finished() {
            engine.mark_ended(carried_end_time.unwrap_or_else(now_millis));
        }
        info!(target: "meter.session", run_id, replayed = inputs.len(), "run replayed");
        Ok(engine)
    }

    /// The snapshot's run, if it is intact and agrees with the log.
    fn resume_from_snapshot(
        snap: &Snapshot,
        seed: i64,
        config: &MeterConfig,
        inputs: &[StepInput],
    ) -> Option<RunState> {
        if !snapshot::verify_snapshot_hash(snap) {
            return None;
        }
        let run = snap.run().ok()?;
        let covered = run.step_history.len();
        if run.seed != seed || covered > inputs.len() {
            return None;
        }
        let prefix = &inputs[..covered];
        if run.inputs() != prefix {
            return None;
        }
        let replayed = replay::rebuild_hash(seed, config, prefix).ok()?;
        (replayed == snap.hash).then_some(run)
    }

    /// Apply one step: engine first, then persist.
    pub fn apply_step(&mut self, input: &StepInput) -> Result<StepOutcome, SessionError> {
        let outcome = self.engine.apply_step(input)?;
        self.store.append(&input_to_frame(input))?;

        if outcome.finished {
            self.engine.mark_ended(now_millis());
        }

        let interval_hit =
            self.snapshot_interval > 0 && input.step_id % self.snapshot_interval == 0;
        if interval_hit || outcome.finished {
            let snap_dir = self.dir.join("snapshots");
            snapshot::save_snapshot(&snap_dir, input.step_id, self.engine.run())?;
        }

        Ok(outcome)
    }

    /// Rebuild the run from the step log alone, replacing the live engine.
    pub fn replay_full(&mut self) -> Result<(RunState, String), SessionError> {
        let frames = self.store.load_all()?;
        let start_time = match frames.first() {
            Some(header) => frame_to_run_started(header)?.start_time,
            None => self.engine.run().start_time,
        };
        let inputs = frames
            .iter()
            .skip(1)
            .map(frame_to_input)
            .collect::<Result<Vec<_>, _>>()?;

        let seed = self.engine.run().seed;
        let mut engine = RunEngine::new(seed, self.engine.config().clone());
        engine.set_start_time(start_time);
        engine.apply_sequence(&inputs)?;
        if let Some(end_time) = self.engine.run().end_time {
            engine.mark_ended(end_time);
        }
        self.engine = engine;

        let run = self.engine.run().clone();
        let hash = canonical_hash(&run);
        Ok((run, hash))
    }

    pub fn run(&self) -> &RunState {
        self.engine.run()
    }

    pub fn current_hash(&self) -> String {
        canonical_hash(self.engine.run())
    }

    /// Next step to play.
    pub fn current_step(&self) -> u8 {
        self.engine.run().current_step
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    pub fn ending(&self) -> Option<&'static str> {
        self.engine.ending()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Thread-safe session handle using Mutex.
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Apply a step under lock.
    pub fn apply_step(&self, input: &StepInput) -> Result<StepOutcome, SessionError> {
        let mut session = self.inner.lock().expect("Session lock poisoned");
        session.apply_step(input)
    }

    pub fn current_hash(&self) -> String {
        let session = self.inner.lock().expect("Session lock poisoned");
        session.current_hash()
    }

    pub fn current_step(&self) -> u8 {
        let session = self.inner.lock().expect("Session lock poisoned");
        session.current_step()
    }

    /// Clone of the current run state, taken under lock.
    pub fn run(&self) -> RunState {
        let session = self.inner.lock().expect("Session lock poisoned");
        session.run().clone()
    }
}
