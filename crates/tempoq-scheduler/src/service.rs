//! The scheduler service — dispatch loop and control protocol.
//!
//! Single-threaded and cooperative: one task owns the catalog, the
//! persistence adapter, and both sockets. Each tick polls the transport
//! (bounded), applies at most one control message per socket, sweeps both
//! schedule maps, deletes exhausted entries, and runs heartbeat
//! maintenance. The only ways out are a `DISCONNECT` and peer loss.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use tempoq_core::clock::Clock;
use tempoq_core::config::Config;
use tempoq_core::transport::Socket;
use tempoq_core::utils::generate_device_name;
use tempoq_core::wire::{
    schedule_hash, Command, Frame, JobMessage, INFINITE_RUN_COUNT, SHOW_SCHEDULED_JOBS,
};
use tempoq_core::{Error, Result};
use tempoq_store::KeyListStore;

use crate::catalog::{RemovedFrom, ScheduleCatalog};
use crate::heartbeat::Heartbeat;
use crate::persist::PersistenceAdapter;

/// Keeper of time, master of schedules.
pub struct Scheduler {
    name: String,
    config: Config,
    clock: Clock,
    catalog: ScheduleCatalog,
    persist: PersistenceAdapter,
    heartbeat: Heartbeat,
    /// Broker-facing socket: control messages in, `REQUEST`s out.
    frontend: Box<dyn Socket>,
    /// Administrative socket (routed).
    admin: Box<dyn Socket>,
    received_disconnect: bool,
}

impl Scheduler {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyListStore>,
        frontend: Box<dyn Socket>,
        admin: Box<dyn Socket>,
    ) -> Self {
        let name = generate_device_name(&config.name);
        let heartbeat = Heartbeat::new(
            config.heartbeat.interval_secs,
            config.heartbeat.liveness,
            config.heartbeat.enabled,
        );
        info!(name = %name, "initializing scheduler");
        Self {
            name,
            config,
            clock: Clock::new(),
            catalog: ScheduleCatalog::new(),
            persist: PersistenceAdapter::new(store),
            heartbeat,
            frontend,
            admin,
            received_disconnect: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &ScheduleCatalog {
        &self.catalog
    }

    pub fn received_disconnect(&self) -> bool {
        self.received_disconnect
    }

    // ─────────────────────────────────────────
    // Recovery
    // ─────────────────────────────────────────

    /// Restore persisted schedules. Runs exactly once, before the loop
    /// accepts traffic; nothing is dispatched as a side effect of loading.
    pub async fn load_jobs(&mut self) {
        let jobs = self.persist.load_all().await;
        let mut restored = 0usize;
        for (hash, message) in jobs {
            match self.install(&hash, &message) {
                Ok(()) => restored += 1,
                Err(e) => warn!(hash = %hash, error = %e, "skipping stored job"),
            }
        }
        info!(jobs = restored, "restored schedules from store");
    }

    /// Install a job message into the catalog. Shared by `SCHEDULE` and
    /// recovery: positive-or-zero intervals go to the interval map, `-1`
    /// with a cron expression to the cron map, anything else is malformed.
    fn install(&mut self, hash: &str, message: &JobMessage) -> Result<()> {
        if message.is_interval() {
            self.catalog.upsert_interval(
                hash,
                &message.payload,
                message.interval_secs,
                &message.queue,
                message.run_count(),
                self.clock.mono_now(),
            )
        } else if !message.cron_expr.is_empty() {
            self.catalog.upsert_cron(
                hash,
                &message.payload,
                &message.cron_expr,
                &message.queue,
                self.clock.wall_now(),
            )
        } else {
            Err(Error::Malformed(
                "negative interval with empty cron expression".to_string(),
            ))
        }
    }

    // ─────────────────────────────────────────
    // Event loop
    // ─────────────────────────────────────────

    /// Run the dispatch loop until `DISCONNECT` or peer loss.
    pub async fn run(&mut self) -> Result<()> {
        let poll_timeout = Duration::from_millis(self.config.poll_timeout_ms);
        self.heartbeat.start(self.clock.mono_now());
        info!(name = %self.name, "scheduler event loop started");

        loop {
            if self.received_disconnect {
                break;
            }

            let wall_now = self.clock.wall_now();
            let mono_now = self.clock.mono_now();

            // Bounded transport poll; at most one message per socket.
            let mut admin_msg = None;
            let mut peer_msg = None;
            tokio::select! {
                biased;
                msg = self.admin.recv_multipart() => match msg {
                    Some(frames) => admin_msg = Some(frames),
                    // Closed socket; keep the tick cadence instead of spinning.
                    None => tokio::time::sleep(poll_timeout).await,
                },
                msg = self.frontend.recv_multipart() => match msg {
                    Some(frames) => peer_msg = Some(frames),
                    None => tokio::time::sleep(poll_timeout).await,
                },
                _ = tokio::time::sleep(poll_timeout) => {}
            }

            if let Some(frames) = admin_msg {
                self.handle_admin(&frames).await;
            }
            if let Some(frames) = peer_msg {
                self.process_message(&frames).await;
            }

            self.sweep_cron(wall_now).await;
            self.sweep_interval(mono_now).await;

            if !self
                .heartbeat
                .maintain(self.frontend.as_mut(), self.clock.mono_now())
                .await
            {
                warn!("broker peer lost, exiting event loop");
                break;
            }
        }

        info!(name = %self.name, "scheduler event loop stopped");
        Ok(())
    }

    // ─────────────────────────────────────────
    // Sweeps
    // ─────────────────────────────────────────

    /// Fire every cron entry whose wall-clock deadline has arrived.
    async fn sweep_cron(&mut self, wall_now: i64) {
        let mut exhausted = Vec::new();
        for hash in self.catalog.due_cron(wall_now) {
            let (payload, queue) = match self.catalog.cron(&hash) {
                Some(e) => (e.payload.clone(), e.queue.clone()),
                None => continue,
            };
            debug!(hash = %hash, wall = wall_now, "cron schedule due, dispatching");
            self.dispatch(&payload, &queue).await;
            if !self.catalog.advance(&hash) {
                warn!(hash = %hash, "cron iterator yielded no further fire time, removing");
                exhausted.push(hash);
            }
        }
        for hash in exhausted {
            self.catalog.remove(&hash);
            self.persist.forget(&hash).await;
        }
    }

    /// Fire every interval entry whose monotonic deadline has arrived.
    ///
    /// A deadline missed by several periods still fires once and advances
    /// one period: the schedule slips forward instead of bursting.
    async fn sweep_interval(&mut self, mono_now: f64) {
        let mut cancel_jobs = Vec::new();
        for hash in self.catalog.due_interval(mono_now) {
            let (payload, queue, run_count) = match self.catalog.interval(&hash) {
                Some(e) => (e.payload.clone(), e.queue.clone(), e.run_count),
                None => continue,
            };

            if run_count != INFINITE_RUN_COUNT {
                if run_count <= 0 {
                    cancel_jobs.push(hash);
                    continue;
                }
                let new_count = self.catalog.decrement_run_count(&hash).unwrap_or(0);
                self.persist.update_run_count(&hash, new_count).await;
                self.dispatch(&payload, &queue).await;
                self.catalog.advance(&hash);
            } else {
                self.dispatch(&payload, &queue).await;
                self.catalog.advance(&hash);
            }
        }

        for hash in cancel_jobs {
            debug!(hash = %hash, "cancelling job, run count exhausted");
            self.catalog.remove(&hash);
            self.persist.forget(&hash).await;
        }
    }

    /// Forward one due job to the broker as a `REQUEST`.
    ///
    /// Fire-and-forget at this layer: the broker's reply id is discarded.
    async fn dispatch(&mut self, payload: &str, queue: &str) {
        let request: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "cannot dispatch, payload is not JSON");
                return;
            }
        };
        let frame = Frame::new(
            Command::Request,
            vec![
                queue.to_string(),
                "reply-requested".to_string(),
                request.to_string(),
            ],
        );
        if let Err(e) = self.frontend.send_multipart(frame.encode()).await {
            warn!(error = %e, "failed to dispatch request to broker");
        }
    }

    // ─────────────────────────────────────────
    // Control protocol
    // ─────────────────────────────────────────

    /// Handle one administrative message (routed socket).
    async fn handle_admin(&mut self, frames: &[String]) {
        let frame = match Frame::decode(frames) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "dropping malformed admin message");
                return;
            }
        };

        if frame.command == Command::StatusCmd
            && frame.body.first().map(String::as_str) == Some(SHOW_SCHEDULED_JOBS)
        {
            let peer = frame.peer.unwrap_or_default();
            let snapshot = self.catalog.snapshot(&self.name).to_string();
            let reply = Frame::routed(peer, Command::Reply, vec![snapshot]);
            if let Err(e) = self.admin.send_multipart(reply.encode()).await {
                warn!(error = %e, "failed to send status snapshot");
            }
        } else {
            debug!(command = %frame.command, "ignoring admin command");
        }
    }

    /// Handle one broker-side control message.
    async fn process_message(&mut self, frames: &[String]) {
        let frame = match Frame::decode(frames) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "dropping malformed peer message");
                return;
            }
        };

        // Any decoded peer traffic proves the broker is alive.
        self.heartbeat.note_received(self.clock.mono_now());

        match frame.command {
            Command::Schedule => self.on_schedule(&frame.msgid, &frame.body).await,
            Command::Unschedule => self.on_unschedule(&frame.msgid, &frame.body).await,
            Command::Status => self.on_status(&frame.body).await,
            Command::Heartbeat => self.on_heartbeat(),
            Command::Disconnect => self.on_disconnect().await,
            Command::Kbye => self.on_kbye(),
            other => debug!(command = %other, "ignoring peer command"),
        }
    }

    /// Install/update a schedule, persist it, and fire the haste dispatch.
    async fn on_schedule(&mut self, msgid: &str, body: &[String]) {
        info!(msgid = %msgid, "received new SCHEDULE request");

        let message = match JobMessage::from_frames(body) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "dropping malformed SCHEDULE");
                return;
            }
        };
        let hash = match schedule_hash(&message) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "dropping SCHEDULE with unhashable payload");
                return;
            }
        };

        if self.catalog.contains(&hash) {
            debug!(hash = %hash, "updating existing scheduled job");
        } else {
            debug!(hash = %hash, "creating new scheduled job");
        }

        if let Err(e) = self.install(&hash, &message) {
            warn!(hash = %hash, error = %e, "dropping SCHEDULE");
            return;
        }
        self.persist.persist(&hash, &message).await;

        // Haste mode: one immediate dispatch unless suppressed. Finite
        // counts pay for it; infinite jobs do not.
        let run_count = message.run_count();
        if !message.has_nohaste() && (run_count > 0 || run_count == INFINITE_RUN_COUNT) {
            if run_count > 0 && message.is_interval() {
                self.catalog.decrement_run_count(&hash);
            }
            self.dispatch(&message.payload, &message.queue).await;
        }
    }

    /// Remove a schedule; the store-side delete happens even when the
    /// catalog holds nothing.
    async fn on_unschedule(&mut self, msgid: &str, body: &[String]) {
        info!(msgid = %msgid, "received new UNSCHEDULE request");

        let message = match JobMessage::from_frames(body) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "dropping malformed UNSCHEDULE");
                return;
            }
        };
        let hash = match schedule_hash(&message) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "dropping UNSCHEDULE with unhashable payload");
                return;
            }
        };

        match self.catalog.remove(&hash) {
            RemovedFrom::None => {
                warn!(hash = %hash, "couldn't find matching schedule for unschedule request")
            }
            removed => debug!(hash = %hash, ?removed, "unscheduled job"),
        }

        // The store may hold the hash even when memory does not.
        self.persist.forget(&hash).await;
    }

    /// Reply to the caller named in the body with the interval snapshot.
    async fn on_status(&mut self, body: &[String]) {
        let caller = body.first().cloned().unwrap_or_default();
        let snapshot = self.catalog.interval_snapshot().to_string();
        let reply = Frame::routed(caller, Command::Reply, vec![snapshot]);
        if let Err(e) = self.frontend.send_multipart(reply.encode()).await {
            warn!(error = %e, "failed to send status reply");
        }
    }

    fn on_heartbeat(&mut self) {
        // Noop; liveness bookkeeping happens in process_message.
    }

    /// Flag the loop for termination, drop the store connection, and wave
    /// the broker goodbye.
    async fn on_disconnect(&mut self) {
        info!("received DISCONNECT request");
        self.persist.disconnect().await;
        let bye = Frame::new(Command::Kbye, vec![]);
        if let Err(e) = self.frontend.send_multipart(bye.encode()).await {
            warn!(error = %e, "failed to send KBYE");
        }
        self.received_disconnect = true;
    }

    /// A peer's goodbye resets the service when heartbeating is disabled
    /// (with heartbeats on, the liveness window handles it).
    fn on_kbye(&mut self) {
        if !self.heartbeat.is_enabled() {
            info!("peer said KBYE, resetting service");
            self.catalog.clear();
            self.heartbeat.start(self.clock.mono_now());
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
