// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry and push fabric.
//!
//! One logical channel per connected worker: a bounded frame buffer plus a
//! notify handle the stream endpoint drains. Fan-out never blocks request
//! handlers; when a slow worker's buffer fills, the oldest `task_available`
//! frame is shed (never `connected` or `heartbeat`) and the periodic sweep
//! re-advertises anything still claimable. The registry map is guarded by
//! short critical sections with no I/O under the lock.

use parking_lot::Mutex;
use sb_core::{Clock, CodebaseTarget, Task, TaskId, Worker, WorkerId};
use sb_wire::{PushFrame, TaskAnnouncement};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound frames buffered per channel before shedding begins.
    pub buffer_capacity: usize,
    pub heartbeat_interval: Duration,
    /// Channel is considered dead after this many missed drain windows.
    pub liveness_misses: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 64,
            heartbeat_interval: Duration::from_secs(20),
            liveness_misses: 3,
        }
    }
}

struct Channel {
    worker: Worker,
    channel_id: String,
    buffer: Mutex<VecDeque<PushFrame>>,
    notify: Notify,
    closed: AtomicBool,
    dropped_frames: AtomicU64,
    last_drained_ms: AtomicU64,
}

impl Channel {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Non-blocking enqueue with the shedding policy: droppable frames make
    /// room by evicting the oldest droppable frame; control frames
    /// (`connected`, `heartbeat`, …) are always admitted so heartbeat
    /// ordering is preserved.
    fn enqueue(&self, frame: PushFrame, capacity: usize) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= capacity {
                if let Some(evict) = buffer.iter().position(PushFrame::is_droppable) {
                    buffer.remove(evict);
                    self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                } else if frame.is_droppable() {
                    self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
            buffer.push_back(frame);
        }
        self.notify.notify_one();
    }
}

/// Receiver half of a worker's push channel.
///
/// Dropping the handle (stream endpoint gone) unregisters the worker,
/// unless a reconnect has already replaced the channel.
pub struct WorkerChannel<C: Clock> {
    channel: Arc<Channel>,
    channels: Arc<Mutex<HashMap<WorkerId, Arc<Channel>>>>,
    clock: C,
}

impl<C: Clock> WorkerChannel<C> {
    /// Await the next frame. Returns `None` once the channel is closed.
    pub async fn next_frame(&self) -> Option<PushFrame> {
        loop {
            if self.channel.closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(frame) = self.channel.buffer.lock().pop_front() {
                self.channel.last_drained_ms.store(self.clock.epoch_ms(), Ordering::Relaxed);
                return Some(frame);
            }
            let notified = self.channel.notify.notified();
            // Re-check after arming the waiter to avoid a lost wakeup.
            if self.channel.closed.load(Ordering::SeqCst)
                || !self.channel.buffer.lock().is_empty()
            {
                continue;
            }
            notified.await;
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel.channel_id
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.channel.worker.id
    }
}

impl<C: Clock> Drop for WorkerChannel<C> {
    fn drop(&mut self) {
        self.channel.close();
        let mut channels = self.channels.lock();
        if let Some(current) = channels.get(&self.channel.worker.id) {
            if Arc::ptr_eq(current, &self.channel) {
                channels.remove(&self.channel.worker.id);
            }
        }
    }
}

/// Tracks connected workers and owns the per-channel buffers.
pub struct WorkerRegistry<C: Clock> {
    config: RegistryConfig,
    channels: Arc<Mutex<HashMap<WorkerId, Arc<Channel>>>>,
    heartbeat_seq: AtomicU64,
    clock: C,
}

impl<C: Clock> WorkerRegistry<C> {
    pub fn new(config: RegistryConfig, clock: C) -> Self {
        Self {
            config,
            channels: Arc::new(Mutex::new(HashMap::new())),
            heartbeat_seq: AtomicU64::new(0),
            clock,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a connection, replacing any previous channel for the same
    /// worker id. The first frame on the new channel is `connected`.
    pub fn register(&self, worker: Worker) -> WorkerChannel<C> {
        let channel_id = format!("chn-{}", uuid::Uuid::new_v4());
        let channel = Arc::new(Channel {
            channel_id: channel_id.clone(),
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped_frames: AtomicU64::new(0),
            last_drained_ms: AtomicU64::new(self.clock.epoch_ms()),
            worker,
        });
        channel.enqueue(
            PushFrame::Connected {
                channel_id,
                worker_id: channel.worker.id.to_string(),
            },
            self.config.buffer_capacity,
        );

        let replaced = self.channels.lock().insert(channel.worker.id.clone(), Arc::clone(&channel));
        if let Some(old) = replaced {
            tracing::info!(worker_id = %channel.worker.id, "replacing existing push channel");
            old.close();
        }
        tracing::info!(
            worker_id = %channel.worker.id,
            channel_id = %channel.channel_id,
            "worker connected"
        );
        WorkerChannel {
            channel,
            channels: Arc::clone(&self.channels),
            clock: self.clock.clone(),
        }
    }

    pub fn unregister(&self, worker_id: &WorkerId) {
        if let Some(channel) = self.channels.lock().remove(worker_id) {
            channel.close();
            tracing::info!(%worker_id, "worker unregistered");
        }
    }

    pub fn is_connected(&self, worker_id: &WorkerId) -> bool {
        self.channels.lock().contains_key(worker_id)
    }

    pub fn connected_workers(&self) -> Vec<Worker> {
        self.channels.lock().values().map(|c| c.worker.clone()).collect()
    }

    pub fn dropped_frames(&self, worker_id: &WorkerId) -> u64 {
        self.channels
            .lock()
            .get(worker_id)
            .map(|c| c.dropped_frames.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Advertise a task to every eligible connected worker. Returns the
    /// recipient count; ordering across recipients is unspecified and the
    /// claim protocol arbitrates.
    pub fn broadcast_task_available(&self, task: &Task) -> usize {
        let announcement = TaskAnnouncement::from_task(task);
        let recipients: Vec<Arc<Channel>> = self
            .channels
            .lock()
            .values()
            .filter(|c| eligible(&c.worker, task))
            .map(Arc::clone)
            .collect();
        for channel in &recipients {
            channel.enqueue(
                PushFrame::TaskAvailable(announcement.clone()),
                self.config.buffer_capacity,
            );
        }
        tracing::debug!(task_id = %task.id, recipients = recipients.len(), "task advertised");
        recipients.len()
    }

    /// Tell everyone else the race is over.
    pub fn broadcast_task_claimed(&self, task_id: &TaskId, winner: &WorkerId) {
        let recipients: Vec<Arc<Channel>> = self
            .channels
            .lock()
            .values()
            .filter(|c| &c.worker.id != winner)
            .map(Arc::clone)
            .collect();
        for channel in recipients {
            channel.enqueue(
                PushFrame::TaskClaimed { task_id: *task_id, worker_id: winner.to_string() },
                self.config.buffer_capacity,
            );
        }
    }

    /// Route an advisory interrupt to the worker owning a claimed task.
    pub fn send_interrupt(&self, worker_id: &WorkerId, task_id: &TaskId, reason: &str) -> bool {
        let channel = self.channels.lock().get(worker_id).map(Arc::clone);
        match channel {
            Some(channel) => {
                channel.enqueue(
                    PushFrame::Interrupt { task_id: *task_id, reason: reason.to_string() },
                    self.config.buffer_capacity,
                );
                true
            }
            None => false,
        }
    }

    /// Enqueue a heartbeat on every channel. Heartbeats are never shed.
    pub fn broadcast_heartbeat(&self) {
        let seq = self.heartbeat_seq.fetch_add(1, Ordering::Relaxed);
        let time_ms = self.clock.epoch_ms();
        let recipients: Vec<Arc<Channel>> =
            self.channels.lock().values().map(Arc::clone).collect();
        for channel in recipients {
            channel.enqueue(PushFrame::Heartbeat { seq, time_ms }, self.config.buffer_capacity);
        }
    }

    /// Workers whose channel has not been drained within the liveness
    /// window (no successful write completed).
    pub fn stale_workers(&self) -> Vec<WorkerId> {
        let window_ms = self.config.heartbeat_interval.as_millis() as u64
            * u64::from(self.config.liveness_misses);
        let now_ms = self.clock.epoch_ms();
        self.channels
            .lock()
            .iter()
            .filter(|(_, c)| {
                now_ms.saturating_sub(c.last_drained_ms.load(Ordering::Relaxed)) > window_ms
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Fan-out predicate: codebase match, capability superset, and target
/// identity/personality when the task names one.
fn eligible(worker: &Worker, task: &Task) -> bool {
    let codebase_ok = match &task.codebase {
        CodebaseTarget::Codebase(id) => worker.serves_codebase(id),
        CodebaseTarget::Global => worker.serves_global_pool(),
        // Registration tasks are claimable by any worker.
        CodebaseTarget::PendingRegistration => true,
    };
    if !codebase_ok || !worker.has_capabilities(&task.required_capabilities) {
        return false;
    }
    if let Some(target) = &task.target_agent_name {
        if worker.name != *target && worker.id != target.as_str() {
            return false;
        }
    }
    if let Some(personality) = &task.worker_personality {
        if worker.personality.as_deref() != Some(personality.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
