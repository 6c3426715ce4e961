//! The `Session` type: the public host-facing API surface, the init
//! coordinator, and the worker threads that drive the message pipeline.
//!
//! Two mutexes guard state: a reentrant `core` lock around the state
//! machine, mirror, and event queue, and a separate lock inside
//! [`crate::pipeline::MessagePipeline`] around the three message queues.
//! Lock order is always core before pipeline, never the reverse.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::ReentrantMutex;

use protocol::{
    CaptureParams, GiveInputParams, GroupWire, ParticipantWire, ReadyParams, SceneWire, UpdateControlsParams,
    UpdateParticipantsParams, ParticipantPatch, GroupsParams,
};

use crate::batch::ControlBatch;
use crate::config::SessionConfig;
use crate::error::ErrorCode;
use crate::event::{DebugSink, Event};
use crate::message::{IdCounter, Message};
use crate::mirror::EntityMirror;
use crate::pipeline::{Dispatched, MessagePipeline};
use crate::state::{SessionState, Trigger};
use crate::transport::{Bootstrap, Transport};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Everything guarded by the core (reentrant) mutex.
struct Core {
    state: SessionState,
    mirror: EntityMirror,
    events: Vec<Event>,
    auth_header: Option<String>,
    server_time_offset_ms: i64,
    init_scenes_complete: bool,
    init_groups_complete: bool,
    init_server_time_complete: bool,
    init_in_flight: bool,
    debug_sink: Option<Box<dyn DebugSink>>,
}

impl Core {
    fn new() -> Self {
        Core {
            state: SessionState::NotInitialized,
            mirror: EntityMirror::new(),
            events: Vec::new(),
            auth_header: None,
            server_time_offset_ms: 0,
            init_scenes_complete: false,
            init_groups_complete: false,
            init_server_time_complete: false,
            init_in_flight: false,
            debug_sink: None,
        }
    }

    fn transition(&mut self, trigger: Trigger) {
        match self.state.apply(trigger) {
            Some(next) => {
                self.state = next;
                self.events.push(Event::InteractivityStateChanged { timestamp_ms: now_ms(), state: next });
                tracing::trace!(?trigger, ?next, "session state transition");
            }
            None => {
                tracing::warn!(?trigger, state = ?self.state, "dropped invalid state transition");
            }
        }
    }

    fn push_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code = code.as_str(), %message, "session error event");
        self.events.push(Event::Error { timestamp_ms: now_ms(), code, message });
    }
}

/// The session engine. One per connection to the interactive service.
pub struct Session {
    core: ReentrantMutex<RefCell<Core>>,
    pipeline: Arc<MessagePipeline>,
    transport: Arc<parking_lot::Mutex<Box<dyn Transport>>>,
    bootstrap: Arc<parking_lot::Mutex<Box<dyn Bootstrap>>>,
    ids: IdCounter,
    config: parking_lot::RwLock<SessionConfig>,
    stop_flag: Arc<AtomicBool>,
    pipeline_started: AtomicBool,
    pipeline_thread: parking_lot::Mutex<Option<JoinHandle<()>>>,
    init_thread: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn open_session(transport: Box<dyn Transport>, bootstrap: Box<dyn Bootstrap>, config: SessionConfig) -> Self {
        Session {
            core: ReentrantMutex::new(RefCell::new(Core::new())),
            pipeline: Arc::new(MessagePipeline::new()),
            transport: Arc::new(parking_lot::Mutex::new(transport)),
            bootstrap: Arc::new(parking_lot::Mutex::new(bootstrap)),
            ids: IdCounter::new(),
            config: parking_lot::RwLock::new(config),
            stop_flag: Arc::new(AtomicBool::new(false)),
            pipeline_started: AtomicBool::new(false),
            pipeline_thread: parking_lot::Mutex::new(None),
            init_thread: parking_lot::Mutex::new(None),
        }
    }

    pub fn set_debug_sink(&self, sink: Box<dyn DebugSink>) {
        let guard = self.core.lock();
        guard.borrow_mut().debug_sink = Some(sink);
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().borrow().state
    }

    // -- mutator API ----------------------------------------------------------

    /// Valid only in `not_initialized`/`interactivity_disabled`; otherwise an
    /// `Error` event is pushed and nothing is mutated.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        match core.state {
            SessionState::NotInitialized | SessionState::InteractivityDisabled => {
                core.auth_header = Some(token.into());
            }
            _ => core.push_error(ErrorCode::OperationCanceled, "set_auth_token invalid in current state"),
        }
    }

    /// Spawns the init worker and runs the handshake. Rejects re-entry while
    /// a previous run is still in flight rather than superseding it silently.
    pub fn connect(self: &Arc<Self>, version_id: impl Into<String>, go_interactive: bool, share_code: Option<String>) {
        {
            let guard = self.core.lock();
            let mut core = guard.borrow_mut();
            if core.init_in_flight {
                tracing::warn!("connect() called while a previous init is still running; ignoring");
                return;
            }
            if core.auth_header.is_none() {
                core.push_error(ErrorCode::OperationCanceled, "no auth token set");
                return;
            }
            core.init_in_flight = true;
            core.transition(Trigger::Initialize);
        }

        let session = Arc::clone(self);
        let version_id = version_id.into();
        let handle = std::thread::spawn(move || {
            session.run_init_worker(version_id, go_interactive, share_code);
        });
        *self.init_thread.lock() = Some(handle);

        self.spawn_pipeline_worker_if_needed();
    }

    fn spawn_pipeline_worker_if_needed(self: &Arc<Self>) {
        if self.pipeline_started.swap(true, Ordering::Relaxed) {
            return;
        }
        let session = Arc::clone(self);
        let handle = std::thread::spawn(move || session.run_pipeline_worker());
        *self.pipeline_thread.lock() = Some(handle);
    }

    fn run_init_worker(self: Arc<Self>, version_id: String, go_interactive: bool, share_code: Option<String>) {
        let auth_header = {
            let guard = self.core.lock();
            guard.borrow().auth_header.clone()
        };
        let Some(auth_header) = auth_header else {
            self.fail_init(ErrorCode::OperationCanceled, "missing auth header");
            return;
        };

        let bootstrap_url = self.config.read().bootstrap_url.clone();
        let address = {
            let mut bootstrap = self.bootstrap.lock();
            bootstrap.resolve(&bootstrap_url)
        };
        let uri = match address {
            Ok(uri) => uri,
            Err(e) => {
                self.fail_init(ErrorCode::ConnectionRefused, format!("bootstrap failed: {e}"));
                return;
            }
        };

        {
            let mut transport = self.transport.lock();
            transport.set_uri(&uri);
            let _ = (&version_id, &share_code, &auth_header); // headers are the transport's concern to attach
            transport.ensure_connected();
        }

        let (mut interval, max_init_retries, interval_cap) = {
            let cfg = self.config.read();
            (cfg.init_retry_interval, cfg.max_init_retries, cfg.init_retry_interval_cap)
        };
        let mut attempts = 0;
        loop {
            let connected = {
                let transport = self.transport.lock();
                transport.state().is_connected()
            };
            if connected {
                break;
            }
            let disconnected = {
                let transport = self.transport.lock();
                transport.state() == crate::transport::TransportState::Disconnected
            };
            if disconnected && attempts > 0 {
                self.fail_init(ErrorCode::ConnectionRefused, "transport reports disconnected during handshake");
                return;
            }
            attempts += 1;
            if attempts > max_init_retries {
                self.fail_init(ErrorCode::ConnectionRefused, "exceeded max connect retries");
                return;
            }
            std::thread::sleep(interval);
            interval = (interval * 3).min(interval_cap);
        }

        let get_time_id = self.ids.next();
        let get_groups_id = self.ids.next();
        let get_scenes_id = self.ids.next();
        self.pipeline.enqueue_send(Message::new(get_time_id, protocol::METHOD_GET_TIME, serde_json::json!({}), false, now_ms()));
        self.pipeline.enqueue_send(Message::new(get_groups_id, protocol::METHOD_GET_GROUPS, serde_json::json!({}), false, now_ms()));
        self.pipeline.enqueue_send(Message::new(get_scenes_id, protocol::METHOD_GET_SCENES, serde_json::json!({}), false, now_ms()));

        let mut interval = self.config.read().init_retry_interval;
        let deadline_attempts = max_init_retries;
        let mut attempts = 0;
        loop {
            let complete = {
                let guard = self.core.lock();
                let core = guard.borrow();
                core.init_scenes_complete && core.init_groups_complete && core.init_server_time_complete
            };
            if complete {
                break;
            }
            attempts += 1;
            if attempts > deadline_attempts {
                self.fail_init(ErrorCode::OperationCanceled, "handshake timed out waiting for getTime/getGroups/getScenes");
                return;
            }
            std::thread::sleep(interval);
            interval = (interval * 3).min(interval_cap);
        }

        {
            let guard = self.core.lock();
            let mut core = guard.borrow_mut();
            core.transition(Trigger::HandshakeComplete);
            core.init_in_flight = false;
        }

        if go_interactive {
            self.start_interactive();
        }
    }

    fn fail_init(&self, code: ErrorCode, message: impl Into<String>) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        core.push_error(code, message);
        core.transition(Trigger::Reset);
        core.init_in_flight = false;
    }

    fn run_pipeline_worker(self: Arc<Self>) {
        while !self.stop_flag.load(Ordering::Relaxed) {
            {
                let mut transport = self.transport.lock();
                for text in transport.poll_incoming() {
                    self.pipeline.push_incoming_text(text);
                }
            }

            let (chunk_size, reply_timeout_ms, max_message_retries, idle_backoff, throttles) = {
                let cfg = self.config.read();
                (
                    cfg.chunk_size,
                    cfg.reply_timeout.as_millis() as i64,
                    cfg.max_message_retries,
                    cfg.idle_backoff,
                    cfg.bandwidth_throttles.clone(),
                )
            };

            let dispatched = self.pipeline.drain_inbound(chunk_size);
            for item in dispatched {
                self.handle_dispatched(item);
            }

            {
                let mut transport = self.transport.lock();
                self.pipeline.drain_send(transport.as_mut(), chunk_size, now_ms(), &throttles);
            }

            self.pipeline.drain_retry(now_ms(), reply_timeout_ms, max_message_retries, chunk_size);

            if self.pipeline.is_idle() {
                std::thread::sleep(idle_backoff);
            }
        }
    }

    fn handle_dispatched(&self, item: Dispatched) {
        match item {
            Dispatched::Malformed(text) => tracing::warn!(%text, "dropping malformed inbound frame"),
            Dispatched::UnmatchedReply { id } => tracing::warn!(id, "dropping reply with no matching outbound message"),
            Dispatched::Reply { original_method, sent_timestamp_ms, result, error } => {
                self.handle_reply(&original_method, sent_timestamp_ms, result, error)
            }
            Dispatched::Method { method, params } => self.handle_method(&method, params),
        }
    }

    fn handle_reply(
        &self,
        original_method: &str,
        sent_timestamp_ms: i64,
        result: Option<serde_json::Value>,
        error: Option<protocol::RpcError>,
    ) {
        if let Some(err) = error {
            tracing::warn!(method = original_method, code = err.code, message = %err.message, "reply carried an error, dropping");
            return;
        }
        let Some(result) = result else { return };
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        match original_method {
            m if m == protocol::METHOD_GET_TIME => {
                if let Some(server_time) = result.get("time").and_then(|v| v.as_i64()) {
                    let now = now_ms();
                    let latency = (now - sent_timestamp_ms) / 2;
                    core.server_time_offset_ms = now - server_time - latency;
                }
                core.init_server_time_complete = true;
            }
            m if m == protocol::METHOD_GET_GROUPS => {
                if let Ok(groups) = serde_json::from_value::<Vec<GroupWire>>(result) {
                    core.mirror.apply_groups(&groups);
                }
                core.init_groups_complete = true;
            }
            m if m == protocol::METHOD_GET_SCENES => {
                if let Ok(scenes) = serde_json::from_value::<Vec<SceneWire>>(result) {
                    core.mirror.apply_scenes(&scenes);
                }
                core.init_scenes_complete = true;
            }
            m if m == protocol::METHOD_CREATE_GROUPS || m == protocol::METHOD_UPDATE_GROUPS => {
                if let Ok(groups) = serde_json::from_value::<Vec<GroupWire>>(result) {
                    core.mirror.apply_groups(&groups);
                }
            }
            m if m == protocol::METHOD_UPDATE_CONTROLS => {
                if let Ok(controls) = serde_json::from_value::<Vec<protocol::ControlWire>>(result) {
                    core.mirror.apply_control_updates(&controls);
                }
            }
            m if m == protocol::METHOD_UPDATE_PARTICIPANTS => {
                if let Ok(participants) = serde_json::from_value::<Vec<ParticipantWire>>(result) {
                    core.mirror.apply_participant_patches(&participants);
                }
            }
            _ => {}
        }
    }

    fn handle_method(&self, method: &str, params: serde_json::Value) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        match method {
            m if m == protocol::METHOD_ON_PARTICIPANT_JOIN => {
                if let Ok(p) = serde_json::from_value::<ParticipantWire>(params) {
                    core.mirror.participant_join(&p);
                    core.events.push(Event::ParticipantStateChanged {
                        timestamp_ms: now_ms(),
                        mixer_id: p.mixer_id,
                        session_id: p.session_id,
                        joined: true,
                    });
                }
            }
            m if m == protocol::METHOD_ON_PARTICIPANT_LEAVE => {
                if let Some(session_id) = params.get("sessionID").and_then(|v| v.as_str()) {
                    let mixer_id = core.mirror.session_id_to_mixer_id.get(session_id).copied();
                    core.mirror.participant_leave(session_id);
                    if let Some(mixer_id) = mixer_id {
                        core.events.push(Event::ParticipantStateChanged {
                            timestamp_ms: now_ms(),
                            mixer_id,
                            session_id: session_id.to_string(),
                            joined: false,
                        });
                    }
                }
            }
            m if m == protocol::METHOD_ON_PARTICIPANT_UPDATE => {
                if let Ok(p) = serde_json::from_value::<ParticipantWire>(params) {
                    core.mirror.apply_participant_patches(std::slice::from_ref(&p));
                }
            }
            m if m == protocol::METHOD_ON_READY => {
                let is_ready = params.get("isReady").and_then(|v| v.as_bool()).unwrap_or(false);
                core.transition(if is_ready { Trigger::ServiceReadyTrue } else { Trigger::ServiceReadyFalse });
            }
            m if m == protocol::METHOD_ON_GROUP_CREATE || m == protocol::METHOD_ON_GROUP_UPDATE => {
                if let Ok(g) = serde_json::from_value::<GroupWire>(params) {
                    core.mirror.upsert_group(&g);
                }
            }
            m if m == protocol::METHOD_ON_CONTROL_UPDATE => {
                if let Ok(controls) = serde_json::from_value::<Vec<protocol::ControlWire>>(params) {
                    core.mirror.apply_control_updates(&controls);
                }
            }
            m if m == protocol::METHOD_GIVE_INPUT => {
                if let Ok(give_input) = serde_json::from_value::<GiveInputParams>(params) {
                    let state = core.state;
                    let now = now_ms();
                    let mixer_id = core.mirror.session_id_to_mixer_id.get(&give_input.participant_id).copied();
                    crate::input::dispatch_give_input(&mut core.mirror, state, &give_input, now, &mut core.events);
                    if let Some(mixer_id) = mixer_id {
                        if let Some(p) = core.mirror.participants_by_mixer_id.get_mut(&mixer_id) {
                            p.last_input_at_ms = now;
                        }
                    }
                }
            }
            _ => tracing::warn!(method, "dropping unhandled inbound method"),
        }
    }

    // -- host tick -------------------------------------------------------------

    /// Callable only by the host thread. Opportunistically nudges the
    /// transport, clears button edge flags, and returns the drained events.
    pub fn do_work(&self) -> Vec<Event> {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        if !core.events.is_empty() {
            let mut transport = self.transport.lock();
            transport.ensure_connected();
        }
        let events = std::mem::take(&mut core.events);
        core.mirror.clear_button_edge_flags();
        events
    }

    // -- more mutators -----------------------------------------------------

    pub fn start_interactive(&self) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        let connected = {
            let transport = self.transport.lock();
            transport.state().is_connected()
        };
        if !connected || core.state != SessionState::InteractivityDisabled {
            core.push_error(ErrorCode::NotConnected, "start_interactive requires a connected, disabled session");
            return;
        }
        core.transition(Trigger::SetReady);
        drop(core);
        self.send_ready(true);
    }

    pub fn suspend_interactive(&self) -> bool {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        match core.state {
            SessionState::NotInitialized | SessionState::InteractivityDisabled => true,
            SessionState::InteractivityEnabled | SessionState::InteractivityPending => {
                drop(core);
                self.send_ready(false);
                true
            }
            SessionState::Initializing => false,
        }
    }

    pub fn stop_interactive(&self) {
        {
            let guard = self.core.lock();
            let mut core = guard.borrow_mut();
            core.transition(Trigger::Reset);
        }
        self.stop_flag.store(true, Ordering::Relaxed);
        let mut transport = self.transport.lock();
        transport.close();
    }

    /// `ready(true)` is discard: the enable confirmation comes back as a
    /// separate inbound `onReady`, not a reply to this call, so tracking it
    /// in awaiting-reply would just retry a call that already succeeded.
    /// `ready(false)` has no such inbound confirmation and is tracked like
    /// any other mutator RPC.
    fn send_ready(&self, is_ready: bool) {
        let id = self.ids.next();
        let params = serde_json::to_value(ReadyParams { is_ready }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_READY, params, is_ready, now_ms()));
    }

    /// Updates the group's `sceneId` in the local mirror before enqueuing the
    /// RPC, so a reader of the mirror observes the change immediately instead
    /// of waiting for the round trip to come back.
    pub fn try_set_current_scene(&self, scene_id: &str, group_id: &str) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        if !core.mirror.scenes.contains_key(scene_id) {
            core.push_error(ErrorCode::NoSuchEntity, format!("unknown scene {scene_id}"));
            return;
        }
        let Some(group) = core.mirror.groups.get_mut(group_id) else {
            core.push_error(ErrorCode::NoSuchEntity, format!("unknown group {group_id}"));
            return;
        };
        group.scene_id = scene_id.to_string();
        let wire = GroupWire { group_id: group.id.clone(), scene_id: group.scene_id.clone(), etag: group.etag.clone() };
        drop(core);
        let id = self.ids.next();
        let params = serde_json::to_value(GroupsParams { groups: vec![wire] }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_UPDATE_GROUPS, params, false, now_ms()));
    }

    pub fn create_group(&self, group_id: &str, scene_id: &str) {
        let id = self.ids.next();
        let wire = GroupWire { group_id: group_id.to_string(), scene_id: scene_id.to_string(), etag: String::new() };
        let params = serde_json::to_value(GroupsParams { groups: vec![wire] }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_CREATE_GROUPS, params, false, now_ms()));
    }

    pub fn set_disabled(&self, control_id: &str, disabled: bool) {
        let etag = self.control_etag_and_scene(control_id);
        let Some((etag, scene_id)) = etag else { return };
        let mut batch = ControlBatch::begin(scene_id);
        batch.add_disabled(control_id, &etag, disabled);
        self.commit_control_batch(batch);
    }

    pub fn set_progress(&self, control_id: &str, progress: f32) {
        let etag = self.control_etag_and_scene(control_id);
        let Some((etag, scene_id)) = etag else { return };
        let mut batch = ControlBatch::begin(scene_id);
        batch.add_progress(control_id, &etag, progress);
        self.commit_control_batch(batch);
    }

    pub fn trigger_cooldown(&self, control_id: &str, cooldown_ms: i64) {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        let Some(control) = core.mirror.controls.get(control_id) else {
            core.push_error(ErrorCode::NoSuchEntity, format!("unknown control {control_id}"));
            return;
        };
        let deadline = now_ms() - core.server_time_offset_ms + cooldown_ms;
        let etag = control.etag().to_string();
        let scene_id = control.parent_scene_id().to_string();
        drop(core);
        let mut batch = ControlBatch::begin(scene_id);
        batch.add_cooldown(control_id, &etag, deadline);
        self.commit_control_batch(batch);
    }

    fn control_etag_and_scene(&self, control_id: &str) -> Option<(String, String)> {
        let guard = self.core.lock();
        let mut core = guard.borrow_mut();
        match core.mirror.controls.get(control_id) {
            Some(c) => Some((c.etag().to_string(), c.parent_scene_id().to_string())),
            None => {
                core.push_error(ErrorCode::NoSuchEntity, format!("unknown control {control_id}"));
                None
            }
        }
    }

    pub fn commit_control_batch(&self, batch: ControlBatch) {
        if batch.is_empty() {
            return;
        }
        let id = self.ids.next();
        let scene_id = batch.scene_id().to_string();
        let controls = batch.close();
        let params = serde_json::to_value(UpdateControlsParams { scene_id, controls }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_UPDATE_CONTROLS, params, false, now_ms()));
    }

    pub fn move_participant_group(&self, mixer_id: u32, old_group_id: &str, new_group_id: &str) {
        let session_id_and_etag = {
            let guard = self.core.lock();
            let mut core = guard.borrow_mut();
            core.mirror.move_participant_group(mixer_id, old_group_id, new_group_id);
            core.mirror
                .participants_by_mixer_id
                .get(&mixer_id)
                .map(|p| (p.session_id.clone(), p.etag.clone()))
        };
        let Some((session_id, etag)) = session_id_and_etag else { return };
        let id = self.ids.next();
        let patch = ParticipantPatch {
            session_id,
            group_id: Some(new_group_id.to_string()),
            disabled: None,
            etag,
        };
        let params = serde_json::to_value(UpdateParticipantsParams { participants: vec![patch] }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_UPDATE_PARTICIPANTS, params, false, now_ms()));
    }

    /// Billing-critical: never discard. A dropped or failed send is retried
    /// like every other tracked RPC rather than silently lost.
    pub fn capture_transaction(&self, transaction_id: impl Into<String>) {
        let id = self.ids.next();
        let params = serde_json::to_value(CaptureParams { transaction_id: transaction_id.into() }).unwrap_or_default();
        self.pipeline.enqueue_send(Message::new(id, protocol::METHOD_CAPTURE, params, false, now_ms()));
    }

    pub fn send_rpc_message(&self, method: impl Into<String>, params: serde_json::Value) {
        let id = self.ids.next();
        self.pipeline.enqueue_send(Message::new(id, method, params, false, now_ms()));
    }

    pub fn set_bandwidth_throttle(&self, kind: impl Into<String>, max_bytes: usize, bytes_per_sec: usize) {
        self.config.write().set_bandwidth_throttle(kind, max_bytes, bytes_per_sec);
    }

    // -- queries -----------------------------------------------------------

    pub fn get_scenes(&self) -> Vec<crate::mirror::Scene> {
        self.core.lock().borrow().mirror.scenes.values().cloned().collect()
    }

    pub fn get_groups(&self) -> Vec<crate::mirror::Group> {
        self.core.lock().borrow().mirror.groups.values().cloned().collect()
    }

    /// The groups currently showing `scene_id`. `Scene` itself only carries
    /// `control_ids`; groups point at scenes via `Group.scene_id`, so this is
    /// the reverse lookup a host needs to answer "who is watching scene X".
    pub fn get_groups_for_scene(&self, scene_id: &str) -> Vec<crate::mirror::Group> {
        self.core.lock().borrow().mirror.groups_for_scene(scene_id).into_iter().cloned().collect()
    }

    pub fn get_participants(&self) -> Vec<crate::mirror::Participant> {
        self.core.lock().borrow().mirror.participants_by_mixer_id.values().cloned().collect()
    }

    /// Directly feeds transport-received text into the incoming queue; used
    /// by tests and by a real transport's `on_text` callback.
    pub fn on_transport_text(&self, text: String) {
        self.pipeline.push_incoming_text(text);
    }

    pub fn server_time_offset_ms(&self) -> i64 {
        self.core.lock().borrow().server_time_offset_ms
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.pipeline_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.init_thread.lock().take() {
            let _ = handle.join();
        }
    }
}
