//! The local shadow of service-owned entities: scenes, groups, controls, and
//! participants.
//!
//! Back-references are by id, not by pointer (Design Notes: an arena/index
//! design fits a mutable graph better than `Rc`/`Arc` here). Every lookup
//! goes through a `HashMap` keyed by the entity's string or numeric id.

use std::collections::HashMap;

use protocol::{ControlWire, GroupWire, ParticipantWire, SceneWire, CONTROL_KIND_BUTTON, CONTROL_KIND_JOYSTICK};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonState {
    pub is_down: bool,
    pub is_pressed: bool,
    pub is_up: bool,
}

#[derive(Debug, Clone)]
pub enum Control {
    Button {
        id: String,
        parent_scene_id: String,
        etag: String,
        disabled: bool,
        cost: u32,
        cooldown_deadline_ms: i64,
        state_by_participant: HashMap<String, ButtonState>,
    },
    Joystick {
        id: String,
        parent_scene_id: String,
        etag: String,
        disabled: bool,
        x: f64,
        y: f64,
        state_by_participant: HashMap<String, (f64, f64)>,
    },
}

impl Control {
    pub fn id(&self) -> &str {
        match self {
            Control::Button { id, .. } | Control::Joystick { id, .. } => id,
        }
    }

    pub fn parent_scene_id(&self) -> &str {
        match self {
            Control::Button { parent_scene_id, .. } | Control::Joystick { parent_scene_id, .. } => parent_scene_id,
        }
    }

    pub fn etag(&self) -> &str {
        match self {
            Control::Button { etag, .. } | Control::Joystick { etag, .. } => etag,
        }
    }

    fn from_wire(wire: &ControlWire, parent_scene_id: &str) -> Control {
        if wire.kind == CONTROL_KIND_JOYSTICK {
            Control::Joystick {
                id: wire.control_id.clone(),
                parent_scene_id: parent_scene_id.to_string(),
                etag: wire.etag.clone(),
                disabled: wire.disabled,
                x: wire.x.unwrap_or(0.0),
                y: wire.y.unwrap_or(0.0),
                state_by_participant: HashMap::new(),
            }
        } else {
            Control::Button {
                id: wire.control_id.clone(),
                parent_scene_id: parent_scene_id.to_string(),
                etag: wire.etag.clone(),
                disabled: wire.disabled,
                cost: wire.cost.unwrap_or(0),
                cooldown_deadline_ms: wire.cooldown.unwrap_or(0),
                state_by_participant: HashMap::new(),
            }
        }
    }

    /// Applies an `updateControls`/`onControlUpdate` patch, keeping per-kind
    /// fields and per-participant state untouched when the wire payload omits
    /// them.
    fn apply_update(&mut self, wire: &ControlWire) {
        match self {
            Control::Button { etag, disabled, cost, cooldown_deadline_ms, .. } => {
                *etag = wire.etag.clone();
                *disabled = wire.disabled;
                if let Some(c) = wire.cost {
                    *cost = c;
                }
                if let Some(c) = wire.cooldown {
                    *cooldown_deadline_ms = c;
                }
            }
            Control::Joystick { etag, disabled, x, y, .. } => {
                *etag = wire.etag.clone();
                *disabled = wire.disabled;
                if let Some(v) = wire.x {
                    *x = v;
                }
                if let Some(v) = wire.y {
                    *y = v;
                }
            }
        }
    }

    /// Clears button edge flags (`isDown`/`isUp`) at the start of a host tick;
    /// `isPressed` is left untouched since it reflects "currently held".
    /// Joystick state is never cleared here.
    fn clear_edge_flags(&mut self) {
        if let Control::Button { state_by_participant, .. } = self {
            for state in state_by_participant.values_mut() {
                state.is_down = false;
                state.is_up = false;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub control_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub scene_id: String,
    pub etag: String,
}

impl Group {
    pub fn default_group() -> Group {
        Group {
            id: "default".to_string(),
            scene_id: "default".to_string(),
            etag: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub mixer_id: u32,
    pub session_id: String,
    pub username: String,
    pub level: u32,
    pub group_id: String,
    pub disabled: bool,
    pub connected_at_ms: i64,
    pub last_input_at_ms: i64,
    pub etag: String,
}

impl Participant {
    fn from_wire(wire: &ParticipantWire) -> Participant {
        Participant {
            mixer_id: wire.mixer_id,
            session_id: wire.session_id.clone(),
            username: wire.username.clone(),
            level: wire.level,
            group_id: wire.group_id.clone(),
            disabled: wire.disabled,
            connected_at_ms: wire.connected_at,
            last_input_at_ms: wire.last_input_at,
            etag: wire.etag.clone(),
        }
    }
}

/// The in-memory mirror of every entity the service has told us about.
#[derive(Debug, Default)]
pub struct EntityMirror {
    pub scenes: HashMap<String, Scene>,
    pub groups: HashMap<String, Group>,
    pub controls: HashMap<String, Control>,
    pub participants_by_mixer_id: HashMap<u32, Participant>,
    pub session_id_to_mixer_id: HashMap<String, u32>,
    pub participants_by_group_id: HashMap<String, Vec<u32>>,
}

impl EntityMirror {
    pub fn new() -> Self {
        let mut mirror = EntityMirror::default();
        let default_group = Group::default_group();
        mirror.groups.insert(default_group.id.clone(), default_group);
        mirror
    }

    // -- getGroups / getScenes replies --------------------------------------

    pub fn apply_groups(&mut self, groups: &[GroupWire]) {
        for g in groups {
            self.groups.insert(
                g.group_id.clone(),
                Group {
                    id: g.group_id.clone(),
                    scene_id: g.scene_id.clone(),
                    etag: g.etag.clone(),
                },
            );
        }
    }

    pub fn apply_scenes(&mut self, scenes: &[SceneWire]) {
        for s in scenes {
            let mut control_ids = Vec::with_capacity(s.controls.len());
            for c in &s.controls {
                control_ids.push(c.control_id.clone());
                self.controls.insert(c.control_id.clone(), Control::from_wire(c, &s.scene_id));
            }
            self.scenes.insert(s.scene_id.clone(), Scene { id: s.scene_id.clone(), control_ids });
        }
    }

    // -- createGroups / updateGroups / onGroupCreate / onGroupUpdate -------

    pub fn upsert_group(&mut self, wire: &GroupWire) {
        self.groups.insert(
            wire.group_id.clone(),
            Group { id: wire.group_id.clone(), scene_id: wire.scene_id.clone(), etag: wire.etag.clone() },
        );
    }

    // -- updateControls / onControlUpdate -----------------------------------

    pub fn apply_control_updates(&mut self, controls: &[ControlWire]) {
        for wire in controls {
            if let Some(existing) = self.controls.get_mut(&wire.control_id) {
                existing.apply_update(wire);
            }
        }
    }

    // -- participants ---------------------------------------------------------

    pub fn participant_join(&mut self, wire: &ParticipantWire) {
        let p = Participant::from_wire(wire);
        self.session_id_to_mixer_id.insert(p.session_id.clone(), p.mixer_id);
        self.participants_by_group_id.entry(p.group_id.clone()).or_default().push(p.mixer_id);
        self.participants_by_mixer_id.insert(p.mixer_id, p);
    }

    pub fn participant_leave(&mut self, session_id: &str) {
        let Some(mixer_id) = self.session_id_to_mixer_id.remove(session_id) else { return };
        if let Some(p) = self.participants_by_mixer_id.remove(&mixer_id) {
            if let Some(list) = self.participants_by_group_id.get_mut(&p.group_id) {
                list.retain(|id| *id != mixer_id);
            }
        }
        for control in self.controls.values_mut() {
            if let Control::Button { state_by_participant, .. } = control {
                state_by_participant.remove(session_id);
            }
            if let Control::Joystick { state_by_participant, .. } = control {
                state_by_participant.remove(session_id);
            }
        }
    }

    pub fn participant_update_by_session_id(&mut self, session_id: &str, apply: impl FnOnce(&mut Participant)) {
        if let Some(&mixer_id) = self.session_id_to_mixer_id.get(session_id) {
            if let Some(p) = self.participants_by_mixer_id.get_mut(&mixer_id) {
                apply(p);
            }
        }
    }

    pub fn apply_participant_patches(&mut self, participants: &[ParticipantWire]) {
        for wire in participants {
            if let Some(&mixer_id) = self.session_id_to_mixer_id.get(&wire.session_id) {
                if let Some(p) = self.participants_by_mixer_id.get_mut(&mixer_id) {
                    p.username = wire.username.clone();
                    p.level = wire.level;
                    p.disabled = wire.disabled;
                    p.etag = wire.etag.clone();
                    if p.group_id != wire.group_id {
                        if let Some(list) = self.participants_by_group_id.get_mut(&p.group_id) {
                            list.retain(|id| *id != mixer_id);
                        }
                        self.participants_by_group_id.entry(wire.group_id.clone()).or_default().push(mixer_id);
                        p.group_id = wire.group_id.clone();
                    }
                }
            }
        }
    }

    pub fn move_participant_group(&mut self, mixer_id: u32, old_group_id: &str, new_group_id: &str) {
        if let Some(list) = self.participants_by_group_id.get_mut(old_group_id) {
            list.retain(|id| *id != mixer_id);
        }
        self.participants_by_group_id.entry(new_group_id.to_string()).or_default().push(mixer_id);
        if let Some(p) = self.participants_by_mixer_id.get_mut(&mixer_id) {
            p.group_id = new_group_id.to_string();
        }
    }

    /// Clears button edge flags on every control. Called once per host tick
    /// under the session lock, never by any other path.
    pub fn clear_button_edge_flags(&mut self) {
        for control in self.controls.values_mut() {
            control.clear_edge_flags();
        }
    }

    /// The groups currently showing `scene_id`. Derived rather than indexed:
    /// `Group.scene_id` only changes in a handful of call sites, so scanning
    /// `groups` here is cheaper than keeping a second map consistent with it.
    pub fn groups_for_scene(&self, scene_id: &str) -> Vec<&Group> {
        self.groups.values().filter(|g| g.scene_id == scene_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_participant(session_id: &str, mixer_id: u32, group: &str) -> ParticipantWire {
        ParticipantWire {
            session_id: session_id.to_string(),
            mixer_id,
            username: "viewer".to_string(),
            level: 1,
            group_id: group.to_string(),
            disabled: false,
            connected_at: 0,
            last_input_at: 0,
            etag: String::new(),
        }
    }

    #[test]
    fn participant_join_indexes_both_ways() {
        let mut mirror = EntityMirror::new();
        mirror.participant_join(&sample_participant("s1", 42, "default"));
        assert_eq!(mirror.session_id_to_mixer_id["s1"], 42);
        assert_eq!(mirror.participants_by_group_id["default"], vec![42]);
    }

    #[test]
    fn moving_group_then_back_restores_index() {
        let mut mirror = EntityMirror::new();
        mirror.participant_join(&sample_participant("s1", 42, "default"));
        mirror.move_participant_group(42, "default", "b");
        mirror.move_participant_group(42, "b", "default");
        assert_eq!(mirror.participants_by_group_id["default"], vec![42]);
        assert!(mirror.participants_by_group_id.get("b").map(|v| v.is_empty()).unwrap_or(true));
    }

    #[test]
    fn participant_leave_removes_from_group_index() {
        let mut mirror = EntityMirror::new();
        mirror.participant_join(&sample_participant("s1", 42, "default"));
        mirror.participant_leave("s1");
        assert!(mirror.participants_by_mixer_id.is_empty());
        assert!(mirror.participants_by_group_id["default"].is_empty());
    }

    #[test]
    fn clearing_edge_flags_leaves_is_pressed_untouched() {
        let mut mirror = EntityMirror::new();
        mirror.controls.insert(
            "btn".to_string(),
            Control::Button {
                id: "btn".to_string(),
                parent_scene_id: "default".to_string(),
                etag: String::new(),
                disabled: false,
                cost: 0,
                cooldown_deadline_ms: 0,
                state_by_participant: HashMap::from([(
                    "s1".to_string(),
                    ButtonState { is_down: true, is_pressed: true, is_up: false },
                )]),
            },
        );
        mirror.clear_button_edge_flags();
        let Control::Button { state_by_participant, .. } = &mirror.controls["btn"] else { panic!() };
        let state = &state_by_participant["s1"];
        assert!(!state.is_down);
        assert!(state.is_pressed);
        assert!(!state.is_up);
    }

    #[test]
    fn groups_for_scene_finds_every_group_pointing_at_it() {
        let mut mirror = EntityMirror::new();
        mirror.apply_groups(&[
            GroupWire { group_id: "a".to_string(), scene_id: "scene1".to_string(), etag: String::new() },
            GroupWire { group_id: "b".to_string(), scene_id: "scene1".to_string(), etag: String::new() },
            GroupWire { group_id: "c".to_string(), scene_id: "scene2".to_string(), etag: String::new() },
        ]);
        let mut ids: Vec<&str> = mirror.groups_for_scene("scene1").iter().map(|g| g.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(mirror.groups_for_scene("no-such-scene").is_empty());
    }

    #[test]
    fn applying_same_group_update_twice_is_idempotent() {
        let mut mirror = EntityMirror::new();
        let wire = GroupWire { group_id: "default".to_string(), scene_id: "scene2".to_string(), etag: "e1".to_string() };
        mirror.apply_groups(std::slice::from_ref(&wire));
        mirror.apply_groups(std::slice::from_ref(&wire));
        assert_eq!(mirror.groups["default"].scene_id, "scene2");
        assert_eq!(mirror.groups.len(), 1);
    }
}
