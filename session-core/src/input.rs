//! Dispatches `giveInput` methods from the service into edge-detected button
//! and joystick events.
//!
//! Gated on `interactivity_enabled`: everything else drops the input
//! with a `tracing::warn!`. Transactions are never auto-captured here - the
//! host decides whether/when to call `capture_transaction`.

use protocol::{GiveInputParams, INPUT_EVENT_KEY_DOWN, INPUT_EVENT_KEY_UP, INPUT_EVENT_MOUSE_DOWN, INPUT_EVENT_MOUSE_UP, INPUT_EVENT_MOVE};

use crate::event::Event;
use crate::mirror::{ButtonState, Control, EntityMirror};
use crate::state::SessionState;

/// Applies one `giveInput` payload against the mirror, pushing any resulting
/// event onto `events`. Returns nothing - dropped input is only observable
/// through the `tracing::warn!` it emits.
pub fn dispatch_give_input(
    mirror: &mut EntityMirror,
    state: SessionState,
    params: &GiveInputParams,
    now_ms: i64,
    events: &mut Vec<Event>,
) {
    if state != SessionState::InteractivityEnabled {
        tracing::warn!(control_id = %params.input.control_id, "dropping giveInput: session not interactivity_enabled");
        return;
    }

    let Some(&mixer_id) = mirror.session_id_to_mixer_id.get(&params.participant_id) else {
        tracing::warn!(session_id = %params.participant_id, "dropping giveInput: unknown participant");
        return;
    };
    let Some(participant) = mirror.participants_by_mixer_id.get(&mixer_id) else {
        tracing::warn!(session_id = %params.participant_id, "dropping giveInput: participant not in mirror");
        return;
    };
    if participant.disabled {
        tracing::warn!(session_id = %params.participant_id, "dropping giveInput: participant disabled");
        return;
    }
    let session_id = params.participant_id.clone();

    let Some(control) = mirror.controls.get_mut(&params.input.control_id) else {
        tracing::warn!(control_id = %params.input.control_id, "dropping giveInput: unknown control");
        return;
    };

    match control {
        Control::Button { id, cost, state_by_participant, .. } => {
            let event = params.input.event.as_str();
            let was_pressed = state_by_participant.get(&session_id).map(|s| s.is_pressed).unwrap_or(false);
            let is_down_event = event == INPUT_EVENT_MOUSE_DOWN || event == INPUT_EVENT_KEY_DOWN;
            let new_state = if is_down_event {
                ButtonState { is_down: !was_pressed, is_pressed: true, is_up: false }
            } else if event == INPUT_EVENT_MOUSE_UP || event == INPUT_EVENT_KEY_UP {
                ButtonState { is_down: false, is_pressed: false, is_up: true }
            } else {
                tracing::warn!(%event, "dropping giveInput: unrecognized button event");
                return;
            };
            state_by_participant.insert(session_id.clone(), new_state.clone());

            let (transaction_id, event_cost) = if is_down_event {
                match &params.transaction_id {
                    Some(t) => (t.clone(), *cost),
                    None => {
                        tracing::error!(control_id = %id, "button press missing transactionId");
                        (String::new(), 0)
                    }
                }
            } else {
                (String::new(), 0)
            };

            events.push(Event::Button {
                timestamp_ms: now_ms,
                control_id: id.clone(),
                participant_mixer_id: mixer_id,
                is_pressed: new_state.is_pressed,
                cost: event_cost,
                transaction_id,
            });
        }
        Control::Joystick { id, state_by_participant, x, y, .. } => {
            if params.input.event != INPUT_EVENT_MOVE {
                tracing::warn!(event = %params.input.event, "dropping giveInput: unrecognized joystick event");
                return;
            }
            let nx = params.input.x.unwrap_or(0.0);
            let ny = params.input.y.unwrap_or(0.0);
            state_by_participant.insert(session_id, (nx, ny));
            *x = nx;
            *y = ny;
            events.push(Event::Joystick {
                timestamp_ms: now_ms,
                control_id: id.clone(),
                participant_mixer_id: mixer_id,
                x: nx,
                y: ny,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{InputWire, ParticipantWire};
    use std::collections::HashMap;

    fn mirror_with_button_and_participant() -> EntityMirror {
        let mut mirror = EntityMirror::new();
        mirror.controls.insert(
            "GiveHealth".to_string(),
            Control::Button {
                id: "GiveHealth".to_string(),
                parent_scene_id: "default".to_string(),
                etag: String::new(),
                disabled: false,
                cost: 5,
                cooldown_deadline_ms: 0,
                state_by_participant: HashMap::new(),
            },
        );
        mirror.participant_join(&ParticipantWire {
            session_id: "s1".to_string(),
            mixer_id: 1,
            username: "viewer".to_string(),
            level: 1,
            group_id: "default".to_string(),
            disabled: false,
            connected_at: 0,
            last_input_at: 0,
            etag: String::new(),
        });
        mirror
    }

    #[test]
    fn button_press_with_transaction_emits_one_event() {
        let mut mirror = mirror_with_button_and_participant();
        let mut events = Vec::new();
        let params = GiveInputParams {
            participant_id: "s1".to_string(),
            input: InputWire { control_id: "GiveHealth".to_string(), event: INPUT_EVENT_MOUSE_DOWN.to_string(), x: None, y: None },
            transaction_id: Some("t1".to_string()),
        };
        dispatch_give_input(&mut mirror, SessionState::InteractivityEnabled, &params, 1000, &mut events);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Button { is_pressed, cost, transaction_id, .. } => {
                assert!(*is_pressed);
                assert_eq!(*cost, 5);
                assert_eq!(transaction_id, "t1");
            }
            _ => panic!("expected button event"),
        }
        let Control::Button { state_by_participant, .. } = &mirror.controls["GiveHealth"] else { panic!() };
        let state = &state_by_participant["s1"];
        assert!(state.is_down && state.is_pressed && !state.is_up);
    }

    #[test]
    fn hold_then_release_produces_correct_edges() {
        let mut mirror = mirror_with_button_and_participant();
        let mut events = Vec::new();
        let down = GiveInputParams {
            participant_id: "s1".to_string(),
            input: InputWire { control_id: "GiveHealth".to_string(), event: INPUT_EVENT_MOUSE_DOWN.to_string(), x: None, y: None },
            transaction_id: Some("t1".to_string()),
        };
        dispatch_give_input(&mut mirror, SessionState::InteractivityEnabled, &down, 0, &mut events);
        // Second down while already pressed: isDown should now be false.
        dispatch_give_input(&mut mirror, SessionState::InteractivityEnabled, &down, 1, &mut events);
        let Control::Button { state_by_participant, .. } = &mirror.controls["GiveHealth"] else { panic!() };
        let state = &state_by_participant["s1"];
        assert!(!state.is_down && state.is_pressed);

        let up = GiveInputParams {
            participant_id: "s1".to_string(),
            input: InputWire { control_id: "GiveHealth".to_string(), event: INPUT_EVENT_MOUSE_UP.to_string(), x: None, y: None },
            transaction_id: None,
        };
        dispatch_give_input(&mut mirror, SessionState::InteractivityEnabled, &up, 2, &mut events);
        let Control::Button { state_by_participant, .. } = &mirror.controls["GiveHealth"] else { panic!() };
        let state = &state_by_participant["s1"];
        assert!(!state.is_down && !state.is_pressed && state.is_up);
        match events.last().unwrap() {
            Event::Button { is_pressed, .. } => assert!(!is_pressed),
            _ => panic!("expected button event"),
        }
    }

    #[test]
    fn input_dropped_when_not_enabled() {
        let mut mirror = mirror_with_button_and_participant();
        let mut events = Vec::new();
        let down = GiveInputParams {
            participant_id: "s1".to_string(),
            input: InputWire { control_id: "GiveHealth".to_string(), event: INPUT_EVENT_MOUSE_DOWN.to_string(), x: None, y: None },
            transaction_id: Some("t1".to_string()),
        };
        dispatch_give_input(&mut mirror, SessionState::InteractivityDisabled, &down, 0, &mut events);
        assert!(events.is_empty());
    }
}
