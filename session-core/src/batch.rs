//! Coalesces several control mutations into a single `updateControls` RPC
//! instead of one wire message per field change.

use protocol::ControlPatch;

/// Accumulates control patches for one scene; `commit` hands them to the
/// session as a single outbound message instead of one per field change.
pub struct ControlBatch {
    scene_id: String,
    patches: std::collections::HashMap<String, ControlPatch>,
}

impl ControlBatch {
    pub fn begin(scene_id: impl Into<String>) -> Self {
        ControlBatch { scene_id: scene_id.into(), patches: std::collections::HashMap::new() }
    }

    fn entry(&mut self, control_id: &str, etag: &str) -> &mut ControlPatch {
        self.patches.entry(control_id.to_string()).or_insert_with(|| ControlPatch {
            control_id: control_id.to_string(),
            etag: etag.to_string(),
            ..Default::default()
        })
    }

    pub fn add_disabled(&mut self, control_id: &str, etag: &str, disabled: bool) -> &mut Self {
        self.entry(control_id, etag).disabled = Some(disabled);
        self
    }

    pub fn add_progress(&mut self, control_id: &str, etag: &str, progress: f32) -> &mut Self {
        self.entry(control_id, etag).progress = Some(progress);
        self
    }

    pub fn add_cooldown(&mut self, control_id: &str, etag: &str, cooldown_deadline_ms: i64) -> &mut Self {
        self.entry(control_id, etag).cooldown = Some(cooldown_deadline_ms);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    /// Consumes the batch, returning the accumulated patches in insertion-
    /// independent order. The session wraps this in a single `updateControls`.
    pub fn close(self) -> Vec<ControlPatch> {
        self.patches.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_add_to_same_control_merges_into_one_patch() {
        let mut batch = ControlBatch::begin("default");
        batch.add_disabled("btn", "e1", true).add_progress("btn", "e1", 0.5);
        let patches = batch.close();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].disabled, Some(true));
        assert_eq!(patches[0].progress, Some(0.5));
    }
}
