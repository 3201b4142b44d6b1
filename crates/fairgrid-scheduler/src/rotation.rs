//! Round-robin org rotation.
//!
//! Holds the orgs that currently have at least one active job, in the
//! order they became active, plus a persisted cursor. Selection scans at
//! most one full cycle, so it terminates even when no org is admissible.

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RotationList {
    orgs: Vec<String>,
    cursor: usize,
}

impl RotationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an org if it is not already in rotation.
    ///
    /// Returns `true` if the org was added.
    pub fn insert(&mut self, org_id: &str) -> bool {
        if self.contains(org_id) {
            return false;
        }
        self.orgs.push(org_id.to_string());
        debug!(%org_id, position = self.orgs.len() - 1, "org entered rotation");
        true
    }

    /// Remove an org from rotation.
    ///
    /// If the cursor pointed at or past the removed position it wraps to
    /// zero. Returns `true` if the org was present.
    pub fn remove(&mut self, org_id: &str) -> bool {
        let Some(idx) = self.orgs.iter().position(|o| o == org_id) else {
            return false;
        };
        self.orgs.remove(idx);
        if self.cursor >= idx || self.cursor >= self.orgs.len() {
            self.cursor = 0;
        }
        debug!(%org_id, cursor = self.cursor, "org left rotation");
        true
    }

    /// Select the next org for which `admissible` returns `true`.
    ///
    /// Starting at the cursor, each candidate advances the cursor by one
    /// (wrapping) before it is evaluated. Returns `None` after one full
    /// cycle without a match, or when the rotation is empty.
    pub fn next_where<F>(&mut self, mut admissible: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        let len = self.orgs.len();
        for _ in 0..len {
            let candidate = &self.orgs[self.cursor % len];
            self.cursor = (self.cursor + 1) % len;
            if admissible(candidate) {
                return Some(candidate.clone());
            }
        }
        None
    }

    pub fn contains(&self, org_id: &str) -> bool {
        self.orgs.iter().any(|o| o == org_id)
    }

    pub fn len(&self) -> usize {
        self.orgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }

    /// Current cursor position (for diagnostics).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Orgs in rotation order.
    pub fn orgs(&self) -> &[String] {
        &self.orgs
    }
}
