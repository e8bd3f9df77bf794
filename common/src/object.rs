//! Data model for a migration run: object references, transfer tasks and
//! their state machine, and terminal results.

use serde::{Deserialize, Serialize};

/// Content fingerprint: a lowercase-hex MD5 digest.
///
/// The empty-content fingerprint is well-defined
/// (`d41d8cd98f00b204e9800998ecf8427e`); zero-byte objects are comparable
/// like any other.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn from_digest(digest: md5::Digest) -> Self {
        Self(format!("{digest:x}"))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

/// One object in the source listing. Immutable; exactly one transfer task
/// is built per reference.
#[derive(Clone, Debug)]
pub struct SourceObjectRef {
    /// Hierarchical key, relative to the container root. A trailing `/`
    /// marks a directory placeholder (a zero-byte object).
    pub key: String,
    pub size: u64,
    /// Content fingerprint if the listing provides one; `None` fails open
    /// toward transfer.
    pub fingerprint: Option<Fingerprint>,
}

impl SourceObjectRef {
    #[must_use]
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Lifecycle of a single transfer task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Staging,
    Checking,
    Pushing,
    Retrying,
    Done,
    Skipped,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Skipped | TaskState::Failed)
    }

    /// Legal transitions: Pending -> Staging -> Checking -> {Skipped, Pushing},
    /// Pushing <-> Retrying, Pushing -> Done, and any non-terminal state may
    /// fail terminally.
    #[must_use]
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::{Checking, Done, Failed, Pending, Pushing, Retrying, Skipped, Staging};
        matches!(
            (self, next),
            (Pending, Staging)
                | (Staging, Checking)
                | (Checking, Pushing)
                | (Checking, Skipped)
                | (Pushing, Retrying)
                | (Pushing, Done)
                | (Retrying, Pushing)
                | (Pending | Staging | Checking | Pushing | Retrying, Failed)
        )
    }
}

/// A unit of work owned by exactly one worker for its lifetime.
#[derive(Debug)]
pub struct TransferTask {
    pub object: SourceObjectRef,
    /// Destination key, derived from the source key with hierarchy preserved.
    pub dest_key: String,
    /// Where the object's bytes are staged while in flight.
    pub staging_path: std::path::PathBuf,
    attempts: u32,
    state: TaskState,
}

impl TransferTask {
    #[must_use]
    pub fn new(
        object: SourceObjectRef,
        dest_key: String,
        staging_path: std::path::PathBuf,
    ) -> Self {
        Self {
            object,
            dest_key,
            staging_path,
            attempts: 0,
            state: TaskState::Pending,
        }
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn set_state(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {:?} -> {next:?} for {:?}",
            self.state,
            self.object.key,
        );
        tracing::trace!(key = %self.object.key, from = ?self.state, to = ?next, "task transition");
        self.state = next;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the attempt number of the operation currently being retried.
    /// The counter is monotonically non-decreasing across pipeline steps.
    pub fn record_attempt(&mut self, attempt: u32) {
        self.attempts = self.attempts.max(attempt);
    }
}

/// Terminal disposition of one task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    Skipped,
    Succeeded,
    Failed,
}

/// Immutable record of one finished task, consumed by the aggregator and
/// the verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferResult {
    pub key: String,
    pub outcome: TransferOutcome,
    pub bytes_transferred: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Reject keys that could escape the staging or destination roots.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key is empty".to_string());
    }
    if key.starts_with('/') {
        return Err("key must be relative".to_string());
    }
    if key
        .split('/')
        .any(|component| component == "..")
    {
        return Err("key must not contain `..` components".to_string());
    }
    Ok(())
}

/// Destination key derived from the source key, preserving hierarchy.
#[must_use]
pub fn derive_dest_key(key: &str) -> String {
    key.trim_start_matches('/').to_string()
}

/// Build one task per source object. Duplicate keys in the listing are
/// dropped with a warning so no two workers ever share a key.
#[must_use]
pub fn build_tasks(
    objects: Vec<SourceObjectRef>,
    staging_dir: &std::path::Path,
) -> Vec<TransferTask> {
    let mut seen = std::collections::HashSet::new();
    let mut tasks = Vec::with_capacity(objects.len());
    for object in objects {
        if !seen.insert(object.key.clone()) {
            tracing::warn!(key = %object.key, "duplicate key in source listing, keeping the first");
            continue;
        }
        let dest_key = derive_dest_key(&object.key);
        let staging_path = if validate_key(&object.key).is_ok() {
            staging_dir.join(dest_key.trim_end_matches('/'))
        } else {
            // never used: the worker rejects the key before staging
            staging_dir.to_path_buf()
        };
        tasks.push(TransferTask::new(object, dest_key, staging_path));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str) -> SourceObjectRef {
        SourceObjectRef {
            key: key.to_string(),
            size: 1,
            fingerprint: None,
        }
    }

    #[test]
    fn success_path_transitions_are_legal() {
        let path = [
            TaskState::Pending,
            TaskState::Staging,
            TaskState::Checking,
            TaskState::Pushing,
            TaskState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn retry_loop_transitions_are_legal() {
        assert!(TaskState::Pushing.can_transition_to(TaskState::Retrying));
        assert!(TaskState::Retrying.can_transition_to(TaskState::Pushing));
        assert!(TaskState::Retrying.can_transition_to(TaskState::Failed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [TaskState::Done, TaskState::Skipped, TaskState::Failed] {
            for next in [TaskState::Pending, TaskState::Pushing, TaskState::Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn checking_may_short_circuit_to_skipped() {
        assert!(TaskState::Checking.can_transition_to(TaskState::Skipped));
        assert!(!TaskState::Checking.can_transition_to(TaskState::Done));
    }

    #[test]
    fn attempts_are_monotonic() {
        let mut task = TransferTask::new(object("a"), "a".to_string(), "/tmp/a".into());
        task.record_attempt(2);
        task.record_attempt(1);
        assert_eq!(task.attempts(), 2);
    }

    #[test]
    fn duplicate_keys_are_dropped() {
        let tasks = build_tasks(
            vec![object("a"), object("b"), object("a")],
            std::path::Path::new("/tmp/stage"),
        );
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn key_validation_rejects_escapes() {
        assert!(validate_key("foo/bar.txt").is_ok());
        assert!(validate_key("dir/").is_ok());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn dest_key_preserves_hierarchy() {
        assert_eq!(derive_dest_key("a/b/c.txt"), "a/b/c.txt");
        assert_eq!(derive_dest_key("/a/b"), "a/b");
    }
}
