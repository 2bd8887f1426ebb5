use std::collections::HashSet;
use std::sync::Mutex;

/// Side-effect context threaded through macro substitution: the read-only
/// set of PCDs known to the platform, and the append-only, idempotent set
/// of PCDs referenced by a conditional directive.
///
/// Grounded on the original engine's two process-wide sets, but made an
/// explicit context object rather than global state, per the "explicit
/// context instead of global state" design note.
#[derive(Debug, Default)]
pub struct PcdTracker {
  platform_pcds: HashSet<String>,
  conditional_pcds: Mutex<HashSet<String>>,
}

impl PcdTracker {
  pub fn new(platform_pcds: impl IntoIterator<Item = String>) -> Self {
    Self {
      platform_pcds: platform_pcds.into_iter().collect(),
      conditional_pcds: Mutex::new(HashSet::new()),
    }
  }

  pub fn platform_pcds(&self) -> &HashSet<String> {
    &self.platform_pcds
  }

  /// Idempotent append: re-recording the same name has no visible effect.
  pub fn record_conditional(&self, name: &str) {
    let mut set = self.conditional_pcds.lock().expect("conditional_pcds poisoned");
    set.insert(name.to_string());
  }

  pub fn conditional_pcds(&self) -> HashSet<String> {
    self.conditional_pcds.lock().expect("conditional_pcds poisoned").clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_conditional_is_idempotent() {
    let tracker = PcdTracker::new(["gFoo.PcdBar".to_string()]);
    tracker.record_conditional("gFoo.PcdBar");
    tracker.record_conditional("gFoo.PcdBar");
    assert_eq!(tracker.conditional_pcds().len(), 1);
  }
}
