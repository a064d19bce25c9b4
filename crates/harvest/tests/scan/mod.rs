use super::*;

mod properties;
mod scenarios;

/// How long an attempt at a position takes before it reports.
#[derive(Clone, Copy)]
pub enum Schedule {
  /// Later positions take longer, so completions arrive in order
  Ascending,
  /// Earlier positions take longer, so completions arrive in reverse within each window
  Descending,
  /// A fixed pseudo-random permutation of delays
  Scrambled,
}

impl Schedule {
  fn delay(self, position: u64) -> Duration {
    let millis = match self {
      Self::Ascending => position * 4,
      Self::Descending => (64 - position % 64) * 2,
      Self::Scrambled => (position * 37 + 11) % 23,
    };
    Duration::from_millis(millis)
  }
}

/// An executor whose outcomes are written down in advance.
///
/// Positions `1..=pattern.len()` follow the pattern (`S` succeeds, anything else fails) and every
/// later position fails. Attempts, cleanups and the concurrency peak are all recorded.
pub struct Script {
  pattern:  Vec<bool>,
  schedule: Schedule,
  attempts: Mutex<HashMap<u64, u32>>,
  cleanups: Mutex<HashMap<u64, u32>>,
  running:  AtomicUsize,
  peak:     AtomicUsize,
}

impl Script {
  pub fn new(pattern: &str, schedule: Schedule) -> Arc<Self> {
    Arc::new(Self {
      pattern: pattern.chars().map(|c| c == 'S').collect(),
      schedule,
      attempts: Mutex::new(HashMap::new()),
      cleanups: Mutex::new(HashMap::new()),
      running: AtomicUsize::new(0),
      peak: AtomicUsize::new(0),
    })
  }

  pub fn succeeds(&self, position: u64) -> bool {
    self.pattern.get((position - 1) as usize).copied().unwrap_or(false)
  }

  pub fn attempts(&self) -> HashMap<u64, u32> { self.attempts.lock().unwrap().clone() }

  pub fn cleanups(&self) -> HashMap<u64, u32> { self.cleanups.lock().unwrap().clone() }

  pub fn peak(&self) -> usize { self.peak.load(Ordering::SeqCst) }
}

#[async_trait::async_trait]
impl AttemptExecutor for Script {
  async fn attempt(&self, id: &PaperId) -> Outcome {
    *self.attempts.lock().unwrap().entry(id.number).or_default() += 1;
    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    tokio::time::sleep(self.schedule.delay(id.number)).await;

    self.running.fetch_sub(1, Ordering::SeqCst);
    if self.succeeds(id.number) {
      Outcome::success()
    } else {
      Outcome::failure(format!("{id} not found"))
    }
  }

  async fn cleanup(&self, id: &PaperId) {
    *self.cleanups.lock().unwrap().entry(id.number).or_default() += 1;
  }
}

pub fn options(concurrency: usize, failure_threshold: u32) -> ScanOptions {
  ScanOptions { concurrency, failure_threshold }
}
