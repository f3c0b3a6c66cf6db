// ============================================================
// Layer 4 — Corpus Pool
// ============================================================
// The shuffled list of recordings not yet consumed in the
// current epoch. Lanes of the batcher take from the same pool;
// when it runs dry the batcher re-lists the corpus and refills
// it, which starts a new epoch.
//
//   new(ids)   → epoch 0, ids shuffled
//   take()     → pop one id (None when empty)
//   refill(ids)→ epoch += 1, ids shuffled
//
// Reference: rand crate documentation (SliceRandom)

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub struct CorpusPool {
    pending: Vec<String>,
    epoch:   usize,
}

impl CorpusPool {
    /// Start epoch 0 with a shuffled copy of `ids`.
    pub fn new(mut ids: Vec<String>, rng: &mut StdRng) -> Self {
        ids.shuffle(rng);
        Self { pending: ids, epoch: 0 }
    }

    /// Take the next recording id of this epoch.
    pub fn take(&mut self) -> Option<String> {
        self.pending.pop()
    }

    /// Replace the pool with a freshly shuffled listing and start a new epoch.
    pub fn refill(&mut self, mut ids: Vec<String>, rng: &mut StdRng) {
        ids.shuffle(rng);
        self.pending = ids;
        self.epoch += 1;
        tracing::info!("Epoch {} started ({} recordings)", self.epoch, self.pending.len());
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Recordings left in this epoch
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Number of completed passes over the corpus
    pub fn epoch(&self) -> usize {
        self.epoch
    }
}
