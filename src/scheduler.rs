use crate::time::NanoTime;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Identity for a queued entry: unique by insertion sequence regardless of
/// tag, so anonymous entries can coexist and tagged entries can be looked up
/// and removed by name.
#[derive(Debug, Clone)]
struct EntryKey {
    seq: u64,
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}
impl Eq for EntryKey {}
impl Hash for EntryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

/// Per-node tagged timer queue (§4.2). Holds an ordered set of
/// `(fire_time, tag)` pairs with at-most-one outstanding entry per named
/// tag; anonymous entries coexist freely. `schedule`/`advance` return the
/// new head time when it changes, for the caller to propagate to the
/// graph's `schedule[]` vector via `schedule_node`.
pub struct NodeScheduler {
    queue: PriorityQueue<EntryKey, Reverse<NanoTime>>,
    tag_to_seq: HashMap<String, u64>,
    seq_to_tag: HashMap<u64, String>,
    next_seq: u64,
    started: bool,
}

impl Default for NodeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeScheduler {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            tag_to_seq: HashMap::new(),
            seq_to_tag: HashMap::new(),
            next_seq: 0,
            started: false,
        }
    }

    /// Node lifecycle transitions call this; once started, scheduling at or
    /// before the current time is rejected rather than silently accepted.
    pub fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    pub fn next_scheduled_time(&self) -> Option<NanoTime> {
        self.queue.peek().map(|(_, Reverse(t))| *t)
    }

    pub fn is_scheduled(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn is_scheduled_now(&self, current_time: NanoTime) -> bool {
        self.next_scheduled_time() == Some(current_time)
    }

    fn remove_by_seq(&mut self, seq: u64) {
        self.queue.remove(&EntryKey { seq });
        if let Some(tag) = self.seq_to_tag.remove(&seq) {
            self.tag_to_seq.remove(&tag);
        }
    }

    /// Inserts `(when, tag)`, replacing any existing entry with the same
    /// tag. Scheduling at or before `current_time` while started is silently
    /// ignored (§7: "scheduling in the past"). Returns `true` if the new
    /// entry became the queue's head — the caller should propagate that to
    /// the graph via `schedule_node`.
    pub fn schedule(
        &mut self,
        when: NanoTime,
        tag: Option<&str>,
        current_time: NanoTime,
    ) -> bool {
        if self.started && when <= current_time {
            return false;
        }
        if let Some(tag) = tag {
            if let Some(&old_seq) = self.tag_to_seq.get(tag) {
                self.remove_by_seq(old_seq);
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(tag) = tag {
            self.tag_to_seq.insert(tag.to_string(), seq);
            self.seq_to_tag.insert(seq, tag.to_string());
        }
        self.queue.push(EntryKey { seq }, Reverse(when));
        self.next_scheduled_time() == Some(when)
    }

    /// Removes and returns the tag's scheduled time, if any.
    pub fn pop_tag(&mut self, tag: &str) -> Option<NanoTime> {
        let seq = self.tag_to_seq.remove(tag)?;
        self.seq_to_tag.remove(&seq);
        self.queue.remove(&EntryKey { seq }).map(|(_, Reverse(t))| t)
    }

    /// Removes by tag, or pops the head entry if no tag is given.
    pub fn un_schedule(&mut self, tag: Option<&str>) -> Option<NanoTime> {
        match tag {
            Some(tag) => self.pop_tag(tag),
            None => {
                let (EntryKey { seq }, Reverse(t)) = self.queue.pop()?;
                if let Some(tag) = self.seq_to_tag.remove(&seq) {
                    self.tag_to_seq.remove(&tag);
                }
                Some(t)
            }
        }
    }

    /// Drops every entry with `fire_time <= current_time`. Returns the new
    /// head time if entries remain, for the caller to re-register with the
    /// graph.
    pub fn advance(&mut self, current_time: NanoTime) -> Option<NanoTime> {
        while let Some((_, Reverse(t))) = self.queue.peek() {
            if *t <= current_time {
                let (EntryKey { seq }, _) = self.queue.pop().unwrap();
                if let Some(tag) = self.seq_to_tag.remove(&seq) {
                    self.tag_to_seq.remove(&tag);
                }
            } else {
                break;
            }
        }
        self.next_scheduled_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tag_replacement_keeps_only_the_latest() {
        let mut s = NodeScheduler::new();
        s.schedule(NanoTime::new(100), Some("x"), NanoTime::ZERO);
        s.schedule(NanoTime::new(200), Some("x"), NanoTime::ZERO);
        assert_eq!(s.next_scheduled_time(), Some(NanoTime::new(200)));
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn anonymous_entries_coexist() {
        let mut s = NodeScheduler::new();
        s.schedule(NanoTime::new(100), None, NanoTime::ZERO);
        s.schedule(NanoTime::new(50), None, NanoTime::ZERO);
        assert_eq!(s.next_scheduled_time(), Some(NanoTime::new(50)));
        assert_eq!(s.queue.len(), 2);
    }

    #[test]
    fn scheduling_in_the_past_once_started_is_ignored() {
        let mut s = NodeScheduler::new();
        s.set_started(true);
        let became_head = s.schedule(NanoTime::new(10), None, NanoTime::new(20));
        assert!(!became_head);
        assert!(!s.is_scheduled());
    }

    #[test]
    fn advance_drops_due_entries_and_reports_new_head() {
        let mut s = NodeScheduler::new();
        s.schedule(NanoTime::new(100), None, NanoTime::ZERO);
        s.schedule(NanoTime::new(200), None, NanoTime::ZERO);
        let head = s.advance(NanoTime::new(100));
        assert_eq!(head, Some(NanoTime::new(200)));
        assert!(!s.is_scheduled_now(NanoTime::new(100)));
    }

    #[test]
    fn pop_tag_returns_and_removes() {
        let mut s = NodeScheduler::new();
        s.schedule(NanoTime::new(100), Some("beat"), NanoTime::ZERO);
        assert_eq!(s.pop_tag("beat"), Some(NanoTime::new(100)));
        assert_eq!(s.pop_tag("beat"), None);
    }
}
