//! Begrenzte FIFO-Warteschlange mit Drop-Oldest-Strategie
//!
//! Uebergibt Daten zwischen Netzwerk-Thread und Audio-Callback. `push`
//! blockiert nie: ist die Schlange voll, wird das aelteste Element
//! verworfen und gezaehlt. Veraltete Audiodaten sind schlechter als keine.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-sichere, begrenzte FIFO
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    nicht_leer: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Erstellt eine Schlange mit fester Kapazitaet (mindestens 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            nicht_leer: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Fuegt ein Element hinzu; gibt `true` zurueck wenn dafuer ein altes verworfen wurde
    pub fn push(&self, item: T) -> bool {
        let verworfen = {
            let mut items = self.items.lock();
            let verworfen = if items.len() >= self.capacity {
                items.pop_front();
                true
            } else {
                false
            };
            items.push_back(item);
            verworfen
        };
        if verworfen {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.nicht_leer.notify_one();
        verworfen
    }

    /// Nicht-blockierendes Entnehmen
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Wartet hoechstens `timeout` auf ein Element (nicht fuer Echtzeit-Threads)
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.nicht_leer.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Entfernt alle Elemente
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Anzahl seit Erstellung verworfener Elemente
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_reihenfolge() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn ueberlauf_verwirft_aeltestes() {
        let q = BoundedQueue::new(3);
        for i in 0..3 {
            assert!(!q.push(i));
        }
        assert!(q.push(3), "viertes Element muss das aelteste verdraengen");
        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.try_pop(), Some(1));
    }

    #[test]
    fn kapazitaet_128_plus_eins() {
        let q = BoundedQueue::new(128);
        for i in 0..129 {
            q.push(i);
        }
        assert_eq!(q.len(), 128);
        assert_eq!(q.dropped_count(), 1);
    }

    #[test]
    fn kapazitaet_null_wird_eins() {
        let q = BoundedQueue::new(0);
        assert_eq!(q.capacity(), 1);
        q.push('a');
        q.push('b');
        assert_eq!(q.try_pop(), Some('b'));
    }

    #[test]
    fn pop_timeout_leer_laeuft_ab() {
        let q: BoundedQueue<u8> = BoundedQueue::new(2);
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn pop_timeout_wird_geweckt() {
        let q = Arc::new(BoundedQueue::new(2));
        let q2 = Arc::clone(&q);
        let handle = std::thread::spawn(move || q2.pop_timeout(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        q.push(99u32);
        assert_eq!(handle.join().unwrap(), Some(99));
    }

    #[test]
    fn clear_leert_behaelt_zaehler() {
        let q = BoundedQueue::new(1);
        q.push(1);
        q.push(2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.dropped_count(), 1);
    }
}
