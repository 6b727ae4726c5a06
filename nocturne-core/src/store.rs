//! Process-wide mix store: single writer, copy-on-write snapshots,
//! subscribe/notify.
//!
//! Every mutation runs under the write lock against a private copy and is
//! published as a fresh `Arc<MixState>`, so readers never observe a
//! half-applied change.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{Receiver, Sender};

use nocturne_types::{
    ActiveSound, MixError, MixState, SoundId, SoundRegistry, DEFAULT_VOLUME, MAX_ACTIVE_SOUNDS,
};

#[derive(Debug, Clone)]
pub enum StoreEvent {
    Changed(Arc<MixState>),
    /// Sounds turned away by the cap. The state did not take them.
    CapacityReached { rejected: Vec<SoundId> },
}

pub struct MixStore {
    state: RwLock<Arc<MixState>>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
    registry: SoundRegistry,
    default_volume: u8,
}

impl Default for MixStore {
    fn default() -> Self {
        Self::new(MixState::default(), DEFAULT_VOLUME)
    }
}

impl MixStore {
    pub fn new(initial: MixState, default_volume: u8) -> Self {
        Self {
            state: RwLock::new(Arc::new(initial)),
            subscribers: Mutex::new(Vec::new()),
            registry: SoundRegistry::new(),
            default_volume,
        }
    }

    /// Consistent view of the current state.
    pub fn snapshot(&self) -> Arc<MixState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn notify(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Apply `f` to a copy of the state and publish it if anything changed.
    pub fn update<R>(&self, f: impl FnOnce(&mut MixState) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = MixState::clone(&guard);
        let result = f(&mut next);
        if next != **guard {
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            drop(guard);
            log::debug!(target: "store", "mix now {} sound(s), paused={}", next.len(), next.paused);
            self.notify(StoreEvent::Changed(next));
        }
        result
    }

    /// Add a catalog sound at the default volume and resume playback.
    pub fn add_sound(&self, id: SoundId) -> Result<(), MixError> {
        if !self.registry.contains(id.as_str()) {
            return Err(MixError::UnknownSound(id));
        }
        let default_volume = self.default_volume;
        let result = self.update(|mix| {
            mix.add(id.clone(), default_volume)?;
            mix.paused = false;
            Ok(())
        });
        if let Err(MixError::CapacityExceeded { .. }) = &result {
            log::info!(target: "store", "rejected {}: mix is full", id);
            self.notify(StoreEvent::CapacityReached { rejected: vec![id] });
        }
        result
    }

    /// Remove a sound. Emptying the mix also pauses it. Returns whether the
    /// mix is now empty.
    pub fn remove_sound(&self, id: &str) -> Option<bool> {
        self.update(|mix| {
            mix.remove(id)?;
            if mix.is_empty() {
                mix.paused = true;
            }
            Some(mix.is_empty())
        })
    }

    pub fn set_volume(&self, id: &str, volume: u8) -> bool {
        self.update(|mix| mix.set_volume(id, volume))
    }

    pub fn set_master_volume(&self, volume: u8) {
        self.update(|mix| mix.set_master_volume(volume));
    }

    pub fn set_paused(&self, paused: bool) {
        self.update(|mix| mix.paused = paused);
    }

    /// Atomic bulk replace, e.g. loading a saved or shared mix.
    ///
    /// Unknown ids are dropped. Anything past the cap is truncated and
    /// reported through `CapacityReached`. Loading unpauses.
    pub fn set_mix(&self, sounds: Vec<ActiveSound>, mix_key: Option<String>) -> usize {
        let (known, unknown): (Vec<_>, Vec<_>) = sounds
            .into_iter()
            .partition(|s| self.registry.contains(s.id.as_str()));
        for s in &unknown {
            log::warn!(target: "store", "dropping unknown sound {} from loaded mix", s.id);
        }

        let rejected = self.update(move |mix| {
            let rejected = mix.replace(known);
            mix.paused = false;
            mix.current_mix_key = mix_key;
            rejected
        });
        let dropped = rejected.len();
        if dropped > 0 {
            log::warn!(target: "store", "loaded mix truncated to {} sounds", MAX_ACTIVE_SOUNDS);
            self.notify(StoreEvent::CapacityReached { rejected });
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &Receiver<StoreEvent>) -> Vec<StoreEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_add_notifies_and_unpauses() {
        let store = MixStore::default();
        store.set_paused(true);
        let rx = store.subscribe();
        store.add_sound(SoundId::new("crickets")).unwrap();

        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StoreEvent::Changed(state) => {
                assert!(!state.paused);
                assert_eq!(state.get("crickets").unwrap().volume, DEFAULT_VOLUME);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sound_rejected() {
        let store = MixStore::default();
        let rx = store.subscribe();
        assert_eq!(
            store.add_sound(SoundId::new("rain")),
            Err(MixError::UnknownSound(SoundId::new("rain")))
        );
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_full_mix_signals_capacity_without_change() {
        let store = MixStore::default();
        let ids: Vec<_> = SoundRegistry.all().iter().take(11).map(|d| d.sound_id()).collect();
        for id in &ids[..10] {
            store.add_sound(id.clone()).unwrap();
        }
        let before = store.snapshot();
        let rx = store.subscribe();

        let err = store.add_sound(ids[10].clone()).unwrap_err();
        assert_eq!(err, MixError::CapacityExceeded { limit: 10 });
        assert_eq!(*store.snapshot(), *before);

        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StoreEvent::CapacityReached { rejected } if rejected == &vec![ids[10].clone()]
        ));
    }

    #[test]
    fn test_removing_last_sound_pauses() {
        let store = MixStore::default();
        store.add_sound(SoundId::new("fireplace")).unwrap();
        assert_eq!(store.remove_sound("fireplace"), Some(true));
        assert!(store.snapshot().paused);
        assert_eq!(store.remove_sound("fireplace"), None);
    }

    #[test]
    fn test_no_change_no_event() {
        let store = MixStore::default();
        store.add_sound(SoundId::new("fireplace")).unwrap();
        let rx = store.subscribe();
        store.set_volume("fireplace", DEFAULT_VOLUME);
        assert!(!store.set_volume("missing", 10));
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_set_mix_truncates_with_signal() {
        let store = MixStore::default();
        let rx = store.subscribe();
        let mut sounds: Vec<ActiveSound> = SoundRegistry
            .all()
            .iter()
            .take(12)
            .map(|d| ActiveSound::new(d.id, 40))
            .collect();
        sounds.push(ActiveSound::new("not-in-catalog", 40));

        let dropped = store.set_mix(sounds, Some("custom".to_string()));
        assert_eq!(dropped, 2);
        let state = store.snapshot();
        assert_eq!(state.len(), 10);
        assert_eq!(state.current_mix_key.as_deref(), Some("custom"));

        let events = drain(&rx);
        assert!(matches!(&events[0], StoreEvent::Changed(_)));
        match &events[1] {
            StoreEvent::CapacityReached { rejected } => assert_eq!(rejected.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let store = MixStore::default();
        store.add_sound(SoundId::new("crickets")).unwrap();
        let old = store.snapshot();
        store.set_volume("crickets", 90);
        assert_eq!(old.get("crickets").unwrap().volume, DEFAULT_VOLUME);
        assert_eq!(store.snapshot().get("crickets").unwrap().volume, 90);
    }
}
