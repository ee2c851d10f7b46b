use serialmux_frame::MAX_DATA_LEN;

use crate::control::{pack_name, ChannelName, CHANNEL_NAME_MAX_LEN};

/// Subscriber callback: receives each payload arriving on the channel.
/// Host state travels in the closure capture.
pub type ChannelCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Session event hook, fired on transitions into Synced or Unsynced.
pub type EventCallback = Box<dyn FnMut() + Send>;

/// A publish-side channel entry: wire-form name plus fixed payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxChannel {
    pub name: ChannelName,
    pub dlc: u8,
}

impl TxChannel {
    const EMPTY: TxChannel = TxChannel {
        name: [0; CHANNEL_NAME_MAX_LEN],
        dlc: 0,
    };
}

/// The publish-side channel table.
///
/// Append-only: entries are never removed or reused, so an entry's index
/// is stable and `index + 1` is the channel id peers address it by.
#[derive(Debug)]
pub struct TxChannelTable<const N: usize> {
    channels: [TxChannel; N],
    count: u8,
}

impl<const N: usize> TxChannelTable<N> {
    pub fn new() -> Self {
        Self {
            channels: [TxChannel::EMPTY; N],
            count: 0,
        }
    }

    /// Create a publish channel and return its 1-based id, or 0 if the
    /// name is empty, the DLC is outside 1..=32, or the table is full.
    /// Duplicate names are accepted; lookups return the first match.
    pub fn create(&mut self, name: &str, dlc: u8) -> u8 {
        if name.is_empty()
            || dlc == 0
            || usize::from(dlc) > MAX_DATA_LEN
            || usize::from(self.count) >= N
        {
            return 0;
        }

        self.channels[usize::from(self.count)] = TxChannel {
            name: pack_name(name),
            dlc,
        };
        self.count += 1;
        self.count
    }

    /// Find a channel by wire-form name. Returns the 1-based id of the
    /// first match, or 0 if no created entry carries the name.
    pub fn lookup(&self, name: &ChannelName) -> u8 {
        for index in 0..usize::from(self.count) {
            if self.channels[index].name == *name {
                return (index + 1) as u8;
            }
        }
        0
    }

    /// The DLC of a channel id, or 0 for ids outside the created range.
    pub fn dlc_of(&self, channel: u8) -> u8 {
        if channel == 0 || channel > self.count {
            return 0;
        }
        self.channels[usize::from(channel) - 1].dlc
    }

    /// Number of created publish channels.
    pub fn len(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<const N: usize> Default for TxChannelTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The subscribe-side table: one callback slot per remote channel id.
///
/// Slots are filled when the remote peer acknowledges a subscription and
/// stay bound for the life of the session (there is no unsubscribe).
pub struct RxChannelTable<const N: usize> {
    slots: [Option<ChannelCallback>; N],
    count: u8,
}

impl<const N: usize> RxChannelTable<N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            count: 0,
        }
    }

    /// Bind a callback to a 0-based channel index. Rebinding an occupied
    /// slot replaces the callback without growing the count.
    pub fn bind(&mut self, index: usize, callback: ChannelCallback) {
        if index >= N {
            return;
        }
        if self.slots[index].is_none() {
            self.count += 1;
        }
        self.slots[index] = Some(callback);
    }

    /// Deliver a payload to the slot's callback. Returns false if the
    /// slot is empty or out of range (the frame is dropped).
    pub fn dispatch(&mut self, index: usize, payload: &[u8]) -> bool {
        match self.slots.get_mut(index) {
            Some(Some(callback)) => {
                callback(payload);
                true
            }
            _ => false,
        }
    }

    /// Number of bound subscribe slots.
    pub fn len(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<const N: usize> Default for RxChannelTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription awaiting the remote peer's acknowledgement.
pub struct PendingSubscription {
    pub name: ChannelName,
    pub callback: ChannelCallback,
}

/// Host-requested subscriptions that have not yet been bound.
///
/// Entries enter on `subscribe`, are announced to the peer on every
/// pending drain, and leave only when an acknowledgement names a known
/// remote channel. Slots cleared by resolution are reused.
pub struct PendingTable<const N: usize> {
    slots: [Option<PendingSubscription>; N],
}

impl<const N: usize> PendingTable<N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Queue a subscription in the first free slot. Returns false when
    /// the table is full.
    pub fn push(&mut self, name: ChannelName, callback: ChannelCallback) -> bool {
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(PendingSubscription { name, callback });
                return true;
            }
        }
        false
    }

    /// Index of the first pending entry with the given name.
    pub fn position(&self, name: &ChannelName) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(entry) if entry.name == *name))
    }

    /// Remove and return the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<PendingSubscription> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Names of all pending entries, in table order.
    pub fn names(&self) -> impl Iterator<Item = ChannelName> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|entry| entry.name))
    }

    /// Number of pending entries.
    pub fn len(&self) -> u8 {
        self.slots.iter().filter(|slot| slot.is_some()).count() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl<const N: usize> Default for PendingTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_returns_sequential_ids_and_lookup_finds_them() {
        let mut table: TxChannelTable<5> = TxChannelTable::new();

        for expected in 1..=5u8 {
            assert_eq!(table.len(), expected - 1);
            let id = table.create(&format!("CH{expected}"), 4);
            assert_eq!(id, expected);
            assert_eq!(table.lookup(&pack_name(&format!("CH{expected}"))), expected);
        }
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn create_rejects_invalid_arguments() {
        let mut table: TxChannelTable<2> = TxChannelTable::new();

        assert_eq!(table.create("", 1), 0);
        assert_eq!(table.create("TEST", 0), 0);
        assert_eq!(table.create("TEST", (MAX_DATA_LEN + 1) as u8), 0);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn create_rejects_when_full() {
        let mut table: TxChannelTable<2> = TxChannelTable::new();
        assert_eq!(table.create("A", 1), 1);
        assert_eq!(table.create("B", 1), 2);
        assert_eq!(table.create("C", 1), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_names_accepted_first_match_wins() {
        let mut table: TxChannelTable<3> = TxChannelTable::new();
        assert_eq!(table.create("TEST", 8), 1);
        assert_eq!(table.create("TEST", 8), 2);
        assert_eq!(table.lookup(&pack_name("TEST")), 1);
    }

    #[test]
    fn lookup_misses_return_zero() {
        let mut table: TxChannelTable<2> = TxChannelTable::new();
        table.create("A", 1);
        assert_eq!(table.lookup(&pack_name("MISSING")), 0);
        assert_eq!(table.lookup(&pack_name("")), 0);
    }

    #[test]
    fn dlc_of_bounds() {
        let mut table: TxChannelTable<2> = TxChannelTable::new();
        table.create("A", 7);
        assert_eq!(table.dlc_of(1), 7);
        assert_eq!(table.dlc_of(0), 0);
        assert_eq!(table.dlc_of(2), 0);
        assert_eq!(table.dlc_of(200), 0);
    }

    #[test]
    fn rx_table_counts_only_new_bindings() {
        let mut table: RxChannelTable<3> = RxChannelTable::new();
        table.bind(0, Box::new(|_| {}));
        assert_eq!(table.len(), 1);
        table.bind(0, Box::new(|_| {}));
        assert_eq!(table.len(), 1);
        table.bind(2, Box::new(|_| {}));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rx_dispatch_hits_bound_slot_only() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let mut table: RxChannelTable<2> = RxChannelTable::new();
        let counter = Arc::clone(&hits);
        table.bind(1, Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!table.dispatch(0, &[1]));
        assert!(table.dispatch(1, &[1]));
        assert!(!table.dispatch(5, &[1]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_table_fills_first_free_slot() {
        let mut table: PendingTable<2> = PendingTable::new();
        assert!(table.push(pack_name("A"), Box::new(|_| {})));
        assert!(table.push(pack_name("B"), Box::new(|_| {})));
        assert!(!table.push(pack_name("C"), Box::new(|_| {})));
        assert_eq!(table.len(), 2);

        let index = table.position(&pack_name("A")).unwrap();
        assert!(table.remove(index).is_some());
        assert_eq!(table.len(), 1);

        // Freed slot is reused.
        assert!(table.push(pack_name("C"), Box::new(|_| {})));
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec![pack_name("C"), pack_name("B")]);
    }

    #[test]
    fn pending_position_matches_by_name() {
        let mut table: PendingTable<2> = PendingTable::new();
        table.push(pack_name("SPEED"), Box::new(|_| {}));
        assert_eq!(table.position(&pack_name("SPEED")), Some(0));
        assert_eq!(table.position(&pack_name("OTHER")), None);
    }
}
