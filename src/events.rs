//! Append-only event log and filtered queries over it
//!
//! Every event carries a sequence number equal to its position in the log.
//! Queries borrow the log, so a query always sees the history as it was when
//! the query was built, and can be iterated any number of times.

use crate::address::Address;
use crate::crypto::H256;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
}

/// A single decoded event argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventArg {
    Address(Address),
    Uint(u128),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventData {
    Transfer {
        from: Address,
        to: Address,
        amount: u128,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    /// Contract that emitted the event.
    pub emitter: Address,
    pub block_number: u64,
    pub transaction_hash: H256,
    /// Position of the event within its transaction.
    pub log_index: u32,
    pub data: EventData,
}

impl Event {
    pub fn transfer(
        emitter: Address,
        block_number: u64,
        transaction_hash: H256,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Self {
        Event {
            seq: 0,
            emitter,
            block_number,
            transaction_hash,
            log_index: 0,
            data: EventData::Transfer { from, to, amount },
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.data {
            EventData::Transfer { .. } => EventKind::Transfer,
        }
    }

    /// Arguments in declaration order.
    pub fn args(&self) -> Vec<EventArg> {
        match self.data {
            EventData::Transfer { from, to, amount } => vec![
                EventArg::Address(from),
                EventArg::Address(to),
                EventArg::Uint(amount),
            ],
        }
    }

    fn parties(&self) -> (Address, Address) {
        match self.data {
            EventData::Transfer { from, to, .. } => (from, to),
        }
    }
}

/// Conjunction of optional criteria. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kind: Option<EventKind>,
    emitter: Option<Address>,
    sender: Option<Address>,
    recipient: Option<Address>,
    involving: Option<Address>,
    blocks: Option<RangeInclusive<u64>>,
    since_seq: u64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn emitted_by(mut self, emitter: Address) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn sender(mut self, address: Address) -> Self {
        self.sender = Some(address);
        self
    }

    pub fn recipient(mut self, address: Address) -> Self {
        self.recipient = Some(address);
        self
    }

    /// Matches events where `address` is either party.
    pub fn involving(mut self, address: Address) -> Self {
        self.involving = Some(address);
        self
    }

    pub fn blocks(mut self, range: RangeInclusive<u64>) -> Self {
        self.blocks = Some(range);
        self
    }

    pub fn since_seq(mut self, seq: u64) -> Self {
        self.since_seq = seq;
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if event.seq < self.since_seq {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != event.kind()) {
            return false;
        }
        if self.emitter.is_some_and(|emitter| emitter != event.emitter) {
            return false;
        }
        if let Some(range) = &self.blocks {
            if !range.contains(&event.block_number) {
                return false;
            }
        }

        let (from, to) = event.parties();
        if self.sender.is_some_and(|sender| sender != from) {
            return false;
        }
        if self.recipient.is_some_and(|recipient| recipient != to) {
            return false;
        }
        if self.involving.is_some_and(|party| party != from && party != to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event`, stamping it with the next sequence number.
    pub fn append(&mut self, mut event: Event) -> &Event {
        event.seq = self.events.len() as u64;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn query(&self, filter: EventFilter) -> EventQuery<'_> {
        let start = usize::try_from(filter.since_seq)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        EventQuery {
            events: &self.events[start..],
            filter,
        }
    }

    pub fn get(&self, seq: u64) -> Option<&Event> {
        usize::try_from(seq).ok().and_then(|i| self.events.get(i))
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every event with `seq >= len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }
}

/// Rebuilds a log from events in order; sequence numbers are restamped.
impl FromIterator<Event> for EventLog {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut log = EventLog::new();
        for event in iter {
            log.append(event);
        }
        log
    }
}

/// Lazy view over the events matching a filter.
#[derive(Debug, Clone)]
pub struct EventQuery<'a> {
    events: &'a [Event],
    filter: EventFilter,
}

impl<'a> EventQuery<'a> {
    pub fn iter(&self) -> EventIter<'a, '_> {
        EventIter {
            inner: self.events.iter(),
            filter: &self.filter,
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.iter().cloned().collect()
    }
}

impl<'a, 'q> IntoIterator for &'q EventQuery<'a> {
    type Item = &'a Event;
    type IntoIter = EventIter<'a, 'q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct EventIter<'a, 'q> {
    inner: std::slice::Iter<'a, Event>,
    filter: &'q EventFilter,
}

impl<'a, 'q> Iterator for EventIter<'a, 'q> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.inner.by_ref().find(|event| filter.matches(event))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.inner.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn sample_log() -> EventLog {
        let token = addr(0xaa);
        let mut log = EventLog::new();
        log.append(Event::transfer(token, 2, H256([1; 32]), addr(1), addr(2), 50));
        log.append(Event::transfer(token, 3, H256([2; 32]), addr(2), addr(3), 20));
        log.append(Event::transfer(addr(0xbb), 4, H256([3; 32]), addr(1), addr(3), 5));
        log
    }

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let log = sample_log();
        let seqs: Vec<u64> = log.all().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(log.get(1).unwrap().block_number, 3);
        assert!(log.get(3).is_none());
    }

    #[test]
    fn test_args_are_ordered() {
        let log = sample_log();
        assert_eq!(
            log.get(0).unwrap().args(),
            vec![
                EventArg::Address(addr(1)),
                EventArg::Address(addr(2)),
                EventArg::Uint(50)
            ]
        );
        assert_eq!(log.get(0).unwrap().kind(), EventKind::Transfer);
    }

    #[test]
    fn test_filters() {
        let log = sample_log();
        let count = |filter: EventFilter| log.query(filter).iter().count();

        assert_eq!(count(EventFilter::new()), 3);
        assert_eq!(count(EventFilter::new().kind(EventKind::Transfer)), 3);
        assert_eq!(count(EventFilter::new().sender(addr(1))), 2);
        assert_eq!(count(EventFilter::new().recipient(addr(3))), 2);
        assert_eq!(count(EventFilter::new().involving(addr(2))), 2);
        assert_eq!(count(EventFilter::new().emitted_by(addr(0xaa))), 2);
        assert_eq!(count(EventFilter::new().blocks(3..=4)), 2);
        assert_eq!(count(EventFilter::new().since_seq(2)), 1);
        assert_eq!(count(EventFilter::new().since_seq(10)), 0);
        assert_eq!(
            count(EventFilter::new().sender(addr(1)).recipient(addr(3))),
            1
        );
    }

    #[test]
    fn test_query_is_restartable() {
        let log = sample_log();
        let query = log.query(EventFilter::new().involving(addr(3)));
        let first: Vec<u64> = query.iter().map(|e| e.seq).collect();
        let second: Vec<u64> = (&query).into_iter().map(|e| e.seq).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncate() {
        let mut log = sample_log();
        log.truncate(1);
        assert_eq!(log.len(), 1);
        let next = log.append(Event::transfer(addr(0xaa), 9, H256::ZERO, addr(4), addr(5), 1));
        assert_eq!(next.seq, 1);
    }
}
