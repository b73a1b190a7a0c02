/*!
 * Publish/Subscribe Registry
 *
 * A fixed list of channels with one byte of subscriber state per channel.
 * Bit `n` of a channel's byte is set while subscriber slot `n` listens to
 * it. Slot ownership and message delivery belong to the transport.
 */

use crate::error::{Error, Result};
use crate::protocol::{write_array_len, write_bulk};
use bytes::{Bytes, BytesMut};
use smol_str::SmolStr;

/// Subscriber slot: one bit of a channel's subscription byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(u8);

impl Slot {
    /// Number of distinct subscriber slots
    pub const COUNT: usize = u8::BITS as usize;

    pub fn new(n: usize) -> Option<Slot> {
        (n < Self::COUNT).then_some(Slot(n as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn bit(self) -> u8 {
        1 << self.0
    }
}

/// Set of slots subscribed to a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subscribers(u8);

impl Subscribers {
    pub fn contains(self, slot: Slot) -> bool {
        self.0 & slot.bit() != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Slot> {
        (0..Slot::COUNT as u8)
            .map(Slot)
            .filter(move |s| self.contains(*s))
    }
}

/// A message accepted by PUBLISH, waiting for delivery
#[derive(Debug, Clone)]
pub struct Publication {
    pub channel: SmolStr,
    pub payload: Bytes,
    pub subscribers: Subscribers,
}

impl Publication {
    /// Push frame sent to each subscriber: `*3 message <channel> <payload>`
    pub fn encode(&self, out: &mut BytesMut) {
        write_array_len(3, out);
        write_bulk(b"message", out);
        write_bulk(self.channel.as_bytes(), out);
        write_bulk(&self.payload, out);
    }
}

pub struct PubSub {
    channels: Vec<SmolStr>,
    subscriptions: Vec<u8>,
}

impl PubSub {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let channels: Vec<SmolStr> = channels.into_iter().map(Into::into).collect();
        let subscriptions = vec![0; channels.len()];
        Self {
            channels,
            subscriptions,
        }
    }

    pub fn channels(&self) -> &[SmolStr] {
        &self.channels
    }

    pub fn channel_index(&self, name: &[u8]) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c.as_bytes() == name)
            .ok_or(Error::ChannelNotFound)
    }

    /// Set `slot`'s bit on `channel`
    ///
    /// # Panics
    /// When `channel` is not an index returned by `channel_index`.
    pub fn subscribe(&mut self, channel: usize, slot: Slot) {
        self.subscriptions[channel] |= slot.bit();
    }

    /// Clear `slot`'s bit on `channel`
    ///
    /// # Panics
    /// When `channel` is not an index returned by `channel_index`.
    pub fn unsubscribe(&mut self, channel: usize, slot: Slot) {
        self.subscriptions[channel] &= !slot.bit();
    }

    /// Drop `slot` from every channel, e.g. when its connection closes
    pub fn unsubscribe_all(&mut self, slot: Slot) {
        for bits in &mut self.subscriptions {
            *bits &= !slot.bit();
        }
    }

    /// # Panics
    /// When `channel` is not an index returned by `channel_index`.
    pub fn subscribers_of(&self, channel: usize) -> Subscribers {
        Subscribers(self.subscriptions[channel])
    }
}
