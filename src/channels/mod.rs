// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Channel sets and AOV layers (§3 "Channel set", "AOV layer").

use rustc_hash::FxHashSet;

use crate::shaders::AttributeHandler;

/// One addressable image channel. `Aov(n)` indexes into the render
/// context's AOV name table rather than duplicating names here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
    Z,
    DeepFront,
    DeepBack,
    Cutout,
    Aov(u32),
}

/// A sparse indexed set of image channels. A shader declares the channels
/// it consumes (`texture_channels`) and produces (`output_channels`); the
/// core unions these to size per-pixel buffers (§3 invariant: "channel sets
/// output by a material equal the union of channels output by all shaders
/// reachable from its outputs").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet(FxHashSet<Channel>);

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel) {
        self.0.insert(channel);
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains(&channel)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a ChannelSet>) -> Self {
        sets.into_iter().fold(Self::new(), |acc, s| acc.union(s))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merge modes for compositing a layer's value into the accumulated pixel
/// (§3 "AOV layer", §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize, serde::Deserialize)]
pub enum MergeMode {
    PremultUnder,
    Under,
    Plus,
    Min,
    Mid,
    Max,
}

impl MergeMode {
    /// Merges `src` (the new sample, with its own alpha in `src.w`) onto
    /// `dst` (the accumulator).
    pub fn merge(&self, dst: glam::Vec4, src: glam::Vec4) -> glam::Vec4 {
        match self {
            MergeMode::PremultUnder => src + dst * (1. - src.w),
            MergeMode::Under => {
                let rgb = src.truncate() * src.w + dst.truncate() * (1. - src.w);
                let a = src.w + dst.w * (1. - src.w);
                rgb.extend(a)
            }
            MergeMode::Plus => dst + src,
            MergeMode::Min => dst.min(src),
            MergeMode::Mid => (dst + src) * 0.5,
            MergeMode::Max => dst.max(src),
        }
    }
}

/// `(name, type tag, ordered output channels, merge mode, unpremult mode,
/// handler)` (§3). The handler reuses the attribute-token table (§4.3) since
/// an AOV is, semantically, "read this shader-context field into these
/// channels".
#[derive(Debug, Clone)]
pub struct AovLayer {
    pub name: String,
    pub channels: Vec<Channel>,
    pub merge_mode: MergeMode,
    pub unpremult: bool,
    pub handler: AttributeHandler,
}

/// The render context's table of active AOV layers. Names are matched
/// case-insensitively; an unknown name falls back to the attribute-handler
/// null, writing zero (§6 "AOV naming").
#[derive(Debug, Clone, Default)]
pub struct AovTable {
    layers: Vec<AovLayer>,
}

impl AovTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        channels: Vec<Channel>,
        merge_mode: MergeMode,
        unpremult: bool,
    ) {
        let name = name.into();
        let handler = AttributeHandler::from_name(&name).unwrap_or(AttributeHandler::Null);
        self.layers.push(AovLayer {
            name,
            channels,
            merge_mode,
            unpremult,
            handler,
        });
    }

    pub fn layers(&self) -> &[AovLayer] {
        &self.layers
    }

    pub fn channel_set(&self) -> ChannelSet {
        let mut set = ChannelSet::new();
        for layer in &self.layers {
            for c in &layer.channels {
                set.insert(*c);
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_commutative_in_membership() {
        let mut a = ChannelSet::new();
        a.insert(Channel::Red);
        let mut b = ChannelSet::new();
        b.insert(Channel::Alpha);
        let u = a.union(&b);
        assert!(u.contains(Channel::Red));
        assert!(u.contains(Channel::Alpha));
        assert_eq!(u.len(), 2);
    }

    #[test]
    fn under_merge_accumulates_alpha() {
        let dst = glam::Vec4::new(0., 0., 0., 0.);
        let src = glam::Vec4::new(1., 0., 0., 0.5);
        let out = MergeMode::Under.merge(dst, src);
        assert!((out.w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unknown_aov_name_falls_back_to_null_handler() {
        let mut table = AovTable::new();
        table.add("totally_unknown_thing", vec![Channel::Red], MergeMode::Plus, false);
        assert!(matches!(table.layers()[0].handler, AttributeHandler::Null));
    }
}
