/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/* Channel and track geometry.
 *
 * The logic tile grid is `nx` by `ny`, surrounded by a ring of I/O tiles.
 * A tile owns the horizontal (X) channel above it and the vertical (Y) channel
 * to its right:
 *   CHANX exists at x in [1, nx], y in [0, ny] and its seg coordinate is x,
 *   CHANY exists at x in [0, nx], y in [1, ny] and its seg coordinate is y.
 *
 * Each track covers one segment of a physical wire of length L. Its group is
 * the position of that segment along the wire:
 *
 *      wirepoint:  0-------1-------2-------3-------0
 *          group:      0       1       2       3
 *
 * Sides observing the wire from the left/bottom see the wirepoint that
 * follows the segment, right/top sides see the one preceding it.
 */

use std::collections::HashMap;
use crate::arch::{Direction, Directionality, DeviceInfo, Side, WireTypeInfo};
use crate::error::BuildError;
#[allow(unused)]
use crate::log::*;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChanType {
    X,
    Y,
}

impl std::fmt::Display for ChanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChanType::X => write!(f, "CHANX"),
            ChanType::Y => write!(f, "CHANY"),
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChanCoord {
    pub chan_type: ChanType,
    pub x: usize,
    pub y: usize,
}

impl ChanCoord {
    pub fn new(chan_type: ChanType, x: usize, y: usize) -> Self {
        Self { chan_type, x, y }
    }

    /* Coordinate along the channel */
    pub fn seg(&self) -> usize {
        match self.chan_type {
            ChanType::X => self.x,
            ChanType::Y => self.y,
        }
    }

    /* Coordinate across the channel */
    pub fn cross(&self) -> usize {
        match self.chan_type {
            ChanType::X => self.y,
            ChanType::Y => self.x,
        }
    }
}

impl std::fmt::Display for ChanCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.chan_type, self.x, self.y)
    }
}

/// Resolves the channel seen by `side` of the switchblock of tile `(x, y)`.
pub fn side_channel_coord(x: usize, y: usize, side: Side) -> ChanCoord {
    match side {
        /* Y-channel of the tile above */
        Side::Top => ChanCoord::new(ChanType::Y, x, y + 1),
        /* X-channel of the tile to the right */
        Side::Right => ChanCoord::new(ChanType::X, x + 1, y),
        /* Y-channel to the right of this tile */
        Side::Bottom => ChanCoord::new(ChanType::Y, x, y),
        /* X-channel above this tile */
        Side::Left => ChanCoord::new(ChanType::X, x, y),
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WireTypeId(pub usize);

/* Handle of a track in the `ChannelSet` arena */
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrackId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub wire_type: WireTypeId,
    pub length: usize,
    /// Index within the channel
    pub index: usize,
    pub direction: Direction,
    /// First and last seg coordinate covered by the physical wire
    pub seg_start: usize,
    pub seg_end: usize,
    /// Index range of this track's wire type in the channel (end exclusive)
    pub type_start: usize,
    pub type_end: usize,
}

impl Track {
    /// Group of this track at `seg_coord` in a channel whose seg coordinate
    /// runs from 1 to `max_seg`.
    pub fn group_at(&self, seg_coord: usize, max_seg: usize) -> Result<usize, BuildError> {
        const MIN_SEG: usize = 1;

        let seg_coord = seg_coord as isize;
        let length = self.length as isize;

        /* A wire truncated by the low edge is measured from its end instead. One
         * truncated at both edges spans the whole device. */
        let group = if self.seg_start != MIN_SEG {
            seg_coord - self.seg_start as isize
        } else if self.seg_end != max_seg {
            (length - 1) - (self.seg_end as isize - seg_coord)
        } else {
            0
        };

        if group < 0 || group >= length {
            return Err(BuildError::InternalConsistency(format!(
                "track {} (seg {}..{}, L={}) has invalid group {} at seg {}",
                self.index, self.seg_start, self.seg_end, self.length, group, seg_coord
            )));
        }

        Ok(group as usize)
    }
}

/// Wirepoint of a track in `group` as observed from `side`.
pub fn wirepoint_of(group: usize, length: usize, side: Side) -> usize {
    if side.is_low() {
        (group + 1) % length
    } else {
        group
    }
}

/// Inverse of `wirepoint_of`. `wirepoint` must be lower than `length`.
pub fn group_of_wirepoint(wirepoint: usize, length: usize, side: Side) -> usize {
    if side.is_low() {
        (wirepoint + length - 1) % length
    } else {
        wirepoint
    }
}

/// Number of tracks of each wire type in a channel of `channel_width` tracks.
///
/// Tracks are handed out in units (single tracks for bidirectional, INC/DEC
/// pairs for unidirectional architectures) to whichever type currently has the
/// largest remaining demand, which yields a largest-remainder apportionment by
/// frequency. Ties go to the type listed first.
pub fn type_track_counts(
    channel_width: usize,
    wire_types: &[WireTypeInfo],
    directionality: Directionality
) -> Result<Vec<usize>, BuildError> {
    let dir_fac = directionality.dir_factor();
    if channel_width % dir_fac != 0 {
        return Err(BuildError::ConfigMismatch(format!(
            "channel width {} is not a multiple of {} required by a {} architecture",
            channel_width, dir_fac, directionality
        )));
    }

    let units = channel_width / dir_fac;
    let freq_sum: usize = wire_types.iter().map(|wt| wt.frequency).sum();
    if units > 0 && freq_sum == 0 {
        return Err(BuildError::ConfigMismatch(
            "wire type frequencies add up to zero".into()
        ));
    }

    let mut counts = vec![0; wire_types.len()];
    let mut demand: Vec<i64> = wire_types.iter()
        .map(|wt| (units * wt.frequency) as i64)
        .collect();
    let reduce = freq_sum as i64;

    for _ in 0 .. units {
        let imax = demand.iter()
            .enumerate()
            .fold(0, |best, (idx, d)| if *d > demand[best] { idx } else { best });
        demand[imax] -= reduce;
        counts[imax] += 1;
    }

    Ok(counts.into_iter().map(|units| units * dir_fac).collect())
}

/// All tracks of a device. Tracks are stored in a single arena, channel by
/// channel; every valid channel coordinate maps to the handle of its first
/// track.
#[derive(Debug)]
pub struct ChannelSet {
    nx: usize,
    ny: usize,
    width: usize,
    tracks: Vec<Track>,
    index: HashMap<ChanCoord, TrackId>,
}

impl ChannelSet {
    pub fn build(
        device: &DeviceInfo,
        directionality: Directionality,
        wire_types: &[WireTypeInfo]
    ) -> Result<Self, BuildError> {
        if device.width == 0 || device.height == 0 {
            return Err(BuildError::ConfigMismatch(format!(
                "device of size {}x{} has no tiles", device.width, device.height
            )));
        }
        if let Some(wt) = wire_types.iter().find(|wt| wt.length == 0) {
            return Err(BuildError::ConfigMismatch(
                format!("wire type {} has zero length", wt.name)
            ));
        }

        let counts = type_track_counts(device.channel_width, wire_types, directionality)?;
        let dir_fac = directionality.dir_factor();

        let mut me = Self {
            nx: device.width,
            ny: device.height,
            width: device.channel_width,
            tracks: Vec::new(),
            index: HashMap::new(),
        };

        for chan_type in [ChanType::X, ChanType::Y] {
            for x in 0 ..= me.nx + 1 {
                for y in 0 ..= me.ny + 1 {
                    let coord = ChanCoord::new(chan_type, x, y);
                    if !me.coord_in_bounds(coord) {
                        continue;
                    }
                    me.index.insert(coord, TrackId(me.tracks.len()));
                    let max_seg = me.max_seg(chan_type);
                    me.push_channel_tracks(coord, max_seg, wire_types, &counts, directionality, dir_fac);
                }
            }
        }

        dbg_log!(
            DBG_INFO,
            "Built {} channels, {} tracks each (per type: {:?})",
            me.index.len(), me.width, counts
        );

        Ok(me)
    }

    fn push_channel_tracks(
        &mut self,
        coord: ChanCoord,
        max_seg: usize,
        wire_types: &[WireTypeInfo],
        counts: &[usize],
        directionality: Directionality,
        dir_fac: usize
    ) {
        let seg = coord.seg() as isize;
        let mut type_start = 0;

        for (type_idx, (wt, count)) in wire_types.iter().zip(counts).enumerate() {
            let length = wt.length as isize;
            let type_end = type_start + count;

            for rel in 0 .. *count {
                let wire = rel / dir_fac;
                let direction = match directionality {
                    Directionality::Bidirectional => Direction::Bi,
                    Directionality::Unidirectional if rel % 2 == 0 => Direction::Inc,
                    Directionality::Unidirectional => Direction::Dec,
                };
                /* Stagger physical wires so that their starting points depend on x + y */
                let offset = (wire % wt.length) as isize;
                let phase = (seg + coord.cross() as isize + offset) % length;
                let start = seg - phase;
                let end = start + length - 1;

                self.tracks.push(Track {
                    wire_type: WireTypeId(type_idx),
                    length: wt.length,
                    index: type_start + rel,
                    direction,
                    seg_start: start.max(1) as usize,
                    seg_end: end.min(max_seg as isize) as usize,
                    type_start,
                    type_end,
                });
            }

            type_start = type_end;
        }
    }

    pub fn channel_width(&self) -> usize {
        self.width
    }

    pub fn device_size(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn max_seg(&self, chan_type: ChanType) -> usize {
        match chan_type {
            ChanType::X => self.nx,
            ChanType::Y => self.ny,
        }
    }

    pub fn coord_in_bounds(&self, coord: ChanCoord) -> bool {
        match coord.chan_type {
            /* There is no X-channel at x = 0 */
            ChanType::X => coord.x >= 1 && coord.x <= self.nx && coord.y <= self.ny,
            /* There is no Y-channel at y = 0 */
            ChanType::Y => coord.x <= self.nx && coord.y >= 1 && coord.y <= self.ny,
        }
    }

    pub fn channel<'s>(&'s self, coord: ChanCoord) -> Option<Channel<'s>> {
        let first = *self.index.get(&coord)?;
        Some(Channel {
            coord,
            max_seg: self.max_seg(coord.chan_type),
            first,
            tracks: &self.tracks[first.0 .. first.0 + self.width],
        })
    }

    pub fn channel_at_side<'s>(&'s self, x: usize, y: usize, side: Side) -> Option<Channel<'s>> {
        self.channel(side_channel_coord(x, y, side))
    }

    pub fn track<'s>(&'s self, id: TrackId) -> &'s Track {
        &self.tracks[id.0]
    }

    pub fn channel_count(&self) -> usize {
        self.index.len()
    }
}

/// A view of the tracks of one channel.
#[derive(Clone, Copy)]
pub struct Channel<'c> {
    pub coord: ChanCoord,
    pub max_seg: usize,
    first: TrackId,
    tracks: &'c [Track],
}

impl<'c> Channel<'c> {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, idx: usize) -> &'c Track {
        &self.tracks[idx]
    }

    pub fn tracks(&self) -> &'c [Track] {
        self.tracks
    }

    pub fn track_id(&self, idx: usize) -> TrackId {
        TrackId(self.first.0 + idx)
    }

    pub fn group_of(&self, idx: usize) -> Result<usize, BuildError> {
        self.tracks[idx].group_at(self.coord.seg(), self.max_seg)
    }

    pub fn wirepoint_of(&self, idx: usize, side: Side) -> Result<usize, BuildError> {
        let group = self.group_of(idx)?;
        Ok(wirepoint_of(group, self.tracks[idx].length, side))
    }

    /// Index of the first track of `wire_type`, if the type has any tracks here.
    pub fn type_start_index(&self, wire_type: WireTypeId) -> Option<usize> {
        let mut idx = 0;
        while idx < self.tracks.len() {
            let track = &self.tracks[idx];
            if track.wire_type == wire_type {
                return Some(idx);
            }
            idx = track.type_end;
        }
        None
    }

    pub fn type_tracks(&self, wire_type: WireTypeId, direction: Direction) -> Vec<usize> {
        let start = match self.type_start_index(wire_type) {
            Some(start) => start,
            None => return Vec::new(),
        };
        (start .. self.tracks[start].type_end)
            .filter(|idx| self.tracks[*idx].direction == direction)
            .collect()
    }

    /// Tracks of `wire_type` in `group` heading in `direction`. In a regular
    /// layout consecutive results are `length * (1 or 2)` tracks apart.
    pub fn group_tracks_of(
        &self,
        wire_type: WireTypeId,
        group: usize,
        direction: Direction
    ) -> Result<Vec<usize>, BuildError> {
        let mut tracks = Vec::new();
        for idx in self.type_tracks(wire_type, direction) {
            if self.group_of(idx)? == group {
                tracks.push(idx);
            }
        }
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use assert_matches::assert_matches;

    fn track(seg_start: usize, seg_end: usize, length: usize) -> Track {
        Track {
            wire_type: WireTypeId(0),
            length,
            index: 0,
            direction: Direction::Bi,
            seg_start,
            seg_end,
            type_start: 0,
            type_end: 1,
        }
    }

    #[test]
    fn test_track_counts_follow_frequency() {
        let types = vec![wire_type("A", 4, 3), wire_type("B", 2, 1)];
        assert_eq!(type_track_counts(8, &types, Directionality::Bidirectional), Ok(vec![6, 2]));
        assert_eq!(type_track_counts(8, &types, Directionality::Unidirectional), Ok(vec![6, 2]));

        let even = vec![wire_type("A", 4, 1), wire_type("B", 2, 1)];
        assert_eq!(type_track_counts(12, &even, Directionality::Unidirectional), Ok(vec![6, 6]));
        /* Odd unit count: the tie goes to the first type */
        assert_eq!(type_track_counts(6, &even, Directionality::Unidirectional), Ok(vec![4, 2]));
    }

    #[test]
    fn test_track_counts_reject_odd_unidir_width() {
        let types = vec![wire_type("A", 4, 1)];
        assert_matches!(
            type_track_counts(5, &types, Directionality::Unidirectional),
            Err(BuildError::ConfigMismatch(_))
        );
    }

    #[test]
    fn test_group_of_track() {
        /* Not truncated: distance from start */
        assert_eq!(track(5, 8, 4).group_at(7, 10), Ok(2));
        /* Truncated by the low edge: measured from the end */
        assert_eq!(track(1, 2, 4).group_at(1, 10), Ok(2));
        assert_eq!(track(1, 4, 4).group_at(1, 10), Ok(0));
        /* Truncated by the high edge: start is still valid */
        assert_eq!(track(9, 10, 4).group_at(10, 10), Ok(1));
        /* Spans the whole channel */
        assert_eq!(track(1, 3, 4).group_at(2, 3), Ok(0));
    }

    #[test]
    fn test_negative_group_is_fatal() {
        assert_matches!(track(6, 9, 4).group_at(5, 10), Err(BuildError::InternalConsistency(_)));
        assert_matches!(track(2, 9, 4).group_at(8, 10), Err(BuildError::InternalConsistency(_)));
    }

    #[test]
    fn test_wirepoint_side_asymmetry() {
        assert_eq!(wirepoint_of(3, 4, Side::Left), 0);
        assert_eq!(wirepoint_of(3, 4, Side::Bottom), 0);
        assert_eq!(wirepoint_of(3, 4, Side::Right), 3);
        assert_eq!(wirepoint_of(3, 4, Side::Top), 3);
        assert_eq!(wirepoint_of(0, 1, Side::Left), 0);

        for side in Side::SIDES {
            for length in 1 .. 6 {
                for group in 0 .. length {
                    let wp = wirepoint_of(group, length, side);
                    assert!(wp < length);
                    assert_eq!(group_of_wirepoint(wp, length, side), group);
                }
            }
        }
    }

    #[test]
    fn test_channel_bounds() {
        let arch = single_type_arch(Directionality::Unidirectional, "L4", 4, 4, 5, 6);
        let set = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap();

        assert_eq!(set.device_size(), (5, 6));
        assert!(set.channel(ChanCoord::new(ChanType::X, 0, 3)).is_none());
        assert!(set.channel(ChanCoord::new(ChanType::X, 6, 3)).is_none());
        assert!(set.channel(ChanCoord::new(ChanType::X, 5, 6)).is_some());
        assert!(set.channel(ChanCoord::new(ChanType::X, 1, 0)).is_some());
        assert!(set.channel(ChanCoord::new(ChanType::Y, 0, 1)).is_some());
        assert!(set.channel(ChanCoord::new(ChanType::Y, 3, 0)).is_none());
        assert!(set.channel(ChanCoord::new(ChanType::Y, 3, 7)).is_none());
        /* (5 * 7) X channels and (6 * 6) Y channels */
        assert_eq!(set.channel_count(), 35 + 36);

        /* Right side of the rightmost tile has no channel */
        assert!(set.channel_at_side(5, 2, Side::Right).is_none());
        assert!(set.channel_at_side(4, 2, Side::Right).is_some());
        assert!(set.channel_at_side(2, 0, Side::Bottom).is_none());
        assert!(set.channel_at_side(2, 6, Side::Top).is_none());
    }

    #[test]
    fn test_unidir_layout() {
        let arch = single_type_arch(Directionality::Unidirectional, "L4", 4, 4, 10, 10);
        let set = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap();
        let chan = set.channel(ChanCoord::new(ChanType::X, 3, 3)).unwrap();

        let dirs: Vec<_> = chan.tracks().iter().map(|t| t.direction).collect();
        assert_eq!(dirs, vec![Direction::Inc, Direction::Dec, Direction::Inc, Direction::Dec]);

        /* phase = (seg + cross + wire) % L */
        let groups: Vec<_> = (0 .. chan.len()).map(|i| chan.group_of(i).unwrap()).collect();
        assert_eq!(groups, vec![2, 2, 3, 3]);

        assert_eq!(chan.wirepoint_of(2, Side::Left), Ok(0));
        assert_eq!(chan.wirepoint_of(2, Side::Right), Ok(3));
        assert_eq!(set.track(chan.track_id(3)), chan.track(3));
    }

    #[test]
    fn test_groups_advance_along_channel() {
        let arch = single_type_arch(Directionality::Bidirectional, "L4", 4, 8, 9, 9);
        let set = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap();

        for x in 1 ..= 9 {
            let chan = set.channel(ChanCoord::new(ChanType::X, x, 2)).unwrap();
            for idx in 0 .. chan.len() {
                assert_eq!(chan.group_of(idx).unwrap(), (x + 2 + idx % 4) % 4);
            }
        }
    }

    #[test]
    fn test_type_and_group_lookup() {
        let mut arch = single_type_arch(Directionality::Bidirectional, "L4", 4, 8, 6, 6);
        arch.wire_types.insert(0, wire_type("L1", 1, 1));
        arch.device.channel_width = 12;
        let set = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap();
        let chan = set.channel(ChanCoord::new(ChanType::X, 1, 0)).unwrap();

        assert_eq!(chan.type_start_index(WireTypeId(0)), Some(0));
        assert_eq!(chan.type_start_index(WireTypeId(1)), Some(6));
        assert_eq!(chan.type_start_index(WireTypeId(2)), None);

        /* L4 tracks at seg 1, cross 0: groups 1, 2, 3, 0, 1, 2 */
        assert_eq!(chan.group_tracks_of(WireTypeId(1), 1, Direction::Bi), Ok(vec![6, 10]));
        assert_eq!(chan.group_tracks_of(WireTypeId(1), 0, Direction::Bi), Ok(vec![9]));
        assert_eq!(chan.group_tracks_of(WireTypeId(1), 1, Direction::Inc), Ok(vec![]));
        /* L1 wires are always in group 0 */
        assert_eq!(chan.type_tracks(WireTypeId(0), Direction::Bi), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(chan.group_tracks_of(WireTypeId(0), 0, Direction::Bi), Ok(vec![0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_build_rejects_bad_devices() {
        let mut arch = single_type_arch(Directionality::Bidirectional, "L4", 4, 8, 6, 6);
        arch.device.width = 0;
        assert_matches!(
            ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types),
            Err(BuildError::ConfigMismatch(_))
        );

        let mut arch = single_type_arch(Directionality::Bidirectional, "L0", 0, 8, 6, 6);
        arch.device.width = 3;
        assert_matches!(
            ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types),
            Err(BuildError::ConfigMismatch(_))
        );
    }
}
