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

/* Candidate track selection for wireconn rules.
 *
 * A unidirectional wire enters a switchblock on the side where it is consumed
 * and leaves on the side where it is driven, so a source observed on the top or
 * right side runs towards decreasing coordinates and a destination there runs
 * towards increasing ones. */

use crate::arch::{Direction, Directionality, Side};
use crate::channel::{Channel, WireTypeId, group_of_wirepoint};
use crate::error::BuildError;

pub fn src_direction(side: Side, directionality: Directionality) -> Direction {
    match (directionality, side) {
        (Directionality::Bidirectional, _) => Direction::Bi,
        (Directionality::Unidirectional, Side::Top | Side::Right) => Direction::Dec,
        (Directionality::Unidirectional, Side::Bottom | Side::Left) => Direction::Inc,
    }
}

pub fn dest_direction(side: Side, directionality: Directionality) -> Direction {
    match (directionality, side) {
        (Directionality::Bidirectional, _) => Direction::Bi,
        (Directionality::Unidirectional, Side::Top | Side::Right) => Direction::Inc,
        (Directionality::Unidirectional, Side::Bottom | Side::Left) => Direction::Dec,
    }
}

/// Tracks of `chan` that one end of a wireconn rule may touch, as seen from
/// `side`, sorted by ascending index. `points` set to `None` accepts every
/// wirepoint. Wirepoints that do not exist for a type are ignored.
///
/// The position of a track in the returned list is what `t` binds to and the
/// list length is what `W` binds to.
pub fn candidate_tracks(
    chan: &Channel,
    side: Side,
    types: &[WireTypeId],
    points: Option<&[usize]>,
    direction: Direction
) -> Result<Vec<usize>, BuildError> {
    let mut tracks = Vec::new();

    for wire_type in types {
        let start = match chan.type_start_index(*wire_type) {
            Some(start) => start,
            None => continue,
        };

        match points {
            None => tracks.extend(chan.type_tracks(*wire_type, direction)),
            Some(points) => {
                let length = chan.track(start).length;
                for wirepoint in points.iter().filter(|wp| **wp < length) {
                    let group = group_of_wirepoint(*wirepoint, length, side);
                    tracks.extend(chan.group_tracks_of(*wire_type, group, direction)?);
                }
            },
        }
    }

    tracks.sort_unstable();
    tracks.dedup();

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelSet, ChanCoord, ChanType};
    use crate::testutil::*;

    fn unidir_set() -> ChannelSet {
        let arch = unidir_l4_arch(10, 10);
        ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap()
    }

    #[test]
    fn test_directions() {
        let uni = Directionality::Unidirectional;
        assert_eq!(src_direction(Side::Top, uni), Direction::Dec);
        assert_eq!(src_direction(Side::Left, uni), Direction::Inc);
        assert_eq!(dest_direction(Side::Right, uni), Direction::Inc);
        assert_eq!(dest_direction(Side::Bottom, uni), Direction::Dec);
        for side in Side::SIDES {
            assert_eq!(src_direction(side, Directionality::Bidirectional), Direction::Bi);
            assert_eq!(dest_direction(side, Directionality::Bidirectional), Direction::Bi);
            assert_ne!(src_direction(side, uni), dest_direction(side, uni));
        }
    }

    #[test]
    fn test_wirepoint_selection() {
        let set = unidir_set();
        /* Groups at CHANX(3, 3) are [2, 2, 3, 3] */
        let chan = set.channel(ChanCoord::new(ChanType::X, 3, 3)).unwrap();
        let l4 = [WireTypeId(0)];

        /* Seen from the left, group 3 is wirepoint 0 */
        assert_eq!(
            candidate_tracks(&chan, Side::Left, &l4, Some(&[0]), Direction::Inc),
            Ok(vec![2])
        );
        /* Seen from the right, group 2 is wirepoint 2 */
        assert_eq!(
            candidate_tracks(&chan, Side::Right, &l4, Some(&[0]), Direction::Dec),
            Ok(vec![])
        );
        assert_eq!(
            candidate_tracks(&chan, Side::Right, &l4, Some(&[2, 3]), Direction::Dec),
            Ok(vec![1, 3])
        );
        assert_eq!(
            candidate_tracks(&chan, Side::Right, &l4, None, Direction::Inc),
            Ok(vec![0, 2])
        );
    }

    #[test]
    fn test_out_of_range_wirepoints_are_ignored() {
        let set = unidir_set();
        let chan = set.channel(ChanCoord::new(ChanType::X, 3, 3)).unwrap();
        assert_eq!(
            candidate_tracks(&chan, Side::Left, &[WireTypeId(0)], Some(&[7, 0, 4]), Direction::Inc),
            Ok(vec![2])
        );
        /* Unknown to this channel */
        assert_eq!(
            candidate_tracks(&chan, Side::Left, &[WireTypeId(3)], None, Direction::Inc),
            Ok(vec![])
        );
    }

    #[test]
    fn test_candidates_are_sorted_and_unique() {
        let arch = mixed_unidir_arch(8, 8);
        let set = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types).unwrap();
        let chan = set.channel(ChanCoord::new(ChanType::Y, 2, 4)).unwrap();

        let tracks = candidate_tracks(
            &chan,
            Side::Top,
            &[WireTypeId(1), WireTypeId(0), WireTypeId(1)],
            Some(&[0, 1, 2, 1]),
            Direction::Inc
        ).unwrap();

        assert!(!tracks.is_empty());
        assert!(tracks.windows(2).all(|w| w[0] < w[1]));
        assert!(tracks.iter().all(|idx| chan.track(*idx).direction == Direction::Inc));
    }
}
