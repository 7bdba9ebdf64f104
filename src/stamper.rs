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

/* Periodic stamping of switchblock connections.
 *
 * Track groups depend only on (x + y) modulo the wire length, so away from the
 * device edges the connections of a tile repeat with the lcm of the lengths
 * of all connected wire types along the taxicab distance. A reference strip of
 * one period is computed at row 1 and every other interior tile is copied from
 * the strip tile at the same distance modulo the period:
 *
 *   y
 *   ^  E E E E E E E
 *   |  E c c c c c E      E - edge tile, computed
 *   |  E c c c c c E      R - reference tile, computed
 *   |  E R R R c c E      c - copied from R at 1 + (x - 1 + y - 1) % P
 *   |  E E E E E E E
 *   +-----------------> x
 */

use crate::common::lcm;
use crate::error::BuildError;
use crate::switchblock::{BuildContext, ConnectionMap, SwitchblockBuilder};
#[allow(unused)]
use crate::log::*;

/* lcm of the lengths of every (from type, to type) pair of every rule */
fn rule_pair_lcms<'c>(ctx: &'c BuildContext) -> impl Iterator<Item = usize> + 'c {
    ctx.switchblocks.iter()
        .flat_map(|sb| sb.wireconns.iter())
        .flat_map(move |wc| {
            wc.from_types.iter().flat_map(move |from| {
                wc.to_types.iter()
                    .map(move |to| lcm(ctx.wire_length(*from), ctx.wire_length(*to)))
            })
        })
}

/// Largest lcm of the lengths of two wire types connected by a rule, 0 if
/// there are no rules.
pub fn max_lcm(ctx: &BuildContext) -> usize {
    rule_pair_lcms(ctx).max().unwrap_or(0)
}

/// Period of the connection pattern, 0 if there are no rules.
pub fn stamp_period(ctx: &BuildContext) -> usize {
    rule_pair_lcms(ctx).reduce(lcm).unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampPlan {
    pub period: usize,
    nx: usize,
    ny: usize,
}

impl StampPlan {
    pub const REF_Y: usize = 1;

    /// Returns `None` when the device is too small to hold a reference strip
    /// away from its edges, or a wire spans it end to end.
    pub fn new(ctx: &BuildContext) -> Option<Self> {
        let period = stamp_period(ctx);
        let (nx, ny) = (ctx.device.width, ctx.device.height);

        if period == 0 {
            dbg_log!(DBG_INFO, "No wireconn rules, stamping disabled");
            return None;
        }
        let longest = ctx.wire_types.iter().map(|wt| wt.length).max().unwrap_or(0);
        if nx < period + 1 || ny < 2 || longest >= nx.min(ny) {
            dbg_log!(
                DBG_INFO,
                "Device {}x{} can't be stamped with period {} (longest wire {})",
                nx, ny, period, longest
            );
            return None;
        }

        dbg_log!(DBG_INFO, "Stamping with period {} (max lcm {})", period, max_lcm(ctx));

        Some(Self { period, nx, ny })
    }

    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x == self.nx || y == self.ny
    }

    /// Column of the reference tile that interior tile `(x, y)` copies.
    pub fn reference_x(&self, x: usize, y: usize) -> usize {
        1 + ((x - 1) + (y - 1)) % self.period
    }

    pub fn reference_tiles(&self) -> Vec<(usize, usize)> {
        (1 ..= self.period).map(|x| (x, Self::REF_Y)).collect()
    }

    fn is_reference(&self, x: usize, y: usize) -> bool {
        y == Self::REF_Y && x >= 1 && x <= self.period
    }

    /// Tiles computed by the builder: the reference strip and the device edges.
    pub fn direct_tiles(&self, ctx: &BuildContext) -> Vec<(usize, usize)> {
        let mut tiles = self.reference_tiles();
        tiles.extend(ctx.tiles().into_iter().filter(|(x, y)| self.is_edge(*x, *y)));
        tiles
    }

    pub fn stamped_tiles(&self, ctx: &BuildContext) -> Vec<(usize, usize)> {
        ctx.tiles().into_iter()
            .filter(|(x, y)| !self.is_edge(*x, *y) && !self.is_reference(*x, *y))
            .collect()
    }
}

/// Copies the reference strip held by `reference` onto `tiles`, writing into
/// `into`. Keys the reference tile lacks are left absent.
pub fn stamp_tiles(
    reference: &ConnectionMap,
    plan: &StampPlan,
    tiles: &[(usize, usize)],
    into: &mut ConnectionMap
) {
    for (x, y) in tiles {
        let ref_x = plan.reference_x(*x, *y);
        for (key, tos) in reference.tile(ref_x, StampPlan::REF_Y) {
            let key = key.at_tile(*x, *y);
            for to in tos {
                into.add(key, to.clone());
            }
        }
    }
}

/// Builds the full connection map, computing only the tiles of `plan` and
/// stamping the rest.
pub fn stampout(builder: &SwitchblockBuilder, plan: &StampPlan)
    -> Result<ConnectionMap, BuildError>
{
    let ctx = builder.context();
    let direct = plan.direct_tiles(ctx);
    let stamped = plan.stamped_tiles(ctx);

    dbg_log!(
        DBG_INFO,
        "Computing {} tiles, stamping {} tiles",
        direct.len(), stamped.len()
    );

    let mut map = builder.build_tiles(&direct)?;
    let mut stamped_map = ConnectionMap::new();
    stamp_tiles(&map, plan, &stamped, &mut stamped_map);
    map.merge(stamped_map);

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::*;
    use crate::switchblock::MultiThreadedBuilder;
    use crate::testutil::*;
    use std::sync::Arc;

    fn context(arch: &Architecture) -> BuildContext {
        BuildContext::new(arch).unwrap()
    }

    fn assert_stamped_equals_direct(arch: &Architecture) {
        let builder = SwitchblockBuilder::new(arch).unwrap();
        assert!(StampPlan::new(builder.context()).is_some());
        let direct = builder.build_direct().unwrap();
        assert!(!direct.is_empty());
        assert_eq!(builder.build().unwrap(), direct);
    }

    #[test]
    fn test_period_of_nested_lengths() {
        let ctx = context(&mixed_unidir_arch(14, 10));
        assert_eq!(max_lcm(&ctx), 6);
        assert_eq!(stamp_period(&ctx), 6);

        let ctx = context(&unidir_l4_arch(10, 10));
        assert_eq!(max_lcm(&ctx), 4);
        assert_eq!(stamp_period(&ctx), 4);
    }

    #[test]
    fn test_period_of_disjoint_lengths() {
        /* L2 <-> L2 and L3 <-> L3 only: both patterns must repeat */
        let mut arch = mixed_unidir_arch(14, 10);
        arch.switchblocks.truncate(1);
        let ctx = context(&arch);
        assert_eq!(max_lcm(&ctx), 3);
        assert_eq!(stamp_period(&ctx), 6);
    }

    #[test]
    fn test_no_rules_no_plan() {
        let arch = single_type_arch(Directionality::Bidirectional, "L4", 4, 8, 12, 12);
        let ctx = context(&arch);
        assert_eq!(max_lcm(&ctx), 0);
        assert_eq!(StampPlan::new(&ctx), None);
    }

    #[test]
    fn test_small_device_no_plan() {
        /* Too narrow for a reference strip */
        assert_eq!(StampPlan::new(&context(&unidir_l4_arch(4, 10))), None);
        /* Wire as long as the device height */
        assert_eq!(StampPlan::new(&context(&unidir_l4_arch(10, 4))), None);
        assert!(StampPlan::new(&context(&unidir_l4_arch(5, 5))).is_some());
    }

    #[test]
    fn test_plan_partitions_tiles() {
        let ctx = context(&unidir_l4_arch(9, 7));
        let plan = StampPlan::new(&ctx).unwrap();

        assert_eq!(plan.reference_tiles(), vec![(1, 1), (2, 1), (3, 1), (4, 1)]);
        assert_eq!(plan.reference_x(1, 1), 1);
        assert_eq!(plan.reference_x(5, 1), 1);
        assert_eq!(plan.reference_x(2, 3), 4);
        assert_eq!(plan.reference_x(3, 3), 1);

        let mut all: Vec<_> = plan.direct_tiles(&ctx);
        all.extend(plan.stamped_tiles(&ctx));
        all.sort();
        assert_eq!(all, ctx.tiles());
    }

    #[test]
    fn test_stamped_equals_direct_unidir() {
        assert_stamped_equals_direct(&unidir_l4_arch(12, 12));
        assert_stamped_equals_direct(&unidir_l4_arch(5, 9));
    }

    #[test]
    fn test_stamped_equals_direct_bidir() {
        assert_stamped_equals_direct(&bidir_l4_arch(10, 9));
    }

    #[test]
    fn test_stamped_equals_direct_mixed() {
        assert_stamped_equals_direct(&mixed_unidir_arch(14, 10));
    }

    #[test]
    fn test_interior_tiles_repeat_with_period() {
        let arch = mixed_unidir_arch(16, 8);
        let builder = SwitchblockBuilder::new(&arch).unwrap();
        let period = stamp_period(builder.context());
        let map = builder.build_direct().unwrap();

        for x in 1 .. 16 - period {
            for y in 1 .. 8 {
                let here: Vec<_> = map.tile(x, y)
                    .map(|(k, v)| (k.at_tile(0, 0), v.to_vec()))
                    .collect();
                let there: Vec<_> = map.tile(x + period, y)
                    .map(|(k, v)| (k.at_tile(0, 0), v.to_vec()))
                    .collect();
                assert!(!here.is_empty());
                assert_eq!(here, there, "tiles ({}, {}) and ({}, {})", x, y, x + period, y);
            }
        }
    }

    #[test]
    fn test_multithreaded_stamping() {
        let arch = mixed_unidir_arch(14, 10);
        let builder = Arc::new(SwitchblockBuilder::new(&arch).unwrap());
        let single = builder.build().unwrap();

        for threads in [1, 2, 5] {
            let map = Arc::clone(&builder).build_multithreaded(threads, true).unwrap();
            assert_eq!(map, single);
        }
        let unstamped = Arc::clone(&builder).build_multithreaded(3, false).unwrap();
        assert_eq!(unstamped, single);
    }
}
