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

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crate::arch::*;
use crate::channel::{ChannelSet, WireTypeId};
use crate::common::split_range_nicely;
use crate::error::BuildError;
use crate::formula::{Formula, FormulaData, wrap_formula_result};
use crate::matcher::{candidate_tracks, dest_direction, src_direction};
use crate::stamper::{self, StampPlan};
#[allow(unused)]
use crate::log::*;

pub mod serialize;


/// Destination of a single switchblock connection.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToTrack {
    pub to_track: usize,
    pub switch_name: String,
}

/// Key of the connection map. `from_side` is never equal to `to_side`.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SwitchblockLookup {
    pub x: usize,
    pub y: usize,
    pub from_side: Side,
    pub to_side: Side,
    pub track: usize,
}

impl SwitchblockLookup {
    pub fn new(x: usize, y: usize, from_side: Side, to_side: Side, track: usize) -> Self {
        Self { x, y, from_side, to_side, track }
    }

    pub fn at_tile(self, x: usize, y: usize) -> Self {
        Self { x, y, .. self }
    }
}

impl std::fmt::Display for SwitchblockLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.x, self.y, self.from_side.code(), self.to_side.code(), self.track
        )
    }
}

/// Sparse map of switchblock connections. A key is either absent or maps to
/// a non-empty list of unique destinations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionMap {
    map: BTreeMap<SwitchblockLookup, Vec<ToTrack>>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `to` unless the key already holds it. Returns whether anything
    /// was added.
    pub fn add(&mut self, key: SwitchblockLookup, to: ToTrack) -> bool {
        let entry = self.map.entry(key).or_default();
        if entry.contains(&to) {
            return false;
        }
        entry.push(to);
        true
    }

    pub fn get(&self, key: &SwitchblockLookup) -> Option<&[ToTrack]> {
        self.map.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &SwitchblockLookup) -> bool {
        self.map.contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of (key, destination) pairs
    pub fn connection_count(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn iter<'s>(&'s self) -> impl Iterator<Item = (&'s SwitchblockLookup, &'s [ToTrack])> + 's {
        self.map.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Entries of the switchblock at tile `(x, y)`
    pub fn tile<'s>(&'s self, x: usize, y: usize)
        -> impl Iterator<Item = (&'s SwitchblockLookup, &'s [ToTrack])> + 's
    {
        let first = SwitchblockLookup::new(x, y, Side::Top, Side::Top, 0);
        let last = SwitchblockLookup::new(x, y, Side::Left, Side::Left, usize::MAX);
        self.map.range(first ..= last).map(|(k, v)| (k, v.as_slice()))
    }

    /// Merges `other` into `self`, de-duplicating destinations.
    pub fn merge(&mut self, other: ConnectionMap) {
        for (key, tos) in other.map {
            for to in tos {
                self.add(key, to);
            }
        }
    }
}

/* Wireconn rule with wire type names resolved */
#[derive(Clone, Debug)]
pub struct CompiledWireconn {
    pub from_types: Vec<WireTypeId>,
    pub to_types: Vec<WireTypeId>,
    pub from_points: Option<Vec<usize>>,
    pub to_points: Option<Vec<usize>>,
    pub switch_name: String,
}

/* Switchblock with its permutation formulas parsed */
#[derive(Clone, Debug)]
pub struct CompiledSwitchblock {
    pub name: String,
    pub wireconns: Vec<CompiledWireconn>,
    pub permutations: BTreeMap<SidePair, Vec<Formula>>,
}

impl CompiledSwitchblock {
    fn compile(
        info: &SwitchblockInfo,
        directionality: Directionality,
        type_ids: &HashMap<&str, WireTypeId>
    ) -> Result<Self, BuildError> {
        if info.directionality != directionality {
            return Err(BuildError::ConfigMismatch(format!(
                "switchblock {} is {}, but the device is {}",
                info.name, info.directionality, directionality
            )));
        }

        let resolve = |names: &[String]| -> Result<Vec<WireTypeId>, BuildError> {
            names.iter()
                .map(|name| type_ids.get(name.as_str()).copied().ok_or_else(|| {
                    BuildError::ConfigMismatch(format!(
                        "switchblock {} refers to unknown wire type {}",
                        info.name, name
                    ))
                }))
                .collect()
        };

        let wireconns = info.wireconns.iter()
            .map(|wc| -> Result<CompiledWireconn, BuildError> {
                Ok(CompiledWireconn {
                    from_types: resolve(&wc.from_type)?,
                    to_types: resolve(&wc.to_type)?,
                    from_points: wc.from_points.clone(),
                    to_points: wc.to_points.clone(),
                    switch_name: wc.switch_name.clone()
                        .unwrap_or_else(|| info.switch_name.clone()),
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let mut permutations = BTreeMap::new();
        for (sides, funcs) in &info.permutations {
            let formulas = funcs.iter()
                .map(|text| Formula::parse(text).map_err(|error| BuildError::Formula {
                    switchblock: info.name.clone(),
                    sides: *sides,
                    error,
                }))
                .collect::<Result<Vec<_>, BuildError>>()?;
            if !formulas.is_empty() {
                permutations.insert(*sides, formulas);
            }
        }

        Ok(Self { name: info.name.clone(), wireconns, permutations })
    }

    pub fn formulas(&self, sides: SidePair) -> &[Formula] {
        self.permutations.get(&sides).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Immutable state shared by every step of a build: the device, its channels
/// and the validated switchblock definitions.
#[derive(Debug)]
pub struct BuildContext {
    pub device: DeviceInfo,
    pub directionality: Directionality,
    pub wire_types: Vec<WireTypeInfo>,
    pub channels: ChannelSet,
    pub switchblocks: Vec<CompiledSwitchblock>,
}

impl BuildContext {
    pub fn new(arch: &Architecture) -> Result<Self, BuildError> {
        let mut type_ids = HashMap::new();
        for (idx, wt) in arch.wire_types.iter().enumerate() {
            if type_ids.insert(wt.name.as_str(), WireTypeId(idx)).is_some() {
                return Err(BuildError::ConfigMismatch(
                    format!("wire type {} is defined more than once", wt.name)
                ));
            }
        }

        /* Validate every switchblock before any geometry is laid out */
        let switchblocks = arch.switchblocks.iter()
            .map(|sb| CompiledSwitchblock::compile(sb, arch.directionality, &type_ids))
            .collect::<Result<Vec<_>, BuildError>>()?;

        let channels = ChannelSet::build(&arch.device, arch.directionality, &arch.wire_types)?;

        dbg_log!(
            DBG_INFO,
            "Build context: {}x{} tiles, W={}, {}, {} wire types, {} switchblocks",
            arch.device.width,
            arch.device.height,
            arch.device.channel_width,
            arch.directionality,
            arch.wire_types.len(),
            switchblocks.len()
        );

        Ok(Self {
            device: arch.device,
            directionality: arch.directionality,
            wire_types: arch.wire_types.clone(),
            channels,
            switchblocks,
        })
    }

    pub fn wire_length(&self, wire_type: WireTypeId) -> usize {
        self.wire_types[wire_type.0].length
    }

    /// Every switchblock tile of the device, column by column
    pub fn tiles(&self) -> Vec<(usize, usize)> {
        let mut tiles = Vec::new();
        for x in 0 ..= self.device.width {
            for y in 0 ..= self.device.height {
                tiles.push((x, y));
            }
        }
        tiles
    }
}

#[derive(Debug)]
pub struct SwitchblockBuilder {
    ctx: BuildContext,
}

impl SwitchblockBuilder {
    pub fn new(arch: &Architecture) -> Result<Self, BuildError> {
        Ok(Self { ctx: BuildContext::new(arch)? })
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Destinations of `from_track` entering the switchblock at `(x, y)` through
    /// `from_side` and leaving through `to_side`, over all switchblocks.
    /// Reverse entries of bidirectional architectures are not included here.
    pub fn connect(
        &self,
        x: usize,
        y: usize,
        from_side: Side,
        to_side: Side,
        from_track: usize
    ) -> Result<Vec<ToTrack>, BuildError> {
        let mut tos = Vec::new();
        for sb in &self.ctx.switchblocks {
            for to in self.connect_switchblock(sb, x, y, from_side, to_side, from_track)? {
                if !tos.contains(&to) {
                    tos.push(to);
                }
            }
        }
        Ok(tos)
    }

    fn connect_switchblock(
        &self,
        sb: &CompiledSwitchblock,
        x: usize,
        y: usize,
        from_side: Side,
        to_side: Side,
        from_track: usize
    ) -> Result<Vec<ToTrack>, BuildError> {
        let mut tos = Vec::new();

        let sides = match SidePair::new(from_side, to_side) {
            Some(sides) => sides,
            None => return Ok(tos),
        };
        let formulas = sb.formulas(sides);
        if formulas.is_empty() {
            return Ok(tos);
        }

        let channels = &self.ctx.channels;
        let (from_chan, to_chan) = match (
            channels.channel_at_side(x, y, from_side),
            channels.channel_at_side(x, y, to_side)
        ) {
            (Some(from_chan), Some(to_chan)) => (from_chan, to_chan),
            _ => return Ok(tos),
        };
        if from_track >= from_chan.len() {
            return Ok(tos);
        }

        let src = from_chan.track(from_track);
        let src_wirepoint = from_chan.wirepoint_of(from_track, from_side)?;
        let src_dir = src_direction(from_side, self.ctx.directionality);
        let dest_dir = dest_direction(to_side, self.ctx.directionality);

        for rule in &sb.wireconns {
            if !rule.from_types.contains(&src.wire_type) {
                continue;
            }
            if let Some(points) = &rule.from_points {
                if !points.contains(&src_wirepoint) {
                    continue;
                }
            }

            let dests = candidate_tracks(
                &to_chan,
                to_side,
                &rule.to_types,
                rule.to_points.as_deref(),
                dest_dir
            )?;
            if dests.is_empty() {
                continue;
            }

            let sources = candidate_tracks(
                &from_chan,
                from_side,
                &rule.from_types,
                rule.from_points.as_deref(),
                src_dir
            )?;
            /* Not driven towards this switchblock */
            let t = match sources.iter().position(|idx| *idx == from_track) {
                Some(t) => t,
                None => continue,
            };

            let data = FormulaData { dest_w: dests.len() as i64, track: t as i64 };
            for formula in formulas {
                let result = formula.eval(&data).map_err(|error| BuildError::Formula {
                    switchblock: sb.name.clone(),
                    sides,
                    error,
                })?;
                let idx = wrap_formula_result(result, dests.len()).ok_or_else(|| {
                    BuildError::InternalConsistency(format!(
                        "formula \"{}\" result {} can't index {} destinations",
                        formula, result, dests.len()
                    ))
                })?;
                tos.push(ToTrack {
                    to_track: dests[idx],
                    switch_name: rule.switch_name.clone(),
                });
            }
        }

        Ok(tos)
    }

    /// Computes one key of `sb` and records it in `map`, together with the
    /// reverse connections of a bidirectional architecture.
    fn compute_track_connections(
        &self,
        sb: &CompiledSwitchblock,
        key: SwitchblockLookup,
        map: &mut ConnectionMap
    ) -> Result<(), BuildError> {
        let tos = self.connect_switchblock(sb, key.x, key.y, key.from_side, key.to_side, key.track)?;

        for to in tos {
            let reverse = SwitchblockLookup::new(key.x, key.y, key.to_side, key.from_side, to.to_track);
            let back = ToTrack { to_track: key.track, switch_name: to.switch_name.clone() };
            map.add(key, to);
            if self.ctx.directionality == Directionality::Bidirectional {
                map.add(reverse, back);
            }
        }

        Ok(())
    }

    /// All connections of the switchblock at tile `(x, y)`.
    pub fn compute_tile(&self, x: usize, y: usize) -> Result<ConnectionMap, BuildError> {
        let mut map = ConnectionMap::new();
        self.compute_tile_into(x, y, &mut map)?;
        Ok(map)
    }

    fn compute_tile_into(&self, x: usize, y: usize, map: &mut ConnectionMap)
        -> Result<(), BuildError>
    {
        let width = self.ctx.channels.channel_width();

        for sb in &self.ctx.switchblocks {
            for from_track in 0 .. width {
                for from_side in Side::SIDES {
                    for to_side in Side::SIDES {
                        if from_side == to_side {
                            continue;
                        }
                        let key = SwitchblockLookup::new(x, y, from_side, to_side, from_track);
                        self.compute_track_connections(sb, key, map)?;
                    }
                }
            }
        }

        Ok(())
    }

    pub fn build_tiles(&self, tiles: &[(usize, usize)]) -> Result<ConnectionMap, BuildError> {
        let mut map = ConnectionMap::new();
        for (x, y) in tiles {
            self.compute_tile_into(*x, *y, &mut map)?;
        }
        Ok(map)
    }

    /// Computes every tile without stamping.
    pub fn build_direct(&self) -> Result<ConnectionMap, BuildError> {
        let tiles = self.ctx.tiles();
        dbg_log!(DBG_INFO, "Computing {} tiles directly", tiles.len());
        self.build_tiles(&tiles)
    }

    /// Builds the whole connection map, stamping the periodic part of the
    /// device whenever possible.
    pub fn build(&self) -> Result<ConnectionMap, BuildError> {
        match StampPlan::new(&self.ctx) {
            Some(plan) => stamper::stampout(self, &plan),
            None => self.build_direct(),
        }
    }
}

pub trait MultiThreadedBuilder {
    fn build_multithreaded(self, thread_count: usize, stamp: bool)
        -> Result<ConnectionMap, BuildError>;
}

fn join_maps(
    handles: Vec<thread::JoinHandle<Result<ConnectionMap, BuildError>>>,
    map: &mut ConnectionMap
) -> Result<(), BuildError> {
    /* Every worker owns distinct tiles, so partial maps never collide. */
    for handle in handles {
        let part = handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e))?;
        map.merge(part);
    }
    Ok(())
}

impl<R> MultiThreadedBuilder for R
where
    R: Borrow<SwitchblockBuilder> + Clone + Send + 'static
{
    /* Tiles are distributed among threads in contiguous chunks, then the
     * stamping phase is distributed the same way. */
    fn build_multithreaded(self, thread_count: usize, stamp: bool)
        -> Result<ConnectionMap, BuildError>
    {
        let plan = if stamp { StampPlan::new(&self.borrow().ctx) } else { None };
        let computed = match &plan {
            Some(plan) => plan.direct_tiles(&self.borrow().ctx),
            None => self.borrow().ctx.tiles(),
        };
        let computed = Arc::new(computed);

        let mut handles = Vec::new();
        for range in split_range_nicely(0 .. computed.len(), thread_count) {
            let me = self.clone();
            let tiles = Arc::clone(&computed);
            handles.push(thread::spawn(move || me.borrow().build_tiles(&tiles[range])));
        }
        let mut map = ConnectionMap::new();
        join_maps(handles, &mut map)?;

        let plan = match plan {
            Some(plan) => plan,
            None => return Ok(map),
        };

        let stamped = Arc::new(plan.stamped_tiles(&self.borrow().ctx));
        let reference = Arc::new(map);
        let plan = Arc::new(plan);

        let mut handles = Vec::new();
        for range in split_range_nicely(0 .. stamped.len(), thread_count) {
            let reference = Arc::clone(&reference);
            let tiles = Arc::clone(&stamped);
            let plan = Arc::clone(&plan);
            handles.push(thread::spawn(move || {
                let mut part = ConnectionMap::new();
                stamper::stamp_tiles(&reference, &plan, &tiles[range], &mut part);
                Ok(part)
            }));
        }

        let mut stamped_map = ConnectionMap::new();
        join_maps(handles, &mut stamped_map)?;

        let mut map = Arc::try_unwrap(reference).unwrap_or_else(|shared| (*shared).clone());
        map.merge(stamped_map);

        Ok(map)
    }
}
