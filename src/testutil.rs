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

/* Architecture fixtures shared by unit tests */

use std::collections::BTreeMap;
use crate::arch::*;

/* Every ordered pair of distinct sides */
pub const ALL_SIDE_PAIRS: [&str; 12] = [
    "lr", "lt", "lb", "rl", "rt", "rb", "bt", "br", "bl", "tb", "tl", "tr",
];

pub fn wire_type(name: &str, length: usize, frequency: usize) -> WireTypeInfo {
    WireTypeInfo { name: name.into(), length, frequency }
}

pub fn single_type_arch(
    directionality: Directionality,
    name: &str,
    length: usize,
    channel_width: usize,
    width: usize,
    height: usize
) -> Architecture {
    Architecture {
        device: DeviceInfo { width, height, channel_width },
        directionality,
        wire_types: vec![wire_type(name, length, 1)],
        switchblocks: Vec::new(),
    }
}

pub fn wireconn(
    from_type: &[&str],
    to_type: &[&str],
    from_points: Option<&[usize]>,
    to_points: Option<&[usize]>
) -> WireconnInfo {
    WireconnInfo {
        from_type: from_type.iter().map(|s| s.to_string()).collect(),
        to_type: to_type.iter().map(|s| s.to_string()).collect(),
        from_points: from_points.map(<[usize]>::to_vec),
        to_points: to_points.map(<[usize]>::to_vec),
        switch_name: None,
    }
}

pub fn switchblock(
    name: &str,
    directionality: Directionality,
    wireconns: Vec<WireconnInfo>,
    permutations: &[(&str, &[&str])]
) -> SwitchblockInfo {
    let permutations: BTreeMap<SidePair, Vec<String>> = permutations.iter()
        .map(|(pair, funcs)| {
            let pair: SidePair = pair.parse().unwrap();
            (pair, funcs.iter().map(|f| f.to_string()).collect())
        })
        .collect();

    SwitchblockInfo {
        name: name.into(),
        directionality,
        switch_name: format!("{}_sw", name),
        wireconns,
        permutations,
    }
}

/* The same formulas on every side pair */
pub fn uniform_switchblock(
    name: &str,
    directionality: Directionality,
    wireconns: Vec<WireconnInfo>,
    formulas: &[&str]
) -> SwitchblockInfo {
    let permutations: Vec<(&str, &[&str])> = ALL_SIDE_PAIRS.iter()
        .map(|pair| (*pair, formulas))
        .collect();
    switchblock(name, directionality, wireconns, &permutations)
}

/// Unidirectional, single L4 type, W = 4, wirepoint 0 to wirepoint 0 with the
/// identity permutation on every side pair.
pub fn unidir_l4_arch(width: usize, height: usize) -> Architecture {
    let mut arch = single_type_arch(Directionality::Unidirectional, "L4", 4, 4, width, height);
    arch.switchblocks.push(uniform_switchblock(
        "wilton",
        Directionality::Unidirectional,
        vec![wireconn(&["L4"], &["L4"], Some(&[0]), Some(&[0]))],
        &["t"]
    ));
    arch
}

/// Bidirectional L4 (W = 8) with every wirepoint connected, formulas on six
/// side pairs only.
pub fn bidir_l4_arch(width: usize, height: usize) -> Architecture {
    let mut arch = single_type_arch(Directionality::Bidirectional, "L4", 4, 8, width, height);
    arch.switchblocks.push(switchblock(
        "subset",
        Directionality::Bidirectional,
        vec![wireconn(&["L4"], &["L4"], None, None)],
        &[
            ("lr", &["t"]),
            ("lt", &["W-t"]),
            ("lb", &["t+1"]),
            ("rt", &["t"]),
            ("rb", &["W-t-1"]),
            ("tb", &["t"]),
        ]
    ));
    arch
}

/// Two unidirectional types of different lengths, connected among and across
/// each other.
pub fn mixed_unidir_arch(width: usize, height: usize) -> Architecture {
    let mut arch = Architecture {
        device: DeviceInfo { width, height, channel_width: 12 },
        directionality: Directionality::Unidirectional,
        wire_types: vec![wire_type("L2", 2, 1), wire_type("L3", 3, 1)],
        switchblocks: Vec::new(),
    };
    arch.switchblocks.push(uniform_switchblock(
        "straight",
        Directionality::Unidirectional,
        vec![
            wireconn(&["L2"], &["L2"], Some(&[0]), Some(&[0, 1])),
            wireconn(&["L3"], &["L3"], Some(&[0]), Some(&[0])),
        ],
        &["t", "W-t-1"]
    ));
    let mut cross = uniform_switchblock(
        "cross",
        Directionality::Unidirectional,
        vec![wireconn(&["L2", "L3"], &["L3", "L2"], Some(&[1]), Some(&[0]))],
        &["t+1"]
    );
    cross.wireconns[0].switch_name = Some("cross_mux".into());
    arch.switchblocks.push(cross);
    arch
}
